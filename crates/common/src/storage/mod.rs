//! Recording storage (S3)
//!
//! Session recordings are stored under `{project_id}/{session_id}` and
//! played back through short-lived presigned URLs. Upload failures abort
//! the surrounding request before any session row is committed, so a
//! session can never reference a missing recording.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::debug;

/// Playback URLs stay valid for two hours
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// S3 client wrapper for session recordings
pub struct RecordingStore {
    client: Client,
    bucket: String,
}

impl RecordingStore {
    /// Create a store from configuration. A custom endpoint (e.g. minio
    /// in development) overrides the AWS default resolution.
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let base = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&base);
        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint.as_str());
        }
        builder = builder.force_path_style(config.force_path_style);

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    /// Storage key for a session recording
    pub fn key(project_id: i64, session_id: &str) -> String {
        format!("{}/{}", project_id, session_id)
    }

    /// Upload a recording. Blocking on the request path by design; the
    /// caller must not have written any session row yet.
    pub async fn upload(
        &self,
        project_id: i64,
        session_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let key = Self::key(project_id, session_id);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to upload recording {}: {}", key, e),
            })?;

        debug!(key = %key, size, "Recording uploaded");
        Ok(())
    }

    /// Mint a time-limited playback URL for a session recording
    pub async fn signed_url(&self, project_id: i64, session_id: &str) -> Result<String> {
        let key = Self::key(project_id, session_id);

        let presigning = PresigningConfig::expires_in(SIGNED_URL_TTL).map_err(|e| {
            AppError::Storage {
                message: format!("Invalid presigning configuration: {}", e),
            }
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to presign {}: {}", key, e),
            })?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(RecordingStore::key(12, "ab34cd"), "12/ab34cd");
    }

    #[test]
    fn test_signed_url_ttl_is_two_hours() {
        assert_eq!(SIGNED_URL_TTL.as_secs(), 7200);
    }
}
