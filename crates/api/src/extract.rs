//! Request extractors for authenticated principals
//!
//! Identity arrives as a bearer token minted at login. `AuthUser` rejects
//! unauthenticated requests; `MaybeAuthUser` lets public listings through
//! anonymously while still rejecting a malformed or expired token.

use crate::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use gabber_common::auth::extract_bearer;
use gabber_common::errors::AppError;

/// An authenticated principal
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(AppError::unauthorized)?;

        let token = extract_bearer(header).ok_or_else(AppError::unauthorized)?;
        let claims = state.jwt.verify_access(token)?;

        Ok(AuthUser {
            user_id: claims.user_id()?,
            email: claims.email,
        })
    }
}

/// An optionally authenticated principal. Absent credentials are fine;
/// present-but-invalid credentials are still an error.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(MaybeAuthUser(None));
        }

        AuthUser::from_request_parts(parts, state)
            .await
            .map(|user| MaybeAuthUser(Some(user)))
    }
}

impl MaybeAuthUser {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.user_id)
    }
}
