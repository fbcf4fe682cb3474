//! Consent resolution for the superseded single-experience model
//!
//! The earliest recordings stored one row per experience with two named
//! consent fields (interviewer and interviewee), each holding a tri-state
//! value. The multi-participant model supersedes it, but the policy those
//! fields encoded is kept here, evaluated field by field rather than over
//! a consent set.

use serde::{Deserialize, Serialize};

/// Tri-state consent held by one named role of a legacy experience.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyConsent {
    /// No part of the recording may be shared
    None,
    /// The full recording and any imagery may be shared
    All,
    /// Only the named region may be shared
    Partial(String),
}

impl From<&str> for LegacyConsent {
    fn from(s: &str) -> Self {
        match s {
            "NONE" => LegacyConsent::None,
            "ALL" => LegacyConsent::All,
            other => LegacyConsent::Partial(other.to_string()),
        }
    }
}

/// A legacy experience is listed publicly iff neither role withheld
/// consent entirely. Partial consent is enough to appear in the listing.
pub fn experience_listed(interviewer: &LegacyConsent, interviewee: &LegacyConsent) -> bool {
    *interviewer != LegacyConsent::None && *interviewee != LegacyConsent::None
}

/// Optional imagery attached to an experience is shown only when both
/// roles granted full consent.
pub fn experience_fully_disclosed(interviewer: &LegacyConsent, interviewee: &LegacyConsent) -> bool {
    *interviewer == LegacyConsent::All && *interviewee == LegacyConsent::All
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_requires_both_roles() {
        assert!(experience_listed(&LegacyConsent::All, &LegacyConsent::All));
        assert!(experience_listed(
            &LegacyConsent::All,
            &LegacyConsent::Partial("0:30-1:10".into())
        ));
        assert!(!experience_listed(&LegacyConsent::None, &LegacyConsent::All));
        assert!(!experience_listed(&LegacyConsent::All, &LegacyConsent::None));
        assert!(!experience_listed(&LegacyConsent::None, &LegacyConsent::None));
    }

    #[test]
    fn test_disclosure_requires_full_consent_from_both() {
        assert!(experience_fully_disclosed(&LegacyConsent::All, &LegacyConsent::All));
        assert!(!experience_fully_disclosed(
            &LegacyConsent::All,
            &LegacyConsent::Partial("0:00-0:10".into())
        ));
        assert!(!experience_fully_disclosed(&LegacyConsent::None, &LegacyConsent::All));
    }

    #[test]
    fn test_parse() {
        assert_eq!(LegacyConsent::from("NONE"), LegacyConsent::None);
        assert_eq!(LegacyConsent::from("ALL"), LegacyConsent::All);
        assert_eq!(
            LegacyConsent::from("0:12-2:04"),
            LegacyConsent::Partial("0:12-2:04".into())
        );
    }
}
