//! Consent and visibility resolution
//!
//! Decides whether an interview session may be shown to a given audience,
//! from the per-participant consent state, the parent project's
//! visibility, and the post-creation embargo window.
//!
//! These are pure functions over whatever the repository read for the
//! current request. Consent is re-evaluated on every read; there is no
//! cached or materialized visibility flag, so revoking consent hides
//! previously-visible content immediately.

pub mod legacy;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A participant's consent decision for a session recording.
///
/// `Delete` is the stored default and means "no decision recorded";
/// it never satisfies the public unanimity rule and never blocks the
/// members rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consent {
    Private,
    Public,
    Delete,
}

impl Default for Consent {
    fn default() -> Self {
        Consent::Delete
    }
}

impl From<&str> for Consent {
    fn from(s: &str) -> Self {
        match s {
            "private" => Consent::Private,
            "public" => Consent::Public,
            _ => Consent::Delete,
        }
    }
}

impl From<String> for Consent {
    fn from(s: String) -> Self {
        Consent::from(s.as_str())
    }
}

impl From<Consent> for String {
    fn from(c: Consent) -> Self {
        match c {
            Consent::Private => "private".to_string(),
            Consent::Public => "public".to_string(),
            Consent::Delete => "delete".to_string(),
        }
    }
}

impl Consent {
    /// Parse a client-supplied consent value; anything outside the three
    /// known strings is rejected rather than coerced.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Consent::Private),
            "public" => Some(Consent::Public),
            "delete" => Some(Consent::Delete),
            _ => None,
        }
    }
}

/// Sessions stay out of public and member listings for this long after
/// creation, giving participants time to review and revoke.
pub const EMBARGO_HOURS: i64 = 24;

/// Whether a session created at `created_at` is still embargoed at `now`.
pub fn embargoed(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now < created_at + Duration::hours(EMBARGO_HOURS)
}

/// Unanimity rule for public projects: visible iff every participant's
/// consent is exactly `Public` and no other value appears. An empty
/// participant set fails (vacuous failure, not vacuous success).
pub fn publicly_visible<'a, I>(consents: I) -> bool
where
    I: IntoIterator<Item = &'a Consent>,
{
    let mut any = false;
    for consent in consents {
        if *consent != Consent::Public {
            return false;
        }
        any = true;
    }
    any
}

/// Rule for private projects: visible to members iff nobody explicitly
/// refused. Unset consent does not block.
pub fn members_visible<'a, I>(consents: I) -> bool
where
    I: IntoIterator<Item = &'a Consent>,
{
    consents.into_iter().all(|c| *c != Consent::Private)
}

/// How the requesting principal relates to the session's project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Anonymous, or authenticated with no standing on the project
    Anonymous,
    /// Confirmed, active member of the (private) project
    Member,
    /// Project creator, or a researcher/administrator member
    Privileged,
}

/// Everything the resolver needs to know about one session for one request.
#[derive(Clone, Debug)]
pub struct SessionAccess {
    /// Visibility of the parent project
    pub project_is_public: bool,
    /// Consent of every participant, in any order
    pub consents: Vec<Consent>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Whether the requesting user took part in the recording
    pub viewer_is_participant: bool,
}

impl SessionAccess {
    /// Full visibility decision for listings and detail reads.
    ///
    /// Privileged viewers see every session of their project regardless of
    /// consent or embargo. Participants always reach their own sessions.
    /// Everyone else gets the consent rule for the project's visibility,
    /// gated by the embargo window.
    pub fn visible_to(&self, audience: Audience, now: DateTime<Utc>) -> bool {
        if audience == Audience::Privileged {
            return true;
        }
        if self.viewer_is_participant {
            return true;
        }
        if embargoed(self.created_at, now) {
            return false;
        }
        if self.project_is_public {
            publicly_visible(&self.consents)
        } else {
            audience == Audience::Member && members_visible(&self.consents)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consents(values: &[Consent]) -> Vec<Consent> {
        values.to_vec()
    }

    #[test]
    fn test_public_requires_unanimity() {
        assert!(publicly_visible(&consents(&[Consent::Public])));
        assert!(publicly_visible(&consents(&[Consent::Public, Consent::Public])));
        // A single hold-out blocks publication
        assert!(!publicly_visible(&consents(&[Consent::Public, Consent::Private])));
        assert!(!publicly_visible(&consents(&[Consent::Public, Consent::Delete])));
        assert!(!publicly_visible(&consents(&[Consent::Private])));
    }

    #[test]
    fn test_public_empty_set_is_not_visible() {
        // Vacuous failure: no participants means no consent
        assert!(!publicly_visible(&consents(&[])));
    }

    #[test]
    fn test_members_visible_blocks_only_on_private() {
        assert!(members_visible(&consents(&[])));
        assert!(members_visible(&consents(&[Consent::Delete])));
        assert!(members_visible(&consents(&[Consent::Public, Consent::Delete])));
        assert!(!members_visible(&consents(&[Consent::Public, Consent::Private])));
        assert!(!members_visible(&consents(&[Consent::Private])));
    }

    #[test]
    fn test_embargo_window() {
        let created = Utc::now();
        assert!(embargoed(created, created));
        assert!(embargoed(created, created + Duration::hours(23)));
        assert!(embargoed(created, created + Duration::hours(24) - Duration::seconds(1)));
        // Boundary: exactly 24h is no longer embargoed
        assert!(!embargoed(created, created + Duration::hours(24)));
        assert!(!embargoed(created, created + Duration::hours(25)));
    }

    #[test]
    fn test_embargo_suppresses_consented_session() {
        let created = Utc::now();
        let access = SessionAccess {
            project_is_public: true,
            consents: consents(&[Consent::Public]),
            created_at: created,
            viewer_is_participant: false,
        };
        assert!(!access.visible_to(Audience::Anonymous, created + Duration::hours(1)));
        assert!(access.visible_to(Audience::Anonymous, created + Duration::hours(24)));
    }

    #[test]
    fn test_privileged_bypasses_consent_and_embargo() {
        let created = Utc::now();
        let access = SessionAccess {
            project_is_public: true,
            consents: consents(&[Consent::Private]),
            created_at: created,
            viewer_is_participant: false,
        };
        assert!(access.visible_to(Audience::Privileged, created));
    }

    #[test]
    fn test_participant_self_access_bypasses_everything() {
        let created = Utc::now();
        let access = SessionAccess {
            project_is_public: false,
            consents: consents(&[Consent::Private]),
            created_at: created,
            viewer_is_participant: true,
        };
        assert!(access.visible_to(Audience::Anonymous, created));
    }

    #[test]
    fn test_private_project_requires_membership() {
        let created = Utc::now() - Duration::hours(48);
        let access = SessionAccess {
            project_is_public: false,
            consents: consents(&[Consent::Delete, Consent::Public]),
            created_at: created,
            viewer_is_participant: false,
        };
        let now = Utc::now();
        assert!(!access.visible_to(Audience::Anonymous, now));
        assert!(access.visible_to(Audience::Member, now));
    }

    #[test]
    fn test_consent_string_round_trip() {
        for value in ["private", "public", "delete"] {
            let consent = Consent::parse(value).unwrap();
            assert_eq!(String::from(consent), value);
        }
        assert_eq!(Consent::parse("everyone"), None);
        // Unrecognized stored values fall back to the undecided default,
        // which the unanimity check treats as a hold-out
        assert_eq!(Consent::from("everyone"), Consent::Delete);
    }
}
