//! Core submission data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a submission.
///
/// ```text
/// PENDING ──► PROCESSING ──► PASSED
///    ▲            │     └──► FAILED
///    └────────────┘ (lease expired)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Created, waiting to be picked up.
    Pending,
    /// Claimed by a worker; `processing_started_at` holds the lease start.
    Processing,
    /// Content was accepted by the validator.
    Passed,
    /// Content was rejected, or processing failed in a detectable way.
    Failed,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 4] = [
        SubmissionStatus::Pending,
        SubmissionStatus::Processing,
        SubmissionStatus::Passed,
        SubmissionStatus::Failed,
    ];

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Passed | SubmissionStatus::Failed)
    }

    /// Returns true if `next` is a legal edge from this status.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Passed) | (Processing, Failed) | (Processing, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Processing => "PROCESSING",
            SubmissionStatus::Passed => "PASSED",
            SubmissionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    /// Case-insensitive, so query strings like `?status=pending` work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(SubmissionStatus::Pending),
            "PROCESSING" => Ok(SubmissionStatus::Processing),
            "PASSED" => Ok(SubmissionStatus::Passed),
            "FAILED" => Ok(SubmissionStatus::Failed),
            other => Err(format!("unknown submission status: {}", other)),
        }
    }
}

/// A content submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub content: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    /// Start of the current processing lease.
    pub processing_started_at: Option<DateTime<Utc>>,
    /// When the submission reached PASSED or FAILED.
    pub processed_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Time spent in the current lease, if the record carries one.
    pub fn lease_elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.processing_started_at.map(|started| now - started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use SubmissionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Passed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Pending));
    }

    #[test]
    fn test_rejected_transitions() {
        use SubmissionStatus::*;
        assert!(!Pending.can_transition_to(Passed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Processing));
        for terminal in [Passed, Failed] {
            for next in SubmissionStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(SubmissionStatus::Passed.is_terminal());
        assert!(SubmissionStatus::Failed.is_terminal());
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(!SubmissionStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_serialization_is_upper_case() {
        let json = serde_json::to_string(&SubmissionStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let parsed: SubmissionStatus = serde_json::from_str("\"PASSED\"").unwrap();
        assert_eq!(parsed, SubmissionStatus::Passed);
    }

    #[test]
    fn test_status_from_str_is_case_insensitive() {
        assert_eq!(
            "pending".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Pending
        );
        assert_eq!(
            "Failed".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Failed
        );
        assert!("done".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn test_lease_elapsed() {
        let now = Utc::now();
        let mut submission = Submission {
            id: "sub-1".to_string(),
            content: "abc".to_string(),
            status: SubmissionStatus::Pending,
            created_at: now,
            processing_started_at: None,
            processed_at: None,
        };
        assert!(submission.lease_elapsed(now).is_none());

        submission.processing_started_at = Some(now - Duration::seconds(90));
        assert_eq!(submission.lease_elapsed(now), Some(Duration::seconds(90)));
    }
}
