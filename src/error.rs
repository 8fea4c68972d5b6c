//! Error type shared by the stores, the draw flow and the web service.

use thiserror::Error;

use crate::lottery::LotteryOutcome;

/// Errors from roster, request queue and history operations.
///
/// The allocation engine itself never fails; every variant here comes from a
/// storage collaborator or from caller input that cannot be normalized.
#[derive(Debug, Error)]
pub enum LotteryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A draw was computed but one of its writes failed. The outcome is kept
    /// so the caller can persist it again instead of drawing anew.
    #[error("draw {draw_id} was not fully saved: {source}")]
    Persist {
        draw_id: String,
        outcome: Box<LotteryOutcome>,
        source: Box<LotteryError>,
    },
}

impl LotteryError {
    /// Returns true if the error was caused by caller input rather than storage.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LotteryError::ParticipantNotFound(_) | LotteryError::InvalidInput(_)
        )
    }

    /// Wraps a store failure that happened after `outcome` was drawn
    pub fn persist(outcome: LotteryOutcome, source: LotteryError) -> Self {
        let source = match source {
            LotteryError::Persist { source, .. } => source,
            other => Box::new(other),
        };
        LotteryError::Persist {
            draw_id: outcome.history_entry.id.clone(),
            outcome: Box::new(outcome),
            source,
        }
    }

    /// The drawn outcome a failed write left behind, if any
    pub fn unsaved_outcome(&self) -> Option<&LotteryOutcome> {
        match self {
            LotteryError::Persist { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn into_unsaved_outcome(self) -> std::result::Result<LotteryOutcome, LotteryError> {
        match self {
            LotteryError::Persist { outcome, .. } => Ok(*outcome),
            other => Err(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LotteryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lottery::{LotteryHistoryEntry, LotteryOutcome};
    use chrono::Utc;

    fn outcome(id: &str) -> LotteryOutcome {
        LotteryOutcome {
            winners: Vec::new(),
            missed: Vec::new(),
            history_entry: LotteryHistoryEntry {
                id: id.to_string(),
                date: Utc::now(),
                winners: Vec::new(),
                missed_participant_ids: Vec::new(),
            },
            updated_participants: Vec::new(),
        }
    }

    #[test]
    fn persist_keeps_the_outcome_and_the_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = LotteryError::persist(outcome("d1"), cause.into());

        assert!(!err.is_client_error());
        assert!(err.to_string().contains("d1"));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.unsaved_outcome().map(|o| o.history_entry.id.as_str()), Some("d1"));
    }

    #[test]
    fn persist_does_not_nest() {
        let inner = LotteryError::persist(outcome("old"), LotteryError::InvalidInput("x".to_string()));
        let err = LotteryError::persist(outcome("new"), inner);

        match err {
            LotteryError::Persist { draw_id, source, .. } => {
                assert_eq!(draw_id, "new");
                assert!(matches!(*source, LotteryError::InvalidInput(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(LotteryError::InvalidInput("y".to_string()).into_unsaved_outcome().is_err());
    }
}
