use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::error::{LotteryError, Result};
use crate::lottery::{Channel, EmergencyRequest, WinnerEntry};

/// Queue of emergency requests, one per participant, optionally kept in a
/// JSON file. Changes are kept only once the file write succeeds.
#[derive(Debug, Clone, Default)]
pub struct RequestQueue {
    path: Option<PathBuf>,
    requests: Vec<EmergencyRequest>,
}

impl RequestQueue {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the queue stored at `path`; a missing file is an empty queue
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let requests = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            requests,
        })
    }

    pub fn list(&self) -> &[EmergencyRequest] {
        &self.requests
    }

    /// Requests whose participant is in `participant_ids`
    pub fn for_participants(&self, participant_ids: &[String]) -> Vec<EmergencyRequest> {
        self.requests
            .iter()
            .filter(|r| participant_ids.contains(&r.participant_id))
            .cloned()
            .collect()
    }

    /// Queues a new, unapproved request
    pub fn submit(&mut self, participant_id: &str, reason: &str) -> Result<EmergencyRequest> {
        if participant_id.trim().is_empty() {
            return Err(LotteryError::InvalidInput("participant id is required".to_string()));
        }
        if self.requests.iter().any(|r| r.participant_id == participant_id) {
            return Err(LotteryError::InvalidInput(format!(
                "participant {participant_id} already has a pending request"
            )));
        }
        let request = EmergencyRequest {
            participant_id: participant_id.to_string(),
            reason: reason.trim().to_string(),
            approved: false,
            submitted_at: Utc::now(),
        };
        let mut next = self.requests.clone();
        next.push(request.clone());
        self.commit(next)?;
        Ok(request)
    }

    pub fn set_approved(&mut self, participant_id: &str, approved: bool) -> Result<EmergencyRequest> {
        let mut next = self.requests.clone();
        let request = next
            .iter_mut()
            .find(|r| r.participant_id == participant_id)
            .ok_or_else(|| LotteryError::ParticipantNotFound(participant_id.to_string()))?;
        request.approved = approved;
        let request = request.clone();
        self.commit(next)?;
        Ok(request)
    }

    pub fn remove(&mut self, participant_id: &str) -> Result<()> {
        let mut next = self.requests.clone();
        next.retain(|r| r.participant_id != participant_id);
        if next.len() == self.requests.len() {
            return Err(LotteryError::ParticipantNotFound(participant_id.to_string()));
        }
        self.commit(next)
    }

    /// Drops requests served by the emergency channel. Returns how many went.
    pub fn remove_consumed(&mut self, winners: &[WinnerEntry]) -> Result<usize> {
        let mut next = self.requests.clone();
        next.retain(|r| {
            !winners
                .iter()
                .any(|w| w.channel == Channel::Emergency && w.participant_id == r.participant_id)
        });
        let removed = self.requests.len() - next.len();
        if removed > 0 {
            self.commit(next)?;
            info!(removed, "consumed emergency requests removed");
        }
        Ok(removed)
    }

    fn commit(&mut self, next: Vec<EmergencyRequest>) -> Result<()> {
        self.write(&next)?;
        self.requests = next;
        Ok(())
    }

    fn write(&self, requests: &[EmergencyRequest]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(requests)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winner(participant_id: &str, channel: Channel) -> WinnerEntry {
        WinnerEntry {
            participant_id: participant_id.to_string(),
            participant_name: participant_id.to_uppercase(),
            channel,
            rank: 1,
        }
    }

    #[test]
    fn submitted_requests_start_unapproved() {
        let mut queue = RequestQueue::in_memory();
        let request = queue.submit("a", "  sample expires  ").unwrap();

        assert!(!request.approved);
        assert_eq!(request.reason, "sample expires");
        assert!(queue.submit("a", "again").is_err());
    }

    #[test]
    fn approval_toggles() {
        let mut queue = RequestQueue::in_memory();
        queue.submit("a", "").unwrap();

        assert!(queue.set_approved("a", true).unwrap().approved);
        assert!(queue.list()[0].approved);
        assert!(matches!(
            queue.set_approved("b", true),
            Err(LotteryError::ParticipantNotFound(_))
        ));
    }

    #[test]
    fn only_emergency_wins_consume_requests() {
        let mut queue = RequestQueue::in_memory();
        queue.submit("a", "").unwrap();
        queue.submit("b", "").unwrap();

        let removed = queue
            .remove_consumed(&[winner("a", Channel::Emergency), winner("b", Channel::Lottery)])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(queue.list().len(), 1);
        assert_eq!(queue.list()[0].participant_id, "b");
    }

    #[test]
    fn filters_to_active_participants() {
        let mut queue = RequestQueue::in_memory();
        queue.submit("a", "").unwrap();
        queue.submit("b", "").unwrap();

        let active = queue.for_participants(&["b".to_string()]);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].participant_id, "b");
    }

    #[test]
    fn file_queue_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emergency.json");

        let mut queue = RequestQueue::open(&path).unwrap();
        queue.submit("a", "broken centrifuge").unwrap();
        queue.set_approved("a", true).unwrap();

        let reopened = RequestQueue::open(&path).unwrap();
        assert_eq!(reopened.list().len(), 1);
        assert!(reopened.list()[0].approved);

        let mut reopened = reopened;
        reopened.remove("a").unwrap();
        assert!(RequestQueue::open(&path).unwrap().list().is_empty());
    }

    #[test]
    fn failed_writes_leave_the_queue_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emergency.json");
        let mut queue = RequestQueue::open(&path).unwrap();
        queue.submit("a", "freezer alarm").unwrap();

        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(queue.submit("b", "").is_err());
        assert!(queue.set_approved("a", true).is_err());
        assert!(queue.remove("a").is_err());
        assert!(queue.remove_consumed(&[winner("a", Channel::Emergency)]).is_err());

        assert_eq!(queue.list().len(), 1);
        assert_eq!(queue.list()[0].participant_id, "a");
        assert!(!queue.list()[0].approved);
    }
}
