use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A roster member taking part in draws
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Priority multiplier, treated as 1 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_weight: Option<u32>,
    #[serde(default)]
    pub consecutive_misses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_won_at: Option<DateTime<Utc>>,
    /// `Some(false)` keeps the participant out of a draw entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligible: Option<bool>,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_weight: None,
            consecutive_misses: 0,
            last_won_at: None,
            eligible: None,
        }
    }

    pub fn with_base_weight(mut self, base_weight: u32) -> Self {
        self.base_weight = Some(base_weight);
        self
    }

    pub fn with_misses(mut self, consecutive_misses: u32) -> Self {
        self.consecutive_misses = consecutive_misses;
        self
    }

    pub fn with_eligible(mut self, eligible: bool) -> Self {
        self.eligible = Some(eligible);
        self
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible != Some(false)
    }
}

/// A participant's claim on the emergency channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub participant_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub approved: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Priority track a winner was seated through, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Emergency,
    Guarantee,
    Lottery,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Guarantee => "guarantee",
            Self::Lottery => "lottery",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A winner picked by one of the channel allocators, before ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelWinner {
    pub participant_id: String,
    pub participant_name: String,
    pub channel: Channel,
}

impl ChannelWinner {
    pub fn from_participant(participant: &Participant, channel: Channel) -> Self {
        Self {
            participant_id: participant.id.clone(),
            participant_name: participant.name.clone(),
            channel,
        }
    }

    pub fn ranked(self, rank: usize) -> WinnerEntry {
        WinnerEntry {
            participant_id: self.participant_id,
            participant_name: self.participant_name,
            channel: self.channel,
            rank,
        }
    }
}

/// One seat of a draw's outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerEntry {
    pub participant_id: String,
    /// Name as it was at draw time
    pub participant_name: String,
    pub channel: Channel,
    /// 1-based position across all channels
    pub rank: usize,
}

/// Permanent record of a draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryHistoryEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub winners: Vec<WinnerEntry>,
    #[serde(default)]
    pub missed_participant_ids: Vec<String>,
}

/// Output of a single channel allocator
#[derive(Debug, Clone, Default)]
pub struct ChannelAllocation {
    pub winners: Vec<ChannelWinner>,
    /// Every participant id seated so far, including earlier channels
    pub used_ids: HashSet<String>,
    pub remaining_capacity: usize,
}

/// Input of a draw. Numeric knobs are signed so callers can pass anything;
/// they are clamped by [`LotteryConfig::policy`].
#[derive(Debug, Clone, Default)]
pub struct LotteryConfig {
    pub participants: Vec<Participant>,
    pub emergency_requests: Vec<EmergencyRequest>,
    pub emergency_slots: Option<i32>,
    pub guarantee_threshold: Option<i32>,
    pub guarantee_max_count: Option<i32>,
    pub draw_id: Option<String>,
    pub draw_date: Option<DateTime<Utc>>,
}

pub const DEFAULT_EMERGENCY_SLOTS: i32 = 1;
pub const DEFAULT_GUARANTEE_THRESHOLD: i32 = 3;
pub const DEFAULT_GUARANTEE_MAX_COUNT: i32 = 2;

/// Clamped draw parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawPolicy {
    pub emergency_slots: usize,
    pub guarantee_threshold: u32,
    pub guarantee_max_count: usize,
}

impl LotteryConfig {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self {
            participants,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> DrawPolicy {
        let emergency_slots = self.emergency_slots.unwrap_or(DEFAULT_EMERGENCY_SLOTS).max(0);
        let guarantee_threshold = self
            .guarantee_threshold
            .unwrap_or(DEFAULT_GUARANTEE_THRESHOLD)
            .max(1);
        let guarantee_max_count = self
            .guarantee_max_count
            .unwrap_or(DEFAULT_GUARANTEE_MAX_COUNT)
            .max(1);

        DrawPolicy {
            emergency_slots: emergency_slots as usize,
            guarantee_threshold: guarantee_threshold as u32,
            guarantee_max_count: guarantee_max_count as usize,
        }
    }
}

/// Result of a draw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryOutcome {
    pub winners: Vec<WinnerEntry>,
    /// Eligible participants that were not seated, in roster order
    pub missed: Vec<Participant>,
    pub history_entry: LotteryHistoryEntry,
    /// Fresh snapshot of every eligible participant for the roster to persist
    pub updated_participants: Vec<Participant>,
}
