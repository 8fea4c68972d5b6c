use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::lottery::types::{
    DEFAULT_EMERGENCY_SLOTS, DEFAULT_GUARANTEE_MAX_COUNT, DEFAULT_GUARANTEE_THRESHOLD,
};
use crate::lottery::{EmergencyRequest, LotteryConfig, Participant};

pub const DEFAULT_DATA_DIR: &str = "lottery-data";
pub const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Where the history log lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackend {
    File,
    Memory,
}

impl HistoryBackend {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "memory" | "mem" => Self::Memory,
            "file" | "" => Self::File,
            other => {
                warn!(value = other, "unknown LOTTERY_HISTORY value, using file history");
                Self::File
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub history_backend: HistoryBackend,
    pub admin_password: String,
}

impl AppConfig {
    /// Reads `LOTTERY_DATA_DIR`, `LOTTERY_HISTORY` and `ADMIN_PASSWORD`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("LOTTERY_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let history_backend = lookup("LOTTERY_HISTORY")
            .map(|v| HistoryBackend::parse(&v))
            .unwrap_or(HistoryBackend::File);
        let admin_password =
            lookup("ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());

        Self {
            data_dir,
            history_backend,
            admin_password,
        }
    }

    pub fn roster_path(&self) -> PathBuf {
        self.data_dir.join("participants.csv")
    }

    pub fn requests_path(&self) -> PathBuf {
        self.data_dir.join("emergency.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    /// History file path, or `None` when history is kept in memory
    pub fn history_location(&self) -> Option<PathBuf> {
        match self.history_backend {
            HistoryBackend::File => Some(self.history_path()),
            HistoryBackend::Memory => None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn default_emergency_slots() -> i32 {
    DEFAULT_EMERGENCY_SLOTS
}

fn default_guarantee_threshold() -> i32 {
    DEFAULT_GUARANTEE_THRESHOLD
}

fn default_guarantee_max_count() -> i32 {
    DEFAULT_GUARANTEE_MAX_COUNT
}

fn default_max_winners() -> i32 {
    1
}

/// Knobs for one draw, as entered by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawOptions {
    #[serde(default = "default_emergency_slots")]
    pub emergency_slots: i32,
    #[serde(default = "default_guarantee_threshold")]
    pub guarantee_threshold: i32,
    #[serde(default = "default_guarantee_max_count")]
    pub guarantee_max_count: i32,
    /// Seats available this round; the draw result is cut down to this
    #[serde(default = "default_max_winners")]
    pub max_winners: i32,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            emergency_slots: default_emergency_slots(),
            guarantee_threshold: default_guarantee_threshold(),
            guarantee_max_count: default_guarantee_max_count(),
            max_winners: default_max_winners(),
        }
    }
}

impl DrawOptions {
    pub fn max_winners(&self) -> usize {
        self.max_winners.max(1) as usize
    }

    pub fn to_lottery_config(
        &self,
        participants: Vec<Participant>,
        emergency_requests: Vec<EmergencyRequest>,
    ) -> LotteryConfig {
        LotteryConfig {
            participants,
            emergency_requests,
            emergency_slots: Some(self.emergency_slots),
            guarantee_threshold: Some(self.guarantee_threshold),
            guarantee_max_count: Some(self.guarantee_max_count),
            draw_id: None,
            draw_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.history_backend, HistoryBackend::File);
        assert_eq!(config.admin_password, "admin123");
        assert_eq!(config.history_location(), Some(config.history_path()));
    }

    #[test]
    fn environment_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LOTTERY_DATA_DIR", "/var/lib/lottery"),
            ("LOTTERY_HISTORY", "Memory"),
            ("ADMIN_PASSWORD", "s3cret"),
        ]));
        assert_eq!(config.roster_path(), PathBuf::from("/var/lib/lottery/participants.csv"));
        assert_eq!(config.history_backend, HistoryBackend::Memory);
        assert_eq!(config.history_location(), None);
        assert_eq!(config.admin_password, "s3cret");
    }

    #[test]
    fn history_backend_values() {
        assert_eq!(HistoryBackend::parse(" MEM "), HistoryBackend::Memory);
        assert_eq!(HistoryBackend::parse("file"), HistoryBackend::File);
        // typos fall back to the durable store
        assert_eq!(HistoryBackend::parse("memroy"), HistoryBackend::File);
    }

    #[test]
    fn draw_options_fill_missing_fields() {
        let options: DrawOptions = serde_json::from_str(r#"{"maxWinners": 4}"#).unwrap();
        assert_eq!(options.emergency_slots, 1);
        assert_eq!(options.guarantee_threshold, 3);
        assert_eq!(options.guarantee_max_count, 2);
        assert_eq!(options.max_winners(), 4);

        let zero = DrawOptions {
            max_winners: 0,
            ..DrawOptions::default()
        };
        assert_eq!(zero.max_winners(), 1);
    }
}
