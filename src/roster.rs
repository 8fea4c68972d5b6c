use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LotteryError, Result};
use crate::lottery::random::random_token;
use crate::lottery::Participant;

const PARTICIPANT_ID_LEN: usize = 16;

/// Participant table. The draw only uses `list` and `bulk_save`.
pub trait RosterStore {
    /// Every participant, in creation order
    fn list(&self) -> Result<Vec<Participant>>;

    /// Writes back draw results. Ids not in the roster are ignored.
    fn bulk_save(&mut self, participants: &[Participant]) -> Result<()>;

    fn create(&mut self, input: NewParticipant) -> Result<Participant>;

    fn update(&mut self, id: &str, changes: ParticipantChanges) -> Result<Participant>;

    fn delete(&mut self, id: &str) -> Result<()>;
}

/// Input for adding a participant
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParticipant {
    pub name: String,
    #[serde(default)]
    pub base_weight: Option<i64>,
}

/// Partial edit of a participant; `None` leaves a field alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantChanges {
    pub name: Option<String>,
    pub base_weight: Option<i64>,
    pub consecutive_misses: Option<i64>,
    pub last_won_at: Option<DateTime<Utc>>,
    pub eligible: Option<bool>,
}

/// One line of the roster file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ParticipantRow {
    id: String,
    name: String,
    base_weight: u32,
    consecutive_misses: u32,
    last_won_at: Option<DateTime<Utc>>,
    eligible: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ParticipantRow {
    fn to_participant(&self) -> Participant {
        Participant {
            id: self.id.clone(),
            name: self.name.clone(),
            base_weight: Some(self.base_weight),
            consecutive_misses: self.consecutive_misses,
            last_won_at: self.last_won_at,
            eligible: Some(self.eligible),
        }
    }
}

fn clamp_base_weight(value: i64) -> u32 {
    value.clamp(1, i64::from(u32::MAX)) as u32
}

fn clamp_misses(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn clean_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LotteryError::InvalidInput("participant name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

/// In-memory roster table shared by both store implementations
#[derive(Debug, Clone, Default)]
struct RosterTable {
    rows: Vec<ParticipantRow>,
}

impl RosterTable {
    fn list(&self) -> Vec<Participant> {
        self.rows.iter().map(ParticipantRow::to_participant).collect()
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut ParticipantRow> {
        self.rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| LotteryError::ParticipantNotFound(id.to_string()))
    }

    fn bulk_save(&mut self, participants: &[Participant]) -> usize {
        let now = Utc::now();
        let mut saved = 0;
        for participant in participants {
            let Some(row) = self.rows.iter_mut().find(|row| row.id == participant.id) else {
                continue;
            };
            row.name = participant.name.clone();
            row.base_weight = participant.base_weight.unwrap_or(1).max(1);
            row.consecutive_misses = participant.consecutive_misses;
            row.last_won_at = participant.last_won_at;
            row.eligible = participant.is_eligible();
            row.updated_at = now;
            saved += 1;
        }
        saved
    }

    fn create(&mut self, input: NewParticipant) -> Result<Participant> {
        let now = Utc::now();
        let row = ParticipantRow {
            id: random_token(PARTICIPANT_ID_LEN),
            name: clean_name(&input.name)?,
            base_weight: clamp_base_weight(input.base_weight.unwrap_or(1)),
            consecutive_misses: 0,
            last_won_at: None,
            eligible: true,
            created_at: now,
            updated_at: now,
        };
        let participant = row.to_participant();
        self.rows.push(row);
        Ok(participant)
    }

    fn update(&mut self, id: &str, changes: ParticipantChanges) -> Result<Participant> {
        let name = changes.name.as_deref().map(clean_name).transpose()?;
        let row = self.find_mut(id)?;

        if let Some(name) = name {
            row.name = name;
        }
        if let Some(weight) = changes.base_weight {
            row.base_weight = clamp_base_weight(weight);
        }
        if let Some(misses) = changes.consecutive_misses {
            row.consecutive_misses = clamp_misses(misses);
        }
        if let Some(last_won_at) = changes.last_won_at {
            row.last_won_at = Some(last_won_at);
        }
        if let Some(eligible) = changes.eligible {
            row.eligible = eligible;
        }
        row.updated_at = Utc::now();
        Ok(row.to_participant())
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        if self.rows.len() == before {
            return Err(LotteryError::ParticipantNotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Roster kept in one CSV file, rewritten on every change
#[derive(Debug)]
pub struct CsvRosterStore {
    path: PathBuf,
    table: RosterTable,
}

impl CsvRosterStore {
    /// Loads the roster at `path`; a missing file is an empty roster
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rows = Vec::new();
        if path.exists() {
            let mut reader = Reader::from_path(&path)?;
            for result in reader.deserialize() {
                let row: ParticipantRow = result?;
                rows.push(row);
            }
        }
        debug!(path = %path.display(), count = rows.len(), "loaded roster");
        Ok(Self {
            path,
            table: RosterTable { rows },
        })
    }

    fn write_table(&self, table: &RosterTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = Writer::from_path(&self.path)?;
        for row in &table.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Applies `change` to a copy of the table and keeps it only once written
    fn commit<T, F>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut RosterTable) -> Result<T>,
    {
        let mut table = self.table.clone();
        let value = change(&mut table)?;
        self.write_table(&table)?;
        self.table = table;
        Ok(value)
    }
}

impl RosterStore for CsvRosterStore {
    fn list(&self) -> Result<Vec<Participant>> {
        Ok(self.table.list())
    }

    fn bulk_save(&mut self, participants: &[Participant]) -> Result<()> {
        let saved = self.commit(|table| Ok(table.bulk_save(participants)))?;
        debug!(saved, "roster saved");
        Ok(())
    }

    fn create(&mut self, input: NewParticipant) -> Result<Participant> {
        self.commit(|table| table.create(input))
    }

    fn update(&mut self, id: &str, changes: ParticipantChanges) -> Result<Participant> {
        self.commit(|table| table.update(id, changes))
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        self.commit(|table| table.delete(id))
    }
}

/// Roster that lives only as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryRosterStore {
    table: RosterTable,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RosterStore for MemoryRosterStore {
    fn list(&self) -> Result<Vec<Participant>> {
        Ok(self.table.list())
    }

    fn bulk_save(&mut self, participants: &[Participant]) -> Result<()> {
        self.table.bulk_save(participants);
        Ok(())
    }

    fn create(&mut self, input: NewParticipant) -> Result<Participant> {
        self.table.create(input)
    }

    fn update(&mut self, id: &str, changes: ParticipantChanges) -> Result<Participant> {
        self.table.update(id, changes)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        self.table.delete(id)
    }
}
