pub mod types;
pub mod weight;
pub mod random;
pub mod emergency;
pub mod guarantee;
pub mod base_lottery;
pub mod orchestrator;

pub use types::{
    Channel, EmergencyRequest, LotteryConfig, LotteryHistoryEntry, LotteryOutcome, Participant,
    WinnerEntry,
};
pub use weight::ticket_count;
pub use random::{RandomSource, SeededRandom, SequenceRandom, ThreadRandom};
pub use orchestrator::{apply_winner_cap, perform_lottery, update_participant_stats};
