use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{LotteryError, Result};
use crate::history::HistoryStore;
use super::base_lottery::run_base_lottery;
use super::emergency::allocate_emergency_winners;
use super::guarantee::allocate_guarantee_winners;
use super::random::{random_token, RandomSource};
use super::types::{
    ChannelWinner, LotteryConfig, LotteryHistoryEntry, LotteryOutcome, Participant, WinnerEntry,
};

const DRAW_ID_LEN: usize = 10;

pub fn generate_draw_id() -> String {
    random_token(DRAW_ID_LEN)
}

/// Runs a full draw: emergency, then guarantee, then weighted lottery.
///
/// Participants marked ineligible are dropped before anything else. The
/// draw can seat every eligible participant; callers that only have a few
/// seats trim the result with [`apply_winner_cap`]. The history entry is
/// appended before the outcome is returned. A failing append comes back as
/// [`LotteryError::Persist`] holding the drawn outcome.
pub fn perform_lottery<H, R>(
    config: &LotteryConfig,
    history: &mut H,
    rng: &mut R,
) -> Result<LotteryOutcome>
where
    H: HistoryStore + ?Sized,
    R: RandomSource + ?Sized,
{
    let policy = config.policy();
    let draw_id = config.draw_id.clone().unwrap_or_else(generate_draw_id);
    let draw_date = config.draw_date.unwrap_or_else(Utc::now);

    let participants: Vec<Participant> = config
        .participants
        .iter()
        .filter(|p| p.is_eligible())
        .cloned()
        .collect();
    let capacity = participants.len();

    let emergency = allocate_emergency_winners(
        &config.emergency_requests,
        &participants,
        policy.emergency_slots.min(capacity),
        &HashSet::new(),
    );
    let capacity_after_emergency = capacity.saturating_sub(emergency.winners.len());

    let guarantee = allocate_guarantee_winners(
        &participants,
        capacity_after_emergency,
        &emergency.used_ids,
        policy.guarantee_threshold,
        policy.guarantee_max_count,
    );

    let lottery = run_base_lottery(
        &participants,
        guarantee.remaining_capacity,
        &guarantee.used_ids,
        rng,
    );

    debug!(
        draw_id = %draw_id,
        emergency = emergency.winners.len(),
        guarantee = guarantee.winners.len(),
        lottery = lottery.winners.len(),
        "channels allocated"
    );

    let winners = with_ranks(
        emergency
            .winners
            .into_iter()
            .chain(guarantee.winners)
            .chain(lottery.winners),
    );
    let missed = lottery.missed;

    let history_entry = build_history_entry(draw_id, draw_date, &winners, &missed);
    let updated_participants = update_participant_stats(&participants, &winners, draw_date);
    let outcome = LotteryOutcome {
        winners,
        missed,
        history_entry,
        updated_participants,
    };

    if let Err(e) = history.append(outcome.history_entry.clone()) {
        warn!(draw_id = %outcome.history_entry.id, error = %e, "draw not recorded in history");
        return Err(LotteryError::persist(outcome, e));
    }

    info!(
        draw_id = %outcome.history_entry.id,
        winners = outcome.winners.len(),
        missed = outcome.missed.len(),
        "lottery draw complete"
    );

    Ok(outcome)
}

/// Numbers winners 1..N in the order given
pub fn with_ranks<I>(winners: I) -> Vec<WinnerEntry>
where
    I: IntoIterator<Item = ChannelWinner>,
{
    winners
        .into_iter()
        .enumerate()
        .map(|(index, winner)| winner.ranked(index + 1))
        .collect()
}

pub fn build_history_entry(
    draw_id: String,
    draw_date: DateTime<Utc>,
    winners: &[WinnerEntry],
    missed: &[Participant],
) -> LotteryHistoryEntry {
    LotteryHistoryEntry {
        id: draw_id,
        date: draw_date,
        winners: winners.to_vec(),
        missed_participant_ids: missed.iter().map(|p| p.id.clone()).collect(),
    }
}

/// New snapshot of `participants` after a draw: winners get their streak
/// reset and `last_won_at` set, everyone else one more miss.
pub fn update_participant_stats(
    participants: &[Participant],
    winners: &[WinnerEntry],
    draw_date: DateTime<Utc>,
) -> Vec<Participant> {
    let winner_ids: HashSet<&str> = winners.iter().map(|w| w.participant_id.as_str()).collect();
    participants
        .iter()
        .map(|p| {
            let mut next = p.clone();
            if winner_ids.contains(p.id.as_str()) {
                next.consecutive_misses = 0;
                next.last_won_at = Some(draw_date);
            } else {
                next.consecutive_misses = p.consecutive_misses.saturating_add(1);
            }
            next
        })
        .collect()
}

/// Keeps only the first `max_winners` seats (at least one) of a draw.
///
/// `pool` is the participant list the draw ran on; ineligible entries are
/// ignored. Missed participants, the stat snapshot and the history entry are
/// all rebuilt against the trimmed winner list.
pub fn apply_winner_cap(
    outcome: LotteryOutcome,
    pool: &[Participant],
    max_winners: usize,
) -> LotteryOutcome {
    let max_winners = max_winners.max(1);
    if outcome.winners.len() <= max_winners {
        return outcome;
    }

    let eligible: Vec<Participant> = pool.iter().filter(|p| p.is_eligible()).cloned().collect();
    let mut winners = outcome.winners;
    winners.truncate(max_winners);

    let winner_ids: HashSet<&str> = winners.iter().map(|w| w.participant_id.as_str()).collect();
    let missed: Vec<Participant> = eligible
        .iter()
        .filter(|p| !winner_ids.contains(p.id.as_str()))
        .cloned()
        .collect();

    let draw_date = outcome.history_entry.date;
    let updated_participants = update_participant_stats(&eligible, &winners, draw_date);
    let history_entry = build_history_entry(outcome.history_entry.id, draw_date, &winners, &missed);

    LotteryOutcome {
        winners,
        missed,
        history_entry,
        updated_participants,
    }
}
