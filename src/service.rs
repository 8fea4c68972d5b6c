use tracing::{info, warn};

use crate::config::DrawOptions;
use crate::error::{LotteryError, Result};
use crate::history::HistoryStore;
use crate::lottery::{
    apply_winner_cap, perform_lottery, LotteryHistoryEntry, LotteryOutcome, Participant,
    RandomSource,
};
use crate::requests::RequestQueue;
use crate::roster::RosterStore;

/// Participants taking part in a draw. With no selection, every eligible
/// roster member; otherwise the selected ids that exist in the roster.
pub fn select_active(roster: &[Participant], selected_ids: Option<&[String]>) -> Vec<Participant> {
    match selected_ids {
        Some(ids) => roster
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect(),
        None => roster.iter().filter(|p| p.is_eligible()).cloned().collect(),
    }
}

/// Stores `entry` in history, replacing an entry with the same draw id.
/// Nothing is written when the stored entry is already identical.
fn record_history_entry<H>(history: &mut H, entry: &LotteryHistoryEntry) -> Result<()>
where
    H: HistoryStore + ?Sized,
{
    let mut entries = history.read()?;
    match entries.iter_mut().find(|e| e.id == entry.id) {
        Some(stored) if stored == entry => Ok(()),
        Some(stored) => {
            *stored = entry.clone();
            history.write(&entries)
        }
        None => history.append(entry.clone()),
    }
}

/// Writes a drawn outcome to history, roster and request queue.
///
/// Safe to call again with the same outcome after a failure: the history
/// entry is keyed by draw id, the roster snapshot overwrites and consumed
/// requests are already gone.
pub fn persist_outcome<S, H>(
    outcome: &LotteryOutcome,
    roster: &mut S,
    requests: &mut RequestQueue,
    history: &mut H,
) -> Result<()>
where
    S: RosterStore + ?Sized,
    H: HistoryStore + ?Sized,
{
    record_history_entry(history, &outcome.history_entry)?;
    roster.bulk_save(&outcome.updated_participants)?;
    requests.remove_consumed(&outcome.winners)?;
    Ok(())
}

/// Runs and records a draw.
///
/// Once winners are drawn, any failing write comes back as
/// [`LotteryError::Persist`] carrying the capped outcome; hand that to
/// [`persist_outcome`] to retry. The draw itself is never repeated.
pub fn run_draw<S, H, R>(
    roster: &mut S,
    requests: &mut RequestQueue,
    history: &mut H,
    rng: &mut R,
    options: &DrawOptions,
    selected_ids: Option<&[String]>,
) -> Result<LotteryOutcome>
where
    S: RosterStore + ?Sized,
    H: HistoryStore + ?Sized,
    R: RandomSource + ?Sized,
{
    let all = roster.list()?;
    let active = select_active(&all, selected_ids);
    let active_ids: Vec<String> = active.iter().map(|p| p.id.clone()).collect();
    let applicable_requests = requests.for_participants(&active_ids);

    info!(
        participants = active.len(),
        requests = applicable_requests.len(),
        max_winners = options.max_winners(),
        "starting draw"
    );

    let config = options.to_lottery_config(active.clone(), applicable_requests);
    // A failed append still yields the drawn outcome; persist_outcome retries it
    let outcome = match perform_lottery(&config, &mut *history, &mut *rng) {
        Ok(outcome) => outcome,
        Err(e) => e.into_unsaved_outcome()?,
    };
    let outcome = apply_winner_cap(outcome, &active, options.max_winners());

    if let Err(e) = persist_outcome(&outcome, &mut *roster, &mut *requests, &mut *history) {
        warn!(draw_id = %outcome.history_entry.id, error = %e, "draw outcome not fully saved");
        return Err(LotteryError::persist(outcome, e));
    }
    Ok(outcome)
}
