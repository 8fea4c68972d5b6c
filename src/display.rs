use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::lottery::{Channel, LotteryHistoryEntry, LotteryOutcome, WinnerEntry};

/// Label shown next to a winner
pub fn channel_label(channel: Channel) -> &'static str {
    match channel {
        Channel::Emergency => "EMERGENCY",
        Channel::Guarantee => "GUARANTEE",
        Channel::Lottery => "LOTTERY",
    }
}

/// Formats a winner line: `#rank name [CHANNEL]`
pub fn format_winner(winner: &WinnerEntry) -> String {
    format!(
        "#{} {} [{}]",
        winner.rank,
        winner.participant_name,
        channel_label(winner.channel)
    )
}

fn outcome_lines(outcome: &LotteryOutcome) -> Vec<String> {
    let entry = &outcome.history_entry;
    let mut lines = vec![format!(
        "** Draw {} ({}) **",
        entry.id,
        entry.date.format("%Y-%m-%d %H:%M UTC")
    )];

    if outcome.winners.is_empty() {
        lines.push("No winners".to_string());
    }
    lines.extend(outcome.winners.iter().map(format_winner));

    if outcome.missed.is_empty() {
        lines.push("Missed: none, everyone is seated".to_string());
    } else {
        let names: Vec<&str> = outcome.missed.iter().map(|p| p.name.as_str()).collect();
        lines.push(format!("Missed: {}", names.join(", ")));
    }
    lines
}

/// Prints a draw outcome in a readable format
pub fn print_outcome(outcome: &LotteryOutcome) {
    println!();
    for line in outcome_lines(outcome) {
        println!("  {}", line);
    }
}

/// Writes a draw outcome to a file, one line per winner
pub fn write_outcome_to_file<P: AsRef<Path>>(
    outcome: &LotteryOutcome,
    path: P,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = File::create(path)?;
    for line in outcome_lines(outcome) {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// Prints stored draws, most recent first
pub fn print_history(entries: &[LotteryHistoryEntry]) {
    println!("\n=== Draw History ({} draws) ===", entries.len());
    for entry in entries {
        let winners: Vec<String> = entry.winners.iter().map(format_winner).collect();
        println!(
            "  {} {} -> {} (missed: {})",
            entry.date.format("%Y-%m-%d %H:%M"),
            entry.id,
            if winners.is_empty() {
                "-".to_string()
            } else {
                winners.join(", ")
            },
            entry.missed_participant_ids.len()
        );
    }
}
