use std::io::{self, BufRead, Write};

use draw_core::{ConfirmRequest, OperatorPrompt};
use shared::{domain::PrizeRecord, protocol::RevealedSlot};
use tracing::warn;

/// Asks on stdin. `assume_yes` answers every question without reading.
pub struct StdinPrompt {
    assume_yes: bool,
}

impl StdinPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    /// Blocks until the operator presses Enter, unless running with `--yes`.
    pub fn wait_for_enter(&self, message: &str) {
        if self.assume_yes {
            return;
        }
        print!("{message} ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if let Err(err) = io::stdin().lock().read_line(&mut line) {
            warn!("failed to read from stdin: {err}");
        }
    }
}

impl OperatorPrompt for StdinPrompt {
    fn confirm(&self, request: ConfirmRequest) -> bool {
        println!("{}", request.title());
        println!("{}", request.message());
        if self.assume_yes {
            println!("(answered yes by --yes)");
            return true;
        }

        print!("Continue? [y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => parse_answer(&line),
            Err(err) => {
                warn!("failed to read confirmation: {err}");
                false
            }
        }
    }
}

pub fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn format_slot(slot: &RevealedSlot) -> String {
    format!("{:<22} {}", slot.label, slot.coupon_number)
}

pub fn format_record(record: &PrizeRecord) -> String {
    format!(
        "{:<16} {:<22} {:<10} {:<10} {}",
        record.event_name,
        record.prize_type_label,
        record.coupon_number,
        record.run_user_id,
        record.run_at.format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
