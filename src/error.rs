//! Engine error taxonomy.
//!
//! Bot faults and publisher faults never show up here: they are absorbed at
//! the point of occurrence and recorded in match results or logs. These
//! enums cover the two kinds of failure that do reach callers: rejected
//! operator commands (state unchanged) and scorer misuse (programmer error).

use thiserror::Error;

use crate::manager::TournamentState;

/// Why an operator command was rejected. The tournament or series state is
/// left unchanged whenever one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// `start` was issued with fewer than two bots.
    #[error("cannot start with {have} bot(s); at least 2 are required")]
    InsufficientBots {
        /// Number of bots that were actually supplied.
        have: usize,
    },

    /// The command is not allowed in the current lifecycle state.
    #[error("'{command}' is not allowed while {state}")]
    IllegalTransition {
        /// The rejected command.
        command: &'static str,
        /// The state the machine was in when the command arrived.
        state: TournamentState,
    },

    /// A series-level command arrived while the series pipeline was in an
    /// incompatible status.
    #[error("'{command}' is not allowed while the series is {status}")]
    SeriesBusy {
        /// The rejected command.
        command: &'static str,
        /// Current series status, rendered for the operator.
        status: String,
    },
}

/// Scorer contract violations. These indicate engine misuse and are
/// propagated to the caller rather than absorbed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoringError {
    /// A match result with `Outcome::Unknown` was handed to the scorer.
    #[error("cannot score a match with an unknown outcome")]
    InvalidOutcome,

    /// The same match was applied to the standings twice.
    #[error("match {0} was already applied to the standings")]
    DuplicateMatch(u64),
}
