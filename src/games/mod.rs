//! Built-in game executors.
//!
//! Each executor drives one match between two bots: it builds a fresh
//! per-perspective [`GameState`] for every invocation, requests both bots'
//! moves through the match runner's deadline helper, stops at the first
//! round containing a move error, and reports through the uniform
//! [`MatchRecorder`](crate::match_runner::MatchRecorder) bookkeeping.

pub mod blotto;
pub mod penalty;
pub mod rpsls;
pub mod security;

use serde_json::json;

use crate::game::{GameState, GameType};
use crate::match_runner::{MoveError, Slot};

/// Builds the snapshot handed to the bot occupying `my_slot` for `round`.
///
/// `moves1`/`moves2` are the full per-slot histories so far; the global
/// `move_history` interleaves them in play order (slot 1 first each round).
pub(crate) fn snapshot(
    game_type: GameType,
    round: u32,
    max_rounds: u32,
    moves1: &[String],
    moves2: &[String],
    my_slot: Slot,
    role: Option<&str>,
) -> GameState {
    let mut state = GameState::new(game_type, max_rounds);
    state.current_round = round;
    for i in 0..moves1.len().max(moves2.len()) {
        if let Some(m) = moves1.get(i) {
            state.move_history.push(m.clone());
        }
        if let Some(m) = moves2.get(i) {
            state.move_history.push(m.clone());
        }
    }
    let (mine, theirs) = match my_slot {
        Slot::One => (moves1, moves2),
        Slot::Two => (moves2, moves1),
    };
    state.my_move_history = mine.to_vec();
    state.opponent_move_history = theirs.to_vec();
    if let Some(role) = role {
        state.state.insert("role".to_owned(), json!(role));
    }
    state
}

/// Normalizes a raw string move and checks it against the allowed tokens.
/// Empty and unrecognized moves are move errors, same as timeouts.
pub(crate) fn normalize_token(raw: String, allowed: &[&str]) -> Result<String, MoveError> {
    let token = raw.trim().to_lowercase();
    if token.is_empty() {
        return Err(MoveError::Fault("empty move".to_owned()));
    }
    if !allowed.contains(&token.as_str()) {
        return Err(MoveError::Fault(format!("invalid move '{token}'")));
    }
    Ok(token)
}
