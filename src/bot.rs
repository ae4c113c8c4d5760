//! The bot capability seam.
//!
//! A bot is an opaque participant identified by a unique team name. For
//! each game type there is one capability method; a bot implements the ones
//! it supports and inherits failing defaults for the rest, so an
//! unsupported game simply degrades to move errors (and forfeited matches)
//! for that bot. The engine never mutates bot state and shares bots
//! read-only as `Arc<dyn Bot>` across every tournament in a series.

use crate::cancel::CancelToken;
use crate::game::GameState;

/// Unique, case-sensitive, non-empty bot identifier.
pub type TeamName = String;

/// Capability set consumed by the game executors.
///
/// Every method receives a fresh [`GameState`] snapshot and a cancellation
/// token, and returns the bot's move. Returning an error (or panicking, or
/// blowing the per-call deadline) is scored as a move error against the
/// bot. Implementations that think for a while should poll the token and
/// bail out early when it fires.
pub trait Bot: Send + Sync {
    /// The bot's unique team name.
    fn team_name(&self) -> &str;

    /// RPSLS: one of `rock`, `paper`, `scissors`, `lizard`, `spock`.
    fn throw_sign(&self, _state: &GameState, _cancel: &CancelToken) -> anyhow::Result<String> {
        anyhow::bail!("{} does not play RPSLS", self.team_name())
    }

    /// Colonel Blotto: 100 troops split over 5 battlefields.
    fn deploy_troops(
        &self,
        _state: &GameState,
        _cancel: &CancelToken,
    ) -> anyhow::Result<Vec<u32>> {
        anyhow::bail!("{} does not play ColonelBlotto", self.team_name())
    }

    /// Penalty kicks: a direction, `left`, `center` or `right`. The current
    /// role (`kicker` or `keeper`) is carried in `state.state["role"]`.
    fn pick_direction(&self, _state: &GameState, _cancel: &CancelToken) -> anyhow::Result<String> {
        anyhow::bail!("{} does not play PenaltyKicks", self.team_name())
    }

    /// Security game: a site, `alpha`, `bravo` or `charlie`. The current
    /// role (`attacker` or `defender`) is carried in `state.state["role"]`.
    fn pick_site(&self, _state: &GameState, _cancel: &CancelToken) -> anyhow::Result<String> {
        anyhow::bail!("{} does not play SecurityGame", self.team_name())
    }
}
