//! Event publishing seam.
//!
//! The core emits progress through a single capability set; transports
//! (websocket, SSE, HTTP, logs) are peer implementations of [`Publisher`].
//! Every method defaults to a no-op, so [`NoOpPublisher`] is just the empty
//! impl. The core always mutates its own state first and publishes after,
//! through [`emit`], which logs and swallows publisher faults; a broken
//! dashboard must never abort a tournament.

use serde::Serialize;
use tracing::warn;

use crate::bot::TeamName;
use crate::engine::RoundPhase;
use crate::game::{GameType, MatchResult};
use crate::manager::TournamentState;
use crate::scoring::RankedStanding;
use crate::series::{SeriesSnapshot, SeriesStandingEntry};

/// A match finished and was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCompleted {
    /// Owning tournament.
    pub tournament_id: String,
    /// The full recorded result.
    pub result: MatchResult,
}

/// Standings changed after a round of results.
#[derive(Debug, Clone, Serialize)]
pub struct StandingsUpdated {
    /// Owning tournament.
    pub tournament_id: String,
    /// Fresh rankings snapshot, best first.
    pub rankings: Vec<RankedStanding>,
}

/// A round batch is about to dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct RoundStarted {
    /// Owning tournament.
    pub tournament_id: String,
    /// 1-indexed round number within the tournament.
    pub round: u32,
    /// Group stage or knockout.
    pub phase: RoundPhase,
    /// Matches in the batch.
    pub match_count: usize,
}

/// A series began running.
#[derive(Debug, Clone, Serialize)]
pub struct EventStarted {
    /// The series.
    pub series_name: String,
    /// Planned event steps, in order.
    pub games: Vec<GameType>,
}

/// A series finished (all steps completed, or the pipeline stopped).
#[derive(Debug, Clone, Serialize)]
pub struct EventCompleted {
    /// The series.
    pub series_name: String,
    /// Final cumulative standings.
    pub standings: Vec<SeriesStandingEntry>,
}

/// One event step (tournament) of a series finished.
#[derive(Debug, Clone, Serialize)]
pub struct EventStepCompleted {
    /// The series.
    pub series_name: String,
    /// 1-indexed step.
    pub step_index: usize,
    /// The step's game.
    pub game_type: GameType,
    /// Cumulative standings after folding in this step.
    pub standings: Vec<SeriesStandingEntry>,
}

/// A tournament left `NotStarted`.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentStarted {
    /// The tournament.
    pub tournament_id: String,
    /// Its game.
    pub game_type: GameType,
    /// Participating teams.
    pub bots: Vec<TeamName>,
}

/// Periodic progress tick (scheduled-start countdown and similar).
#[derive(Debug, Clone, Serialize)]
pub struct TournamentProgress {
    /// The series emitting the tick.
    pub series_name: String,
    /// Operator-readable progress line.
    pub message: String,
}

/// A tournament reached a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentCompleted {
    /// The tournament.
    pub tournament_id: String,
    /// Its game.
    pub game_type: GameType,
    /// `Completed` or `Aborted`.
    pub state: TournamentState,
    /// Final rankings (partial when aborted).
    pub rankings: Vec<RankedStanding>,
}

/// Capability set consumed by the engine. All payloads are owned values;
/// implementations may serialize them in any format. Every method defaults
/// to doing nothing and reporting success.
#[allow(unused_variables)]
pub trait Publisher: Send + Sync {
    /// A match finished and was recorded.
    fn publish_match_completed(&self, event: &MatchCompleted) -> anyhow::Result<()> {
        Ok(())
    }

    /// Standings changed.
    fn publish_standings_updated(&self, event: &StandingsUpdated) -> anyhow::Result<()> {
        Ok(())
    }

    /// A round batch is about to dispatch.
    fn publish_round_started(&self, event: &RoundStarted) -> anyhow::Result<()> {
        Ok(())
    }

    /// A series began running.
    fn publish_event_started(&self, event: &EventStarted) -> anyhow::Result<()> {
        Ok(())
    }

    /// A series finished.
    fn publish_event_completed(&self, event: &EventCompleted) -> anyhow::Result<()> {
        Ok(())
    }

    /// One series step finished.
    fn publish_event_step_completed(&self, event: &EventStepCompleted) -> anyhow::Result<()> {
        Ok(())
    }

    /// A tournament started.
    fn publish_tournament_started(&self, event: &TournamentStarted) -> anyhow::Result<()> {
        Ok(())
    }

    /// Periodic progress tick.
    fn publish_tournament_progress_updated(
        &self,
        event: &TournamentProgress,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// A tournament reached a terminal state.
    fn publish_tournament_completed(&self, event: &TournamentCompleted) -> anyhow::Result<()> {
        Ok(())
    }

    /// Full series state snapshot for late joiners.
    fn update_current_state(&self, snapshot: &SeriesSnapshot) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The default publisher: accepts everything, tells no one.
pub struct NoOpPublisher;

impl Publisher for NoOpPublisher {}

/// Runs one publisher call, logging and swallowing any fault.
pub(crate) fn emit(label: &str, call: impl FnOnce() -> anyhow::Result<()>) {
    if let Err(error) = call() {
        warn!("publisher fault on {label}: {error:#}");
    }
}
