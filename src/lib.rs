//! # Bot Arena
//!
//! A tournament orchestration engine for head-to-head bot competitions:
//! untrusted bot code is executed under per-call deadlines and cooperative
//! cancellation, matches are scheduled through a group stage and knockout
//! bracket with bounded parallelism, and scoring, rankings and lifecycle
//! events stream to subscribers.
//!
//! It provides:
//! - Match execution with a uniform error taxonomy ([`match_runner`])
//! - Four built-in game executors behind a closed registry ([`games`],
//!   [`game::ExecutorRegistry`])
//! - Deterministic scoring and multi-key rankings ([`scoring`])
//! - A group-stage → knockout engine ([`engine`], [`schedule`])
//! - A per-tournament lifecycle state machine with pause/resume/stop
//!   ([`manager`])
//! - A multi-event series pipeline with cumulative standings ([`series`])
//! - A pluggable event publisher capability set ([`publisher`])
//!
//! Bots are opaque: anything implementing [`bot::Bot`] can enter. The
//! engine shares them read-only across every tournament in a series and
//! never trusts them further than one move call at a time.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bot_arena::prelude::*;
//!
//! struct AlwaysRock {
//!     name: String,
//! }
//!
//! impl Bot for AlwaysRock {
//!     fn team_name(&self) -> &str {
//!         &self.name
//!     }
//!
//!     fn throw_sign(&self, _state: &GameState, _cancel: &CancelToken) -> anyhow::Result<String> {
//!         Ok("rock".to_owned())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(
//!         TournamentConfig::builder()
//!             .with_games(vec![GameType::Rpsls])
//!             .with_move_timeout(Duration::from_millis(500))
//!             .with_max_parallel_matches(2)
//!             .build()?,
//!     );
//!
//!     let roster: Vec<Arc<dyn Bot>> = (1..=4)
//!         .map(|i| {
//!             Arc::new(AlwaysRock {
//!                 name: format!("Team{i}"),
//!             }) as Arc<dyn Bot>
//!         })
//!         .collect();
//!
//!     let series = SeriesManager::new(
//!         "arena-open",
//!         roster,
//!         Arc::new(ExecutorRegistry::with_builtin()),
//!         Arc::new(NoOpPublisher),
//!         config,
//!         ManagerSettings::default(),
//!     );
//!
//!     series.start()?;
//!     series.wait();
//!     for entry in series.standings() {
//!         println!("{}. {} - {}", entry.rank, entry.team_name, entry.cumulative_score);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Operator commands
//!
//! While a series or tournament runs, `pause`, `resume`, `stop`, `rerun`
//! and `clear` are accepted according to the lifecycle state machine; a
//! rejected command returns a
//! [`CommandError`](crate::error::CommandError) and changes nothing.
//! Cancellation is hierarchical (series → tournament → match → bot call)
//! and always cooperative: a bot that ignores it is abandoned at its
//! per-call deadline, never killed.
#![warn(missing_docs)]

pub use anyhow;

pub mod bot;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod games;
pub mod logger;
pub mod manager;
pub mod match_runner;
pub mod publisher;
pub mod schedule;
pub mod scoring;
pub mod series;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use bot_arena::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bot::{Bot, TeamName};
    pub use crate::cancel::CancelToken;
    pub use crate::config::{ManagerSettings, TournamentConfig, TournamentConfigBuilder};
    pub use crate::game::{ExecutorRegistry, GameState, GameType, MatchResult, Outcome};
    pub use crate::manager::{TournamentManager, TournamentState};
    pub use crate::publisher::{NoOpPublisher, Publisher};
    pub use crate::series::{SeriesManager, SeriesStatus};
}
