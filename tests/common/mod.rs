//! Shared bots, executors and publishers for the integration suites.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bot_arena::game::{GameExecutor, MatchResult};
use bot_arena::prelude::*;
use bot_arena::publisher::{
    MatchCompleted, RoundStarted, StandingsUpdated, TournamentCompleted, TournamentProgress,
};
use time::OffsetDateTime;

/// A well-behaved bot that plays the same fixed, valid move in every game.
pub struct SteadyBot {
    pub name: String,
    pub sign: &'static str,
}

impl SteadyBot {
    pub fn new(name: impl Into<String>) -> Self {
        SteadyBot {
            name: name.into(),
            sign: "rock",
        }
    }

    pub fn with_sign(name: impl Into<String>, sign: &'static str) -> Arc<dyn Bot> {
        Arc::new(SteadyBot {
            name: name.into(),
            sign,
        })
    }
}

impl Bot for SteadyBot {
    fn team_name(&self) -> &str {
        &self.name
    }

    fn throw_sign(&self, _: &GameState, _: &CancelToken) -> anyhow::Result<String> {
        Ok(self.sign.to_owned())
    }

    fn deploy_troops(&self, _: &GameState, _: &CancelToken) -> anyhow::Result<Vec<u32>> {
        Ok(vec![20, 20, 20, 20, 20])
    }

    fn pick_direction(&self, _: &GameState, _: &CancelToken) -> anyhow::Result<String> {
        Ok("left".to_owned())
    }

    fn pick_site(&self, _: &GameState, _: &CancelToken) -> anyhow::Result<String> {
        Ok("alpha".to_owned())
    }
}

/// Sleeps through every move, ignoring cancellation.
pub struct SleepyBot {
    pub name: String,
    pub delay: Duration,
}

impl Bot for SleepyBot {
    fn team_name(&self) -> &str {
        &self.name
    }

    fn throw_sign(&self, _: &GameState, _: &CancelToken) -> anyhow::Result<String> {
        std::thread::sleep(self.delay);
        Ok("rock".to_owned())
    }
}

/// Declares a team name and nothing else; every capability call fails.
pub struct FaultyBot(pub &'static str);

impl Bot for FaultyBot {
    fn team_name(&self) -> &str {
        self.0
    }
}

static TABLE_IDS: AtomicU64 = AtomicU64::new(1_000_000);

/// An executor that answers from a fixed outcome table instead of playing,
/// optionally sleeping to give matches measurable duration.
pub struct TableExecutor {
    pub game: GameType,
    pub outcomes: HashMap<(String, String), Outcome>,
    pub delay: Duration,
}

impl TableExecutor {
    pub fn new(game: GameType, table: &[(&str, &str, Outcome)]) -> Self {
        TableExecutor {
            game,
            outcomes: table
                .iter()
                .map(|(a, b, outcome)| (((*a).to_owned(), (*b).to_owned()), *outcome))
                .collect(),
            delay: Duration::ZERO,
        }
    }

    fn lookup(&self, bot1: &str, bot2: &str) -> Outcome {
        if let Some(outcome) = self.outcomes.get(&(bot1.to_owned(), bot2.to_owned())) {
            return *outcome;
        }
        if let Some(outcome) = self.outcomes.get(&(bot2.to_owned(), bot1.to_owned())) {
            // The table listed the pair the other way round; mirror it.
            return match outcome {
                Outcome::Player1Wins => Outcome::Player2Wins,
                Outcome::Player2Wins => Outcome::Player1Wins,
                Outcome::Player1Error => Outcome::Player2Error,
                Outcome::Player2Error => Outcome::Player1Error,
                other => *other,
            };
        }
        Outcome::Draw
    }
}

impl GameExecutor for TableExecutor {
    fn game_type(&self) -> GameType {
        self.game
    }

    fn execute(
        &self,
        bot1: Arc<dyn Bot>,
        bot2: Arc<dyn Bot>,
        _config: &TournamentConfig,
        cancel: &CancelToken,
    ) -> MatchResult {
        let start_time = OffsetDateTime::now_utc();
        let started = std::time::Instant::now();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let (outcome, errors) = if cancel.is_cancelled() {
            (Outcome::Unknown, vec!["cancelled".to_owned()])
        } else {
            (self.lookup(bot1.team_name(), bot2.team_name()), vec![])
        };
        let winner_name = match outcome {
            Outcome::Player1Wins | Outcome::Player2Error => bot1.team_name().to_owned(),
            Outcome::Player2Wins | Outcome::Player1Error => bot2.team_name().to_owned(),
            _ => String::new(),
        };
        MatchResult {
            match_id: TABLE_IDS.fetch_add(1, Ordering::Relaxed),
            bot1_name: bot1.team_name().to_owned(),
            bot2_name: bot2.team_name().to_owned(),
            game_type: self.game,
            outcome,
            winner_name,
            bot1_score: 0,
            bot2_score: 0,
            match_log: vec![],
            errors,
            start_time,
            end_time: OffsetDateTime::now_utc(),
            duration: started.elapsed(),
        }
    }
}

/// An executor that records how many matches run concurrently.
pub struct CountingExecutor {
    pub game: GameType,
    pub active: Arc<AtomicUsize>,
    pub max_seen: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl GameExecutor for CountingExecutor {
    fn game_type(&self) -> GameType {
        self.game
    }

    fn execute(
        &self,
        bot1: Arc<dyn Bot>,
        bot2: Arc<dyn Bot>,
        config: &TournamentConfig,
        cancel: &CancelToken,
    ) -> MatchResult {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);
        TableExecutor::new(self.game, &[]).execute(bot1, bot2, config, cancel)
    }
}

/// Everything the engine published, in emission order.
#[derive(Debug, Clone)]
pub enum Seen {
    Round { number: u32, match_count: usize },
    Match(MatchResult),
    Standings,
    Progress(String),
    TournamentDone(TournamentState),
}

/// A publisher that records the event stream for assertions.
#[derive(Default)]
pub struct CollectingPublisher {
    pub seen: Mutex<Vec<Seen>>,
}

impl CollectingPublisher {
    pub fn events(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn push(&self, event: Seen) {
        self.seen.lock().unwrap().push(event);
    }
}

impl Publisher for CollectingPublisher {
    fn publish_round_started(&self, event: &RoundStarted) -> anyhow::Result<()> {
        self.push(Seen::Round {
            number: event.round,
            match_count: event.match_count,
        });
        Ok(())
    }

    fn publish_match_completed(&self, event: &MatchCompleted) -> anyhow::Result<()> {
        self.push(Seen::Match(event.result.clone()));
        Ok(())
    }

    fn publish_standings_updated(&self, _event: &StandingsUpdated) -> anyhow::Result<()> {
        self.push(Seen::Standings);
        Ok(())
    }

    fn publish_tournament_progress_updated(
        &self,
        event: &TournamentProgress,
    ) -> anyhow::Result<()> {
        self.push(Seen::Progress(event.message.clone()));
        Ok(())
    }

    fn publish_tournament_completed(&self, event: &TournamentCompleted) -> anyhow::Result<()> {
        self.push(Seen::TournamentDone(event.state));
        Ok(())
    }
}

/// Polls until `predicate` holds or the deadline passes.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}
