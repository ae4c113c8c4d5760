//! Core match data model and the game-executor seam.
//!
//! A [`GameExecutor`] plays one match between two bots and reports a
//! [`MatchResult`]. Executors are registered in an [`ExecutorRegistry`]
//! keyed by the closed [`GameType`] enumeration; the engine itself knows
//! nothing about any game's rules beyond the executor contract.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::bot::{Bot, TeamName};
use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::games;

/// The closed set of supported game types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GameType {
    /// Rock-paper-scissors-lizard-spock, best of `max_rounds_rpsls` rounds.
    #[serde(rename = "RPSLS")]
    Rpsls,
    /// Colonel Blotto: one allocation of 100 troops over 5 battlefields.
    ColonelBlotto,
    /// Penalty shoot-out with alternating kicker/keeper roles.
    PenaltyKicks,
    /// Patrol-versus-intrusion game with alternating attacker/defender roles.
    SecurityGame,
}

impl GameType {
    /// All game types, in the default series order.
    pub const ALL: [GameType; 4] = [
        GameType::Rpsls,
        GameType::ColonelBlotto,
        GameType::PenaltyKicks,
        GameType::SecurityGame,
    ];
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            GameType::Rpsls => "RPSLS",
            GameType::ColonelBlotto => "ColonelBlotto",
            GameType::PenaltyKicks => "PenaltyKicks",
            GameType::SecurityGame => "SecurityGame",
        };
        write!(f, "{token}")
    }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "RPSLS" => Ok(GameType::Rpsls),
            "ColonelBlotto" => Ok(GameType::ColonelBlotto),
            "PenaltyKicks" => Ok(GameType::PenaltyKicks),
            "SecurityGame" => Ok(GameType::SecurityGame),
            other => Err(format!("unknown game type '{other}'")),
        }
    }
}

/// Immutable per-call snapshot handed to a bot for a single move.
///
/// The engine constructs a fresh `GameState` for every bot invocation, with
/// the histories rewritten from that bot's perspective.
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    /// Which game is being played.
    pub game_type: GameType,
    /// 1-indexed round currently being played.
    pub current_round: u32,
    /// Total number of rounds in this match.
    pub max_rounds: u32,
    /// True once the match has been decided.
    pub is_game_over: bool,
    /// All moves so far, both bots interleaved in play order.
    pub move_history: Vec<String>,
    /// Moves made by the bot receiving this snapshot.
    pub my_move_history: Vec<String>,
    /// Moves made by the opponent.
    pub opponent_move_history: Vec<String>,
    /// Free-form per-game data, e.g. role assignment.
    pub state: HashMap<String, serde_json::Value>,
}

impl GameState {
    /// A blank round-1 snapshot for the given game.
    pub fn new(game_type: GameType, max_rounds: u32) -> Self {
        GameState {
            game_type,
            current_round: 1,
            max_rounds,
            is_game_over: false,
            move_history: Vec::new(),
            my_move_history: Vec::new(),
            opponent_move_history: Vec::new(),
            state: HashMap::new(),
        }
    }
}

/// Final classification of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Bot 1 won on the game's own terms.
    Player1Wins,
    /// Bot 2 won on the game's own terms.
    Player2Wins,
    /// Neither bot won.
    Draw,
    /// Bot 1 erred (timeout, fault, or invalid move); bot 2 takes the match.
    Player1Error,
    /// Bot 2 erred; bot 1 takes the match.
    Player2Error,
    /// Both bots erred in the same round.
    BothError,
    /// The match produced no usable result (cancelled or no executor).
    Unknown,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything the engine records about one finished match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    /// Process-unique identifier, used for scoring idempotency.
    pub match_id: u64,
    /// Team playing slot 1.
    pub bot1_name: TeamName,
    /// Team playing slot 2.
    pub bot2_name: TeamName,
    /// The game that was played.
    pub game_type: GameType,
    /// Final classification.
    pub outcome: Outcome,
    /// Winning team, or empty on draw / both-error / unknown.
    pub winner_name: TeamName,
    /// Game-internal score for bot 1 (round wins, goals, fields won, ...).
    pub bot1_score: u32,
    /// Game-internal score for bot 2.
    pub bot2_score: u32,
    /// Round-by-round narrative.
    pub match_log: Vec<String>,
    /// Errors observed during the match, in order. Timeouts contribute the
    /// literal token `"timeout"`; cancellation contributes `"cancelled"`.
    pub errors: Vec<String>,
    /// Wall-clock match start.
    pub start_time: OffsetDateTime,
    /// Wall-clock match end.
    pub end_time: OffsetDateTime,
    /// `end_time - start_time`.
    pub duration: Duration,
}

impl MatchResult {
    /// True if `errors` records a timeout.
    pub fn had_timeout(&self) -> bool {
        self.errors.iter().any(|e| e == "timeout")
    }
}

/// A strategy that plays one complete match between two bots.
///
/// Implementations must honor the error taxonomy (bot faults become
/// `Player1Error`/`Player2Error`/`BothError`, never a panic), observe the
/// cancellation token at every suspension point, and return within a
/// wall-clock bound on the order of `max_rounds × move_timeout`.
pub trait GameExecutor: Send + Sync {
    /// The game this executor implements.
    fn game_type(&self) -> GameType;

    /// Plays one match and always returns a result.
    fn execute(
        &self,
        bot1: Arc<dyn Bot>,
        bot2: Arc<dyn Bot>,
        config: &TournamentConfig,
        cancel: &CancelToken,
    ) -> MatchResult;
}

/// Game-type keyed executor lookup. Built once, then read-only.
pub struct ExecutorRegistry {
    executors: HashMap<GameType, Box<dyn GameExecutor>>,
}

impl ExecutorRegistry {
    /// An empty registry. Useful for tests that plug in custom executors.
    pub fn new() -> Self {
        ExecutorRegistry {
            executors: HashMap::new(),
        }
    }

    /// A registry with all four built-in executors registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(games::rpsls::RpslsExecutor));
        registry.register(Box::new(games::blotto::BlottoExecutor));
        registry.register(Box::new(games::penalty::PenaltyExecutor));
        registry.register(Box::new(games::security::SecurityExecutor));
        registry
    }

    /// Registers an executor under its own game type, replacing any previous
    /// registration for that type.
    pub fn register(&mut self, executor: Box<dyn GameExecutor>) {
        self.executors.insert(executor.game_type(), executor);
    }

    /// Looks up the executor for a game type.
    pub fn get(&self, game_type: GameType) -> Option<&dyn GameExecutor> {
        self.executors.get(&game_type).map(Box::as_ref)
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
