//! Uniform match execution.
//!
//! [`run_match`] is the single entry point the dispatcher uses: it resolves
//! the executor for the requested game type and guarantees a [`MatchResult`]
//! comes back no matter what the bots do. The per-call deadline policy
//! ([`timed_call`]) and the error bookkeeping ([`MatchRecorder`]) live here
//! so every executor applies the same taxonomy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tracing::{trace, warn};

use crate::bot::{Bot, TeamName};
use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::game::{ExecutorRegistry, GameType, MatchResult, Outcome};

static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Which side of the match a bot plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Bot 1.
    One,
    /// Bot 2.
    Two,
}

/// How a single bot invocation failed.
#[derive(Debug)]
pub(crate) enum MoveError {
    /// The bot did not answer within the per-call deadline.
    Timeout,
    /// The caller's cancellation fired while waiting on the bot.
    Cancelled,
    /// The bot returned an error, panicked, or produced an invalid move.
    Fault(String),
}

/// Runs `call` on a helper thread and waits at most `timeout` for the
/// answer, polling `cancel` while waiting.
///
/// A bot that ignores cancellation is simply abandoned once the deadline
/// passes; its thread finishes on its own and the late answer is dropped.
pub(crate) fn timed_call<T: Send + 'static>(
    timeout: Duration,
    cancel: &CancelToken,
    call: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
) -> Result<T, MoveError> {
    if cancel.is_cancelled() {
        return Err(MoveError::Cancelled);
    }

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        // The receiver may be long gone by the time a slow bot answers.
        let _ = tx.send(call());
    });

    const POLL: Duration = Duration::from_millis(10);
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(MoveError::Timeout);
        }
        match rx.recv_timeout(remaining.min(POLL)) {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => return Err(MoveError::Fault(e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    return Err(MoveError::Cancelled);
                }
            }
            // The sender is dropped without sending only if the bot panicked.
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(MoveError::Fault("bot panicked".to_owned()))
            }
        }
    }
}

/// Accumulates one match's log, errors and timing, then folds everything
/// into a [`MatchResult`] with the uniform outcome mapping.
pub(crate) struct MatchRecorder {
    match_id: u64,
    bot1_name: TeamName,
    bot2_name: TeamName,
    game_type: GameType,
    log: Vec<String>,
    errors: Vec<String>,
    bot1_errored: bool,
    bot2_errored: bool,
    cancelled: bool,
    start_time: OffsetDateTime,
    started: Instant,
}

impl MatchRecorder {
    pub(crate) fn new(bot1_name: &str, bot2_name: &str, game_type: GameType) -> Self {
        MatchRecorder {
            match_id: NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed),
            bot1_name: bot1_name.to_owned(),
            bot2_name: bot2_name.to_owned(),
            game_type,
            log: Vec::new(),
            errors: Vec::new(),
            bot1_errored: false,
            bot2_errored: false,
            cancelled: false,
            start_time: OffsetDateTime::now_utc(),
            started: Instant::now(),
        }
    }

    pub(crate) fn log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub(crate) fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Records a move error against one side. Timeouts contribute the
    /// literal `"timeout"` token to the error list.
    pub(crate) fn move_error(&mut self, slot: Slot, error: &MoveError) {
        let team = match slot {
            Slot::One => {
                self.bot1_errored = true;
                &self.bot1_name
            }
            Slot::Two => {
                self.bot2_errored = true;
                &self.bot2_name
            }
        };
        match error {
            MoveError::Timeout => {
                self.log.push(format!("{team} timed out"));
                self.errors.push("timeout".to_owned());
            }
            MoveError::Cancelled => self.mark_cancelled(),
            MoveError::Fault(reason) => {
                self.log.push(format!("{team} faulted: {reason}"));
                self.errors.push(format!("{team}: {reason}"));
            }
        }
    }

    /// Records caller cancellation; the match will finish as `Unknown`.
    pub(crate) fn mark_cancelled(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.errors.push("cancelled".to_owned());
        }
    }

    /// Closes the match with game-internal scores, deriving the outcome
    /// from the error flags first and the scores second.
    pub(crate) fn finish(self, bot1_score: u32, bot2_score: u32) -> MatchResult {
        let (outcome, winner) = if self.cancelled {
            (Outcome::Unknown, String::new())
        } else if self.bot1_errored && self.bot2_errored {
            (Outcome::BothError, String::new())
        } else if self.bot1_errored {
            (Outcome::Player1Error, self.bot2_name.clone())
        } else if self.bot2_errored {
            (Outcome::Player2Error, self.bot1_name.clone())
        } else if bot1_score > bot2_score {
            (Outcome::Player1Wins, self.bot1_name.clone())
        } else if bot2_score > bot1_score {
            (Outcome::Player2Wins, self.bot2_name.clone())
        } else {
            (Outcome::Draw, String::new())
        };
        self.into_result(outcome, winner, bot1_score, bot2_score)
    }

    /// Closes the match without a usable result (cancelled, no executor).
    pub(crate) fn finish_unknown(self) -> MatchResult {
        self.into_result(Outcome::Unknown, String::new(), 0, 0)
    }

    fn into_result(
        self,
        outcome: Outcome,
        winner_name: TeamName,
        bot1_score: u32,
        bot2_score: u32,
    ) -> MatchResult {
        MatchResult {
            match_id: self.match_id,
            bot1_name: self.bot1_name,
            bot2_name: self.bot2_name,
            game_type: self.game_type,
            outcome,
            winner_name,
            bot1_score,
            bot2_score,
            match_log: self.log,
            errors: self.errors,
            start_time: self.start_time,
            end_time: OffsetDateTime::now_utc(),
            duration: self.started.elapsed(),
        }
    }
}

/// Executes one match between two bots. Always returns a result.
///
/// An unregistered game type fails fast with [`Outcome::Unknown`] and a
/// `"no executor: <game>"` error entry. Cancellation before or during the
/// match yields [`Outcome::Unknown`] with a `"cancelled"` entry. Everything
/// else is up to the executor, which reports bot faults through the §4.1
/// outcome mapping implemented by [`MatchRecorder`].
pub fn run_match(
    registry: &ExecutorRegistry,
    bot1: Arc<dyn Bot>,
    bot2: Arc<dyn Bot>,
    game_type: GameType,
    config: &TournamentConfig,
    cancel: &CancelToken,
) -> MatchResult {
    let Some(executor) = registry.get(game_type) else {
        warn!("no executor registered for {game_type}");
        let mut recorder = MatchRecorder::new(bot1.team_name(), bot2.team_name(), game_type);
        recorder.push_error(format!("no executor: {game_type}"));
        return recorder.finish_unknown();
    };

    if cancel.is_cancelled() {
        let mut recorder = MatchRecorder::new(bot1.team_name(), bot2.team_name(), game_type);
        recorder.mark_cancelled();
        return recorder.finish_unknown();
    }

    trace!(
        "match start: {} vs {} at {game_type}",
        bot1.team_name(),
        bot2.team_name()
    );
    let result = executor.execute(bot1, bot2, config, cancel);
    trace!(
        "match end: {} vs {} -> {:?}",
        result.bot1_name,
        result.bot2_name,
        result.outcome
    );
    result
}
