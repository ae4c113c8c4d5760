//! Tournament lifecycle and bounded-parallel match dispatch.
//!
//! A [`TournamentManager`] owns one tournament at a time. `start` spawns a
//! worker thread that pulls round batches from the
//! [`GroupStageEngine`](crate::engine::GroupStageEngine), launches each
//! match on its own thread (never more than `max_parallel_matches` in
//! flight) and feeds results back over a channel. Operator commands flip a
//! shared control state that the dispatcher observes at every slot
//! acquisition: `pause` stops new launches while in-flight matches run to
//! completion, `resume` restarts dispatch, and `stop` cancels the
//! tournament token, drains what is in flight and preserves partial
//! results under `Aborted`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, trace};

use crate::bot::{Bot, TeamName};
use crate::cancel::CancelToken;
use crate::config::{ManagerSettings, TournamentConfig};
use crate::engine::{GroupStageEngine, MatchOrder, RoundBatch};
use crate::error::CommandError;
use crate::game::{ExecutorRegistry, GameType, MatchResult};
use crate::match_runner::run_match;
use crate::publisher::{
    emit, MatchCompleted, Publisher, RoundStarted, StandingsUpdated, TournamentCompleted,
    TournamentStarted,
};
use crate::scoring::{calculate_statistics, RankedStanding, ScoreBoard, TournamentStatistics};

/// Tournament lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TournamentState {
    /// Fresh or cleared; `start` is the only way out.
    NotStarted,
    /// `start` accepted; the worker is building groups.
    Initializing,
    /// Matches are being dispatched.
    Running,
    /// Dispatch is held; in-flight matches run to completion.
    Paused,
    /// `stop` accepted; in-flight matches are being drained.
    Stopping,
    /// Every match completed and a champion was decided.
    Completed,
    /// Stopped by the operator; partial results preserved.
    Aborted,
}

impl TournamentState {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            TournamentState::NotStarted | TournamentState::Completed | TournamentState::Aborted
        )
    }
}

impl fmt::Display for TournamentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The record a tournament leaves behind. Single-writer: only the manager
/// (commands and worker) ever mutates it, inside its critical section.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentInfo {
    /// Identifier, unique within a series.
    pub tournament_id: String,
    /// The game this tournament plays.
    pub game_type: GameType,
    /// Current lifecycle state.
    pub state: TournamentState,
    /// Participating teams.
    pub bots: Vec<TeamName>,
    /// Append-only record of every completed match.
    pub match_results: Vec<MatchResult>,
    /// Round batches dispatched so far.
    pub total_rounds: u32,
    /// When `start` was accepted.
    pub start_time: Option<OffsetDateTime>,
    /// When a terminal state was reached.
    pub end_time: Option<OffsetDateTime>,
}

struct Shared {
    control: Mutex<TournamentState>,
    cond: Condvar,
    info: Mutex<TournamentInfo>,
    rankings: Mutex<Vec<RankedStanding>>,
    board: Mutex<ScoreBoard>,
    cancel: Mutex<CancelToken>,
    parent_cancel: CancelToken,
    bots: Vec<Arc<dyn Bot>>,
    game_type: GameType,
    registry: Arc<ExecutorRegistry>,
    publisher: Arc<dyn Publisher>,
    config: Arc<TournamentConfig>,
    settings: ManagerSettings,
}

/// Per-event lifecycle state machine and dispatcher. See the module docs.
pub struct TournamentManager {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TournamentManager {
    /// Creates a manager for one tournament. Bots with duplicate or empty
    /// team names are dropped with a warning; the survivors are shared
    /// read-only with every match.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tournament_id: impl Into<String>,
        game_type: GameType,
        bots: Vec<Arc<dyn Bot>>,
        registry: Arc<ExecutorRegistry>,
        publisher: Arc<dyn Publisher>,
        config: Arc<TournamentConfig>,
        settings: ManagerSettings,
        parent_cancel: &CancelToken,
    ) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut roster: Vec<Arc<dyn Bot>> = Vec::with_capacity(bots.len());
        for bot in bots {
            let name = bot.team_name().to_owned();
            if name.is_empty() {
                tracing::warn!("dropping bot with empty team name");
            } else if !seen.insert(name.clone()) {
                tracing::warn!("dropping bot with duplicate team name '{name}'");
            } else {
                roster.push(bot);
            }
        }

        let names: Vec<TeamName> = roster.iter().map(|b| b.team_name().to_owned()).collect();
        let info = TournamentInfo {
            tournament_id: tournament_id.into(),
            game_type,
            state: TournamentState::NotStarted,
            bots: names,
            match_results: Vec::new(),
            total_rounds: 0,
            start_time: None,
            end_time: None,
        };
        TournamentManager {
            shared: Arc::new(Shared {
                control: Mutex::new(TournamentState::NotStarted),
                cond: Condvar::new(),
                info: Mutex::new(info),
                rankings: Mutex::new(Vec::new()),
                board: Mutex::new(ScoreBoard::default()),
                cancel: Mutex::new(parent_cancel.child()),
                parent_cancel: parent_cancel.clone(),
                bots: roster,
                game_type,
                registry,
                publisher,
                config,
                settings,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Starts the tournament.
    ///
    /// # Errors
    ///
    /// [`CommandError::InsufficientBots`] with fewer than two bots, or
    /// [`CommandError::IllegalTransition`] outside `NotStarted`.
    pub fn start(&self) -> Result<(), CommandError> {
        {
            let mut state = self.lock_control();
            if *state != TournamentState::NotStarted {
                return Err(CommandError::IllegalTransition {
                    command: "start",
                    state: *state,
                });
            }
            if self.shared.bots.len() < 2 {
                return Err(CommandError::InsufficientBots {
                    have: self.shared.bots.len(),
                });
            }
            *state = TournamentState::Initializing;
            let mut info = self.shared.info.lock().expect("info poisoned");
            info.state = TournamentState::Initializing;
            info.start_time = Some(OffsetDateTime::now_utc());
            info.end_time = None;
        }

        let cancel = {
            let mut token = self.shared.cancel.lock().expect("cancel poisoned");
            *token = self.shared.parent_cancel.child();
            token.clone()
        };
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::spawn(move || run_tournament(shared, cancel));
        *self.worker.lock().expect("worker poisoned") = Some(handle);
        Ok(())
    }

    /// Holds dispatch; in-flight matches run to completion and are
    /// recorded.
    pub fn pause(&self) -> Result<(), CommandError> {
        self.transition("pause", TournamentState::Running, TournamentState::Paused)
    }

    /// Resumes dispatch after a pause.
    pub fn resume(&self) -> Result<(), CommandError> {
        self.transition("resume", TournamentState::Paused, TournamentState::Running)
    }

    /// Cancels in-flight matches, drains them, and aborts the tournament
    /// with partial results preserved.
    pub fn stop(&self) -> Result<(), CommandError> {
        let mut state = self.lock_control();
        match *state {
            TournamentState::Running | TournamentState::Paused => {
                *state = TournamentState::Stopping;
                self.shared.info.lock().expect("info poisoned").state = TournamentState::Stopping;
                self.shared
                    .cancel
                    .lock()
                    .expect("cancel poisoned")
                    .cancel();
                self.shared.cond.notify_all();
                Ok(())
            }
            other => Err(CommandError::IllegalTransition {
                command: "stop",
                state: other,
            }),
        }
    }

    /// Resets a finished tournament back to `NotStarted`, discarding the
    /// live results; the roster and configuration are kept.
    pub fn rerun(&self) -> Result<(), CommandError> {
        let mut state = self.lock_control();
        match *state {
            TournamentState::Completed | TournamentState::Aborted => {
                *state = TournamentState::NotStarted;
                self.reset_record();
                Ok(())
            }
            other => Err(CommandError::IllegalTransition {
                command: "rerun",
                state: other,
            }),
        }
    }

    /// Clears the tournament record. Rejected while the tournament is
    /// active in any way.
    pub fn clear(&self) -> Result<(), CommandError> {
        let mut state = self.lock_control();
        if !state.is_terminal() {
            return Err(CommandError::IllegalTransition {
                command: "clear",
                state: *state,
            });
        }
        *state = TournamentState::NotStarted;
        self.reset_record();
        Ok(())
    }

    /// Blocks until the tournament reaches a terminal state and the worker
    /// has fully wound down, then returns that state.
    pub fn wait(&self) -> TournamentState {
        let final_state = {
            let mut state = self.lock_control();
            while !state.is_terminal() {
                state = self.shared.cond.wait(state).expect("control poisoned");
            }
            *state
        };
        if let Some(handle) = self.worker.lock().expect("worker poisoned").take() {
            let _ = handle.join();
        }
        final_state
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TournamentState {
        *self.lock_control()
    }

    /// Snapshot of the tournament record.
    pub fn info(&self) -> TournamentInfo {
        self.shared.info.lock().expect("info poisoned").clone()
    }

    /// Snapshot of the current rankings, best first.
    pub fn rankings(&self) -> Vec<RankedStanding> {
        self.shared.rankings.lock().expect("rankings poisoned").clone()
    }

    /// Aggregate statistics over the record so far.
    pub fn statistics(&self) -> TournamentStatistics {
        let info = self.info();
        let board = self.shared.board.lock().expect("board poisoned");
        calculate_statistics(&info, &board)
    }

    fn transition(
        &self,
        command: &'static str,
        from: TournamentState,
        to: TournamentState,
    ) -> Result<(), CommandError> {
        let mut state = self.lock_control();
        if *state != from {
            return Err(CommandError::IllegalTransition {
                command,
                state: *state,
            });
        }
        *state = to;
        self.shared.info.lock().expect("info poisoned").state = to;
        self.shared.cond.notify_all();
        info!("tournament {command} accepted");
        Ok(())
    }

    fn reset_record(&self) {
        let mut info = self.shared.info.lock().expect("info poisoned");
        info.state = TournamentState::NotStarted;
        info.match_results.clear();
        info.total_rounds = 0;
        info.start_time = None;
        info.end_time = None;
        drop(info);
        self.shared.rankings.lock().expect("rankings poisoned").clear();
        *self.shared.board.lock().expect("board poisoned") = ScoreBoard::default();
    }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, TournamentState> {
        self.shared.control.lock().expect("control poisoned")
    }
}

enum RoundEnd {
    Finished(Vec<MatchResult>),
    Stopped(Vec<MatchResult>),
}

/// Worker entry point: drives the engine to completion or abort.
fn run_tournament(shared: Arc<Shared>, cancel: CancelToken) {
    let names: Vec<TeamName> = shared.bots.iter().map(|b| b.team_name().to_owned()).collect();
    let bots_by_name: HashMap<TeamName, Arc<dyn Bot>> = shared
        .bots
        .iter()
        .map(|b| (b.team_name().to_owned(), Arc::clone(b)))
        .collect();
    let mut engine = GroupStageEngine::new(
        names.clone(),
        shared.config.group_size,
        shared.config.advance_per_group,
        shared.config.knockout_draw_replays,
    );

    set_state(&shared, TournamentState::Running);
    let tournament_id = shared.info.lock().expect("info poisoned").tournament_id.clone();
    info!("tournament {tournament_id} running with {} bots", names.len());
    emit("tournament_started", || {
        shared.publisher.publish_tournament_started(&TournamentStarted {
            tournament_id: tournament_id.clone(),
            game_type: shared.game_type,
            bots: names,
        })
    });

    let mut results: Vec<MatchResult> = Vec::new();
    let final_state = loop {
        if let Err(scoring_error) = engine.record(&results) {
            error!("scoring rejected a round: {scoring_error}");
            break TournamentState::Aborted;
        }
        publish_standings(&shared, &engine, &tournament_id, !results.is_empty());

        let Some(batch) = engine.next_batch() else {
            break TournamentState::Completed;
        };
        shared.info.lock().expect("info poisoned").total_rounds = batch.number;
        emit("round_started", || {
            shared.publisher.publish_round_started(&RoundStarted {
                tournament_id: tournament_id.clone(),
                round: batch.number,
                phase: batch.phase,
                match_count: batch.orders.len(),
            })
        });

        match dispatch_round(&shared, &cancel, &bots_by_name, &batch, &tournament_id) {
            RoundEnd::Finished(round_results) => results = round_results,
            RoundEnd::Stopped(partial) => {
                let _ = engine.record(&partial);
                publish_standings(&shared, &engine, &tournament_id, !partial.is_empty());
                break TournamentState::Aborted;
            }
        }
    };

    // Mutations first, then the completion event, then the state flip that
    // releases anyone blocked in `wait`.
    {
        let mut info = shared.info.lock().expect("info poisoned");
        info.state = final_state;
        info.end_time = Some(OffsetDateTime::now_utc());
    }
    let rankings = engine.board().rankings();
    *shared.rankings.lock().expect("rankings poisoned") = rankings.clone();
    *shared.board.lock().expect("board poisoned") = engine.board().clone();
    emit("tournament_completed", || {
        shared.publisher.publish_tournament_completed(&TournamentCompleted {
            tournament_id: tournament_id.clone(),
            game_type: shared.game_type,
            state: final_state,
            rankings,
        })
    });
    info!("tournament {tournament_id} finished: {final_state}");
    set_state(&shared, final_state);
}

fn publish_standings(
    shared: &Arc<Shared>,
    engine: &GroupStageEngine,
    tournament_id: &str,
    changed: bool,
) {
    let rankings = engine.board().rankings();
    *shared.rankings.lock().expect("rankings poisoned") = rankings.clone();
    *shared.board.lock().expect("board poisoned") = engine.board().clone();
    if changed {
        emit("standings_updated", || {
            shared.publisher.publish_standings_updated(&StandingsUpdated {
                tournament_id: tournament_id.to_owned(),
                rankings: rankings.clone(),
            })
        });
    }
}

fn set_state(shared: &Arc<Shared>, state: TournamentState) {
    *shared.control.lock().expect("control poisoned") = state;
    shared.info.lock().expect("info poisoned").state = state;
    shared.cond.notify_all();
}

/// Dispatches one round batch under the parallelism cap, observing
/// pause/stop at every slot acquisition.
fn dispatch_round(
    shared: &Arc<Shared>,
    cancel: &CancelToken,
    bots: &HashMap<TeamName, Arc<dyn Bot>>,
    batch: &RoundBatch,
    tournament_id: &str,
) -> RoundEnd {
    let (tx, rx) = mpsc::channel::<MatchResult>();
    let mut pending: std::collections::VecDeque<MatchOrder> =
        batch.orders.iter().cloned().collect();
    let mut running = 0usize;
    let mut collected = Vec::with_capacity(batch.orders.len());

    loop {
        // Slot acquisition point.
        let stopped = {
            let mut state = shared.control.lock().expect("control poisoned");
            while *state == TournamentState::Paused && running == 0 {
                state = shared.cond.wait(state).expect("control poisoned");
            }
            match *state {
                TournamentState::Running => {
                    while running < shared.config.max_parallel_matches {
                        let Some(order) = pending.pop_front() else {
                            break;
                        };
                        launch_match(shared, cancel, bots, order, tx.clone());
                        running += 1;
                    }
                    false
                }
                TournamentState::Stopping => true,
                // Paused with matches in flight: keep draining below.
                _ => false,
            }
        };

        if stopped {
            cancel.cancel();
            trace!("draining {running} in-flight matches after stop");
            while running > 0 {
                match rx.recv() {
                    Ok(result) => {
                        running -= 1;
                        record_result(shared, tournament_id, &result, &mut collected);
                    }
                    Err(_) => break,
                }
            }
            return RoundEnd::Stopped(collected);
        }

        if running == 0 && pending.is_empty() {
            return RoundEnd::Finished(collected);
        }
        if running == 0 {
            // Nothing in flight but dispatch is held; re-observe.
            continue;
        }

        match rx.recv_timeout(Duration::from_millis(25)) {
            Ok(result) => {
                running -= 1;
                let pacing = shared.settings.pacing_after(result.duration);
                record_result(shared, tournament_id, &result, &mut collected);
                if let Some(delay) = pacing {
                    std::thread::sleep(delay);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Wake to re-observe operator commands.
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                unreachable!("dispatcher holds a sender for the whole round")
            }
        }
    }
}

fn launch_match(
    shared: &Arc<Shared>,
    cancel: &CancelToken,
    bots: &HashMap<TeamName, Arc<dyn Bot>>,
    order: MatchOrder,
    tx: mpsc::Sender<MatchResult>,
) {
    let bot1 = Arc::clone(&bots[&order.bot1]);
    let bot2 = Arc::clone(&bots[&order.bot2]);
    let match_cancel = cancel.child();
    let registry = Arc::clone(&shared.registry);
    let config = Arc::clone(&shared.config);
    let game_type = shared.game_type;
    std::thread::spawn(move || {
        let result = run_match(&registry, bot1, bot2, game_type, &config, &match_cancel);
        // The dispatcher may already have moved on after a stop.
        let _ = tx.send(result);
    });
}

/// Appends the result to the tournament record and publishes it.
fn record_result(
    shared: &Arc<Shared>,
    tournament_id: &str,
    result: &MatchResult,
    collected: &mut Vec<MatchResult>,
) {
    shared
        .info
        .lock()
        .expect("info poisoned")
        .match_results
        .push(result.clone());
    collected.push(result.clone());
    emit("match_completed", || {
        shared.publisher.publish_match_completed(&MatchCompleted {
            tournament_id: tournament_id.to_owned(),
            result: result.clone(),
        })
    });
}
