//! Multi-event series pipeline.
//!
//! A series runs one tournament per configured game type over a fixed
//! roster, carrying each bot's tournament score forward into an additive
//! series total. Exactly one step is `Running` at a time; steps advance
//! automatically unless the operator pauses or stops the pipeline. The
//! series manager exclusively owns the step list and the cumulative score
//! and is the single place operator tunables ([`ManagerSettings`]) live.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::bot::{Bot, TeamName};
use crate::cancel::CancelToken;
use crate::config::{ManagerSettings, TournamentConfig};
use crate::error::CommandError;
use crate::game::{ExecutorRegistry, GameType};
use crate::manager::{TournamentInfo, TournamentManager, TournamentState};
use crate::publisher::{
    emit, EventCompleted, EventStarted, EventStepCompleted, Publisher, TournamentProgress,
};

/// Status of one event step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    /// Not reached yet.
    NotStarted,
    /// The step's tournament is live.
    Running,
    /// The step's tournament completed normally.
    Completed,
    /// The step's tournament aborted or failed to start.
    Failed,
}

/// One tournament in the series plan.
#[derive(Debug, Clone, Serialize)]
pub struct EventStep {
    /// 1-indexed position in the series.
    pub index: usize,
    /// The game this step plays.
    pub game_type: GameType,
    /// Current status; moves only forward except on rerun.
    pub status: StepStatus,
}

/// Where the series pipeline is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeriesStatus {
    /// Built but never started (or cleared by rerun, briefly).
    NotStarted,
    /// Steps are executing.
    Running,
    /// Every step completed.
    Completed,
    /// Stopped by the operator or a failed step.
    Stopped,
}

impl SeriesStatus {
    fn is_terminal(self) -> bool {
        !matches!(self, SeriesStatus::Running)
    }
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One line of the cumulative series table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesStandingEntry {
    /// The team.
    pub team_name: TeamName,
    /// Sum of the team's tournament scores over completed steps.
    pub cumulative_score: u32,
    /// 1-indexed rank by cumulative score, name-tie-broken.
    pub rank: u32,
}

/// Full series state, published through
/// [`Publisher::update_current_state`]. Plain values throughout; consumers
/// may serialize it in any format.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSnapshot {
    /// The series.
    pub series_name: String,
    /// The step plan with statuses.
    pub steps: Vec<EventStep>,
    /// 1-indexed step currently (or last) running; 0 before the first.
    pub current_step_index: usize,
    /// Cumulative standings, best first.
    pub series_standings: Vec<SeriesStandingEntry>,
    /// Record of the current tournament, if one exists.
    pub tournament_info: Option<TournamentInfo>,
}

struct SeriesState {
    status: SeriesStatus,
    /// Operator hold observed between steps (and proxied into the current
    /// tournament).
    paused: bool,
    steps: Vec<EventStep>,
    current_step: usize,
    cumulative: HashMap<TeamName, u32>,
    current: Option<Arc<TournamentManager>>,
    cancel: CancelToken,
}

struct SeriesShared {
    name: String,
    roster: Vec<Arc<dyn Bot>>,
    registry: Arc<ExecutorRegistry>,
    publisher: Arc<dyn Publisher>,
    config: Arc<TournamentConfig>,
    settings: ManagerSettings,
    state: Mutex<SeriesState>,
    cond: Condvar,
}

/// Owns a series of tournaments over one bot roster.
pub struct SeriesManager {
    shared: Arc<SeriesShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SeriesManager {
    /// Builds a series: one step per game in `config.games`, in order.
    pub fn new(
        name: impl Into<String>,
        roster: Vec<Arc<dyn Bot>>,
        registry: Arc<ExecutorRegistry>,
        publisher: Arc<dyn Publisher>,
        config: Arc<TournamentConfig>,
        settings: ManagerSettings,
    ) -> Self {
        let steps = config
            .games
            .iter()
            .enumerate()
            .map(|(i, game)| EventStep {
                index: i + 1,
                game_type: *game,
                status: StepStatus::NotStarted,
            })
            .collect();
        let cumulative = roster
            .iter()
            .map(|bot| (bot.team_name().to_owned(), 0))
            .collect();
        SeriesManager {
            shared: Arc::new(SeriesShared {
                name: name.into(),
                roster,
                registry,
                publisher,
                config,
                settings,
                state: Mutex::new(SeriesState {
                    status: SeriesStatus::NotStarted,
                    paused: false,
                    steps,
                    current_step: 0,
                    cumulative,
                    current: None,
                    cancel: CancelToken::new(),
                }),
                cond: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Starts the series pipeline from step 1.
    ///
    /// # Errors
    ///
    /// [`CommandError::SeriesBusy`] unless the series is `NotStarted`.
    pub fn start(&self) -> Result<(), CommandError> {
        let cancel = {
            let mut state = self.lock_state();
            if state.status != SeriesStatus::NotStarted {
                return Err(CommandError::SeriesBusy {
                    command: "start",
                    status: state.status.to_string(),
                });
            }
            state.status = SeriesStatus::Running;
            state.cancel = CancelToken::new();
            state.cancel.clone()
        };
        self.spawn_worker(cancel);
        Ok(())
    }

    /// Holds the pipeline: the current tournament pauses and no further
    /// step starts until [`resume`](Self::resume).
    pub fn pause(&self) -> Result<(), CommandError> {
        let current = {
            let mut state = self.lock_state();
            if state.status != SeriesStatus::Running {
                return Err(CommandError::SeriesBusy {
                    command: "pause",
                    status: state.status.to_string(),
                });
            }
            state.paused = true;
            state.current.clone()
        };
        if let Some(manager) = current {
            // Between steps there is nothing to pause; the flag suffices.
            let _ = manager.pause();
        }
        info!("series paused");
        Ok(())
    }

    /// Releases a pause.
    pub fn resume(&self) -> Result<(), CommandError> {
        let current = {
            let mut state = self.lock_state();
            if state.status != SeriesStatus::Running {
                return Err(CommandError::SeriesBusy {
                    command: "resume",
                    status: state.status.to_string(),
                });
            }
            state.paused = false;
            self.shared.cond.notify_all();
            state.current.clone()
        };
        if let Some(manager) = current {
            let _ = manager.resume();
        }
        info!("series resumed");
        Ok(())
    }

    /// Stops the series: the current tournament aborts, its step is marked
    /// failed, and no further step starts.
    pub fn stop(&self) -> Result<(), CommandError> {
        let current = {
            let mut state = self.lock_state();
            if state.status != SeriesStatus::Running {
                return Err(CommandError::SeriesBusy {
                    command: "stop",
                    status: state.status.to_string(),
                });
            }
            state.cancel.cancel();
            state.paused = false;
            self.shared.cond.notify_all();
            state.current.clone()
        };
        if let Some(manager) = current {
            let _ = manager.stop();
        }
        info!("series stop requested");
        Ok(())
    }

    /// Reinstates the last configuration (roster and step list), resets all
    /// standings and statuses, and starts again from step 1. The previous
    /// live results are discarded.
    ///
    /// # Errors
    ///
    /// [`CommandError::SeriesBusy`] while the series is still running.
    pub fn rerun(&self) -> Result<(), CommandError> {
        let cancel = {
            let mut state = self.lock_state();
            if state.status == SeriesStatus::Running {
                return Err(CommandError::SeriesBusy {
                    command: "rerun",
                    status: state.status.to_string(),
                });
            }
            for step in &mut state.steps {
                step.status = StepStatus::NotStarted;
            }
            state.current_step = 0;
            for score in state.cumulative.values_mut() {
                *score = 0;
            }
            state.current = None;
            state.paused = false;
            state.status = SeriesStatus::Running;
            state.cancel = CancelToken::new();
            state.cancel.clone()
        };
        info!("series rerun: standings reset, restarting from step 1");
        self.spawn_worker(cancel);
        Ok(())
    }

    /// Blocks until the pipeline reaches a terminal status and returns it.
    pub fn wait(&self) -> SeriesStatus {
        let status = {
            let mut state = self.lock_state();
            while !state.status.is_terminal() {
                state = self.shared.cond.wait(state).expect("series state poisoned");
            }
            state.status
        };
        if let Some(handle) = self.worker.lock().expect("worker poisoned").take() {
            let _ = handle.join();
        }
        status
    }

    /// Current pipeline status.
    pub fn status(&self) -> SeriesStatus {
        self.lock_state().status
    }

    /// Cumulative standings, best first.
    pub fn standings(&self) -> Vec<SeriesStandingEntry> {
        standings_entries(&self.lock_state().cumulative)
    }

    /// Full state snapshot, as published to subscribers.
    pub fn snapshot(&self) -> SeriesSnapshot {
        build_snapshot(&self.shared)
    }

    fn spawn_worker(&self, cancel: CancelToken) {
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::spawn(move || run_series(shared, cancel));
        let mut slot = self.worker.lock().expect("worker poisoned");
        if let Some(previous) = slot.take() {
            // Only reachable from a terminal status; the old worker is done.
            let _ = previous.join();
        }
        *slot = Some(handle);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SeriesState> {
        self.shared.state.lock().expect("series state poisoned")
    }
}

fn standings_entries(cumulative: &HashMap<TeamName, u32>) -> Vec<SeriesStandingEntry> {
    let mut entries: Vec<(&TeamName, u32)> =
        cumulative.iter().map(|(team, score)| (team, *score)).collect();
    entries.sort_by(|(name_a, score_a), (name_b, score_b)| {
        score_b.cmp(score_a).then(name_a.cmp(name_b))
    });
    entries
        .into_iter()
        .enumerate()
        .map(|(index, (team, score))| SeriesStandingEntry {
            team_name: team.clone(),
            cumulative_score: score,
            rank: index as u32 + 1,
        })
        .collect()
}

fn build_snapshot(shared: &Arc<SeriesShared>) -> SeriesSnapshot {
    let (steps, current_step, standings, current) = {
        let state = shared.state.lock().expect("series state poisoned");
        (
            state.steps.clone(),
            state.current_step,
            standings_entries(&state.cumulative),
            state.current.clone(),
        )
    };
    SeriesSnapshot {
        series_name: shared.name.clone(),
        steps,
        current_step_index: current_step,
        series_standings: standings,
        tournament_info: current.map(|manager| manager.info()),
    }
}

fn push_snapshot(shared: &Arc<SeriesShared>) {
    let snapshot = build_snapshot(shared);
    emit("update_current_state", || {
        shared.publisher.update_current_state(&snapshot)
    });
}

fn finish_series(shared: &Arc<SeriesShared>, status: SeriesStatus) {
    {
        let mut state = shared.state.lock().expect("series state poisoned");
        state.status = status;
        state.current = None;
        shared.cond.notify_all();
    }
    info!("series finished: {status}");
    push_snapshot(shared);
}

/// Idles until the configured start instant, ticking a progress event once
/// per second. Returns false when cancelled.
fn await_scheduled_start(shared: &Arc<SeriesShared>, cancel: &CancelToken) -> bool {
    let Some(start_at) = shared.settings.scheduled_start else {
        return true;
    };
    while OffsetDateTime::now_utc() < start_at {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = start_at - OffsetDateTime::now_utc();
        let seconds = remaining.whole_seconds().max(0);
        emit("tournament_progress_updated", || {
            shared
                .publisher
                .publish_tournament_progress_updated(&TournamentProgress {
                    series_name: shared.name.clone(),
                    message: format!("series starts in {seconds}s"),
                })
        });
        // One tick per second, but stay responsive to stop.
        for _ in 0..4 {
            if cancel.is_cancelled() {
                return false;
            }
            std::thread::sleep(Duration::from_millis(250));
        }
    }
    true
}

fn run_series(shared: Arc<SeriesShared>, cancel: CancelToken) {
    emit("event_started", || {
        shared.publisher.publish_event_started(&EventStarted {
            series_name: shared.name.clone(),
            games: shared.config.games.clone(),
        })
    });
    push_snapshot(&shared);

    if !await_scheduled_start(&shared, &cancel) {
        finish_series(&shared, SeriesStatus::Stopped);
        return;
    }

    let total_steps = shared.state.lock().expect("series state poisoned").steps.len();
    for index in 1..=total_steps {
        // The next step starts automatically unless the operator holds or
        // stops the pipeline.
        {
            let mut state = shared.state.lock().expect("series state poisoned");
            while state.paused && !cancel.is_cancelled() {
                state = shared.cond.wait(state).expect("series state poisoned");
            }
        }
        if cancel.is_cancelled() {
            finish_series(&shared, SeriesStatus::Stopped);
            return;
        }

        let game = {
            let mut state = shared.state.lock().expect("series state poisoned");
            state.current_step = index;
            state.steps[index - 1].status = StepStatus::Running;
            state.steps[index - 1].game_type
        };
        info!("series step {index} starting: {game}");
        push_snapshot(&shared);

        let manager = Arc::new(TournamentManager::new(
            format!("{}-step{index}-{game}", shared.name),
            game,
            shared.roster.clone(),
            Arc::clone(&shared.registry),
            Arc::clone(&shared.publisher),
            Arc::clone(&shared.config),
            shared.settings.clone(),
            &cancel,
        ));
        shared.state.lock().expect("series state poisoned").current = Some(Arc::clone(&manager));

        if let Err(command_error) = manager.start() {
            error!("series step {index} could not start: {command_error}");
            set_step_status(&shared, index, StepStatus::Failed);
            finish_series(&shared, SeriesStatus::Stopped);
            return;
        }
        let outcome = manager.wait();
        if cancel.is_cancelled() {
            // Stop raced the step: whatever the tournament reported, the
            // pipeline is done and this step did not count.
            set_step_status(&shared, index, StepStatus::Failed);
            finish_series(&shared, SeriesStatus::Stopped);
            return;
        }

        match outcome {
            TournamentState::Completed => {
                let standings = {
                    let mut state = shared.state.lock().expect("series state poisoned");
                    for ranked in manager.rankings() {
                        *state.cumulative.entry(ranked.team_name.clone()).or_insert(0) +=
                            ranked.standing.total_score;
                    }
                    state.steps[index - 1].status = StepStatus::Completed;
                    standings_entries(&state.cumulative)
                };
                emit("event_step_completed", || {
                    shared
                        .publisher
                        .publish_event_step_completed(&EventStepCompleted {
                            series_name: shared.name.clone(),
                            step_index: index,
                            game_type: game,
                            standings: standings.clone(),
                        })
                });
                push_snapshot(&shared);
            }
            other => {
                warn!("series step {index} ended {other}; stopping the pipeline");
                set_step_status(&shared, index, StepStatus::Failed);
                finish_series(&shared, SeriesStatus::Stopped);
                return;
            }
        }
    }

    let standings = standings_entries(
        &shared.state.lock().expect("series state poisoned").cumulative,
    );
    emit("event_completed", || {
        shared.publisher.publish_event_completed(&EventCompleted {
            series_name: shared.name.clone(),
            standings: standings.clone(),
        })
    });
    finish_series(&shared, SeriesStatus::Completed);
}

fn set_step_status(shared: &Arc<SeriesShared>, index: usize, status: StepStatus) {
    let mut state = shared.state.lock().expect("series state poisoned");
    state.steps[index - 1].status = status;
}
