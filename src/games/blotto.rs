//! Colonel Blotto.

use std::sync::Arc;

use crate::bot::Bot;
use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::game::{GameExecutor, GameType, MatchResult};
use crate::games::snapshot;
use crate::match_runner::{timed_call, MatchRecorder, MoveError, Slot};

const BATTLEFIELDS: usize = 5;
const TROOPS: u32 = 100;

fn validate(allocation: Vec<u32>) -> Result<Vec<u32>, MoveError> {
    if allocation.len() != BATTLEFIELDS {
        return Err(MoveError::Fault(format!(
            "allocation must cover {BATTLEFIELDS} battlefields, got {}",
            allocation.len()
        )));
    }
    let total: u32 = allocation.iter().sum();
    if total != TROOPS {
        return Err(MoveError::Fault(format!(
            "allocation must total {TROOPS} troops, got {total}"
        )));
    }
    Ok(allocation)
}

fn ask(
    bot: &Arc<dyn Bot>,
    slot: Slot,
    config: &TournamentConfig,
    cancel: &CancelToken,
) -> Result<Vec<u32>, MoveError> {
    let state = snapshot(GameType::ColonelBlotto, 1, 1, &[], &[], slot, None);
    let bot = Arc::clone(bot);
    let token = cancel.clone();
    timed_call(config.move_timeout, cancel, move || {
        bot.deploy_troops(&state, &token)
    })
    .and_then(validate)
}

/// One simultaneous allocation of 100 troops over 5 battlefields; the bot
/// holding the majority on more battlefields takes the match.
pub struct BlottoExecutor;

impl GameExecutor for BlottoExecutor {
    fn game_type(&self) -> GameType {
        GameType::ColonelBlotto
    }

    fn execute(
        &self,
        bot1: Arc<dyn Bot>,
        bot2: Arc<dyn Bot>,
        config: &TournamentConfig,
        cancel: &CancelToken,
    ) -> MatchResult {
        let mut recorder = MatchRecorder::new(bot1.team_name(), bot2.team_name(), self.game_type());

        if cancel.is_cancelled() {
            recorder.mark_cancelled();
            return recorder.finish_unknown();
        }

        let alloc1 = ask(&bot1, Slot::One, config, cancel);
        let alloc2 = ask(&bot2, Slot::Two, config, cancel);

        let (alloc1, alloc2) = match (alloc1, alloc2) {
            (Ok(a), Ok(b)) => (a, b),
            (r1, r2) => {
                if let Err(e) = r1 {
                    recorder.move_error(Slot::One, &e);
                }
                if let Err(e) = r2 {
                    recorder.move_error(Slot::Two, &e);
                }
                return recorder.finish(0, 0);
            }
        };

        let (mut fields1, mut fields2) = (0u32, 0u32);
        for (field, (a, b)) in alloc1.iter().zip(alloc2.iter()).enumerate() {
            let verdict = if a > b {
                fields1 += 1;
                "slot 1"
            } else if b > a {
                fields2 += 1;
                "slot 2"
            } else {
                "contested"
            };
            recorder.log(format!("battlefield {}: {a} vs {b} -> {verdict}", field + 1));
        }
        recorder.log(format!("fields won: {fields1} - {fields2}"));
        recorder.finish(fields1, fields2)
    }
}
