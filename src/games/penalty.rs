//! Penalty shoot-out.

use std::sync::Arc;

use crate::bot::Bot;
use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::game::{GameExecutor, GameType, MatchResult};
use crate::games::{normalize_token, snapshot};
use crate::match_runner::{timed_call, MatchRecorder, MoveError, Slot};

const ROUNDS: u32 = 10;
const DIRECTIONS: [&str; 3] = ["left", "center", "right"];

fn ask(
    bot: &Arc<dyn Bot>,
    slot: Slot,
    role: &str,
    round: u32,
    moves1: &[String],
    moves2: &[String],
    config: &TournamentConfig,
    cancel: &CancelToken,
) -> Result<String, MoveError> {
    let state = snapshot(
        GameType::PenaltyKicks,
        round,
        ROUNDS,
        moves1,
        moves2,
        slot,
        Some(role),
    );
    let bot = Arc::clone(bot);
    let token = cancel.clone();
    timed_call(config.move_timeout, cancel, move || {
        bot.pick_direction(&state, &token)
    })
    .and_then(|raw| normalize_token(raw, &DIRECTIONS))
}

/// Ten alternating penalties; the kicker scores unless the keeper dives the
/// same way. Roles swap every round and ride in the `state` map.
pub struct PenaltyExecutor;

impl GameExecutor for PenaltyExecutor {
    fn game_type(&self) -> GameType {
        GameType::PenaltyKicks
    }

    fn execute(
        &self,
        bot1: Arc<dyn Bot>,
        bot2: Arc<dyn Bot>,
        config: &TournamentConfig,
        cancel: &CancelToken,
    ) -> MatchResult {
        let mut recorder = MatchRecorder::new(bot1.team_name(), bot2.team_name(), self.game_type());
        let name1 = bot1.team_name().to_owned();
        let name2 = bot2.team_name().to_owned();
        let mut moves1: Vec<String> = Vec::new();
        let mut moves2: Vec<String> = Vec::new();
        let (mut goals1, mut goals2) = (0u32, 0u32);

        for round in 1..=ROUNDS {
            if cancel.is_cancelled() {
                recorder.mark_cancelled();
                return recorder.finish_unknown();
            }

            // Bot 1 kicks the odd rounds.
            let bot1_kicks = round % 2 == 1;
            let (role1, role2) = if bot1_kicks {
                ("kicker", "keeper")
            } else {
                ("keeper", "kicker")
            };

            let move1 = ask(&bot1, Slot::One, role1, round, &moves1, &moves2, config, cancel);
            let move2 = ask(&bot2, Slot::Two, role2, round, &moves1, &moves2, config, cancel);

            match (move1, move2) {
                (Ok(a), Ok(b)) => {
                    let scored = a != b;
                    let kicker = if bot1_kicks { &name1 } else { &name2 };
                    if scored {
                        if bot1_kicks {
                            goals1 += 1;
                        } else {
                            goals2 += 1;
                        }
                        recorder.log(format!("round {round}: {kicker} scores ({a} vs {b})"));
                    } else {
                        recorder.log(format!("round {round}: {kicker} saved ({a})"));
                    }
                    moves1.push(a);
                    moves2.push(b);
                }
                (r1, r2) => {
                    if let Err(e) = r1 {
                        recorder.move_error(Slot::One, &e);
                    }
                    if let Err(e) = r2 {
                        recorder.move_error(Slot::Two, &e);
                    }
                    return recorder.finish(goals1, goals2);
                }
            }
        }

        recorder.log(format!("final: {goals1} - {goals2}"));
        recorder.finish(goals1, goals2)
    }
}
