//! Patrol-versus-intrusion security game.

use std::sync::Arc;

use crate::bot::Bot;
use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::game::{GameExecutor, GameType, MatchResult};
use crate::games::{normalize_token, snapshot};
use crate::match_runner::{timed_call, MatchRecorder, MoveError, Slot};

const ROUNDS: u32 = 10;
const SITES: [&str; 3] = ["alpha", "bravo", "charlie"];

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
        GameType::SecurityGame,
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
        bot.pick_site(&state, &token)
    })
    .and_then(|raw| normalize_token(raw, &SITES))
}

/// Ten alternating rounds of patrol versus intrusion; the attacker scores
/// whenever the defender patrols a different site. Roles swap every round.
pub struct SecurityExecutor;

impl GameExecutor for SecurityExecutor {
    fn game_type(&self) -> GameType {
        GameType::SecurityGame
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
        let (mut hits1, mut hits2) = (0u32, 0u32);

        for round in 1..=ROUNDS {
            if cancel.is_cancelled() {
                recorder.mark_cancelled();
                return recorder.finish_unknown();
            }

            // Bot 1 attacks the odd rounds.
            let bot1_attacks = round % 2 == 1;
            let (role1, role2) = if bot1_attacks {
                ("attacker", "defender")
            } else {
                ("defender", "attacker")
            };

            let move1 = ask(&bot1, Slot::One, role1, round, &moves1, &moves2, config, cancel);
            let move2 = ask(&bot2, Slot::Two, role2, round, &moves1, &moves2, config, cancel);

            match (move1, move2) {
                (Ok(a), Ok(b)) => {
                    let attacker = if bot1_attacks { &name1 } else { &name2 };
                    if a != b {
                        if bot1_attacks {
                            hits1 += 1;
                        } else {
                            hits2 += 1;
                        }
                        recorder.log(format!(
                            "round {round}: {attacker} breaches ({a} vs {b})"
                        ));
                    } else {
                        recorder.log(format!("round {round}: {attacker} intercepted at {a}"));
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
                    return recorder.finish(hits1, hits2);
                }
            }
        }

        recorder.log(format!("final: {hits1} - {hits2}"));
        recorder.finish(hits1, hits2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameState, Outcome};
    use crate::games::test_bots::FixedBot;

    #[test]
    fn matching_patrols_intercept_everything() {
        let result = SecurityExecutor.execute(
            Arc::new(FixedBot::new("A")),
            Arc::new(FixedBot::new("B")),
            &TournamentConfig::default(),
            &CancelToken::new(),
        );
        assert_eq!(result.outcome, Outcome::Draw);
        assert_eq!((result.bot1_score, result.bot2_score), (0, 0));
    }

    #[test]
    fn undefended_sites_are_breached() {
        struct Dodger;
        impl Bot for Dodger {
            fn team_name(&self) -> &str {
                "Dodger"
            }
            fn pick_site(&self, state: &GameState, _: &CancelToken) -> anyhow::Result<String> {
                // Attack bravo, always patrol alpha.
                match state.state["role"].as_str() {
                    Some("attacker") => Ok("bravo".to_owned()),
                    _ => Ok("alpha".to_owned()),
                }
            }
        }
        // FixedBot plays alpha in both roles: its attacks are intercepted
        // (both at alpha) and its patrols never cover bravo.
        let result = SecurityExecutor.execute(
            Arc::new(Dodger),
            Arc::new(FixedBot::new("Fixed")),
            &TournamentConfig::default(),
            &CancelToken::new(),
        );
        assert_eq!(result.outcome, Outcome::Player1Wins);
        assert_eq!((result.bot1_score, result.bot2_score), (5, 0));
    }

    #[test]
    fn timeout_is_recorded_with_the_literal_token() {
        struct Sleeper;
        impl Bot for Sleeper {
            fn team_name(&self) -> &str {
                "Sleeper"
            }
            fn pick_site(&self, _: &GameState, _: &CancelToken) -> anyhow::Result<String> {
                std::thread::sleep(std::time::Duration::from_millis(300));
                Ok("alpha".to_owned())
            }
        }
        let config = TournamentConfig::builder()
            .with_move_timeout(std::time::Duration::from_millis(30))
            .build()
            .unwrap();
        let result = SecurityExecutor.execute(
            Arc::new(Sleeper),
            Arc::new(FixedBot::new("Fixed")),
            &config,
            &CancelToken::new(),
        );
        assert_eq!(result.outcome, Outcome::Player1Error);
        assert!(result.errors.iter().any(|e| e == "timeout"));
    }
}
