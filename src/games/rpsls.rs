//! Rock-paper-scissors-lizard-spock.

use std::sync::Arc;

use crate::bot::Bot;
use crate::cancel::CancelToken;
use crate::config::TournamentConfig;
use crate::game::{GameExecutor, GameState, GameType, MatchResult};
use crate::games::{normalize_token, snapshot};
use crate::match_runner::{timed_call, MatchRecorder, MoveError, Slot};

const SIGNS: [&str; 5] = ["rock", "paper", "scissors", "lizard", "spock"];

/// True if sign `a` defeats sign `b` under the extended dominance relation.
fn beats(a: &str, b: &str) -> bool {
    matches!(
        (a, b),
        ("rock", "scissors")
            | ("rock", "lizard")
            | ("paper", "rock")
            | ("paper", "spock")
            | ("scissors", "paper")
            | ("scissors", "lizard")
            | ("lizard", "spock")
            | ("lizard", "paper")
            | ("spock", "scissors")
            | ("spock", "rock")
    )
}

fn ask(
    bot: &Arc<dyn Bot>,
    state: GameState,
    config: &TournamentConfig,
    cancel: &CancelToken,
) -> Result<String, MoveError> {
    let bot = Arc::clone(bot);
    let token = cancel.clone();
    timed_call(config.move_timeout, cancel, move || {
        bot.throw_sign(&state, &token)
    })
    .and_then(|raw| normalize_token(raw, &SIGNS))
}

/// Plays `max_rounds_rpsls` simultaneous rounds; the bot with more round
/// wins takes the match.
pub struct RpslsExecutor;

impl GameExecutor for RpslsExecutor {
    fn game_type(&self) -> GameType {
        GameType::Rpsls
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
        let max_rounds = config.max_rounds_rpsls;
        let mut moves1: Vec<String> = Vec::new();
        let mut moves2: Vec<String> = Vec::new();
        let (mut score1, mut score2) = (0u32, 0u32);

        for round in 1..=max_rounds {
            if cancel.is_cancelled() {
                recorder.mark_cancelled();
                return recorder.finish_unknown();
            }

            let state1 = snapshot(
                self.game_type(),
                round,
                max_rounds,
                &moves1,
                &moves2,
                Slot::One,
                None,
            );
            let state2 = snapshot(
                self.game_type(),
                round,
                max_rounds,
                &moves1,
                &moves2,
                Slot::Two,
                None,
            );
            let sign1 = ask(&bot1, state1, config, cancel);
            let sign2 = ask(&bot2, state2, config, cancel);

            match (sign1, sign2) {
                (Ok(a), Ok(b)) => {
                    let verdict = if beats(&a, &b) {
                        score1 += 1;
                        format!("round {round}: {a} vs {b}, {name1} wins")
                    } else if beats(&b, &a) {
                        score2 += 1;
                        format!("round {round}: {a} vs {b}, {name2} wins")
                    } else {
                        format!("round {round}: {a} vs {b}, draw")
                    };
                    recorder.log(verdict);
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
                    return recorder.finish(score1, score2);
                }
            }
        }

        recorder.log(format!("final: {score1} - {score2}"));
        recorder.finish(score1, score2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Outcome;
    use crate::games::test_bots::{BrokenBot, FixedBot};

    fn play(bot1: FixedBot, bot2: FixedBot, rounds: u32) -> MatchResult {
        let config = TournamentConfig::builder()
            .with_max_rounds_rpsls(rounds)
            .build()
            .unwrap();
        RpslsExecutor.execute(
            Arc::new(bot1),
            Arc::new(bot2),
            &config,
            &CancelToken::new(),
        )
    }

    #[test]
    fn dominance_relation_is_asymmetric() {
        for a in SIGNS {
            assert!(!beats(a, a));
            for b in SIGNS {
                if a != b {
                    assert!(beats(a, b) != beats(b, a), "{a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn paper_beats_rock_every_round() {
        let mut winner = FixedBot::new("Paper");
        winner.sign = "paper";
        let result = play(winner, FixedBot::new("Rock"), 5);
        assert_eq!(result.outcome, Outcome::Player1Wins);
        assert_eq!(result.winner_name, "Paper");
        assert_eq!((result.bot1_score, result.bot2_score), (5, 0));
        assert_eq!(result.match_log.len(), 6);
    }

    #[test]
    fn mirror_match_is_a_draw() {
        let result = play(FixedBot::new("A"), FixedBot::new("B"), 3);
        assert_eq!(result.outcome, Outcome::Draw);
        assert_eq!(result.winner_name, "");
    }

    #[test]
    fn faulty_bot_forfeits() {
        let config = TournamentConfig::default();
        let result = RpslsExecutor.execute(
            Arc::new(BrokenBot("Bad")),
            Arc::new(FixedBot::new("Good")),
            &config,
            &CancelToken::new(),
        );
        assert_eq!(result.outcome, Outcome::Player1Error);
        assert_eq!(result.winner_name, "Good");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn cancellation_yields_unknown() {
        let config = TournamentConfig::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = RpslsExecutor.execute(
            Arc::new(FixedBot::new("A")),
            Arc::new(FixedBot::new("B")),
            &config,
            &cancel,
        );
        assert_eq!(result.outcome, Outcome::Unknown);
        assert!(result.errors.iter().any(|e| e == "cancelled"));
    }
}
