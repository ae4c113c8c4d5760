//! Points, standings, rankings and tournament statistics.
//!
//! Scoring is deterministic and order-independent: a match is worth a fixed
//! number of points decided solely by its outcome, and rankings are computed
//! from final standings with a total-order tie-break chain.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Serialize;

use crate::bot::TeamName;
use crate::error::ScoringError;
use crate::game::{GameType, MatchResult, Outcome};
use crate::manager::TournamentInfo;

/// Points awarded to winner and loser of a decided match.
const WIN_POINTS: u32 = 3;
/// Points awarded to each side of a draw.
const DRAW_POINTS: u32 = 1;

/// Points awarded to (bot 1, bot 2) for an outcome.
///
/// A bot that errs forfeits its points to the opponent; when both err,
/// nobody scores.
///
/// # Errors
///
/// [`ScoringError::InvalidOutcome`] when called with [`Outcome::Unknown`];
/// such results must never reach the scorer.
pub fn match_points(outcome: Outcome) -> Result<(u32, u32), ScoringError> {
    match outcome {
        Outcome::Player1Wins | Outcome::Player2Error => Ok((WIN_POINTS, 0)),
        Outcome::Player2Wins | Outcome::Player1Error => Ok((0, WIN_POINTS)),
        Outcome::Draw => Ok((DRAW_POINTS, DRAW_POINTS)),
        Outcome::BothError => Ok((0, 0)),
        Outcome::Unknown => Err(ScoringError::InvalidOutcome),
    }
}

/// Per-bot accumulator over one tournament.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TournamentStanding {
    /// Matches won (including walkovers from opponent errors).
    pub wins: u32,
    /// Matches lost (including own errors).
    pub losses: u32,
    /// Matches drawn.
    pub draws: u32,
    /// Points accumulated under the fixed mapping.
    pub total_score: u32,
    /// Points conceded to opponents across the same matches.
    pub total_opponent_score: u32,
    /// Opponents faced, in match order; repeats are kept (knockout replays).
    pub opponents_played: Vec<TeamName>,
    /// Matches in which this bot erred.
    pub error_count: u32,
}

impl TournamentStanding {
    /// Number of matches this standing covers.
    pub fn matches_played(&self) -> usize {
        self.opponents_played.len()
    }
}

/// A standing with its team and 1-indexed final placement attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedStanding {
    /// The team being ranked.
    pub team_name: TeamName,
    /// 1-indexed placement; no two teams share one.
    pub final_placement: u32,
    /// The standing backing the placement.
    pub standing: TournamentStanding,
}

/// Single-writer standings for one tournament.
///
/// The board remembers which match ids it has applied and rejects replays,
/// so feeding it from an at-least-once pipeline stays safe.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    standings: HashMap<TeamName, TournamentStanding>,
    applied: HashSet<u64>,
}

impl ScoreBoard {
    /// Creates a board with an empty standing for every team, so bots that
    /// never complete a match still appear in rankings.
    pub fn new(teams: impl IntoIterator<Item = TeamName>) -> Self {
        ScoreBoard {
            standings: teams
                .into_iter()
                .map(|team| (team, TournamentStanding::default()))
                .collect(),
            applied: HashSet::new(),
        }
    }

    /// Applies one match result to both participants' standings.
    ///
    /// # Errors
    ///
    /// [`ScoringError::InvalidOutcome`] for `Unknown` results and
    /// [`ScoringError::DuplicateMatch`] when the same `match_id` is applied
    /// twice. The board is unchanged in both cases.
    pub fn apply(&mut self, result: &MatchResult) -> Result<(), ScoringError> {
        let (points1, points2) = match_points(result.outcome)?;
        if !self.applied.insert(result.match_id) {
            return Err(ScoringError::DuplicateMatch(result.match_id));
        }

        {
            let standing = self.standings.entry(result.bot1_name.clone()).or_default();
            standing.total_score += points1;
            standing.total_opponent_score += points2;
            standing.opponents_played.push(result.bot2_name.clone());
            match result.outcome {
                Outcome::Player1Wins | Outcome::Player2Error => standing.wins += 1,
                Outcome::Player2Wins | Outcome::Player1Error | Outcome::BothError => {
                    standing.losses += 1
                }
                Outcome::Draw => standing.draws += 1,
                Outcome::Unknown => unreachable!("rejected above"),
            }
            if matches!(result.outcome, Outcome::Player1Error | Outcome::BothError) {
                standing.error_count += 1;
            }
        }
        {
            let standing = self.standings.entry(result.bot2_name.clone()).or_default();
            standing.total_score += points2;
            standing.total_opponent_score += points1;
            standing.opponents_played.push(result.bot1_name.clone());
            match result.outcome {
                Outcome::Player2Wins | Outcome::Player1Error => standing.wins += 1,
                Outcome::Player1Wins | Outcome::Player2Error | Outcome::BothError => {
                    standing.losses += 1
                }
                Outcome::Draw => standing.draws += 1,
                Outcome::Unknown => unreachable!("rejected above"),
            }
            if matches!(result.outcome, Outcome::Player2Error | Outcome::BothError) {
                standing.error_count += 1;
            }
        }
        Ok(())
    }

    /// The standing for one team, if it is on the board.
    pub fn standing(&self, team: &str) -> Option<&TournamentStanding> {
        self.standings.get(team)
    }

    /// All standings, unordered.
    pub fn standings(&self) -> &HashMap<TeamName, TournamentStanding> {
        &self.standings
    }

    /// Ranks every team on the board.
    ///
    /// Sort key, most significant first: total score (more first), wins
    /// (more first), opponent score (fewer first), team name
    /// (lexicographic). Placements are 1-indexed and always distinct.
    pub fn rankings(&self) -> Vec<RankedStanding> {
        let mut ranked: Vec<(&TeamName, &TournamentStanding)> = self.standings.iter().collect();
        ranked.sort_by(|(name_a, a), (name_b, b)| {
            b.total_score
                .cmp(&a.total_score)
                .then(b.wins.cmp(&a.wins))
                .then(a.total_opponent_score.cmp(&b.total_opponent_score))
                .then(name_a.cmp(name_b))
        });
        ranked
            .into_iter()
            .enumerate()
            .map(|(index, (team, standing))| RankedStanding {
                team_name: team.clone(),
                final_placement: index as u32 + 1,
                standing: standing.clone(),
            })
            .collect()
    }
}

/// Aggregate figures over one tournament.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentStatistics {
    /// Matches recorded, including unknown-outcome ones.
    pub total_matches: usize,
    /// Round batches the tournament ran.
    pub total_rounds: u32,
    /// Wall-clock span of the tournament.
    pub tournament_duration: Duration,
    /// Mean match duration; zero when no matches ran.
    pub average_match_duration: Duration,
    /// Matches whose error list is non-empty.
    pub total_errors: usize,
    /// Matches that recorded at least one timeout.
    pub total_timeouts: usize,
    /// Team with the most match appearances; ties break lexicographically.
    pub most_active_bot: Option<TeamName>,
    /// Team with the highest total score; ties break lexicographically.
    pub highest_scoring_bot: Option<TeamName>,
    /// Match count per game type.
    pub matches_by_game: HashMap<GameType, usize>,
}

/// Computes statistics for a tournament from its record and standings.
pub fn calculate_statistics(info: &TournamentInfo, board: &ScoreBoard) -> TournamentStatistics {
    let results = &info.match_results;
    let total_matches = results.len();

    let tournament_duration = match (info.start_time, info.end_time) {
        (Some(start), Some(end)) => (end - start).unsigned_abs(),
        _ => Duration::ZERO,
    };
    let average_match_duration = if total_matches == 0 {
        Duration::ZERO
    } else {
        results.iter().map(|r| r.duration).sum::<Duration>() / total_matches as u32
    };

    let mut appearances: HashMap<&TeamName, usize> = HashMap::new();
    let mut matches_by_game: HashMap<GameType, usize> = HashMap::new();
    for result in results {
        *appearances.entry(&result.bot1_name).or_default() += 1;
        *appearances.entry(&result.bot2_name).or_default() += 1;
        *matches_by_game.entry(result.game_type).or_default() += 1;
    }
    let most_active_bot = appearances
        .iter()
        .max_by(|(name_a, count_a), (name_b, count_b)| {
            count_a.cmp(count_b).then(name_b.cmp(name_a))
        })
        .map(|(name, _)| (*name).clone());
    let highest_scoring_bot = board
        .standings()
        .iter()
        .max_by(|(name_a, a), (name_b, b)| {
            a.total_score
                .cmp(&b.total_score)
                .then(name_b.cmp(name_a))
        })
        .map(|(name, _)| (*name).clone());

    TournamentStatistics {
        total_matches,
        total_rounds: info.total_rounds,
        tournament_duration,
        average_match_duration,
        total_errors: results.iter().filter(|r| !r.errors.is_empty()).count(),
        total_timeouts: results.iter().filter(|r| r.had_timeout()).count(),
        most_active_bot,
        highest_scoring_bot,
        matches_by_game,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn result(id: u64, bot1: &str, bot2: &str, outcome: Outcome) -> MatchResult {
        MatchResult {
            match_id: id,
            bot1_name: bot1.to_owned(),
            bot2_name: bot2.to_owned(),
            game_type: GameType::Rpsls,
            outcome,
            winner_name: match outcome {
                Outcome::Player1Wins | Outcome::Player2Error => bot1.to_owned(),
                Outcome::Player2Wins | Outcome::Player1Error => bot2.to_owned(),
                _ => String::new(),
            },
            bot1_score: 0,
            bot2_score: 0,
            match_log: vec![],
            errors: match outcome {
                Outcome::Player1Error | Outcome::Player2Error => vec!["timeout".to_owned()],
                Outcome::BothError => vec!["a".to_owned(), "b".to_owned()],
                _ => vec![],
            },
            start_time: OffsetDateTime::UNIX_EPOCH,
            end_time: OffsetDateTime::UNIX_EPOCH,
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn points_follow_the_fixed_mapping() {
        assert_eq!(match_points(Outcome::Player1Wins).unwrap(), (3, 0));
        assert_eq!(match_points(Outcome::Player2Wins).unwrap(), (0, 3));
        assert_eq!(match_points(Outcome::Draw).unwrap(), (1, 1));
        assert_eq!(match_points(Outcome::Player1Error).unwrap(), (0, 3));
        assert_eq!(match_points(Outcome::Player2Error).unwrap(), (3, 0));
        assert_eq!(match_points(Outcome::BothError).unwrap(), (0, 0));
        assert_eq!(
            match_points(Outcome::Unknown),
            Err(ScoringError::InvalidOutcome)
        );
    }

    #[test]
    fn per_match_point_totals_are_bounded() {
        for outcome in [
            Outcome::Player1Wins,
            Outcome::Player2Wins,
            Outcome::Draw,
            Outcome::Player1Error,
            Outcome::Player2Error,
            Outcome::BothError,
        ] {
            let (p1, p2) = match_points(outcome).unwrap();
            assert!(matches!(p1 + p2, 0 | 2 | 3), "{outcome:?}");
        }
    }

    #[test]
    fn three_bot_round_robin_scenario() {
        // (T1,T2) -> P1Wins, (T2,T3) -> P1Wins, (T1,T3) -> Draw.
        let mut board = ScoreBoard::new(["Team1", "Team2", "Team3"].map(String::from));
        board
            .apply(&result(1, "Team1", "Team2", Outcome::Player1Wins))
            .unwrap();
        board
            .apply(&result(2, "Team2", "Team3", Outcome::Player1Wins))
            .unwrap();
        board
            .apply(&result(3, "Team1", "Team3", Outcome::Draw))
            .unwrap();

        let t1 = board.standing("Team1").unwrap();
        assert_eq!((t1.total_score, t1.wins, t1.draws), (4, 1, 1));
        let t2 = board.standing("Team2").unwrap();
        assert_eq!((t2.total_score, t2.wins, t2.losses), (3, 1, 1));
        let t3 = board.standing("Team3").unwrap();
        assert_eq!((t3.total_score, t3.draws, t3.losses), (1, 1, 1));

        let rankings = board.rankings();
        let order: Vec<&str> = rankings.iter().map(|r| r.team_name.as_str()).collect();
        assert_eq!(order, ["Team1", "Team2", "Team3"]);
        let placements: Vec<u32> = rankings.iter().map(|r| r.final_placement).collect();
        assert_eq!(placements, [1, 2, 3]);
    }

    #[test]
    fn standings_balance_matches_played() {
        let mut board = ScoreBoard::default();
        board
            .apply(&result(1, "A", "B", Outcome::Player2Error))
            .unwrap();
        board.apply(&result(2, "A", "B", Outcome::BothError)).unwrap();
        board.apply(&result(3, "B", "A", Outcome::Draw)).unwrap();
        for team in ["A", "B"] {
            let s = board.standing(team).unwrap();
            assert_eq!(
                (s.wins + s.losses + s.draws) as usize,
                s.matches_played(),
                "{team}"
            );
        }
        let b = board.standing("B").unwrap();
        assert_eq!(b.error_count, 2);
        let a = board.standing("A").unwrap();
        assert_eq!(a.error_count, 1);
    }

    #[test]
    fn score_conservation_over_a_tournament() {
        let mut board = ScoreBoard::default();
        let results = [
            result(1, "A", "B", Outcome::Player1Wins),
            result(2, "B", "C", Outcome::Draw),
            result(3, "A", "C", Outcome::BothError),
        ];
        let mut expected = 0;
        for r in &results {
            board.apply(r).unwrap();
            let (p1, p2) = match_points(r.outcome).unwrap();
            expected += p1 + p2;
        }
        let total: u32 = board.standings().values().map(|s| s.total_score).sum();
        assert_eq!(total, expected);
    }

    #[test]
    fn duplicate_matches_are_rejected() {
        let mut board = ScoreBoard::default();
        let r = result(7, "A", "B", Outcome::Draw);
        board.apply(&r).unwrap();
        assert_eq!(board.apply(&r), Err(ScoringError::DuplicateMatch(7)));
        // The first application stands, the replay changed nothing.
        assert_eq!(board.standing("A").unwrap().total_score, 1);
    }

    #[test]
    fn ranking_tie_breaks_run_in_order() {
        let mut board = ScoreBoard::default();
        // Zed and Ann end on identical records; the name decides.
        board.apply(&result(1, "Zed", "Mid", Outcome::Player1Wins)).unwrap();
        board.apply(&result(2, "Ann", "Mid", Outcome::Player1Wins)).unwrap();
        let rankings = board.rankings();
        assert_eq!(rankings[0].team_name, "Ann");
        assert_eq!(rankings[1].team_name, "Zed");
        assert_eq!(rankings[2].team_name, "Mid");
        assert_eq!(
            rankings.iter().map(|r| r.final_placement).collect::<Vec<_>>(),
            [1, 2, 3]
        );
    }

    #[test]
    fn fewer_conceded_points_rank_higher() {
        let mut board = ScoreBoard::default();
        // A and B both finish on 3 points and one win, but A conceded 0
        // while B conceded 3.
        board.apply(&result(1, "A", "X", Outcome::Player1Wins)).unwrap();
        board.apply(&result(2, "B", "Y", Outcome::Player1Wins)).unwrap();
        board.apply(&result(3, "Y", "B", Outcome::Player1Wins)).unwrap();
        board.apply(&result(4, "X", "A", Outcome::BothError)).unwrap();
        let a = board.standing("A").unwrap();
        let b = board.standing("B").unwrap();
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.wins, b.wins);
        assert!(a.total_opponent_score < b.total_opponent_score);
        let rankings = board.rankings();
        let pos = |team: &str| {
            rankings
                .iter()
                .position(|r| r.team_name == team)
                .unwrap()
        };
        assert!(pos("A") < pos("B"));
    }

    #[test]
    fn statistics_summarize_the_record() {
        use crate::manager::{TournamentInfo, TournamentState};

        let mut board = ScoreBoard::default();
        let results = vec![
            result(1, "A", "B", Outcome::Player1Wins),
            result(2, "A", "C", Outcome::Player1Error),
            result(3, "B", "C", Outcome::Draw),
        ];
        for r in &results {
            board.apply(r).unwrap();
        }
        let info = TournamentInfo {
            tournament_id: "t".to_owned(),
            game_type: GameType::Rpsls,
            state: TournamentState::Completed,
            bots: vec!["A".into(), "B".into(), "C".into()],
            match_results: results,
            total_rounds: 3,
            start_time: Some(OffsetDateTime::UNIX_EPOCH),
            end_time: Some(OffsetDateTime::UNIX_EPOCH + Duration::from_secs(60)),
        };
        let stats = calculate_statistics(&info, &board);
        assert_eq!(stats.total_matches, 3);
        assert_eq!(stats.total_rounds, 3);
        assert_eq!(stats.tournament_duration, Duration::from_secs(60));
        assert_eq!(stats.average_match_duration, Duration::from_millis(10));
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.total_timeouts, 1);
        // A and B both appear twice; lexicographic tie-break picks A.
        assert_eq!(stats.most_active_bot.as_deref(), Some("A"));
        assert_eq!(stats.highest_scoring_bot.as_deref(), Some("C"));
        assert_eq!(stats.matches_by_game[&GameType::Rpsls], 3);
    }
}
