//! End-to-end tournament scenarios.

mod common;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use bot_arena::game::GameExecutor;
use bot_arena::match_runner::run_match;
use bot_arena::prelude::*;
use bot_arena::scoring::ScoreBoard;

use common::{
    CollectingPublisher, CountingExecutor, FaultyBot, Seen, SleepyBot, SteadyBot, TableExecutor,
};

fn scripted_registry(executor: impl GameExecutor + 'static) -> Arc<ExecutorRegistry> {
    let mut registry = ExecutorRegistry::new();
    registry.register(Box::new(executor));
    Arc::new(registry)
}

fn config() -> Arc<TournamentConfig> {
    Arc::new(
        TournamentConfig::builder()
            .with_group_size(3)
            .with_move_timeout(Duration::from_millis(200))
            .build()
            .unwrap(),
    )
}

#[test]
fn three_bot_tournament_ranks_and_sequences_rounds() {
    // Scripted outcomes: (T1,T2) -> P1Wins, (T2,T3) -> P1Wins, (T1,T3) -> Draw.
    let executor = TableExecutor {
        delay: Duration::from_millis(15),
        ..TableExecutor::new(
            GameType::Rpsls,
            &[
                ("Team1", "Team2", Outcome::Player1Wins),
                ("Team2", "Team3", Outcome::Player1Wins),
                ("Team1", "Team3", Outcome::Draw),
            ],
        )
    };
    let publisher = Arc::new(CollectingPublisher::default());
    let manager = TournamentManager::new(
        "scenario-1",
        GameType::Rpsls,
        vec![
            Arc::new(SteadyBot::new("Team1")),
            Arc::new(SteadyBot::new("Team2")),
            Arc::new(SteadyBot::new("Team3")),
        ],
        scripted_registry(executor),
        publisher.clone(),
        config(),
        ManagerSettings::default(),
        &CancelToken::new(),
    );
    manager.start().unwrap();
    assert_eq!(manager.wait(), TournamentState::Completed);

    // Group stage standings feed advancement; the Team1-Team2 knockout
    // final repeats the scripted Player1Wins. Rankings stay a total order
    // with Team1 on top.
    let rankings = manager.rankings();
    let order: Vec<&str> = rankings.iter().map(|r| r.team_name.as_str()).collect();
    assert_eq!(order, ["Team1", "Team2", "Team3"]);
    let placements: Vec<u32> = rankings.iter().map(|r| r.final_placement).collect();
    assert_eq!(placements, [1, 2, 3]);

    // Standings bookkeeping holds for every bot.
    for ranked in &rankings {
        let s = &ranked.standing;
        assert_eq!(
            (s.wins + s.losses + s.draws) as usize,
            s.opponents_played.len(),
            "{}",
            ranked.team_name
        );
    }

    // Score conservation: awarded points match the outcome table.
    let info = manager.info();
    let expected: u32 = info
        .match_results
        .iter()
        .map(|r| match r.outcome {
            Outcome::Draw => 2,
            Outcome::BothError => 0,
            _ => 3,
        })
        .sum();
    let total: u32 = rankings.iter().map(|r| r.standing.total_score).sum();
    assert_eq!(total, expected);

    // Round lockstep: every match published for round k completes before
    // round k+1 starts, and wall-clock timestamps agree.
    let events = publisher.events();
    let mut last_round_end: Option<time::OffsetDateTime> = None;
    let mut current_round_end: Option<time::OffsetDateTime> = None;
    for event in &events {
        match event {
            Seen::Round { .. } => {
                last_round_end = current_round_end.take().or(last_round_end);
            }
            Seen::Match(result) => {
                if let Some(previous_end) = last_round_end {
                    assert!(
                        result.start_time >= previous_end,
                        "round overlap: match started before the previous round finished"
                    );
                }
                current_round_end = Some(match current_round_end {
                    Some(end) => end.max(result.end_time),
                    None => result.end_time,
                });
            }
            _ => {}
        }
    }
    assert!(matches!(
        events.last(),
        Some(Seen::TournamentDone(TournamentState::Completed))
    ));
}

#[test]
fn sleeping_bot_times_out_and_forfeits() {
    let registry = ExecutorRegistry::with_builtin();
    let config = TournamentConfig::builder()
        .with_move_timeout(Duration::from_millis(40))
        .build()
        .unwrap();
    let result = run_match(
        &registry,
        Arc::new(SleepyBot {
            name: "Dozer".into(),
            delay: Duration::from_millis(500),
        }),
        Arc::new(SteadyBot::new("Brisk")),
        GameType::Rpsls,
        &config,
        &CancelToken::new(),
    );
    assert_eq!(result.outcome, Outcome::Player1Error);
    assert_eq!(result.winner_name, "Brisk");
    assert!(result.errors.iter().any(|e| e == "timeout"));

    let mut board = ScoreBoard::default();
    board.apply(&result).unwrap();
    let dozer = board.standing("Dozer").unwrap();
    assert_eq!((dozer.error_count, dozer.total_score), (1, 0));
    let brisk = board.standing("Brisk").unwrap();
    assert_eq!((brisk.wins, brisk.total_score), (1, 3));
}

#[test]
fn two_broken_bots_share_the_blame() {
    let registry = ExecutorRegistry::with_builtin();
    let config = TournamentConfig::default();
    let result = run_match(
        &registry,
        Arc::new(FaultyBot("Crash1")),
        Arc::new(FaultyBot("Crash2")),
        GameType::Rpsls,
        &config,
        &CancelToken::new(),
    );
    assert_eq!(result.outcome, Outcome::BothError);
    assert_eq!(result.winner_name, "");

    let mut board = ScoreBoard::default();
    board.apply(&result).unwrap();
    for name in ["Crash1", "Crash2"] {
        let standing = board.standing(name).unwrap();
        assert_eq!((standing.total_score, standing.error_count), (0, 1));
    }
}

#[test]
fn parallel_dispatch_never_exceeds_the_cap() {
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let executor = CountingExecutor {
        game: GameType::Rpsls,
        active: active.clone(),
        max_seen: max_seen.clone(),
        delay: Duration::from_millis(30),
    };
    let bots: Vec<Arc<dyn Bot>> = (0..8)
        .map(|i| Arc::new(SteadyBot::new(format!("team{i}"))) as Arc<dyn Bot>)
        .collect();
    let config = Arc::new(
        TournamentConfig::builder()
            .with_group_size(4)
            .with_max_parallel_matches(2)
            .build()
            .unwrap(),
    );
    let manager = TournamentManager::new(
        "parallel",
        GameType::Rpsls,
        bots,
        scripted_registry(executor),
        Arc::new(NoOpPublisher),
        config,
        ManagerSettings::default(),
        &CancelToken::new(),
    );
    manager.start().unwrap();
    assert_eq!(manager.wait(), TournamentState::Completed);
    let peak = max_seen.load(std::sync::atomic::Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak concurrency was {peak}");
}

#[test]
fn unknown_game_is_recorded_but_never_scored() {
    // A registry without executors: every match fails fast as Unknown.
    let manager = TournamentManager::new(
        "no-exec",
        GameType::SecurityGame,
        vec![
            Arc::new(SteadyBot::new("One")),
            Arc::new(SteadyBot::new("Two")),
        ],
        Arc::new(ExecutorRegistry::new()),
        Arc::new(NoOpPublisher),
        config(),
        ManagerSettings::default(),
        &CancelToken::new(),
    );
    manager.start().unwrap();
    assert_eq!(manager.wait(), TournamentState::Completed);

    let info = manager.info();
    assert!(!info.match_results.is_empty());
    for result in &info.match_results {
        assert_eq!(result.outcome, Outcome::Unknown);
        assert!(result.errors[0].starts_with("no executor:"));
    }
    for ranked in manager.rankings() {
        assert_eq!(ranked.standing.matches_played(), 0);
    }
}
