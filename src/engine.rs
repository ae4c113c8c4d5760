//! Group-stage tournament engine.
//!
//! The engine is a pull-driven state machine: the dispatcher feeds it the
//! completed results of the last batch ([`GroupStageEngine::record`]) and
//! asks for the next one ([`GroupStageEngine::next_batch`]); an empty answer
//! means the tournament is decided. Rounds advance in lockstep across all
//! groups, and once the group stage completes the top of each group is
//! seeded into a single-elimination knockout.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, trace, warn};

use crate::bot::TeamName;
use crate::error::ScoringError;
use crate::game::{MatchResult, Outcome};
use crate::schedule::{
    form_groups, group_label, opening_pairings, pair_round, round_robin_rounds, seed_order, Group,
};
use crate::scoring::ScoreBoard;

/// A match the engine wants played, bot 1 listed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOrder {
    /// Slot-1 team.
    pub bot1: TeamName,
    /// Slot-2 team.
    pub bot2: TeamName,
}

/// Which stage a round batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoundPhase {
    /// Group-stage round robin.
    Groups,
    /// Single-elimination bracket.
    Knockout,
}

/// One dispatchable round: every order must complete (or be cancelled)
/// before the engine produces the next batch.
#[derive(Debug, Clone)]
pub struct RoundBatch {
    /// 1-indexed batch number across the whole tournament.
    pub number: u32,
    /// Stage this batch belongs to.
    pub phase: RoundPhase,
    /// The matches to dispatch, in no particular order.
    pub orders: Vec<MatchOrder>,
}

struct GroupSlot {
    members: Vec<TeamName>,
    rounds: Vec<Vec<(TeamName, TeamName)>>,
}

enum Phase {
    /// Next group round index to dispatch.
    GroupRound(usize),
    /// A knockout batch is in flight; the next call resolves it.
    KnockoutDispatched,
    Done,
}

/// Drives one tournament: round-robin groups, then a knockout bracket.
pub struct GroupStageEngine {
    groups: Vec<GroupSlot>,
    board: ScoreBoard,
    phase: Phase,
    batch_number: u32,
    group_round_count: usize,
    advance_per_group: usize,
    draw_replays: u32,
    /// Seed position per qualifier; lower is better. Filled at advancement.
    seed_rank: HashMap<TeamName, usize>,
    /// Pairs dispatched in the current knockout batch.
    outstanding: Vec<(TeamName, TeamName)>,
    /// Winners decided so far in the current knockout round.
    round_winners: Vec<TeamName>,
    /// Teams skipping the current knockout round.
    byes: Vec<TeamName>,
    /// Replays already granted per knockout pair.
    replays_used: HashMap<(TeamName, TeamName), u32>,
    /// Results of the last recorded batch, for knockout resolution.
    last_results: Vec<MatchResult>,
    champion: Option<TeamName>,
}

impl GroupStageEngine {
    /// Builds groups and schedules for the given roster.
    pub fn new(
        teams: Vec<TeamName>,
        group_size: usize,
        advance_per_group: usize,
        draw_replays: u32,
    ) -> Self {
        let board = ScoreBoard::new(teams.clone());
        let groups: Vec<GroupSlot> = form_groups(teams, group_size)
            .into_iter()
            .map(|members| GroupSlot {
                rounds: round_robin_rounds(&members),
                members,
            })
            .collect();
        let group_round_count = groups.iter().map(|g| g.rounds.len()).max().unwrap_or(0);
        for (index, group) in groups.iter().enumerate() {
            info!("group {}: {}", group_label(index), group.members.join(", "));
        }
        GroupStageEngine {
            groups,
            board,
            phase: Phase::GroupRound(0),
            batch_number: 0,
            group_round_count,
            advance_per_group,
            draw_replays,
            seed_rank: HashMap::new(),
            outstanding: Vec::new(),
            round_winners: Vec::new(),
            byes: Vec::new(),
            replays_used: HashMap::new(),
            last_results: Vec::new(),
            champion: None,
        }
    }

    /// Feeds back the completed results of the previously issued batch.
    ///
    /// Results with [`Outcome::Unknown`] (cancelled matches, missing
    /// executors) are kept for bracket resolution but never reach the
    /// scorer.
    ///
    /// # Errors
    ///
    /// Propagates [`ScoringError::DuplicateMatch`]; feeding the same
    /// result twice is engine misuse.
    pub fn record(&mut self, results: &[MatchResult]) -> Result<(), ScoringError> {
        for result in results {
            if result.outcome == Outcome::Unknown {
                warn!(
                    "match {} ({} vs {}) produced no outcome; standings unchanged",
                    result.match_id, result.bot1_name, result.bot2_name
                );
            } else {
                self.board.apply(result)?;
            }
        }
        self.last_results.extend(results.iter().cloned());
        Ok(())
    }

    /// Produces the next round batch, or `None` once the tournament is
    /// decided.
    pub fn next_batch(&mut self) -> Option<RoundBatch> {
        match self.phase {
            Phase::GroupRound(round) => {
                self.last_results.clear();
                if round < self.group_round_count {
                    let orders: Vec<MatchOrder> = self
                        .groups
                        .iter()
                        .filter_map(|g| g.rounds.get(round))
                        .flatten()
                        .map(|(a, b)| MatchOrder {
                            bot1: a.clone(),
                            bot2: b.clone(),
                        })
                        .collect();
                    self.phase = Phase::GroupRound(round + 1);
                    trace!("group round {} with {} matches", round + 1, orders.len());
                    return Some(self.batch(RoundPhase::Groups, orders));
                }
                self.enter_knockout()
            }
            Phase::KnockoutDispatched => {
                let replays = self.resolve_knockout_batch();
                if !replays.is_empty() {
                    self.outstanding = replays.clone();
                    trace!("replaying drawn knockout matches");
                    return Some(self.knockout_batch(replays));
                }

                // Round decided: winners and byes form the next field.
                let mut field: Vec<TeamName> = Vec::new();
                field.append(&mut self.round_winners);
                field.append(&mut self.byes);
                field.sort_by_key(|team| self.seed_rank.get(team).copied().unwrap_or(usize::MAX));
                self.seed_rank.retain(|team, _| field.contains(team));
                self.dispatch_knockout_field(field)
            }
            Phase::Done => None,
        }
    }

    /// True once a champion is decided (or the roster collapsed to one).
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// The knockout winner, once the tournament is finished.
    pub fn champion(&self) -> Option<&TeamName> {
        self.champion.as_ref()
    }

    /// The standings board.
    pub fn board(&self) -> &ScoreBoard {
        &self.board
    }

    /// Snapshot of all groups with their internal rankings.
    pub fn groups(&self, event_id: &str, event_name: &str) -> Vec<Group> {
        self.groups
            .iter()
            .enumerate()
            .map(|(index, slot)| Group {
                group_id: index as u32 + 1,
                group_label: group_label(index),
                event_id: event_id.to_owned(),
                event_name: event_name.to_owned(),
                bots: slot.members.clone(),
                rankings: self.group_rankings(slot),
            })
            .collect()
    }

    fn batch(&mut self, phase: RoundPhase, orders: Vec<MatchOrder>) -> RoundBatch {
        self.batch_number += 1;
        RoundBatch {
            number: self.batch_number,
            phase,
            orders,
        }
    }

    fn knockout_batch(&mut self, pairings: Vec<(TeamName, TeamName)>) -> RoundBatch {
        let orders = pairings
            .into_iter()
            .map(|(a, b)| MatchOrder { bot1: a, bot2: b })
            .collect();
        self.batch(RoundPhase::Knockout, orders)
    }

    /// Group-internal rankings: the global order restricted to members,
    /// with placements renumbered inside the group.
    fn group_rankings(&self, slot: &GroupSlot) -> Vec<crate::scoring::RankedStanding> {
        self.board
            .rankings()
            .into_iter()
            .filter(|r| slot.members.contains(&r.team_name))
            .enumerate()
            .map(|(index, mut ranked)| {
                ranked.final_placement = index as u32 + 1;
                ranked
            })
            .collect()
    }

    /// Seeds the qualifiers and dispatches the opening knockout round.
    fn enter_knockout(&mut self) -> Option<RoundBatch> {
        let qualifiers: Vec<Vec<TeamName>> = self
            .groups
            .iter()
            .map(|slot| {
                self.group_rankings(slot)
                    .into_iter()
                    .take(self.advance_per_group)
                    .map(|r| r.team_name)
                    .collect()
            })
            .collect();

        for (rank, team) in seed_order(&qualifiers).into_iter().enumerate() {
            self.seed_rank.insert(team, rank);
        }
        info!(
            "group stage complete; {} bots advance to the knockout",
            self.seed_rank.len()
        );

        if self.seed_rank.len() <= 1 {
            self.champion = self.seed_rank.keys().next().cloned();
            self.phase = Phase::Done;
            return None;
        }

        // The opening round is cross-paired rather than strictly seeded.
        let pairings = opening_pairings(&qualifiers);
        let paired: Vec<&TeamName> = pairings.iter().flat_map(|(a, b)| [a, b]).collect();
        let mut byes: Vec<TeamName> = self
            .seed_rank
            .keys()
            .filter(|team| !paired.contains(team))
            .cloned()
            .collect();
        byes.sort_by_key(|team| self.seed_rank[team]);

        self.byes = byes;
        self.round_winners = Vec::new();
        self.outstanding = pairings.clone();
        self.phase = Phase::KnockoutDispatched;
        Some(self.knockout_batch(pairings))
    }

    /// Pairs a seeded field and dispatches it, or crowns the champion when
    /// only one team is left.
    fn dispatch_knockout_field(&mut self, field: Vec<TeamName>) -> Option<RoundBatch> {
        if field.len() <= 1 {
            self.champion = field.into_iter().next();
            if let Some(champion) = &self.champion {
                info!("champion: {champion}");
            }
            self.phase = Phase::Done;
            return None;
        }
        let (pairings, byes) = pair_round(&field);
        self.byes = byes;
        self.round_winners = Vec::new();
        self.outstanding = pairings.clone();
        Some(self.knockout_batch(pairings))
    }

    /// Applies the recorded results to the outstanding knockout pairs.
    /// Returns the pairs that must be replayed.
    fn resolve_knockout_batch(&mut self) -> Vec<(TeamName, TeamName)> {
        let outstanding = std::mem::take(&mut self.outstanding);
        let mut replays = Vec::new();
        for (a, b) in outstanding {
            let found = self
                .last_results
                .iter()
                .find(|r| {
                    (r.bot1_name == a && r.bot2_name == b)
                        || (r.bot1_name == b && r.bot2_name == a)
                })
                .map(|r| (r.bot1_name == a, r.outcome));
            let winner = match found {
                Some((aligned, outcome)) => {
                    let decision = self.knockout_winner(&a, &b, aligned, outcome);
                    if decision.is_none() {
                        replays.push((a, b));
                        continue;
                    }
                    decision
                }
                None => {
                    // The batch was cut short (stop); the higher seed moves
                    // on so the bracket stays total.
                    warn!("no result for knockout match {a} vs {b}");
                    Some(self.higher_seed(&a, &b))
                }
            };
            if let Some(winner) = winner {
                self.round_winners.push(winner);
            }
        }
        self.last_results.clear();
        replays
    }

    /// Decides one knockout match; `None` means the draw still has replay
    /// budget and the pair goes again.
    fn knockout_winner(
        &mut self,
        a: &TeamName,
        b: &TeamName,
        aligned: bool,
        outcome: Outcome,
    ) -> Option<TeamName> {
        match outcome {
            Outcome::Player1Wins | Outcome::Player2Error => {
                Some(if aligned { a.clone() } else { b.clone() })
            }
            Outcome::Player2Wins | Outcome::Player1Error => {
                Some(if aligned { b.clone() } else { a.clone() })
            }
            Outcome::Draw => {
                let key = if a < b {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                };
                let used = self.replays_used.entry(key).or_insert(0);
                if *used < self.draw_replays {
                    *used += 1;
                    None
                } else {
                    trace!("persistent draw between {a} and {b}; seeding decides");
                    Some(self.higher_seed(a, b))
                }
            }
            Outcome::BothError | Outcome::Unknown => Some(self.higher_seed(a, b)),
        }
    }

    fn higher_seed(&self, a: &TeamName, b: &TeamName) -> TeamName {
        let rank_a = self.seed_rank.get(a).copied().unwrap_or(usize::MAX);
        let rank_b = self.seed_rank.get(b).copied().unwrap_or(usize::MAX);
        if rank_a <= rank_b {
            a.clone()
        } else {
            b.clone()
        }
    }
}
