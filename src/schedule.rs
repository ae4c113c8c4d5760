//! Group formation, round-robin scheduling and knockout pairing.
//!
//! Everything in this module is pure data shuffling: the functions take
//! team names and produce pairings, leaving dispatch and scoring to the
//! engine. Determinism comes from sorting names up front; match *dispatch*
//! order is free, but the generated structure never depends on it.

use serde::Serialize;

use crate::bot::TeamName;
use crate::scoring::RankedStanding;

/// One group-stage pool.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    /// 1-indexed group number.
    pub group_id: u32,
    /// Display label: "A", "B", ...
    pub group_label: String,
    /// Identifier of the event (series step) this group belongs to.
    pub event_id: String,
    /// Human-readable event name.
    pub event_name: String,
    /// Members in assignment order.
    pub bots: Vec<TeamName>,
    /// Current standings snapshot, best first.
    pub rankings: Vec<RankedStanding>,
}

/// Label for the 0-indexed group `index`: A, B, ..., Z, AA, AB, ...
pub fn group_label(index: usize) -> String {
    let mut label = String::new();
    let mut value = index;
    loop {
        label.insert(0, (b'A' + (value % 26) as u8) as char);
        if value < 26 {
            break;
        }
        value = value / 26 - 1;
    }
    label
}

/// Partitions teams into `⌈N/k⌉` groups of size at most `k`.
///
/// Teams are sorted lexicographically for determinism and then assigned
/// serpentine-style (A B C, C B A, A B C, ...), which keeps group sizes
/// within one of each other.
pub fn form_groups(mut teams: Vec<TeamName>, group_size: usize) -> Vec<Vec<TeamName>> {
    if teams.is_empty() {
        return Vec::new();
    }
    teams.sort();
    let count = teams.len().div_ceil(group_size);
    let mut groups = vec![Vec::new(); count];
    for (i, team) in teams.into_iter().enumerate() {
        let lap = i / count;
        let pos = i % count;
        let index = if lap % 2 == 0 { pos } else { count - 1 - pos };
        groups[index].push(team);
    }
    groups
}

/// Circle-method round robin over one group.
///
/// Produces `m-1` rounds for an even member count and `m` rounds with one
/// bye per round for an odd count; every unordered pair appears exactly
/// once across the schedule.
pub fn round_robin_rounds(members: &[TeamName]) -> Vec<Vec<(TeamName, TeamName)>> {
    let mut slots: Vec<Option<TeamName>> = members.iter().cloned().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None); // bye
    }
    let n = slots.len();
    if n < 2 {
        return Vec::new();
    }

    let mut rounds = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        let mut round = Vec::with_capacity(n / 2);
        for i in 0..n / 2 {
            if let (Some(a), Some(b)) = (&slots[i], &slots[n - 1 - i]) {
                round.push((a.clone(), b.clone()));
            }
        }
        rounds.push(round);
        slots[1..].rotate_right(1);
    }
    rounds
}

/// Seed order for the knockout: group winners first (groups in label
/// order), then runners-up, and so on.
pub fn seed_order(qualifiers: &[Vec<TeamName>]) -> Vec<TeamName> {
    let deepest = qualifiers.iter().map(Vec::len).max().unwrap_or(0);
    let mut seeds = Vec::new();
    for rank in 0..deepest {
        for group in qualifiers {
            if let Some(team) = group.get(rank) {
                seeds.push(team.clone());
            }
        }
    }
    seeds
}

/// Opening knockout pairings.
///
/// With two qualifiers per group the winners are cross-paired with the next
/// group's runner-up (A1–B2, B1–A2, ...). Any other shape falls back to
/// seeding the field and pairing it like a later round.
pub fn opening_pairings(qualifiers: &[Vec<TeamName>]) -> Vec<(TeamName, TeamName)> {
    let cross_shaped = qualifiers.len() >= 2 && qualifiers.iter().all(|q| q.len() == 2);
    if cross_shaped {
        let count = qualifiers.len();
        (0..count)
            .map(|i| {
                let winner = qualifiers[i][0].clone();
                let runner_up = qualifiers[(i + 1) % count][1].clone();
                (winner, runner_up)
            })
            .collect()
    } else {
        pair_round(&seed_order(qualifiers)).0
    }
}

/// Pairs a seeded field for one knockout round: best against worst, second
/// against second-worst, and so on. An odd field gives its top seed a bye.
///
/// Returns the pairings and the byes (teams passing straight through).
pub fn pair_round(field: &[TeamName]) -> (Vec<(TeamName, TeamName)>, Vec<TeamName>) {
    let mut byes = Vec::new();
    let active = if field.len() % 2 == 1 {
        byes.push(field[0].clone());
        &field[1..]
    } else {
        field
    };
    let k = active.len();
    let pairings = (0..k / 2)
        .map(|i| (active[i].clone(), active[k - 1 - i].clone()))
        .collect();
    (pairings, byes)
}
