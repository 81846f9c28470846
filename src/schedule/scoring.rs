//! Compactness costs used to order candidates and the balance score used to rank
//! finished schedules. Lower is better everywhere.

use std::collections::{BTreeSet, HashMap};

use super::types::{CoachId, TeamId, TeamPair};

fn gap(a: usize, b: usize) -> i64 {
    (a as i64 - b as i64).abs() - 1
}

/// Idle slots between each team's two games, counting the new game for its two teams
pub fn team_spacing_cost(team_prev: &HashMap<TeamId, Vec<usize>>, pair: &TeamPair, slot: usize) -> i64 {
    team_prev
        .iter()
        .map(|(team, slots)| match slots.as_slice() {
            [a, b] => gap(*a, *b),
            [a] if pair.contains(*team) => gap(*a, slot),
            _ => 0,
        })
        .sum()
}

/// For every coach, number of games minus the span they cover, with the new game included
pub fn coach_spacing_cost(coach_prev: &HashMap<CoachId, Vec<usize>>, pair: &TeamPair, slot: usize) -> i64 {
    let mut coach_slots: HashMap<CoachId, Vec<usize>> = coach_prev.clone();
    for coach in pair.coaches() {
        coach_slots.entry(coach).or_default().push(slot);
    }

    coach_slots
        .values()
        .map(|slots| {
            let min = slots.iter().min().copied().unwrap_or(0) as i64;
            let max = slots.iter().max().copied().unwrap_or(0) as i64;
            slots.len() as i64 - (max - min)
        })
        .sum()
}

/// Mean of the latest used slot over the fields used so far
pub fn field_fill_cost(field_prev: &HashMap<usize, BTreeSet<usize>>) -> i64 {
    if field_prev.is_empty() {
        return 0;
    }
    let total: i64 = field_prev
        .values()
        .map(|slots| slots.iter().next_back().map_or(0, |&s| s as i64))
        .sum();
    total / field_prev.len() as i64
}

/// Idle slots between the two games of every team that already played twice
pub fn team_gap_total(team_prev: &HashMap<TeamId, Vec<usize>>) -> i64 {
    team_prev
        .values()
        .map(|slots| match slots.as_slice() {
            [a, b] => gap(*a, *b),
            _ => 0,
        })
        .sum()
}

/// Lowest slot, highest slot and number of games of a coach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoachSpread {
    pub min: usize,
    pub max: usize,
    pub count: usize,
}

pub fn coach_spreads(coach_prev: &HashMap<CoachId, Vec<usize>>) -> HashMap<CoachId, CoachSpread> {
    coach_prev
        .iter()
        .filter_map(|(&coach, slots)| {
            let min = *slots.iter().min()?;
            let max = *slots.iter().max()?;
            Some((coach, CoachSpread { min, max, count: slots.len() }))
        })
        .collect()
}

/// Balance contribution of the final game: team gaps it closes plus how tightly
/// packed it leaves each of its coaches
pub fn final_game_score(
    team_prev: &HashMap<TeamId, Vec<usize>>,
    spreads: &HashMap<CoachId, CoachSpread>,
    pair: &TeamPair,
    slot: usize,
) -> i64 {
    let mut sum = 0;
    for team in pair.teams() {
        if let Some(&first) = team_prev.get(&team).and_then(|s| s.first()) {
            sum += gap(first, slot);
        }
    }
    for coach in pair.coaches() {
        if let Some(spread) = spreads.get(&coach) {
            let min = spread.min.min(slot) as i64;
            let max = spread.max.max(slot) as i64;
            let count = spread.count as i64 + 1;
            sum += count - (max - min + 1);
        }
    }
    sum
}

/// How many of `count` sorted candidates are kept at a given parent depth
pub fn branching_cap(depth: usize, count: usize) -> usize {
    match (depth, count) {
        (d, c) if d > 30 && c >= 30 => 2,
        (d, c) if d > 20 && c >= 20 => 3,
        (d, c) if d > 10 && c >= 10 => 4,
        (d, c) if d > 5 && c >= 5 => 5,
        (_, c) if c >= 10 => 10,
        (_, c) => c,
    }
}
