use std::collections::{BTreeSet, HashMap, HashSet};

use log::info;

use super::condition::Condition;
use super::node::{Candidate, Node};
use super::scoring::{
    branching_cap, coach_spacing_cost, coach_spreads, field_fill_cost, final_game_score,
    team_gap_total, team_spacing_cost,
};
use super::slot_utils::{intersect_slots, unique_slots};
use super::types::{CoachId, DivisionId, PairId, TeamId, TeamPair, GAMES_PER_TEAM};
use crate::error::SearchError;

/// What a partial schedule already uses, rebuilt from its path on every expansion
#[derive(Debug, Default, Clone)]
pub struct Branch {
    pub depth: usize,
    pub team_games: HashMap<TeamId, usize>,
    /// Leaf first
    pub team_slots: HashMap<TeamId, Vec<usize>>,
    pub coach_slots: HashMap<CoachId, Vec<usize>>,
    /// Keyed by index into the condition's field list
    pub field_slots: HashMap<usize, BTreeSet<usize>>,
    pub pairs_used: HashSet<PairId>,
    pub division_pairs: HashMap<DivisionId, Vec<PairId>>,
}

impl Branch {
    /// Walks a path (leaf first) once and collects its placements
    pub fn from_path<'a>(condition: &Condition, path: impl Iterator<Item = &'a Node>) -> Self {
        let mut branch = Branch::default();
        for node in path {
            branch.depth = branch.depth.max(node.depth);
            let pair = condition.pair(node.pair);
            for team in pair.teams() {
                *branch.team_games.entry(team).or_insert(0) += 1;
                branch.team_slots.entry(team).or_default().push(node.slot);
            }
            for coach in pair.coaches() {
                branch.coach_slots.entry(coach).or_default().push(node.slot);
            }
            for &field in condition.field_node(node.field_node).members() {
                branch.field_slots.entry(field).or_default().insert(node.slot);
            }
            branch.pairs_used.insert(node.pair);
            branch.division_pairs.entry(pair.division_id).or_default().push(node.pair);
        }
        branch
    }

    pub fn games_of(&self, team: TeamId) -> usize {
        self.team_games.get(&team).copied().unwrap_or(0)
    }

    /// Free slots of every field node, indexed like the condition's node list
    fn open_slots(&self, condition: &Condition) -> Vec<Vec<usize>> {
        let per_field: Vec<Vec<usize>> = condition
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let used = self.field_slots.get(&i);
                let free: Vec<usize> = field
                    .slots()
                    .filter(|slot| used.map_or(true, |u| !u.contains(slot)))
                    .collect();
                unique_slots(&free)
            })
            .collect();

        condition
            .field_nodes()
            .iter()
            .map(|node| {
                let mut members = node.members().iter();
                let first = members.next().map_or_else(Vec::new, |&i| per_field[i].clone());
                members.fold(first, |acc, &i| intersect_slots(&per_field[i], &acc))
            })
            .collect()
    }
}

/// Narrows a team's allowed slots by its own earlier game and its coach's games
///
/// A team's second game must be within two slots of its first. A coach's games stay
/// inside a window of `3 * coach_team_count` slots around their existing games and
/// never overlap.
pub fn resolve_team_slots(
    team_slots: &[usize],
    team_prev: &[usize],
    coach_prev: &[usize],
    coach_team_count: usize,
) -> Vec<usize> {
    let mut slots: Vec<usize> = match team_prev.first() {
        Some(&p) => {
            let near: Vec<usize> = [p.checked_sub(2), p.checked_sub(1), Some(p + 1), Some(p + 2)]
                .into_iter()
                .flatten()
                .collect();
            intersect_slots(team_slots, &near)
        }
        None => team_slots.to_vec(),
    };

    if let (Some(&min), Some(&max)) = (coach_prev.iter().min(), coach_prev.iter().max()) {
        let window = 3 * coach_team_count as i64;
        let diff = window - (max as i64 - min as i64);
        if diff < 0 {
            return Vec::new();
        }
        let (low, high) = (min as i64 - diff, max as i64 + diff);
        slots.retain(|&s| {
            let s = s as i64;
            s > low && s < high
        });
        slots.retain(|s| !coach_prev.contains(s));
    }

    unique_slots(&slots)
}

/// Checks that after placing `pair` every team of its division can still find
/// enough opponents among its remaining eligible pairings
pub fn division_feasible(condition: &Condition, branch: &Branch, pair: &TeamPair) -> bool {
    let division = pair.division_id;
    let mut rest: HashMap<TeamId, i64> = condition
        .division_teams(division)
        .iter()
        .map(|&t| (t, GAMES_PER_TEAM as i64))
        .collect();

    let placed = branch.division_pairs.get(&division).map_or(&[][..], Vec::as_slice);
    for p in placed.iter().map(|&id| condition.pair(id)).chain(std::iter::once(pair)) {
        for team in p.teams() {
            if let Some(r) = rest.get_mut(&team) {
                *r -= 1;
            }
        }
    }

    rest.iter().all(|(&team, &needed)| {
        let available = condition
            .team_pairs(team)
            .iter()
            .map(|&id| condition.pair(id))
            .filter(|p| p.teams().iter().all(|t| rest.get(t).copied().unwrap_or(0) > 0))
            .count() as i64;
        needed <= available
    })
}

/// Candidate next matches for a partial schedule, cheapest first and capped by depth
///
/// An empty result means the branch cannot be extended.
pub fn expand(condition: &Condition, branch: &Branch) -> Vec<Candidate> {
    let open = branch.open_slots(condition);

    // per remaining team and compatible field node, the slots it could take
    let mut options: HashMap<TeamId, HashMap<usize, Vec<usize>>> = HashMap::new();
    let mut counts: Vec<(TeamId, usize)> = Vec::new();
    for team in condition.teams() {
        if branch.games_of(team.id) >= GAMES_PER_TEAM {
            continue;
        }
        let format = condition.division_of(team.id).format;
        let team_prev = branch.team_slots.get(&team.id).map_or(&[][..], Vec::as_slice);
        let coach_prev = branch.coach_slots.get(&team.coach_id).map_or(&[][..], Vec::as_slice);
        let slots = resolve_team_slots(
            condition.team_slots(team.id),
            team_prev,
            coach_prev,
            condition.coach_team_count(team.coach_id),
        );

        let per_node: HashMap<usize, Vec<usize>> = condition
            .compatible_nodes(format)
            .map(|(i, _)| (i, intersect_slots(&slots, &open[i])))
            .collect();
        counts.push((team.id, per_node.values().map(Vec::len).sum()));
        options.insert(team.id, per_node);
    }

    // teams are visited by id, so ties go to the lowest id
    let Some(&(target, min_count)) = counts.iter().min_by_key(|(_, count)| *count) else {
        return Vec::new();
    };
    if min_count == 0 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for &pair_id in condition.team_pairs(target) {
        let pair = condition.pair(pair_id);
        if pair.teams().iter().any(|&t| branch.games_of(t) >= GAMES_PER_TEAM) {
            continue;
        }
        if branch.pairs_used.contains(&pair_id) {
            continue;
        }
        if !division_feasible(condition, branch, pair) {
            continue;
        }

        let (Some(opts_1), Some(opts_2)) = (options.get(&pair.team_1), options.get(&pair.team_2)) else {
            continue;
        };
        let format = condition.division_of(pair.team_1).format;
        for (node_index, _) in condition.compatible_nodes(format) {
            let (Some(s1), Some(s2)) = (opts_1.get(&node_index), opts_2.get(&node_index)) else {
                continue;
            };
            let slots = intersect_slots(&intersect_slots(s1, s2), &open[node_index]);
            for slot in slots {
                let cost = team_spacing_cost(&branch.team_slots, pair, slot)
                    + coach_spacing_cost(&branch.coach_slots, pair, slot)
                    + field_fill_cost(&branch.field_slots);
                let (start, end) = condition.slot_span(slot);
                candidates.push(Candidate {
                    field_node: node_index,
                    pair: pair_id,
                    slot,
                    start,
                    end,
                    cost,
                    score: 0,
                });
            }
        }
    }

    if candidates.is_empty() {
        return candidates;
    }

    if branch.depth + 1 >= condition.total_games() {
        let gaps = team_gap_total(&branch.team_slots);
        let spreads = coach_spreads(&branch.coach_slots);
        for c in &mut candidates {
            let pair = condition.pair(c.pair);
            c.score = gaps + final_game_score(&branch.team_slots, &spreads, pair, c.slot);
        }
    }

    candidates.sort_by_key(|c| c.cost);
    let keep = branching_cap(branch.depth, candidates.len());
    candidates.truncate(keep);
    candidates
}

/// Opening matches of the most constrained team, ordered by start time
pub fn seed(condition: &Condition) -> Result<Vec<Candidate>, SearchError> {
    let mut target: Option<(TeamId, usize)> = None;
    for team in condition.teams() {
        let count = condition.opening_slots_count(team.id);
        if count == 0 {
            return Err(SearchError::InfeasibleTeam {
                team: team.name.clone(),
                division: condition.division_of(team.id).name.clone(),
            });
        }
        if target.map_or(true, |(_, best)| count < best) {
            target = Some((team.id, count));
        }
    }
    let Some((target, _)) = target else {
        return Err(SearchError::NoOpeningMatch);
    };

    let format = condition.division_of(target).format;
    let mut keys = HashSet::new();
    let nodes: Vec<usize> = condition
        .compatible_nodes(format)
        .filter(|(_, node)| keys.insert(node.key()))
        .map(|(i, _)| i)
        .collect();

    let mut openings = Vec::new();
    for &node_index in &nodes {
        let node = condition.field_node(node_index);
        for &pair_id in condition.team_pairs(target) {
            let pair = condition.pair(pair_id);
            let usable = |team: TeamId| -> Vec<usize> {
                condition
                    .team_slots(team)
                    .iter()
                    .copied()
                    .filter(|&s| node.is_slot_ok(s))
                    .collect()
            };
            for slot in intersect_slots(&usable(pair.team_1), &usable(pair.team_2)) {
                let (start, end) = condition.slot_span(slot);
                openings.push(Candidate {
                    field_node: node_index,
                    pair: pair_id,
                    slot,
                    start,
                    end,
                    cost: 0,
                    score: 0,
                });
            }
        }
    }

    if openings.is_empty() {
        return Err(SearchError::NoOpeningMatch);
    }
    openings.sort_by_key(|c| c.start);

    let team = condition.team(target);
    info!(
        "most constrained team: {} ({}), {} opening matches",
        team.name,
        condition.division_of(target).name,
        openings.len()
    );

    Ok(openings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::condition::tests::{four_team_input, team};
    use crate::schedule::node::SearchTree;

    #[test]
    fn second_game_stays_near_the_first() {
        let all: Vec<usize> = (0..6).collect();
        assert_eq!(resolve_team_slots(&all, &[0], &[], 1), vec![1, 2]);
        assert_eq!(resolve_team_slots(&all, &[3], &[], 1), vec![1, 2, 4, 5]);
    }

    #[test]
    fn coach_window_and_overlap() {
        let all: Vec<usize> = (0..12).collect();
        // one team per coach: window of 3 around slot 4 keeps 2..6, minus 4 itself
        assert_eq!(resolve_team_slots(&all, &[], &[4], 1), vec![2, 3, 5, 6]);
        // games already spread wider than the window leave nothing
        assert!(resolve_team_slots(&all, &[], &[0, 9], 2).is_empty());
    }

    #[test]
    fn seed_picks_lowest_id_on_ties_and_sorts_by_time() {
        let cond = Condition::build(&four_team_input()).unwrap();
        let seeds = seed(&cond).unwrap();
        // three pairs with team 1 over six slots
        assert_eq!(seeds.len(), 18);
        assert!(seeds.iter().all(|c| cond.pair(c.pair).contains(1)));
        assert!(seeds.windows(2).all(|w| w[0].start <= w[1].start));
        let first = cond.pair(seeds[0].pair);
        assert_eq!((first.team_1, first.team_2, seeds[0].slot), (1, 2, 0));
    }

    #[test]
    fn seed_prefers_the_most_constrained_team() {
        let mut input = four_team_input();
        input.wishes.push(crate::schedule::types::Wish {
            team_id: 3,
            from: None,
            to: cond_time(10, 0),
        });
        let cond = Condition::build(&input).unwrap();
        let seeds = seed(&cond).unwrap();
        assert!(seeds.iter().all(|c| cond.pair(c.pair).contains(3)));
        assert!(seeds.iter().all(|c| c.slot <= 1));
    }

    fn cond_time(h: u32, m: u32) -> Option<chrono::NaiveTime> {
        chrono::NaiveTime::from_hms_opt(h, m, 0)
    }

    #[test]
    fn expansion_follows_most_constrained_team() {
        let cond = Condition::build(&four_team_input()).unwrap();
        let tree = SearchTree::with_roots(seed(&cond).unwrap());
        let root = tree.roots()[0];
        let branch = Branch::from_path(&cond, tree.path(root));

        let children = expand(&cond, &branch);
        // team 1 is limited to slots 1 and 2, against team 3 or team 4
        let placed: Vec<_> = children
            .iter()
            .map(|c| (cond.pair(c.pair).team_1, cond.pair(c.pair).team_2, c.slot))
            .collect();
        assert_eq!(placed, vec![(1, 3, 1), (1, 3, 2), (1, 4, 1), (1, 4, 2)]);
        assert!(children.iter().all(|c| c.cost == 3));
    }

    #[test]
    fn feasibility_rejects_stranding_a_team() {
        let cond = Condition::build(&four_team_input()).unwrap();
        let find = |a, b| cond.pairs().iter().position(|p| p.team_1 == a && p.team_2 == b).unwrap();
        let mut branch = Branch::default();
        branch.division_pairs.insert(1, vec![find(1, 2), find(1, 3)]);

        // 2-3 would leave team 4 with no opponent that still needs a game
        assert!(!division_feasible(&cond, &branch, cond.pair(find(2, 3))));
        assert!(division_feasible(&cond, &branch, cond.pair(find(2, 4))));
    }

    #[test]
    fn dead_end_when_a_team_has_no_options() {
        let mut input = four_team_input();
        input.teams.push(team(5, 5, 1));
        let cond = Condition::build(&input).unwrap();
        let mut branch = Branch::default();
        // every slot of the only field is taken
        branch.field_slots.insert(0, (0..6).collect());
        assert!(expand(&cond, &branch).is_empty());
    }
}
