use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::condition::Condition;
use super::node::Node;
use super::slot_utils::{format_hm, hm};
use super::types::TeamId;

/// One game of a finished schedule, team ids in ascending order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolutionGame {
    pub team_id_1: TeamId,
    pub team_id_2: TeamId,
    #[serde(with = "hm")]
    pub start: NaiveTime,
    #[serde(with = "hm")]
    pub end: NaiveTime,
}

/// A complete schedule keyed by field node label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub score: i64,
    pub games: BTreeMap<String, Vec<SolutionGame>>,
    pub hash: String,
}

impl Solution {
    /// Collects the games of a terminal path (leaf first) and hashes them
    pub fn from_path<'a>(condition: &Condition, path: impl Iterator<Item = &'a Node>) -> Self {
        let mut games: BTreeMap<String, Vec<SolutionGame>> = BTreeMap::new();
        let mut score = None;
        for node in path {
            // the leaf carries the balance score
            score.get_or_insert(node.score);
            let pair = condition.pair(node.pair);
            let label = condition.field_node(node.field_node).label().to_string();
            games.entry(label).or_default().push(SolutionGame {
                team_id_1: pair.team_1.min(pair.team_2),
                team_id_2: pair.team_1.max(pair.team_2),
                start: node.start,
                end: node.end,
            });
        }
        Self::new(score.unwrap_or(0), games)
    }

    pub fn new(score: i64, mut games: BTreeMap<String, Vec<SolutionGame>>) -> Self {
        for list in games.values_mut() {
            list.sort_by_key(|g| (g.start, g.team_id_1, g.team_id_2));
        }
        let hash = content_hash(&games);
        Self { score, games, hash }
    }

    pub fn games_count(&self) -> usize {
        self.games.values().map(Vec::len).sum()
    }

    /// Heap and inline bytes held by this solution, counted against the memory ceiling
    pub fn approx_bytes(&self) -> u64 {
        let per_label = std::mem::size_of::<String>() + std::mem::size_of::<Vec<SolutionGame>>();
        let games: usize = self
            .games
            .iter()
            .map(|(label, list)| per_label + label.len() + list.len() * std::mem::size_of::<SolutionGame>())
            .sum();
        (std::mem::size_of::<Self>() + self.hash.len() + games) as u64
    }
}

/// SHA-256 over the sorted labels and, per label, the time-ordered games
pub fn content_hash(games: &BTreeMap<String, Vec<SolutionGame>>) -> String {
    let mut hasher = Sha256::new();
    for (label, list) in games {
        hasher.update(label.as_bytes());
        for game in list {
            let line = format!(
                "{}_{}_{}_{}",
                game.team_id_1,
                game.team_id_2,
                format_hm(game.start),
                format_hm(game.end)
            );
            hasher.update(line.as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(t1: TeamId, t2: TeamId, h: u32) -> SolutionGame {
        SolutionGame {
            team_id_1: t1,
            team_id_2: t2,
            start: NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(h, 30, 0).unwrap(),
        }
    }

    #[test]
    fn footprint_grows_with_games() {
        let one = Solution::new(0, BTreeMap::from([("[field1]".to_string(), vec![game(1, 2, 9)])]));
        let two = Solution::new(0, BTreeMap::from([("[field1]".to_string(), vec![game(1, 2, 9), game(3, 4, 10)])]));
        assert_eq!(
            two.approx_bytes() - one.approx_bytes(),
            std::mem::size_of::<SolutionGame>() as u64
        );
        assert!(one.approx_bytes() > one.hash.len() as u64);
    }

    #[test]
    fn hash_ignores_discovery_order() {
        let a = Solution::new(
            0,
            BTreeMap::from([
                ("[field1]".to_string(), vec![game(1, 2, 9), game(3, 4, 10)]),
                ("[field2]".to_string(), vec![game(1, 3, 9)]),
            ]),
        );
        let b = Solution::new(
            5,
            BTreeMap::from([
                ("[field2]".to_string(), vec![game(1, 3, 9)]),
                ("[field1]".to_string(), vec![game(3, 4, 10), game(1, 2, 9)]),
            ]),
        );
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
        assert_eq!(a.games["[field1]"][0], game(1, 2, 9));
    }

    #[test]
    fn hash_depends_on_field_and_time() {
        let base = Solution::new(0, BTreeMap::from([("[field1]".to_string(), vec![game(1, 2, 9)])]));
        let moved = Solution::new(0, BTreeMap::from([("[field2]".to_string(), vec![game(1, 2, 9)])]));
        let later = Solution::new(0, BTreeMap::from([("[field1]".to_string(), vec![game(1, 2, 10)])]));
        assert_ne!(base.hash, moved.hash);
        assert_ne!(base.hash, later.hash);
        assert_eq!(base.games_count(), 1);
    }
}
