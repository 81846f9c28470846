use std::sync::Arc;

use super::condition::Condition;
use super::generator::{expand, seed, Branch};
use super::node::{NodeId, SearchTree};
use super::solution::Solution;
use crate::error::SearchError;

/// Result of one descent
#[derive(Debug)]
pub enum DriveOutcome {
    /// Reached terminal depth
    Complete(Solution),
    /// Ran out of candidates before terminal depth
    DeadEnd,
    /// The first-level node has no unconsumed children left
    Exhausted,
}

/// The search tree of one search together with its condition
#[derive(Debug)]
pub struct Explorer {
    condition: Arc<Condition>,
    tree: SearchTree,
}

impl Explorer {
    /// Seeds the first-level nodes from the most constrained team
    pub fn new(condition: Arc<Condition>) -> Result<Self, SearchError> {
        let openings = seed(&condition)?;
        Ok(Self { tree: SearchTree::with_roots(openings), condition })
    }

    pub fn condition(&self) -> &Arc<Condition> {
        &self.condition
    }

    pub fn root_count(&self) -> usize {
        self.tree.roots().len()
    }

    pub fn is_root_exhausted(&self, index: usize) -> bool {
        self.tree
            .root(index)
            .map_or(true, |id| self.tree.node(id).is_exhausted())
    }

    pub fn all_exhausted(&self) -> bool {
        (0..self.root_count()).all(|i| self.is_root_exhausted(i))
    }

    pub fn approx_bytes(&self) -> u64 {
        self.tree.approx_bytes()
    }

    pub fn live_nodes(&self) -> usize {
        self.tree.live_nodes()
    }

    /// Descends from a first-level node to a terminal node or a dead end, then
    /// backtracks so the next call resumes at the deepest unexplored sibling
    pub fn drive(&mut self, root_index: usize) -> DriveOutcome {
        let Some(root) = self.tree.root(root_index) else {
            return DriveOutcome::Exhausted;
        };
        if self.tree.node(root).is_exhausted() {
            return DriveOutcome::Exhausted;
        }

        let total = self.condition.total_games();
        let mut current = root;
        while self.tree.node(current).depth < total {
            if !self.tree.node(current).is_expanded() {
                let branch = Branch::from_path(&self.condition, self.tree.path(current));
                let candidates = expand(&self.condition, &branch);
                self.tree.attach(current, candidates);
            }
            match self.tree.current_child(current) {
                Some(child) => current = child,
                None => break,
            }
        }

        let outcome = if self.tree.node(current).depth >= total {
            DriveOutcome::Complete(Solution::from_path(&self.condition, self.tree.path(current)))
        } else {
            DriveOutcome::DeadEnd
        };
        self.backtrack(current);
        outcome
    }

    /// Releases the reached node and advances ancestors until one still has children
    fn backtrack(&mut self, from: NodeId) {
        let mut current = from;
        while let Some(parent) = self.tree.node(current).parent {
            if self.tree.consume_child(parent) {
                break;
            }
            current = parent;
        }
    }
}
