use chrono::NaiveTime;

use super::types::PairId;

pub type NodeId = usize;

/// A scored candidate match, not yet attached to the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub field_node: usize,
    pub pair: PairId,
    pub slot: usize,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Compactness cost, lower is explored first
    pub cost: i64,
    /// Balance score, only meaningful at terminal depth
    pub score: i64,
}

/// One scheduled match inside the search tree
#[derive(Debug, Clone)]
pub struct Node {
    pub field_node: usize,
    pub pair: PairId,
    pub slot: usize,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub cost: i64,
    pub score: i64,
    /// Number of matches on the path from the root, this one included
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// `None` until the node has been expanded
    children: Option<Vec<NodeId>>,
    /// Children below the cursor have been consumed and released
    cursor: usize,
}

impl Node {
    fn from_candidate(candidate: Candidate, parent: Option<NodeId>, depth: usize) -> Self {
        Self {
            field_node: candidate.field_node,
            pair: candidate.pair,
            slot: candidate.slot,
            start: candidate.start,
            end: candidate.end,
            cost: candidate.cost,
            score: candidate.score,
            depth,
            parent,
            children: None,
            cursor: 0,
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// Expanded, and every child has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.children.as_ref().is_some_and(|c| self.cursor >= c.len())
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn children_len(&self) -> usize {
        self.children.as_ref().map_or(0, Vec::len)
    }
}

/// Arena holding the first-level nodes and every branch hanging below them
///
/// Slots of released nodes are recycled, so the arena only grows with the live part of
/// the tree. `approx_bytes` reports the footprint used to enforce the memory ceiling.
#[derive(Debug, Default)]
pub struct SearchTree {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    roots: Vec<NodeId>,
    live: usize,
    child_slots: usize,
}

impl SearchTree {
    /// Creates a tree from the opening matches, in the given order
    pub fn with_roots(openings: Vec<Candidate>) -> Self {
        let mut tree = Self::default();
        tree.roots = openings
            .into_iter()
            .map(|c| tree.alloc(Node::from_candidate(c, None, 1)))
            .collect();
        tree
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn root(&self, index: usize) -> Option<NodeId> {
        self.roots.get(index).copied()
    }

    /// Panics on a released id; released ids are never reachable through cursors
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id].as_ref().expect("node was released")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id].as_mut().expect("node was released")
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(Option::is_some)
    }

    /// Attaches the ordered children of a node; a node is expanded only once
    pub fn attach(&mut self, parent: NodeId, candidates: Vec<Candidate>) {
        debug_assert!(!self.node(parent).is_expanded());
        let depth = self.node(parent).depth + 1;
        let ids: Vec<NodeId> = candidates
            .into_iter()
            .map(|c| self.alloc(Node::from_candidate(c, Some(parent), depth)))
            .collect();
        self.child_slots += ids.len();
        let node = self.node_mut(parent);
        node.children = Some(ids);
        node.cursor = 0;
    }

    /// The child under the cursor, if any remain
    pub fn current_child(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        node.children.as_ref().and_then(|c| c.get(node.cursor).copied())
    }

    /// Releases the child under the cursor and moves the cursor forward.
    /// Returns whether unconsumed children remain.
    pub fn consume_child(&mut self, id: NodeId) -> bool {
        if let Some(child) = self.current_child(id) {
            self.release(child);
        }
        let node = self.node_mut(id);
        let len = node.children.as_ref().map_or(0, Vec::len);
        if node.cursor < len {
            node.cursor += 1;
        }
        node.cursor < len
    }

    /// Frees a node and everything still live below it
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes[current].take() else {
                continue;
            };
            if let Some(children) = node.children {
                self.child_slots -= children.len();
                stack.extend(children.into_iter().skip(node.cursor));
            }
            self.live -= 1;
            self.free.push(current);
        }
    }

    /// The node and all its ancestors, leaf first
    pub fn path(&self, id: NodeId) -> PathIter<'_> {
        PathIter { tree: self, next: Some(id) }
    }

    pub fn live_nodes(&self) -> usize {
        self.live
    }

    pub fn approx_bytes(&self) -> u64 {
        let nodes = self.nodes.len() * std::mem::size_of::<Option<Node>>();
        let children = self.child_slots * std::mem::size_of::<NodeId>();
        let free = self.free.capacity() * std::mem::size_of::<NodeId>();
        (nodes + children + free) as u64
    }
}

pub struct PathIter<'a> {
    tree: &'a SearchTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for PathIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.tree.node(id);
        self.next = node.parent;
        Some(node)
    }
}
