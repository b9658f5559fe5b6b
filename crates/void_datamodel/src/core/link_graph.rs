//! Object-level dataflow graph of strong links
//!
//! Loop detection runs on objects, not properties: a strong link from any
//! property of A to any property of B adds the edge A -> B. Edges are
//! counted so removing one of several parallel links keeps the edge.

use std::collections::{BTreeMap, BTreeSet};

use void_core::ObjectId;

/// Multigraph of strong links between objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkGraph {
    edges: BTreeMap<ObjectId, BTreeMap<ObjectId, usize>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, start: &ObjectId, end: &ObjectId) {
        *self
            .edges
            .entry(start.clone())
            .or_default()
            .entry(end.clone())
            .or_insert(0) += 1;
    }

    pub fn remove_edge(&mut self, start: &ObjectId, end: &ObjectId) {
        let Some(targets) = self.edges.get_mut(start) else {
            return;
        };
        if let Some(count) = targets.get_mut(end) {
            *count -= 1;
            if *count == 0 {
                targets.remove(end);
            }
        }
        if targets.is_empty() {
            self.edges.remove(start);
        }
    }

    /// Objects directly fed by `object`
    pub fn successors(&self, object: &ObjectId) -> impl Iterator<Item = &ObjectId> {
        self.edges.get(object).into_iter().flat_map(|t| t.keys())
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|t| t.values().sum::<usize>()).sum()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    /// Whether a strong link from `start` to `end` would close a cycle.
    ///
    /// Searches forward from `end` for `start`; a link within one object is
    /// always a loop.
    pub fn creates_loop(&self, start: &ObjectId, end: &ObjectId) -> bool {
        if start == end {
            return true;
        }
        let mut visited = BTreeSet::new();
        let mut stack = vec![end];
        while let Some(current) = stack.pop() {
            if current == start {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.successors(current));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ObjectId {
        ObjectId::new(s)
    }

    #[test]
    fn test_loop_detection() {
        let mut graph = LinkGraph::new();
        graph.add_edge(&id("a"), &id("b"));
        graph.add_edge(&id("b"), &id("c"));

        assert!(graph.creates_loop(&id("c"), &id("a")));
        assert!(graph.creates_loop(&id("b"), &id("a")));
        assert!(!graph.creates_loop(&id("a"), &id("c")));
        assert!(graph.creates_loop(&id("a"), &id("a")));
    }

    #[test]
    fn test_parallel_edges_counted() {
        let mut graph = LinkGraph::new();
        graph.add_edge(&id("a"), &id("b"));
        graph.add_edge(&id("a"), &id("b"));
        assert_eq!(graph.edge_count(), 2);

        graph.remove_edge(&id("a"), &id("b"));
        assert!(graph.creates_loop(&id("b"), &id("a")));
        graph.remove_edge(&id("a"), &id("b"));
        assert!(!graph.creates_loop(&id("b"), &id("a")));
        assert_eq!(graph, LinkGraph::new());
    }
}
