use crate::{Page, PageId};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    static ref REFERENCE: Regex = Regex::new(r"(?i)page\s+([0-9]+)").expect("valid regex");
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Pages referencing this one, sorted and distinct.
    pub in_edges: Vec<PageId>,
    /// Pages this one references, sorted and distinct.
    pub out_edges: Vec<PageId>,
    pub score: f64,
}

fn insert_sorted(list: &mut Vec<PageId>, page: PageId) -> bool {
    match list.binary_search(&page) {
        Ok(_) => false,
        Err(pos) => {
            list.insert(pos, page);
            true
        }
    }
}

/// Directed page-to-page reference graph with authority scores.
///
/// Nodes are keyed by page id in a central registry; edges are page ids,
/// never references to other nodes.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReferenceGraph {
    nodes: BTreeMap<PageId, GraphNode>,
    edges: usize,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// One node per page plus every edge found by [`ReferenceGraph::scan_references`].
    pub fn from_pages(pages: &[Page]) -> Self {
        let mut graph = Self::new();
        for page in pages {
            graph.add_node(page.id);
        }
        for page in pages {
            graph.scan_references(page.id, &page.text);
        }
        graph
    }

    pub fn add_node(&mut self, page: PageId) {
        self.nodes.entry(page).or_default();
    }

    /// Add `from -> to`, creating either endpoint if absent. Returns false for a duplicate edge.
    pub fn add_edge(&mut self, from: PageId, to: PageId) -> bool {
        self.add_node(to);
        let added = insert_sorted(&mut self.nodes.entry(from).or_default().out_edges, to);
        if added {
            if let Some(target) = self.nodes.get_mut(&to) {
                insert_sorted(&mut target.in_edges, from);
            }
            self.edges += 1;
        }
        added
    }

    /// Add an edge for every "page N" mention in `text`. Returns the number of new edges.
    pub fn scan_references(&mut self, from: PageId, text: &str) -> usize {
        let mut added = 0;
        for caps in REFERENCE.captures_iter(text) {
            let target = caps[1].parse::<u32>().ok().and_then(|n| n.checked_sub(1));
            match target {
                Some(to) => {
                    if self.add_edge(from, to) {
                        added += 1;
                    }
                }
                None => tracing::warn!(page = from, reference = &caps[0], "skipping unresolvable page reference"),
            }
        }
        added
    }

    /// Recompute every score from scratch.
    ///
    /// Each pass reads only the previous pass's buffer, so nodes are scored in
    /// parallel and the buffers are swapped between passes. Dangling nodes
    /// leak their mass. A graph without edges keeps the uniform start.
    pub fn compute_authority(&mut self, iterations: usize, damping: f64) {
        let n = self.nodes.len();
        if n == 0 {
            return;
        }
        let ids: Vec<PageId> = self.nodes.keys().copied().collect();
        let inbound: Vec<Vec<usize>> = self
            .nodes
            .values()
            .map(|node| node.in_edges.iter().filter_map(|p| ids.binary_search(p).ok()).collect())
            .collect();
        let out_degree: Vec<usize> = self.nodes.values().map(|node| node.out_edges.len()).collect();

        let mut scores = vec![1.0 / n as f64; n];
        if self.edges > 0 {
            let base = (1.0 - damping) / n as f64;
            let mut next = vec![0.0; n];
            for _ in 0..iterations {
                next.par_iter_mut().zip(inbound.par_iter()).for_each(|(slot, sources)| {
                    let inflow: f64 = sources
                        .iter()
                        .filter(|&&s| out_degree[s] > 0)
                        .map(|&s| scores[s] / out_degree[s] as f64)
                        .sum();
                    *slot = base + damping * inflow;
                });
                std::mem::swap(&mut scores, &mut next);
            }
        }
        for (node, score) in self.nodes.values_mut().zip(scores) {
            node.score = score;
        }
        tracing::debug!(nodes = n, edges = self.edges, iterations, damping, "authority scores computed");
    }

    /// Authority score of `page`, 0 when the page has no node.
    pub fn score(&self, page: PageId) -> f64 {
        self.nodes.get(&page).map(|node| node.score).unwrap_or(0.0)
    }

    pub fn node(&self, page: PageId) -> Option<&GraphNode> {
        self.nodes.get(&page)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn scans_case_insensitive_references() {
        let mut graph = ReferenceGraph::new();
        graph.add_node(0);
        graph.add_node(1);
        assert_eq!(graph.scan_references(0, "See Page 2, and PAGE\n2 again, or page 7."), 2);
        assert_eq!(graph.node(0).unwrap().out_edges, vec![1, 6]);
        assert_eq!(graph.node(1).unwrap().in_edges, vec![0]);
        // Out-of-range targets get a node of their own.
        assert!(graph.node(6).is_some());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn page_zero_is_skipped() {
        let mut graph = ReferenceGraph::new();
        assert_eq!(graph.scan_references(0, "page 0"), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn self_loops_are_kept() {
        let mut graph = ReferenceGraph::new();
        assert!(graph.add_edge(2, 2));
        assert!(!graph.add_edge(2, 2));
        assert_eq!(graph.node(2).unwrap().in_edges, vec![2]);
    }

    #[test]
    fn single_isolated_node_scores_one() {
        let mut graph = ReferenceGraph::new();
        graph.add_node(0);
        graph.compute_authority(20, 0.85);
        assert!(approx(graph.score(0), 1.0));
    }

    #[test]
    fn ring_is_uniform() {
        let mut graph = ReferenceGraph::new();
        for i in 0..5 {
            graph.add_edge(i, (i + 1) % 5);
        }
        graph.compute_authority(20, 0.85);
        for i in 0..5 {
            assert!(approx(graph.score(i), 0.2));
        }
    }

    #[test]
    fn source_without_inbound_edges_gets_base_score() {
        let mut graph = ReferenceGraph::new();
        graph.add_edge(0, 1);
        graph.compute_authority(20, 0.85);
        let base = 0.15 / 2.0;
        assert!(approx(graph.score(0), base));
        assert!(approx(graph.score(1), base + 0.85 * base));
        assert!(graph.score(1) > graph.score(0));
    }

    #[test]
    fn empty_graph_is_noop() {
        let mut graph = ReferenceGraph::new();
        graph.compute_authority(20, 0.85);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.score(3), 0.0);
    }
}
