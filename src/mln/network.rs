//! Aggregation of per-character origins into a minimal lateral network.
//!
//! Characters with more than one origin are candidates for borrowing. The
//! primary graph counts, for every pair of nodes, how many characters
//! originate at both; the lateral graph then overlays, per character, a
//! minimum spanning tree over its origins, weighted inversely to the
//! primary counts, so that frequently co-originating pairs end up carrying
//! the lateral links.

use crate::mln::tree::Tree;
use crate::mln::GlsSet;
use itertools::Itertools;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// A lateral edge: how many characters place a borrowing on this link, and
/// which ones.
#[derive(Clone, Debug, Default)]
pub struct Lateral {
    pub weight: usize,
    pub cogs: Vec<usize>,
}

/// The aggregated networks of one mode. Node indices coincide with tree
/// node ids.
pub struct Network {
    /// co-origin counts over unordered node pairs
    pub primary: UnGraph<(), usize>,
    /// the minimal lateral network
    pub lateral: UnGraph<(), Lateral>,
    /// inferred lateral events per character
    pub events: BTreeMap<usize, Vec<(usize, usize)>>,
}

impl Network {
    pub fn co_origins(&self, u: usize, v: usize) -> usize {
        self.primary
            .find_edge(NodeIndex::new(u), NodeIndex::new(v))
            .and_then(|e| self.primary.edge_weight(e))
            .copied()
            .unwrap_or(0)
    }

    pub fn lateral_edge(&self, u: usize, v: usize) -> Option<&Lateral> {
        self.lateral
            .find_edge(NodeIndex::new(u), NodeIndex::new(v))
            .and_then(|e| self.lateral.edge_weight(e))
    }
}

pub fn build(tree: &Tree, set: &GlsSet) -> Network {
    let mut primary: UnGraph<(), usize> = UnGraph::new_undirected();
    let mut lateral: UnGraph<(), Lateral> = UnGraph::new_undirected();
    for _ in 0..tree.len() {
        primary.add_node(());
        lateral.add_node(());
    }

    // every unordered pair of origins of a character counts once
    for gls in set.scenarios.values() {
        for (u, v) in gls.origins().into_iter().tuple_combinations() {
            let (a, b) = (NodeIndex::new(u), NodeIndex::new(v));
            if let Some(e) = primary.find_edge(a, b) {
                if let Some(w) = primary.edge_weight_mut(e) {
                    *w += 1;
                }
            } else {
                primary.add_edge(a, b, 1);
            }
        }
    }

    let mut events = BTreeMap::new();
    for (&cog, gls) in &set.scenarios {
        let origins = gls.origins();
        if origins.len() < 2 {
            continue;
        }

        // candidate edges ordered by inverse co-origin weight; ties resolve
        // by node names so the spanning tree is reproducible
        let mut queue = PriorityQueue::new();
        for (u, v) in origins.iter().cloned().tuple_combinations() {
            let (u, v) = if tree.name(u) <= tree.name(v) {
                (u, v)
            } else {
                (v, u)
            };
            let co = primary
                .find_edge(NodeIndex::new(u), NodeIndex::new(v))
                .and_then(|e| primary.edge_weight(e))
                .copied()
                .unwrap_or(1);
            queue.push(
                (u, v),
                Reverse((
                    1_000_000 / co,
                    tree.name(u).to_string(),
                    tree.name(v).to_string(),
                )),
            );
        }

        let mut components: UnionFind<usize> = UnionFind::new(tree.len());
        let mut laterals = Vec::new();
        while let Some(((u, v), _)) = queue.pop() {
            if !components.union(u, v) {
                continue;
            }
            laterals.push((u, v));
        }

        for &(u, v) in &laterals {
            let (a, b) = (NodeIndex::new(u), NodeIndex::new(v));
            if let Some(e) = lateral.find_edge(a, b) {
                if let Some(data) = lateral.edge_weight_mut(e) {
                    data.weight += 1;
                    data.cogs.push(cog);
                }
            } else {
                lateral.add_edge(
                    a,
                    b,
                    Lateral {
                        weight: 1,
                        cogs: vec![cog],
                    },
                );
            }
        }
        events.insert(cog, laterals);
    }

    Network {
        primary,
        lateral,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mln::{Gls, Mode};
    use petgraph::visit::EdgeRef;

    fn gls_set(tree: &Tree, origin_sets: &[&[&str]]) -> GlsSet {
        let mut scenarios = BTreeMap::new();
        for (cog, origins) in origin_sets.iter().enumerate() {
            let events = origins
                .iter()
                .map(|&name| (tree.node(name).unwrap(), 1))
                .collect();
            scenarios.insert(cog, Gls { events });
        }
        GlsSet {
            mode: Mode::Weighted { gain: 1, loss: 1 },
            scenarios,
            exhausted: Vec::new(),
            alternatives: 1.0,
        }
    }

    #[test]
    fn test_aggregation() {
        let tree: Tree = "((a,b)A,((c,d)B,(e,f)C)D)root;".parse().unwrap();
        let set = gls_set(
            &tree,
            &[&["A", "B"], &["A", "B"], &["A", "C"]],
        );
        let net = build(&tree, &set);
        let a = tree.node("A").unwrap();
        let b = tree.node("B").unwrap();
        let c = tree.node("C").unwrap();
        assert_eq!(net.co_origins(a, b), 2);
        assert_eq!(net.co_origins(b, a), 2);
        assert_eq!(net.co_origins(a, c), 1);
        assert_eq!(net.co_origins(b, c), 0);
        let ab = net.lateral_edge(a, b).unwrap();
        assert_eq!(ab.weight, 2);
        assert_eq!(ab.cogs, vec![0, 1]);
        let ac = net.lateral_edge(a, c).unwrap();
        assert_eq!(ac.weight, 1);
        assert_eq!(ac.cogs, vec![2]);
        assert!(net.lateral_edge(b, c).is_none());
    }

    #[test]
    fn test_every_weight_matches_its_characters() {
        let tree: Tree = "((a,b)A,((c,d)B,(e,f)C)D)root;".parse().unwrap();
        let set = gls_set(
            &tree,
            &[&["A", "B", "C"], &["A", "B"], &["B", "C"]],
        );
        let net = build(&tree, &set);
        for e in net.lateral.edge_references() {
            assert_eq!(e.weight().weight, e.weight().cogs.len());
        }
    }

    #[test]
    fn test_one_character_contributes_origins_minus_one_edges() {
        let tree: Tree = "((a,b)A,((c,d)B,(e,f)C)D)root;".parse().unwrap();
        let set = gls_set(&tree, &[&["A", "B", "C"]]);
        let net = build(&tree, &set);
        assert_eq!(net.events[&0].len(), 2);
    }

    #[test]
    fn test_ties_resolve_by_name_order() {
        let tree: Tree = "((a,b)A,((c,d)B,(e,f)C)D)root;".parse().unwrap();
        // all pairwise counts are 1, so the tree keeps the two
        // lexicographically smallest pairs
        let set = gls_set(&tree, &[&["C", "B", "A"]]);
        let net = build(&tree, &set);
        let a = tree.node("A").unwrap();
        let b = tree.node("B").unwrap();
        let c = tree.node("C").unwrap();
        assert!(net.lateral_edge(a, b).is_some());
        assert!(net.lateral_edge(a, c).is_some());
        assert!(net.lateral_edge(b, c).is_none());
    }

    #[test]
    fn test_exhausted_characters_contribute_nothing() {
        let tree: Tree = "((a,b)A,((c,d)B,(e,f)C)D)root;".parse().unwrap();
        let mut set = gls_set(&tree, &[&["A", "B"]]);
        set.scenarios.insert(7, Gls::default());
        let net = build(&tree, &set);
        let a = tree.node("A").unwrap();
        let b = tree.node("B").unwrap();
        assert_eq!(net.co_origins(a, b), 1);
        assert!(!net.events.contains_key(&7));
    }
}
