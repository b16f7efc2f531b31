//! HNSW graph: core data structures and algorithms.
//!
//! Implements the Hierarchical Navigable Small World graph from:
//! "Efficient and robust approximate nearest neighbor search using
//!  Hierarchical Navigable Small World graphs" (Malkov & Yashunin, 2016/2018).
//!
//! Nodes are insert-only and addressed by dense handles `0..len`.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::vector::FeatureVector;

use super::neighbor_queue::{Candidate, MaxHeap, MinHeap};

/// Configuration parameters for the HNSW index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswParams {
    /// Max number of connections per node (layers > 0).
    pub m: usize,
    /// Max connections at layer 0. Defaults to 2 * m when unset.
    pub m_max0: Option<usize>,
    /// Number of candidates during construction.
    pub ef_construction: usize,
    /// Number of candidates during search.
    pub ef_search: usize,
    /// Maximum number of layers.
    pub max_layers: usize,
    /// Fixed RNG seed for reproducible level assignment.
    pub seed: Option<u64>,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::new(16, 200, 50)
    }
}

impl HnswParams {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        Self {
            m,
            m_max0: None,
            ef_construction,
            ef_search,
            max_layers: 16,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0.unwrap_or(2 * self.m)
        } else {
            self.m
        }
    }

    /// Level generation factor: 1 / ln(m).
    fn ml(&self) -> f64 {
        1.0 / (self.m.max(2) as f64).ln()
    }
}

#[derive(Debug, Clone)]
struct HnswNode {
    vector: FeatureVector,
    /// neighbors[l] is the list of neighbor handles at layer l.
    neighbors: Vec<Vec<usize>>,
}

impl HnswNode {
    #[cfg(test)]
    fn level(&self) -> usize {
        self.neighbors.len() - 1
    }
}

/// The HNSW graph structure.
#[derive(Debug)]
pub struct HnswGraph {
    nodes: Vec<HnswNode>,
    /// Entry point handle (highest-level node).
    entry_point: Option<usize>,
    max_level: usize,
    params: HnswParams,
    metric: DistanceMetric,
    rng: StdRng,
}

impl HnswGraph {
    pub fn new(metric: DistanceMetric, params: HnswParams) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            params,
            metric,
            rng,
        }
    }

    pub fn metric(&self) -> &DistanceMetric {
        &self.metric
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_vector(&self, handle: usize) -> Option<&FeatureVector> {
        self.nodes.get(handle).map(|n| &n.vector)
    }

    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let level = (-r.ln() * self.params.ml()).floor() as usize;
        level.min(self.params.max_layers.saturating_sub(1))
    }

    fn distance(&self, query: &FeatureVector, handle: usize) -> Result<f32> {
        self.metric.distance(query, &self.nodes[handle].vector)
    }

    /// SEARCH-LAYER: Algorithm 2 from the HNSW paper.
    ///
    /// Greedy best-first search of one layer starting from `entry`, returning
    /// up to `ef` candidates sorted closest first.
    fn search_layer(
        &self,
        query: &FeatureVector,
        entry: usize,
        ef: usize,
        layer: usize,
    ) -> Result<Vec<Candidate>> {
        let mut visited = HashSet::new();
        let mut frontier = MinHeap::new();
        let mut results = MaxHeap::new();

        let start = Candidate::new(entry, self.distance(query, entry)?);
        visited.insert(entry);
        frontier.push(start);
        results.push_bounded(start, ef);

        while let Some(c) = frontier.pop() {
            let furthest = results.furthest().map(|n| n.distance).unwrap_or(f32::MAX);
            if c.distance > furthest {
                break;
            }

            let Some(links) = self.nodes[c.handle].neighbors.get(layer) else {
                continue;
            };
            for &next in links {
                if !visited.insert(next) {
                    continue;
                }
                let dist = self.distance(query, next)?;
                let furthest = results.furthest().map(|n| n.distance).unwrap_or(f32::MAX);
                if dist < furthest || results.len() < ef {
                    frontier.push(Candidate::new(next, dist));
                    results.push_bounded(Candidate::new(next, dist), ef);
                }
            }
        }

        Ok(results.into_sorted_vec())
    }

    /// Trim a node's links at `layer` to its `m` closest neighbors.
    fn prune_links(&mut self, handle: usize, layer: usize, m: usize) -> Result<()> {
        let node_vec = self.nodes[handle].vector.clone();
        let mut scored = self.nodes[handle].neighbors[layer]
            .iter()
            .map(|&n| Ok(Candidate::new(n, self.distance(&node_vec, n)?)))
            .collect::<Result<Vec<Candidate>>>()?;
        scored.sort();
        scored.truncate(m);
        self.nodes[handle].neighbors[layer] = scored.into_iter().map(|c| c.handle).collect();
        Ok(())
    }

    /// INSERT: Algorithm 1 from the HNSW paper. Returns the new node's handle.
    pub fn insert(&mut self, vector: FeatureVector) -> Result<usize> {
        let level = self.random_level();
        let handle = self.nodes.len();

        let Some(mut ep) = self.entry_point else {
            self.nodes.push(HnswNode {
                vector,
                neighbors: vec![Vec::new(); level + 1],
            });
            self.entry_point = Some(handle);
            self.max_level = level;
            return Ok(handle);
        };

        // Phase 1: greedy descent through the layers above the new node's level
        for l in (level + 1..=self.max_level).rev() {
            if let Some(n) = self.search_layer(&vector, ep, 1, l)?.first() {
                ep = n.handle;
            }
        }

        // Phase 2: find neighbors on every layer the node participates in
        let top = level.min(self.max_level);
        let mut links = vec![Vec::new(); level + 1];
        for l in (0..=top).rev() {
            let m = self.params.max_links(l);
            let nearest = self.search_layer(&vector, ep, self.params.ef_construction, l)?;
            links[l] = nearest.iter().take(m).map(|c| c.handle).collect();
            if let Some(n) = nearest.first() {
                ep = n.handle;
            }
        }

        self.nodes.push(HnswNode {
            vector,
            neighbors: links,
        });

        // Bidirectional connections, pruning neighbors that overflow
        for l in 0..=top {
            let m = self.params.max_links(l);
            let peers = self.nodes[handle].neighbors[l].clone();
            for peer in peers {
                self.nodes[peer].neighbors[l].push(handle);
                if self.nodes[peer].neighbors[l].len() > m {
                    self.prune_links(peer, l, m)?;
                }
            }
        }

        if level > self.max_level {
            self.entry_point = Some(handle);
            self.max_level = level;
        }

        Ok(handle)
    }

    /// SEARCH: Algorithm 5 from the HNSW paper.
    ///
    /// Returns up to `k` candidates, closest first, exploring `max(ef, k)` at layer 0.
    pub fn search_knn(&self, query: &FeatureVector, k: usize, ef: usize) -> Result<Vec<Candidate>> {
        let Some(mut ep) = self.entry_point else {
            return Ok(Vec::new());
        };

        for l in (1..=self.max_level).rev() {
            if let Some(n) = self.search_layer(query, ep, 1, l)?.first() {
                ep = n.handle;
            }
        }

        let mut results = self.search_layer(query, ep, ef.max(k), 0)?;
        results.truncate(k);
        Ok(results)
    }

    #[cfg(test)]
    fn max_node_level(&self) -> usize {
        self.nodes.iter().map(HnswNode::level).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(metric: DistanceMetric) -> HnswGraph {
        HnswGraph::new(metric, HnswParams::new(4, 32, 16).with_seed(7))
    }

    #[test]
    fn test_handles_are_sequential() {
        let mut g = graph(DistanceMetric::Euclidean);
        for i in 0..10 {
            let h = g.insert(FeatureVector::new(vec![i as f32, 0.0])).unwrap();
            assert_eq!(h, i);
        }
        assert_eq!(g.len(), 10);
        assert_eq!(g.get_vector(3).unwrap().as_slice(), &[3.0, 0.0]);
        assert!(g.get_vector(10).is_none());
    }

    #[test]
    fn test_entry_point_has_top_level() {
        let mut g = graph(DistanceMetric::Euclidean);
        for i in 0..200 {
            g.insert(FeatureVector::new(vec![i as f32, (i % 13) as f32]))
                .unwrap();
        }
        let ep = g.entry_point.unwrap();
        assert_eq!(g.nodes[ep].level(), g.max_level);
        assert_eq!(g.max_level, g.max_node_level());
    }

    #[test]
    fn test_self_search() {
        let mut g = graph(DistanceMetric::Euclidean);
        let vectors: Vec<FeatureVector> = (0..100)
            .map(|i| {
                FeatureVector::new(vec![
                    (i as f32) * 0.1,
                    ((i * 7) as f32) * 0.1,
                    ((i * 13) as f32) * 0.1,
                ])
            })
            .collect();
        for v in &vectors {
            g.insert(v.clone()).unwrap();
        }

        for (i, v) in vectors.iter().enumerate() {
            let results = g.search_knn(v, 1, 16).unwrap();
            assert!(
                results[0].distance < 1e-5,
                "self-search for {} returned distance {} (handle={})",
                i,
                results[0].distance,
                results[0].handle
            );
        }
    }

    #[test]
    fn test_inner_product_search() {
        let mut g = graph(DistanceMetric::InnerProduct);
        g.insert(FeatureVector::new(vec![1.0, 0.0])).unwrap();
        g.insert(FeatureVector::new(vec![0.0, 1.0])).unwrap();
        g.insert(FeatureVector::new(vec![0.6, 0.8])).unwrap();

        let results = g.search_knn(&FeatureVector::new(vec![0.0, 1.0]), 2, 16).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].handle, 1);
        assert_eq!(results[1].handle, 2);
        assert!((results[0].distance + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_layer_zero_links_follow_m() {
        let params: HnswParams = serde_json::from_str(r#"{ "m": 8 }"#).unwrap();
        assert_eq!(params.m_max0, None);
        assert_eq!(params.max_links(0), 16);
        assert_eq!(params.max_links(1), 8);

        let pinned: HnswParams = serde_json::from_str(r#"{ "m": 8, "m_max0": 12 }"#).unwrap();
        assert_eq!(pinned.max_links(0), 12);
        assert_eq!(HnswParams::default().max_links(0), 32);
    }

    #[test]
    fn test_layer_zero_degree_bounded() {
        let mut g = graph(DistanceMetric::Euclidean);
        for i in 0..120 {
            g.insert(FeatureVector::new(vec![(i % 11) as f32, (i / 11) as f32]))
                .unwrap();
        }
        let cap = g.params().max_links(0);
        assert!(g.nodes.iter().all(|n| n.neighbors[0].len() <= cap));
    }

    #[test]
    fn test_search_empty_graph() {
        let g = graph(DistanceMetric::Euclidean);
        assert!(g
            .search_knn(&FeatureVector::new(vec![0.0]), 3, 16)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_search_returns_at_most_len() {
        let mut g = graph(DistanceMetric::Euclidean);
        g.insert(FeatureVector::new(vec![0.0, 0.0])).unwrap();
        g.insert(FeatureVector::new(vec![1.0, 0.0])).unwrap();
        let results = g.search_knn(&FeatureVector::new(vec![0.0, 0.0]), 5, 16).unwrap();
        assert_eq!(results.len(), 2);
        let handles: HashSet<usize> = results.iter().map(|c| c.handle).collect();
        assert_eq!(handles.len(), 2);
    }
}
