//! Folds bulk, idling, and correction edges into a final classical syndrome
//! and resolves the logical observable. See §4.7 of the specification.

use crate::decoding_graph::DecodingGraph;
use crate::pointers::RwLockPtr;
use crate::union_find::UnionFindDecoder;
use crate::util::{DecoderConfig, DecodingResult, EdgeId, Index, Round};
use std::collections::{BTreeSet, HashMap, VecDeque};

const MAX_CACHE: usize = 10_000;

/// Precomputes everything that depends only on the graph's topology once,
/// at construction, so repeated `compute` calls do no allocation beyond the
/// parity buffer reset.
pub struct LogicalComputer {
    scratch_graph: DecodingGraph,
    logical_edge_ids: BTreeSet<Index>,
    /// `node_edge_ids[i]` lists the `index` of every edge incident to
    /// `scratch_graph.nodes()[i]`, precomputed once (`LogicalComputer.h`'s
    /// `node_edge_ids_`).
    node_edge_ids: Vec<Vec<Index>>,
    /// Flat parity buffer, deliberately indexed by raw `index` alone —
    /// round and kind are NOT part of the key, so a Measurement edge and a
    /// round-0 Normal edge that happen to share an `index` alias the same
    /// slot. This matches §4.7's literal "XOR-toggle
    /// final_measurement[edge.index]" and the upstream implementation; it
    /// is not a bug to fix here.
    final_measurement: Vec<bool>,
    cache: HashMap<u64, bool>,
    cache_fifo: VecDeque<u64>,
}

impl LogicalComputer {
    pub fn new(graph: &DecodingGraph) -> Self {
        let scratch_graph = DecodingGraph::single_layer_copy(graph);
        let logical_edge_ids = scratch_graph.logical_edge_ids();
        let num_edges = scratch_graph.edges().len();

        let node_edge_ids = scratch_graph
            .nodes()
            .iter()
            .map(|node| {
                node.read_recursive()
                    .edges()
                    .iter()
                    .map(|weak| weak.upgrade().expect("incident edge dropped").read_recursive().id().index)
                    .collect()
            })
            .collect();

        Self {
            scratch_graph,
            logical_edge_ids,
            node_edge_ids,
            final_measurement: vec![false; num_edges],
            cache: HashMap::with_capacity(MAX_CACHE),
            cache_fifo: VecDeque::new(),
        }
    }

    /// Drops every cached `(idling hash) -> logical parity` entry. Needed
    /// whenever `bulk_errors` or the decoder's correction policy changes
    /// independently of `idling_errors`, since the cache key only covers the
    /// latter.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_fifo.clear();
    }

    /// A 64-bit `boost::hash_combine`-style mix over idling-error edge
    /// indices, matching `LogicalComputer::hash_idling` in
    /// `original_source/src/LogicalComputer.cpp` bit-for-bit (same FNV
    /// offset basis as the seed, same combine step per element).
    fn hash_idling(idling_errors: &[EdgeId]) -> u64 {
        let mut h: u64 = 1469598103934665603;
        for edge in idling_errors {
            let x = edge.index as u64;
            h ^= x
                .wrapping_add(0x9e37_79b9_7f4a_7c15)
                .wrapping_add(h << 6)
                .wrapping_add(h >> 2);
        }
        h
    }

    /// Applies `bulk_errors`, `decoding_result.corrections`, and
    /// `idling_errors` (each filtered to `round <= considered_up_to_round`)
    /// onto a zeroed parity buffer, marks the scratch graph's nodes by the
    /// XOR of their incident edges' parities, runs one classical Union-Find
    /// pass to fold in the residual defects, then returns the XOR of
    /// `final_measurement` over every logical edge index. Result is cached
    /// by a hash of `idling_errors` alone (§4.7's cache key).
    pub fn compute(&mut self, bulk_errors: &[EdgeId], idling_errors: &[EdgeId], decoding_result: &DecodingResult) -> bool {
        let key = Self::hash_idling(idling_errors);
        if let Some(&cached) = self.cache.get(&key) {
            return cached;
        }

        for slot in &mut self.final_measurement {
            *slot = false;
        }

        let consider = decoding_result.considered_up_to_round;
        apply(&mut self.final_measurement, bulk_errors, consider);
        apply(&mut self.final_measurement, &decoding_result.corrections, consider);
        apply(&mut self.final_measurement, idling_errors, consider);

        self.scratch_graph.reset();
        for (i, node) in self.scratch_graph.nodes().iter().enumerate() {
            let defect = self.node_edge_ids[i].iter().fold(false, |acc, &eid| acc ^ self.final_measurement[eid]);
            node.write().set_marked(defect);
        }

        let classical = UnionFindDecoder::decode(&self.scratch_graph, &DecoderConfig::default());
        for edge in &classical.corrections {
            self.final_measurement[edge.index] ^= true;
        }

        let logical = self.logical_edge_ids.iter().fold(false, |acc, &eid| acc ^ self.final_measurement[eid]);

        if self.cache.len() >= MAX_CACHE {
            if let Some(oldest) = self.cache_fifo.pop_front() {
                self.cache.remove(&oldest);
            }
        }
        self.cache.insert(key, logical);
        self.cache_fifo.push_back(key);

        logical
    }
}

fn apply(final_measurement: &mut [bool], edges: &[EdgeId], consider_up_to_round: Round) {
    for edge in edges {
        if edge.round <= consider_up_to_round {
            final_measurement[edge.index] ^= true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding_graph::DecodingGraph;
    use crate::util::EdgeId;

    #[test]
    fn no_errors_yields_even_logical_parity() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let mut computer = LogicalComputer::new(&graph);
        let result = DecodingResult::new(Vec::new(), 2, 0);
        assert!(!computer.compute(&[], &[], &result));
    }

    #[test]
    fn uncorrected_logical_edge_flips_parity() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let mut computer = LogicalComputer::new(&graph);
        let result = DecodingResult::new(Vec::new(), 2, 0);
        let logical_index = *graph.logical_edge_ids().iter().next().unwrap();
        let bulk_errors = vec![EdgeId::normal(0, logical_index)];
        assert!(computer.compute(&bulk_errors, &[], &result));
    }

    #[test]
    fn matching_correction_cancels_logical_flip() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let mut computer = LogicalComputer::new(&graph);
        let logical_index = *graph.logical_edge_ids().iter().next().unwrap();
        let result = DecodingResult::new(vec![EdgeId::normal(0, logical_index)], 2, 0);
        let bulk_errors = vec![EdgeId::normal(0, logical_index)];
        assert!(!computer.compute(&bulk_errors, &[], &result));
    }

    #[test]
    fn repeated_call_with_same_idling_errors_hits_cache() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let mut computer = LogicalComputer::new(&graph);
        let result = DecodingResult::new(Vec::new(), 2, 0);
        let first = computer.compute(&[], &[], &result);
        let second = computer.compute(&[], &[], &result);
        assert_eq!(first, second);
        assert_eq!(computer.cache.len(), 1);
    }

    #[test]
    fn clear_cache_empties_both_structures() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let mut computer = LogicalComputer::new(&graph);
        let result = DecodingResult::new(Vec::new(), 2, 0);
        computer.compute(&[], &[], &result);
        computer.clear_cache();
        assert!(computer.cache.is_empty());
        assert!(computer.cache_fifo.is_empty());
    }
}
