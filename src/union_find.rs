//! The non-streaming Union-Find decoder: grow every non-neutral cluster in
//! lockstep, fuse on full-weight edges, repeat until every cluster is
//! neutral, then peel. See §4.3 of the specification.

use crate::cluster::{Cluster, ClusterPtr, FusionEdge};
use crate::decoding_graph::{DecodingGraph, NodePtr};
use crate::peeling::PeelingDecoder;
use crate::pointers::RwLockPtr;
use crate::util::{DecoderConfig, DecodingResult, Round};

/// Buffer region width for a decoder that sees the whole multi-layer graph
/// up front (ClAYG's streaming variants use their own, narrower windows).
fn buffer_region(d: usize) -> usize {
    (d + 1) / 2
}

pub struct UnionFindDecoder;

impl UnionFindDecoder {
    /// `graph` must already have `mark()` applied for this trial's error
    /// edges; this call does not reset or mark anything itself.
    pub fn decode(graph: &DecodingGraph, config: &DecoderConfig) -> DecodingResult {
        let marked_by_round = graph.marked_nodes_by_round();
        let considered_up_to_round = if config.stop_early {
            let last_marked_round = marked_by_round.iter().rposition(|round| !round.is_empty());
            match last_marked_round {
                Some(round) => (round + buffer_region(graph.d())).min(graph.t().saturating_sub(1)),
                None => 0,
            }
        } else {
            graph.t().saturating_sub(1)
        };

        let mut clusters: Vec<ClusterPtr> = Vec::new();
        for round in &marked_by_round[..=considered_up_to_round] {
            for node in round {
                let cluster = Cluster::new(node.clone());
                node.write().set_cluster(Some(cluster.downgrade()));
                clusters.push(cluster);
            }
        }

        while !Cluster::all_are_neutral(&clusters, true) {
            let mut fusion_edges = Vec::new();
            for cluster in &clusters {
                if cluster.read_recursive().is_neutral(true) {
                    continue;
                }
                fusion_edges.extend(grow_cluster(cluster, config.growth_policy));
            }
            merge_fusion_edges(fusion_edges, &mut clusters, None);
        }

        let outcome = PeelingDecoder::decode(&clusters);
        DecodingResult::new(outcome.corrections, considered_up_to_round, outcome.decoding_steps)
    }
}

/// Grows every boundary edge of `cluster` by the growth policy's increment.
/// A boundary edge is always retained in the new boundary list regardless of
/// whether it fuses this step (the "keep-and-fuse" variant, §9 Open
/// Question, resolved against `original_source/src/UnionFindDecoder.cpp`).
pub(crate) fn grow_cluster(cluster: &ClusterPtr, growth_policy: crate::util::GrowthPolicy) -> Vec<FusionEdge> {
    let mut fusion_edges = Vec::new();
    let mut new_boundary = Vec::new();
    let boundary = cluster.read_recursive().boundary().to_vec();
    for mut boundary_edge in boundary {
        let growth = growth_policy.growth(boundary_edge.tree_node.read_recursive().id(), boundary_edge.leaf_node.read_recursive().id());
        boundary_edge.edge.write().add_growth(growth);
        boundary_edge.growth_from_tree += growth;
        if boundary_edge.edge.read_recursive().is_fully_grown() {
            fusion_edges.push(FusionEdge {
                edge: boundary_edge.edge.clone(),
                tree_node: boundary_edge.tree_node.clone(),
                leaf_node: boundary_edge.leaf_node.clone(),
            });
        }
        new_boundary.push(boundary_edge);
    }
    *cluster.write().boundary_mut() = new_boundary;
    fusion_edges
}

/// Resolves every fusion edge this step: adopts a lone leaf, or absorbs the
/// smaller cluster into the larger one. When `current_round` is `Some`
/// (ClAYG only), any cluster that becomes neutral as a result is stamped
/// with `has_been_neutral_since` (`original_source/src/ClAYGDecoder.cpp`'s
/// `merge`, which differs from `UnionFindDecoder::merge` only in this
/// stamping).
pub(crate) fn merge_fusion_edges(fusion_edges: Vec<FusionEdge>, clusters: &mut Vec<ClusterPtr>, current_round: Option<Round>) {
    for fusion_edge in fusion_edges {
        let leaf_cluster = fusion_edge.leaf_node.read_recursive().cluster();
        match leaf_cluster.and_then(|weak| weak.upgrade()) {
            None => {
                let tree_cluster = fusion_edge
                    .tree_node
                    .read_recursive()
                    .cluster()
                    .and_then(|weak| weak.upgrade())
                    .expect("tree node must already belong to a cluster");
                tree_cluster.write().adopt_leaf(fusion_edge.leaf_node.clone(), fusion_edge.edge.clone());
                fusion_edge.leaf_node.write().set_cluster(Some(tree_cluster.downgrade()));
                stamp_if_neutral(&tree_cluster, current_round);
            }
            Some(leaf_cluster) => {
                let tree_cluster = fusion_edge
                    .tree_node
                    .read_recursive()
                    .cluster()
                    .and_then(|weak| weak.upgrade())
                    .expect("tree node must already belong to a cluster");
                if leaf_cluster.ptr_eq(&tree_cluster) {
                    continue;
                }
                let (larger, smaller) = if leaf_cluster.read_recursive().nodes().len() >= tree_cluster.read_recursive().nodes().len() {
                    (leaf_cluster, tree_cluster)
                } else {
                    (tree_cluster, leaf_cluster)
                };
                let smaller_nodes: Vec<NodePtr> = smaller.read_recursive().nodes().to_vec();
                larger.write().absorb(&smaller.read_recursive());
                for node in &smaller_nodes {
                    node.write().set_cluster(Some(larger.downgrade()));
                }
                clusters.retain(|c| !c.ptr_eq(&smaller));
                stamp_if_neutral(&larger, current_round);
            }
        }
    }
}

fn stamp_if_neutral(cluster: &ClusterPtr, current_round: Option<Round>) {
    if let Some(round) = current_round {
        if cluster.read_recursive().is_neutral(true) {
            cluster.write().set_has_been_neutral_since(round);
        }
    }
}
