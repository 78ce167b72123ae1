//! Clusters: the growing, fusing unit of both the Union-Find and ClAYG
//! decoders. See §3 and §4.2 of the specification.

use crate::decoding_graph::{EdgePtr, NodePtr};
use crate::pointers::{ArcRwLock, RwLockPtr, WeakRwLock};
use crate::util::{NodeKind, Round, Weight};

pub type ClusterPtr = ArcRwLock<Cluster>;
pub type ClusterWeak = WeakRwLock<Cluster>;

/// A tree edge on the outside of a cluster, grown each step until it fuses
/// with a neighboring cluster (or with open space, promoting the leaf into
/// this one). `growth_from_tree` is this edge's own contribution to
/// `edge.growth()`, tracked separately so it can be refunded when the
/// cluster is later peeled (§4.5 "refund growth").
#[derive(Debug, Clone)]
pub struct BoundaryEdge {
    pub tree_node: NodePtr,
    pub leaf_node: NodePtr,
    pub edge: EdgePtr,
    pub growth_from_tree: Weight,
}

/// A boundary edge that has reached its full weight this step and is ready
/// to fuse two clusters (or adopt a lone leaf node).
#[derive(Debug, Clone)]
pub struct FusionEdge {
    pub edge: EdgePtr,
    pub tree_node: NodePtr,
    pub leaf_node: NodePtr,
}

#[derive(Debug)]
pub struct Cluster {
    root: NodePtr,
    nodes: Vec<NodePtr>,
    marked_nodes: Vec<NodePtr>,
    virtual_nodes: Vec<NodePtr>,
    edges: Vec<EdgePtr>,
    boundary: Vec<BoundaryEdge>,
    has_been_neutral_since: Option<Round>,
}

impl Cluster {
    /// Seeds a singleton cluster rooted at `root`, with one boundary edge
    /// per `root`'s incident edge. Does not set `root`'s `cluster` back-ref;
    /// callers do that once the new cluster is wrapped in a `ClusterPtr`
    /// (mirrors the constructor in `original_source/src/Cluster.cpp`, which
    /// likewise leaves the back-reference to its caller).
    pub fn new(root: NodePtr) -> ClusterPtr {
        let is_virtual = root.read_recursive().id().kind == NodeKind::Virtual;
        let mut boundary = Vec::new();
        for edge_weak in root.read_recursive().edges() {
            let edge = edge_weak.upgrade().expect("incident edge dropped");
            let leaf = edge.read_recursive().other_node(&root);
            boundary.push(BoundaryEdge {
                tree_node: root.clone(),
                leaf_node: leaf,
                edge,
                growth_from_tree: 0.,
            });
        }
        let mut virtual_nodes = Vec::new();
        if is_virtual {
            virtual_nodes.push(root.clone());
        }
        let marked_nodes = if root.read_recursive().marked() {
            vec![root.clone()]
        } else {
            Vec::new()
        };
        ClusterPtr::new_value(Self {
            nodes: vec![root.clone()],
            marked_nodes,
            virtual_nodes,
            edges: Vec::new(),
            boundary,
            has_been_neutral_since: None,
            root,
        })
    }

    pub fn root(&self) -> &NodePtr {
        &self.root
    }

    pub fn nodes(&self) -> &[NodePtr] {
        &self.nodes
    }

    pub fn marked_nodes(&self) -> &[NodePtr] {
        &self.marked_nodes
    }

    pub fn virtual_nodes(&self) -> &[NodePtr] {
        &self.virtual_nodes
    }

    pub fn edges(&self) -> &[EdgePtr] {
        &self.edges
    }

    pub fn boundary(&self) -> &[BoundaryEdge] {
        &self.boundary
    }

    pub fn boundary_mut(&mut self) -> &mut Vec<BoundaryEdge> {
        &mut self.boundary
    }

    pub fn has_been_neutral_since(&self) -> Option<Round> {
        self.has_been_neutral_since
    }

    pub fn set_has_been_neutral_since(&mut self, round: Round) {
        self.has_been_neutral_since = Some(round);
    }

    /// True once `marked_nodes.len()` is even, or (when `consider_virtual_nodes`)
    /// the cluster already touches a virtual boundary node — an odd number of
    /// marked nodes anchored to the boundary has nowhere left to pair up
    /// internally and is considered resolved (§4.2).
    pub fn is_neutral(&self, consider_virtual_nodes: bool) -> bool {
        if self.marked_nodes.len() % 2 == 0 {
            true
        } else if consider_virtual_nodes {
            !self.virtual_nodes.is_empty()
        } else {
            false
        }
    }

    pub fn all_are_neutral(clusters: &[ClusterPtr], consider_virtual_nodes: bool) -> bool {
        clusters.iter().all(|c| c.read_recursive().is_neutral(consider_virtual_nodes))
    }

    /// Toggles `node`'s membership in `marked_nodes` (add if absent, remove
    /// if present). Used both when a node's syndrome bit flips and when a
    /// newly-adopted leaf arrives already marked.
    pub fn toggle_marked_node(&mut self, node: &NodePtr) {
        if let Some(pos) = self.marked_nodes.iter().position(|n| n.ptr_eq(node)) {
            self.marked_nodes.remove(pos);
        } else {
            self.marked_nodes.push(node.clone());
        }
    }

    /// Absorbs a lone leaf node into this cluster via `edge`, pushing fresh
    /// boundary edges for each of the leaf's other incident edges. Does not
    /// set the leaf's `cluster` back-reference; the caller does that once it
    /// holds a `ClusterWeak` to `self`.
    pub fn adopt_leaf(&mut self, leaf: NodePtr, edge: EdgePtr) {
        self.edges.push(edge.clone());
        if leaf.read_recursive().id().kind == NodeKind::Virtual {
            self.virtual_nodes.push(leaf.clone());
        }
        if leaf.read_recursive().marked() {
            self.marked_nodes.push(leaf.clone());
        }
        for other_weak in leaf.read_recursive().edges() {
            let other_edge = other_weak.upgrade().expect("incident edge dropped");
            if other_edge.ptr_eq(&edge) {
                continue;
            }
            let other_leaf = other_edge.read_recursive().other_node(&leaf);
            self.boundary.push(BoundaryEdge {
                tree_node: leaf.clone(),
                leaf_node: other_leaf,
                edge: other_edge,
                growth_from_tree: 0.,
            });
        }
        self.nodes.push(leaf);
    }

    /// Merges `other` into `self` (the larger of the two clusters), copying
    /// all member state. Does not retarget `other`'s member nodes' `cluster`
    /// back-references; the caller does that with a `ClusterWeak` to `self`.
    pub fn absorb(&mut self, other: &Cluster) {
        self.nodes.extend(other.nodes.iter().cloned());
        self.marked_nodes.extend(other.marked_nodes.iter().cloned());
        self.virtual_nodes.extend(other.virtual_nodes.iter().cloned());
        self.edges.extend(other.edges.iter().cloned());
        self.boundary.extend(other.boundary.iter().cloned());
    }
}
