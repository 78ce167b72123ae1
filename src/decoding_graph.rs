//! The decoding graph: nodes, edges, per-round indices, and the three
//! supported code factories (rotated surface code, surface code, repetition
//! code). See §3 and §4.1 of the specification.

use crate::cluster::Cluster;
use crate::derivative::Derivative;
use crate::more_asserts;
use crate::pointers::{ArcRwLock, RwLockPtr, WeakRwLock};
use crate::util::*;
use std::collections::{BTreeSet, HashMap};

pub type NodePtr = ArcRwLock<Node>;
pub type NodeWeak = WeakRwLock<Node>;
pub type EdgePtr = ArcRwLock<Edge>;
pub type EdgeWeak = WeakRwLock<Edge>;

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Node {
    id: NodeId,
    marked: bool,
    /// back-reference to the owning cluster; weak so that dropping a
    /// cluster (e.g. after peeling) doesn't need to chase down every member
    /// node to clear it explicitly, except where correctness requires it
    /// (see `reset`, which clears it for real).
    #[derivative(Debug = "ignore")]
    cluster: Option<WeakRwLock<Cluster>>,
    #[derivative(Debug = "ignore")]
    edges: Vec<EdgeWeak>,
}

impl std::fmt::Debug for NodePtr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.read_recursive().id())
    }
}

impl std::fmt::Debug for NodeWeak {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.upgrade_force().read_recursive().id())
    }
}

impl Node {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            marked: false,
            cluster: None,
            edges: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn marked(&self) -> bool {
        self.marked
    }

    pub fn set_marked(&mut self, marked: bool) {
        self.marked = marked;
    }

    pub fn cluster(&self) -> Option<WeakRwLock<Cluster>> {
        self.cluster.clone()
    }

    pub fn set_cluster(&mut self, cluster: Option<WeakRwLock<Cluster>>) {
        self.cluster = cluster;
    }

    pub fn edges(&self) -> &[EdgeWeak] {
        &self.edges
    }

    fn add_edge(&mut self, edge: EdgeWeak) {
        self.edges.push(edge);
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Edge {
    id: EdgeId,
    #[derivative(Debug = "ignore")]
    nodes: (NodeWeak, NodeWeak),
    growth: Weight,
    weight: Weight,
}

impl std::fmt::Debug for EdgePtr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.read_recursive().id())
    }
}

impl std::fmt::Debug for EdgeWeak {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.upgrade_force().read_recursive().id())
    }
}

impl Edge {
    fn new(id: EdgeId, nodes: (NodeWeak, NodeWeak)) -> Self {
        Self {
            id,
            nodes,
            growth: 0.,
            weight: DEFAULT_WEIGHT,
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn nodes(&self) -> (&NodeWeak, &NodeWeak) {
        (&self.nodes.0, &self.nodes.1)
    }

    /// Returns the endpoint of this edge that is not `node`. Asserts if
    /// `node` is not actually an endpoint: an invariant violation (§7), not
    /// something callers are expected to recover from.
    pub fn other_node(&self, node: &NodePtr) -> NodePtr {
        let first = self.nodes.0.upgrade().expect("edge endpoint dropped");
        if first.ptr_eq(node) {
            return self.nodes.1.upgrade().expect("edge endpoint dropped");
        }
        let second = self.nodes.1.upgrade().expect("edge endpoint dropped");
        assert!(second.ptr_eq(node), "node is not an endpoint of this edge");
        second
    }

    pub fn growth(&self) -> Weight {
        self.growth
    }

    pub fn add_growth(&mut self, growth: Weight) {
        self.growth += growth;
        // P2: growth only ever goes negative via a peeling refund, which
        // returns it to exactly 0 (never below) up to float error.
        more_asserts::debug_assert_ge!(self.growth, -1e-6, "edge growth refunded past zero: {:?}", self.id);
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn set_weight(&mut self, weight: Weight) {
        self.weight = weight;
    }

    pub fn is_fully_grown(&self) -> bool {
        self.growth >= self.weight
    }

    /// Used by ClAYG's `clean` to refund a peeled cluster's bulk edges back
    /// to zero growth (§4.5); not exposed outside the crate since every
    /// other caller goes through `DecodingGraph::reset`.
    pub(crate) fn reset_growth(&mut self) {
        self.growth = 0.;
    }
}

/// Topology plus per-round indices over a fixed set of nodes and edges.
/// Constructed by a factory (`rotated_surface_code`, `surface_code`,
/// `repetition_code`), then mutated only through `add_node`/`add_edge`/
/// `add_logical_edge`/`reset`/`mark` (§3 Lifecycle).
#[derive(Debug)]
pub struct DecodingGraph {
    d: usize,
    t: usize,
    ancilla_count_per_layer: usize,
    code_name: &'static str,
    nodes: Vec<NodePtr>,
    edges: Vec<EdgePtr>,
    bulk_nodes: Vec<HashMap<Index, NodePtr>>,
    virtual_nodes: HashMap<Index, NodePtr>,
    normal_edges: Vec<HashMap<Index, EdgePtr>>,
    measurement_edges: Vec<HashMap<Index, EdgePtr>>,
    logical_edges: Vec<EdgeId>,
}

impl DecodingGraph {
    fn empty(d: usize, t: usize, ancilla_count_per_layer: usize, code_name: &'static str) -> Self {
        Self {
            d,
            t,
            ancilla_count_per_layer,
            code_name,
            nodes: Vec::new(),
            edges: Vec::new(),
            bulk_nodes: Vec::new(),
            virtual_nodes: HashMap::new(),
            normal_edges: Vec::new(),
            measurement_edges: Vec::new(),
            logical_edges: Vec::new(),
        }
    }

    pub fn d(&self) -> usize {
        self.d
    }

    pub fn t(&self) -> usize {
        self.t
    }

    pub fn ancilla_count_per_layer(&self) -> usize {
        self.ancilla_count_per_layer
    }

    pub fn code_name(&self) -> &'static str {
        self.code_name
    }

    pub fn nodes(&self) -> &[NodePtr] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgePtr] {
        &self.edges
    }

    /// Appends `node` to the global sequence and writes it into the
    /// appropriate per-round index. A duplicate insertion at the same slot
    /// is a construction-time bug (§7): caught by `debug_assert` so release
    /// builds degrade to "fails silently" per §4.1 rather than panicking in
    /// production.
    pub fn add_node(&mut self, node: NodePtr) {
        let id = node.read_recursive().id();
        match id.kind {
            NodeKind::Bulk => {
                if self.bulk_nodes.len() <= id.round {
                    self.bulk_nodes.resize_with(id.round + 1, HashMap::new);
                }
                debug_assert!(
                    !self.bulk_nodes[id.round].contains_key(&id.index),
                    "duplicate bulk node {id:?}"
                );
                self.bulk_nodes[id.round].entry(id.index).or_insert_with(|| node.clone());
            }
            NodeKind::Virtual => {
                debug_assert!(
                    !self.virtual_nodes.contains_key(&id.index),
                    "duplicate virtual node {id:?}"
                );
                self.virtual_nodes.entry(id.index).or_insert_with(|| node.clone());
            }
        }
        self.nodes.push(node);
    }

    /// Appends `edge` to the global sequence, the per-round-per-kind index,
    /// and both endpoints' incident-edge lists.
    pub fn add_edge(&mut self, edge: EdgePtr) {
        let id = edge.read_recursive().id();
        let table = match id.kind {
            EdgeKind::Normal => &mut self.normal_edges,
            EdgeKind::Measurement => &mut self.measurement_edges,
        };
        if table.len() <= id.round {
            table.resize_with(id.round + 1, HashMap::new);
        }
        debug_assert!(!table[id.round].contains_key(&id.index), "duplicate edge {id:?}");
        table[id.round].entry(id.index).or_insert_with(|| edge.clone());

        let (a, b) = {
            let e = edge.read_recursive();
            let (wa, wb) = e.nodes();
            (wa.upgrade().expect("edge endpoint missing"), wb.upgrade().expect("edge endpoint missing"))
        };
        a.write().add_edge(edge.downgrade());
        b.write().add_edge(edge.downgrade());
        self.edges.push(edge);
    }

    /// Returns "absent" (`None`) if the round is out of range; virtual-node
    /// lookup ignores `round`.
    pub fn node(&self, id: NodeId) -> Option<NodePtr> {
        match id.kind {
            NodeKind::Virtual => self.virtual_nodes.get(&id.index).cloned(),
            NodeKind::Bulk => self.bulk_nodes.get(id.round)?.get(&id.index).cloned(),
        }
    }

    /// Symmetric to `node`: returns "absent" if round or index is out of range.
    pub fn edge(&self, id: EdgeId) -> Option<EdgePtr> {
        let table = match id.kind {
            EdgeKind::Normal => &self.normal_edges,
            EdgeKind::Measurement => &self.measurement_edges,
        };
        table.get(id.round)?.get(&id.index).cloned()
    }

    pub fn add_logical_edge(&mut self, id: EdgeId) {
        self.logical_edges.push(id);
    }

    /// Normal-edge `index` values (kind and round stripped) whose correction
    /// flips the logical observable.
    pub fn logical_edge_ids(&self) -> BTreeSet<Index> {
        self.logical_edges.iter().map(|id| id.index).collect()
    }

    /// Clears every node's marked/cluster and every edge's growth to zero.
    /// Factory state (topology, logical edges) is untouched.
    pub fn reset(&mut self) {
        for node in &self.nodes {
            let mut node = node.write();
            node.set_marked(false);
            node.set_cluster(None);
        }
        for edge in &self.edges {
            edge.write().reset_growth();
        }
    }

    /// Toggles the `marked` flag on each non-virtual endpoint of every
    /// `error_edges` entry. Call after `reset()` to establish the syndrome.
    pub fn mark(&self, error_edges: &[EdgeId]) {
        for id in error_edges {
            let edge = self.edge(*id).expect("mark: edge id out of range");
            let (a, b) = {
                let e = edge.read_recursive();
                let (wa, wb) = e.nodes();
                (wa.upgrade().expect("edge endpoint missing"), wb.upgrade().expect("edge endpoint missing"))
            };
            for node in [a, b] {
                let mut node = node.write();
                if node.id().kind == NodeKind::Virtual {
                    continue;
                }
                let marked = node.marked();
                node.set_marked(!marked);
            }
        }
    }

    /// A length-`T` table whose `i`-th entry lists the bulk marked nodes at
    /// round `i`, sorted by `(round, index)` for deterministic streaming
    /// into ClAYG (§5).
    pub fn marked_nodes_by_round(&self) -> Vec<Vec<NodePtr>> {
        let mut by_round = vec![Vec::new(); self.t];
        for node in &self.nodes {
            let n = node.read_recursive();
            if n.marked() && n.id().kind == NodeKind::Bulk {
                by_round[n.id().round].push(node.clone());
            }
        }
        for round in &mut by_round {
            round.sort_by_key(|n| n.read_recursive().id());
        }
        by_round
    }

    /// Constructs a new graph with `T = 1` containing only the `t = 0`
    /// Normal edges of `graph` (no Measurement edges). Preserves `D` and the
    /// logical-edge set (P5).
    pub fn single_layer_copy(graph: &DecodingGraph) -> DecodingGraph {
        let mut copy = DecodingGraph::empty(graph.d, 1, graph.ancilla_count_per_layer, graph.code_name);

        for (&index, node) in &graph.virtual_nodes {
            let id = node.read_recursive().id();
            debug_assert_eq!(index, id.index);
            copy.add_node(NodePtr::new_value(Node::new(id)));
        }
        if let Some(round0) = graph.bulk_nodes.first() {
            for (&index, node) in round0 {
                let id = node.read_recursive().id();
                debug_assert_eq!(index, id.index);
                copy.add_node(NodePtr::new_value(Node::new(id)));
            }
        }

        if let Some(round0_edges) = graph.normal_edges.first() {
            let mut ids: Vec<_> = round0_edges.keys().cloned().collect();
            ids.sort_unstable();
            for index in ids {
                let edge = &round0_edges[&index];
                let source = edge.read_recursive();
                let (a_weak, b_weak) = source.nodes();
                let a_id = a_weak.upgrade().expect("edge endpoint missing").read_recursive().id();
                let b_id = b_weak.upgrade().expect("edge endpoint missing").read_recursive().id();
                let weight = source.weight();
                drop(source);
                let a = copy.node(a_id).expect("projected endpoint must exist");
                let b = copy.node(b_id).expect("projected endpoint must exist");
                let new_edge = EdgePtr::new_value(Edge::new(EdgeId::normal(0, index), (a.downgrade(), b.downgrade())));
                new_edge.write().set_weight(weight);
                copy.add_edge(new_edge);
            }
        }

        for id in &graph.logical_edges {
            copy.add_logical_edge(*id);
        }
        copy
    }

    /// Deep-copies the full multi-round topology of `graph` (all rounds,
    /// both edge kinds) into a fresh, independent `DecodingGraph`. Used by
    /// `ClAYGDecoder` to own a private long-lived replica decoupled from the
    /// graph passed into `decode`, so its own reset/mark cycle never
    /// touches the caller's object (§4.5; mirrors `decoding_graph_ =
    /// make_shared<DecodingGraph>(*graph)` in
    /// `original_source/src/ClAYGDecoder.cpp`).
    pub fn structural_copy(graph: &DecodingGraph) -> DecodingGraph {
        let mut copy = DecodingGraph::empty(graph.d, graph.t, graph.ancilla_count_per_layer, graph.code_name);

        for node in &graph.nodes {
            let id = node.read_recursive().id();
            copy.add_node(NodePtr::new_value(Node::new(id)));
        }

        for edge in &graph.edges {
            let source = edge.read_recursive();
            let (a_weak, b_weak) = source.nodes();
            let a_id = a_weak.upgrade().expect("edge endpoint missing").read_recursive().id();
            let b_id = b_weak.upgrade().expect("edge endpoint missing").read_recursive().id();
            let id = source.id();
            let weight = source.weight();
            drop(source);
            let a = copy.node(a_id).expect("copied endpoint must exist");
            let b = copy.node(b_id).expect("copied endpoint must exist");
            let new_edge = EdgePtr::new_value(Edge::new(id, (a.downgrade(), b.downgrade())));
            new_edge.write().set_weight(weight);
            copy.add_edge(new_edge);
        }

        for id in &graph.logical_edges {
            copy.add_logical_edge(*id);
        }
        copy
    }

    /// The unrotated planar ("surface") code: `ancilla_height = ancilla_width = D - 1`.
    pub fn surface_code(d: usize, t: usize) -> DecodingGraph {
        let ancilla_height = d - 1;
        let ancilla_width = d - 1;
        let mut graph = DecodingGraph::empty(d, t, ancilla_height * ancilla_width, "surface_code");

        let top = NodePtr::new_value(Node::new(NodeId::virt(0)));
        let bottom = NodePtr::new_value(Node::new(NodeId::virt(1)));
        graph.add_node(top.clone());
        graph.add_node(bottom.clone());

        for round in 0..t {
            let mut next_index = 0usize;
            for y in 0..ancilla_height {
                for x in 0..ancilla_width {
                    let index = x + y * ancilla_width;
                    let node = NodePtr::new_value(Node::new(NodeId::bulk(round, index)));
                    graph.add_node(node.clone());

                    if round > 0 {
                        let prev = graph.node(NodeId::bulk(round - 1, index)).expect("previous round must exist");
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::measurement(round - 1, index),
                            (node.downgrade(), prev.downgrade()),
                        ));
                        graph.add_edge(edge);
                    }

                    if y == 0 {
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::normal(round, next_index),
                            (node.downgrade(), top.downgrade()),
                        ));
                        graph.add_edge(edge);
                        next_index += 1;
                    } else {
                        let above = graph
                            .node(NodeId::bulk(round, x + (y - 1) * ancilla_width))
                            .expect("row above must exist");
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::normal(round, next_index),
                            (node.downgrade(), above.downgrade()),
                        ));
                        graph.add_edge(edge);
                        next_index += 1;
                    }

                    if x > 0 {
                        let left = graph
                            .node(NodeId::bulk(round, x - 1 + y * ancilla_width))
                            .expect("left neighbor must exist");
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::normal(round, next_index),
                            (node.downgrade(), left.downgrade()),
                        ));
                        if y == 0 {
                            graph.add_logical_edge(edge.read_recursive().id());
                        }
                        graph.add_edge(edge);
                        next_index += 1;
                    }

                    if y == ancilla_height - 1 {
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::normal(round, next_index),
                            (node.downgrade(), bottom.downgrade()),
                        ));
                        graph.add_edge(edge);
                        next_index += 1;
                    }
                }
            }
        }
        graph
    }

    /// The rotated surface code: `ancilla_height = D - 1`, `ancilla_width = ceil(D / 2)`.
    pub fn rotated_surface_code(d: usize, t: usize) -> DecodingGraph {
        let ancilla_height = d - 1;
        let ancilla_width = d.div_ceil(2);
        let mut graph = DecodingGraph::empty(d, t, ancilla_height * ancilla_width, "rotated_surface_code");

        let top = NodePtr::new_value(Node::new(NodeId::virt(0)));
        let bottom = NodePtr::new_value(Node::new(NodeId::virt(1)));
        graph.add_node(top.clone());
        graph.add_node(bottom.clone());

        for round in 0..t {
            let mut next_index = 0usize;
            for y in 0..ancilla_height {
                for x in 0..ancilla_width {
                    let index = x + y * ancilla_width;
                    let node = NodePtr::new_value(Node::new(NodeId::bulk(round, index)));
                    graph.add_node(node.clone());

                    if round > 0 {
                        let prev = graph.node(NodeId::bulk(round - 1, index)).expect("previous round must exist");
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::measurement(round - 1, index),
                            (node.downgrade(), prev.downgrade()),
                        ));
                        graph.add_edge(edge);
                    }

                    if y == 0 {
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::normal(round, next_index),
                            (node.downgrade(), top.downgrade()),
                        ));
                        graph.add_edge(edge);
                        next_index += 1;
                        if x + 1 < ancilla_width {
                            let edge = EdgePtr::new_value(Edge::new(
                                EdgeId::normal(round, next_index),
                                (node.downgrade(), top.downgrade()),
                            ));
                            graph.add_edge(edge);
                            next_index += 1;
                        }
                        continue;
                    }

                    if y % 2 == 0 {
                        let other = graph
                            .node(NodeId::bulk(round, x + (y - 1) * ancilla_width))
                            .expect("neighbor must exist");
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::normal(round, next_index),
                            (node.downgrade(), other.downgrade()),
                        ));
                        graph.add_edge(edge);
                        next_index += 1;
                        if x + 1 < ancilla_width {
                            let other = graph
                                .node(NodeId::bulk(round, x + 1 + (y - 1) * ancilla_width))
                                .expect("neighbor must exist");
                            let edge = EdgePtr::new_value(Edge::new(
                                EdgeId::normal(round, next_index),
                                (node.downgrade(), other.downgrade()),
                            ));
                            graph.add_edge(edge);
                            next_index += 1;
                        }
                    } else {
                        if x > 0 {
                            let other = graph
                                .node(NodeId::bulk(round, x - 1 + (y - 1) * ancilla_width))
                                .expect("neighbor must exist");
                            let edge = EdgePtr::new_value(Edge::new(
                                EdgeId::normal(round, next_index),
                                (node.downgrade(), other.downgrade()),
                            ));
                            graph.add_edge(edge);
                            next_index += 1;
                        }
                        let other = graph
                            .node(NodeId::bulk(round, x + (y - 1) * ancilla_width))
                            .expect("neighbor must exist");
                        let edge = EdgePtr::new_value(Edge::new(
                            EdgeId::normal(round, next_index),
                            (node.downgrade(), other.downgrade()),
                        ));
                        graph.add_edge(edge);
                        next_index += 1;
                    }
                }
            }

            for x in 0..ancilla_width {
                let index = x + ancilla_width * (ancilla_height - 1);
                let node = graph.node(NodeId::bulk(round, index)).expect("bottom row node must exist");
                if x > 0 {
                    let edge = EdgePtr::new_value(Edge::new(
                        EdgeId::normal(round, next_index),
                        (node.downgrade(), bottom.downgrade()),
                    ));
                    graph.add_edge(edge);
                    next_index += 1;
                }
                let edge = EdgePtr::new_value(Edge::new(
                    EdgeId::normal(round, next_index),
                    (node.downgrade(), bottom.downgrade()),
                ));
                graph.add_edge(edge);
                next_index += 1;
            }
        }

        for index in 0..d {
            let edge = graph.edge(EdgeId::normal(0, index)).expect("logical edge must exist");
            graph.add_logical_edge(edge.read_recursive().id());
        }
        graph
    }

    /// A linear chain of `D` bulk nodes per round with a left- and
    /// right-boundary virtual node.
    pub fn repetition_code(d: usize, t: usize) -> DecodingGraph {
        let mut graph = DecodingGraph::empty(d, t, d, "repetition_code");

        let left = NodePtr::new_value(Node::new(NodeId::virt(0)));
        let right = NodePtr::new_value(Node::new(NodeId::virt(1)));
        graph.add_node(left.clone());
        graph.add_node(right.clone());

        for round in 0..t {
            for x in 0..d {
                let node = NodePtr::new_value(Node::new(NodeId::bulk(round, x)));
                graph.add_node(node.clone());

                let other = if x == 0 {
                    left.clone()
                } else {
                    graph.node(NodeId::bulk(round, x - 1)).expect("left neighbor must exist")
                };
                let edge = EdgePtr::new_value(Edge::new(
                    EdgeId::normal(round, x),
                    (other.downgrade(), node.downgrade()),
                ));
                if x == 0 && round == 0 {
                    graph.add_logical_edge(edge.read_recursive().id());
                }
                graph.add_edge(edge);

                if round > 0 {
                    let prev = graph.node(NodeId::bulk(round - 1, x)).expect("previous round must exist");
                    let edge = EdgePtr::new_value(Edge::new(
                        EdgeId::measurement(round - 1, x),
                        (node.downgrade(), prev.downgrade()),
                    ));
                    graph.add_edge(edge);
                }
            }
            let rightmost = graph.node(NodeId::bulk(round, d - 1)).expect("rightmost node must exist");
            let edge = EdgePtr::new_value(Edge::new(
                EdgeId::normal(round, d),
                (rightmost.downgrade(), right.downgrade()),
            ));
            graph.add_edge(edge);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    // Shape invariants that must hold across every code family and every
    // (d, t) the factories are asked to build, not just the one pair each
    // dedicated shape test below exercises.
    #[test_case(DecodingGraph::rotated_surface_code, 3, 3; "rotated_d3_t3")]
    #[test_case(DecodingGraph::rotated_surface_code, 5, 5; "rotated_d5_t5")]
    #[test_case(DecodingGraph::surface_code, 3, 3; "unrotated_d3_t3")]
    #[test_case(DecodingGraph::surface_code, 5, 4; "unrotated_d5_t4")]
    #[test_case(DecodingGraph::repetition_code, 3, 3; "repetition_d3_t3")]
    #[test_case(DecodingGraph::repetition_code, 7, 2; "repetition_d7_t2")]
    fn code_factory_shape_invariants(factory: fn(usize, usize) -> DecodingGraph, d: usize, t: usize) {
        let graph = factory(d, t);
        assert_eq!(graph.d(), d);
        assert_eq!(graph.t(), t);
        assert_eq!(graph.nodes().len(), 2 + t * graph.ancilla_count_per_layer());
        assert!(!graph.logical_edge_ids().is_empty());
        // every logical edge index must address a real normal edge in round 0
        for &index in graph.logical_edge_ids().iter() {
            assert!(graph.edge(EdgeId::normal(0, index)).is_some());
        }
        // exactly two virtual nodes, found regardless of round
        assert!(graph.node(NodeId::virt(0)).is_some());
        assert!(graph.node(NodeId::virt(1)).is_some());
    }

    #[test]
    fn rotated_surface_code_shape() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        assert_eq!(graph.d(), 3);
        assert_eq!(graph.t(), 3);
        assert_eq!(graph.ancilla_count_per_layer(), 2 * 2);
        assert_eq!(graph.logical_edge_ids().len(), 3);
        // two virtual nodes plus 3 rounds * 4 ancillas
        assert_eq!(graph.nodes().len(), 2 + 3 * 4);
    }

    #[test]
    fn node_and_edge_lookup_out_of_range_is_absent() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        assert!(graph.node(NodeId::bulk(5, 0)).is_none());
        assert!(graph.edge(EdgeId::normal(5, 0)).is_none());
        assert!(graph.node(NodeId::bulk(0, 0)).is_some());
    }

    #[test]
    fn virtual_node_lookup_ignores_round() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let a = graph.node(NodeId::new(NodeKind::Virtual, 0, 0)).unwrap();
        let b = graph.node(NodeId::new(NodeKind::Virtual, 7, 0)).unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn reset_clears_marked_and_growth() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        graph.mark(&[EdgeId::normal(0, 0)]);
        let edge = graph.edge(EdgeId::normal(0, 0)).unwrap();
        edge.write().add_growth(0.5);
        graph.reset();
        for node in graph.nodes() {
            assert!(!node.read_recursive().marked());
        }
        for edge in graph.edges() {
            assert_eq!(edge.read_recursive().growth(), 0.);
        }
    }

    // R1: reset(); mark(E); decode(); reset() leaves the graph bit-identical
    // to its post-factory state — every node unmarked, with no cluster
    // back-reference, and every edge's growth back at zero.
    #[test]
    fn decode_then_reset_restores_factory_state() {
        use crate::union_find::UnionFindDecoder;
        use crate::util::DecoderConfig;

        let graph = DecodingGraph::rotated_surface_code(3, 3);
        graph.reset();
        graph.mark(&[EdgeId::normal(0, 0), EdgeId::measurement(0, 1)]);
        let _ = UnionFindDecoder::decode(&graph, &DecoderConfig::default());
        graph.reset();

        for node in graph.nodes() {
            let node = node.read_recursive();
            assert!(!node.marked());
            assert!(node.cluster().is_none());
        }
        for edge in graph.edges() {
            assert_eq!(edge.read_recursive().growth(), 0.);
        }
    }

    #[test]
    fn mark_toggles_non_virtual_endpoints_only() {
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        graph.mark(&[EdgeId::normal(0, 0)]);
        let edge = graph.edge(EdgeId::normal(0, 0)).unwrap();
        let (a, b) = edge.read_recursive().nodes();
        let a = a.upgrade().unwrap();
        let b = b.upgrade().unwrap();
        let marked_count = [a, b].iter().filter(|n| n.read_recursive().marked()).count();
        assert_eq!(marked_count, 1, "virtual endpoint must not be marked");
    }

    #[test]
    fn structural_copy_preserves_full_multi_round_topology() {
        let graph = DecodingGraph::rotated_surface_code(5, 5);
        let copy = DecodingGraph::structural_copy(&graph);
        assert_eq!(copy.t(), graph.t());
        assert_eq!(copy.d(), graph.d());
        assert_eq!(copy.nodes().len(), graph.nodes().len());
        assert_eq!(copy.edges().len(), graph.edges().len());
        assert_eq!(copy.logical_edge_ids(), graph.logical_edge_ids());
        assert!(copy
            .edges()
            .iter()
            .any(|e| e.read_recursive().id().kind == EdgeKind::Measurement));
        // mutating the copy must never touch the original
        copy.mark(&[EdgeId::normal(0, 0)]);
        let original_node = graph.node(NodeId::bulk(0, 0)).unwrap();
        assert!(!original_node.read_recursive().marked());
    }

    #[test]
    fn single_layer_copy_preserves_logical_edges_and_drops_measurement_edges() {
        let graph = DecodingGraph::rotated_surface_code(5, 5);
        let copy = DecodingGraph::single_layer_copy(&graph);
        assert_eq!(copy.t(), 1);
        assert_eq!(copy.d(), graph.d());
        assert_eq!(copy.logical_edge_ids(), graph.logical_edge_ids());
        assert!(copy.edges().iter().all(|e| e.read_recursive().id().kind == EdgeKind::Normal));
    }

    #[test]
    fn repetition_code_chain_shape() {
        let graph = DecodingGraph::repetition_code(5, 2);
        assert_eq!(graph.ancilla_count_per_layer(), 5);
        // 2 virtual + 2 rounds * 5 ancillas
        assert_eq!(graph.nodes().len(), 2 + 2 * 5);
        assert_eq!(graph.logical_edge_ids().len(), 1);
    }
}
