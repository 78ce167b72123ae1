//! Common index and weight types, plus the typed decoder configuration.
//!
//! Decoder options arrive at the boundary as a `HashMap<String, String>` (see
//! [`crate::decoder`]); this module is where that untyped map becomes a typed
//! [`DecoderConfig`] once, at construction, so the hot decode loop never does
//! string work.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Round index into a multi-layer decoding graph.
pub type Round = usize;

/// Index of a node or edge within its round (and kind).
pub type Index = usize;

/// Growth/weight accumulator. The original implementation uses a 4-byte
/// `float`; kept here rather than promoted to `f64` since nothing in the
/// algorithm needs the extra precision and it keeps growth comparisons
/// (`growth >= weight`) behaving exactly as the source does.
pub type Weight = f32;

/// Default edge weight, used unless a factory overrides it.
pub const DEFAULT_WEIGHT: Weight = 1.0;

/// Default half-weight growth increment per growth step.
pub const DEFAULT_GROWTH: Weight = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Bulk,
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Normal,
    Measurement,
}

/// `(kind, round, index)`. For [`NodeKind::Virtual`] nodes `round` is always
/// `0` and lookups ignore it (there are exactly two virtual nodes per graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub kind: NodeKind,
    pub round: Round,
    pub index: Index,
}

impl NodeId {
    pub fn new(kind: NodeKind, round: Round, index: Index) -> Self {
        Self { kind, round, index }
    }

    pub fn bulk(round: Round, index: Index) -> Self {
        Self::new(NodeKind::Bulk, round, index)
    }

    pub fn virt(index: Index) -> Self {
        Self::new(NodeKind::Virtual, 0, index)
    }

    /// Returns the same node id with `round` rewritten to `0`, as used by
    /// [`crate::clayg::SingleLayerClAYGDecoder::add`] to project a
    /// multi-round syndrome onto the flattened graph.
    pub fn at_round_zero(self) -> Self {
        Self { round: 0, ..self }
    }
}

/// `(kind, round, index)`. `round` of a [`EdgeKind::Measurement`] edge is the
/// round it *originates* from (the earlier of the two rounds it connects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    pub kind: EdgeKind,
    pub round: Round,
    pub index: Index,
}

impl EdgeId {
    pub fn new(kind: EdgeKind, round: Round, index: Index) -> Self {
        Self { kind, round, index }
    }

    pub fn normal(round: Round, index: Index) -> Self {
        Self::new(EdgeKind::Normal, round, index)
    }

    pub fn measurement(round: Round, index: Index) -> Self {
        Self::new(EdgeKind::Measurement, round, index)
    }
}

/// Named growth policies recognized by the `growth_policy` decoder option
/// (see §6 of the specification). `Uniform` is the default: every boundary
/// edge grows by half its weight each step, regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GrowthPolicy {
    #[default]
    Uniform,
    /// `0.34` for same-round edges, `1.0` for backward-time edges, `0.5` otherwise.
    Third,
    /// `1.0` for backward-time edges, `0.5` otherwise.
    FasterBackwards,
}

impl GrowthPolicy {
    /// `growth_policy(tree_id, leaf_id)`, see §4.3.
    pub fn growth(&self, tree: NodeId, leaf: NodeId) -> Weight {
        match self {
            GrowthPolicy::Uniform => DEFAULT_GROWTH,
            GrowthPolicy::Third => {
                if tree.round == leaf.round {
                    0.34
                } else if tree.round > leaf.round {
                    1.0
                } else {
                    0.5
                }
            }
            GrowthPolicy::FasterBackwards => {
                if tree.round > leaf.round {
                    1.0
                } else {
                    0.5
                }
            }
        }
    }
}

/// Typed, validated decoder configuration. Built once from the untyped
/// string map that arrives from the CLI or an embedding caller; unrecognized
/// keys are ignored (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub stop_early: bool,
    pub growth_policy: GrowthPolicy,
    pub growth_rounds: u32,
    pub cluster_lifetime_factor: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            stop_early: false,
            growth_policy: GrowthPolicy::default(),
            growth_rounds: 1,
            cluster_lifetime_factor: 0.,
        }
    }
}

impl DecoderConfig {
    /// Translate the string-keyed option map into a typed configuration.
    /// Unrecognized keys, and values that fail to parse, are ignored rather
    /// than rejected: the core has no way to distinguish a typo from a
    /// future option it simply doesn't know about yet.
    pub fn from_args(args: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = args.get("stop_early") {
            config.stop_early = value == "true";
        }
        if let Some(value) = args.get("growth_policy") {
            config.growth_policy = match value.as_str() {
                "third" => GrowthPolicy::Third,
                "faster_backwards" => GrowthPolicy::FasterBackwards,
                _ => GrowthPolicy::Uniform,
            };
        }
        if let Some(value) = args.get("growth_rounds") {
            if let Ok(parsed) = value.parse() {
                config.growth_rounds = parsed;
            }
        }
        if let Some(value) = args.get("cluster_lifetime") {
            if let Ok(parsed) = value.parse() {
                config.cluster_lifetime_factor = parsed;
            }
        }
        config
    }

    /// How many rounds a freshly-neutral cluster is retained before being
    /// peeled, per §4.5.
    pub fn cluster_lifetime(&self, d: usize) -> usize {
        if self.cluster_lifetime_factor < 1. {
            (d as f64 * self.cluster_lifetime_factor).floor() as usize
        } else {
            self.cluster_lifetime_factor.floor() as usize
        }
    }
}

/// The result of a single `decode` call (§3 Data Model, §6). Serializes so
/// that an embedding caller can persist a trial's outcome without writing
/// its own encoder (§2.6 of the expanded specification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingResult {
    pub corrections: Vec<EdgeId>,
    pub considered_up_to_round: Round,
    /// Reporting-only cost metric (§9): not load-bearing, safe to ignore.
    pub decoding_steps: usize,
}

impl DecodingResult {
    pub fn new(corrections: Vec<EdgeId>, considered_up_to_round: Round, decoding_steps: usize) -> Self {
        Self {
            corrections,
            considered_up_to_round,
            decoding_steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_policy_third() {
        let policy = GrowthPolicy::Third;
        let same_round = NodeId::bulk(2, 0);
        let same_round_other = NodeId::bulk(2, 1);
        assert_eq!(policy.growth(same_round, same_round_other), 0.34);
        let later = NodeId::bulk(2, 0);
        let earlier = NodeId::bulk(1, 0);
        assert_eq!(policy.growth(later, earlier), 1.0);
        let earlier_tree = NodeId::bulk(1, 0);
        let later_leaf = NodeId::bulk(2, 0);
        assert_eq!(policy.growth(earlier_tree, later_leaf), 0.5);
    }

    #[test]
    fn decoder_config_from_args() {
        let mut args = HashMap::new();
        args.insert("stop_early".to_string(), "true".to_string());
        args.insert("growth_policy".to_string(), "faster_backwards".to_string());
        args.insert("growth_rounds".to_string(), "3".to_string());
        args.insert("cluster_lifetime".to_string(), "0.5".to_string());
        args.insert("unknown_key".to_string(), "ignored".to_string());
        let config = DecoderConfig::from_args(&args);
        assert!(config.stop_early);
        assert_eq!(config.growth_policy, GrowthPolicy::FasterBackwards);
        assert_eq!(config.growth_rounds, 3);
        assert_eq!(config.cluster_lifetime(10), 5);
    }

    #[test]
    fn cluster_lifetime_factor_above_one_is_absolute() {
        let config = DecoderConfig {
            cluster_lifetime_factor: 4.0,
            ..Default::default()
        };
        assert_eq!(config.cluster_lifetime(11), 4);
    }
}
