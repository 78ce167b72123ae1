//! The `Decoder` abstraction: a tagged variant of the three supported
//! algorithms with one uniform `decode` entry point. See §9 "Dynamic
//! dispatch": the decoder set is closed, so this prefers a plain enum over a
//! `Box<dyn Trait>` vtable.

use crate::clayg::ClAYGDecoder;
use crate::decoding_graph::DecodingGraph;
use crate::union_find::UnionFindDecoder;
use crate::util::{DecoderConfig, DecodingResult};
use std::collections::HashMap;

pub enum Decoder {
    UnionFind { config: DecoderConfig },
    ClAYG { config: DecoderConfig, inner: ClAYGDecoder },
    SingleLayerClAYG { config: DecoderConfig, inner: ClAYGDecoder },
}

impl Decoder {
    /// Recognizes the names listed in §6: `uf`/`unionfind`, `clayg`,
    /// `sl_clayg`/`single_layer_clayg`. Anything else is an argument error,
    /// surfaced to the caller (the CLI maps it to a non-zero exit, §6/§7) —
    /// not a panic, since an unrecognized decoder name is user input, not a
    /// construction bug.
    pub fn from_name_and_args(name: &str, args: &HashMap<String, String>) -> Result<Self, String> {
        let config = DecoderConfig::from_args(args);
        match name {
            "uf" | "unionfind" => Ok(Decoder::UnionFind { config }),
            "clayg" => Ok(Decoder::ClAYG {
                config,
                inner: ClAYGDecoder::new(false),
            }),
            "sl_clayg" | "single_layer_clayg" => Ok(Decoder::SingleLayerClAYG {
                config,
                inner: ClAYGDecoder::new(true),
            }),
            other => Err(format!("unknown decoder: {other}")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Decoder::UnionFind { .. } => "uf",
            Decoder::ClAYG { .. } => "clayg",
            Decoder::SingleLayerClAYG { .. } => "sl_clayg",
        }
    }

    /// `graph` must already have `mark()` applied for this trial's errors.
    pub fn decode(&mut self, graph: &DecodingGraph) -> DecodingResult {
        match self {
            Decoder::UnionFind { config } => UnionFindDecoder::decode(graph, config),
            Decoder::ClAYG { config, inner } => inner.decode(graph, config),
            Decoder::SingleLayerClAYG { config, inner } => inner.decode(graph, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding_graph::DecodingGraph;
    use crate::logical_computer::LogicalComputer;
    use crate::util::EdgeId;

    #[test]
    fn recognizes_every_named_decoder() {
        let args = HashMap::new();
        for name in ["uf", "unionfind", "clayg", "sl_clayg", "single_layer_clayg"] {
            assert!(Decoder::from_name_and_args(name, &args).is_ok(), "{name} should be recognized");
        }
    }

    #[test]
    fn unknown_decoder_name_is_an_error() {
        let args = HashMap::new();
        assert!(Decoder::from_name_and_args("bogus", &args).is_err());
    }

    #[test]
    fn each_variant_decodes_a_trivial_trial() {
        let args = HashMap::new();
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        graph.mark(&[EdgeId::measurement(0, 0)]);
        for name in ["uf", "clayg", "sl_clayg"] {
            let mut decoder = Decoder::from_name_and_args(name, &args).unwrap();
            let result = decoder.decode(&graph);
            assert!(!result.corrections.is_empty(), "{name} should correct the measurement flip");
            graph.reset();
            graph.mark(&[EdgeId::measurement(0, 0)]);
        }
    }

    // End-to-end scenarios from the specification's §8 "Testable
    // properties", exercised against the rotated surface code.

    #[test]
    fn scenario_s1_trivial_no_errors() {
        let args = HashMap::new();
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let mut decoder = Decoder::from_name_and_args("uf", &args).unwrap();
        let result = decoder.decode(&graph);
        assert!(result.corrections.is_empty());
        let mut computer = LogicalComputer::new(&graph);
        assert!(!computer.compute(&[], &[], &result));
    }

    #[test]
    fn scenario_s2_bulk_bit_flip_on_logical_edge() {
        let args = HashMap::new();
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let errors = vec![EdgeId::normal(0, 0)];
        graph.mark(&errors);
        let mut decoder = Decoder::from_name_and_args("uf", &args).unwrap();
        let result = decoder.decode(&graph);
        assert_eq!(result.corrections, errors);
        let mut computer = LogicalComputer::new(&graph);
        assert!(!computer.compute(&errors, &[], &result));
    }

    #[test]
    fn scenario_s3_bulk_bit_flip_off_logical_edge() {
        let args = HashMap::new();
        let graph = DecodingGraph::rotated_surface_code(5, 5);
        let errors = vec![EdgeId::normal(2, 7)];
        graph.mark(&errors);
        let mut decoder = Decoder::from_name_and_args("uf", &args).unwrap();
        let result = decoder.decode(&graph);
        let mut computer = LogicalComputer::new(&graph);
        assert!(!computer.compute(&errors, &[], &result));
    }

    #[test]
    fn scenario_s4_measurement_flip() {
        let args = HashMap::new();
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let errors = vec![EdgeId::measurement(0, 0)];
        graph.mark(&errors);
        let mut decoder = Decoder::from_name_and_args("uf", &args).unwrap();
        let result = decoder.decode(&graph);
        assert_eq!(result.corrections, errors);
        let mut computer = LogicalComputer::new(&graph);
        assert!(!computer.compute(&errors, &[], &result));
    }

    #[test]
    fn scenario_s5_clayg_streaming_parity_matches_union_find() {
        let args = HashMap::new();
        let graph = DecodingGraph::rotated_surface_code(5, 5);
        let errors = vec![EdgeId::normal(2, 7), EdgeId::measurement(1, 3)];
        graph.mark(&errors);
        let mut uf = Decoder::from_name_and_args("uf", &args).unwrap();
        let uf_result = uf.decode(&graph);

        graph.reset();
        graph.mark(&errors);
        let mut clayg = Decoder::from_name_and_args("clayg", &args).unwrap();
        let clayg_result = clayg.decode(&graph);

        let mut computer = LogicalComputer::new(&graph);
        let uf_logical = computer.compute(&errors, &[], &uf_result);
        let clayg_logical = computer.compute(&errors, &[], &clayg_result);
        assert_eq!(uf_logical, clayg_logical);
    }

    #[test]
    fn scenario_s6_single_layer_projects_two_rounds() {
        let args = HashMap::new();
        let graph = DecodingGraph::rotated_surface_code(5, 5);
        let logical_index = *graph.logical_edge_ids().iter().next().unwrap();
        let errors = vec![EdgeId::normal(0, logical_index), EdgeId::normal(4, logical_index)];
        graph.mark(&errors);
        let mut decoder = Decoder::from_name_and_args("sl_clayg", &args).unwrap();
        let result = decoder.decode(&graph);
        let mut computer = LogicalComputer::new(&graph);
        assert!(!computer.compute(&errors, &[], &result));
    }

    #[test]
    fn scenario_b1_stop_early_with_no_marked_nodes() {
        let mut args = HashMap::new();
        args.insert("stop_early".to_string(), "true".to_string());
        let graph = DecodingGraph::rotated_surface_code(3, 3);
        let mut decoder = Decoder::from_name_and_args("uf", &args).unwrap();
        let result = decoder.decode(&graph);
        assert!(result.corrections.is_empty());
        assert_eq!(result.considered_up_to_round, 0);
    }
}
