//! The outer sweep loop: argument parsing, random error generation, and the
//! Monte-Carlo loop over `p`/`idling_time_constant`. None of this is part of
//! the decoding core (§1 Non-goals); it drives the core through
//! `Decoder::decode` and `LogicalComputer::compute` the way
//! `original_source/src/main.cpp` drives the equivalent C++ classes.

use crate::clap::Parser;
use crate::decoder::Decoder;
use crate::decoding_graph::DecodingGraph;
use crate::logger::{LogSink, NullLogSink, WriterLogSink};
use crate::logical_computer::LogicalComputer;
use crate::util::{EdgeId, EdgeKind};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;

#[derive(Parser, Clone)]
#[clap(author, version, about = "Streaming Union-Find / ClAYG decoder sweep", color = clap::ColorChoice::Auto)]
pub struct Cli {
    /// code distance
    d: usize,
    /// number of syndrome-measurement rounds
    t: usize,
    /// comma-separated decoder list: `name` or `name(k1=v1,k2=v2,...)`;
    /// recognized names are `uf`, `unionfind`, `clayg`, `sl_clayg`,
    /// `single_layer_clayg`
    decoders: String,
    /// path to append results lines to
    results: String,

    #[clap(long, default_value_t = 0.005)]
    p_start: f64,
    #[clap(long, default_value_t = 0.005)]
    p_end: f64,
    #[clap(long, default_value = "+0.005")]
    p_step: String,
    #[clap(long, default_value_t = 0.0)]
    idling_time_constant_start: f64,
    #[clap(long, default_value_t = 0.0)]
    idling_time_constant_end: f64,
    #[clap(long, default_value = "+0.0")]
    idling_time_constant_step: String,
    /// also write every structured log record (graph, errors, corrections,
    /// per-step clusters) to `<results>.dump`
    #[clap(long, action)]
    dump: bool,
    /// trials per sweep point for the base (no-idling) logical error rate
    #[clap(long, default_value_t = 10_000)]
    runs_p: usize,
    /// trials per idling-time-constant sweep point
    #[clap(long, default_value_t = 1)]
    runs_idling: usize,
}

/// A step's leading operator (§6): `+ - * /` arithmetic, `#` harmonic
/// (`x ← 1 / (1/x + v)`).
#[derive(Clone, Copy)]
struct Step {
    op: char,
    value: f64,
}

impl Step {
    fn parse(text: &str) -> Result<Self, String> {
        let op = text.chars().next().ok_or_else(|| "empty step value".to_string())?;
        if !"+-*/#".contains(op) {
            return Err(format!("step must start with one of +-*/#, got {op:?}"));
        }
        let value: f64 = text[op.len_utf8()..]
            .parse()
            .map_err(|_| format!("invalid step magnitude in {text:?}"))?;
        Ok(Self { op, value })
    }

    fn apply(&self, variable: f64) -> f64 {
        match self.op {
            '+' => variable + self.value,
            '-' => variable - self.value,
            '*' => variable * self.value,
            '/' => variable / self.value,
            '#' => 1.0 / (1.0 / variable + self.value),
            _ => unreachable!("validated in parse"),
        }
    }
}

fn increment_end_condition(current: f64, start: f64, end: f64) -> bool {
    if start < end {
        current > end
    } else if start > end {
        current < end
    } else {
        true
    }
}

/// Parses the `name` / `name(k1=v1,k2=v2,...)` decoder-list grammar of §6.
fn parse_decoder_list(input: &str) -> Result<Vec<(String, HashMap<String, String>)>, String> {
    let mut decoders = Vec::new();
    for item in input.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some(paren) = item.find('(') {
            if !item.ends_with(')') {
                return Err(format!("missing ')' in decoder spec: {item}"));
            }
            let name = item[..paren].to_string();
            let inside = &item[paren + 1..item.len() - 1];
            let mut args = HashMap::new();
            for kv in inside.split(',') {
                if kv.is_empty() {
                    continue;
                }
                let (key, value) = kv.split_once('=').ok_or_else(|| format!("invalid decoder arg {kv:?} in {name}"))?;
                args.insert(key.to_string(), value.to_string());
            }
            decoders.push((name, args));
        } else {
            decoders.push((item.to_string(), HashMap::new()));
        }
    }
    Ok(decoders)
}

/// Draws one error set over every Normal edge of every round, and every
/// Measurement edge of every round but the last, each independently at
/// probability `p` (the phenomenological noise model, §1).
fn generate_errors(graph: &DecodingGraph, p: f64, rng: &mut impl Rng) -> Vec<EdgeId> {
    use crate::pointers::RwLockPtr;
    let mut ids = Vec::new();
    for edge in graph.edges() {
        if rng.gen::<f64>() <= p {
            ids.push(edge.read_recursive().id());
        }
    }
    ids
}

/// One trial's outcome, per decoder: whether it produced a logical error at
/// `idling_tau = 0`, the reporting-only cost metric, the raw error/correction
/// edges for the dump sink, and the idling-tau sweep's error counts.
struct TrialOutcome {
    error_ids: Vec<EdgeId>,
    per_decoder: Vec<DecoderTrialOutcome>,
}

struct DecoderTrialOutcome {
    corrections: Vec<EdgeId>,
    decoding_steps: usize,
    logical_error: bool,
    idling_errors: BTreeMap<i64, usize>,
}

/// Runs one full trial — fresh error draw, one `decode` per configured
/// decoder, and the nested idling-tau sweep — against its own freshly built
/// graph/decoder/logical-computer state. Self-contained so it can run on any
/// thread: §5 "an implementation may parallelize the outer sweep over
/// independent Monte-Carlo trials" requires each trial to own state that no
/// other trial mutates concurrently.
#[allow(clippy::too_many_arguments)]
fn run_trial(
    d: usize,
    t: usize,
    decoder_specs: &[(String, HashMap<String, String>)],
    p: f64,
    idling_start: f64,
    idling_end: f64,
    idling_step: Step,
    runs_idling: usize,
) -> Result<TrialOutcome, String> {
    let graph = DecodingGraph::rotated_surface_code(d, t);
    let mut logical_computer = LogicalComputer::new(&graph);
    let mut decoders: Vec<Decoder> = decoder_specs
        .iter()
        .map(|(name, args)| Decoder::from_name_and_args(name, args))
        .collect::<Result<_, _>>()?;

    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(rand::thread_rng().gen());
    let error_ids = generate_errors(&graph, p, &mut rng);

    let mut per_decoder = Vec::with_capacity(decoders.len());
    for decoder in &mut decoders {
        graph.reset();
        graph.mark(&error_ids);
        let decoding_result = decoder.decode(&graph);

        let logical_error = logical_computer.compute(&error_ids, &[], &decoding_result);

        let mut idling_errors = BTreeMap::new();
        let mut idling_tau = idling_start;
        while !increment_end_condition(idling_tau, idling_start, idling_end) {
            if idling_tau != 0.0 {
                let p_idling = 0.5 * (1.0 - (-(decoding_result.decoding_steps as f64 / idling_tau)).exp());
                for _ in 0..runs_idling {
                    let idling_ids: Vec<EdgeId> = generate_errors(&graph, p_idling, &mut rng)
                        .into_iter()
                        .filter(|id| id.kind == EdgeKind::Normal)
                        .collect();
                    if logical_computer.compute(&error_ids, &idling_ids, &decoding_result) {
                        *idling_errors.entry(idling_tau.to_bits() as i64).or_insert(0) += 1;
                    }
                }
            }
            idling_tau = idling_step.apply(idling_tau);
        }

        per_decoder.push(DecoderTrialOutcome {
            corrections: decoding_result.corrections,
            decoding_steps: decoding_result.decoding_steps,
            logical_error,
            idling_errors,
        });
    }

    Ok(TrialOutcome { error_ids, per_decoder })
}

impl Cli {
    pub fn run(&self) -> Result<(), String> {
        let decoder_specs = parse_decoder_list(&self.decoders)?;
        if decoder_specs.is_empty() {
            return Err("decoders list must not be empty".to_string());
        }
        // also validates the decoder grammar up front, so a typo fails
        // before any file is created rather than partway through the sweep.
        let decoder_names: Vec<String> = decoder_specs
            .iter()
            .map(|(name, args)| Decoder::from_name_and_args(name, args).map(|d| d.name().to_string()))
            .collect::<Result<_, _>>()?;

        let p_step = Step::parse(&self.p_step)?;
        let idling_step = Step::parse(&self.idling_time_constant_step)?;

        let graph = DecodingGraph::rotated_surface_code(self.d, self.t);
        let mut results_sink = WriterLogSink::new(BufWriter::new(
            File::create(&self.results).map_err(|e| format!("cannot create results file {}: {e}", self.results))?,
        ));
        let mut dump_sink: Box<dyn LogSink> = if self.dump {
            let path = format!("{}.dump", self.results);
            Box::new(WriterLogSink::new(BufWriter::new(
                File::create(&path).map_err(|e| format!("cannot create dump file {path}: {e}"))?,
            )))
        } else {
            Box::new(NullLogSink)
        };
        dump_sink.log_graph(&graph).map_err(|e| e.to_string())?;

        let mut p = self.p_start;
        let mut recent_rates: Vec<Vec<f64>> = Vec::new();
        loop {
            let outcomes = self.run_trials(&decoder_specs, p, idling_step)?;

            let mut logical_errors: Vec<usize> = vec![0; decoder_names.len()];
            let mut growth_histograms: Vec<BTreeMap<i64, usize>> = vec![BTreeMap::new(); decoder_names.len()];
            let mut idling_errors_by_decoder: Vec<BTreeMap<i64, usize>> = vec![BTreeMap::new(); decoder_names.len()];

            for outcome in &outcomes {
                dump_sink.log_errors(&outcome.error_ids).map_err(|e| e.to_string())?;
                for (index, decoder_outcome) in outcome.per_decoder.iter().enumerate() {
                    dump_sink
                        .log_corrections(&decoder_outcome.corrections, &decoder_names[index])
                        .map_err(|e| e.to_string())?;
                    *growth_histograms[index]
                        .entry(decoder_outcome.decoding_steps as i64)
                        .or_insert(0) += 1;
                    if decoder_outcome.logical_error {
                        logical_errors[index] += 1;
                    }
                    for (&tau_bits, &count) in &decoder_outcome.idling_errors {
                        *idling_errors_by_decoder[index].entry(tau_bits).or_insert(0) += count;
                    }
                }
            }

            for (index, name) in decoder_names.iter().enumerate() {
                let rate = logical_errors[index] as f64 / self.runs_p as f64;
                results_sink.log_results_entry(rate, self.runs_p, p, 0.0, name).map_err(|e| e.to_string())?;
                results_sink
                    .log_growth_steps(p, &growth_histograms[index], name)
                    .map_err(|e| e.to_string())?;
            }

            let rates: Vec<f64> = (0..decoder_names.len()).map(|i| logical_errors[i] as f64 / self.runs_p as f64).collect();
            recent_rates.push(rates);
            let last_three_corrected = recent_rates.len() >= 3
                && recent_rates[recent_rates.len() - 3..].iter().all(|rates| rates.iter().all(|&r| r == 0.0));

            p = p_step.apply(p);
            if increment_end_condition(p, self.p_start, self.p_end) && !last_three_corrected {
                break;
            }
            if last_three_corrected {
                break;
            }
        }

        Ok(())
    }

    /// Runs `self.runs_p` independent trials at noise level `p`. Serial by
    /// default; with the `parallel` feature enabled, fans the trials out
    /// across a `rayon` thread pool (§5, §9 "the outer sweep loop... may
    /// run in parallel over independent trials"). Each trial is fully
    /// self-contained (`run_trial` builds its own graph/decoders/logical
    /// computer), so there is no shared mutable state to race on.
    #[cfg(not(feature = "parallel"))]
    fn run_trials(&self, decoder_specs: &[(String, HashMap<String, String>)], p: f64, idling_step: Step) -> Result<Vec<TrialOutcome>, String> {
        (0..self.runs_p)
            .map(|_| {
                run_trial(
                    self.d,
                    self.t,
                    decoder_specs,
                    p,
                    self.idling_time_constant_start,
                    self.idling_time_constant_end,
                    idling_step,
                    self.runs_idling,
                )
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn run_trials(&self, decoder_specs: &[(String, HashMap<String, String>)], p: f64, idling_step: Step) -> Result<Vec<TrialOutcome>, String> {
        (0..self.runs_p)
            .into_par_iter()
            .map(|_| {
                run_trial(
                    self.d,
                    self.t,
                    decoder_specs,
                    p,
                    self.idling_time_constant_start,
                    self.idling_time_constant_end,
                    idling_step,
                    self.runs_idling,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_parse_rejects_missing_operator() {
        assert!(Step::parse("0.5").is_err());
    }

    #[test]
    fn step_harmonic_matches_formula() {
        let step = Step::parse("#0.1").unwrap();
        let next = step.apply(2.0);
        assert!((next - 1.0 / (1.0 / 2.0 + 0.1)).abs() < 1e-12);
    }

    #[test]
    fn parse_decoder_list_splits_name_and_args() {
        let parsed = parse_decoder_list("uf,clayg(stop_early=true,growth_rounds=2)").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, "uf");
        assert!(parsed[0].1.is_empty());
        assert_eq!(parsed[1].0, "clayg");
        assert_eq!(parsed[1].1.get("stop_early").map(String::as_str), Some("true"));
        assert_eq!(parsed[1].1.get("growth_rounds").map(String::as_str), Some("2"));
    }

    #[test]
    fn parse_decoder_list_rejects_unbalanced_parens() {
        assert!(parse_decoder_list("clayg(stop_early=true").is_err());
    }

    #[test]
    fn run_trial_decodes_and_reports_idling_free_outcome() {
        let specs = vec![("uf".to_string(), HashMap::new())];
        let outcome = run_trial(3, 3, &specs, 0.0, 0.0, 0.0, Step::parse("+0.0").unwrap(), 1).unwrap();
        assert!(outcome.error_ids.is_empty());
        assert_eq!(outcome.per_decoder.len(), 1);
        assert!(!outcome.per_decoder[0].logical_error);
    }

    #[test]
    fn run_trial_rejects_unknown_decoder_name() {
        let specs = vec![("bogus".to_string(), HashMap::new())];
        assert!(run_trial(3, 3, &specs, 0.0, 0.0, 0.0, Step::parse("+0.0").unwrap(), 1).is_err());
    }
}
