//! Structured logging sink (§6 "Logging sink", §9 "Global singleton
//! logger").
//!
//! `original_source/include/Logger.h` exposes a single global `Logger`
//! instance (`extern Logger logger;`) that every decoder reaches for
//! directly. §9 explicitly redesigns that away: the core never touches a
//! filesystem or a singleton. Instead it is handed a `&mut dyn LogSink` (or
//! nothing at all), and every record kind §6 names becomes one trait method
//! with the exact line-oriented text schema §6 specifies. `NullLogSink`
//! costs nothing on the hot path (the default); `WriterLogSink` writes the
//! schema to any `io::Write` and propagates `io::Error` rather than hiding
//! it, matching §7's "external I/O errors are surfaced to the sink, not to
//! the decoder".

use crate::cluster::ClusterPtr;
use crate::decoding_graph::DecodingGraph;
use crate::pointers::RwLockPtr;
use crate::util::{EdgeId, NodeId};
use std::collections::BTreeMap;
use std::io::{self, Write};

fn node_field(id: NodeId) -> String {
    format!("{}-{}-{}", id.kind as u8, id.round, id.index)
}

fn edge_field(id: EdgeId) -> String {
    format!("{}-{}-{}", id.kind as u8, id.round, id.index)
}

/// One method per §6 record kind. All methods default to a no-op so a sink
/// only needs to implement the records it cares about.
pub trait LogSink {
    fn log_graph(&mut self, _graph: &DecodingGraph) -> io::Result<()> {
        Ok(())
    }

    fn log_errors(&mut self, _error_ids: &[EdgeId]) -> io::Result<()> {
        Ok(())
    }

    fn log_corrections(&mut self, _correction_ids: &[EdgeId], _decoder_name: &str) -> io::Result<()> {
        Ok(())
    }

    fn log_decoding_step(&mut self, _clusters: &[ClusterPtr], _decoder_name: &str, _step: usize, _round: usize) -> io::Result<()> {
        Ok(())
    }

    fn log_results_entry(
        &mut self,
        _logical_error_rate: f64,
        _trials: usize,
        _p: f64,
        _idling_tau: f64,
        _decoder_name: &str,
    ) -> io::Result<()> {
        Ok(())
    }

    fn log_growth_steps(&mut self, _p: f64, _histogram: &BTreeMap<i64, usize>, _decoder_name: &str) -> io::Result<()> {
        Ok(())
    }
}

/// The default sink: every method is a no-op. Passing `&mut NullLogSink`
/// (or `None` where the caller accepts `Option<&mut dyn LogSink>`) costs
/// nothing on the decode hot path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {}

/// Writes every record in the exact line schema of §6 to any `io::Write`.
/// Directory/file management (creating a dump dir, rotating a results file)
/// is the embedder's problem: this sink only ever appends lines to the
/// writer it was given.
pub struct WriterLogSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterLogSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LogSink for WriterLogSink<W> {
    fn log_graph(&mut self, graph: &DecodingGraph) -> io::Result<()> {
        for edge in graph.edges() {
            let e = edge.read_recursive();
            let (a, b) = e.nodes();
            let a_id = a.upgrade().expect("edge endpoint missing").read_recursive().id();
            let b_id = b.upgrade().expect("edge endpoint missing").read_recursive().id();
            writeln!(self.writer, "{},{},{}", node_field(a_id), node_field(b_id), edge_field(e.id()))?;
        }
        Ok(())
    }

    fn log_errors(&mut self, error_ids: &[EdgeId]) -> io::Result<()> {
        for id in error_ids {
            writeln!(self.writer, "{}", edge_field(*id))?;
        }
        Ok(())
    }

    fn log_corrections(&mut self, correction_ids: &[EdgeId], _decoder_name: &str) -> io::Result<()> {
        for id in correction_ids {
            writeln!(self.writer, "{}", edge_field(*id))?;
        }
        Ok(())
    }

    fn log_decoding_step(&mut self, clusters: &[ClusterPtr], _decoder_name: &str, _step: usize, _round: usize) -> io::Result<()> {
        for (cluster_id, cluster) in clusters.iter().enumerate() {
            for boundary_edge in cluster.read_recursive().boundary() {
                writeln!(
                    self.writer,
                    "{},{},{},{}",
                    edge_field(boundary_edge.edge.read_recursive().id()),
                    node_field(boundary_edge.tree_node.read_recursive().id()),
                    boundary_edge.edge.read_recursive().growth(),
                    cluster_id,
                )?;
            }
        }
        Ok(())
    }

    fn log_results_entry(
        &mut self,
        logical_error_rate: f64,
        trials: usize,
        p: f64,
        _idling_tau: f64,
        _decoder_name: &str,
    ) -> io::Result<()> {
        writeln!(self.writer, "{p}\t{logical_error_rate}\t{trials}")
    }

    fn log_growth_steps(&mut self, _p: f64, histogram: &BTreeMap<i64, usize>, _decoder_name: &str) -> io::Result<()> {
        for (steps, count) in histogram {
            writeln!(self.writer, "{steps}\t{count}")?;
        }
        Ok(())
    }
}
