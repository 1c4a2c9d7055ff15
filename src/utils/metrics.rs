//! Scalar metric sinks
//!
//! The training loop reports named scalars per iteration through a
//! [`MetricSink`]. Nothing in the core depends on which sink is attached.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Result;
use serde::Serialize;

/// Destination for per-iteration scalar metrics
pub trait MetricSink: Send {
    /// Record a group of scalars under `tag` for iteration `step`
    fn add_scalars(&mut self, tag: &str, scalars: &[(&str, f64)], step: usize) -> Result<()>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards every metric
#[derive(Debug, Default)]
pub struct NullSink;

impl MetricSink for NullSink {
    fn add_scalars(&mut self, _tag: &str, _scalars: &[(&str, f64)], _step: usize) -> Result<()> {
        Ok(())
    }
}

/// Emits metrics as `tracing` events at debug level
#[derive(Debug, Default)]
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn add_scalars(&mut self, tag: &str, scalars: &[(&str, f64)], step: usize) -> Result<()> {
        for (name, value) in scalars {
            tracing::debug!(tag, step, metric = *name, value = *value, "scalar");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ScalarRecord<'a> {
    tag: &'a str,
    step: usize,
    name: &'a str,
    value: f64,
}

/// Appends one JSON object per scalar to a file
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Create (or truncate) the output file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }
}

impl MetricSink for JsonLinesSink {
    fn add_scalars(&mut self, tag: &str, scalars: &[(&str, f64)], step: usize) -> Result<()> {
        for &(name, value) in scalars {
            let line = serde_json::to_string(&ScalarRecord { tag, step, name, value })?;
            writeln!(self.writer, "{}", line)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("failed to flush metrics file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines_sink_writes_one_record_per_scalar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");

        {
            let mut sink = JsonLinesSink::create(&path).unwrap();
            sink.add_scalars("trpo", &[("total reward", 10.0), ("num steps", 42.0)], 3).unwrap();
            sink.flush().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            contents.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["tag"], "trpo");
        assert_eq!(lines[0]["step"], 3);
        assert_eq!(lines[1]["name"], "num steps");
        assert_eq!(lines[1]["value"], 42.0);
    }

    #[test]
    fn test_null_and_tracing_sinks_accept_metrics() {
        assert!(NullSink.add_scalars("t", &[("a", 1.0)], 0).is_ok());
        assert!(TracingSink.add_scalars("t", &[("a", 1.0)], 0).is_ok());
    }
}
