//! CSV persistence sink.
//!
//! One file per flush, named after the flush time, one row per sample:
//!
//! ```text
//! 2026-10-18T09:14:02.118+02:00,512,41.3,"[3.0,12.5,0.0,7.1]"
//! ```
//!
//! Columns are `timestamp, od, memory_percent, cpu_percent`; there is no
//! header row.  The per-core CPU list is a single JSON-array field so the
//! column count does not depend on the host.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat};
use log::info;

use crate::app::ports::PersistenceSink;
use crate::buffer::Sample;
use crate::error::PersistenceError;

pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a flush at `flush_time` is written to.
    pub fn path_for(&self, flush_time: DateTime<Local>) -> PathBuf {
        self.dir
            .join(format!("{}.csv", flush_time.format("%Y-%m-%d_%H-%M-%S%.3f")))
    }
}

/// The four fields of one persisted row, in column order.
pub fn row(sample: &Sample) -> Result<[String; 4], PersistenceError> {
    let cpu = serde_json::to_string(&sample.cpu_percent)
        .map_err(|e| PersistenceError::Encode(e.to_string()))?;
    Ok([
        sample.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
        sample.od.to_string(),
        sample.memory_percent.to_string(),
        cpu,
    ])
}

impl PersistenceSink for CsvSink {
    fn flush(&self, batch: &[Sample], flush_time: DateTime<Local>) -> Result<(), PersistenceError> {
        let path = self.path_for(flush_time);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        for sample in batch {
            writer.write_record(row(sample)?)?;
        }
        writer.flush()?;
        info!("Wrote {} samples to {}", batch.len(), path.display());
        Ok(())
    }
}
