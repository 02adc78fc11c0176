//! Append-only record output.
//!
//! The controller owns the sink for the whole session and finishes it on
//! every exit path; a best-effort flush on drop covers panics.

use crate::extract::HotelRecord;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Output column order, written once as the header row.
const HEADER: [&str; 7] = [
    "name",
    "star_rating",
    "address",
    "zone",
    "longitude",
    "latitude",
    "score",
];

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output file {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to append record: {0}")]
    Append(#[from] csv::Error),
    #[error("failed to flush output: {0}")]
    Flush(#[from] std::io::Error),
}

/// An append-only structured record writer.
pub trait RecordSink: Send {
    /// Append one record.
    fn append(&mut self, record: &HotelRecord) -> Result<(), SinkError>;
    /// Flush and close. Idempotent; the controller calls it exactly once.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// CSV-backed sink. The header row is written at creation.
pub struct CsvSink {
    writer: csv::Writer<File>,
    rows: u64,
    finished: bool,
}

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(|source| SinkError::Create {
            path: path.display().to_string(),
            source,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self {
            writer,
            rows: 0,
            finished: false,
        })
    }

    /// Rows appended so far, excluding the header.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &HotelRecord) -> Result<(), SinkError> {
        self.writer.write_record([
            &record.name,
            &record.star_rating,
            &record.address,
            &record.zone,
            &record.longitude,
            &record.latitude,
            &record.score,
        ])?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.writer.flush();
        }
    }
}
