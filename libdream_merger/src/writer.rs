//! The writer seam between the merger and whatever persists its output.
//!
//! The merge hands over plain structured records; the storage format is the
//! writer's business. A JSON-lines implementation is provided so the CLI
//! works end to end; anything else (ntuples, databases) can implement
//! [`EventWriter`] without touching the decode path.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::WriterError;
use super::event_builder::FlatSipmEvent;
use super::run_stats::RunStats;
use super::sipm_record::FersFileHeader;
use super::vme_block::DecodedEvent;

/// One merged output record: a PMT-side event and, when the trigger matched,
/// its SiPM counterpart.
#[derive(Debug, Clone, Serialize)]
pub struct MergedEvent<'a> {
    /// Index in the merged (shifted) timeline.
    pub event_index: usize,
    pub vme: &'a DecodedEvent,
    pub sipm: Option<&'a FlatSipmEvent>,
}

pub trait EventWriter {
    fn write_run_info(
        &mut self,
        run_number: i32,
        fers_header: &FersFileHeader,
    ) -> Result<(), WriterError>;
    fn write_event(&mut self, event: &MergedEvent) -> Result<(), WriterError>;
    fn write_run_stats(&mut self, stats: &RunStats) -> Result<(), WriterError>;
}

#[derive(Serialize)]
struct RunInfoRecord<'a> {
    record: &'static str,
    run_number: i32,
    fers_header: &'a FersFileHeader,
}

#[derive(Serialize)]
struct EventRecord<'a> {
    record: &'static str,
    #[serde(flatten)]
    event: &'a MergedEvent<'a>,
}

#[derive(Serialize)]
struct StatsRecord<'a> {
    record: &'static str,
    stats: &'a RunStats,
}

/// Writes one JSON object per line, tagged by record kind.
pub struct JsonlWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonlWriter {
    pub fn new(path: &Path) -> Result<Self, WriterError> {
        let file = File::create(path)?;
        log::info!("Writing merged events to {}", path.to_string_lossy());
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<(), WriterError> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl EventWriter for JsonlWriter {
    fn write_run_info(
        &mut self,
        run_number: i32,
        fers_header: &FersFileHeader,
    ) -> Result<(), WriterError> {
        self.write_line(&RunInfoRecord {
            record: "run_info",
            run_number,
            fers_header,
        })
    }

    fn write_event(&mut self, event: &MergedEvent) -> Result<(), WriterError> {
        self.write_line(&EventRecord {
            record: "event",
            event,
        })
    }

    fn write_run_stats(&mut self, stats: &RunStats) -> Result<(), WriterError> {
        let result = self.write_line(&StatsRecord {
            record: "run_stats",
            stats,
        });
        self.writer.flush()?;
        result
    }
}
