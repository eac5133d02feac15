use crate::{
    classifier::Status,
    sample::Sample,
    settings::{PeriodSettings, StatusSymbols},
    stats::PeriodAverage,
};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::Path,
};
use tracing::{debug, info};

pub const TIMESTAMP_HEADER: &str = "Timestamp";
pub const LATENCY_HEADER: &str = "Response Time (ms)";
pub const STATUS_HEADER: &str = "Status";

/// Everything produced by one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    pub sample: Sample,
    pub averages: Vec<PeriodAverage>,
    pub status: Status,
}

/// Column names of the persisted log for the given periods
pub fn header(periods: &[PeriodSettings]) -> Vec<String> {
    let mut columns = Vec::with_capacity(periods.len() + 3);
    columns.push(TIMESTAMP_HEADER.to_string());
    columns.push(LATENCY_HEADER.to_string());
    columns.extend(periods.iter().map(PeriodSettings::column_name));
    columns.push(STATUS_HEADER.to_string());
    columns
}

/// Append-only CSV writer, one row per tick
pub struct Recorder<W: Write> {
    writer: Writer<W>,
    symbols: StatusSymbols,
}

impl Recorder<File> {
    /// Open `path` for appending, writing the header only if the file is new or empty
    pub fn open(path: &Path, periods: &[PeriodSettings], symbols: StatusSymbols) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {parent:?}"))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        let fresh = file
            .metadata()
            .with_context(|| format!("Failed to stat log file: {}", path.display()))?
            .len()
            == 0;

        let mut recorder = Self::new(file, symbols);
        if fresh {
            info!("Writing header to new log file {}", path.display());
            recorder.write_header(periods)?;
        } else {
            debug!("Appending to existing log file {}", path.display());
        }

        Ok(recorder)
    }
}

impl<W: Write> Recorder<W> {
    pub fn new(inner: W, symbols: StatusSymbols) -> Self {
        Self {
            writer: WriterBuilder::new().flexible(true).from_writer(inner),
            symbols,
        }
    }

    pub fn write_header(&mut self, periods: &[PeriodSettings]) -> Result<()> {
        self.writer.write_record(header(periods))?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write and flush one complete row
    pub fn write(&mut self, record: &TickRecord) -> Result<()> {
        self.writer
            .write_record(self.row(record))
            .context("Failed to write log record")?;
        self.writer.flush().context("Failed to flush log record")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn row(&self, record: &TickRecord) -> Vec<String> {
        let mut row = Vec::with_capacity(record.averages.len() + 3);
        row.push(record.sample.formatted_timestamp());
        row.push(
            record
                .sample
                .latency_ms()
                .map(|ms| ms.to_string())
                .unwrap_or_default(),
        );
        row.extend(record.averages.iter().map(|avg| {
            avg.average_ms
                .map(|ms| format!("{ms:.3}"))
                .unwrap_or_default()
        }));
        row.push(self.symbols.symbol(record.status).to_string());
        row
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("Failed to flush log writer: {}", err.error()))
    }
}
