//! Workbook snapshots in, graded results out.
//!
//! Snapshots are either serde JSON of a [`Workbook`] or a long-form CSV with
//! one cell per line (`tab,cell,value,format`). Results are written as one
//! JSON file per student plus a `summary.csv` for the batch.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::application::{StudentReport, SummaryRow};
use crate::domain::{CellData, CellValue, DomainError, ExchangeRateTable, RateSnapshot, RatesError, Workbook, GENERAL_FORMAT};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {source}")]
    Cell {
        line: u64,
        #[source]
        source: DomainError,
    },
    #[error("{0}: unsupported snapshot format (expected .json or .csv)")]
    UnsupportedFormat(PathBuf),
    #[error("{path}: {source}")]
    Rates {
        path: PathBuf,
        #[source]
        source: RatesError,
    },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One line of a long-form CSV snapshot.
#[derive(Debug, Deserialize)]
struct CellRecord {
    tab: String,
    cell: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    format: String,
}

pub struct FileRepository;

impl FileRepository {
    /// Loads a snapshot, choosing the reader by file extension.
    pub fn load_workbook(path: &Path) -> PersistenceResult<Workbook> {
        match extension(path).as_deref() {
            Some("json") => Self::load_workbook_json(path),
            Some("csv") => Self::load_workbook_csv(path),
            _ => Err(PersistenceError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn load_workbook_json(path: &Path) -> PersistenceResult<Workbook> {
        let content = fs::read_to_string(path).map_err(io_error(path))?;
        serde_json::from_str(&content).map_err(|source| PersistenceError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_workbook_csv(path: &Path) -> PersistenceResult<Workbook> {
        let file = fs::File::open(path).map_err(io_error(path))?;
        Self::read_workbook_csv(file)
    }

    /// Reads a long-form CSV snapshot. Each value is classified the way a
    /// spreadsheet export would present it; an empty format means `General`.
    pub fn read_workbook_csv<R: Read>(reader: R) -> PersistenceResult<Workbook> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        let mut row = csv::StringRecord::new();
        let mut workbook = Workbook::new();

        while reader.read_record(&mut row)? {
            let line = row.position().map_or(0, |position| position.line());
            let record: CellRecord = row.deserialize(Some(&headers))?;
            let format = if record.format.trim().is_empty() {
                GENERAL_FORMAT.to_string()
            } else {
                record.format
            };
            let data = CellData::new(CellValue::classify(&record.value)).with_format(format);

            workbook
                .tab_mut(record.tab.trim())
                .set_cell(&record.cell, data)
                .map_err(|source| PersistenceError::Cell { line, source })?;
        }
        Ok(workbook)
    }

    /// Snapshot files in `dir`, sorted by name so batch order is stable.
    pub fn discover_submissions(dir: &Path) -> PersistenceResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let path = entry.map_err(io_error(dir))?.path();
            if path.is_file() && matches!(extension(&path).as_deref(), Some("json" | "csv")) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Writes `<student>.results.json` and returns its path.
    pub fn save_report(report: &StudentReport, out_dir: &Path) -> PersistenceResult<PathBuf> {
        let path = out_dir.join(format!("{}.results.json", report.student));
        let json = serde_json::to_string_pretty(report).map_err(|source| PersistenceError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(io_error(&path))?;
        Ok(path)
    }

    /// Writes rendered feedback to `<student>.feedback.txt`.
    pub fn save_feedback_text(student: &str, text: &str, out_dir: &Path) -> PersistenceResult<PathBuf> {
        let path = out_dir.join(format!("{student}.feedback.txt"));
        fs::write(&path, text).map_err(io_error(&path))?;
        Ok(path)
    }

    /// Writes the batch summary, one line per student.
    pub fn write_summary(rows: &[SummaryRow], path: &Path) -> PersistenceResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(io_error(path))?;
        Ok(())
    }

    /// Loads a saved rate table for offline runs.
    pub fn load_rates_file(path: &Path) -> PersistenceResult<ExchangeRateTable> {
        let content = fs::read_to_string(path).map_err(io_error(path))?;
        ExchangeRateTable::from_json_str(&content).map_err(|source| PersistenceError::Rates {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load_rates_file`](Self::load_rates_file), but a missing or
    /// unusable file becomes a failed snapshot instead of an error, the same
    /// as a failed live fetch.
    pub fn load_rate_snapshot(path: &Path) -> RateSnapshot {
        Self::load_rates_file(path).map_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "rates file unusable");
            match err {
                PersistenceError::Rates { source, .. } => source,
                other => RatesError::Transport(other.to_string()),
            }
        })
    }

    pub fn ensure_dir(dir: &Path) -> PersistenceResult<()> {
        fs::create_dir_all(dir).map_err(io_error(dir))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
