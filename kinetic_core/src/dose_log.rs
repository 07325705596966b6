//! Dose event logs.
//!
//! Doses are appended to a JSONL file under an exclusive lock, one event per
//! line. Older logs may be CSV exports with the columns
//! `id,substance_id,amount,unit,logged_at`. Readers skip malformed entries
//! with a warning instead of failing the whole load.

use crate::types::{DoseEvent, DoseUnit};
use crate::Result;
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use fs2::FileExt;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Dose sink trait for persisting dose events
pub trait DoseSink {
    fn append(&mut self, dose: &DoseEvent) -> Result<()>;
}

/// JSONL-based dose sink with file locking
pub struct JsonlDoseSink {
    path: PathBuf,
}

impl JsonlDoseSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DoseSink for JsonlDoseSink {
    fn append(&mut self, dose: &DoseEvent) -> Result<()> {
        append_jsonl(&self.path, dose)?;
        tracing::debug!("Appended dose {} of {} to log", dose.id, dose.substance_id);
        Ok(())
    }
}

/// Append one value as a JSON line, holding an exclusive lock while writing
pub(crate) fn append_jsonl<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let mut writer = std::io::BufWriter::new(&file);
    let line = serde_json::to_string(value)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);

    file.unlock()?;
    Ok(())
}

/// Read every parseable JSON line under a shared lock. A missing file is empty.
pub(crate) fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut items = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!("Failed to parse {} at line {}: {}", what, line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    Ok(items)
}

/// Read all dose events from a JSONL log
pub fn read_doses(path: &Path) -> Result<Vec<DoseEvent>> {
    let doses: Vec<DoseEvent> = read_jsonl(path, "dose")?;
    tracing::debug!("Read {} doses from {}", doses.len(), path.display());
    Ok(doses)
}

/// CSV row format for exported dose logs
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    id: Option<String>,
    substance_id: String,
    amount: f64,
    unit: String,
    logged_at: String,
}

impl TryFrom<CsvRow> for DoseEvent {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        // Hand-written exports often leave the id column blank
        let id = match row.id.as_deref().map(str::trim) {
            None | Some("") => Uuid::new_v4(),
            Some(raw) => Uuid::parse_str(raw)
                .map_err(|e| crate::Error::Other(format!("Invalid UUID: {}", e)))?,
        };

        let logged_at = DateTime::parse_from_rfc3339(row.logged_at.trim())
            .map_err(|e| crate::Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        let unit: DoseUnit = row.unit.parse()?;

        if row.substance_id.trim().is_empty() {
            return Err(crate::Error::Other("Empty substance_id".into()));
        }

        Ok(DoseEvent {
            id,
            substance_id: row.substance_id.trim().to_string(),
            amount: row.amount,
            unit,
            logged_at,
        })
    }
}

/// Read all dose events from a CSV export
pub fn read_doses_csv(path: &Path) -> Result<Vec<DoseEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut doses = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match DoseEvent::try_from(row) {
                Ok(dose) => doses.push(dose),
                Err(e) => tracing::warn!("Failed to parse CSV dose row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV dose row: {}", e),
        }
    }

    tracing::debug!("Read {} doses from {}", doses.len(), path.display());
    Ok(doses)
}

/// Load doses logged in `[since, until]` from a JSONL log and a CSV export.
///
/// Either file may be missing. Doses present in both (same id) are taken
/// from the JSONL log. The result is sorted oldest first.
pub fn load_doses(
    jsonl_path: &Path,
    csv_path: &Path,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<DoseEvent>> {
    let in_range = |d: &DoseEvent| d.logged_at >= since && d.logged_at <= until;
    let mut seen_ids = HashSet::new();
    let mut doses = Vec::new();

    for dose in read_doses(jsonl_path)? {
        if in_range(&dose) && seen_ids.insert(dose.id) {
            doses.push(dose);
        }
    }

    let mut csv_count = 0;
    for dose in read_doses_csv(csv_path)? {
        if in_range(&dose) && seen_ids.insert(dose.id) {
            doses.push(dose);
            csv_count += 1;
        }
    }
    if csv_count > 0 {
        tracing::debug!("Loaded {} doses from CSV export", csv_count);
    }

    doses.sort_by_key(|d| d.logged_at);

    tracing::info!(
        "Loaded {} doses between {} and {}",
        doses.len(),
        since,
        until
    );

    Ok(doses)
}
