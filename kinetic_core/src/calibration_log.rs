//! Persisted calibration results.
//!
//! Each calibration is appended to a JSONL log. The newest result per
//! biomarker is the one that personalises future concentration curves.

use crate::active_state::Adjustments;
use crate::calibration::{Biomarker, CalibrationResult};
use crate::dose_log::{append_jsonl, read_jsonl};
use crate::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Calibration sink trait for persisting results
pub trait CalibrationSink {
    fn append(&mut self, result: &CalibrationResult) -> Result<()>;
}

/// JSONL-based calibration sink with file locking
pub struct JsonlCalibrationSink {
    path: PathBuf,
}

impl JsonlCalibrationSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CalibrationSink for JsonlCalibrationSink {
    fn append(&mut self, result: &CalibrationResult) -> Result<()> {
        append_jsonl(&self.path, result)?;
        tracing::debug!(
            "Appended {} calibration {} (IAF {:.2})",
            result.biomarker,
            result.id,
            result.iaf
        );
        Ok(())
    }
}

/// Read all calibration results, in file order
pub fn read_calibrations(path: &Path) -> Result<Vec<CalibrationResult>> {
    let results: Vec<CalibrationResult> = read_jsonl(path, "calibration")?;
    tracing::debug!("Read {} calibrations from {}", results.len(), path.display());
    Ok(results)
}

/// Adjustments from the newest result of each biomarker, keyed by substance id.
///
/// When two biomarkers cover the same substance, the more recent measurement wins.
pub fn latest_adjustments(results: &[CalibrationResult]) -> Adjustments {
    let mut newest: HashMap<Biomarker, &CalibrationResult> = HashMap::new();
    for result in results {
        newest
            .entry(result.biomarker)
            .and_modify(|current| {
                if result.measured_at >= current.measured_at {
                    *current = result;
                }
            })
            .or_insert(result);
    }

    let mut ordered: Vec<&CalibrationResult> = newest.into_values().collect();
    ordered.sort_by_key(|r| r.measured_at);

    let mut adjustments = Adjustments::new();
    for result in ordered {
        let adjustment = result.adjustment();
        for id in &result.substance_ids {
            adjustments.insert(id.clone(), adjustment);
        }
    }
    adjustments
}
