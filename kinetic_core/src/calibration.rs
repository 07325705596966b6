//! Calibration from an external biomarker measurement.
//!
//! Inverts the forward model with a linear steady-state approximation: the
//! mean daily intake of the biomarker's substances over its lookback window,
//! times a fixed conversion factor, predicts the biomarker. The ratio of the
//! measured to the predicted value is the Individual Absorption Factor (IAF):
//!
//! - `IAF < 1`: under-absorbing, emit a bioavailability multiplier of `IAF`
//! - `IAF > 1`: retaining more than expected, emit a clearance multiplier of `1 / IAF`
//!
//! Confidence is an evidence-strength heuristic based on the number of doses
//! and how much of the lookback window they cover. It is not a statistical
//! estimate.

use crate::types::{Confidence, DoseEvent, DoseUnit, PkAdjustment};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const HIGH_CONFIDENCE_MIN_DOSES: usize = 60;
pub const HIGH_CONFIDENCE_MIN_COVERAGE: f64 = 0.8;
pub const MEDIUM_CONFIDENCE_MIN_DOSES: usize = 20;

/// Lab measurements that can calibrate the model
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Biomarker {
    /// Serum 25(OH)D, ng/mL
    VitaminD,
    /// Serum ferritin, ng/mL
    Ferritin,
    /// Omega-3 index, % of RBC fatty acids
    Omega3Index,
    /// RBC magnesium, mg/dL
    RbcMagnesium,
}

/// Fixed mapping from a biomarker to the intake that drives it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomarkerProfile {
    /// Catalog names (or aliases) of the substances that feed this biomarker
    pub substance_names: &'static [&'static str],
    /// Unit daily intake is summed in
    pub dose_unit: DoseUnit,
    /// Biomarker units per one `dose_unit` of mean daily intake
    pub conversion_factor: f64,
    /// Days to reach steady state
    pub lookback_days: i64,
    pub measurement_unit: &'static str,
}

impl Biomarker {
    pub const ALL: [Biomarker; 4] = [
        Biomarker::VitaminD,
        Biomarker::Ferritin,
        Biomarker::Omega3Index,
        Biomarker::RbcMagnesium,
    ];

    pub fn profile(&self) -> BiomarkerProfile {
        match self {
            Biomarker::VitaminD => BiomarkerProfile {
                substance_names: &["vitamin d"],
                dose_unit: DoseUnit::Iu,
                conversion_factor: 0.01,
                lookback_days: 90,
                measurement_unit: "ng/mL",
            },
            Biomarker::Ferritin => BiomarkerProfile {
                substance_names: &["iron"],
                dose_unit: DoseUnit::Mg,
                conversion_factor: 2.0,
                lookback_days: 90,
                measurement_unit: "ng/mL",
            },
            Biomarker::Omega3Index => BiomarkerProfile {
                substance_names: &["fish oil"],
                dose_unit: DoseUnit::Mg,
                conversion_factor: 0.004,
                lookback_days: 120,
                measurement_unit: "%",
            },
            Biomarker::RbcMagnesium => BiomarkerProfile {
                substance_names: &["magnesium"],
                dose_unit: DoseUnit::Mg,
                conversion_factor: 0.015,
                lookback_days: 30,
                measurement_unit: "mg/dL",
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Biomarker::VitaminD => "vitamin_d",
            Biomarker::Ferritin => "ferritin",
            Biomarker::Omega3Index => "omega3_index",
            Biomarker::RbcMagnesium => "rbc_magnesium",
        }
    }
}

impl FromStr for Biomarker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Biomarker::ALL
            .into_iter()
            .find(|b| b.as_str() == normalized)
            .ok_or_else(|| Error::UnknownBiomarker(s.to_string()))
    }
}

impl fmt::Display for Biomarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single lab result to calibrate against
#[derive(Clone, Copy, Debug)]
pub struct CalibrationRequest {
    pub biomarker: Biomarker,
    pub measured_value: f64,
    pub measured_at: DateTime<Utc>,
}

/// Outcome of one calibration; persisted by the caller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub id: Uuid,
    pub biomarker: Biomarker,
    pub measured_value: f64,
    pub predicted_value: f64,
    pub iaf: f64,
    pub calibrated_bioavailability: Option<f64>,
    pub calibrated_clearance: Option<f64>,
    pub confidence: Confidence,
    pub dose_count: usize,
    pub substance_ids: Vec<String>,
    pub measured_at: DateTime<Utc>,
}

impl CalibrationResult {
    /// Adjustment to pass back into future concentration computations
    pub fn adjustment(&self) -> PkAdjustment {
        PkAdjustment {
            bioavailability_factor: self.calibrated_bioavailability.unwrap_or(1.0),
            clearance_factor: self.calibrated_clearance.unwrap_or(1.0),
        }
    }
}

/// Calibrate from one measurement against the doses of `substance_ids`
pub fn calibrate(
    request: &CalibrationRequest,
    doses: &[DoseEvent],
    substance_ids: &HashSet<String>,
) -> CalibrationResult {
    let profile = request.biomarker.profile();
    let window_start = request.measured_at - Duration::days(profile.lookback_days);

    let mut qualifying: Vec<(f64, DateTime<Utc>)> = Vec::new();
    for dose in doses {
        if !substance_ids.contains(&dose.substance_id)
            || dose.logged_at < window_start
            || dose.logged_at > request.measured_at
        {
            continue;
        }
        match dose.unit.convert(dose.amount, profile.dose_unit) {
            Some(amount) => qualifying.push((amount, dose.logged_at)),
            None => tracing::warn!(
                "Dose {} is in {}, cannot convert to {} for {} calibration; skipping",
                dose.id,
                dose.unit.as_str(),
                profile.dose_unit.as_str(),
                request.biomarker
            ),
        }
    }

    let mut ids: Vec<String> = substance_ids.iter().cloned().collect();
    ids.sort();

    let mut result = CalibrationResult {
        id: Uuid::new_v4(),
        biomarker: request.biomarker,
        measured_value: request.measured_value,
        predicted_value: 0.0,
        iaf: 1.0,
        calibrated_bioavailability: None,
        calibrated_clearance: None,
        confidence: Confidence::Low,
        dose_count: qualifying.len(),
        substance_ids: ids,
        measured_at: request.measured_at,
    };

    let Some(earliest) = qualifying.iter().map(|(_, at)| *at).min() else {
        tracing::info!(
            "No {} doses in the {}-day window, calibration left neutral",
            request.biomarker,
            profile.lookback_days
        );
        return result;
    };

    let total: f64 = qualifying.iter().map(|(amount, _)| amount).sum();
    let spanned_seconds = (request.measured_at - earliest).num_seconds() as f64;
    let days_spanned = (spanned_seconds / 86_400.0)
        .ceil()
        .clamp(1.0, profile.lookback_days as f64);

    let mean_daily = total / days_spanned;
    let predicted = mean_daily * profile.conversion_factor;
    let iaf = if predicted > 0.0 {
        request.measured_value / predicted
    } else {
        1.0
    };

    let coverage = days_spanned / profile.lookback_days as f64;
    let confidence = if qualifying.len() >= HIGH_CONFIDENCE_MIN_DOSES
        && coverage >= HIGH_CONFIDENCE_MIN_COVERAGE
    {
        Confidence::High
    } else if qualifying.len() >= MEDIUM_CONFIDENCE_MIN_DOSES {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    result.predicted_value = predicted;
    result.iaf = iaf;
    result.confidence = confidence;
    if iaf < 1.0 {
        result.calibrated_bioavailability = Some(iaf);
    } else if iaf > 1.0 {
        result.calibrated_clearance = Some(1.0 / iaf);
    }

    tracing::info!(
        "Calibrated {}: measured {} vs predicted {:.2} {} (IAF {:.3}, {:?}, {} doses over {} days)",
        request.biomarker,
        request.measured_value,
        predicted,
        profile.measurement_unit,
        iaf,
        confidence,
        result.dose_count,
        days_spanned
    );

    result
}
