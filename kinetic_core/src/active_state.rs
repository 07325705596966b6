//! Active-state aggregation.
//!
//! Evaluates every dose in the window with the concentration model, emits one
//! [`ActiveCompound`] per dose that has not cleared, and sums doses of the same
//! substance into a [`SubstanceLevel`] capped at the configured ceiling
//! (150% by default). The timeline sweeps the same rule across a time axis.

use crate::concentration::{evaluate_dose, PkParameters};
use crate::config::{PkConfig, TimelineConfig, MAX_SPAN_HOURS};
use crate::types::{ActiveCompound, DoseEvent, Phase, PkAdjustment, Substance, SubstanceLevel};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Calibration adjustments keyed by substance id
pub type Adjustments = HashMap<String, PkAdjustment>;

/// Doses logged within `[now − hours, now]`
pub fn doses_in_window(doses: &[DoseEvent], now: DateTime<Utc>, hours: i64) -> Vec<DoseEvent> {
    let cutoff = now - Duration::hours(hours);
    doses
        .iter()
        .filter(|d| d.logged_at >= cutoff && d.logged_at <= now)
        .cloned()
        .collect()
}

/// One active compound per dose that is still above the clearance threshold,
/// highest concentration first
pub fn active_compounds(
    doses: &[DoseEvent],
    substances: &HashMap<String, Substance>,
    now: DateTime<Utc>,
    pk: &PkConfig,
    adjustments: &Adjustments,
) -> Vec<ActiveCompound> {
    let mut compounds = Vec::new();

    for dose in doses {
        let Some(substance) = substances.get(&dose.substance_id) else {
            tracing::warn!(
                "Dose {} references unknown substance '{}', skipping",
                dose.id,
                dose.substance_id
            );
            continue;
        };

        let params = PkParameters::for_substance(substance, pk);
        let level = evaluate_dose(dose, &params, now, adjustments.get(&substance.id));

        if level.phase == Phase::Cleared {
            continue;
        }

        compounds.push(ActiveCompound {
            dose_id: dose.id,
            substance_id: substance.id.clone(),
            substance_name: substance.name.clone(),
            concentration_percent: level.concentration_percent,
            phase: level.phase,
            minutes_since_dose: level.minutes_since_dose,
            peak_minutes: params.peak_minutes,
            half_life_minutes: params.half_life_minutes,
            parameter_source: params.source,
        });
    }

    compounds.sort_by(|a, b| b.concentration_percent.total_cmp(&a.concentration_percent));

    tracing::debug!(
        "{} of {} doses still active at {}",
        compounds.len(),
        doses.len(),
        now
    );

    compounds
}

/// Sum per-dose concentrations by substance, capped at `cap`, highest first
pub fn aggregate_levels(compounds: &[ActiveCompound], cap: f64) -> Vec<SubstanceLevel> {
    let mut by_substance: BTreeMap<&str, SubstanceLevel> = BTreeMap::new();

    for compound in compounds {
        let level = by_substance
            .entry(compound.substance_id.as_str())
            .or_insert_with(|| SubstanceLevel {
                substance_id: compound.substance_id.clone(),
                substance_name: compound.substance_name.clone(),
                total_percent: 0.0,
                dose_count: 0,
            });
        level.total_percent += compound.concentration_percent;
        level.dose_count += 1;
    }

    let mut levels: Vec<SubstanceLevel> = by_substance
        .into_values()
        .map(|mut level| {
            level.total_percent = level.total_percent.min(cap);
            level
        })
        .collect();
    levels.sort_by(|a, b| b.total_percent.total_cmp(&a.total_percent));
    levels
}

/// Bucketing of the concentration timeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelineOptions {
    pub interval_minutes: i64,
    pub lookback_hours: i64,
    pub projection_hours: i64,
}

impl TimelineOptions {
    /// Reject sweeps that are empty or too long to represent
    pub fn validate(&self) -> Result<()> {
        if self.interval_minutes <= 0 || self.interval_minutes > MAX_SPAN_HOURS * 60 {
            return Err(Error::Config(format!(
                "timeline interval must be between 1 and {} minutes, got {}",
                MAX_SPAN_HOURS * 60,
                self.interval_minutes
            )));
        }
        for (name, hours) in [
            ("lookback", self.lookback_hours),
            ("projection", self.projection_hours),
        ] {
            if !(0..=MAX_SPAN_HOURS).contains(&hours) {
                return Err(Error::Config(format!(
                    "timeline {} must be between 0 and {} hours, got {}",
                    name, MAX_SPAN_HOURS, hours
                )));
            }
        }
        Ok(())
    }
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self::from(&TimelineConfig::default())
    }
}

impl From<&TimelineConfig> for TimelineOptions {
    fn from(cfg: &TimelineConfig) -> Self {
        Self {
            interval_minutes: cfg.interval_minutes,
            lookback_hours: cfg.lookback_hours,
            projection_hours: cfg.projection_hours,
        }
    }
}

/// Summed level of each dosed substance at one instant
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelinePoint {
    pub at: DateTime<Utc>,
    pub levels: BTreeMap<String, f64>,
}

/// Concentration series from `now − lookback` to `now + projection`.
///
/// Each bucket applies the same rule as a state computation at that instant:
/// only uncleared doses logged within the trailing `window_hours` count, and
/// they are summed per substance and capped like [`aggregate_levels`]. Every dosed substance
/// appears at every point, including at 0, so series stay continuous.
pub fn timeline(
    doses: &[DoseEvent],
    substances: &HashMap<String, Substance>,
    now: DateTime<Utc>,
    options: TimelineOptions,
    window_hours: i64,
    pk: &PkConfig,
    adjustments: &Adjustments,
) -> Result<Vec<TimelinePoint>> {
    options.validate()?;
    if window_hours <= 0 || window_hours > MAX_SPAN_HOURS {
        return Err(Error::Config(format!(
            "window must be between 1 and {} hours, got {}",
            MAX_SPAN_HOURS, window_hours
        )));
    }

    let evaluable: Vec<(&DoseEvent, PkParameters, Option<&PkAdjustment>)> = doses
        .iter()
        .filter_map(|dose| {
            substances.get(&dose.substance_id).map(|substance| {
                (
                    dose,
                    PkParameters::for_substance(substance, pk),
                    adjustments.get(&substance.id),
                )
            })
        })
        .collect();

    let start = now - Duration::hours(options.lookback_hours);
    let end = now + Duration::hours(options.projection_hours);
    let step = Duration::minutes(options.interval_minutes);
    let window = Duration::hours(window_hours);

    let mut points = Vec::new();
    let mut at = start;
    while at <= end {
        let mut levels: BTreeMap<String, f64> = BTreeMap::new();
        for (dose, params, adjustment) in &evaluable {
            let total = levels.entry(dose.substance_id.clone()).or_insert(0.0);
            if dose.logged_at < at - window {
                continue;
            }
            let level = evaluate_dose(dose, params, at, *adjustment);
            if level.phase != Phase::Cleared {
                *total += level.concentration_percent;
            }
        }
        for value in levels.values_mut() {
            *value = value.min(pk.aggregate_cap);
        }
        points.push(TimelinePoint { at, levels });
        at += step;
    }

    tracing::debug!(
        "Built timeline of {} points for {} doses",
        points.len(),
        evaluable.len()
    );

    Ok(points)
}
