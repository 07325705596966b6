//! Single-compartment concentration model.
//!
//! A dose ramps linearly to 100% at its peak time, then decays exponentially
//! with the substance's half-life:
//!
//! - `Δt < 0`: 0 (not taken yet)
//! - `0 ≤ Δt < Tp`: `100 · Δt / Tp`
//! - `Δt ≥ Tp`: `100 · e^(−k·(Δt − Tp))`, `k = ln 2 / t½`
//!
//! Anything below 1% is reported as 0 and the dose is `cleared`.

use crate::config::PkConfig;
use crate::types::{DoseEvent, ParameterSource, Phase, PkAdjustment, Substance};
use chrono::{DateTime, Utc};

/// Theoretical maximum concentration of a single dose
pub const CMAX_PERCENT: f64 = 100.0;

/// Below this a dose counts as eliminated
pub const CLEARED_THRESHOLD_PERCENT: f64 = 1.0;

/// How long after Tp a dose is still reported as `peak`
pub const PEAK_PLATEAU_MINUTES: f64 = 30.0;

/// Peak time and half-life used for a computation, with their provenance
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PkParameters {
    pub peak_minutes: f64,
    pub half_life_minutes: f64,
    pub source: ParameterSource,
}

impl PkParameters {
    /// Resolve parameters for a substance, substituting configured defaults
    /// for missing or non-positive catalog values.
    pub fn for_substance(substance: &Substance, pk: &PkConfig) -> Self {
        let peak = substance.peak_minutes.filter(|p| *p >= 0.0);
        let half_life = substance.half_life_minutes.filter(|h| *h > 0.0);

        let source = match (peak.is_some(), half_life.is_some()) {
            (true, true) => ParameterSource::Measured,
            (false, false) => ParameterSource::Default,
            _ => ParameterSource::Partial,
        };

        if source != ParameterSource::Measured {
            tracing::debug!(
                "Substance '{}' is missing PK parameters, using defaults ({:?})",
                substance.id,
                source
            );
        }

        Self {
            peak_minutes: peak.unwrap_or(pk.default_peak_minutes),
            half_life_minutes: half_life.unwrap_or(pk.default_half_life_minutes),
            source,
        }
    }

    /// Apply a calibration adjustment. Clearance scales the elimination rate,
    /// which is the same as dividing the half-life.
    pub fn adjusted(self, adjustment: &PkAdjustment) -> Self {
        if adjustment.clearance_factor > 0.0 {
            Self {
                half_life_minutes: self.half_life_minutes / adjustment.clearance_factor,
                ..self
            }
        } else {
            self
        }
    }
}

/// Concentration (% of Cmax) `minutes` after a dose
pub fn concentration_at(minutes: f64, peak_minutes: f64, half_life_minutes: f64) -> f64 {
    let raw = if minutes < 0.0 {
        0.0
    } else if minutes < peak_minutes {
        CMAX_PERCENT * minutes / peak_minutes
    } else {
        let k = std::f64::consts::LN_2 / half_life_minutes;
        CMAX_PERCENT * (-k * (minutes - peak_minutes)).exp()
    };

    floor_cleared(raw)
}

fn floor_cleared(percent: f64) -> f64 {
    if percent < CLEARED_THRESHOLD_PERCENT || !percent.is_finite() {
        0.0
    } else {
        percent
    }
}

/// Classify the lifecycle phase of a dose
pub fn phase_for(minutes: f64, peak_minutes: f64, concentration: f64) -> Phase {
    if concentration < CLEARED_THRESHOLD_PERCENT {
        Phase::Cleared
    } else if minutes < peak_minutes {
        Phase::Absorbing
    } else if minutes <= peak_minutes + PEAK_PLATEAU_MINUTES {
        Phase::Peak
    } else {
        Phase::Eliminating
    }
}

/// Minutes elapsed between a dose and `at` (negative for future doses)
pub fn minutes_between(logged_at: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    (at - logged_at).num_milliseconds() as f64 / 60_000.0
}

/// Concentration and phase of one dose at one instant
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoseLevel {
    pub minutes_since_dose: f64,
    pub concentration_percent: f64,
    pub phase: Phase,
}

/// Evaluate a dose at `at`, optionally personalised by a calibration adjustment
pub fn evaluate_dose(
    dose: &DoseEvent,
    params: &PkParameters,
    at: DateTime<Utc>,
    adjustment: Option<&PkAdjustment>,
) -> DoseLevel {
    let minutes = minutes_between(dose.logged_at, at);

    let (params, scale) = match adjustment {
        Some(adj) => (params.adjusted(adj), adj.bioavailability_factor.max(0.0)),
        None => (*params, 1.0),
    };

    let concentration = floor_cleared(
        concentration_at(minutes, params.peak_minutes, params.half_life_minutes) * scale,
    );

    DoseLevel {
        minutes_since_dose: minutes,
        concentration_percent: concentration,
        phase: phase_for(minutes, params.peak_minutes, concentration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyCategory;
    use crate::types::DoseUnit;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn substance(peak: Option<f64>, half_life: Option<f64>) -> Substance {
        Substance {
            id: "caffeine".into(),
            name: "Caffeine".into(),
            aliases: vec![],
            peak_minutes: peak,
            half_life_minutes: half_life,
            bioavailability_percent: None,
            safety_category: SafetyCategory::General,
        }
    }

    #[test]
    fn test_zero_at_dose_time_and_full_at_peak() {
        assert_eq!(concentration_at(0.0, 60.0, 240.0), 0.0);
        assert_eq!(concentration_at(60.0, 60.0, 240.0), 100.0);
        assert_eq!(concentration_at(-5.0, 60.0, 240.0), 0.0);
    }

    #[test]
    fn test_monotonic_ramp_then_decay() {
        let mut previous = 0.0;
        for minute in 0..=60 {
            let c = concentration_at(minute as f64, 60.0, 240.0);
            assert!(c >= previous, "ramp decreased at minute {}", minute);
            previous = c;
        }

        let mut previous = 100.0;
        for minute in 61..1200 {
            let c = concentration_at(minute as f64, 60.0, 240.0);
            if c == 0.0 {
                break;
            }
            assert!(c < previous, "decay did not decrease at minute {}", minute);
            previous = c;
        }
    }

    #[test]
    fn test_quarter_after_two_half_lives() {
        // 10h post-dose = 8h (two half-lives) past a 60 minute peak
        let c = concentration_at(540.0, 60.0, 240.0);
        assert!((c - 25.0).abs() < 0.01, "expected ~25%, got {}", c);
    }

    #[test]
    fn test_below_one_percent_is_cleared() {
        // ~7 half-lives past peak is < 1%
        let c = concentration_at(60.0 + 240.0 * 7.0, 60.0, 240.0);
        assert_eq!(c, 0.0);
        assert_eq!(phase_for(60.0 + 240.0 * 7.0, 60.0, c), Phase::Cleared);
    }

    #[test]
    fn test_phase_classification() {
        assert_eq!(phase_for(30.0, 60.0, 50.0), Phase::Absorbing);
        assert_eq!(phase_for(60.0, 60.0, 100.0), Phase::Peak);
        assert_eq!(phase_for(90.0, 60.0, 95.0), Phase::Peak);
        assert_eq!(phase_for(91.0, 60.0, 94.0), Phase::Eliminating);
        assert_eq!(phase_for(10.0, 60.0, 0.5), Phase::Cleared);
    }

    #[test]
    fn test_defaults_are_tagged() {
        let pk = PkConfig::default();

        let measured = PkParameters::for_substance(&substance(Some(45.0), Some(300.0)), &pk);
        assert_eq!(measured.source, ParameterSource::Measured);
        assert_eq!(measured.peak_minutes, 45.0);

        let partial = PkParameters::for_substance(&substance(Some(45.0), None), &pk);
        assert_eq!(partial.source, ParameterSource::Partial);
        assert_eq!(partial.half_life_minutes, 240.0);

        let defaulted = PkParameters::for_substance(&substance(None, None), &pk);
        assert_eq!(defaulted.source, ParameterSource::Default);
        assert_eq!(defaulted.peak_minutes, 60.0);
        assert_eq!(defaulted.half_life_minutes, 240.0);
    }

    #[test]
    fn test_evaluate_dose_with_adjustment() {
        let logged_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let dose = DoseEvent {
            id: Uuid::new_v4(),
            substance_id: "caffeine".into(),
            amount: 100.0,
            unit: DoseUnit::Mg,
            logged_at,
        };
        let params = PkParameters::for_substance(&substance(Some(60.0), Some(240.0)), &PkConfig::default());
        let at = logged_at + Duration::minutes(300);

        let plain = evaluate_dose(&dose, &params, at, None);
        assert!((plain.concentration_percent - 50.0).abs() < 0.01);
        assert_eq!(plain.phase, Phase::Eliminating);

        // Half bioavailability halves the level
        let low_f = PkAdjustment {
            bioavailability_factor: 0.5,
            clearance_factor: 1.0,
        };
        let adjusted = evaluate_dose(&dose, &params, at, Some(&low_f));
        assert!((adjusted.concentration_percent - 25.0).abs() < 0.01);

        // Double clearance halves the half-life: 240 min past peak is two half-lives
        let fast_cl = PkAdjustment {
            bioavailability_factor: 1.0,
            clearance_factor: 2.0,
        };
        let adjusted = evaluate_dose(&dose, &params, at, Some(&fast_cl));
        assert!((adjusted.concentration_percent - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_future_dose_is_cleared() {
        let logged_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let dose = DoseEvent {
            id: Uuid::new_v4(),
            substance_id: "caffeine".into(),
            amount: 100.0,
            unit: DoseUnit::Mg,
            logged_at,
        };
        let params = PkParameters::for_substance(&substance(None, None), &PkConfig::default());
        let level = evaluate_dose(&dose, &params, logged_at - Duration::minutes(10), None);

        assert_eq!(level.concentration_percent, 0.0);
        assert_eq!(level.phase, Phase::Cleared);
    }
}
