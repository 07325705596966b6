//! Biological state computation.
//!
//! Ties the engines together for one user at one instant:
//!
//! 1. Restrict doses to the trailing window
//! 2. Active compounds and per-substance levels (concentration model)
//! 3. Exclusion zones from timing rules
//! 4. Synergy, stacking and timing opportunities
//! 5. Bio-score
//!
//! Every step is a pure function of the inputs; nothing is cached between calls.

use crate::active_state::{
    active_compounds, aggregate_levels, doses_in_window, timeline, Adjustments, TimelineOptions,
    TimelinePoint,
};
use crate::bio_score::bio_score;
use crate::calibration::{calibrate, CalibrationRequest, CalibrationResult};
use crate::config::EngineConfig;
use crate::enzyme::PathwayInteraction;
use crate::exclusion::{exclusion_zones, timing_opportunities};
use crate::reference::ReferenceData;
use crate::synergy::{
    realized_synergy_count, sort_by_priority, stacking_opportunities, synergy_opportunities,
};
use crate::types::{BiologicalState, DoseEvent};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Everything a state computation reads
#[derive(Clone, Copy, Debug)]
pub struct StateInputs<'a> {
    pub now: DateTime<Utc>,
    /// Dose history; anything outside the configured window is ignored
    pub doses: &'a [DoseEvent],
    pub reference: &'a ReferenceData,
    /// Saved calibrations to apply, keyed by substance id
    pub adjustments: &'a Adjustments,
}

/// Compute the biological state at `inputs.now`
pub fn compute_state(inputs: &StateInputs<'_>, cfg: &EngineConfig) -> BiologicalState {
    let reference = inputs.reference;
    let window = doses_in_window(inputs.doses, inputs.now, cfg.window.hours);

    let compounds = active_compounds(
        &window,
        &reference.substances,
        inputs.now,
        &cfg.pk,
        inputs.adjustments,
    );
    let levels = aggregate_levels(&compounds, cfg.pk.aggregate_cap);

    let zones = exclusion_zones(
        &reference.timing_rules,
        &window,
        &reference.substances,
        inputs.now,
        &cfg.exclusion,
    );

    let active_ids: HashSet<String> = compounds.iter().map(|c| c.substance_id.clone()).collect();
    let mut optimizations =
        synergy_opportunities(&reference.synergy_rules, &active_ids, &reference.substances);
    let realized = realized_synergy_count(&optimizations);

    optimizations.extend(stacking_opportunities(&levels, &reference.substances));
    optimizations.extend(timing_opportunities(&zones));
    sort_by_priority(&mut optimizations);

    let score = bio_score(compounds.len(), &zones, realized);

    tracing::info!(
        "State at {}: {} active compounds, {} zones, {} optimizations, bio-score {}",
        inputs.now,
        compounds.len(),
        zones.len(),
        optimizations.len(),
        score
    );

    BiologicalState {
        active_compounds: compounds,
        substance_levels: levels,
        exclusion_zones: zones,
        optimizations,
        bio_score: score,
        computed_at: inputs.now,
    }
}

/// Concentration timeline around `inputs.now`.
///
/// Every bucket counts the doses a [`compute_state`] at that instant would
/// count, so the point at `now` agrees with the state's substance levels.
pub fn compute_timeline(
    inputs: &StateInputs<'_>,
    cfg: &EngineConfig,
    options: Option<TimelineOptions>,
) -> Result<Vec<TimelinePoint>> {
    let options = options.unwrap_or_else(|| TimelineOptions::from(&cfg.timeline));
    options.validate()?;

    timeline(
        inputs.doses,
        &inputs.reference.substances,
        inputs.now,
        options,
        cfg.window.hours,
        &cfg.pk,
        inputs.adjustments,
    )
}

/// Enzyme pathway interactions among the substances active in `state`
pub fn active_pathway_interactions(
    reference: &ReferenceData,
    state: &BiologicalState,
) -> Vec<PathwayInteraction> {
    let ids: Vec<&str> = state
        .substance_levels
        .iter()
        .map(|l| l.substance_id.as_str())
        .collect();
    reference.enzymes.interactions(&ids)
}

/// Calibrate against a lab result, mapping the biomarker's substances
/// through the reference data
pub fn calibrate_from_measurement(
    reference: &ReferenceData,
    doses: &[DoseEvent],
    request: &CalibrationRequest,
) -> CalibrationResult {
    let profile = request.biomarker.profile();
    let ids: HashSet<String> = profile
        .substance_names
        .iter()
        .filter_map(|name| {
            let found = reference.find_by_name(name).map(|s| s.id.clone());
            if found.is_none() {
                tracing::warn!(
                    "Reference '{}' has no substance '{}' for {}",
                    reference.version,
                    name,
                    request.biomarker
                );
            }
            found
        })
        .collect();

    calibrate(request, doses, &ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Biomarker;
    use crate::catalog::default_reference;
    use crate::Error;
    use crate::types::{Confidence, DoseUnit, OpportunityKind, Severity};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn dose(substance_id: &str, minutes_ago: i64, amount: f64, unit: DoseUnit) -> DoseEvent {
        DoseEvent {
            id: Uuid::new_v4(),
            substance_id: substance_id.into(),
            amount,
            unit,
            logged_at: now() - Duration::minutes(minutes_ago),
        }
    }

    fn inputs<'a>(doses: &'a [DoseEvent], adjustments: &'a Adjustments) -> StateInputs<'a> {
        StateInputs {
            now: now(),
            doses,
            reference: default_reference(),
            adjustments,
        }
    }

    #[test]
    fn test_empty_history_is_neutral() {
        crate::logging::init_test();
        let adjustments = Adjustments::new();
        let state = compute_state(&inputs(&[], &adjustments), &EngineConfig::default());

        assert!(state.active_compounds.is_empty());
        assert!(state.exclusion_zones.is_empty());
        assert!(state.optimizations.is_empty());
        assert_eq!(state.bio_score, 50);
        assert_eq!(state.computed_at, now());
    }

    #[test]
    fn test_only_stale_doses_is_neutral() {
        let adjustments = Adjustments::new();
        // Outside the 24h window: the serotonergic pair no longer counts
        let doses = vec![
            dose("st_johns_wort", 60 * 30, 300.0, DoseUnit::Mg),
            dose("five_htp", 60 * 30, 100.0, DoseUnit::Mg),
        ];
        let state = compute_state(&inputs(&doses, &adjustments), &EngineConfig::default());
        assert!(state.active_compounds.is_empty());
        assert!(state.exclusion_zones.is_empty());
        assert_eq!(state.bio_score, 50);
    }

    #[test]
    fn test_full_state() {
        crate::logging::init_test();
        let adjustments = Adjustments::new();
        let doses = vec![
            dose("caffeine", 60, 100.0, DoseUnit::Mg),
            dose("l_theanine", 60, 200.0, DoseUnit::Mg),
            dose("st_johns_wort", 120, 300.0, DoseUnit::Mg),
            dose("five_htp", 30, 100.0, DoseUnit::Mg),
        ];
        let state = compute_state(&inputs(&doses, &adjustments), &EngineConfig::default());

        assert_eq!(state.active_compounds.len(), 4);
        assert_eq!(state.substance_levels.len(), 4);

        // Both directions of the serotonergic rule fire
        assert_eq!(state.exclusion_zones.len(), 2);
        assert!(state
            .exclusion_zones
            .iter()
            .all(|z| z.severity == Severity::Critical));
        assert_eq!(state.exclusion_zones[0].minutes_remaining, 22 * 60);

        // caffeine + theanine realized; nothing else pairs up
        let realized: Vec<_> = state.optimizations.iter().filter(|o| o.realized).collect();
        assert_eq!(realized.len(), 1);

        // Timing opportunities (priority 3) lead
        assert_eq!(state.optimizations[0].kind, OpportunityKind::Timing);

        // 100 - 50 - 50 + 5, clamped
        assert_eq!(state.bio_score, 5);
    }

    #[test]
    fn test_one_critical_zone_and_two_synergies() {
        let adjustments = Adjustments::new();
        let doses = vec![
            dose("caffeine", 60, 100.0, DoseUnit::Mg),
            dose("l_theanine", 60, 200.0, DoseUnit::Mg),
            dose("curcumin", 60, 500.0, DoseUnit::Mg),
            dose("piperine", 60, 5.0, DoseUnit::Mg),
            dose("st_johns_wort", 120, 300.0, DoseUnit::Mg),
        ];
        let cfg = EngineConfig {
            exclusion: crate::config::ExclusionConfig {
                require_target_dosed: false,
            },
            ..EngineConfig::default()
        };
        let state = compute_state(&inputs(&doses, &adjustments), &cfg);

        assert_eq!(state.exclusion_zones.len(), 1);
        assert_eq!(state.exclusion_zones[0].target_id, "five_htp");
        assert_eq!(state.bio_score, 60);
    }

    #[test]
    fn test_adjustments_are_applied() {
        let doses = vec![dose("caffeine", 60, 100.0, DoseUnit::Mg)];
        let mut adjustments = Adjustments::new();
        adjustments.insert(
            "caffeine".into(),
            crate::types::PkAdjustment {
                bioavailability_factor: 0.5,
                clearance_factor: 1.0,
            },
        );

        let mut reference = default_reference().clone();
        if let Some(caffeine) = reference.substances.get_mut("caffeine") {
            caffeine.peak_minutes = Some(60.0);
        }
        let state = compute_state(
            &StateInputs {
                now: now(),
                doses: &doses,
                reference: &reference,
                adjustments: &adjustments,
            },
            &EngineConfig::default(),
        );
        assert!((state.active_compounds[0].concentration_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_uses_config_defaults() {
        let adjustments = Adjustments::new();
        let doses = vec![dose("caffeine", 45, 100.0, DoseUnit::Mg)];
        let points =
            compute_timeline(&inputs(&doses, &adjustments), &EngineConfig::default(), None).unwrap();

        assert_eq!(points.len(), 113);
        let at_now = points.iter().find(|p| p.at == now()).unwrap();
        // Caffeine peaks at 45 minutes in the built-in catalog
        assert_eq!(at_now.levels["caffeine"], 100.0);
    }

    #[test]
    fn test_timeline_now_matches_state_levels() {
        let adjustments = Adjustments::new();
        let doses = vec![
            // Slow to clear, but already outside the 24 hour window
            dose("selenium", 30 * 60, 200.0, DoseUnit::Mcg),
            dose("caffeine", 45, 100.0, DoseUnit::Mg),
            dose("l_theanine", 120, 200.0, DoseUnit::Mg),
        ];
        let config = EngineConfig::default();
        let state = compute_state(&inputs(&doses, &adjustments), &config);
        let points = compute_timeline(&inputs(&doses, &adjustments), &config, None).unwrap();
        let at_now = points.iter().find(|p| p.at == now()).unwrap();

        assert!(state.substance_levels.iter().all(|l| l.substance_id != "selenium"));
        assert_eq!(at_now.levels.get("selenium").copied().unwrap_or(0.0), 0.0);

        assert_eq!(state.substance_levels.len(), 2);
        for level in &state.substance_levels {
            let bucket = at_now.levels[&level.substance_id];
            assert!(
                (bucket - level.total_percent).abs() < 1e-9,
                "{}: timeline {} vs state {}",
                level.substance_id,
                bucket,
                level.total_percent
            );
        }
    }

    #[test]
    fn test_timeline_rejects_unbounded_lookback() {
        let adjustments = Adjustments::new();
        let options = TimelineOptions {
            lookback_hours: i64::MAX,
            ..TimelineOptions::default()
        };
        let result = compute_timeline(&inputs(&[], &adjustments), &EngineConfig::default(), Some(options));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_active_pathway_interactions() {
        let adjustments = Adjustments::new();
        let doses = vec![
            dose("curcumin", 60, 500.0, DoseUnit::Mg),
            dose("piperine", 60, 5.0, DoseUnit::Mg),
        ];
        let state = compute_state(&inputs(&doses, &adjustments), &EngineConfig::default());
        let interactions = active_pathway_interactions(default_reference(), &state);

        // Piperine inhibits UGT1A1, which clears curcumin
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].substrate_id, "curcumin");
        assert_eq!(interactions[0].modulator_id, "piperine");
    }

    #[test]
    fn test_calibrate_from_measurement_maps_names() {
        let measured_at = now();
        let doses: Vec<DoseEvent> = (1..=90)
            .map(|day| DoseEvent {
                id: Uuid::new_v4(),
                substance_id: "vitamin_d3".into(),
                amount: 2000.0,
                unit: DoseUnit::Iu,
                logged_at: measured_at - Duration::days(day),
            })
            .collect();

        let result = calibrate_from_measurement(
            default_reference(),
            &doses,
            &CalibrationRequest {
                biomarker: Biomarker::VitaminD,
                measured_value: 40.0,
                measured_at,
            },
        );

        assert_eq!(result.substance_ids, vec!["vitamin_d3".to_string()]);
        assert_eq!(result.dose_count, 90);
        assert!((result.iaf - 2.0).abs() < 1e-9);
        assert_eq!(result.confidence, Confidence::High);
    }
}
