//! Exclusion zone engine.
//!
//! A timing rule opens a window when its source substance is logged: the
//! target should not be taken until `min_hours_apart` has passed. A zone is
//! reported while `now < ends_at`, measured from the most recent source dose.
//!
//! By default a zone is only reported when the target was also dosed in the
//! window (see [`ExclusionConfig::require_target_dosed`]).

use crate::config::ExclusionConfig;
use crate::types::{
    DoseEvent, ExclusionZone, OpportunityKind, OptimizationOpportunity, Severity, Substance,
    TimingRule,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Zones currently in effect, most urgent first
pub fn exclusion_zones(
    rules: &[TimingRule],
    doses: &[DoseEvent],
    substances: &HashMap<String, Substance>,
    now: DateTime<Utc>,
    cfg: &ExclusionConfig,
) -> Vec<ExclusionZone> {
    let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for dose in doses.iter().filter(|d| d.logged_at <= now) {
        latest
            .entry(dose.substance_id.as_str())
            .and_modify(|at| *at = (*at).max(dose.logged_at))
            .or_insert(dose.logged_at);
    }

    let mut zones = Vec::new();

    for rule in rules {
        let Some(&source_at) = latest.get(rule.source_id.as_str()) else {
            continue;
        };

        let Some(ends_at) = zone_end(source_at, rule.min_hours_apart) else {
            tracing::warn!(
                "Skipping {} -> {}: min_hours_apart {} is out of range",
                rule.source_id,
                rule.target_id,
                rule.min_hours_apart
            );
            continue;
        };
        if ends_at <= now {
            continue;
        }

        if cfg.require_target_dosed && !latest.contains_key(rule.target_id.as_str()) {
            tracing::trace!(
                "Skipping {} -> {}: target not dosed in window",
                rule.source_id,
                rule.target_id
            );
            continue;
        }

        let remaining_ms = (ends_at - now).num_milliseconds();
        let minutes_remaining = (remaining_ms as f64 / 60_000.0).round() as i64;

        zones.push(ExclusionZone {
            source_id: rule.source_id.clone(),
            source_name: display_name(substances, &rule.source_id),
            target_id: rule.target_id.clone(),
            target_name: display_name(substances, &rule.target_id),
            ends_at,
            minutes_remaining,
            severity: rule.severity,
            reason: rule.reason.clone(),
            citation: rule.citation.clone(),
        });
    }

    zones.sort_by_key(|z| z.minutes_remaining);

    tracing::debug!("{} exclusion zones active at {}", zones.len(), now);
    zones
}

/// `source_at + hours`, or `None` when the span is not a representable instant
fn zone_end(source_at: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    let millis = hours * 3_600_000.0;
    if !millis.is_finite() || millis < 0.0 || millis >= i64::MAX as f64 {
        return None;
    }
    let window = Duration::try_milliseconds(millis.round() as i64)?;
    source_at.checked_add_signed(window)
}

fn display_name(substances: &HashMap<String, Substance>, id: &str) -> String {
    substances
        .get(id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn timing_priority(severity: Severity) -> i32 {
    match severity {
        Severity::Critical => 3,
        Severity::Medium => 2,
        Severity::Low => 1,
    }
}

/// Turn active zones into "wait before taking" suggestions
pub fn timing_opportunities(zones: &[ExclusionZone]) -> Vec<OptimizationOpportunity> {
    zones
        .iter()
        .map(|zone| {
            let hours = zone.minutes_remaining / 60;
            let minutes = zone.minutes_remaining % 60;
            let wait = if hours > 0 {
                format!("{}h {}m", hours, minutes)
            } else {
                format!("{}m", minutes)
            };

            OptimizationOpportunity {
                kind: OpportunityKind::Timing,
                substance_ids: vec![zone.source_id.clone(), zone.target_id.clone()],
                title: format!("Wait {} before taking {}", wait, zone.target_name),
                description: format!("{} was taken recently. {}", zone.source_name, zone.reason),
                priority: timing_priority(zone.severity),
                caution: None,
                realized: false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyCategory;
    use crate::types::DoseUnit;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn substances() -> HashMap<String, Substance> {
        ["st_johns_wort", "five_htp", "iron", "calcium"]
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    Substance {
                        id: id.to_string(),
                        name: id.to_uppercase(),
                        aliases: vec![],
                        peak_minutes: None,
                        half_life_minutes: None,
                        bioavailability_percent: None,
                        safety_category: SafetyCategory::General,
                    },
                )
            })
            .collect()
    }

    fn rule(source: &str, target: &str, hours: f64, severity: Severity) -> TimingRule {
        TimingRule {
            source_id: source.into(),
            target_id: target.into(),
            min_hours_apart: hours,
            severity,
            reason: "test reason".into(),
            citation: None,
        }
    }

    fn dose(substance_id: &str, minutes_ago: i64) -> DoseEvent {
        DoseEvent {
            id: Uuid::new_v4(),
            substance_id: substance_id.into(),
            amount: 1.0,
            unit: DoseUnit::Unit,
            logged_at: now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_critical_zone_minutes_remaining_and_expiry() {
        let rules = vec![rule("st_johns_wort", "five_htp", 4.0, Severity::Critical)];
        let doses = vec![dose("st_johns_wort", 60), dose("five_htp", 30)];
        let cfg = ExclusionConfig::default();

        let zones = exclusion_zones(&rules, &doses, &substances(), now(), &cfg);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].minutes_remaining, 180);
        assert_eq!(zones[0].severity, Severity::Critical);
        assert_eq!(zones[0].ends_at, now() + Duration::hours(3));
        assert_eq!(zones[0].source_name, "ST_JOHNS_WORT");

        let later = exclusion_zones(&rules, &doses, &substances(), now() + Duration::hours(4), &cfg);
        assert!(later.is_empty());
    }

    #[test]
    fn test_zone_ending_exactly_now_is_gone() {
        let rules = vec![rule("iron", "calcium", 2.0, Severity::Medium)];
        let doses = vec![dose("iron", 120), dose("calcium", 10)];
        let zones = exclusion_zones(&rules, &doses, &substances(), now(), &ExclusionConfig::default());
        assert!(zones.is_empty());
    }

    #[test]
    fn test_relevance_filter() {
        let rules = vec![rule("iron", "calcium", 2.0, Severity::Medium)];
        let doses = vec![dose("iron", 30)];

        let filtered = exclusion_zones(&rules, &doses, &substances(), now(), &ExclusionConfig::default());
        assert!(filtered.is_empty());

        let unfiltered = exclusion_zones(
            &rules,
            &doses,
            &substances(),
            now(),
            &ExclusionConfig {
                require_target_dosed: false,
            },
        );
        assert_eq!(unfiltered.len(), 1);
        assert_eq!(unfiltered[0].minutes_remaining, 90);
    }

    #[test]
    fn test_most_recent_source_dose_wins() {
        let rules = vec![rule("iron", "calcium", 2.0, Severity::Medium)];
        let doses = vec![dose("iron", 100), dose("iron", 20), dose("calcium", 5)];
        let zones = exclusion_zones(&rules, &doses, &substances(), now(), &ExclusionConfig::default());
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].minutes_remaining, 100);
    }

    #[test]
    fn test_sorted_most_urgent_first_without_dedup() {
        let rules = vec![
            rule("st_johns_wort", "five_htp", 24.0, Severity::Critical),
            rule("iron", "calcium", 2.0, Severity::Medium),
            rule("iron", "calcium", 3.0, Severity::Low),
        ];
        let doses = vec![
            dose("st_johns_wort", 60),
            dose("five_htp", 10),
            dose("iron", 60),
            dose("calcium", 10),
        ];
        let zones = exclusion_zones(&rules, &doses, &substances(), now(), &ExclusionConfig::default());

        let remaining: Vec<i64> = zones.iter().map(|z| z.minutes_remaining).collect();
        assert_eq!(remaining, vec![60, 120, 23 * 60]);
    }

    #[test]
    fn test_unrepresentable_rule_span_is_skipped() {
        let rules = vec![
            rule("iron", "calcium", 1e15, Severity::Medium),
            rule("iron", "calcium", f64::NAN, Severity::Medium),
            rule("st_johns_wort", "five_htp", 4.0, Severity::Critical),
        ];
        let doses = vec![
            dose("iron", 30),
            dose("calcium", 10),
            dose("st_johns_wort", 60),
            dose("five_htp", 30),
        ];

        let zones = exclusion_zones(&rules, &doses, &substances(), now(), &ExclusionConfig::default());
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].source_id, "st_johns_wort");
    }

    #[test]
    fn test_timing_opportunities() {
        let rules = vec![rule("st_johns_wort", "five_htp", 4.0, Severity::Critical)];
        let doses = vec![dose("st_johns_wort", 60), dose("five_htp", 30)];
        let zones = exclusion_zones(&rules, &doses, &substances(), now(), &ExclusionConfig::default());

        let opportunities = timing_opportunities(&zones);
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].kind, OpportunityKind::Timing);
        assert_eq!(opportunities[0].priority, 3);
        assert_eq!(opportunities[0].title, "Wait 3h 0m before taking FIVE_HTP");
    }
}
