//! Synergy and stacking opportunities.
//!
//! For each synergy rule:
//! - neither member active: nothing
//! - one member active: suggest the other (priority 2), with a safety caution
//!   when the missing substance has an intake ceiling
//! - both active: report the synergy as realized (priority 1, no caution)

use crate::types::{
    OpportunityKind, OptimizationOpportunity, Substance, SubstanceLevel, SynergyRule,
};
use std::collections::{HashMap, HashSet};

pub const SUGGEST_PRIORITY: i32 = 2;
pub const REALIZED_PRIORITY: i32 = 1;
pub const STACKING_PRIORITY: i32 = 2;

/// Aggregate level above which repeated doses are reported as stacking
pub const STACKING_THRESHOLD_PERCENT: f64 = 100.0;

/// Synergy opportunities for the currently active substance ids, highest priority first
pub fn synergy_opportunities(
    rules: &[SynergyRule],
    active_ids: &HashSet<String>,
    substances: &HashMap<String, Substance>,
) -> Vec<OptimizationOpportunity> {
    let mut opportunities = Vec::new();

    for rule in rules {
        let has_a = active_ids.contains(&rule.substance_a);
        let has_b = active_ids.contains(&rule.substance_b);

        match (has_a, has_b) {
            (false, false) => {}
            (true, true) => {
                let a = name_of(substances, &rule.substance_a);
                let b = name_of(substances, &rule.substance_b);
                opportunities.push(OptimizationOpportunity {
                    kind: OpportunityKind::Synergy,
                    substance_ids: vec![rule.substance_a.clone(), rule.substance_b.clone()],
                    title: format!("Active synergy: {} + {}", a, b),
                    description: rule.suggestion.clone(),
                    priority: REALIZED_PRIORITY,
                    caution: None,
                    realized: true,
                });
            }
            (present_a, _) => {
                let (present, missing) = if present_a {
                    (&rule.substance_a, &rule.substance_b)
                } else {
                    (&rule.substance_b, &rule.substance_a)
                };
                let caution = substances
                    .get(missing)
                    .and_then(|s| s.safety_category.caution())
                    .map(str::to_string);

                opportunities.push(OptimizationOpportunity {
                    kind: OpportunityKind::Synergy,
                    substance_ids: vec![present.clone(), missing.clone()],
                    title: format!(
                        "Consider adding {} to {}",
                        name_of(substances, missing),
                        name_of(substances, present)
                    ),
                    description: rule.suggestion.clone(),
                    priority: SUGGEST_PRIORITY,
                    caution,
                    realized: false,
                });
            }
        }
    }

    sort_by_priority(&mut opportunities);
    opportunities
}

/// Stacking notices for substances pushed above 100% by more than one dose
pub fn stacking_opportunities(
    levels: &[SubstanceLevel],
    substances: &HashMap<String, Substance>,
) -> Vec<OptimizationOpportunity> {
    levels
        .iter()
        .filter(|l| l.dose_count > 1 && l.total_percent > STACKING_THRESHOLD_PERCENT)
        .map(|level| OptimizationOpportunity {
            kind: OpportunityKind::Stacking,
            substance_ids: vec![level.substance_id.clone()],
            title: format!("{} doses of {} are stacking", level.dose_count, level.substance_name),
            description: format!(
                "Overlapping doses put {} at {:.0}% of a single dose's peak",
                level.substance_name, level.total_percent
            ),
            priority: STACKING_PRIORITY,
            caution: substances
                .get(&level.substance_id)
                .and_then(|s| s.safety_category.caution())
                .map(str::to_string),
            realized: false,
        })
        .collect()
}

/// Number of synergies whose members are both active
pub fn realized_synergy_count(opportunities: &[OptimizationOpportunity]) -> usize {
    opportunities
        .iter()
        .filter(|o| o.kind == OpportunityKind::Synergy && o.realized)
        .count()
}

/// Highest priority first; stable, so rule order breaks ties
pub fn sort_by_priority(opportunities: &mut [OptimizationOpportunity]) {
    opportunities.sort_by(|a, b| b.priority.cmp(&a.priority));
}

fn name_of<'a>(substances: &'a HashMap<String, Substance>, id: &'a str) -> &'a str {
    substances.get(id).map(|s| s.name.as_str()).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyCategory;

    fn substance(id: &str, category: SafetyCategory) -> (String, Substance) {
        (
            id.to_string(),
            Substance {
                id: id.into(),
                name: id.replace('_', " "),
                aliases: vec![],
                peak_minutes: None,
                half_life_minutes: None,
                bioavailability_percent: None,
                safety_category: category,
            },
        )
    }

    fn substances() -> HashMap<String, Substance> {
        [
            substance("iron", SafetyCategory::Iron),
            substance("vitamin_c", SafetyCategory::General),
            substance("vitamin_a", SafetyCategory::VitaminA),
            substance("zinc", SafetyCategory::Zinc),
            substance("selenium", SafetyCategory::Selenium),
            substance("vitamin_e", SafetyCategory::General),
        ]
        .into_iter()
        .collect()
    }

    fn rules() -> Vec<SynergyRule> {
        vec![
            SynergyRule {
                substance_a: "iron".into(),
                substance_b: "vitamin_c".into(),
                suggestion: "C helps iron".into(),
            },
            SynergyRule {
                substance_a: "vitamin_a".into(),
                substance_b: "zinc".into(),
                suggestion: "Zinc mobilises A".into(),
            },
            SynergyRule {
                substance_a: "selenium".into(),
                substance_b: "vitamin_e".into(),
                suggestion: "Antioxidant pair".into(),
            },
        ]
    }

    fn active(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_nothing_active_nothing_suggested() {
        assert!(synergy_opportunities(&rules(), &active(&[]), &substances()).is_empty());
    }

    #[test]
    fn test_missing_member_carries_its_caution() {
        let found = synergy_opportunities(&rules(), &active(&["vitamin_c"]), &substances());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].priority, SUGGEST_PRIORITY);
        assert_eq!(found[0].substance_ids, vec!["vitamin_c".to_string(), "iron".to_string()]);
        assert_eq!(
            found[0].caution.as_deref(),
            SafetyCategory::Iron.caution()
        );
        assert!(!found[0].realized);
    }

    #[test]
    fn test_missing_general_substance_has_no_caution() {
        let found = synergy_opportunities(&rules(), &active(&["iron"]), &substances());
        assert_eq!(found.len(), 1);
        assert!(found[0].caution.is_none());
        assert_eq!(found[0].title, "Consider adding vitamin c to iron");
    }

    #[test]
    fn test_cautions_differ_by_category() {
        let found = synergy_opportunities(&rules(), &active(&["zinc", "vitamin_e"]), &substances());
        assert_eq!(found.len(), 2);
        let cautions: Vec<_> = found.iter().map(|o| o.caution.clone().unwrap()).collect();
        assert_ne!(cautions[0], cautions[1]);
    }

    #[test]
    fn test_realized_synergy_sorted_after_suggestions() {
        let found = synergy_opportunities(
            &rules(),
            &active(&["iron", "vitamin_c", "selenium"]),
            &substances(),
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].priority, SUGGEST_PRIORITY);
        assert_eq!(found[1].priority, REALIZED_PRIORITY);
        assert!(found[1].realized);
        assert!(found[1].caution.is_none());
        assert_eq!(realized_synergy_count(&found), 1);
    }

    #[test]
    fn test_stacking_requires_multiple_doses_above_peak() {
        let levels = vec![
            SubstanceLevel {
                substance_id: "iron".into(),
                substance_name: "Iron".into(),
                total_percent: 140.0,
                dose_count: 2,
            },
            SubstanceLevel {
                substance_id: "vitamin_c".into(),
                substance_name: "Vitamin C".into(),
                total_percent: 100.0,
                dose_count: 1,
            },
            SubstanceLevel {
                substance_id: "zinc".into(),
                substance_name: "Zinc".into(),
                total_percent: 90.0,
                dose_count: 3,
            },
        ];
        let found = stacking_opportunities(&levels, &substances());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, OpportunityKind::Stacking);
        assert!(found[0].caution.is_some());
        assert_eq!(realized_synergy_count(&found), 0);
    }
}
