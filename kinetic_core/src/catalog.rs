//! Built-in reference snapshot.
//!
//! A small catalog of common supplements with their PK parameters, timing and
//! synergy rules, and enzyme pathway rows. Deployments normally load their own
//! snapshot from the catalog service; this one backs the CLI defaults and tests.

use crate::reference::{ReferenceData, ReferenceSnapshot};
use crate::safety::SafetyCategory;
use crate::types::*;
use once_cell::sync::Lazy;

/// Version tag of the built-in snapshot
pub const DEFAULT_SNAPSHOT_VERSION: &str = "builtin-2024.1";

/// Cached default reference data - built and resolved once
static DEFAULT_REFERENCE: Lazy<ReferenceData> = Lazy::new(|| {
    ReferenceData::from_snapshot(build_default_snapshot())
        .unwrap_or_else(|e| panic!("built-in reference snapshot is invalid: {}", e))
});

/// Get a reference to the cached, resolved default reference data
pub fn default_reference() -> &'static ReferenceData {
    &DEFAULT_REFERENCE
}

fn substance(
    id: &str,
    name: &str,
    aliases: &[&str],
    peak_minutes: Option<f64>,
    half_life_minutes: Option<f64>,
    bioavailability_percent: Option<f64>,
    safety_category: SafetyCategory,
) -> Substance {
    Substance {
        id: id.into(),
        name: name.into(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        peak_minutes,
        half_life_minutes,
        bioavailability_percent,
        safety_category,
    }
}

fn timing(
    source: &str,
    target: &str,
    hours: f64,
    severity: Severity,
    reason: &str,
    citation: Option<&str>,
) -> TimingRule {
    TimingRule {
        source_id: source.into(),
        target_id: target.into(),
        min_hours_apart: hours,
        severity,
        reason: reason.into(),
        citation: citation.map(Into::into),
    }
}

fn synergy(a: &str, b: &str, suggestion: &str) -> SynergyRule {
    SynergyRule {
        substance_a: a.into(),
        substance_b: b.into(),
        suggestion: suggestion.into(),
    }
}

fn pathway(name: &str, enzyme: Enzyme, role: EnzymeRole, strength: Strength) -> EnzymeEntry {
    EnzymeEntry {
        substance: name.into(),
        enzyme,
        role,
        strength,
    }
}

/// Builds the built-in snapshot
///
/// **Note**: prefer `default_reference()` which returns a cached, resolved copy.
/// This function is retained for tests and for callers that want to extend it.
pub fn build_default_snapshot() -> ReferenceSnapshot {
    use SafetyCategory as S;

    // ========================================================================
    // Substances
    // ========================================================================

    let substances = vec![
        substance("caffeine", "Caffeine", &["1,3,7-trimethylxanthine"], Some(45.0), Some(300.0), Some(99.0), S::General),
        substance("l_theanine", "L-Theanine", &["theanine"], Some(50.0), Some(75.0), None, S::General),
        substance("melatonin", "Melatonin", &[], Some(50.0), Some(45.0), Some(15.0), S::General),
        substance("iron", "Iron Bisglycinate", &["iron", "ferrous bisglycinate"], Some(120.0), Some(480.0), Some(20.0), S::Iron),
        substance("calcium", "Calcium Citrate", &["calcium"], Some(240.0), Some(360.0), Some(30.0), S::General),
        substance("vitamin_c", "Vitamin C", &["ascorbic acid"], Some(180.0), Some(600.0), Some(80.0), S::General),
        substance("vitamin_d3", "Vitamin D3", &["cholecalciferol", "vitamin d"], Some(720.0), None, None, S::VitaminD),
        substance("vitamin_k2", "Vitamin K2 (MK-7)", &["vitamin k2", "mk-7"], Some(360.0), Some(4320.0), None, S::General),
        substance("magnesium", "Magnesium Glycinate", &["magnesium"], None, None, None, S::General),
        substance("zinc", "Zinc Picolinate", &["zinc"], Some(150.0), Some(720.0), Some(30.0), S::Zinc),
        substance("copper", "Copper Bisglycinate", &["copper"], Some(120.0), Some(1440.0), None, S::HardLimit),
        substance("selenium", "Selenium", &["selenomethionine"], Some(180.0), Some(14400.0), Some(90.0), S::Selenium),
        substance("vitamin_a", "Vitamin A (Retinol)", &["vitamin a", "retinol"], Some(240.0), Some(2880.0), None, S::VitaminA),
        substance("vitamin_e", "Vitamin E", &["alpha-tocopherol"], Some(360.0), Some(2880.0), None, S::General),
        substance("curcumin", "Curcumin", &["turmeric extract"], Some(60.0), Some(360.0), Some(1.0), S::General),
        substance("piperine", "Piperine", &["black pepper extract"], Some(60.0), Some(480.0), None, S::General),
        substance("st_johns_wort", "St. John's Wort", &["hypericum"], Some(300.0), Some(1440.0), None, S::General),
        substance("five_htp", "5-HTP", &["5-hydroxytryptophan"], Some(90.0), Some(240.0), Some(70.0), S::General),
        substance("berberine", "Berberine", &[], Some(240.0), Some(300.0), Some(1.0), S::General),
        substance("grapefruit", "Grapefruit Juice", &["grapefruit"], Some(60.0), Some(720.0), None, S::General),
        substance("fish_oil", "Fish Oil (EPA/DHA)", &["fish oil", "omega-3"], Some(300.0), Some(2880.0), None, S::General),
        substance("cbd", "Cannabidiol", &["cbd"], Some(120.0), Some(1080.0), Some(6.0), S::General),
    ];

    // ========================================================================
    // Timing Rules
    // ========================================================================

    let timing_rules = vec![
        timing("iron", "calcium", 2.0, Severity::Medium,
            "Calcium competes with non-heme iron for uptake in the duodenum",
            Some("Hallberg et al., Am J Clin Nutr 1991")),
        timing("calcium", "iron", 2.0, Severity::Medium,
            "Calcium competes with non-heme iron for uptake in the duodenum",
            Some("Hallberg et al., Am J Clin Nutr 1991")),
        timing("iron", "zinc", 2.0, Severity::Low,
            "Iron and zinc share the DMT1 transporter", None),
        timing("zinc", "copper", 2.0, Severity::Low,
            "Zinc induces intestinal metallothionein, which traps copper", None),
        timing("magnesium", "zinc", 2.0, Severity::Low,
            "High-dose magnesium reduces zinc absorption", None),
        timing("caffeine", "melatonin", 6.0, Severity::Medium,
            "Caffeine delays sleep onset and competes with melatonin for CYP1A2 clearance",
            Some("Hartter et al., J Clin Psychopharmacol 2003")),
        timing("st_johns_wort", "five_htp", 24.0, Severity::Critical,
            "Stacked serotonergic activity raises serotonin syndrome risk", None),
        timing("five_htp", "st_johns_wort", 24.0, Severity::Critical,
            "Stacked serotonergic activity raises serotonin syndrome risk", None),
    ];

    // ========================================================================
    // Synergy Rules
    // ========================================================================

    let synergy_rules = vec![
        synergy("vitamin_d3", "vitamin_k2", "K2 directs the calcium mobilised by D3 toward bone"),
        synergy("iron", "vitamin_c", "Vitamin C keeps non-heme iron in its absorbable ferrous form"),
        synergy("caffeine", "l_theanine", "L-theanine smooths caffeine's jitter while keeping alertness"),
        synergy("curcumin", "piperine", "Piperine slows curcumin glucuronidation, raising its bioavailability"),
        synergy("selenium", "vitamin_e", "Selenium and vitamin E recycle each other as antioxidants"),
        synergy("vitamin_a", "zinc", "Zinc is needed to mobilise vitamin A from liver stores"),
        synergy("fish_oil", "vitamin_d3", "Fat from fish oil improves vitamin D absorption"),
    ];

    // ========================================================================
    // Enzyme Pathways
    // ========================================================================

    use EnzymeRole::{Inducer, Inhibitor, Substrate};
    let enzyme_entries = vec![
        pathway("Caffeine", Enzyme::Cyp1a2, Substrate, Strength::Strong),
        pathway("Melatonin", Enzyme::Cyp1a2, Substrate, Strength::Strong),
        pathway("Vitamin D3", Enzyme::Cyp3a4, Substrate, Strength::Moderate),
        pathway("Curcumin", Enzyme::Ugt1a1, Substrate, Strength::Strong),
        pathway("Curcumin", Enzyme::Cyp3a4, Inhibitor, Strength::Moderate),
        pathway("Curcumin", Enzyme::Cyp2c9, Inhibitor, Strength::Weak),
        pathway("Piperine", Enzyme::Cyp3a4, Inhibitor, Strength::Moderate),
        pathway("Piperine", Enzyme::Ugt1a1, Inhibitor, Strength::Moderate),
        pathway("St. John's Wort", Enzyme::Cyp3a4, Inducer, Strength::Strong),
        pathway("St. John's Wort", Enzyme::Cyp2c19, Inducer, Strength::Moderate),
        pathway("St. John's Wort", Enzyme::Cyp1a2, Inducer, Strength::Weak),
        pathway("Grapefruit Juice", Enzyme::Cyp3a4, Inhibitor, Strength::Strong),
        pathway("Berberine", Enzyme::Cyp2d6, Inhibitor, Strength::Moderate),
        pathway("Berberine", Enzyme::Cyp2c9, Inhibitor, Strength::Moderate),
        pathway("Berberine", Enzyme::Cyp3a4, Inhibitor, Strength::Weak),
        pathway("Cannabidiol", Enzyme::Cyp2c19, Inhibitor, Strength::Strong),
        pathway("Cannabidiol", Enzyme::Cyp3a4, Inhibitor, Strength::Moderate),
        pathway("Cannabidiol", Enzyme::Cyp3a4, Substrate, Strength::Moderate),
        pathway("Cannabidiol", Enzyme::Cyp2c19, Substrate, Strength::Moderate),
    ];

    ReferenceSnapshot {
        version: DEFAULT_SNAPSHOT_VERSION.into(),
        substances,
        timing_rules,
        synergy_rules,
        enzyme_entries,
    }
}
