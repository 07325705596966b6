//! Core domain types for the Kinetic system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Substances and logged dose events (read-only inputs)
//! - Timing, synergy and enzyme-pathway rules (reference data)
//! - Derived, per-request results (active compounds, exclusion zones,
//!   optimizations, the biological state snapshot)

use crate::safety::SafetyCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Substance and Dose Types
// ============================================================================

/// A substance from the reference catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Substance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Time to maximum concentration (minutes)
    pub peak_minutes: Option<f64>,
    /// Elimination half-life (minutes)
    pub half_life_minutes: Option<f64>,
    pub bioavailability_percent: Option<f64>,
    #[serde(default)]
    pub safety_category: SafetyCategory,
}

/// Unit attached to a logged dose
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DoseUnit {
    G,
    Mg,
    Mcg,
    Iu,
    Ml,
    /// Capsules, tablets, servings
    Unit,
}

impl DoseUnit {
    /// Milligrams per one of this unit, for mass units only
    fn mg_factor(&self) -> Option<f64> {
        match self {
            DoseUnit::G => Some(1000.0),
            DoseUnit::Mg => Some(1.0),
            DoseUnit::Mcg => Some(0.001),
            DoseUnit::Iu | DoseUnit::Ml | DoseUnit::Unit => None,
        }
    }

    /// Convert `amount` of this unit into `target`.
    ///
    /// Identical units always convert; mass units convert between each other.
    /// Anything else is incompatible and yields `None`.
    pub fn convert(&self, amount: f64, target: DoseUnit) -> Option<f64> {
        if *self == target {
            return Some(amount);
        }
        match (self.mg_factor(), target.mg_factor()) {
            (Some(from), Some(to)) => Some(amount * from / to),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnit::G => "g",
            DoseUnit::Mg => "mg",
            DoseUnit::Mcg => "mcg",
            DoseUnit::Iu => "iu",
            DoseUnit::Ml => "ml",
            DoseUnit::Unit => "unit",
        }
    }
}

impl std::str::FromStr for DoseUnit {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "g" => Ok(DoseUnit::G),
            "mg" => Ok(DoseUnit::Mg),
            "mcg" | "µg" | "ug" => Ok(DoseUnit::Mcg),
            "iu" => Ok(DoseUnit::Iu),
            "ml" => Ok(DoseUnit::Ml),
            "unit" | "capsule" | "tablet" | "serving" => Ok(DoseUnit::Unit),
            other => Err(crate::Error::Other(format!("Unknown dose unit: {}", other))),
        }
    }
}

/// A single logged intake
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoseEvent {
    pub id: Uuid,
    pub substance_id: String,
    pub amount: f64,
    pub unit: DoseUnit,
    pub logged_at: DateTime<Utc>,
}

// ============================================================================
// Rule Types
// ============================================================================

/// Severity of a timing conflict
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

impl Severity {
    /// Points removed from the bio-score for one active zone of this severity
    pub fn score_penalty(&self) -> i32 {
        match self {
            Severity::Critical => 50,
            Severity::Medium => 25,
            Severity::Low => 15,
        }
    }
}

/// Directional minimum-separation rule: logging `source` opens a window
/// during which `target` is flagged
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingRule {
    pub source_id: String,
    pub target_id: String,
    pub min_hours_apart: f64,
    pub severity: Severity,
    pub reason: String,
    pub citation: Option<String>,
}

/// Unordered pair of substances that work better together
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynergyRule {
    pub substance_a: String,
    pub substance_b: String,
    pub suggestion: String,
}

// ============================================================================
// Enzyme Pathway Types
// ============================================================================

/// Drug-metabolising enzymes tracked by the pathway table
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Enzyme {
    Cyp1a2,
    Cyp2c9,
    Cyp2c19,
    Cyp2d6,
    Cyp3a4,
    Ugt1a1,
}

impl Enzyme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Enzyme::Cyp1a2 => "CYP1A2",
            Enzyme::Cyp2c9 => "CYP2C9",
            Enzyme::Cyp2c19 => "CYP2C19",
            Enzyme::Cyp2d6 => "CYP2D6",
            Enzyme::Cyp3a4 => "CYP3A4",
            Enzyme::Ugt1a1 => "UGT1A1",
        }
    }
}

impl fmt::Display for Enzyme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a substance does to (or with) an enzyme
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EnzymeRole {
    Substrate,
    Inhibitor,
    Inducer,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Weak => "weak",
            Strength::Moderate => "moderate",
            Strength::Strong => "strong",
        }
    }
}

/// One row of the enzyme-pathway reference table, keyed by free-text substance name
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnzymeEntry {
    pub substance: String,
    pub enzyme: Enzyme,
    pub role: EnzymeRole,
    pub strength: Strength,
}

// ============================================================================
// Derived Types
// ============================================================================

/// Lifecycle phase of a single dose
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Absorbing,
    Peak,
    Eliminating,
    Cleared,
}

/// Where the PK parameters used for a computation came from
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// Both peak time and half-life came from the catalog
    Measured,
    /// One of the two was substituted with a default
    Partial,
    /// Both were substituted with defaults
    Default,
}

/// A compound currently present, derived from one dose event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveCompound {
    pub dose_id: Uuid,
    pub substance_id: String,
    pub substance_name: String,
    pub concentration_percent: f64,
    pub phase: Phase,
    pub minutes_since_dose: f64,
    pub peak_minutes: f64,
    pub half_life_minutes: f64,
    pub parameter_source: ParameterSource,
}

/// Summed concentration of every dose of one substance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubstanceLevel {
    pub substance_id: String,
    pub substance_name: String,
    pub total_percent: f64,
    pub dose_count: usize,
}

/// A timing conflict currently in effect
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExclusionZone {
    pub source_id: String,
    pub source_name: String,
    pub target_id: String,
    pub target_name: String,
    pub ends_at: DateTime<Utc>,
    pub minutes_remaining: i64,
    pub severity: Severity,
    pub reason: String,
    pub citation: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityKind {
    Synergy,
    Timing,
    Stacking,
}

/// A suggestion surfaced alongside the state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizationOpportunity {
    pub kind: OpportunityKind,
    pub substance_ids: Vec<String>,
    pub title: String,
    pub description: String,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caution: Option<String>,
    /// True for a synergy whose members are both already active
    #[serde(default)]
    pub realized: bool,
}

/// The full simulated physiological snapshot for one instant
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiologicalState {
    pub active_compounds: Vec<ActiveCompound>,
    pub substance_levels: Vec<SubstanceLevel>,
    pub exclusion_zones: Vec<ExclusionZone>,
    pub optimizations: Vec<OptimizationOpportunity>,
    pub bio_score: u8,
    pub computed_at: DateTime<Utc>,
}

/// Evidence strength behind a calibration
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Caller-supplied personalisation applied on top of catalog PK parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PkAdjustment {
    /// Multiplier on achieved concentration
    pub bioavailability_factor: f64,
    /// Multiplier on the elimination rate constant
    pub clearance_factor: f64,
}

impl Default for PkAdjustment {
    fn default() -> Self {
        Self {
            bioavailability_factor: 1.0,
            clearance_factor: 1.0,
        }
    }
}
