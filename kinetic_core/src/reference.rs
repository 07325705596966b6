//! Reference data snapshots.
//!
//! Substances, timing rules, synergy rules and the enzyme pathway table are
//! loaded together as one versioned [`ReferenceSnapshot`]. Turning a snapshot
//! into [`ReferenceData`] validates it and performs the name-to-id join for
//! the enzyme table once, so the engines only ever see resolved ids.

use crate::enzyme::EnzymeTable;
use crate::types::{EnzymeEntry, Substance, SynergyRule, TimingRule};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Longest separation a timing rule may ask for (one year)
pub const MAX_RULE_HOURS: f64 = 24.0 * 365.0;

/// Raw reference tables as supplied by the catalog owner
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    pub version: String,
    pub substances: Vec<Substance>,
    #[serde(default)]
    pub timing_rules: Vec<TimingRule>,
    #[serde(default)]
    pub synergy_rules: Vec<SynergyRule>,
    #[serde(default)]
    pub enzyme_entries: Vec<EnzymeEntry>,
}

impl ReferenceSnapshot {
    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: ReferenceSnapshot = serde_json::from_str(&contents)?;
        tracing::info!(
            "Loaded reference snapshot '{}' from {:?} ({} substances)",
            snapshot.version,
            path,
            snapshot.substances.len()
        );
        Ok(snapshot)
    }

    /// Validate the snapshot for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut ids = HashSet::new();

        for substance in &self.substances {
            if substance.id.is_empty() {
                errors.push("Substance has empty ID".to_string());
            }
            if !ids.insert(substance.id.as_str()) {
                errors.push(format!("Duplicate substance ID '{}'", substance.id));
            }
            if substance.name.is_empty() {
                errors.push(format!("Substance '{}' has empty name", substance.id));
            }
            if let Some(f) = substance.bioavailability_percent {
                if !(0.0..=100.0).contains(&f) {
                    errors.push(format!(
                        "Substance '{}': bioavailability {} outside 0-100",
                        substance.id, f
                    ));
                }
            }
        }

        // Names and aliases must point at exactly one substance
        let mut owners: HashMap<String, &str> = HashMap::new();
        for substance in &self.substances {
            let keys = std::iter::once(&substance.name).chain(substance.aliases.iter());
            for key in keys {
                let key = key.trim().to_lowercase();
                if let Some(owner) = owners.insert(key.clone(), substance.id.as_str()) {
                    if owner != substance.id {
                        errors.push(format!(
                            "Name '{}' is shared by '{}' and '{}'",
                            key, owner, substance.id
                        ));
                    }
                }
            }
        }

        for rule in &self.timing_rules {
            for id in [&rule.source_id, &rule.target_id] {
                if !ids.contains(id.as_str()) {
                    errors.push(format!(
                        "Timing rule {} -> {} references non-existent substance '{}'",
                        rule.source_id, rule.target_id, id
                    ));
                }
            }
            if rule.source_id == rule.target_id {
                errors.push(format!(
                    "Timing rule on '{}' has the same source and target",
                    rule.source_id
                ));
            }
            if !rule.min_hours_apart.is_finite() || rule.min_hours_apart <= 0.0 {
                errors.push(format!(
                    "Timing rule {} -> {}: min_hours_apart {} must be positive",
                    rule.source_id, rule.target_id, rule.min_hours_apart
                ));
            } else if rule.min_hours_apart > MAX_RULE_HOURS {
                errors.push(format!(
                    "Timing rule {} -> {}: min_hours_apart {} exceeds {} hours",
                    rule.source_id, rule.target_id, rule.min_hours_apart, MAX_RULE_HOURS
                ));
            }
        }

        for rule in &self.synergy_rules {
            for id in [&rule.substance_a, &rule.substance_b] {
                if !ids.contains(id.as_str()) {
                    errors.push(format!(
                        "Synergy rule {} + {} references non-existent substance '{}'",
                        rule.substance_a, rule.substance_b, id
                    ));
                }
            }
            if rule.substance_a == rule.substance_b {
                errors.push(format!(
                    "Synergy rule pairs '{}' with itself",
                    rule.substance_a
                ));
            }
        }

        errors
    }
}

/// Validated reference data with the enzyme table resolved to substance ids
#[derive(Clone, Debug)]
pub struct ReferenceData {
    pub version: String,
    pub substances: HashMap<String, Substance>,
    pub timing_rules: Vec<TimingRule>,
    pub synergy_rules: Vec<SynergyRule>,
    pub enzymes: EnzymeTable,
}

impl ReferenceData {
    /// Validate a snapshot and resolve its enzyme table
    pub fn from_snapshot(snapshot: ReferenceSnapshot) -> Result<Self> {
        let errors = snapshot.validate();
        if !errors.is_empty() {
            return Err(Error::Reference(errors.join("; ")));
        }

        let enzymes = EnzymeTable::resolve(&snapshot.enzyme_entries, &snapshot.substances);
        let substances = snapshot
            .substances
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        Ok(Self {
            version: snapshot.version,
            substances,
            timing_rules: snapshot.timing_rules,
            synergy_rules: snapshot.synergy_rules,
            enzymes,
        })
    }

    /// Load, validate and resolve a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_snapshot(ReferenceSnapshot::load(path)?)
    }

    pub fn substance(&self, id: &str) -> Option<&Substance> {
        self.substances.get(id)
    }

    /// Find a substance by exact (case-insensitive) id, name or alias
    pub fn find_by_name(&self, name: &str) -> Option<&Substance> {
        self.enzymes
            .resolve_name(name)
            .and_then(|id| self.substances.get(id))
    }

    /// Resolve a list of names to ids, reporting the first unknown one
    pub fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
        names
            .iter()
            .map(|name| {
                self.find_by_name(name.as_ref())
                    .map(|s| s.id.clone())
                    .ok_or_else(|| Error::UnknownSubstance(name.as_ref().to_string()))
            })
            .collect()
    }
}
