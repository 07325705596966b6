//! Enzyme pathway interactions.
//!
//! The pathway table lists, per substance, which enzymes it is metabolised by
//! (substrate) and which it inhibits or induces. Two substances interact when
//! one is a substrate of an enzyme the other modulates:
//!
//! - substrate + inhibitor on the same enzyme: levels of the substrate may rise
//! - substrate + inducer on the same enzyme: levels of the substrate may fall
//!
//! Two substrates of the same enzyme compete, but that is not reported here.
//!
//! Table rows reference substances by free-text name. They are joined to
//! catalog ids once, in [`EnzymeTable::resolve`], using exact case-insensitive
//! matching on id, name or alias. Rows that do not resolve are kept aside in
//! [`EnzymeTable::unresolved`] rather than matched loosely.

use crate::types::{Enzyme, EnzymeEntry, EnzymeRole, Strength, Substance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Expected direction of the change in the substrate's exposure
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LevelEffect {
    MayRaise,
    MayLower,
}

/// Clinical weight of an interaction, from the modulator's strength
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Minor,
    Moderate,
    Major,
}

impl From<Strength> for Significance {
    fn from(strength: Strength) -> Self {
        match strength {
            Strength::Strong => Significance::Major,
            Strength::Moderate => Significance::Moderate,
            Strength::Weak => Significance::Minor,
        }
    }
}

/// One substrate/modulator interaction on a shared enzyme
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PathwayInteraction {
    pub substrate_id: String,
    pub substrate_name: String,
    pub modulator_id: String,
    pub modulator_name: String,
    pub enzyme: Enzyme,
    pub modulator_role: EnzymeRole,
    pub strength: Strength,
    pub effect: LevelEffect,
    pub description: String,
}

impl PathwayInteraction {
    pub fn significance(&self) -> Significance {
        self.strength.into()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ResolvedEntry {
    enzyme: Enzyme,
    role: EnzymeRole,
    strength: Strength,
}

/// Enzyme pathway table joined to catalog substance ids
#[derive(Clone, Debug, Default)]
pub struct EnzymeTable {
    entries: HashMap<String, Vec<ResolvedEntry>>,
    names: HashMap<String, String>,
    display_names: HashMap<String, String>,
    unresolved: Vec<String>,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl EnzymeTable {
    /// Join free-text table rows to substance ids
    pub fn resolve(rows: &[EnzymeEntry], substances: &[Substance]) -> Self {
        let mut names = HashMap::new();
        let mut display_names = HashMap::new();

        for substance in substances {
            display_names.insert(substance.id.clone(), substance.name.clone());
            let keys = std::iter::once(&substance.id)
                .chain(std::iter::once(&substance.name))
                .chain(substance.aliases.iter());
            for key in keys {
                if let Some(previous) = names.insert(name_key(key), substance.id.clone()) {
                    if previous != substance.id {
                        tracing::warn!(
                            "Name '{}' refers to both '{}' and '{}'; keeping '{}'",
                            key,
                            previous,
                            substance.id,
                            substance.id
                        );
                    }
                }
            }
        }

        let mut entries: HashMap<String, Vec<ResolvedEntry>> = HashMap::new();
        let mut unresolved = Vec::new();

        for row in rows {
            match names.get(&name_key(&row.substance)) {
                Some(id) => {
                    let resolved = ResolvedEntry {
                        enzyme: row.enzyme,
                        role: row.role,
                        strength: row.strength,
                    };
                    let list = entries.entry(id.clone()).or_default();
                    if !list.contains(&resolved) {
                        list.push(resolved);
                    }
                }
                None => unresolved.push(row.substance.clone()),
            }
        }

        if !unresolved.is_empty() {
            tracing::warn!(
                "{} enzyme pathway rows did not resolve to a catalog substance: {:?}",
                unresolved.len(),
                unresolved
            );
        }

        tracing::debug!(
            "Resolved enzyme pathway table for {} substances",
            entries.len()
        );

        Self {
            entries,
            names,
            display_names,
            unresolved,
        }
    }

    /// Table rows whose substance name matched nothing in the catalog
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Number of substances with at least one pathway row
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a substance id by exact (case-insensitive) id, name or alias
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        self.names.get(&name_key(name)).map(String::as_str)
    }

    /// Pathway interactions among substances given by name
    pub fn interactions_for_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<PathwayInteraction> {
        let ids: Vec<&str> = names
            .iter()
            .filter_map(|name| {
                let resolved = self.resolve_name(name.as_ref());
                if resolved.is_none() {
                    tracing::debug!("No catalog substance named '{}'", name.as_ref());
                }
                resolved
            })
            .collect();
        self.interactions(&ids)
    }

    /// Pathway interactions among the given substance ids.
    ///
    /// Each unordered pair is checked in both directions. The result does not
    /// depend on argument order: it is deduplicated by (substrate, modulator,
    /// enzyme, modulator role) and sorted by significance, then by ids.
    pub fn interactions<S: AsRef<str>>(&self, ids: &[S]) -> Vec<PathwayInteraction> {
        let unique: BTreeSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let unique: Vec<&str> = unique.into_iter().collect();

        let mut found: BTreeMap<(String, String, Enzyme, EnzymeRole), PathwayInteraction> =
            BTreeMap::new();

        for (i, a) in unique.iter().enumerate() {
            for b in &unique[i + 1..] {
                for interaction in self
                    .directed_interactions(a, b)
                    .into_iter()
                    .chain(self.directed_interactions(b, a))
                {
                    let key = (
                        interaction.substrate_id.clone(),
                        interaction.modulator_id.clone(),
                        interaction.enzyme,
                        interaction.modulator_role,
                    );
                    found.entry(key).or_insert(interaction);
                }
            }
        }

        let mut interactions: Vec<PathwayInteraction> = found.into_values().collect();
        // Stable sort keeps the key order among equal significance
        interactions.sort_by(|a, b| b.significance().cmp(&a.significance()));

        tracing::debug!(
            "Found {} pathway interactions among {} substances",
            interactions.len(),
            unique.len()
        );

        interactions
    }

    /// `substrate_id` metabolised by an enzyme that `modulator_id` inhibits or induces
    fn directed_interactions(&self, substrate_id: &str, modulator_id: &str) -> Vec<PathwayInteraction> {
        let (Some(substrate_rows), Some(modulator_rows)) =
            (self.entries.get(substrate_id), self.entries.get(modulator_id))
        else {
            return Vec::new();
        };

        let substrate_name = self.display_name(substrate_id);
        let modulator_name = self.display_name(modulator_id);

        let mut interactions = Vec::new();
        for substrate in substrate_rows.iter().filter(|e| e.role == EnzymeRole::Substrate) {
            for modulator in modulator_rows.iter().filter(|e| e.enzyme == substrate.enzyme) {
                let (effect, verb, direction) = match modulator.role {
                    EnzymeRole::Inhibitor => (LevelEffect::MayRaise, "inhibits", "raise"),
                    EnzymeRole::Inducer => (LevelEffect::MayLower, "induces", "lower"),
                    EnzymeRole::Substrate => continue,
                };

                interactions.push(PathwayInteraction {
                    substrate_id: substrate_id.to_string(),
                    substrate_name: substrate_name.to_string(),
                    modulator_id: modulator_id.to_string(),
                    modulator_name: modulator_name.to_string(),
                    enzyme: substrate.enzyme,
                    modulator_role: modulator.role,
                    strength: modulator.strength,
                    effect,
                    description: format!(
                        "{} {} {} ({}), may {} {} levels",
                        modulator_name,
                        verb,
                        substrate.enzyme,
                        modulator.strength.as_str(),
                        direction,
                        substrate_name
                    ),
                });
            }
        }
        interactions
    }

    fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.display_names.get(id).map(String::as_str).unwrap_or(id)
    }
}
