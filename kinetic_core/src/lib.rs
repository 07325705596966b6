#![forbid(unsafe_code)]

//! Core domain model and engines for the Kinetic dose-state system.
//!
//! This crate provides:
//! - Domain types (substances, doses, rules, biological state)
//! - Reference snapshots and the built-in catalog
//! - Concentration model and active-state aggregation
//! - Exclusion zones, synergy and enzyme pathway engines
//! - Bio-score and biomarker calibration
//! - Persistence (dose and calibration logs)

pub mod types;
pub mod error;
pub mod safety;
pub mod reference;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod concentration;
pub mod active_state;
pub mod exclusion;
pub mod synergy;
pub mod enzyme;
pub mod bio_score;
pub mod calibration;
pub mod dose_log;
pub mod calibration_log;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use safety::SafetyCategory;
pub use reference::{ReferenceData, ReferenceSnapshot};
pub use catalog::{build_default_snapshot, default_reference};
pub use config::EngineConfig;
pub use active_state::{Adjustments, TimelineOptions, TimelinePoint};
pub use enzyme::{PathwayInteraction, Significance};
pub use calibration::{Biomarker, CalibrationRequest, CalibrationResult};
pub use dose_log::{load_doses, DoseSink, JsonlDoseSink};
pub use calibration_log::{latest_adjustments, read_calibrations, CalibrationSink, JsonlCalibrationSink};
pub use engine::{
    active_pathway_interactions, calibrate_from_measurement, compute_state, compute_timeline,
    StateInputs,
};
