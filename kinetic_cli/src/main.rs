use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use kinetic_core::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "kinetic")]
#[command(about = "Pharmacokinetic dose-state engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Biological state at an instant (default)
    State {
        /// Evaluate at this RFC3339 instant instead of now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },

    /// Concentration series around an instant
    Timeline {
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,

        /// Minutes between points
        #[arg(long)]
        interval: Option<i64>,

        /// Hours before the instant
        #[arg(long)]
        lookback: Option<i64>,

        /// Hours after the instant
        #[arg(long)]
        projection: Option<i64>,
    },

    /// Enzyme pathway interactions between substances
    Interactions {
        /// Substance names, ids or aliases; defaults to what is active now
        names: Vec<String>,

        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },

    /// Log a dose
    Log {
        /// Substance name, id or alias
        substance: String,

        amount: f64,

        /// g, mg, mcg, iu, ml or unit
        unit: String,

        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },

    /// Calibrate absorption against a lab result
    Calibrate {
        /// vitamin_d, ferritin, omega3_index or rbc_magnesium
        #[arg(long)]
        biomarker: String,

        /// Measured value in the biomarker's lab unit
        #[arg(long)]
        value: f64,

        /// When the sample was taken
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,

        /// Compute without saving the result
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the reference snapshot in use
    CheckReference {
        /// Snapshot file to check instead of the data directory's
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC3339 timestamp: {}", e))
}

/// Files inside the data directory
struct DataPaths {
    reference: PathBuf,
    doses_jsonl: PathBuf,
    doses_csv: PathBuf,
    calibrations: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        Self {
            reference: data_dir.join("reference.json"),
            doses_jsonl: data_dir.join("doses.jsonl"),
            doses_csv: data_dir.join("doses.csv"),
            calibrations: data_dir.join("calibrations.jsonl"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    kinetic_core::logging::init_with_level(kinetic_core::logging::level_for_verbosity(
        cli.verbose,
    ));

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = DataPaths::new(&data_dir);

    match cli.command {
        Some(Commands::State { at }) => cmd_state(&paths, &config, at),
        Some(Commands::Timeline {
            at,
            interval,
            lookback,
            projection,
        }) => {
            let defaults = TimelineOptions::from(&config.timeline);
            let options = TimelineOptions {
                interval_minutes: interval.unwrap_or(defaults.interval_minutes),
                lookback_hours: lookback.unwrap_or(defaults.lookback_hours),
                projection_hours: projection.unwrap_or(defaults.projection_hours),
            };
            cmd_timeline(&paths, &config, at, options)
        }
        Some(Commands::Interactions { names, at }) => cmd_interactions(&paths, &config, names, at),
        Some(Commands::Log {
            substance,
            amount,
            unit,
            at,
        }) => cmd_log(&paths, &substance, amount, &unit, at),
        Some(Commands::Calibrate {
            biomarker,
            value,
            at,
            dry_run,
        }) => cmd_calibrate(&paths, &biomarker, value, at, dry_run),
        Some(Commands::CheckReference { file }) => {
            cmd_check_reference(file.as_deref().unwrap_or(paths.reference.as_path()))
        }
        None => {
            // Default to "state" command
            cmd_state(&paths, &config, None)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The data directory's snapshot when present, otherwise the built-in one
fn load_reference(paths: &DataPaths) -> Result<ReferenceData> {
    if paths.reference.exists() {
        let reference = ReferenceData::load(&paths.reference)?;
        tracing::info!(
            "Loaded reference '{}' from {}",
            reference.version,
            paths.reference.display()
        );
        Ok(reference)
    } else {
        tracing::debug!("No reference file, using built-in snapshot");
        Ok(default_reference().clone())
    }
}

/// Calibration adjustments known at `at`
fn load_adjustments(paths: &DataPaths, at: DateTime<Utc>) -> Result<Adjustments> {
    let results: Vec<CalibrationResult> = read_calibrations(&paths.calibrations)?
        .into_iter()
        .filter(|r| r.measured_at <= at)
        .collect();
    Ok(latest_adjustments(&results))
}

fn current_state(
    paths: &DataPaths,
    config: &EngineConfig,
    reference: &ReferenceData,
    at: DateTime<Utc>,
) -> Result<BiologicalState> {
    let doses = load_doses(
        &paths.doses_jsonl,
        &paths.doses_csv,
        at - Duration::hours(config.window.hours),
        at,
    )?;
    let adjustments = load_adjustments(paths, at)?;

    Ok(compute_state(
        &StateInputs {
            now: at,
            doses: &doses,
            reference,
            adjustments: &adjustments,
        },
        config,
    ))
}

fn cmd_state(paths: &DataPaths, config: &EngineConfig, at: Option<DateTime<Utc>>) -> Result<()> {
    let reference = load_reference(paths)?;
    let state = current_state(paths, config, &reference, at.unwrap_or_else(Utc::now))?;
    print_json(&state)
}

fn cmd_timeline(
    paths: &DataPaths,
    config: &EngineConfig,
    at: Option<DateTime<Utc>>,
    options: TimelineOptions,
) -> Result<()> {
    options.validate()?;
    let at = at.unwrap_or_else(Utc::now);
    let reference = load_reference(paths)?;

    // The first point still counts doses from one window before it
    let since = at - Duration::hours(options.lookback_hours + config.window.hours);
    let doses = load_doses(&paths.doses_jsonl, &paths.doses_csv, since, at)?;
    let adjustments = load_adjustments(paths, at)?;

    let points = compute_timeline(
        &StateInputs {
            now: at,
            doses: &doses,
            reference: &reference,
            adjustments: &adjustments,
        },
        config,
        Some(options),
    )?;
    print_json(&points)
}

fn cmd_interactions(
    paths: &DataPaths,
    config: &EngineConfig,
    names: Vec<String>,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    let reference = load_reference(paths)?;

    let interactions = if names.is_empty() {
        let state = current_state(paths, config, &reference, at.unwrap_or_else(Utc::now))?;
        active_pathway_interactions(&reference, &state)
    } else {
        let ids = reference.resolve_names(&names)?;
        reference.enzymes.interactions(&ids)
    };

    print_json(&interactions)
}

fn cmd_log(
    paths: &DataPaths,
    substance: &str,
    amount: f64,
    unit: &str,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::Other(format!("Dose amount must be positive, got {}", amount)));
    }

    let reference = load_reference(paths)?;
    let substance = reference
        .find_by_name(substance)
        .ok_or_else(|| Error::UnknownSubstance(substance.to_string()))?;
    let unit: DoseUnit = unit.parse()?;

    let dose = DoseEvent {
        id: uuid::Uuid::new_v4(),
        substance_id: substance.id.clone(),
        amount,
        unit,
        logged_at: at.unwrap_or_else(Utc::now),
    };

    let mut sink = JsonlDoseSink::new(&paths.doses_jsonl);
    sink.append(&dose)?;

    print_json(&dose)
}

fn cmd_calibrate(
    paths: &DataPaths,
    biomarker: &str,
    value: f64,
    at: Option<DateTime<Utc>>,
    dry_run: bool,
) -> Result<()> {
    let biomarker: Biomarker = biomarker.parse()?;
    let measured_at = at.unwrap_or_else(Utc::now);
    let reference = load_reference(paths)?;

    let since = measured_at - Duration::days(biomarker.profile().lookback_days);
    let doses = load_doses(&paths.doses_jsonl, &paths.doses_csv, since, measured_at)?;

    let result = calibrate_from_measurement(
        &reference,
        &doses,
        &CalibrationRequest {
            biomarker,
            measured_value: value,
            measured_at,
        },
    );

    if dry_run {
        tracing::info!("Dry run - not saving calibration");
    } else {
        let mut sink = JsonlCalibrationSink::new(&paths.calibrations);
        sink.append(&result)?;
    }

    print_json(&result)
}

#[derive(Serialize)]
struct ReferenceSummary<'a> {
    version: &'a str,
    substances: usize,
    timing_rules: usize,
    synergy_rules: usize,
    substances_with_pathways: usize,
    unresolved_enzyme_rows: &'a [String],
}

fn cmd_check_reference(path: &Path) -> Result<()> {
    let snapshot = if path.exists() {
        ReferenceSnapshot::load(path)?
    } else {
        tracing::info!("{} not found, checking built-in snapshot", path.display());
        build_default_snapshot()
    };

    let errors = snapshot.validate();
    if !errors.is_empty() {
        eprintln!("Reference validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Reference(format!(
            "{} problems in '{}'",
            errors.len(),
            snapshot.version
        )));
    }

    let reference = ReferenceData::from_snapshot(snapshot)?;
    print_json(&ReferenceSummary {
        version: &reference.version,
        substances: reference.substances.len(),
        timing_rules: reference.timing_rules.len(),
        synergy_rules: reference.synergy_rules.len(),
        substances_with_pathways: reference.enzymes.len(),
        unresolved_enzyme_rows: reference.enzymes.unresolved(),
    })
}
