//! `vaxtldr run` and `vaxtldr validate` — config-driven inference over a CSV.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use vaxtldr_inference::summary::{freshness, latest_snapshot, national_series};
use vaxtldr_inference::{InferenceConfig, InferenceError, InferenceResult};

use crate::exit_codes::{
    EXIT_ERROR, EXIT_RUN_INPUT, EXIT_RUN_INTEGRITY, EXIT_RUN_INVALID_CONFIG, EXIT_RUN_OUTPUT,
};
use crate::records::{read_observations, write_observations, write_series, write_snapshot};
use crate::CliError;

fn run_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn load_config(path: Option<&Path>) -> Result<InferenceConfig, CliError> {
    let Some(path) = path else {
        log::debug!("no config given, using defaults");
        return Ok(InferenceConfig::default());
    };
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        run_err(EXIT_RUN_INVALID_CONFIG, format!("cannot read config {}: {e}", path.display()))
    })?;
    InferenceConfig::from_toml(&config_str)
        .map_err(|e| run_err(EXIT_RUN_INVALID_CONFIG, e.to_string()))
}

pub fn cmd_run(
    input: PathBuf,
    config_path: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
    summary_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;

    let file = File::open(&input).map_err(|e| {
        run_err(EXIT_RUN_INPUT, format!("cannot read {}: {e}", input.display()))
    })?;
    let observations = read_observations(file).map_err(|e| {
        run_err(EXIT_RUN_INPUT, format!("{}: {e}", input.display()))
    })?;
    log::info!("read {} observation(s) from {}", observations.len(), input.display());

    // Run engine; nothing is written when it aborts.
    let result = vaxtldr_inference::run(&config, observations).map_err(|e| {
        let code = if e.is_integrity_violation() { EXIT_RUN_INTEGRITY } else { EXIT_RUN_INVALID_CONFIG };
        let err = run_err(code, e.to_string());
        match e {
            InferenceError::InconsistentBreakdown { .. } => err.with_hint(
                "raise validation.absolute_tolerance or validation.relative_tolerance if the source is known to be noisy",
            ),
            _ => err,
        }
    })?;

    if let Some(ref path) = output_file {
        let out = File::create(path).map_err(|e| {
            run_err(EXIT_RUN_OUTPUT, format!("cannot write {}: {e}", path.display()))
        })?;
        write_observations(BufWriter::new(out), &result.observations)
            .map_err(|e| run_err(EXIT_RUN_OUTPUT, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if let Some(ref dir) = summary_dir {
        write_summary(dir, &config, &result)?;
        eprintln!("wrote summary to {}", dir.display());
    }

    if json_output {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| run_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    let d = &result.diagnostics;
    eprintln!(
        "{} -> {} records ({} strategy): {} breakdowns validated, {} parts interpolated, {} not interpolable, {} projected",
        result.meta.input_records,
        result.meta.output_records,
        result.meta.strategy,
        d.validated_breakdowns,
        d.interpolated_parts,
        d.interpolation_failures.len(),
        d.projected_records,
    );
    if d.dose_lag_applied + d.dose_lag_missing > 0 {
        eprintln!(
            "dose lag: {} adjusted, {} without dose-1 partner",
            d.dose_lag_applied, d.dose_lag_missing
        );
    }

    Ok(())
}

/// Write `latest.csv`, `line.csv` and `freshness.txt` into `dir`.
fn write_summary(dir: &Path, config: &InferenceConfig, result: &InferenceResult) -> Result<(), CliError> {
    let output_err = |path: &Path, e: &dyn std::fmt::Display| {
        run_err(EXIT_RUN_OUTPUT, format!("cannot write {}: {e}", path.display()))
    };
    std::fs::create_dir_all(dir).map_err(|e| output_err(dir, &e))?;

    let population = config
        .population_table()
        .map_err(|e| run_err(EXIT_RUN_INVALID_CONFIG, e.to_string()))?;

    let latest_path = dir.join("latest.csv");
    let file = File::create(&latest_path).map_err(|e| output_err(&latest_path, &e))?;
    write_snapshot(file, &latest_snapshot(&result.observations, &population))
        .map_err(|e| output_err(&latest_path, &e))?;

    let line_path = dir.join("line.csv");
    let file = File::create(&line_path).map_err(|e| output_err(&line_path, &e))?;
    write_series(BufWriter::new(file), &national_series(&result.observations, &population))
        .map_err(|e| output_err(&line_path, &e))?;

    let today = chrono::Local::now().date_naive();
    let fresh = freshness(&result.observations, today);
    let latest = fresh
        .latest_real_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let freshness_path = dir.join("freshness.txt");
    std::fs::write(&freshness_path, format!("{} {latest}", today.format("%Y-%m-%d")))
        .map_err(|e| output_err(&freshness_path, &e))?;
    if let Some(days) = fresh.staleness_days() {
        log::info!("latest reported figures are {days} day(s) old");
    }

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;
    let population = config
        .population_table()
        .map_err(|e| run_err(EXIT_RUN_INVALID_CONFIG, e.to_string()))?;
    eprintln!(
        "{}: ok (strategy {}, dose lag {}, wait {} days, {} population bands)",
        config_path.display(),
        config.extrapolation.strategy,
        if config.dose_lag.enabled { "on" } else { "off" },
        config.wait.days,
        population.len(),
    );
    Ok(())
}
