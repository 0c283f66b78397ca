use serde::Serialize;

use crate::adjust::{add_dose_2_wait, add_dose_lag};
use crate::age::aggregate_ages;
use crate::config::{ExtrapolationStrategy, InferenceConfig};
use crate::cumulative::{make_cumulative, make_non_cumulative};
use crate::deaggregate::{add_deaggregates, remove_aggregates};
use crate::diagnostics::Diagnostics;
use crate::error::InferenceError;
use crate::extrapolate::add_extrapolations;
use crate::model::Observation;

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
    pub strategy: ExtrapolationStrategy,
    pub input_records: usize,
    pub output_records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceResult {
    pub meta: RunMeta,
    pub observations: Vec<Observation>,
    pub diagnostics: Diagnostics,
}

/// Run the full inference pipeline over raw observations.
///
/// Stage order: deaggregate, remove aggregates, extrapolate, to deltas,
/// dose lag, back to totals, dose-2 wait, and optionally age aggregation.
///
/// The config is validated first, so one assembled in code gets the same
/// checks as one read from TOML.
pub fn run(
    config: &InferenceConfig,
    observations: Vec<Observation>,
) -> Result<InferenceResult, InferenceError> {
    config.validate()?;
    let population = config.population_table()?;
    let mut diagnostics = Diagnostics::default();
    let input_records = observations.len();

    log::info!("deaggregating {input_records} record(s)");
    let observations = add_deaggregates(observations, &config.validation, &mut diagnostics)?;
    let observations = remove_aggregates(observations, &config.aggregates, &mut diagnostics);
    log::info!(
        "{} record(s) after removing aggregates ({} validated, {} interpolated, {} failed)",
        observations.len(),
        diagnostics.validated_breakdowns,
        diagnostics.interpolated_parts,
        diagnostics.interpolation_failures.len()
    );

    log::info!("extrapolating with strategy {}", config.extrapolation.strategy);
    let observations =
        add_extrapolations(observations, &config.extrapolation, &population, &mut diagnostics)?;

    let mut observations = make_non_cumulative(observations);
    if config.dose_lag.enabled {
        log::info!("applying {}-week dose lag", config.dose_lag.weeks);
        observations = add_dose_lag(observations, &config.dose_lag, &mut diagnostics);
    }
    let observations = make_cumulative(observations);

    log::info!("adding dose 2 + {} days", config.wait.days);
    let mut observations = add_dose_2_wait(observations, &config.wait, &mut diagnostics);

    if config.pipeline.aggregate_ages {
        log::info!("aggregating age groups");
        observations = aggregate_ages(&observations);
    }

    Ok(InferenceResult {
        meta: RunMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            strategy: config.extrapolation.strategy,
            input_records,
            output_records: observations.len(),
        },
        observations,
        diagnostics,
    })
}
