use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::model::Group;
use crate::population::PopulationTable;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub validation: ToleranceConfig,
    #[serde(default)]
    pub aggregates: AggregateRemovalConfig,
    #[serde(default)]
    pub extrapolation: ExtrapolationConfig,
    #[serde(default)]
    pub dose_lag: DoseLagConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Disjoint age bands. Absent means the built-in England 2021 table.
    #[serde(default)]
    pub population: Option<Vec<PopulationEntry>>,
}

// ---------------------------------------------------------------------------
// Validation tolerance
// ---------------------------------------------------------------------------

/// An aggregate agrees with its parts when the absolute difference is below
/// `absolute_tolerance` or below `relative_tolerance` of the parts sum.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToleranceConfig {
    #[serde(default = "default_absolute_tolerance")]
    pub absolute_tolerance: i64,
    #[serde(default = "default_relative_tolerance")]
    pub relative_tolerance: f64,
}

fn default_absolute_tolerance() -> i64 {
    1000
}

fn default_relative_tolerance() -> f64 {
    0.05
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            absolute_tolerance: default_absolute_tolerance(),
            relative_tolerance: default_relative_tolerance(),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate removal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AggregateRemovalConfig {
    /// First day covered by daily reporting.
    #[serde(default = "default_daily_cutover")]
    pub daily_cutover: NaiveDate,
    /// Drop every weekly record from the cutover on, not only location breakdowns.
    #[serde(default)]
    pub drop_weekly_after_cutover: bool,
}

fn default_daily_cutover() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 9).unwrap_or(NaiveDate::MIN)
}

impl Default for AggregateRemovalConfig {
    fn default() -> Self {
        Self {
            daily_cutover: default_daily_cutover(),
            drop_weekly_after_cutover: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Extrapolation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationStrategy {
    None,
    /// Least-squares line through the recent window, per slice.
    #[default]
    Trend,
    /// Weekly-rate rollout split between doses, capped at population.
    Rollout,
}

impl std::fmt::Display for ExtrapolationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Trend => write!(f, "trend"),
            Self::Rollout => write!(f, "rollout"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExtrapolationConfig {
    #[serde(default)]
    pub strategy: ExtrapolationStrategy,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,
    #[serde(default = "default_lag_weeks")]
    pub dosing_interval_weeks: i64,
}

fn default_window_days() -> i64 {
    7
}

fn default_horizon_days() -> i64 {
    52 * 7
}

fn default_lag_weeks() -> i64 {
    12
}

impl Default for ExtrapolationConfig {
    fn default() -> Self {
        Self {
            strategy: ExtrapolationStrategy::default(),
            window_days: default_window_days(),
            horizon_days: default_horizon_days(),
            dosing_interval_weeks: default_lag_weeks(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dose lag + wait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DoseLagConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lag_weeks")]
    pub weeks: i64,
}

fn default_true() -> bool {
    true
}

impl Default for DoseLagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weeks: default_lag_weeks(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_wait_days")]
    pub days: i64,
}

fn default_wait_days() -> i64 {
    14
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            days: default_wait_days(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PipelineConfig {
    /// Collapse age groups into `all` as the final stage.
    #[serde(default)]
    pub aggregate_ages: bool,
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PopulationEntry {
    pub group: Group,
    pub count: u64,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl InferenceConfig {
    pub fn from_toml(input: &str) -> Result<Self, InferenceError> {
        let config: InferenceConfig =
            toml::from_str(input).map_err(|e| InferenceError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        let invalid = |msg: String| -> Result<(), InferenceError> {
            Err(InferenceError::ConfigValidation(msg))
        };

        if self.validation.absolute_tolerance < 0 {
            return invalid(format!(
                "validation.absolute_tolerance must be >= 0, got {}",
                self.validation.absolute_tolerance
            ));
        }
        if !(self.validation.relative_tolerance >= 0.0) {
            return invalid(format!(
                "validation.relative_tolerance must be >= 0, got {}",
                self.validation.relative_tolerance
            ));
        }

        let ext = &self.extrapolation;
        if ext.window_days < 1 || ext.horizon_days < 1 {
            return invalid(format!(
                "extrapolation window_days and horizon_days must be >= 1, got {} and {}",
                ext.window_days, ext.horizon_days
            ));
        }
        if ext.dosing_interval_weeks < 1 || self.dose_lag.weeks < 1 {
            return invalid("dosing intervals must be at least one week".into());
        }
        if self.wait.days < 1 {
            return invalid(format!("wait.days must be >= 1, got {}", self.wait.days));
        }

        // The rollout model already books second doses one interval after first doses.
        if ext.strategy == ExtrapolationStrategy::Rollout && self.dose_lag.enabled {
            return invalid(
                "extrapolation.strategy = \"rollout\" requires dose_lag.enabled = false".into(),
            );
        }

        if let Some(ref entries) = self.population {
            population_table_from(entries)?;
        }

        Ok(())
    }

    /// Population table for this run.
    pub fn population_table(&self) -> Result<PopulationTable, InferenceError> {
        match self.population {
            Some(ref entries) => population_table_from(entries),
            None => Ok(PopulationTable::england_2021()),
        }
    }
}

fn population_table_from(entries: &[PopulationEntry]) -> Result<PopulationTable, InferenceError> {
    PopulationTable::from_disjoint(entries.iter().map(|e| (e.group, e.count)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
