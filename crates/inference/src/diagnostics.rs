use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Dimension, Slice};

/// Why an aggregate could not be deaggregated from weekly data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insufficiency {
    /// Fewer than two distinct weekly report dates match the aggregate.
    TooFewWeeklyDates { found: usize },
    /// A selected weekly snapshot sums to zero, so it has no shares.
    EmptySnapshot { date: NaiveDate },
}

impl std::fmt::Display for Insufficiency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewWeeklyDates { found } => {
                write!(f, "{found} weekly report date(s), need 2")
            }
            Self::EmptySnapshot { date } => write!(f, "weekly snapshot on {date} sums to zero"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterpolationFailure {
    pub dimension: &'static str,
    pub slice: Slice,
    pub real_date: NaiveDate,
    pub reason: Insufficiency,
}

/// Soft insufficiencies and no-ops recorded while the pipeline runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub validated_breakdowns: usize,
    pub interpolated_parts: usize,
    pub interpolation_failures: Vec<InterpolationFailure>,
    pub dropped_records: usize,
    pub extrapolated_slices: usize,
    pub skipped_slices: usize,
    pub projected_records: usize,
    pub dose_lag_applied: usize,
    pub dose_lag_missing: usize,
    pub wait_records: usize,
}

impl Diagnostics {
    pub(crate) fn interpolation_failed(
        &mut self,
        dimension: Dimension,
        slice: &Slice,
        real_date: NaiveDate,
        reason: Insufficiency,
    ) {
        log::warn!("failed to interpolate {dimension} for {slice} on {real_date}: {reason}");
        self.interpolation_failures.push(InterpolationFailure {
            dimension: dimension.name(),
            slice: slice.clone(),
            real_date,
            reason,
        });
    }
}
