//! Consistency check of a claimed aggregate against its reported parts.

use crate::config::ToleranceConfig;
use crate::error::InferenceError;
use crate::model::{Dimension, Observation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownCheck {
    /// Parts exist and agree with the aggregate.
    Consistent { parts_sum: i64 },
    /// No parts reported; the breakdown has to be interpolated.
    Missing,
}

/// Check `aggregate` against `parts` along `dimension`.
///
/// A mismatch beyond tolerance is fatal: the run must not continue on
/// inconsistent data.
pub fn check_breakdown(
    aggregate: &Observation,
    parts: &[&Observation],
    dimension: Dimension,
    tolerance: &ToleranceConfig,
) -> Result<BreakdownCheck, InferenceError> {
    if parts.is_empty() {
        return Ok(BreakdownCheck::Missing);
    }

    let parts_sum: i64 = parts.iter().map(|p| p.vaccinated).sum();
    let difference = (aggregate.vaccinated - parts_sum).abs();
    if !within_tolerance(difference, parts_sum, tolerance) {
        return Err(InferenceError::InconsistentBreakdown {
            dimension,
            slice: aggregate.slice.clone(),
            real_date: aggregate.real_date(),
            aggregate: aggregate.vaccinated,
            parts_sum,
        });
    }

    Ok(BreakdownCheck::Consistent { parts_sum })
}

/// `difference < absolute` or `difference / parts_sum < relative`.
pub fn within_tolerance(difference: i64, parts_sum: i64, tolerance: &ToleranceConfig) -> bool {
    if difference < tolerance.absolute_tolerance {
        return true;
    }
    if parts_sum == 0 {
        return false;
    }
    (difference as f64 / parts_sum.abs() as f64) < tolerance.relative_tolerance
}
