//! Deaggregation by interpolation between weekly snapshots.
//!
//! An aggregate with no daily breakdown is split using the shares the
//! matching weekly reports give each value of the dimension. Shares are
//! taken from the two weekly report dates nearest the aggregate's real date
//! and blended linearly by how far its data date sits between them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::diagnostics::Insufficiency;
use crate::error::InferenceError;
use crate::model::{Dimension, DimensionValue, Observation, Period};

#[derive(Debug, Clone, PartialEq)]
pub enum Interpolation {
    Parts(Vec<Observation>),
    Insufficient(Insufficiency),
}

/// Synthesize the `dimension` breakdown of `aggregate` from weekly records.
///
/// Only weekly records in `observations` that are broken down on `dimension`
/// and agree with the aggregate on the other two axes are used.
pub fn interpolate_breakdown(
    aggregate: &Observation,
    dimension: Dimension,
    observations: &[Observation],
) -> Result<Interpolation, InferenceError> {
    let weekly: Vec<&Observation> = observations
        .iter()
        .filter(|o| {
            o.period() == Period::Weekly
                && !dimension.is_aggregate(&o.slice)
                && dimension.agrees_on_others(&o.slice, &aggregate.slice)
        })
        .collect();

    let dates: BTreeSet<NaiveDate> = weekly.iter().map(|o| o.real_date()).collect();
    if dates.len() < 2 {
        return Ok(Interpolation::Insufficient(
            Insufficiency::TooFewWeeklyDates { found: dates.len() },
        ));
    }

    let (d0, d1) = bracketing_dates(&dates, aggregate.real_date());

    // Sums per (value, date) and per date over the two selected snapshots.
    let mut by_value: BTreeMap<(DimensionValue, NaiveDate), i64> = BTreeMap::new();
    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for o in weekly.iter().filter(|o| o.real_date() == d0 || o.real_date() == d1) {
        *by_value.entry((dimension.value(&o.slice), o.real_date())).or_insert(0) += o.vaccinated;
        *totals.entry(o.real_date()).or_insert(0) += o.vaccinated;
    }
    for date in [d0, d1] {
        if totals.get(&date).copied().unwrap_or(0) == 0 {
            return Ok(Interpolation::Insufficient(Insufficiency::EmptySnapshot { date }));
        }
    }

    let values: BTreeSet<DimensionValue> = by_value.keys().map(|(v, _)| v.clone()).collect();
    let share = |value: &DimensionValue, date: NaiveDate| -> f64 {
        let part = by_value.get(&(value.clone(), date)).copied().unwrap_or(0);
        part as f64 / totals[&date] as f64
    };

    let progress = progress(aggregate.source.data_date, d0, d1);

    let mut parts = Vec::with_capacity(values.len());
    for value in &values {
        let ratio = share(value, d0) * (1.0 - progress) + share(value, d1) * progress;
        let count = (aggregate.vaccinated as f64 * ratio).floor();
        let slice = value.apply_to(&aggregate.slice);
        if count < 0.0 {
            return Err(InferenceError::NegativeInterpolation {
                slice,
                real_date: aggregate.real_date(),
                value: count,
            });
        }
        parts.push(Observation {
            source: aggregate.source.clone(),
            vaccinated: count as i64,
            slice,
            interpolated: true,
            extrapolated: false,
        });
    }

    Ok(Interpolation::Parts(parts))
}

/// The two dates nearest `target`, ascending. Ties go to the earlier date.
fn bracketing_dates(dates: &BTreeSet<NaiveDate>, target: NaiveDate) -> (NaiveDate, NaiveDate) {
    let mut nearest: Vec<NaiveDate> = dates.iter().copied().collect();
    nearest.sort_by_key(|d| (*d - target).num_days().abs());
    let (a, b) = (nearest[0], nearest[1]);
    (a.min(b), a.max(b))
}

/// Position of `date` between `d0` and `d1`, clamped to [0, 1].
fn progress(date: NaiveDate, d0: NaiveDate, d1: NaiveDate) -> f64 {
    let span = (d1 - d0).num_days() as f64;
    ((date - d0).num_days() as f64 / span).clamp(0.0, 1.0)
}
