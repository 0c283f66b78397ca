//! Report views layered on top of the pipeline output.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::extrapolate::latest_reported_date;
use crate::model::{Dose, Group, Observation};
use crate::population::PopulationLookup;

/// Headline count for one dose and one age band on the latest reported day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    pub dose: Dose,
    pub group: Group,
    pub real_date: NaiveDate,
    pub vaccinated: i64,
    pub population: Option<u64>,
}

/// One point of the national line chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub dose: Dose,
    pub real_date: NaiveDate,
    pub extrapolated: bool,
    pub vaccinated: i64,
    pub population: Option<u64>,
}

/// When the run happened and how recent its data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Freshness {
    pub generated_on: NaiveDate,
    pub latest_real_date: Option<NaiveDate>,
}

impl Freshness {
    /// Days between the latest reported figure and the run.
    pub fn staleness_days(&self) -> Option<i64> {
        self.latest_real_date
            .map(|latest| (self.generated_on - latest).num_days())
    }
}

pub fn freshness(observations: &[Observation], generated_on: NaiveDate) -> Freshness {
    Freshness {
        generated_on,
        latest_real_date: latest_reported_date(observations),
    }
}

/// Reported totals on the latest reported day, per dose, for all ages and
/// for the over-80s. Rows are ordered by dose descending, all ages first.
///
/// Only all-locations records count, so regional breakdowns are not added
/// on top of the national figure.
pub fn latest_snapshot(
    observations: &[Observation],
    population: &dyn PopulationLookup,
) -> Vec<SnapshotRow> {
    let Some(latest) = latest_reported_date(observations) else {
        return Vec::new();
    };

    let mut sums: BTreeMap<(Dose, Group), i64> = BTreeMap::new();
    for o in observations
        .iter()
        .filter(|o| !o.extrapolated && o.real_date() == latest && o.slice.location.is_all())
    {
        *sums.entry((o.slice.dose, Group::ALL_AGES)).or_insert(0) += o.vaccinated;
        if o.slice.group == Group::OVER_80S {
            *sums.entry((o.slice.dose, Group::OVER_80S)).or_insert(0) += o.vaccinated;
        }
    }

    let mut rows: Vec<SnapshotRow> = sums
        .into_iter()
        .map(|((dose, group), vaccinated)| SnapshotRow {
            dose,
            group,
            real_date: latest,
            vaccinated: population.cap(&group, vaccinated),
            population: population.population(&group),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.dose
            .cmp(&a.dose)
            .then_with(|| b.group.is_all().cmp(&a.group.is_all()))
    });
    rows
}

/// National all-ages totals per (dose, real date, extrapolated), capped at
/// the total population, in date order.
pub fn national_series(
    observations: &[Observation],
    population: &dyn PopulationLookup,
) -> Vec<SeriesPoint> {
    let mut sums: BTreeMap<(NaiveDate, Dose, bool), i64> = BTreeMap::new();
    for o in observations.iter().filter(|o| o.slice.location.is_all()) {
        *sums
            .entry((o.real_date(), o.slice.dose, o.extrapolated))
            .or_insert(0) += o.vaccinated;
    }

    let total = population.population(&Group::ALL_AGES);
    sums.into_iter()
        .map(|((real_date, dose, extrapolated), vaccinated)| SeriesPoint {
            dose,
            real_date,
            extrapolated,
            vaccinated: population.cap(&Group::ALL_AGES, vaccinated),
            population: total,
        })
        .collect()
}
