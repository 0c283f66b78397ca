//! Projection of cumulative counts beyond the last reported day.
//!
//! Two strategies, selected explicitly in config and never mixed:
//!
//! - **trend**: per slice, an ordinary least-squares line through the recent
//!   window of reported totals, projected forward daily.
//! - **rollout**: per age group, last week's vaccination rate is spent each
//!   day, second doses first (demand = first doses given one dosing interval
//!   earlier), the remainder on first doses, spilling over when a dose type
//!   reaches the group's population.
//!
//! Both operate on all-locations cumulative data and only emit records with
//! `extrapolated = true`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::config::{ExtrapolationConfig, ExtrapolationStrategy};
use crate::diagnostics::Diagnostics;
use crate::error::InferenceError;
use crate::model::{Dose, Group, Location, Observation, Slice, Source};
use crate::population::PopulationLookup;

/// Append projections for the configured strategy.
pub fn add_extrapolations(
    observations: Vec<Observation>,
    config: &ExtrapolationConfig,
    population: &dyn PopulationLookup,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Observation>, InferenceError> {
    let projections = match config.strategy {
        ExtrapolationStrategy::None => return Ok(observations),
        ExtrapolationStrategy::Trend => {
            extrapolate_trend(&observations, config, population, diagnostics)
        }
        ExtrapolationStrategy::Rollout => {
            extrapolate_rollout(&observations, config, population, diagnostics)?
        }
    };
    diagnostics.projected_records += projections.len();

    let mut out = observations;
    out.extend(projections);
    Ok(out)
}

/// Latest real date among reported (non-extrapolated) records.
pub fn latest_reported_date(observations: &[Observation]) -> Option<NaiveDate> {
    observations
        .iter()
        .filter(|o| !o.extrapolated)
        .map(|o| o.real_date())
        .max()
}

// ---------------------------------------------------------------------------
// Trend regression
// ---------------------------------------------------------------------------

/// Least-squares projections, one per slice per future day.
pub fn extrapolate_trend(
    observations: &[Observation],
    config: &ExtrapolationConfig,
    population: &dyn PopulationLookup,
    diagnostics: &mut Diagnostics,
) -> Vec<Observation> {
    let Some(max_date) = latest_reported_date(observations) else {
        return Vec::new();
    };
    let window_start = max_date - Duration::days(config.window_days);

    let mut points: BTreeMap<&Slice, Vec<(f64, f64)>> = BTreeMap::new();
    for o in observations.iter().filter(|o| !o.extrapolated && o.slice.location.is_all()) {
        let entry = points.entry(&o.slice).or_default();
        if o.real_date() > window_start {
            let x = (o.real_date() - max_date).num_days() as f64;
            entry.push((x, o.vaccinated as f64));
        }
    }

    let mut projections = Vec::new();
    for (slice, window) in points {
        let Some((slope, intercept)) = fit_line(&window) else {
            log::debug!("no trend for {slice}: {} point(s) in window", window.len());
            diagnostics.skipped_slices += 1;
            continue;
        };
        diagnostics.extrapolated_slices += 1;

        for plus_days in 1..=config.horizon_days {
            let real_date = max_date + Duration::days(plus_days);
            let value = (slope * plus_days as f64 + intercept).trunc().max(0.0) as i64;
            projections.push(Observation {
                source: Source::projected(real_date),
                vaccinated: population.cap(&slice.group, value),
                slice: slice.clone(),
                interpolated: false,
                extrapolated: true,
            });
        }
    }

    projections
}

/// Ordinary least squares `y = slope * x + intercept`. Needs two distinct x.
pub fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in points {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

// ---------------------------------------------------------------------------
// Capacity-bounded rollout
// ---------------------------------------------------------------------------

/// Reported cumulative totals for one dose, forward-filled on lookup.
struct History(BTreeMap<NaiveDate, i64>);

impl History {
    fn at(&self, date: NaiveDate) -> Option<i64> {
        self.0.range(..=date).next_back().map(|(_, v)| *v)
    }

    fn latest(&self) -> Option<NaiveDate> {
        self.0.keys().next_back().copied()
    }
}

/// Daily rollout projections for every age group with a known population.
pub fn extrapolate_rollout(
    observations: &[Observation],
    config: &ExtrapolationConfig,
    population: &dyn PopulationLookup,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Observation>, InferenceError> {
    let groups: BTreeSet<Group> = observations
        .iter()
        .filter(|o| !o.extrapolated && o.slice.location.is_all())
        .filter(|o| matches!(o.slice.dose, Dose::First | Dose::Second))
        .map(|o| o.slice.group)
        .collect();

    let mut projections = Vec::new();
    for group in groups {
        let Some(population) = population.population(&group) else {
            log::debug!("no population for group {group}, not projecting");
            diagnostics.skipped_slices += 1;
            continue;
        };
        let first = history(observations, group, Dose::First);
        let second = history(observations, group, Dose::Second);

        match project_group(group, population as f64, &first, &second, config)? {
            Some(projected) => {
                diagnostics.extrapolated_slices += 2;
                projections.extend(projected);
            }
            None => diagnostics.skipped_slices += 2,
        }
    }

    Ok(projections)
}

fn history(observations: &[Observation], group: Group, dose: Dose) -> History {
    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for o in observations.iter().filter(|o| {
        !o.extrapolated && o.slice.location.is_all() && o.slice.group == group && o.slice.dose == dose
    }) {
        let total = totals.entry(o.real_date()).or_insert(o.vaccinated);
        *total = (*total).max(o.vaccinated);
    }
    History(totals)
}

fn project_group(
    group: Group,
    population: f64,
    first: &History,
    second: &History,
    config: &ExtrapolationConfig,
) -> Result<Option<Vec<Observation>>, InferenceError> {
    let Some(latest) = first.latest().max(second.latest()) else {
        return Ok(None);
    };
    let week_ago = latest - Duration::days(7);
    if first.at(week_ago).is_none() && second.at(week_ago).is_none() {
        log::debug!("group {group}: no totals a week before {latest}, not projecting");
        return Ok(None);
    }

    let total = |date| first.at(date).unwrap_or(0) + second.at(date).unwrap_or(0);
    let weekly_rate = total(latest) - total(week_ago);
    if weekly_rate < 0 {
        log::warn!("group {group}: totals fell over the week to {latest}, not projecting");
        return Ok(None);
    }
    let capacity = weekly_rate as f64 / 7.0;

    let interval = Duration::weeks(config.dosing_interval_weeks);
    let mut cum_first = first.at(latest).unwrap_or(0) as f64;
    let mut cum_second = second.at(latest).unwrap_or(0) as f64;
    let mut projected_first: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    // First-dose total on `date`, reported or projected.
    let first_total = |date: NaiveDate, projected: &BTreeMap<NaiveDate, f64>| -> f64 {
        if date > latest {
            projected.get(&date).copied().unwrap_or(0.0)
        } else {
            first.at(date).unwrap_or(0) as f64
        }
    };

    let mut out = Vec::with_capacity(2 * config.horizon_days as usize);
    for plus_days in 1..=config.horizon_days {
        let date = latest + Duration::days(plus_days);
        let lagged = date - interval;
        let lagged_first_doses = (first_total(lagged, &projected_first)
            - first_total(lagged - Duration::days(1), &projected_first))
        .max(0.0);

        let (alloc_first, alloc_second) = allocate(
            date,
            capacity,
            lagged_first_doses,
            (population - cum_first).max(0.0),
            (population - cum_second).max(0.0),
        )?;
        cum_first += alloc_first;
        cum_second += alloc_second;
        projected_first.insert(date, cum_first);

        for (dose, total) in [(Dose::First, cum_first), (Dose::Second, cum_second)] {
            out.push(Observation {
                source: Source::projected(date),
                vaccinated: total.trunc() as i64,
                slice: Slice::new(dose, group, Location::ALL),
                interpolated: false,
                extrapolated: true,
            });
        }
    }

    Ok(Some(out))
}

/// Split one day's `capacity` into (first, second) doses.
///
/// Second doses take their demand first; first doses take the rest. A dose
/// type with no population headroom left spills its share to the other.
pub fn allocate(
    date: NaiveDate,
    capacity: f64,
    second_demand: f64,
    first_headroom: f64,
    second_headroom: f64,
) -> Result<(f64, f64), InferenceError> {
    let mut second = second_demand.min(capacity);
    let mut first = capacity - second;

    if first > first_headroom {
        second += first - first_headroom;
        first = first_headroom;
    }
    if second > second_headroom {
        let spill = second - second_headroom;
        second = second_headroom;
        first = (first + spill).min(first_headroom);
    }

    for (dose, value) in [(Dose::First, first), (Dose::Second, second)] {
        if value < 0.0 || value.is_nan() {
            return Err(InferenceError::NegativeAllocation { dose, date, value });
        }
    }
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Period;
    use crate::population::PopulationTable;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn obs(real_date: NaiveDate, dose: Dose, group: Group, n: i64) -> Observation {
        let mut source = Source::new("daily", real_date, Period::Daily);
        source.real_date = real_date;
        Observation::new(source, n, Slice::new(dose, group, Location::ALL))
    }

    fn table() -> PopulationTable {
        PopulationTable::from_disjoint([(Group::UNDER_80S, 1_000_000), (Group::OVER_80S, 10_000)])
            .unwrap()
    }

    fn config(strategy: ExtrapolationStrategy, horizon_days: i64) -> ExtrapolationConfig {
        ExtrapolationConfig {
            strategy,
            horizon_days,
            ..ExtrapolationConfig::default()
        }
    }

    #[test]
    fn fit_line_exact() {
        let (m, b) = fit_line(&[(-2.0, 80.0), (-1.0, 90.0), (0.0, 100.0)]).unwrap();
        assert!((m - 10.0).abs() < 1e-9);
        assert!((b - 100.0).abs() < 1e-9);
    }

    #[test]
    fn fit_line_needs_two_distinct_points() {
        assert!(fit_line(&[(0.0, 1.0)]).is_none());
        assert!(fit_line(&[(0.0, 1.0), (0.0, 2.0)]).is_none());
    }

    #[test]
    fn trend_projects_linearly() {
        let start = date("2021-02-01");
        let data: Vec<Observation> = (0..5)
            .map(|i| obs(start + Duration::days(i), Dose::First, Group::UNDER_80S, 1000 + 100 * i))
            .collect();
        let mut diag = Diagnostics::default();
        let out = extrapolate_trend(&data, &config(ExtrapolationStrategy::Trend, 3), &table(), &mut diag);
        let values: Vec<i64> = out.iter().map(|o| o.vaccinated).collect();
        assert_eq!(values, vec![1500, 1600, 1700]);
        assert!(out.iter().all(|o| o.extrapolated && o.period() == Period::Daily));
        assert_eq!(out[0].real_date(), date("2021-02-06"));
        assert_eq!(diag.extrapolated_slices, 1);
    }

    #[test]
    fn trend_ignores_points_outside_window() {
        let mut data = vec![obs(date("2021-01-01"), Dose::First, Group::UNDER_80S, 0)];
        data.push(obs(date("2021-02-04"), Dose::First, Group::UNDER_80S, 500));
        data.push(obs(date("2021-02-05"), Dose::First, Group::UNDER_80S, 500));
        let out = extrapolate_trend(
            &data,
            &config(ExtrapolationStrategy::Trend, 2),
            &table(),
            &mut Diagnostics::default(),
        );
        assert_eq!(out.iter().map(|o| o.vaccinated).collect::<Vec<_>>(), vec![500, 500]);
    }

    #[test]
    fn trend_skips_single_point_slices() {
        let data = vec![
            obs(date("2021-02-01"), Dose::First, Group::UNDER_80S, 100),
            obs(date("2021-02-01"), Dose::Second, Group::UNDER_80S, 10),
            obs(date("2021-02-02"), Dose::Second, Group::UNDER_80S, 20),
        ];
        let mut diag = Diagnostics::default();
        let out = extrapolate_trend(&data, &config(ExtrapolationStrategy::Trend, 1), &table(), &mut diag);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].slice.dose, Dose::Second);
        assert_eq!(diag.skipped_slices, 1);
    }

    #[test]
    fn trend_caps_at_population() {
        let start = date("2021-02-01");
        let data: Vec<Observation> = (0..3)
            .map(|i| obs(start + Duration::days(i), Dose::First, Group::OVER_80S, 9_000 + 500 * i))
            .collect();
        let out = extrapolate_trend(
            &data,
            &config(ExtrapolationStrategy::Trend, 5),
            &table(),
            &mut Diagnostics::default(),
        );
        assert_eq!(out.last().unwrap().vaccinated, 10_000);
    }

    #[test]
    fn trend_leaves_locations_alone() {
        let start = date("2021-02-01");
        let data: Vec<Observation> = (0..3)
            .map(|i| {
                let mut o = obs(start + Duration::days(i), Dose::First, Group::OVER_80S, 10 * i);
                o.slice.location = Location::named("London");
                o
            })
            .collect();
        let out = extrapolate_trend(
            &data,
            &config(ExtrapolationStrategy::Trend, 5),
            &table(),
            &mut Diagnostics::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn allocate_prefers_second_dose_demand() {
        let d = date("2021-05-01");
        assert_eq!(allocate(d, 100.0, 30.0, 1e9, 1e9).unwrap(), (70.0, 30.0));
        assert_eq!(allocate(d, 100.0, 300.0, 1e9, 1e9).unwrap(), (0.0, 100.0));
    }

    #[test]
    fn allocate_spills_between_doses() {
        let d = date("2021-05-01");
        // First doses saturated: the spare goes to second doses.
        assert_eq!(allocate(d, 100.0, 30.0, 10.0, 1e9).unwrap(), (10.0, 90.0));
        // Second doses saturated: the spare goes to first doses.
        assert_eq!(allocate(d, 100.0, 80.0, 1e9, 20.0).unwrap(), (80.0, 20.0));
        // Everyone done.
        assert_eq!(allocate(d, 100.0, 80.0, 0.0, 0.0).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn allocate_rejects_negative_capacity() {
        let err = allocate(date("2021-05-01"), -5.0, 0.0, 1e9, 1e9).unwrap_err();
        assert!(matches!(err, InferenceError::NegativeAllocation { dose: Dose::Second, .. }));
    }

    #[test]
    fn rollout_spends_weekly_rate() {
        // 700 first doses a week, no second doses yet.
        let start = date("2021-02-01");
        let data = vec![
            obs(start, Dose::First, Group::UNDER_80S, 1000),
            obs(start, Dose::Second, Group::UNDER_80S, 0),
            obs(start + Duration::days(7), Dose::First, Group::UNDER_80S, 1700),
            obs(start + Duration::days(7), Dose::Second, Group::UNDER_80S, 0),
        ];
        let mut diag = Diagnostics::default();
        let out = extrapolate_rollout(
            &data,
            &config(ExtrapolationStrategy::Rollout, 2),
            &table(),
            &mut diag,
        )
        .unwrap();
        let firsts: Vec<i64> = out
            .iter()
            .filter(|o| o.slice.dose == Dose::First)
            .map(|o| o.vaccinated)
            .collect();
        assert_eq!(firsts, vec![1800, 1900]);
        assert!(out.iter().all(|o| o.extrapolated));
        assert_eq!(diag.extrapolated_slices, 2);
    }

    #[test]
    fn rollout_books_second_doses_one_interval_later() {
        let start = date("2021-01-01");
        let mut data = Vec::new();
        // 100 first doses a day for twelve weeks and a week more.
        for day in 0..=91 {
            let d = start + Duration::days(day);
            data.push(obs(d, Dose::First, Group::UNDER_80S, 100 * (day + 1)));
            data.push(obs(d, Dose::Second, Group::UNDER_80S, 0));
        }
        let out = extrapolate_rollout(
            &data,
            &config(ExtrapolationStrategy::Rollout, 1),
            &table(),
            &mut Diagnostics::default(),
        )
        .unwrap();
        let second = out.iter().find(|o| o.slice.dose == Dose::Second).unwrap();
        let first = out.iter().find(|o| o.slice.dose == Dose::First).unwrap();
        // Rate is 100/day; all of it is due as second doses.
        assert_eq!(second.vaccinated, 100);
        assert_eq!(first.vaccinated, 9200);
    }

    #[test]
    fn rollout_needs_a_week_of_history() {
        let data = vec![
            obs(date("2021-02-01"), Dose::First, Group::UNDER_80S, 1000),
            obs(date("2021-02-03"), Dose::First, Group::UNDER_80S, 1300),
        ];
        let mut diag = Diagnostics::default();
        let out = extrapolate_rollout(
            &data,
            &config(ExtrapolationStrategy::Rollout, 5),
            &table(),
            &mut diag,
        )
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(diag.skipped_slices, 2);
    }

    #[test]
    fn none_strategy_is_identity() {
        let data = vec![obs(date("2021-02-01"), Dose::First, Group::UNDER_80S, 1000)];
        let out = add_extrapolations(
            data.clone(),
            &config(ExtrapolationStrategy::None, 5),
            &table(),
            &mut Diagnostics::default(),
        )
        .unwrap();
        assert_eq!(out, data);
    }
}
