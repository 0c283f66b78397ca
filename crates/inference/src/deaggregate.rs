//! Deaggregation of daily reports and removal of the aggregates left behind.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use crate::config::{AggregateRemovalConfig, ToleranceConfig};
use crate::diagnostics::Diagnostics;
use crate::error::InferenceError;
use crate::interpolate::{interpolate_breakdown, Interpolation};
use crate::model::{Dimension, Observation, Period, Slice, Source};
use crate::validate::{check_breakdown, BreakdownCheck};

/// Validate or synthesize the breakdown of every daily aggregate, per
/// dimension in dose, group, location order.
///
/// Parts synthesized on one dimension join the daily set seen by the next.
/// The returned set is the input plus the synthesized parts; aggregates are
/// kept until [`remove_aggregates`] runs.
pub fn add_deaggregates(
    observations: Vec<Observation>,
    tolerance: &ToleranceConfig,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Observation>, InferenceError> {
    let weekly: Vec<Observation> = observations
        .iter()
        .filter(|o| o.period() == Period::Weekly)
        .cloned()
        .collect();
    let mut daily: Vec<Observation> = observations
        .iter()
        .filter(|o| o.period() == Period::Daily)
        .cloned()
        .collect();

    let mut deaggregates = Vec::new();
    for dimension in Dimension::ALL {
        let produced = deaggregate_dimension(dimension, &daily, &weekly, tolerance, diagnostics)?;
        log::debug!("{dimension}: {} part(s) synthesized", produced.len());
        daily.extend(produced.iter().cloned());
        deaggregates.extend(produced);
    }

    let mut out = observations;
    out.extend(deaggregates);
    Ok(out)
}

fn deaggregate_dimension(
    dimension: Dimension,
    daily: &[Observation],
    weekly: &[Observation],
    tolerance: &ToleranceConfig,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Observation>, InferenceError> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&Observation>> = BTreeMap::new();
    for o in daily {
        by_date.entry(o.real_date()).or_default().push(o);
    }
    let known: HashSet<(&Source, &Slice)> = daily.iter().map(|o| (&o.source, &o.slice)).collect();

    let mut produced = Vec::new();
    for on_date in by_date.values() {
        for aggregate in on_date.iter().filter(|o| dimension.is_aggregate(&o.slice)) {
            let parts: Vec<&Observation> = on_date
                .iter()
                .copied()
                .filter(|o| is_part_of(dimension, &o.slice, &aggregate.slice))
                .collect();

            match check_breakdown(aggregate, &parts, dimension, tolerance)? {
                BreakdownCheck::Consistent { .. } => diagnostics.validated_breakdowns += 1,
                BreakdownCheck::Missing => {
                    match interpolate_breakdown(aggregate, dimension, weekly)? {
                        Interpolation::Parts(parts) => {
                            for part in parts {
                                if known.contains(&(&part.source, &part.slice)) {
                                    continue;
                                }
                                diagnostics.interpolated_parts += 1;
                                produced.push(part);
                            }
                        }
                        Interpolation::Insufficient(reason) => diagnostics.interpolation_failed(
                            dimension,
                            &aggregate.slice,
                            aggregate.real_date(),
                            reason,
                        ),
                    }
                }
            }
        }
    }

    Ok(produced)
}

/// `candidate` is a reported part of `aggregate` along `dimension`: broken
/// down on every axis and identical to the aggregate off `dimension`.
fn is_part_of(dimension: Dimension, candidate: &Slice, aggregate: &Slice) -> bool {
    !dimension.is_aggregate(candidate)
        && dimension
            .others()
            .iter()
            .all(|d| !d.is_aggregate(candidate) && d.value(candidate) == d.value(aggregate))
}

/// Drop what deaggregation made redundant: anything still aggregate on dose
/// or group, weekly location breakdowns once daily reporting has begun, and
/// every record but one per slice and real date.
pub fn remove_aggregates(
    observations: Vec<Observation>,
    config: &AggregateRemovalConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<Observation> {
    let before = observations.len();
    let kept: Vec<Observation> = observations
        .into_iter()
        .filter(|o| keep_after_deaggregation(o, config))
        .collect();
    let filtered = kept.len();
    let kept = keep_one_per_day(kept);
    if kept.len() < filtered {
        log::debug!("{} record(s) superseded by a report of the same day", filtered - kept.len());
    }
    diagnostics.dropped_records += before - kept.len();
    kept
}

/// Keep one record per (slice, real date), the one with the lowest
/// [`Observation::report_rank`]. Input order is preserved.
fn keep_one_per_day(observations: Vec<Observation>) -> Vec<Observation> {
    let mut winners: HashMap<(&Slice, NaiveDate), usize> = HashMap::new();
    for (i, o) in observations.iter().enumerate() {
        winners
            .entry((&o.slice, o.real_date()))
            .and_modify(|w| {
                if o.report_rank() < observations[*w].report_rank() {
                    *w = i;
                }
            })
            .or_insert(i);
    }
    let keep: HashSet<usize> = winners.into_values().collect();
    observations
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, o)| o)
        .collect()
}

fn keep_after_deaggregation(o: &Observation, config: &AggregateRemovalConfig) -> bool {
    if o.slice.dose.is_all() || o.slice.group.is_all() {
        return false;
    }
    if o.period() == Period::Weekly && o.real_date() >= config.daily_cutover {
        return !config.drop_weekly_after_cutover && o.slice.location.is_all();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dose, Group, Location};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn daily(data_date: &str, dose: Dose, group: Group, location: Location, n: i64) -> Observation {
        Observation::new(
            Source::new("daily", date(data_date), Period::Daily),
            n,
            Slice::new(dose, group, location),
        )
    }

    fn weekly(real_date: &str, dose: Dose, group: Group, location: Location, n: i64) -> Observation {
        let mut source = Source::new("weekly", date(real_date), Period::Weekly);
        source.real_date = date(real_date);
        Observation::new(source, n, Slice::new(dose, group, location))
    }

    #[test]
    fn existing_breakdown_is_validated_not_duplicated() {
        let london = Location::named("London");
        let data = vec![
            daily("2021-02-01", Dose::All, Group::OVER_80S, london.clone(), 1000),
            daily("2021-02-01", Dose::First, Group::OVER_80S, london.clone(), 600),
            daily("2021-02-01", Dose::Second, Group::OVER_80S, london, 399),
        ];
        let mut diag = Diagnostics::default();
        let out = add_deaggregates(data.clone(), &ToleranceConfig::default(), &mut diag).unwrap();
        assert_eq!(out, data);
        assert_eq!(diag.validated_breakdowns, 1);
    }

    #[test]
    fn inconsistent_breakdown_aborts() {
        let london = Location::named("London");
        let data = vec![
            daily("2021-02-01", Dose::All, Group::OVER_80S, london.clone(), 100_000),
            daily("2021-02-01", Dose::First, Group::OVER_80S, london.clone(), 50_000),
            daily("2021-02-01", Dose::Second, Group::OVER_80S, london, 44_000),
        ];
        let err = add_deaggregates(data, &ToleranceConfig::default(), &mut Diagnostics::default())
            .unwrap_err();
        assert!(matches!(err, InferenceError::InconsistentBreakdown { dimension: Dimension::Dose, .. }));
    }

    #[test]
    fn partial_breakdown_on_other_axis_is_not_a_match() {
        // dose=1 / group=all is broken down on dose but still aggregate on
        // group, so it cannot validate the all-dose total.
        let data = vec![
            daily("2021-02-01", Dose::All, Group::ALL_AGES, Location::ALL, 1000),
            daily("2021-02-01", Dose::First, Group::ALL_AGES, Location::ALL, 5),
        ];
        let mut diag = Diagnostics::default();
        add_deaggregates(data, &ToleranceConfig::default(), &mut diag).unwrap();
        assert_eq!(diag.validated_breakdowns, 0);
        let dose_failures = diag
            .interpolation_failures
            .iter()
            .filter(|f| f.dimension == "dose")
            .count();
        assert_eq!(dose_failures, 1);
    }

    #[test]
    fn missing_group_breakdown_is_interpolated() {
        let data = vec![
            daily("2021-02-02", Dose::First, Group::ALL_AGES, Location::ALL, 1000),
            weekly("2021-01-25", Dose::First, Group::UNDER_80S, Location::ALL, 300),
            weekly("2021-01-25", Dose::First, Group::OVER_80S, Location::ALL, 700),
            weekly("2021-02-01", Dose::First, Group::UNDER_80S, Location::ALL, 400),
            weekly("2021-02-01", Dose::First, Group::OVER_80S, Location::ALL, 600),
        ];
        let mut diag = Diagnostics::default();
        let out = add_deaggregates(data, &ToleranceConfig::default(), &mut diag).unwrap();
        let synthesized: Vec<&Observation> = out.iter().filter(|o| o.interpolated).collect();
        assert_eq!(synthesized.len(), 2);
        assert_eq!(diag.interpolated_parts, 2);
        assert!(synthesized.iter().all(|o| o.period() == Period::Daily));
    }

    #[test]
    fn later_pass_sees_earlier_parts() {
        // Dose pass splits (all, 80+) by weekly dose shares; the location
        // pass then finds nothing for the new parts but still runs on them.
        let data = vec![
            daily("2021-02-02", Dose::All, Group::OVER_80S, Location::ALL, 1000),
            weekly("2021-01-25", Dose::First, Group::OVER_80S, Location::ALL, 90),
            weekly("2021-01-25", Dose::Second, Group::OVER_80S, Location::ALL, 10),
            weekly("2021-02-01", Dose::First, Group::OVER_80S, Location::ALL, 80),
            weekly("2021-02-01", Dose::Second, Group::OVER_80S, Location::ALL, 20),
        ];
        let mut diag = Diagnostics::default();
        let out = add_deaggregates(data, &ToleranceConfig::default(), &mut diag).unwrap();
        assert_eq!(out.iter().filter(|o| o.interpolated).count(), 2);
        // One location failure for the aggregate itself, one per dose part.
        let location_failures = diag
            .interpolation_failures
            .iter()
            .filter(|f| f.dimension == "location")
            .count();
        assert_eq!(location_failures, 3);
    }

    #[test]
    fn removal_drops_aggregates_and_late_weekly_locations() {
        let config = AggregateRemovalConfig::default();
        let london = Location::named("London");
        let data = vec![
            daily("2021-02-01", Dose::All, Group::OVER_80S, Location::ALL, 1),
            daily("2021-02-01", Dose::First, Group::ALL_AGES, Location::ALL, 1),
            daily("2021-02-01", Dose::First, Group::OVER_80S, Location::ALL, 1),
            daily("2021-02-01", Dose::First, Group::OVER_80S, london.clone(), 1),
            weekly("2021-01-01", Dose::First, Group::OVER_80S, london.clone(), 1),
            weekly("2021-01-20", Dose::First, Group::OVER_80S, london.clone(), 1),
            weekly("2021-01-20", Dose::First, Group::OVER_80S, Location::ALL, 1),
        ];
        let mut diag = Diagnostics::default();
        let kept = remove_aggregates(data.clone(), &config, &mut diag);
        assert_eq!(kept, vec![data[2].clone(), data[3].clone(), data[4].clone(), data[6].clone()]);
        assert_eq!(diag.dropped_records, 3);
    }

    #[test]
    fn same_day_weekly_national_yields_to_daily() {
        // Daily of 2021-02-05 and weekly of 2021-02-08 both describe 2021-02-04.
        let config = AggregateRemovalConfig::default();
        let data = vec![
            weekly("2021-02-04", Dose::First, Group::OVER_80S, Location::ALL, 600),
            daily("2021-02-05", Dose::First, Group::OVER_80S, Location::ALL, 600),
            weekly("2021-02-04", Dose::First, Group::UNDER_80S, Location::ALL, 400),
            daily("2021-02-05", Dose::First, Group::UNDER_80S, Location::ALL, 400),
            weekly("2021-02-11", Dose::First, Group::OVER_80S, Location::ALL, 700),
        ];
        let mut diag = Diagnostics::default();
        let kept = remove_aggregates(data.clone(), &config, &mut diag);
        assert_eq!(kept, vec![data[1].clone(), data[3].clone(), data[4].clone()]);
        assert_eq!(diag.dropped_records, 2);
    }

    #[test]
    fn same_day_daily_duplicates_keep_lowest_origin() {
        let mut late = daily("2021-02-05", Dose::First, Group::OVER_80S, Location::ALL, 610);
        late.source.origin = "daily-rerun".to_string();
        let data = vec![
            late,
            daily("2021-02-05", Dose::First, Group::OVER_80S, Location::ALL, 600),
        ];
        let kept = remove_aggregates(data.clone(), &AggregateRemovalConfig::default(), &mut Diagnostics::default());
        assert_eq!(kept, vec![data[1].clone()]);
    }

    #[test]
    fn removal_can_drop_all_late_weekly() {
        let config = AggregateRemovalConfig {
            drop_weekly_after_cutover: true,
            ..AggregateRemovalConfig::default()
        };
        let data = vec![
            weekly("2021-01-01", Dose::First, Group::OVER_80S, Location::ALL, 1),
            weekly("2021-01-20", Dose::First, Group::OVER_80S, Location::ALL, 1),
        ];
        let kept = remove_aggregates(data.clone(), &config, &mut Diagnostics::default());
        assert_eq!(kept, vec![data[0].clone()]);
    }
}
