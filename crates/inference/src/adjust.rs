//! Derived dose-2 slices: the dosing-interval lag and the protection wait.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use crate::config::{DoseLagConfig, WaitConfig};
use crate::diagnostics::Diagnostics;
use crate::extrapolate::latest_reported_date;
use crate::model::{Dose, Group, Location, Observation};

/// Add to every dose-2 count the dose-1 count reported exactly `weeks`
/// earlier for the same location and group.
///
/// Lookups read the input set, never partially adjusted records. A dose-2
/// record with no dose-1 match passes through untouched.
pub fn add_dose_lag(
    observations: Vec<Observation>,
    config: &DoseLagConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<Observation> {
    let lag = Duration::weeks(config.weeks);
    let first_doses = first_doses_by_key(&observations);

    let mut applied = 0;
    let mut missing = 0;
    let out: Vec<Observation> = observations
        .iter()
        .map(|o| {
            if o.slice.dose != Dose::Second {
                return o.clone();
            }
            let key = (o.real_date() - lag, &o.slice.location, o.slice.group);
            match first_doses.get(&key) {
                Some(dose1) => {
                    applied += 1;
                    Observation {
                        vaccinated: o.vaccinated + dose1.vaccinated,
                        extrapolated: true,
                        ..o.clone()
                    }
                }
                None => {
                    missing += 1;
                    o.clone()
                }
            }
        })
        .collect();

    log::debug!("dose lag: {applied} dose-2 record(s) adjusted, {missing} without a dose-1 match");
    diagnostics.dose_lag_applied += applied;
    diagnostics.dose_lag_missing += missing;
    out
}

type LagKey<'a> = (NaiveDate, &'a Location, Group);

/// One dose-1 record per (real date, location, group). Daily reports win
/// over weekly ones; otherwise the lowest origin wins so the choice does not
/// depend on input order.
fn first_doses_by_key(observations: &[Observation]) -> HashMap<LagKey<'_>, &Observation> {
    let mut by_key: HashMap<LagKey<'_>, &Observation> = HashMap::new();
    for o in observations.iter().filter(|o| o.slice.dose == Dose::First) {
        let key = (o.real_date(), &o.slice.location, o.slice.group);
        by_key
            .entry(key)
            .and_modify(|current| {
                if o.report_rank() < current.report_rank() {
                    *current = o;
                }
            })
            .or_insert(o);
    }
    by_key
}

/// For every dose-2 record, add a copy on the dose-2-plus-wait slice dated
/// `days` later. Copies dated past the latest reported day are marked
/// extrapolated; otherwise they inherit the record's flags.
pub fn add_dose_2_wait(
    observations: Vec<Observation>,
    config: &WaitConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<Observation> {
    let Some(max_date) = latest_reported_date(&observations) else {
        log::debug!("no reported records, skipping wait adjustment");
        return observations;
    };

    let waited: Vec<Observation> = observations
        .iter()
        .filter(|o| o.slice.dose == Dose::Second)
        .map(|o| {
            let source = o.source.shifted(config.days);
            Observation {
                extrapolated: o.extrapolated || source.real_date > max_date,
                slice: o.slice.with_dose(Dose::SecondPlusWait),
                source,
                ..o.clone()
            }
        })
        .collect();

    diagnostics.wait_records += waited.len();
    let mut out = observations;
    out.extend(waited);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Period, Slice, Source};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn obs(real_date: &str, period: Period, dose: Dose, location: Location, n: i64) -> Observation {
        let real_date = date(real_date);
        let mut source = Source::new(period.label(), real_date, period);
        source.real_date = real_date;
        Observation::new(source, n, Slice::new(dose, Group::OVER_80S, location))
    }

    fn lag_config() -> DoseLagConfig {
        DoseLagConfig::default()
    }

    #[test]
    fn lag_adds_first_doses_from_84_days_earlier() {
        let data = vec![
            obs("2021-01-01", Period::Daily, Dose::First, Location::ALL, 500),
            obs("2021-03-26", Period::Daily, Dose::Second, Location::ALL, 20),
        ];
        let mut diag = Diagnostics::default();
        let out = add_dose_lag(data, &lag_config(), &mut diag);
        let second = out.iter().find(|o| o.slice.dose == Dose::Second).unwrap();
        assert_eq!(second.vaccinated, 520);
        assert!(second.extrapolated);
        assert_eq!(diag.dose_lag_applied, 1);
    }

    #[test]
    fn lag_without_match_is_untouched() {
        let data = vec![
            obs("2021-01-02", Period::Daily, Dose::First, Location::ALL, 500),
            obs("2021-03-26", Period::Daily, Dose::Second, Location::ALL, 20),
        ];
        let mut diag = Diagnostics::default();
        let out = add_dose_lag(data.clone(), &lag_config(), &mut diag);
        assert_eq!(out, data);
        assert_eq!(diag.dose_lag_missing, 1);
    }

    #[test]
    fn lag_requires_same_location() {
        let data = vec![
            obs("2021-01-01", Period::Daily, Dose::First, Location::named("London"), 500),
            obs("2021-03-26", Period::Daily, Dose::Second, Location::ALL, 20),
        ];
        let out = add_dose_lag(data, &lag_config(), &mut Diagnostics::default());
        let second = out.iter().find(|o| o.slice.dose == Dose::Second).unwrap();
        assert_eq!(second.vaccinated, 20);
        assert!(!second.extrapolated);
    }

    #[test]
    fn lag_prefers_daily_dose_one() {
        let data = vec![
            obs("2021-01-01", Period::Weekly, Dose::First, Location::ALL, 7000),
            obs("2021-01-01", Period::Daily, Dose::First, Location::ALL, 500),
            obs("2021-03-26", Period::Daily, Dose::Second, Location::ALL, 20),
        ];
        let out = add_dose_lag(data, &lag_config(), &mut Diagnostics::default());
        let second = out.iter().find(|o| o.slice.dose == Dose::Second).unwrap();
        assert_eq!(second.vaccinated, 520);
    }

    #[test]
    fn wait_shifts_and_flags_future_copies() {
        let data = vec![
            obs("2021-02-01", Period::Daily, Dose::Second, Location::ALL, 10),
            obs("2021-02-20", Period::Daily, Dose::First, Location::ALL, 99),
        ];
        let mut diag = Diagnostics::default();
        let out = add_dose_2_wait(data.clone(), &WaitConfig::default(), &mut diag);
        assert_eq!(out.len(), 3);
        assert_eq!(&out[..2], &data[..]);

        let waited = &out[2];
        assert_eq!(waited.slice.dose, Dose::SecondPlusWait);
        assert_eq!(waited.real_date(), date("2021-02-15"));
        assert_eq!(waited.source.data_date, data[0].source.data_date);
        assert!(!waited.extrapolated);
        assert_eq!(diag.wait_records, 1);

        let later = vec![obs("2021-02-10", Period::Daily, Dose::Second, Location::ALL, 10)];
        let out = add_dose_2_wait(later, &WaitConfig { days: 7 }, &mut Diagnostics::default());
        assert!(out[1].extrapolated);
    }

    #[test]
    fn wait_keeps_interpolated_flag() {
        let mut data = vec![obs("2021-02-01", Period::Daily, Dose::Second, Location::ALL, 10)];
        data[0].interpolated = true;
        let out = add_dose_2_wait(data, &WaitConfig::default(), &mut Diagnostics::default());
        assert!(out[1].interpolated);
    }

    #[test]
    fn wait_on_projections_only_is_a_no_op() {
        let mut data = vec![obs("2021-02-01", Period::Daily, Dose::Second, Location::ALL, 10)];
        data[0].extrapolated = true;
        let out = add_dose_2_wait(data.clone(), &WaitConfig::default(), &mut Diagnostics::default());
        assert_eq!(out, data);
    }
}
