//! Conversion between running totals and per-period deltas, per slice.

use std::collections::BTreeMap;

use crate::model::{Observation, Slice};

/// Per-slice series in chronological order.
fn series_by_slice(observations: Vec<Observation>) -> BTreeMap<Slice, Vec<Observation>> {
    let mut by_slice: BTreeMap<Slice, Vec<Observation>> = BTreeMap::new();
    for o in observations {
        by_slice.entry(o.slice.clone()).or_default().push(o);
    }
    for series in by_slice.values_mut() {
        series.sort_by(|a, b| {
            a.real_date()
                .cmp(&b.real_date())
                .then_with(|| a.source.cmp(&b.source))
        });
    }
    by_slice
}

/// Running totals to deltas. The first record of each slice is the baseline
/// and passes through unchanged. Deltas may be negative when a source
/// revised its total downwards.
pub fn make_non_cumulative(observations: Vec<Observation>) -> Vec<Observation> {
    let mut out = Vec::with_capacity(observations.len());
    for (_, series) in series_by_slice(observations) {
        let mut previous: Option<i64> = None;
        for o in series {
            let total = o.vaccinated;
            let vaccinated = match previous {
                Some(prev) => total - prev,
                None => total,
            };
            previous = Some(total);
            out.push(Observation { vaccinated, ..o });
        }
    }
    out
}

/// Deltas to running totals; inverse of [`make_non_cumulative`].
pub fn make_cumulative(observations: Vec<Observation>) -> Vec<Observation> {
    let mut out = Vec::with_capacity(observations.len());
    for (_, series) in series_by_slice(observations) {
        let mut total = 0i64;
        for o in series {
            total += o.vaccinated;
            out.push(Observation {
                vaccinated: total,
                ..o
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dose, Group, Location, Period, Source};
    use chrono::{Duration, NaiveDate};

    fn series(dose: Dose, totals: &[i64]) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2021, 1, 10).unwrap();
        totals
            .iter()
            .enumerate()
            .map(|(i, n)| {
                Observation::new(
                    Source::new("daily", start + Duration::days(i as i64), Period::Daily),
                    *n,
                    Slice::new(dose, Group::OVER_80S, Location::ALL),
                )
            })
            .collect()
    }

    fn counts(observations: &[Observation], dose: Dose) -> Vec<i64> {
        observations
            .iter()
            .filter(|o| o.slice.dose == dose)
            .map(|o| o.vaccinated)
            .collect()
    }

    #[test]
    fn deltas_keep_baseline() {
        let out = make_non_cumulative(series(Dose::First, &[100, 150, 180]));
        assert_eq!(counts(&out, Dose::First), vec![100, 50, 30]);
    }

    #[test]
    fn negative_deltas_are_kept() {
        let out = make_non_cumulative(series(Dose::First, &[100, 90]));
        assert_eq!(counts(&out, Dose::First), vec![100, -10]);
    }

    #[test]
    fn unsorted_input_is_ordered_by_real_date() {
        let mut data = series(Dose::First, &[100, 150, 180]);
        data.reverse();
        let out = make_non_cumulative(data);
        assert_eq!(counts(&out, Dose::First), vec![100, 50, 30]);
    }

    #[test]
    fn slices_are_independent() {
        let mut data = series(Dose::First, &[100, 150]);
        data.extend(series(Dose::Second, &[10, 40]));
        let out = make_non_cumulative(data);
        assert_eq!(counts(&out, Dose::First), vec![100, 50]);
        assert_eq!(counts(&out, Dose::Second), vec![10, 30]);
    }

    #[test]
    fn cumulative_keeps_flags() {
        let mut data = series(Dose::First, &[5, 5]);
        data[1].extrapolated = true;
        let out = make_cumulative(data);
        assert_eq!(counts(&out, Dose::First), vec![5, 10]);
        assert!(!out[0].extrapolated);
        assert!(out[1].extrapolated);
    }

    #[test]
    fn round_trip() {
        let data = series(Dose::First, &[100, 150, 150, 400]);
        assert_eq!(make_cumulative(make_non_cumulative(data.clone())), data);
    }
}
