//! Collapse of age groups into the all-ages slice.

use std::collections::BTreeMap;

use crate::model::{Dose, Group, Location, Observation, Slice, Source};

/// Everything that identifies a record except its age group.
type AgeKey = (Location, Dose, Source, bool, bool);

/// Sum counts over age groups, keyed by every other dimension and both flags.
///
/// Input already on all-ages comes back unchanged apart from order.
pub fn aggregate_ages(observations: &[Observation]) -> Vec<Observation> {
    let mut totals: BTreeMap<AgeKey, (i64, Vec<Group>)> = BTreeMap::new();
    for o in observations {
        let key = (
            o.slice.location.clone(),
            o.slice.dose,
            o.source.clone(),
            o.extrapolated,
            o.interpolated,
        );
        let (total, groups) = totals.entry(key).or_default();
        *total += o.vaccinated;
        groups.push(o.slice.group);
    }

    totals
        .into_iter()
        .map(|((location, dose, source, extrapolated, interpolated), (vaccinated, groups))| {
            if let Some((a, b)) = first_overlap(&groups) {
                log::warn!(
                    "summing overlapping age groups {a} and {b} for dose {dose} at {location} on {}",
                    source.real_date
                );
            }
            Observation {
                source,
                vaccinated,
                slice: Slice::new(dose, Group::ALL_AGES, location),
                interpolated,
                extrapolated,
            }
        })
        .collect()
}

fn first_overlap(groups: &[Group]) -> Option<(Group, Group)> {
    groups.iter().enumerate().find_map(|(i, a)| {
        groups[i + 1..]
            .iter()
            .find(|b| a.overlaps(b))
            .map(|b| (*a, *b))
    })
}
