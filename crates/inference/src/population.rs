//! Population ceilings per age band.

use std::collections::BTreeMap;

use crate::error::InferenceError;
use crate::model::Group;

/// Population-lookup capability keyed by age band.
pub trait PopulationLookup {
    fn population(&self, group: &Group) -> Option<u64>;

    /// `vaccinated` clipped at the band's population, when known.
    fn cap(&self, group: &Group, vaccinated: i64) -> i64 {
        match self.population(group) {
            Some(population) => vaccinated.min(population as i64),
            None => vaccinated,
        }
    }
}

/// NHS England estimates used in the March 2021 weekly publication.
const ENGLAND_2021: [(Group, u64); 10] = [
    (Group::new(0, Some(15)), 10_816_679),
    (Group::new(16, Some(44)), 20_710_807),
    (Group::new(45, Some(49)), 3_715_812),
    (Group::new(50, Some(54)), 3_907_461),
    (Group::new(55, Some(59)), 3_670_651),
    (Group::new(60, Some(64)), 3_111_835),
    (Group::new(65, Some(69)), 2_796_740),
    (Group::new(70, Some(74)), 2_779_326),
    (Group::new(75, Some(79)), 1_940_686),
    (Group::OVER_80S, 2_836_964),
];

/// Disjoint bands plus every cumulative `[0, U]` band their prefix sums define.
#[derive(Debug, Clone, Default)]
pub struct PopulationTable {
    by_group: BTreeMap<Group, u64>,
}

impl PopulationTable {
    pub fn england_2021() -> Self {
        let mut bands = ENGLAND_2021.to_vec();
        bands.sort_by_key(|(g, _)| g.age_lower);
        Self::from_sorted(&bands)
    }

    /// Build from disjoint bands. Overlapping bands are rejected.
    pub fn from_disjoint(
        bands: impl IntoIterator<Item = (Group, u64)>,
    ) -> Result<Self, InferenceError> {
        let mut bands: Vec<(Group, u64)> = bands.into_iter().collect();
        bands.sort_by_key(|(g, _)| (g.age_lower, g.age_upper));

        for pair in bands.windows(2) {
            let (a, b) = (&pair[0].0, &pair[1].0);
            if a.overlaps(b) {
                return Err(InferenceError::ConfigValidation(format!(
                    "population bands {a} and {b} overlap"
                )));
            }
        }

        Ok(Self::from_sorted(&bands))
    }

    fn from_sorted(bands: &[(Group, u64)]) -> Self {
        let mut by_group: BTreeMap<Group, u64> = bands.iter().copied().collect();

        // Prefix sums only make sense while the bands are contiguous from age 0.
        let mut next_age = Some(0);
        let mut running = 0u64;
        for (group, count) in bands {
            if next_age != Some(group.age_lower) {
                break;
            }
            running += count;
            by_group.entry(Group::new(0, group.age_upper)).or_insert(running);
            next_age = group.age_upper.map(|u| u + 1);
        }

        Self { by_group }
    }

    pub fn total(&self) -> Option<u64> {
        self.population(&Group::ALL_AGES)
    }

    pub fn len(&self) -> usize {
        self.by_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_group.is_empty()
    }
}

impl PopulationLookup for PopulationTable {
    fn population(&self, group: &Group) -> Option<u64> {
        self.by_group.get(group).copied()
    }
}
