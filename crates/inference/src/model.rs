use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Publication schedule of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
}

impl Period {
    /// Gap between the nominal data date and the day the figures describe.
    pub fn publication_lag(self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::days(4),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            // "total" reports were published on the weekly schedule
            "weekly" | "total" => Ok(Self::Weekly),
            _ => Err(InferenceError::LabelParse {
                kind: "period",
                value: s.into(),
            }),
        }
    }
}

/// Provenance of one report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Source {
    pub origin: String,
    pub data_date: NaiveDate,
    pub real_date: NaiveDate,
    pub period: Period,
}

impl Source {
    /// Source whose `real_date` is derived from the period's publication lag.
    pub fn new(origin: impl Into<String>, data_date: NaiveDate, period: Period) -> Self {
        Self {
            origin: origin.into(),
            data_date,
            real_date: data_date - period.publication_lag(),
            period,
        }
    }

    /// Synthetic daily source for a projected value.
    pub fn projected(real_date: NaiveDate) -> Self {
        Self {
            origin: "prediction".into(),
            data_date: real_date,
            real_date,
            period: Period::Daily,
        }
    }

    /// Same source with `real_date` moved by `days`.
    pub fn shifted(&self, days: i64) -> Self {
        Self {
            real_date: self.real_date + Duration::days(days),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Slice dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dose {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
    /// Second dose plus the protection wait. Never present in raw sources.
    #[serde(rename = "2_wait")]
    SecondPlusWait,
}

impl Dose {
    pub fn is_all(self) -> bool {
        self == Self::All
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::First => "1",
            Self::Second => "2",
            Self::SecondPlusWait => "2_wait",
        }
    }
}

impl fmt::Display for Dose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Dose {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "1" | "1st dose" => Ok(Self::First),
            "2" | "2nd dose" => Ok(Self::Second),
            "2_wait" => Ok(Self::SecondPlusWait),
            _ => Err(InferenceError::LabelParse {
                kind: "dose",
                value: s.into(),
            }),
        }
    }
}

/// Inclusive age band. `age_upper = None` is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Group {
    pub age_lower: u32,
    pub age_upper: Option<u32>,
}

impl Group {
    pub const ALL_AGES: Group = Group::new(0, None);
    pub const UNDER_80S: Group = Group::new(0, Some(79));
    pub const OVER_80S: Group = Group::new(80, None);

    pub const fn new(age_lower: u32, age_upper: Option<u32>) -> Self {
        Self {
            age_lower,
            age_upper,
        }
    }

    pub fn is_all(&self) -> bool {
        *self == Self::ALL_AGES
    }

    /// Closed-interval intersection, unbounded upper treated as +inf.
    pub fn overlaps(&self, other: &Group) -> bool {
        let upper = |g: &Group| g.age_upper.unwrap_or(u32::MAX);
        self.age_lower <= upper(other) && other.age_lower <= upper(self)
    }

    pub fn label(&self) -> String {
        match (self.age_lower, self.age_upper) {
            (0, None) => "all".into(),
            (0, Some(upper)) => format!("<={upper}"),
            (lower, None) => format!(">={lower}"),
            (lower, Some(upper)) => format!("{lower}-{upper}"),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Group {
    type Err = InferenceError;

    /// Accepts report labels ("Under 80", "75-79", "80+") and rendered labels
    /// ("<=79", ">=80", "all").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InferenceError::LabelParse {
            kind: "group",
            value: s.into(),
        };
        let age = |text: &str| text.trim().parse::<u32>().map_err(|_| err());

        let text = s.trim().to_ascii_lowercase();
        if text == "all" || text == "all ages" {
            return Ok(Self::ALL_AGES);
        }
        if let Some(rest) = text.strip_prefix("under") {
            let bound = age(rest)?;
            let upper = bound.checked_sub(1).ok_or_else(err)?;
            return Ok(Self::new(0, Some(upper)));
        }
        if let Some(rest) = text.strip_prefix("<=") {
            return Ok(Self::new(0, Some(age(rest)?)));
        }
        if let Some(rest) = text.strip_prefix(">=") {
            return Ok(Self::new(age(rest)?, None));
        }
        if let Some(rest) = text.strip_suffix('+') {
            return Ok(Self::new(age(rest)?, None));
        }
        if let Some((lower, upper)) = text.split_once('-') {
            let (lower, upper) = (age(lower)?, age(upper)?);
            if lower > upper {
                return Err(err());
            }
            return Ok(Self::new(lower, Some(upper)));
        }
        Err(err())
    }
}

impl From<Group> for String {
    fn from(group: Group) -> Self {
        group.label()
    }
}

impl TryFrom<String> for Group {
    type Error = InferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Region name; `None` is the all-regions aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Location(Option<String>);

impl Location {
    pub const ALL: Location = Location(None);

    pub fn named(name: impl Into<String>) -> Self {
        Self(Some(name.into()))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_all(&self) -> bool {
        self.0.is_none()
    }

    pub fn label(&self) -> &str {
        self.name().unwrap_or("all")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::ALL
        } else {
            Self::named(trimmed)
        }
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.label().to_string()
    }
}

// ---------------------------------------------------------------------------
// Slice
// ---------------------------------------------------------------------------

/// Breakdown key. Structural equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slice {
    pub dose: Dose,
    pub group: Group,
    pub location: Location,
}

impl Slice {
    pub fn new(dose: Dose, group: Group, location: Location) -> Self {
        Self {
            dose,
            group,
            location,
        }
    }

    pub fn with_dose(&self, dose: Dose) -> Self {
        Self {
            dose,
            ..self.clone()
        }
    }

    pub fn with_group(&self, group: Group) -> Self {
        Self {
            group,
            ..self.clone()
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(dose={}, group={}, location={})",
            self.dose, self.group, self.location
        )
    }
}

/// One of the three slice axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Dose,
    Group,
    Location,
}

/// A value on one slice axis. The variant names the axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DimensionValue {
    Dose(Dose),
    Group(Group),
    Location(Location),
}

impl Dimension {
    /// Deaggregation order.
    pub const ALL: [Dimension; 3] = [Self::Dose, Self::Group, Self::Location];

    pub fn name(self) -> &'static str {
        match self {
            Self::Dose => "dose",
            Self::Group => "group",
            Self::Location => "location",
        }
    }

    pub fn value(self, slice: &Slice) -> DimensionValue {
        match self {
            Self::Dose => DimensionValue::Dose(slice.dose),
            Self::Group => DimensionValue::Group(slice.group),
            Self::Location => DimensionValue::Location(slice.location.clone()),
        }
    }

    pub fn is_aggregate(self, slice: &Slice) -> bool {
        match self {
            Self::Dose => slice.dose.is_all(),
            Self::Group => slice.group.is_all(),
            Self::Location => slice.location.is_all(),
        }
    }

    pub fn others(self) -> [Dimension; 2] {
        match self {
            Self::Dose => [Self::Group, Self::Location],
            Self::Group => [Self::Dose, Self::Location],
            Self::Location => [Self::Dose, Self::Group],
        }
    }

    /// Both slices carry identical values on the two other axes.
    pub fn agrees_on_others(self, a: &Slice, b: &Slice) -> bool {
        self.others().iter().all(|d| d.value(a) == d.value(b))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DimensionValue {
    /// Copy of `slice` with this value substituted on its axis.
    pub fn apply_to(&self, slice: &Slice) -> Slice {
        let mut out = slice.clone();
        match self {
            Self::Dose(dose) => out.dose = *dose,
            Self::Group(group) => out.group = *group,
            Self::Location(location) => out.location = location.clone(),
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One reported, derived or projected count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub source: Source,
    pub vaccinated: i64,
    pub slice: Slice,
    #[serde(default)]
    pub interpolated: bool,
    #[serde(default)]
    pub extrapolated: bool,
}

impl Observation {
    /// Raw record as produced by a parser: no provenance flags.
    pub fn new(source: Source, vaccinated: i64, slice: Slice) -> Self {
        Self {
            source,
            vaccinated,
            slice,
            interpolated: false,
            extrapolated: false,
        }
    }

    pub fn real_date(&self) -> NaiveDate {
        self.source.real_date
    }

    pub fn period(&self) -> Period {
        self.source.period
    }

    /// Rank among records for the same slice and day, lowest wins: daily
    /// reports before weekly ones, then by origin.
    pub fn report_rank(&self) -> (bool, &str) {
        (self.period() != Period::Daily, self.source.origin.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
