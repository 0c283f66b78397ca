//! CSV codec for observations and summary reports.

use std::io::{Read, Write};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use vaxtldr_inference::summary::{SeriesPoint, SnapshotRow};
use vaxtldr_inference::{Dose, Group, InferenceError, Location, Observation, Period, Slice, Source};

/// Flat CSV row: one observation with its source and slice inlined.
#[derive(Debug, Serialize, Deserialize)]
struct ObservationRecord {
    origin: String,
    data_date: NaiveDate,
    /// Derived from the period's publication lag when blank.
    #[serde(default)]
    real_date: Option<NaiveDate>,
    period: String,
    dose: String,
    group: String,
    #[serde(default)]
    location: String,
    vaccinated: i64,
    #[serde(default)]
    interpolated: Option<bool>,
    #[serde(default)]
    extrapolated: Option<bool>,
}

#[derive(Debug)]
pub enum RecordError {
    Csv(csv::Error),
    Label { line: u64, source: InferenceError },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv(e) => write!(f, "{e}"),
            Self::Label { line, source } => write!(f, "line {line}: {source}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv(e) => Some(e),
            Self::Label { source, .. } => Some(source),
        }
    }
}

impl From<csv::Error> for RecordError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl ObservationRecord {
    fn into_observation(self) -> Result<Observation, InferenceError> {
        let period: Period = self.period.parse()?;
        let mut source = Source::new(self.origin, self.data_date, period);
        if let Some(real_date) = self.real_date {
            source.real_date = real_date;
        }
        let slice = Slice::new(self.dose.parse()?, self.group.parse()?, Location::from(self.location));
        Ok(Observation {
            source,
            vaccinated: self.vaccinated,
            slice,
            interpolated: self.interpolated.unwrap_or(false),
            extrapolated: self.extrapolated.unwrap_or(false),
        })
    }

    fn from_observation(o: &Observation) -> Self {
        Self {
            origin: o.source.origin.clone(),
            data_date: o.source.data_date,
            real_date: Some(o.source.real_date),
            period: o.period().label().to_string(),
            dose: o.slice.dose.label().to_string(),
            group: o.slice.group.label(),
            location: o.slice.location.label().to_string(),
            vaccinated: o.vaccinated,
            interpolated: Some(o.interpolated),
            extrapolated: Some(o.extrapolated),
        }
    }
}

/// Read observations, one per CSV row, header required.
pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>, RecordError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut observations = Vec::new();
    for row in rdr.records() {
        let raw = row?;
        let line = raw.position().map(|p| p.line()).unwrap_or(0);
        let record: ObservationRecord = raw.deserialize(Some(&headers))?;
        let observation = record
            .into_observation()
            .map_err(|source| RecordError::Label { line, source })?;
        observations.push(observation);
    }
    Ok(observations)
}

/// Write observations sorted by slice, then real date, then source.
pub fn write_observations<W: Write>(writer: W, observations: &[Observation]) -> Result<(), csv::Error> {
    let mut sorted: Vec<&Observation> = observations.iter().collect();
    sorted.sort_by(|a, b| {
        a.slice
            .cmp(&b.slice)
            .then_with(|| a.real_date().cmp(&b.real_date()))
            .then_with(|| a.source.cmp(&b.source))
    });

    let mut wtr = csv::Writer::from_writer(writer);
    for o in sorted {
        wtr.serialize(ObservationRecord::from_observation(o))?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct ReportRow {
    dose: Dose,
    group: String,
    real_date: NaiveDate,
    extrapolated: bool,
    vaccinated: i64,
    population: Option<u64>,
}

pub fn write_snapshot<W: Write>(writer: W, rows: &[SnapshotRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in rows {
        wtr.serialize(ReportRow {
            dose: r.dose,
            group: r.group.label(),
            real_date: r.real_date,
            extrapolated: false,
            vaccinated: r.vaccinated,
            population: r.population,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_series<W: Write>(writer: W, points: &[SeriesPoint]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for p in points {
        wtr.serialize(ReportRow {
            dose: p.dose,
            group: Group::ALL_AGES.label(),
            real_date: p.real_date,
            extrapolated: p.extrapolated,
            vaccinated: p.vaccinated,
            population: p.population,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
