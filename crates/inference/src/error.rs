use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Dimension, Dose, Slice};

#[derive(Debug, Error)]
pub enum InferenceError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad tolerance, overlapping population bands, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A dose, group, period or location label could not be read.
    #[error("cannot parse {kind} label '{value}'")]
    LabelParse { kind: &'static str, value: String },
    /// An aggregate disagrees with the sum of its reported parts beyond tolerance.
    #[error(
        "inconsistent {dimension} breakdown for {slice} on {real_date}: aggregate {aggregate} vs. parts sum {parts_sum}"
    )]
    InconsistentBreakdown {
        dimension: Dimension,
        slice: Slice,
        real_date: NaiveDate,
        aggregate: i64,
        parts_sum: i64,
    },
    /// Ratio blending produced a negative count; the weekly shares are corrupt.
    #[error("negative interpolated count {value} for {slice} on {real_date}")]
    NegativeInterpolation {
        slice: Slice,
        real_date: NaiveDate,
        value: f64,
    },
    /// The rollout model scheduled a negative number of doses.
    #[error("negative allocation {value} for dose {dose} on {date}")]
    NegativeAllocation {
        dose: Dose,
        date: NaiveDate,
        value: f64,
    },
}

impl InferenceError {
    /// Integrity violations mean the input or the model assumptions are broken.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::InconsistentBreakdown { .. }
                | Self::NegativeInterpolation { .. }
                | Self::NegativeAllocation { .. }
        )
    }
}
