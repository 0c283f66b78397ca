//! `vaxtldr-inference` — Vaccination report reconciliation and inference engine.
//!
//! Pure engine crate: receives parsed observations, returns one consistent
//! series per (dose, age group, location) slice, with projections.
//! No CLI or IO dependencies.

pub mod adjust;
pub mod age;
pub mod config;
pub mod cumulative;
pub mod deaggregate;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod extrapolate;
pub mod interpolate;
pub mod model;
pub mod population;
pub mod summary;
pub mod validate;

pub use config::{ExtrapolationStrategy, InferenceConfig};
pub use diagnostics::Diagnostics;
pub use engine::{run, InferenceResult, RunMeta};
pub use error::InferenceError;
pub use model::{Dose, Group, Location, Observation, Period, Slice, Source};
pub use population::{PopulationLookup, PopulationTable};
