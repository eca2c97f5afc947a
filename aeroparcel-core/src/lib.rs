//! Core types for driving adiabatic cloud-parcel runs
//!
//! The parcel physics is delegated to an external model behind the
//! [`backend::ParcelBackend`] trait. This crate owns what happens around it:
//! validating the aerosol and thermodynamic inputs, translating lognormal
//! modes into backend species, extracting the parcel trajectory, and reducing
//! the per-mode activation into an activated fraction and CDNC.

pub mod aerosol;
pub mod backend;
pub mod distribution;
pub mod errors;
pub mod run;
pub mod settings;
pub mod translate;

/// Floating point type used throughout
pub type FloatValue = f64;

pub use aerosol::{AerosolMode, InitialState};
pub use distribution::{discretize, SizeDistribution};
pub use errors::{ParcelError, ParcelResult, Stage};
pub use run::{run, ParcelRunner, RunResult};
pub use settings::{Scenario, SolverSettings};
