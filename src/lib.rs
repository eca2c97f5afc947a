//! Adiabatic cloud-parcel runs with a pyrcel backend
//!
//! Re-exports the backend-agnostic [`core`] types and the [`pyrcel`]
//! backend so that applications depend on a single crate.

pub use aeroparcel_core as core;
pub use aeroparcel_pyrcel as pyrcel;

pub use aeroparcel_core::{
    AerosolMode, InitialState, ParcelError, ParcelResult, ParcelRunner, RunResult, Scenario,
    SolverSettings, Stage,
};
pub use aeroparcel_pyrcel::{initialize, PyrcelBackend};
