//! Boundary to the external parcel-model library
//!
//! The parcel physics (condensational growth, the stiff ODE integrator and
//! the activation criteria) live in an external library. The traits in this
//! module describe the handful of calls the runner needs so that the
//! aggregation logic can be driven by either the real library or a fake.
//!
//! Implementations convert any loosely-typed foreign values into the records
//! defined here as soon as they cross the boundary.

use crate::errors::{BackendError, BackendResult};
use crate::FloatValue;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lognormal distribution parameters in the model's own convention
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LognormalDescriptor {
    /// Geometric mean radius (μm)
    pub mu: FloatValue,
    /// Geometric standard deviation
    pub sigma: FloatValue,
    /// Total number concentration (cm⁻³)
    pub number_concentration: FloatValue,
}

/// Initial conditions handed to the parcel model constructor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParcelConditions {
    pub updraft_velocity: FloatValue,
    pub temperature: FloatValue,
    pub saturation: FloatValue,
    pub pressure: FloatValue,
    pub accommodation: FloatValue,
}

/// Arguments of a single integration
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationRequest {
    /// End time (s)
    pub end_time: FloatValue,
    /// Output interval (s)
    pub output_interval: FloatValue,
    /// Integrator name understood by the backend
    pub integrator: String,
    /// Stop once the parcel reaches equilibrium supersaturation
    pub terminate: bool,
    /// Maximum number of internal steps per output interval
    pub max_steps: usize,
    /// Internal solver step (s), backend default when `None`
    pub solver_dt: Option<FloatValue>,
    /// Additional integrator keywords passed through unchanged
    pub solver_args: HashMap<String, toml::Value>,
}

/// Aerosol species as discretised by the backend
pub trait AerosolHandle {
    fn label(&self) -> &str;

    /// Total number concentration after binning (cm⁻³)
    ///
    /// May differ slightly from the requested concentration because the
    /// backend truncates the distribution tails.
    fn total_number(&self) -> FloatValue;

    /// Bin edge radii (m), `bins + 1` values
    fn bin_edge_radii(&self) -> &[FloatValue];

    /// Number concentration per bin (cm⁻³), `bins` values
    fn bin_number_concentrations(&self) -> &[FloatValue];
}

/// A constructed parcel model ready to be integrated
pub trait ParcelModelHandle {
    /// Opaque raw output handed back to callers untouched
    type Raw;

    fn run(&self, request: &IntegrationRequest) -> BackendResult<ParcelOutput<Self::Raw>>;
}

/// The external parcel-model library
pub trait ParcelBackend {
    type Distribution;
    type Aerosol: AerosolHandle;
    type Model: ParcelModelHandle;

    fn lognormal_mode(&self, descriptor: &LognormalDescriptor)
        -> BackendResult<Self::Distribution>;

    fn aerosol_species(
        &self,
        label: &str,
        distribution: Self::Distribution,
        hygroscopicity: FloatValue,
        bins: usize,
    ) -> BackendResult<Self::Aerosol>;

    fn parcel_model(
        &self,
        aerosols: &[Self::Aerosol],
        conditions: &ParcelConditions,
        console: bool,
    ) -> BackendResult<Self::Model>;

    /// Evaluate activation of a binned aerosol population
    ///
    /// `wet_radii` are the per-bin wet radii of the species at the time of
    /// interest, `max_supersaturation` is a fraction (not percent).
    fn binned_activation(
        &self,
        max_supersaturation: FloatValue,
        temperature: FloatValue,
        wet_radii: ArrayView1<'_, FloatValue>,
        aerosol: &Self::Aerosol,
    ) -> BackendResult<BinnedActivation>;
}

/// Raw output type produced by a backend's parcel model
pub type RawOutput<B> = <<B as ParcelBackend>::Model as ParcelModelHandle>::Raw;

/// Result of a binned activation calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinnedActivation {
    /// Fraction of particles whose critical supersaturation was exceeded
    pub equilibrium_fraction: FloatValue,
    /// Fraction of particles that also grew past their critical radius
    pub kelvin_number: FloatValue,
    /// Ratio of kinetically limited to equilibrium activation
    pub accommodation_factor: FloatValue,
    /// Fraction of equilibrium-activated particles that are kinetically activated
    pub activation_ratio: FloatValue,
}

/// Table of parcel state, one row per output step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryTable {
    columns: Vec<String>,
    values: Array2<FloatValue>,
}

impl TrajectoryTable {
    /// Build a table, checking that there is one header per column
    pub fn new(columns: Vec<String>, values: Array2<FloatValue>) -> BackendResult<Self> {
        if columns.len() != values.ncols() {
            return Err(BackendError::shape(
                "trajectory",
                format!(
                    "{} column names for {} columns",
                    columns.len(),
                    values.ncols()
                ),
            ));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<FloatValue> {
        &self.values
    }

    /// Number of output steps
    pub fn n_steps(&self) -> usize {
        self.values.nrows()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, FloatValue>> {
        self.position(name).map(|i| self.values.column(i))
    }

    pub fn column_at(&self, index: usize) -> Option<ArrayView1<'_, FloatValue>> {
        (index < self.values.ncols()).then(|| self.values.column(index))
    }
}

/// Everything a single integration returns
#[derive(Debug, Clone)]
pub struct ParcelOutput<R> {
    pub trajectory: TrajectoryTable,
    /// Per-species traces keyed by label; rows are output steps, columns bins
    pub aerosol_traces: HashMap<String, Array2<FloatValue>>,
    pub raw_trajectory: R,
    pub raw_aerosol_traces: R,
}
