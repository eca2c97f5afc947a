use aeroparcel_core::backend::{
    AerosolHandle, BinnedActivation, IntegrationRequest, LognormalDescriptor, ParcelBackend,
    ParcelConditions, ParcelModelHandle, ParcelOutput,
};
use aeroparcel_core::errors::{BackendError, BackendResult, ParcelError, ParcelResult};
use aeroparcel_core::FloatValue;
use ndarray::ArrayView1;
use numpy::ToPyArray;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use tracing::debug;

use crate::convert::{self, failed};
use crate::interpreter::ensure_initialized;

/// Name of the Python package providing the parcel model
pub const PYRCEL_MODULE: &str = "pyrcel";

/// Parcel backend calling into the `pyrcel` Python package
pub struct PyrcelBackend {
    module: Py<PyModule>,
}

impl PyrcelBackend {
    /// Import `pyrcel` into the embedded interpreter
    ///
    /// Fails with [`ParcelError::NotInitialised`] if [`crate::initialize`]
    /// has not been called, and with [`ParcelError::Config`] if the package
    /// is missing from the Python environment.
    pub fn new() -> ParcelResult<Self> {
        ensure_initialized()?;
        Python::attach(|py| {
            let module = py.import(PYRCEL_MODULE).map_err(|e| {
                ParcelError::Config(format!("could not import '{}': {}", PYRCEL_MODULE, e))
            })?;
            debug!(module = PYRCEL_MODULE, "Imported parcel model package");
            Ok(Self {
                module: module.unbind(),
            })
        })
    }
}

/// A `pyrcel.Lognorm` instance
pub struct PyrcelDistribution(Py<PyAny>);

/// A `pyrcel.AerosolSpecies` with its binning read back eagerly
pub struct PyrcelAerosol {
    label: String,
    species: Py<PyAny>,
    total_number: FloatValue,
    edge_radii: Vec<FloatValue>,
    number: Vec<FloatValue>,
}

impl AerosolHandle for PyrcelAerosol {
    fn label(&self) -> &str {
        &self.label
    }

    fn total_number(&self) -> FloatValue {
        self.total_number
    }

    fn bin_edge_radii(&self) -> &[FloatValue] {
        &self.edge_radii
    }

    fn bin_number_concentrations(&self) -> &[FloatValue] {
        &self.number
    }
}

/// A `pyrcel.ParcelModel` instance
pub struct PyrcelModel {
    model: Py<PyAny>,
    labels: Vec<String>,
}

impl ParcelModelHandle for PyrcelModel {
    /// The pandas DataFrame / dict of DataFrames returned by `ParcelModel.run`
    type Raw = Py<PyAny>;

    fn run(&self, request: &IntegrationRequest) -> BackendResult<ParcelOutput<Py<PyAny>>> {
        Python::attach(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("solver", &request.integrator).map_err(failed)?;
            kwargs.set_item("output_fmt", "dataframes").map_err(failed)?;
            kwargs.set_item("terminate", request.terminate).map_err(failed)?;
            kwargs.set_item("max_steps", request.max_steps).map_err(failed)?;
            if let Some(dt) = request.solver_dt {
                kwargs.set_item("solver_dt", dt).map_err(failed)?;
            }
            for (key, value) in &request.solver_args {
                let value = pythonize::pythonize(py, value).map_err(|e| failed(e.into()))?;
                kwargs.set_item(key, value).map_err(failed)?;
            }

            debug!(
                end_time = request.end_time,
                output_interval = request.output_interval,
                solver = %request.integrator,
                "Integrating parcel model"
            );
            let output = self
                .model
                .bind(py)
                .call_method(
                    "run",
                    (request.end_time, request.output_interval),
                    Some(&kwargs),
                )
                .map_err(failed)?;
            let (trajectory, traces): (Bound<'_, PyAny>, Bound<'_, PyAny>) = output
                .extract()
                .map_err(|e| BackendError::shape("model output", e.to_string()))?;

            Ok(ParcelOutput {
                trajectory: convert::trajectory_table(&trajectory)?,
                aerosol_traces: convert::aerosol_traces(&traces, &self.labels)?,
                raw_trajectory: trajectory.unbind(),
                raw_aerosol_traces: traces.unbind(),
            })
        })
    }
}

impl ParcelBackend for PyrcelBackend {
    type Distribution = PyrcelDistribution;
    type Aerosol = PyrcelAerosol;
    type Model = PyrcelModel;

    fn lognormal_mode(
        &self,
        descriptor: &LognormalDescriptor,
    ) -> BackendResult<Self::Distribution> {
        Python::attach(|py| {
            let distribution = self
                .module
                .bind(py)
                .getattr("Lognorm")
                .and_then(|cls| {
                    cls.call1((
                        descriptor.mu,
                        descriptor.sigma,
                        descriptor.number_concentration,
                    ))
                })
                .map_err(failed)?;
            Ok(PyrcelDistribution(distribution.unbind()))
        })
    }

    fn aerosol_species(
        &self,
        label: &str,
        distribution: Self::Distribution,
        hygroscopicity: FloatValue,
        bins: usize,
    ) -> BackendResult<Self::Aerosol> {
        Python::attach(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("kappa", hygroscopicity).map_err(failed)?;
            kwargs.set_item("bins", bins).map_err(failed)?;

            let species = self
                .module
                .bind(py)
                .getattr("AerosolSpecies")
                .and_then(|cls| cls.call((label, distribution.0.bind(py)), Some(&kwargs)))
                .map_err(failed)?;

            let total_number: FloatValue = species
                .getattr("total_N")
                .and_then(|n| n.extract())
                .map_err(failed)?;
            let edge_radii = convert::bin_edge_radii(&species)?;
            let number = convert::bin_number_concentrations(&species)?;
            debug!(
                label = label,
                bins = number.len(),
                total_number = total_number,
                "Built aerosol species"
            );

            Ok(PyrcelAerosol {
                label: label.to_string(),
                species: species.unbind(),
                total_number,
                edge_radii,
                number,
            })
        })
    }

    fn parcel_model(
        &self,
        aerosols: &[Self::Aerosol],
        conditions: &ParcelConditions,
        console: bool,
    ) -> BackendResult<Self::Model> {
        Python::attach(|py| {
            let species = PyList::new(py, aerosols.iter().map(|a| a.species.bind(py)))
                .map_err(failed)?;
            let kwargs = PyDict::new(py);
            kwargs.set_item("accom", conditions.accommodation).map_err(failed)?;
            kwargs.set_item("console", console).map_err(failed)?;

            let model = self
                .module
                .bind(py)
                .getattr("ParcelModel")
                .and_then(|cls| {
                    cls.call(
                        (
                            species,
                            conditions.updraft_velocity,
                            conditions.temperature,
                            conditions.saturation,
                            conditions.pressure,
                        ),
                        Some(&kwargs),
                    )
                })
                .map_err(failed)?;

            Ok(PyrcelModel {
                model: model.unbind(),
                labels: aerosols.iter().map(|a| a.label.clone()).collect(),
            })
        })
    }

    fn binned_activation(
        &self,
        max_supersaturation: FloatValue,
        temperature: FloatValue,
        wet_radii: ArrayView1<'_, FloatValue>,
        aerosol: &Self::Aerosol,
    ) -> BackendResult<BinnedActivation> {
        Python::attach(|py| {
            let radii = wet_radii.to_pyarray(py);
            let result = self
                .module
                .bind(py)
                .call_method1(
                    "binned_activation",
                    (
                        max_supersaturation,
                        temperature,
                        radii,
                        aerosol.species.bind(py),
                    ),
                )
                .map_err(failed)?;
            convert::binned_activation(&result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::initialize;

    #[test]
    fn test_missing_package_is_config_error() {
        initialize();
        match PyrcelBackend::new() {
            // pyrcel installed, nothing to check
            Ok(_) => {}
            Err(err) => {
                assert!(matches!(err, ParcelError::Config(_)), "got {:?}", err);
                assert!(err.to_string().contains(PYRCEL_MODULE));
                assert_eq!(err.stage(), None);
            }
        }
    }
}
