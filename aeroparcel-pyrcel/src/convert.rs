//! Conversion of pyrcel return values into typed records

use aeroparcel_core::backend::{BinnedActivation, TrajectoryTable};
use aeroparcel_core::errors::{BackendError, BackendResult};
use aeroparcel_core::FloatValue;
use ndarray::Array2;
use numpy::{PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};
use std::collections::HashMap;

/// pyrcel reports bin edges in micrometres
const MICROMETRE: FloatValue = 1e-6;
/// pyrcel reports per-bin concentrations per cubic metre
const PER_M3_TO_PER_CM3: FloatValue = 1e-6;

pub(crate) fn failed(err: PyErr) -> BackendError {
    BackendError::Failed(err.to_string())
}

fn float_vec(value: &Bound<'_, PyAny>, what: &str) -> BackendResult<Vec<FloatValue>> {
    let py = value.py();
    let numpy = py.import("numpy").map_err(failed)?;
    let kwargs = PyDict::new(py);
    kwargs.set_item("dtype", "float64").map_err(failed)?;
    let array = numpy
        .call_method("asarray", (value,), Some(&kwargs))
        .map_err(failed)?;
    let array: PyReadonlyArray1<'_, FloatValue> = array
        .extract()
        .map_err(|e| BackendError::shape(what, e.to_string()))?;
    Ok(array.as_array().to_vec())
}

/// Bin edge radii (m) of a pyrcel `AerosolSpecies`
pub(crate) fn bin_edge_radii(species: &Bound<'_, PyAny>) -> BackendResult<Vec<FloatValue>> {
    let rs = species.getattr("rs").map_err(failed)?;
    Ok(float_vec(&rs, "bin edges")?
        .into_iter()
        .map(|r| r * MICROMETRE)
        .collect())
}

/// Per-bin number concentrations (cm⁻³) of a pyrcel `AerosolSpecies`
pub(crate) fn bin_number_concentrations(
    species: &Bound<'_, PyAny>,
) -> BackendResult<Vec<FloatValue>> {
    let nis = species.getattr("Nis").map_err(failed)?;
    Ok(float_vec(&nis, "bin number concentrations")?
        .into_iter()
        .map(|n| n * PER_M3_TO_PER_CM3)
        .collect())
}

fn frame_values(frame: &Bound<'_, PyAny>, what: &str) -> BackendResult<Array2<FloatValue>> {
    let kwargs = PyDict::new(frame.py());
    kwargs.set_item("dtype", "float64").map_err(failed)?;
    let values = frame
        .call_method("to_numpy", (), Some(&kwargs))
        .map_err(failed)?;
    let values: PyReadonlyArray2<'_, FloatValue> = values
        .extract()
        .map_err(|e| BackendError::shape(what, e.to_string()))?;
    Ok(values.as_array().to_owned())
}

/// Convert the parcel trajectory DataFrame, keeping its column headers
pub(crate) fn trajectory_table(frame: &Bound<'_, PyAny>) -> BackendResult<TrajectoryTable> {
    let columns: Vec<String> = frame
        .getattr("columns")
        .and_then(|c| c.call_method0("tolist"))
        .and_then(|c| c.extract())
        .map_err(|e| BackendError::shape("trajectory columns", e.to_string()))?;
    TrajectoryTable::new(columns, frame_values(frame, "trajectory")?)
}

/// Convert the per-species trace DataFrames for the given labels
pub(crate) fn aerosol_traces(
    traces: &Bound<'_, PyAny>,
    labels: &[String],
) -> BackendResult<HashMap<String, Array2<FloatValue>>> {
    let traces = traces
        .downcast::<PyDict>()
        .map_err(|e| BackendError::shape("aerosol traces", e.to_string()))?;

    let mut converted = HashMap::with_capacity(labels.len());
    for label in labels {
        let frame = traces
            .get_item(label)
            .map_err(failed)?
            .ok_or_else(|| {
                BackendError::shape("aerosol traces", format!("no trace for '{}'", label))
            })?;
        converted.insert(
            label.clone(),
            frame_values(&frame, &format!("trace of '{}'", label))?,
        );
    }
    Ok(converted)
}

/// Unpack the `(eq_frac, kn_frac, alpha, phi)` tuple of `binned_activation`
pub(crate) fn binned_activation(result: &Bound<'_, PyAny>) -> BackendResult<BinnedActivation> {
    let values = result
        .downcast::<PyTuple>()
        .map_err(|e| BackendError::shape("binned activation", e.to_string()))?;
    if values.len() != 4 {
        return Err(BackendError::shape(
            "binned activation",
            format!("expected 4 values, got {}", values.len()),
        ));
    }
    let item = |i: usize| -> BackendResult<FloatValue> {
        values
            .get_item(i)
            .and_then(|v| v.extract::<FloatValue>())
            .map_err(|e| BackendError::shape("binned activation", e.to_string()))
    };

    Ok(BinnedActivation {
        equilibrium_fraction: item(0)?,
        kelvin_number: item(1)?,
        accommodation_factor: item(2)?,
        activation_ratio: item(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::initialize;
    use approx::assert_relative_eq;

    /// Run `f` with the interpreter attached, skipping when numpy is unavailable
    fn with_numpy(f: impl for<'py> FnOnce(Python<'py>) + Send) {
        initialize();
        Python::attach(|py| {
            if py.import("numpy").is_err() {
                eprintln!("numpy not importable, skipping");
                return;
            }
            f(py)
        })
    }

    #[test]
    fn test_binned_activation_tuple() {
        with_numpy(|py| {
            let result = PyTuple::new(py, [0.62, 0.55, 0.887, 0.93]).unwrap();
            let activation = binned_activation(result.as_any()).unwrap();

            assert_eq!(activation.equilibrium_fraction, 0.62);
            assert_eq!(activation.kelvin_number, 0.55);
            assert_eq!(activation.accommodation_factor, 0.887);
            assert_eq!(activation.activation_ratio, 0.93);
        });
    }

    #[test]
    fn test_binned_activation_wrong_arity() {
        with_numpy(|py| {
            let result = PyTuple::new(py, [0.62, 0.55]).unwrap();
            assert!(matches!(
                binned_activation(result.as_any()),
                Err(BackendError::Shape { .. })
            ));
        });
    }

    #[test]
    fn test_float_vec_from_list() {
        with_numpy(|py| {
            let list = pyo3::types::PyList::new(py, [1, 2, 3]).unwrap();
            let values = float_vec(list.as_any(), "values").unwrap();
            assert_eq!(values, vec![1.0, 2.0, 3.0]);
        });
    }

    #[test]
    fn test_species_binning_normalised_to_si_and_per_cm3() {
        with_numpy(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("rs", vec![0.5, 0.05, 0.005]).unwrap();
            kwargs.set_item("Nis", vec![2.0e8, 6.0e8]).unwrap();
            let species = py
                .import("types")
                .unwrap()
                .getattr("SimpleNamespace")
                .unwrap()
                .call((), Some(&kwargs))
                .unwrap();

            let radii = bin_edge_radii(&species).unwrap();
            assert_eq!(radii.len(), 3);
            for (r, expected) in radii.iter().zip([5e-7, 5e-8, 5e-9]) {
                assert_relative_eq!(*r, expected, max_relative = 1e-12);
            }

            let number = bin_number_concentrations(&species).unwrap();
            assert_eq!(number.len(), 2);
            assert_relative_eq!(number[0], 200.0, max_relative = 1e-12);
            assert_relative_eq!(number[1], 600.0, max_relative = 1e-12);
        });
    }

    #[test]
    fn test_missing_trace_label() {
        with_numpy(|py| {
            let traces = PyDict::new(py);
            let result = aerosol_traces(traces.as_any(), &["sulfate".to_string()]);
            match result {
                Err(BackendError::Shape { details, .. }) => assert!(details.contains("sulfate")),
                other => panic!("Expected a shape error, got {:?}", other.map(|t| t.len())),
            }
        });
    }

    #[test]
    fn test_trajectory_from_dataframe() {
        with_numpy(|py| {
            let Ok(pandas) = py.import("pandas") else {
                eprintln!("pandas not importable, skipping");
                return;
            };
            let data = PyDict::new(py);
            data.set_item("z", vec![0.0, 1.0]).unwrap();
            data.set_item("P", vec![85000.0, 84990.0]).unwrap();
            data.set_item("T", vec![283.0, 282.99]).unwrap();
            let frame = pandas.getattr("DataFrame").unwrap().call1((data,)).unwrap();

            let table = trajectory_table(&frame).unwrap();
            assert_eq!(table.columns(), ["z", "P", "T"]);
            assert_eq!(table.n_steps(), 2);
            assert_eq!(table.column("T").unwrap()[1], 282.99);
        });
    }
}
