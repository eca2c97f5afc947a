//! Parcel run driver and result aggregation
//!
//! # What a run does
//!
//! 1. Validates the aerosol modes and the initial state
//! 2. Translates each mode into a backend aerosol species
//! 3. Builds the parcel model and integrates a fixed-height ascent
//! 4. Extracts height, temperature, liquid water and supersaturation series
//! 5. Evaluates activation of every mode at the peak supersaturation
//! 6. Aggregates the per-mode activated concentrations into the bulk
//!    activated fraction and cloud droplet number concentration (CDNC)
//! 7. Derives the binned size distribution of every mode
//!
//! A run is a single blocking call to the backend. Any failure aborts the
//! run and no partial result is returned.

use crate::aerosol::{validate_modes, AerosolMode, InitialState};
use crate::backend::{
    AerosolHandle, ParcelBackend, ParcelConditions, ParcelModelHandle, ParcelOutput, RawOutput,
    TrajectoryTable,
};
use crate::distribution::{discretize, radius_m_to_diameter_um, SizeDistribution};
use crate::errors::{ParcelError, ParcelResult, Stage};
use crate::settings::{ColumnRef, SolverSettings};
use crate::translate::translate;
use crate::FloatValue;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Column holding the parcel height (m)
pub const HEIGHT_COLUMN: &str = "z";
/// Column holding the liquid water mixing ratio (kg/kg)
pub const LIQUID_WATER_COLUMN: &str = "wc";
/// Column holding the supersaturation (fraction)
pub const SUPERSATURATION_COLUMN: &str = "S";
/// Expected header of the temperature column
pub const TEMPERATURE_COLUMN: &str = "T";

/// Convert a mixing ratio from kg/kg to g/kg
pub fn kg_per_kg_to_g_per_kg(value: FloatValue) -> FloatValue {
    value * 1000.0
}

/// Convert a supersaturation from a fraction to percent
pub fn fraction_to_percent(value: FloatValue) -> FloatValue {
    value * 100.0
}

/// Bulk activation statistics of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivationSummary {
    /// Total aerosol number concentration (cm⁻³)
    pub total_number: FloatValue,
    /// Activated share of the total aerosol number
    pub activated_fraction: FloatValue,
    /// Cloud droplet number concentration (cm⁻³)
    pub cdnc: FloatValue,
}

impl ActivationSummary {
    /// Aggregate per-mode activated and total number concentrations
    ///
    /// The activated fraction is defined as zero when there is no aerosol.
    pub fn from_modes(activated: &[FloatValue], totals: &[FloatValue]) -> Self {
        let total_number: FloatValue = totals.iter().sum();
        let cdnc: FloatValue = activated.iter().sum();
        let activated_fraction = if total_number > 0.0 {
            cdnc / total_number
        } else {
            0.0
        };
        Self {
            total_number,
            activated_fraction,
            cdnc,
        }
    }
}

/// Outcome of a parcel run
///
/// `R` is the backend's raw output type. The raw traces are handed back
/// untouched for callers that need more than the summary, and are not
/// serialized.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult<R> {
    /// Parcel height (m)
    pub height: Vec<FloatValue>,
    /// Parcel temperature (K)
    pub temperature: Vec<FloatValue>,
    /// Liquid water mixing ratio (g/kg)
    pub liquid_water: Vec<FloatValue>,
    /// Supersaturation (%)
    pub supersaturation: Vec<FloatValue>,
    /// Peak supersaturation over the ascent (%)
    pub max_supersaturation: FloatValue,
    /// Temperature at the last output step (K)
    pub final_temperature: FloatValue,
    /// Total aerosol number concentration (cm⁻³)
    pub total_number: FloatValue,
    pub activated_fraction: FloatValue,
    /// Cloud droplet number concentration (cm⁻³)
    pub cdnc: FloatValue,
    /// Activated number concentration per mode, in input order (cm⁻³)
    pub activated: Vec<FloatValue>,
    /// Activated fraction per mode, in input order
    pub mode_activated_fraction: Vec<FloatValue>,
    /// Size distribution per mode, in input order
    pub distributions: Vec<SizeDistribution>,
    #[serde(skip)]
    pub raw_trajectory: R,
    #[serde(skip)]
    pub raw_aerosol_traces: R,
}

impl<R> RunResult<R> {
    pub fn summary(&self) -> ActivationSummary {
        ActivationSummary {
            total_number: self.total_number,
            activated_fraction: self.activated_fraction,
            cdnc: self.cdnc,
        }
    }

    /// Size distribution of a mode by label
    pub fn distribution(&self, label: &str) -> Option<&SizeDistribution> {
        self.distributions.iter().find(|d| d.label == label)
    }

    /// Number of output steps
    pub fn n_steps(&self) -> usize {
        self.height.len()
    }
}

/// Time series pulled out of the trajectory table
#[derive(Debug, Clone, PartialEq)]
struct Series {
    height: Vec<FloatValue>,
    temperature: Vec<FloatValue>,
    liquid_water: Vec<FloatValue>,
    supersaturation: Vec<FloatValue>,
}

impl Series {
    fn extract(table: &TrajectoryTable, temperature_column: &ColumnRef) -> ParcelResult<Self> {
        if table.n_steps() == 0 {
            return Err(ParcelError::shape(
                Stage::Aggregation,
                "trajectory",
                "no output steps",
            ));
        }

        let height = required_column(table, HEIGHT_COLUMN)?;
        let liquid_water = required_column(table, LIQUID_WATER_COLUMN)?
            .into_iter()
            .map(kg_per_kg_to_g_per_kg)
            .collect();
        let supersaturation = required_column(table, SUPERSATURATION_COLUMN)?
            .into_iter()
            .map(fraction_to_percent)
            .collect();
        let temperature = temperature_series(table, temperature_column)?;

        Ok(Self {
            height,
            temperature,
            liquid_water,
            supersaturation,
        })
    }
}

fn required_column(table: &TrajectoryTable, name: &str) -> ParcelResult<Vec<FloatValue>> {
    table.column(name).map(|c| c.to_vec()).ok_or_else(|| {
        ParcelError::shape(
            Stage::Aggregation,
            "trajectory",
            format!(
                "missing column '{}' (available: {})",
                name,
                table.columns().join(", ")
            ),
        )
    })
}

fn temperature_series(
    table: &TrajectoryTable,
    column: &ColumnRef,
) -> ParcelResult<Vec<FloatValue>> {
    match column {
        ColumnRef::Name(name) => required_column(table, name),
        ColumnRef::Index(index) => {
            let values = table.column_at(*index).ok_or_else(|| {
                ParcelError::shape(
                    Stage::Aggregation,
                    "trajectory",
                    format!(
                        "temperature column {} out of range for {} columns",
                        index,
                        table.columns().len()
                    ),
                )
            })?;
            let header = &table.columns()[*index];
            if header != TEMPERATURE_COLUMN {
                warn!(
                    index = *index,
                    header = %header,
                    "Temperature column header is not '{}'; the model state layout may have changed",
                    TEMPERATURE_COLUMN
                );
            }
            Ok(values.to_vec())
        }
    }
}

/// Drives parcel runs against a backend
pub struct ParcelRunner<B> {
    backend: B,
    settings: SolverSettings,
}

impl<B: ParcelBackend> ParcelRunner<B> {
    pub fn new(backend: B, settings: SolverSettings) -> Self {
        Self { backend, settings }
    }

    /// Create a runner with the default schedule and CVODE integrator
    pub fn with_defaults(backend: B) -> Self {
        Self::new(backend, SolverSettings::default())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Run the parcel model for a set of modes and summarise activation
    pub fn run(
        &self,
        modes: &[AerosolMode],
        initial: &InitialState,
    ) -> ParcelResult<RunResult<RawOutput<B>>> {
        validate_modes(modes)?;
        initial.validate()?;
        self.settings.validate()?;
        let request = self.settings.request(initial.updraft_velocity)?;

        info!(
            modes = modes.len(),
            updraft_velocity = initial.updraft_velocity,
            end_time = request.end_time,
            integrator = %request.integrator,
            "Starting parcel run"
        );

        let aerosols = modes
            .iter()
            .map(|mode| translate(&self.backend, mode))
            .collect::<ParcelResult<Vec<_>>>()?;

        let conditions = ParcelConditions {
            updraft_velocity: initial.updraft_velocity,
            temperature: initial.temperature,
            saturation: initial.saturation,
            pressure: initial.pressure,
            accommodation: initial.accommodation,
        };
        let model = self
            .backend
            .parcel_model(&aerosols, &conditions, false)
            .map_err(|e| ParcelError::from_backend(Stage::Simulation, e))?;
        let output = model
            .run(&request)
            .map_err(|e| ParcelError::from_backend(Stage::Simulation, e))?;

        self.aggregate(modes, &aerosols, output)
    }

    fn aggregate(
        &self,
        modes: &[AerosolMode],
        aerosols: &[B::Aerosol],
        output: ParcelOutput<RawOutput<B>>,
    ) -> ParcelResult<RunResult<RawOutput<B>>> {
        let series = Series::extract(&output.trajectory, &self.settings.temperature_column)?;

        let final_temperature = series.temperature.last().copied().ok_or_else(|| {
            ParcelError::shape(Stage::Aggregation, "trajectory", "no output steps")
        })?;
        let max_supersaturation = series
            .supersaturation
            .iter()
            .copied()
            .fold(FloatValue::NEG_INFINITY, FloatValue::max);

        let mut activated = Vec::with_capacity(modes.len());
        let mut totals = Vec::with_capacity(modes.len());
        let mut distributions = Vec::with_capacity(modes.len());

        for (mode, aerosol) in modes.iter().zip(aerosols) {
            let trace = output.aerosol_traces.get(&mode.label).ok_or_else(|| {
                ParcelError::shape(
                    Stage::Aggregation,
                    "aerosol traces",
                    format!("no trace for mode '{}'", mode.label),
                )
            })?;
            let n_bins = aerosol.bin_number_concentrations().len();
            if trace.nrows() == 0 || trace.ncols() != n_bins {
                return Err(ParcelError::shape(
                    Stage::Aggregation,
                    format!("trace of mode '{}'", mode.label),
                    format!(
                        "expected at least one row of {} bins, got {}x{}",
                        n_bins,
                        trace.nrows(),
                        trace.ncols()
                    ),
                ));
            }
            let last_row = trace.row(trace.nrows() - 1);

            let activation = self
                .backend
                .binned_activation(
                    max_supersaturation / 100.0,
                    final_temperature,
                    last_row,
                    aerosol,
                )
                .map_err(|e| ParcelError::from_backend(Stage::Aggregation, e))?;

            let total = aerosol.total_number();
            let mode_activated = activation.equilibrium_fraction * total;
            debug!(
                mode = %mode.label,
                total_number = total,
                equilibrium_fraction = activation.equilibrium_fraction,
                kelvin_number = activation.kelvin_number,
                accommodation_factor = activation.accommodation_factor,
                activation_ratio = activation.activation_ratio,
                "Mode activation"
            );

            let edges: Vec<FloatValue> = aerosol
                .bin_edge_radii()
                .iter()
                .copied()
                .map(radius_m_to_diameter_um)
                .collect();
            distributions.push(discretize(
                &edges,
                aerosol.bin_number_concentrations(),
                &mode.label,
            )?);

            activated.push(mode_activated);
            totals.push(total);
        }

        let summary = ActivationSummary::from_modes(&activated, &totals);
        let mode_activated_fraction = activated
            .iter()
            .zip(&totals)
            .map(|(a, t)| if *t > 0.0 { a / t } else { 0.0 })
            .collect();

        info!(
            max_supersaturation = max_supersaturation,
            cdnc = summary.cdnc,
            activated_fraction = summary.activated_fraction,
            "Parcel run complete"
        );

        Ok(RunResult {
            height: series.height,
            temperature: series.temperature,
            liquid_water: series.liquid_water,
            supersaturation: series.supersaturation,
            max_supersaturation,
            final_temperature,
            total_number: summary.total_number,
            activated_fraction: summary.activated_fraction,
            cdnc: summary.cdnc,
            activated,
            mode_activated_fraction,
            distributions,
            raw_trajectory: output.raw_trajectory,
            raw_aerosol_traces: output.raw_aerosol_traces,
        })
    }
}

/// Run a parcel simulation with the default solver settings
pub fn run<B: ParcelBackend>(
    backend: B,
    modes: &[AerosolMode],
    initial: &InitialState,
) -> ParcelResult<RunResult<RawOutput<B>>> {
    ParcelRunner::with_defaults(backend).run(modes, initial)
}
