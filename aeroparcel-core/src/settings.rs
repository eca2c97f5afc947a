//! Run configuration
//!
//! A [`Scenario`] bundles the aerosol modes, the initial parcel state and the
//! [`SolverSettings`] for one run. Scenarios are usually read from TOML:
//!
//! ```toml
//! [initial]
//! temperature = 283.0
//! pressure = 85000.0
//! saturation = -0.02
//! accommodation = 1.0
//! updraft_velocity = 0.5
//!
//! [[modes]]
//! label = "sulfate"
//! number_concentration = 850.0
//! geometric_mean_diameter = 0.03
//! geometric_std_dev = 1.6
//! hygroscopicity = 0.54
//! bins = 200
//!
//! [solver]
//! integrator = "cvode"
//! ```

use crate::aerosol::{validate_modes, AerosolMode, InitialState};
use crate::backend::IntegrationRequest;
use crate::errors::{ParcelError, ParcelResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Integrators offered by the parcel model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrator {
    /// SUNDIALS CVODE, variable-order BDF. Required for stiff growth near activation.
    Cvode,
    Lsoda,
    Lsode,
    Odeint,
}

impl Integrator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Integrator::Cvode => "cvode",
            Integrator::Lsoda => "lsoda",
            Integrator::Lsode => "lsode",
            Integrator::Odeint => "odeint",
        }
    }
}

impl fmt::Display for Integrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a column of the trajectory table, by position or by header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "column {}", i),
            ColumnRef::Name(name) => write!(f, "column '{}'", name),
        }
    }
}

/// Settings controlling the integration and output extraction
///
/// Times are expressed as heights climbed so that the schedule scales with
/// the updraft velocity: the parcel is integrated for
/// `climb_height / updraft_velocity` seconds with output every
/// `output_step / updraft_velocity` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Height climbed over the whole run (m)
    ///
    /// Default: 300 m
    pub climb_height: FloatValue,

    /// Height climbed between outputs (m)
    ///
    /// Default: 1 m
    pub output_step: FloatValue,

    /// Default: CVODE
    pub integrator: Integrator,

    /// Stop early once supersaturation has peaked.
    ///
    /// Default: false, the full ascent is always integrated.
    pub terminate: bool,

    /// Maximum number of internal solver steps per output interval
    ///
    /// Default: 1000
    pub max_steps: usize,

    /// Fixed internal solver step (s); the backend chooses when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_dt: Option<FloatValue>,

    /// Where the temperature lives in the trajectory table
    ///
    /// Default: index 2, the third entry of the model state vector
    /// `[z, P, T, wv, wc, wi, S, ...]`.
    pub temperature_column: ColumnRef,

    /// Extra keyword arguments forwarded to the integrator
    pub solver_args: HashMap<String, toml::Value>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            climb_height: 300.0,
            output_step: 1.0,
            integrator: Integrator::Cvode,
            terminate: false,
            max_steps: 1000,
            solver_dt: None,
            temperature_column: ColumnRef::Index(2),
            solver_args: HashMap::new(),
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> ParcelResult<()> {
        for (field, value) in [
            ("climb_height", self.climb_height),
            ("output_step", self.output_step),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ParcelError::invalid(
                    field,
                    format!("must be positive, got {}", value),
                ));
            }
        }
        if self.output_step > self.climb_height {
            return Err(ParcelError::invalid(
                "output_step",
                format!(
                    "must not exceed climb_height ({}), got {}",
                    self.climb_height, self.output_step
                ),
            ));
        }
        if self.max_steps == 0 {
            return Err(ParcelError::invalid("max_steps", "must be at least 1"));
        }
        if let Some(dt) = self.solver_dt {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(ParcelError::invalid(
                    "solver_dt",
                    format!("must be positive, got {}", dt),
                ));
            }
        }
        Ok(())
    }

    /// End time and output interval (s) for an updraft velocity (m/s)
    pub fn schedule(&self, updraft_velocity: FloatValue) -> ParcelResult<(FloatValue, FloatValue)> {
        if !(updraft_velocity.is_finite() && updraft_velocity > 0.0) {
            return Err(ParcelError::invalid(
                "updraft_velocity",
                format!("must be positive, got {}", updraft_velocity),
            ));
        }
        Ok((
            self.climb_height / updraft_velocity,
            self.output_step / updraft_velocity,
        ))
    }

    /// Integration request for an updraft velocity
    pub fn request(&self, updraft_velocity: FloatValue) -> ParcelResult<IntegrationRequest> {
        let (end_time, output_interval) = self.schedule(updraft_velocity)?;
        Ok(IntegrationRequest {
            end_time,
            output_interval,
            integrator: self.integrator.as_str().to_string(),
            terminate: self.terminate,
            max_steps: self.max_steps,
            solver_dt: self.solver_dt,
            solver_args: self.solver_args.clone(),
        })
    }
}

/// A complete run description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub initial: InitialState,
    #[serde(default)]
    pub modes: Vec<AerosolMode>,
    #[serde(default)]
    pub solver: SolverSettings,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> ParcelResult<Self> {
        toml::from_str(content).map_err(|e| ParcelError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> ParcelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ParcelError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> ParcelResult<String> {
        toml::to_string(self).map_err(|e| ParcelError::Config(e.to_string()))
    }

    /// Check every record in the scenario
    pub fn validate(&self) -> ParcelResult<()> {
        validate_modes(&self.modes)?;
        self.initial.validate()?;
        self.solver.validate()
    }
}
