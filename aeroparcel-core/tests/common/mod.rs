//! In-memory parcel backend used to exercise the runner without an external model.

#![allow(dead_code)]

use aeroparcel_core::backend::{
    AerosolHandle, BinnedActivation, IntegrationRequest, LognormalDescriptor, ParcelBackend,
    ParcelConditions, ParcelModelHandle, ParcelOutput, TrajectoryTable,
};
use aeroparcel_core::errors::{BackendError, BackendResult};
use aeroparcel_core::{AerosolMode, FloatValue, InitialState};
use ndarray::{Array2, ArrayView1};
use std::cell::RefCell;
use std::collections::HashMap;

/// Where the fake backend should fail, if anywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Species,
    Construct,
    Run,
    Activation,
}

/// Calls observed by the fake backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Lognormal(LognormalDescriptor),
    Species {
        label: String,
        hygroscopicity: FloatValue,
        bins: usize,
    },
    Construct {
        labels: Vec<String>,
        conditions: ParcelConditions,
        console: bool,
    },
    Activation {
        label: String,
        max_supersaturation: FloatValue,
        temperature: FloatValue,
        wet_radii: Vec<FloatValue>,
    },
}

#[derive(Debug, Clone)]
pub struct FakeAerosol {
    label: String,
    total_number: FloatValue,
    edge_radii: Vec<FloatValue>,
    number: Vec<FloatValue>,
}

impl AerosolHandle for FakeAerosol {
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

pub struct FakeModel {
    labels: Vec<String>,
    bins: Vec<usize>,
    supersaturation: Vec<FloatValue>,
    fail: Option<FailAt>,
    drop_column: Option<String>,
    drop_trace: Option<String>,
    requests: RefCell<Vec<IntegrationRequest>>,
}

impl ParcelModelHandle for FakeModel {
    type Raw = String;

    fn run(&self, request: &IntegrationRequest) -> BackendResult<ParcelOutput<String>> {
        self.requests.borrow_mut().push(request.clone());
        if self.fail == Some(FailAt::Run) {
            return Err(BackendError::Failed(
                "CVODE: convergence test failed repeatedly".to_string(),
            ));
        }

        let steps = self.supersaturation.len();
        let mut columns = vec!["z", "P", "T", "wv", "wc", "wi", "S"];
        let mut values = Array2::zeros((steps, columns.len()));
        for (i, s) in self.supersaturation.iter().enumerate() {
            let z = i as FloatValue;
            values[[i, 0]] = z;
            values[[i, 1]] = 85000.0 - 10.0 * z;
            values[[i, 2]] = 283.0 - 0.01 * z;
            values[[i, 3]] = 0.0085;
            values[[i, 4]] = 0.001 * z;
            values[[i, 5]] = 0.0;
            values[[i, 6]] = *s;
        }
        if let Some(drop) = &self.drop_column {
            let keep: Vec<usize> = (0..columns.len())
                .filter(|i| columns[*i] != drop.as_str())
                .collect();
            values = values.select(ndarray::Axis(1), &keep);
            columns.retain(|c| *c != drop.as_str());
        }
        let trajectory =
            TrajectoryTable::new(columns.into_iter().map(String::from).collect(), values)?;

        let aerosol_traces = self
            .labels
            .iter()
            .zip(&self.bins)
            .filter(|(label, _)| self.drop_trace.as_deref() != Some(label.as_str()))
            .map(|(label, bins)| {
                let trace =
                    Array2::from_shape_fn((steps, *bins), |(row, col)| {
                        1e-7 * (row + 1) as FloatValue + 1e-9 * col as FloatValue
                    });
                (label.clone(), trace)
            })
            .collect();

        Ok(ParcelOutput {
            trajectory,
            aerosol_traces,
            raw_trajectory: "raw trajectory".to_string(),
            raw_aerosol_traces: "raw aerosol traces".to_string(),
        })
    }
}

/// A scripted parcel backend
pub struct FakeBackend {
    /// Equilibrium activated fraction returned per label
    pub fractions: HashMap<String, FloatValue>,
    /// Ratio of post-binning to requested number concentration
    pub binning_loss: FloatValue,
    /// Supersaturation trajectory (fraction), one entry per output step
    pub supersaturation: Vec<FloatValue>,
    pub fail: Option<FailAt>,
    pub drop_column: Option<String>,
    pub drop_trace: Option<String>,
    /// Swap the two largest edge radii, breaking monotonicity
    pub scramble_edges: bool,
    pub calls: RefCell<Vec<Call>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            fractions: HashMap::new(),
            binning_loss: 1.0,
            supersaturation: vec![-0.02, -0.005, 0.0021, 0.0035, 0.0030, 0.0024],
            fail: None,
            drop_column: None,
            drop_trace: None,
            scramble_edges: false,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    pub fn with_fractions(fractions: &[(&str, FloatValue)]) -> Self {
        Self {
            fractions: fractions
                .iter()
                .map(|(label, f)| (label.to_string(), *f))
                .collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

/// Log-spaced edge radii (m) from `10 σ μ` down to `μ / (10 σ)`
pub fn edge_radii(mu_um: FloatValue, sigma: FloatValue, bins: usize) -> Vec<FloatValue> {
    let high = (mu_um * 10.0 * sigma).ln();
    let low = (mu_um / (10.0 * sigma)).ln();
    (0..=bins)
        .map(|i| (high + (low - high) * i as FloatValue / bins as FloatValue).exp() * 1e-6)
        .collect()
}

impl ParcelBackend for FakeBackend {
    type Distribution = LognormalDescriptor;
    type Aerosol = FakeAerosol;
    type Model = FakeModel;

    fn lognormal_mode(&self, descriptor: &LognormalDescriptor) -> BackendResult<Self::Distribution> {
        self.calls.borrow_mut().push(Call::Lognormal(*descriptor));
        Ok(*descriptor)
    }

    fn aerosol_species(
        &self,
        label: &str,
        distribution: Self::Distribution,
        hygroscopicity: FloatValue,
        bins: usize,
    ) -> BackendResult<Self::Aerosol> {
        self.calls.borrow_mut().push(Call::Species {
            label: label.to_string(),
            hygroscopicity,
            bins,
        });
        if self.fail == Some(FailAt::Species) {
            return Err(BackendError::Failed(format!("bad species '{}'", label)));
        }

        let total_number = distribution.number_concentration * self.binning_loss;
        let mut radii = edge_radii(distribution.mu, distribution.sigma, bins);
        if self.scramble_edges && radii.len() > 1 {
            radii.swap(0, 1);
        }
        Ok(FakeAerosol {
            label: label.to_string(),
            total_number,
            edge_radii: radii,
            number: vec![total_number / bins as FloatValue; bins],
        })
    }

    fn parcel_model(
        &self,
        aerosols: &[Self::Aerosol],
        conditions: &ParcelConditions,
        console: bool,
    ) -> BackendResult<Self::Model> {
        let labels: Vec<String> = aerosols.iter().map(|a| a.label.clone()).collect();
        self.calls.borrow_mut().push(Call::Construct {
            labels: labels.clone(),
            conditions: *conditions,
            console,
        });
        if self.fail == Some(FailAt::Construct) {
            return Err(BackendError::Failed("parcel setup failed".to_string()));
        }

        Ok(FakeModel {
            labels,
            bins: aerosols.iter().map(|a| a.number.len()).collect(),
            supersaturation: self.supersaturation.clone(),
            fail: self.fail,
            drop_column: self.drop_column.clone(),
            drop_trace: self.drop_trace.clone(),
            requests: RefCell::new(Vec::new()),
        })
    }

    fn binned_activation(
        &self,
        max_supersaturation: FloatValue,
        temperature: FloatValue,
        wet_radii: ArrayView1<'_, FloatValue>,
        aerosol: &Self::Aerosol,
    ) -> BackendResult<BinnedActivation> {
        self.calls.borrow_mut().push(Call::Activation {
            label: aerosol.label.clone(),
            max_supersaturation,
            temperature,
            wet_radii: wet_radii.to_vec(),
        });
        if self.fail == Some(FailAt::Activation) {
            return Err(BackendError::Failed("activation root finding failed".to_string()));
        }

        let fraction = self.fractions.get(&aerosol.label).copied().unwrap_or(0.0);
        Ok(BinnedActivation {
            equilibrium_fraction: fraction,
            kelvin_number: fraction * 0.9,
            accommodation_factor: 0.9,
            activation_ratio: 0.95,
        })
    }
}

pub fn sulfate() -> AerosolMode {
    AerosolMode::new("sulfate", 850.0, 0.03, 1.6, 0.54, 20)
}

pub fn sea_salt() -> AerosolMode {
    AerosolMode::new("sea salt", 10.0, 0.5, 2.0, 1.2, 10)
}

pub fn initial_state() -> InitialState {
    InitialState {
        temperature: 283.0,
        pressure: 85000.0,
        saturation: -0.02,
        accommodation: 1.0,
        updraft_velocity: 0.5,
    }
}
