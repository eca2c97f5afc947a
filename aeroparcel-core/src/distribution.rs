//! Discretised particle size distributions
//!
//! The parcel model bins each lognormal mode internally. This module turns
//! the bin edges and per-bin number concentrations it reports into a
//! [`SizeDistribution`] that carries geometric midpoints, logarithmic bin
//! widths and the spectral density $dN/d\ln D$.

use crate::errors::{ParcelError, ParcelResult, Stage};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Analytic form the distribution was discretised from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionForm {
    Lognormal,
}

impl fmt::Display for DistributionForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionForm::Lognormal => write!(f, "lognormal"),
        }
    }
}

/// Binned size distribution of one aerosol mode
///
/// All per-bin sequences have the same length, one less than `edges`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeDistribution {
    /// Bin edge diameters (μm), in the order reported by the model
    pub edges: Vec<FloatValue>,
    /// Geometric mean of adjacent edges (μm)
    pub midpoints: Vec<FloatValue>,
    /// Logarithmic bin widths ΔlnD, always positive
    pub log_widths: Vec<FloatValue>,
    /// Spectral density dN/dlnD (cm⁻³)
    pub density: Vec<FloatValue>,
    /// Number concentration in each bin (cm⁻³)
    pub number: Vec<FloatValue>,
    pub form: DistributionForm,
    pub label: String,
}

impl SizeDistribution {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            edges: Vec::new(),
            midpoints: Vec::new(),
            log_widths: Vec::new(),
            density: Vec::new(),
            number: Vec::new(),
            form: DistributionForm::Lognormal,
            label: label.into(),
        }
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.midpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.midpoints.is_empty()
    }

    /// Sum of the per-bin number concentrations (cm⁻³)
    pub fn total_number(&self) -> FloatValue {
        self.number.iter().sum()
    }
}

/// Convert a bin radius in metres into a diameter in micrometres
pub fn radius_m_to_diameter_um(radius: FloatValue) -> FloatValue {
    2.0 * radius * 1e6
}

/// Build a [`SizeDistribution`] from bin edge diameters and per-bin counts
///
/// For bin $i$ bounded by $D_i$ and $D_{i+1}$:
///
/// - midpoint $\bar D_i = \sqrt{D_i D_{i+1}}$
/// - width $\Delta\ln D_i = |\ln(D_i / D_{i+1})|$
/// - density $N_i / \Delta\ln D_i$
///
/// Edges may be ordered either high→low (as the parcel model emits them) or
/// low→high; the widths are positive in both cases.
///
/// No bins or no edges gives an empty distribution. Edge defects are shape
/// errors raised at the aggregation stage, since the edges come from the
/// parcel model.
pub fn discretize(
    edges: &[FloatValue],
    raw_number: &[FloatValue],
    label: &str,
) -> ParcelResult<SizeDistribution> {
    if raw_number.is_empty() || edges.is_empty() {
        return Ok(SizeDistribution::empty(label));
    }
    if edges.len() != raw_number.len() + 1 {
        return Err(ParcelError::shape(
            Stage::Aggregation,
            format!("bin edges of mode '{}'", label),
            format!(
                "expected {} edges for {} bins, got {}",
                raw_number.len() + 1,
                raw_number.len(),
                edges.len()
            ),
        ));
    }
    if let Some(edge) = edges.iter().find(|e| !(e.is_finite() && **e > 0.0)) {
        return Err(ParcelError::shape(
            Stage::Aggregation,
            format!("bin edges of mode '{}'", label),
            format!("must be positive and finite, got {}", edge),
        ));
    }
    check_monotone(edges, label)?;

    let (midpoints, log_widths): (Vec<FloatValue>, Vec<FloatValue>) = edges
        .windows(2)
        .map(|pair| ((pair[0] * pair[1]).sqrt(), (pair[0] / pair[1]).ln().abs()))
        .unzip();

    let density = raw_number
        .iter()
        .zip(&log_widths)
        .map(|(n, width)| n / width)
        .collect();

    Ok(SizeDistribution {
        edges: edges.to_vec(),
        midpoints,
        log_widths,
        density,
        number: raw_number.to_vec(),
        form: DistributionForm::Lognormal,
        label: label.to_string(),
    })
}

fn check_monotone(edges: &[FloatValue], label: &str) -> ParcelResult<()> {
    let decreasing = edges.windows(2).all(|pair| pair[0] > pair[1]);
    let increasing = edges.windows(2).all(|pair| pair[0] < pair[1]);
    if decreasing || increasing {
        Ok(())
    } else {
        Err(ParcelError::shape(
            Stage::Aggregation,
            format!("bin edges of mode '{}'", label),
            "must be strictly monotone",
        ))
    }
}
