//! Physical parameter records supplied by the caller
//!
//! [`AerosolMode`] describes one lognormal aerosol population and
//! [`InitialState`] the thermodynamic state of the parcel at release.
//! Both are plain values; they are validated once at the start of a run.

use crate::errors::{ParcelError, ParcelResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single lognormal aerosol mode
///
/// The number size distribution follows
///
/// $$\frac{dN}{d\ln D} = \frac{N}{\sqrt{2\pi}\ln\sigma}
///   \exp\left(-\frac{\ln^2(D/\mu)}{2\ln^2\sigma}\right)$$
///
/// where $\mu$ is the geometric mean diameter and $\sigma$ the geometric
/// standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AerosolMode {
    /// Identifier of the mode.
    ///
    /// Used as the join key into the per-mode model output, so it must be
    /// unique within a run.
    pub label: String,

    /// Total number concentration (cm⁻³)
    pub number_concentration: FloatValue,

    /// Geometric mean diameter (μm)
    pub geometric_mean_diameter: FloatValue,

    /// Geometric standard deviation (dimensionless, > 1)
    pub geometric_std_dev: FloatValue,

    /// Single-parameter hygroscopicity κ (dimensionless, ≥ 0)
    pub hygroscopicity: FloatValue,

    /// Number of size bins used to discretise the mode
    pub bins: usize,
}

impl AerosolMode {
    pub fn new(
        label: impl Into<String>,
        number_concentration: FloatValue,
        geometric_mean_diameter: FloatValue,
        geometric_std_dev: FloatValue,
        hygroscopicity: FloatValue,
        bins: usize,
    ) -> Self {
        Self {
            label: label.into(),
            number_concentration,
            geometric_mean_diameter,
            geometric_std_dev,
            hygroscopicity,
            bins,
        }
    }

    /// Geometric mean radius (μm), the centre parameter used by the parcel model
    pub fn geometric_mean_radius(&self) -> FloatValue {
        self.geometric_mean_diameter / 2.0
    }

    /// Check that the mode describes a physical population
    pub fn validate(&self) -> ParcelResult<()> {
        if self.label.trim().is_empty() {
            return Err(ParcelError::invalid("label", "must not be empty"));
        }
        let field = |name: &str| format!("{} of mode '{}'", name, self.label);

        require_positive(&field("number_concentration"), self.number_concentration)?;
        require_positive(
            &field("geometric_mean_diameter"),
            self.geometric_mean_diameter,
        )?;
        require_finite(&field("geometric_std_dev"), self.geometric_std_dev)?;
        if self.geometric_std_dev <= 1.0 {
            return Err(ParcelError::invalid(
                field("geometric_std_dev"),
                format!("must be greater than 1, got {}", self.geometric_std_dev),
            ));
        }
        require_finite(&field("hygroscopicity"), self.hygroscopicity)?;
        if self.hygroscopicity < 0.0 {
            return Err(ParcelError::invalid(
                field("hygroscopicity"),
                format!("must not be negative, got {}", self.hygroscopicity),
            ));
        }
        if self.bins == 0 {
            return Err(ParcelError::invalid(field("bins"), "must be at least 1"));
        }
        Ok(())
    }
}

/// Thermodynamic state of the parcel at the start of the ascent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    /// Air temperature (K)
    pub temperature: FloatValue,

    /// Air pressure (Pa)
    pub pressure: FloatValue,

    /// Initial supersaturation (dimensionless, S = RH - 1).
    ///
    /// Usually slightly negative, i.e. a sub-saturated parcel.
    pub saturation: FloatValue,

    /// Condensation mass-accommodation coefficient (0 < α ≤ 1)
    pub accommodation: FloatValue,

    /// Constant updraft velocity (m/s)
    ///
    /// Sets the integration schedule, so it must be strictly positive.
    pub updraft_velocity: FloatValue,
}

impl InitialState {
    pub fn validate(&self) -> ParcelResult<()> {
        require_positive("temperature", self.temperature)?;
        require_positive("pressure", self.pressure)?;
        require_finite("saturation", self.saturation)?;
        if self.saturation < -1.0 {
            return Err(ParcelError::invalid(
                "saturation",
                format!("must be at least -1, got {}", self.saturation),
            ));
        }
        require_positive("accommodation", self.accommodation)?;
        if self.accommodation > 1.0 {
            return Err(ParcelError::invalid(
                "accommodation",
                format!("must not exceed 1, got {}", self.accommodation),
            ));
        }
        require_positive("updraft_velocity", self.updraft_velocity)?;
        Ok(())
    }
}

/// Validate every mode and check that labels are unique
pub fn validate_modes(modes: &[AerosolMode]) -> ParcelResult<()> {
    let mut seen = HashSet::new();
    for mode in modes {
        mode.validate()?;
        if !seen.insert(mode.label.as_str()) {
            return Err(ParcelError::invalid(
                "label",
                format!("'{}' is used by more than one mode", mode.label),
            ));
        }
    }
    Ok(())
}

fn require_finite(field: &str, value: FloatValue) -> ParcelResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParcelError::invalid(
            field,
            format!("must be finite, got {}", value),
        ))
    }
}

fn require_positive(field: &str, value: FloatValue) -> ParcelResult<()> {
    require_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ParcelError::invalid(
            field,
            format!("must be positive, got {}", value),
        ))
    }
}
