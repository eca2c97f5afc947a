//! Mapping of aerosol modes onto backend aerosol species

use crate::aerosol::AerosolMode;
use crate::backend::{LognormalDescriptor, ParcelBackend};
use crate::errors::{ParcelError, ParcelResult, Stage};

/// Lognormal parameters of a mode in the backend's radius convention
pub fn lognormal_descriptor(mode: &AerosolMode) -> LognormalDescriptor {
    LognormalDescriptor {
        mu: mode.geometric_mean_radius(),
        sigma: mode.geometric_std_dev,
        number_concentration: mode.number_concentration,
    }
}

/// Build the backend aerosol species for a mode
///
/// No validation happens here; errors raised by the backend are returned
/// as [`Stage::Translation`] failures.
pub fn translate<B: ParcelBackend>(backend: &B, mode: &AerosolMode) -> ParcelResult<B::Aerosol> {
    let distribution = backend
        .lognormal_mode(&lognormal_descriptor(mode))
        .map_err(|e| ParcelError::from_backend(Stage::Translation, e))?;

    backend
        .aerosol_species(
            &mode.label,
            distribution,
            mode.hygroscopicity,
            mode.bins,
        )
        .map_err(|e| ParcelError::from_backend(Stage::Translation, e))
}
