//! [pyrcel](https://github.com/darothen/pyrcel) backend for aeroparcel
//!
//! The parcel model runs inside an embedded Python interpreter reached
//! through pyo3. The host application calls [`initialize`] once at start-up
//! and then creates a [`PyrcelBackend`]:
//!
//! ```rust,ignore
//! use aeroparcel_core::{AerosolMode, InitialState, ParcelRunner};
//! use aeroparcel_pyrcel::{initialize, PyrcelBackend};
//!
//! initialize();
//! let runner = ParcelRunner::with_defaults(PyrcelBackend::new()?);
//! let result = runner.run(&modes, &initial)?;
//! println!("CDNC = {:.1} cm^-3", result.cdnc);
//! ```
//!
//! pyrcel values are normalised at the boundary: bin edges are reported in
//! metres and per-bin concentrations in cm⁻³.

mod backend;
mod convert;
mod interpreter;

pub use backend::{PyrcelAerosol, PyrcelBackend, PyrcelDistribution, PyrcelModel, PYRCEL_MODULE};
pub use interpreter::{initialize, is_initialized};

