//! Embedded Python interpreter lifecycle

use aeroparcel_core::errors::{ParcelError, ParcelResult};
use pyo3::prelude::*;
use std::sync::Once;
use tracing::debug;

static INIT: Once = Once::new();

/// Start the embedded Python interpreter
///
/// Call once at process start, before any [`crate::PyrcelBackend`] is
/// created. Repeated calls are no-ops. There is no matching teardown; the
/// interpreter lives for the rest of the process.
pub fn initialize() {
    INIT.call_once(|| {
        Python::initialize();
        debug!("Embedded Python interpreter initialised");
    });
}

/// Whether [`initialize`] has completed
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

pub(crate) fn ensure_initialized() -> ParcelResult<()> {
    require(&INIT)
}

fn require(init: &Once) -> ParcelResult<()> {
    if init.is_completed() {
        Ok(())
    } else {
        Err(ParcelError::NotInitialised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_requires_initialisation() {
        // The process-wide guard is shared with other tests, so check a fresh one
        let init = Once::new();
        assert!(matches!(require(&init), Err(ParcelError::NotInitialised)));

        init.call_once(|| {});
        assert!(require(&init).is_ok());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        initialize();
        initialize();

        assert!(is_initialized());
        assert!(ensure_initialized().is_ok());
        Python::attach(|py| {
            let answer: i64 = py.eval(c"6 * 7", None, None).unwrap().extract().unwrap();
            assert_eq!(answer, 42);
        });
    }
}
