use std::fmt;
use thiserror::Error;

/// Pipeline stage at which a failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Building distribution and aerosol handles from the mode descriptors
    Translation,
    /// Constructing and integrating the parcel model
    Simulation,
    /// Reducing the model output into series, activation and size distributions
    Aggregation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Translation => write!(f, "translation"),
            Stage::Simulation => write!(f, "simulation"),
            Stage::Aggregation => write!(f, "aggregation"),
        }
    }
}

/// Error type for failed parcel runs.
#[derive(Error, Debug)]
pub enum ParcelError {
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },
    #[error("External model failed during {stage}: {message}")]
    External { stage: Stage, message: String },
    #[error("Unexpected shape of {what} during {stage}: {details}")]
    Shape {
        stage: Stage,
        what: String,
        details: String,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("The embedded interpreter has not been initialised. Call `initialize()` once at process start before creating a backend.")]
    NotInitialised,
}

impl ParcelError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ParcelError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn shape(stage: Stage, what: impl Into<String>, details: impl Into<String>) -> Self {
        ParcelError::Shape {
            stage,
            what: what.into(),
            details: details.into(),
        }
    }

    /// Attach the pipeline stage to an error raised by a backend.
    pub fn from_backend(stage: Stage, error: BackendError) -> Self {
        match error {
            BackendError::Failed(message) => ParcelError::External { stage, message },
            BackendError::Shape { what, details } => ParcelError::Shape {
                stage,
                what,
                details,
            },
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ParcelError::External { stage, .. } | ParcelError::Shape { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Convenience type for `Result<T, ParcelError>`.
pub type ParcelResult<T> = Result<T, ParcelError>;

/// Error raised by a backend implementation.
///
/// Backends do not know which pipeline stage they are serving, so the
/// runner converts these into [`ParcelError`] with [`ParcelError::from_backend`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{0}")]
    Failed(String),
    #[error("unexpected shape of {what}: {details}")]
    Shape { what: String, details: String },
}

impl BackendError {
    pub fn shape(what: impl Into<String>, details: impl Into<String>) -> Self {
        BackendError::Shape {
            what: what.into(),
            details: details.into(),
        }
    }
}

/// Convenience type for `Result<T, BackendError>`.
pub type BackendResult<T> = Result<T, BackendError>;
