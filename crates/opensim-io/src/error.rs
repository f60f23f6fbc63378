use thiserror::Error;

/// Errors produced while reading or writing OpenSim file formats.
#[derive(Error, Debug)]
pub enum OpenSimIoError {
    #[error("Unknown unit: '{0}'")]
    UnknownUnit(String),

    #[error("Cannot convert between '{0}' and '{1}': different quantities")]
    IncompatibleUnits(String, String),

    #[error("Trial '{0}' has no marker data to export")]
    NoMarkerData(String),

    #[error("Trial '{0}' has no force platforms to export")]
    NoForcePlatforms(String),

    #[error("Trial '{trial}' has no linked '{key}' file; run the producing export first")]
    MissingLinkedFile { trial: String, key: String },

    #[error("Malformed storage file '{path}': {reason}")]
    MalformedSto { path: String, reason: String },

    #[error("Core data error: {0}")]
    Core(#[from] core_types::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
