// Shakewatch - Error Types
//
// Every failure the library reports to the host. Nothing here is fatal to the
// process: at worst a session fails to start and the caller gets one of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShakeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The accelerometer is missing or cannot be opened.
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// A host permission (e.g. audio recording) was not granted.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("sensor error: {0}")]
    Sensor(String),

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("no session with an audio classifier is running")]
    ClassifierDisabled,

    #[error("could not spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShakeError>;
