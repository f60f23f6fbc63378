use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),

    #[error("Trial has no marker named '{0}'")]
    MarkerNotFound(String),

    #[error("Core data error: {0}")]
    Core(#[from] core_types::CoreError),
}
