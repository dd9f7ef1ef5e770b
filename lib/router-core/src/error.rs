use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Route store error: {0}")]
    RouteStore(String),

    #[error("Invalid controller configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Metrics encoding error: {0}")]
    MetricsEncoding(#[from] std::string::FromUtf8Error),
}
