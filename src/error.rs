//! Error types shared by the analysis pipelines

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Everything that can fail while serving one analysis request
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Malformed or empty feature matrix
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The query produced no usable rows
    #[error("{0}")]
    NoData(String),

    /// Connectivity or query failure against the database
    #[error("data source error: {0}")]
    DataSource(String),

    /// Neighbor search, elbow detection or scoring failed
    #[error("parameter search failed: {0}")]
    ParameterSearch(String),

    /// Plot rendering or encoding failed
    #[error("visualization error: {0}")]
    Visualization(String),

    /// The blocking compute task panicked or was cancelled
    #[error("analysis worker failed: {0}")]
    Worker(String),
}

impl From<tokio_postgres::Error> for AnalysisError {
    fn from(err: tokio_postgres::Error) -> Self {
        AnalysisError::DataSource(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AnalysisError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        AnalysisError::DataSource(err.to_string())
    }
}

impl From<linfa_nn::BuildError> for AnalysisError {
    fn from(err: linfa_nn::BuildError) -> Self {
        AnalysisError::ParameterSearch(format!("failed to build neighbor index: {}", err))
    }
}

impl From<linfa_nn::NnError> for AnalysisError {
    fn from(err: linfa_nn::NnError) -> Self {
        AnalysisError::ParameterSearch(format!("neighbor query failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for AnalysisError {
    fn from(err: tokio::task::JoinError) -> Self {
        AnalysisError::Worker(err.to_string())
    }
}
