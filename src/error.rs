//! Error type shared by every solver and collaborator in the crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RspError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Malformed or too-small node set, non-finite coordinates, parameters out of range.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),
    /// No ring/star partition exists for the requested parameters.
    #[error("infeasible: {0}")]
    Infeasible(String),
    /// The exact backend exhausted its budget before finding any incumbent.
    #[error("solver budget exhausted before any feasible solution was found")]
    SolverTimeout,
    /// A solution violates the ring/star invariants. Always a solver bug.
    #[error("infeasible solution: {0}")]
    InfeasibleSolution(String),
    #[error("instance has {nodes} nodes, exact solver is limited to {limit}")]
    TooLarge { nodes: usize, limit: usize },
    #[error("optimization backend error: {0}")]
    Backend(String),
}

pub type RspResult<T> = std::result::Result<T, RspError>;

impl RspError {
    pub fn invalid_instance(message: impl Into<String>) -> Self {
        Self::InvalidInstance(message.into())
    }

    pub fn infeasible(message: impl Into<String>) -> Self {
        Self::Infeasible(message.into())
    }

    pub fn infeasible_solution(message: impl Into<String>) -> Self {
        Self::InfeasibleSolution(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Whether the comparison engine may record this failure on the exact side
    /// instead of aborting the comparison.
    pub fn is_recoverable_exact_failure(&self) -> bool {
        matches!(
            self,
            RspError::Infeasible(_)
                | RspError::SolverTimeout
                | RspError::TooLarge { .. }
                | RspError::Backend(_)
        )
    }
}
