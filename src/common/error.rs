//! Error types for rust_footstep_planning

use thiserror::Error;

/// Main error type for footstep planning
///
/// Search outcomes (no path, budget exhausted, ...) are not errors; they are
/// reported through [`crate::footstep_planning::PlanningResult`]. This type
/// covers construction-time validation and configuration loading.
#[derive(Debug, Error)]
pub enum FootstepPlanningError {
    /// Invalid planner parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Malformed goal
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),
    /// Malformed planar region (degenerate polygon, non-finite transform, ...)
    #[error("Invalid region: {0}")]
    InvalidRegion(String),
    /// Configuration file could not be parsed
    #[error("Config load error: {0}")]
    ConfigLoad(String),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Operation not allowed in the current planner state
    #[error("Planner state error: {0}")]
    PlannerState(String),
}

/// Result type alias for footstep planning operations
pub type FootstepPlanningResult<T> = Result<T, FootstepPlanningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FootstepPlanningError::InvalidGoal("tolerance must be positive".to_string());
        assert_eq!(format!("{}", err), "Invalid goal: tolerance must be positive");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FootstepPlanningError = io_err.into();
        assert!(matches!(err, FootstepPlanningError::Io(_)));
    }
}
