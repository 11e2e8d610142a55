use thiserror::Error;
use uuid::Uuid;

/// Engine errors. All of these are fatal for the inputs that produced them;
/// the engine never retries.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Leontief system is singular: {reason}")]
    SingularSystem { reason: String },

    #[error("Infeasible constraint set ({reason}); conflicting constraints: {conflicting:?}")]
    InfeasibleConstraintSet {
        conflicting: Vec<Uuid>,
        reason: String,
    },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Unknown sector code: {0}")]
    UnknownSector(String),

    #[error("Model version {0} not found")]
    UnknownModelVersion(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid constraint {id}: {reason}")]
    InvalidConstraint { id: Uuid, reason: String },

    #[error("Worker failure: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn dimension(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        EngineError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Whether this error should block the model version from further use.
    pub fn blocks_model_version(&self) -> bool {
        matches!(
            self,
            EngineError::SingularSystem { .. } | EngineError::InvalidModel(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_message() {
        let err = EngineError::dimension("shock vector", 3, 2);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in shock vector: expected 3, got 2"
        );
        assert!(!err.blocks_model_version());
    }

    #[test]
    fn test_singular_blocks_model() {
        let err = EngineError::SingularSystem {
            reason: "zero pivot".into(),
        };
        assert!(err.blocks_model_version());
    }
}
