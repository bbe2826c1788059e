use rapport_columnar::EngineError;
use thiserror::Error;

/// Operation-level failures. Row decode failures never surface here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not create interaction table: {source}")]
    Setup {
        #[source]
        source: EngineError,
    },

    #[error("engine write failed: {source}")]
    Write {
        #[source]
        source: EngineError,
    },

    #[error("interaction query failed: {source}")]
    Query {
        #[source]
        source: EngineError,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("storage task failed: {0}")]
    Join(String),
}

impl StoreError {
    pub(crate) fn write(source: EngineError) -> Self {
        Self::interrupted(&source).unwrap_or(StoreError::Write { source })
    }

    pub(crate) fn query(source: EngineError) -> Self {
        Self::interrupted(&source).unwrap_or(StoreError::Query { source })
    }

    fn interrupted(source: &EngineError) -> Option<Self> {
        if !source.is_interrupt() {
            return None;
        }
        Some(match source {
            EngineError::Cancelled => StoreError::Cancelled,
            _ => StoreError::DeadlineExceeded,
        })
    }
}
