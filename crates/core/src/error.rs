//! Typed error kinds per §7: transient transport, permanent input, schema
//! violation, integrity, and fatal. Components return these at their
//! boundary; orchestration and the binary entrypoint work in `anyhow::Result`.

use thiserror::Error;

/// C1 FeatureExtractor failures.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("fetching article text failed: {0}")]
    FetchFailed(#[from] reqwest::Error),

    #[error("article text below the {floor}-character floor ({chars} usable chars)")]
    TooShort { chars: usize, floor: usize },

    #[error("named-entity recognition failed: {0}")]
    NerFailed(String),

    #[error("embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

/// Any LLM-calling component (C4, C9, C10, C11, C13, C14).
#[derive(Debug, Error)]
pub enum LlmCallError {
    #[error("LLM transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("LLM response failed schema validation: {0}")]
    SchemaViolation(String),

    #[error("exhausted retries after {attempts} attempts")]
    ExhaustedRetries { attempts: u32 },
}

/// C6 PersistenceStore failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique constraint violated: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PersistenceError {
    /// Classify a raw `sqlx::Error` into the integrity/other split that §7
    /// kind 4 calls for — unique-key conflicts are expected and handled as
    /// upserts, not surfaced as failures.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return PersistenceError::Integrity(db_err.message().to_string());
            }
        }
        PersistenceError::Database(err)
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, PersistenceError::Integrity(_))
    }
}
