//! Application-wide error types.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The ledger answered, but with something this client does not
    /// understand (an unknown transaction status, say).
    #[error("Unexpected ledger response: {0}")]
    Protocol(String),

    /// A third-party service (pinning API, gateway) refused or failed the
    /// request.
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// The ledger could not be reached or asked us to come back later.
    /// The outcome of a mutating call is unknown.
    #[error("Transient RPC failure: {0}")]
    TransientRpc(String),

    /// The ledger finalized the transaction as failed, or refused it outright.
    #[error("Transaction {hash} rejected: {reason}")]
    Rejected { hash: String, reason: String },

    /// The client-side wait elapsed before the ledger finalized the transaction.
    #[error("Transaction {0} still pending")]
    StillPending(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Metadata document is {size} bytes; the limit is {limit}")]
    MetadataTooLarge { size: usize, limit: usize },

    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),
}

impl IndexerError {
    /// HTTP status used when this error reaches the REST API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::MetadataTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MetadataUnavailable(_) => StatusCode::NOT_FOUND,
            Self::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::StillPending(_) => StatusCode::ACCEPTED,
            Self::TransientRpc(_) | Self::Http(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Protocol(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_)
            | Self::Migrate(_)
            | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only transport-level failures are worth retrying, and only for reads.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRpc(_) | Self::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
