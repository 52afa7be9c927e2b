//! Error taxonomy for the orchestrator core.
//!
//! One variant per error kind named in the orchestrator specification.
//! Construction helpers mirror ordinary usage so call sites read as
//! `Error::not_found("case", case_id)` rather than struct-literal syntax.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed inputs; surfaced to the user as 400.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// End user lacks access to the case; surfaced as 403.
    #[error("not authorized: {message}")]
    Authorization { message: String },

    /// Unknown case / party / document; surfaced as 404.
    #[error("not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    /// LLM/tool call failed but may succeed on retry.
    #[error("transient backend failure ({source}): {message}")]
    TransientBackend { source: String, message: String },

    /// LLM/tool call cannot succeed; escalate.
    #[error("permanent backend failure ({source}): {message}")]
    PermanentBackend { source: String, message: String },

    /// A prompt-bound string failed the PII redaction check.
    #[error("pii violation: {detail}")]
    PiiViolation { detail: String },

    /// Orchestrator exceeded `max_nodes_per_request`.
    #[error("loop budget exhausted after {executed} nodes (limit {limit})")]
    LoopBudgetExhausted { executed: u32, limit: u32 },

    /// Deadline fired while a tool/LLM call was in flight.
    #[error("deadline exceeded mid-tool: {tool}")]
    DeadlineExceededMidTool { tool: String },

    /// Serialization failures against the persisted case document.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Underlying SQLite failures not otherwise classified above.
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else internal to the core that does not fit the named kinds.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization { message: message.into() }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound { entity: entity.into(), id: id.into() }
    }

    pub fn transient_backend(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientBackend { source: source.into(), message: message.into() }
    }

    pub fn permanent_backend(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PermanentBackend { source: source.into(), message: message.into() }
    }

    pub fn pii_violation(detail: impl Into<String>) -> Self {
        Self::PiiViolation { detail: detail.into() }
    }

    pub fn loop_budget_exhausted(executed: u32, limit: u32) -> Self {
        Self::LoopBudgetExhausted { executed, limit }
    }

    pub fn deadline_exceeded_mid_tool(tool: impl Into<String>) -> Self {
        Self::DeadlineExceededMidTool { tool: tool.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the escalation ladder should retry a tool call that failed
    /// with this error (§7: only transient backend failures are retriable).
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::TransientBackend { .. })
    }

    /// The HTTP-equivalent status the request handler maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Authorization { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::DeadlineExceededMidTool { .. } => 504,
            Self::TransientBackend { .. }
            | Self::PermanentBackend { .. }
            | Self::PiiViolation { .. }
            | Self::LoopBudgetExhausted { .. }
            | Self::Serialization(_)
            | Self::Storage(_)
            | Self::Internal(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
