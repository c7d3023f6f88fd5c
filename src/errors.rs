use thiserror::Error;

/// Typed error hierarchy for the broker core.
///
/// Used at module boundaries (credential resolution, spec parsing, executor
/// dispatch, confirmation gate). Leaf/internal functions keep using
/// `anyhow::Result` — the `Internal` variant gives a seamless `?` conversion.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("missing credentials for source '{source_name}'")]
    MissingCredentials { source_name: String },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("upstream HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("unsupported MCP transport: {0}")]
    McpUnsupportedTransport(String),

    #[error("approval timed out")]
    ApprovalTimeout,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

impl BrokerError {
    /// Whether this error kind is safe to retry automatically.
    /// Nothing auto-retries except the single transport reconnect handled
    /// inline by the Executor — never retried here.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Stable machine-readable kind, used by the gateway's error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::Unauthorized => "unauthorized",
            BrokerError::Forbidden(_) => "forbidden",
            BrokerError::MissingCredentials { .. } => "missing_credentials",
            BrokerError::InvalidSpec(_) => "invalid_spec",
            BrokerError::UpstreamHttp { .. } => "upstream_http_error",
            BrokerError::UpstreamTransport(_) => "upstream_transport_error",
            BrokerError::McpUnsupportedTransport(_) => "mcp_unsupported_transport",
            BrokerError::ApprovalTimeout => "approval_timeout",
            BrokerError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status the gateway should report for this error kind.
    pub fn http_status(&self) -> u16 {
        match self {
            BrokerError::Unauthorized => 401,
            BrokerError::Forbidden(_) => 403,
            BrokerError::MissingCredentials { .. } => 424,
            BrokerError::InvalidSpec(_) => 422,
            BrokerError::UpstreamHttp { .. } => 502,
            BrokerError::UpstreamTransport(_) => 504,
            BrokerError::McpUnsupportedTransport(_) => 400,
            BrokerError::ApprovalTimeout => 408,
            BrokerError::Internal(_) => 500,
        }
    }
}
