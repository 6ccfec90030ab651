use crate::error_code::StandardErrorCode;
use thiserror::Error;

/// Structured error context for diagnosing failed analysis calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Component that raised the error (e.g., "http_backend", "response_parser")
    pub source: Option<String>,
    /// Free-form detail (e.g., the missing field, the upstream request id)
    pub details: Option<String>,
    /// Correlation id sent with the backend request
    pub request_id: Option<String>,
    /// Total attempts made before this error became terminal
    pub attempts: Option<u32>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

/// Transport-level failure classes that the retry policy can reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    ConnectionReset,
    ConnectionRefused,
    TimedOut,
    DnsFailure,
    Other,
}

impl NetworkErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionReset => "connection_reset",
            Self::ConnectionRefused => "connection_refused",
            Self::TimedOut => "timed_out",
            Self::DnsFailure => "dns_failure",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the analysis orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {status} ({code}/{}): {message}{}", .code.name(), format_context(.context))]
    Remote {
        status: u16,
        code: StandardErrorCode,
        message: String,
        retry_after_ms: Option<u32>,
        context: ErrorContext,
    },

    #[error("Network error ({kind}): {message}{}", format_context(.context))]
    Network {
        kind: NetworkErrorKind,
        message: String,
        context: ErrorContext,
    },

    #[error("Malformed response: {message}{}", format_context(.context))]
    MalformedResponse {
        message: String,
        context: ErrorContext,
    },

    #[error("Cancelled: {message}{}", format_context(.context))]
    Cancelled {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref id) = ctx.request_id {
        parts.push(format!("request_id: {}", id));
    }
    if let Some(attempts) = ctx.attempts {
        parts.push(format!("attempts: {}", attempts));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedResponse {
            message: msg.into(),
            context: ErrorContext::new().with_source("response_parser"),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Error::Cancelled {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn network(kind: NetworkErrorKind, msg: impl Into<String>) -> Self {
        Error::Network {
            kind,
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Build a remote error from an HTTP status, deriving the standard code from it.
    pub fn remote(status: u16, msg: impl Into<String>) -> Self {
        Error::Remote {
            status,
            code: StandardErrorCode::from_http_status(status),
            message: msg.into(),
            retry_after_ms: None,
            context: ErrorContext::new(),
        }
    }

    /// The standard code this error maps onto.
    pub fn standard_code(&self) -> StandardErrorCode {
        match self {
            Error::Configuration { .. } => StandardErrorCode::Configuration,
            Error::Validation { .. } => StandardErrorCode::InvalidRequest,
            Error::Remote { code, .. } => *code,
            Error::Network { kind, .. } => match kind {
                NetworkErrorKind::TimedOut => StandardErrorCode::Timeout,
                _ => StandardErrorCode::Network,
            },
            Error::MalformedResponse { .. } => StandardErrorCode::MalformedResponse,
            Error::Cancelled { .. } => StandardErrorCode::Cancelled,
            Error::Runtime { .. } | Error::Serialization(_) | Error::Io(_) => {
                StandardErrorCode::Unknown
            }
        }
    }

    /// HTTP status, when the backend answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the standard code marks this error as transient.
    ///
    /// The retry policy consults its own classifier; this is the code-level view.
    pub fn is_retryable(&self) -> bool {
        self.standard_code().retryable()
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Remote { context, .. }
            | Error::Network { context, .. }
            | Error::MalformedResponse { context, .. }
            | Error::Cancelled { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            Error::Serialization(_) | Error::Io(_) => None,
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Remote { context, .. }
            | Error::Network { context, .. }
            | Error::MalformedResponse { context, .. }
            | Error::Cancelled { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            Error::Serialization(_) | Error::Io(_) => None,
        }
    }

    /// Replace the structured context. No-op for wrapped foreign errors.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        if let Some(ctx) = self.context_mut() {
            *ctx = context;
        }
        self
    }

    /// Record how many attempts were spent before this error became terminal.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        if let Some(ctx) = self.context_mut() {
            ctx.attempts = Some(attempts);
        }
        self
    }

    pub fn attempts(&self) -> Option<u32> {
        self.context().and_then(|c| c.attempts)
    }
}
