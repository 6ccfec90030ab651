//! Standard error codes for analysis requests.
//!
//! Every terminal error surfaced by the orchestrator maps onto one of these
//! codes, so callers can tell "backend rejected input" apart from "backend
//! unreachable" and "response shape invalid" without matching on messages.
//!
//! ## Error Code Categories
//!
//! | Prefix | Category    | Description                         |
//! |--------|-------------|-------------------------------------|
//! | E1xxx  | client      | Request-side errors                 |
//! | E2xxx  | rate        | Rate limit and quota errors         |
//! | E3xxx  | server      | Backend-side and transport errors   |
//! | E4xxx  | operational | Lifecycle and payload-shape errors  |
//! | E9xxx  | unknown     | Catch-all / unclassified            |
//!
//! ## Example
//!
//! ```rust
//! use analysis_orchestrator::error_code::StandardErrorCode;
//!
//! let code = StandardErrorCode::from_http_status(429);
//! assert_eq!(code.code(), "E2001");
//! assert!(code.retryable());
//! assert_eq!(code.category(), "rate");
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardErrorCode {
    /// E1001: Malformed request, invalid parameters, or missing required fields
    InvalidRequest,
    /// E1002: Invalid, expired, or missing API key
    Authentication,
    /// E1003: Valid credentials but insufficient permissions
    PermissionDenied,
    /// E1004: Requested model or endpoint does not exist
    NotFound,
    /// E1005: Input exceeds context window or payload size limit
    RequestTooLarge,
    /// E2001: Request rate limit exceeded
    RateLimited,
    /// E2002: Account usage quota or billing limit reached
    QuotaExhausted,
    /// E3001: Internal server error on backend side
    ServerError,
    /// E3002: Backend temporarily overloaded
    Overloaded,
    /// E3003: Request timed out before a response arrived
    Timeout,
    /// E3004: Connection reset, refused, or name resolution failed
    Network,
    /// E4001: Backend answered but the payload is unusable
    MalformedResponse,
    /// E4002: Work was dropped before it started
    Cancelled,
    /// E4003: Orchestrator configuration is missing or invalid
    Configuration,
    /// E9999: Error could not be classified
    Unknown,
}

impl StandardErrorCode {
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::NotFound => "E1004",
            Self::RequestTooLarge => "E1005",
            Self::RateLimited => "E2001",
            Self::QuotaExhausted => "E2002",
            Self::ServerError => "E3001",
            Self::Overloaded => "E3002",
            Self::Timeout => "E3003",
            Self::Network => "E3004",
            Self::MalformedResponse => "E4001",
            Self::Cancelled => "E4002",
            Self::Configuration => "E4003",
            Self::Unknown => "E9999",
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::MalformedResponse => "malformed_response",
            Self::Cancelled => "cancelled",
            Self::Configuration => "configuration",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether this error is transient by default.
    ///
    /// Quota exhaustion is deliberately excluded: waiting out a backoff window
    /// does not restore a billing limit.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Overloaded | Self::Timeout | Self::Network
        )
    }

    /// Returns the category: `"client"`, `"rate"`, `"server"`, `"operational"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest
            | Self::Authentication
            | Self::PermissionDenied
            | Self::NotFound
            | Self::RequestTooLarge => "client",
            Self::RateLimited | Self::QuotaExhausted => "rate",
            Self::ServerError | Self::Overloaded | Self::Timeout | Self::Network => "server",
            Self::MalformedResponse | Self::Cancelled | Self::Configuration => "operational",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a backend error type string to the corresponding code.
    ///
    /// Accepts both the standard names and common backend aliases such as
    /// `"authentication_error"`, `"overloaded_error"` or `"insufficient_quota"`.
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let code = match provider_code {
            "invalid_request" | "invalid_request_error" => Self::InvalidRequest,
            "authentication" | "invalid_api_key" | "authentication_error" => Self::Authentication,
            "permission_denied" | "permission_error" => Self::PermissionDenied,
            "not_found" | "not_found_error" | "model_not_found" => Self::NotFound,
            "request_too_large" | "context_length_exceeded" => Self::RequestTooLarge,
            "rate_limited" | "rate_limit_exceeded" | "rate_limit_error" => Self::RateLimited,
            "quota_exhausted" | "insufficient_quota" | "billing_error" => Self::QuotaExhausted,
            "server_error" | "api_error" => Self::ServerError,
            "overloaded" | "overloaded_error" => Self::Overloaded,
            "timeout" | "timeout_error" => Self::Timeout,
            _ => return None,
        };
        Some(code)
    }

    /// Maps an HTTP status code to the most likely code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            500 | 502 => Self::ServerError,
            503 | 529 => Self::Overloaded,
            504 => Self::Timeout,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StandardErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
