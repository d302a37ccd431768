#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No admin token configured (set ADMIN_TOKEN)")]
    MissingAdminToken,

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session key: {0}")]
    InvalidKey(String),

    #[error("Failed to read session {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write session {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt session record {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode session {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures reported by the remote-client collaborator.
///
/// The credential-type variants are kept apart so callers can tell a
/// checkpoint challenge from a wrong password or a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    BadPassword(String),

    #[error("{0}")]
    ChallengeRequired(String),

    #[error("{0}")]
    TwoFactorRequired(String),

    #[error("{0}")]
    LoginRequired(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

impl RemoteError {
    /// Build an error from a collaborator-reported failure kind.
    pub fn from_kind(kind: Option<&str>, status: u16, message: String) -> Self {
        match kind {
            Some("bad_password") => RemoteError::BadPassword(message),
            Some("challenge_required") => RemoteError::ChallengeRequired(message),
            Some("two_factor_required") => RemoteError::TwoFactorRequired(message),
            Some("login_required") => RemoteError::LoginRequired(message),
            Some("not_found") => RemoteError::NotFound(message),
            Some("rate_limited") => RemoteError::RateLimited(message),
            _ => RemoteError::Api { status, message },
        }
    }

    /// Stable machine-readable code surfaced in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::BadPassword(_) => "BAD_PASSWORD",
            RemoteError::ChallengeRequired(_) => "CHALLENGE_REQUIRED",
            RemoteError::TwoFactorRequired(_) => "TWO_FACTOR_REQUIRED",
            RemoteError::LoginRequired(_) => "LOGIN_REQUIRED",
            RemoteError::NotFound(_) => "RESOURCE_NOT_FOUND",
            RemoteError::RateLimited(_) => "RATE_LIMITED",
            RemoteError::Timeout(_) => "UPSTREAM_TIMEOUT",
            RemoteError::InvalidSession(_) => "INVALID_SESSION",
            RemoteError::Http(_) | RemoteError::Api { .. } | RemoteError::Parse(_) => {
                "UPSTREAM_ERROR"
            }
        }
    }

    /// Whether the failure is about the account credentials themselves.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            RemoteError::BadPassword(_)
                | RemoteError::ChallengeRequired(_)
                | RemoteError::TwoFactorRequired(_)
                | RemoteError::LoginRequired(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Provide either 'url' or 'base64'")]
    MissingSource,

    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    #[error("Invalid media URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to download media: {0}")]
    Fetch(String),

    #[error("Media URL returned status {0}")]
    Status(u16),

    #[error("Media payload is empty")]
    Empty,

    #[error("Media payload exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    Missing,

    #[error("Invalid token")]
    Invalid,
}
