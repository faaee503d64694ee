// Error taxonomy shared by every ally driver.
//
// Each variant carries a stable `E_*` code so host applications can branch on
// the failure kind without matching on message text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable error codes surfaced to host applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EMissingConfig,
    EOauthTokenExchange,
    EOauthStateMismatch,
    EOauthProfileFetch,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EMissingConfig => "E_MISSING_CONFIG",
            Self::EOauthTokenExchange => "E_OAUTH_TOKEN_EXCHANGE",
            Self::EOauthStateMismatch => "E_OAUTH_STATE_MISMATCH",
            Self::EOauthProfileFetch => "E_OAUTH_PROFILE_FETCH",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while configuring a driver or running an OAuth flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllyError {
    /// The driver config is absent or lacks `clientId`, `clientSecret` or `redirectUri`.
    #[error("E_MISSING_CONFIG: {driver} is not defined inside config/services")]
    MissingConfig { driver: String },

    /// No authorization code came back, or the token endpoint rejected it.
    #[error("E_OAUTH_TOKEN_EXCHANGE: {message}")]
    TokenExchange {
        message: String,
        /// HTTP status returned by the token endpoint, if a response was received.
        status: Option<u16>,
        /// Raw provider response body (or the redirect error message).
        response: Option<String>,
    },

    /// The state returned by the provider differs from the one issued.
    #[error("E_OAUTH_STATE_MISMATCH: Oauth state mismatch")]
    InvalidState,

    /// The profile or email endpoint failed after a token was obtained.
    #[error("E_OAUTH_PROFILE_FETCH: {message}")]
    ProfileFetch { message: String, status: Option<u16> },
}

impl AllyError {
    pub fn missing_config(driver: impl Into<String>) -> Self {
        Self::MissingConfig {
            driver: driver.into(),
        }
    }

    pub fn token_exchange(message: impl Into<String>) -> Self {
        Self::TokenExchange {
            message: message.into(),
            status: None,
            response: None,
        }
    }

    pub fn profile_fetch(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::ProfileFetch {
            message: message.into(),
            status,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingConfig { .. } => ErrorCode::EMissingConfig,
            Self::TokenExchange { .. } => ErrorCode::EOauthTokenExchange,
            Self::InvalidState => ErrorCode::EOauthStateMismatch,
            Self::ProfileFetch { .. } => ErrorCode::EOauthProfileFetch,
        }
    }

    /// Human-readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::MissingConfig { driver } => {
                format!("{driver} is not defined inside config/services")
            }
            Self::TokenExchange { message, .. } | Self::ProfileFetch { message, .. } => {
                message.clone()
            }
            Self::InvalidState => "Oauth state mismatch".to_string(),
        }
    }
}

/// Unified result type for ally operations.
pub type Result<T> = std::result::Result<T, AllyError>;
