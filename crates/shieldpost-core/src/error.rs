use std::time::Duration;

use thiserror::Error;

use crate::amount::TokenAmount;

/// Boxed cause attached to collaborator failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// External service a failed call was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    DataProtector,
    MessageRelay,
    AccountService,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataProtector => write!(f, "data protector"),
            Self::MessageRelay => write!(f, "message relay"),
            Self::AccountService => write!(f, "account service"),
        }
    }
}

/// Core error types for shieldpost operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{collaborator} call failed: {message}")]
    Collaborator {
        collaborator: Collaborator,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: TokenAmount,
        available: TokenAmount,
    },

    #[error("No grants found for {dataset}")]
    NoGrants { dataset: String },
}

impl CoreError {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a collaborator failure without an underlying cause
    pub fn collaborator(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator,
            message: message.into(),
            source: None,
        }
    }

    /// Create a collaborator failure wrapping the error that caused it
    pub fn collaborator_with_source(
        collaborator: Collaborator,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Collaborator {
            collaborator,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Get error category for logging and exit-status decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Collaborator { .. } | Self::NoGrants { .. } => ErrorCategory::Collaborator,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::InsufficientBalance { .. } => ErrorCategory::InsufficientBalance,
        }
    }

    /// Errors raised before any external call is made
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration
                | ErrorCategory::Validation
                | ErrorCategory::InsufficientBalance
        )
    }
}

/// Error categories for logging and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Collaborator,
    Timeout,
    InsufficientBalance,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Validation => write!(f, "validation"),
            Self::Collaborator => write!(f, "collaborator"),
            Self::Timeout => write!(f, "timeout"),
            Self::InsufficientBalance => write!(f, "insufficient_balance"),
        }
    }
}

/// Render an error and every nested cause as `outer: cause: root`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
