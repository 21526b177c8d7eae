//! Error taxonomy for registry operations
//!
//! Every failure path of an action maps to one `RegistryError` variant.
//! Identity validation failures are deliberately absent: they are folded
//! into validity flags on the result types instead of being raised.

use thiserror::Error;

/// Main error type for the contributor registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Required settings missing or inconsistent. Raised before any network access.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Checkout failed (authentication, network, timeout). Message is redacted.
    #[error("Failed to acquire registry checkout: {0}")]
    Acquisition(String),

    /// Expected record absent at the derived path.
    #[error("Contributor record not found: {path}")]
    NotFound { path: String },

    /// Record file present but not a well-formed record document.
    #[error("Malformed contributor record {path}: {message}")]
    Parse { path: String, message: String },

    /// Remote advanced between acquire and publish.
    #[error("Publish rejected, registry changed since checkout: {0}")]
    PublishConflict(String),

    /// Commit or push failed for a reason other than a conflict.
    #[error("Failed to publish registry change: {0}")]
    Publish(String),

    /// Two distinct usernames resolve to the same record file.
    #[error("Username '{requested}' collides with existing record for '{existing}' at {path}")]
    UsernameCollision {
        requested: String,
        existing: String,
        path: String,
    },

    /// Username sanitizes to an empty record key.
    #[error("Username '{0}' has no usable characters for a record key")]
    InvalidUsername(String),

    /// Create was asked for a contributor that already has a record.
    #[error("Contributor record already exists: {path}")]
    AlreadyExists { path: String },

    /// Code-hosting API call failed. Message is redacted.
    #[error("API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Stable snake_case tag for structured reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Acquisition(_) => "acquisition",
            Self::NotFound { .. } => "not_found",
            Self::Parse { .. } => "parse",
            Self::PublishConflict(_) => "publish_conflict",
            Self::Publish(_) => "publish",
            Self::UsernameCollision { .. } => "username_collision",
            Self::InvalidUsername(_) => "invalid_username",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Api(_) => "api",
            Self::Io(_) => "io",
        }
    }

    /// Whether callers may branch on this error instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
