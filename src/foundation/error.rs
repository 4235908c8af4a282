/// Convenience result type used across reelflow.
pub type ReelflowResult<T> = Result<T, ReelflowError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum ReelflowError {
    /// Invalid edit, configuration value or buffer shape.
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation was issued against a workflow in a state that does not accept it.
    #[error("state error: {0}")]
    State(String),

    /// The decoder binding failed to open, seek or deliver.
    #[error("decoder error: {0}")]
    Decoder(String),

    /// A bounded wait for a clip state transition expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Settings could not be loaded or are inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelflowError {
    /// Build a [`ReelflowError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelflowError::State`] value.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Build a [`ReelflowError::Decoder`] value.
    pub fn decoder(msg: impl Into<String>) -> Self {
        Self::Decoder(msg.into())
    }

    /// Build a [`ReelflowError::Timeout`] value.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Build a [`ReelflowError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`ReelflowError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// True for [`ReelflowError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
