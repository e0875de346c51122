//! Error types for xmlschema-content
//!
//! Compile-time failures of a content model are reported through [`Error`].
//! Per-child validation failures are not errors in this sense: they are
//! returned as [`MatchError`](crate::validators::MatchError) codes so the
//! caller can decide how to report them.

use std::fmt;
use thiserror::Error;

use crate::validators::particles::ParticleId;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for content model compilation
#[derive(Error, Debug)]
pub enum Error {
    /// Unique Particle Attribution violation
    #[error("ambiguous content model: {0}")]
    Upa(#[from] UpaError),

    /// Builder misuse or malformed syntax tree
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Value error (invalid occurrence bounds)
    #[error("value error: {0}")]
    Value(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Dump serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Two grammar terms that are reachable at the same point and match the
/// same input symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpaError {
    /// The particle recorded first for the symbol
    pub particle1: ParticleId,
    /// The competing particle
    pub particle2: ParticleId,
    /// Display label of the first particle
    pub label1: String,
    /// Display label of the competing particle
    pub label2: String,
}

impl UpaError {
    /// Create a new ambiguity error
    pub fn new(
        particle1: ParticleId,
        particle2: ParticleId,
        label1: impl Into<String>,
        label2: impl Into<String>,
    ) -> Self {
        Self {
            particle1,
            particle2,
            label1: label1.into(),
            label2: label2.into(),
        }
    }

    /// Both conflicting particles
    pub fn particles(&self) -> (ParticleId, ParticleId) {
        (self.particle1, self.particle2)
    }
}

impl fmt::Display for UpaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' ({}) and '{}' ({}) both match the same element",
            self.label1, self.particle1, self.label2, self.particle2
        )
    }
}

impl std::error::Error for UpaError {}

/// Content model construction error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    /// Error message
    pub message: String,
    /// Builder operation that failed
    pub operation: Option<String>,
}

impl BuildError {
    /// Create a new build error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            operation: None,
        }
    }

    /// Set the failing operation
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref operation) = self.operation {
            write!(f, " (in {})", operation)?;
        }

        Ok(())
    }
}

impl std::error::Error for BuildError {}
