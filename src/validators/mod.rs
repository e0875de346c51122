//! Content model validators
//!
//! This module contains the content model compiler and the runtime
//! automata it produces.

// Grammar terms
pub mod particles;
pub mod wildcards;

// Compilation
pub mod builders;
pub mod compiler;
pub mod groups;
pub mod symbols;
pub mod syntax_tree;

// Runtime validators
pub mod all;
pub mod base;
pub mod models;
pub mod range;
pub mod state;

// Re-exports
pub use all::AllElementsValidator;
pub use base::{ContentType, ContentValidator, MatchError, MatchResult, TrivialValidator, ValidatorKind};
pub use builders::ContentModelBuilder;
pub use groups::{GroupParticle, ModelType, RangeStrategy, XsdGroup};
pub use models::{DfaValidator, NfaValidator};
pub use particles::{Occurs, ParticleArena, ParticleId, ParticleRecord, Term};
pub use range::RangeValidator;
pub use state::ValidationState;
pub use wildcards::NamespaceConstraint;
