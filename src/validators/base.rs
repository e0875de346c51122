//! Base content validator infrastructure
//!
//! Every compiled content model implements [`ContentValidator`]. Validators
//! are immutable once built and may be shared between threads; all mutable
//! progress lives in the caller's [`ValidationState`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::dump::ModelDump;
use crate::namespaces::QName;

use super::particles::ParticleId;
use super::state::ValidationState;

/// Content type of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// No children and no text
    Empty,
    /// Text only
    TextOnly,
    /// Child elements only
    ElementOnly,
    /// Child elements interleaved with text
    Mixed,
}

impl ContentType {
    /// Get the content type as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Empty => "empty",
            ContentType::TextOnly => "text-only",
            ContentType::ElementOnly => "element-only",
            ContentType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a child element was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchError {
    /// No admissible transition for the element
    #[error("element is not expected here")]
    Unexpected,
    /// The element was already matched by an all group
    #[error("element occurs more than once")]
    Duplicate,
    /// The state was initialised by another kind of validator
    #[error("validation state was not initialised by this validator")]
    StateMismatch,
}

impl MatchError {
    /// Stable integer code of the error
    pub fn code(self) -> i32 {
        match self {
            MatchError::Unexpected => -1,
            MatchError::Duplicate => -2,
            MatchError::StateMismatch => -3,
        }
    }
}

/// Result of matching one child element: the particle it is attributed to,
/// if any
pub type MatchResult = std::result::Result<Option<ParticleId>, MatchError>;

/// Automaton behind a validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    /// Fixed answer, no automaton
    Trivial,
    /// Deterministic transition table
    Dfa,
    /// Position set simulation
    Nfa,
    /// Position sets with occurrence counters
    Range,
    /// Unordered all group
    All,
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidatorKind::Trivial => "trivial",
            ValidatorKind::Dfa => "dfa",
            ValidatorKind::Nfa => "nfa",
            ValidatorKind::Range => "range",
            ValidatorKind::All => "all",
        };
        write!(f, "{}", s)
    }
}

/// A compiled content model.
///
/// The caller drives one element at a time: [`init_validation`] at the
/// element start, [`validate_element`] for each child in document order and
/// [`complete_validation`] at the element end.
///
/// [`init_validation`]: ContentValidator::init_validation
/// [`validate_element`]: ContentValidator::validate_element
/// [`complete_validation`]: ContentValidator::complete_validation
pub trait ContentValidator: fmt::Debug + Send + Sync {
    /// Declared content type
    fn content_type(&self) -> ContentType;

    /// Automaton kind
    fn kind(&self) -> ValidatorKind;

    /// Check if unknown elements are tolerated once the model has matched
    fn is_open(&self) -> bool {
        false
    }

    /// Check if the model accepts no children at all
    fn is_emptiable(&self) -> bool;

    /// Check if whitespace in the content is significant
    fn preserve_whitespace(&self) -> bool {
        matches!(self.content_type(), ContentType::TextOnly | ContentType::Mixed)
    }

    /// Reset the state for a new element
    fn init_validation(&self, state: &mut ValidationState);

    /// Match one child element
    fn validate_element(&self, name: &QName, state: &mut ValidationState) -> MatchResult;

    /// Check if the children seen so far form a complete match
    fn complete_validation(&self, state: &ValidationState) -> bool;

    /// Display names of the elements admissible next
    fn expected_elements(&self, _state: &ValidationState, _required_only: bool) -> Vec<String> {
        Vec::new()
    }

    /// Particles admissible next, in automaton order without duplicates
    fn expected_particles(&self, _state: &ValidationState, _required_only: bool) -> Vec<ParticleId> {
        Vec::new()
    }

    /// Serializable description of the automaton
    fn dump(&self) -> ModelDump;
}

/// Validator for content models without element particles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrivialValidator {
    content_type: ContentType,
    open: bool,
    emptiable: bool,
}

impl TrivialValidator {
    fn new(content_type: ContentType, open: bool, emptiable: bool) -> Self {
        Self {
            content_type,
            open,
            emptiable,
        }
    }
}

impl ContentValidator for TrivialValidator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Trivial
    }

    fn is_open(&self) -> bool {
        match self.content_type {
            ContentType::Empty | ContentType::TextOnly => false,
            _ => self.open,
        }
    }

    fn is_emptiable(&self) -> bool {
        self.emptiable
    }

    fn init_validation(&self, state: &mut ValidationState) {
        state.reset();
    }

    fn validate_element(&self, _name: &QName, state: &mut ValidationState) -> MatchResult {
        if self.is_open() {
            return Ok(None);
        }
        if matches!(self.content_type, ContentType::Empty | ContentType::TextOnly) {
            state.need_validate_children = false;
        }
        Err(MatchError::Unexpected)
    }

    fn complete_validation(&self, _state: &ValidationState) -> bool {
        true
    }

    fn dump(&self) -> ModelDump {
        ModelDump::new(ValidatorKind::Trivial, self.content_type)
            .with_flags(self.is_open(), self.emptiable)
    }
}

static EMPTY: Lazy<Arc<dyn ContentValidator>> =
    Lazy::new(|| Arc::new(TrivialValidator::new(ContentType::Empty, false, true)));

static TEXT_ONLY: Lazy<Arc<dyn ContentValidator>> =
    Lazy::new(|| Arc::new(TrivialValidator::new(ContentType::TextOnly, false, false)));

static MIXED: Lazy<Arc<dyn ContentValidator>> =
    Lazy::new(|| Arc::new(TrivialValidator::new(ContentType::Mixed, false, true)));

static ANY: Lazy<Arc<dyn ContentValidator>> =
    Lazy::new(|| Arc::new(TrivialValidator::new(ContentType::Mixed, true, true)));

/// Shared validator for empty content
pub fn empty() -> Arc<dyn ContentValidator> {
    Arc::clone(&EMPTY)
}

/// Shared validator for text-only content
pub fn text_only() -> Arc<dyn ContentValidator> {
    Arc::clone(&TEXT_ONLY)
}

/// Shared validator for mixed content with no element particles
pub fn mixed() -> Arc<dyn ContentValidator> {
    Arc::clone(&MIXED)
}

/// Shared validator accepting any content
pub fn any() -> Arc<dyn ContentValidator> {
    Arc::clone(&ANY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_error_codes() {
        assert_eq!(MatchError::Unexpected.code(), -1);
        assert_eq!(MatchError::Duplicate.code(), -2);
        assert_eq!(MatchError::StateMismatch.code(), -3);
        assert_ne!(MatchError::Unexpected, MatchError::Duplicate);
    }

    #[test]
    fn test_empty_rejects_elements() {
        let validator = empty();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        assert_eq!(
            validator.validate_element(&QName::local("a"), &mut state),
            Err(MatchError::Unexpected)
        );
        assert!(!state.need_validate_children);
        assert!(validator.complete_validation(&state));
        assert!(validator.is_emptiable());
        assert!(!validator.preserve_whitespace());
    }

    #[test]
    fn test_text_only() {
        let validator = text_only();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        assert!(validator.validate_element(&QName::local("a"), &mut state).is_err());
        assert!(!validator.is_open());
        assert!(!validator.is_emptiable());
        assert!(validator.preserve_whitespace());
    }

    #[test]
    fn test_any_accepts_elements() {
        let validator = any();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        assert_eq!(
            validator.validate_element(&QName::namespaced("urn:x", "a"), &mut state),
            Ok(None)
        );
        assert!(state.need_validate_children);
        assert!(validator.is_open());
        assert!(validator.complete_validation(&state));
    }

    #[test]
    fn test_mixed_rejects_elements_but_keeps_children() {
        let validator = mixed();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        assert_eq!(
            validator.validate_element(&QName::local("a"), &mut state),
            Err(MatchError::Unexpected)
        );
        assert!(state.need_validate_children);
        assert_eq!(validator.content_type(), ContentType::Mixed);
    }

    #[test]
    fn test_shared_instances() {
        assert!(Arc::ptr_eq(&empty(), &empty()));
        assert_eq!(any().kind(), ValidatorKind::Trivial);
        assert_eq!(any().dump().kind, ValidatorKind::Trivial);
    }
}
