//! # xmlschema-content
//!
//! XSD content model compiler and runtime validators.
//!
//! A content model (the allowed sequence of child elements of an element) is
//! fed to a [`ContentModelBuilder`] and compiled once into an immutable
//! [`ContentValidator`]: a DFA, an NFA simulation, a counting automaton for
//! bounded ranges, or an all group slot table. Validators are shared between
//! threads; each validation keeps its progress in a [`ValidationState`].
//!
//! ## Features
//!
//! - Unique Particle Attribution check with both conflicting particles reported
//! - Subset construction with a state budget and NFA fallback
//! - `{min, max}` ranges by counters or by expansion
//! - Namespace wildcards (`##any`, `##other`, namespace lists)
//! - Open content
//! - JSON dumps of compiled automata
//!
//! ## Example
//!
//! ```rust
//! use xmlschema_content::namespaces::QName;
//! use xmlschema_content::validators::{
//!     ContentModelBuilder, ContentType, Occurs, ParticleArena, ValidationState,
//! };
//!
//! let mut arena = ParticleArena::new();
//! let a = arena.element(QName::local("a"), Occurs::once());
//! let b = arena.element(QName::local("b"), Occurs::zero_or_more());
//!
//! // a, b*
//! let mut builder = ContentModelBuilder::new(ContentType::ElementOnly);
//! builder.add_name(QName::local("a"), a);
//! builder.add_sequence()?;
//! builder.add_name(QName::local("b"), b);
//! builder.add_star()?;
//! let validator = builder.finish()?;
//!
//! let mut state = ValidationState::new();
//! validator.init_validation(&mut state);
//! assert_eq!(validator.validate_element(&QName::local("a"), &mut state), Ok(Some(a)));
//! assert!(validator.complete_validation(&state));
//! # Ok::<(), xmlschema_content::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;
pub mod namespaces;

// Content models
pub mod validators;

// Diagnostics
pub mod dump;

// Re-exports for convenience
pub use dump::ModelDump;
pub use error::{BuildError, Error, Result, UpaError};
pub use limits::Limits;
pub use namespaces::QName;
pub use validators::{ContentModelBuilder, ContentValidator, ValidationState};

/// Version of the xmlschema-content library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
