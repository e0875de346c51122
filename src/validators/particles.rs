//! XSD Particle Components
//!
//! A particle is the grammar term a matched child element is attributed to.
//! The automata never look inside a particle: they only compare particles by
//! identity and hand the matching [`ParticleId`] back to the caller.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#p

use rust_decimal::Decimal;
use std::fmt;

use crate::error::{Error, Result};
use crate::namespaces::QName;

use super::wildcards::NamespaceConstraint;

/// Identity of a grammar term. Two particles are the same iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(usize);

impl ParticleId {
    /// Create a particle id from an index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Index of this particle in its arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is empty (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max == Some(0)
    }

    /// Check the bounds are consistent (min <= max)
    pub fn check(&self) -> Result<()> {
        match self.max {
            Some(max) if self.min > max => Err(Error::Value(format!(
                "maxOccurs ({}) must be greater than or equal to minOccurs ({})",
                max, self.min
            ))),
            _ => Ok(()),
        }
    }

    /// Number of operand copies needed to spell the bounds out with `?`
    /// and `*` operators
    pub fn expanded_copies(&self) -> usize {
        let copies = match (self.min, self.max) {
            (0, Some(max)) => max,
            (min, Some(max)) => max.max(min),
            (min, None) => min.saturating_add(1),
        };
        copies as usize
    }

    /// Bounds as decimals for the range automaton, unbounded maps to `Decimal::MAX`
    pub fn to_decimal_range(&self) -> (Decimal, Decimal) {
        let max = match self.max {
            Some(max) => Decimal::from(max),
            None => Decimal::MAX,
        };
        (Decimal::from(self.min), max)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{{{}, {}}}", self.min, max),
            None => write!(f, "{{{}, unbounded}}", self.min),
        }
    }
}

/// What a particle matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A declared element
    Element(QName),
    /// An element wildcard (xs:any)
    Any(NamespaceConstraint),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Element(name) => write!(f, "{}", name),
            Term::Any(constraint) => write!(f, "{}", constraint),
        }
    }
}

/// A particle record stored in a [`ParticleArena`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticleRecord {
    /// The term
    pub term: Term,
    /// Occurrence bounds
    pub occurs: Occurs,
}

/// Owner of particle records; hands out [`ParticleId`]s.
#[derive(Debug, Clone, Default)]
pub struct ParticleArena {
    records: Vec<ParticleRecord>,
}

impl ParticleArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an element particle
    pub fn element(&mut self, name: QName, occurs: Occurs) -> ParticleId {
        self.alloc(Term::Element(name), occurs)
    }

    /// Allocate a wildcard particle
    pub fn any(&mut self, constraint: NamespaceConstraint, occurs: Occurs) -> ParticleId {
        self.alloc(Term::Any(constraint), occurs)
    }

    fn alloc(&mut self, term: Term, occurs: Occurs) -> ParticleId {
        let id = ParticleId::new(self.records.len());
        self.records.push(ParticleRecord { term, occurs });
        id
    }

    /// Look up a particle record
    pub fn get(&self, id: ParticleId) -> Option<&ParticleRecord> {
        self.records.get(id.index())
    }

    /// Number of particles
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_presets() {
        assert_eq!(Occurs::once(), Occurs::new(1, Some(1)));
        assert_eq!(Occurs::optional(), Occurs::new(0, Some(1)));
        assert_eq!(Occurs::zero_or_more(), Occurs::new(0, None));
        assert_eq!(Occurs::one_or_more(), Occurs::new(1, None));
    }

    #[test]
    fn test_occurs_predicates() {
        assert!(Occurs::optional().is_emptiable());
        assert!(!Occurs::once().is_emptiable());
        assert!(Occurs::new(0, Some(0)).is_empty());
        assert!(Occurs::new(3, Some(2)).check().is_err());
        assert!(Occurs::new(2, None).check().is_ok());
    }

    #[test]
    fn test_occurs_decimal_range() {
        let (min, max) = Occurs::new(2, Some(4)).to_decimal_range();
        assert_eq!(min, Decimal::from(2));
        assert_eq!(max, Decimal::from(4));

        let (_, max) = Occurs::new(2, None).to_decimal_range();
        assert_eq!(max, Decimal::MAX);
    }

    #[test]
    fn test_arena_identity() {
        let mut arena = ParticleArena::new();
        let a = arena.element(QName::local("a"), Occurs::once());
        let a2 = arena.element(QName::local("a"), Occurs::once());
        let any = arena.any(NamespaceConstraint::Any, Occurs::zero_or_more());

        assert_ne!(a, a2);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.get(any).map(|r| r.occurs), Some(Occurs::zero_or_more()));
        assert_eq!(arena.get(a).map(|r| r.term.to_string()), Some("a".to_string()));
        assert!(arena.get(ParticleId::new(7)).is_none());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_particle_id_keeps_large_index() {
        let index = u32::MAX as usize + 5;
        let id = ParticleId::new(index);
        assert_eq!(id.index(), index);
        assert_ne!(id, ParticleId::new(4));
    }
}
