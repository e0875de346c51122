//! XSD Model Group lowering
//!
//! Model groups are the input most callers have:
//! - xs:sequence - ordered content
//! - xs:choice - alternative content
//! - xs:all - unordered content, elements only
//!
//! [`XsdGroup::compile`] walks a group tree and replays it as builder
//! events, or builds an [`AllElementsValidator`] for xs:all.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Model_Groups

use std::sync::Arc;

use crate::error::{BuildError, Result};

use super::all::AllElementsValidator;
use super::base::ContentValidator;
use super::builders::ContentModelBuilder;
use super::particles::{Occurs, ParticleArena, ParticleId, Term};

/// Model group compositor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of elements
    All,
}

impl ModelType {
    /// Parse from element tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" | "{http://www.w3.org/2001/XMLSchema}sequence" => Some(Self::Sequence),
            "choice" | "{http://www.w3.org/2001/XMLSchema}choice" => Some(Self::Choice),
            "all" | "{http://www.w3.org/2001/XMLSchema}all" => Some(Self::All),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// How `{min, max}` bounds other than `?`, `*` and `+` are compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeStrategy {
    /// Counting automaton
    #[default]
    Counter,
    /// Copies of the operand when they fit the copy budget, otherwise counters
    Expand,
}

/// A particle in a model group
#[derive(Debug, Clone, PartialEq)]
pub enum GroupParticle {
    /// Element particle
    Element(ParticleId),
    /// Wildcard particle (xs:any)
    Any(ParticleId),
    /// Nested model group
    Group(XsdGroup),
}

/// A model group with its own occurrence bounds
#[derive(Debug, Clone, PartialEq)]
pub struct XsdGroup {
    /// Compositor
    pub model: ModelType,
    /// Particles in declaration order
    pub particles: Vec<GroupParticle>,
    /// Occurrence bounds of the whole group
    pub occurs: Occurs,
}

impl XsdGroup {
    /// Create an empty group occurring once
    pub fn new(model: ModelType) -> Self {
        Self {
            model,
            particles: Vec::new(),
            occurs: Occurs::once(),
        }
    }

    /// Set the group's occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Add an element particle
    pub fn add_element(&mut self, particle: ParticleId) {
        self.particles.push(GroupParticle::Element(particle));
    }

    /// Add a wildcard particle
    pub fn add_any(&mut self, particle: ParticleId) {
        self.particles.push(GroupParticle::Any(particle));
    }

    /// Add a nested group
    pub fn add_group(&mut self, group: XsdGroup) {
        self.particles.push(GroupParticle::Group(group));
    }

    /// Number of direct particles
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Check if the group has no particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Check if the group contributes anything to a content model
    pub fn is_effective(&self, arena: &ParticleArena) -> bool {
        self.occurs.max != Some(0)
            && self
                .particles
                .iter()
                .any(|particle| is_effective(particle, arena))
    }

    /// Check if the group can match no elements at all
    pub fn is_emptiable(&self, arena: &ParticleArena) -> bool {
        if self.occurs.min == 0 || !self.is_effective(arena) {
            return true;
        }
        let mut emptiable = self
            .particles
            .iter()
            .filter(|particle| is_effective(particle, arena))
            .map(|particle| match particle {
                GroupParticle::Element(id) | GroupParticle::Any(id) => {
                    arena.get(*id).map_or(true, |record| record.occurs.min == 0)
                }
                GroupParticle::Group(group) => group.is_emptiable(arena),
            });
        match self.model {
            ModelType::Choice => emptiable.any(|e| e),
            ModelType::Sequence | ModelType::All => emptiable.all(|e| e),
        }
    }

    /// Compile the group into a validator. Settings of `builder` (content
    /// type, open content, UPA check, limits) apply.
    pub fn compile(
        &self,
        arena: &ParticleArena,
        mut builder: ContentModelBuilder,
        strategy: RangeStrategy,
    ) -> Result<Arc<dyn ContentValidator>> {
        if self.model == ModelType::All && self.is_effective(arena) {
            let validator = self.all_validator(arena, &builder)?;
            return Ok(Arc::new(validator));
        }
        self.lower(arena, &mut builder, strategy)?;
        builder.finish()
    }

    fn all_validator(
        &self,
        arena: &ParticleArena,
        builder: &ContentModelBuilder,
    ) -> Result<AllElementsValidator> {
        if self.occurs.max.map_or(true, |max| max > 1) {
            return Err(BuildError::new("an all group may occur at most once")
                .with_operation("compile")
                .into());
        }
        let mut validator = AllElementsValidator::new(builder.content_type(), self.occurs.min == 0);
        for particle in &self.particles {
            let id = match particle {
                GroupParticle::Element(id) => *id,
                _ => {
                    return Err(BuildError::new("an all group may only contain elements")
                        .with_operation("compile")
                        .into())
                }
            };
            let record = arena
                .get(id)
                .ok_or_else(|| BuildError::new(format!("unknown particle {}", id)))?;
            if record.occurs.max == Some(0) {
                continue;
            }
            if record.occurs.max.map_or(true, |max| max > 1) {
                return Err(BuildError::new(format!(
                    "element {} in an all group may occur at most once",
                    record.term
                ))
                .with_operation("compile")
                .into());
            }
            let name = match &record.term {
                Term::Element(name) => name.clone(),
                Term::Any(_) => {
                    return Err(BuildError::new("an all group may only contain elements")
                        .with_operation("compile")
                        .into())
                }
            };
            validator.add_element(name, id, record.occurs.min > 0)?;
        }
        Ok(validator)
    }

    /// Replay the group as builder events. Returns false if nothing was
    /// emitted.
    fn lower(
        &self,
        arena: &ParticleArena,
        builder: &mut ContentModelBuilder,
        strategy: RangeStrategy,
    ) -> Result<bool> {
        if !self.is_effective(arena) {
            return Ok(false);
        }
        if self.model == ModelType::All {
            return Err(BuildError::new("an all group cannot be nested")
                .with_operation("compile")
                .into());
        }

        builder.open_group();
        let mut first = true;
        for particle in self.particles.iter().filter(|p| is_effective(p, arena)) {
            if !first {
                match self.model {
                    ModelType::Choice => builder.add_choice()?,
                    _ => builder.add_sequence()?,
                }
            }
            first = false;

            match particle {
                GroupParticle::Element(id) | GroupParticle::Any(id) => {
                    let record = arena
                        .get(*id)
                        .ok_or_else(|| BuildError::new(format!("unknown particle {}", id)))?;
                    match &record.term {
                        Term::Element(name) => builder.add_name(name.clone(), *id),
                        Term::Any(constraint) => builder.add_namespace_wildcard(constraint, *id),
                    }
                    apply_occurs(builder, record.occurs, strategy)?;
                }
                GroupParticle::Group(group) => {
                    group.lower(arena, builder, strategy)?;
                }
            }
        }
        builder.close_group()?;
        apply_occurs(builder, self.occurs, strategy)?;
        Ok(true)
    }
}

fn is_effective(particle: &GroupParticle, arena: &ParticleArena) -> bool {
    match particle {
        GroupParticle::Element(id) | GroupParticle::Any(id) => arena
            .get(*id)
            .map_or(true, |record| record.occurs.max != Some(0)),
        GroupParticle::Group(group) => group.is_effective(arena),
    }
}

fn apply_occurs(
    builder: &mut ContentModelBuilder,
    occurs: Occurs,
    strategy: RangeStrategy,
) -> Result<()> {
    match (occurs.min, occurs.max) {
        (1, Some(1)) => Ok(()),
        (0, Some(1)) => builder.add_optional(),
        (0, None) => builder.add_star(),
        (1, None) => builder.add_plus(),
        (min, max) => {
            occurs.check()?;
            let expand = strategy == RangeStrategy::Expand
                && builder
                    .limits()
                    .check_expanded_copies(occurs.expanded_copies())
                    .is_ok();
            if expand {
                builder.add_expanded_range(min, max)
            } else {
                let (min, max) = occurs.to_decimal_range();
                builder.add_bounded_range(min, max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::namespaces::QName;
    use crate::validators::base::{ContentType, ValidatorKind};
    use crate::validators::state::ValidationState;

    fn accepts(validator: &Arc<dyn ContentValidator>, names: &[&str]) -> bool {
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        names.iter().all(|name| {
            validator
                .validate_element(&QName::local(*name), &mut state)
                .is_ok()
        }) && validator.complete_validation(&state)
    }

    #[test]
    fn test_model_type_from_tag() {
        assert_eq!(ModelType::from_tag("sequence"), Some(ModelType::Sequence));
        assert_eq!(
            ModelType::from_tag("{http://www.w3.org/2001/XMLSchema}choice"),
            Some(ModelType::Choice)
        );
        assert_eq!(ModelType::from_tag("all"), Some(ModelType::All));
        assert_eq!(ModelType::from_tag("group"), None);
        assert_eq!(ModelType::All.to_string(), "all");
    }

    #[test]
    fn test_sequence_with_optional_choice() {
        let mut arena = ParticleArena::new();
        let a = arena.element(QName::local("a"), Occurs::once());
        let b = arena.element(QName::local("b"), Occurs::once());
        let c = arena.element(QName::local("c"), Occurs::once());

        let mut choice = XsdGroup::new(ModelType::Choice).with_occurs(Occurs::optional());
        choice.add_element(b);
        choice.add_element(c);
        let mut sequence = XsdGroup::new(ModelType::Sequence);
        sequence.add_element(a);
        sequence.add_group(choice);

        let validator = sequence
            .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
            .unwrap();
        assert_eq!(validator.kind(), ValidatorKind::Dfa);
        assert!(accepts(&validator, &["a"]));
        assert!(accepts(&validator, &["a", "c"]));
        assert!(!accepts(&validator, &["a", "b", "c"]));
        assert!(!accepts(&validator, &["b"]));
    }

    #[test]
    fn test_counted_and_expanded_ranges_agree() {
        let mut arena = ParticleArena::new();
        let a = arena.element(QName::local("a"), Occurs::new(2, Some(3)));
        let b = arena.element(QName::local("b"), Occurs::optional());
        let mut group = XsdGroup::new(ModelType::Sequence);
        group.add_element(a);
        group.add_element(b);

        let counted = group
            .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
            .unwrap();
        let expanded = group
            .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Expand)
            .unwrap();
        assert_eq!(counted.kind(), ValidatorKind::Range);
        assert_eq!(expanded.kind(), ValidatorKind::Dfa);

        let inputs: [&[&str]; 6] = [
            &["a"],
            &["a", "a"],
            &["a", "a", "b"],
            &["a", "a", "a", "b"],
            &["a", "a", "a", "a"],
            &["b"],
        ];
        for input in inputs {
            assert_eq!(accepts(&counted, input), accepts(&expanded, input), "{:?}", input);
        }
        assert!(accepts(&counted, &["a", "a", "b"]));
    }

    #[test]
    fn test_zero_max_particles_are_skipped() {
        let mut arena = ParticleArena::new();
        let a = arena.element(QName::local("a"), Occurs::new(0, Some(0)));
        let mut group = XsdGroup::new(ModelType::Sequence);
        group.add_element(a);
        assert!(!group.is_effective(&arena));
        assert!(group.is_emptiable(&arena));

        let validator = group
            .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
            .unwrap();
        assert_eq!(validator.kind(), ValidatorKind::Trivial);
    }

    #[test]
    fn test_all_group() {
        let mut arena = ParticleArena::new();
        let a = arena.element(QName::local("a"), Occurs::optional());
        let b = arena.element(QName::local("b"), Occurs::once());
        let mut group = XsdGroup::new(ModelType::All);
        group.add_element(a);
        group.add_element(b);
        assert!(!group.is_emptiable(&arena));

        let validator = group
            .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
            .unwrap();
        assert_eq!(validator.kind(), ValidatorKind::All);
        assert!(accepts(&validator, &["b", "a"]));
        assert!(!accepts(&validator, &["a"]));
    }

    #[test]
    fn test_invalid_all_groups() {
        let mut arena = ParticleArena::new();
        let a = arena.element(QName::local("a"), Occurs::once());
        let many = arena.element(QName::local("b"), Occurs::one_or_more());

        let mut repeated = XsdGroup::new(ModelType::All);
        repeated.add_element(many);
        assert!(matches!(
            repeated.compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter),
            Err(Error::Build(_))
        ));

        let mut nested = XsdGroup::new(ModelType::Sequence);
        let mut inner = XsdGroup::new(ModelType::All);
        inner.add_element(a);
        nested.add_group(inner);
        assert!(nested
            .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
            .is_err());

        let mut duplicate = XsdGroup::new(ModelType::All);
        duplicate.add_element(a);
        duplicate.add_element(a);
        assert!(duplicate
            .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
            .is_err());
    }
}
