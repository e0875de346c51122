//! Validator for xs:all groups
//!
//! An all group admits each of its elements at most once, in any order. The
//! validator is a slot table keyed by the exact element name; wildcards and
//! nested groups are not allowed inside.

use bit_set::BitSet;
use indexmap::IndexMap;

use crate::dump::{AllElementDump, ModelDump};
use crate::error::{BuildError, Result};
use crate::namespaces::QName;

use super::base::{ContentType, ContentValidator, MatchError, MatchResult, ValidatorKind};
use super::particles::ParticleId;
use super::state::{Cursor, ValidationState};

/// Unordered all group validator
#[derive(Debug, Clone)]
pub struct AllElementsValidator {
    slots: IndexMap<QName, usize>,
    particles: Vec<ParticleId>,
    required: BitSet,
    count_required: usize,
    content_type: ContentType,
    emptiable: bool,
}

impl AllElementsValidator {
    /// Create an empty slot table. `emptiable` is true when the group itself
    /// may be absent (minOccurs = 0).
    pub fn new(content_type: ContentType, emptiable: bool) -> Self {
        Self {
            slots: IndexMap::new(),
            particles: Vec::new(),
            required: BitSet::new(),
            count_required: 0,
            content_type,
            emptiable,
        }
    }

    /// Add a slot. A name may appear only once in the group.
    pub fn add_element(&mut self, name: QName, particle: ParticleId, required: bool) -> Result<()> {
        if self.slots.contains_key(&name) {
            return Err(BuildError::new(format!("duplicate element {} in all group", name))
                .with_operation("add_element")
                .into());
        }
        let slot = self.particles.len();
        self.slots.insert(name, slot);
        self.particles.push(particle);
        if required {
            self.required.insert(slot);
            self.count_required += 1;
        }
        Ok(())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Check if the group has no slots
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Number of slots that must be matched
    pub fn count_required(&self) -> usize {
        self.count_required
    }

    fn open_slots<'a>(
        &'a self,
        state: &'a ValidationState,
        required_only: bool,
    ) -> impl Iterator<Item = (&'a QName, usize)> + 'a {
        let visited = match &state.cursor {
            Cursor::All { visited, .. } => Some(visited),
            _ => None,
        };
        self.slots.iter().filter_map(move |(name, &slot)| {
            let seen = visited.map_or(false, |v| v.contains(slot));
            if seen || (required_only && !self.required.contains(slot)) {
                None
            } else {
                Some((name, slot))
            }
        })
    }
}

impl ContentValidator for AllElementsValidator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::All
    }

    fn is_emptiable(&self) -> bool {
        self.emptiable || self.count_required == 0
    }

    fn init_validation(&self, state: &mut ValidationState) {
        state.reset_flags();
        state.cursor = Cursor::All {
            visited: BitSet::with_capacity(self.particles.len()),
            required: None,
        };
        state.has_matched = self.is_emptiable();
    }

    fn validate_element(&self, name: &QName, state: &mut ValidationState) -> MatchResult {
        let (visited, required) = match &mut state.cursor {
            Cursor::All { visited, required } => (visited, required),
            _ => return Err(MatchError::StateMismatch),
        };
        let slot = match self.slots.get(name) {
            Some(&slot) => slot,
            None => {
                state.need_validate_children = false;
                return Err(MatchError::Unexpected);
            }
        };
        if !visited.insert(slot) {
            return Err(MatchError::Duplicate);
        }

        let tally = required.get_or_insert(0);
        if self.required.contains(slot) {
            *tally += 1;
        }
        state.has_matched = *tally == self.count_required;
        Ok(Some(self.particles[slot]))
    }

    fn complete_validation(&self, state: &ValidationState) -> bool {
        match &state.cursor {
            Cursor::All { required: None, .. } => self.is_emptiable(),
            Cursor::All {
                required: Some(count),
                ..
            } => *count == self.count_required,
            _ => false,
        }
    }

    fn expected_elements(&self, state: &ValidationState, required_only: bool) -> Vec<String> {
        self.open_slots(state, required_only)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    fn expected_particles(&self, state: &ValidationState, required_only: bool) -> Vec<ParticleId> {
        self.open_slots(state, required_only)
            .map(|(_, slot)| self.particles[slot])
            .collect()
    }

    fn dump(&self) -> ModelDump {
        let mut dump =
            ModelDump::new(ValidatorKind::All, self.content_type).with_flags(false, self.is_emptiable());
        dump.elements = self
            .slots
            .iter()
            .map(|(name, &slot)| AllElementDump {
                name: name.to_string(),
                particle: self.particles[slot].index(),
                required: self.required.contains(slot),
            })
            .collect();
        dump
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// all(a?, b, c?)
    fn abc() -> AllElementsValidator {
        let mut validator = AllElementsValidator::new(ContentType::ElementOnly, false);
        validator
            .add_element(QName::local("a"), ParticleId::new(0), false)
            .unwrap();
        validator
            .add_element(QName::local("b"), ParticleId::new(1), true)
            .unwrap();
        validator
            .add_element(QName::local("c"), ParticleId::new(2), false)
            .unwrap();
        validator
    }

    #[test]
    fn test_required_slot() {
        let validator = abc();
        assert!(!validator.is_emptiable());
        assert_eq!(validator.count_required(), 1);

        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        assert!(!validator.complete_validation(&state));

        assert_eq!(
            validator.validate_element(&QName::local("b"), &mut state),
            Ok(Some(ParticleId::new(1)))
        );
        assert!(validator.complete_validation(&state));
    }

    #[test]
    fn test_optional_only_is_incomplete() {
        let validator = abc();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        validator
            .validate_element(&QName::local("c"), &mut state)
            .unwrap();
        validator
            .validate_element(&QName::local("a"), &mut state)
            .unwrap();
        assert!(!validator.complete_validation(&state));
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let validator = abc();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        validator
            .validate_element(&QName::local("b"), &mut state)
            .unwrap();
        assert_eq!(
            validator.validate_element(&QName::local("b"), &mut state),
            Err(MatchError::Duplicate)
        );
        assert!(state.need_validate_children);
        assert_eq!(
            validator.validate_element(&QName::local("d"), &mut state),
            Err(MatchError::Unexpected)
        );
        assert!(!state.need_validate_children);
        assert_ne!(MatchError::Duplicate.code(), MatchError::Unexpected.code());
    }

    #[test]
    fn test_emptiable_group() {
        let mut validator = AllElementsValidator::new(ContentType::ElementOnly, true);
        validator
            .add_element(QName::local("a"), ParticleId::new(0), true)
            .unwrap();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        assert!(validator.complete_validation(&state));

        // once started, required slots must be filled
        validator
            .validate_element(&QName::local("a"), &mut state)
            .unwrap();
        assert!(validator.complete_validation(&state));
    }

    #[test]
    fn test_expected() {
        let validator = abc();
        let mut state = ValidationState::new();
        validator.init_validation(&mut state);
        assert_eq!(validator.expected_elements(&state, false), vec!["a", "b", "c"]);
        assert_eq!(validator.expected_elements(&state, true), vec!["b"]);

        validator
            .validate_element(&QName::local("a"), &mut state)
            .unwrap();
        assert_eq!(
            validator.expected_particles(&state, false),
            vec![ParticleId::new(1), ParticleId::new(2)]
        );
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut validator = abc();
        assert!(validator
            .add_element(QName::local("a"), ParticleId::new(3), false)
            .is_err());
        assert_eq!(validator.len(), 3);
    }

    #[test]
    fn test_state_mismatch_and_dump() {
        let validator = abc();
        let mut state = ValidationState::new();
        assert_eq!(
            validator.validate_element(&QName::local("a"), &mut state),
            Err(MatchError::StateMismatch)
        );
        let dump = validator.dump();
        assert_eq!(dump.kind, ValidatorKind::All);
        assert_eq!(dump.elements.len(), 3);
        assert!(dump.elements[1].required);
    }
}
