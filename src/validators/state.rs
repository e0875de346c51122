//! Per-element validation state
//!
//! A [`ValidationState`] is owned by whoever walks the document: one per open
//! element. Validators only read and write it; they never keep state of their
//! own. A state can be reused for the next element after
//! [`ContentValidator::init_validation`](super::ContentValidator::init_validation),
//! which keeps allocated buffers when the validator kind matches.

use bit_set::BitSet;
use rust_decimal::Decimal;

/// One simulated thread of the range automaton
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunningPosition {
    /// Positions the thread may match next
    pub curpos: BitSet,
    /// Occurrence counter per range leaf
    pub counters: Vec<Decimal>,
}

/// Automaton cursor, one shape per validator kind
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum Cursor {
    /// Not initialised, or driven by a trivial validator
    #[default]
    Idle,
    /// Current DFA state
    Dfa { state: usize },
    /// Double-buffered position sets
    Nfa { positions: [BitSet; 2], current: usize },
    /// Live range threads
    Range { running: Vec<RunningPosition> },
    /// Matched slots of an all group; `required` is None until the first match
    All { visited: BitSet, required: Option<usize> },
}

/// Mutable progress of one element's content validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationState {
    /// The children seen so far form a complete match
    pub has_matched: bool,
    /// The driver should keep validating below the current child
    pub need_validate_children: bool,
    /// The range automaton dropped threads to stay within its budget
    pub too_complex: bool,
    pub(crate) cursor: Cursor,
}

impl Default for ValidationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationState {
    /// Create a fresh state
    pub fn new() -> Self {
        Self {
            has_matched: false,
            need_validate_children: true,
            too_complex: false,
            cursor: Cursor::Idle,
        }
    }

    /// Reset flags and drop the cursor
    pub fn reset(&mut self) {
        self.reset_flags();
        self.cursor = Cursor::Idle;
    }

    pub(crate) fn reset_flags(&mut self) {
        self.has_matched = false;
        self.need_validate_children = true;
        self.too_complex = false;
    }

    /// Number of live range threads (0 for other validators)
    pub fn running_count(&self) -> usize {
        match &self.cursor {
            Cursor::Range { running } => running.len(),
            _ => 0,
        }
    }

    /// Check if no validator has initialised the state
    pub fn is_idle(&self) -> bool {
        self.cursor == Cursor::Idle
    }

    /// Range thread list, reusing the previous allocation when possible
    pub(crate) fn running_positions(&mut self) -> &mut Vec<RunningPosition> {
        if !matches!(self.cursor, Cursor::Range { .. }) {
            self.cursor = Cursor::Range {
                running: Vec::new(),
            };
        }
        match &mut self.cursor {
            Cursor::Range { running } => running,
            _ => unreachable!("cursor was just set to Range"),
        }
    }

    /// NFA buffers, reusing the previous allocation when possible
    pub(crate) fn nfa_positions(&mut self) -> (&mut [BitSet; 2], &mut usize) {
        if !matches!(self.cursor, Cursor::Nfa { .. }) {
            self.cursor = Cursor::Nfa {
                positions: [BitSet::new(), BitSet::new()],
                current: 0,
            };
        }
        match &mut self.cursor {
            Cursor::Nfa { positions, current } => (positions, current),
            _ => unreachable!("cursor was just set to Nfa"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = ValidationState::new();
        assert!(!state.has_matched);
        assert!(state.need_validate_children);
        assert!(!state.too_complex);
        assert!(state.is_idle());
        assert_eq!(state.running_count(), 0);
    }

    #[test]
    fn test_running_positions_reused() {
        let mut state = ValidationState::new();
        state.running_positions().push(RunningPosition {
            curpos: BitSet::new(),
            counters: vec![Decimal::ZERO],
        });
        assert_eq!(state.running_count(), 1);

        // same kind keeps the buffer
        assert_eq!(state.running_positions().len(), 1);

        state.reset();
        assert!(state.is_idle());
        assert!(state.running_positions().is_empty());
    }

    #[test]
    fn test_nfa_positions_switch_kind() {
        let mut state = ValidationState::new();
        state.running_positions();
        let (positions, current) = state.nfa_positions();
        positions[1].insert(3);
        *current = 1;
        assert!(matches!(
            state.cursor,
            Cursor::Nfa { current: 1, .. }
        ));
        assert_eq!(state.running_count(), 0);
    }
}
