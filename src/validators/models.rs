//! Finite automaton content validators
//!
//! [`DfaValidator`] runs a transition table built by subset construction.
//! [`NfaValidator`] simulates the position automaton directly; it is used
//! when the model is not UPA-eligible or the DFA would be too large.
//!
//! Both support open content: once the model has matched, elements without
//! a transition are accepted and attributed to no particle.

use bit_set::BitSet;

use crate::dump::{ModelDump, TransitionDump};
use crate::namespaces::QName;

use super::base::{ContentType, ContentValidator, MatchError, MatchResult, ValidatorKind};
use super::particles::ParticleId;
use super::state::{Cursor, ValidationState};
use super::symbols::{Positions, SymbolTable};
use super::syntax_tree::FollowSets;

/// One DFA state: target per symbol and whether the state accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRow {
    /// Target state per symbol, None is the dead state
    pub transitions: Vec<Option<usize>>,
    /// The state contains the end marker
    pub accepting: bool,
}

impl TransitionRow {
    /// Create a row with every transition dead
    pub fn new(symbol_count: usize) -> Self {
        Self {
            transitions: vec![None; symbol_count],
            accepting: false,
        }
    }
}

/// Deterministic automaton validator
#[derive(Debug, Clone)]
pub struct DfaValidator {
    rows: Vec<TransitionRow>,
    symbols: SymbolTable,
    content_type: ContentType,
    open: bool,
    emptiable: bool,
}

impl DfaValidator {
    pub(crate) fn new(
        rows: Vec<TransitionRow>,
        symbols: SymbolTable,
        content_type: ContentType,
        open: bool,
        emptiable: bool,
    ) -> Self {
        Self {
            rows,
            symbols,
            content_type,
            open,
            emptiable,
        }
    }

    /// Number of states
    pub fn state_count(&self) -> usize {
        self.rows.len()
    }

    /// Row of the current state, None if the state belongs to another validator
    fn current(&self, state: &ValidationState) -> Option<&TransitionRow> {
        match state.cursor {
            Cursor::Dfa { state } => self.rows.get(state),
            _ => None,
        }
    }
}

impl ContentValidator for DfaValidator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Dfa
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_emptiable(&self) -> bool {
        self.emptiable
    }

    fn init_validation(&self, state: &mut ValidationState) {
        state.reset_flags();
        state.cursor = Cursor::Dfa { state: 0 };
        state.has_matched = self.rows.first().map_or(false, |row| row.accepting);
    }

    fn validate_element(&self, name: &QName, state: &mut ValidationState) -> MatchResult {
        let row = self.current(state).ok_or(MatchError::StateMismatch)?;
        let symbol = self.symbols.lookup(name);
        let target = row
            .transitions
            .get(symbol)
            .ok_or(MatchError::StateMismatch)?;
        match *target {
            Some(next) => {
                state.cursor = Cursor::Dfa { state: next };
                state.has_matched = self.rows.get(next).map_or(false, |row| row.accepting);
                Ok(self.symbols.particle_of(symbol))
            }
            None if self.open && state.has_matched => Ok(None),
            None => {
                state.need_validate_children = false;
                Err(MatchError::Unexpected)
            }
        }
    }

    fn complete_validation(&self, state: &ValidationState) -> bool {
        state.has_matched
    }

    fn expected_elements(&self, state: &ValidationState, _required_only: bool) -> Vec<String> {
        let mut names = Vec::new();
        let Some(row) = self.current(state) else {
            return names;
        };
        for (symbol, target) in row.transitions.iter().enumerate() {
            if target.is_none() {
                continue;
            }
            push_name(&mut names, &self.symbols, symbol, self.symbols.particle_of(symbol));
        }
        names
    }

    fn expected_particles(&self, state: &ValidationState, _required_only: bool) -> Vec<ParticleId> {
        let mut particles = Vec::new();
        let Some(row) = self.current(state) else {
            return particles;
        };
        for (symbol, target) in row.transitions.iter().enumerate() {
            if target.is_some() {
                push_particle(&mut particles, self.symbols.particle_of(symbol));
            }
        }
        particles
    }

    fn dump(&self) -> ModelDump {
        let mut dump = ModelDump::new(ValidatorKind::Dfa, self.content_type)
            .with_flags(self.open, self.emptiable)
            .with_symbols(&self.symbols);
        dump.transitions = self
            .rows
            .iter()
            .enumerate()
            .map(|(state, row)| TransitionDump {
                state,
                targets: row.transitions.clone(),
                accepting: row.accepting,
            })
            .collect();
        dump
    }
}

/// Position automaton simulated with two alternating position sets.
///
/// When several positions admit the same symbol, the lowest-indexed one
/// determines the returned particle and all of them advance. Named
/// elements are allocated positions before wildcards are expanded, so an
/// explicit element beats a wildcard admitting the same name.
#[derive(Debug, Clone)]
pub struct NfaValidator {
    sets: FollowSets,
    symbols: SymbolTable,
    positions: Positions,
    end_marker: usize,
    content_type: ContentType,
    open: bool,
    emptiable: bool,
}

impl NfaValidator {
    pub(crate) fn new(
        sets: FollowSets,
        symbols: SymbolTable,
        positions: Positions,
        end_marker: usize,
        content_type: ContentType,
        open: bool,
        emptiable: bool,
    ) -> Self {
        Self {
            sets,
            symbols,
            positions,
            end_marker,
            content_type,
            open,
            emptiable,
        }
    }

    fn current<'a>(&self, state: &'a ValidationState) -> Option<&'a BitSet> {
        match &state.cursor {
            Cursor::Nfa { positions, current } => positions.get(*current),
            _ => None,
        }
    }
}

impl ContentValidator for NfaValidator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Nfa
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_emptiable(&self) -> bool {
        self.emptiable
    }

    fn init_validation(&self, state: &mut ValidationState) {
        state.reset_flags();
        let (buffers, current) = state.nfa_positions();
        buffers[0].clone_from(&self.sets.firstpos);
        buffers[1].clear();
        *current = 0;
        state.has_matched = self.sets.firstpos.contains(self.end_marker);
    }

    fn validate_element(&self, name: &QName, state: &mut ValidationState) -> MatchResult {
        let symbol = self.symbols.lookup(name);
        let (buffers, current) = match &mut state.cursor {
            Cursor::Nfa { positions, current } => (positions, current),
            _ => return Err(MatchError::StateMismatch),
        };
        let [first, second] = buffers;
        let (curpos, nextpos) = if *current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };

        nextpos.clear();
        let mut particle = None;
        let mut matched = false;
        for pos in curpos.iter() {
            if self.positions.symbol_at(pos) == Some(symbol) {
                nextpos.union_with(&self.sets.followpos[pos]);
                if !matched {
                    particle = self.positions.get(pos).and_then(|p| p.particle());
                    matched = true;
                }
            }
        }

        if !nextpos.is_empty() {
            state.has_matched = nextpos.contains(self.end_marker);
            *current = 1 - *current;
            return Ok(particle);
        }
        if self.open && curpos.contains(self.end_marker) {
            return Ok(None);
        }
        state.need_validate_children = false;
        Err(MatchError::Unexpected)
    }

    fn complete_validation(&self, state: &ValidationState) -> bool {
        self.current(state)
            .map_or(false, |curpos| curpos.contains(self.end_marker))
    }

    fn expected_elements(&self, state: &ValidationState, _required_only: bool) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(curpos) = self.current(state) {
            for pos in curpos.iter() {
                if let Some(position) = self.positions.get(pos) {
                    if let Some(symbol) = position.symbol() {
                        push_name(&mut names, &self.symbols, symbol, position.particle());
                    }
                }
            }
        }
        names
    }

    fn expected_particles(&self, state: &ValidationState, _required_only: bool) -> Vec<ParticleId> {
        let mut particles = Vec::new();
        if let Some(curpos) = self.current(state) {
            for pos in curpos.iter() {
                push_particle(&mut particles, self.positions.get(pos).and_then(|p| p.particle()));
            }
        }
        particles
    }

    fn dump(&self) -> ModelDump {
        ModelDump::new(ValidatorKind::Nfa, self.content_type)
            .with_flags(self.open, self.emptiable)
            .with_symbols(&self.symbols)
            .with_positions(
                &self.positions,
                &self.symbols,
                &self.sets.firstpos,
                &self.sets.followpos,
            )
    }
}

/// Add the display name of a symbol, using the particle label when there is one
pub(crate) fn push_name(
    names: &mut Vec<String>,
    symbols: &SymbolTable,
    symbol: usize,
    particle: Option<ParticleId>,
) {
    let name = match particle {
        Some(particle) => symbols.label_of(particle),
        None => symbols.name_of(symbol),
    };
    if !name.is_empty() && !names.contains(&name) {
        names.push(name);
    }
}

pub(crate) fn push_particle(particles: &mut Vec<ParticleId>, particle: Option<ParticleId>) {
    if let Some(particle) = particle {
        if !particles.contains(&particle) {
            particles.push(particle);
        }
    }
}
