//! Counting automaton for bounded occurrence ranges
//!
//! A model with `{min, max}` ranges is simulated as a list of running
//! positions: each one is a position set plus one counter per range leaf.
//! Whenever a running position reaches a range leaf it forks: one branch
//! starts another iteration, another leaves the range, depending on the
//! counter. Matching commits to the first running position that admits the
//! input and drops those before it.
//!
//! The population is capped by [`Limits::max_running_positions`]. Forks
//! past the cap are dropped, and when the survivors of a match fill the cap
//! every other one is dropped. Either way the state is flagged as too
//! complex and results from then on are approximate.
//!
//! [`Limits::max_running_positions`]: crate::limits::Limits::max_running_positions

use bit_set::BitSet;
use log::{debug, trace};
use rust_decimal::Decimal;

use crate::dump::ModelDump;
use crate::namespaces::QName;

use super::base::{ContentType, ContentValidator, MatchError, MatchResult, ValidatorKind};
use super::compiler::RangeFollow;
use super::models::{push_name, push_particle};
use super::particles::ParticleId;
use super::state::{Cursor, RunningPosition, ValidationState};
use super::symbols::{Position, Positions, SymbolTable};
use super::syntax_tree::{FollowSets, RangeLeaf};

/// Validator for content models containing bounded ranges
#[derive(Debug, Clone)]
pub struct RangeValidator {
    sets: FollowSets,
    follow: RangeFollow,
    ranges: Vec<RangeLeaf>,
    symbols: SymbolTable,
    positions: Positions,
    end_marker: usize,
    content_type: ContentType,
    emptiable: bool,
    max_running: usize,
}

impl RangeValidator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sets: FollowSets,
        follow: RangeFollow,
        ranges: Vec<RangeLeaf>,
        symbols: SymbolTable,
        positions: Positions,
        end_marker: usize,
        content_type: ContentType,
        emptiable: bool,
        max_running: usize,
    ) -> Self {
        Self {
            sets,
            follow,
            ranges,
            symbols,
            positions,
            end_marker,
            content_type,
            emptiable,
            max_running,
        }
    }

    fn expected_positions(&self, state: &ValidationState) -> BitSet {
        let mut expected = BitSet::with_capacity(self.positions.len());
        if let Cursor::Range { running } = &state.cursor {
            for thread in running.iter().rev() {
                expected.union_with(&thread.curpos);
            }
        }
        expected
    }

    /// Fork new running positions from `running[k]` for every range leaf it
    /// reaches. Returns true if an examined set contains the end marker.
    /// `capped` is set when a fork is dropped because the population is full.
    fn expand(&self, running: &mut Vec<RunningPosition>, k: usize, capped: &mut bool) -> bool {
        let mut j = k;
        let mut has_final = running[k].curpos.contains(self.end_marker);

        while !running[j].curpos.is_disjoint(&self.follow.range_positions) {
            if running.len() >= self.max_running {
                *capped = true;
                break;
            }
            let counting = running[j].curpos.intersection(&self.follow.range_positions).next();
            let (c_pos, leaf) = match counting.map(|p| (p, self.positions.get(p))) {
                Some((p, Some(Position::Range { leaf }))) => (p, *leaf),
                _ => break,
            };
            let range = &self.ranges[leaf];

            let mut counters = running[j].counters.clone();
            counters[leaf] += Decimal::ONE;
            let count = counters[leaf];

            if count == range.max {
                counters[leaf] = Decimal::ZERO;
                running.push(RunningPosition {
                    curpos: self.sets.followpos[c_pos].clone(),
                    counters,
                });
                j = running.len() - 1;
            } else if count < range.min {
                running.push(RunningPosition {
                    curpos: range.next_iteration.clone(),
                    counters,
                });
                break;
            } else {
                let mut exit = counters.clone();
                exit[leaf] = Decimal::ZERO;
                running.push(RunningPosition {
                    curpos: range.next_iteration.clone(),
                    counters,
                });
                running.push(RunningPosition {
                    curpos: self.sets.followpos[c_pos].clone(),
                    counters: exit,
                });
                j = running.len() - 1;
            }
            has_final = has_final || running[j].curpos.contains(self.end_marker);
        }
        has_final
    }
}

/// Drop every other running position, keeping those at even indices
fn halve(running: &mut Vec<RunningPosition>) {
    let mut index = 0;
    running.retain(|_| {
        index += 1;
        index % 2 == 1
    });
}

impl ContentValidator for RangeValidator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Range
    }

    fn is_emptiable(&self) -> bool {
        self.emptiable
    }

    fn init_validation(&self, state: &mut ValidationState) {
        state.reset_flags();
        let running = state.running_positions();
        running.clear();
        running.push(RunningPosition {
            curpos: self.sets.firstpos.clone(),
            counters: vec![Decimal::ZERO; self.ranges.len()],
        });
        state.has_matched = self.sets.firstpos.contains(self.end_marker);
    }

    fn validate_element(&self, name: &QName, state: &mut ValidationState) -> MatchResult {
        let symbol = self.symbols.lookup(name);
        let running = match &mut state.cursor {
            Cursor::Range { running } => running,
            _ => return Err(MatchError::StateMismatch),
        };
        if running
            .iter()
            .any(|thread| thread.counters.len() != self.ranges.len())
        {
            return Err(MatchError::StateMismatch);
        }

        // Commit to the first running position matching an element; a
        // wildcard match is only taken when no element matches.
        let mut first_matched = None;
        let mut element_match = None;
        for (k, thread) in running.iter().enumerate() {
            let found = thread
                .curpos
                .iter()
                .find(|&p| self.positions.symbol_at(p) == Some(symbol));
            if let Some(p) = found {
                first_matched.get_or_insert((k, p));
                if self.positions.get(p).map_or(false, Position::is_element) {
                    element_match = Some((k, p));
                    break;
                }
            }
        }
        let (k, pos) = match element_match.or(first_matched) {
            Some(found) => found,
            None => {
                state.need_validate_children = false;
                return Err(MatchError::Unexpected);
            }
        };

        running.drain(..k);
        let mut i = 0;
        while i < running.len() {
            if running[i].curpos.contains(pos) {
                running[i].curpos.clone_from(&self.sets.followpos[pos]);
                i += 1;
            } else {
                running.swap_remove(i);
            }
        }

        if running.len() >= self.max_running {
            state.too_complex = true;
            halve(running);
            debug!(
                "range automaton over budget, kept {} running positions",
                running.len()
            );
        }

        let mut has_final = false;
        let mut capped = false;
        for k in (0..running.len()).rev() {
            has_final = self.expand(running, k, &mut capped) || has_final;
        }
        if capped {
            state.too_complex = true;
            debug!(
                "range automaton over budget, forks dropped at {} running positions",
                running.len()
            );
        }
        trace!(
            "matched {} at position {}, {} running positions",
            name,
            pos,
            running.len()
        );

        state.has_matched = has_final;
        Ok(self.positions.get(pos).and_then(|p| p.particle()))
    }

    fn complete_validation(&self, state: &ValidationState) -> bool {
        state.has_matched
    }

    fn expected_elements(&self, state: &ValidationState, _required_only: bool) -> Vec<String> {
        let mut names = Vec::new();
        for pos in self.expected_positions(state).iter() {
            if let Some(Position::Term {
                symbol, particle, ..
            }) = self.positions.get(pos)
            {
                push_name(&mut names, &self.symbols, *symbol, *particle);
            }
        }
        names
    }

    fn expected_particles(&self, state: &ValidationState, _required_only: bool) -> Vec<ParticleId> {
        let mut particles = Vec::new();
        for pos in self.expected_positions(state).iter() {
            push_particle(&mut particles, self.positions.get(pos).and_then(|p| p.particle()));
        }
        particles
    }

    fn dump(&self) -> ModelDump {
        ModelDump::new(ValidatorKind::Range, self.content_type)
            .with_flags(false, self.emptiable)
            .with_symbols(&self.symbols)
            .with_positions(
                &self.positions,
                &self.symbols,
                &self.sets.firstpos,
                &self.sets.followpos,
            )
            .with_ranges(&self.ranges)
    }
}
