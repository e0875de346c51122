//! Automaton construction
//!
//! Turns the followpos sets of an expanded syntax tree into something the
//! runtime validators can execute: a DFA transition table by subset
//! construction, or the range follow sets used by the counting automaton.
//! Also hosts the Unique Particle Attribution checks.

use bit_set::BitSet;
use log::debug;
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};

use crate::error::{Result, UpaError};

use super::models::TransitionRow;
use super::particles::ParticleId;
use super::symbols::{Position, Positions, SymbolTable};
use super::syntax_tree::{FollowSets, RangeLeaf};

/// Check that no two positions in a set match the same symbol with
/// different particles.
pub fn check_unique_attribution(
    curpos: &BitSet,
    positions: &Positions,
    symbols: &SymbolTable,
) -> Result<()> {
    let mut particles: Vec<Option<ParticleId>> = vec![None; symbols.count()];
    for pos in curpos.iter() {
        let (symbol, particle) = match positions.get(pos) {
            Some(Position::Term {
                symbol, particle, ..
            }) => (*symbol, *particle),
            _ => continue,
        };
        match (particles[symbol], particle) {
            (None, _) => particles[symbol] = particle,
            (Some(first), Some(second)) if first != second => {
                let err = UpaError::new(first, second, symbols.label_of(first), symbols.label_of(second));
                debug!("content model rejected: {}", err);
                return Err(err.into());
            }
            // same particle reached through different positions
            _ => {}
        }
    }
    Ok(())
}

/// UPA check over firstpos and every followpos set
pub fn check_upa(sets: &FollowSets, positions: &Positions, symbols: &SymbolTable) -> Result<()> {
    check_unique_attribution(&sets.firstpos, positions, symbols)?;
    for follow in &sets.followpos {
        check_unique_attribution(follow, positions, symbols)?;
    }
    Ok(())
}

/// Follow sets synthesized for range leaves
#[derive(Debug, Clone)]
pub struct RangeFollow {
    /// Positions occupied by range leaves
    pub range_positions: BitSet,
    /// Per range leaf: its followpos, its next iteration unless `min == max`,
    /// and the totals of every enclosing range it can reach
    pub totals: Vec<BitSet>,
}

impl RangeFollow {
    /// Compute the totals, innermost ranges last so that enclosing ranges
    /// (which have higher positions) are already known.
    pub fn new(ranges: &[RangeLeaf], positions: &Positions, followpos: &[BitSet]) -> Self {
        let count = positions.len();
        let mut range_positions = BitSet::with_capacity(count);
        let mut totals = vec![BitSet::with_capacity(count); ranges.len()];

        for i in (0..count).rev() {
            let leaf = match positions.get(i) {
                Some(Position::Range { leaf }) => *leaf,
                _ => continue,
            };
            let range = &ranges[leaf];
            let mut total = followpos[i].clone();
            if range.min != range.max {
                total.union_with(&range.next_iteration);
            }
            // `total` grows while it is scanned
            for pos in i + 1..count {
                if !total.contains(pos) {
                    continue;
                }
                if let Some(Position::Range { leaf: outer }) = positions.get(pos) {
                    let outer_total = totals[*outer].clone();
                    total.union_with(&outer_total);
                }
            }
            totals[leaf] = total;
            range_positions.insert(i);
        }

        Self {
            range_positions,
            totals,
        }
    }

    /// A position set with the totals of every range leaf it contains added
    pub fn applicable<'a>(&self, curpos: &'a BitSet, positions: &Positions) -> Cow<'a, BitSet> {
        if curpos.is_disjoint(&self.range_positions) {
            return Cow::Borrowed(curpos);
        }
        let mut extended = curpos.clone();
        for pos in curpos.intersection(&self.range_positions) {
            if let Some(Position::Range { leaf }) = positions.get(pos) {
                extended.union_with(&self.totals[*leaf]);
            }
        }
        Cow::Owned(extended)
    }

    /// UPA check with range contributions substituted in
    pub fn check_upa(
        &self,
        sets: &FollowSets,
        positions: &Positions,
        symbols: &SymbolTable,
    ) -> Result<()> {
        check_unique_attribution(&self.applicable(&sets.firstpos, positions), positions, symbols)?;
        for follow in &sets.followpos {
            check_unique_attribution(&self.applicable(follow, positions), positions, symbols)?;
        }
        Ok(())
    }
}

/// Subset construction. Returns None when the number of states would reach
/// `max_states`.
pub fn build_transition_table(
    sets: &FollowSets,
    positions: &Positions,
    symbol_count: usize,
    end_marker: usize,
    max_states: usize,
) -> Option<Vec<TransitionRow>> {
    let count = positions.len();

    // the empty set is the dead state
    let mut states: HashMap<BitSet, Option<usize>> = HashMap::new();
    states.insert(BitSet::with_capacity(count), None);

    let mut unmarked = VecDeque::new();
    let mut rows = vec![TransitionRow::new(symbol_count)];
    states.insert(sets.firstpos.clone(), Some(0));
    unmarked.push_back(sets.firstpos.clone());

    let mut state = 0;
    while let Some(state_positions) = unmarked.pop_front() {
        rows[state].accepting = state_positions.contains(end_marker);

        for symbol in 0..symbol_count {
            let mut next = BitSet::with_capacity(count);
            for pos in state_positions.iter() {
                if positions.symbol_at(pos) == Some(symbol) {
                    next.union_with(&sets.followpos[pos]);
                }
            }

            let target = match states.get(&next) {
                Some(&target) => target,
                None => {
                    let new_state = states.len() - 1;
                    if new_state >= max_states {
                        debug!(
                            "DFA abandoned at {} states ({} positions)",
                            new_state, count
                        );
                        return None;
                    }
                    states.insert(next.clone(), Some(new_state));
                    unmarked.push_back(next);
                    rows.push(TransitionRow::new(symbol_count));
                    Some(new_state)
                }
            };
            rows[state].transitions[symbol] = target;
        }
        state += 1;
    }
    Some(rows)
}
