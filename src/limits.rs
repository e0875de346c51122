//! Limits and budgets for content model compilation and validation
//!
//! Subset construction is quadratic in the number of grammar positions and
//! the range automaton can fork an unbounded number of threads, so both are
//! bounded. Exceeding these budgets is never an error: compilation falls back
//! to NFA simulation and range validation degrades to an approximation.

use crate::error::{Error, Result};

/// Automaton budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum DFA states times positions (`max_states = dfa_time_constant / positions`)
    pub dfa_time_constant: usize,

    /// Maximum number of running positions kept by the range automaton
    pub max_running_positions: usize,

    /// Maximum number of subtree copies created by one expanded range
    pub max_expanded_copies: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            dfa_time_constant: 8192,
            max_running_positions: 10000,
            max_expanded_copies: 256,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (smaller automata, earlier fallbacks)
    pub fn strict() -> Self {
        Self {
            dfa_time_constant: 1024,
            max_running_positions: 1000,
            max_expanded_copies: 32,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            dfa_time_constant: 1 << 20,
            max_running_positions: 100000,
            max_expanded_copies: 4096,
        }
    }

    /// Set the DFA time constant
    pub fn with_dfa_time_constant(mut self, constant: usize) -> Self {
        self.dfa_time_constant = constant;
        self
    }

    /// Set the running positions cap
    pub fn with_max_running_positions(mut self, count: usize) -> Self {
        self.max_running_positions = count;
        self
    }

    /// Maximum number of DFA states for a model with `positions` positions
    pub fn max_dfa_states(&self, positions: usize) -> usize {
        self.dfa_time_constant / positions.max(1)
    }

    /// Check if an expanded range stays within the copy budget
    pub fn check_expanded_copies(&self, copies: usize) -> Result<()> {
        if copies > self.max_expanded_copies {
            Err(Error::LimitExceeded(format!(
                "Expanded range needs {} copies, maximum is {}",
                copies, self.max_expanded_copies
            )))
        } else {
            Ok(())
        }
    }
}
