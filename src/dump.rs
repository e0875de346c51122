//! Diagnostic dumps of compiled content models
//!
//! [`ContentValidator::dump`](crate::validators::ContentValidator::dump)
//! describes the automaton behind a validator in a serde-serializable form,
//! for logging and for comparing compilations in tests.

use bit_set::BitSet;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::validators::base::{ContentType, ValidatorKind};
use crate::validators::symbols::{Origin, Position, Positions, SymbolTable};
use crate::validators::syntax_tree::RangeLeaf;

/// Description of one compiled content model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDump {
    /// Automaton kind
    pub kind: ValidatorKind,

    /// Declared content type
    pub content_type: ContentType,

    /// Unknown elements are tolerated after a match
    pub open: bool,

    /// The model accepts no children
    pub emptiable: bool,

    /// Display name per symbol
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,

    /// Grammar positions in index order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positions: Vec<PositionDump>,

    /// Positions that may match first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub firstpos: Vec<usize>,

    /// followpos per position
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followpos: Vec<Vec<usize>>,

    /// DFA rows
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionDump>,

    /// Range leaves
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<RangeDump>,

    /// All group slots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<AllElementDump>,
}

/// One grammar position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionDump {
    /// Position index
    pub index: usize,

    /// Symbol display name (None for range positions)
    pub symbol: Option<String>,

    /// Particle index
    pub particle: Option<usize>,

    /// Produced by a wildcard
    #[serde(default)]
    pub wildcard: bool,

    /// Range leaf index for range positions
    pub range: Option<usize>,
}

/// One DFA state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionDump {
    /// State index
    pub state: usize,

    /// Target state per symbol, None for the dead state
    pub targets: Vec<Option<usize>>,

    /// The state contains the end marker
    pub accepting: bool,
}

/// One range leaf
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeDump {
    /// Range leaf index (also its counter index)
    pub leaf: usize,

    /// Position of the leaf
    pub position: usize,

    /// Minimum occurrences
    pub min: String,

    /// Maximum occurrences
    pub max: String,

    /// Positions starting another iteration
    pub next_iteration: Vec<usize>,
}

/// One all group slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllElementDump {
    /// Element name
    pub name: String,

    /// Particle index
    pub particle: usize,

    /// The slot must be matched
    pub required: bool,
}

impl ModelDump {
    /// Create a dump with only the header filled in
    pub fn new(kind: ValidatorKind, content_type: ContentType) -> Self {
        Self {
            kind,
            content_type,
            open: false,
            emptiable: false,
            symbols: Vec::new(),
            positions: Vec::new(),
            firstpos: Vec::new(),
            followpos: Vec::new(),
            transitions: Vec::new(),
            ranges: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Set the open and emptiable flags
    pub fn with_flags(mut self, open: bool, emptiable: bool) -> Self {
        self.open = open;
        self.emptiable = emptiable;
        self
    }

    /// Add symbol display names
    pub fn with_symbols(mut self, symbols: &SymbolTable) -> Self {
        self.symbols = (0..symbols.count()).map(|s| symbols.name_of(s)).collect();
        self
    }

    /// Add positions and their follow sets
    pub fn with_positions(
        mut self,
        positions: &Positions,
        symbols: &SymbolTable,
        firstpos: &BitSet,
        followpos: &[BitSet],
    ) -> Self {
        self.positions = positions
            .iter()
            .enumerate()
            .map(|(index, position)| match *position {
                Position::Term {
                    symbol,
                    particle,
                    origin,
                } => PositionDump {
                    index,
                    symbol: Some(symbols.name_of(symbol)),
                    particle: particle.map(|p| p.index()),
                    wildcard: origin == Origin::Wildcard,
                    range: None,
                },
                Position::Range { leaf } => PositionDump {
                    index,
                    symbol: None,
                    particle: None,
                    wildcard: false,
                    range: Some(leaf),
                },
            })
            .collect();
        self.firstpos = firstpos.iter().collect();
        self.followpos = followpos.iter().map(|set| set.iter().collect()).collect();
        self
    }

    /// Add range leaves
    pub fn with_ranges(mut self, ranges: &[RangeLeaf]) -> Self {
        self.ranges = ranges
            .iter()
            .enumerate()
            .map(|(leaf, range)| RangeDump {
                leaf,
                position: range.pos,
                min: range.min.to_string(),
                max: range.max.to_string(),
                next_iteration: range.next_iteration.iter().collect(),
            })
            .collect();
        self
    }

    /// Number of states (DFA only)
    pub fn state_count(&self) -> usize {
        self.transitions.len()
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a dump back from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only_json() {
        let dump = ModelDump::new(ValidatorKind::Trivial, ContentType::Mixed).with_flags(true, true);
        let json = dump.to_json().unwrap();
        assert!(json.contains("\"kind\": \"trivial\""));
        assert!(json.contains("\"content_type\": \"mixed\""));
        assert!(!json.contains("transitions"));

        let parsed = ModelDump::from_json(&json).unwrap();
        assert_eq!(parsed, dump);
    }

    #[test]
    fn test_from_invalid_json() {
        assert!(ModelDump::from_json("{\"kind\": 3}").is_err());
    }
}
