//! Symbols and positions
//!
//! The [`SymbolTable`] maps element names and namespace wildcards of one
//! content model to dense integer symbols. The last symbol is always a true
//! wildcard matching every name no other symbol claims. Each leaf of the
//! syntax tree occupies one [`Position`].

use indexmap::IndexMap;

use crate::namespaces::QName;

use super::particles::ParticleId;
use super::wildcards::NamespaceConstraint;

/// Dense integer identifying a name or namespace class
pub type Symbol = usize;

/// Maps names that a content validator recognizes to symbols.
///
/// Full names always outrank namespace wildcards on lookup, and namespace
/// wildcards outrank the trailing true wildcard.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    names: IndexMap<QName, Symbol>,
    wildcards: IndexMap<String, Symbol>,
    particles: Vec<Option<ParticleId>>,
    particle_last: Option<ParticleId>,
    labels: IndexMap<ParticleId, String>,
    upa_eligible: bool,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create an empty table holding only the true wildcard symbol
    pub fn new() -> Self {
        Self {
            names: IndexMap::new(),
            wildcards: IndexMap::new(),
            particles: Vec::new(),
            particle_last: None,
            labels: IndexMap::new(),
            upa_eligible: true,
        }
    }

    /// Number of symbols, including the trailing true wildcard
    pub fn count(&self) -> usize {
        self.particles.len() + 1
    }

    /// The true wildcard symbol (`count() - 1`)
    pub fn last(&self) -> Symbol {
        self.particles.len()
    }

    /// True if every symbol can be attributed to a single particle, so that a
    /// DFA can be built. Once cleared this never becomes true again.
    pub fn is_upa_eligible(&self) -> bool {
        self.upa_eligible
    }

    pub(crate) fn clear_upa_eligible(&mut self) {
        self.upa_eligible = false;
    }

    /// Add a name and return its symbol
    pub fn add_name(&mut self, name: QName, particle: Option<ParticleId>) -> Symbol {
        if let Some(particle) = particle {
            self.labels.entry(particle).or_insert_with(|| name.to_string());
        }
        if let Some(&symbol) = self.names.get(&name) {
            if self.particles[symbol] != particle {
                self.upa_eligible = false;
            }
            return symbol;
        }
        let symbol = self.last();
        self.names.insert(name, symbol);
        self.particles.push(particle);
        symbol
    }

    /// Register the symbols a namespace wildcard needs
    pub fn add_namespace_wildcard(
        &mut self,
        constraint: &NamespaceConstraint,
        particle: ParticleId,
        allow_local: bool,
    ) {
        self.labels
            .entry(particle)
            .or_insert_with(|| constraint.to_string());
        match constraint {
            NamespaceConstraint::Any => {
                self.particle_last = Some(particle);
            }
            NamespaceConstraint::Other { .. } => {
                // The excluded namespace gets a symbol with no particle so it never matches.
                let excluded = constraint.excluded().unwrap_or("").to_string();
                self.add_wildcard(excluded, None);
                if !allow_local {
                    self.add_wildcard(String::new(), None);
                }
            }
            NamespaceConstraint::Enumeration(set) => {
                for ns in set {
                    self.add_wildcard(ns.clone(), Some(particle));
                }
            }
        }
    }

    fn add_wildcard(&mut self, namespace: String, particle: Option<ParticleId>) {
        match self.wildcards.get(&namespace) {
            Some(&symbol) => {
                if particle.is_some() {
                    self.particles[symbol] = particle;
                }
            }
            None => {
                let symbol = self.last();
                self.wildcards.insert(namespace, symbol);
                self.particles.push(particle);
            }
        }
    }

    /// All symbols a namespace constraint matches, in symbol order of
    /// names, then namespace wildcards, then the true wildcard.
    pub fn namespace_symbols(&self, constraint: &NamespaceConstraint) -> Vec<Symbol> {
        let mut matches: Vec<Symbol> = self
            .names
            .iter()
            .filter(|(name, _)| !name.is_empty() && constraint.allows(name.namespace_str()))
            .map(|(_, &symbol)| symbol)
            .collect();
        matches.extend(
            self.wildcards
                .iter()
                .filter(|(ns, _)| constraint.allows(ns))
                .map(|(_, &symbol)| symbol),
        );
        if constraint.is_open_ended() {
            matches.push(self.last());
        }
        matches
    }

    /// Find the symbol for a name: full name, then namespace, then the true wildcard
    pub fn lookup(&self, name: &QName) -> Symbol {
        if let Some(&symbol) = self.names.get(name) {
            return symbol;
        }
        if let Some(&symbol) = self.wildcards.get(name.namespace_str()) {
            return symbol;
        }
        self.last()
    }

    /// Check if a full name has a symbol
    pub fn exists(&self, name: &QName) -> bool {
        self.names.contains_key(name)
    }

    /// Particle recorded for a symbol
    pub fn particle_of(&self, symbol: Symbol) -> Option<ParticleId> {
        if symbol == self.last() {
            self.particle_last
        } else {
            self.particles.get(symbol).copied().flatten()
        }
    }

    /// Display name of a symbol
    pub fn name_of(&self, symbol: Symbol) -> String {
        if let Some((name, _)) = self.names.iter().find(|(_, &s)| s == symbol) {
            return name.to_string();
        }
        if let Some((ns, _)) = self.wildcards.iter().find(|(_, &s)| s == symbol) {
            return format!("{}:*", ns);
        }
        "##other:*".to_string()
    }

    /// Display label of a particle: its element name or wildcard constraint
    pub fn label_of(&self, particle: ParticleId) -> String {
        self.labels
            .get(&particle)
            .cloned()
            .unwrap_or_else(|| particle.to_string())
    }
}

/// How a position entered the grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Added by name (or the end marker)
    Element,
    /// Produced by expanding a namespace wildcard
    Wildcard,
}

/// One leaf occurrence in the flattened grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// A term matched by a symbol
    Term {
        /// Matching symbol
        symbol: Symbol,
        /// Grammar term the position belongs to (None for the end marker)
        particle: Option<ParticleId>,
        /// Whether the position came from a name or a wildcard
        origin: Origin,
    },
    /// Occurrence counter of a bounded range
    Range {
        /// Index of the range leaf
        leaf: usize,
    },
}

impl Position {
    /// Symbol of a term position
    pub fn symbol(&self) -> Option<Symbol> {
        match *self {
            Position::Term { symbol, .. } => Some(symbol),
            Position::Range { .. } => None,
        }
    }

    /// Particle of a term position
    pub fn particle(&self) -> Option<ParticleId> {
        match *self {
            Position::Term { particle, .. } => particle,
            Position::Range { .. } => None,
        }
    }

    /// True for positions added by name with a particle
    pub fn is_element(&self) -> bool {
        matches!(
            *self,
            Position::Term {
                particle: Some(_),
                origin: Origin::Element,
                ..
            }
        )
    }
}

/// Ordered list of positions; lower indices win ties during validation
#[derive(Debug, Clone, Default)]
pub struct Positions {
    positions: Vec<Position>,
}

impl Positions {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a term position and return its index
    pub fn add(&mut self, symbol: Symbol, particle: Option<ParticleId>, origin: Origin) -> usize {
        self.push(Position::Term {
            symbol,
            particle,
            origin,
        })
    }

    /// Append a range position and return its index
    pub fn add_range(&mut self, leaf: usize) -> usize {
        self.push(Position::Range { leaf })
    }

    /// Append a position and return its index
    pub fn push(&mut self, position: Position) -> usize {
        self.positions.push(position);
        self.positions.len() - 1
    }

    /// Get a position
    pub fn get(&self, pos: usize) -> Option<&Position> {
        self.positions.get(pos)
    }

    /// Symbol at a position (None for range positions)
    pub fn symbol_at(&self, pos: usize) -> Option<Symbol> {
        self.positions.get(pos).and_then(Position::symbol)
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if there are no positions
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate over positions in index order
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }
}
