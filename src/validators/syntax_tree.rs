//! Content model syntax tree
//!
//! The grammar is held in an arena of [`Node`]s addressed by [`NodeId`].
//! Sequences and choices are built left-deep by the builder, so every pass
//! over the tree uses an explicit work list instead of recursion.
//!
//! Two node kinds are temporary: namespace wildcards and expanded repeats.
//! [`SyntaxTree::expand`] replaces them in place before the followpos sets
//! are computed.

use bit_set::BitSet;
use rust_decimal::Decimal;
use std::borrow::Cow;

use crate::error::{BuildError, Result};
use crate::limits::Limits;

use super::particles::{Occurs, ParticleId};
use super::symbols::{Origin, Position, Positions, SymbolTable};
use super::wildcards::NamespaceConstraint;

/// Index of a node in a [`SyntaxTree`]
pub type NodeId = usize;

/// A syntax tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A term occupying one position
    Leaf(usize),
    /// Namespace wildcard, expanded into a choice of leaves
    Wildcard {
        /// Namespaces the wildcard admits
        constraint: NamespaceConstraint,
        /// Wildcard particle
        particle: ParticleId,
    },
    /// Sequence
    Sequence {
        /// First operand
        left: NodeId,
        /// Second operand, None only while the builder is waiting for it
        right: Option<NodeId>,
    },
    /// Choice
    Choice {
        /// First alternative
        left: NodeId,
        /// Second alternative, None only while the builder is waiting for it
        right: Option<NodeId>,
    },
    /// Zero or more
    Star(NodeId),
    /// One or more
    Plus(NodeId),
    /// Zero or one
    Optional(NodeId),
    /// Counter leaf of a bounded range, always the right child of a sequence
    RangeLeaf(usize),
    /// Repetition expanded into copies of its operand
    Repeat {
        /// Operand
        child: NodeId,
        /// Minimum occurrences
        min: u32,
        /// Maximum occurrences, None when unbounded
        max: Option<u32>,
    },
}

impl Node {
    /// Child node ids, left first
    pub fn children(&self) -> [Option<NodeId>; 2] {
        match *self {
            Node::Sequence { left, right } | Node::Choice { left, right } => [Some(left), right],
            Node::Star(child) | Node::Plus(child) | Node::Optional(child) => [Some(child), None],
            Node::Repeat { child, .. } => [Some(child), None],
            Node::Leaf(_) | Node::Wildcard { .. } | Node::RangeLeaf(_) => [None, None],
        }
    }
}

/// Counter leaf data of a bounded range
#[derive(Debug, Clone)]
pub struct RangeLeaf {
    /// Position of the leaf
    pub pos: usize,
    /// Minimum number of iterations
    pub min: Decimal,
    /// Maximum number of iterations (`Decimal::MAX` when unbounded)
    pub max: Decimal,
    /// Positions that start another iteration (firstpos of the ranged operand)
    pub next_iteration: BitSet,
}

/// firstpos, lastpos and followpos of a tree
#[derive(Debug, Clone)]
pub struct FollowSets {
    /// Positions that can match first
    pub firstpos: BitSet,
    /// Positions that can match last
    pub lastpos: BitSet,
    /// Positions that can follow each position
    pub followpos: Vec<BitSet>,
}

/// Arena holding the syntax tree of one content model
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    ranges: Vec<RangeLeaf>,
}

impl SyntaxTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Get a node
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Get a node for update
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Allocate a range leaf with its own position
    pub fn add_range_leaf(&mut self, positions: &mut Positions, min: Decimal, max: Decimal) -> NodeId {
        let leaf = self.ranges.len();
        let pos = positions.add_range(leaf);
        self.ranges.push(RangeLeaf {
            pos,
            min,
            max,
            next_iteration: BitSet::new(),
        });
        self.push(Node::RangeLeaf(leaf))
    }

    /// All range leaves, indexed by the `leaf` of a [`Position::Range`]
    pub fn ranges(&self) -> &[RangeLeaf] {
        &self.ranges
    }

    fn is_range_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id], Node::RangeLeaf(_))
    }

    /// Node ids of a subtree, children before parents, left before right
    pub fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, visited)) = stack.pop() {
            if visited {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            let [left, right] = self.nodes[id].children();
            if let Some(right) = right {
                stack.push((right, false));
            }
            if let Some(left) = left {
                stack.push((left, false));
            }
        }
        order
    }

    /// Check if a subtree accepts the empty sequence
    pub fn nullable(&self, root: NodeId) -> bool {
        let mut table = vec![false; self.nodes.len()];
        for id in self.post_order(root) {
            table[id] = self.nullable_with(id, &table);
        }
        table[root]
    }

    fn nullable_with(&self, id: NodeId, table: &[bool]) -> bool {
        match self.nodes[id] {
            Node::Leaf(_) | Node::RangeLeaf(_) | Node::Wildcard { .. } => false,
            Node::Sequence { left, right } => match right {
                Some(right) => match self.nodes[right] {
                    Node::RangeLeaf(leaf) => self.ranges[leaf].min.is_zero() || table[left],
                    _ => table[left] && table[right],
                },
                None => table[left],
            },
            Node::Choice { left, right } => table[left] || right.map_or(false, |r| table[r]),
            Node::Star(_) | Node::Optional(_) => true,
            Node::Plus(child) => table[child],
            Node::Repeat { child, min, .. } => min == 0 || table[child],
        }
    }

    /// Replace wildcards and repeats, and settle range leaf minimums.
    ///
    /// Wildcards become a choice of one leaf per symbol they resolve to. A
    /// resolved symbol whose recorded particle differs from the wildcard's own
    /// clears the table's UPA eligibility.
    pub fn expand(
        &mut self,
        root: NodeId,
        symbols: &mut SymbolTable,
        positions: &mut Positions,
        limits: &Limits,
    ) -> Result<()> {
        for id in self.post_order(root) {
            match self.nodes[id].clone() {
                Node::Wildcard {
                    constraint,
                    particle,
                } => {
                    self.nodes[id] = self.expand_wildcard(&constraint, particle, symbols, positions)?;
                }
                Node::Sequence {
                    left,
                    right: Some(right),
                } => {
                    if let Node::RangeLeaf(leaf) = self.nodes[right] {
                        if self.nullable(left) {
                            self.ranges[leaf].min = Decimal::ZERO;
                        }
                    }
                }
                Node::Sequence { right: None, .. } | Node::Choice { right: None, .. } => {
                    return Err(BuildError::new("incomplete sequence or choice")
                        .with_operation("expand")
                        .into());
                }
                Node::Repeat { child, min, max } => {
                    let replacement = self.expand_repeat(child, min, max, positions, limits)?;
                    self.nodes[id] = self.nodes[replacement].clone();
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn expand_wildcard(
        &mut self,
        constraint: &NamespaceConstraint,
        particle: ParticleId,
        symbols: &mut SymbolTable,
        positions: &mut Positions,
    ) -> Result<Node> {
        let mut replacement: Option<Node> = None;
        for symbol in symbols.namespace_symbols(constraint) {
            if symbols.particle_of(symbol) != Some(particle) {
                symbols.clear_upa_eligible();
            }
            let leaf = Node::Leaf(positions.add(symbol, Some(particle), Origin::Wildcard));
            replacement = Some(match replacement {
                None => leaf,
                Some(previous) => {
                    let left = self.push(previous);
                    let right = self.push(leaf);
                    Node::Choice {
                        left,
                        right: Some(right),
                    }
                }
            });
        }
        replacement.ok_or_else(|| {
            BuildError::new(format!("wildcard {} matches no symbol", constraint))
                .with_operation("expand")
                .into()
        })
    }

    fn expand_repeat(
        &mut self,
        child: NodeId,
        min: u32,
        max: Option<u32>,
        positions: &mut Positions,
        limits: &Limits,
    ) -> Result<NodeId> {
        limits.check_expanded_copies(Occurs::new(min, max).expanded_copies())?;

        if min == 0 {
            let mut result = self.push(Node::Optional(child));
            for _ in 1..max.unwrap_or(1) {
                let copy = self.clone_subtree(child, positions)?;
                let optional = self.push(Node::Optional(copy));
                result = self.push(Node::Sequence {
                    left: result,
                    right: Some(optional),
                });
            }
            return Ok(result);
        }

        let mut result = child;
        for _ in 1..min {
            let copy = self.clone_subtree(child, positions)?;
            result = self.push(Node::Sequence {
                left: result,
                right: Some(copy),
            });
        }
        match max {
            None => {
                let copy = self.clone_subtree(child, positions)?;
                let star = self.push(Node::Star(copy));
                result = self.push(Node::Sequence {
                    left: result,
                    right: Some(star),
                });
            }
            Some(max) => {
                for _ in min..max {
                    let copy = self.clone_subtree(child, positions)?;
                    let optional = self.push(Node::Optional(copy));
                    result = self.push(Node::Sequence {
                        left: result,
                        right: Some(optional),
                    });
                }
            }
        }
        Ok(result)
    }

    /// Deep copy of an expanded subtree. Copied leaves get fresh positions
    /// with the same symbol and particle; copied range leaves get their own
    /// counter.
    pub fn clone_subtree(&mut self, root: NodeId, positions: &mut Positions) -> Result<NodeId> {
        let mut mapped = vec![None; self.nodes.len()];
        let map = |mapped: &[Option<NodeId>], id: NodeId| -> Result<NodeId> {
            mapped[id].ok_or_else(|| BuildError::new("unmapped node").with_operation("clone").into())
        };

        for id in self.post_order(root) {
            let copy = match self.nodes[id].clone() {
                Node::Leaf(pos) => match positions.get(pos).copied() {
                    Some(position) => Node::Leaf(positions.push(position)),
                    None => return Err(BuildError::new("leaf without position").into()),
                },
                Node::RangeLeaf(leaf) => {
                    let range = &self.ranges[leaf];
                    let (min, max) = (range.min, range.max);
                    let copy = self.add_range_leaf(positions, min, max);
                    mapped[id] = Some(copy);
                    continue;
                }
                Node::Sequence { left, right } => Node::Sequence {
                    left: map(&mapped, left)?,
                    right: right.map(|r| map(&mapped, r)).transpose()?,
                },
                Node::Choice { left, right } => Node::Choice {
                    left: map(&mapped, left)?,
                    right: right.map(|r| map(&mapped, r)).transpose()?,
                },
                Node::Star(child) => Node::Star(map(&mapped, child)?),
                Node::Plus(child) => Node::Plus(map(&mapped, child)?),
                Node::Optional(child) => Node::Optional(map(&mapped, child)?),
                Node::Wildcard { .. } | Node::Repeat { .. } => {
                    return Err(BuildError::new("cannot copy an unexpanded node")
                        .with_operation("clone")
                        .into());
                }
            };
            mapped[id] = Some(self.push(copy));
        }
        map(&mapped, root)
    }

    /// Compute firstpos, lastpos and followpos of an expanded tree. Also
    /// records the next-iteration set of every range leaf.
    pub fn construct_pos(&mut self, root: NodeId, positions_count: usize) -> Result<FollowSets> {
        let order = self.post_order(root);
        let mut nullable = vec![false; self.nodes.len()];
        let mut sets: Vec<Option<(BitSet, BitSet)>> = vec![None; self.nodes.len()];
        let mut followpos = vec![BitSet::with_capacity(positions_count); positions_count];

        let take = |sets: &mut Vec<Option<(BitSet, BitSet)>>, id: NodeId| {
            sets[id].take().ok_or_else(|| {
                crate::error::Error::from(BuildError::new("node visited twice").with_operation("construct_pos"))
            })
        };

        for id in order {
            let (first, last) = match self.nodes[id] {
                Node::Leaf(pos) => singleton(pos, positions_count),
                Node::RangeLeaf(leaf) => singleton(self.ranges[leaf].pos, positions_count),
                Node::Sequence {
                    left,
                    right: Some(right),
                } => {
                    let (first_left, last_left) = take(&mut sets, left)?;
                    let (first_right, last_right) = take(&mut sets, right)?;
                    let right_is_range = self.is_range_leaf(right);

                    let mut first = first_left;
                    if nullable[left] && !right_is_range {
                        first.union_with(&first_right);
                    }
                    let mut last = last_right;
                    if nullable[right] {
                        last.union_with(&last_left);
                    }
                    for pos in last_left.iter() {
                        followpos[pos].union_with(&first_right);
                    }
                    if let Node::RangeLeaf(leaf) = self.nodes[right] {
                        self.ranges[leaf].next_iteration = first.clone();
                    }
                    (first, last)
                }
                Node::Choice {
                    left,
                    right: Some(right),
                } => {
                    let (mut first, mut last) = take(&mut sets, left)?;
                    let (first_right, last_right) = take(&mut sets, right)?;
                    first.union_with(&first_right);
                    last.union_with(&last_right);
                    (first, last)
                }
                Node::Star(child) | Node::Plus(child) => {
                    let (first, last) = take(&mut sets, child)?;
                    for pos in last.iter() {
                        followpos[pos].union_with(&first);
                    }
                    (first, last)
                }
                Node::Optional(child) => take(&mut sets, child)?,
                Node::Sequence { right: None, .. } | Node::Choice { right: None, .. } => {
                    return Err(BuildError::new("incomplete sequence or choice")
                        .with_operation("construct_pos")
                        .into());
                }
                Node::Wildcard { .. } | Node::Repeat { .. } => {
                    return Err(BuildError::new("temporary node reached automaton construction")
                        .with_operation("construct_pos")
                        .into());
                }
            };
            nullable[id] = self.nullable_with(id, &nullable);
            sets[id] = Some((first, last));
        }

        let (firstpos, lastpos) = take(&mut sets, root)?;
        Ok(FollowSets {
            firstpos,
            lastpos,
            followpos,
        })
    }

    /// Compact rendering, e.g. `("a", "b"*)` or `("a", {2, 4})`
    pub fn render(&self, root: NodeId, symbols: &SymbolTable, positions: &Positions) -> String {
        enum Item {
            Node(NodeId),
            Text(Cow<'static, str>),
        }

        let mut out = String::new();
        let mut stack = vec![Item::Node(root)];
        while let Some(item) = stack.pop() {
            let id = match item {
                Item::Text(text) => {
                    out.push_str(&text);
                    continue;
                }
                Item::Node(id) => id,
            };
            match &self.nodes[id] {
                Node::Leaf(pos) => match positions.get(*pos) {
                    Some(Position::Term { symbol, .. }) => {
                        out.push('"');
                        out.push_str(&symbols.name_of(*symbol));
                        out.push('"');
                    }
                    _ => out.push_str("?"),
                },
                Node::Wildcard { constraint, .. } => {
                    out.push('[');
                    out.push_str(&constraint.to_string());
                    out.push(']');
                }
                Node::RangeLeaf(leaf) => {
                    let range = &self.ranges[*leaf];
                    out.push_str(&format!("{{{}, {}}}", range.min, display_max(range.max)));
                }
                Node::Sequence { left, right } | Node::Choice { left, right } => {
                    let separator = if matches!(self.nodes[id], Node::Sequence { .. }) {
                        ", "
                    } else {
                        " | "
                    };
                    out.push('(');
                    stack.push(Item::Text(Cow::Borrowed(")")));
                    match right {
                        Some(right) => stack.push(Item::Node(*right)),
                        None => stack.push(Item::Text(Cow::Borrowed("_"))),
                    }
                    stack.push(Item::Text(Cow::Borrowed(separator)));
                    stack.push(Item::Node(*left));
                }
                Node::Star(child) => {
                    stack.push(Item::Text(Cow::Borrowed("*")));
                    stack.push(Item::Node(*child));
                }
                Node::Plus(child) => {
                    stack.push(Item::Text(Cow::Borrowed("+")));
                    stack.push(Item::Node(*child));
                }
                Node::Optional(child) => {
                    stack.push(Item::Text(Cow::Borrowed("?")));
                    stack.push(Item::Node(*child));
                }
                Node::Repeat { child, min, max } => {
                    let max = max.map_or_else(|| "unbounded".to_string(), |m| m.to_string());
                    stack.push(Item::Text(Cow::Owned(format!("{{{}, {}}}", min, max))));
                    stack.push(Item::Node(*child));
                }
            }
        }
        out
    }
}

fn singleton(pos: usize, capacity: usize) -> (BitSet, BitSet) {
    let mut set = BitSet::with_capacity(capacity);
    set.insert(pos);
    (set.clone(), set)
}

fn display_max(max: Decimal) -> String {
    if max == Decimal::MAX {
        "unbounded".to_string()
    } else {
        max.to_string()
    }
}
