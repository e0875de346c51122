//! Content model builder
//!
//! [`ContentModelBuilder`] receives an already parsed grammar as a stream of
//! events (open and close group, terms, operators) and keeps a stack of
//! partially built nodes, one entry per nesting level. A group marker is
//! replaced by the first term added at its level; every later term is chained
//! as the right child of the pending sequence or choice.
//!
//! Postfix operators bind to the most recently completed term: after
//! `a, b` an [`add_star`](ContentModelBuilder::add_star) produces `a, (b*)`,
//! not `(a, b)*`. Wrap the operand in a group to repeat a whole sequence.
//!
//! [`finish`](ContentModelBuilder::finish) is the only way to obtain a
//! validator. It picks the automaton:
//!
//! * no terms: one of the shared trivial validators
//! * bounded ranges: the counting automaton
//! * ambiguous symbols: UPA check, then NFA simulation
//! * otherwise: a DFA, or the NFA when the DFA would exceed its state budget
//!
//! A builder that returned an error should be discarded.

use log::debug;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::{BuildError, Error, Result};
use crate::limits::Limits;
use crate::namespaces::QName;

use super::base::{self, ContentType, ContentValidator};
use super::compiler::{build_transition_table, check_upa, RangeFollow};
use super::models::{DfaValidator, NfaValidator};
use super::particles::{Occurs, ParticleId};
use super::range::RangeValidator;
use super::symbols::{Origin, Positions, SymbolTable};
use super::syntax_tree::{Node, NodeId, SyntaxTree};
use super::wildcards::NamespaceConstraint;

/// Builds one content model and compiles it into a validator
#[derive(Debug)]
pub struct ContentModelBuilder {
    tree: SyntaxTree,
    symbols: SymbolTable,
    positions: Positions,
    /// One entry per nesting level, None is an open group with no term yet
    stack: Vec<Option<NodeId>>,
    depth: usize,
    content: Option<NodeId>,
    /// The top of the stack is a sequence or choice whose right child was
    /// the last term added
    is_partial: bool,
    content_type: ContentType,
    open: bool,
    upa_check: bool,
    use_dfa: bool,
    limits: Limits,
}

impl ContentModelBuilder {
    /// Create a builder for a content type
    pub fn new(content_type: ContentType) -> Self {
        Self {
            tree: SyntaxTree::new(),
            symbols: SymbolTable::new(),
            positions: Positions::new(),
            stack: Vec::new(),
            depth: 0,
            content: None,
            is_partial: false,
            content_type,
            open: false,
            upa_check: true,
            use_dfa: true,
            limits: Limits::default(),
        }
    }

    /// Accept unknown elements once the model has matched
    pub fn set_open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    /// Enable or disable the Unique Particle Attribution check
    pub fn upa_check(mut self, enabled: bool) -> Self {
        self.upa_check = enabled;
        self
    }

    /// Allow or forbid DFA construction
    pub fn use_dfa(mut self, enabled: bool) -> Self {
        self.use_dfa = enabled;
        self
    }

    /// Set the automaton budgets
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Declared content type
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Automaton budgets
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Check if a full name was added
    pub fn exists(&self, name: &QName) -> bool {
        self.symbols.exists(name)
    }

    /// Start a nested group
    pub fn open_group(&mut self) {
        self.stack.push(None);
        self.depth += 1;
    }

    /// End the innermost group and chain it into the enclosing level
    pub fn close_group(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(BuildError::new("no open group")
                .with_operation("close_group")
                .into());
        }
        self.depth -= 1;
        self.reduce()
    }

    /// Add an element name
    pub fn add_name(&mut self, name: QName, particle: ParticleId) {
        let symbol = self.symbols.add_name(name, Some(particle));
        let pos = self.positions.add(symbol, Some(particle), Origin::Element);
        let leaf = self.tree.push(Node::Leaf(pos));
        self.add_leaf(leaf);
    }

    /// Add a namespace wildcard. Its positions are allocated when the model
    /// is finished, after every name is known.
    pub fn add_namespace_wildcard(&mut self, constraint: &NamespaceConstraint, particle: ParticleId) {
        self.symbols
            .add_namespace_wildcard(constraint, particle, false);
        let leaf = self.tree.push(Node::Wildcard {
            constraint: constraint.clone(),
            particle,
        });
        self.add_leaf(leaf);
    }

    /// The next term is an alternative to the current one
    pub fn add_choice(&mut self) -> Result<()> {
        let left = self.pop_complete("add_choice")?;
        let choice = self.tree.push(Node::Choice { left, right: None });
        self.stack.push(Some(choice));
        Ok(())
    }

    /// The next term follows the current one
    pub fn add_sequence(&mut self) -> Result<()> {
        let left = self.pop_complete("add_sequence")?;
        let sequence = self.tree.push(Node::Sequence { left, right: None });
        self.stack.push(Some(sequence));
        Ok(())
    }

    /// Zero or more of the last term
    pub fn add_star(&mut self) -> Result<()> {
        self.closure("add_star", Node::Star)
    }

    /// One or more of the last term
    pub fn add_plus(&mut self) -> Result<()> {
        self.closure("add_plus", Node::Plus)
    }

    /// Zero or one of the last term
    pub fn add_optional(&mut self) -> Result<()> {
        self.closure("add_optional", Node::Optional)
    }

    /// `{min, max}` occurrences of the last term, counted at validation
    /// time. Use `Decimal::MAX` for an unbounded maximum.
    pub fn add_bounded_range(&mut self, min: Decimal, max: Decimal) -> Result<()> {
        if min.is_sign_negative() || min > max || max.is_zero() {
            return Err(Error::Value(format!(
                "invalid occurrence range {{{}, {}}}",
                min, max
            )));
        }
        let range = self.tree.add_range_leaf(&mut self.positions, min, max);
        self.closure("add_bounded_range", |child| Node::Sequence {
            left: child,
            right: Some(range),
        })
    }

    /// `{min, max}` occurrences of the last term, spelled out as copies of
    /// the term when the model is finished. The model stays DFA-eligible.
    pub fn add_expanded_range(&mut self, min: u32, max: Option<u32>) -> Result<()> {
        let occurs = Occurs::new(min, max);
        occurs.check()?;
        match (min, max) {
            (_, Some(0)) => {
                return Err(Error::Value(
                    "an expanded range needs a positive maximum".to_string(),
                ))
            }
            (0, None) => {
                return Err(Error::Value(
                    "{0, unbounded} is not an expanded range, use add_star".to_string(),
                ))
            }
            _ => {}
        }
        self.limits.check_expanded_copies(occurs.expanded_copies())?;
        self.closure("add_expanded_range", |child| Node::Repeat { child, min, max })
    }

    /// Compile the model
    pub fn finish(mut self) -> Result<Arc<dyn ContentValidator>> {
        while self.depth > 0 {
            self.close_group()?;
        }
        if !self.stack.is_empty() {
            self.reduce()?;
        }

        let content = match self.content {
            Some(content) => content,
            None => return Ok(self.trivial()),
        };

        let end_symbol = self.symbols.add_name(QName::empty(), None);
        let end_marker = self.positions.add(end_symbol, None, Origin::Element);
        let end = self.tree.push(Node::Leaf(end_marker));
        let root = self.tree.push(Node::Sequence {
            left: content,
            right: Some(end),
        });

        debug!(
            "compiling content model {}",
            self.tree.render(content, &self.symbols, &self.positions)
        );
        self.tree
            .expand(root, &mut self.symbols, &mut self.positions, &self.limits)?;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "expanded to {}",
                self.tree.render(content, &self.symbols, &self.positions)
            );
        }

        let sets = self.tree.construct_pos(root, self.positions.len())?;
        let emptiable = self.tree.nullable(content);

        let validator: Arc<dyn ContentValidator> = if !self.tree.ranges().is_empty() {
            let ranges = self.tree.ranges().to_vec();
            let follow = RangeFollow::new(&ranges, &self.positions, &sets.followpos);
            if self.upa_check {
                follow.check_upa(&sets, &self.positions, &self.symbols)?;
            }
            Arc::new(RangeValidator::new(
                sets,
                follow,
                ranges,
                self.symbols,
                self.positions,
                end_marker,
                self.content_type,
                emptiable,
                self.limits.max_running_positions,
            ))
        } else if !self.symbols.is_upa_eligible() {
            if self.upa_check {
                check_upa(&sets, &self.positions, &self.symbols)?;
            }
            Arc::new(NfaValidator::new(
                sets,
                self.symbols,
                self.positions,
                end_marker,
                self.content_type,
                self.open,
                emptiable,
            ))
        } else {
            let rows = if self.use_dfa {
                build_transition_table(
                    &sets,
                    &self.positions,
                    self.symbols.count(),
                    end_marker,
                    self.limits.max_dfa_states(self.positions.len()),
                )
            } else {
                None
            };
            match rows {
                Some(rows) => Arc::new(DfaValidator::new(
                    rows,
                    self.symbols,
                    self.content_type,
                    self.open,
                    emptiable,
                )),
                None => Arc::new(NfaValidator::new(
                    sets,
                    self.symbols,
                    self.positions,
                    end_marker,
                    self.content_type,
                    self.open,
                    emptiable,
                )),
            }
        };

        debug!("content model compiled to a {} validator", validator.kind());
        Ok(validator)
    }

    fn trivial(&self) -> Arc<dyn ContentValidator> {
        match self.content_type {
            ContentType::Empty | ContentType::ElementOnly => base::empty(),
            ContentType::TextOnly => base::text_only(),
            ContentType::Mixed if self.open => base::any(),
            ContentType::Mixed => base::mixed(),
        }
    }

    fn is_pending(&self, id: NodeId) -> bool {
        matches!(
            self.tree.node(id),
            Node::Sequence { right: None, .. } | Node::Choice { right: None, .. }
        )
    }

    fn set_right(&mut self, id: NodeId, node: NodeId) {
        if let Node::Sequence { right, .. } | Node::Choice { right, .. } = self.tree.node_mut(id) {
            *right = Some(node);
        }
    }

    /// Combine a completed term with what the current level holds
    fn attach(&mut self, node: NodeId) -> NodeId {
        let top = match self.stack.pop() {
            Some(top) => top,
            None => self.content.take(),
        };
        match top {
            Some(top) if self.is_pending(top) => {
                self.set_right(top, node);
                top
            }
            // two terms without an operator form a sequence
            Some(top) => self.tree.push(Node::Sequence {
                left: top,
                right: Some(node),
            }),
            None => node,
        }
    }

    fn add_leaf(&mut self, leaf: NodeId) {
        let node = self.attach(leaf);
        self.stack.push(Some(node));
        self.is_partial = true;
    }

    fn reduce(&mut self) -> Result<()> {
        let node = match self.stack.pop() {
            Some(Some(node)) => node,
            _ => {
                return Err(BuildError::new("empty group")
                    .with_operation("close_group")
                    .into())
            }
        };
        if self.is_pending(node) {
            return Err(BuildError::new("sequence or choice without a right operand")
                .with_operation("close_group")
                .into());
        }

        if self.stack.is_empty() {
            let node = self.attach(node);
            self.content = Some(node);
            self.is_partial = false;
        } else {
            self.is_partial = matches!(self.stack.last(), Some(Some(_)));
            let node = self.attach(node);
            self.stack.push(Some(node));
        }
        Ok(())
    }

    fn pop_complete(&mut self, operation: &str) -> Result<NodeId> {
        let node = match self.stack.pop() {
            Some(Some(node)) => Some(node),
            Some(None) => None,
            None => self.content.take(),
        };
        match node {
            Some(node) if !self.is_pending(node) => Ok(node),
            _ => Err(BuildError::new("no term before the operator")
                .with_operation(operation)
                .into()),
        }
    }

    fn closure(&mut self, operation: &str, wrap: impl FnOnce(NodeId) -> Node) -> Result<()> {
        match self.stack.pop() {
            Some(Some(top)) => {
                let partial_right = match *self.tree.node(top) {
                    Node::Sequence { right, .. } | Node::Choice { right, .. } if self.is_partial => {
                        Some(right)
                    }
                    _ => None,
                };
                let top = match partial_right {
                    Some(Some(right)) => {
                        let node = self.tree.push(wrap(right));
                        self.set_right(top, node);
                        top
                    }
                    Some(None) => {
                        return Err(BuildError::new("no term before the operator")
                            .with_operation(operation)
                            .into())
                    }
                    None => self.tree.push(wrap(top)),
                };
                self.stack.push(Some(top));
            }
            Some(None) => {
                return Err(BuildError::new("no term before the operator")
                    .with_operation(operation)
                    .into())
            }
            None => match self.content {
                Some(content) => self.content = Some(self.tree.push(wrap(content))),
                None => {
                    return Err(BuildError::new("no term before the operator")
                        .with_operation(operation)
                        .into())
                }
            },
        }
        Ok(())
    }
}
