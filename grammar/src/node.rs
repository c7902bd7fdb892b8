//! The parse trees produced by a [`Grammar`](crate::parser::Grammar).

use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
};

use itertools::Itertools;

use crate::{Atom, Segment};

/// A node in a parse tree.  Its `atom` names the rule which matched (along with the attributes of
/// the symbol which referenced it) and selects the text it covers from the source buffer.
/// `segment` is the range of *input positions* which it covers, which for atom input is not the
/// same as the range of the source text.
///
/// Trees can be as deep as the input is long, so walking, comparing, printing and dropping them
/// never recurses.
#[derive(Debug, Clone, Eq)]
pub struct ParsingNode {
    pub atom: Atom,
    pub segment: Segment,
    pub children: Vec<ParsingNode>,
}

/// What [`ParsingNode::traverse`] should do after visiting a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    SkipChildren,
    Stop,
}

/// The ways that looking up a unique child can fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    Missing { symbol: String },
    Multiple { symbol: String, count: usize },
}

impl Display for SelectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectError::Missing { symbol } => write!(f, "no child matched {}", symbol),
            SelectError::Multiple { symbol, count } => {
                write!(f, "expected one child matching {}, found {}", symbol, count)
            }
        }
    }
}

impl std::error::Error for SelectError {}

impl ParsingNode {
    pub fn new(atom: Atom, segment: Segment, children: Vec<ParsingNode>) -> Self {
        Self {
            atom,
            segment,
            children,
        }
    }

    /// The name of the rule which produced this node
    pub fn symbol(&self) -> &str {
        &self.atom.symbol
    }

    /// The source text covered by this node
    pub fn text(&self) -> Cow<'_, [u8]> {
        self.atom.select_text()
    }

    pub fn text_str(&self) -> Cow<'_, str> {
        self.atom.select_str()
    }

    pub fn children(&self) -> &[ParsingNode] {
        &self.children
    }

    /////////////
    // WALKING //
    /////////////

    /// Walks the tree in pre-order, calling `visit` on every node until it returns
    /// [`Visit::Stop`].  Returns `false` if the walk was stopped early.
    pub fn traverse(&self, visit: &mut impl FnMut(&ParsingNode) -> Visit) -> bool {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match visit(node) {
                Visit::Stop => return false,
                Visit::SkipChildren => {}
                Visit::Descend => stack.extend(node.children.iter().rev()),
            }
        }
        true
    }

    /// The one direct child called `symbol`
    pub fn select_one(&self, symbol: &str) -> Result<&ParsingNode, SelectError> {
        let mut matching = self.children.iter().filter(|c| c.symbol() == symbol);
        match (matching.next(), matching.count()) {
            (Some(child), 0) => Ok(child),
            (None, _) => Err(SelectError::Missing {
                symbol: symbol.to_owned(),
            }),
            (Some(_), others) => Err(SelectError::Multiple {
                symbol: symbol.to_owned(),
                count: others + 1,
            }),
        }
    }

    /// The first direct child called `symbol`, if any
    pub fn select_first(&self, symbol: &str) -> Option<&ParsingNode> {
        self.children.iter().find(|c| c.symbol() == symbol)
    }

    /// All direct children called `symbol`, in order
    pub fn select_all<'n>(&'n self, symbol: &'n str) -> impl Iterator<Item = &'n ParsingNode> {
        self.children.iter().filter(move |c| c.symbol() == symbol)
    }

    /// The only child of this node, if it has exactly one
    pub fn only_child(&self) -> Option<&ParsingNode> {
        match self.children.as_slice() {
            [child] => Some(child),
            _ => None,
        }
    }

    /// Converts the direct children of this node into [`Atom`]s, so that they can be parsed again
    /// by an atom-level grammar.
    pub fn child_atoms(&self) -> Vec<Atom> {
        self.children.iter().map(|c| c.atom.clone()).collect_vec()
    }

    /// Writes this node's own line of the tree, indented two spaces per level of `depth`
    fn fmt_line(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        write!(
            f,
            "{:indent$}{}[{}..{}): {:?}",
            "",
            self.symbol(),
            self.segment.start,
            self.segment.end,
            self.text_str(),
            indent = depth * 2
        )?;
        for (key, value) in &self.atom.attributes {
            write!(f, " {}={:?}", key, String::from_utf8_lossy(value))?;
        }
        writeln!(f)
    }
}

impl Display for ParsingNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut stack = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            node.fmt_line(f, depth)?;
            stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
        }
        Ok(())
    }
}

impl PartialEq for ParsingNode {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.atom != b.atom || a.segment != b.segment || a.children.len() != b.children.len() {
                return false;
            }
            stack.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Drop for ParsingNode {
    fn drop(&mut self) {
        // Move every descendant into one flat list, so each node is dropped with no children
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}
