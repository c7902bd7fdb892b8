//! The representation of parsing expressions.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::{Debug, Display, Formatter},
};

use itertools::Itertools;
use regex::bytes::Regex;

use crate::atom::{Atom, Attributes};

/// A parsing expression.  The variants below [`Expr::Star`] are 'sugar', and are rewritten into
/// the other variants by [`desugar_rules`](crate::analysis::desugar_rules) before any further
/// analysis happens.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A reference to another rule
    Symbol(Symbol),
    /// A leaf which is matched directly against the input
    Terminal(Terminal),
    /// Matches each child in turn (sometimes called a 'junction')
    Sequence(Vec<Expr>),
    /// Ordered choice: the first child which matches wins
    Choice(Vec<Expr>),
    /// Zero-width match which succeeds iff its child fails
    Negation(Box<Expr>),
    /// Kleene star: as many repetitions of the child as possible
    Star(Box<Expr>),

    /* SUGAR */
    Optional(Box<Expr>),
    /// Zero-width positive lookahead
    Ensure(Box<Expr>),
    /// At least `min` repetitions of `expr`
    Repetition { expr: Box<Expr>, min: usize },
}

/// A reference to a rule by name.  Any attributes are copied into the parse node created for
/// this reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub attributes: Attributes,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// Always matches, consuming nothing
    Empty,
    /// Matches any single unit of input
    Dot,
    /// Matches an exact byte string
    Literal(Literal),
    /// Matches a regex anchored at the current position
    Pattern(Pattern),
    /// Matches a single [`Atom`](crate::Atom) by its symbol and attributes
    Atom(AtomPattern),
    StartOfInput,
    EndOfInput,
}

/// The ability to match a prefix of a byte string, shared by the byte-level [`Terminal`]s.
pub trait ByteMatcher {
    /// Returns the length of the prefix of `text` matched by `self`, if any.
    fn match_prefix(&self, text: &[u8]) -> Option<usize>;

    /// Returns `true` if `self` matches the whole of `text`.
    fn match_whole(&self, text: &[u8]) -> bool;

    /// Returns `true` if `self` can match the empty string.
    fn matches_empty(&self) -> bool {
        self.match_prefix(&[]).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    bytes: Vec<u8>,
}

impl Literal {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteMatcher for Literal {
    fn match_prefix(&self, text: &[u8]) -> Option<usize> {
        text.starts_with(&self.bytes).then(|| self.bytes.len())
    }

    fn match_whole(&self, text: &[u8]) -> bool {
        text == self.bytes.as_slice()
    }

    fn matches_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A regular expression over bytes.  Two copies are compiled, so that both prefix and
/// whole-string matches are a single regex run.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    anchored_start: Regex,
    anchored_both: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let source = source.trim_start_matches('^');
        Ok(Self {
            source: source.to_owned(),
            anchored_start: Regex::new(&format!("^(?:{})", source))?,
            anchored_both: Regex::new(&format!("^(?:{})$", source))?,
        })
    }

    /// The regex as written, without the anchors added by [`Pattern::new`]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl ByteMatcher for Pattern {
    fn match_prefix(&self, text: &[u8]) -> Option<usize> {
        self.anchored_start.find(text).map(|m| m.end())
    }

    fn match_whole(&self, text: &[u8]) -> bool {
        self.anchored_both.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

/// Requirements on an attribute value (or on an atom's text) made by an [`AtomPattern`].  Values
/// must be matched in their entirety.  Unlike a literal [`Terminal`] in a byte grammar, which
/// matches a prefix of the remaining input, a `Literal` here only accepts a value equal to it.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeMatcher {
    Literal(Literal),
    Pattern(Pattern),
}

impl AttributeMatcher {
    pub fn matches(&self, value: &[u8]) -> bool {
        match self {
            AttributeMatcher::Literal(l) => l.match_whole(value),
            AttributeMatcher::Pattern(p) => p.match_whole(value),
        }
    }
}

/// Matches one atom.  Every key must either be the atom's symbol (in which case the matcher is
/// applied to the atom's selected text) or the name of one of its attributes (in which case the
/// matcher is applied to the attribute value).  `None` only requires the key to be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomPattern {
    pub matchers: BTreeMap<String, Option<AttributeMatcher>>,
}

impl AtomPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a requirement that `key` is present
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.matchers.insert(key.into(), None);
        self
    }

    /// Adds a requirement that `key` is present and its value matches `matcher`
    pub fn with(mut self, key: impl Into<String>, matcher: AttributeMatcher) -> Self {
        self.matchers.insert(key.into(), Some(matcher));
        self
    }

    /// Returns `true` if every requirement of `self` is met by `atom`
    pub fn matches(&self, atom: &Atom) -> bool {
        self.matchers.iter().all(|(key, matcher)| {
            let value = if *key == atom.symbol {
                atom.select_text()
            } else {
                match atom.attributes.get(key) {
                    Some(v) => Cow::Borrowed(v.as_slice()),
                    None => return false,
                }
            };
            matcher.as_ref().map_or(true, |m| m.matches(&value))
        })
    }
}

//////////////////
// CONSTRUCTORS //
//////////////////

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(Symbol::new(name))
    }

    pub fn symbol_with(name: impl Into<String>, attributes: Attributes) -> Self {
        Expr::Symbol(Symbol {
            name: name.into(),
            attributes,
        })
    }

    pub fn empty() -> Self {
        Expr::Terminal(Terminal::Empty)
    }

    pub fn dot() -> Self {
        Expr::Terminal(Terminal::Dot)
    }

    pub fn start_of_input() -> Self {
        Expr::Terminal(Terminal::StartOfInput)
    }

    pub fn end_of_input() -> Self {
        Expr::Terminal(Terminal::EndOfInput)
    }

    pub fn literal(text: impl Into<Vec<u8>>) -> Self {
        Expr::Terminal(Terminal::Literal(Literal::new(text)))
    }

    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Ok(Expr::Terminal(Terminal::Pattern(Pattern::new(source)?)))
    }

    pub fn atom(pattern: AtomPattern) -> Self {
        Expr::Terminal(Terminal::Atom(pattern))
    }

    /// A sequence of `exprs`.  A single expression is returned unwrapped.
    ///
    /// # Panics
    ///
    /// Panics if `exprs` is empty.
    pub fn sequence(mut exprs: Vec<Expr>) -> Self {
        assert!(!exprs.is_empty(), "A sequence needs at least one expression");
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Sequence(exprs)
        }
    }

    /// An ordered choice between `exprs`.  A single expression is returned unwrapped.
    pub fn choice(mut exprs: Vec<Expr>) -> Self {
        assert!(!exprs.is_empty(), "A choice needs at least one expression");
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Choice(exprs)
        }
    }

    pub fn negation(expr: Expr) -> Self {
        Expr::Negation(Box::new(expr))
    }

    pub fn star(expr: Expr) -> Self {
        Expr::Star(Box::new(expr))
    }

    pub fn optional(expr: Expr) -> Self {
        Expr::Optional(Box::new(expr))
    }

    pub fn ensure(expr: Expr) -> Self {
        Expr::Ensure(Box::new(expr))
    }

    pub fn repetition(expr: Expr, min: usize) -> Self {
        Expr::Repetition {
            expr: Box::new(expr),
            min,
        }
    }
}

/////////////
// QUERIES //
/////////////

impl Expr {
    /// The direct sub-expressions of `self`, in order
    pub fn children(&self) -> &[Expr] {
        match self {
            Expr::Symbol(_) | Expr::Terminal(_) => &[],
            Expr::Sequence(exprs) | Expr::Choice(exprs) => exprs,
            Expr::Negation(expr)
            | Expr::Star(expr)
            | Expr::Optional(expr)
            | Expr::Ensure(expr)
            | Expr::Repetition { expr, .. } => std::slice::from_ref(&**expr),
        }
    }

    /// Returns `true` for terminals and symbols, the only expressions allowed as children in
    /// normalized rules
    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Symbol(_) | Expr::Terminal(_))
    }

    pub fn is_sugar(&self) -> bool {
        matches!(
            self,
            Expr::Optional(_) | Expr::Ensure(_) | Expr::Repetition { .. }
        )
    }

    /// Binding strength of this expression's outermost operator, used to decide where
    /// [`Display`] needs to add parentheses.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Choice(_) => 1,
            Expr::Sequence(_) => 2,
            Expr::Negation(_) | Expr::Ensure(_) => 3,
            Expr::Star(_) | Expr::Optional(_) | Expr::Repetition { .. } => 4,
            Expr::Symbol(_) | Expr::Terminal(_) => 5,
        }
    }
}

impl Terminal {
    /// Returns `true` if this terminal can succeed without consuming any input
    pub fn matches_empty(&self) -> bool {
        match self {
            Terminal::Empty | Terminal::StartOfInput | Terminal::EndOfInput => true,
            Terminal::Dot | Terminal::Atom(_) => false,
            Terminal::Literal(l) => l.matches_empty(),
            Terminal::Pattern(p) => p.matches_empty(),
        }
    }
}

/////////////
// DISPLAY //
/////////////

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let precedence = self.precedence();
        match self {
            Expr::Symbol(s) => write!(f, "{}", s.name),
            Expr::Terminal(t) => write!(f, "{}", t),
            Expr::Sequence(exprs) | Expr::Choice(exprs) => {
                let separator = if precedence == 1 { " / " } else { " " };
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(separator)?;
                    }
                    write_wrapped(f, e, precedence)?;
                }
                Ok(())
            }
            Expr::Negation(e) => {
                f.write_str("!")?;
                write_wrapped(f, e, precedence)
            }
            Expr::Ensure(e) => {
                f.write_str("&")?;
                write_wrapped(f, e, precedence)
            }
            Expr::Star(e) => {
                write_wrapped(f, e, precedence)?;
                f.write_str("*")
            }
            Expr::Optional(e) => {
                write_wrapped(f, e, precedence)?;
                f.write_str("?")
            }
            Expr::Repetition { expr, min } => {
                write_wrapped(f, expr, precedence)?;
                match min {
                    0 => f.write_str("*"),
                    1 => f.write_str("+"),
                    n => write!(f, "{{{},}}", n),
                }
            }
        }
    }
}

/// Writes `child`, parenthesised if it binds more loosely than its parent
fn write_wrapped(f: &mut Formatter<'_>, child: &Expr, parent_precedence: u8) -> std::fmt::Result {
    if child.precedence() < parent_precedence {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

impl Display for Terminal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminal::Empty => f.write_str("@empty"),
            Terminal::Dot => f.write_str("."),
            Terminal::StartOfInput => f.write_str("@sof"),
            Terminal::EndOfInput => f.write_str("@eof"),
            Terminal::Literal(l) => write!(f, "{}", l),
            Terminal::Pattern(p) => write!(f, "{}", p),
            Terminal::Atom(a) => write!(f, "{}", a),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.bytes))
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "=~{:?}", self.source)
    }
}

impl Display for AttributeMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeMatcher::Literal(l) => write!(f, "{}", l),
            AttributeMatcher::Pattern(p) => write!(f, "{}", p),
        }
    }
}

impl Display for AtomPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let entries = self
            .matchers
            .iter()
            .map(|(key, matcher)| match matcher {
                Some(m) => format!("{}:{}", key, m),
                None => key.clone(),
            })
            .join(", ");
        write!(f, "{{{}}}", entries)
    }
}
