//! Specification for the file format which specifies grammars.  This can be roughly thought of as
//! an 'AST' for the grammar files.
//!
//! When loading a grammar, the following sequence of actions is performed:
//! 1. Load the `*.toml` file containing the grammar
//! 2. Read that TOML file into a [`SpecGrammar`]
//! 3. Convert that [`SpecGrammar`] into [`Rules`](crate::Rules), and compile them into a full
//!    [`Grammar`]
//!
//! All these stages can generate errors, which are all bubbled up to the caller.
//!
//! A grammar file looks like this:
//! ```toml
//! root = "List"
//!
//! [[rules]]
//! name = "List"
//! expr = { seq = ["Item", { star = { seq = [{ token = "," }, "Item"] } }] }
//!
//! [[rules]]
//! name = "Item"
//! expr = { regex = "[a-z]+" }
//! ```
//! Longer expressions can be written as a sub-table of the rule, so that arrays can span several
//! lines:
//! ```toml
//! [[rules]]
//! name = "Value"
//! [rules.expr]
//! choice = [
//!     { repeat = "Digit" },
//!     { seq = [{ token = "(" }, "Expr", { token = ")" }] },
//! ]
//! ```

pub mod convert;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{Grammar, Rules};

use self::convert::ConvertResult;

type RuleName = String;

/// A simplified version of [`Rules`] which can be [`Deserialize`]d from any JSON-like data
/// structure (usually TOML).  [`into_grammar`](SpecGrammar::into_grammar) checks the source data
/// and compiles it into a [`Grammar`].
///
/// This type is implemented very declaratively, with minimal use of [`serde`] features.  To this
/// end, it is designed to be consulted as a reference specification for the grammar files.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecGrammar {
    /// The rule which parsing starts from
    root: RuleName,
    rules: Vec<SpecRule>,
}

impl SpecGrammar {
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Converts this spec into [`Rules`], without checking them
    pub fn into_rules(self) -> ConvertResult<Rules> {
        convert::convert_rules(self.rules)
    }

    /// Converts and compiles this spec, returning the [`Grammar`] and the name of its root rule
    pub fn into_grammar(self) -> ConvertResult<(Grammar, String)> {
        convert::convert(self)
    }
}

/// One definition of a rule.  A name may be defined several times, in which case the
/// definitions are tried in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SpecRule {
    name: RuleName,
    expr: Expr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, untagged)]
pub(crate) enum Expr {
    /// Either a builtin (`"@empty"`, `"."`, `"@sof"` or `"@eof"`) or a reference to the rule with
    /// this name
    Name(String),
    /// Exact text
    Token { token: String },
    /// A regex, matched at the current position
    Regex { regex: String },
    /// A reference to a rule, giving attributes to the node it creates
    Symbol {
        symbol: RuleName,
        #[serde(default = "BTreeMap::new")]
        attributes: BTreeMap<String, String>,
    },
    Seq {
        seq: Vec<Expr>,
    },
    /// Ordered choice
    Choice {
        choice: Vec<Expr>,
    },
    Not {
        not: Box<Expr>,
    },
    /// Positive lookahead
    And {
        and: Box<Expr>,
    },
    Optional {
        optional: Box<Expr>,
    },
    Star {
        star: Box<Expr>,
    },
    /// At least `min` repetitions (by default, one or more)
    Repeat {
        repeat: Box<Expr>,
        #[serde(default = "one")]
        min: usize,
    },
    /// A single atom.  Each key must be the atom's symbol or one of its attributes.
    Atom { atom: BTreeMap<String, Matcher> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, untagged)]
pub(crate) enum Matcher {
    /// Expected to be `true`: only requires the key to be present
    Present(bool),
    Token { token: String },
    Regex { regex: String },
}

fn one() -> usize {
    1
}
