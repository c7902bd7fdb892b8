//! Crate for compiling parsing expression grammars (PEGs) and parsing input with them.
//!
//! This includes:
//! - The representation of grammars: [`Expr`]essions, [`Rule`]s and [`Rules`] (in the [`expr`]
//!   and [`rule`] modules)
//! - The input units for two-stage parsing: [`Atom`]s, whose text is selected from a shared
//!   buffer by [`Segments`] (in the [`atom`] module)
//! - Static checks and rewrites of grammars (in the [`analysis`] module)
//! - The parsing engine itself, which turns [`Rules`] into a [`Grammar`] and parses bytes or
//!   atoms into [`ParsingNode`] trees (in the [`parser`] and [`node`] modules)
//! - A deserializeable schema for grammars stored in TOML files (the [`spec`] module)
//!
//! Grammars can run over one of two alphabets: raw bytes, or sequences of [`Atom`]s produced by
//! an earlier parse.  Parsing uses a table of size `O(input length * rule count)`, so never
//! backtracks exponentially.  Left-recursive grammars are rejected when compiled.

pub mod analysis;
pub mod atom;
pub mod expr;
pub mod node;
pub mod parser;
pub mod rule;
pub mod spec; // Serde schema for grammars in TOML files

pub use atom::*;
pub use expr::*;
pub use node::{ParsingNode, SelectError, Visit};
pub use parser::{parse_atoms, parse_bytes, Grammar, GrammarError};
pub use rule::{analyze_symbol_name, Rule, Rules};
pub use spec::{convert::ConvertError, SpecGrammar};
