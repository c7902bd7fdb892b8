//! Static analysis and rewriting of [`Rules`](crate::Rules), run before any input is parsed:
//! 1. [`check_consistency`] verifies that every rule agrees on one [`Alphabet`] and that every
//!    referenced rule exists
//! 2. [`desugar_rules`] rewrites the sugar operators into the core operators
//! 3. [`normalize`] flattens every rule body to depth 1, returning a [`Transformation`] which can
//!    undo the renaming later

mod consistency;
mod desugar;
mod normalize;
mod transformation;

use std::fmt::{Display, Formatter};

pub use consistency::{check_consistency, ConsistencyError};
pub use desugar::{check_desugared, desugar_expr, desugar_rules};
pub use normalize::{check_normalized, normalize};
pub use transformation::Transformation;

/// The kind of input over which a set of rules can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alphabet {
    /// No terminal commits to either bytes or atoms (e.g. only `@empty` and `.`)
    Any,
    Byte,
    Atom,
}

impl Alphabet {
    /// Combines two alphabets, returning `None` if they are incompatible.  [`Alphabet::Any`]
    /// unifies with everything.
    pub fn unify(self, other: Alphabet) -> Option<Alphabet> {
        match (self, other) {
            (Alphabet::Any, a) | (a, Alphabet::Any) => Some(a),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    /// Returns `true` if rules over `self` can run on input of kind `input`
    pub fn accepts(self, input: Alphabet) -> bool {
        self.unify(input).is_some()
    }
}

impl Display for Alphabet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Alphabet::Any => "any",
            Alphabet::Byte => "byte",
            Alphabet::Atom => "atom",
        })
    }
}

/// A violated precondition of one of the later pipeline stages.  These are never caused by user
/// grammars: they mean that the stages were run out of order.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractError {
    NotDesugared { rule: String, expr: String },
    NotNormalized { rule: String, expr: String },
    DuplicateRule(String),
}

impl Display for ContractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractError::NotDesugared { rule, expr } => {
                write!(f, "rule {} contains sugar expression `{}`", rule, expr)
            }
            ContractError::NotNormalized { rule, expr } => {
                write!(f, "rule {} has non-leaf child `{}`", rule, expr)
            }
            ContractError::DuplicateRule(name) => write!(f, "rule {} is defined twice", name),
        }
    }
}

impl std::error::Error for ContractError {}

#[cfg(test)]
mod tests {
    use super::Alphabet;

    #[test]
    fn unify() {
        use Alphabet::*;
        assert_eq!(Any.unify(Any), Some(Any));
        assert_eq!(Any.unify(Byte), Some(Byte));
        assert_eq!(Atom.unify(Any), Some(Atom));
        assert_eq!(Byte.unify(Byte), Some(Byte));
        assert_eq!(Byte.unify(Atom), None);
        assert!(Any.accepts(Atom));
        assert!(!Atom.accepts(Byte));
    }
}
