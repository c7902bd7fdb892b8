use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
};

use crate::{Expr, Rules, Terminal};

use super::Alphabet;

pub type ConsistencyResult<T> = Result<T, ConsistencyError>;

/// The ways that a set of [`Rules`] can be malformed
#[derive(Debug, Clone, PartialEq)]
pub enum ConsistencyError {
    /// Two sub-expressions of the same rule commit to different alphabets
    AlphabetMismatch {
        rule: String,
        left: String,
        right: String,
        left_alphabet: Alphabet,
        right_alphabet: Alphabet,
    },
    /// Two rules commit to different alphabets
    RuleAlphabetMismatch {
        first_rule: String,
        second_rule: String,
        first_alphabet: Alphabet,
        second_alphabet: Alphabet,
    },
    UndefinedRule { name: String },
}

impl Display for ConsistencyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyError::AlphabetMismatch {
                rule,
                left,
                right,
                left_alphabet,
                right_alphabet,
            } => write!(
                f,
                "in rule {}: `{}` matches {}s but `{}` matches {}s",
                rule, left, left_alphabet, right, right_alphabet
            ),
            ConsistencyError::RuleAlphabetMismatch {
                first_rule,
                second_rule,
                first_alphabet,
                second_alphabet,
            } => write!(
                f,
                "rule {} matches {}s but rule {} matches {}s",
                first_rule, first_alphabet, second_rule, second_alphabet
            ),
            ConsistencyError::UndefinedRule { name } => write!(f, "rule {} is not defined", name),
        }
    }
}

impl std::error::Error for ConsistencyError {}

/// Checks that every rule (and so every terminal reachable from any rule) agrees on one
/// [`Alphabet`], and that every referenced rule name is defined.  Returns the alphabet of the
/// whole set of rules.
pub fn check_consistency(rules: &Rules) -> ConsistencyResult<Alphabet> {
    let defined: HashSet<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    let mut referenced = Vec::<&str>::new();

    // The alphabet so far, along with the rule which first committed to it
    let mut global: (Alphabet, Option<&str>) = (Alphabet::Any, None);
    for rule in rules {
        referenced.push(&rule.name);
        let (alphabet, _) = expr_alphabet(&rule.name, &rule.expr, &mut referenced)?;
        match global.0.unify(alphabet) {
            Some(unified) => {
                if unified != global.0 {
                    global = (unified, Some(&rule.name));
                }
            }
            None => {
                return Err(ConsistencyError::RuleAlphabetMismatch {
                    first_rule: global.1.unwrap_or_default().to_owned(),
                    second_rule: rule.name.clone(),
                    first_alphabet: global.0,
                    second_alphabet: alphabet,
                })
            }
        }
    }

    if let Some(name) = referenced.into_iter().find(|name| !defined.contains(name)) {
        return Err(ConsistencyError::UndefinedRule {
            name: name.to_owned(),
        });
    }
    Ok(global.0)
}

/// Computes the alphabet of `expr`, along with the sub-expression which decided it (or `None` if
/// the alphabet is [`Alphabet::Any`]).  Every referenced symbol name is pushed to `referenced`.
fn expr_alphabet<'r>(
    rule: &str,
    expr: &'r Expr,
    referenced: &mut Vec<&'r str>,
) -> ConsistencyResult<(Alphabet, Option<&'r Expr>)> {
    match expr {
        Expr::Symbol(s) => {
            referenced.push(&s.name);
            Ok((Alphabet::Any, None))
        }
        Expr::Terminal(t) => {
            let alphabet = terminal_alphabet(t);
            let source = (alphabet != Alphabet::Any).then(|| expr);
            Ok((alphabet, source))
        }
        _ => {
            let mut acc: (Alphabet, Option<&Expr>) = (Alphabet::Any, None);
            for child in expr.children() {
                let (alphabet, source) = expr_alphabet(rule, child, referenced)?;
                match acc.0.unify(alphabet) {
                    Some(unified) => {
                        if unified != acc.0 {
                            acc = (unified, source);
                        }
                    }
                    None => {
                        return Err(ConsistencyError::AlphabetMismatch {
                            rule: rule.to_owned(),
                            left: describe(acc.1),
                            right: describe(source),
                            left_alphabet: acc.0,
                            right_alphabet: alphabet,
                        })
                    }
                }
            }
            Ok(acc)
        }
    }
}

fn terminal_alphabet(terminal: &Terminal) -> Alphabet {
    match terminal {
        Terminal::Empty | Terminal::Dot | Terminal::StartOfInput | Terminal::EndOfInput => {
            Alphabet::Any
        }
        Terminal::Literal(_) | Terminal::Pattern(_) => Alphabet::Byte,
        Terminal::Atom(_) => Alphabet::Atom,
    }
}

fn describe(expr: Option<&Expr>) -> String {
    expr.map(Expr::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{check_consistency, ConsistencyError};
    use crate::{analysis::Alphabet, AtomPattern, Expr, Rule, Rules};

    fn rules(rules: Vec<(&str, Expr)>) -> Rules {
        rules
            .into_iter()
            .map(|(name, expr)| Rule::new(name, expr))
            .collect()
    }

    fn text_atom() -> Expr {
        Expr::atom(AtomPattern::new().with_key("Text"))
    }

    #[test]
    fn alphabets() {
        let check = |rs: Vec<(&str, Expr)>, expected: Alphabet| {
            assert_eq!(check_consistency(&rules(rs)), Ok(expected));
        };
        check(vec![("A", Expr::dot())], Alphabet::Any);
        check(
            vec![("A", Expr::sequence(vec![Expr::dot(), Expr::literal("x")]))],
            Alphabet::Byte,
        );
        check(
            vec![("A", Expr::star(text_atom())), ("B", Expr::symbol("A"))],
            Alphabet::Atom,
        );
        check(
            vec![
                ("A", Expr::empty()),
                ("B", Expr::optional(Expr::pattern("[a-z]").unwrap())),
            ],
            Alphabet::Byte,
        );
    }

    #[test]
    fn mismatch_inside_rule() {
        let rs = rules(vec![(
            "A",
            Expr::choice(vec![Expr::empty(), Expr::literal("x"), text_atom()]),
        )]);
        assert_eq!(
            check_consistency(&rs),
            Err(ConsistencyError::AlphabetMismatch {
                rule: "A".to_owned(),
                left: "\"x\"".to_owned(),
                right: "{Text}".to_owned(),
                left_alphabet: Alphabet::Byte,
                right_alphabet: Alphabet::Atom,
            })
        );
    }

    #[test]
    fn mismatch_between_rules() {
        let rs = rules(vec![
            ("A", Expr::dot()),
            ("B", Expr::literal("x")),
            ("C", text_atom()),
        ]);
        assert_eq!(
            check_consistency(&rs),
            Err(ConsistencyError::RuleAlphabetMismatch {
                first_rule: "B".to_owned(),
                second_rule: "C".to_owned(),
                first_alphabet: Alphabet::Byte,
                second_alphabet: Alphabet::Atom,
            })
        );
    }

    #[test]
    fn undefined_rule() {
        let rs = rules(vec![(
            "A",
            Expr::sequence(vec![Expr::symbol("A"), Expr::symbol("B")]),
        )]);
        assert_eq!(
            check_consistency(&rs),
            Err(ConsistencyError::UndefinedRule {
                name: "B".to_owned()
            })
        );
    }
}
