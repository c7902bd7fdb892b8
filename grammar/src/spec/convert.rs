use std::fmt::{Display, Formatter};

use super::{Matcher, SpecGrammar, SpecRule};
use crate::{
    AtomPattern, AttributeMatcher, Expr, Grammar, GrammarError, Literal, Pattern, Rule, Rules,
};

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Convert a [`SpecGrammar`] (likely parsed from a TOML file) into a compiled [`Grammar`], along
/// with the name of its root rule, or fail with a [`ConvertError`].
pub(crate) fn convert(grammar: SpecGrammar) -> ConvertResult<(Grammar, String)> {
    let SpecGrammar { root, rules } = grammar;
    let rules = convert_rules(rules)?;
    if rules.get(&root).is_none() {
        return Err(ConvertError::UnknownRoot(root));
    }
    let grammar = Grammar::compile(&rules).map_err(ConvertError::Grammar)?;
    Ok((grammar, root))
}

/// The possible ways that converting a [`SpecGrammar`] can fail.
#[derive(Debug)]
pub enum ConvertError {
    Regex {
        rule: String,
        regex: String,
        inner: regex::Error,
    },
    /// An atom pattern maps a key to `false`, which is meaningless
    FalseAtomKey { rule: String, key: String },
    /// A `seq` or `choice` has no elements
    EmptyList { rule: String },
    UnknownRoot(String),
    /// The rules were converted, but don't form a valid grammar
    Grammar(GrammarError),
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::Regex { rule, regex, inner } => {
                write!(f, "invalid regex {:?} in rule {}: {}", regex, rule, inner)
            }
            ConvertError::FalseAtomKey { rule, key } => write!(
                f,
                "atom key {} in rule {} must be `true` or a matcher",
                key, rule
            ),
            ConvertError::EmptyList { rule } => {
                write!(f, "rule {} contains an empty `seq` or `choice`", rule)
            }
            ConvertError::UnknownRoot(name) => write!(f, "unknown root rule {}", name),
            ConvertError::Grammar(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConvertError {}

pub(crate) fn convert_rules(rules: Vec<SpecRule>) -> ConvertResult<Rules> {
    rules
        .into_iter()
        .map(|SpecRule { name, expr }| -> ConvertResult<Rule> {
            let expr = convert_expr(expr, &name)?;
            Ok(Rule::new(name, expr))
        })
        .collect()
}

/////////////////
// EXPRESSIONS //
/////////////////

fn convert_expr(expr: super::Expr, rule: &str) -> ConvertResult<Expr> {
    let convert_all = |exprs: Vec<super::Expr>| -> ConvertResult<Vec<Expr>> {
        if exprs.is_empty() {
            return Err(ConvertError::EmptyList {
                rule: rule.to_owned(),
            });
        }
        exprs
            .into_iter()
            .map(|e| convert_expr(e, rule))
            .collect()
    };
    Ok(match expr {
        super::Expr::Name(name) => match name.as_str() {
            "@empty" => Expr::empty(),
            "." => Expr::dot(),
            "@sof" => Expr::start_of_input(),
            "@eof" => Expr::end_of_input(),
            _ => Expr::symbol(name),
        },
        super::Expr::Token { token } => Expr::literal(token),
        super::Expr::Regex { regex } => Expr::Terminal(crate::Terminal::Pattern(
            compile_regex(regex, rule)?,
        )),
        super::Expr::Symbol { symbol, attributes } => Expr::symbol_with(
            symbol,
            attributes
                .into_iter()
                .map(|(k, v)| (k, v.into_bytes()))
                .collect(),
        ),
        super::Expr::Seq { seq } => Expr::sequence(convert_all(seq)?),
        super::Expr::Choice { choice } => Expr::choice(convert_all(choice)?),
        super::Expr::Not { not } => Expr::negation(convert_expr(*not, rule)?),
        super::Expr::And { and } => Expr::ensure(convert_expr(*and, rule)?),
        super::Expr::Optional { optional } => Expr::optional(convert_expr(*optional, rule)?),
        super::Expr::Star { star } => Expr::star(convert_expr(*star, rule)?),
        super::Expr::Repeat { repeat, min } => Expr::repetition(convert_expr(*repeat, rule)?, min),
        super::Expr::Atom { atom } => {
            let mut pattern = AtomPattern::new();
            for (key, matcher) in atom {
                pattern = match matcher {
                    Matcher::Present(true) => pattern.with_key(key),
                    Matcher::Present(false) => {
                        return Err(ConvertError::FalseAtomKey {
                            rule: rule.to_owned(),
                            key,
                        })
                    }
                    Matcher::Token { token } => {
                        pattern.with(key, AttributeMatcher::Literal(Literal::new(token)))
                    }
                    Matcher::Regex { regex } => {
                        pattern.with(key, AttributeMatcher::Pattern(compile_regex(regex, rule)?))
                    }
                };
            }
            Expr::atom(pattern)
        }
    })
}

fn compile_regex(regex: String, rule: &str) -> ConvertResult<Pattern> {
    Pattern::new(&regex).map_err(|inner| ConvertError::Regex {
        rule: rule.to_owned(),
        regex,
        inner,
    })
}
