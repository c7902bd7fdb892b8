//! Flattening of rule bodies into a 'leaf-only' shape, where every child of a rule body is either
//! a terminal or a symbol.
//!
//! Every original rule `Name` is replaced by a rule `Name#0`, and every nested expression inside
//! its body is hoisted into its own rule `Name#1`, `Name#2`, etc.  For example:
//! ```text
//! r: A !(B / C) / C D
//! ```
//! becomes
//! ```text
//! r#0: r#3 / r#4
//! r#1: B#0 / C#0
//! r#2: !r#1
//! r#3: A#0 r#2
//! r#4: C#0 D#0
//! ```

use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::{Expr, Rule, Rules, Symbol};

use super::{ContractError, Transformation};

/// Normalizes a set of desugared [`Rules`].  Multiple definitions of the same name are merged
/// into one ordered choice, in the order they were defined.  The rules are returned grouped by
/// original rule (in order of first definition): first `Name#0` followed by the rules
/// synthesized from its body.
///
/// # Panics
///
/// Panics if `rules` are not desugared.
pub fn normalize(rules: &Rules) -> (Rules, Transformation) {
    if let Err(e) = super::check_desugared(rules) {
        panic!("Normalizing rules which aren't desugared: {}", e);
    }

    // Group bodies by name, in order of first definition
    let mut bodies = Vec::<(&str, Vec<Expr>)>::new();
    let mut index_by_name = HashMap::<&str, usize>::new();
    for rule in rules {
        let idx = *index_by_name.entry(rule.name.as_str()).or_insert_with(|| {
            bodies.push((rule.name.as_str(), Vec::new()));
            bodies.len() - 1
        });
        bodies[idx].1.push(rule.expr.clone());
    }

    let mut normalized = Rules::new();
    let mut transformation = Transformation::new();
    for (name, exprs) in bodies {
        let mut names = NameGen::new(name);
        let root_name = names.next_name();
        transformation.insert(name.to_owned(), root_name.clone());

        let mut synthesized = Vec::new();
        let body = normalize_expr(&Expr::choice(exprs), &mut names, &mut synthesized);
        normalized.push(Rule::new(root_name, body));
        for rule in synthesized {
            normalized.push(rule);
        }
    }
    (normalized, transformation)
}

/// Generator for the names `base#0`, `base#1`, ...  Each original rule gets its own.
struct NameGen<'n> {
    base: &'n str,
    next_id: usize,
}

impl<'n> NameGen<'n> {
    fn new(base: &'n str) -> Self {
        Self { base, next_id: 0 }
    }

    fn next_name(&mut self) -> String {
        let name = root_name_with_id(self.base, self.next_id);
        self.next_id += 1;
        name
    }
}

fn root_name_with_id(base: &str, id: usize) -> String {
    format!("{}#{}", base, id)
}

/// Rewrites `expr` so that all its children are leaves, hoisting non-leaf children into
/// `synthesized`.  Symbols are renamed to point at the root rule of their target.
fn normalize_expr(expr: &Expr, names: &mut NameGen, synthesized: &mut Vec<Rule>) -> Expr {
    match expr {
        Expr::Terminal(_) => expr.clone(),
        Expr::Symbol(s) => Expr::Symbol(Symbol {
            name: root_name_with_id(&s.name, 0),
            attributes: s.attributes.clone(),
        }),
        Expr::Star(e) => Expr::star(hoist(e, names, synthesized)),
        Expr::Negation(e) => Expr::negation(hoist(e, names, synthesized)),
        Expr::Sequence(exprs) => Expr::Sequence(
            exprs
                .iter()
                .map(|e| hoist(e, names, synthesized))
                .collect_vec(),
        ),
        Expr::Choice(exprs) => Expr::Choice(
            exprs
                .iter()
                .map(|e| hoist(e, names, synthesized))
                .collect_vec(),
        ),
        Expr::Optional(_) | Expr::Ensure(_) | Expr::Repetition { .. } => {
            unreachable!("Sugar should have been rejected before normalization")
        }
    }
}

/// Returns a leaf which matches the same input as `expr`.  Leaves are normalized in place, and
/// other expressions are replaced with a reference to a new rule.  The new rule is named after
/// all its descendants have been, so the synthesized rules come out in post-order.
fn hoist(expr: &Expr, names: &mut NameGen, synthesized: &mut Vec<Rule>) -> Expr {
    let body = normalize_expr(expr, names, synthesized);
    if expr.is_leaf() {
        return body;
    }
    let name = names.next_name();
    synthesized.push(Rule::new(name.clone(), body));
    Expr::symbol(name)
}

/// Checks that every rule body in `rules` only has leaf children, and that no name is defined
/// twice.
pub fn check_normalized(rules: &Rules) -> Result<(), ContractError> {
    let mut seen = HashSet::<&str>::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(ContractError::DuplicateRule(rule.name.clone()));
        }
        let bad_child = match &rule.expr {
            Expr::Symbol(_) | Expr::Terminal(_) => None,
            Expr::Sequence(_) | Expr::Choice(_) | Expr::Star(_) | Expr::Negation(_) => {
                rule.expr.children().iter().find(|e| !e.is_leaf())
            }
            sugar => Some(sugar),
        };
        if let Some(expr) = bad_child {
            return Err(ContractError::NotNormalized {
                rule: rule.name.clone(),
                expr: expr.to_string(),
            });
        }
    }
    Ok(())
}
