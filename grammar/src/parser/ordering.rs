//! Ordering rules so that every rule comes before the rules it depends on.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
};

use itertools::Itertools;

use crate::{analysis::check_normalized, Expr, Rules};

use super::Emptiness;

/// Errors generated when the rule dependency graph contains a cycle, i.e. a rule which can reach
/// itself without consuming any input (left recursion).
#[derive(Debug, Clone, PartialEq)]
pub enum CycleError {
    /// A cycle found while sorting.  The first and last names are the same.
    RuleCycle(Vec<String>),
    /// The dependency `from -> to` points backwards in the final order
    ResidualCycle { from: String, to: String },
}

impl Display for CycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::RuleCycle(names) => write!(f, "rule cycle: {}", names.join(" -> ")),
            CycleError::ResidualCycle { from, to } => {
                write!(f, "rule {} depends on {}, which is ordered before it", from, to)
            }
        }
    }
}

impl std::error::Error for CycleError {}

/// A topological order of some rules.  A rule's dependencies always have greater positions than
/// the rule itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub sequence: Vec<String>,
    pub positions: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    Unvisited,
    /// On the DFS stack
    Entered,
    Exited,
}

/// Sorts a set of normalized [`Rules`] so that every rule appears before all the rules which it
/// needs to be evaluated at the same input position.  Fails if these dependencies contain a
/// cycle.
///
/// # Panics
///
/// Panics if `rules` are not normalized, or `emptiness` has no entry for one of the rules.
pub fn order_rules(rules: &Rules, emptiness: &Emptiness) -> Result<Ordering, CycleError> {
    if let Err(e) = check_normalized(rules) {
        panic!("Ordering rules which aren't normalized: {}", e);
    }
    let rules = rules.as_slice();
    let index: HashMap<&str, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.as_str(), i))
        .collect();
    let edges = rules
        .iter()
        .map(|rule| {
            dependencies(&rule.expr, emptiness)
                .into_iter()
                .map(|name| index[name])
                .collect_vec()
        })
        .collect_vec();

    let mut colours = vec![Colour::Unvisited; rules.len()];
    let mut stack = Vec::<usize>::new();
    let mut post_order = Vec::<usize>::with_capacity(rules.len());
    for id in 0..rules.len() {
        visit(id, &edges, &mut colours, &mut stack, &mut post_order).map_err(|cycle| {
            CycleError::RuleCycle(cycle.into_iter().map(|i| rules[i].name.clone()).collect())
        })?;
        debug_assert!(stack.is_empty());
    }

    // Post-order puts dependencies first, so reverse it
    let sequence = post_order
        .into_iter()
        .rev()
        .map(|i| rules[i].name.clone())
        .collect_vec();
    let positions: HashMap<String, usize> = sequence
        .iter()
        .enumerate()
        .map(|(pos, name)| (name.clone(), pos))
        .collect();

    for (from, deps) in edges.iter().enumerate() {
        let from_name = &rules[from].name;
        for &to in deps {
            let to_name = &rules[to].name;
            if positions[to_name] <= positions[from_name] {
                return Err(CycleError::ResidualCycle {
                    from: from_name.clone(),
                    to: to_name.clone(),
                });
            }
        }
    }

    log::trace!("Rule order: {}", sequence.iter().join(", "));
    Ok(Ordering {
        sequence,
        positions,
    })
}

/// Depth-first search from `id`, pushing every rule to `post_order` after all of its
/// dependencies.  If a cycle is found, the rules on it are returned (starting and ending with the
/// same rule).
fn visit(
    id: usize,
    edges: &[Vec<usize>],
    colours: &mut [Colour],
    stack: &mut Vec<usize>,
    post_order: &mut Vec<usize>,
) -> Result<(), Vec<usize>> {
    match colours[id] {
        Colour::Exited => return Ok(()),
        Colour::Entered => {
            // `Entered` rules are always on the stack, so `stack[idx..] + id` forms the cycle
            let idx = stack.iter().position(|&i| i == id).unwrap_or(0);
            return Err(stack[idx..]
                .iter()
                .copied()
                .chain(std::iter::once(id))
                .collect_vec());
        }
        Colour::Unvisited => {}
    }

    colours[id] = Colour::Entered;
    stack.push(id);
    for &dep in &edges[id] {
        visit(dep, edges, colours, stack, post_order)?;
    }
    assert_eq!(stack.pop(), Some(id));
    colours[id] = Colour::Exited;
    post_order.push(id);
    Ok(())
}

/// The rules which must be evaluated before `expr` at the same position.  For sequences, only the
/// elements up to (and including) the first one which can't match the empty string matter: any
/// later element is evaluated strictly further into the input.
fn dependencies<'r>(expr: &'r Expr, emptiness: &Emptiness) -> Vec<&'r str> {
    match expr {
        Expr::Sequence(exprs) => {
            let mut deps = Vec::new();
            for e in exprs {
                let can_be_empty = match e {
                    Expr::Symbol(s) => {
                        deps.push(s.name.as_str());
                        emptiness[&s.name]
                    }
                    Expr::Terminal(t) => t.matches_empty(),
                    _ => unreachable!("Normalized rules only have leaf children"),
                };
                if !can_be_empty {
                    break;
                }
            }
            deps
        }
        _ => super::referenced_names(expr),
    }
}

#[cfg(test)]
mod tests {
    use super::{order_rules, CycleError, Ordering};
    use crate::{
        analysis::{desugar_rules, normalize},
        parser::{compute_emptiness, tests::arithmetic},
        Expr, Rule, Rules,
    };

    fn order(rules: Vec<(&str, Expr)>) -> Result<Ordering, CycleError> {
        order_normalized(
            &rules
                .into_iter()
                .map(|(name, expr)| Rule::new(name, expr))
                .collect(),
        )
    }

    fn order_normalized(rules: &Rules) -> Result<Ordering, CycleError> {
        let (normalized, _) = normalize(&desugar_rules(rules));
        let emptiness = compute_emptiness(&normalized);
        order_rules(&normalized, &emptiness)
    }

    #[test]
    fn arithmetic_is_ordered_by_dependency() {
        let ordering = order_normalized(&arithmetic()).unwrap();
        let position = |name: &str| ordering.positions[&format!("{}#0", name)];
        assert!(position("Expr") < position("Sum"));
        assert!(position("Sum") < position("Product"));
        assert!(position("Product") < position("Value"));
        assert!(position("Value") < position("Digit"));
        for (pos, name) in ordering.sequence.iter().enumerate() {
            assert_eq!(ordering.positions[name], pos);
        }
    }

    #[test]
    fn right_recursion_is_allowed() {
        let ordering = order(vec![
            ("A", Expr::Sequence(vec![Expr::symbol("B"), Expr::symbol("A")])),
            ("B", Expr::literal("hello")),
        ])
        .unwrap();
        assert!(ordering.positions["A#0"] < ordering.positions["B#0"]);
    }

    #[test]
    fn left_recursion_is_a_cycle() {
        let result = order(vec![(
            "A",
            Expr::Choice(vec![
                Expr::Sequence(vec![Expr::symbol("A"), Expr::literal("x")]),
                Expr::literal("y"),
            ]),
        )]);
        // A#0: A#1 / "y"
        // A#1: A#0 "x"
        assert_eq!(
            result,
            Err(CycleError::RuleCycle(vec![
                "A#0".to_owned(),
                "A#1".to_owned(),
                "A#0".to_owned()
            ]))
        );
    }

    #[test]
    fn left_recursion_through_empty_prefix() {
        let result = order(vec![(
            "A",
            Expr::Sequence(vec![Expr::optional(Expr::literal("b")), Expr::symbol("A")]),
        )]);
        assert!(matches!(result, Err(CycleError::RuleCycle(_))));
    }

    #[test]
    fn indirect_recursion() {
        let result = order(vec![
            ("A", Expr::Sequence(vec![Expr::symbol("B"), Expr::literal("a")])),
            ("B", Expr::Choice(vec![Expr::symbol("A"), Expr::literal("b")])),
        ]);
        assert_eq!(
            result,
            Err(CycleError::RuleCycle(vec![
                "A#0".to_owned(),
                "B#0".to_owned(),
                "A#0".to_owned()
            ]))
        );
    }

    #[test]
    fn non_empty_terminal_stops_sequence() {
        // `A` is only reached after consuming "(", so this is not left recursion
        order(vec![(
            "A",
            Expr::Choice(vec![
                Expr::Sequence(vec![Expr::literal("("), Expr::symbol("A"), Expr::literal(")")]),
                Expr::literal("x"),
            ]),
        )])
        .unwrap();
    }
}
