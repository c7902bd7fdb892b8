//! Computing which rules can match the empty string.

use std::collections::{HashMap, VecDeque};

use itertools::Itertools;

use crate::{analysis::check_normalized, Expr, Rules};

/// Whether each rule (by name) can match the empty string
pub type Emptiness = HashMap<String, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unknown,
    Empty,
    NonEmpty,
}

/// Determines, for every rule in a set of normalized [`Rules`], whether or not it can match the
/// empty string.
///
/// This is a fixpoint computation: every rule starts [`Unknown`](State::Unknown), and whenever a
/// rule is decided, the rules which refer to it are re-evaluated.  Rules which are still undecided
/// once nothing else changes can only be reached through themselves (e.g. `A: A "x"`), so they
/// can never match anything at all.  These are treated as non-empty.  Every such rule refers to
/// another undecided rule at the same input position, so [`order_rules`](super::order_rules)
/// always reports a cycle through it and the grammar never compiles.
///
/// # Panics
///
/// Panics if `rules` are not normalized, or refer to rules which don't exist.
pub fn compute_emptiness(rules: &Rules) -> Emptiness {
    if let Err(e) = check_normalized(rules) {
        panic!("Computing emptiness of rules which aren't normalized: {}", e);
    }
    let rules = rules.as_slice();
    let index: HashMap<&str, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.as_str(), i))
        .collect();

    // `dependents[i]` are the rules whose bodies refer to rule `i`
    let mut dependents = vec![Vec::<usize>::new(); rules.len()];
    for (i, rule) in rules.iter().enumerate() {
        for name in super::referenced_names(&rule.expr) {
            dependents[index[name]].push(i);
        }
    }

    let mut states = vec![State::Unknown; rules.len()];
    let mut queue: VecDeque<usize> = (0..rules.len()).collect();
    let mut queued = vec![true; rules.len()];
    while let Some(i) = queue.pop_front() {
        queued[i] = false;
        if states[i] != State::Unknown {
            continue;
        }
        let state = evaluate(&rules[i].expr, &states, &index);
        if state == State::Unknown {
            continue;
        }
        states[i] = state;
        for &d in &dependents[i] {
            if states[d] == State::Unknown && !queued[d] {
                queue.push_back(d);
                queued[d] = true;
            }
        }
    }

    rules
        .iter()
        .zip_eq(states)
        .map(|(rule, state)| {
            let is_empty = match state {
                State::Empty => true,
                State::NonEmpty => false,
                State::Unknown => {
                    log::warn!(
                        "Emptiness of {} is undecided, treating it as non-empty",
                        rule.name
                    );
                    false
                }
            };
            (rule.name.clone(), is_empty)
        })
        .collect()
}

/// Evaluates the emptiness of a rule body from what is known about the rules it refers to
fn evaluate(expr: &Expr, states: &[State], index: &HashMap<&str, usize>) -> State {
    let leaf_state = |leaf: &Expr| match leaf {
        Expr::Terminal(t) if t.matches_empty() => State::Empty,
        Expr::Terminal(_) => State::NonEmpty,
        Expr::Symbol(s) => states[index[s.name.as_str()]],
        _ => unreachable!("Normalized rules only have leaf children"),
    };
    match expr {
        Expr::Terminal(_) | Expr::Symbol(_) => leaf_state(expr),
        Expr::Star(_) | Expr::Negation(_) => State::Empty,
        Expr::Sequence(exprs) => {
            let children = exprs.iter().map(leaf_state).collect_vec();
            if children.contains(&State::NonEmpty) {
                State::NonEmpty
            } else if children.iter().all(|&s| s == State::Empty) {
                State::Empty
            } else {
                State::Unknown
            }
        }
        Expr::Choice(exprs) => {
            let children = exprs.iter().map(leaf_state).collect_vec();
            if children.contains(&State::Empty) {
                State::Empty
            } else if children.iter().all(|&s| s == State::NonEmpty) {
                State::NonEmpty
            } else {
                State::Unknown
            }
        }
        Expr::Optional(_) | Expr::Ensure(_) | Expr::Repetition { .. } => {
            unreachable!("Normalized rules are desugared")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::compute_emptiness;
    use crate::{
        analysis::{desugar_rules, normalize},
        parser::{order_rules, CycleError},
        Expr, Rule, Rules,
    };

    /// Normalizes `rules`, then checks the emptiness of each original rule
    fn check(rules: Vec<(&str, Expr)>, expected: &[(&str, bool)]) {
        let rules: Rules = rules
            .into_iter()
            .map(|(name, expr)| Rule::new(name, expr))
            .collect();
        let (normalized, transformation) = normalize(&desugar_rules(&rules));
        let emptiness = compute_emptiness(&normalized);
        for &(name, is_empty) in expected {
            let normalized_name = transformation.forward(name).unwrap();
            assert_eq!(emptiness[normalized_name], is_empty, "emptiness of {}", name);
        }
    }

    #[test]
    fn one_or_more() {
        check(
            vec![("A", Expr::repetition(Expr::literal("a"), 1))],
            &[("A", false)],
        );
    }

    #[test]
    fn sequence_is_dominated_by_non_empty_element() {
        check(
            vec![("A", Expr::Sequence(vec![Expr::empty(), Expr::literal("a")]))],
            &[("A", false)],
        );
    }

    #[test]
    fn choice_with_empty_branch() {
        check(
            vec![("A", Expr::Choice(vec![Expr::empty(), Expr::literal("a")]))],
            &[("A", true)],
        );
    }

    #[test]
    fn terminals() {
        check(
            vec![
                ("Dot", Expr::dot()),
                ("Sof", Expr::start_of_input()),
                ("Eof", Expr::end_of_input()),
                ("Lit", Expr::literal("")),
                ("Star", Expr::pattern("[a-z]*").unwrap()),
                ("Plus", Expr::pattern("[a-z]+").unwrap()),
                ("Not", Expr::negation(Expr::dot())),
            ],
            &[
                ("Dot", false),
                ("Sof", true),
                ("Eof", true),
                ("Lit", true),
                ("Star", true),
                ("Plus", false),
                ("Not", true),
            ],
        );
    }

    #[test]
    fn chain() {
        check(
            vec![
                ("A", Expr::symbol("B")),
                ("B", Expr::symbol("C")),
                ("C", Expr::symbol("D")),
                ("D", Expr::symbol("E")),
                ("E", Expr::empty()),
            ],
            &[("A", true), ("B", true), ("C", true), ("D", true), ("E", true)],
        );
    }

    #[test]
    fn propagates_through_sequences() {
        check(
            vec![
                ("A", Expr::Sequence(vec![Expr::symbol("B"), Expr::symbol("C")])),
                ("B", Expr::optional(Expr::literal("b"))),
                ("C", Expr::Choice(vec![Expr::symbol("B"), Expr::literal("c")])),
                ("D", Expr::Sequence(vec![Expr::symbol("A"), Expr::symbol("E")])),
                ("E", Expr::dot()),
            ],
            &[("A", true), ("B", true), ("C", true), ("D", false), ("E", false)],
        );
    }

    #[test]
    fn undecidable_rules_are_non_empty() {
        check(
            vec![
                ("A", Expr::repetition(Expr::symbol("A"), 1)),
                ("B", Expr::Choice(vec![Expr::symbol("B"), Expr::symbol("A")])),
            ],
            &[("A", false), ("B", false)],
        );
    }

    #[test]
    fn undecidable_rules_form_a_cycle() {
        let rules: Rules = vec![
            Rule::new("A", Expr::repetition(Expr::symbol("A"), 1)),
            Rule::new("B", Expr::Choice(vec![Expr::symbol("B"), Expr::symbol("A")])),
            Rule::new("C", Expr::Sequence(vec![Expr::empty(), Expr::symbol("C")])),
        ]
        .into();
        let (normalized, transformation) = normalize(&desugar_rules(&rules));
        let emptiness = compute_emptiness(&normalized);
        for name in ["A", "B", "C"].iter() {
            let normalized_name = transformation.forward(name).unwrap();
            assert!(!emptiness[normalized_name], "emptiness of {}", name);
        }
        assert!(matches!(
            order_rules(&normalized, &emptiness),
            Err(CycleError::RuleCycle(_))
        ));
    }
}
