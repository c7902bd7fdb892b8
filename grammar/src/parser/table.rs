//! The dynamic-programming table at the heart of the parser.

use super::{Body, Grammar, Leaf, RuleId, Text};

/// The result of trying to match one rule at one position: whether it matched, and if so, how
/// many units of input it consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Step {
    pub matched: bool,
    pub advance: usize,
}

impl Step {
    pub const FAIL: Step = Step {
        matched: false,
        advance: 0,
    };

    pub fn matched(advance: usize) -> Self {
        Step {
            matched: true,
            advance,
        }
    }
}

/// The [`Step`] of every rule at every position `0..=len` of some input, stored row by row.
#[derive(Debug, Clone)]
pub struct StepTable {
    steps: Vec<Step>,
    num_rules: usize,
}

impl StepTable {
    /// Fills the table for `text`.  Positions are filled from the end of the input backwards, and
    /// within one position the rules are filled in reverse order.  Therefore, whenever a rule is
    /// evaluated, every position after it is complete and every rule it depends on at the same
    /// position has already been computed.
    pub fn build<T: Text + ?Sized>(grammar: &Grammar, text: &T) -> Self {
        let len = text.length();
        let num_rules = grammar.rules.len();
        let mut table = Self {
            steps: vec![Step::FAIL; (len + 1) * num_rules],
            num_rules,
        };
        for pos in (0..=len).rev() {
            for (id, rule) in grammar.rules.iter_enumerated().rev() {
                let step = table.evaluate(&rule.body, id, pos, text);
                let idx = table.index(pos, id);
                table.steps[idx] = step;
            }
        }
        log::trace!(
            "Filled step table with {} positions and {} rules",
            len + 1,
            num_rules
        );
        table
    }

    pub fn get(&self, pos: usize, id: RuleId) -> Step {
        self.steps[self.index(pos, id)]
    }

    fn index(&self, pos: usize, id: RuleId) -> usize {
        pos * self.num_rules + id.index()
    }

    /// The [`Step`] of a single leaf at `pos`
    pub(super) fn leaf_step<T: Text + ?Sized>(&self, leaf: &Leaf, pos: usize, text: &T) -> Step {
        match leaf {
            Leaf::Terminal(t) => text.accept(t, pos).map_or(Step::FAIL, Step::matched),
            Leaf::Symbol { id, .. } => self.get(pos, *id),
        }
    }

    fn evaluate<T: Text + ?Sized>(&self, body: &Body, id: RuleId, pos: usize, text: &T) -> Step {
        match body {
            Body::Leaf(leaf) => self.leaf_step(leaf, pos, text),
            Body::Star(leaf) => {
                let step = self.leaf_step(leaf, pos, text);
                if step.matched && step.advance > 0 {
                    // The rest of the repetitions are this star, starting further on
                    let rest = self.get(pos + step.advance, id);
                    Step::matched(step.advance + rest.advance)
                } else {
                    Step::matched(0)
                }
            }
            Body::Negation(leaf) => {
                if self.leaf_step(leaf, pos, text).matched {
                    Step::FAIL
                } else {
                    Step::matched(0)
                }
            }
            Body::Sequence(leaves) => {
                let mut offset = pos;
                for leaf in leaves {
                    let step = self.leaf_step(leaf, offset, text);
                    if !step.matched {
                        return Step::FAIL;
                    }
                    offset += step.advance;
                }
                Step::matched(offset - pos)
            }
            Body::Choice(leaves) => leaves
                .iter()
                .map(|leaf| self.leaf_step(leaf, pos, text))
                .find(|step| step.matched)
                .unwrap_or(Step::FAIL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Step, StepTable};
    use crate::{parser::Grammar, Expr, Rule, Rules};

    fn grammar(rules: Vec<(&str, Expr)>) -> Grammar {
        let rules: Rules = rules
            .into_iter()
            .map(|(name, expr)| Rule::new(name, expr))
            .collect();
        Grammar::compile(&rules).unwrap()
    }

    fn root_step(grammar: &Grammar, root: &str, text: &[u8]) -> Step {
        let table = StepTable::build(grammar, text);
        table.get(0, grammar.root_id(root).unwrap())
    }

    #[test]
    fn ordered_choice() {
        let ab = || Expr::literal("ab");
        let a = || Expr::literal("a");
        let g = grammar(vec![
            ("AB", Expr::Choice(vec![ab(), a()])),
            ("BA", Expr::Choice(vec![a(), ab()])),
        ]);
        assert_eq!(root_step(&g, "AB", b"ab"), Step::matched(2));
        assert_eq!(root_step(&g, "BA", b"ab"), Step::matched(1));
        assert_eq!(root_step(&g, "AB", b"b"), Step::FAIL);
    }

    #[test]
    fn zero_width_star_terminates() {
        let g = grammar(vec![
            ("A", Expr::star(Expr::negation(Expr::literal("x")))),
            (
                "B",
                Expr::star(Expr::Sequence(vec![
                    Expr::negation(Expr::literal("x")),
                    Expr::dot(),
                ])),
            ),
        ]);
        assert_eq!(root_step(&g, "A", b"yyy"), Step::matched(0));
        assert_eq!(root_step(&g, "B", b"yyxy"), Step::matched(2));
        assert_eq!(root_step(&g, "B", b"yyy"), Step::matched(3));
    }

    #[test]
    fn lookahead() {
        let g = grammar(vec![(
            "A",
            Expr::Sequence(vec![Expr::ensure(Expr::literal("ab")), Expr::dot()]),
        )]);
        assert_eq!(root_step(&g, "A", b"abc"), Step::matched(1));
        assert_eq!(root_step(&g, "A", b"acb"), Step::FAIL);
    }

    #[test]
    fn sequence_fails_on_any_element() {
        let g = grammar(vec![(
            "A",
            Expr::Sequence(vec![Expr::literal("a"), Expr::literal("b"), Expr::end_of_input()]),
        )]);
        assert_eq!(root_step(&g, "A", b"ab"), Step::matched(2));
        assert_eq!(root_step(&g, "A", b"abc"), Step::FAIL);
        assert_eq!(root_step(&g, "A", b"a"), Step::FAIL);
    }
}
