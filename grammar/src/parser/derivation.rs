//! Replaying a filled [`StepTable`] into a tree, and folding that tree back into the names of the
//! original rules.

use std::sync::Arc;

use itertools::Itertools;

use crate::{analysis::Transformation, analyze_symbol_name, Atom, Attributes, ParsingNode, Segment};

use super::{table::StepTable, Body, Error, Grammar, Leaf, RuleId, Text};

/// A node of the derivation tree, labelled by a normalized rule.  `children` are indices into the
/// [`Derivation`] which owns this node.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct DerivationNode {
    pub id: RuleId,
    pub attributes: Attributes,
    pub segment: Segment,
    pub children: Vec<usize>,
}

/// A derivation tree, stored as a flat arena so that deep trees need no recursion to build, fold
/// or drop.  The root is `nodes[0]`, and every node comes before all of its children.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Derivation {
    pub nodes: Vec<DerivationNode>,
}

/// Builds the derivation tree for rule `root` matched at the start of `text`.  Every symbol
/// reference which took part in the match becomes a node.
pub(super) fn derive<T: Text + ?Sized>(
    grammar: &Grammar,
    table: &StepTable,
    text: &T,
    root: RuleId,
) -> Result<Derivation, Error> {
    let step = table.get(0, root);
    log::trace!("Root matched: {}, advance {}", step.matched, step.advance);
    if !step.matched {
        return Err(Error::NoMatch);
    }
    let deriver = Deriver {
        grammar,
        table,
        text,
    };
    let mut nodes = vec![DerivationNode {
        id: root,
        attributes: Attributes::new(),
        segment: Segment::new(0, step.advance),
        children: Vec::new(),
    }];
    // Nodes whose children haven't been derived yet
    let mut pending = vec![0];
    while let Some(idx) = pending.pop() {
        let (id, pos) = (nodes[idx].id, nodes[idx].segment.start);
        for (child_id, attributes, child_pos) in deriver.symbols_used(id, pos) {
            let step = table.get(child_pos, child_id);
            let child_idx = nodes.len();
            nodes.push(DerivationNode {
                id: child_id,
                attributes: attributes.clone(),
                segment: Segment::new(child_pos, child_pos + step.advance),
                children: Vec::new(),
            });
            nodes[idx].children.push(child_idx);
            pending.push(child_idx);
        }
    }
    Ok(Derivation { nodes })
}

struct Deriver<'a, T: ?Sized> {
    grammar: &'a Grammar,
    table: &'a StepTable,
    text: &'a T,
}

impl<'a, T: Text + ?Sized> Deriver<'a, T> {
    /// The symbol references (with the positions they matched at) used by the body of rule `id`,
    /// which must have matched at `pos`.  Terminals and negations leave no trace in the tree.
    fn symbols_used(&self, id: RuleId, pos: usize) -> Vec<(RuleId, &'a Attributes, usize)> {
        let mut used = Vec::new();
        let mut push = |leaf: &'a Leaf, pos: usize| {
            if let Leaf::Symbol { id, attributes } = leaf {
                used.push((*id, attributes, pos));
            }
        };
        match &self.grammar.rules[id].body {
            Body::Leaf(leaf) => push(leaf, pos),
            Body::Negation(_) => {}
            Body::Star(leaf) => {
                let mut offset = pos;
                loop {
                    let step = self.step(leaf, offset);
                    if !step.matched || step.advance == 0 {
                        break;
                    }
                    push(leaf, offset);
                    offset += step.advance;
                }
            }
            Body::Sequence(leaves) => {
                let mut offset = pos;
                for leaf in leaves {
                    let step = self.step(leaf, offset);
                    debug_assert!(step.matched);
                    push(leaf, offset);
                    offset += step.advance;
                }
            }
            Body::Choice(leaves) => {
                if let Some(leaf) = leaves.iter().find(|l| self.step(l, pos).matched) {
                    push(leaf, pos);
                }
            }
        }
        used
    }

    fn step(&self, leaf: &Leaf, pos: usize) -> super::table::Step {
        self.table.leaf_step(leaf, pos, self.text)
    }
}

/// Folds a derivation tree back into the original rule names.  Nodes of rules which map back to
/// a non-hidden original rule are relabelled and kept; all others are replaced by their (folded)
/// children.
pub(super) fn fold<T: Text + ?Sized>(
    derivation: Derivation,
    grammar: &Grammar,
    text: &T,
    source: &Arc<[u8]>,
) -> Vec<ParsingNode> {
    // `folded[i]` holds what node `i` folded into.  Children always come after their parents, so
    // walking backwards folds every child before its parent needs it.
    let mut folded: Vec<Vec<ParsingNode>> = (0..derivation.nodes.len())
        .map(|_| Vec::new())
        .collect_vec();
    for (idx, node) in derivation.nodes.into_iter().enumerate().rev() {
        let DerivationNode {
            id,
            attributes,
            segment,
            children,
        } = node;
        let mut folded_children = Vec::new();
        for child in children {
            folded_children.append(&mut folded[child]);
        }
        folded[idx] = match original_name(&grammar.transformation, &grammar.rules[id].name) {
            Some(name) => {
                let atom = Atom::new(name, attributes, source.clone(), text.selector(segment));
                vec![ParsingNode::new(atom, segment, folded_children)]
            }
            None => folded_children,
        };
    }
    folded.into_iter().next().unwrap_or_default()
}

/// The name which a node of normalized rule `normalized` should have in the final tree, or
/// `None` if it should be spliced into its parent
fn original_name<'t>(transformation: &'t Transformation, normalized: &str) -> Option<&'t str> {
    let original = transformation.backward(normalized)?;
    let (base, hidden) = analyze_symbol_name(original);
    (!hidden).then(|| base)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{derive, fold, Derivation};
    use crate::{
        parser::{table::StepTable, tests::arithmetic, Error, Grammar},
        Expr, Rule, Rules,
    };

    fn derivation(grammar: &Grammar, root: &str, text: &[u8]) -> Result<Derivation, Error> {
        let table = StepTable::build(grammar, text);
        derive(grammar, &table, text, grammar.root_id(root).unwrap())
    }

    /// Renders the subtree under node `idx` as `Name(children..)`, using normalized names
    fn render(grammar: &Grammar, tree: &Derivation, idx: usize) -> String {
        let node = &tree.nodes[idx];
        let name = &grammar.rule(node.id).name;
        if node.children.is_empty() {
            return name.clone();
        }
        let children: Vec<String> = node
            .children
            .iter()
            .map(|&c| render(grammar, tree, c))
            .collect();
        format!("{}({})", name, children.join(" "))
    }

    #[test]
    fn derivation_uses_normalized_names() {
        let rules: Rules = vec![
            Rule::new(
                "List",
                Expr::Sequence(vec![
                    Expr::symbol("Item"),
                    Expr::star(Expr::Sequence(vec![Expr::literal(","), Expr::symbol("Item")])),
                ]),
            ),
            Rule::new("Item", Expr::pattern("[a-z]").unwrap()),
        ]
        .into();
        let grammar = Grammar::compile(&rules).unwrap();
        let tree = derivation(&grammar, "List", b"a,b,c").unwrap();
        assert_eq!(
            render(&grammar, &tree, 0),
            "List#0(Item#0 List#2(List#1(Item#0) List#1(Item#0)))"
        );
        assert_eq!(tree.nodes[0].segment.len(), 5);
        for (idx, node) in tree.nodes.iter().enumerate() {
            assert!(node.children.iter().all(|&c| c > idx));
        }

        let source: Arc<[u8]> = Arc::from(&b"a,b,c"[..]);
        let text: &[u8] = b"a,b,c";
        let folded = fold(tree, &grammar, text, &source);
        assert_eq!(folded.len(), 1);
        let list = &folded[0];
        assert_eq!(list.symbol(), "List");
        let items = list.children().iter().map(|c| c.text_str()).collect::<Vec<_>>();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn no_match() {
        let grammar = Grammar::compile(&arithmetic()).unwrap();
        assert!(matches!(
            derivation(&grammar, "Expr", b"+1"),
            Err(Error::NoMatch)
        ));
    }
}
