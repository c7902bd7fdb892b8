//! Code to parse input (bytes or atoms) into [`ParsingNode`] trees.
//!
//! Parsing is done in two phases:
//! 1. Compiling a set of [`Rules`] into a [`Grammar`].  This runs every stage of the
//!    [`analysis`](crate::analysis) pipeline, then computes which rules can match the empty
//!    string ([`compute_emptiness`]) and sorts the rules so that no rule depends on a rule before
//!    it at the same input position ([`order_rules`]).  Left-recursive grammars are rejected here.
//! 2. Parsing input with that [`Grammar`].  For every position and every rule, a
//!    [`StepTable`](table::StepTable) stores whether that rule matches there (and how far it
//!    advances).  Since PEG choice is ordered, there is only ever one answer per cell, so the
//!    table is filled in `O(input length * rule count)` time.  The table is then replayed from the
//!    root rule into a derivation tree, which is finally folded back into the names of the
//!    original rules.

mod derivation;
mod emptiness;
mod ordering;
mod table;
mod text;

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
};

use index_vec::IndexVec;
use itertools::Itertools;

use crate::{
    analysis::{
        check_consistency, check_normalized, desugar_rules, normalize, Alphabet,
        ConsistencyError, Transformation,
    },
    Atom, Attributes, Expr, ParsingNode, Rules, Terminal,
};

pub use emptiness::{compute_emptiness, Emptiness};
pub use ordering::{order_rules, CycleError, Ordering};
pub use table::{Step, StepTable};
pub use text::Text;

index_vec::define_index_type! { pub struct RuleId = usize; }

pub type RuleVec<T> = IndexVec<RuleId, T>;

pub type GrammarResult<T> = Result<T, GrammarError>;
pub type ParseResult<T> = Result<T, Error>;

////////////
// ERRORS //
////////////

/// The ways that compiling a [`Grammar`] can fail
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarError {
    Consistency(ConsistencyError),
    Cycle(CycleError),
    /// The requested root rule doesn't exist
    UnknownRoot(String),
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarError::Consistency(e) => write!(f, "{}", e),
            GrammarError::Cycle(e) => write!(f, "{}", e),
            GrammarError::UnknownRoot(name) => write!(f, "unknown root rule {}", name),
        }
    }
}

impl std::error::Error for GrammarError {}

impl From<ConsistencyError> for GrammarError {
    fn from(e: ConsistencyError) -> Self {
        GrammarError::Consistency(e)
    }
}

impl From<CycleError> for GrammarError {
    fn from(e: CycleError) -> Self {
        GrammarError::Cycle(e)
    }
}

/// The ways that parsing some input can fail
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Grammar(GrammarError),
    /// The input is bytes but the grammar matches atoms, or vice versa
    IncompatibleAlphabet { expected: Alphabet, found: Alphabet },
    /// The root rule doesn't match at the start of the input
    NoMatch,
    /// Folding the derivation tree didn't leave exactly one root.  This happens if the root rule
    /// is hidden.
    MultipleRoots(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Grammar(e) => write!(f, "{}", e),
            Error::IncompatibleAlphabet { expected, found } => write!(
                f,
                "grammar matches {}s but the input is made of {}s",
                expected, found
            ),
            Error::NoMatch => write!(f, "text did not match"),
            Error::MultipleRoots(count) => {
                write!(f, "parse tree has {} roots instead of one", count)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<GrammarError> for Error {
    fn from(e: GrammarError) -> Self {
        Error::Grammar(e)
    }
}

/////////////
// GRAMMAR //
/////////////

/// A set of [`Rules`] which have been checked, normalized and ordered, ready for parsing.  A
/// `Grammar` is immutable, so can be shared between any number of parses.
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Normalized rules, in dependency order
    rules: RuleVec<CompiledRule>,
    ids: HashMap<String, RuleId>,
    alphabet: Alphabet,
    transformation: Transformation,
}

/// A normalized rule, with symbol references resolved to [`RuleId`]s
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub name: String,
    pub body: Body,
}

/// The body of a normalized rule.  Every child is a [`Leaf`].
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Leaf(Leaf),
    Star(Leaf),
    Negation(Leaf),
    Sequence(Vec<Leaf>),
    Choice(Vec<Leaf>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Terminal(Terminal),
    Symbol { id: RuleId, attributes: Attributes },
}

impl Grammar {
    /// Checks, desugars, normalizes and orders `rules`.  Fails if `rules` are inconsistent or
    /// left-recursive.
    pub fn compile(rules: &Rules) -> GrammarResult<Self> {
        let alphabet = check_consistency(rules)?;
        let desugared = desugar_rules(rules);
        let (normalized, transformation) = normalize(&desugared);
        if let Err(e) = check_normalized(&normalized) {
            panic!("Normalization produced invalid rules: {}", e);
        }
        let emptiness = compute_emptiness(&normalized);
        let ordering = order_rules(&normalized, &emptiness)?;

        let ids: HashMap<String, RuleId> = ordering
            .sequence
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), RuleId::new(idx)))
            .collect();
        let bodies: HashMap<&str, &Expr> = normalized
            .iter()
            .map(|r| (r.name.as_str(), &r.expr))
            .collect();
        let rules: RuleVec<CompiledRule> = ordering
            .sequence
            .iter()
            .map(|name| CompiledRule {
                name: name.clone(),
                body: compile_body(bodies[name.as_str()], &ids),
            })
            .collect();

        log::debug!(
            "Compiled {} rules into {} normalized rules over the {} alphabet",
            transformation.len(),
            rules.len(),
            alphabet
        );
        Ok(Self {
            rules,
            ids,
            alphabet,
            transformation,
        })
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    /// The normalized rules, in dependency order
    pub fn rules(&self) -> &RuleVec<CompiledRule> {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> &CompiledRule {
        &self.rules[id]
    }

    /// The [`RuleId`] of the normalized rule which replaced the original rule called `root`
    pub fn root_id(&self, root: &str) -> GrammarResult<RuleId> {
        self.transformation
            .forward(root)
            .and_then(|name| self.ids.get(name))
            .copied()
            .ok_or_else(|| GrammarError::UnknownRoot(root.to_owned()))
    }

    pub fn parse_bytes(&self, root: &str, text: &[u8]) -> ParseResult<ParsingNode> {
        self.parse(root, text)
    }

    pub fn parse_atoms(&self, root: &str, atoms: &[Atom]) -> ParseResult<ParsingNode> {
        self.parse(root, atoms)
    }

    /// Parses `text`, starting with the rule originally called `root`.  The root only has to match
    /// a prefix of `text`; callers who need the whole input to match should compare the length of
    /// the returned node's segment to the input length.
    pub fn parse<T: Text + ?Sized>(&self, root: &str, text: &T) -> ParseResult<ParsingNode> {
        if !self.alphabet.accepts(T::ALPHABET) {
            return Err(Error::IncompatibleAlphabet {
                expected: self.alphabet,
                found: T::ALPHABET,
            });
        }
        let root_id = self.root_id(root)?;
        let table = StepTable::build(self, text);
        let tree = derivation::derive(self, &table, text, root_id)?;
        let mut roots = derivation::fold(tree, self, text, &text.source());
        match roots.len() {
            1 => Ok(roots.remove(0)),
            n => Err(Error::MultipleRoots(n)),
        }
    }
}

/// Compiles [`Rules`] and parses `text` with them.  To parse many inputs, use
/// [`Grammar::compile`] once and then [`Grammar::parse_bytes`].
pub fn parse_bytes(rules: &Rules, root: &str, text: &[u8]) -> ParseResult<ParsingNode> {
    Grammar::compile(rules)?.parse_bytes(root, text)
}

/// Compiles [`Rules`] and parses `atoms` with them.  To parse many inputs, use
/// [`Grammar::compile`] once and then [`Grammar::parse_atoms`].
pub fn parse_atoms(rules: &Rules, root: &str, atoms: &[Atom]) -> ParseResult<ParsingNode> {
    Grammar::compile(rules)?.parse_atoms(root, atoms)
}

fn compile_body(expr: &Expr, ids: &HashMap<String, RuleId>) -> Body {
    let leaf = |e: &Expr| match e {
        Expr::Terminal(t) => Leaf::Terminal(t.clone()),
        Expr::Symbol(s) => Leaf::Symbol {
            id: ids[&s.name],
            attributes: s.attributes.clone(),
        },
        _ => unreachable!("Normalized rules only have leaf children"),
    };
    match expr {
        Expr::Terminal(_) | Expr::Symbol(_) => Body::Leaf(leaf(expr)),
        Expr::Star(e) => Body::Star(leaf(e)),
        Expr::Negation(e) => Body::Negation(leaf(e)),
        Expr::Sequence(exprs) => Body::Sequence(exprs.iter().map(leaf).collect_vec()),
        Expr::Choice(exprs) => Body::Choice(exprs.iter().map(leaf).collect_vec()),
        Expr::Optional(_) | Expr::Ensure(_) | Expr::Repetition { .. } => {
            unreachable!("Normalized rules are desugared")
        }
    }
}

/// The names of every symbol in a normalized rule body
fn referenced_names(expr: &Expr) -> Vec<&str> {
    std::iter::once(expr)
        .chain(expr.children())
        .filter_map(|e| match e {
            Expr::Symbol(s) => Some(s.name.as_str()),
            _ => None,
        })
        .collect_vec()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::{parse_atoms, parse_bytes, Error, Grammar, GrammarError};
    use crate::{
        analysis::{Alphabet, ConsistencyError},
        Atom, AtomPattern, Attributes, Expr, ParsingNode, Rule, Rules, Segment, Segments, Visit,
    };

    fn lit(s: &str) -> Expr {
        Expr::literal(s)
    }

    fn sym(name: &str) -> Expr {
        Expr::symbol(name)
    }

    /// ```text
    /// Digit: [0-9]
    /// Value: Digit+ / "(" Expr ")"
    /// Product: Value (("*" / "/") Value)*
    /// Sum: Product (("+" / "-") Product)*
    /// Expr: Sum
    /// ```
    pub(crate) fn arithmetic() -> Rules {
        let binary = |operand: &str, ops: [&str; 2]| {
            Expr::Sequence(vec![
                sym(operand),
                Expr::star(Expr::Sequence(vec![
                    Expr::Choice(vec![lit(ops[0]), lit(ops[1])]),
                    sym(operand),
                ])),
            ])
        };
        vec![
            Rule::new("Digit", Expr::pattern("[0-9]").unwrap()),
            Rule::new(
                "Value",
                Expr::Choice(vec![
                    Expr::repetition(sym("Digit"), 1),
                    Expr::Sequence(vec![lit("("), sym("Expr"), lit(")")]),
                ]),
            ),
            Rule::new("Product", binary("Value", ["*", "/"])),
            Rule::new("Sum", binary("Product", ["+", "-"])),
            Rule::new("Expr", sym("Sum")),
        ]
        .into()
    }

    fn check_full_match(rules: &Rules, text: &str) -> ParsingNode {
        let tree = parse_bytes(rules, "Expr", text.as_bytes()).unwrap();
        assert_eq!(tree.segment, Segment::new(0, text.len()), "parsing {:?}", text);
        tree
    }

    #[test]
    fn arithmetic_spans() {
        let rules = arithmetic();
        check_full_match(&rules, "10+2");
        check_full_match(&rules, "1+(2*4-5)-10*44");
        check_full_match(&rules, "((7))");
        // Only a prefix matches
        let tree = parse_bytes(&rules, "Expr", b"1+2)").unwrap();
        assert_eq!(tree.segment.len(), 3);
    }

    #[test]
    fn folded_tree() {
        let tree = check_full_match(&arithmetic(), "10+2");
        assert_eq!(
            tree.to_string(),
            "Expr[0..4): \"10+2\"
  Sum[0..4): \"10+2\"
    Product[0..2): \"10\"
      Value[0..2): \"10\"
        Digit[0..1): \"1\"
        Digit[1..2): \"0\"
    Product[3..4): \"2\"
      Value[3..4): \"2\"
        Digit[3..4): \"2\"
"
        );
        // No synthesized or hidden names survive folding
        tree.traverse(&mut |n: &ParsingNode| {
            assert!(!n.symbol().contains('#'), "{}", n.symbol());
            crate::Visit::Descend
        });
    }

    #[test]
    fn hidden_rules_are_spliced() {
        let rules: Rules = vec![
            Rule::new("List", Expr::repetition(sym("#Item"), 1)),
            Rule::new(
                "#Item",
                Expr::Choice(vec![sym("Word"), sym("#Space")]),
            ),
            Rule::new("Word", Expr::pattern("[a-z]+").unwrap()),
            Rule::new("#Space", lit(" ")),
        ]
        .into();
        let tree = parse_bytes(&rules, "List", b"ab cd").unwrap();
        let children = tree
            .children()
            .iter()
            .map(|c| format!("{}:{}", c.symbol(), c.text_str()))
            .collect::<Vec<_>>();
        assert_eq!(children, vec!["Word:ab", "Word:cd"]);

        // A hidden root can fold into any number of nodes
        assert_eq!(
            parse_bytes(&rules, "#Item", b"  ").unwrap_err(),
            Error::MultipleRoots(0)
        );
    }

    #[test]
    fn deep_right_recursion() {
        // List: "a" List / @empty
        let rules: Rules = vec![Rule::new(
            "List",
            Expr::Choice(vec![Expr::Sequence(vec![lit("a"), sym("List")]), Expr::empty()]),
        )]
        .into();
        let len = 200_000;
        let tree = parse_bytes(&rules, "List", &vec![b'a'; len]).unwrap();
        assert_eq!(tree.segment, Segment::new(0, len));

        let mut lists = 0;
        tree.traverse(&mut |node: &ParsingNode| {
            assert_eq!(node.symbol(), "List");
            lists += 1;
            Visit::Descend
        });
        assert_eq!(lists, len + 1);
    }

    #[test]
    fn symbol_attributes_reach_nodes() {
        let mut attributes = Attributes::new();
        attributes.insert("role".to_owned(), b"lhs".to_vec());
        let rules: Rules = vec![
            Rule::new(
                "Assign",
                Expr::Sequence(vec![
                    Expr::symbol_with("Name", attributes),
                    lit("="),
                    sym("Name"),
                ]),
            ),
            Rule::new("Name", Expr::pattern("[a-z]+").unwrap()),
        ]
        .into();
        let tree = parse_bytes(&rules, "Assign", b"x=y").unwrap();
        assert_eq!(tree.children()[0].atom.attributes["role"], b"lhs".to_vec());
        assert!(tree.children()[1].atom.attributes.is_empty());
    }

    #[test]
    fn grammar_errors() {
        let undefined: Rules = vec![Rule::new("A", sym("B"))].into();
        assert_eq!(
            parse_bytes(&undefined, "A", b"").unwrap_err(),
            Error::Grammar(GrammarError::Consistency(ConsistencyError::UndefinedRule {
                name: "B".to_owned()
            }))
        );

        let left_recursive: Rules =
            vec![Rule::new("A", Expr::Sequence(vec![sym("A"), lit("x")]))].into();
        assert!(matches!(
            Grammar::compile(&left_recursive),
            Err(GrammarError::Cycle(_))
        ));

        let grammar = Grammar::compile(&arithmetic()).unwrap();
        assert_eq!(
            grammar.parse_bytes("Nope", b"1").unwrap_err(),
            Error::Grammar(GrammarError::UnknownRoot("Nope".to_owned()))
        );
        assert_eq!(grammar.parse_bytes("Expr", b"x").unwrap_err(), Error::NoMatch);
    }

    #[test]
    fn alphabet_must_fit_input() {
        let grammar = Grammar::compile(&arithmetic()).unwrap();
        assert_eq!(grammar.alphabet(), Alphabet::Byte);
        assert_eq!(
            grammar.parse_atoms("Expr", &[]).unwrap_err(),
            Error::IncompatibleAlphabet {
                expected: Alphabet::Byte,
                found: Alphabet::Atom
            }
        );

        // Grammars over `Any` accept both
        let any: Rules = vec![Rule::new("A", Expr::star(Expr::dot()))].into();
        assert_eq!(parse_bytes(&any, "A", b"abc").unwrap().segment.len(), 3);
        assert_eq!(parse_atoms(&any, "A", &[]).unwrap().segment.len(), 0);
    }

    #[test]
    fn atoms() {
        let source: Arc<[u8]> = Arc::from(&b"let x = 1"[..]);
        let atom = |symbol: &str, start: usize, end: usize| {
            Atom::new(
                symbol,
                Attributes::new(),
                source.clone(),
                Segments::single(Segment::new(start, end)),
            )
        };
        let atoms = vec![
            atom("Word", 0, 3),
            atom("Word", 4, 5),
            atom("Op", 6, 7),
            atom("Number", 8, 9),
        ];
        let word = |w: &str| {
            Expr::atom(AtomPattern::new().with(
                "Word",
                crate::AttributeMatcher::Literal(crate::Literal::new(w)),
            ))
        };
        let rules: Rules = vec![
            Rule::new(
                "Let",
                Expr::Sequence(vec![
                    word("let"),
                    sym("Name"),
                    Expr::atom(AtomPattern::new().with_key("Op")),
                    sym("Value"),
                    Expr::end_of_input(),
                ]),
            ),
            Rule::new("Name", Expr::atom(AtomPattern::new().with_key("Word"))),
            Rule::new("Value", Expr::atom(AtomPattern::new().with_key("Number"))),
        ]
        .into();
        let tree = parse_atoms(&rules, "Let", &atoms).unwrap();
        assert_eq!(tree.segment, Segment::new(0, 4));
        assert_eq!(tree.text_str(), "letx=1");
        assert_eq!(tree.select_one("Name").unwrap().text_str(), "x");
        assert_eq!(tree.select_one("Value").unwrap().segment, Segment::new(3, 4));
        assert_eq!(tree.select_one("Value").unwrap().text_str(), "1");

        assert_eq!(
            parse_atoms(&rules, "Let", &atoms[..3]).unwrap_err(),
            Error::NoMatch
        );
    }
}
