//! Fuzzer for the full parsing pipeline, using the arithmetic language.  Random expression trees
//! are written out as text, parsed, and read back from the resulting [`ParsingNode`]s.

use std::{borrow::Cow, ops::Deref};

use itertools::Itertools;
use rand::{prelude::SliceRandom, Rng};
use rand_distr::Geometric;
use sprig::Lang;
use sprig_grammar::ParsingNode;

use crate::{runner, utils, Arbitrary};

pub fn fuzz(lang: &Lang, iteration_limit: Option<usize>) {
    runner::fuzz::<Expr>(lang, iteration_limit, Config::default());
}

const ADD_OPS: [char; 2] = ['+', '-'];
const MUL_OPS: [char; 2] = ['*', '/'];

/// A sum of products, mirroring the `Sum` rule.  The whitespace between tokens is kept so that
/// unparsing is exact.
type Expr = Chain<Product>;
type Product = Chain<Value>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Chain<T> {
    first: T,
    rest: Vec<Link<T>>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct Link<T> {
    ws_before: String,
    op: char,
    ws_after: String,
    operand: T,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Value {
    Number(String),
    Neg(Box<Value>),
    Paren {
        ws_before: String,
        inner: Box<Expr>,
        ws_after: String,
    },
}

impl<'lang> Arbitrary<'lang> for Expr {
    type Config = Config;
    type StaticData = StaticData<'lang>;
    type SampleTable = SampleTable;
    type Shrink = Shrink;

    fn gen_static_data(lang: &'lang Lang, config: &Config) -> Self::StaticData {
        StaticData {
            lang,
            ws_len_distr: Geometric::new(1.0 / config.average_ws_length).unwrap(),
            chain_len_distr: Geometric::new(1.0 / (1.0 + config.average_chain_length)).unwrap(),
            number_gen: utils::regex_sampler("[0-9]+", config.max_number_length),
            depth_limit: config.depth_limit,
        }
    }

    fn gen_table(
        data: &Self::StaticData,
        rng: &mut impl Rng,
        _config: &Self::Config,
    ) -> Self::SampleTable {
        SampleTable {
            ws_samples: utils::gen_ws_samples(3000, rng, data.ws_len_distr),
        }
    }

    fn gen(
        data: &Self::StaticData,
        table: &Self::SampleTable,
        _config: &Self::Config,
        rng: &mut impl Rng,
    ) -> Self {
        let mut state = GenState { data, table, rng };
        gen_expr(&mut state, 0)
    }

    fn unparse(&self, _data: &Self::StaticData, s: &mut String) {
        s.clear();
        write_chain(self, s, &|p, s| write_chain(p, s, &write_value));
    }

    fn parse(data: &Self::StaticData, s: &str) -> Option<Self> {
        let tree = data.lang.parse_root_str(s).ok()?;
        if tree.segment.len() != s.len() {
            return None;
        }
        read_expr(&tree, s)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    average_ws_length: f64,
    /// The average number of operators in each sum or product
    average_chain_length: f64,
    max_number_length: u32,
    depth_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            average_ws_length: 1.5,
            average_chain_length: 1.5,
            max_number_length: 6,
            depth_limit: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticData<'lang> {
    lang: &'lang Lang,

    ws_len_distr: Geometric,
    chain_len_distr: Geometric,
    number_gen: rand_regex::Regex,
    depth_limit: usize,
}

/// Table in which random samples can be cached to speed up generation of trees
#[derive(Debug, Clone)]
pub struct SampleTable {
    ws_samples: Vec<String>,
}

/////////////////////
// TREE GENERATION //
/////////////////////

struct GenState<'a, 'lang, R: Rng> {
    data: &'a StaticData<'lang>,
    table: &'a SampleTable,
    rng: &'a mut R,
}

impl<R: Rng> GenState<'_, '_, R> {
    fn ws(&mut self) -> String {
        utils::sample_ws(&self.table.ws_samples, &mut *self.rng).to_owned()
    }
}

fn gen_expr(state: &mut GenState<impl Rng>, depth: usize) -> Expr {
    gen_chain(state, depth, &ADD_OPS, &mut |state, depth| {
        gen_chain(state, depth, &MUL_OPS, &mut gen_value)
    })
}

fn gen_chain<T, R: Rng>(
    state: &mut GenState<R>,
    depth: usize,
    ops: &[char],
    gen_operand: &mut impl FnMut(&mut GenState<R>, usize) -> T,
) -> Chain<T> {
    let first = gen_operand(state, depth);
    let len = if depth >= state.data.depth_limit {
        0
    } else {
        state.rng.sample(state.data.chain_len_distr)
    };
    let rest = (0..len)
        .map(|_| Link {
            ws_before: state.ws(),
            op: *ops.choose(&mut *state.rng).unwrap_or(&ops[0]),
            ws_after: state.ws(),
            operand: gen_operand(state, depth),
        })
        .collect_vec();
    Chain { first, rest }
}

fn gen_value(state: &mut GenState<impl Rng>, depth: usize) -> Value {
    let roll: f64 = if depth >= state.data.depth_limit {
        0.0
    } else {
        state.rng.gen_range(0.0..1.0)
    };
    if roll < 0.6 {
        Value::Number(state.rng.sample(&state.data.number_gen))
    } else if roll < 0.75 {
        Value::Neg(Box::new(gen_value(state, depth + 1)))
    } else {
        Value::Paren {
            ws_before: state.ws(),
            inner: Box::new(gen_expr(state, depth + 1)),
            ws_after: state.ws(),
        }
    }
}

///////////////
// UNPARSING //
///////////////

fn write_chain<T>(chain: &Chain<T>, s: &mut String, write_operand: &dyn Fn(&T, &mut String)) {
    write_operand(&chain.first, s);
    for link in &chain.rest {
        s.push_str(&link.ws_before);
        s.push(link.op);
        s.push_str(&link.ws_after);
        write_operand(&link.operand, s);
    }
}

fn write_value(value: &Value, s: &mut String) {
    match value {
        Value::Number(n) => s.push_str(n),
        Value::Neg(inner) => {
            s.push('-');
            write_value(inner, s);
        }
        Value::Paren {
            ws_before,
            inner,
            ws_after,
        } => {
            s.push('(');
            s.push_str(ws_before);
            write_chain(inner, s, &|p, s| write_chain(p, s, &write_value));
            s.push_str(ws_after);
            s.push(')');
        }
    }
}

/////////////
// READING //
/////////////

/// Reads an `Expr` node, which contains exactly one `Sum`
fn read_expr(node: &ParsingNode, text: &str) -> Option<Expr> {
    let sum = node.only_child()?;
    read_chain(sum, text, &|product, text| {
        read_chain(product, text, &read_value)
    })
}

/// Reads a node whose children alternate between operands and single-char operators.  Hidden
/// whitespace rules leave no nodes, so the whitespace is recovered from the gaps between children.
fn read_chain<T>(
    node: &ParsingNode,
    text: &str,
    read_operand: &dyn Fn(&ParsingNode, &str) -> Option<T>,
) -> Option<Chain<T>> {
    let (first, others) = node.children().split_first()?;
    if others.len() % 2 != 0 {
        return None;
    }
    let mut prev_end = first.segment.end;
    let mut rest = Vec::new();
    for (op, operand) in others.iter().tuples() {
        let op_char = op.text_str().chars().exactly_one().ok()?;
        rest.push(Link {
            ws_before: text.get(prev_end..op.segment.start)?.to_owned(),
            op: op_char,
            ws_after: text.get(op.segment.end..operand.segment.start)?.to_owned(),
            operand: read_operand(operand, text)?,
        });
        prev_end = operand.segment.end;
    }
    Some(Chain {
        first: read_operand(first, text)?,
        rest,
    })
}

fn read_value(node: &ParsingNode, text: &str) -> Option<Value> {
    let child = node.only_child()?;
    Some(match child.symbol() {
        "Number" => Value::Number(child.text_str().into_owned()),
        "Neg" => Value::Neg(Box::new(read_value(child.only_child()?, text)?)),
        "Expr" => Value::Paren {
            // Skip the brackets, which are anonymous tokens of `Value`
            ws_before: text.get(node.segment.start + 1..child.segment.start)?.to_owned(),
            inner: Box::new(read_expr(child, text)?),
            ws_after: text.get(child.segment.end..node.segment.end - 1)?.to_owned(),
        },
        _ => return None,
    })
}

///////////////
// SHRINKING //
///////////////

#[derive(Debug, Clone)]
pub struct Shrink(Expr);

impl From<Expr> for Shrink {
    fn from(e: Expr) -> Self {
        Self(e)
    }
}

impl From<Shrink> for Expr {
    fn from(s: Shrink) -> Self {
        s.0
    }
}

impl Deref for Shrink {
    type Target = Expr;

    fn deref(&self) -> &Expr {
        &self.0
    }
}

impl crate::Shrink for Shrink {
    /// Smaller cases are made by removing one term of the outermost sum, or by replacing the
    /// whole expression with one of its bracketed sub-expressions.
    fn smaller_cases<'s>(&'s self) -> Box<dyn Iterator<Item = Cow<'s, Self>> + 's> {
        let expr = &self.0;
        let without_terms = (0..expr.rest.len()).map(move |i| {
            let mut smaller = expr.clone();
            smaller.rest.remove(i);
            Cow::Owned(Shrink(smaller))
        });
        let mut nested = Vec::new();
        collect_nested(expr, &mut nested);
        let nested = nested
            .into_iter()
            .map(|inner| Cow::Owned(Shrink(inner.clone())));
        Box::new(without_terms.chain(nested))
    }
}

/// Collects every bracketed sub-expression of `expr`, outermost first
fn collect_nested<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    let products = std::iter::once(&expr.first).chain(expr.rest.iter().map(|l| &l.operand));
    for product in products {
        let values = std::iter::once(&product.first).chain(product.rest.iter().map(|l| &l.operand));
        for mut value in values {
            while let Value::Neg(inner) = value {
                value = &**inner;
            }
            if let Value::Paren { inner, .. } = value {
                out.push(inner);
                collect_nested(inner, out);
            }
        }
    }
}
