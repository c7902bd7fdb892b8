//! Fuzzer for the tokens language, which is the first stage of two-stage parsing.  Each token must
//! come back out as one child [`Atom`](sprig_grammar::Atom) of the root node.

use std::{borrow::Cow, ops::Deref};

use itertools::Itertools;
use rand::{prelude::SliceRandom, Rng};
use rand_distr::Geometric;
use sprig::Lang;

use crate::{runner, utils, Arbitrary};

pub fn fuzz(lang: &Lang, iteration_limit: Option<usize>, average_length_tokens: f64) {
    let config = Config {
        average_length_tokens,
        ..Config::default()
    };
    runner::fuzz::<TokenString>(lang, iteration_limit, config);
}

const OPS: [char; 9] = ['-', '+', '*', '/', '=', ';', '(', ')', ','];

/// A string of tokens, interspersed with whitespace
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TokenString {
    leading_ws: String,
    tokens: Vec<(Token, String)>,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum Token {
    Ident(String),
    Number(String),
    /// A quoted string, storing only the text between the quotes
    String(String),
    Op(char),
}

impl Token {
    /// Two word-like tokens with no whitespace between them would be read as one token
    fn is_word_like(&self) -> bool {
        matches!(self, Token::Ident(_) | Token::Number(_))
    }
}

impl<'lang> Arbitrary<'lang> for TokenString {
    type Config = Config;
    type StaticData = StaticData<'lang>;
    type SampleTable = SampleTable;
    type Shrink = Shrink;

    fn gen_static_data(lang: &'lang Lang, config: &Self::Config) -> Self::StaticData {
        let max_repeats = config.max_regex_repeats;
        StaticData {
            ws_len_distr: Geometric::new(1.0 / config.average_ws_length).unwrap(),
            stream_len_distr: Geometric::new(1.0 / config.average_length_tokens).unwrap(),
            lang,
            ident_gen: utils::regex_sampler("[A-Za-z_][A-Za-z0-9_]*", max_repeats),
            number_gen: utils::regex_sampler("[0-9]+(\\.[0-9]+)?", max_repeats),
            string_gen: utils::regex_sampler("[a-zA-Z0-9 _+*/=;(),.-]*", max_repeats),
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
        let leading_ws = utils::sample_ws(&table.ws_samples, rng).to_owned();
        let stream_length = rng.sample(data.stream_len_distr);
        let mut tokens = (0..stream_length)
            .map(|_| {
                let token = match rng.gen_range(0..4) {
                    0 => Token::Ident(rng.sample(&data.ident_gen)),
                    1 => Token::Number(rng.sample(&data.number_gen)),
                    2 => Token::String(rng.sample(&data.string_gen)),
                    _ => Token::Op(*OPS.choose(&mut *rng).unwrap_or(&OPS[0])),
                };
                let ws = utils::sample_ws(&table.ws_samples, &mut *rng).to_owned();
                (token, ws)
            })
            .collect_vec();
        separate_words(&mut tokens);
        Self { leading_ws, tokens }
    }

    fn unparse(&self, _data: &Self::StaticData, s: &mut String) {
        s.clear();
        s.push_str(&self.leading_ws);
        for (token, ws) in &self.tokens {
            match token {
                Token::Ident(t) | Token::Number(t) => s.push_str(t),
                Token::String(contents) => {
                    s.push('"');
                    s.push_str(contents);
                    s.push('"');
                }
                Token::Op(c) => s.push(*c),
            }
            s.push_str(ws);
        }
    }

    fn parse(data: &Self::StaticData, s: &str) -> Option<Self> {
        let tree = data.lang.parse_root_str(s).ok()?;
        let children = tree.children();
        let leading_end = children.first().map_or(s.len(), |c| c.segment.start);

        let mut tokens = Vec::with_capacity(children.len());
        for (idx, child) in children.iter().enumerate() {
            let atom = &child.atom;
            let token = match atom.symbol.as_str() {
                "Ident" => Token::Ident(atom.select_str().into_owned()),
                "Number" => Token::Number(atom.select_str().into_owned()),
                "String" => {
                    let len = atom.text_selector.len();
                    Token::String(atom.cut(1, len - 1).select_str().into_owned())
                }
                "Op" => Token::Op(atom.select_str().chars().exactly_one().ok()?),
                _ => return None,
            };
            let ws_end = children.get(idx + 1).map_or(s.len(), |c| c.segment.start);
            tokens.push((token, s.get(child.segment.end..ws_end)?.to_owned()));
        }
        Some(Self {
            leading_ws: s.get(..leading_end)?.to_owned(),
            tokens,
        })
    }
}

/// Puts a space between adjacent word-like tokens which would otherwise merge
fn separate_words(tokens: &mut [(Token, String)]) {
    for i in 1..tokens.len() {
        let (before, after) = tokens.split_at_mut(i);
        let (prev, ws) = &mut before[i - 1];
        if ws.is_empty() && prev.is_word_like() && after[0].0.is_word_like() {
            ws.push(' ');
        }
    }
}

/// Configuration parameters for generating token strings
#[derive(Debug, Clone)]
pub struct Config {
    /// The average number of tokens in each generated string
    average_length_tokens: f64,
    /// The average length of the whitespace string
    average_ws_length: f64,
    /// The upper bound placed on open-ended repeats when generating token text
    max_regex_repeats: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            average_length_tokens: 1_000.0,
            average_ws_length: 2.0,
            max_regex_repeats: 10,
        }
    }
}

/// Static data for generating token strings of a given language
#[derive(Debug, Clone)]
pub struct StaticData<'lang> {
    ws_len_distr: Geometric,
    stream_len_distr: Geometric,
    lang: &'lang Lang,
    ident_gen: rand_regex::Regex,
    number_gen: rand_regex::Regex,
    string_gen: rand_regex::Regex,
}

/// Table in which random samples can be cached to speed up the parsing table
#[derive(Debug, Clone)]
pub struct SampleTable {
    ws_samples: Vec<String>,
}

///////////////
// SHRINKING //
///////////////

#[derive(Debug, Clone)]
pub struct Shrink(TokenString);

impl From<TokenString> for Shrink {
    fn from(s: TokenString) -> Self {
        Self(s)
    }
}

impl From<Shrink> for TokenString {
    fn from(s: Shrink) -> Self {
        s.0
    }
}

impl Deref for Shrink {
    type Target = TokenString;

    fn deref(&self) -> &TokenString {
        &self.0
    }
}

impl crate::Shrink for Shrink {
    /// Tries dropping the second half of the tokens, then each token individually
    fn smaller_cases<'s>(&'s self) -> Box<dyn Iterator<Item = Cow<'s, Self>> + 's> {
        let tokens = &self.0.tokens;
        let halved = (tokens.len() > 1).then(|| {
            let mut smaller = self.0.clone();
            smaller.tokens.truncate(tokens.len() / 2);
            Cow::Owned(Shrink(smaller))
        });
        let without_one = (0..tokens.len()).map(move |i| {
            let mut smaller = self.0.clone();
            smaller.tokens.remove(i);
            separate_words(&mut smaller.tokens);
            Cow::Owned(Shrink(smaller))
        });
        Box::new(halved.into_iter().chain(without_one))
    }
}
