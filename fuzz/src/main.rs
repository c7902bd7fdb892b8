//! Automated random testing and benchmarking for the languages shipped in `langs/`.  Each fuzz
//! target generates random samples, unparses them to text, parses that text and checks that the
//! original sample comes back out.
//!
//! Usage: `fuzz [arithmetic|tokens] [iterations]`

mod arithmetic;
mod runner;
mod tokens;
mod utils;

use std::{borrow::Cow, ops::Deref};

use rand::Rng;
use sprig::{Lang, LoadError};

const DEFAULT_ITERATIONS: usize = 10_000;

fn main() -> Result<(), LoadError> {
    pretty_env_logger::init();

    let mut args = std::env::args().skip(1);
    let target = args.next().unwrap_or_else(|| "arithmetic".to_owned());
    let iteration_limit = args
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(DEFAULT_ITERATIONS);

    match target.as_str() {
        "tokens" => {
            let lang = Lang::load_toml_file("langs/tokens.toml")?;
            // Average length should be around 1k tokens
            tokens::fuzz(&lang, Some(iteration_limit), 1_000.0);
        }
        "arithmetic" => {
            let lang = Lang::load_toml_file("langs/arithmetic.toml")?;
            arithmetic::fuzz(&lang, Some(iteration_limit));
        }
        _ => log::error!("Unknown fuzz target {:?}", target),
    }
    Ok(())
}

pub trait Arbitrary<'lang>: Sized + Eq {
    /// Configuration parameters passed into [`runner::fuzz`]
    type Config: Default;
    /// Static data generated once before entering the fuzzing loop
    type StaticData;
    /// Sample tables generated every thousand fuzzing iterations.  This allows the program to
    /// cache commonly computed values (e.g. whitespace) to speed up sample generation.
    type SampleTable;
    /// A shrunk instance of `Self`.  Extra state can be added to this to implement more complex
    /// shrinking strategies.
    type Shrink: Shrink + From<Self> + Into<Self> + Deref<Target = Self>;

    /* STATIC TABLE GENERATION */
    fn gen_static_data(lang: &'lang Lang, config: &Self::Config) -> Self::StaticData;
    fn gen_table(
        data: &Self::StaticData,
        rng: &mut impl Rng,
        config: &Self::Config,
    ) -> Self::SampleTable;

    /* TESTING */
    /// Create a new sample to test
    fn gen(
        data: &Self::StaticData,
        table: &Self::SampleTable,
        config: &Self::Config,
        rng: &mut impl Rng,
    ) -> Self;
    /// Write this sample to a string
    fn unparse(&self, data: &Self::StaticData, s: &mut String);
    /// Parse a sample from a given string.  This is expected to be an inverse of `unparse`
    fn parse(data: &Self::StaticData, s: &str) -> Option<Self>;
}

pub trait Shrink: Clone {
    fn smaller_cases<'s>(&'s self) -> Box<dyn Iterator<Item = Cow<'s, Self>> + 's>;
}
