use itertools::Itertools;
use number_prefix::NumberPrefix;
use rand::{prelude::SliceRandom, Rng};
use rand_distr::Distribution;

/// The whitespace chars which both shipped languages skip between tokens
pub const WS_CHARS: [char; 4] = [' ', '\t', '\r', '\n'];

/// Generate `n` whitespace strings, with lengths drawn from `length_distr`
pub fn gen_ws_samples(
    n: usize,
    rng: &mut impl Rng,
    length_distr: impl Distribution<u64> + Copy,
) -> Vec<String> {
    (0..n)
        .map(|_| {
            let len = rng.sample(length_distr) as usize;
            std::iter::repeat_with(|| WS_CHARS[rng.gen_range(0..WS_CHARS.len())])
                .take(len)
                .collect()
        })
        .collect_vec()
}

pub fn sample_ws<'s>(samples: &'s [String], rng: &mut impl Rng) -> &'s str {
    samples.choose(rng).map_or("", String::as_str)
}

/// Sample a string from a regex, with open-ended repeats capped at `max_repeats`
pub fn regex_sampler(regex: &str, max_repeats: u32) -> rand_regex::Regex {
    match rand_regex::Regex::compile(regex, max_repeats) {
        Ok(r) => r,
        Err(e) => panic!("Invalid sample regex {:?}: {}", regex, e),
    }
}

pub fn format_big_bytes(num: f32) -> String {
    match NumberPrefix::decimal(num) {
        NumberPrefix::Standalone(n) => format!("{} bytes", n),
        NumberPrefix::Prefixed(prefix, n) => format!("{:.1} {}B", n, prefix),
    }
}
