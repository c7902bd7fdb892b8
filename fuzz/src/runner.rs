use std::{
    borrow::Cow,
    fmt::{Debug, Display, Formatter},
    time::{Duration, Instant},
};

use rand::prelude::ThreadRng;
use sprig::Lang;

use crate::{utils, Arbitrary, Shrink};

use self::immut::Immut;

/// How many samples are generated from each [`Arbitrary::SampleTable`]
const SAMPLES_PER_TABLE: usize = 1_000;

/// Run a fuzz target against some language, panicking with a minimal witness if any sample
/// doesn't survive a round trip through the parser.
pub fn fuzz<'lang, A: Arbitrary<'lang> + Debug>(
    lang: &'lang Lang,
    iteration_limit: Option<usize>,
    config: A::Config,
) {
    log::info!("Fuzzing language {}", lang.name());
    Runner::<A>::new(lang, config).run(iteration_limit);
}

/// A thread-local `Runner` for fuzz tests
#[derive(Debug, Clone)]
struct Runner<'lang, A: Arbitrary<'lang>> {
    rng: ThreadRng,
    static_data: Immut<A::StaticData>,
    table: A::SampleTable,
    config: A::Config,

    // Stat printing state
    fuzz_start_time: Immut<Instant>,
    elapsed_secs_for_last_print: u64,
    stats: Stats,

    // Fuzzing loop state
    unparsed_string: String,
}

impl<'lang, A: Arbitrary<'lang> + Debug> Runner<'lang, A> {
    /// Create a `Runner` which hasn't run any fuzzing iterations.
    fn new(lang: &'lang Lang, config: A::Config) -> Self {
        let static_data = Immut::new(A::gen_static_data(lang, &config));
        let mut rng = rand::thread_rng();
        Self {
            table: A::gen_table(&static_data, &mut rng, &config),
            rng,
            static_data,
            config,

            fuzz_start_time: Instant::now().into(),
            elapsed_secs_for_last_print: 0,
            stats: Stats::default(),

            unparsed_string: String::new(),
        }
    }

    fn run(mut self, iteration_limit: Option<usize>) {
        loop {
            // Sample tables are regenerated regularly, so that samples aren't always built from
            // the same finite set of pieces
            self.table = A::gen_table(&self.static_data, &mut self.rng, &self.config);

            for _ in 0..SAMPLES_PER_TABLE {
                let sample = A::gen(&self.static_data, &self.table, &self.config, &mut self.rng);

                if !self.check(&sample) {
                    let shrunk_sample = self.shrink_sample(sample);
                    self.unparsed_string.clear();
                    shrunk_sample.unparse(&self.static_data, &mut self.unparsed_string);
                    log::error!("Minimal failing sample: {:?}", shrunk_sample);
                    panic!("Round trip failed for {:?}", self.unparsed_string);
                }

                self.stats.iterations += 1;
                let reached_iteration_limit = Some(self.stats.iterations) >= iteration_limit;

                // Print stats roughly every second, and when the run ends
                let elapsed_secs = self.fuzz_start_time.elapsed().as_secs();
                if elapsed_secs > self.elapsed_secs_for_last_print || reached_iteration_limit {
                    self.elapsed_secs_for_last_print = elapsed_secs;
                    println!("{}", self.stats);
                }
                if reached_iteration_limit {
                    return;
                }
            }
        }
    }

    /// Shrink a witness sample until a minimal witness is found.  Shrinking works in the following
    /// way:
    /// 1. The sample is converted to an `A::Shrink` (which allows the shrinking strategy to add
    ///    extra state).
    /// 2. This generates an [`Iterator`] of slightly smaller samples
    /// 3. Each of these smaller samples are tested individually.  If any of these fail, then it
    ///    becomes a new witness, and we continue at step `2` with this as the new sample.
    /// 4. If none of the smaller samples are witnesses (or there aren't any), then the current
    ///    sample is minimal and is returned.
    fn shrink_sample(&mut self, sample: A) -> A {
        log::info!("Found a failing sample, shrinking...");
        let mut witness: A::Shrink = sample.into();
        loop {
            let smaller_witness = witness
                .smaller_cases()
                .find(|case| !self.check(case))
                .map(Cow::into_owned);
            match smaller_witness {
                Some(w) => witness = w,
                None => return witness.into(),
            }
        }
    }

    /// Returns `true` if `sample` survives being unparsed and parsed again
    fn check(&mut self, sample: &A) -> bool {
        self.unparsed_string.clear();
        sample.unparse(&self.static_data, &mut self.unparsed_string);
        log::trace!("Testing {:?}", self.unparsed_string);

        let start = Instant::now();
        let parsed_sample = A::parse(&self.static_data, &self.unparsed_string);
        self.stats.record(self.unparsed_string.len(), start.elapsed());

        parsed_sample.as_ref() == Some(sample)
    }
}

/// Running totals of how much text has been parsed
#[derive(Debug, Clone, Default)]
struct Stats {
    iterations: usize,
    bytes_parsed: usize,
    time_parsing: Duration,
}

impl Stats {
    fn record(&mut self, bytes: usize, time: Duration) {
        self.bytes_parsed += bytes;
        self.time_parsing += time;
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} iters.  {} in {:?} = {}/s",
            self.iterations,
            utils::format_big_bytes(self.bytes_parsed as f32),
            self.time_parsing,
            utils::format_big_bytes(self.bytes_parsed as f32 / self.time_parsing.as_secs_f32())
        )
    }
}

mod immut {
    /// Wrapper type which only permits immutable references to its contents.  This is equivalent
    /// to `let x: A` but can be used in a type definition.
    #[derive(Debug, Clone)]
    #[repr(transparent)]
    pub(super) struct Immut<T> {
        inner: T,
    }

    impl<T> Immut<T> {
        pub(super) fn new(inner: T) -> Self {
            Self { inner }
        }
    }

    impl<T> std::ops::Deref for Immut<T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            &self.inner
        }
    }

    impl<T> From<T> for Immut<T> {
        fn from(v: T) -> Self {
            Self::new(v)
        }
    }
}
