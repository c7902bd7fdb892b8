//! Front-end for the `sprig_grammar` parsing engine: loading languages from TOML files and
//! parsing text with them.

mod lang; // Language definition

pub use lang::{Lang, LoadError};
