use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use sprig_grammar::{parser, Atom, ConvertError, Grammar, ParsingNode, SpecGrammar};

/// A language which can be parsed: a compiled [`Grammar`] and the rule to start parsing from.
#[derive(Debug, Clone)]
pub struct Lang {
    header: Header,
    root: String,
    // This is stored in an `Arc` so that clones of a `Lang` share one compiled grammar
    grammar: Arc<Grammar>,
}

impl Lang {
    pub fn load_toml_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let toml_string =
            std::fs::read_to_string(path).map_err(|e| LoadError::Io(path.to_owned(), e))?;
        Self::from_toml(&toml_string)
    }

    pub fn from_toml(s: &str) -> Result<Self, LoadError> {
        let lang_file: LangFile = toml::from_str(s).map_err(LoadError::Parse)?;
        let (grammar, root) = lang_file
            .grammar
            .into_grammar()
            .map_err(LoadError::Convert)?;
        log::debug!(
            "Loaded language {} ({} rules after normalization)",
            lang_file.header.name,
            grammar.rules().len()
        );
        Ok(Self {
            header: lang_file.header,
            root,
            grammar: Arc::new(grammar),
        })
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// The name of the rule which parsing starts from
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Parses some bytes from the root rule.  The root rule may only match a prefix of `text`.
    pub fn parse_root_bytes(&self, text: &[u8]) -> parser::ParseResult<ParsingNode> {
        self.grammar.parse_bytes(&self.root, text)
    }

    pub fn parse_root_str(&self, text: &str) -> parser::ParseResult<ParsingNode> {
        self.parse_root_bytes(text.as_bytes())
    }

    /// Parses a sequence of [`Atom`]s (usually the [`ParsingNode::child_atoms`] of a parse by
    /// another language) from the root rule.
    pub fn parse_root_atoms(&self, atoms: &[Atom]) -> parser::ParseResult<ParsingNode> {
        self.grammar.parse_atoms(&self.root, atoms)
    }
}

/// Data relating to this language that is parsed from the file but not dependent on the
/// [`Grammar`]
#[derive(Debug, Clone, Deserialize)]
struct Header {
    name: String,
}

//////////////////////////
// FILE PARSING/LOADING //
//////////////////////////

/// Data structure into which TOML files get [`Deserialize`]d.
#[derive(Debug, Clone, Deserialize)]
struct LangFile {
    #[serde(rename = "lang")]
    header: Header,
    grammar: SpecGrammar,
}

#[derive(Debug)]
pub enum LoadError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    Convert(ConvertError),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(path, e) => write!(f, "can't read {}: {}", path.display(), e),
            LoadError::Parse(e) => write!(f, "invalid language file: {}", e),
            LoadError::Convert(e) => write!(f, "invalid grammar: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

#[cfg(test)]
mod tests {
    use sprig_grammar::{parser::Error, ParsingNode, Segment};

    use super::{Lang, LoadError};

    const ARITHMETIC: &str = include_str!("../../langs/arithmetic.toml");
    const TOKENS: &str = include_str!("../../langs/tokens.toml");

    fn arithmetic() -> Lang {
        Lang::from_toml(ARITHMETIC).unwrap()
    }

    fn check_spans(lang: &Lang, text: &str) -> ParsingNode {
        let tree = lang.parse_root_str(text).unwrap();
        assert_eq!(tree.segment, Segment::new(0, text.len()), "parsing {:?}", text);
        tree
    }

    #[test]
    fn arithmetic_spans() {
        let lang = arithmetic();
        assert_eq!(lang.name(), "Arithmetic");
        assert_eq!(lang.root(), "Expr");
        check_spans(&lang, "10+2");
        check_spans(&lang, "1+(2*4-5)-10*44");
        assert_eq!(lang.parse_root_str("+"), Err(Error::NoMatch));
    }

    #[test]
    fn arithmetic_tree() {
        let tree = check_spans(&arithmetic(), "3*(4+5)");
        let sum = tree.select_one("Sum").unwrap();
        let product = sum.only_child().unwrap();
        let values = product
            .select_all("Value")
            .map(|v| v.text_str().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(values, vec!["3", "(4+5)"]);
        let operators = product
            .select_all("MulOp")
            .map(|v| v.text_str().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(operators, vec!["*"]);
        // `Value` contains a nested `Expr`
        let inner = product.children()[2].select_one("Expr").unwrap();
        assert_eq!(inner.text_str(), "4+5");
    }

    #[test]
    fn two_stage_parsing() {
        let tokens = Lang::from_toml(TOKENS).unwrap();
        let tree = tokens.parse_root_str("let x = \"hi\" ;").unwrap();
        let atoms = tree.child_atoms();
        let rendered = atoms
            .iter()
            .map(|a| format!("{}:{}", a.symbol, a.select_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            rendered,
            vec!["Ident:let", "Ident:x", "Op:=", "String:\"hi\"", "Op:;"]
        );

        let statements = Lang::from_toml(
            r#"
[lang]
name = "Statements"

[grammar]
root = "Let"

[[grammar.rules]]
name = "Let"
expr = { seq = [{ atom = { Ident = { token = "let" } } }, "Name", { atom = { Op = { token = "=" } } }, "Value", { atom = { Op = { token = ";" } } }, "@eof"] }

[[grammar.rules]]
name = "Name"
expr = { atom = { Ident = true } }

[[grammar.rules]]
name = "Value"
expr = { choice = [{ atom = { String = true } }, { atom = { Number = true } }] }
"#,
        )
        .unwrap();
        let tree = statements.parse_root_atoms(&atoms).unwrap();
        assert_eq!(tree.segment, Segment::new(0, 5));
        assert_eq!(tree.select_one("Name").unwrap().text_str(), "x");
        assert_eq!(tree.select_one("Value").unwrap().text_str(), "\"hi\"");
        // Parse nodes over atoms still know the text they came from
        assert_eq!(tree.text_str(), "letx=\"hi\";");
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            Lang::load_toml_file("does/not/exist.toml"),
            Err(LoadError::Io(_, _))
        ));
        assert!(matches!(
            Lang::from_toml("[lang]\nname = \"Broken\""),
            Err(LoadError::Parse(_))
        ));
        assert!(matches!(
            Lang::from_toml(
                "[lang]\nname = \"Broken\"\n[grammar]\nroot = \"A\"\n[[grammar.rules]]\nname = \"A\"\nexpr = \"B\""
            ),
            Err(LoadError::Convert(_))
        ));
    }
}
