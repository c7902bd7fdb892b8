use std::fmt::{Display, Formatter};

use crate::Expr;

/// A named parsing expression.  Names starting with `#` are 'hidden': they never appear in the
/// final parse tree (their children are spliced into the parent instead).
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub expr: Expr,
}

impl Rule {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// An ordered list of [`Rule`]s.  Before normalization, a name may be defined more than once;
/// the definitions are then tried in order as if they were one [`Expr::Choice`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rules {
    rules: Vec<Rule>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Returns a new list containing the rules of `self` followed by those of `other`
    pub fn combine(&self, other: &Rules) -> Rules {
        self.rules.iter().chain(&other.rules).cloned().collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn as_slice(&self) -> &[Rule] {
        &self.rules
    }

    /// The first rule called `name`
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

impl From<Vec<Rule>> for Rules {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl std::iter::FromIterator<Rule> for Rules {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Rules {
    type Item = Rule;
    type IntoIter = std::vec::IntoIter<Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

impl<'r> IntoIterator for &'r Rules {
    type Item = &'r Rule;
    type IntoIter = std::slice::Iter<'r, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.expr)
    }
}

impl Display for Rules {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for rule in &self.rules {
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}

/// Splits a symbol name into its base name and whether or not it is hidden.  Any inline alias
/// suffix (starting with `@`) is not part of the base name.
///
/// ```text
/// "Text"     -> ("Text", false)
/// "#Hidden"  -> ("#Hidden", true)
/// "Text@2"   -> ("Text", false)
/// "#Text@2"  -> ("#Text", true)
/// ```
pub fn analyze_symbol_name(name: &str) -> (&str, bool) {
    let hidden = name.starts_with('#');
    let base = match name.find('@') {
        Some(idx) => &name[..idx],
        None => name,
    };
    (base, hidden)
}
