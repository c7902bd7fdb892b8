//! Abstraction over the two kinds of input which a [`Grammar`](super::Grammar) can parse.

use std::sync::Arc;

use crate::{analysis::Alphabet, Atom, ByteMatcher, Segment, Segments, Terminal};

/// Input which can be parsed: a sequence of units (bytes or [`Atom`]s) indexed by position.
pub trait Text {
    /// The kind of units in this text
    const ALPHABET: Alphabet;

    /// The number of units in this text
    fn length(&self) -> usize;

    /// Attempts to match `terminal` at position `pos`, returning the number of units consumed.
    ///
    /// # Panics
    ///
    /// Panics if `terminal` is over the wrong [`Alphabet`].
    fn accept(&self, terminal: &Terminal, pos: usize) -> Option<usize>;

    /// The buffer which parse nodes will take their text from
    fn source(&self) -> Arc<[u8]>;

    /// The ranges of [`Text::source`] covered by the units in `segment`
    fn selector(&self, segment: Segment) -> Segments;
}

/// Matches the terminals which are valid in either alphabet, returning `Err` for any others.
fn accept_any(terminal: &Terminal, pos: usize, length: usize) -> Result<Option<usize>, ()> {
    Ok(match terminal {
        Terminal::Empty => Some(0),
        Terminal::Dot => (pos < length).then(|| 1),
        Terminal::StartOfInput => (pos == 0).then(|| 0),
        Terminal::EndOfInput => (pos == length).then(|| 0),
        _ => return Err(()),
    })
}

impl Text for [u8] {
    const ALPHABET: Alphabet = Alphabet::Byte;

    fn length(&self) -> usize {
        self.len()
    }

    fn accept(&self, terminal: &Terminal, pos: usize) -> Option<usize> {
        if let Ok(result) = accept_any(terminal, pos, self.len()) {
            return result;
        }
        match terminal {
            Terminal::Literal(l) => l.match_prefix(&self[pos..]),
            Terminal::Pattern(p) => p.match_prefix(&self[pos..]),
            _ => panic!("Matching atom terminal {} against bytes", terminal),
        }
    }

    fn source(&self) -> Arc<[u8]> {
        Arc::from(self)
    }

    fn selector(&self, segment: Segment) -> Segments {
        Segments::single(segment)
    }
}

impl Text for [Atom] {
    const ALPHABET: Alphabet = Alphabet::Atom;

    fn length(&self) -> usize {
        self.len()
    }

    fn accept(&self, terminal: &Terminal, pos: usize) -> Option<usize> {
        if let Ok(result) = accept_any(terminal, pos, self.len()) {
            return result;
        }
        match terminal {
            Terminal::Atom(pattern) => self
                .get(pos)
                .filter(|atom| pattern.matches(atom))
                .map(|_| 1),
            _ => panic!("Matching byte terminal {} against atoms", terminal),
        }
    }

    /// All atoms are assumed to share one source buffer
    fn source(&self) -> Arc<[u8]> {
        match self.first() {
            Some(atom) => atom.text.clone(),
            None => Arc::from(&[][..]),
        }
    }

    fn selector(&self, segment: Segment) -> Segments {
        Segments::join(self[segment.start..segment.end].iter().map(|a| &a.text_selector))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Text;
    use crate::{
        AtomPattern, Atom, AttributeMatcher, Attributes, Literal, Pattern, Segment, Segments,
        Terminal,
    };

    #[test]
    fn bytes() {
        let text: &[u8] = b"ab12";
        let check = |terminal: Terminal, pos: usize, expected: Option<usize>| {
            assert_eq!(text.accept(&terminal, pos), expected, "{} at {}", terminal, pos);
        };
        check(Terminal::Empty, 4, Some(0));
        check(Terminal::Dot, 3, Some(1));
        check(Terminal::Dot, 4, None);
        check(Terminal::StartOfInput, 0, Some(0));
        check(Terminal::StartOfInput, 1, None);
        check(Terminal::EndOfInput, 4, Some(0));
        check(Terminal::EndOfInput, 3, None);
        check(Terminal::Literal(Literal::new("ab")), 0, Some(2));
        check(Terminal::Literal(Literal::new("ab")), 1, None);
        check(Terminal::Pattern(Pattern::new("[0-9]+").unwrap()), 2, Some(2));
        check(Terminal::Pattern(Pattern::new("[0-9]+").unwrap()), 4, None);
        assert_eq!(
            text.selector(Segment::new(1, 3)),
            Segments::single(Segment::new(1, 3))
        );
    }

    fn atoms() -> Vec<Atom> {
        let source: Arc<[u8]> = Arc::from(&b"x = 10"[..]);
        [("Ident", 0, 1), ("Op", 2, 3), ("Number", 4, 6)]
            .iter()
            .map(|&(symbol, start, end)| {
                Atom::new(
                    symbol,
                    Attributes::new(),
                    source.clone(),
                    Segments::single(Segment::new(start, end)),
                )
            })
            .collect()
    }

    #[test]
    fn atom_input() {
        let atoms = atoms();
        let text: &[Atom] = &atoms;
        let number = Terminal::Atom(AtomPattern::new().with(
            "Number",
            AttributeMatcher::Pattern(Pattern::new("[0-9]+").unwrap()),
        ));
        assert_eq!(text.accept(&number, 2), Some(1));
        assert_eq!(text.accept(&number, 1), None);
        assert_eq!(text.accept(&number, 3), None);
        assert_eq!(text.accept(&Terminal::Dot, 0), Some(1));
        assert_eq!(text.accept(&Terminal::EndOfInput, 3), Some(0));

        assert_eq!(&*text.source(), b"x = 10");
        assert_eq!(
            text.selector(Segment::new(1, 3)),
            Segments::new(vec![Segment::new(2, 3), Segment::new(4, 6)])
        );
        let empty: &[Atom] = &[];
        assert!(empty.source().is_empty());
    }

    #[test]
    #[should_panic]
    fn byte_terminal_on_atoms() {
        let atoms = atoms();
        let text: &[Atom] = &atoms;
        text.accept(&Terminal::Literal(Literal::new("x")), 0);
    }
}
