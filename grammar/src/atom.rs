//! Pre-tokenized input units ([`Atom`]s) and the byte ranges ([`Segments`]) which select their
//! text out of a shared source buffer.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::{Debug, Formatter},
    sync::Arc,
};

use itertools::Itertools;

/// Named byte-string values attached to [`Atom`]s and to `Symbol` references.
pub type Attributes = BTreeMap<String, Vec<u8>>;

/// A half-open range `start..end` of positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// An ordered list of (possibly discontiguous) [`Segment`]s, viewed as one contiguous string of
/// length [`Segments::len`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    segments: Vec<Segment>,
    /// `cumulative_lengths[i]` is the total length of `segments[..=i]`.  This lets
    /// [`Segments::cut`] find the first affected segment with a binary search.
    cumulative_lengths: Vec<usize>,
}

impl Segments {
    pub fn new(segments: Vec<Segment>) -> Self {
        let mut total = 0;
        let cumulative_lengths = segments
            .iter()
            .map(|s| {
                total += s.len();
                total
            })
            .collect_vec();
        Self {
            segments,
            cumulative_lengths,
        }
    }

    pub fn single(segment: Segment) -> Self {
        Self::new(vec![segment])
    }

    /// Concatenates several [`Segments`], preserving the order in which they are given.
    pub fn join<'s>(all: impl IntoIterator<Item = &'s Segments>) -> Self {
        Self::new(
            all.into_iter()
                .flat_map(|s| s.segments.iter().copied())
                .collect(),
        )
    }

    /// The total number of positions selected by `self`
    pub fn len(&self) -> usize {
        self.cumulative_lengths.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Returns the [`Segments`] selecting the positions `start..end` of the string described by
    /// `self`, clipped at the boundaries of the underlying ranges.  An empty or reversed range, or
    /// one starting past the end, selects nothing.
    pub fn cut(&self, start: usize, end: usize) -> Self {
        if start >= end || start >= self.len() {
            return Self::default();
        }
        // Index of the first segment which ends after `start`
        let first_idx = self.cumulative_lengths.partition_point(|&len| len <= start);
        let mut cut = Vec::new();
        for idx in first_idx..self.segments.len() {
            let segment = self.segments[idx];
            let offset = self.cumulative_lengths[idx] - segment.len();
            if offset >= end {
                break;
            }
            let piece = Segment::new(
                segment.start + start.saturating_sub(offset),
                segment.end - self.cumulative_lengths[idx].saturating_sub(end),
            );
            if !piece.is_empty() {
                cut.push(piece);
            }
        }
        Self::new(cut)
    }
}

/// One unit of pre-tokenized input.  Its text is not stored directly; instead `text_selector`
/// picks out (possibly several) ranges of a source buffer shared between many atoms.
#[derive(Clone, PartialEq, Eq)]
pub struct Atom {
    pub symbol: String,
    pub attributes: Attributes,
    pub text: Arc<[u8]>,
    pub text_selector: Segments,
}

impl Atom {
    pub fn new(
        symbol: impl Into<String>,
        attributes: Attributes,
        text: Arc<[u8]>,
        text_selector: Segments,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            attributes,
            text,
            text_selector,
        }
    }

    /// The concatenation of every range of `self.text` picked by the `text_selector`.  This
    /// only allocates if the selector has more than one range.
    pub fn select_text(&self) -> Cow<'_, [u8]> {
        let mut segments = self.text_selector.iter();
        match (segments.next(), segments.next()) {
            (None, _) => Cow::Borrowed(&[]),
            (Some(s), None) => Cow::Borrowed(&self.text[s.start..s.end]),
            _ => {
                let mut text = Vec::with_capacity(self.text_selector.len());
                for s in self.text_selector.iter() {
                    text.extend_from_slice(&self.text[s.start..s.end]);
                }
                Cow::Owned(text)
            }
        }
    }

    /// [`Atom::select_text`], lossily decoded as UTF-8
    pub fn select_str(&self) -> Cow<'_, str> {
        match self.select_text() {
            Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
            Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    /// Returns a copy of `self` whose selected text is `self.select_text()[start..end]`.
    pub fn cut(&self, start: usize, end: usize) -> Self {
        Self {
            symbol: self.symbol.clone(),
            attributes: self.attributes.clone(),
            text: self.text.clone(),
            text_selector: self.text_selector.cut(start, end),
        }
    }
}

impl Debug for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Atom({}, {:?}", self.symbol, self.select_str())?;
        for (key, value) in &self.attributes {
            write!(f, ", {}={:?}", key, String::from_utf8_lossy(value))?;
        }
        write!(f, ")")
    }
}
