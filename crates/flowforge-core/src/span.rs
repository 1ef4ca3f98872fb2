//! Source positions.
//!
//! [`Span`] is a byte range into the source text, [`Location`] a 1-based
//! line/column pair. [`LineIndex`] converts between the two.

use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span from a byte range.
    pub fn new(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }

    /// Get the start offset of the span.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Get the end offset of the span.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Get the length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Create a union of two spans (encompassing both).
    pub fn union(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The span as a byte range, suitable for slicing the source.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A 1-based line and column in the source text.
///
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Precomputed line starts for offset to [`Location`] conversion.
#[derive(Debug, Clone)]
pub struct LineIndex<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    pub fn new(source: &'src str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    /// Location of the byte `offset`.
    ///
    /// Offsets past the end of the source map to the position just after the
    /// last character.
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = self
            .source
            .get(line_start..offset)
            .map_or(offset - line_start, |prefix| prefix.chars().count());

        Location::new(line + 1, column + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_union() {
        let a = Span::new(4..8);
        let b = Span::new(2..5);
        assert_eq!(a.union(b), Span::new(2..8));
        assert_eq!(a.len(), 4);
        assert!(Span::new(3..3).is_empty());
    }

    #[test]
    fn test_line_index_locations() {
        let index = LineIndex::new("ab\ncd\n\nxyz");
        assert_eq!(index.location(0), Location::new(1, 1));
        assert_eq!(index.location(1), Location::new(1, 2));
        assert_eq!(index.location(3), Location::new(2, 1));
        assert_eq!(index.location(6), Location::new(3, 1));
        assert_eq!(index.location(9), Location::new(4, 3));
    }

    #[test]
    fn test_line_index_counts_characters() {
        let index = LineIndex::new("é->x");
        // `é` is two bytes but one column
        assert_eq!(index.location(2), Location::new(1, 2));
    }

    #[test]
    fn test_line_index_clamps_past_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.location(10), Location::new(1, 3));
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn test_location_line_matches_newlines(source in "[a-z\\n]{0,40}", offset in 0usize..48) {
                let index = LineIndex::new(&source);
                let clamped = offset.min(source.len());
                let newlines = source[..clamped].matches('\n').count();
                prop_assert_eq!(index.location(offset).line, newlines + 1);
            }

            #[test]
            fn test_location_is_monotonic(source in "[a-z \\n]{0,40}", a in 0usize..48, b in 0usize..48) {
                let index = LineIndex::new(&source);
                let (low, high) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(index.location(low) <= index.location(high));
            }
        }
    }
}
