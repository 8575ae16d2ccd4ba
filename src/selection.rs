//! Index-range selection of archive entries.
//!
//! A selection string is a comma-separated list of tokens, each either a
//! single index (`7`) or an inclusive range (`3-9`). Indices are zero-based
//! positions in the archive listing.
//!
//! Parsing is fail-fast: the first malformed, reversed, empty or
//! out-of-bounds token rejects the whole string. An empty (or all-blank)
//! string is valid and selects nothing.
//!
//! ```
//! use zipman::selection::parse_selection;
//!
//! let set = parse_selection("0,2,5-8,10", 20).unwrap();
//! assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 2, 5, 6, 7, 8, 10]);
//! assert_eq!(set.to_string(), "0,2,5-8,10");
//! ```

use std::collections::BTreeSet;
use std::fmt;

/// Rejected selection string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSelection {
    #[error("empty entry at position {position} in selection")]
    EmptyToken { position: usize },

    #[error("'{token}' is not an index or a range like 3-7")]
    Malformed { token: String },

    #[error("range {lo}-{hi} is reversed")]
    ReversedRange { lo: usize, hi: usize },

    #[error("index {index} is out of range (archive has {count} entries)")]
    OutOfBounds { index: usize, count: usize },
}

/// One parsed token of a selection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionToken {
    Single(usize),
    /// Inclusive range, `lo <= hi`.
    Range(usize, usize),
}

/// Ordered, de-duplicated set of selected entry indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    indices: BTreeSet<usize>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every index in `0..count`.
    pub fn all(count: usize) -> Self {
        Self {
            indices: (0..count).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    fn add_token(&mut self, token: SelectionToken) {
        match token {
            SelectionToken::Single(i) => {
                self.indices.insert(i);
            }
            SelectionToken::Range(lo, hi) => self.indices.extend(lo..=hi),
        }
    }
}

impl FromIterator<usize> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            indices: iter.into_iter().collect(),
        }
    }
}

/// Canonical selection string: runs of consecutive indices become ranges.
impl fmt::Display for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.indices.iter().copied().peekable();
        let mut first = true;

        while let Some(lo) = iter.next() {
            let mut hi = lo;
            while iter.peek() == Some(&(hi + 1)) {
                hi += 1;
                iter.next();
            }

            if !first {
                f.write_str(",")?;
            }
            first = false;

            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        Ok(())
    }
}

/// Parse a selection string against an archive of `valid_count` entries.
pub fn parse_selection(input: &str, valid_count: usize) -> Result<SelectionSet, InvalidSelection> {
    let mut set = SelectionSet::new();
    if input.trim().is_empty() {
        return Ok(set);
    }

    for (position, raw) in input.split(',').enumerate() {
        let token = parse_token(raw.trim(), position)?;
        check_bounds(token, valid_count)?;
        set.add_token(token);
    }

    Ok(set)
}

/// Parse one trimmed token without bounds checking.
pub fn parse_token(token: &str, position: usize) -> Result<SelectionToken, InvalidSelection> {
    if token.is_empty() {
        return Err(InvalidSelection::EmptyToken { position });
    }

    match token.find('-') {
        Some(dash) if dash > 0 => {
            let lo = parse_index(token[..dash].trim(), token)?;
            let hi = parse_index(token[dash + 1..].trim(), token)?;
            if lo > hi {
                return Err(InvalidSelection::ReversedRange { lo, hi });
            }
            Ok(SelectionToken::Range(lo, hi))
        }
        _ => parse_index(token, token).map(SelectionToken::Single),
    }
}

fn parse_index(digits: &str, token: &str) -> Result<usize, InvalidSelection> {
    let malformed = || InvalidSelection::Malformed {
        token: token.to_string(),
    };
    // usize::from_str would also accept a leading '+'
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    digits.parse().map_err(|_| malformed())
}

fn check_bounds(token: SelectionToken, count: usize) -> Result<(), InvalidSelection> {
    let highest = match token {
        SelectionToken::Single(i) => i,
        SelectionToken::Range(_, hi) => hi,
    };
    if highest >= count {
        return Err(InvalidSelection::OutOfBounds {
            index: highest,
            count,
        });
    }
    Ok(())
}
