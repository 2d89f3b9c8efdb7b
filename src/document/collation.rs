//! String-comparison capability injected into value comparisons.
//!
//! A collation pairs a culture identifier with a case-sensitivity flag.
//! It is passed explicitly wherever strings are compared so no global
//! state is involved; tests inject the deterministic binary collation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// String comparator parameterized by culture and case sensitivity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collation {
    /// Culture identifier, `"binary"` for ordinal comparison.
    pub culture: String,
    /// Whether string comparisons ignore character case.
    pub ignore_case: bool,
}

impl Collation {
    /// Ordinal (code-point) collation. Deterministic across platforms.
    pub fn binary() -> Self {
        Collation {
            culture: "binary".into(),
            ignore_case: false,
        }
    }

    /// Case-insensitive collation for the given culture.
    pub fn case_insensitive(culture: impl Into<String>) -> Self {
        Collation {
            culture: culture.into(),
            ignore_case: true,
        }
    }

    /// Three-way string comparison under this collation.
    pub fn compare(&self, left: &str, right: &str) -> Ordering {
        if self.ignore_case {
            let mut l = left.chars().flat_map(char::to_lowercase);
            let mut r = right.chars().flat_map(char::to_lowercase);
            loop {
                match (l.next(), r.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(a), Some(b)) => match a.cmp(&b) {
                        Ordering::Equal => continue,
                        other => return other,
                    },
                }
            }
        } else {
            left.cmp(right)
        }
    }

    /// String equality under this collation.
    pub fn eq(&self, left: &str, right: &str) -> bool {
        self.compare(left, right) == Ordering::Equal
    }

    /// Single-character equality, used by the LIKE matcher.
    pub fn eq_char(&self, left: char, right: char) -> bool {
        if self.ignore_case {
            left.to_lowercase().eq(right.to_lowercase())
        } else {
            left == right
        }
    }
}

impl Default for Collation {
    fn default() -> Self {
        Collation::binary()
    }
}
