//! Title-based junk filter.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Item;
use crate::{FeedhubError, Result};

/// Regular expression over item titles plus an invert flag.
///
/// An empty pattern never skips anything. The pattern is compiled on first
/// use and kept; `title` is not expected to change afterwards.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Filter {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub invert: bool,
    #[serde(skip)]
    compiled: OnceLock<std::result::Result<Regex, String>>,
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.invert == other.invert
    }
}

impl Eq for Filter {}

impl Filter {
    pub fn new(title: impl Into<String>, invert: bool) -> Self {
        Self {
            title: title.into(),
            invert,
            compiled: OnceLock::new(),
        }
    }

    /// Check that the pattern compiles.
    pub fn check(&self) -> Result<()> {
        match self.regex() {
            Some(Err(e)) => Err(FeedhubError::Filter(format!(
                "invalid pattern {:?}: {e}",
                self.title
            ))),
            _ => Ok(()),
        }
    }

    /// Decide whether the item is junk.
    ///
    /// A pattern that does not compile counts as a non-match, so with
    /// `invert` set every item is junk. `check` reports the compile error.
    pub fn skip(&self, item: &Item) -> bool {
        let matched = match self.regex() {
            None => return false,
            Some(Ok(re)) => re.is_match(&item.title),
            Some(Err(_)) => false,
        };
        matched != self.invert
    }

    fn regex(&self) -> Option<&std::result::Result<Regex, String>> {
        if self.title.is_empty() {
            return None;
        }
        Some(
            self.compiled
                .get_or_init(|| Regex::new(&self.title).map_err(|e| e.to_string())),
        )
    }
}
