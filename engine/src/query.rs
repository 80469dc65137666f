//! Query inputs for the persistent store.

use serde::{Deserialize, Serialize};

/// Which end of the Collection index `get_one` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryOne {
    First,
    Last,
}

/// Skip-then-limit window for `get_all`.
///
/// `limit == 0` means unbounded, in which case `page` has no effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub limit: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }
    }

    /// Number of matching keys to skip.
    pub fn start(&self) -> usize {
        self.page.saturating_mul(self.limit)
    }

    /// Exclusive end of the window, `None` when unbounded.
    pub fn end(&self) -> Option<usize> {
        (self.limit > 0).then(|| self.start().saturating_add(self.limit))
    }
}
