//! Model traversal.

use std::collections::HashSet;

use super::{list::ModelItem, list::ModelList, operation::StepOutcome};

/// Reference paged traversal.
///
/// Holds what a client has seen: the deduplicated items in first-seen order,
/// the read position within them, the cursor into the server list and
/// whether an empty page was observed.
#[derive(Debug, Clone)]
pub struct ModelPager {
    limit: usize,
    yielded: Vec<ModelItem>,
    position: usize,
    seen: HashSet<ModelItem>,
    cursor: u64,
    exhausted: bool,
    pending_failures: usize,
}

impl ModelPager {
    /// Create a pager that asks for pages of `limit` items.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            yielded: Vec::new(),
            position: 0,
            seen: HashSet::new(),
            cursor: 0,
            exhausted: false,
            pending_failures: 0,
        }
    }

    /// Items produced so far.
    pub fn yielded(&self) -> &[ModelItem] {
        &self.yielded
    }

    /// Number of items produced by `step` so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Server position of the next page.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Whether an empty page was observed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Make the next fetch fail.
    pub fn fail_next_fetch(&mut self) {
        self.pending_failures += 1;
    }

    /// Forget exhaustion.
    pub fn reopen(&mut self) {
        self.exhausted = false;
    }

    /// Produce the next item, fetching from `list` as needed.
    pub fn step(&mut self, list: &ModelList) -> StepOutcome {
        loop {
            if let Some(item) = self.yielded.get(self.position) {
                self.position += 1;
                return StepOutcome::Item(*item);
            }
            if self.exhausted {
                return StepOutcome::End;
            }
            if self.pending_failures > 0 {
                self.pending_failures -= 1;
                return StepOutcome::FetchFailed;
            }

            let page = list.page(self.cursor, self.limit);
            if page.is_empty() {
                self.exhausted = true;
                return StepOutcome::End;
            }

            self.cursor += page.len() as u64;
            for item in page {
                if self.seen.insert(*item) {
                    self.yielded.push(*item);
                }
            }
        }
    }
}
