//! Paged collections.
//!
//! # Paging Protocol
//!
//! The server exposes list resources as `fetch(start) -> page`, where `start`
//! is an absolute position in the server-side list and an empty page marks
//! the end. Pages may overlap when the server list changes under a running
//! traversal (an insert ahead of the cursor shifts items back into the next
//! page).
//!
//! # Invariants
//!
//! - The cursor advances by the raw page length, never by the number of new
//!   items, so it stays aligned with server positions even when a page
//!   contains duplicates
//! - An id enters the cache at most once; the first occurrence wins
//! - The cache only grows, and its order is first-seen server order
//! - Once an empty page is seen, no further fetches happen until
//!   [`PagedCollection::reopen`]
//!
//! # Consistency
//!
//! Paging is best-effort. The server offers no cursor token or version, so
//! items inserted behind the cursor during a traversal are missed, and two
//! collections that share no cache can observe different sequences.
//!
//! # Concurrency
//!
//! Growing the cache is a check-then-fetch-then-append sequence and needs
//! `&mut self`. Read-only access to already cached items goes through
//! [`PagedCollection::cached`]. Share a collection across threads behind a
//! mutex.

use std::{collections::HashSet, fmt};

use thiserror::Error;

use crate::identity::Identified;

/// Boxed page-fetch function: absolute start offset in, one page out.
pub type PageFetch<T, E> = Box<dyn FnMut(u64) -> Result<Vec<T>, E> + Send>;

/// Errors from indexed access.
#[derive(Debug, Error)]
pub enum PageError<E> {
    /// The collection holds fewer distinct items than requested.
    #[error("index {index} out of range for collection of {len} items")]
    Index {
        /// Requested index.
        index: usize,
        /// Distinct items in the fully fetched collection.
        len: usize,
    },

    /// The page-fetch function failed.
    #[error("page fetch failed: {0}")]
    Fetch(#[source] E),
}

/// Lazy, deduplicating view of a server collection.
pub struct PagedCollection<T: Identified, E> {
    /// Injected page fetch.
    fetch: PageFetch<T, E>,

    /// Distinct items in first-seen order.
    items: Vec<T>,

    /// Ids of everything in `items`.
    seen: HashSet<T::Id>,

    /// Absolute server offset of the next page.
    cursor: u64,

    /// An empty page has been observed at `cursor`.
    exhausted: bool,

    /// Number of fetch calls made, successful or not.
    fetch_count: u64,
}

impl<T: Identified, E> PagedCollection<T, E> {
    /// Create an empty collection over the given page fetch.
    pub fn new<F>(fetch: F) -> Self
    where
        F: FnMut(u64) -> Result<Vec<T>, E> + Send + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            items: Vec::new(),
            seen: HashSet::new(),
            cursor: 0,
            exhausted: false,
            fetch_count: 0,
        }
    }

    /// Start a traversal from the first item.
    ///
    /// Cached items are replayed first, then pages are fetched as the
    /// traversal runs past the end of the cache.
    pub fn traverse(&mut self) -> Traversal<'_, T, E> {
        Traversal { collection: self, position: 0, halted: false }
    }

    /// Item at `index` in first-seen order.
    ///
    /// Fetches exactly as many pages as needed to reach `index`.
    ///
    /// # Errors
    ///
    /// - `Index` if the collection ends before `index`
    /// - `Fetch` if a page fetch fails; the cursor is left where it was
    pub fn get(&mut self, index: usize) -> Result<&T, PageError<E>> {
        while self.items.len() <= index {
            if self.exhausted || !self.fetch_next().map_err(PageError::Fetch)? {
                return Err(PageError::Index { index, len: self.items.len() });
            }
        }

        self.items.get(index).ok_or(PageError::Index { index, len: self.items.len() })
    }

    /// Already cached items, without fetching.
    pub fn cached(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of distinct items cached so far.
    pub fn len_cached(&self) -> usize {
        self.items.len()
    }

    /// Absolute server offset the next fetch will request.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Number of fetch calls made so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count
    }

    /// Returns true once the end of the collection has been observed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Forget the end-of-collection marker.
    ///
    /// The next traversal polls the server again at the current cursor and
    /// picks up items appended since. The cache is kept.
    pub fn reopen(&mut self) {
        self.exhausted = false;
    }

    /// Fetch one page at the cursor and merge it into the cache.
    ///
    /// Returns `false` if the page was empty.
    fn fetch_next(&mut self) -> Result<bool, E> {
        let start = self.cursor;
        self.fetch_count += 1;
        let page = (self.fetch)(start)?;

        if page.is_empty() {
            tracing::debug!(start, cached = self.items.len(), "collection exhausted");
            self.exhausted = true;
            return Ok(false);
        }

        let raw = page.len();
        self.cursor += raw as u64;

        let before = self.items.len();
        for item in page {
            if self.seen.insert(item.id()) {
                self.items.push(item);
            }
        }

        tracing::debug!(start, raw, new = self.items.len() - before, "fetched page");
        Ok(true)
    }
}

impl<T: Identified + Clone, E> PagedCollection<T, E> {
    /// Fetch everything and return the distinct items in order.
    ///
    /// # Errors
    ///
    /// The first page-fetch error; items cached before it are kept.
    pub fn collect_all(&mut self) -> Result<Vec<T>, E> {
        self.traverse().collect()
    }
}

impl<T: Identified, E> fmt::Debug for PagedCollection<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedCollection")
            .field("cached", &self.items.len())
            .field("cursor", &self.cursor)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

/// One sequential pass over a [`PagedCollection`].
///
/// Yields `Err` at most once: after a fetch error the traversal ends. A new
/// traversal retries from the last successfully advanced offset.
pub struct Traversal<'a, T: Identified, E> {
    collection: &'a mut PagedCollection<T, E>,
    position: usize,
    halted: bool,
}

impl<T: Identified + Clone, E> Iterator for Traversal<'_, T, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.collection.items.get(self.position) {
                self.position += 1;
                return Some(Ok(item.clone()));
            }

            if self.halted || self.collection.exhausted {
                return None;
            }

            match self.collection.fetch_next() {
                Ok(true) => {},
                Ok(false) => return None,
                Err(e) => {
                    self.halted = true;
                    return Some(Err(e));
                },
            }
        }
    }
}

impl<T: Identified + Clone, E> std::iter::FusedIterator for Traversal<'_, T, E> {}
