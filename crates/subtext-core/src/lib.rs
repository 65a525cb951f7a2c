//! Subtext Core
//!
//! Lazy, deduplicating traversal over server collections that can only be
//! read in bounded pages.
//!
//! # Architecture
//!
//! A [`PagedCollection`] owns a single injected page-fetch function and a
//! growing cache of everything the server has yielded so far. It never
//! performs I/O itself: the fetch function is the only side-effecting part,
//! which makes the paging logic fully testable with scripted pages.
//!
//! # Components
//!
//! - [`Identified`]: Identity extraction used for deduplication
//! - [`PagedCollection`]: Cache, cursor and indexed access
//! - [`Traversal`]: Restartable sequential iterator over a collection
//! - [`PageError`]: Index and fetch failures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod identity;
pub mod paged;

pub use identity::Identified;
pub use paged::{PageError, PageFetch, PagedCollection, Traversal};
