//! Operations for model-based testing.
//!
//! Operations interleave reads of a running traversal with mutations of the
//! server-side list. They are generated randomly by proptest (or decoded by
//! the fuzzer) and applied to both the model and the real client.

use arbitrary::Arbitrary;

use super::list::ModelItem;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum PagingOp {
    /// Read the next item of the traversal, fetching pages as needed.
    Step,

    /// Insert a new item into the server list.
    Insert {
        /// Position hint (taken modulo `len + 1`).
        position: u8,
    },

    /// Append a new item to the server list.
    Append,

    /// Remove an item from the server list.
    ///
    /// Removing behind the cursor can make the traversal skip an item.
    Remove {
        /// Position hint (taken modulo `len`).
        position: u8,
    },

    /// Make the next page fetch fail.
    FailNextFetch,

    /// Clear the exhausted flag so the traversal re-checks the server.
    Reopen,
}

impl PagingOp {
    /// Returns true for operations that can make a traversal miss items.
    pub fn may_skip(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The traversal produced an item.
    Item(ModelItem),

    /// The traversal is at its end.
    End,

    /// The page fetch failed; nothing was consumed.
    FetchFailed,

    /// The operation mutated the server or the collection.
    Applied,
}
