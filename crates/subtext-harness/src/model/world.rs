//! Model world - server list plus one client traversal.
//!
//! The world applies operations to the model list and pager. It is the
//! oracle against which the real client and server are verified.

use super::{
    list::{ModelItem, ModelList},
    operation::{PagingOp, StepOutcome},
    pager::ModelPager,
};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Items produced by the traversal, in order.
    pub yielded: Vec<ModelItem>,
    /// Number of items the traversal has produced.
    pub position: usize,
    /// Server position of the next page.
    pub cursor: u64,
    /// Whether an empty page was observed.
    pub exhausted: bool,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    list: ModelList,
    pager: ModelPager,
}

impl ModelWorld {
    /// Create a world with `initial` items and pages of `limit` items.
    pub fn new(initial: usize, limit: usize) -> Self {
        Self { list: ModelList::with_len(initial), pager: ModelPager::new(limit) }
    }

    /// Server list.
    pub fn list(&self) -> &ModelList {
        &self.list
    }

    /// Client traversal.
    pub fn pager(&self) -> &ModelPager {
        &self.pager
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &PagingOp) -> StepOutcome {
        match op {
            PagingOp::Step => self.pager.step(&self.list),
            PagingOp::Insert { position } => {
                self.list.insert(*position);
                StepOutcome::Applied
            },
            PagingOp::Append => {
                self.list.append();
                StepOutcome::Applied
            },
            PagingOp::Remove { position } => {
                self.list.remove(*position);
                StepOutcome::Applied
            },
            PagingOp::FailNextFetch => {
                self.pager.fail_next_fetch();
                StepOutcome::Applied
            },
            PagingOp::Reopen => {
                self.pager.reopen();
                StepOutcome::Applied
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            yielded: self.pager.yielded().to_vec(),
            position: self.pager.position(),
            cursor: self.pager.cursor(),
            exhausted: self.pager.is_exhausted(),
        }
    }
}
