//! Reference model for model-based testing.
//!
//! The model is a simplified implementation of paged traversal over a
//! server list that changes between page fetches. It serves as the oracle
//! against which the client's paged collections are verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Positions only: items are small integers, pages are slices
//! - Deterministic: Same inputs produce same outputs

mod list;
pub mod operation;
mod pager;
mod world;

pub use list::{ModelItem, ModelList};
pub use operation::{PagingOp, StepOutcome};
pub use pager::ModelPager;
pub use world::{ModelWorld, ObservableState};
