//! Deterministic test harness for the Subtext client.
//!
//! An in-memory implementation of the REST surface behind the client's
//! `Transport` trait, for deterministic, reproducible tests of logins,
//! relationship lists, boards and paged traversal under concurrent list
//! mutation.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of paged
//! traversal. Operations are applied to both the model and the real client
//! against a [`SimServer`], and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client_world;
pub mod model;
pub mod sim_server;

pub use client_world::ClientWorld;
pub use model::{
    ModelItem, ModelList, ModelPager, ModelWorld, ObservableState, PagingOp, StepOutcome,
};
pub use sim_server::{SharedSimServer, SimConfig, SimMessage, SimServer, create_shared_server};
