//! Fuzz target for paged traversal under concurrent list mutation
//!
//! # Strategy
//!
//! - Arbitrary interleavings of traversal steps, inserts, appends, removals,
//!   injected fetch failures and reopens
//! - Small page limits so mutations land inside and between pages
//!
//! # Invariants
//!
//! - The real client and the reference model agree on every step outcome
//! - Observable state (yielded items, read position, cursor, exhaustion)
//!   never diverges
//! - No item is yielded twice
//! - NEVER panic

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use subtext_harness::{ClientWorld, ModelWorld, PagingOp};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    seed: u64,
    initial: u8,
    limit: u8,
    ops: Vec<PagingOp>,
}

fuzz_target!(|input: FuzzInput| {
    let initial = usize::from(input.initial % 32);
    let limit = usize::from(input.limit % 6) + 1;

    let mut model = ModelWorld::new(initial, limit);
    let mut real = ClientWorld::new(initial, limit, input.seed).expect("client world");

    for op in input.ops.iter().take(256) {
        assert_eq!(model.apply(op), real.apply(op), "divergence on {op:?}");
    }

    let state = real.observable_state();
    assert_eq!(model.observable_state(), state);

    let unique: HashSet<_> = state.yielded.iter().collect();
    assert_eq!(unique.len(), state.yielded.len());
    assert!(state.position <= state.yielded.len());
});
