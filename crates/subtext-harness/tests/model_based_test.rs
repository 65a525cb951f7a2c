//! Model-based property tests.
//!
//! These tests generate random interleavings of traversal steps and server
//! list mutations and verify that the real client behaves identically to
//! the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<PagingOp>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    ClientWorld     Compare
//!      (reference)   (SimServer)     Results
//! ```

use std::collections::HashSet;

use proptest::prelude::*;
use subtext_harness::{ClientWorld, ModelWorld, PagingOp, StepOutcome};

/// Strategy for generating operations.
fn operation_strategy() -> impl Strategy<Value = PagingOp> {
    prop_oneof![
        // Weight towards reads so traversals make progress
        6 => Just(PagingOp::Step),
        2 => any::<u8>().prop_map(|position| PagingOp::Insert { position }),
        1 => Just(PagingOp::Append),
        1 => any::<u8>().prop_map(|position| PagingOp::Remove { position }),
        1 => Just(PagingOp::FailNextFetch),
        1 => Just(PagingOp::Reopen),
    ]
}

/// Operations that never remove items.
fn insert_only_strategy() -> impl Strategy<Value = PagingOp> {
    prop_oneof![
        4 => Just(PagingOp::Step),
        2 => any::<u8>().prop_map(|position| PagingOp::Insert { position }),
        1 => Just(PagingOp::Append),
        1 => Just(PagingOp::FailNextFetch),
    ]
}

/// Step until the traversal ends, retrying failed fetches.
fn drain(model: &mut ModelWorld) {
    for _ in 0..1_000 {
        match model.apply(&PagingOp::Step) {
            StepOutcome::End => return,
            StepOutcome::Item(_) | StepOutcome::FetchFailed | StepOutcome::Applied => {},
        }
    }
}

proptest! {
    /// Verify that step results and observable state match between model
    /// and real client after every operation.
    #[test]
    fn prop_model_matches_real(
        seed in any::<u64>(),
        initial in 0..12usize,
        limit in 1..5usize,
        ops in prop::collection::vec(operation_strategy(), 0..60)
    ) {
        let mut model = ModelWorld::new(initial, limit);
        let mut real = ClientWorld::new(initial, limit, seed).expect("client world");

        for (i, op) in ops.iter().enumerate() {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(
                model_result,
                real_result,
                "Divergence at operation {}: {:?}",
                i, op
            );
            prop_assert_eq!(model.observable_state(), real.observable_state());
        }
    }

    /// A traversal never yields the same item twice.
    #[test]
    fn prop_no_duplicates(
        initial in 0..12usize,
        limit in 1..5usize,
        ops in prop::collection::vec(operation_strategy(), 0..80)
    ) {
        let mut model = ModelWorld::new(initial, limit);
        for op in &ops {
            model.apply(op);
        }
        drain(&mut model);

        let yielded = model.pager().yielded();
        let unique: HashSet<_> = yielded.iter().collect();
        prop_assert_eq!(unique.len(), yielded.len());
    }

    /// Without removals, every item present when the traversal started is
    /// eventually yielded.
    #[test]
    fn prop_inserts_never_hide_original_items(
        initial in 0..12usize,
        limit in 1..5usize,
        ops in prop::collection::vec(insert_only_strategy(), 0..80)
    ) {
        prop_assume!(ops.iter().all(|op| !op.may_skip()));

        let mut model = ModelWorld::new(initial, limit);
        let original: Vec<u32> = model.list().items().to_vec();
        for op in &ops {
            model.apply(op);
        }
        drain(&mut model);

        let yielded: HashSet<_> = model.pager().yielded().iter().copied().collect();
        for item in original {
            prop_assert!(yielded.contains(&item), "item {} was skipped", item);
        }
    }

    /// Items appear in the order the server listed them when first seen.
    #[test]
    fn prop_without_mutation_yields_server_order(
        initial in 0..30usize,
        limit in 1..7usize,
    ) {
        let mut model = ModelWorld::new(initial, limit);
        drain(&mut model);

        prop_assert_eq!(model.pager().yielded(), model.list().items());
        prop_assert_eq!(model.pager().cursor(), initial as u64);
    }
}

#[test]
fn model_and_real_agree_on_overlap_scenario() {
    let ops = [
        PagingOp::Step,
        PagingOp::Insert { position: 0 },
        PagingOp::Step,
        PagingOp::Step,
        PagingOp::Step,
    ];
    let mut model = ModelWorld::new(3, 2);
    let mut real = ClientWorld::new(3, 2, 42).expect("client world");

    let outcomes: Vec<StepOutcome> = ops.iter().map(|op| model.apply(op)).collect();
    for op in &ops {
        real.apply(op);
    }

    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Item(0),
            StepOutcome::Applied,
            StepOutcome::Item(1),
            StepOutcome::Item(2),
            StepOutcome::End,
        ]
    );
    assert_eq!(model.observable_state(), real.observable_state());
    assert_eq!(model.observable_state().cursor, 4);
    assert_eq!(model.observable_state().position, 3);
}
