//! Property tests for paged traversal over scripted pages.
//!
//! Pages are generated freely (duplicates within and across pages, empty
//! terminator) so the properties hold for any server behavior, not just a
//! well-behaved one.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use proptest::prelude::*;
use subtext_core::{Identified, PagedCollection};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry(u8);

impl Identified for Entry {
    type Id = u8;

    fn id(&self) -> u8 {
        self.0
    }
}

fn pages_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0..16u8, 1..6), 0..8)
}

fn scripted(pages: Vec<Vec<u8>>) -> (PagedCollection<Entry, String>, Arc<Mutex<Vec<u64>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&calls);
    let mut pages = pages.into_iter();

    let collection = PagedCollection::new(move |start| {
        log.lock().expect("lock").push(start);
        Ok(pages.next().unwrap_or_default().into_iter().map(Entry).collect())
    });

    (collection, calls)
}

proptest! {
    /// Every id is yielded once, in first-seen order.
    #[test]
    fn prop_first_seen_order_without_duplicates(pages in pages_strategy()) {
        let expected: Vec<u8> = {
            let mut seen = HashSet::new();
            pages.iter().flatten().copied().filter(|id| seen.insert(*id)).collect()
        };

        let (mut collection, _) = scripted(pages);
        let items: Vec<u8> = collection.collect_all().expect("traverse").into_iter().map(|e| e.0).collect();

        prop_assert_eq!(items, expected);
    }

    /// Each fetch starts where the previous raw page ended.
    #[test]
    fn prop_offsets_follow_raw_page_lengths(pages in pages_strategy()) {
        let mut expected = vec![0u64];
        for page in &pages {
            let last = *expected.last().unwrap_or(&0);
            expected.push(last + page.len() as u64);
        }

        let (mut collection, calls) = scripted(pages);
        collection.collect_all().expect("traverse");

        prop_assert_eq!(calls.lock().expect("lock").clone(), expected.clone());
        prop_assert_eq!(collection.cursor(), *expected.last().unwrap_or(&0));
        prop_assert!(collection.is_exhausted());
    }

    /// Indexed access agrees with sequential traversal.
    #[test]
    fn prop_get_matches_traversal(pages in pages_strategy(), index in 0..40usize) {
        let (mut sequential, _) = scripted(pages.clone());
        let all = sequential.collect_all().expect("traverse");

        let (mut indexed, _) = scripted(pages);
        match indexed.get(index) {
            Ok(entry) => prop_assert_eq!(Some(entry), all.get(index)),
            Err(_) => prop_assert!(index >= all.len()),
        }
    }
}
