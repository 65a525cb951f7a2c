//! Model server list.

/// Item identity in the model. Assigned sequentially, never reused.
pub type ModelItem = u32;

/// Server-side list in the model.
///
/// Positions are absolute. A page is the slice starting at `start`,
/// at most `limit` long, empty past the end.
#[derive(Debug, Clone, Default)]
pub struct ModelList {
    items: Vec<ModelItem>,
    next: ModelItem,
}

impl ModelList {
    /// Create a list holding `len` items numbered from zero.
    pub fn with_len(len: usize) -> Self {
        let mut list = Self::default();
        for _ in 0..len {
            list.append();
        }
        list
    }

    /// Items in server order.
    pub fn items(&self) -> &[ModelItem] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a fresh item and return it.
    pub fn append(&mut self) -> ModelItem {
        let item = self.fresh();
        self.items.push(item);
        item
    }

    /// Insert a fresh item at `position % (len + 1)` and return it with the
    /// position used.
    pub fn insert(&mut self, position: u8) -> (ModelItem, usize) {
        let index = usize::from(position) % (self.items.len() + 1);
        let item = self.fresh();
        self.items.insert(index, item);
        (item, index)
    }

    /// Remove the item at `position % len`. Returns the removed item and its
    /// position, or `None` if the list is empty.
    pub fn remove(&mut self, position: u8) -> Option<(ModelItem, usize)> {
        if self.items.is_empty() {
            return None;
        }
        let index = usize::from(position) % self.items.len();
        Some((self.items.remove(index), index))
    }

    /// Page starting at `start`.
    pub fn page(&self, start: u64, limit: usize) -> &[ModelItem] {
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(self.items.len());
        let end = start.saturating_add(limit).min(self.items.len());
        &self.items[start..end]
    }

    fn fresh(&mut self) -> ModelItem {
        let item = self.next;
        self.next += 1;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_past_end_are_empty() {
        let list = ModelList::with_len(3);

        assert_eq!(list.page(0, 2), &[0, 1]);
        assert_eq!(list.page(2, 2), &[2]);
        assert!(list.page(3, 2).is_empty());
        assert!(list.page(u64::MAX, 2).is_empty());
    }

    #[test]
    fn insert_and_remove_wrap_positions() {
        let mut list = ModelList::with_len(2);

        assert_eq!(list.insert(5), (2, 2));
        assert_eq!(list.items(), &[0, 1, 2]);
        assert_eq!(list.remove(4), Some((1, 1)));
        assert_eq!(list.items(), &[0, 2]);
    }
}
