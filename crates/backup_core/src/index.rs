use std::collections::HashSet;

use crate::Item;

/// Ordered, question-unique collection of items for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIndex {
    items: Vec<Item>,
}

impl ItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a loaded sequence. Later duplicates of a question
    /// are dropped; the number dropped is returned alongside.
    pub fn from_items(items: Vec<Item>) -> (Self, usize) {
        let total = items.len();
        let mut index = Self::new();
        let kept = index.merge(items);
        (index, total - kept)
    }

    /// Append every item whose question is not yet present, in the given order.
    /// Returns how many items were appended.
    pub fn merge(&mut self, discovered: impl IntoIterator<Item = Item>) -> usize {
        let mut seen: HashSet<String> = self.questions().map(str::to_owned).collect();
        let before = self.items.len();
        for item in discovered {
            if seen.insert(item.question.clone()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    pub fn contains(&self, question: &str) -> bool {
        self.items.iter().any(|item| item.question == question)
    }

    pub fn questions(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.question.as_str())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Item> {
        self.items.get_mut(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

/// Sequence form of [`ItemIndex::merge`].
pub fn merge(existing: Vec<Item>, discovered: Vec<Item>) -> Vec<Item> {
    let (mut index, _) = ItemIndex::from_items(existing);
    index.merge(discovered);
    index.into_items()
}
