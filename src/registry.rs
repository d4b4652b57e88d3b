//! Resource naming and the label-scoped lifetime mechanism.
//!
//! [`Locator`] is the name a library/skeleton is looked up by; [`Label`] is
//! the opaque token a caller pushes before creating a batch of resources so
//! they can later be torn down together with a single [`Registry::remove`].

use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashMap;

use crate::id::AnimId;
use crate::utils::interner::{self, Symbol};

static NEXT_NON_SHARED_ID: AtomicU32 = AtomicU32::new(1);

/// A name plus optional signature, used to key shared resources in the
/// registry. Two locators with the same name and signature resolve to the
/// same resource ("create-or-get").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    name: Symbol,
    signature: u32,
}

impl Locator {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Locator {
            name: interner::intern(name),
            signature: 0,
        }
    }

    #[must_use]
    pub fn with_signature(name: &str, signature: u32) -> Self {
        Locator {
            name: interner::intern(name),
            signature,
        }
    }

    /// A locator that never collides with any other, for resources (like
    /// instances) that are never looked up by name but still participate in
    /// label-scoped destruction.
    #[must_use]
    pub fn non_shared() -> Self {
        let unique = NEXT_NON_SHARED_ID.fetch_add(1, Ordering::Relaxed);
        Locator {
            name: interner::intern(&format!("__non_shared_{unique}")),
            signature: unique,
        }
    }
}

/// An opaque token grouping resources for bulk destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Label {
    /// Matches every registered id in [`Registry::remove`], clearing the
    /// registry entirely.
    pub const ALL: Label = Label(u32::MAX);
}

/// A LIFO stack of the currently-active labels.
///
/// New resources are tagged with `peek()`; the host pushes a fresh label
/// before creating a group it wants to destroy together, and pops it once
/// the group is fully created.
pub struct LabelStack {
    next_label: u32,
    stack: Vec<Label>,
}

impl LabelStack {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut stack = Vec::with_capacity(capacity);
        // the bottom of the stack is always the default label, so peek()
        // never has to special-case an empty stack.
        stack.push(Label(0));
        LabelStack { next_label: 1, stack }
    }

    /// Generates a fresh label and pushes it.
    pub fn push_new(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        self.stack.push(label);
        label
    }

    /// Pushes a caller-supplied label.
    pub fn push(&mut self, label: Label) {
        self.stack.push(label);
    }

    /// Pops and returns the top label. Never empties the stack past its
    /// default bottom entry.
    pub fn pop(&mut self) -> Label {
        if self.stack.len() > 1 {
            self.stack.pop().unwrap()
        } else {
            self.stack[0]
        }
    }

    #[must_use]
    pub fn peek(&self) -> Label {
        *self.stack.last().unwrap()
    }
}

/// Bidirectional map from [`Locator`] to [`AnimId`], with ids additionally
/// indexed by the label they were registered under.
#[derive(Default)]
pub struct Registry {
    by_locator: FxHashMap<Locator, AnimId>,
    entries: Vec<(Locator, AnimId, Label)>,
}

impl Registry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Registry {
            by_locator: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            entries: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn lookup(&self, locator: Locator) -> Option<AnimId> {
        self.by_locator.get(&locator).copied()
    }

    pub fn add(&mut self, locator: Locator, id: AnimId, label: Label) {
        self.by_locator.insert(locator, id);
        self.entries.push((locator, id, label));
    }

    /// Removes every id registered under `label` (or, for [`Label::ALL`],
    /// every registered id) and returns them in registration order.
    pub fn remove(&mut self, label: Label) -> Vec<AnimId> {
        if label == Label::ALL {
            let ids: Vec<AnimId> = self.entries.iter().map(|(_, id, _)| *id).collect();
            self.entries.clear();
            self.by_locator.clear();
            return ids;
        }
        let mut removed = Vec::new();
        self.entries.retain(|(locator, id, entry_label)| {
            if *entry_label == label {
                self.by_locator.remove(locator);
                removed.push(*id);
                false
            } else {
                true
            }
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ResourceType;

    #[test]
    fn label_stack_push_pop_roundtrip() {
        let mut stack = LabelStack::new(8);
        let label = stack.push_new();
        assert_eq!(stack.peek(), label);
        assert_eq!(stack.pop(), label);
    }

    #[test]
    fn lookup_is_idempotent_under_same_locator() {
        let mut reg = Registry::new(8);
        let loc = Locator::new("walk");
        let id = AnimId::new(ResourceType::Library, 0, 1);
        reg.add(loc, id, Label::ALL);
        assert_eq!(reg.lookup(loc), Some(id));
        assert_eq!(reg.lookup(Locator::new("walk")), Some(id));
    }

    #[test]
    fn remove_all_clears_registry() {
        let mut reg = Registry::new(8);
        let loc = Locator::new("run");
        let id = AnimId::new(ResourceType::Library, 1, 1);
        reg.add(loc, id, Label(3));
        let removed = reg.remove(Label::ALL);
        assert_eq!(removed, vec![id]);
        assert_eq!(reg.lookup(loc), None);
    }

    #[test]
    fn remove_by_label_only_matches_that_label() {
        let mut reg = Registry::new(8);
        let a = AnimId::new(ResourceType::Library, 0, 1);
        let b = AnimId::new(ResourceType::Library, 1, 1);
        reg.add(Locator::new("a"), a, Label(1));
        reg.add(Locator::new("b"), b, Label(2));
        let removed = reg.remove(Label(1));
        assert_eq!(removed, vec![a]);
        assert_eq!(reg.lookup(Locator::new("a")), None);
        assert_eq!(reg.lookup(Locator::new("b")), Some(b));
    }

    #[test]
    fn remove_unknown_label_is_a_no_op() {
        let mut reg = Registry::new(8);
        reg.add(Locator::new("a"), AnimId::new(ResourceType::Library, 0, 1), Label(1));
        assert!(reg.remove(Label(9)).is_empty());
    }
}
