//! Randomized balanced search tree (treap) ordered by key.
//!
//! Nodes are ordered by key (binary search tree) and by an independent
//! random priority (max-heap), which bounds the height at O(log n) with
//! high probability regardless of insertion order.
//!
//! Nodes live in a flat arena and refer to each other by index. Each node
//! owns its children through the tree shape and keeps a non-owning parent
//! index used for cursor stepping. Erased nodes are removed with
//! `swap_remove`, so the arena never holds dead slots.
//!
//! The container behaves as a set: inserting an existing key is a no-op and
//! erasing a missing key is a no-op.

use std::cmp::Ordering;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    priority: u64,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

/// Which side of a split the pivot key itself lands on.
#[derive(Debug, Clone, Copy)]
enum Pivot {
    /// Left part holds keys `<= pivot`.
    Inclusive,
    /// Left part holds keys `< pivot`.
    Exclusive,
}

/// An ordered set of keys with attached values, balanced by random priorities.
pub struct Treap<K, V> {
    nodes: Vec<Node<K, V>>,
    root: Option<NodeId>,
    begin: Option<NodeId>,
    end: Option<NodeId>,
    rng: StdRng,
}

impl<K: Ord, V> Default for Treap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> Treap<K, V> {
    /// Create an empty treap with priorities drawn from an OS-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_rng(&mut rand::rng()))
    }

    /// Create an empty treap with a deterministic priority sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            begin: None,
            end: None,
            rng,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the treap holds no entries.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.begin = None;
        self.end = None;
    }

    /// Insert `value` under `key`.
    ///
    /// Returns `false` and leaves the treap untouched if `key` is already
    /// present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.contains(&key) {
            return false;
        }

        let root = self.root.take();
        let (less, greater) = self.split(root, &key, Pivot::Inclusive);

        let id = NodeId(self.nodes.len());
        let priority = self.rng.random();
        self.nodes.push(Node {
            key,
            value,
            priority,
            left: None,
            right: None,
            parent: None,
        });

        let left = self.join(less, Some(id));
        let root = self.join(left, greater);
        self.set_root(root);
        self.refresh_bounds();
        true
    }

    /// Erase the entry stored under `key`, returning its value.
    ///
    /// Returns `None` and leaves the treap untouched if `key` is absent.
    pub fn erase(&mut self, key: &K) -> Option<V> {
        self.find(key)?;

        let root = self.root.take();
        let (at_most, greater) = self.split(root, key, Pivot::Inclusive);
        let (less, target) = self.split(at_most, key, Pivot::Exclusive);

        let root = self.join(less, greater);
        self.set_root(root);

        let removed = target.map(|id| {
            debug_assert!(
                self.nodes[id.0].left.is_none() && self.nodes[id.0].right.is_none(),
                "erase isolated more than one node"
            );
            self.release(id)
        });
        self.refresh_bounds();
        removed.map(|node| node.value)
    }

    /// Remove and return the entry with the smallest key.
    pub fn pop_first(&mut self) -> Option<(K, V)>
    where
        K: Clone,
    {
        let key = self.begin?;
        let key = self.nodes[key.0].key.clone();
        self.erase(&key).map(|value| (key, value))
    }

    /// Whether an entry is stored under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|id| &self.nodes[id.0].value)
    }

    /// Cursor at the entry with the smallest key, `None` iff empty.
    pub fn begin(&self) -> Option<Cursor<'_, K, V>> {
        self.begin.map(|id| Cursor { treap: self, id })
    }

    /// Cursor at the entry with the largest key, `None` iff empty.
    pub fn end(&self) -> Option<Cursor<'_, K, V>> {
        self.end.map(|id| Cursor { treap: self, id })
    }

    /// In-order iterator over `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cursor: self.begin(),
            remaining: self.len(),
        }
    }

    /// Length of the longest root-to-leaf path (0 for an empty treap).
    pub fn height(&self) -> usize {
        self.subtree_height(self.root)
    }

    /// Verify ordering, heap, parent-link and cache invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let Some(root) = self.root else {
            if self.is_empty() && self.begin.is_none() && self.end.is_none() {
                return Ok(());
            }
            return Err(Error::InvariantViolated(
                "empty root with non-empty arena or cached bounds".to_string(),
            ));
        };

        if self.nodes[root.0].parent.is_some() {
            return Err(Error::InvariantViolated("root has a parent".to_string()));
        }

        let mut visited = 0usize;
        let mut previous: Option<NodeId> = None;
        let mut stack = Vec::new();
        let mut current = Some(root);

        while current.is_some() || !stack.is_empty() {
            while let Some(id) = current {
                stack.push(id);
                current = self.nodes[id.0].left;
            }
            let Some(id) = stack.pop() else { break };
            let node = &self.nodes[id.0];

            for child in [node.left, node.right].into_iter().flatten() {
                let child_node = &self.nodes[child.0];
                if child_node.parent != Some(id) {
                    return Err(Error::InvariantViolated(format!(
                        "node {} does not point back to its parent {}",
                        child.0, id.0
                    )));
                }
                if child_node.priority > node.priority {
                    return Err(Error::InvariantViolated(format!(
                        "heap order broken between {} and child {}",
                        id.0, child.0
                    )));
                }
            }

            if let Some(prev) = previous
                && self.nodes[prev.0].key >= node.key
            {
                return Err(Error::InvariantViolated(format!(
                    "in-order keys not strictly increasing at node {}",
                    id.0
                )));
            }

            if previous.is_none() && self.begin != Some(id) {
                return Err(Error::InvariantViolated("stale begin cache".to_string()));
            }

            previous = Some(id);
            visited += 1;
            current = node.right;
        }

        if self.end != previous {
            return Err(Error::InvariantViolated("stale end cache".to_string()));
        }
        if visited != self.nodes.len() {
            return Err(Error::InvariantViolated(format!(
                "{} nodes reachable from root but {} allocated",
                visited,
                self.nodes.len()
            )));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Core algorithms
    // ─────────────────────────────────────────────────────────────────────

    /// Merge two subtrees where every key in `left` precedes every key in `right`.
    fn merge(&mut self, left: Option<NodeId>, right: Option<NodeId>) -> Option<NodeId> {
        let (l, r) = match (left, right) {
            (None, right) => return right,
            (left, None) => return left,
            (Some(l), Some(r)) => (l, r),
        };

        if self.nodes[l.0].priority > self.nodes[r.0].priority {
            let l_right = self.nodes[l.0].right;
            let merged = self.merge(l_right, Some(r));
            self.attach_right(l, merged);
            Some(l)
        } else {
            let r_left = self.nodes[r.0].left;
            let merged = self.merge(Some(l), r_left);
            self.attach_left(r, merged);
            Some(r)
        }
    }

    /// Partition a subtree around `pivot`.
    fn split(
        &mut self,
        node: Option<NodeId>,
        pivot: &K,
        side: Pivot,
    ) -> (Option<NodeId>, Option<NodeId>) {
        let Some(id) = node else {
            return (None, None);
        };

        let goes_left = match (self.nodes[id.0].key.cmp(pivot), side) {
            (Ordering::Less, _) | (Ordering::Equal, Pivot::Inclusive) => true,
            (Ordering::Greater, _) | (Ordering::Equal, Pivot::Exclusive) => false,
        };

        if goes_left {
            let right = self.nodes[id.0].right;
            let (l, r) = self.split(right, pivot, side);
            self.attach_right(id, l);
            (Some(id), r)
        } else {
            let left = self.nodes[id.0].left;
            let (l, r) = self.split(left, pivot, side);
            self.attach_left(id, r);
            (l, Some(id))
        }
    }

    /// Top-level merge that checks the key-ordering precondition in debug builds.
    fn join(&mut self, left: Option<NodeId>, right: Option<NodeId>) -> Option<NodeId> {
        debug_assert!(
            match (self.rightmost(left), self.leftmost(right)) {
                (Some(max), Some(min)) => self.nodes[max.0].key < self.nodes[min.0].key,
                _ => true,
            },
            "merge called with overlapping key ranges"
        );
        self.merge(left, right)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Link maintenance
    // ─────────────────────────────────────────────────────────────────────

    fn attach_left(&mut self, parent: NodeId, child: Option<NodeId>) {
        self.nodes[parent.0].left = child;
        if let Some(child) = child {
            self.nodes[child.0].parent = Some(parent);
        }
    }

    fn attach_right(&mut self, parent: NodeId, child: Option<NodeId>) {
        self.nodes[parent.0].right = child;
        if let Some(child) = child {
            self.nodes[child.0].parent = Some(parent);
        }
    }

    fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
        if let Some(root) = root {
            self.nodes[root.0].parent = None;
        }
    }

    fn refresh_bounds(&mut self) {
        self.begin = self.leftmost(self.root);
        self.end = self.rightmost(self.root);
    }

    /// Remove a detached node from the arena.
    ///
    /// The last node is moved into the freed slot, so every link that
    /// referred to the old last index is rewritten.
    fn release(&mut self, id: NodeId) -> Node<K, V> {
        let last = NodeId(self.nodes.len() - 1);
        let removed = self.nodes.swap_remove(id.0);
        if id == last {
            return removed;
        }

        let moved = &self.nodes[id.0];
        let (parent, left, right) = (moved.parent, moved.left, moved.right);

        if let Some(parent) = parent {
            let parent = &mut self.nodes[parent.0];
            if parent.left == Some(last) {
                parent.left = Some(id);
            } else if parent.right == Some(last) {
                parent.right = Some(id);
            }
        }
        for child in [left, right].into_iter().flatten() {
            self.nodes[child.0].parent = Some(id);
        }
        if self.root == Some(last) {
            self.root = Some(id);
        }
        if self.begin == Some(last) {
            self.begin = Some(id);
        }
        if self.end == Some(last) {
            self.end = Some(id);
        }
        removed
    }

    // ─────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────

    /// Walk from the root toward `key`, stopping at the match or at the
    /// node that would be its parent.
    fn find(&self, key: &K) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            let node = &self.nodes[current.0];
            let next = match key.cmp(&node.key) {
                Ordering::Equal => return Some(current),
                Ordering::Greater => node.right,
                Ordering::Less => node.left,
            };
            current = next?;
        }
    }

    fn leftmost(&self, mut node: Option<NodeId>) -> Option<NodeId> {
        while let Some(left) = node.and_then(|id| self.nodes[id.0].left) {
            node = Some(left);
        }
        node
    }

    fn rightmost(&self, mut node: Option<NodeId>) -> Option<NodeId> {
        while let Some(right) = node.and_then(|id| self.nodes[id.0].right) {
            node = Some(right);
        }
        node
    }

    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.nodes[id.0].right {
            return self.leftmost(Some(right));
        }
        let mut child = id;
        let mut parent = self.nodes[id.0].parent;
        while let Some(p) = parent {
            if self.nodes[p.0].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p.0].parent;
        }
        None
    }

    fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(left) = self.nodes[id.0].left {
            return self.rightmost(Some(left));
        }
        let mut child = id;
        let mut parent = self.nodes[id.0].parent;
        while let Some(p) = parent {
            if self.nodes[p.0].right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p.0].parent;
        }
        None
    }

    fn subtree_height(&self, node: Option<NodeId>) -> usize {
        match node {
            None => 0,
            Some(id) => {
                let node = &self.nodes[id.0];
                1 + self
                    .subtree_height(node.left)
                    .max(self.subtree_height(node.right))
            }
        }
    }
}

impl<K: Ord, V> Extend<(K, V)> for Treap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for Treap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut treap = Self::new();
        treap.extend(iter);
        treap
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for Treap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a Treap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-only position inside a [`Treap`].
///
/// A cursor borrows the treap, so it cannot outlive a mutation.
pub struct Cursor<'a, K, V> {
    treap: &'a Treap<K, V>,
    id: NodeId,
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<'_, K, V> {}

impl<'a, K: Ord, V> Cursor<'a, K, V> {
    /// Key at this position.
    pub fn key(&self) -> &'a K {
        &self.treap.nodes[self.id.0].key
    }

    /// Value at this position.
    pub fn value(&self) -> &'a V {
        &self.treap.nodes[self.id.0].value
    }

    /// Balancing priority of the node at this position.
    pub fn priority(&self) -> u64 {
        self.treap.nodes[self.id.0].priority
    }

    /// Cursor at the next larger key.
    pub fn successor(&self) -> Option<Self> {
        self.treap.successor(self.id).map(|id| Cursor {
            treap: self.treap,
            id,
        })
    }

    /// Cursor at the next smaller key.
    pub fn predecessor(&self) -> Option<Self> {
        self.treap.predecessor(self.id).map(|id| Cursor {
            treap: self.treap,
            id,
        })
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("key", self.key())
            .field("value", self.value())
            .finish()
    }
}

/// In-order iterator over a [`Treap`], driven by cursor stepping.
pub struct Iter<'a, K, V> {
    cursor: Option<Cursor<'a, K, V>>,
    remaining: usize,
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor?;
        self.cursor = cursor.successor();
        self.remaining = self.remaining.saturating_sub(1);
        Some((cursor.key(), cursor.value()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Ord, V> ExactSizeIterator for Iter<'_, K, V> {}


/// Property-based tests for treap invariants.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone)]
    enum Op {
        Insert(i16),
        Erase(i16),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-64i16..64).prop_map(Op::Insert),
            (-64i16..64).prop_map(Op::Erase),
        ]
    }

    proptest! {
        /// Property: any insert/erase sequence keeps BST, heap, parent and cache invariants
        /// and matches a reference ordered set.
        #[test]
        fn invariants_hold_under_random_ops(
            seed in any::<u64>(),
            ops in prop::collection::vec(op_strategy(), 0..200),
        ) {
            let mut treap = Treap::with_seed(seed);
            let mut reference = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Insert(k) => {
                        prop_assert_eq!(treap.insert(k, ()), reference.insert(k));
                    }
                    Op::Erase(k) => {
                        prop_assert_eq!(treap.erase(&k).is_some(), reference.remove(&k));
                    }
                }
                prop_assert!(treap.check_invariants().is_ok(), "{:?}", treap.check_invariants());
                prop_assert_eq!(treap.begin().map(|c| *c.key()), reference.first().copied());
                prop_assert_eq!(treap.end().map(|c| *c.key()), reference.last().copied());
            }

            let keys: Vec<i16> = treap.iter().map(|(k, _)| *k).collect();
            let expected: Vec<i16> = reference.into_iter().collect();
            prop_assert_eq!(keys, expected);
        }

        /// Property: inserting a key twice leaves the same key set as inserting it once.
        #[test]
        fn insert_is_idempotent(items in prop::collection::vec(-100i32..100, 0..50), dup in -100i32..100) {
            let mut once: Treap<i32, ()> = items.iter().map(|&k| (k, ())).collect();
            once.insert(dup, ());
            let mut twice: Treap<i32, ()> = items.iter().map(|&k| (k, ())).collect();
            twice.insert(dup, ());
            twice.insert(dup, ());

            let a: Vec<i32> = once.iter().map(|(k, _)| *k).collect();
            let b: Vec<i32> = twice.iter().map(|(k, _)| *k).collect();
            prop_assert_eq!(a, b);
        }

        /// Property: contains agrees with membership for present and absent keys.
        #[test]
        fn contains_matches_membership(items in prop::collection::btree_set(-500i32..500, 0..100), needle in -500i32..500) {
            let treap: Treap<i32, ()> = items.iter().map(|&k| (k, ())).collect();
            prop_assert_eq!(treap.contains(&needle), items.contains(&needle));
        }
    }
}
