//! `V8gHashTrie<K, V>` - 64-ary hash-indexed trie with copy-on-write `Arc`
//! subtree sharing, grounded on
//! `original_source/include/voxen/common/v8g_hash_trie.hpp`.
//!
//! Keys are routed by a 64-bit hash the caller supplies via [`TrieHash`]
//! ("strict no-collision assumption" per spec §4.G - two distinct keys must
//! never produce the same hash). The root consumes 4 bits (16 slots); every
//! level below consumes 6 bits (64-ary), for 1 + 10 = 11 levels covering all
//! 64 hash bits exactly (`4 + 10*6 == 64`).
//!
//! Unlike a fixed-depth trie, branches are created lazily: a slot holds a
//! leaf directly until a second, diverging hash needs to share that slot, at
//! which point the leaf is pushed one level deeper. This keeps sparse tries
//! shallow while still guaranteeing termination (two different 64-bit hashes
//! must diverge at or before level 10).

use crate::v8g::policy::{Immutable, Policy};
use std::marker::PhantomData;
use std::sync::Arc;

/// Implemented by key types to provide the 64-bit routing hash. The trie
/// never re-hashes; it trusts this value completely.
pub trait TrieHash {
    fn trie_hash(&self) -> u64;
}

impl TrieHash for u64 {
    fn trie_hash(&self) -> u64 {
        *self
    }
}

const MAX_LEVEL: usize = 10;

fn chunk(hash: u64, level: usize) -> usize {
    if level == 0 {
        (hash >> 60) as usize & 0xF
    } else {
        let shift = 60 - 6 * level;
        (hash >> shift) as usize & 0x3F
    }
}

struct Leaf<K, V> {
    version: u64,
    hash: u64,
    key: K,
    value: Arc<V>,
}

impl<K: Clone, V> Clone for Leaf<K, V> {
    fn clone(&self) -> Self {
        Self { version: self.version, hash: self.hash, key: self.key.clone(), value: self.value.clone() }
    }
}

struct Branch<K, V> {
    bitmap: u64,
    children: Vec<Arc<Node<K, V>>>,
}

impl<K, V> Clone for Branch<K, V> {
    fn clone(&self) -> Self {
        Self { bitmap: self.bitmap, children: self.children.clone() }
    }
}

impl<K, V> Branch<K, V> {
    fn empty() -> Self {
        Self { bitmap: 0, children: Vec::new() }
    }

    fn dense_index(&self, slot: usize) -> usize {
        (self.bitmap & ((1u64 << slot) - 1)).count_ones() as usize
    }

    fn get(&self, slot: usize) -> Option<&Arc<Node<K, V>>> {
        if self.bitmap & (1 << slot) == 0 {
            None
        } else {
            Some(&self.children[self.dense_index(slot)])
        }
    }

    fn set(&mut self, slot: usize, node: Arc<Node<K, V>>) {
        let idx = self.dense_index(slot);
        if self.bitmap & (1 << slot) == 0 {
            self.children.insert(idx, node);
            self.bitmap |= 1 << slot;
        } else {
            self.children[idx] = node;
        }
    }

    fn remove(&mut self, slot: usize) -> bool {
        if self.bitmap & (1 << slot) == 0 {
            return false;
        }
        let idx = self.dense_index(slot);
        self.children.remove(idx);
        self.bitmap &= !(1 << slot);
        true
    }

    fn is_empty(&self) -> bool {
        self.bitmap == 0
    }

    /// If exactly one child remains and it is a leaf, returns it so the
    /// caller can collapse this branch back into a bare leaf slot.
    fn single_leaf(&self) -> Option<Leaf<K, V>>
    where
        K: Clone,
    {
        if self.children.len() == 1 {
            if let Node::Leaf(leaf) = &*self.children[0] {
                return Some(leaf.clone());
            }
        }
        None
    }
}

enum Node<K, V> {
    Leaf(Leaf<K, V>),
    Branch(Branch<K, V>),
}

/// Copy-on-write 64-ary hash trie. Cloning a `V8gHashTrie` is an O(1)
/// pointer-assignment (shared root), matching spec §4.G "Copy is pointer
/// assignment".
///
/// `P` is a storage policy marker from [`crate::v8g::policy`] (defaulting to
/// [`Immutable`]). Unlike [`crate::v8g::V8gFlatMap`] there is no in-place
/// mutable accessor here to gate, so the parameter only documents intent for
/// this container - but it is still a real type parameter callers declare
/// (`V8gHashTrie<K, V, policy::Shared>`), not a marker with nowhere to go.
pub struct V8gHashTrie<K, V, P: Policy = Immutable> {
    root: Option<Arc<Node<K, V>>>,
    _policy: PhantomData<P>,
}

impl<K, V, P: Policy> Clone for V8gHashTrie<K, V, P> {
    fn clone(&self) -> Self {
        Self { root: self.root.clone(), _policy: PhantomData }
    }
}

impl<K: Clone + Eq, V, P: Policy> Default for V8gHashTrie<K, V, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq, V, P: Policy> V8gHashTrie<K, V, P> {
    pub fn new() -> Self {
        Self { root: None, _policy: PhantomData }
    }

    pub fn insert(&mut self, timeline: u64, key: K, value: V)
    where
        K: TrieHash,
    {
        let hash = key.trie_hash();
        let value = Arc::new(value);
        self.root = Some(insert_rec(self.root.take(), 0, timeline, hash, key, value));
    }

    pub fn erase(&mut self, key: &K)
    where
        K: TrieHash,
    {
        let hash = key.trie_hash();
        self.root = erase_rec(self.root.take(), 0, hash);
    }

    pub fn find(&self, key: &K) -> Option<&Arc<V>>
    where
        K: TrieHash,
    {
        let hash = key.trie_hash();
        let mut node = self.root.as_ref()?;
        let mut level = 0;
        loop {
            match &**node {
                Node::Leaf(leaf) => {
                    return if leaf.hash == hash { Some(&leaf.value) } else { None };
                }
                Node::Branch(branch) => {
                    node = branch.get(chunk(hash, level))?;
                    level += 1;
                }
            }
        }
    }

    /// Stateless in-hash-order iteration: returns the first leaf.
    pub fn find_first(&self) -> Option<(&K, &Arc<V>)> {
        find_extreme(self.root.as_ref(), true)
    }

    /// Returns the leaf whose hash is the smallest strictly greater than
    /// `key`'s hash, i.e. the next entry in hash-sorted order.
    pub fn find_next(&self, key: &K) -> Option<(&K, &Arc<V>)>
    where
        K: TrieHash,
    {
        find_next_rec(self.root.as_ref(), 0, key.trie_hash())
    }

    pub fn len(&self) -> usize {
        count_rec(self.root.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Recursive subtree comparison by pointer identity: identical `Arc`
    /// roots short-circuit without visiting anything below them.
    pub fn visit_diff(&self, old: &Self, mut visit: impl FnMut(&K, Option<&Arc<V>>, Option<&Arc<V>>) -> bool) {
        diff_rec(self.root.as_ref(), old.root.as_ref(), &mut visit);
    }
}

fn insert_rec<K: Clone + Eq, V>(
    node: Option<Arc<Node<K, V>>>,
    level: usize,
    timeline: u64,
    hash: u64,
    key: K,
    value: Arc<V>,
) -> Arc<Node<K, V>> {
    match node {
        None => Arc::new(Node::Leaf(Leaf { version: timeline, hash, key, value })),
        Some(n) => match &*n {
            Node::Leaf(existing) if existing.hash == hash => {
                Arc::new(Node::Leaf(Leaf { version: timeline, hash, key, value }))
            }
            Node::Leaf(existing) => {
                if level >= MAX_LEVEL {
                    crate::util::error::fatal("V8gHashTrie: hash collision at max depth");
                }
                let mut branch = Branch::empty();
                let existing_slot = chunk(existing.hash, level + 1);
                branch.set(existing_slot, Arc::new(Node::Leaf(existing.clone())));
                let new_slot = chunk(hash, level + 1);
                let prior = branch.get(new_slot).cloned();
                let updated = insert_rec(prior, level + 1, timeline, hash, key, value);
                branch.set(new_slot, updated);
                Arc::new(Node::Branch(branch))
            }
            Node::Branch(existing_branch) => {
                let slot = chunk(hash, level);
                let mut branch = existing_branch.clone();
                let prior = branch.get(slot).cloned();
                let updated = insert_rec(prior, level + 1, timeline, hash, key, value);
                branch.set(slot, updated);
                Arc::new(Node::Branch(branch))
            }
        },
    }
}

fn erase_rec<K: Clone + Eq, V>(node: Option<Arc<Node<K, V>>>, level: usize, hash: u64) -> Option<Arc<Node<K, V>>> {
    let n = node?;
    match &*n {
        Node::Leaf(leaf) => {
            if leaf.hash == hash {
                None
            } else {
                Some(n)
            }
        }
        Node::Branch(existing_branch) => {
            let slot = chunk(hash, level);
            let child = existing_branch.get(slot).cloned()?;
            let mut branch = existing_branch.clone();
            match erase_rec(Some(child), level + 1, hash) {
                Some(updated) => branch.set(slot, updated),
                None => {
                    branch.remove(slot);
                }
            }
            if branch.is_empty() {
                None
            } else if let Some(leaf) = branch.single_leaf() {
                Some(Arc::new(Node::Leaf(leaf)))
            } else {
                Some(Arc::new(Node::Branch(branch)))
            }
        }
    }
}

fn count_rec<K, V>(node: Option<&Arc<Node<K, V>>>) -> usize {
    match node {
        None => 0,
        Some(n) => match &**n {
            Node::Leaf(_) => 1,
            Node::Branch(b) => b.children.iter().map(|c| count_rec(Some(c))).sum(),
        },
    }
}

fn find_extreme<K, V>(node: Option<&Arc<Node<K, V>>>, smallest: bool) -> Option<(&K, &Arc<V>)> {
    match &**node? {
        Node::Leaf(leaf) => Some((&leaf.key, &leaf.value)),
        Node::Branch(b) => {
            let child = if smallest { b.children.first() } else { b.children.last() };
            find_extreme(child, smallest)
        }
    }
}

fn find_next_rec<K, V>(node: Option<&Arc<Node<K, V>>>, level: usize, hash: u64) -> Option<(&K, &Arc<V>)> {
    let n = node?;
    match &**n {
        Node::Leaf(leaf) => {
            if leaf.hash > hash {
                Some((&leaf.key, &leaf.value))
            } else {
                None
            }
        }
        Node::Branch(b) => {
            let target_slot = chunk(hash, level);
            // Try descending into the exact slot first, looking for
            // something strictly greater within it.
            if let Some(child) = b.get(target_slot) {
                if let Some(found) = find_next_rec(Some(child), level + 1, hash) {
                    return Some(found);
                }
            }
            // Otherwise the answer is the smallest leaf in any later slot.
            for slot in (target_slot + 1)..64 {
                if let Some(child) = b.get(slot) {
                    if let Some(found) = find_extreme(Some(child), true) {
                        return Some(found);
                    }
                }
            }
            None
        }
    }
}

fn collect_rec<K: Clone, V>(node: &Arc<Node<K, V>>, out: &mut Vec<(u64, K, Arc<V>)>) {
    match &**node {
        Node::Leaf(leaf) => out.push((leaf.hash, leaf.key.clone(), leaf.value.clone())),
        Node::Branch(b) => {
            for child in &b.children {
                collect_rec(child, out);
            }
        }
    }
}

fn diff_rec<'a, K: Clone + Eq, V>(
    new: Option<&'a Arc<Node<K, V>>>,
    old: Option<&'a Arc<Node<K, V>>>,
    visit: &mut dyn FnMut(&K, Option<&Arc<V>>, Option<&Arc<V>>) -> bool,
) -> bool {
    match (new, old) {
        (None, None) => true,
        (Some(a), Some(b)) if Arc::ptr_eq(a, b) => true,
        (Some(a), Some(b)) => match (&**a, &**b) {
            (Node::Branch(ba), Node::Branch(bb)) => {
                for slot in 0..64 {
                    let ca = ba.get(slot);
                    let cb = bb.get(slot);
                    if ca.is_none() && cb.is_none() {
                        continue;
                    }
                    if !diff_rec(ca, cb, visit) {
                        return false;
                    }
                }
                true
            }
            _ => diff_fallback(Some(a), Some(b), visit),
        },
        (Some(a), None) => diff_fallback(Some(a), None, visit),
        (None, Some(b)) => diff_fallback(None, Some(b), visit),
    }
}

/// Brute-force diff for the rare case where corresponding slots hold
/// differently-shaped nodes (leaf vs. branch, or two leaves with different
/// hashes sharing one slot before divergence). Only ever called on small
/// local subtrees, since shape mismatches only occur near the point where
/// two hashes actually diverge.
fn diff_fallback<K: Clone + Eq, V>(
    new: Option<&Arc<Node<K, V>>>,
    old: Option<&Arc<Node<K, V>>>,
    visit: &mut dyn FnMut(&K, Option<&Arc<V>>, Option<&Arc<V>>) -> bool,
) -> bool {
    let mut new_items = Vec::new();
    let mut old_items = Vec::new();
    if let Some(n) = new {
        collect_rec(n, &mut new_items);
    }
    if let Some(n) = old {
        collect_rec(n, &mut old_items);
    }
    new_items.sort_by_key(|(h, _, _)| *h);
    old_items.sort_by_key(|(h, _, _)| *h);

    let mut i = 0;
    let mut j = 0;
    while i < new_items.len() || j < old_items.len() {
        let take_new = j >= old_items.len() || (i < new_items.len() && new_items[i].0 <= old_items[j].0);
        if take_new {
            let (h, k, v) = &new_items[i];
            if j < old_items.len() && old_items[j].0 == *h {
                let (_, _, ov) = &old_items[j];
                if !Arc::ptr_eq(v, ov) && !visit(k, Some(v), Some(ov)) {
                    return false;
                }
                j += 1;
            } else if !visit(k, Some(v), None) {
                return false;
            }
            i += 1;
        } else {
            let (_, k, v) = &old_items[j];
            if !visit(k, None, Some(v)) {
                return false;
            }
            j += 1;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_find_roundtrips() {
        let mut trie: V8gHashTrie<u64, &str>  = V8gHashTrie::new();
        trie.insert(1, 42u64, "answer");
        assert_eq!(trie.find(&42).map(|v| **v), Some("answer"));
        assert_eq!(trie.find(&7), None);
    }

    #[test]
    fn a_non_default_policy_parameter_is_a_distinct_type() {
        use crate::v8g::policy::Shared;

        let mut trie: V8gHashTrie<u64, &str, Shared> = V8gHashTrie::new();
        trie.insert(1, 1u64, "a");
        assert_eq!(trie.find(&1u64).map(|v| **v), Some("a"));
    }

    #[test]
    fn erase_removes_key() {
        let mut trie: V8gHashTrie<u64, &str>  = V8gHashTrie::new();
        trie.insert(1, 1u64, "a");
        trie.insert(1, 2u64, "b");
        trie.erase(&1u64);
        assert!(trie.find(&1u64).is_none());
        assert_eq!(trie.find(&2u64).map(|v| **v), Some("b"));
    }

    #[test]
    fn snapshot_survives_later_mutation() {
        let mut trie: V8gHashTrie<u64, u64>  = V8gHashTrie::new();
        for i in 0..200u64 {
            trie.insert(1, i, i * 10);
        }
        let snapshot = trie.clone();

        for i in 0..100u64 {
            trie.erase(&i);
        }
        trie.insert(2, 9999, 1);

        for i in 0..200u64 {
            assert_eq!(snapshot.find(&i).map(|v| **v), Some(i * 10));
        }
        for i in 0..100u64 {
            assert!(trie.find(&i).is_none());
        }
        for i in 100..200u64 {
            assert_eq!(trie.find(&i).map(|v| **v), Some(i * 10));
        }
    }

    #[test]
    fn visit_diff_reports_added_removed_and_changed() {
        let mut old: V8gHashTrie<u64, &str>  = V8gHashTrie::new();
        old.insert(1, 1u64, "a");
        old.insert(1, 2u64, "b");

        let mut newer = old.clone();
        newer.insert(2, 2u64, "b2");
        newer.insert(2, 3u64, "c");
        newer.erase(&1u64);

        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut changed = Vec::new();
        newer.visit_diff(&old, |key, new_value, old_value| {
            match (new_value, old_value) {
                (Some(_), None) => added.push(*key),
                (None, Some(_)) => removed.push(*key),
                (Some(_), Some(_)) => changed.push(*key),
                (None, None) => unreachable!(),
            }
            true
        });

        assert_eq!(added, vec![3]);
        assert_eq!(removed, vec![1]);
        assert_eq!(changed, vec![2]);
    }

    #[test]
    fn visit_diff_never_visits_identical_subtrees() {
        let mut base: V8gHashTrie<u64, u64>  = V8gHashTrie::new();
        for i in 0..50u64 {
            base.insert(1, i, i);
        }
        let unchanged_clone = base.clone();
        let mut calls = 0;
        unchanged_clone.visit_diff(&base, |_, _, _| {
            calls += 1;
            true
        });
        assert_eq!(calls, 0, "identical root pointers must short-circuit the whole diff");
    }

    #[test]
    fn find_first_and_find_next_iterate_in_hash_order() {
        let mut trie: V8gHashTrie<u64, u64>  = V8gHashTrie::new();
        let hashes = [50u64, 10, 30, 20, 40];
        for h in hashes {
            trie.insert(1, h, h);
        }
        let mut sorted = hashes.to_vec();
        sorted.sort();

        let mut observed = Vec::new();
        let (first_key, _) = trie.find_first().unwrap();
        observed.push(*first_key);
        let mut current = *first_key;
        while let Some((next_key, _)) = trie.find_next(&current) {
            observed.push(*next_key);
            current = *next_key;
        }

        assert_eq!(observed, sorted);
    }
}
