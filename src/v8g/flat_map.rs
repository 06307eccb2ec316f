//! `V8gFlatMap<K, V>` - sorted-vector versioned map with copy-on-write
//! immutable snapshots, grounded on
//! `original_source/include/voxen/common/v8g_flat_map.hpp` and
//! `v8g_flat_map_impl.hpp`.
//!
//! The mutable map is `V8gFlatMap`; calling [`V8gFlatMap::snapshot`] produces
//! a [`V8gFlatMapSnapshot`], an immutable fixed-size array that shares `Arc`
//! value pointers with the mutable map (and with a prior snapshot) for every
//! key whose version did not change, per spec §4.G / §8 invariant:
//! `∀ key: M[key].version == I[key].version ⇒ M[key].value_ptr == I[key].value_ptr`.

use crate::v8g::item::V8gMapItem;
use crate::v8g::policy::{Immutable, Policy};
use std::marker::PhantomData;
use std::sync::Arc;

/// Mutable, sorted-by-key versioned map. `timeline` passed to `insert`/`find`
/// must be monotonically non-decreasing per key - violating this is a logic
/// bug in the caller (undefined behavior per spec §4.G), not a recoverable
/// error.
///
/// `P` is a storage policy marker from [`crate::v8g::policy`] (defaulting to
/// [`Immutable`]); it only changes behavior for [`crate::v8g::policy::Shared`],
/// whose contract [`Self::find_mut`] enforces.
#[derive(Debug, Clone, Default)]
pub struct V8gFlatMap<K, V, P: Policy = Immutable> {
    items: Vec<V8gMapItem<K, V>>,
    _policy: PhantomData<P>,
}

impl<K: Ord + Clone, V, P: Policy> V8gFlatMap<K, V, P> {
    pub fn new() -> Self {
        Self { items: Vec::new(), _policy: PhantomData }
    }

    fn search(&self, key: &K) -> Result<usize, usize> {
        self.items.binary_search_by(|item| item.key.cmp(key))
    }

    /// Inserts or replaces `key`. `timeline` becomes the entry's new version
    /// and must be `>=` any version previously recorded for this key.
    pub fn insert(&mut self, timeline: u64, key: K, value: V) {
        match self.search(&key) {
            Ok(idx) => {
                debug_assert!(
                    timeline >= self.items[idx].version,
                    "V8gFlatMap::insert: timeline must be monotonic per key"
                );
                self.items[idx] = V8gMapItem::new(timeline, key, Arc::new(value));
            }
            Err(idx) => {
                self.items.insert(idx, V8gMapItem::new(timeline, key, Arc::new(value)));
            }
        }
    }

    pub fn erase(&mut self, key: &K) -> bool {
        match self.search(key) {
            Ok(idx) => {
                self.items.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, key: &K) -> Option<&Arc<V>> {
        self.search(key).ok().and_then(|idx| self.items[idx].value.as_ref())
    }

    /// Returns a mutable handle to `key`'s value, bumping its version to
    /// `timeline`. Uses `Arc::make_mut`, so if a snapshot still shares this
    /// value's pointer the value is cloned first - after this call the
    /// pointer is guaranteed private to the mutable map again.
    pub fn find_mut(&mut self, timeline: u64, key: &K) -> Option<&mut V>
    where
        V: Clone,
    {
        debug_assert!(
            P::ALLOWS_MUTATION,
            "V8gFlatMap::find_mut: this policy's values are shared with an immutable snapshot and must not be edited in place"
        );
        let idx = self.search(key).ok()?;
        let item = &mut self.items[idx];
        debug_assert!(timeline >= item.version);
        item.version = timeline;
        let arc = item.value.as_mut()?;
        Some(Arc::make_mut(arc))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &V8gMapItem<K, V>> {
        self.items.iter()
    }

    /// Builds an immutable snapshot, reusing `Arc` pointers from `previous`
    /// wherever the version matches (lockstep merge of two sorted streams,
    /// O(m+n)).
    pub fn snapshot(&self, previous: Option<&V8gFlatMapSnapshot<K, V, P>>) -> V8gFlatMapSnapshot<K, V, P> {
        let mut result = Vec::with_capacity(self.items.len());
        let old_items: &[V8gMapItem<K, V>] = previous.map(|p| &p.items[..]).unwrap_or(&[]);
        let mut old_iter = old_items.iter().peekable();

        for item in &self.items {
            while let Some(old) = old_iter.peek() {
                if old.key < item.key {
                    old_iter.next();
                } else {
                    break;
                }
            }

            let reused = if let Some(old) = old_iter.peek() {
                if old.key == item.key && old.version == item.version {
                    let value = old.value.clone();
                    old_iter.next();
                    value
                } else {
                    item.value.clone()
                }
            } else {
                item.value.clone()
            };

            result.push(V8gMapItem { version: item.version, key: item.key.clone(), value: reused });
        }

        V8gFlatMapSnapshot { items: result.into_boxed_slice(), _policy: PhantomData }
    }
}

/// Immutable fixed-size snapshot produced by [`V8gFlatMap::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct V8gFlatMapSnapshot<K, V, P: Policy = Immutable> {
    items: Box<[V8gMapItem<K, V>]>,
    _policy: PhantomData<P>,
}

impl<K: Ord, V, P: Policy> V8gFlatMapSnapshot<K, V, P> {
    pub fn empty() -> Self {
        Self { items: Box::new([]), _policy: PhantomData }
    }

    pub fn get(&self, key: &K) -> Option<&Arc<V>> {
        self.items
            .binary_search_by(|item| item.key.cmp(key))
            .ok()
            .and_then(|idx| self.items[idx].value.as_ref())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &V8gMapItem<K, V>> {
        self.items.iter()
    }

    /// Single linear pass over `self` (new) and `old`, calling
    /// `visit(key, new_value, old_value)` for every key in the symmetric
    /// difference plus every key whose value pointer changed. Stops early
    /// if `visit` returns `false`. Matches spec §4.G's `visitDiff` contract.
    pub fn visit_diff<'a>(
        &'a self,
        old: &'a V8gFlatMapSnapshot<K, V, P>,
        mut visit: impl FnMut(&'a K, Option<&'a Arc<V>>, Option<&'a Arc<V>>) -> bool,
    ) {
        let mut i = 0;
        let mut j = 0;

        while i < self.items.len() && j < old.items.len() {
            let a = &self.items[i];
            let b = &old.items[j];

            match a.key.cmp(&b.key) {
                std::cmp::Ordering::Less => {
                    if !visit(&a.key, a.value.as_ref(), None) {
                        return;
                    }
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    if !visit(&b.key, None, b.value.as_ref()) {
                        return;
                    }
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    let changed = match (&a.value, &b.value) {
                        (Some(av), Some(bv)) => !Arc::ptr_eq(av, bv),
                        (None, None) => false,
                        _ => true,
                    };
                    if changed && !visit(&a.key, a.value.as_ref(), b.value.as_ref()) {
                        return;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }

        while i < self.items.len() {
            let a = &self.items[i];
            if !visit(&a.key, a.value.as_ref(), None) {
                return;
            }
            i += 1;
        }

        while j < old.items.len() {
            let b = &old.items[j];
            if !visit(&b.key, None, b.value.as_ref()) {
                return;
            }
            j += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_sorted_order_and_monotonic_versions() {
        let mut map: V8gFlatMap<i32, &str>  = V8gFlatMap::new();
        map.insert(5, 10, "ten");
        map.insert(5, 3, "three");
        map.insert(5, 7, "seven");

        let keys: Vec<_> = map.iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![3, 7, 10]);
        assert!(map.iter().all(|i| i.version == 5));
    }

    #[test]
    fn erase_removes_key_and_keeps_sort_order() {
        let mut map: V8gFlatMap<i32, &str>  = V8gFlatMap::new();
        map.insert(1, 1, "a");
        map.insert(1, 2, "b");
        map.insert(1, 3, "c");
        assert!(map.erase(&2));
        assert_eq!(map.iter().map(|i| i.key).collect::<Vec<_>>(), vec![1, 3]);
        assert!(!map.erase(&2));
    }

    #[test]
    fn snapshot_reuses_pointers_for_unchanged_versions() {
        let mut map: V8gFlatMap<i32, &str>  = V8gFlatMap::new();
        map.insert(5, 1, "a");
        map.insert(5, 2, "b");
        let snap1 = map.snapshot(None);

        // Mutate key 2 only.
        map.find_mut(6, &2).map(|v| *v = "b2");
        let snap2 = map.snapshot(Some(&snap1));

        assert!(Arc::ptr_eq(snap1.get(&1).unwrap(), snap2.get(&1).unwrap()));
        assert!(!Arc::ptr_eq(snap1.get(&2).unwrap(), snap2.get(&2).unwrap()));
    }

    #[test]
    #[should_panic(expected = "must not be edited in place")]
    fn shared_policy_rejects_find_mut() {
        use crate::v8g::policy::Shared;

        let mut map: V8gFlatMap<u32, &str, Shared> = V8gFlatMap::new();
        map.insert(1, 1, "a");
        map.find_mut(2, &1);
    }

    /// Scenario 1 from spec §8: exact diff ordering.
    #[test]
    fn visit_diff_emits_exact_symmetric_difference_in_order() {
        let mut map: V8gFlatMap<i32, i32>  = V8gFlatMap::new();
        map.insert(5, 5, 1);
        map.insert(5, 10, 2);
        map.insert(5, 3, 3);
        map.insert(5, 7, 4);
        let snap1 = map.snapshot(None);

        map.insert(6, 15, 5);
        map.erase(&3);
        *map.find_mut(6, &7).unwrap() = 6;
        let snap2 = map.snapshot(Some(&snap1));

        let mut observed = Vec::new();
        snap2.visit_diff(&snap1, |key, new_value, old_value| {
            observed.push((*key, new_value.map(|v| **v), old_value.map(|v| **v)));
            true
        });

        assert_eq!(
            observed,
            vec![
                (3, None, Some(3)),
                (7, Some(6), Some(4)),
                (15, Some(5), None),
            ]
        );
    }

    #[test]
    fn visit_diff_stops_early_when_visitor_returns_false() {
        let mut map: V8gFlatMap<i32, &str>  = V8gFlatMap::new();
        map.insert(1, 1, "a");
        map.insert(1, 2, "b");
        let empty = V8gFlatMapSnapshot::empty();
        let snap = map.snapshot(None);

        let mut seen = 0;
        snap.visit_diff(&empty, |_, _, _| {
            seen += 1;
            false
        });
        assert_eq!(seen, 1);
    }
}
