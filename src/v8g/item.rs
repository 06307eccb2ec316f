//! `V8gMapItem<K, V>` - version/key/value tuple shared by both versioning
//! containers. Grounded on spec §3 "Item tuple" and
//! `original_source/include/voxen/common/v8g_helpers.hpp`.

use std::sync::Arc;

/// A versioned map entry. `hasValue()` in the original maps to
/// [`V8gMapItem::has_value`]; absence is modeled with `Option` rather than a
/// null pointer.
#[derive(Debug, Clone)]
pub struct V8gMapItem<K, V> {
    pub version: u64,
    pub key: K,
    pub value: Option<Arc<V>>,
}

impl<K, V> V8gMapItem<K, V> {
    pub fn new(version: u64, key: K, value: Arc<V>) -> Self {
        Self { version, key, value: Some(value) }
    }

    pub fn tombstone(version: u64, key: K) -> Self {
        Self { version, key, value: None }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}
