//! Storage policy markers selected at the type level, per spec §3.
//!
//! The original C++ template machinery picks a different value-storage and
//! copy strategy per policy. This crate models the four policies as
//! zero-sized marker types that are real type parameters of
//! [`crate::v8g::V8gFlatMap`] / [`crate::v8g::V8gHashTrie`]
//! (`V8gFlatMap<K, V, policy::Shared>`), defaulting to [`Immutable`] when
//! left unspecified. `Arc` sharing already gives every policy the "unchanged
//! values keep their pointer identity across a snapshot" property for free,
//! so the policies mostly document caller intent - except [`Shared`], whose
//! contract ("must not be edited in place after insertion") is checked for
//! real: [`crate::v8g::V8gFlatMap::find_mut`] debug-asserts
//! [`Policy::ALLOWS_MUTATION`] before handing out a mutable reference.

/// Implemented by the four marker types below; `ALLOWS_MUTATION` is the one
/// behavioral hook a policy can override.
pub trait Policy: 'static {
    const ALLOWS_MUTATION: bool = true;
}

/// Values are copy-constructible; mut -> immutable snapshot copies values
/// that changed and reuses `Arc` pointers for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immutable;
impl Policy for Immutable {}

/// Values are never shared; every snapshot deep-copies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Copyable;
impl Policy for Copyable {}

/// Like `Copyable`, but permits moving parts of a mutable value into its
/// immutable copy. Callers using this policy must always pass the previous
/// snapshot to the builder so the move source is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct DmgCopyable;
impl Policy for DmgCopyable {}

/// Values are shared with the immutable snapshot and must not be edited in
/// place after insertion - `V8gFlatMap::find_mut` debug-asserts against this
/// policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shared;
impl Policy for Shared {
    const ALLOWS_MUTATION: bool = false;
}
