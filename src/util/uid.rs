//! UID type and a debug name registry, used by the service locator and message
//! router for human-readable diagnostics.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// Opaque identifier for a service, message type, or recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub u64);

impl Uid {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Maps UIDs to human-readable names, purely for log messages. Never used for
/// lookup in hot paths.
#[derive(Default)]
pub struct UidRegistry {
    names: RwLock<HashMap<Uid, String>>,
}

impl UidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, uid: Uid, name: impl Into<String>) {
        self.names.write().insert(uid, name.into());
    }

    pub fn name_of(&self, uid: Uid) -> String {
        self.names
            .read()
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string())
    }

    /// Formats a dependency chain for circular-dependency diagnostics.
    pub fn format_chain(&self, chain: &[Uid]) -> String {
        chain
            .iter()
            .map(|uid| self.name_of(*uid))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_uid_displays_as_hex() {
        let registry = UidRegistry::new();
        assert_eq!(registry.name_of(Uid::new(1)), Uid::new(1).to_string());
    }

    #[test]
    fn named_uid_overrides_display() {
        let registry = UidRegistry::new();
        registry.register(Uid::new(1), "land_generator");
        assert_eq!(registry.name_of(Uid::new(1)), "land_generator");
    }

    #[test]
    fn chain_formatting_joins_names_in_order() {
        let registry = UidRegistry::new();
        registry.register(Uid::new(1), "a");
        registry.register(Uid::new(2), "b");
        let chain = [Uid::new(1), Uid::new(2), Uid::new(1)];
        assert_eq!(registry.format_chain(&chain), "a -> b -> a");
    }
}
