//! Service locator: a typed registry with explicit start order and
//! circular-dependency detection, grounded on
//! `original_source/include/voxen/common/services/service_locator.hpp` and
//! `service_locator.cpp`.
//!
//! Every service is identified by a [`Uid`] (registered in a
//! [`crate::util::uid::UidRegistry`] for readable diagnostics) as well as by
//! its Rust `TypeId` for the downcast in [`ServiceLocator::get`]. `start`
//! runs a depth-first walk over declared dependency uids so each service's
//! builder sees its dependencies already constructed; a cycle aborts the
//! whole call with [`ServiceError::CircularDependency`] naming the chain.

use crate::util::error::ServiceError;
use crate::util::uid::Uid;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, Location};
use std::sync::Arc;

/// Builds one service, given a locator that already has every declared
/// dependency started.
pub trait ServiceBuilder: 'static {
    type Service: Any + Send + Sync;

    fn uid(&self) -> Uid;

    /// Uids of services that must be started before this one.
    fn dependencies(&self) -> Vec<Uid> {
        Vec::new()
    }

    fn build(&mut self, locator: &ServiceLocator) -> Result<Self::Service, ServiceError>;
}

struct PendingEntry {
    uid: Uid,
    type_id: TypeId,
    dependencies: Vec<Uid>,
    build: Box<dyn FnOnce(&ServiceLocator) -> Result<Box<dyn Any + Send + Sync>, ServiceError>>,
}

struct StartedEntry {
    type_id: TypeId,
    value: Arc<dyn Any + Send + Sync>,
}

/// Registry of constructed services plus the pending set not yet started.
#[derive(Default)]
pub struct ServiceLocator {
    started: HashMap<Uid, StartedEntry>,
    pending: HashMap<Uid, PendingEntry>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a builder without constructing it yet. Call [`Self::start`]
    /// once every builder the program needs has been registered.
    #[track_caller]
    pub fn register<B>(&mut self, mut builder: B) -> Result<(), ServiceError>
    where
        B: ServiceBuilder,
    {
        let uid = builder.uid();
        if self.pending.contains_key(&uid) || self.started.contains_key(&uid) {
            return Err(ServiceError::AlreadyRegistered { uid });
        }
        let type_id = TypeId::of::<B::Service>();
        let dependencies = builder.dependencies();
        let build: Box<dyn FnOnce(&ServiceLocator) -> Result<Box<dyn Any + Send + Sync>, ServiceError>> =
            Box::new(move |locator| builder.build(locator).map(|s| Box::new(s) as Box<dyn Any + Send + Sync>));
        self.pending.insert(uid, PendingEntry { uid, type_id, dependencies, build });
        Ok(())
    }

    /// Starts every pending service in dependency order. On success the
    /// locator holds only started services; `pending` is drained.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        let uids: Vec<Uid> = self.pending.keys().copied().collect();
        let mut visiting = Vec::new();
        for uid in uids {
            if self.started.contains_key(&uid) {
                continue;
            }
            self.start_one(uid, &mut visiting)?;
        }
        Ok(())
    }

    #[track_caller]
    fn start_one(&mut self, uid: Uid, visiting: &mut Vec<Uid>) -> Result<(), ServiceError> {
        if self.started.contains_key(&uid) {
            return Ok(());
        }
        if visiting.contains(&uid) {
            let chain = visiting.iter().map(|u| u.to_string()).collect::<Vec<_>>().join(" -> ");
            return Err(ServiceError::CircularDependency { uid, chain });
        }
        let Some(entry) = self.pending.remove(&uid) else {
            return Err(ServiceError::UnresolvedDependency { uid, location: Location::caller() });
        };

        visiting.push(uid);
        for dep in entry.dependencies.clone() {
            self.start_one(dep, visiting)?;
        }
        visiting.pop();

        let type_id = entry.type_id;
        let built = match panic::catch_unwind(panic::AssertUnwindSafe(|| (entry.build)(self))) {
            Ok(result) => result?,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic with non-string payload".to_string());
                return Err(ServiceError::FactoryPanicked { uid, message });
            }
        };
        self.started.insert(uid, StartedEntry { type_id, value: Arc::from(built) });
        Ok(())
    }

    /// Fetches an already-started service. Panics (a programming error, per
    /// spec §4.B) if `uid` was never started or was registered with a
    /// mismatched type.
    pub fn get<T: Any + Send + Sync>(&self, uid: Uid) -> Arc<T> {
        self.try_get(uid).unwrap_or_else(|| panic!("service locator: {uid} was never started"))
    }

    pub fn try_get<T: Any + Send + Sync>(&self, uid: Uid) -> Option<Arc<T>> {
        let entry = self.started.get(&uid)?;
        if entry.type_id != TypeId::of::<T>() {
            return None;
        }
        entry.value.clone().downcast::<T>().ok()
    }

    pub fn is_started(&self, uid: Uid) -> bool {
        self.started.contains_key(&uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A_UID: Uid = Uid(1);
    const B_UID: Uid = Uid(2);

    struct A(u32);
    struct B(u32);

    struct BuildA;
    impl ServiceBuilder for BuildA {
        type Service = A;
        fn uid(&self) -> Uid {
            A_UID
        }
        fn build(&mut self, _locator: &ServiceLocator) -> Result<A, ServiceError> {
            Ok(A(1))
        }
    }

    struct BuildB;
    impl ServiceBuilder for BuildB {
        type Service = B;
        fn uid(&self) -> Uid {
            B_UID
        }
        fn dependencies(&self) -> Vec<Uid> {
            vec![A_UID]
        }
        fn build(&mut self, locator: &ServiceLocator) -> Result<B, ServiceError> {
            let a = locator.get::<A>(A_UID);
            Ok(B(a.0 + 1))
        }
    }

    #[test]
    fn starts_dependencies_before_dependents() {
        let mut locator = ServiceLocator::new();
        locator.register(BuildB).unwrap();
        locator.register(BuildA).unwrap();
        locator.start().unwrap();
        assert_eq!(locator.get::<A>(A_UID).0, 1);
        assert_eq!(locator.get::<B>(B_UID).0, 2);
    }

    struct SelfDep;
    impl ServiceBuilder for SelfDep {
        type Service = SelfDep;
        fn uid(&self) -> Uid {
            Uid(3)
        }
        fn dependencies(&self) -> Vec<Uid> {
            vec![Uid(3)]
        }
        fn build(&mut self, _locator: &ServiceLocator) -> Result<SelfDep, ServiceError> {
            Ok(SelfDep)
        }
    }

    #[test]
    fn detects_circular_dependency() {
        let mut locator = ServiceLocator::new();
        locator.register(SelfDep).unwrap();
        let err = locator.start().unwrap_err();
        assert!(matches!(err, ServiceError::CircularDependency { .. }));
    }

    #[test]
    fn registering_same_uid_twice_fails() {
        let mut locator = ServiceLocator::new();
        locator.register(BuildA).unwrap();
        let err = locator.register(BuildA).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyRegistered { .. }));
    }

    #[test]
    #[should_panic(expected = "never started")]
    fn get_panics_for_unstarted_service() {
        let locator = ServiceLocator::new();
        let _ = locator.get::<A>(A_UID);
    }
}
