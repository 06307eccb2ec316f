//! Minimal marker service recording which thread owns the render graph and
//! per-frame allocators, grounded on
//! `original_source/src/voxen/client/main_thread_service.cpp`.
//!
//! The original drives the entire windowing/GUI/render main loop; none of
//! that is in scope here (window binding beyond a trait boundary and the
//! GUI layer are explicitly out of scope, §1). What survives is the one
//! thing other services actually depend on: a way to assert that
//! render-graph and per-frame-allocator code is never invoked off the
//! thread that constructed it (§5 "single-threaded, called only from the
//! render thread").

use crate::svc::service_locator::{ServiceBuilder, ServiceLocator};
use crate::util::error::ServiceError;
use crate::util::uid::Uid;
use std::thread::ThreadId;

pub const MAIN_THREAD_SERVICE_UID: Uid = Uid(0x4D61_696E_5468_7264);

/// Records the constructing thread's id; every other method is a
/// debug-assertion against it.
pub struct MainThreadService {
    owner: ThreadId,
}

impl MainThreadService {
    pub fn new() -> Self {
        Self { owner: std::thread::current().id() }
    }

    /// Debug-only: panics if called from a thread other than the one that
    /// constructed this service.
    pub fn assert_on_owning_thread(&self) {
        debug_assert_eq!(
            std::thread::current().id(),
            self.owner,
            "called off the thread that owns the render graph / per-frame allocators"
        );
    }

    pub fn is_owning_thread(&self) -> bool {
        std::thread::current().id() == self.owner
    }
}

impl Default for MainThreadService {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers [`MainThreadService`] with no dependencies; must be built on
/// the thread that will own the render graph.
pub struct BuildMainThreadService;

impl ServiceBuilder for BuildMainThreadService {
    type Service = MainThreadService;

    fn uid(&self) -> Uid {
        MAIN_THREAD_SERVICE_UID
    }

    fn build(&mut self, _locator: &ServiceLocator) -> Result<MainThreadService, ServiceError> {
        Ok(MainThreadService::new())
    }
}
