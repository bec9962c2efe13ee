// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback focus registry.
//!
//! Only one audio surface may be audible at a time across the whole
//! application: the studio, the global player, a second studio instance.
//! Each surface registers a stop callback under an owner id; every play
//! request broadcasts "stop everyone else" before the requester starts.
//!
//! The registry is single-threaded and cooperative, matching the rest of
//! the engine: callbacks run synchronously inside `request()`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Identifies one registered playback surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

impl OwnerId {
    /// Allocate a fresh owner id.
    pub fn next() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

type StopCallback = Box<dyn FnMut()>;

/// Registry mapping owner id to a stop callback.
#[derive(Default)]
pub struct FocusRegistry {
    entries: HashMap<OwnerId, StopCallback>,
}

impl FocusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the stop callback for an owner.
    pub fn register(&mut self, owner: OwnerId, stop: StopCallback) {
        self.entries.insert(owner, stop);
    }

    /// Remove an owner. Called on surface teardown.
    pub fn unregister(&mut self, owner: OwnerId) {
        self.entries.remove(&owner);
    }

    /// Number of registered surfaces.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared handle to the process-wide registry.
pub type SharedFocus = Rc<RefCell<FocusRegistry>>;

/// Create a new shared registry.
pub fn shared_registry() -> SharedFocus {
    Rc::new(RefCell::new(FocusRegistry::new()))
}

/// One surface's view of the registry: its owner id plus the shared map.
///
/// Cloning the handle shares the owner id, so a transport clock and its
/// stream set can both act for the same surface.
#[derive(Clone)]
pub struct FocusHandle {
    registry: SharedFocus,
    owner: OwnerId,
}

impl std::fmt::Debug for FocusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusHandle")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl FocusHandle {
    /// Create a handle with a fresh owner id.
    pub fn new(registry: SharedFocus) -> Self {
        Self {
            registry,
            owner: OwnerId::next(),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Install this surface's stop callback.
    pub fn register_stop(&self, stop: StopCallback) {
        self.registry.borrow_mut().register(self.owner, stop);
    }

    /// Stop every other registered surface. Callbacks are taken out of the
    /// registry while they run so a callback may re-enter the registry
    /// (e.g. to unregister itself) without a double borrow.
    pub fn request(&self) {
        let others: Vec<OwnerId> = self
            .registry
            .borrow()
            .entries
            .keys()
            .copied()
            .filter(|id| *id != self.owner)
            .collect();

        for id in others {
            let callback = self.registry.borrow_mut().entries.remove(&id);
            if let Some(mut stop) = callback {
                debug!(?id, requester = ?self.owner, "preempting playback surface");
                stop();
                // Re-install unless the callback unregistered itself.
                let mut registry = self.registry.borrow_mut();
                registry.entries.entry(id).or_insert(stop);
            }
        }
    }

    /// Remove this surface from the registry.
    pub fn release(&self) {
        self.registry.borrow_mut().unregister(self.owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_request_stops_all_others() {
        let registry = shared_registry();
        let a = FocusHandle::new(Rc::clone(&registry));
        let b = FocusHandle::new(Rc::clone(&registry));
        let c = FocusHandle::new(Rc::clone(&registry));

        let b_stopped = Rc::new(Cell::new(0));
        let c_stopped = Rc::new(Cell::new(0));
        let a_stopped = Rc::new(Cell::new(0));

        {
            let n = Rc::clone(&a_stopped);
            a.register_stop(Box::new(move || n.set(n.get() + 1)));
            let n = Rc::clone(&b_stopped);
            b.register_stop(Box::new(move || n.set(n.get() + 1)));
            let n = Rc::clone(&c_stopped);
            c.register_stop(Box::new(move || n.set(n.get() + 1)));
        }

        a.request();
        assert_eq!(a_stopped.get(), 0, "requester must not stop itself");
        assert_eq!(b_stopped.get(), 1);
        assert_eq!(c_stopped.get(), 1);

        // A second request broadcasts again.
        a.request();
        assert_eq!(b_stopped.get(), 2);
    }

    #[test]
    fn test_release_removes_owner() {
        let registry = shared_registry();
        let a = FocusHandle::new(Rc::clone(&registry));
        let b = FocusHandle::new(Rc::clone(&registry));

        let b_stopped = Rc::new(Cell::new(0));
        b.register_stop(Box::new({
            let n = Rc::clone(&b_stopped);
            move || n.set(n.get() + 1)
        }));
        assert_eq!(registry.borrow().len(), 1);

        b.release();
        assert!(registry.borrow().is_empty());

        a.request();
        assert_eq!(b_stopped.get(), 0, "released surfaces are not stopped");
    }

    #[test]
    fn test_owner_ids_are_unique() {
        let registry = shared_registry();
        let a = FocusHandle::new(Rc::clone(&registry));
        let b = FocusHandle::new(Rc::clone(&registry));
        assert_ne!(a.owner(), b.owner());
    }

    #[test]
    fn test_clone_shares_owner() {
        let registry = shared_registry();
        let a = FocusHandle::new(Rc::clone(&registry));
        let a2 = a.clone();
        assert_eq!(a.owner(), a2.owner());

        let stopped = Rc::new(Cell::new(false));
        a.register_stop(Box::new({
            let s = Rc::clone(&stopped);
            move || s.set(true)
        }));

        // A clone requesting focus must not stop its own surface.
        a2.request();
        assert!(!stopped.get());
    }
}
