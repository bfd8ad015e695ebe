// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The runtime context: per-core dispatch state, the sheriff loop, and the
//! signaling entry point.

use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::sync::Arc;
use core::fmt;
use portable_atomic::{AtomicBool, Ordering};
use spin::Once;

use crate::hooks::{Hooks, NoHooks};
use crate::percore::PerCore;
use crate::platform::{Platform, ThreadHandle};
use crate::registry::{ItemId, Registry, RegistryBuilder};
use crate::Error;

/// Dispatch state for one core.
struct CoreState<T> {
    /// Set by signalers, cleared by the sheriff at the start of each sweep.
    duty: AtomicBool,
    /// Set once by the sheriff itself when it starts. Never cleared.
    ready: AtomicBool,
    /// Set by `bring_up`, so a core can't get two sheriffs.
    started: AtomicBool,
    /// The sheriff's thread handle. Published before `ready`.
    sheriff: Once<T>,
}

impl<T> CoreState<T> {
    fn new() -> Self {
        Self {
            duty: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            started: AtomicBool::new(false),
            sheriff: Once::new(),
        }
    }
}

/// The per-core work dispatcher.
///
/// A `Workman` owns the frozen registry, one dispatch state per core, and the
/// platform. It is created once at startup, put in an [`Arc`], and shared by
/// everything that signals work and by every core's sheriff.
pub struct Workman<P: Platform> {
    platform: P,
    registry: Registry<P::WaitQueue>,
    cores: PerCore<CoreState<P::Thread>>,
    hooks: Box<dyn Hooks>,
}

impl<P: Platform> Workman<P> {
    /// Freezes `registry` and sets up dispatch state for each of the
    /// platform's cores. No dispatcher runs until [`bring_up`] is called.
    ///
    /// [`bring_up`]: Workman::bring_up
    pub fn new(platform: P, registry: RegistryBuilder) -> Self {
        Self::with_hooks(platform, registry, NoHooks)
    }

    /// Like [`new`][Workman::new], but reports dispatch events to `hooks`.
    pub fn with_hooks(platform: P, registry: RegistryBuilder, hooks: impl Hooks + 'static) -> Self {
        let cores = platform.core_count();
        Self {
            registry: registry.freeze::<P::Thread, P::WaitQueue>(cores),
            cores: PerCore::new_with(cores, |_| CoreState::new()),
            platform,
            hooks: Box::new(hooks),
        }
    }

    /// The platform this instance runs on.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The frozen registry.
    pub fn registry(&self) -> &Registry<P::WaitQueue> {
        &self.registry
    }

    /// Number of cores.
    pub fn cores(&self) -> usize {
        self.cores.len()
    }

    /// Checks whether `core` has a running dispatcher.
    pub fn is_ready(&self, core: usize) -> bool {
        self.cores
            .get(core)
            .is_some_and(|state| state.ready.load(Ordering::Acquire))
    }

    /// Looks up a work item by name.
    pub fn find(&self, name: &str) -> Option<ItemId> {
        self.registry.find(name)
    }

    /// Handle for signaling the item `id`.
    pub fn item(&self, id: ItemId) -> Option<Item<'_, P>> {
        self.registry.get(id).map(|_| Item { workman: self, id })
    }

    /// Asks for `id`'s handler to run on `core`.
    ///
    /// If `core` has no running dispatcher the request is silently dropped;
    /// nothing will run as a result of it, and this returns immediately
    /// whatever `wait` says.
    ///
    /// Otherwise the handler is guaranteed to run on `core` at some point
    /// after this call starts. With `wait == false` this returns right away.
    /// With `wait == true` it blocks until such a run has finished; there is
    /// no timeout. Several signals that reach the sheriff before it gets
    /// around to the item may be served by a single run.
    ///
    /// Calling this with `wait == true` from `core`'s own dispatcher (that
    /// is, from a handler, targeting the core it runs on) deadlocks.
    pub fn signal(&self, core: usize, id: ItemId, wait: bool) {
        let Some(item) = self.registry.get(id) else {
            warn!("signal for unknown work item #{}", id.index());
            return;
        };
        trace!("signal {} -> core {} (wait={})", item.name(), core, wait);
        self.hooks.signal(core, id, item.name(), wait);

        let Some(state) = self.cores.get(core) else {
            warn!("signal {} for nonexistent core {}", item.name(), core);
            return;
        };
        if !state.ready.load(Ordering::Acquire) {
            trace!("core {} not ready, dropping {}", core, item.name());
            return;
        }
        let Some(sheriff) = state.sheriff.get() else {
            return;
        };

        let ticket = item.mark_pending(core);
        // Duty is set strictly after the pending flag, so a sheriff that
        // observes duty observes the flag. RMW for the same reason as in
        // `mark_pending`.
        state.duty.swap(true, Ordering::Release);

        if !wait {
            sheriff.wake();
            return;
        }

        trace!("waiting for {} on core {}", item.name(), core);
        self.hooks.wait(core, id, item.name());
        // The wait-queue kicks the sheriff once we're parked.
        item.wait_for::<P::Thread>(core, ticket, sheriff);
        trace!("done waiting for {} on core {}", item.name(), core);
        self.hooks.end_wait(core, id, item.name());
    }

    /// Starts the dispatcher for `core`.
    ///
    /// Returns once the dispatcher thread has been created; the core becomes
    /// ready (and starts accepting signals) when that thread gets going.
    /// Must be called at most once per core.
    pub fn bring_up(self: &Arc<Self>, core: usize) -> Result<(), Error> {
        let state = self.cores.get(core).ok_or(Error::NoSuchCore {
            core,
            cores: self.cores.len(),
        })?;
        if state.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted { core });
        }
        state.duty.store(false, Ordering::Relaxed);

        let this = Arc::clone(self);
        self.platform
            .spawn_on(core, Box::new(move || this.call_of_duty(core)))
            .map_err(|e| {
                state.started.store(false, Ordering::Release);
                Error::Spawn {
                    core,
                    reason: e.to_string(),
                }
            })
    }

    /// Body of the sheriff thread for `core`.
    fn call_of_duty(&self, core: usize) -> ! {
        let state = &self.cores[core];
        state.sheriff.call_once(|| self.platform.current_thread());
        state.ready.store(true, Ordering::Release);
        self.platform.core_ready(core);
        debug!("dispatcher started on core {}", core);
        self.hooks.dispatcher_started(core);

        // The loop below is only ever left by a handler unwinding.
        let _exit = scopeguard::guard(core, |core| {
            error!("dispatcher on core {} terminated by a failing handler", core);
            self.hooks.dispatcher_exited(core);
        });

        loop {
            self.platform
                .wait_until(&mut || state.duty.load(Ordering::Acquire));
            // Cleared before the sweep: a signal landing mid-sweep sets it
            // again and we come straight back.
            if !state.duty.swap(false, Ordering::AcqRel) {
                continue;
            }
            self.platform.without_preemption(core, || self.sweep(core));
        }
    }

    /// One pass over the registry on `core`, running every item pending
    /// there. Returns the number of handlers run.
    pub(crate) fn sweep(&self, core: usize) -> usize {
        trace!("core {}: sweeping {} work items", core, self.registry.len());
        self.hooks.sweep(core, self.registry.len());

        let mut ran = 0;
        for (id, item) in self.registry.iter() {
            let Some(covered) = item.take_pending(core) else {
                continue;
            };
            trace!("core {}: invoking {}", core, item.name());
            self.hooks.invoke(core, id, item.name());
            item.run();
            // Reported before waiters are released, so it precedes their
            // `end_wait`.
            trace!("core {}: finished {}", core, item.name());
            self.hooks.finished(core, id, item.name());
            item.mark_finished::<P::Thread>(core, covered);
            ran += 1;
        }
        ran
    }
}

impl<P: Platform> fmt::Debug for Workman<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workman")
            .field("cores", &self.cores.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// A work item bound to the [`Workman`] that owns it.
pub struct Item<'a, P: Platform> {
    workman: &'a Workman<P>,
    id: ItemId,
}

impl<P: Platform> Item<'_, P> {
    /// The item's id.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// The name the item was registered under.
    pub fn name(&self) -> &'static str {
        self.workman
            .registry
            .get(self.id)
            .map_or("", |item| item.name())
    }

    /// Checks whether the item is waiting to run on `core`.
    pub fn is_pending(&self, core: usize) -> bool {
        self.workman
            .registry
            .get(self.id)
            .is_some_and(|item| item.is_pending(core))
    }

    /// Runs the item's handler on `core`. See [`Workman::signal`].
    pub fn signal(&self, core: usize, wait: bool) {
        self.workman.signal(core, self.id, wait)
    }
}

impl<P: Platform> Clone for Item<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Platform> Copy for Item<'_, P> {}

impl<P: Platform> fmt::Debug for Item<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;
    use std::sync::atomic::AtomicUsize;
    use std::vec::Vec;

    fn counting(names: &[&'static str]) -> (RegistryBuilder, Vec<Arc<AtomicUsize>>) {
        let mut b = RegistryBuilder::with_capacity(names.len());
        let mut counters = Vec::new();
        for &name in names {
            let c = Arc::new(AtomicUsize::new(0));
            let c2 = c.clone();
            b.register(name, move || {
                c2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
            counters.push(c);
        }
        (b, counters)
    }

    fn pretend_ready(wm: &Workman<MockPlatform>, core: usize) {
        let state = &wm.cores[core];
        state.sheriff.call_once(|| wm.platform.current_thread());
        state.ready.store(true, Ordering::Release);
    }

    #[test]
    fn signal_to_unready_core_is_dropped() {
        let (b, counters) = counting(&["a"]);
        let wm = Workman::new(MockPlatform::new(2), b);
        let a = wm.find("a").unwrap();

        wm.signal(1, a, false);
        wm.signal(1, a, true);

        assert!(!wm.item(a).unwrap().is_pending(1));
        assert!(!wm.cores[1].duty.load(Ordering::SeqCst));
        assert_eq!(wm.platform.thread.wakes(), 0);
        assert_eq!(wm.sweep(1), 0);
        assert_eq!(counters[0].load(Ordering::SeqCst), 0);
    }

    #[test]
    fn signal_to_missing_core_is_dropped() {
        let (b, _) = counting(&["a"]);
        let wm = Workman::new(MockPlatform::new(1), b);
        let a = wm.find("a").unwrap();
        wm.signal(9, a, true);
        assert!(!wm.is_ready(9));
    }

    #[test]
    fn async_signal_sets_flags_and_kicks_sheriff() {
        let (b, _) = counting(&["a", "b"]);
        let wm = Workman::new(MockPlatform::new(2), b);
        pretend_ready(&wm, 1);
        let a = wm.find("a").unwrap();
        let bid = wm.find("b").unwrap();

        wm.item(a).unwrap().signal(1, false);

        assert!(wm.item(a).unwrap().is_pending(1));
        assert!(!wm.item(a).unwrap().is_pending(0));
        assert!(!wm.item(bid).unwrap().is_pending(1));
        assert!(wm.cores[1].duty.load(Ordering::SeqCst));
        assert!(!wm.cores[0].duty.load(Ordering::SeqCst));
        assert_eq!(wm.platform.thread.wakes(), 1);
    }

    #[test]
    fn sweep_runs_only_pending_items_once() {
        let (b, counters) = counting(&["a", "b"]);
        let wm = Workman::new(MockPlatform::new(2), b);
        pretend_ready(&wm, 1);
        let a = wm.find("a").unwrap();

        wm.signal(1, a, false);
        wm.signal(1, a, false);

        assert_eq!(wm.sweep(0), 0);
        assert_eq!(wm.sweep(1), 1);
        assert_eq!(counters[0].load(Ordering::SeqCst), 1);
        assert_eq!(counters[1].load(Ordering::SeqCst), 0);
        assert_eq!(wm.sweep(1), 0);

        let item = wm.registry.get(a).unwrap();
        assert_eq!(item.finished(1), 2);
        assert_eq!(item.finished(0), 0);
    }

    #[test]
    fn bring_up_spawns_once_per_core() {
        let (b, _) = counting(&[]);
        let wm = Arc::new(Workman::new(MockPlatform::new(2), b));

        wm.bring_up(0).unwrap();
        wm.bring_up(1).unwrap();
        assert_eq!(wm.bring_up(1), Err(Error::AlreadyStarted { core: 1 }));
        assert_eq!(
            wm.bring_up(2),
            Err(Error::NoSuchCore { core: 2, cores: 2 })
        );
        assert_eq!(*wm.platform.spawned.lock().unwrap(), [0, 1]);
        // Readiness comes from the sheriff itself, which the mock never runs.
        assert!(!wm.is_ready(0));
    }

    #[test]
    fn failed_spawn_can_be_retried() {
        let (b, _) = counting(&[]);
        let wm = Arc::new(Workman::new(MockPlatform::new(1), b));

        wm.platform.fail_spawn.store(true, Ordering::SeqCst);
        assert_eq!(
            wm.bring_up(0),
            Err(Error::Spawn {
                core: 0,
                reason: "out of threads".into()
            })
        );

        wm.platform.fail_spawn.store(false, Ordering::SeqCst);
        wm.bring_up(0).unwrap();
    }

    #[test]
    fn unknown_item_id_has_no_handle() {
        let (b, _) = counting(&["a"]);
        let wm = Workman::new(MockPlatform::new(1), b);
        let (other, _) = counting(&["x", "y"]);
        let other = Workman::new(MockPlatform::new(1), other);
        let y = other.find("y").unwrap();
        assert!(wm.item(y).is_none());
        // Still must not panic.
        wm.signal(0, y, false);
    }
}
