// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The thread/scheduler runtime `workman` runs on top of.

use alloc::boxed::Box;
use core::fmt::Display;

/// Handle to a thread that can be woken from another core.
pub trait ThreadHandle: Send + Sync + 'static {
    /// Makes the thread runnable if it's sleeping in
    /// [`Platform::wait_until`]. Must not block.
    ///
    /// A wake delivered while the thread isn't sleeping must not be lost: the
    /// thread's next `wait_until` re-checks its condition at least once.
    fn wake(&self);
}

/// A queue of threads parked until some completion occurs.
pub trait WaitQueue<T: ThreadHandle>: Send + Sync + 'static {
    /// Creates an empty queue.
    fn new() -> Self;

    /// Parks the calling thread until `cond` returns `true`.
    ///
    /// The caller is registered on the queue first; only then is `kick` woken.
    /// Waking the thread that will eventually complete the wait only after the
    /// waiter is in place means its [`wake_all`][WaitQueue::wake_all] can't
    /// slip past us. `cond` is re-checked after every wakeup, spurious or not.
    fn wait_until(&self, kick: &T, cond: &mut dyn FnMut() -> bool);

    /// Wakes every thread parked on this queue.
    fn wake_all(&self);
}

/// Everything `workman` needs from the underlying runtime.
///
/// This is the equivalent of a board support layer: an implementation knows
/// how to create a thread bound to a core, how to put the current thread to
/// sleep and wake a given thread, and how to keep the current thread from
/// being descheduled or migrated for the duration of a section.
pub trait Platform: Send + Sync + Sized + 'static {
    /// Handle used to wake a dispatcher thread.
    type Thread: ThreadHandle;
    /// Wait-queue used for per-core completion.
    type WaitQueue: WaitQueue<Self::Thread>;
    /// Reason a thread could not be spawned.
    type SpawnError: Display;

    /// Number of cores. Core indices run from 0 to `core_count() - 1`.
    fn core_count(&self) -> usize;

    /// Creates and starts a thread that runs `entry` and is never migrated
    /// off `core`.
    fn spawn_on(
        &self,
        core: usize,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<(), Self::SpawnError>;

    /// Handle for the calling thread.
    fn current_thread(&self) -> Self::Thread;

    /// Blocks the calling thread until `cond` returns `true`.
    ///
    /// `cond` is checked before sleeping and again after every wakeup. A
    /// wakeup is not proof of anything; spurious wakeups must be tolerated.
    fn wait_until(&self, cond: &mut dyn FnMut() -> bool);

    /// Called on `core`'s dispatcher thread once the core has been marked
    /// ready, for platforms that want to wait for bring-up to complete.
    #[allow(unused_variables)]
    fn core_ready(&self, core: usize) {}

    /// Runs `body` without allowing the calling thread to be preempted or
    /// migrated off `core`, which must be the core the caller is bound to.
    fn without_preemption<R>(&self, core: usize, body: impl FnOnce() -> R) -> R;
}
