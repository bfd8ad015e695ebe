// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Work items and their per-core completion protocol.
//!
//! Each item carries, per core, a pending flag plus a pair of counters.
//! `requested` counts signals accepted for that core; `finished` records the
//! highest `requested` value a completed run is known to cover. A signaler
//! that wants to wait takes the value of `requested` it produced as its
//! _ticket_ and sleeps until `finished` reaches it.
//!
//! The sheriff reads `requested` only after clearing the pending flag, and the
//! signaler bumps `requested` before setting it. So a run that covers a ticket
//! started after that ticket was issued, and every ticket is covered by the
//! first run that consumes the matching pending flag.

use alloc::boxed::Box;
use core::fmt;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

use crate::percore::PerCore;
use crate::platform::{ThreadHandle, WaitQueue};

/// Sequence number identifying one accepted signal for an (item, core) pair.
pub(crate) type Ticket = u64;

pub(crate) type Handler = Box<dyn Fn() + Send + Sync + 'static>;

struct Slot<W> {
    pending: AtomicBool,
    requested: AtomicU64,
    finished: AtomicU64,
    waiters: W,
}

/// A handler plus its per-core pending flags and completion wait-queues.
///
/// Work items are created by freezing a [`RegistryBuilder`] and live as long
/// as the [`Workman`] that owns them.
///
/// [`RegistryBuilder`]: crate::RegistryBuilder
/// [`Workman`]: crate::Workman
pub struct WorkItem<W> {
    name: &'static str,
    handler: Handler,
    slots: PerCore<Slot<W>>,
}

impl<W> WorkItem<W> {
    pub(crate) fn new<T>(name: &'static str, handler: Handler, cores: usize) -> Self
    where
        T: ThreadHandle,
        W: WaitQueue<T>,
    {
        Self {
            name,
            handler,
            slots: PerCore::new_with(cores, |_| Slot {
                pending: AtomicBool::new(false),
                requested: AtomicU64::new(0),
                finished: AtomicU64::new(0),
                waiters: W::new(),
            }),
        }
    }

    /// Name the item was registered under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks whether the item is waiting to run on `core`. Diagnostic only:
    /// the answer may be stale by the time it's returned.
    pub fn is_pending(&self, core: usize) -> bool {
        self.slots
            .get(core)
            .is_some_and(|slot| slot.pending.load(Ordering::Acquire))
    }

    /// Marks the item pending on `core`, returning the ticket a waiter should
    /// wait for.
    pub(crate) fn mark_pending(&self, core: usize) -> Ticket {
        let slot = &self.slots[core];
        let ticket = slot.requested.fetch_add(1, Ordering::AcqRel) + 1;
        // RMW rather than store: a concurrent signaler's set must not end the
        // release sequence the sheriff's acquire is paired with.
        slot.pending.swap(true, Ordering::Release);
        ticket
    }

    /// Consumes the pending flag for `core`. Returns the highest ticket the
    /// upcoming run covers, or `None` if the item wasn't pending.
    ///
    /// Only the sheriff of `core` may call this.
    pub(crate) fn take_pending(&self, core: usize) -> Option<Ticket> {
        let slot = &self.slots[core];
        if !slot.pending.load(Ordering::Acquire) {
            return None;
        }
        if !slot.pending.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(slot.requested.load(Ordering::Acquire))
    }

    pub(crate) fn run(&self) {
        (self.handler)()
    }

    /// Publishes completion of a run covering tickets up to `covered`, and
    /// wakes every thread parked waiting on `core`.
    ///
    /// Only the sheriff of `core` may call this, right after the handler.
    pub(crate) fn mark_finished<T>(&self, core: usize, covered: Ticket)
    where
        T: ThreadHandle,
        W: WaitQueue<T>,
    {
        let slot = &self.slots[core];
        slot.finished.store(covered, Ordering::Release);
        slot.waiters.wake_all();
    }

    /// Blocks until a run covering `ticket` has finished on `core`.
    ///
    /// `kick` is the sheriff of `core`; it is woken once this thread is parked
    /// on the wait-queue.
    pub(crate) fn wait_for<T>(&self, core: usize, ticket: Ticket, kick: &T)
    where
        T: ThreadHandle,
        W: WaitQueue<T>,
    {
        let slot = &self.slots[core];
        slot.waiters
            .wait_until(kick, &mut || slot.finished.load(Ordering::Acquire) >= ticket);
    }

    #[cfg(test)]
    pub(crate) fn finished(&self, core: usize) -> Ticket {
        self.slots[core].finished.load(Ordering::Acquire)
    }
}

impl<W> fmt::Debug for WorkItem<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("name", &self.name)
            .field("cores", &self.slots.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockThread, MockWaitQueue};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn item(cores: usize) -> (WorkItem<MockWaitQueue>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let item = WorkItem::new::<MockThread>(
            "counter",
            Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }),
            cores,
        );
        (item, runs)
    }

    #[test]
    fn tickets_increase_per_core() {
        let (item, _) = item(2);
        assert_eq!(item.mark_pending(0), 1);
        assert_eq!(item.mark_pending(0), 2);
        assert_eq!(item.mark_pending(1), 1);
        assert!(item.is_pending(0));
        assert!(item.is_pending(1));
    }

    #[test]
    fn take_pending_covers_coalesced_signals() {
        let (item, _) = item(2);
        item.mark_pending(1);
        item.mark_pending(1);
        assert_eq!(item.take_pending(1), Some(2));
        assert!(!item.is_pending(1));
        assert_eq!(item.take_pending(1), None);
    }

    #[test]
    fn take_pending_leaves_other_cores_alone() {
        let (item, _) = item(2);
        item.mark_pending(0);
        assert_eq!(item.take_pending(1), None);
        assert!(item.is_pending(0));
    }

    #[test]
    fn mark_finished_publishes_and_wakes() {
        let (item, runs) = item(1);
        let ticket = item.mark_pending(0);
        let covered = item.take_pending(0).unwrap();
        item.run();
        item.mark_finished::<MockThread>(0, covered);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(item.finished(0) >= ticket);
        assert_eq!(item.slots[0].waiters.wakes(), 1);

        // Already covered, so this returns without parking.
        let kick = MockThread::default();
        item.wait_for(0, ticket, &kick);
        assert_eq!(kick.wakes(), 1);
    }

    #[test]
    fn out_of_range_core_is_not_pending() {
        let (item, _) = item(1);
        assert!(!item.is_pending(7));
    }
}
