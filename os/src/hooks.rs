// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ItemId;

/// Allows observing the dispatch process.
///
/// A single `Hooks` instance is shared between all cores and all signaling
/// threads, so implementations must be cheap and must not block. Every method
/// defaults to doing nothing. Hooks have no effect on dispatch.
#[allow(unused_variables)]
pub trait Hooks: Send + Sync {
    /// The dispatcher for `core` is running and accepting signals.
    fn dispatcher_started(&self, core: usize) {}

    /// The dispatcher for `core` has died. Only happens by a handler
    /// panicking.
    fn dispatcher_exited(&self, core: usize) {}

    /// The dispatcher for `core` is about to sweep `items` work items.
    fn sweep(&self, core: usize, items: usize) {}

    /// `item` is about to run on `core`.
    fn invoke(&self, core: usize, item: ItemId, name: &'static str) {}

    /// `item` finished on `core`. Called before its waiters are woken.
    fn finished(&self, core: usize, item: ItemId, name: &'static str) {}

    /// `item` was signaled for `core`. Called before the readiness check, so
    /// dropped signals show up here too.
    fn signal(&self, core: usize, item: ItemId, name: &'static str, wait: bool) {}

    /// A signaler is about to block until `item` completes on `core`.
    fn wait(&self, core: usize, item: ItemId, name: &'static str) {}

    /// A signaler blocked on `item` for `core` has resumed.
    fn end_wait(&self, core: usize, item: ItemId, name: &'static str) {}
}

/// [`Hooks`] that observe nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}
