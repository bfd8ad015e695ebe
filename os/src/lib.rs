// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run registered handlers on a specific core, optionally waiting for them to
//! finish.
//!
//! `workman` is the mechanism a kernel uses for "run this on core N"
//! operations -- per-core state maintenance, cache/TLB-style invalidation,
//! per-core bookkeeping -- without using interrupts. It consists of:
//!
//! - A fixed set of _work items_, each a handler plus a pending flag and a
//!   completion wait-queue per core. The set is collected in a
//!   [`RegistryBuilder`] during initialization and frozen when the runtime
//!   context ([`Workman`]) is created.
//! - One dedicated dispatcher thread per core (the _sheriff_), which sleeps
//!   until its core is given _duty_, then sweeps the registry and runs every
//!   item pending on its core, with preemption disabled.
//! - [`Workman::signal`], callable from any core, which marks an item pending
//!   on a target core, gives that core duty, and either kicks the sheriff or
//!   blocks until the handler has run.
//!
//! # The platform
//!
//! `workman` doesn't create threads or block on its own. Everything it needs
//! from the underlying scheduler -- spawning a thread pinned to a core,
//! sleeping until a condition holds, waking a specific thread, wait-queues,
//! and a non-preemptible section -- is described by the [`Platform`] trait.
//! The `workman-host` crate provides an implementation on `std` threads.
//!
//! # Ordering
//!
//! The protocol never uses a lock between cores. Its one correctness
//! requirement is that a sheriff never misses a signaled item, and that is
//! carried entirely by atomic ordering:
//!
//! 1. A signaler sets the item's pending flag for the target core, then sets
//!    the core's duty flag, both with release ordering.
//! 2. The sheriff reads duty with acquire ordering, clears it, and only then
//!    reads the pending flags.
//!
//! So a sheriff that has seen duty also sees every pending flag set before
//! it. A sheriff that sees duty but no pending flags has been woken
//! spuriously and goes back to sleep. Because duty is cleared _before_ the
//! sweep, a signal that arrives during a sweep leaves duty set and forces
//! another sweep.
//!
//! # Failure
//!
//! Handlers run unguarded. A handler that panics unwinds out of the sheriff
//! and that core's dispatcher is gone for good; callers waiting on it will
//! wait forever. Catch panics inside the handler if that isn't acceptable.
//!
//! # Tracing
//!
//! With the `log` feature (on by default) the dispatch path emits trace
//! records through the `log` crate; with `defmt`, through `defmt`. For
//! structured observation install a [`Hooks`] implementation with
//! [`Workman::with_hooks`].

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

cfg_if::cfg_if! {
    if #[cfg(feature = "log")] {
        macro_rules! trace { ($($arg:tt)*) => { log::trace!($($arg)*) }; }
        macro_rules! debug { ($($arg:tt)*) => { log::debug!($($arg)*) }; }
        macro_rules! warn { ($($arg:tt)*) => { log::warn!($($arg)*) }; }
        macro_rules! error { ($($arg:tt)*) => { log::error!($($arg)*) }; }
    } else if #[cfg(feature = "defmt")] {
        macro_rules! trace { ($($arg:tt)*) => { defmt::trace!($($arg)*) }; }
        macro_rules! debug { ($($arg:tt)*) => { defmt::debug!($($arg)*) }; }
        macro_rules! warn { ($($arg:tt)*) => { defmt::warn!($($arg)*) }; }
        macro_rules! error { ($($arg:tt)*) => { defmt::error!($($arg)*) }; }
    } else {
        macro_rules! trace { ($($arg:tt)*) => {{}}; }
        macro_rules! debug { ($($arg:tt)*) => {{}}; }
        macro_rules! warn { ($($arg:tt)*) => {{}}; }
        macro_rules! error { ($($arg:tt)*) => {{}}; }
    }
}

mod dispatch;
mod error;
mod hooks;
mod item;
mod percore;
mod platform;
mod registry;

pub use dispatch::{Item, Workman};
pub use error::Error;
pub use hooks::{Hooks, NoHooks};
pub use item::WorkItem;
pub use percore::PerCore;
pub use platform::{Platform, ThreadHandle, WaitQueue};
pub use registry::{ItemId, Registry, RegistryBuilder};

#[cfg(test)]
pub(crate) mod testing;
