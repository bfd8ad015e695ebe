// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed set of work items known to the runtime.
//!
//! Items are collected into a [`RegistryBuilder`] during initialization. The
//! builder is consumed when the [`Workman`][crate::Workman] is created, which
//! is the only way to obtain a [`Registry`] -- so the set of items is frozen
//! before any dispatcher can be started, and every core sweeps the same items
//! in the same order (registration order).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::item::{Handler, WorkItem};
use crate::platform::{ThreadHandle, WaitQueue};
use crate::Error;

/// Identifies a registered work item. Obtained from
/// [`RegistryBuilder::register`] or [`Workman::find`][crate::Workman::find].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(usize);

impl ItemId {
    /// Position of the item in sweep order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Collects work items during initialization, up to a fixed capacity.
pub struct RegistryBuilder {
    capacity: usize,
    entries: Vec<(&'static str, Handler)>,
}

impl RegistryBuilder {
    /// Creates a builder that accepts at most `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Maximum number of items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items registered so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a work item. Its handler will be run, on whichever core it is
    /// signaled for, by that core's dispatcher with preemption disabled.
    ///
    /// Handlers may run on several cores at once, hence `Sync`. They should
    /// be short, and must not signal their own core with `wait = true`.
    pub fn register<F>(&mut self, name: &'static str, handler: F) -> Result<ItemId, Error>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.entries.len() >= self.capacity {
            return Err(Error::RegistryFull {
                capacity: self.capacity,
            });
        }
        self.entries.push((name, Box::new(handler)));
        Ok(ItemId(self.entries.len() - 1))
    }

    pub(crate) fn freeze<T, W>(self, cores: usize) -> Registry<W>
    where
        T: ThreadHandle,
        W: WaitQueue<T>,
    {
        let items = self
            .entries
            .into_iter()
            .map(|(name, handler)| WorkItem::new::<T>(name, handler, cores))
            .collect();
        Registry { items }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("capacity", &self.capacity)
            .field(
                "names",
                &self.entries.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// The frozen, ordered set of work items.
pub struct Registry<W> {
    items: Box<[WorkItem<W>]>,
}

impl<W> fmt::Debug for Registry<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<W> Registry<W> {
    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item for `id`.
    pub fn get(&self, id: ItemId) -> Option<&WorkItem<W>> {
        self.items.get(id.0)
    }

    /// Looks an item up by the name it was registered under. If several items
    /// share a name, the first registered wins.
    pub fn find(&self, name: &str) -> Option<ItemId> {
        self.items
            .iter()
            .position(|item| item.name() == name)
            .map(ItemId)
    }

    /// Iterates over the items in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &WorkItem<W>)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (ItemId(i), item))
    }
}
