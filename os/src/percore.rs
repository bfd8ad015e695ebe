// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use alloc::boxed::Box;
use core::ops::Index;

/// One `T` per core, indexed by core number.
///
/// The number of cores is fixed when the `PerCore` is built. No padding is
/// added between elements to prevent false sharing; the elements `workman`
/// stores here are written rarely compared to how often they're read.
#[derive(Debug)]
pub struct PerCore<T>(Box<[T]>);

impl<T> PerCore<T> {
    /// Builds a `PerCore` for `cores` cores, calling `init` with each core
    /// index in turn.
    pub fn new_with(cores: usize, init: impl FnMut(usize) -> T) -> Self {
        Self((0..cores).map(init).collect())
    }

    /// Number of cores.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no cores at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The element for `core`, or `None` if `core` is out of range.
    pub fn get(&self, core: usize) -> Option<&T> {
        self.0.get(core)
    }

    /// Iterates over the elements in core order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T> Index<usize> for PerCore<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a, T> IntoIterator for &'a PerCore<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_element_per_core() {
        let pc = PerCore::new_with(4, |core| core * 10);
        assert_eq!(pc.len(), 4);
        assert_eq!(pc[2], 20);
        assert_eq!(pc.get(3), Some(&30));
        assert_eq!(pc.get(4), None);
    }

    #[test]
    fn zero_cores_is_empty() {
        let pc: PerCore<u8> = PerCore::new_with(0, |_| 0);
        assert!(pc.is_empty());
        assert_eq!(pc.iter().count(), 0);
    }
}
