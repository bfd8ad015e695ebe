// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use alloc::string::String;

/// Errors from setting up the registry and bringing cores up.
///
/// Signaling has no error path: a signal to a core without a running
/// dispatcher is dropped, which is an expected outcome rather than a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The registry already holds as many work items as it was sized for.
    #[error("registry is full ({capacity} work items)")]
    RegistryFull {
        /// Capacity the registry was created with.
        capacity: usize,
    },
    /// A core index past the end of the platform's cores.
    #[error("core {core} does not exist (platform has {cores} cores)")]
    NoSuchCore {
        /// The requested core.
        core: usize,
        /// Number of cores the platform reports.
        cores: usize,
    },
    /// `bring_up` was called a second time for the same core.
    #[error("dispatcher for core {core} was already started")]
    AlreadyStarted {
        /// The core in question.
        core: usize,
    },
    /// The platform failed to create the dispatcher thread.
    #[error("failed to start dispatcher on core {core}: {reason}")]
    Spawn {
        /// The core whose dispatcher could not be started.
        core: usize,
        /// Platform-provided description of the failure.
        reason: String,
    },
}
