//! Hosted platform support for `workman`.
//!
//! Each logical core is a named `std` thread running that core's dispatcher.
//! Dispatchers sleep with `park` and are woken with `unpark`; completion
//! wait-queues are condition variables; and "preemption disabled" is
//! approximated by a per-core lock that only the core's own dispatcher takes.
//! With the `affinity` feature and [`HostConfig::pin`] set, dispatcher
//! threads are also pinned to physical CPUs.
//!
//! The quickest way to get going is [`start`]:
//!
//! ```no_run
//! use workman::RegistryBuilder;
//! use workman_host::HostConfig;
//!
//! let mut registry = RegistryBuilder::with_capacity(4);
//! let flush = registry.register("flush", || { /* per-core work */ }).unwrap();
//!
//! let wm = workman_host::start(HostConfig::default().cores(2), registry, workman::NoHooks).unwrap();
//! wm.signal(1, flush, true); // runs on core 1, returns once it has
//! ```

#![deny(dead_code)]

mod config;
mod error;
mod multicore;
mod preempt;
mod waitq;

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use workman::{Hooks, PerCore, Platform, RegistryBuilder, Workman};

pub use config::HostConfig;
pub use error::Error;
pub use multicore::{current_core, HostThread};
pub use preempt::in_critical_section;
pub use waitq::HostWaitQueue;

use preempt::PreemptLocks;

/// A [`Workman`] running on host threads.
pub type HostWorkman = Workman<HostPlatform>;

/// [`Platform`] implementation on `std` threads.
#[derive(Debug)]
pub struct HostPlatform {
    config: HostConfig,
    preempt: PreemptLocks,
    threads: PerCore<Mutex<Option<JoinHandle<()>>>>,
    /// Notified by each dispatcher as it becomes ready; `boot` sleeps on it.
    booted: (Mutex<()>, Condvar),
}

impl HostPlatform {
    /// Creates a platform with `config.cores` logical cores. No threads are
    /// started until cores are brought up.
    pub fn new(config: HostConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            preempt: PreemptLocks::new(config.cores),
            threads: PerCore::new_with(config.cores, |_| Mutex::new(None)),
            booted: (Mutex::new(()), Condvar::new()),
            config,
        })
    }

    /// The configuration this platform was built with.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Checks whether the dispatcher thread for `core` exists and hasn't
    /// exited. A dispatcher only exits when one of its handlers panics.
    pub fn is_running(&self, core: usize) -> bool {
        self.threads
            .get(core)
            .is_some_and(|slot| slot.lock().as_ref().is_some_and(|h| !h.is_finished()))
    }

    /// Sleeps until `cond` holds, rechecking whenever a dispatcher becomes
    /// ready.
    fn wait_booted(&self, mut cond: impl FnMut() -> bool) {
        let (lock, cv) = &self.booted;
        let mut guard = lock.lock();
        while !cond() {
            cv.wait(&mut guard);
        }
    }
}

impl Platform for HostPlatform {
    type Thread = HostThread;
    type WaitQueue = HostWaitQueue;
    type SpawnError = io::Error;

    fn core_count(&self) -> usize {
        self.config.cores
    }

    fn spawn_on(
        &self,
        core: usize,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<(), Self::SpawnError> {
        let slot = self.threads.get(core).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("no core {core}"))
        })?;
        let handle = multicore::spawn_core(&self.config, core, entry)?;
        #[cfg(feature = "log")]
        log::debug!("spawned {:?} for core {}", handle.thread().name(), core);
        *slot.lock() = Some(handle);
        Ok(())
    }

    fn current_thread(&self) -> HostThread {
        HostThread::current()
    }

    fn wait_until(&self, cond: &mut dyn FnMut() -> bool) {
        multicore::park_until(cond)
    }

    fn core_ready(&self, _core: usize) {
        // Readiness is already published; taking the lock orders this after
        // any `boot` that checked it and is about to sleep.
        let (lock, cv) = &self.booted;
        let _guard = lock.lock();
        cv.notify_all();
    }

    fn without_preemption<R>(&self, core: usize, body: impl FnOnce() -> R) -> R {
        self.preempt.scope(core, body)
    }
}

/// Brings up every core of `workman`, in core order, and returns once all of
/// their dispatchers are ready to accept signals.
pub fn boot(workman: &Arc<HostWorkman>) -> Result<(), Error> {
    for core in 0..workman.cores() {
        workman.bring_up(core)?;
    }
    workman
        .platform()
        .wait_booted(|| (0..workman.cores()).all(|core| workman.is_ready(core)));
    #[cfg(feature = "log")]
    log::info!("{} dispatchers ready", workman.cores());
    Ok(())
}

/// Builds a platform from `config`, freezes `registry`, and boots every core.
pub fn start(
    config: HostConfig,
    registry: RegistryBuilder,
    hooks: impl Hooks + 'static,
) -> Result<Arc<HostWorkman>, Error> {
    let platform = HostPlatform::new(config)?;
    let workman = Arc::new(Workman::with_hooks(platform, registry, hooks));
    boot(&workman)?;
    Ok(workman)
}
