use std::cell::Cell;
use std::io;
use std::thread::{self, JoinHandle, Thread};

use workman::ThreadHandle;

use crate::HostConfig;

thread_local! {
    static CURRENT_CORE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Returns the logical core the calling thread is bound to, or `None` for
/// threads that aren't dispatchers.
pub fn current_core() -> Option<usize> {
    CURRENT_CORE.with(Cell::get)
}

/// A dispatcher thread, woken with `unpark`.
#[derive(Debug, Clone)]
pub struct HostThread(pub(crate) Thread);

impl HostThread {
    pub(crate) fn current() -> Self {
        Self(thread::current())
    }
}

impl ThreadHandle for HostThread {
    fn wake(&self) {
        self.0.unpark();
    }
}

/// Parks the calling thread until `cond` holds. An `unpark` that arrives
/// before we park leaves a token behind, so no wake is lost.
pub(crate) fn park_until(cond: &mut dyn FnMut() -> bool) {
    while !cond() {
        thread::park();
    }
}

/// Spawns `entry` on a new thread bound to logical core `core`.
pub(crate) fn spawn_core(
    config: &HostConfig,
    core: usize,
    entry: Box<dyn FnOnce() + Send + 'static>,
) -> io::Result<JoinHandle<()>> {
    let mut builder = thread::Builder::new().name(format!("{}{}", config.thread_name, core));
    if let Some(bytes) = config.stack_size {
        builder = builder.stack_size(bytes);
    }
    let pin = config.pin;
    builder.spawn(move || {
        CURRENT_CORE.with(|c| c.set(Some(core)));
        if pin {
            pin_to_cpu(core);
        }
        entry()
    })
}

#[cfg(feature = "affinity")]
fn pin_to_cpu(core: usize) {
    let Some(ids) = core_affinity::get_core_ids().filter(|ids| !ids.is_empty()) else {
        #[cfg(feature = "log")]
        log::warn!("core {}: no CPU ids available, not pinning", core);
        return;
    };
    let id = ids[core % ids.len()];
    if core_affinity::set_for_current(id) {
        #[cfg(feature = "log")]
        log::debug!("core {} pinned to cpu {}", core, id.id);
    } else {
        #[cfg(feature = "log")]
        log::warn!("core {}: failed to pin to cpu {}", core, id.id);
    }
}

#[cfg(not(feature = "affinity"))]
fn pin_to_cpu(_core: usize) {
    #[cfg(feature = "log")]
    log::warn!("pinning requested but the `affinity` feature is off");
}
