// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal example of using `workman` to run per-core work on host threads.
//!
//! This registers two work items -- one that bumps a per-core counter and one
//! that "flushes" a per-core cache -- brings up one dispatcher per core, and
//! then signals them.
//!
//! This demonstrates
//!
//! 1. How to register work items and start the dispatchers.
//! 2. The difference between waiting and non-waiting signals.
//! 3. That handlers run on the core they were signaled for.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{Level, LevelFilter, Metadata, Record};
use workman::{NoHooks, RegistryBuilder};
use workman_host::{current_core, HostConfig};

const CORES: usize = 4;

/// Prints log records to stderr, prefixed with the core they came from.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            let core = current_core().map_or("-".to_string(), |c| c.to_string());
            eprintln!("[{} core {}] {}", record.level(), core, record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() -> Result<(), workman_host::Error> {
    // Logging is optional; this just makes the dispatch path visible.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }

    let ticks: Arc<Vec<AtomicUsize>> = Arc::new((0..CORES).map(|_| AtomicUsize::new(0)).collect());

    let mut registry = RegistryBuilder::with_capacity(2);
    let t = ticks.clone();
    let tick = registry.register("tick", move || {
        if let Some(core) = current_core() {
            t[core].fetch_add(1, Ordering::Relaxed);
        }
    })?;
    let flush = registry.register("flush", || {
        log::info!("flushing per-core cache");
    })?;

    let wm = workman_host::start(HostConfig::default().cores(CORES), registry, NoHooks)?;

    // Fire-and-forget on every core, then wait on each so we know they ran.
    for core in 0..CORES {
        wm.signal(core, tick, false);
    }
    for core in 0..CORES {
        wm.signal(core, flush, true);
        wm.signal(core, tick, true);
    }

    for (core, count) in ticks.iter().enumerate() {
        println!("core {}: tick ran {} time(s)", core, count.load(Ordering::Relaxed));
    }
    Ok(())
}
