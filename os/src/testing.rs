// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A recording platform for unit tests. It never runs the threads it is asked
//! to spawn, and anything that would block panics instead.

use std::boxed::Box;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use crate::platform::{Platform, ThreadHandle, WaitQueue};

#[derive(Clone, Debug, Default)]
pub(crate) struct MockThread(Arc<AtomicUsize>);

impl MockThread {
    pub(crate) fn wakes(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ThreadHandle for MockThread {
    fn wake(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockWaitQueue(AtomicUsize);

impl MockWaitQueue {
    pub(crate) fn wakes(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl WaitQueue<MockThread> for MockWaitQueue {
    fn new() -> Self {
        Self::default()
    }

    fn wait_until(&self, kick: &MockThread, cond: &mut dyn FnMut() -> bool) {
        kick.wake();
        assert!(cond(), "mock wait queue would block");
    }

    fn wake_all(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct MockPlatform {
    pub(crate) cores: usize,
    pub(crate) fail_spawn: AtomicBool,
    pub(crate) spawned: Mutex<Vec<usize>>,
    pub(crate) thread: MockThread,
    pub(crate) in_section: AtomicBool,
}

impl MockPlatform {
    pub(crate) fn new(cores: usize) -> Self {
        Self {
            cores,
            fail_spawn: AtomicBool::new(false),
            spawned: Mutex::new(Vec::new()),
            thread: MockThread::default(),
            in_section: AtomicBool::new(false),
        }
    }
}

impl Platform for MockPlatform {
    type Thread = MockThread;
    type WaitQueue = MockWaitQueue;
    type SpawnError = &'static str;

    fn core_count(&self) -> usize {
        self.cores
    }

    fn spawn_on(
        &self,
        core: usize,
        _entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<(), Self::SpawnError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err("out of threads");
        }
        self.spawned.lock().unwrap().push(core);
        Ok(())
    }

    fn current_thread(&self) -> Self::Thread {
        self.thread.clone()
    }

    fn wait_until(&self, cond: &mut dyn FnMut() -> bool) {
        assert!(cond(), "mock platform would block");
    }

    fn without_preemption<R>(&self, _core: usize, body: impl FnOnce() -> R) -> R {
        self.in_section.store(true, Ordering::SeqCst);
        let r = body();
        self.in_section.store(false, Ordering::SeqCst);
        r
    }
}
