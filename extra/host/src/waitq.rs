use parking_lot::{Condvar, Mutex};
use workman::{ThreadHandle, WaitQueue};

use crate::HostThread;

/// Completion wait-queue built on a condition variable.
///
/// Waiters test their condition with the queue lock held and `wake_all`
/// takes the same lock, so a completion published before `wake_all` is
/// always seen by a waiter that goes to sleep.
#[derive(Debug, Default)]
pub struct HostWaitQueue {
    lock: Mutex<()>,
    cond: Condvar,
}

impl WaitQueue<HostThread> for HostWaitQueue {
    fn new() -> Self {
        Self::default()
    }

    fn wait_until(&self, kick: &HostThread, cond: &mut dyn FnMut() -> bool) {
        let mut guard = self.lock.lock();
        kick.wake();
        while !cond() {
            self.cond.wait(&mut guard);
        }
    }

    fn wake_all(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}
