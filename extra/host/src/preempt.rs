use std::cell::Cell;

use parking_lot::Mutex;
use workman::PerCore;

thread_local! {
    static PREEMPT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Returns `true` while the calling thread is inside a non-preemptible
/// section, e.g. while a dispatcher is running handlers.
pub fn in_critical_section() -> bool {
    PREEMPT_DEPTH.with(Cell::get) > 0
}

/// Stand-in for disabling preemption. Host threads can't stop the OS from
/// descheduling them, so each core gets a lock that only its own dispatcher
/// ever takes: the sweep runs to completion without another sweep on the same
/// core interleaving with it.
#[derive(Debug)]
pub(crate) struct PreemptLocks(PerCore<Mutex<()>>);

impl PreemptLocks {
    pub(crate) fn new(cores: usize) -> Self {
        Self(PerCore::new_with(cores, |_| Mutex::new(())))
    }

    pub(crate) fn scope<R>(&self, core: usize, body: impl FnOnce() -> R) -> R {
        let _lock = self.0[core].lock();
        PREEMPT_DEPTH.with(|d| d.set(d.get() + 1));
        let _restore = scopeguard::guard((), |()| {
            PREEMPT_DEPTH.with(|d| d.set(d.get() - 1));
        });
        body()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_marks_critical_section() {
        let locks = PreemptLocks::new(2);
        assert!(!in_critical_section());
        let inside = locks.scope(1, in_critical_section);
        assert!(inside);
        assert!(!in_critical_section());
    }

    #[test]
    fn depth_is_restored_on_unwind() {
        let locks = PreemptLocks::new(1);
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            locks.scope(0, || panic!("boom"));
        }));
        assert!(r.is_err());
        assert!(!in_critical_section());
        // Lock was released too.
        assert_eq!(locks.scope(0, || 7), 7);
    }
}
