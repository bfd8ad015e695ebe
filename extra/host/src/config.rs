use std::num::NonZeroUsize;

use crate::Error;

/// Settings for [`HostPlatform`][crate::HostPlatform].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Number of logical cores, i.e. dispatcher threads.
    pub cores: usize,
    /// Dispatcher threads are named `{thread_name}{core}`.
    pub thread_name: String,
    /// Stack size for dispatcher threads. `None` uses the `std` default.
    pub stack_size: Option<usize>,
    /// Pin each dispatcher thread to a physical CPU. Needs the `affinity`
    /// feature; ignored without it.
    pub pin: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cores: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            thread_name: "sheriff".into(),
            stack_size: None,
            pin: false,
        }
    }
}

impl HostConfig {
    /// Sets the number of logical cores.
    pub fn cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    /// Sets the dispatcher thread name prefix.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Sets the dispatcher stack size in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Turns physical CPU pinning on or off.
    pub fn pin(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    /// Checks that the configuration can be booted.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cores == 0 {
            return Err(Error::NoCores);
        }
        Ok(())
    }
}
