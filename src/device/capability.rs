use std::thread;

/// What the secondary execution domain can offer on this machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCapability {
    pub available: bool,
    pub worker_threads: usize,
}

impl DeviceCapability {
    /// Query the host once. The device domain needs more than one hardware
    /// thread to be worth running.
    pub fn probe() -> Self {
        let workers = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self {
            available: workers > 1,
            worker_threads: workers,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            worker_threads: 0,
        }
    }

    /// A device with an explicit worker count, zero meaning unavailable.
    pub fn with_workers(worker_threads: usize) -> Self {
        Self {
            available: worker_threads > 0,
            worker_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_is_consistent() {
        let capability = DeviceCapability::probe();
        assert!(capability.worker_threads >= 1);
        assert_eq!(capability.available, capability.worker_threads > 1);
    }

    #[test]
    fn zero_workers_is_unavailable() {
        assert_eq!(DeviceCapability::with_workers(0), DeviceCapability::unavailable());
        assert!(DeviceCapability::with_workers(2).available);
    }
}
