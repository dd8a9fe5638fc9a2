//! System-wide exclusivity for capture sessions.

use std::sync::atomic::{AtomicBool, Ordering};

/// Allows at most one capture session at a time across all channels.
///
/// States are `Free` and `Busy`. The only way into `Busy` is
/// [`try_begin`](Self::try_begin), and the only way out is dropping (or
/// explicitly ending) the lease it returns.
#[derive(Debug, Default)]
pub struct CaptureCoordinator {
    busy: AtomicBool,
}

impl CaptureCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking test-and-set. `None` means another channel is capturing;
    /// the caller goes straight back to playback.
    pub fn try_begin(&self) -> Option<CaptureLease<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CaptureLease { coordinator: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn end(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Proof of owning the single capture slot; releases it on drop, including
/// during unwinding.
#[derive(Debug)]
#[must_use = "dropping the lease immediately releases the capture slot"]
pub struct CaptureLease<'a> {
    coordinator: &'a CaptureCoordinator,
}

impl CaptureLease<'_> {
    pub fn end(self) {
        drop(self);
    }
}

impl Drop for CaptureLease<'_> {
    fn drop(&mut self) {
        self.coordinator.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn second_begin_fails_until_lease_ends() {
        let coordinator = CaptureCoordinator::new();
        let lease = coordinator.try_begin().expect("first begin");
        assert!(coordinator.is_busy());
        assert!(coordinator.try_begin().is_none());
        lease.end();
        assert!(!coordinator.is_busy());
        assert!(coordinator.try_begin().is_some());
    }

    #[test]
    fn panic_while_holding_lease_releases_it() {
        let coordinator = CaptureCoordinator::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _lease = coordinator.try_begin().unwrap();
            panic!("capture blew up");
        }));
        assert!(result.is_err());
        assert!(!coordinator.is_busy());
    }

    #[test]
    fn concurrent_channels_never_overlap() {
        let coordinator = Arc::new(CaptureCoordinator::new());
        let active = Arc::new(AtomicUsize::new(0));
        let granted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let active = active.clone();
                let granted = granted.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        if let Some(lease) = coordinator.try_begin() {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            assert_eq!(now, 1, "two sessions active at once");
                            granted.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_micros(50));
                            active.fetch_sub(1, Ordering::SeqCst);
                            drop(lease);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(granted.load(Ordering::SeqCst) > 0);
        assert!(!coordinator.is_busy());
    }
}
