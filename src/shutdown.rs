//! Cooperative stop signal shared by every channel thread.
//!
//! Nothing is ever sent on the channel: dropping the [`ShutdownTrigger`]
//! disconnects it, which wakes every receiver blocked in
//! [`Shutdown::wait`] at once.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Held by the engine owner; dropping or firing it stops the run.
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: Option<Sender<()>>,
}

impl ShutdownTrigger {
    pub fn fire(&mut self) {
        self.sender.take();
    }
}

/// Cloned into each channel.
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: Receiver<()>,
}

pub fn shutdown_pair() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = bounded(0);
    (
        ShutdownTrigger {
            sender: Some(sender),
        },
        Shutdown { receiver },
    )
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        !matches!(self.receiver.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleep for `duration` unless shutdown fires first.
    /// Returns `true` if the full duration elapsed.
    pub fn wait(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_triggered();
        }
        matches!(
            self.receiver.recv_timeout(duration),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_runs_full_duration_while_armed() {
        let (_trigger, shutdown) = shutdown_pair();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.wait(Duration::from_millis(5)));
    }

    #[test]
    fn firing_wakes_blocked_waiters() {
        let (mut trigger, shutdown) = shutdown_pair();
        let waiter = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let completed = shutdown.wait(Duration::from_secs(30));
                (completed, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        trigger.fire();
        let (completed, elapsed) = waiter.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(5));
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn dropping_trigger_counts_as_shutdown() {
        let (trigger, shutdown) = shutdown_pair();
        drop(trigger);
        assert!(shutdown.is_triggered());
        assert!(!shutdown.wait(Duration::ZERO));
    }
}
