//! Cooperative cancellation for sequence runs
//!
//! A `CancelSource` owns the only `Sender` of a channel that never carries
//! a message. Cancelling drops that sender, which disconnects the channel
//! and wakes every `CancelToken` blocked in `wait` at once. Tokens are
//! cheap clones of the receiver.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug)]
pub struct CancelSource {
    trigger: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
    cancelled: Arc<AtomicBool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Mutex::new(Some(tx)),
            receiver: rx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.receiver.clone(),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Cancels every token. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a `CancelSource`
#[derive(Clone, Debug)]
pub struct CancelToken {
    receiver: Receiver<()>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns `true` if the token was cancelled before or during the wait.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        if duration.is_zero() {
            return false;
        }

        match self.receiver.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            // Disconnected: the source cancelled or was dropped
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out_when_not_cancelled() {
        let source = CancelSource::new();
        let token = source.token();

        let started = Instant::now();
        assert!(!token.wait(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_cancel_wakes_waiter_early() {
        let source = CancelSource::new();
        let token = source.token();

        let waiter = thread::spawn(move || {
            let started = Instant::now();
            let cancelled = token.wait(Duration::from_secs(10));
            (cancelled, started.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        source.cancel();

        let (cancelled, elapsed) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_cancel_is_idempotent_and_sticky() {
        let source = CancelSource::new();
        let token = source.token();

        source.cancel();
        source.cancel();

        assert!(source.is_cancelled());
        assert!(token.is_cancelled());
        assert!(token.wait(Duration::ZERO));
        assert!(token.clone().wait(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_wait_does_not_block() {
        let token = CancelSource::new().token();
        assert!(!token.wait(Duration::ZERO));
    }
}
