use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::error::CaptureError;

/// Longest uninterrupted sleep, so cancellation is observed promptly.
const POLL_STEP: Duration = Duration::from_millis(50);

struct TickerInner {
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Background thread that calls `on_tick` once per interval until cancelled
/// or until the callback returns false.
///
/// Ticks are scheduled against a fixed deadline, so a slow callback does not
/// make later ticks drift, and missed ticks are not queued up.
pub struct Ticker {
    handle: TickerHandle,
}

/// Cancellation handle for a [`Ticker`]. Cheap to clone.
#[derive(Clone)]
pub struct TickerHandle {
    inner: Arc<TickerInner>,
}

impl Ticker {
    pub fn spawn(interval: Duration, mut on_tick: impl FnMut() -> bool + Send + 'static) -> Result<Self, CaptureError> {
        let interval = interval.max(Duration::from_millis(1));
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("elapsed-ticker".into())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                while flag.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now < deadline {
                        thread::sleep((deadline - now).min(POLL_STEP));
                        continue;
                    }
                    if !on_tick() {
                        break;
                    }
                    deadline += interval;
                    if deadline < now {
                        deadline = now + interval;
                    }
                }
                flag.store(false, Ordering::SeqCst);
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn ticker thread: {}", e)))?;

        Ok(Self {
            handle: TickerHandle {
                inner: Arc::new(TickerInner {
                    running,
                    thread: Mutex::new(Some(thread)),
                }),
            },
        })
    }

    pub fn handle(&self) -> TickerHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl TickerHandle {
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stop ticking and join the thread. Idempotent.
    ///
    /// When called from the ticker thread itself the thread is detached
    /// instead of joined; it exits after the current tick.
    pub fn cancel(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        let Some(thread) = self.inner.thread.lock().take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            log::error!("Elapsed ticker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn ticks_until_cancelled() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let ticker = Ticker::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();

        let start = Instant::now();
        while count.load(Ordering::SeqCst) < 3 && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        ticker.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));

        assert!(after_cancel >= 3);
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
        assert!(!ticker.is_running());
    }

    #[test]
    fn callback_can_stop_the_ticker() {
        let ticker = Ticker::spawn(Duration::from_millis(1), || false).unwrap();

        let start = Instant::now();
        while ticker.is_running() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(2));
        }

        assert!(!ticker.is_running());
    }

    #[test]
    fn cancel_from_inside_the_tick_does_not_deadlock() {
        let slot: Arc<Mutex<Option<TickerHandle>>> = Arc::new(Mutex::new(None));
        let inside = Arc::clone(&slot);
        let ticker = Ticker::spawn(Duration::from_millis(1), move || {
            if let Some(handle) = inside.lock().as_ref() {
                handle.cancel();
            }
            true
        })
        .unwrap();
        *slot.lock() = Some(ticker.handle());

        let start = Instant::now();
        while ticker.is_running() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(2));
        }

        assert!(!ticker.is_running());
        ticker.cancel();
    }
}
