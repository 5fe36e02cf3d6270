//! Ticker source: dedicated thread publishing periodic `timer.tick` events.
//!
//! Used for cursor blink, status line expiry and similar coarse timing.
//! Ticks that cannot be delivered on time are skipped rather than queued.

use super::{EventError, EventHub};
use crate::message::{Message, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// `timer.tick(frame, elapsed_ms)`.
pub const TICK: &str = "timer.tick";

/// Ticker source that publishes regular timing events.
pub struct TickerSource {
    /// Handle to the ticker thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
}

impl TickerSource {
    /// Spawn a ticker publishing every `interval`.
    ///
    /// # Errors
    ///
    /// [`EventError::Io`] if the thread cannot be spawned.
    pub fn spawn(hub: EventHub, interval: Duration) -> Result<Self, EventError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("keel-ticker".to_string())
            .spawn(move || Self::run_loop(&hub, &shutdown_clone, interval))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Signal the ticker to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the ticker thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn run_loop(hub: &EventHub, shutdown: &AtomicBool, interval: Duration) {
        let start = Instant::now();
        let mut frame = 0i64;
        let mut next_tick = start + interval;

        while !shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= next_tick {
                let elapsed = i64::try_from((now - start).as_millis()).unwrap_or(i64::MAX);
                let tick = Message::new(TICK, vec![Value::Int(frame), Value::Int(elapsed)]);
                if hub.publish(tick).is_err() {
                    break;
                }

                frame += 1;
                next_tick += interval;

                // Behind schedule: skip the missed ticks
                if next_tick < now {
                    next_tick = now + interval;
                }
            } else {
                thread::sleep((next_tick - now).min(Duration::from_millis(5)));
            }
        }
        debug!(frames = frame, "ticker stopped");
    }
}

impl Drop for TickerSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Flow, Runtime, RuntimeConfig};
    use crate::event::SourceKind;
    use crossbeam_channel::{unbounded, Sender};

    #[test]
    fn test_ticks_reach_subscribers() {
        let rt = Runtime::with_config(RuntimeConfig {
            workers: 2,
            shutdown_on_root_exit: false,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let hub = EventHub::spawn(&rt.handle()).unwrap();
        let (tx, rx) = unbounded();
        let sub = rt
            .spawn(move |_ctx| Ok(tx), |tx: &mut Sender<Message>, _ctx, message| {
                let _ = tx.send(message);
                Ok(Flow::Continue)
            })
            .unwrap();
        hub.subscribe(SourceKind::Timer, sub).unwrap();
        // Let the subscription land before the first tick.
        thread::sleep(Duration::from_millis(20));

        let ticker = TickerSource::spawn(hub, Duration::from_millis(10)).unwrap();
        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(first.is(TICK));
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(second.int_arg(0) > first.int_arg(0));
        ticker.join();
    }
}
