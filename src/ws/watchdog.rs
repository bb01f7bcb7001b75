//! External stream watchdog.
//!
//! Runs outside the protocol engine and shares only two things with it:
//! the last-activity timestamp and the forced-close signal. If the
//! engine stops making progress for longer than the threshold — stuck
//! session, wedged socket, anything — the watchdog forces the session
//! down and the supervisor's normal reconnect path takes over. The
//! node can therefore always recover without a reboot.

use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use log::warn;

pub struct StreamWatchdog {
    last_activity: Rc<Cell<Instant>>,
    force_close: Rc<Signal<NoopRawMutex, ()>>,
    threshold: Duration,
    poll_interval: Duration,
}

impl StreamWatchdog {
    pub fn new(
        last_activity: Rc<Cell<Instant>>,
        force_close: Rc<Signal<NoopRawMutex, ()>>,
        threshold: Duration,
    ) -> Self {
        let poll_interval = (threshold / 4).max(Duration::from_secs(1));
        Self { last_activity, force_close, threshold, poll_interval }
    }

    pub async fn run(&self) {
        loop {
            async_io_mini::Timer::after(self.poll_interval).await;

            let idle = self.last_activity.get().elapsed();
            if idle > self.threshold {
                warn!(
                    "Watchdog: no stream activity for {:.0}s, forcing reconnect",
                    idle.as_secs_f32()
                );
                self.force_close.signal(());
                // Restart the idle clock so a session that takes a
                // while to rebuild is not immediately shot again.
                self.last_activity.set(Instant::now());
            }
        }
    }
}
