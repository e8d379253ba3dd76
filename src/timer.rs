//! Receive idle timers and the transmit clock.
//!
//! A command endpoint decides that a frame is complete when its OUT endpoint
//! has been quiet for a while. The endpoint restarts an [`IdleTimer`] on every
//! received fragment, and expects a call to its idle timeout handler when the
//! timer elapses.
//!
//! Boards with a spare hardware timer implement [`IdleTimer`] over that
//! timer, and call the endpoint's timeout handler from the timer's ISR.
//! Otherwise, use a [`Countdown`] and advance it from any periodic tick.
//!
//! # Example
//!
//! ```
//! use usb_bridge::timer::{Countdown, IdleTimer};
//!
//! let mut timer = Countdown::new(2_000); // Elapse after 2ms of silence
//!
//! timer.restart(); // A fragment arrived...
//! assert!(!timer.advance(1_000));
//! timer.restart(); // ...and another, before the timeout.
//! assert!(!timer.advance(1_500));
//! assert!(timer.advance(500)); // Quiet for 2ms. The frame is complete.
//!
//! // The timer stops once it elapses.
//! assert!(!timer.is_running());
//! assert!(timer.is_elapsed());
//! ```

use crate::config::Config;

/// One shot timer armed by a receive handler
pub trait IdleTimer {
    /// Stop the timer, reload its timeout, and start it again.
    fn restart(&mut self);
    /// Cancel the timer.
    fn stop(&mut self);
}

/// Monotonic millisecond time
///
/// Only differences are used, with wrapping arithmetic, so the counter may
/// roll over.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<F> Clock for F
where
    F: Fn() -> u32,
{
    fn now_ms(&self) -> u32 {
        self()
    }
}

/// Software one shot countdown with a 1us resolution.
///
/// The timer only moves when you [`advance()`](Countdown::advance) it. It's
/// started and stopped through [`IdleTimer`].
#[derive(Debug, Clone)]
pub struct Countdown {
    load: u32,
    count: u32,
    running: bool,
    elapsed: bool,
}

impl Countdown {
    /// A stopped timer that elapses `load` microseconds after it's started.
    pub const fn new(load: u32) -> Self {
        Countdown {
            load,
            count: load,
            running: false,
            elapsed: false,
        }
    }

    /// A stopped timer loaded with the configured receive idle timeout.
    pub const fn for_idle(config: &Config) -> Self {
        Self::new(config.idle_timeout_us)
    }

    /// The timeout, in microseconds.
    pub fn load(&self) -> u32 {
        self.load
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Indicates if the timer elapsed since it was last started.
    pub fn is_elapsed(&self) -> bool {
        self.elapsed
    }

    /// Let `microseconds` pass.
    ///
    /// Returns `true` if the timer elapsed during this step. A stopped timer
    /// never elapses, and an elapsed timer stays stopped until it's
    /// restarted.
    pub fn advance(&mut self, microseconds: u32) -> bool {
        if !self.running {
            return false;
        }
        if microseconds < self.count {
            self.count -= microseconds;
            return false;
        }
        self.count = 0;
        self.running = false;
        self.elapsed = true;
        true
    }
}

impl IdleTimer for Countdown {
    fn restart(&mut self) {
        self.count = self.load;
        self.elapsed = false;
        self.running = true;
    }
    fn stop(&mut self) {
        self.running = false;
    }
}
