//! Idle-terminated receive assembly

use crate::buffer::{FrameBuffer, Overflow};
use crate::signal::Signal;
use crate::timer::IdleTimer;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flags: u8 {
        /// Fragments are accepted into the frame buffer.
        const ARMED = 1 << 0;
        /// The current frame didn't fit. Its remaining fragments are dropped.
        const OVERFLOWED = 1 << 1;
    }
}

/// Assembles OUT fragments into one frame
///
/// Bulk OUT transfers arrive one max packet size fragment at a time, and
/// nothing below the framer knows how long a frame is. The receiver appends
/// each fragment and restarts an idle timer. When the timer elapses, the
/// bytes received so far are one frame.
///
/// After a frame is declared ready, nothing is accepted until the owner calls
/// [`receive_to_idle()`](Receiver::receive_to_idle) again.
pub struct Receiver<const N: usize> {
    frame: FrameBuffer<N>,
    flags: Flags,
    ready: Signal,
}

impl<const N: usize> Receiver<N> {
    pub const fn new() -> Self {
        Receiver {
            frame: FrameBuffer::new(),
            flags: Flags::empty(),
            ready: Signal::new(),
        }
    }

    /// Clear the frame buffer and accept fragments.
    pub fn receive_to_idle(&mut self) {
        self.frame.clear();
        self.ready.clear();
        self.flags = Flags::ARMED;
    }

    /// Stop accepting fragments, and drop any partial frame.
    pub fn close(&mut self) {
        self.frame.clear();
        self.ready.clear();
        self.flags = Flags::empty();
    }

    /// Indicates if fragments are being accepted.
    pub fn is_armed(&self) -> bool {
        self.flags.contains(Flags::ARMED)
    }

    /// Handle one received fragment
    ///
    /// Call from the OUT endpoint's interrupt handler. Restarts `timer` for
    /// every fragment accepted, including fragments dropped after an
    /// overflow, so that the end of an oversized frame is still found.
    pub fn on_fragment(&mut self, fragment: &[u8], timer: &mut impl IdleTimer) {
        if !self.is_armed() {
            warn!("RX DROPPED {} BYTES, NO RECEIVE ARMED", fragment.len());
            return;
        }
        timer.restart();
        if self.flags.contains(Flags::OVERFLOWED) {
            return;
        }
        if self.frame.append(fragment).is_err() {
            warn!(
                "RX OVERFLOW AT {} + {} BYTES",
                self.frame.len(),
                fragment.len()
            );
            self.flags.insert(Flags::OVERFLOWED);
        }
    }

    /// Handle the idle timer elapsing
    ///
    /// Call from the timer's interrupt handler. If anything arrived since the
    /// receiver was armed, the frame is ready. A zero-length fragment alone
    /// doesn't make a frame; the receiver stays armed.
    pub fn on_idle_timeout(&mut self, timer: &mut impl IdleTimer) {
        timer.stop();
        if !self.is_armed() {
            trace!("RX IDLE WITH NO RECEIVE ARMED");
            return;
        }
        if self.frame.is_empty() && !self.flags.contains(Flags::OVERFLOWED) {
            return;
        }
        self.flags.remove(Flags::ARMED);
        trace!("RX FRAME READY {} BYTES", self.frame.len());
        self.ready.raise();
    }

    /// Indicates if a frame is waiting in [`take_frame()`](Receiver::take_frame).
    pub fn is_frame_ready(&self) -> bool {
        self.ready.is_raised()
    }

    /// Copy the ready frame into `dst`, returning its length
    ///
    /// Returns `None` if there's no frame ready. An overflowed frame, or a
    /// frame larger than `dst`, is reported as [`Overflow`] and discarded.
    pub fn take_frame(&mut self, dst: &mut [u8]) -> Option<Result<usize, Overflow>> {
        if !self.ready.take() {
            return None;
        }
        let overflowed = self.flags.contains(Flags::OVERFLOWED);
        self.flags.remove(Flags::OVERFLOWED);

        let frame = self.frame.as_slice();
        let result = if overflowed || frame.len() > dst.len() {
            Err(Overflow)
        } else {
            dst[..frame.len()].copy_from_slice(frame);
            Ok(frame.len())
        };
        self.frame.clear();
        Some(result)
    }
}

impl<const N: usize> Default for Receiver<N> {
    fn default() -> Self {
        Self::new()
    }
}
