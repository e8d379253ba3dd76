//! Bulk endpoint transport
//!
//! Each bulk endpoint owns an independent transmit state machine, a
//! [`Transmitter`], which splits a buffer into max packet size chunks and
//! advances on every "transmit complete" interrupt. The command endpoint adds
//! a [`Receiver`], which assembles OUT fragments into a frame and declares
//! the frame complete when the endpoint goes quiet.
//!
//! [`CommandClass`] and [`StreamClass`] put those state machines behind
//! `usb-device` classes. The session talks to the command endpoint through
//! [`Channel`], and stream producers talk to their endpoints through
//! [`Stream`].
//!
//! # Requirements
//!
//! Endpoints start closed. Once your device is configured, call
//! `configure()` on each class to open its endpoints. A USB reset closes
//! them again. Until then, transmits fail with [`TransmitError::Disabled`].
//!
//! The classes are driven from the USB interrupt, by `UsbDevice::poll()`,
//! and used from the polling task. See [`Shared`](crate::shared::Shared) for
//! sharing a class between the two.

mod class;
mod rx;
mod tx;

pub use class::{CommandClass, StreamClass, VENDOR_CLASS};
pub use rx::Receiver;
pub use tx::{Transmitter, TxComplete};

use crate::buffer::Overflow;
use usb_device::UsbError;

/// A bulk IN endpoint, as seen by a [`Transmitter`]
pub trait BulkIn {
    /// Largest packet the endpoint moves in one transaction.
    fn max_packet_size(&self) -> usize;
    /// Queue one packet, at most `max_packet_size()` bytes.
    ///
    /// An empty packet is a zero-length packet.
    fn write_packet(&mut self, packet: &[u8]) -> usb_device::Result<()>;
    /// Drop any stale state before a new transfer starts.
    fn flush(&mut self) {}
}

impl<B: usb_device::bus::UsbBus> BulkIn for usb_device::endpoint::EndpointIn<'_, B> {
    fn max_packet_size(&self) -> usize {
        usb_device::endpoint::EndpointIn::max_packet_size(self) as usize
    }
    fn write_packet(&mut self, packet: &[u8]) -> usb_device::Result<()> {
        self.write(packet).map(|_| ())
    }
}

/// Why a transmit didn't start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TransmitError {
    /// A transfer is already in flight on this endpoint.
    Busy,
    /// The endpoint isn't open.
    Disabled,
    /// The buffer exceeds the endpoint's transmit buffer.
    TooLarge { len: usize, capacity: usize },
    /// The endpoint rejected the first packet.
    Usb(UsbError),
}

/// The command endpoint, as seen by the session
pub trait Channel {
    /// Clear the receive state, and accept the next frame.
    fn receive_to_idle(&mut self);
    /// Copy a completed frame into `dst`, returning its length
    ///
    /// Returns `None` if no frame is ready. A frame that overflowed the
    /// receive buffer, or doesn't fit `dst`, is an `Err`. Either way, the
    /// frame is consumed, and nothing more is received until the next
    /// [`receive_to_idle()`](Channel::receive_to_idle).
    fn take_frame(&mut self, dst: &mut [u8]) -> Option<Result<usize, Overflow>>;
    /// Start transmitting `data`.
    fn transmit(&mut self, data: &[u8]) -> Result<(), TransmitError>;
    /// Indicates if the last transmit has drained.
    fn is_transmit_complete(&mut self) -> bool;
}

/// A streaming IN endpoint, as seen by a producer
pub trait Stream {
    /// Start transmitting `data`, or report why it can't start.
    ///
    /// A busy endpoint doesn't queue; the caller decides whether to drop or
    /// retry.
    fn send(&mut self, data: &[u8]) -> Result<(), TransmitError>;
}
