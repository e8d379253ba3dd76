//! Chunked bulk transmit

use super::{BulkIn, TransmitError};
use crate::signal::Signal;

/// Called from interrupt context with the bytes of a finished transfer.
pub type TxComplete = fn(&[u8]);

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Flags: u8 {
        /// The endpoint is open.
        const ENABLED = 1 << 0;
        /// Data chunks remain to be acknowledged.
        const IN_FLIGHT = 1 << 1;
        /// A terminating zero-length packet remains to be acknowledged.
        const ZLP_PENDING = 1 << 2;
    }
}

/// Transmit state for one bulk IN endpoint
///
/// The transmitter owns a copy of the transfer in a buffer of `N` bytes.
/// [`set_tx_buffer()`](Transmitter::set_tx_buffer) copies the data and sends
/// the first chunk. Call [`on_data_in()`](Transmitter::on_data_in) from the
/// endpoint's "IN complete" handler to send the rest.
///
/// There's at most one transfer in flight. A pending zero-length packet
/// counts as in flight.
pub struct Transmitter<const N: usize> {
    buffer: [u8; N],
    total: usize,
    cursor: usize,
    max_packet_size: usize,
    flags: Flags,
    zero_length_termination: bool,
    complete: Signal,
    on_complete: Option<TxComplete>,
}

impl<const N: usize> Transmitter<N> {
    /// A closed transmitter that terminates transfers with a zero-length
    /// packet when needed.
    pub const fn new() -> Self {
        Transmitter {
            buffer: [0; N],
            total: 0,
            cursor: 0,
            max_packet_size: 0,
            flags: Flags::empty(),
            zero_length_termination: true,
            complete: Signal::new(),
            on_complete: None,
        }
    }

    /// Send a zero-length packet after a transfer that ends on a packet
    /// boundary (`true`), or leave the transfer as is (`false`).
    pub fn set_zero_length_termination(&mut self, zlt: bool) {
        self.zero_length_termination = zlt;
    }

    /// Invoke `callback` after every finished transfer.
    pub fn set_on_complete(&mut self, callback: Option<TxComplete>) {
        self.on_complete = callback;
    }

    /// Open the endpoint, chunking by `max_packet_size`.
    pub fn open(&mut self, max_packet_size: usize) {
        self.max_packet_size = max_packet_size.max(1);
        self.total = 0;
        self.cursor = 0;
        self.flags = Flags::ENABLED;
        self.complete.clear();
        debug!("TX OPEN MPS={}", self.max_packet_size);
    }

    /// Close the endpoint, abandoning any transfer in flight.
    pub fn close(&mut self) {
        if self.is_busy() {
            warn!(
                "TX CLOSED WITH {} OF {} BYTES SENT",
                self.cursor, self.total
            );
        }
        self.flags = Flags::empty();
        self.total = 0;
        self.cursor = 0;
        self.complete.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(Flags::ENABLED)
    }

    /// Indicates if a transfer is in flight.
    pub fn is_busy(&self) -> bool {
        self.flags.intersects(Flags::IN_FLIGHT | Flags::ZLP_PENDING)
    }

    /// Indicates if the last transfer's data has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.complete.is_raised()
    }

    /// Start transferring `data`
    ///
    /// Fails without touching the transfer in flight when the endpoint is
    /// busy. An empty `data` sends one zero-length packet.
    pub fn set_tx_buffer(
        &mut self,
        io: &mut impl BulkIn,
        data: &[u8],
    ) -> Result<(), TransmitError> {
        if !self.is_enabled() {
            return Err(TransmitError::Disabled);
        }
        if self.is_busy() {
            return Err(TransmitError::Busy);
        }
        if data.len() > N {
            return Err(TransmitError::TooLarge {
                len: data.len(),
                capacity: N,
            });
        }

        io.flush();
        self.buffer[..data.len()].copy_from_slice(data);
        self.total = data.len();
        self.cursor = 0;
        self.complete.clear();
        self.flags.insert(Flags::IN_FLIGHT);

        self.write_chunk(io).map_err(|err| {
            self.flags.remove(Flags::IN_FLIGHT);
            TransmitError::Usb(err)
        })
    }

    /// Handle the endpoint's "IN complete" event
    ///
    /// Advances the cursor by one packet and sends the next chunk. After the
    /// last chunk, marks the transfer complete, runs the callback, and sends
    /// the terminating zero-length packet if one is needed.
    pub fn on_data_in(&mut self, io: &mut impl BulkIn) {
        if self.flags.contains(Flags::ZLP_PENDING) {
            self.flags.remove(Flags::ZLP_PENDING);
            return;
        }
        if !self.flags.contains(Flags::IN_FLIGHT) {
            trace!("TX COMPLETE WITH NOTHING IN FLIGHT");
            return;
        }

        self.cursor += self.max_packet_size;
        if self.cursor < self.total {
            if let Err(_err) = self.write_chunk(io) {
                warn!(
                    "TX ABORTED AT {} OF {} BYTES: {:?}",
                    self.cursor, self.total, _err
                );
                self.flags.remove(Flags::IN_FLIGHT);
            }
            return;
        }

        self.flags.remove(Flags::IN_FLIGHT);
        self.complete.raise();
        if let Some(callback) = self.on_complete {
            callback(&self.buffer[..self.total]);
        }
        if self.zero_length_termination
            && self.total > 0
            && self.total % self.max_packet_size == 0
        {
            match io.write_packet(&[]) {
                Ok(()) => self.flags.insert(Flags::ZLP_PENDING),
                Err(_err) => {
                    warn!("TX ZLP FAILED: {:?}", _err);
                }
            }
        }
    }

    fn write_chunk(&mut self, io: &mut impl BulkIn) -> usb_device::Result<()> {
        let end = self.total.min(self.cursor + self.max_packet_size);
        io.write_packet(&self.buffer[self.cursor..end])
    }
}

impl<const N: usize> Default for Transmitter<N> {
    fn default() -> Self {
        Self::new()
    }
}
