//! Command session
//!
//! The [`Session`] owns the receive and transmit frame buffers and drives one
//! request at a time through
//!
//! ```text
//! Idle -> Parsing -> Dispatching -> Sending -> Idle
//!            |                        ^
//!            +------ rejected --------+
//! ```
//!
//! Call [`check_received()`](Session::check_received) from a single task.
//! When the command endpoint has a frame ready, the session decodes it,
//! dispatches it (or builds the error response), sends the response, and
//! re-arms reception before returning. The only blocking wait is for the
//! response to drain, bounded by the configured transmit timeout.

use crate::checksum::{Checksum, Crc16};
use crate::config::{Config, FRAME_CAPACITY};
use crate::dispatch::{Board, Dispatcher};
use crate::framer::{self, DecodeError, EncodeError, Rejection};
use crate::timer::Clock;
use crate::transport::{Channel, TransmitError};

/// Where the session is in handling a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum State {
    /// Waiting for the command endpoint to declare a frame ready.
    Idle,
    Parsing,
    Dispatching,
    Sending,
}

/// How a frame was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Outcome {
    /// The frame was valid, and `command` was dispatched.
    Dispatched { command: u8 },
    /// The frame failed validation. Nothing was dispatched.
    Rejected(DecodeError),
}

/// Why a response wasn't delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SendError {
    /// The response didn't fit the transmit buffer. Nothing was sent.
    Encode(EncodeError),
    /// The endpoint refused the transfer.
    Transmit(TransmitError),
    /// The host didn't drain the response in time. The transfer was
    /// abandoned.
    Timeout,
}

/// One request and its response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Exchange {
    /// Id carried by the response.
    pub id: u16,
    pub outcome: Outcome,
    /// Length of the response frame on success.
    pub sent: Result<usize, SendError>,
}

/// Command channel session
///
/// `K` computes frame checksums, and `N` is the capacity of each frame
/// buffer.
pub struct Session<B, K = Crc16, const N: usize = FRAME_CAPACITY> {
    rx: [u8; N],
    tx: [u8; N],
    dispatcher: Dispatcher<B>,
    checksum: K,
    tx_timeout_ms: u32,
    state: State,
}

impl<B: Board> Session<B> {
    /// A session using the default checksum and frame capacity.
    pub fn new(board: B, config: &Config) -> Self {
        Session::with_checksum(board, config, Crc16)
    }
}

impl<B: Board, K: Checksum, const N: usize> Session<B, K, N> {
    pub fn with_checksum(board: B, config: &Config, checksum: K) -> Self {
        Session {
            rx: [0; N],
            tx: [0; N],
            dispatcher: Dispatcher::with_version(board, config.firmware_version),
            checksum,
            tx_timeout_ms: config.tx_timeout_ms,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher<B> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<B> {
        &mut self.dispatcher
    }

    /// Clear the buffers, and arm the first receive.
    pub fn start(&mut self, link: &mut impl Channel) {
        self.clear();
        link.receive_to_idle();
        self.state = State::Idle;
        debug!("SESSION STARTED");
    }

    /// Handle the next frame, if one is ready
    ///
    /// Returns `None` without blocking if there's no frame. Otherwise the
    /// frame is handled end to end, and the receive is re-armed, whether or
    /// not the response was delivered.
    pub fn check_received(
        &mut self,
        link: &mut impl Channel,
        clock: &impl Clock,
    ) -> Option<Exchange> {
        let received = link.take_frame(&mut self.rx)?;
        self.state = State::Parsing;

        let exchange = self.process(received.is_ok(), link, clock);

        if self.dispatcher.take_reset() {
            debug!("RESET");
            self.dispatcher.board_mut().reset();
        }
        self.clear();
        link.receive_to_idle();
        self.state = State::Idle;
        Some(exchange)
    }

    fn process(&mut self, received: bool, link: &mut impl Channel, clock: &impl Clock) -> Exchange {
        let decoded = if received {
            framer::decode(&self.rx, &self.checksum)
        } else {
            warn!("RX FRAME OVERFLOWED");
            Err(Rejection::anonymous(DecodeError::LengthInvalid))
        };

        let (outcome, response) = match decoded {
            Ok(request) => {
                self.state = State::Dispatching;
                let command = request.command;
                let response = self.dispatcher.dispatch(&request);
                (Outcome::Dispatched { command }, response)
            }
            Err(rejection) => {
                warn!(
                    "REJECTED {:?} ID={} CMD={:#04X}",
                    rejection.error, rejection.id, rejection.command
                );
                (Outcome::Rejected(rejection.error), rejection.response())
            }
        };

        self.state = State::Sending;
        let id = response.id;
        let sent = match framer::encode(&response, &mut self.tx, &self.checksum) {
            Ok(len) => self.send(len, link, clock),
            Err(err) => {
                warn!("RESPONSE ID={} NOT SENT: {:?}", id, err);
                Err(SendError::Encode(err))
            }
        };
        Exchange { id, outcome, sent }
    }

    /// Transmit the encoded response, and wait for it to drain
    fn send(
        &self,
        len: usize,
        link: &mut impl Channel,
        clock: &impl Clock,
    ) -> Result<usize, SendError> {
        if let Err(err) = link.transmit(&self.tx[..len]) {
            warn!("TX REFUSED: {:?}", err);
            return Err(SendError::Transmit(err));
        }
        let start = clock.now_ms();
        while !link.is_transmit_complete() {
            if clock.now_ms().wrapping_sub(start) >= self.tx_timeout_ms {
                warn!("TX TIMEOUT AFTER {}ms", self.tx_timeout_ms);
                return Err(SendError::Timeout);
            }
            core::hint::spin_loop();
        }
        Ok(len)
    }

    fn clear(&mut self) {
        self.rx.fill(0);
        self.tx.fill(0);
    }
}
