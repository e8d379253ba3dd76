//! Command dispatch
//!
//! The [`Dispatcher`] maps a decoded request to its response. Every request
//! has an answer: unknown opcodes and packet types get an UNKNOWN response,
//! never an error. Board side effects go through the [`Board`] trait.

use crate::config::{FIRMWARE_VERSION, HWID_LEN};
use crate::packet::{Command, Packet, PacketType};

/// Board services used by built-in commands
pub trait Board {
    /// Toggle the indicator LED.
    fn toggle_led(&mut self);
    /// The three words of the MCU's unique device id.
    fn unique_id(&self) -> [u32; 3];
    /// Reset the MCU.
    ///
    /// Called by the session after the RESET response has been handed to the
    /// transport. The default does nothing.
    fn reset(&mut self) {}
}

/// Produces responses for built-in commands
pub struct Dispatcher<B> {
    board: B,
    version: [u8; 3],
    hwid: [u8; HWID_LEN],
    reset_pending: bool,
}

impl<B: Board> Dispatcher<B> {
    /// Dispatch for `board`, reporting [`FIRMWARE_VERSION`].
    pub fn new(board: B) -> Self {
        Self::with_version(board, FIRMWARE_VERSION)
    }

    pub fn with_version(board: B, version: [u8; 3]) -> Self {
        Dispatcher {
            board,
            version,
            hwid: [0; HWID_LEN],
            reset_pending: false,
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Produce the response for `request`
    ///
    /// The response copies the request's `id`. Its payload borrows either the
    /// request (ECHO) or the dispatcher's own storage (VERSION, HWID), so it
    /// lives no longer than both.
    pub fn dispatch<'a>(&'a mut self, request: &Packet<'a>) -> Packet<'a> {
        let unknown = Packet {
            addr: request.addr,
            ..Packet::empty(request.id, PacketType::Unknown, request.command)
        };
        if request.packet_type != PacketType::Command {
            debug!("UNKNOWN PACKET TYPE {:?}", request.packet_type);
            return unknown;
        }
        let Some(command) = request.builtin() else {
            debug!("UNKNOWN COMMAND {:#04X}", request.command);
            return unknown;
        };

        let response = Packet {
            addr: request.addr,
            ..Packet::empty(request.id, PacketType::Response, request.command)
        };
        trace!("DISPATCH {:?} ID={}", command, request.id);
        match command {
            Command::Ping | Command::Nop => response,
            Command::Version => response.with_data(&self.version),
            Command::Echo => response.with_data(request.data),
            Command::ToggleLed => {
                self.board.toggle_led();
                response
            }
            Command::Hwid => {
                let words = self.board.unique_id();
                for (dst, word) in self.hwid.chunks_exact_mut(4).zip(words) {
                    dst.copy_from_slice(&word.to_le_bytes());
                }
                response.with_data(&self.hwid)
            }
            Command::Reset => {
                self.reset_pending = true;
                response
            }
        }
    }

    /// Returns `true` once after a RESET request was dispatched.
    pub fn take_reset(&mut self) -> bool {
        core::mem::take(&mut self.reset_pending)
    }
}
