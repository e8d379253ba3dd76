//! Protocol data model
//!
//! A [`Packet`] is the unit of exchange on the command channel. It never owns
//! its payload; `data` borrows from a session frame buffer, so a decoded
//! packet can't outlive the buffer it was sliced from.

/// Packet type byte
///
/// Total over `u8`. Values outside the protocol's set decode as
/// [`PacketType::Other`] so the dispatcher can answer them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum PacketType {
    Ack,
    Nak,
    Command,
    Response,
    BadParse,
    BadCrc,
    Unknown,
    Error,
    Other(u8),
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        match value {
            0xE0 => PacketType::Ack,
            0xE1 => PacketType::Nak,
            0xE2 => PacketType::Command,
            0xE3 => PacketType::Response,
            0xEC => PacketType::BadParse,
            0xED => PacketType::BadCrc,
            0xEE => PacketType::Unknown,
            0xEF => PacketType::Error,
            other => PacketType::Other(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        match packet_type {
            PacketType::Ack => 0xE0,
            PacketType::Nak => 0xE1,
            PacketType::Command => 0xE2,
            PacketType::Response => 0xE3,
            PacketType::BadParse => 0xEC,
            PacketType::BadCrc => 0xED,
            PacketType::Unknown => 0xEE,
            PacketType::Error => 0xEF,
            PacketType::Other(other) => other,
        }
    }
}

/// Built-in command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Ping = 0x00,
    Version = 0x02,
    Echo = 0x03,
    ToggleLed = 0x04,
    Hwid = 0x05,
    Nop = 0x0E,
    Reset = 0x0F,
}

impl TryFrom<u8> for Command {
    /// The unrecognized opcode.
    type Error = u8;
    fn try_from(opcode: u8) -> Result<Self, u8> {
        Ok(match opcode {
            0x00 => Command::Ping,
            0x02 => Command::Version,
            0x03 => Command::Echo,
            0x04 => Command::ToggleLed,
            0x05 => Command::Hwid,
            0x0E => Command::Nop,
            0x0F => Command::Reset,
            other => return Err(other),
        })
    }
}

/// Status codes carried in the `reserved` byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    IdentError = 0xFD,
    DataError = 0xFE,
    Error = 0xFF,
}

/// `id` used when the request's own id couldn't be recovered.
pub const UNKNOWN_ID: u16 = 0xFFFF;

/// A command channel packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Packet<'a> {
    /// Correlation tag chosen by the sender, copied into the response.
    pub id: u16,
    pub packet_type: PacketType,
    /// Opcode. Kept raw so that unknown opcodes survive decoding.
    pub command: u8,
    pub addr: u8,
    pub reserved: u8,
    /// Payload length declared on the wire.
    ///
    /// Equal to `data.len()` except for a continuation frame, where the
    /// declared length exceeds what one frame buffer holds.
    pub data_len: u16,
    pub data: &'a [u8],
    pub crc: u16,
}

impl<'a> Packet<'a> {
    /// A packet without payload. The checksum is filled in by the encoder.
    pub const fn empty(id: u16, packet_type: PacketType, command: u8) -> Self {
        Packet {
            id,
            packet_type,
            command,
            addr: 0,
            reserved: Status::Success as u8,
            data_len: 0,
            data: &[],
            crc: 0,
        }
    }

    /// Attach `data` as the payload, updating the declared length.
    ///
    /// Payloads are bounded by the frame capacity, far below `u16::MAX`.
    pub fn with_data(self, data: &'a [u8]) -> Self {
        Packet {
            data_len: data.len() as u16,
            data,
            ..self
        }
    }

    /// The built-in command, if `command` names one.
    pub fn builtin(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }
}
