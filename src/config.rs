//! Protocol and transport configuration
//!
//! The constants describe the wire format and fixed resource sizes. They're
//! shared by every component, so change them here and nowhere else. Runtime
//! knobs that a board may want to tune live in [`Config`].

/// First byte of every frame.
pub const START_BYTE: u8 = 0xAA;
/// Last byte of every frame.
pub const END_BYTE: u8 = 0xDD;

/// Capacity of the session's receive and transmit frame buffers.
pub const FRAME_CAPACITY: usize = 1024;
/// Start byte, id, type, command, addr, reserved and length.
pub const HEADER_LEN: usize = 9;
/// Header plus checksum plus end byte.
pub const FRAMING_OVERHEAD: usize = HEADER_LEN + 2 + 1;
/// Largest payload that fits a [`FRAME_CAPACITY`] frame.
pub const MAX_PAYLOAD: usize = FRAME_CAPACITY - FRAMING_OVERHEAD;

/// How long the session waits for a response to drain, in milliseconds.
pub const TX_TIMEOUT_MS: u32 = 150;
/// Receive silence that ends a frame, in microseconds.
pub const IDLE_TIMEOUT_US: u32 = 2_000;

/// Major, minor, patch.
pub const FIRMWARE_VERSION: [u8; 3] = [2, 0, 0];
/// Width of the hardware identifier payload. Three words plus padding.
pub const HWID_LEN: usize = 16;

/// USB low / full / high speed setting.
///
/// The speed decides the bulk endpoint max packet size, which in turn decides
/// how the transmitters chunk their buffers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Speed {
    /// Low / full speed. 64 byte bulk packets.
    LowFull,
    /// High speed. 512 byte bulk packets.
    #[default]
    High,
}

impl Speed {
    /// Bulk endpoint max packet size for this speed.
    pub const fn max_packet_size(self) -> usize {
        match self {
            Speed::LowFull => 64,
            Speed::High => 512,
        }
    }
}

/// Runtime configuration
///
/// Use [`Config::new()`] (or `Default`) for the stock settings, then adjust
/// fields as needed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// Bus speed the endpoints are sized for.
    pub speed: Speed,
    /// Bound on the session's wait for a response to drain.
    pub tx_timeout_ms: u32,
    /// Receive silence that ends a frame.
    pub idle_timeout_us: u32,
    /// Reported by the VERSION command.
    pub firmware_version: [u8; 3],
    /// Terminate transfers that end on a packet boundary with a zero-length
    /// packet.
    pub zero_length_termination: bool,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            speed: Speed::High,
            tx_timeout_ms: TX_TIMEOUT_MS,
            idle_timeout_us: IDLE_TIMEOUT_US,
            firmware_version: FIRMWARE_VERSION,
            zero_length_termination: true,
        }
    }

    /// Bulk endpoint max packet size for the configured speed.
    pub const fn max_packet_size(&self) -> usize {
        self.speed.max_packet_size()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
