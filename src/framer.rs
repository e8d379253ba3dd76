//! Packet framing
//!
//! Wire layout, multi-byte fields big-endian:
//!
//! | offset      | field        |
//! |-------------|--------------|
//! | 0           | start byte   |
//! | 1..3        | id           |
//! | 3           | packet type  |
//! | 4           | command      |
//! | 5           | addr         |
//! | 6           | reserved     |
//! | 7..9        | data length  |
//! | 9..9+N      | data         |
//! | 9+N..11+N   | checksum     |
//! | 11+N        | end byte     |
//!
//! The checksum covers bytes `1..9+N`, id through the end of the payload. [`decode`] validates a frame and borrows its payload, and
//! [`encode`] writes one. A decode failure is a [`Rejection`], which knows the
//! error response to send back.

use crate::checksum::Checksum;
use crate::config::{END_BYTE, FRAMING_OVERHEAD, HEADER_LEN, START_BYTE};
use crate::packet::{Packet, PacketType, Status, UNKNOWN_ID};

/// Why a frame failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum DecodeError {
    /// Byte 0 isn't the start byte.
    MissingStart,
    /// The declared length doesn't fit the buffer, and the buffer's last byte
    /// isn't an end byte that would mark a continuation frame.
    LengthInvalid,
    /// The received checksum doesn't match the computed checksum.
    CrcMismatch,
    /// The byte after the checksum isn't the end byte.
    MissingEnd,
}

/// A rejected frame
///
/// Carries what could be recovered from the header so that the error response
/// correlates with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Rejection {
    pub error: DecodeError,
    pub id: u16,
    pub command: u8,
}

impl Rejection {
    /// A rejection for a frame whose header can't be trusted.
    pub const fn anonymous(error: DecodeError) -> Self {
        Rejection {
            error,
            id: UNKNOWN_ID,
            command: 0,
        }
    }

    /// The error response returned to the sender.
    ///
    /// A frame without a start byte isn't ours to correlate, so it's NAKed with
    /// the unknown id. Every other failure is an ERROR for the request's id,
    /// with the diagnostic in `reserved`.
    pub fn response(&self) -> Packet<'static> {
        let (packet_type, id, command, reserved) = match self.error {
            DecodeError::MissingStart => (PacketType::Nak, UNKNOWN_ID, 0, Status::IdentError as u8),
            DecodeError::LengthInvalid => (
                PacketType::Error,
                self.id,
                self.command,
                Status::DataError as u8,
            ),
            DecodeError::CrcMismatch => (
                PacketType::Error,
                self.id,
                self.command,
                u8::from(PacketType::BadCrc),
            ),
            DecodeError::MissingEnd => (
                PacketType::Error,
                self.id,
                self.command,
                Status::Error as u8,
            ),
        };
        Packet {
            reserved,
            ..Packet::empty(id, packet_type, command)
        }
    }
}

/// The destination can't hold the encoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum EncodeError {
    TooLarge { needed: usize, capacity: usize },
}

fn be16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Validate the frame at the front of `buf`
///
/// `buf.len()` is taken as the receive buffer's fixed capacity. Bytes past
/// the received frame are expected to be zero, as they are in a cleared
/// session buffer.
///
/// When the declared length runs past the capacity and the last byte is the
/// end byte, `buf` holds a continuation frame: the payload is everything up
/// to the checksum at `capacity - 3`, and `data_len` keeps the declared
/// length.
pub fn decode<'a, K>(buf: &'a [u8], checksum: &K) -> Result<Packet<'a>, Rejection>
where
    K: Checksum + ?Sized,
{
    if buf.first() != Some(&START_BYTE) {
        return Err(Rejection::anonymous(DecodeError::MissingStart));
    }
    let capacity = buf.len();
    if capacity < FRAMING_OVERHEAD {
        return Err(Rejection::anonymous(DecodeError::LengthInvalid));
    }

    let id = be16(buf, 1);
    let command = buf[4];
    let data_len = be16(buf, 7);
    let reject = |error| Rejection { error, id, command };

    let payload_end = if FRAMING_OVERHEAD + data_len as usize > capacity {
        if buf[capacity - 1] != END_BYTE {
            return Err(reject(DecodeError::LengthInvalid));
        }
        capacity - 3
    } else {
        HEADER_LEN + data_len as usize
    };

    let crc = be16(buf, payload_end);
    if checksum.checksum(&buf[1..payload_end]) != crc {
        return Err(reject(DecodeError::CrcMismatch));
    }
    if buf[payload_end + 2] != END_BYTE {
        return Err(reject(DecodeError::MissingEnd));
    }

    Ok(Packet {
        id,
        packet_type: PacketType::from(buf[3]),
        command,
        addr: buf[5],
        reserved: buf[6],
        data_len,
        data: &buf[HEADER_LEN..payload_end],
        crc,
    })
}

/// Write `packet` into `dst`, returning the frame length
///
/// The length field is written from `packet.data`, and the checksum is
/// computed here; `packet.data_len` and `packet.crc` are ignored. Nothing is
/// written if the frame doesn't fit.
pub fn encode<K>(packet: &Packet<'_>, dst: &mut [u8], checksum: &K) -> Result<usize, EncodeError>
where
    K: Checksum + ?Sized,
{
    let data = packet.data;
    let total = FRAMING_OVERHEAD + data.len();
    if total > dst.len() || data.len() > u16::MAX as usize {
        return Err(EncodeError::TooLarge {
            needed: total,
            capacity: dst.len(),
        });
    }

    let payload_end = HEADER_LEN + data.len();
    dst[0] = START_BYTE;
    dst[1..3].copy_from_slice(&packet.id.to_be_bytes());
    dst[3] = packet.packet_type.into();
    dst[4] = packet.command;
    dst[5] = packet.addr;
    dst[6] = packet.reserved;
    dst[7..9].copy_from_slice(&(data.len() as u16).to_be_bytes());
    dst[HEADER_LEN..payload_end].copy_from_slice(data);
    let crc = checksum.checksum(&dst[1..payload_end]);
    dst[payload_end..payload_end + 2].copy_from_slice(&crc.to_be_bytes());
    dst[payload_end + 2] = END_BYTE;
    Ok(total)
}

#[cfg(test)]
mod test {
    use super::{decode, encode, DecodeError, EncodeError, Rejection};
    use crate::checksum::{Checksum, Crc16};
    use crate::config::{FRAME_CAPACITY, FRAMING_OVERHEAD, MAX_PAYLOAD};
    use crate::packet::{Packet, PacketType, Status, UNKNOWN_ID};

    fn ping(id: u16) -> Packet<'static> {
        Packet::empty(id, PacketType::Command, 0x00)
    }

    #[test]
    fn ping_frame_bytes() {
        let mut frame = [0; 12];
        assert_eq!(encode(&ping(1), &mut frame, &Crc16), Ok(12));
        let crc = Crc16.checksum(&[0x00, 0x01, 0xE2, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let [hi, lo] = crc.to_be_bytes();
        assert_eq!(frame, [0xAA, 0x00, 0x01, 0xE2, 0, 0, 0, 0, 0, hi, lo, 0xDD]);
    }

    #[test]
    fn round_trip_in_capacity_buffer() {
        let payloads: [&[u8]; 4] = [&[], &[0x42], b"longer payload", &[0x5A; MAX_PAYLOAD]];
        for (idx, data) in payloads.iter().enumerate() {
            let packet = Packet {
                addr: 3,
                reserved: 0x11,
                ..Packet::empty(idx as u16 * 1000, PacketType::Command, 0x03)
            }
            .with_data(data);
            let mut buffer = [0; FRAME_CAPACITY];
            let len = encode(&packet, &mut buffer, &Crc16).unwrap();
            assert_eq!(len, 12 + data.len());

            let decoded = decode(&buffer, &Crc16).unwrap();
            assert_eq!(decoded.crc, Crc16.checksum(&buffer[1..9 + data.len()]));
            let expected = Packet {
                crc: decoded.crc,
                ..packet
            };
            assert_eq!(decoded, expected);

            let exact = decode(&buffer[..len], &Crc16).unwrap();
            assert_eq!(exact, decoded);
        }
    }

    #[test]
    fn unknown_packet_type_survives() {
        let packet = Packet::empty(9, PacketType::Other(0x10), 0x77);
        let mut buffer = [0; 32];
        encode(&packet, &mut buffer, &Crc16).unwrap();
        let decoded = decode(&buffer, &Crc16).unwrap();
        assert_eq!(decoded.packet_type, PacketType::Other(0x10));
        assert_eq!(decoded.command, 0x77);
    }

    #[test]
    fn any_bit_flip_in_an_exact_frame_is_a_crc_mismatch() {
        let packet = ping(0x1234).with_data(&[0x00, 0xFF, 0x5A, 0xA5]);
        let mut frame = [0; 16];
        let len = encode(&packet, &mut frame, &Crc16).unwrap();
        // A grown length field reads as a continuation frame, whose checksum
        // covers the corrupt length.
        for byte in 1..13 {
            for bit in 0..8 {
                let mut corrupt = frame;
                corrupt[byte] ^= 1 << bit;
                let rejection = decode(&corrupt[..len], &Crc16).unwrap_err();
                assert_eq!(
                    rejection.error,
                    DecodeError::CrcMismatch,
                    "byte {byte} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn length_past_the_buffer_is_invalid_before_the_checksum() {
        let packet = ping(0x1234).with_data(&[0x00, 0xFF, 0x5A, 0xA5]);
        let mut frame = [0; FRAME_CAPACITY];
        encode(&packet, &mut frame, &Crc16).unwrap();
        for byte in 7..9 {
            for bit in 0..8 {
                let mut corrupt = frame;
                corrupt[byte] ^= 1 << bit;
                let data_len = u16::from_be_bytes([corrupt[7], corrupt[8]]) as usize;
                let expected = if FRAMING_OVERHEAD + data_len > FRAME_CAPACITY {
                    DecodeError::LengthInvalid
                } else {
                    DecodeError::CrcMismatch
                };
                let rejection = decode(&corrupt, &Crc16).unwrap_err();
                assert_eq!(rejection.error, expected, "byte {byte} bit {bit}");
            }
        }
    }

    #[test]
    fn missing_start() {
        let mut frame = [0; 12];
        encode(&ping(1), &mut frame, &Crc16).unwrap();
        frame[0] = 0x55;
        let rejection = decode(&frame, &Crc16).unwrap_err();
        assert_eq!(rejection, Rejection::anonymous(DecodeError::MissingStart));
        assert_eq!(rejection.id, UNKNOWN_ID);
        assert!(decode(&[], &Crc16).is_err());
    }

    #[test]
    fn missing_end() {
        let mut frame = [0; 12];
        encode(&ping(0x0102), &mut frame, &Crc16).unwrap();
        frame[11] = 0x00;
        let rejection = decode(&frame, &Crc16).unwrap_err();
        assert_eq!(rejection.error, DecodeError::MissingEnd);
        assert_eq!(rejection.id, 0x0102);
    }

    #[test]
    fn truncated_buffer_is_length_invalid() {
        let rejection = decode(&[0xAA, 0x00, 0x01], &Crc16).unwrap_err();
        assert_eq!(rejection.error, DecodeError::LengthInvalid);
    }

    /// A 20 byte buffer with a frame declaring 100 bytes of payload.
    fn oversized_frame(last: u8) -> [u8; 20] {
        let mut buffer = [0; 20];
        buffer[..9].copy_from_slice(&[0xAA, 0x00, 0x07, 0xE2, 0x03, 0x00, 0x00, 0x00, 100]);
        for (idx, byte) in buffer[9..17].iter_mut().enumerate() {
            *byte = idx as u8;
        }
        let crc = Crc16.checksum(&buffer[1..17]);
        buffer[17..19].copy_from_slice(&crc.to_be_bytes());
        buffer[19] = last;
        buffer
    }

    #[test]
    fn declared_length_past_capacity_without_end_byte() {
        let buffer = oversized_frame(0x00);
        let rejection = decode(&buffer, &Crc16).unwrap_err();
        assert_eq!(rejection.error, DecodeError::LengthInvalid);
        assert_eq!(rejection.id, 7);
        assert_eq!(rejection.command, 0x03);
    }

    #[test]
    fn continuation_frame() {
        let buffer = oversized_frame(0xDD);
        let packet = decode(&buffer, &Crc16).unwrap();
        assert_eq!(packet.data_len, 100);
        assert_eq!(packet.data, &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn encode_too_large() {
        let data = [0; 8];
        let mut frame = [0xEE; 19];
        assert_eq!(
            encode(&ping(1).with_data(&data), &mut frame, &Crc16),
            Err(EncodeError::TooLarge {
                needed: 20,
                capacity: 19
            })
        );
        assert_eq!(frame, [0xEE; 19]);
    }

    #[test]
    fn error_responses() {
        let start = Rejection::anonymous(DecodeError::MissingStart).response();
        assert_eq!(start.packet_type, PacketType::Nak);
        assert_eq!(start.id, UNKNOWN_ID);
        assert_eq!(start.reserved, Status::IdentError as u8);

        let rejection = |error| Rejection {
            error,
            id: 42,
            command: 0x05,
        };
        let length = rejection(DecodeError::LengthInvalid).response();
        assert_eq!(length.packet_type, PacketType::Error);
        assert_eq!((length.id, length.command), (42, 0x05));
        assert_eq!(length.reserved, Status::DataError as u8);

        let crc = rejection(DecodeError::CrcMismatch).response();
        assert_eq!(crc.packet_type, PacketType::Error);
        assert_eq!(crc.reserved, 0xED);

        let end = rejection(DecodeError::MissingEnd).response();
        assert_eq!(end.packet_type, PacketType::Error);
        assert_eq!(end.reserved, Status::Error as u8);
        assert!(end.data.is_empty());
    }
}
