//! Frame checksums
//!
//! Frames carry a 16-bit checksum over everything between the start byte and
//! the checksum field. The framer doesn't care how that value is computed; it
//! asks a [`Checksum`] implementation. Use [`Crc16`] unless your MCU has a CRC
//! unit you'd rather drive. Any `Fn(&[u8]) -> u16` also works:
//!
//! ```
//! use usb_bridge::checksum::{Checksum, Crc16};
//!
//! let software = Crc16;
//! let hardware = |bytes: &[u8]| Crc16.checksum(bytes);
//! assert_eq!(software.checksum(b"123456789"), 0x29B1);
//! assert_eq!(hardware.checksum(b"123456789"), 0x29B1);
//! ```

/// Computes the frame checksum over a byte range
pub trait Checksum {
    fn checksum(&self, bytes: &[u8]) -> u16;
}

impl<F> Checksum for F
where
    F: Fn(&[u8]) -> u16,
{
    fn checksum(&self, bytes: &[u8]) -> u16 {
        self(bytes)
    }
}

const CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

/// CRC-16/CCITT-FALSE
///
/// Polynomial 0x1021, initial value 0xFFFF, no reflection, no final XOR.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Crc16;

impl Checksum for Crc16 {
    fn checksum(&self, bytes: &[u8]) -> u16 {
        CRC16.checksum(bytes)
    }
}

#[cfg(test)]
mod test {
    use super::{Checksum, Crc16};

    #[test]
    fn check_value() {
        assert_eq!(Crc16.checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn empty_input_is_init() {
        assert_eq!(Crc16.checksum(&[]), 0xFFFF);
    }

    #[test]
    fn closures_are_checksums() {
        fn sum(bytes: &[u8]) -> u16 {
            bytes.iter().map(|&b| b as u16).sum()
        }
        assert_eq!(sum.checksum(&[1, 2, 3]), 6);
        let constant = |_: &[u8]| -> u16 { 0xBEEF };
        assert_eq!(constant.checksum(b"anything"), 0xBEEF);
    }
}
