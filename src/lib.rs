//! Framed command protocol and bulk endpoint transport for a USB bridge
//!
//! `usb-bridge` is the protocol core of a microcontroller that bridges a host
//! computer to an FPGA and an inertial sensor over one composite USB device.
//! The device exposes three vendor specific bulk interfaces:
//!
//! - a command channel, carrying framed request / response packets,
//! - a histogram stream, and
//! - an IMU telemetry stream.
//!
//! Each interface is a [`usb-device`] class from the [`transport`] module.
//! The command channel is served by a [`Session`](session::Session), which
//! decodes each request with the [`framer`], answers it with the
//! [`Dispatcher`](dispatch::Dispatcher), and sends the response back. An
//! [`ImuStreamer`](telemetry::ImuStreamer) feeds the IMU stream.
//!
//! The wire format is described in the [`framer`] module:
//!
//! ```
//! use usb_bridge::{checksum::Crc16, framer, packet::{Packet, PacketType}};
//!
//! let ping = Packet::empty(1, PacketType::Command, 0x00);
//! let mut frame = [0; 12];
//! let len = framer::encode(&ping, &mut frame, &Crc16).unwrap();
//! assert_eq!(&frame[..9], &[0xAA, 0x00, 0x01, 0xE2, 0x00, 0x00, 0x00, 0x00, 0x00]);
//! assert_eq!(frame[11], 0xDD);
//!
//! let decoded = framer::decode(&frame[..len], &Crc16).unwrap();
//! assert_eq!(decoded.id, 1);
//! ```
//!
//! [`usb-device`]: https://crates.io/crates/usb-device

#![no_std]

#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

mod buffer;
mod signal;

pub mod checksum;
pub mod config;
pub mod dispatch;
pub mod framer;
pub mod packet;
pub mod peripheral;
pub mod session;
pub mod shared;
pub mod telemetry;
pub mod timer;
pub mod transport;

pub use buffer::{FrameBuffer, Overflow};
pub use config::{Config, Speed};
