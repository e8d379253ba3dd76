//! External collaborators
//!
//! The bridge talks to an inertial sensor, an orientation filter, and an FPGA
//! configuration loader. None of them are implemented here. Board support
//! crates implement these traits over their drivers.

use crate::packet::{Packet, PacketType, Status};

/// One raw sample from a three axis sensor
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Axis3 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Axis3 {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Axis3 { x, y, z }
    }

    /// x, y, z, each big-endian.
    pub fn to_be_bytes(&self) -> [u8; 6] {
        let [x0, x1] = self.x.to_be_bytes();
        let [y0, y1] = self.y.to_be_bytes();
        let [z0, z1] = self.z.to_be_bytes();
        [x0, x1, y0, y1, z0, z1]
    }

    pub fn to_f32(&self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }
}

/// Accelerometer, gyroscope, magnetometer, and temperature readings
///
/// A failed read is "no data this cycle". Callers skip the reading; they
/// never treat it as fatal.
pub trait Sensor {
    type Error;

    fn init(&mut self) -> Result<(), Self::Error>;
    fn read_accel(&mut self) -> Result<Axis3, Self::Error>;
    fn read_gyro(&mut self) -> Result<Axis3, Self::Error>;
    fn read_mag(&mut self) -> Result<Axis3, Self::Error>;
    /// Die temperature, degrees Celsius.
    fn read_temperature(&mut self) -> Result<f32, Self::Error>;
}

/// Orientation, as a unit quaternion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Sensor fusion
pub trait OrientationFilter {
    /// Fold one sample into the estimate, `dt` seconds after the last.
    ///
    /// `mag` is all zeros when the magnetometer had no data this cycle.
    fn update(&mut self, accel: [f32; 3], gyro: [f32; 3], mag: [f32; 3], dt: f32) -> Quaternion;
}

/// A filter that always reports the identity orientation
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl OrientationFilter for Identity {
    fn update(&mut self, _: [f32; 3], _: [f32; 3], _: [f32; 3], _: f32) -> Quaternion {
        Quaternion::IDENTITY
    }
}

/// FPGA configuration loader
pub trait Loader {
    type Error;

    /// Write a configuration image to the device.
    fn program(&mut self, bitstream: &[u8]) -> Result<(), Self::Error>;
}

/// Program the FPGA, and answer `request` with the result
///
/// A loader failure becomes an ERROR response with the [`Status::Error`]
/// code.
pub fn program_response<'a, L: Loader>(
    loader: &mut L,
    bitstream: &[u8],
    request: &Packet<'a>,
) -> Packet<'a> {
    let response = Packet {
        addr: request.addr,
        ..Packet::empty(request.id, PacketType::Response, request.command)
    };
    match loader.program(bitstream) {
        Ok(()) => response,
        Err(_) => {
            warn!("FPGA PROGRAMMING FAILED, {} BYTES", bitstream.len());
            Packet {
                packet_type: PacketType::Error,
                reserved: Status::Error as u8,
                ..response
            }
        }
    }
}
