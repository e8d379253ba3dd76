//! IMU telemetry
//!
//! An [`ImuStreamer`] samples the inertial sensor, runs the orientation
//! filter, and hands one fixed size record per cycle to the IMU stream
//! endpoint. Records are big-endian:
//!
//! | offset  | field                               |
//! |---------|-------------------------------------|
//! | 0       | [`Readings`] validity flags         |
//! | 1..5    | sequence number, `u32`              |
//! | 5..11   | accelerometer x, y, z, `i16`        |
//! | 11..17  | gyroscope x, y, z, `i16`            |
//! | 17..23  | magnetometer x, y, z, `i16`         |
//! | 23..27  | temperature, `f32`                  |
//! | 27..43  | orientation w, x, y, z, `f32`       |
//!
//! Fields without their validity flag are zero.

use crate::peripheral::{Axis3, OrientationFilter, Quaternion, Sensor};
use crate::transport::{Stream, TransmitError};

/// Length of one telemetry record.
pub const RECORD_LEN: usize = 43;

bitflags::bitflags! {
    /// Readings present in a record
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Readings: u8 {
        const ACCEL = 1 << 0;
        const GYRO = 1 << 1;
        const MAG = 1 << 2;
        const TEMP = 1 << 3;
        /// The filter was updated with this cycle's accelerometer and
        /// gyroscope readings.
        const ORIENTATION = 1 << 4;
    }
}

/// One sampling cycle
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Sample {
    pub readings: Readings,
    pub accel: Axis3,
    pub gyro: Axis3,
    pub mag: Axis3,
    pub temperature: f32,
    pub orientation: Quaternion,
}

impl Sample {
    /// Serialize as record number `sequence`.
    pub fn to_record(&self, sequence: u32) -> [u8; RECORD_LEN] {
        let mut record = [0; RECORD_LEN];
        record[0] = self.readings.bits();
        record[1..5].copy_from_slice(&sequence.to_be_bytes());
        record[5..11].copy_from_slice(&self.accel.to_be_bytes());
        record[11..17].copy_from_slice(&self.gyro.to_be_bytes());
        record[17..23].copy_from_slice(&self.mag.to_be_bytes());
        record[23..27].copy_from_slice(&self.temperature.to_be_bytes());
        let q = self.orientation;
        for (dst, value) in record[27..].chunks_exact_mut(4).zip([q.w, q.x, q.y, q.z]) {
            dst.copy_from_slice(&value.to_be_bytes());
        }
        record
    }
}

/// Why a cycle didn't produce a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TelemetryError {
    /// Every sensor read failed.
    NoData,
    /// The endpoint refused the record. A busy endpoint drops it.
    Stream(TransmitError),
}

/// Samples an IMU, and streams the readings
pub struct ImuStreamer<S, F> {
    sensor: S,
    filter: F,
    orientation: Quaternion,
    sequence: u32,
}

impl<S: Sensor, F: OrientationFilter> ImuStreamer<S, F> {
    pub fn new(sensor: S, filter: F) -> Self {
        ImuStreamer {
            sensor,
            filter,
            orientation: Quaternion::IDENTITY,
            sequence: 0,
        }
    }

    /// Initialize the sensor.
    pub fn init(&mut self) -> Result<(), S::Error> {
        self.sensor.init()
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Sequence number of the next record.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Read every channel, and update the orientation
    ///
    /// `dt` is the time since the last cycle, in seconds. The orientation is
    /// only updated when both the accelerometer and gyroscope produced data.
    pub fn sample(&mut self, dt: f32) -> Sample {
        let mut sample = Sample {
            orientation: self.orientation,
            ..Sample::default()
        };
        match self.sensor.read_accel() {
            Ok(accel) => {
                sample.accel = accel;
                sample.readings.insert(Readings::ACCEL);
            }
            Err(_) => {
                warn!("IMU ACCEL READ FAILED");
            }
        }
        match self.sensor.read_gyro() {
            Ok(gyro) => {
                sample.gyro = gyro;
                sample.readings.insert(Readings::GYRO);
            }
            Err(_) => {
                warn!("IMU GYRO READ FAILED");
            }
        }
        match self.sensor.read_mag() {
            Ok(mag) => {
                sample.mag = mag;
                sample.readings.insert(Readings::MAG);
            }
            Err(_) => {
                warn!("IMU MAG READ FAILED");
            }
        }
        match self.sensor.read_temperature() {
            Ok(temperature) => {
                sample.temperature = temperature;
                sample.readings.insert(Readings::TEMP);
            }
            Err(_) => {
                warn!("IMU TEMPERATURE READ FAILED");
            }
        }

        if sample.readings.contains(Readings::ACCEL | Readings::GYRO) {
            self.orientation = self.filter.update(
                sample.accel.to_f32(),
                sample.gyro.to_f32(),
                sample.mag.to_f32(),
                dt,
            );
            sample.orientation = self.orientation;
            sample.readings.insert(Readings::ORIENTATION);
        }
        sample
    }

    /// Run one cycle, and send its record on `stream`
    ///
    /// Returns the record's sequence number. The sequence only advances for
    /// records the endpoint accepted.
    pub fn poll(&mut self, stream: &mut impl Stream, dt: f32) -> Result<u32, TelemetryError> {
        let sample = self.sample(dt);
        if sample.readings.is_empty() {
            return Err(TelemetryError::NoData);
        }
        let sequence = self.sequence;
        stream.send(&sample.to_record(sequence)).map_err(|err| {
            trace!("IMU RECORD {} DROPPED: {:?}", sequence, err);
            TelemetryError::Stream(err)
        })?;
        self.sequence = sequence.wrapping_add(1);
        Ok(sequence)
    }
}
