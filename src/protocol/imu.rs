//! IMU telegram parsing
//!
//! IMU telegram layout (64 bytes):
//! - Start of frame (4 bytes): `02 02 02 02`
//! - Command ID (4 bytes LE): 2
//! - Telegram version (4 bytes LE)
//! - Acceleration x/y/z (3 × f32 LE, m/s²)
//! - Angular velocity x/y/z (3 × f32 LE, rad/s)
//! - Orientation quaternion w/x/y/z (4 × f32 LE)
//! - Timestamp (8 bytes LE, microseconds)
//! - CRC-32 (4 bytes LE) over the first 60 bytes
//!
//! The IMU payload is validated on its own: even when the enclosing
//! datagram already passed whole-frame validation, the 60-byte window here
//! is re-checked because the two CRCs cover different ranges on anything
//! longer than the minimum telegram.

use crate::error::{Error, Result};
use crate::protocol::cursor::Cursor;

/// Minimum byte length of an IMU telegram
pub const IMU_TELEGRAM_SIZE: usize = 64;
/// Byte range covered by the IMU CRC
const IMU_CRC_OFFSET: usize = 60;

/// One decoded IMU sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Telegram format version
    pub version: u32,
    /// Accelerometer reading, m/s² (x, y, z)
    pub acceleration: [f32; 3],
    /// Gyroscope reading, rad/s (x, y, z)
    pub angular_velocity: [f32; 3],
    /// Orientation quaternion (w, x, y, z)
    pub orientation: [f32; 4],
    /// Sample timestamp in microseconds
    pub timestamp_us: u64,
}

impl ImuSample {
    /// Parse an IMU telegram
    ///
    /// Requires at least 64 bytes and a valid CRC-32 over the first 60,
    /// independent of any validation the caller already did.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < IMU_TELEGRAM_SIZE {
            return Err(Error::InvalidImuFrame(format!(
                "IMU telegram too small: {} bytes",
                data.len()
            )));
        }

        let received = u32::from_le_bytes([
            data[IMU_CRC_OFFSET],
            data[IMU_CRC_OFFSET + 1],
            data[IMU_CRC_OFFSET + 2],
            data[IMU_CRC_OFFSET + 3],
        ]);
        let calculated = crc32fast::hash(&data[..IMU_CRC_OFFSET]);
        if received != calculated {
            return Err(Error::InvalidImuFrame(format!(
                "IMU CRC mismatch: expected {:#010x}, got {:#010x}",
                received, calculated
            )));
        }

        let mut cursor = Cursor::new(data);
        cursor.skip(8)?; // start-of-frame + command ID
        let version = cursor.read_u32_le()?;
        let acceleration = [
            cursor.read_f32_le()?,
            cursor.read_f32_le()?,
            cursor.read_f32_le()?,
        ];
        let angular_velocity = [
            cursor.read_f32_le()?,
            cursor.read_f32_le()?,
            cursor.read_f32_le()?,
        ];
        let orientation = [
            cursor.read_f32_le()?,
            cursor.read_f32_le()?,
            cursor.read_f32_le()?,
            cursor.read_f32_le()?,
        ];
        let timestamp_us = cursor.read_u64_le()?;

        Ok(Self {
            version,
            acceleration,
            angular_velocity,
            orientation,
            timestamp_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::telegram::{CompactDecoder, Telegram, START_OF_FRAME};
    use approx::assert_relative_eq;

    pub(crate) fn encode_imu_telegram(
        acceleration: [f32; 3],
        angular_velocity: [f32; 3],
        orientation: [f32; 4],
        timestamp_us: u64,
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(IMU_TELEGRAM_SIZE);
        buf.extend_from_slice(&START_OF_FRAME);
        buf.extend_from_slice(&2u32.to_le_bytes()); // command ID
        buf.extend_from_slice(&1u32.to_le_bytes()); // version
        for v in acceleration {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for v in angular_velocity {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for v in orientation {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&timestamp_us.to_le_bytes());
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    #[test]
    fn test_imu_round_trip() {
        let telegram = encode_imu_telegram(
            [0.1, -0.2, 9.81],
            [0.01, 0.02, -0.03],
            [1.0, 0.0, 0.0, 0.0],
            5_000_000,
        );
        assert_eq!(telegram.len(), IMU_TELEGRAM_SIZE);

        let sample = ImuSample::parse(&telegram).unwrap();
        assert_eq!(sample.version, 1);
        assert_relative_eq!(sample.acceleration[2], 9.81);
        assert_relative_eq!(sample.angular_velocity[0], 0.01);
        assert_relative_eq!(sample.orientation[0], 1.0);
        assert_eq!(sample.timestamp_us, 5_000_000);
    }

    #[test]
    fn test_imu_too_short() {
        let telegram = encode_imu_telegram([0.0; 3], [0.0; 3], [1.0, 0.0, 0.0, 0.0], 0);
        assert!(matches!(
            ImuSample::parse(&telegram[..40]),
            Err(Error::InvalidImuFrame(_))
        ));
    }

    #[test]
    fn test_imu_crc_mismatch() {
        let mut telegram = encode_imu_telegram([0.0; 3], [0.0; 3], [1.0, 0.0, 0.0, 0.0], 0);
        telegram[12] ^= 0xFF;
        assert!(matches!(
            ImuSample::parse(&telegram),
            Err(Error::InvalidImuFrame(_))
        ));
    }

    #[test]
    fn test_decoder_dispatches_imu_command() {
        let telegram = encode_imu_telegram(
            [1.0, 2.0, 3.0],
            [0.0; 3],
            [1.0, 0.0, 0.0, 0.0],
            42_000_000,
        );
        let mut decoder = CompactDecoder::new();
        match decoder.decode(&telegram).unwrap() {
            Telegram::Imu(sample) => {
                assert_relative_eq!(sample.acceleration[0], 1.0);
                assert_eq!(sample.timestamp_us, 42_000_000);
            }
            other => panic!("expected Imu, got {:?}", other),
        }
    }
}
