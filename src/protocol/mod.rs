//! Compact-format telegram protocol
//!
//! The picoScan streams two telegram kinds over UDP, both wrapped in the
//! same validated envelope (start marker, little-endian fields, CRC-32
//! trailer): multi-module scan data and 64-byte IMU samples. See
//! [`telegram`] for the envelope and module chain, [`imu`] for the IMU
//! payload, and [`cursor`] for the bounds-checked reader both build on.

pub mod cursor;
pub mod imu;
pub mod telegram;

pub use cursor::Cursor;
pub use imu::ImuSample;
pub use telegram::{
    CommandId, CompactDecoder, Echo, Measurement, ModuleMetadata, ScanFrame, ScanModule, Telegram,
    TelegramHeader,
};
