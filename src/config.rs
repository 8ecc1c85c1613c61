//! Configuration for the DrishtiIO daemon
//!
//! Loads configuration from a TOML file. Every value has a default matching
//! the reference deployment, so a missing file is not fatal; the core
//! components themselves take plain constructor parameters and never touch
//! the filesystem.

use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub parser: ParserConfig,
    pub tracker: TrackerConfig,
    pub forwarder: ForwarderConfig,
}

/// UDP receive socket configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address for the scanner data socket
    ///
    /// The picoScan ships compact-format telegrams to port 2115 by default.
    pub listen_address: String,
    /// Receive buffer size in bytes
    ///
    /// Must hold the largest telegram the scanner emits; 64KB covers a
    /// full multi-module segment.
    pub recv_buffer_size: usize,
}

/// Point cloud processing configuration
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Voxel edge length for spatial dedup, in device distance units
    pub voxel_size: f64,
}

/// Position tracker configuration
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Stationary IMU samples collected before bias calibration completes
    pub calibration_samples: usize,
    /// Sliding-window depth for position smoothing
    pub position_smoothing: usize,
    /// Sliding-window depth for orientation smoothing
    pub orientation_smoothing: usize,
}

/// Visualization forward stream configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Destination address of the visualization engine
    pub target_address: String,
    /// Points per outgoing datagram
    pub chunk_size: usize,
    /// Minimum milliseconds between full-set sends
    pub send_interval_ms: u64,
    /// Scale applied to coordinates on the wire (device units → engine units)
    pub unit_scale: f32,
    /// Cap on the accumulated world point set
    pub max_points: usize,
    /// Decimal places kept when deduplicating accumulated points
    ///
    /// 0 rounds to whole device units (millimeters on the picoScan).
    pub dedup_decimals: i32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:2115".to_string(),
            recv_buffer_size: 65536,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { voxel_size: 10.0 }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 100,
            position_smoothing: 5,
            orientation_smoothing: 5,
        }
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            target_address: "127.0.0.1:5005".to_string(),
            chunk_size: 250,
            send_interval_ms: 200,
            unit_scale: 0.005,
            max_points: 1_000_000,
            dedup_decimals: 0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            parser: ParserConfig::default(),
            tracker: TrackerConfig::default(),
            forwarder: ForwarderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
