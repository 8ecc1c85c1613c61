//! Compact-format telegram decoder
//!
//! Telegram layout:
//! - Start of frame (4 bytes): `02 02 02 02`
//! - Command ID (4 bytes LE): 1 = scan data, 2 = IMU data
//! - Telegram counter (8 bytes LE)
//! - Transmit timestamp (8 bytes LE, microseconds)
//! - Telegram version (4 bytes LE)
//! - Size of module 0 (4 bytes LE)
//! - Module chain (variable): metadata + measurement data per module,
//!   each module naming the byte size of the next (0 terminates)
//! - CRC-32 (4 bytes LE) over everything above
//!
//! Module metadata carries per-line geometry (`phi`, `thetaStart`,
//! `thetaStop`, line timestamps) followed by two content-flag bytes that
//! say which fields each echo and beam record carries. Measurement data is
//! beam-major, line-minor.
//!
//! Malformed datagrams are an expected operating condition: validation
//! failures reject the whole telegram, while a module chain that overruns
//! the buffer is cut short and yields the modules parsed so far.

use crate::error::{Error, Result};
use crate::protocol::cursor::Cursor;
use crate::protocol::imu::ImuSample;
use std::collections::HashSet;

/// Start-of-frame marker
pub const START_OF_FRAME: [u8; 4] = [0x02, 0x02, 0x02, 0x02];
/// Fixed telegram header size in bytes
pub const HEADER_SIZE: usize = 32;
/// CRC-32 trailer size in bytes
pub const CRC_SIZE: usize = 4;
/// Smallest telegram that can pass validation (header + CRC)
pub const MIN_TELEGRAM_SIZE: usize = HEADER_SIZE + CRC_SIZE;

/// Echo record carries a distance value (bit 0 of `dataContentEchos`)
pub const ECHO_FLAG_DISTANCE: u8 = 0x01;
/// Echo record carries an RSSI value (bit 1 of `dataContentEchos`)
pub const ECHO_FLAG_RSSI: u8 = 0x02;
/// Beam record carries a properties byte (bit 0 of `dataContentBeams`)
pub const BEAM_FLAG_PROPERTIES: u8 = 0x01;
/// Beam record carries an explicit theta (bit 1 of `dataContentBeams`)
pub const BEAM_FLAG_THETA: u8 = 0x02;

// Explicit theta is a device fixed-point format: (raw - 16384) / 5215
const THETA_RAW_OFFSET: f32 = 16384.0;
const THETA_RAW_SCALE: f32 = 5215.0;

/// Command IDs sent by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandId {
    /// Scan measurement data (1)
    ScanData = 1,
    /// IMU sample data (2)
    ImuData = 2,
}

impl CommandId {
    /// Parse command ID from the raw header field
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(CommandId::ScanData),
            2 => Some(CommandId::ImuData),
            _ => None,
        }
    }
}

/// Fixed 32-byte telegram header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelegramHeader {
    /// Raw command identifier (may be a value we do not handle)
    pub command_id: u32,
    /// Monotonic telegram counter from the device
    pub telegram_counter: u64,
    /// Transmit timestamp in microseconds
    pub timestamp_transmit_us: u64,
    /// Telegram format version
    pub version: u32,
    /// Byte size of the first module in the chain
    pub size_module0: u32,
}

impl TelegramHeader {
    /// Parse the header from a validated telegram
    fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        cursor.skip(4)?; // start-of-frame, checked during validation
        Ok(Self {
            command_id: cursor.read_u32_le()?,
            telegram_counter: cursor.read_u64_le()?,
            timestamp_transmit_us: cursor.read_u64_le()?,
            version: cursor.read_u32_le()?,
            size_module0: cursor.read_u32_le()?,
        })
    }

    /// Command ID as a known variant, if recognized
    pub fn command(&self) -> Option<CommandId> {
        CommandId::from_u32(self.command_id)
    }
}

/// Per-module metadata block
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleMetadata {
    /// Angular segment counter within the frame
    pub segment_counter: u64,
    /// Frame number this segment belongs to
    pub frame_number: u64,
    /// Sender identifier
    pub sender_id: u32,
    /// Number of scan lines in this module
    pub num_lines: u32,
    /// Number of beams per scan line
    pub num_beams: u32,
    /// Number of echoes recorded per beam
    pub num_echos: u32,
    /// Per-line scan start timestamps (microseconds)
    pub timestamp_start_us: Vec<u64>,
    /// Per-line scan stop timestamps (microseconds)
    pub timestamp_stop_us: Vec<u64>,
    /// Per-line elevation angle in radians
    pub phi: Vec<f32>,
    /// Per-line azimuth at the first beam, radians
    pub theta_start: Vec<f32>,
    /// Per-line azimuth at the last beam, radians
    pub theta_stop: Vec<f32>,
    /// Multiplier converting raw 16-bit distances to device units
    pub distance_scaling: f32,
    /// Byte size of the next module, 0 terminates the chain
    pub next_module_size: u32,
    /// Echo content flags (`ECHO_FLAG_*`)
    pub data_content_echos: u8,
    /// Beam content flags (`BEAM_FLAG_*`)
    pub data_content_beams: u8,
}

impl ModuleMetadata {
    fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let segment_counter = cursor.read_u64_le()?;
        let frame_number = cursor.read_u64_le()?;
        let sender_id = cursor.read_u32_le()?;
        let num_lines = cursor.read_u32_le()?;
        let num_beams = cursor.read_u32_le()?;
        let num_echos = cursor.read_u32_le()?;

        // Five per-line arrays (28 bytes/line) plus the 12-byte tail must
        // fit in what is left; checked up front so a hostile line count
        // cannot trigger a huge allocation.
        let lines = num_lines as usize;
        let needed = (lines as u64) * 28 + 12;
        if needed > cursor.remaining() as u64 {
            return Err(Error::Truncated {
                needed: needed as usize,
                available: cursor.remaining(),
            });
        }

        let mut timestamp_start_us = Vec::with_capacity(lines);
        for _ in 0..lines {
            timestamp_start_us.push(cursor.read_u64_le()?);
        }
        let mut timestamp_stop_us = Vec::with_capacity(lines);
        for _ in 0..lines {
            timestamp_stop_us.push(cursor.read_u64_le()?);
        }
        let mut phi = Vec::with_capacity(lines);
        for _ in 0..lines {
            phi.push(cursor.read_f32_le()?);
        }
        let mut theta_start = Vec::with_capacity(lines);
        for _ in 0..lines {
            theta_start.push(cursor.read_f32_le()?);
        }
        let mut theta_stop = Vec::with_capacity(lines);
        for _ in 0..lines {
            theta_stop.push(cursor.read_f32_le()?);
        }

        let distance_scaling = cursor.read_f32_le()?;
        let next_module_size = cursor.read_u32_le()?;
        cursor.skip(1)?; // reserved
        let data_content_echos = cursor.read_u8()?;
        let data_content_beams = cursor.read_u8()?;
        cursor.skip(1)?; // reserved

        Ok(Self {
            segment_counter,
            frame_number,
            sender_id,
            num_lines,
            num_beams,
            num_echos,
            timestamp_start_us,
            timestamp_stop_us,
            phi,
            theta_start,
            theta_stop,
            distance_scaling,
            next_module_size,
            data_content_echos,
            data_content_beams,
        })
    }

    /// Bytes each echo record occupies under the echo content flags
    pub fn echo_data_size(&self) -> usize {
        let mut size = 0;
        if self.data_content_echos & ECHO_FLAG_DISTANCE != 0 {
            size += 2;
        }
        if self.data_content_echos & ECHO_FLAG_RSSI != 0 {
            size += 2;
        }
        size
    }

    /// Bytes each beam record occupies under the beam content flags
    pub fn beam_data_size(&self) -> usize {
        let mut size = 0;
        if self.data_content_beams & BEAM_FLAG_PROPERTIES != 0 {
            size += 1;
        }
        if self.data_content_beams & BEAM_FLAG_THETA != 0 {
            size += 2;
        }
        size
    }
}

/// One return pulse within a beam
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Echo {
    /// Distance in device units, already scaled
    pub distance: Option<f32>,
    /// Received signal strength
    pub rssi: Option<u16>,
}

/// One (beam, line) measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Scan line index within the module
    pub line_idx: u32,
    /// Beam index within the line
    pub beam_idx: u32,
    /// Elevation angle in radians, inherited from the line
    pub phi: f32,
    /// Resolved azimuth angle in radians
    pub theta: f32,
    /// Echo records, up to `numberOfEchosPerBeam`
    pub echoes: Vec<Echo>,
    /// Reflector property, when the beam carries a properties byte
    pub reflector_detected: Option<bool>,
}

/// One parsed module: metadata plus its measurements
#[derive(Debug, Clone, PartialEq)]
pub struct ScanModule {
    pub metadata: ModuleMetadata,
    pub measurements: Vec<Measurement>,
}

/// A decoded scan telegram
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFrame {
    pub header: TelegramHeader,
    pub modules: Vec<ScanModule>,
}

/// Any decoded telegram
#[derive(Debug, Clone, PartialEq)]
pub enum Telegram {
    /// Scan data with zero or more modules
    Scan(ScanFrame),
    /// IMU sample
    Imu(ImuSample),
    /// Valid frame with a command ID we do not handle
    Unknown(TelegramHeader),
}

/// Decoder for compact-format telegrams
///
/// Holds only diagnostic state (frame/segment bookkeeping and counters);
/// parsing itself is stateless, so a decoder serves one sensor stream and
/// each stream gets its own instance.
#[derive(Debug, Default)]
pub struct CompactDecoder {
    current_frame: u64,
    segments_seen: HashSet<u64>,
    telegrams_decoded: u64,
    crc_failures: u64,
}

impl CompactDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Telegrams that passed validation and were decoded
    pub fn telegrams_decoded(&self) -> u64 {
        self.telegrams_decoded
    }

    /// Datagrams rejected by length/marker/CRC validation
    pub fn crc_failures(&self) -> u64 {
        self.crc_failures
    }

    /// Decode one datagram
    ///
    /// Rejections are local to the datagram: the caller drops it and moves
    /// on, and decoder state stays consistent for the next one.
    pub fn decode(&mut self, data: &[u8]) -> Result<Telegram> {
        if let Err(e) = validate_frame(data) {
            self.crc_failures += 1;
            return Err(e);
        }

        let header = TelegramHeader::parse(data)?;
        self.telegrams_decoded += 1;

        match header.command() {
            Some(CommandId::ImuData) => Ok(Telegram::Imu(ImuSample::parse(data)?)),
            Some(CommandId::ScanData) => {
                let modules = parse_module_chain(data, &header);
                let frame = ScanFrame { header, modules };
                self.track_segments(&frame);
                Ok(Telegram::Scan(frame))
            }
            None => {
                log::debug!("Unknown command ID {} in telegram", header.command_id);
                Ok(Telegram::Unknown(header))
            }
        }
    }

    /// Frame/segment diagnostic bookkeeping, no effect on parsing
    fn track_segments(&mut self, frame: &ScanFrame) {
        let Some(first) = frame.modules.first() else {
            return;
        };
        let frame_number = first.metadata.frame_number;
        if frame_number != self.current_frame {
            if self.current_frame > 0 {
                log::debug!(
                    "Completed frame {} with {} segments",
                    self.current_frame,
                    self.segments_seen.len()
                );
            }
            self.current_frame = frame_number;
            self.segments_seen.clear();
        }
        self.segments_seen.insert(first.metadata.segment_counter);
    }
}

/// Validate length, start-of-frame marker, and the CRC-32 trailer
fn validate_frame(data: &[u8]) -> Result<()> {
    if data.len() < MIN_TELEGRAM_SIZE {
        return Err(Error::InvalidFrame(format!(
            "telegram too small: {} bytes",
            data.len()
        )));
    }
    if data[..4] != START_OF_FRAME {
        return Err(Error::InvalidFrame("bad start-of-frame marker".into()));
    }
    let crc_offset = data.len() - CRC_SIZE;
    let received = u32::from_le_bytes([
        data[crc_offset],
        data[crc_offset + 1],
        data[crc_offset + 2],
        data[crc_offset + 3],
    ]);
    let calculated = crc32fast::hash(&data[..crc_offset]);
    if received != calculated {
        return Err(Error::InvalidFrame(format!(
            "CRC mismatch: expected {:#010x}, got {:#010x}",
            received, calculated
        )));
    }
    Ok(())
}

/// Walk the module chain of a scan telegram
///
/// Continues while the metadata names a positive module size that fits
/// before the CRC trailer. Anything else — including a module whose
/// metadata claims more lines or beams than its region holds — stops the
/// walk and keeps the modules parsed so far.
fn parse_module_chain(data: &[u8], header: &TelegramHeader) -> Vec<ScanModule> {
    let payload_end = data.len() - CRC_SIZE;
    let mut modules = Vec::new();
    let mut offset = HEADER_SIZE;
    let mut module_size = header.size_module0 as usize;

    while module_size > 0 && offset + module_size <= payload_end {
        match parse_module(&data[offset..offset + module_size]) {
            Ok(module) => {
                let next = module.metadata.next_module_size as usize;
                modules.push(module);
                offset += module_size;
                module_size = next;
            }
            Err(e) => {
                log::debug!(
                    "Module chain truncated at offset {} (telegram {}): {}",
                    offset,
                    header.telegram_counter,
                    e
                );
                break;
            }
        }
    }

    modules
}

/// Parse one module (metadata + measurement data) from its byte region
fn parse_module(region: &[u8]) -> Result<ScanModule> {
    let mut cursor = Cursor::new(region);
    let metadata = ModuleMetadata::parse(&mut cursor)?;
    let measurements = parse_measurements(&mut cursor, &metadata)?;
    Ok(ScanModule {
        metadata,
        measurements,
    })
}

/// Parse measurement data in beam-major, line-minor order
fn parse_measurements(
    cursor: &mut Cursor<'_>,
    metadata: &ModuleMetadata,
) -> Result<Vec<Measurement>> {
    let num_lines = metadata.num_lines as usize;
    let num_beams = metadata.num_beams as usize;
    let num_echos = metadata.num_echos as usize;

    let per_measurement = num_echos * metadata.echo_data_size() + metadata.beam_data_size();
    let needed = (num_beams as u64) * (num_lines as u64) * (per_measurement as u64);
    if needed > cursor.remaining() as u64 {
        return Err(Error::Truncated {
            needed: needed as usize,
            available: cursor.remaining(),
        });
    }

    // With no per-measurement bytes the counts above are unbounded by the
    // region size; emit nothing instead of materializing empty records
    if per_measurement == 0 {
        return Ok(Vec::new());
    }
    // Echo records of zero size likewise have nothing to parse
    let num_echos = if metadata.echo_data_size() == 0 {
        0
    } else {
        num_echos
    };

    let mut measurements = Vec::with_capacity(num_beams * num_lines);
    for beam_idx in 0..num_beams {
        for line_idx in 0..num_lines {
            let mut echoes = Vec::with_capacity(num_echos);
            for _ in 0..num_echos {
                let mut echo = Echo::default();
                if metadata.data_content_echos & ECHO_FLAG_DISTANCE != 0 {
                    let raw = cursor.read_u16_le()?;
                    echo.distance = Some(raw as f32 * metadata.distance_scaling);
                }
                if metadata.data_content_echos & ECHO_FLAG_RSSI != 0 {
                    echo.rssi = Some(cursor.read_u16_le()?);
                }
                echoes.push(echo);
            }

            let reflector_detected = if metadata.data_content_beams & BEAM_FLAG_PROPERTIES != 0 {
                let properties = cursor.read_u8()?;
                Some(properties & 0x01 != 0)
            } else {
                None
            };

            let theta = if metadata.data_content_beams & BEAM_FLAG_THETA != 0 {
                let raw = cursor.read_u16_le()?;
                (raw as f32 - THETA_RAW_OFFSET) / THETA_RAW_SCALE
            } else {
                interpolate_theta(
                    metadata.theta_start[line_idx],
                    metadata.theta_stop[line_idx],
                    beam_idx as u32,
                    metadata.num_beams,
                )
            };

            measurements.push(Measurement {
                line_idx: line_idx as u32,
                beam_idx: beam_idx as u32,
                phi: metadata.phi[line_idx],
                theta,
                echoes,
                reflector_detected,
            });
        }
    }

    Ok(measurements)
}

/// Linear azimuth interpolation across the beam index range
///
/// A single-beam module has no interpolation span; it resolves to
/// `theta_start`.
fn interpolate_theta(theta_start: f32, theta_stop: f32, beam_idx: u32, num_beams: u32) -> f32 {
    if num_beams <= 1 {
        return theta_start;
    }
    theta_start + (theta_stop - theta_start) * beam_idx as f32 / (num_beams - 1) as f32
}
