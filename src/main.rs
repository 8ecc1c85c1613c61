//! DrishtiIO - acquisition daemon for picoScan compact-format telemetry
//!
//! One synchronous loop: receive a datagram, decode it, route it. Scan
//! telegrams become voxel-deduplicated point clouds, transformed into the
//! world frame once the IMU tracker has calibrated, and accumulated for
//! the visualization forward stream. IMU telegrams feed the tracker.

use drishti_io::cloud::{CloudExtractor, VoxelFilter};
use drishti_io::config::AppConfig;
use drishti_io::error::Result;
use drishti_io::net::{CloudForwarder, UdpListener};
use drishti_io::protocol::{CompactDecoder, Telegram};
use drishti_io::tracking::PositionTracker;
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Parse config path from command line arguments.
///
/// Supports:
/// - `drishti-io <path>` (positional)
/// - `drishti-io --config <path>` (flag-based)
/// - `drishti-io -c <path>` (short flag)
///
/// Defaults to `/etc/drishti-io.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/drishti-io.toml".to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("DrishtiIO v0.1.0 starting...");

    let config_path = parse_config_path();
    let config = if Path::new(&config_path).exists() {
        log::info!("Using config: {}", config_path);
        AppConfig::from_file(&config_path)?
    } else {
        log::info!("No config at {}, using defaults", config_path);
        AppConfig::default()
    };

    if config.parser.voxel_size <= 0.0 {
        return Err(drishti_io::Error::InvalidParameter(format!(
            "voxel_size must be positive, got {}",
            config.parser.voxel_size
        )));
    }

    let mut listener = UdpListener::bind(
        &config.network.listen_address,
        config.network.recv_buffer_size,
    )?;
    let mut decoder = CompactDecoder::new();
    let voxel_filter = VoxelFilter::new(config.parser.voxel_size);
    let mut tracker = PositionTracker::new(config.tracker);
    let mut forwarder = CloudForwarder::new(config.forwarder.clone())?;

    // Shutdown flag flipped by Ctrl-C; the 1s receive timeout guarantees
    // the loop notices it promptly
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| drishti_io::Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("DrishtiIO running. Press Ctrl-C to stop.");

    let mut clouds_extracted: u64 = 0;
    let mut points_extracted: u64 = 0;
    let mut last_stats_log = Instant::now();

    while running.load(Ordering::Relaxed) {
        if let Some(datagram) = listener.recv() {
            match decoder.decode(datagram) {
                Ok(Telegram::Scan(frame)) => {
                    let cloud = CloudExtractor::extract(&frame);
                    if !cloud.is_empty() {
                        let cloud = voxel_filter.apply(&cloud);
                        let cloud = if tracker.is_calibrated() {
                            tracker.transform_cloud(&cloud)
                        } else {
                            cloud
                        };
                        clouds_extracted += 1;
                        points_extracted += cloud.len() as u64;
                        forwarder.accumulate(&cloud);
                    }
                }
                Ok(Telegram::Imu(sample)) => {
                    tracker.update(&sample);
                }
                Ok(Telegram::Unknown(header)) => {
                    log::debug!(
                        "Ignoring telegram with unknown command ID {}",
                        header.command_id
                    );
                }
                Err(e) => {
                    // Malformed input is an expected operating condition;
                    // drop the datagram and keep going
                    log::warn!("Dropping datagram: {}", e);
                }
            }
        }

        if let Err(e) = forwarder.maybe_send() {
            log::error!("Forward stream error: {}", e);
        }

        if last_stats_log.elapsed() >= Duration::from_secs(10) {
            log::info!(
                "Stats: {} telegrams decoded, {} rejected, {} clouds / {} points extracted, {} world points accumulated",
                decoder.telegrams_decoded(),
                decoder.crc_failures(),
                clouds_extracted,
                points_extracted,
                forwarder.point_count()
            );
            last_stats_log = Instant::now();
        }
    }

    log::info!("DrishtiIO stopped");
    Ok(())
}
