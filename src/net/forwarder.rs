//! Chunked UDP forward stream to the visualization engine
//!
//! The daemon builds a persistent world point set: incoming cloud points
//! are rounded to a configurable precision and deduplicated, so revisited
//! surfaces do not grow the set without bound. On a fixed interval the
//! whole set is sent to the engine as datagrams of `chunk_size` points,
//! each point three little-endian `f32`s pre-scaled to engine units.
//!
//! Delivery is fire-and-forget unicast; the send buffer is allocated once
//! and reused per chunk.

use crate::cloud::PointCloud;
use crate::config::ForwarderConfig;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

/// Accumulating point forwarder
pub struct CloudForwarder {
    socket: UdpSocket,
    target: SocketAddr,
    config: ForwarderConfig,
    /// World points as rounded fixed-point keys
    accumulated: HashSet<(i64, i64, i64)>,
    /// 10^dedup_decimals, the fixed-point scale of the keys
    dedup_scale: f64,
    last_send: Instant,
    send_buf: Vec<u8>,
}

impl CloudForwarder {
    /// Create a forwarder sending to the configured target
    pub fn new(config: ForwarderConfig) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let target: SocketAddr = config.target_address.parse().map_err(|e| {
            Error::InvalidParameter(format!(
                "bad forward target '{}': {}",
                config.target_address, e
            ))
        })?;
        log::info!("Forwarding point stream to {}", target);

        let send_buf = Vec::with_capacity(config.chunk_size * 12);
        let dedup_scale = 10f64.powi(config.dedup_decimals);
        Ok(Self {
            socket,
            target,
            config,
            accumulated: HashSet::new(),
            dedup_scale,
            last_send: Instant::now(),
            send_buf,
        })
    }

    /// Number of distinct accumulated points
    pub fn point_count(&self) -> usize {
        self.accumulated.len()
    }

    /// Merge a cloud into the accumulated world set
    ///
    /// Points are rounded to the dedup precision; near-duplicates of
    /// already-stored points are dropped. Stops accepting points at the
    /// configured cap.
    pub fn accumulate(&mut self, cloud: &PointCloud) {
        for i in 0..cloud.len() {
            if self.accumulated.len() >= self.config.max_points {
                log::warn!(
                    "Accumulated point set reached cap of {}, dropping new points",
                    self.config.max_points
                );
                return;
            }
            let key = (
                (cloud.xs[i] as f64 * self.dedup_scale).round() as i64,
                (cloud.ys[i] as f64 * self.dedup_scale).round() as i64,
                (cloud.zs[i] as f64 * self.dedup_scale).round() as i64,
            );
            self.accumulated.insert(key);
        }
    }

    /// Send the accumulated set if the send interval has elapsed
    pub fn maybe_send(&mut self) -> Result<()> {
        if self.accumulated.is_empty() {
            return Ok(());
        }
        if self.last_send.elapsed().as_millis() < self.config.send_interval_ms as u128 {
            return Ok(());
        }
        self.send_all()?;
        self.last_send = Instant::now();
        Ok(())
    }

    /// Send the whole accumulated set in chunks
    pub fn send_all(&mut self) -> Result<()> {
        let mut datagrams = 0usize;
        let mut in_chunk = 0usize;
        self.send_buf.clear();

        for &(kx, ky, kz) in &self.accumulated {
            let x = (kx as f64 / self.dedup_scale) as f32 * self.config.unit_scale;
            let y = (ky as f64 / self.dedup_scale) as f32 * self.config.unit_scale;
            let z = (kz as f64 / self.dedup_scale) as f32 * self.config.unit_scale;
            self.send_buf.extend_from_slice(&x.to_le_bytes());
            self.send_buf.extend_from_slice(&y.to_le_bytes());
            self.send_buf.extend_from_slice(&z.to_le_bytes());
            in_chunk += 1;

            if in_chunk == self.config.chunk_size {
                self.socket.send_to(&self.send_buf, self.target)?;
                self.send_buf.clear();
                in_chunk = 0;
                datagrams += 1;
            }
        }

        if in_chunk > 0 {
            self.socket.send_to(&self.send_buf, self.target)?;
            self.send_buf.clear();
            datagrams += 1;
        }

        log::debug!(
            "Forwarded {} points in {} datagrams",
            self.accumulated.len(),
            datagrams
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(target: SocketAddr, chunk_size: usize, max_points: usize) -> ForwarderConfig {
        ForwarderConfig {
            target_address: target.to_string(),
            chunk_size,
            send_interval_ms: 0,
            unit_scale: 0.005,
            max_points,
            dedup_decimals: 0,
        }
    }

    fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    fn cloud_from(points: &[(f32, f32, f32)]) -> PointCloud {
        let mut cloud = PointCloud::new(0, 0);
        for &(x, y, z) in points {
            cloud.push(x, y, z, 0);
        }
        cloud
    }

    #[test]
    fn test_accumulate_deduplicates_rounded_points() {
        let (_socket, addr) = receiver();
        let mut forwarder = CloudForwarder::new(test_config(addr, 250, 1000)).unwrap();

        forwarder.accumulate(&cloud_from(&[
            (100.2, 0.0, 0.0),
            (100.4, 0.0, 0.0), // rounds to the same key
            (200.0, 0.0, 0.0),
        ]));
        assert_eq!(forwarder.point_count(), 2);
    }

    #[test]
    fn test_accumulate_respects_cap() {
        let (_socket, addr) = receiver();
        let mut forwarder = CloudForwarder::new(test_config(addr, 250, 2)).unwrap();

        forwarder.accumulate(&cloud_from(&[
            (1.0, 0.0, 0.0),
            (2.0, 0.0, 0.0),
            (3.0, 0.0, 0.0),
        ]));
        assert_eq!(forwarder.point_count(), 2);
    }

    #[test]
    fn test_send_all_packs_scaled_triplets() {
        let (socket, addr) = receiver();
        let mut forwarder = CloudForwarder::new(test_config(addr, 250, 1000)).unwrap();

        forwarder.accumulate(&cloud_from(&[(100.0, -200.0, 300.0)]));
        forwarder.send_all().unwrap();

        let mut buf = [0u8; 1500];
        let (len, _) = socket.recv_from(&mut buf).unwrap();
        assert_eq!(len, 12);

        let x = f32::from_le_bytes(buf[0..4].try_into().unwrap());
        let y = f32::from_le_bytes(buf[4..8].try_into().unwrap());
        let z = f32::from_le_bytes(buf[8..12].try_into().unwrap());
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y + 1.0).abs() < 1e-6);
        assert!((z - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_send_all_chunks_large_sets() {
        let (socket, addr) = receiver();
        let mut forwarder = CloudForwarder::new(test_config(addr, 2, 1000)).unwrap();

        let points: Vec<(f32, f32, f32)> =
            (0..5).map(|i| (i as f32 * 10.0, 0.0, 0.0)).collect();
        forwarder.accumulate(&cloud_from(&points));
        forwarder.send_all().unwrap();

        // 5 points in chunks of 2: datagrams of 2, 2, and 1 points
        let mut buf = [0u8; 1500];
        let mut sizes = Vec::new();
        for _ in 0..3 {
            let (len, _) = socket.recv_from(&mut buf).unwrap();
            sizes.push(len);
        }
        sizes.sort_unstable();
        assert_eq!(sizes, vec![12, 24, 24]);
    }

    #[test]
    fn test_rejects_unparseable_target() {
        let config = ForwarderConfig {
            target_address: "not an address".to_string(),
            ..ForwarderConfig::default()
        };
        assert!(CloudForwarder::new(config).is_err());
    }
}
