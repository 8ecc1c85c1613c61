//! Voxel-grid spatial deduplication
//!
//! Snaps each point to an integer grid cell by floor division and keeps
//! the first point that lands in each cell. This is deliberately a
//! first-wins dedup in input order, not a centroid reduction: downstream
//! consumers rely on surviving points being actual measurements, and on
//! the output being deterministic for identical input.

use crate::cloud::PointCloud;
use std::collections::HashSet;

/// First-wins voxel deduplication filter
#[derive(Debug, Clone, Copy)]
pub struct VoxelFilter {
    voxel_size: f64,
}

impl VoxelFilter {
    /// Create a filter with the given cell edge length (device units)
    ///
    /// # Panics
    ///
    /// Panics if `voxel_size` is not strictly positive.
    pub fn new(voxel_size: f64) -> Self {
        assert!(
            voxel_size > 0.0,
            "voxel size must be positive, got {}",
            voxel_size
        );
        Self { voxel_size }
    }

    /// Cell edge length
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Grid cell key for a point
    fn cell_key(&self, x: f32, y: f32, z: f32) -> (i64, i64, i64) {
        (
            (x as f64 / self.voxel_size).floor() as i64,
            (y as f64 / self.voxel_size).floor() as i64,
            (z as f64 / self.voxel_size).floor() as i64,
        )
    }

    /// Deduplicate a cloud, keeping the first point per occupied cell
    ///
    /// Output preserves input order; it is empty exactly when the input is.
    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        if cloud.is_empty() {
            return cloud.clone();
        }

        let mut occupied = HashSet::with_capacity(cloud.len());
        let mut result =
            PointCloud::with_capacity(cloud.telegram_counter, cloud.timestamp_us, cloud.len());

        for i in 0..cloud.len() {
            let key = self.cell_key(cloud.xs[i], cloud.ys[i], cloud.zs[i]);
            if occupied.insert(key) {
                result.push(cloud.xs[i], cloud.ys[i], cloud.zs[i], cloud.intensities[i]);
            }
        }

        result
    }
}

impl Default for VoxelFilter {
    /// Creates a filter with a 10-unit cell, the reference deployment value
    fn default() -> Self {
        Self::new(10.0)
    }
}
