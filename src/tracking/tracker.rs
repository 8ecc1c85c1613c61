//! IMU-driven position and orientation tracking
//!
//! The tracker starts in a calibration phase: the first N samples are
//! assumed stationary and establish accelerometer/gyroscope biases. After
//! that each sample advances the pose: the device quaternion stream is
//! smoothed with a sliding component mean, bias-corrected acceleration is
//! rotated into the world frame and gravity-compensated, and velocity and
//! position are integrated with a zero-velocity snap to bound drift.
//!
//! The component-mean quaternion filter is only valid for the small
//! rotation deltas seen between consecutive IMU samples; it is kept (over
//! a spherical blend) because downstream consumers are matched to its
//! output.

use crate::cloud::PointCloud;
use crate::config::TrackerConfig;
use crate::protocol::ImuSample;
use crate::tracking::bias::{ImuBiasEstimator, GRAVITY_MPS2};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use std::collections::VecDeque;

/// Substitute time step when device timestamps stall or go backwards
const DT_FALLBACK_S: f64 = 0.01;
/// Velocities below this magnitude (m/s) snap to zero
const ZERO_VELOCITY_THRESHOLD: f64 = 0.02;

/// A 6-DoF pose snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in world frame
    pub position: Vector3<f64>,
    /// Unit orientation quaternion, body to world
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    /// Identity pose: origin position, no rotation
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Express a sensor-frame cloud in the world frame
    ///
    /// Rotates every point by the orientation, then translates by the
    /// position. Intensities and source tags carry over unchanged.
    pub fn transform_cloud(&self, cloud: &PointCloud) -> PointCloud {
        let mut result =
            PointCloud::with_capacity(cloud.telegram_counter, cloud.timestamp_us, cloud.len());
        for i in 0..cloud.len() {
            let point = Vector3::new(
                cloud.xs[i] as f64,
                cloud.ys[i] as f64,
                cloud.zs[i] as f64,
            );
            let world = self.orientation * point + self.position;
            result.push(
                world.x as f32,
                world.y as f32,
                world.z as f32,
                cloud.intensities[i],
            );
        }
        result
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tracks position and orientation from a stream of IMU samples
///
/// One tracker serves one sensor; it holds no synchronization and is
/// updated from a single thread.
#[derive(Debug)]
pub struct PositionTracker {
    config: TrackerConfig,

    calibration: ImuBiasEstimator,
    accel_bias: Vector3<f64>,
    gyro_bias: Vector3<f64>,
    calibrated: bool,

    position: Vector3<f64>,
    velocity: Vector3<f64>,
    orientation: UnitQuaternion<f64>,
    position_buffer: VecDeque<Vector3<f64>>,
    orientation_buffer: VecDeque<Quaternion<f64>>,

    last_timestamp_us: Option<u64>,
}

impl PositionTracker {
    /// Create a tracker in the calibrating state
    pub fn new(config: TrackerConfig) -> Self {
        let config = TrackerConfig {
            calibration_samples: config.calibration_samples,
            position_smoothing: config.position_smoothing.max(1),
            orientation_smoothing: config.orientation_smoothing.max(1),
        };
        Self {
            calibration: ImuBiasEstimator::new(config.calibration_samples),
            accel_bias: Vector3::zeros(),
            gyro_bias: Vector3::zeros(),
            calibrated: false,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            position_buffer: VecDeque::with_capacity(config.position_smoothing),
            orientation_buffer: VecDeque::with_capacity(config.orientation_smoothing),
            last_timestamp_us: None,
            config,
        }
    }

    /// True once bias calibration has completed
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Calibrated (accelerometer, gyroscope) biases, once tracking
    pub fn bias(&self) -> Option<(Vector3<f64>, Vector3<f64>)> {
        self.calibrated.then_some((self.accel_bias, self.gyro_bias))
    }

    /// Current pose snapshot
    ///
    /// Safe to call at any time; during calibration this is the identity
    /// pose.
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            orientation: self.orientation,
        }
    }

    /// Shorthand for transforming a cloud by the current pose
    pub fn transform_cloud(&self, cloud: &PointCloud) -> PointCloud {
        self.pose().transform_cloud(cloud)
    }

    /// Process one IMU sample
    ///
    /// While calibrating this only feeds the bias estimator; the pose
    /// stays at identity. The sample that completes calibration does not
    /// itself move the pose.
    pub fn update(&mut self, sample: &ImuSample) {
        if !self.calibrated {
            self.calibrate(sample);
            return;
        }

        let dt = self.time_delta(sample.timestamp_us);

        self.update_orientation(sample);

        // Bias-corrected body acceleration into the world frame, with
        // gravity compensated
        let accel = Vector3::new(
            sample.acceleration[0] as f64,
            sample.acceleration[1] as f64,
            sample.acceleration[2] as f64,
        ) - self.accel_bias;
        let mut accel_world = self.orientation * accel;
        accel_world -= Vector3::new(0.0, 0.0, -GRAVITY_MPS2);

        self.velocity += accel_world * dt;
        if self.velocity.norm() < ZERO_VELOCITY_THRESHOLD {
            self.velocity = Vector3::zeros();
        }

        let candidate = self.position + self.velocity * dt;
        if self.position_buffer.len() == self.config.position_smoothing {
            self.position_buffer.pop_front();
        }
        self.position_buffer.push_back(candidate);
        self.position = self.position_buffer.iter().sum::<Vector3<f64>>()
            / self.position_buffer.len() as f64;

        self.last_timestamp_us = Some(sample.timestamp_us);

        log::trace!(
            "Pose update: position [{:.3} {:.3} {:.3}], |v|={:.3}",
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.norm()
        );
    }

    /// Drop calibration and pose state and return to the calibrating phase
    pub fn reset_calibration(&mut self) {
        log::info!("Position tracker reset, recalibrating");
        self.calibration.reset();
        self.accel_bias = Vector3::zeros();
        self.gyro_bias = Vector3::zeros();
        self.calibrated = false;
        self.position = Vector3::zeros();
        self.velocity = Vector3::zeros();
        self.orientation = UnitQuaternion::identity();
        self.position_buffer.clear();
        self.orientation_buffer.clear();
        self.last_timestamp_us = None;
    }

    fn calibrate(&mut self, sample: &ImuSample) {
        let accel = Vector3::new(
            sample.acceleration[0] as f64,
            sample.acceleration[1] as f64,
            sample.acceleration[2] as f64,
        );
        let gyro = Vector3::new(
            sample.angular_velocity[0] as f64,
            sample.angular_velocity[1] as f64,
            sample.angular_velocity[2] as f64,
        );
        if self.calibration.add_sample(accel, gyro) {
            let (accel_bias, gyro_bias) = self.calibration.compute_bias();
            self.accel_bias = accel_bias;
            self.gyro_bias = gyro_bias;
            self.calibrated = true;
            log::info!(
                "IMU calibration complete ({} samples): accel bias [{:.4} {:.4} {:.4}], gyro bias [{:.4} {:.4} {:.4}]",
                self.calibration.sample_count(),
                accel_bias.x,
                accel_bias.y,
                accel_bias.z,
                gyro_bias.x,
                gyro_bias.y,
                gyro_bias.z
            );
        }
    }

    /// Seconds between this sample and the previous one, with a fallback
    /// when the device clock stalls or steps backwards
    fn time_delta(&self, timestamp_us: u64) -> f64 {
        let dt = match self.last_timestamp_us {
            Some(prev) => (timestamp_us as f64 - prev as f64) / 1e6,
            None => 0.0,
        };
        if dt <= 0.0 {
            DT_FALLBACK_S
        } else {
            dt
        }
    }

    /// Sliding component-mean quaternion filter
    fn update_orientation(&mut self, sample: &ImuSample) {
        let raw = Quaternion::new(
            sample.orientation[0] as f64,
            sample.orientation[1] as f64,
            sample.orientation[2] as f64,
            sample.orientation[3] as f64,
        );
        if self.orientation_buffer.len() == self.config.orientation_smoothing {
            self.orientation_buffer.pop_front();
        }
        self.orientation_buffer.push_back(raw);

        let n = self.orientation_buffer.len() as f64;
        let (mut w, mut i, mut j, mut k) = (0.0, 0.0, 0.0, 0.0);
        for q in &self.orientation_buffer {
            w += q.w;
            i += q.i;
            j += q.j;
            k += q.k;
        }
        let mean = Quaternion::new(w / n, i / n, j / n, k / n);

        // Antipodal samples can cancel to a zero mean; hold the previous
        // orientation rather than normalizing a degenerate quaternion
        if mean.norm() > 1e-9 {
            self.orientation = UnitQuaternion::from_quaternion(mean);
        }
    }
}
