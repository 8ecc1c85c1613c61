//! Stationary IMU bias estimation
//!
//! Collects accelerometer and gyroscope samples while the sensor is
//! assumed stationary and computes the mean offset of each axis. Gravity
//! is nulled out of the accelerometer Z mean so the resulting bias can be
//! subtracted from live readings directly.

use nalgebra::Vector3;

/// Standard gravity, m/s²
pub const GRAVITY_MPS2: f64 = 9.81;

/// Estimates accelerometer and gyroscope bias from stationary samples
///
/// 1. Create an estimator with the desired sample count
/// 2. Feed samples with `add_sample()` until it returns `true`
/// 3. Call `compute_bias()` for the estimated biases
///
/// The sensor must be stationary while samples are collected; the
/// accelerometer correction assumes the only real signal is gravity on Z.
#[derive(Debug, Clone)]
pub struct ImuBiasEstimator {
    samples: Vec<(Vector3<f64>, Vector3<f64>)>,
    required_samples: usize,
}

impl ImuBiasEstimator {
    /// Create an estimator that collects the specified number of samples
    pub fn new(required_samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(required_samples),
            required_samples,
        }
    }

    /// Add one (accelerometer, gyroscope) sample
    ///
    /// Returns `true` once enough samples have been collected. Samples
    /// beyond the required count are ignored.
    pub fn add_sample(&mut self, accel: Vector3<f64>, gyro: Vector3<f64>) -> bool {
        if self.samples.len() < self.required_samples {
            self.samples.push((accel, gyro));
        }
        self.is_ready()
    }

    /// Check if enough samples have been collected
    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.required_samples
    }

    /// Number of samples collected so far
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Required number of samples
    pub fn required_samples(&self) -> usize {
        self.required_samples
    }

    /// Collection progress as a fraction (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.required_samples == 0 {
            1.0
        } else {
            self.samples.len() as f64 / self.required_samples as f64
        }
    }

    /// Compute (accelerometer bias, gyroscope bias) as sample means
    ///
    /// The accelerometer Z mean has gravity removed. Returns zero biases
    /// if no samples have been collected.
    pub fn compute_bias(&self) -> (Vector3<f64>, Vector3<f64>) {
        if self.samples.is_empty() {
            return (Vector3::zeros(), Vector3::zeros());
        }

        let n = self.samples.len() as f64;
        let mut accel_sum = Vector3::zeros();
        let mut gyro_sum = Vector3::zeros();
        for (accel, gyro) in &self.samples {
            accel_sum += accel;
            gyro_sum += gyro;
        }

        let mut accel_bias = accel_sum / n;
        accel_bias.z -= GRAVITY_MPS2;
        (accel_bias, gyro_sum / n)
    }

    /// Discard collected samples and start over
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
