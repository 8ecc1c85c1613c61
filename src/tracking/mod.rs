//! IMU-based pose tracking
//!
//! [`bias`] estimates stationary sensor biases; [`tracker`] consumes the
//! decoded IMU stream and maintains the smoothed 6-DoF pose used to put
//! point clouds into a stabilized world frame.

pub mod bias;
pub mod tracker;

pub use bias::{ImuBiasEstimator, GRAVITY_MPS2};
pub use tracker::{Pose, PositionTracker};
