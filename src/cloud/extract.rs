//! Spherical to Cartesian point extraction
//!
//! Each measurement direction is given by the line's elevation `phi` and
//! the resolved azimuth `theta`; the first echo's distance sets the
//! radius:
//!
//! ```text
//! x = d · cos(phi) · cos(theta)
//! y = d · cos(phi) · sin(theta)
//! z = d · sin(phi)
//! ```

use crate::cloud::PointCloud;
use crate::protocol::ScanFrame;

/// Scan frame to point cloud converter
pub struct CloudExtractor;

impl CloudExtractor {
    /// Extract a Cartesian point cloud from a decoded scan frame
    ///
    /// Measurements whose first echo carries no distance produce no point.
    /// Intensity is the first echo's RSSI, 0 when absent.
    pub fn extract(frame: &ScanFrame) -> PointCloud {
        let capacity = frame
            .modules
            .iter()
            .map(|m| m.measurements.len())
            .sum::<usize>();
        let mut cloud = PointCloud::with_capacity(
            frame.header.telegram_counter,
            frame.header.timestamp_transmit_us,
            capacity,
        );

        for module in &frame.modules {
            for measurement in &module.measurements {
                let Some(first_echo) = measurement.echoes.first() else {
                    continue;
                };
                let Some(distance) = first_echo.distance else {
                    continue;
                };

                let (sin_phi, cos_phi) = measurement.phi.sin_cos();
                let (sin_theta, cos_theta) = measurement.theta.sin_cos();
                cloud.push(
                    distance * cos_phi * cos_theta,
                    distance * cos_phi * sin_theta,
                    distance * sin_phi,
                    first_echo.rssi.unwrap_or(0),
                );
            }
        }

        cloud
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::telegram::{
        Echo, Measurement, ModuleMetadata, ScanModule, TelegramHeader,
    };
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn frame_with_measurements(measurements: Vec<Measurement>) -> ScanFrame {
        let metadata = ModuleMetadata {
            segment_counter: 0,
            frame_number: 1,
            sender_id: 0,
            num_lines: 1,
            num_beams: measurements.len() as u32,
            num_echos: 1,
            timestamp_start_us: vec![0],
            timestamp_stop_us: vec![0],
            phi: vec![0.0],
            theta_start: vec![0.0],
            theta_stop: vec![0.0],
            distance_scaling: 1.0,
            next_module_size: 0,
            data_content_echos: 0x03,
            data_content_beams: 0,
        };
        ScanFrame {
            header: TelegramHeader {
                command_id: 1,
                telegram_counter: 11,
                timestamp_transmit_us: 222,
                version: 1,
                size_module0: 0,
            },
            modules: vec![ScanModule {
                metadata,
                measurements,
            }],
        }
    }

    fn measurement(phi: f32, theta: f32, echo: Echo) -> Measurement {
        Measurement {
            line_idx: 0,
            beam_idx: 0,
            phi,
            theta,
            echoes: vec![echo],
            reflector_detected: None,
        }
    }

    #[test]
    fn test_axis_aligned_directions() {
        let frame = frame_with_measurements(vec![
            // Straight ahead: +X
            measurement(
                0.0,
                0.0,
                Echo {
                    distance: Some(2.0),
                    rssi: Some(9),
                },
            ),
            // 90° azimuth: +Y
            measurement(
                0.0,
                FRAC_PI_2,
                Echo {
                    distance: Some(3.0),
                    rssi: None,
                },
            ),
            // 90° elevation: +Z
            measurement(
                FRAC_PI_2,
                0.0,
                Echo {
                    distance: Some(4.0),
                    rssi: Some(1),
                },
            ),
        ]);

        let cloud = CloudExtractor::extract(&frame);
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.telegram_counter, 11);
        assert_eq!(cloud.timestamp_us, 222);

        assert_relative_eq!(cloud.xs[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(cloud.ys[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(cloud.zs[0], 0.0, epsilon = 1e-6);
        assert_eq!(cloud.intensities[0], 9);

        assert_relative_eq!(cloud.xs[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(cloud.ys[1], 3.0, epsilon = 1e-6);
        // RSSI absent defaults to 0
        assert_eq!(cloud.intensities[1], 0);

        assert_relative_eq!(cloud.xs[2], 0.0, epsilon = 1e-6);
        assert_relative_eq!(cloud.zs[2], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_skips_measurements_without_distance() {
        let frame = frame_with_measurements(vec![
            measurement(
                0.0,
                0.0,
                Echo {
                    distance: None,
                    rssi: Some(50),
                },
            ),
            measurement(
                0.0,
                0.0,
                Echo {
                    distance: Some(1.0),
                    rssi: None,
                },
            ),
        ]);

        let cloud = CloudExtractor::extract(&frame);
        // No zero-filled point for the distance-less measurement
        assert_eq!(cloud.len(), 1);
        assert_relative_eq!(cloud.xs[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_skips_measurements_without_echoes() {
        let mut m = measurement(
            0.0,
            0.0,
            Echo {
                distance: Some(1.0),
                rssi: None,
            },
        );
        m.echoes.clear();
        let cloud = CloudExtractor::extract(&frame_with_measurements(vec![m]));
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_empty_frame() {
        let frame = frame_with_measurements(Vec::new());
        assert!(CloudExtractor::extract(&frame).is_empty());
    }
}
