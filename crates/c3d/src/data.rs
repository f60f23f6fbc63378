//! Data section parsing.
//!
//! The data section interleaves one point block and one analog block per
//! frame. Points are stored as x, y, z plus a combined residual/camera word;
//! analogs are stored subframe-major. Integer files scale points by the
//! header scale factor, float files store real values directly.

use glam::DVec3;

use crate::error::C3dError;
use crate::header::C3dHeader;
use crate::parameters::Processor;
use crate::BLOCK_SIZE;

/// Decoded point and raw analog samples.
#[derive(Debug, Clone)]
pub struct DataSection {
    /// Coordinates per marker, NaN for missing samples.
    pub point_coords: Vec<Vec<DVec3>>,
    /// Residuals per marker, -1 for missing samples.
    pub point_residuals: Vec<Vec<f64>>,
    /// Raw analog samples per channel (channel scaling not yet applied).
    pub analog_raw: Vec<Vec<f64>>,
}

impl DataSection {
    pub fn parse(
        bytes: &[u8],
        header: &C3dHeader,
        processor: Processor,
    ) -> Result<Self, C3dError> {
        let frames = header.frame_count();
        let points = header.point_count as usize;
        let channels = header.analog_channel_count()?;
        let subframes = header.analog_samples_per_frame as usize;
        let float_data = header.is_float_data();
        let word = if float_data { 4 } else { 2 };

        let offset = (header.data_start_block.max(1) as usize - 1) * BLOCK_SIZE;
        let frame_stride = (4 * points + header.analog_per_frame as usize) * word;
        let expected = offset + frames * frame_stride;
        if bytes.len() < expected {
            return Err(C3dError::TruncatedData {
                expected,
                actual: bytes.len(),
            });
        }

        let scale_abs = header.scale_factor.abs() as f64;
        let mut point_coords = vec![Vec::with_capacity(frames); points];
        let mut point_residuals = vec![Vec::with_capacity(frames); points];
        let mut analog_raw = vec![Vec::with_capacity(frames * subframes); channels];

        let read = |pos: usize| -> f64 {
            if float_data {
                processor.read_f32(&bytes[pos..pos + 4]) as f64
            } else {
                processor.read_i16(&bytes[pos..pos + 2]) as f64
            }
        };

        let mut pos = offset;
        for _ in 0..frames {
            for marker in 0..points {
                let x = read(pos);
                let y = read(pos + word);
                let z = read(pos + 2 * word);
                let status = read(pos + 3 * word);
                pos += 4 * word;

                if status < 0.0 {
                    // Negative residual word flags an invalid (occluded) point.
                    point_coords[marker].push(DVec3::splat(f64::NAN));
                    point_residuals[marker].push(-1.0);
                } else {
                    let coords = if float_data {
                        DVec3::new(x, y, z)
                    } else {
                        DVec3::new(x, y, z) * scale_abs
                    };
                    // Low byte of the residual word is the reconstruction
                    // residual; the high byte is the camera mask.
                    let residual = (status as i32 & 0xFF) as f64 * scale_abs;
                    point_coords[marker].push(coords);
                    point_residuals[marker].push(residual);
                }
            }
            for _ in 0..subframes {
                for channel in analog_raw.iter_mut() {
                    channel.push(read(pos));
                    pos += word;
                }
            }
        }

        Ok(Self {
            point_coords,
            point_residuals,
            analog_raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(float_data: bool) -> C3dHeader {
        C3dHeader {
            parameter_block: 2,
            point_count: 1,
            analog_per_frame: 2,
            first_frame: 1,
            last_frame: 2,
            max_gap: 0,
            scale_factor: if float_data { -1.0 } else { 0.1 },
            data_start_block: 1,
            analog_samples_per_frame: 2,
            point_rate: 100.0,
        }
    }

    #[test]
    fn decodes_float_frames_with_missing_points() {
        let header = header(true);
        let mut bytes = Vec::new();
        // Frame 1: valid point, residual byte 2, analogs 0.5 / -0.5.
        for v in [1.0f32, 2.0, 3.0, 2.0, 0.5, -0.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        // Frame 2: invalid point.
        for v in [0.0f32, 0.0, 0.0, -1.0, 1.5, 2.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let data = DataSection::parse(&bytes, &header, Processor::Intel).unwrap();
        assert_eq!(data.point_coords[0][0], DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(data.point_residuals[0][0], 2.0);
        assert!(data.point_coords[0][1].x.is_nan());
        assert_eq!(data.point_residuals[0][1], -1.0);
        // One channel, two subframes per frame.
        assert_eq!(data.analog_raw.len(), 1);
        assert_eq!(data.analog_raw[0], vec![0.5, -0.5, 1.5, 2.5]);
    }

    #[test]
    fn integer_points_are_scaled() {
        let header = header(false);
        let mut bytes = Vec::new();
        for frame in 0..2i16 {
            for v in [100 + frame, 200, 300, 1, 0, 0] {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        let data = DataSection::parse(&bytes, &header, Processor::Intel).unwrap();
        assert!((data.point_coords[0][0].x - 10.0).abs() < 1e-9);
        assert!((data.point_coords[0][1].x - 10.1).abs() < 1e-9);
        assert!((data.point_coords[0][0].z - 30.0).abs() < 1e-9);
        assert!((data.point_residuals[0][0] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn truncated_data_is_an_error() {
        let header = header(true);
        let bytes = vec![0u8; 10];
        assert!(matches!(
            DataSection::parse(&bytes, &header, Processor::Intel),
            Err(C3dError::TruncatedData { .. })
        ));
    }
}
