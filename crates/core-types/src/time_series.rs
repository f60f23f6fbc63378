use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Frame bookkeeping shared by the point and analog series of a trial.
///
/// Frames are absolute: a capture that starts recording mid-session may have
/// a `first_frame` well above zero, and every per-frame lookup converts
/// absolute frames to relative indices through this struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesInfo {
    pub first_frame: u32,
    pub last_frame: u32,
    /// Sample rate in Hz.
    pub rate: f64,
}

impl TimeSeriesInfo {
    pub fn new(first_frame: u32, last_frame: u32, rate: f64) -> Result<Self, CoreError> {
        if first_frame > last_frame {
            return Err(CoreError::InvalidFrameBounds(first_frame, last_frame));
        }
        if !(rate > 0.0) {
            return Err(CoreError::InvalidRate(rate));
        }
        Ok(Self {
            first_frame,
            last_frame,
            rate,
        })
    }

    pub fn total_frames(&self) -> usize {
        (self.last_frame - self.first_frame) as usize + 1
    }

    /// The time in seconds of an absolute frame, bounds-checked.
    pub fn time_from_frame(&self, frame: u32) -> Result<f64, CoreError> {
        if frame < self.first_frame || frame > self.last_frame {
            return Err(CoreError::FrameOutOfBounds(
                frame,
                self.first_frame,
                self.last_frame,
            ));
        }
        Ok(frame as f64 / self.rate)
    }

    /// Converts an absolute frame to an index into the sample arrays.
    pub fn index_of(&self, frame: u32) -> Result<usize, CoreError> {
        if frame < self.first_frame || frame > self.last_frame {
            return Err(CoreError::FrameOutOfBounds(
                frame,
                self.first_frame,
                self.last_frame,
            ));
        }
        Ok((frame - self.first_frame) as usize)
    }

    /// The time vector for the whole series, one entry per frame.
    pub fn time_vector(&self) -> Vec<f64> {
        (self.first_frame..=self.last_frame)
            .map(|frame| frame as f64 / self.rate)
            .collect()
    }
}

/// Serializes marker coordinates with missing (NaN) samples as `null`, which
/// JSON can represent and NaN cannot.
mod coords_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(coords: &[DVec3], serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<Option<[f64; 3]>> = coords
            .iter()
            .map(|c| {
                if c.x.is_nan() || c.y.is_nan() || c.z.is_nan() {
                    None
                } else {
                    Some([c.x, c.y, c.z])
                }
            })
            .collect();
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<DVec3>, D::Error> {
        let rows = Vec::<Option<[f64; 3]>>::deserialize(deserializer)?;
        Ok(rows
            .into_iter()
            .map(|row| match row {
                Some([x, y, z]) => DVec3::new(x, y, z),
                None => DVec3::splat(f64::NAN),
            })
            .collect())
    }
}

/// One marker's 3D trajectory over the trial.
///
/// Missing samples (occluded markers) are stored as NaN coordinates with a
/// residual of -1, mirroring how capture files flag invalid points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerTrajectory {
    pub label: String,
    pub description: String,
    #[serde(with = "coords_serde")]
    pub coords: Vec<DVec3>,
    /// Per-frame reconstruction residual; -1 marks a missing sample.
    pub residuals: Vec<f64>,
}

impl MarkerTrajectory {
    pub fn new(label: impl Into<String>, coords: Vec<DVec3>, residuals: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            coords,
            residuals,
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Whether the sample at a relative index is missing (occluded).
    pub fn is_missing(&self, idx: usize) -> bool {
        self.coords
            .get(idx)
            .is_none_or(|c| c.x.is_nan() || c.y.is_nan() || c.z.is_nan())
    }
}

/// The point (marker) series of a trial: frame info, units and an ordered
/// collection of trajectories.
///
/// Trajectory order follows the capture file's label order, which matters
/// for column ordering in exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Points {
    pub info: TimeSeriesInfo,
    /// Length units of the coordinates, e.g. "mm".
    pub units: String,
    trajectories: Vec<MarkerTrajectory>,
}

impl Points {
    /// Builds a point series, validating that every trajectory covers the
    /// full frame range.
    pub fn new(
        info: TimeSeriesInfo,
        units: impl Into<String>,
        trajectories: Vec<MarkerTrajectory>,
    ) -> Result<Self, CoreError> {
        let expected = info.total_frames();
        for trajectory in &trajectories {
            if trajectory.len() != expected {
                return Err(CoreError::TrajectoryLengthMismatch {
                    marker: trajectory.label.clone(),
                    actual: trajectory.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            info,
            units: units.into(),
            trajectories,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.trajectories.iter().map(|t| t.label.as_str())
    }

    pub fn trajectories(&self) -> &[MarkerTrajectory] {
        &self.trajectories
    }

    pub fn marker_count(&self) -> usize {
        self.trajectories.len()
    }

    pub fn trajectory(&self, label: &str) -> Option<&MarkerTrajectory> {
        self.trajectories.iter().find(|t| t.label == label)
    }

    /// A marker's coordinates at an absolute frame.
    pub fn coords_at_frame(&self, label: &str, frame: u32) -> Result<DVec3, CoreError> {
        let trajectory = self
            .trajectory(label)
            .ok_or_else(|| CoreError::MarkerNotFound(label.to_string()))?;
        let idx = self.info.index_of(frame)?;
        Ok(trajectory.coords[idx])
    }

    /// Adds a marker trajectory, validating its length against the series.
    pub fn add_marker(&mut self, trajectory: MarkerTrajectory) -> Result<(), CoreError> {
        let expected = self.info.total_frames();
        if trajectory.len() != expected {
            return Err(CoreError::TrajectoryLengthMismatch {
                marker: trajectory.label.clone(),
                actual: trajectory.len(),
                expected,
            });
        }
        // Replace an existing marker with the same label rather than duplicating it.
        if let Some(existing) = self.trajectories.iter_mut().find(|t| t.label == trajectory.label) {
            *existing = trajectory;
        } else {
            self.trajectories.push(trajectory);
        }
        Ok(())
    }
}

/// A single analog channel. Channels carry their own units, since a trial can
/// mix force-plate voltages, EMG and synchronization signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogChannel {
    pub label: String,
    pub units: String,
    pub description: String,
    /// Per-channel scale applied by the capture system.
    pub scale: f64,
    pub offset: f64,
    /// Samples in real units (scaling already applied).
    pub data: Vec<f64>,
}

/// The analog series of a trial. Analogs commonly run at an integer multiple
/// of the point rate, so they keep their own `TimeSeriesInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analogs {
    pub info: TimeSeriesInfo,
    /// General scale factor applied to all channels by the capture system.
    pub gen_scale: f64,
    channels: Vec<AnalogChannel>,
}

impl Analogs {
    pub fn new(info: TimeSeriesInfo, gen_scale: f64, channels: Vec<AnalogChannel>) -> Self {
        Self {
            info,
            gen_scale,
            channels,
        }
    }

    pub fn channels(&self) -> &[AnalogChannel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, label: &str) -> Option<&AnalogChannel> {
        self.channels.iter().find(|c| c.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory(label: &str, n: usize) -> MarkerTrajectory {
        MarkerTrajectory::new(
            label,
            (0..n).map(|i| DVec3::new(i as f64, 0.0, 0.0)).collect(),
            vec![0.0; n],
        )
    }

    #[test]
    fn info_rejects_inverted_bounds_and_bad_rates() {
        assert!(TimeSeriesInfo::new(10, 5, 100.0).is_err());
        assert!(TimeSeriesInfo::new(0, 10, 0.0).is_err());
        assert!(TimeSeriesInfo::new(0, 10, -5.0).is_err());
    }

    #[test]
    fn time_vector_covers_every_frame() {
        let info = TimeSeriesInfo::new(10, 13, 100.0).unwrap();
        assert_eq!(info.total_frames(), 4);
        let time = info.time_vector();
        assert_eq!(time.len(), 4);
        assert!((time[0] - 0.10).abs() < 1e-12);
        assert!((time[3] - 0.13).abs() < 1e-12);
    }

    #[test]
    fn points_validate_trajectory_lengths() {
        let info = TimeSeriesInfo::new(1, 10, 100.0).unwrap();
        let result = Points::new(info, "mm", vec![trajectory("LTOE", 5)]);
        assert!(matches!(
            result,
            Err(CoreError::TrajectoryLengthMismatch { .. })
        ));
        assert!(Points::new(info, "mm", vec![trajectory("LTOE", 10)]).is_ok());
    }

    #[test]
    fn coords_at_frame_uses_absolute_frames() {
        let info = TimeSeriesInfo::new(100, 104, 100.0).unwrap();
        let points = Points::new(info, "mm", vec![trajectory("LTOE", 5)]).unwrap();
        let coords = points.coords_at_frame("LTOE", 102).unwrap();
        assert_eq!(coords.x, 2.0);
        assert!(points.coords_at_frame("LTOE", 99).is_err());
        assert!(matches!(
            points.coords_at_frame("RTOE", 102),
            Err(CoreError::MarkerNotFound(_))
        ));
    }

    #[test]
    fn add_marker_replaces_instead_of_duplicating() {
        let info = TimeSeriesInfo::new(0, 4, 100.0).unwrap();
        let mut points = Points::new(info, "mm", vec![trajectory("LTOE", 5)]).unwrap();
        points.add_marker(trajectory("LTOE", 5)).unwrap();
        assert_eq!(points.marker_count(), 1);
        points.add_marker(trajectory("RTOE", 5)).unwrap();
        assert_eq!(points.marker_count(), 2);
        assert!(points.add_marker(trajectory("BAD", 3)).is_err());
    }

    #[test]
    fn missing_samples_are_detected_through_nan() {
        let mut t = trajectory("LTOE", 3);
        t.coords[1] = DVec3::new(f64::NAN, f64::NAN, f64::NAN);
        t.residuals[1] = -1.0;
        assert!(!t.is_missing(0));
        assert!(t.is_missing(1));
        assert!(t.is_missing(99));
    }
}
