use serde::{Deserialize, Serialize};

use core_types::Side;

/// Spatiotemporal metrics for one side of the body.
///
/// Each vector holds one value per observed gait cycle (or step, for the
/// step metrics), so per-cycle variability is preserved alongside the means.
/// Lengths are in meters, times in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideMetrics {
    pub stride_times: Vec<f64>,
    pub stride_lengths: Vec<f64>,
    pub stride_velocities: Vec<f64>,
    /// Strides per minute, one value per stride.
    pub cadences: Vec<f64>,
    pub step_times: Vec<f64>,
    pub stance_times: Vec<f64>,
    /// Stance duration as a percentage of the enclosing gait cycle.
    pub stance_pct: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl SideMetrics {
    pub fn cycle_count(&self) -> usize {
        self.stride_times.len()
    }

    pub fn mean_stride_time(&self) -> Option<f64> {
        mean(&self.stride_times)
    }

    pub fn mean_stride_length(&self) -> Option<f64> {
        mean(&self.stride_lengths)
    }

    pub fn mean_stride_velocity(&self) -> Option<f64> {
        mean(&self.stride_velocities)
    }

    pub fn mean_cadence(&self) -> Option<f64> {
        mean(&self.cadences)
    }

    pub fn mean_step_time(&self) -> Option<f64> {
        mean(&self.step_times)
    }

    pub fn mean_stance_time(&self) -> Option<f64> {
        mean(&self.stance_times)
    }

    pub fn mean_stance_pct(&self) -> Option<f64> {
        mean(&self.stance_pct)
    }
}

/// The standardized output of a spatiotemporal analysis of one trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatiotemporalReport {
    pub trial_name: String,
    pub left: SideMetrics,
    pub right: SideMetrics,
}

impl SpatiotemporalReport {
    pub fn side(&self, side: Side) -> &SideMetrics {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideMetrics {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn means_are_none_for_empty_metrics() {
        let metrics = SideMetrics::default();
        assert_eq!(metrics.cycle_count(), 0);
        assert_eq!(metrics.mean_stride_time(), None);
        assert_eq!(metrics.mean_cadence(), None);
    }

    #[test]
    fn means_average_the_cycles() {
        let metrics = SideMetrics {
            stride_times: vec![1.0, 1.2],
            ..Default::default()
        };
        assert_eq!(metrics.mean_stride_time(), Some(1.1));
    }
}
