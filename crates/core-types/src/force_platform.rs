use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One force platform with its calibration geometry and derived sample data.
///
/// Forces, moments, centers of pressure and free moments are expressed in the
/// laboratory (global) frame, sampled at the trial's analog rate. Moments are
/// taken about the geometric center of the platform surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcePlatform {
    pub unit_force: String,
    pub unit_moment: String,
    pub unit_position: String,
    /// 6x6 calibration matrix (identity for platforms that ship calibrated data).
    pub cal_matrix: [[f64; 6]; 6],
    /// The four corners of the working surface in the global frame.
    pub corners: [DVec3; 4],
    /// Vector from the surface center to the transducer origin, platform frame.
    pub origin: DVec3,
    force: Vec<DVec3>,
    moment: Vec<DVec3>,
    center_of_pressure: Vec<DVec3>,
    free_moment: Vec<DVec3>,
}

impl ForcePlatform {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit_force: impl Into<String>,
        unit_moment: impl Into<String>,
        unit_position: impl Into<String>,
        cal_matrix: [[f64; 6]; 6],
        corners: [DVec3; 4],
        origin: DVec3,
        force: Vec<DVec3>,
        moment: Vec<DVec3>,
        center_of_pressure: Vec<DVec3>,
        free_moment: Vec<DVec3>,
    ) -> Result<Self, CoreError> {
        let n = force.len();
        if moment.len() != n || center_of_pressure.len() != n || free_moment.len() != n {
            return Err(CoreError::PlatformLengthMismatch);
        }
        Ok(Self {
            unit_force: unit_force.into(),
            unit_moment: unit_moment.into(),
            unit_position: unit_position.into(),
            cal_matrix,
            corners,
            origin,
            force,
            moment,
            center_of_pressure,
            free_moment,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.force.len()
    }

    pub fn force(&self) -> &[DVec3] {
        &self.force
    }

    pub fn moment(&self) -> &[DVec3] {
        &self.moment
    }

    pub fn center_of_pressure(&self) -> &[DVec3] {
        &self.center_of_pressure
    }

    pub fn free_moment(&self) -> &[DVec3] {
        &self.free_moment
    }

    /// The geometric center of the working surface in the global frame.
    pub fn surface_center(&self) -> DVec3 {
        (self.corners[0] + self.corners[1] + self.corners[2] + self.corners[3]) / 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_6X6: [[f64; 6]; 6] = {
        let mut m = [[0.0; 6]; 6];
        let mut i = 0;
        while i < 6 {
            m[i][i] = 1.0;
            i += 1;
        }
        m
    };

    fn corners() -> [DVec3; 4] {
        [
            DVec3::new(0.2, 0.3, 0.0),
            DVec3::new(-0.2, 0.3, 0.0),
            DVec3::new(-0.2, -0.3, 0.0),
            DVec3::new(0.2, -0.3, 0.0),
        ]
    }

    #[test]
    fn rejects_mismatched_sample_series() {
        let result = ForcePlatform::new(
            "N",
            "Nm",
            "m",
            IDENTITY_6X6,
            corners(),
            DVec3::ZERO,
            vec![DVec3::ZERO; 3],
            vec![DVec3::ZERO; 2],
            vec![DVec3::ZERO; 3],
            vec![DVec3::ZERO; 3],
        );
        assert!(matches!(result, Err(CoreError::PlatformLengthMismatch)));
    }

    #[test]
    fn surface_center_is_corner_mean() {
        let fp = ForcePlatform::new(
            "N",
            "Nm",
            "m",
            IDENTITY_6X6,
            corners(),
            DVec3::ZERO,
            vec![],
            vec![],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(fp.surface_center(), DVec3::ZERO);
        assert_eq!(fp.sample_count(), 0);
    }
}
