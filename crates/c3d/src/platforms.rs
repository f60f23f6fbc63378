//! Force platform extraction.
//!
//! The FORCE_PLATFORM parameter group describes each platform's type, analog
//! channel assignment and calibration geometry. This module turns the six
//! raw transducer channels into forces, moments, centers of pressure and
//! free vertical moments expressed in the laboratory frame.
//!
//! Moments are transferred from the transducer origin to the center of the
//! working surface; the center of pressure and free moment follow Winter,
//! *Biomechanics and Motor Control of Human Movement*, 4th ed., p. 87.

use glam::{DMat3, DVec3};
use tracing::warn;

use core_types::{Analogs, ForcePlatform};

use crate::parameters::ParameterSection;

/// Vertical forces below this magnitude leave the center of pressure
/// undefined; the platform is treated as unloaded.
const MIN_VERTICAL_FORCE: f64 = 1e-10;

/// The decoded FORCE_PLATFORM entry for one platform.
#[derive(Debug, Clone)]
pub struct PlatformSetup {
    pub platform_type: i64,
    /// 1-based analog channel numbers for Fx, Fy, Fz, Mx, My, Mz.
    pub channels: [usize; 6],
    pub corners: [DVec3; 4],
    /// Vector from the surface center to the transducer origin, platform frame.
    pub origin: DVec3,
    pub cal_matrix: [[f64; 6]; 6],
}

fn identity_6x6() -> [[f64; 6]; 6] {
    let mut m = [[0.0; 6]; 6];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

/// Reads the per-platform setup entries from the FORCE_PLATFORM group.
pub fn platform_setups(params: &ParameterSection) -> Vec<PlatformSetup> {
    let used = params.first_int("FORCE_PLATFORM", "USED").unwrap_or(0).max(0) as usize;
    if used == 0 {
        return Vec::new();
    }
    let types = params.ints("FORCE_PLATFORM", "TYPE");
    let channels = params.ints("FORCE_PLATFORM", "CHANNEL");
    let corners = params.floats("FORCE_PLATFORM", "CORNERS");
    let origins = params.floats("FORCE_PLATFORM", "ORIGIN");
    let cal = params.floats("FORCE_PLATFORM", "CAL_MATRIX");

    let mut setups = Vec::with_capacity(used);
    for i in 0..used {
        let platform_type = types.get(i).copied().unwrap_or(2);

        let mut channel_idx = [0usize; 6];
        for (r, slot) in channel_idx.iter_mut().enumerate() {
            *slot = channels.get(6 * i + r).copied().unwrap_or(0).max(0) as usize;
        }

        // CORNERS is column-major with dimensions (3, 4, n).
        let corner = |j: usize| -> DVec3 {
            let base = 12 * i + 3 * j;
            DVec3::new(
                corners.get(base).copied().unwrap_or(0.0),
                corners.get(base + 1).copied().unwrap_or(0.0),
                corners.get(base + 2).copied().unwrap_or(0.0),
            )
        };

        let mut origin = DVec3::new(
            origins.get(3 * i).copied().unwrap_or(0.0),
            origins.get(3 * i + 1).copied().unwrap_or(0.0),
            origins.get(3 * i + 2).copied().unwrap_or(0.0),
        );
        if origin.z > 0.0 {
            // The transducer sits below the working surface; a positive z
            // here means the file stored the opposite sign convention.
            warn!(platform = i + 1, "force platform origin z is positive, flipping");
            origin = -origin;
        }

        let mut cal_matrix = identity_6x6();
        if platform_type == 4 && cal.len() >= 36 * (i + 1) {
            // CAL_MATRIX is column-major with dimensions (6, 6, n).
            for c in 0..6 {
                for r in 0..6 {
                    cal_matrix[r][c] = cal[36 * i + 6 * c + r];
                }
            }
        }

        setups.push(PlatformSetup {
            platform_type,
            channels: channel_idx,
            corners: [corner(0), corner(1), corner(2), corner(3)],
            origin,
            cal_matrix,
        });
    }
    setups
}

/// Orthonormal platform frame derived from the corner positions; columns are
/// the platform x, y, z axes expressed in the laboratory frame.
fn reference_frame(corners: &[DVec3; 4]) -> DMat3 {
    let x = corners[0] + corners[3] - corners[1] - corners[2];
    let y_rough = corners[0] + corners[1] - corners[2] - corners[3];
    let z = x.cross(y_rough);
    let y = z.cross(x);
    DMat3::from_cols(x.normalize(), y.normalize(), z.normalize())
}

/// Builds the global-frame sample series for one platform, or `None` when
/// the setup cannot be honored (unsupported type, bad channel assignment).
pub fn build_platform(
    setup: &PlatformSetup,
    analogs: &Analogs,
    point_units: &str,
) -> Option<ForcePlatform> {
    if setup.platform_type != 2 && setup.platform_type != 4 {
        warn!(
            platform_type = setup.platform_type,
            "unsupported force platform type, skipping"
        );
        return None;
    }

    let all = analogs.channels();
    let mut series: Vec<&[f64]> = Vec::with_capacity(6);
    for &idx in &setup.channels {
        if idx == 0 || idx > all.len() {
            warn!(channel = idx, "force platform channel out of range, skipping");
            return None;
        }
        series.push(&all[idx - 1].data);
    }
    let samples = series.iter().map(|s| s.len()).min().unwrap_or(0);

    let rotation = reference_frame(&setup.corners);
    let center = (setup.corners[0] + setup.corners[1] + setup.corners[2] + setup.corners[3]) / 4.0;

    let mut force = Vec::with_capacity(samples);
    let mut moment = Vec::with_capacity(samples);
    let mut cop = Vec::with_capacity(samples);
    let mut free_moment = Vec::with_capacity(samples);

    for t in 0..samples {
        let mut v = [0.0f64; 6];
        if setup.platform_type == 4 {
            for (r, out) in v.iter_mut().enumerate() {
                *out = (0..6).map(|c| setup.cal_matrix[r][c] * series[c][t]).sum();
            }
        } else {
            for (r, out) in v.iter_mut().enumerate() {
                *out = series[r][t];
            }
        }
        let f = DVec3::new(v[0], v[1], v[2]);
        let m = DVec3::new(v[3], v[4], v[5]);

        // Transfer the moment from the transducer origin to the surface center.
        let m_center = m + setup.origin.cross(f);

        let (cop_local, tz) = if f.z.abs() < MIN_VERTICAL_FORCE {
            (DVec3::ZERO, 0.0)
        } else {
            let c = DVec3::new(-m_center.y / f.z, m_center.x / f.z, 0.0);
            (c, m_center.z - c.x * f.y + c.y * f.x)
        };

        force.push(rotation * f);
        moment.push(rotation * m_center);
        cop.push(rotation * cop_local + center);
        free_moment.push(rotation * DVec3::new(0.0, 0.0, tz));
    }

    let fz_channel = &all[setup.channels[2] - 1];
    let mz_channel = &all[setup.channels[5] - 1];
    let unit_force = if fz_channel.units.is_empty() {
        "N".to_string()
    } else {
        fz_channel.units.clone()
    };
    let unit_moment = if mz_channel.units.is_empty() {
        format!("N{point_units}")
    } else {
        mz_channel.units.clone()
    };

    match ForcePlatform::new(
        unit_force,
        unit_moment,
        point_units,
        setup.cal_matrix,
        setup.corners,
        setup.origin,
        force,
        moment,
        cop,
        free_moment,
    ) {
        Ok(fp) => Some(fp),
        Err(e) => {
            warn!(error = %e, "failed to assemble force platform");
            None
        }
    }
}

/// Extracts every usable force platform described in the parameter section.
pub fn extract_platforms(
    params: &ParameterSection,
    analogs: &Analogs,
    point_units: &str,
) -> Vec<ForcePlatform> {
    platform_setups(params)
        .iter()
        .filter_map(|setup| build_platform(setup, analogs, point_units))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AnalogChannel, TimeSeriesInfo};

    fn analogs(values: [f64; 6]) -> Analogs {
        let info = TimeSeriesInfo::new(0, 1, 1000.0).unwrap();
        let channels = ["FX1", "FY1", "FZ1", "MX1", "MY1", "MZ1"]
            .iter()
            .enumerate()
            .map(|(i, label)| AnalogChannel {
                label: label.to_string(),
                units: if i < 3 { "N".into() } else { "Nm".into() },
                description: String::new(),
                scale: 1.0,
                offset: 0.0,
                data: vec![values[i]; 2],
            })
            .collect();
        Analogs::new(info, 1.0, channels)
    }

    fn setup() -> PlatformSetup {
        PlatformSetup {
            platform_type: 2,
            channels: [1, 2, 3, 4, 5, 6],
            corners: [
                DVec3::new(0.2, 0.3, 0.0),
                DVec3::new(-0.2, 0.3, 0.0),
                DVec3::new(-0.2, -0.3, 0.0),
                DVec3::new(0.2, -0.3, 0.0),
            ],
            origin: DVec3::new(0.0, 0.0, -0.05),
            cal_matrix: identity_6x6(),
        }
    }

    #[test]
    fn center_of_pressure_follows_winter() {
        let analogs = analogs([0.0, 0.0, 1000.0, 50.0, -100.0, 10.0]);
        let fp = build_platform(&setup(), &analogs, "m").unwrap();

        // Pure vertical force: the moment transfer adds nothing, so
        // cop = (-My/Fz, Mx/Fz) and the free moment keeps Mz.
        let cop = fp.center_of_pressure()[0];
        assert!((cop.x - 0.1).abs() < 1e-12);
        assert!((cop.y - 0.05).abs() < 1e-12);
        assert!(cop.z.abs() < 1e-12);
        assert_eq!(fp.force()[0], DVec3::new(0.0, 0.0, 1000.0));
        assert!((fp.free_moment()[0].z - 10.0).abs() < 1e-12);
        assert_eq!(fp.unit_force, "N");
        assert_eq!(fp.unit_position, "m");
    }

    #[test]
    fn shear_forces_shift_the_moment_through_the_origin_offset() {
        let analogs = analogs([100.0, 0.0, 1000.0, 0.0, 0.0, 0.0]);
        let fp = build_platform(&setup(), &analogs, "m").unwrap();
        // origin x F = (0,0,-0.05) x (100,0,1000) = (0, -5, 0), so the
        // center of pressure picks up 5/1000 in x.
        let cop = fp.center_of_pressure()[0];
        assert!((cop.x - 0.005).abs() < 1e-12);
        assert!(cop.y.abs() < 1e-12);
    }

    #[test]
    fn unloaded_platform_has_no_cop() {
        let analogs = analogs([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let fp = build_platform(&setup(), &analogs, "m").unwrap();
        assert_eq!(fp.center_of_pressure()[0], DVec3::ZERO);
        assert_eq!(fp.free_moment()[0], DVec3::ZERO);
    }

    #[test]
    fn unsupported_type_and_bad_channels_are_skipped() {
        let analogs = analogs([0.0; 6]);
        let mut s = setup();
        s.platform_type = 3;
        assert!(build_platform(&s, &analogs, "m").is_none());

        let mut s = setup();
        s.channels[5] = 99;
        assert!(build_platform(&s, &analogs, "m").is_none());
    }
}
