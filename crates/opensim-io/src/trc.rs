//! Marker trajectory export to the OpenSim TRC format.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glam::DMat3;
use tracing::info;

use core_types::{OpenSimOutput, Trial};

use crate::error::OpenSimIoError;
use crate::units::conversion_factor;

/// Options controlling marker export.
#[derive(Debug, Clone)]
pub struct TrcOptions {
    /// Units the coordinates are written in.
    pub output_units: String,
    /// Rotation applied to every coordinate before writing, for re-expressing
    /// the lab frame in the model's ground frame.
    pub rotation: Option<DMat3>,
}

impl Default for TrcOptions {
    fn default() -> Self {
        Self {
            output_units: "mm".to_string(),
            rotation: None,
        }
    }
}

/// Writes the trial's markers to a TRC file and records the output path in
/// the trial's linked files.
///
/// Occluded samples are written as empty cells, which is how OpenSim marks
/// missing marker data.
pub fn export_trc(
    trial: &mut Trial,
    path: impl AsRef<Path>,
    options: &TrcOptions,
) -> Result<(), OpenSimIoError> {
    let path = path.as_ref();
    if trial.points.marker_count() == 0 {
        return Err(OpenSimIoError::NoMarkerData(trial.name.clone()));
    }
    let info = trial.points.info;
    let factor = conversion_factor(&trial.points.units, &options.output_units)?;
    if factor != 1.0 {
        info!(
            from = %trial.points.units,
            to = %options.output_units,
            factor,
            "converting marker units"
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    writeln!(out, "PathFileType\t4\t(X/Y/Z)\t{file_name}")?;
    writeln!(
        out,
        "DataRate\tCameraRate\tNumFrames\tNumMarkers\tUnits\tOrigDataRate\tOrigDataStartFrame\tOrigNumFrames"
    )?;
    writeln!(
        out,
        "{rate}\t{rate}\t{frames}\t{markers}\t{units}\t{rate}\t{first}\t{frames}",
        rate = info.rate,
        frames = info.total_frames(),
        markers = trial.points.marker_count(),
        units = options.output_units,
        first = info.first_frame,
    )?;

    // Marker names span three columns each; the axis row numbers them.
    let mut name_row = String::from("Frame#\tTime");
    let mut axis_row = String::from("\t");
    for (i, label) in trial.points.labels().enumerate() {
        name_row.push_str(&format!("\t{label}\t\t"));
        axis_row.push_str(&format!("\tX{n}\tY{n}\tZ{n}", n = i + 1));
    }
    writeln!(out, "{name_row}")?;
    writeln!(out, "{axis_row}")?;
    writeln!(out)?;

    let times = info.time_vector();
    for (idx, time) in times.iter().enumerate() {
        let mut row = format!("{}\t{time:.6}", info.first_frame as usize + idx);
        for trajectory in trial.points.trajectories() {
            if trajectory.is_missing(idx) {
                row.push_str("\t\t\t");
            } else {
                let mut c = trajectory.coords[idx];
                if let Some(rotation) = &options.rotation {
                    c = *rotation * c;
                }
                c *= factor;
                row.push_str(&format!("\t{:.6}\t{:.6}\t{:.6}", c.x, c.y, c.z));
            }
        }
        writeln!(out, "{row}")?;
    }
    out.flush()?;

    trial.link_file(OpenSimOutput::Trc.link_key(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{
        Analogs, ImportMethod, MarkerTrajectory, Points, TimeSeriesInfo, Trial, TrialParts,
    };
    use glam::DVec3;

    fn trial_with_markers() -> Trial {
        let info = TimeSeriesInfo::new(1, 3, 100.0).unwrap();
        let ltoe = MarkerTrajectory::new(
            "LTOE",
            vec![
                DVec3::new(100.0, 200.0, 300.0),
                DVec3::new(f64::NAN, f64::NAN, f64::NAN),
                DVec3::new(110.0, 210.0, 310.0),
            ],
            vec![0.5, -1.0, 0.5],
        );
        let points = Points::new(info, "mm", vec![ltoe]).unwrap();
        let analogs = Analogs::new(info, 1.0, Vec::new());
        Trial::assemble(TrialParts::new("walk01", ImportMethod::C3d, points, analogs))
    }

    #[test]
    fn writes_header_rows_and_blank_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk01.trc");
        let mut trial = trial_with_markers();

        let options = TrcOptions {
            output_units: "m".to_string(),
            rotation: None,
        };
        export_trc(&mut trial, &path, &options).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("PathFileType\t4"));
        assert_eq!(lines[2], "100\t100\t3\t1\tm\t100\t1\t3");
        assert!(lines[3].contains("LTOE"));
        assert!(lines[4].contains("X1\tY1\tZ1"));

        // First data row is converted mm to m.
        assert_eq!(lines[6], "1\t0.010000\t0.100000\t0.200000\t0.300000");
        // Occluded frame is blank cells.
        assert_eq!(lines[7], "2\t0.020000\t\t\t");

        assert!(trial.linked_file("trc").is_some());
    }

    #[test]
    fn applies_the_export_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk01.trc");
        let mut trial = trial_with_markers();

        // Lab z-up to OpenSim y-up.
        let rotation = DMat3::from_cols(
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 0.0, -1.0),
            DVec3::new(0.0, 1.0, 0.0),
        );
        let options = TrcOptions {
            output_units: "mm".to_string(),
            rotation: Some(rotation),
        };
        export_trc(&mut trial, &path, &options).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let first_row = text.lines().nth(6).unwrap();
        // (100, 200, 300) with y and z swapped and one sign flip.
        assert_eq!(first_row, "1\t0.010000\t100.000000\t300.000000\t-200.000000");
    }

    #[test]
    fn refuses_a_trial_without_markers() {
        let info = TimeSeriesInfo::new(1, 3, 100.0).unwrap();
        let points = Points::new(info, "mm", Vec::new()).unwrap();
        let analogs = Analogs::new(info, 1.0, Vec::new());
        let mut trial =
            Trial::assemble(TrialParts::new("empty", ImportMethod::C3d, points, analogs));

        let dir = tempfile::tempdir().unwrap();
        let result = export_trc(&mut trial, dir.path().join("empty.trc"), &TrcOptions::default());
        assert!(matches!(result, Err(OpenSimIoError::NoMarkerData(_))));
    }
}
