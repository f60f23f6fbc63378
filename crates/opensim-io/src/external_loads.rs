//! Force platform export: a ground-reaction .mot file plus the ExternalLoads
//! setup XML that tells OpenSim how to apply it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glam::{DMat3, DVec3};
use tracing::{info, warn};

use core_types::{ForcePlatform, OpenSimOutput, Trial};

use crate::error::OpenSimIoError;
use crate::sto::{write_sto, StoData};
use crate::units::conversion_factor;

/// Options controlling how force platforms are written out.
#[derive(Debug, Clone)]
pub struct ExternalLoadsOptions {
    /// The model body each platform's load is applied to, by platform index.
    /// Platforms without an assignment are skipped.
    pub applied_bodies: Vec<Option<String>>,
    /// The body frame forces are expressed in, normally "ground".
    pub force_expressed_in: String,
    /// The body frame the application point is expressed in.
    pub point_expressed_in: String,
    pub force_units: String,
    pub position_units: String,
    pub moment_units: String,
    /// Rotation into the model's ground frame, shared with the TRC export.
    pub rotation: Option<DMat3>,
}

impl Default for ExternalLoadsOptions {
    fn default() -> Self {
        Self {
            applied_bodies: Vec::new(),
            force_expressed_in: "ground".to_string(),
            point_expressed_in: "ground".to_string(),
            force_units: "N".to_string(),
            position_units: "m".to_string(),
            moment_units: "Nm".to_string(),
            rotation: None,
        }
    }
}

struct PlatformColumns {
    /// Platform number as OpenSim identifiers use it (1-based, original
    /// plate numbering even when earlier plates are skipped).
    number: usize,
    applied_body: String,
    force: Vec<DVec3>,
    point: Vec<DVec3>,
    moment: Vec<DVec3>,
}

/// Writes `<name>_grf.mot` and `<name>_external_loads.xml` into `directory`
/// and records both in the trial's linked files.
///
/// Measured loads are the reaction on the plate, so forces and free moments
/// are negated to become the load applied to the model.
pub fn export_force_platforms(
    trial: &mut Trial,
    directory: impl AsRef<Path>,
    options: &ExternalLoadsOptions,
) -> Result<(), OpenSimIoError> {
    let directory = directory.as_ref();
    if trial.force_platforms.is_empty() {
        return Err(OpenSimIoError::NoForcePlatforms(trial.name.clone()));
    }

    let mut columns = Vec::new();
    for (i, platform) in trial.force_platforms.iter().enumerate() {
        let Some(applied_body) = options.applied_bodies.get(i).cloned().flatten() else {
            warn!(platform = i + 1, "platform has no applied body, skipping");
            continue;
        };
        columns.push(build_columns(platform, i + 1, applied_body, options)?);
    }
    if columns.is_empty() {
        warn!(trial = %trial.name, "no platform had an applied body");
        return Err(OpenSimIoError::NoForcePlatforms(trial.name.clone()));
    }

    let samples = columns[0].force.len();
    let times = trial.analogs.info.time_vector();
    if times.len() != samples {
        warn!(
            analog_frames = times.len(),
            platform_samples = samples,
            "analog timing and platform sample counts differ"
        );
    }

    let mut labels = vec!["time".to_string()];
    for col in &columns {
        let n = col.number;
        for axis in ["x", "y", "z"] {
            labels.push(format!("force{n}_v{axis}"));
        }
        for axis in ["x", "y", "z"] {
            labels.push(format!("force{n}_p{axis}"));
        }
        for axis in ["x", "y", "z"] {
            labels.push(format!("moment{n}_{axis}"));
        }
    }

    let mut rows = Vec::with_capacity(samples);
    for s in 0..samples.min(times.len()) {
        let mut row = Vec::with_capacity(labels.len());
        row.push(times[s]);
        for col in &columns {
            for v in [col.force[s], col.point[s], col.moment[s]] {
                row.extend_from_slice(&[v.x, v.y, v.z]);
            }
        }
        rows.push(row);
    }

    let mot_path = directory.join(format!("{}_grf.mot", trial.name));
    let mut data = StoData::new(format!("{}_grf", trial.name), labels, rows);
    data.metadata.push(("inDegrees".to_string(), "no".to_string()));
    write_sto(&mot_path, &data)?;

    let xml_path = directory.join(format!("{}_external_loads.xml", trial.name));
    write_setup_xml(&xml_path, &mot_path, trial, &columns, options)?;

    trial.link_file(OpenSimOutput::FpMot.link_key(), &mot_path);
    trial.link_file(OpenSimOutput::FpSetup.link_key(), &xml_path);
    Ok(())
}

fn build_columns(
    platform: &ForcePlatform,
    number: usize,
    applied_body: String,
    options: &ExternalLoadsOptions,
) -> Result<PlatformColumns, OpenSimIoError> {
    let force_factor = conversion_factor(&platform.unit_force, &options.force_units)?;
    let point_factor = conversion_factor(&platform.unit_position, &options.position_units)?;
    let moment_factor = conversion_factor(&platform.unit_moment, &options.moment_units)?;
    for (label, factor) in [
        ("force", force_factor),
        ("position", point_factor),
        ("moment", moment_factor),
    ] {
        if factor != 1.0 {
            info!(platform = number, quantity = label, factor, "converting platform units");
        }
    }

    let rotate = |v: DVec3| options.rotation.map_or(v, |r| r * v);
    Ok(PlatformColumns {
        number,
        applied_body,
        force: platform
            .force()
            .iter()
            .map(|&f| rotate(-f * force_factor))
            .collect(),
        point: platform
            .center_of_pressure()
            .iter()
            .map(|&p| rotate(p * point_factor))
            .collect(),
        moment: platform
            .free_moment()
            .iter()
            .map(|&m| rotate(-m * moment_factor))
            .collect(),
    })
}

fn write_setup_xml(
    xml_path: &Path,
    mot_path: &Path,
    trial: &Trial,
    columns: &[PlatformColumns],
    options: &ExternalLoadsOptions,
) -> Result<(), OpenSimIoError> {
    let mot_name = mot_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut out = BufWriter::new(File::create(xml_path)?);
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8" ?>"#)?;
    writeln!(out, r#"<OpenSimDocument Version="40000">"#)?;
    writeln!(out, "\t<ExternalLoads name=\"{}\">", trial.name)?;
    writeln!(out, "\t\t<objects>")?;
    for col in columns {
        let n = col.number;
        writeln!(out, "\t\t\t<ExternalForce name=\"platform{n}\">")?;
        writeln!(
            out,
            "\t\t\t\t<applied_to_body>{}</applied_to_body>",
            col.applied_body
        )?;
        writeln!(
            out,
            "\t\t\t\t<force_expressed_in_body>{}</force_expressed_in_body>",
            options.force_expressed_in
        )?;
        writeln!(
            out,
            "\t\t\t\t<point_expressed_in_body>{}</point_expressed_in_body>",
            options.point_expressed_in
        )?;
        writeln!(out, "\t\t\t\t<force_identifier>force{n}_v</force_identifier>")?;
        writeln!(out, "\t\t\t\t<point_identifier>force{n}_p</point_identifier>")?;
        writeln!(out, "\t\t\t\t<torque_identifier>moment{n}_</torque_identifier>")?;
        writeln!(
            out,
            "\t\t\t\t<data_source_name>{mot_name}</data_source_name>"
        )?;
        writeln!(out, "\t\t\t</ExternalForce>")?;
    }
    writeln!(out, "\t\t</objects>")?;
    writeln!(out, "\t\t<groups />")?;
    writeln!(out, "\t\t<datafile>{mot_name}</datafile>")?;
    writeln!(out, "\t</ExternalLoads>")?;
    writeln!(out, "</OpenSimDocument>")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sto::read_sto;
    use core_types::{
        Analogs, ForcePlatform, ImportMethod, Points, TimeSeriesInfo, Trial, TrialParts,
    };

    fn platform(force_z: f64) -> ForcePlatform {
        let corners = [
            DVec3::new(0.2, 0.3, 0.0),
            DVec3::new(-0.2, 0.3, 0.0),
            DVec3::new(-0.2, -0.3, 0.0),
            DVec3::new(0.2, -0.3, 0.0),
        ];
        ForcePlatform::new(
            "N",
            "Nmm",
            "mm",
            [[0.0; 6]; 6],
            corners,
            DVec3::ZERO,
            vec![DVec3::new(0.0, 0.0, force_z); 2],
            vec![DVec3::ZERO; 2],
            vec![DVec3::new(100.0, 50.0, 0.0); 2],
            vec![DVec3::new(0.0, 0.0, 2000.0); 2],
        )
        .unwrap()
    }

    fn trial_with_platforms() -> Trial {
        let point_info = TimeSeriesInfo::new(1, 1, 100.0).unwrap();
        let analog_info = TimeSeriesInfo::new(2, 3, 200.0).unwrap();
        let points = Points::new(point_info, "mm", Vec::new()).unwrap();
        let analogs = Analogs::new(analog_info, 1.0, Vec::new());
        let mut parts = TrialParts::new("walk01", ImportMethod::C3d, points, analogs);
        parts.force_platforms = vec![platform(800.0), platform(650.0)];
        Trial::assemble(parts)
    }

    #[test]
    fn writes_mot_and_setup_for_assigned_platforms() {
        let dir = tempfile::tempdir().unwrap();
        let mut trial = trial_with_platforms();

        let options = ExternalLoadsOptions {
            applied_bodies: vec![None, Some("calcn_l".to_string())],
            ..Default::default()
        };
        export_force_platforms(&mut trial, dir.path(), &options).unwrap();

        let mot = read_sto(dir.path().join("walk01_grf.mot")).unwrap();
        // Only the second platform survives, keeping its plate number.
        assert_eq!(mot.labels[1], "force2_vx");
        assert_eq!(mot.labels[4], "force2_px");
        assert_eq!(mot.labels[7], "moment2_x");
        assert_eq!(mot.rows.len(), 2);

        // Force negated, cop converted mm to m, free moment negated Nmm to Nm.
        let row = &mot.rows[0];
        assert_eq!(row[3], -650.0);
        assert!((row[4] - 0.1).abs() < 1e-9);
        assert!((row[9] - -2.0).abs() < 1e-9);

        let xml = std::fs::read_to_string(dir.path().join("walk01_external_loads.xml")).unwrap();
        assert!(xml.contains(r#"<OpenSimDocument Version="40000">"#));
        assert!(xml.contains("<applied_to_body>calcn_l</applied_to_body>"));
        assert!(xml.contains("<force_identifier>force2_v</force_identifier>"));
        assert!(xml.contains("<datafile>walk01_grf.mot</datafile>"));
        assert!(!xml.contains("platform1"));

        assert!(trial.linked_file("fp_mot").is_some());
        assert!(trial.linked_file("fp_setup").is_some());
    }

    #[test]
    fn fails_when_nothing_is_assigned() {
        let dir = tempfile::tempdir().unwrap();
        let mut trial = trial_with_platforms();
        let result =
            export_force_platforms(&mut trial, dir.path(), &ExternalLoadsOptions::default());
        assert!(matches!(result, Err(OpenSimIoError::NoForcePlatforms(_))));
    }
}
