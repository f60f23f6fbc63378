//! Setup XML generation for the OpenSim inverse kinematics and inverse
//! dynamics tools.
//!
//! The files are written for the user (or a pipeline runner) to execute with
//! `opensim-cmd run-tool`; nothing here shells out to OpenSim.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use core_types::{OpenSimOutput, Trial};

use crate::error::OpenSimIoError;

/// Options shared by both tool setups.
#[derive(Debug, Clone)]
pub struct ToolOptions {
    /// The scaled .osim model the tool runs against.
    pub model_file: PathBuf,
    /// Directory the tool writes its results into.
    pub results_directory: PathBuf,
    /// Analysis window in seconds. Defaults to the full trial.
    pub time_range: Option<(f64, f64)>,
    /// Lowpass filter cutoff applied to coordinates by the ID tool, in Hz.
    /// Negative disables filtering.
    pub lowpass_cutoff: f64,
    /// Force set entries excluded from inverse dynamics.
    pub forces_to_exclude: Vec<String>,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            model_file: PathBuf::new(),
            results_directory: PathBuf::from("."),
            time_range: None,
            lowpass_cutoff: 6.0,
            forces_to_exclude: vec!["Muscles".to_string()],
        }
    }
}

fn trial_time_range(trial: &Trial, options: &ToolOptions) -> Result<(f64, f64), OpenSimIoError> {
    if let Some(range) = options.time_range {
        return Ok(range);
    }
    let info = trial.points.info;
    Ok((
        info.time_from_frame(info.first_frame)?,
        info.time_from_frame(info.last_frame)?,
    ))
}

fn linked(trial: &Trial, output: OpenSimOutput) -> Result<&Path, OpenSimIoError> {
    trial
        .linked_file(output.link_key())
        .ok_or_else(|| OpenSimIoError::MissingLinkedFile {
            trial: trial.name.clone(),
            key: output.link_key().to_string(),
        })
}

/// Writes an InverseKinematicsTool setup file for the trial.
///
/// Requires a prior TRC export; the setup points the tool at that file and
/// the expected `<name>_ik.mot` output is linked on the trial.
pub fn write_ik_setup(
    trial: &mut Trial,
    path: impl AsRef<Path>,
    options: &ToolOptions,
) -> Result<(), OpenSimIoError> {
    let path = path.as_ref();
    let marker_file = linked(trial, OpenSimOutput::Trc)?.to_path_buf();
    let (t0, t1) = trial_time_range(trial, options)?;
    let output_motion = options
        .results_directory
        .join(format!("{}_ik.mot", trial.name));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8" ?>"#)?;
    writeln!(out, r#"<OpenSimDocument Version="40000">"#)?;
    writeln!(out, "\t<InverseKinematicsTool name=\"{}\">", trial.name)?;
    writeln!(
        out,
        "\t\t<results_directory>{}</results_directory>",
        options.results_directory.display()
    )?;
    writeln!(
        out,
        "\t\t<model_file>{}</model_file>",
        options.model_file.display()
    )?;
    writeln!(out, "\t\t<time_range>{t0} {t1}</time_range>")?;
    writeln!(
        out,
        "\t\t<marker_file>{}</marker_file>",
        marker_file.display()
    )?;
    writeln!(
        out,
        "\t\t<output_motion_file>{}</output_motion_file>",
        output_motion.display()
    )?;
    writeln!(out, "\t</InverseKinematicsTool>")?;
    writeln!(out, "</OpenSimDocument>")?;
    out.flush()?;

    trial.link_file(OpenSimOutput::IkSetup.link_key(), path);
    trial.link_file(OpenSimOutput::IkResults.link_key(), &output_motion);
    Ok(())
}

/// Writes an InverseDynamicsTool setup file for the trial.
///
/// Requires prior IK and force platform exports: the coordinates come from
/// the linked IK results and the loads from the linked ExternalLoads setup.
pub fn write_id_setup(
    trial: &mut Trial,
    path: impl AsRef<Path>,
    options: &ToolOptions,
) -> Result<(), OpenSimIoError> {
    let path = path.as_ref();
    let coordinates = linked(trial, OpenSimOutput::IkResults)?.to_path_buf();
    let external_loads = linked(trial, OpenSimOutput::FpSetup)?.to_path_buf();
    let (t0, t1) = trial_time_range(trial, options)?;
    let output = format!("{}_id.sto", trial.name);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8" ?>"#)?;
    writeln!(out, r#"<OpenSimDocument Version="40000">"#)?;
    writeln!(out, "\t<InverseDynamicsTool name=\"{}\">", trial.name)?;
    writeln!(
        out,
        "\t\t<results_directory>{}</results_directory>",
        options.results_directory.display()
    )?;
    writeln!(
        out,
        "\t\t<model_file>{}</model_file>",
        options.model_file.display()
    )?;
    writeln!(out, "\t\t<time_range>{t0} {t1}</time_range>")?;
    writeln!(
        out,
        "\t\t<forces_to_exclude>{}</forces_to_exclude>",
        options.forces_to_exclude.join(" ")
    )?;
    writeln!(
        out,
        "\t\t<external_loads_file>{}</external_loads_file>",
        external_loads.display()
    )?;
    writeln!(
        out,
        "\t\t<coordinates_file>{}</coordinates_file>",
        coordinates.display()
    )?;
    writeln!(
        out,
        "\t\t<lowpass_cutoff_frequency_for_coordinates>{}</lowpass_cutoff_frequency_for_coordinates>",
        options.lowpass_cutoff
    )?;
    writeln!(
        out,
        "\t\t<output_gen_force_file>{output}</output_gen_force_file>"
    )?;
    writeln!(out, "\t</InverseDynamicsTool>")?;
    writeln!(out, "</OpenSimDocument>")?;
    out.flush()?;

    trial.link_file(OpenSimOutput::IdSetup.link_key(), path);
    trial.link_file(
        OpenSimOutput::IdResults.link_key(),
        options.results_directory.join(output),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Analogs, ImportMethod, Points, TimeSeriesInfo, Trial, TrialParts};

    fn trial() -> Trial {
        let info = TimeSeriesInfo::new(1, 100, 100.0).unwrap();
        let points = Points::new(info, "mm", Vec::new()).unwrap();
        let analogs = Analogs::new(info, 1.0, Vec::new());
        Trial::assemble(TrialParts::new("walk01", ImportMethod::C3d, points, analogs))
    }

    #[test]
    fn ik_setup_uses_the_linked_trc_and_trial_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut trial = trial();
        trial.link_file("trc", dir.path().join("walk01.trc"));

        let options = ToolOptions {
            model_file: PathBuf::from("subject.osim"),
            results_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let setup = dir.path().join("walk01_ik_setup.xml");
        write_ik_setup(&mut trial, &setup, &options).unwrap();

        let xml = std::fs::read_to_string(&setup).unwrap();
        assert!(xml.contains("<model_file>subject.osim</model_file>"));
        assert!(xml.contains("<time_range>0.01 1</time_range>"));
        assert!(xml.contains("walk01.trc</marker_file>"));
        assert!(xml.contains("walk01_ik.mot</output_motion_file>"));

        assert!(trial.linked_file("ik_setup").is_some());
        assert!(trial
            .linked_file("ik_results")
            .is_some_and(|p| p.ends_with("walk01_ik.mot")));
    }

    #[test]
    fn id_setup_requires_ik_results_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut trial = trial();

        let result = write_id_setup(
            &mut trial,
            dir.path().join("walk01_id_setup.xml"),
            &ToolOptions::default(),
        );
        assert!(matches!(
            result,
            Err(OpenSimIoError::MissingLinkedFile { .. })
        ));

        trial.link_file("ik_results", dir.path().join("walk01_ik.mot"));
        trial.link_file("fp_setup", dir.path().join("walk01_external_loads.xml"));
        let setup = dir.path().join("walk01_id_setup.xml");
        write_id_setup(&mut trial, &setup, &ToolOptions::default()).unwrap();

        let xml = std::fs::read_to_string(&setup).unwrap();
        assert!(xml.contains("<forces_to_exclude>Muscles</forces_to_exclude>"));
        assert!(xml.contains("walk01_external_loads.xml</external_loads_file>"));
        assert!(xml.contains("<output_gen_force_file>walk01_id.sto</output_gen_force_file>"));
        assert!(xml.contains("<lowpass_cutoff_frequency_for_coordinates>6</lowpass_cutoff_frequency_for_coordinates>"));
        assert!(trial.linked_file("id_results").is_some());
    }
}
