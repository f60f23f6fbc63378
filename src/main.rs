use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use glam::{DMat3, DVec3};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use analytics::{AnalyticsEngine, GaitOptions, SideMetrics};
use c3d::C3dLoader;
use configuration::{load_config, Config};
use core_types::GapRegion;
use opensim_io::{
    export_force_platforms, export_trc, write_id_setup, write_ik_setup, ExternalLoadsOptions,
    ToolOptions, TrcOptions,
};

/// The main entry point for the stride gait-analysis toolkit.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return;
        }
    };

    // Execute the appropriate command
    let result = match cli.command {
        Commands::Scan(args) => handle_scan(args),
        Commands::Info(args) => handle_info(args),
        Commands::Gaps(args) => handle_gaps(args),
        Commands::ExportTrc(args) => handle_export_trc(args, &config),
        Commands::ExportForces(args) => handle_export_forces(args, &config),
        Commands::Setup(args) => handle_setup(args, &config),
        Commands::Report(args) => handle_report(args, &config),
        Commands::Convert(args) => handle_convert(args, &config),
    };
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A toolkit for wrangling motion capture trials into OpenSim workflows.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recursively list the C3D files under a directory.
    Scan(ScanArgs),
    /// Summarize one trial: markers, channels, events and platforms.
    Info(FileArgs),
    /// Report the gap regions in a trial's marker trajectories.
    Gaps(GapsArgs),
    /// Export a trial's markers to an OpenSim TRC file.
    ExportTrc(ExportArgs),
    /// Export a trial's force platforms to a .mot file plus ExternalLoads XML.
    ExportForces(ExportArgs),
    /// Generate IK and ID tool setup files for a trial.
    Setup(SetupArgs),
    /// Compute and print spatiotemporal gait metrics for a trial.
    Report(ReportArgs),
    /// Batch-convert every C3D file under a directory.
    Convert(ConvertArgs),
}

#[derive(Parser)]
struct ScanArgs {
    /// The directory to search.
    directory: PathBuf,
}

#[derive(Parser)]
struct FileArgs {
    /// The C3D file to load.
    file: PathBuf,
}

#[derive(Parser)]
struct ReportArgs {
    /// The C3D file to load.
    file: PathBuf,

    /// Print the full per-cycle report as JSON instead of a summary table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct GapsArgs {
    /// The C3D file to load.
    file: PathBuf,

    /// Only check these markers (defaults to all).
    #[arg(long)]
    marker: Vec<String>,

    /// Only check from this time onwards, in seconds.
    #[arg(long)]
    from_time: Option<f64>,

    /// Only check up to this time, in seconds.
    #[arg(long)]
    to_time: Option<f64>,
}

#[derive(Parser)]
struct ExportArgs {
    /// The C3D file to load.
    file: PathBuf,

    /// The directory exported files are written into.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Parser)]
struct SetupArgs {
    /// The C3D file to load.
    file: PathBuf,

    /// The scaled .osim model the tools run against.
    #[arg(long)]
    model: PathBuf,

    /// The directory setup files and tool results are written into.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Parser)]
struct ConvertArgs {
    /// The directory to search for C3D files.
    directory: PathBuf,

    /// The directory converted files are written into.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// The output format for each trial.
    #[arg(long, value_enum, default_value_t = ConvertFormat::Trc)]
    format: ConvertFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConvertFormat {
    /// OpenSim TRC marker files.
    Trc,
    /// JSON trial snapshots.
    Json,
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Recursively collects every .c3d file under `directory`, sorted by path.
fn scan_c3d_files(directory: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut stack = vec![directory.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("c3d"))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn handle_scan(args: ScanArgs) -> anyhow::Result<()> {
    let files = scan_c3d_files(&args.directory)?;
    for file in &files {
        println!("{}", file.display());
    }
    println!("{} C3D file(s) found", files.len());
    Ok(())
}

fn handle_info(args: FileArgs) -> anyhow::Result<()> {
    let trial = C3dLoader::load_file(&args.file)?;
    let info = trial.points.info;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Trial".to_string(), trial.name.clone()]);
    table.add_row(vec![
        "Session".to_string(),
        trial.session_name.clone().unwrap_or_default(),
    ]);
    table.add_row(vec!["Classification".to_string(), trial.classification.clone()]);
    table.add_row(vec!["Subjects".to_string(), trial.subject_names.join(", ")]);
    if let Some(captured) = trial.captured_at {
        table.add_row(vec!["Captured".to_string(), captured.to_string()]);
    }
    table.add_row(vec![
        "Frames".to_string(),
        format!("{}..{} @ {} Hz", info.first_frame, info.last_frame, info.rate),
    ]);
    table.add_row(vec![
        "Markers".to_string(),
        format!("{} ({})", trial.points.marker_count(), trial.points.units),
    ]);
    table.add_row(vec![
        "Analog channels".to_string(),
        format!("{} @ {} Hz", trial.analogs.channel_count(), trial.analogs.info.rate),
    ]);
    table.add_row(vec![
        "Force platforms".to_string(),
        trial.force_platforms.len().to_string(),
    ]);
    table.add_row(vec!["Events".to_string(), trial.events().len().to_string()]);
    println!("{table}");

    if !trial.events().is_empty() {
        let mut events = Table::new();
        events
            .load_preset(UTF8_FULL)
            .set_header(vec!["Context", "Label", "Time (s)"]);
        for event in trial.events() {
            events.add_row(vec![
                event.context.clone(),
                event.label.clone(),
                format!("{:.3}", event.time(info.rate)),
            ]);
        }
        println!("{events}");
    }
    Ok(())
}

fn handle_gaps(args: GapsArgs) -> anyhow::Result<()> {
    let trial = C3dLoader::load_file(&args.file)?;
    let markers = (!args.marker.is_empty()).then_some(args.marker.as_slice());
    let info = trial.points.info;
    let regions;
    let region_arg = if args.from_time.is_some() || args.to_time.is_some() {
        let start = args.from_time.unwrap_or(0.0);
        let end = args
            .to_time
            .unwrap_or_else(|| info.last_frame as f64 / info.rate);
        regions = [GapRegion::Seconds(start, end)];
        Some(regions.as_slice())
    } else {
        None
    };
    let gaps = trial.check_point_gaps(markers, region_arg);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Marker", "Gap (frames)"]);
    let mut names: Vec<&String> = gaps.keys().collect();
    names.sort();
    for name in names {
        for (start, end) in &gaps[name] {
            table.add_row(vec![name.clone(), format!("{start}..{end}")]);
        }
    }
    if gaps.is_empty() {
        println!("No gaps found");
    } else {
        println!("{table}");
    }
    Ok(())
}

fn trc_options(config: &Config) -> TrcOptions {
    TrcOptions {
        output_units: config.export.marker_units.clone(),
        rotation: rotation_from_config(config),
    }
}

fn handle_export_trc(args: ExportArgs, config: &Config) -> anyhow::Result<()> {
    let mut trial = C3dLoader::load_file(&args.file)?;
    let path = args.out.join(format!("{}.trc", trial.name));
    export_trc(&mut trial, &path, &trc_options(config))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn external_loads_options(config: &Config) -> ExternalLoadsOptions {
    ExternalLoadsOptions {
        applied_bodies: config
            .export
            .applied_bodies
            .iter()
            .map(|body| (!body.is_empty()).then(|| body.clone()))
            .collect(),
        force_expressed_in: config.export.force_expressed_in.clone(),
        point_expressed_in: config.export.point_expressed_in.clone(),
        force_units: config.export.force_units.clone(),
        position_units: config.export.position_units.clone(),
        moment_units: config.export.moment_units.clone(),
        rotation: rotation_from_config(config),
    }
}

fn handle_export_forces(args: ExportArgs, config: &Config) -> anyhow::Result<()> {
    let mut trial = C3dLoader::load_file(&args.file)?;
    export_force_platforms(&mut trial, &args.out, &external_loads_options(config))?;
    println!(
        "Wrote {} and {}",
        trial.linked_file("fp_mot").unwrap_or(Path::new("?")).display(),
        trial.linked_file("fp_setup").unwrap_or(Path::new("?")).display(),
    );
    Ok(())
}

/// Runs the full export chain so the IK and ID setups can reference the
/// TRC and ground reaction files they need.
fn handle_setup(args: SetupArgs, config: &Config) -> anyhow::Result<()> {
    let mut trial = C3dLoader::load_file(&args.file)?;
    let trc_path = args.out.join(format!("{}.trc", trial.name));
    export_trc(&mut trial, trc_path, &trc_options(config))?;
    export_force_platforms(&mut trial, &args.out, &external_loads_options(config))?;

    let options = ToolOptions {
        model_file: args.model.clone(),
        results_directory: args.out.clone(),
        ..Default::default()
    };
    let ik_path = args.out.join(format!("{}_ik_setup.xml", trial.name));
    write_ik_setup(&mut trial, &ik_path, &options)?;
    let id_path = args.out.join(format!("{}_id_setup.xml", trial.name));
    write_id_setup(&mut trial, &id_path, &options)?;

    println!("Wrote {} and {}", ik_path.display(), id_path.display());
    Ok(())
}

fn handle_report(args: ReportArgs, config: &Config) -> anyhow::Result<()> {
    let trial = C3dLoader::load_file(&args.file)?;
    let options = GaitOptions {
        foot_strike_label: config.events.foot_strike_label.clone(),
        foot_off_label: config.events.foot_off_label.clone(),
        left_foot_marker: config.markers.left_foot.clone(),
        right_foot_marker: config.markers.right_foot.clone(),
    };
    let report = AnalyticsEngine::new().calculate(&trial, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Metric", "Left", "Right"]);
    let row = |label: &str, value: fn(&SideMetrics) -> Option<f64>| {
        let cell = |metrics: &SideMetrics| {
            value(metrics).map_or("-".to_string(), |v| format!("{v:.3}"))
        };
        vec![label.to_string(), cell(&report.left), cell(&report.right)]
    };
    table.add_row(vec![
        "Gait cycles".to_string(),
        report.left.cycle_count().to_string(),
        report.right.cycle_count().to_string(),
    ]);
    table.add_row(row("Stride time (s)", SideMetrics::mean_stride_time));
    table.add_row(row("Stride length (m)", SideMetrics::mean_stride_length));
    table.add_row(row("Velocity (m/s)", SideMetrics::mean_stride_velocity));
    table.add_row(row("Cadence (strides/min)", SideMetrics::mean_cadence));
    table.add_row(row("Step time (s)", SideMetrics::mean_step_time));
    table.add_row(row("Stance time (s)", SideMetrics::mean_stance_time));
    table.add_row(row("Stance (%)", SideMetrics::mean_stance_pct));
    println!("{table}");
    Ok(())
}

fn handle_convert(args: ConvertArgs, config: &Config) -> anyhow::Result<()> {
    let files = scan_c3d_files(&args.directory)?;
    if files.is_empty() {
        println!("No C3D files found under {}", args.directory.display());
        return Ok(());
    }
    std::fs::create_dir_all(&args.out)?;

    // Set up the progress bar
    let progress_bar = ProgressBar::new(files.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let mut failures = 0usize;
    for file in &files {
        progress_bar.set_message(format!("Converting {}...", file.display()));
        match convert_one(file, &args.out, args.format, config) {
            Ok(path) => progress_bar.set_message(format!("Wrote {}", path.display())),
            Err(e) => {
                failures += 1;
                progress_bar.suspend(|| eprintln!("Failed on {}: {e:#}", file.display()));
            }
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("Conversion complete");

    if failures > 0 {
        anyhow::bail!("{failures} file(s) failed to convert");
    }
    Ok(())
}

fn convert_one(
    file: &Path,
    out: &Path,
    format: ConvertFormat,
    config: &Config,
) -> anyhow::Result<PathBuf> {
    let mut trial = C3dLoader::load_file(file)?;
    let path = match format {
        ConvertFormat::Trc => {
            let path = out.join(format!("{}.trc", trial.name));
            export_trc(&mut trial, &path, &trc_options(config))?;
            path
        }
        ConvertFormat::Json => {
            let path = out.join(format!("{}.json", trial.name));
            trial.to_json_file(&path)?;
            path
        }
    };
    tracing::info!(trial = %trial.name, output = %path.display(), "converted");
    Ok(path)
}

/// The configured row-major rotation as a column-major matrix.
fn rotation_from_config(config: &Config) -> Option<DMat3> {
    config.export.rotation.map(|rows| {
        DMat3::from_cols(
            DVec3::new(rows[0][0], rows[1][0], rows[2][0]),
            DVec3::new(rows[0][1], rows[1][1], rows[2][1]),
            DVec3::new(rows[0][2], rows[1][2], rows[2][2]),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_is_transposed_into_columns() {
        let config = Config {
            export: configuration::Export {
                rotation: Some([[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]]),
                ..Default::default()
            },
            ..Default::default()
        };
        let m = rotation_from_config(&config).unwrap();
        // Row-major (0,0,-1) second row means y_out = -z_in.
        assert_eq!(m * DVec3::new(0.0, 0.0, 1.0), DVec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn scan_finds_nested_c3d_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("walk01.c3d"), b"").unwrap();
        std::fs::write(nested.join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("static.C3D"), b"").unwrap();

        let files = scan_c3d_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("c3d"))));
    }
}
