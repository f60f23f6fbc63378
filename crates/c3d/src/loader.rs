//! Turns parsed C3D structures into assembled [`Trial`]s.

use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use core_types::{
    AnalogChannel, Analogs, Event, ImportMethod, MarkerTrajectory, ParamValue, Points,
    TimeSeriesInfo, Trial, TrialParts,
};

use crate::data::DataSection;
use crate::error::C3dError;
use crate::header::C3dHeader;
use crate::parameters::{section_offset, ParamData, ParameterSection};
use crate::platforms::extract_platforms;

/// A fully parsed C3D file, before mapping to the domain model.
#[derive(Debug, Clone)]
pub struct C3dFile {
    pub header: C3dHeader,
    pub parameters: ParameterSection,
    pub data: DataSection,
}

impl C3dFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, C3dError> {
        if bytes.len() < crate::BLOCK_SIZE {
            return Err(C3dError::FileTooSmall(bytes.len()));
        }
        // The processor type lives in the parameter section, and the header's
        // numbers are stored in that processor's format, so the parameter
        // section is decoded first.
        let parameters = ParameterSection::parse(bytes, section_offset(bytes[0]))?;
        let header = C3dHeader::parse(bytes, parameters.processor)?;
        let data = DataSection::parse(bytes, &header, parameters.processor)?;
        Ok(Self {
            header,
            parameters,
            data,
        })
    }
}

/// Handles loading trial data from C3D files.
pub struct C3dLoader;

impl C3dLoader {
    /// Loads a trial from a C3D file on disk.
    ///
    /// The trial name is the file stem, the session name the containing
    /// directory, and the classification the directory three levels up,
    /// following the standard `classification/subject/session/trial.c3d`
    /// layout. The source path is recorded in the trial's linked files.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Trial, C3dError> {
        let path = path.as_ref();
        let is_c3d = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("c3d"));
        if !is_c3d {
            return Err(C3dError::NotAC3dFile(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir_name = |levels: usize| -> Option<String> {
            let mut dir = path.parent()?;
            for _ in 1..levels {
                dir = dir.parent()?;
            }
            dir.file_name().map(|s| s.to_string_lossy().into_owned())
        };
        let session = dir_name(1);
        let classification = dir_name(3).unwrap_or_default();

        let mut trial = Self::from_bytes(&bytes, &name, session.as_deref(), &classification)?;
        trial.link_file("c3d", path);
        Ok(trial)
    }

    /// Builds a trial from an in-memory C3D image.
    pub fn from_bytes(
        bytes: &[u8],
        name: &str,
        session_name: Option<&str>,
        classification: &str,
    ) -> Result<Trial, C3dError> {
        let file = C3dFile::parse(bytes)?;
        let header = &file.header;
        let params = &file.parameters;

        let point_rate = header.point_rate as f64;
        if let Some(param_rate) = params.first_float("POINT", "RATE")
            && (param_rate - point_rate).abs() > f64::EPSILON
        {
            warn!(param_rate, header_rate = point_rate, "POINT:RATE does not match header");
        }
        if let Some(camera_rate) = params.first_float("TRIAL", "CAMERA_RATE")
            && (camera_rate - point_rate).abs() > f64::EPSILON
        {
            warn!(camera_rate, header_rate = point_rate, "TRIAL:CAMERA_RATE does not match header");
        }

        let point_info = TimeSeriesInfo::new(
            header.first_frame as u32,
            header.last_frame as u32,
            point_rate,
        )?;
        let point_units = params
            .first_string("POINT", "UNITS")
            .unwrap_or_else(|| "mm".to_string());

        let points = build_points(&file, point_info, &point_units)?;
        let analogs = build_analogs(&file, point_info)?;
        let force_platforms = extract_platforms(params, &analogs, &point_units);
        let events = read_events(params);

        let subject_names = params.strings("SUBJECTS", "NAMES");
        debug!(
            markers = points.marker_count(),
            channels = analogs.channel_count(),
            events = events.len(),
            platforms = force_platforms.len(),
            "parsed c3d"
        );

        let mut parts = TrialParts::new(name, ImportMethod::C3d, points, analogs);
        parts.session_name = session_name.map(str::to_string);
        parts.classification = classification.to_string();
        parts.subject_names = subject_names;
        parts.captured_at = read_capture_datetime(params);
        parts.parameters = read_processing(params);
        parts.events = events;
        parts.force_platforms = force_platforms;
        Ok(Trial::assemble(parts))
    }
}

fn build_points(
    file: &C3dFile,
    info: TimeSeriesInfo,
    units: &str,
) -> Result<Points, C3dError> {
    let labels = file.parameters.strings("POINT", "LABELS");
    let descriptions = file.parameters.strings("POINT", "DESCRIPTIONS");
    let count = file.header.point_count as usize;

    let mut trajectories = Vec::with_capacity(count);
    for i in 0..count {
        let label = labels
            .get(i)
            .filter(|l| !l.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("point_{}", i + 1));
        let mut trajectory = MarkerTrajectory::new(
            label,
            file.data.point_coords[i].clone(),
            file.data.point_residuals[i].clone(),
        );
        trajectory.description = descriptions.get(i).cloned().unwrap_or_default();
        trajectories.push(trajectory);
    }
    Ok(Points::new(info, units, trajectories)?)
}

fn build_analogs(file: &C3dFile, point_info: TimeSeriesInfo) -> Result<Analogs, C3dError> {
    let header = &file.header;
    let params = &file.parameters;
    let channel_count = header.analog_channel_count()?;
    let subframes = header.analog_samples_per_frame.max(1) as u32;

    if channel_count == 0 {
        // No analog data: carry the point timing so downstream consumers
        // still have a valid frame of reference.
        return Ok(Analogs::new(point_info, 1.0, Vec::new()));
    }

    let rate = point_info.rate * subframes as f64;
    if let Some(param_rate) = params.first_float("ANALOG", "RATE")
        && (param_rate - rate).abs() > f64::EPSILON
    {
        warn!(param_rate, derived_rate = rate, "ANALOG:RATE does not match header");
    }
    let info = TimeSeriesInfo::new(
        point_info.first_frame * subframes,
        point_info.last_frame * subframes + (subframes - 1),
        rate,
    )?;

    let labels = params.strings("ANALOG", "LABELS");
    let units = params.strings("ANALOG", "UNITS");
    let descriptions = params.strings("ANALOG", "DESCRIPTIONS");
    let scales = params.floats("ANALOG", "SCALE");
    let offsets = params.floats("ANALOG", "OFFSET");
    let gen_scale = params.first_float("ANALOG", "GEN_SCALE").unwrap_or(1.0);

    let mut channels = Vec::with_capacity(channel_count);
    for i in 0..channel_count {
        let scale = scales.get(i).copied().unwrap_or(1.0);
        let offset = offsets.get(i).copied().unwrap_or(0.0);
        let data = file.data.analog_raw[i]
            .iter()
            .map(|&raw| (raw - offset) * scale * gen_scale)
            .collect();
        channels.push(AnalogChannel {
            label: labels
                .get(i)
                .filter(|l| !l.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("analog_{}", i + 1)),
            units: units.get(i).cloned().unwrap_or_default(),
            description: descriptions.get(i).cloned().unwrap_or_default(),
            scale,
            offset,
            data,
        });
    }
    Ok(Analogs::new(info, gen_scale, channels))
}

/// Reads the EVENT group. Event times are stored split into minutes and
/// seconds, column-major with dimensions (2, n).
fn read_events(params: &ParameterSection) -> Vec<Event> {
    let used = params.first_int("EVENT", "USED").unwrap_or(0).max(0) as usize;
    if used == 0 {
        return Vec::new();
    }
    let labels = params.strings("EVENT", "LABELS");
    let contexts = params.strings("EVENT", "CONTEXTS");
    let descriptions = params.strings("EVENT", "DESCRIPTIONS");
    let times = params.floats("EVENT", "TIMES");

    let mut events = Vec::with_capacity(used);
    for i in 0..used {
        let minutes = times.get(2 * i).copied().unwrap_or(0.0);
        let seconds = times.get(2 * i + 1).copied().unwrap_or(0.0);
        let mut event = Event::from_time(
            labels.get(i).cloned().unwrap_or_default(),
            contexts.get(i).cloned().unwrap_or_default(),
            minutes * 60.0 + seconds,
        );
        event.description = descriptions.get(i).filter(|d| !d.is_empty()).cloned();
        events.push(event);
    }
    events
}

/// Reads TRIAL:DATE and TRIAL:TIME into a capture timestamp, when present.
fn read_capture_datetime(params: &ParameterSection) -> Option<NaiveDateTime> {
    let date = params.ints("TRIAL", "DATE");
    if date.len() < 3 {
        return None;
    }
    // Some writers store (year, month, day), others (day, month, year).
    let (y, m, d) = if date[0] > 1900 {
        (date[0], date[1], date[2])
    } else {
        (date[2], date[1], date[0])
    };
    let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)?;

    let time = params.ints("TRIAL", "TIME");
    let time = if time.len() >= 3 {
        NaiveTime::from_hms_opt(time[0] as u32, time[1] as u32, time[2] as u32)
            .unwrap_or_default()
    } else {
        NaiveTime::default()
    };
    Some(date.and_time(time))
}

/// Preserves the PROCESSING group as free-form trial parameters, collapsing
/// single-element arrays to scalars.
fn read_processing(params: &ParameterSection) -> HashMap<String, ParamValue> {
    let Some(group) = params.group("PROCESSING") else {
        return HashMap::new();
    };
    group
        .parameters
        .values()
        .map(|param| {
            let value = match &param.data {
                ParamData::Float(v) if v.len() == 1 => ParamValue::Float(v[0] as f64),
                ParamData::Float(v) => {
                    ParamValue::Floats(v.iter().map(|&x| x as f64).collect())
                }
                ParamData::Integer(v) if v.len() == 1 => ParamValue::Integer(v[0] as i64),
                ParamData::Integer(v) => {
                    ParamValue::Integers(v.iter().map(|&x| x as i64).collect())
                }
                ParamData::Byte(v) if v.len() == 1 => ParamValue::Integer(v[0] as i64),
                ParamData::Byte(v) => {
                    ParamValue::Integers(v.iter().map(|&x| x as i64).collect())
                }
                ParamData::Char(v) if v.len() == 1 => ParamValue::Text(v[0].clone()),
                ParamData::Char(v) => ParamValue::Texts(v.clone()),
            };
            (param.name.clone(), value)
        })
        .collect()
}
