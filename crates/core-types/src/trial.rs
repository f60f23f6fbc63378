use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::enums::{ImportMethod, ParamValue};
use crate::error::CoreError;
use crate::events::Event;
use crate::force_platform::ForcePlatform;
use crate::time_series::{Analogs, Points};

/// A region of a trial to inspect for marker gaps, either as absolute frames
/// or as seconds from the start of capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GapRegion {
    Frames(u32, u32),
    Seconds(f64, f64),
}

impl GapRegion {
    fn to_frames(self, rate: f64) -> (u32, u32) {
        match self {
            GapRegion::Frames(start, end) => (start, end),
            GapRegion::Seconds(start, end) => ((start * rate) as u32, (end * rate) as u32),
        }
    }
}

/// The raw pieces of a trial before assembly. Loaders fill this in and hand
/// it to [`Trial::assemble`], which enforces the cross-field invariants.
#[derive(Debug, Clone)]
pub struct TrialParts {
    pub name: String,
    pub session_name: Option<String>,
    pub subject_names: Vec<String>,
    pub classification: String,
    pub trial_type: Option<String>,
    pub import_method: ImportMethod,
    pub captured_at: Option<NaiveDateTime>,
    pub linked_files: HashMap<String, PathBuf>,
    pub parameters: HashMap<String, ParamValue>,
    pub events: Vec<Event>,
    pub points: Points,
    pub analogs: Analogs,
    pub force_platforms: Vec<ForcePlatform>,
}

impl TrialParts {
    pub fn new(
        name: impl Into<String>,
        import_method: ImportMethod,
        points: Points,
        analogs: Analogs,
    ) -> Self {
        Self {
            name: name.into(),
            session_name: None,
            subject_names: Vec::new(),
            classification: String::new(),
            trial_type: None,
            import_method,
            captured_at: None,
            linked_files: HashMap::new(),
            parameters: HashMap::new(),
            events: Vec::new(),
            points,
            analogs,
            force_platforms: Vec::new(),
        }
    }
}

/// The central container for one motion-capture recording: metadata, timing
/// events, marker and analog series, and force platforms.
///
/// Invariants maintained by this type:
/// - events are sorted ascending by frame (time breaks ties),
/// - the marker gap map is computed once at assembly and kept in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub name: String,
    pub session_name: Option<String>,
    pub subject_names: Vec<String>,
    pub classification: String,
    pub trial_type: Option<String>,
    pub import_method: ImportMethod,
    pub captured_at: Option<NaiveDateTime>,
    /// Files associated with this trial (source c3d, exported artifacts, ...),
    /// keyed by artifact name.
    linked_files: HashMap<String, PathBuf>,
    /// Free-form capture parameters preserved from the source file.
    pub parameters: HashMap<String, ParamValue>,
    events: Vec<Event>,
    pub points: Points,
    point_gaps: HashMap<String, Vec<(u32, u32)>>,
    pub analogs: Analogs,
    pub force_platforms: Vec<ForcePlatform>,
}

impl Trial {
    /// Assembles a trial from its parts, sorting events and caching the
    /// marker gap map.
    pub fn assemble(parts: TrialParts) -> Self {
        let mut trial = Self {
            name: parts.name,
            session_name: parts.session_name,
            subject_names: parts.subject_names,
            classification: parts.classification,
            trial_type: parts.trial_type,
            import_method: parts.import_method,
            captured_at: parts.captured_at,
            linked_files: parts.linked_files,
            parameters: parts.parameters,
            events: parts.events,
            points: parts.points,
            point_gaps: HashMap::new(),
            analogs: parts.analogs,
            force_platforms: parts.force_platforms,
        };
        trial.sort_events();
        trial.point_gaps = trial.scan_point_gaps(None, None);
        trial
    }

    fn sort_events(&mut self) {
        let rate = self.points.info.rate;
        self.events.sort_by(|a, b| {
            a.frame(rate)
                .cmp(&b.frame(rate))
                .then_with(|| a.time(rate).total_cmp(&b.time(rate)))
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Adds an event, keeping the list sorted.
    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
        self.sort_events();
    }

    /// Events filtered by label and context. An empty label or context does
    /// not filter by that parameter.
    pub fn events_filtered(&self, label: &str, context: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|event| {
                (label.is_empty() || event.label == label)
                    && (context.is_empty() || event.context == context)
            })
            .collect()
    }

    /// Links a file to this trial by storing its absolute path.
    pub fn link_file(&mut self, key: impl Into<String>, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        self.linked_files.insert(key.into(), absolute);
    }

    /// The path linked under a key, if any.
    pub fn linked_file(&self, key: &str) -> Option<&Path> {
        self.linked_files.get(key).map(PathBuf::as_path)
    }

    pub fn linked_files(&self) -> &HashMap<String, PathBuf> {
        &self.linked_files
    }

    /// The marker gap map cached at assembly time.
    pub fn point_gaps(&self) -> &HashMap<String, Vec<(u32, u32)>> {
        &self.point_gaps
    }

    /// Checks for gaps in point data for the given markers and regions.
    ///
    /// A gap is any frame in the region where a coordinate of the marker is
    /// missing; a flagged region is reported as one `(start, end)` entry. A
    /// marker absent from the trial reports the whole region as a gap. With
    /// no markers or regions given, all markers and the whole capture are
    /// checked, and the cached result is returned when available.
    pub fn check_point_gaps(
        &self,
        marker_names: Option<&[String]>,
        regions: Option<&[GapRegion]>,
    ) -> HashMap<String, Vec<(u32, u32)>> {
        if marker_names.is_none() && regions.is_none() && !self.point_gaps.is_empty() {
            return self.point_gaps.clone();
        }
        self.scan_point_gaps(marker_names, regions)
    }

    fn scan_point_gaps(
        &self,
        marker_names: Option<&[String]>,
        regions: Option<&[GapRegion]>,
    ) -> HashMap<String, Vec<(u32, u32)>> {
        let info = self.points.info;
        let markers: Vec<String> = match marker_names {
            Some(names) => names.to_vec(),
            None => self.points.labels().map(str::to_string).collect(),
        };
        let regions: Vec<GapRegion> = match regions {
            Some(regions) => regions.to_vec(),
            None => vec![GapRegion::Frames(info.first_frame, info.last_frame)],
        };

        let mut gaps: HashMap<String, Vec<(u32, u32)>> = HashMap::new();
        for region in &regions {
            let (start, end) = region.to_frames(info.rate);
            for marker in &markers {
                let Some(trajectory) = self.points.trajectory(marker) else {
                    gaps.entry(marker.clone()).or_default().push((start, end));
                    continue;
                };
                let from = start.max(info.first_frame);
                let to = end.min(info.last_frame);
                let has_gap = (from..=to).any(|frame| {
                    let idx = (frame - info.first_frame) as usize;
                    trajectory.is_missing(idx)
                });
                if has_gap {
                    gaps.entry(marker.clone()).or_default().push((start, end));
                }
            }
        }
        gaps
    }

    /// Absolute frames where every one of the given markers has data. With
    /// no markers given, all markers are required. A marker absent from the
    /// trial yields an empty result.
    pub fn find_full_frames(&self, marker_names: Option<&[String]>) -> Vec<u32> {
        let info = self.points.info;
        let markers: Vec<String> = match marker_names {
            Some(names) => names.to_vec(),
            None => self.points.labels().map(str::to_string).collect(),
        };
        let mut full: Vec<u32> = Vec::new();
        for frame in info.first_frame..=info.last_frame {
            let idx = (frame - info.first_frame) as usize;
            let all_present = markers.iter().all(|marker| {
                self.points
                    .trajectory(marker)
                    .is_some_and(|t| !t.is_missing(idx))
            });
            if all_present {
                full.push(frame);
            }
        }
        // Mirror the "missing marker means no full frames" rule.
        for marker in &markers {
            if self.points.trajectory(marker).is_none() {
                warn!(marker, "marker not found in trial, no full frames");
                return Vec::new();
            }
        }
        full
    }

    /// Stance phases for one side: each pair is (foot strike, foot off).
    pub fn stance_phases(
        &self,
        context: &str,
        foot_strike_label: &str,
        foot_off_label: &str,
    ) -> Vec<(Event, Event)> {
        let mut phases = Vec::new();
        let mut foot_strike: Option<Event> = None;
        for event in &self.events {
            if event.context != context {
                continue;
            }
            if event.label == foot_strike_label {
                foot_strike = Some(event.clone());
            } else if event.label == foot_off_label
                && let Some(strike) = foot_strike.take()
            {
                phases.push((strike, event.clone()));
            }
        }
        phases
    }

    /// Swing phases for one side: each pair is (foot off, next foot strike).
    pub fn swing_phases(
        &self,
        context: &str,
        foot_off_label: &str,
        foot_strike_label: &str,
    ) -> Vec<(Event, Event)> {
        let mut phases = Vec::new();
        let mut foot_off: Option<Event> = None;
        for event in &self.events {
            if event.context != context {
                continue;
            }
            if event.label == foot_off_label {
                foot_off = Some(event.clone());
            } else if event.label == foot_strike_label
                && let Some(off) = foot_off.take()
            {
                phases.push((off, event.clone()));
            }
        }
        phases
    }

    /// Coupled stance and swing phases for one side: each triple is
    /// (foot strike, foot off, next foot strike). Consecutive gait cycles
    /// share their boundary strike.
    pub fn stance_swing_phases(
        &self,
        context: &str,
        foot_strike_label: &str,
        foot_off_label: &str,
    ) -> Vec<(Event, Event, Event)> {
        let mut cycles = Vec::new();
        let mut foot_strike: Option<Event> = None;
        let mut foot_off: Option<Event> = None;
        for event in &self.events {
            if event.context != context {
                continue;
            }
            if event.label == foot_strike_label && foot_strike.is_none() {
                foot_strike = Some(event.clone());
            } else if event.label == foot_off_label && foot_strike.is_some() {
                foot_off = Some(event.clone());
            } else if event.label == foot_strike_label && foot_off.is_some() {
                let strike = foot_strike.take().expect("strike precedes off");
                let off = foot_off.take().expect("checked above");
                cycles.push((strike, off, event.clone()));
                foot_strike = Some(event.clone());
            }
        }
        cycles
    }

    /// Saves the trial as a JSON snapshot.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Loads a trial from a JSON snapshot.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let file = File::open(path)?;
        let trial = serde_json::from_reader(BufReader::new(file))?;
        Ok(trial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_series::{MarkerTrajectory, TimeSeriesInfo};
    use glam::DVec3;

    fn marker(label: &str, n: usize, missing: &[usize]) -> MarkerTrajectory {
        let coords = (0..n)
            .map(|i| {
                if missing.contains(&i) {
                    DVec3::splat(f64::NAN)
                } else {
                    DVec3::new(i as f64 * 10.0, 0.0, 0.0)
                }
            })
            .collect();
        let residuals = (0..n)
            .map(|i| if missing.contains(&i) { -1.0 } else { 0.0 })
            .collect();
        MarkerTrajectory::new(label, coords, residuals)
    }

    fn test_trial(missing: &[usize]) -> Trial {
        let info = TimeSeriesInfo::new(0, 9, 100.0).unwrap();
        let points = Points::new(
            info,
            "mm",
            vec![marker("LTOE", 10, missing), marker("RTOE", 10, &[])],
        )
        .unwrap();
        let analogs = Analogs::new(info, 1.0, Vec::new());
        let mut parts = TrialParts::new("walk01", ImportMethod::C3d, points, analogs);
        parts.events = vec![
            Event::from_time("Foot Off", "Left", 0.06),
            Event::from_time("Foot Strike", "Left", 0.02),
            Event::from_time("Foot Strike", "Left", 0.09),
            Event::from_time("Foot Strike", "Right", 0.04),
        ];
        Trial::assemble(parts)
    }

    #[test]
    fn events_are_sorted_on_assembly() {
        let trial = test_trial(&[]);
        let times: Vec<f64> = trial.events().iter().map(|e| e.time(100.0)).collect();
        assert_eq!(times, vec![0.02, 0.04, 0.06, 0.09]);
    }

    #[test]
    fn events_filtered_by_label_and_context() {
        let trial = test_trial(&[]);
        assert_eq!(trial.events_filtered("Foot Strike", "Left").len(), 2);
        assert_eq!(trial.events_filtered("Foot Strike", "").len(), 3);
        assert_eq!(trial.events_filtered("", "Right").len(), 1);
        assert_eq!(trial.events_filtered("", "").len(), 4);
    }

    #[test]
    fn gap_cache_flags_markers_with_missing_samples() {
        let trial = test_trial(&[4, 5]);
        let gaps = trial.point_gaps();
        assert_eq!(gaps.get("LTOE"), Some(&vec![(0, 9)]));
        assert!(!gaps.contains_key("RTOE"));
    }

    #[test]
    fn gap_scan_honors_regions_and_unknown_markers() {
        let trial = test_trial(&[4]);
        let clean = trial.check_point_gaps(None, Some(&[GapRegion::Frames(6, 9)]));
        assert!(clean.is_empty());

        let in_gap = trial.check_point_gaps(None, Some(&[GapRegion::Seconds(0.03, 0.05)]));
        assert_eq!(in_gap.get("LTOE"), Some(&vec![(3, 5)]));

        let unknown = trial.check_point_gaps(Some(&["HEAD".to_string()]), None);
        assert_eq!(unknown.get("HEAD"), Some(&vec![(0, 9)]));
    }

    #[test]
    fn full_frames_exclude_gaps() {
        let trial = test_trial(&[4, 5]);
        let full = trial.find_full_frames(None);
        assert_eq!(full, vec![0, 1, 2, 3, 6, 7, 8, 9]);
        assert!(trial
            .find_full_frames(Some(&["HEAD".to_string()]))
            .is_empty());
    }

    #[test]
    fn stance_and_swing_phases_pair_up() {
        let trial = test_trial(&[]);
        let stance = trial.stance_phases("Left", "Foot Strike", "Foot Off");
        assert_eq!(stance.len(), 1);
        assert_eq!(stance[0].0.time(100.0), 0.02);
        assert_eq!(stance[0].1.time(100.0), 0.06);

        let swing = trial.swing_phases("Left", "Foot Off", "Foot Strike");
        assert_eq!(swing.len(), 1);
        assert_eq!(swing[0].1.time(100.0), 0.09);

        let cycles = trial.stance_swing_phases("Left", "Foot Strike", "Foot Off");
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn json_snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk01.json");
        let mut trial = test_trial(&[2]);
        trial.link_file("c3d", "walk01.c3d");
        trial.to_json_file(&path).unwrap();
        let loaded = Trial::from_json_file(&path).unwrap();
        assert_eq!(loaded.name, trial.name);
        assert_eq!(loaded.events().len(), 4);
        assert_eq!(loaded.point_gaps(), trial.point_gaps());
        assert!(loaded.linked_file("c3d").is_some());
    }
}
