use tracing::warn;

use core_types::{Side, TimeSeriesInfo, Trial};

use crate::error::AnalyticsError;
use crate::report::{SideMetrics, SpatiotemporalReport};

/// Event labels and foot markers the gait calculations key on.
///
/// The defaults match Vicon Nexus conventions; capture pipelines with other
/// labelling schemes override them from configuration.
#[derive(Debug, Clone)]
pub struct GaitOptions {
    pub foot_strike_label: String,
    pub foot_off_label: String,
    pub left_foot_marker: String,
    pub right_foot_marker: String,
}

impl Default for GaitOptions {
    fn default() -> Self {
        Self {
            foot_strike_label: "Foot Strike".to_string(),
            foot_off_label: "Foot Off".to_string(),
            left_foot_marker: "LTOE".to_string(),
            right_foot_marker: "RTOE".to_string(),
        }
    }
}

/// A stateless calculator for deriving spatiotemporal gait metrics from a
/// trial's events and marker data.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating spatiotemporal metrics.
    ///
    /// Each side is computed independently: a side without enough events
    /// yields empty metrics with a warning rather than failing the whole
    /// report.
    pub fn calculate(
        &self,
        trial: &Trial,
        options: &GaitOptions,
    ) -> Result<SpatiotemporalReport, AnalyticsError> {
        let mut report = SpatiotemporalReport {
            trial_name: trial.name.clone(),
            ..Default::default()
        };
        for side in [Side::Left, Side::Right] {
            *report.side_mut(side) = self.side_metrics(trial, side, options)?;
        }
        Ok(report)
    }

    fn side_metrics(
        &self,
        trial: &Trial,
        side: Side,
        options: &GaitOptions,
    ) -> Result<SideMetrics, AnalyticsError> {
        let rate = trial.points.info.rate;
        let mut metrics = SideMetrics::default();

        let strikes: Vec<f64> = trial
            .events_filtered(&options.foot_strike_label, side.context())
            .iter()
            .map(|e| e.time(rate))
            .collect();

        self.stride_metrics(trial, side, options, &strikes, &mut metrics);
        self.step_times(trial, side, options, &strikes, &mut metrics);
        self.stance_metrics(trial, side, options, rate, &mut metrics);
        Ok(metrics)
    }

    /// Stride time, length, velocity and cadence from consecutive
    /// ipsilateral foot strikes.
    fn stride_metrics(
        &self,
        trial: &Trial,
        side: Side,
        options: &GaitOptions,
        strikes: &[f64],
        metrics: &mut SideMetrics,
    ) {
        if strikes.len() < 2 {
            warn!(
                context = side.context(),
                label = %options.foot_strike_label,
                count = strikes.len(),
                "need at least two foot strikes for stride metrics"
            );
            return;
        }

        let marker_label = match side {
            Side::Left => &options.left_foot_marker,
            Side::Right => &options.right_foot_marker,
        };
        let trajectory = trial.points.trajectory(marker_label);
        if trajectory.is_none() {
            warn!(marker = %marker_label, "foot marker not found, skipping stride lengths");
        }
        let to_m = length_to_meters(&trial.points.units);
        let info = trial.points.info;

        for pair in strikes.windows(2) {
            let dt = pair[1] - pair[0];
            if dt <= 0.0 {
                warn!(context = side.context(), "non-positive stride time, skipping cycle");
                continue;
            }
            metrics.stride_times.push(dt);
            metrics.cadences.push(60.0 / dt);

            if let Some(trajectory) = trajectory
                && let Some(i0) = index_at_time(&info, pair[0])
                && let Some(i1) = index_at_time(&info, pair[1])
                && !trajectory.is_missing(i0)
                && !trajectory.is_missing(i1)
            {
                let length = (trajectory.coords[i1] - trajectory.coords[i0]).length() * to_m;
                metrics.stride_lengths.push(length);
                metrics.stride_velocities.push(length / dt);
            }
        }
    }

    /// Step time: from the preceding contralateral foot strike to each
    /// ipsilateral one.
    fn step_times(
        &self,
        trial: &Trial,
        side: Side,
        options: &GaitOptions,
        strikes: &[f64],
        metrics: &mut SideMetrics,
    ) {
        let rate = trial.points.info.rate;
        let opposite: Vec<f64> = trial
            .events_filtered(&options.foot_strike_label, side.opposite().context())
            .iter()
            .map(|e| e.time(rate))
            .collect();

        for &strike in strikes {
            let preceding = opposite
                .iter()
                .filter(|&&t| t < strike)
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max);
            if preceding.is_finite() {
                metrics.step_times.push(strike - preceding);
            }
        }
    }

    fn stance_metrics(
        &self,
        trial: &Trial,
        side: Side,
        options: &GaitOptions,
        rate: f64,
        metrics: &mut SideMetrics,
    ) {
        for (strike, off) in trial.stance_phases(
            side.context(),
            &options.foot_strike_label,
            &options.foot_off_label,
        ) {
            let stance = off.time(rate) - strike.time(rate);
            if stance > 0.0 {
                metrics.stance_times.push(stance);
            }
        }
        for (strike, off, next) in trial.stance_swing_phases(
            side.context(),
            &options.foot_strike_label,
            &options.foot_off_label,
        ) {
            let stance = off.time(rate) - strike.time(rate);
            let cycle = next.time(rate) - strike.time(rate);
            if stance > 0.0 && cycle > 0.0 {
                metrics.stance_pct.push(stance / cycle * 100.0);
            }
        }
    }
}

/// Index of the sample closest to `time`, when inside the recorded window.
fn index_at_time(info: &TimeSeriesInfo, time: f64) -> Option<usize> {
    let frame = (time * info.rate).round() as i64;
    if frame < info.first_frame as i64 || frame > info.last_frame as i64 {
        return None;
    }
    Some((frame - info.first_frame as i64) as usize)
}

/// Factor converting the trial's length units to meters. Unknown units are
/// reported unconverted with a warning.
fn length_to_meters(units: &str) -> f64 {
    match units {
        "m" => 1.0,
        "cm" => 0.01,
        "mm" => 0.001,
        other => {
            warn!(units = %other, "unknown length units, reporting lengths unconverted");
            1.0
        }
    }
}
