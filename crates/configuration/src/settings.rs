use serde::Deserialize;

/// The root configuration structure for the entire application.
///
/// Every section has sensible defaults, so a missing or partial
/// `config.toml` is not an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub events: Events,
    #[serde(default)]
    pub markers: Markers,
    #[serde(default)]
    pub export: Export,
}

/// The timing event labels the gait calculations key on.
#[derive(Debug, Clone, Deserialize)]
pub struct Events {
    /// Label of initial contact events (e.g., "Foot Strike").
    #[serde(default = "default_foot_strike")]
    pub foot_strike_label: String,
    /// Label of toe-off events (e.g., "Foot Off").
    #[serde(default = "default_foot_off")]
    pub foot_off_label: String,
}

/// The foot markers used for spatial gait metrics.
#[derive(Debug, Clone, Deserialize)]
pub struct Markers {
    #[serde(default = "default_left_foot")]
    pub left_foot: String,
    #[serde(default = "default_right_foot")]
    pub right_foot: String,
}

/// Parameters for the OpenSim exports.
#[derive(Debug, Clone, Deserialize)]
pub struct Export {
    /// Units marker coordinates are written in, for the TRC export.
    #[serde(default = "default_marker_units")]
    pub marker_units: String,
    /// Units forces are written in, for the ground reaction export.
    #[serde(default = "default_force_units")]
    pub force_units: String,
    /// Units application points are written in.
    #[serde(default = "default_position_units")]
    pub position_units: String,
    /// Units free moments are written in.
    #[serde(default = "default_moment_units")]
    pub moment_units: String,
    /// The model body frame forces are expressed in.
    #[serde(default = "default_ground")]
    pub force_expressed_in: String,
    /// The model body frame application points are expressed in.
    #[serde(default = "default_ground")]
    pub point_expressed_in: String,
    /// The model body each force platform applies its load to, by platform
    /// index. An empty string leaves that platform unassigned.
    #[serde(default)]
    pub applied_bodies: Vec<String>,
    /// Optional row-major rotation from the lab frame into the model's
    /// ground frame, applied to all exported coordinates and vectors.
    #[serde(default)]
    pub rotation: Option<[[f64; 3]; 3]>,
}

fn default_foot_strike() -> String {
    "Foot Strike".to_string()
}

fn default_foot_off() -> String {
    "Foot Off".to_string()
}

fn default_left_foot() -> String {
    "LTOE".to_string()
}

fn default_right_foot() -> String {
    "RTOE".to_string()
}

fn default_marker_units() -> String {
    "mm".to_string()
}

fn default_force_units() -> String {
    "N".to_string()
}

fn default_position_units() -> String {
    "m".to_string()
}

fn default_moment_units() -> String {
    "Nm".to_string()
}

fn default_ground() -> String {
    "ground".to_string()
}

impl Default for Events {
    fn default() -> Self {
        Self {
            foot_strike_label: default_foot_strike(),
            foot_off_label: default_foot_off(),
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            left_foot: default_left_foot(),
            right_foot: default_right_foot(),
        }
    }
}

impl Default for Export {
    fn default() -> Self {
        Self {
            marker_units: default_marker_units(),
            force_units: default_force_units(),
            position_units: default_position_units(),
            moment_units: default_moment_units(),
            force_expressed_in: default_ground(),
            point_expressed_in: default_ground(),
            applied_bodies: Vec::new(),
            rotation: None,
        }
    }
}
