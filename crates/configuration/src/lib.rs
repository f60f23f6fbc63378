use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{Config, Events, Export, Markers};

/// Loads the application configuration from the `config.toml` file in the
/// working directory.
///
/// This function is the primary entry point for this crate. The file is
/// optional; a missing file yields the built-in defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from("config.toml")
}

/// Loads the configuration from an explicit path.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref().display().to_string();
    let builder = config::Config::builder()
        .add_source(config::File::with_name(&path).required(false))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("config.toml")).unwrap();
        assert_eq!(config.events.foot_strike_label, "Foot Strike");
        assert_eq!(config.markers.left_foot, "LTOE");
        assert_eq!(config.export.position_units, "m");
        assert!(config.export.rotation.is_none());
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[events]
foot_strike_label = "IC"

[export]
applied_bodies = ["calcn_r", "", "calcn_l"]
rotation = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]]
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.events.foot_strike_label, "IC");
        assert_eq!(config.events.foot_off_label, "Foot Off");
        assert_eq!(config.export.applied_bodies[1], "");
        assert_eq!(config.export.rotation.unwrap()[1], [0.0, 0.0, -1.0]);
    }
}
