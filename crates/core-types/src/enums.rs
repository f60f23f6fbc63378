use serde::{Deserialize, Serialize};

/// How a trial entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportMethod {
    C3d,
    ViconNexus,
    Custom,
}

/// The OpenSim artifacts a trial can be linked to.
///
/// Each variant maps to a canonical key in `Trial::linked_files`, so that
/// exporters and pipeline steps agree on where results live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenSimOutput {
    ScaledModel,
    MarkerModel,
    Trc,
    IkSetup,
    IkResults,
    IdSetup,
    IdResults,
    FpMot,
    FpSetup,
}

impl OpenSimOutput {
    /// The key under which this artifact is recorded in a trial's linked files.
    pub fn link_key(&self) -> &'static str {
        match self {
            OpenSimOutput::ScaledModel => "scaled_model",
            OpenSimOutput::MarkerModel => "marker_model",
            OpenSimOutput::Trc => "trc",
            OpenSimOutput::IkSetup => "ik_setup",
            OpenSimOutput::IkResults => "ik_results",
            OpenSimOutput::IdSetup => "id_setup",
            OpenSimOutput::IdResults => "id_results",
            OpenSimOutput::FpMot => "fp_mot",
            OpenSimOutput::FpSetup => "fp_setup",
        }
    }
}

/// A free-form trial parameter carried over from the capture file.
///
/// C3D parameter groups such as PROCESSING hold scalars and arrays of mixed
/// type; this enum preserves them without forcing a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Integers(Vec<i64>),
    Floats(Vec<f64>),
    Texts(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_keys_are_stable() {
        assert_eq!(OpenSimOutput::Trc.link_key(), "trc");
        assert_eq!(OpenSimOutput::FpSetup.link_key(), "fp_setup");
        assert_eq!(OpenSimOutput::IkResults.link_key(), "ik_results");
    }
}
