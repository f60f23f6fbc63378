//! Reading Vicon Eclipse .enf metadata files.

use std::collections::HashMap;
use std::path::Path;

use crate::error::OpenSimIoError;

/// Parses an .enf file into a map of lowercased keys to values.
///
/// These files are usually UTF-8 but older Eclipse versions wrote Latin-1,
/// so undecodable bytes fall back to a Latin-1 interpretation.
pub fn parse_enf(path: impl AsRef<Path>) -> Result<HashMap<String, String>, OpenSimIoError> {
    let bytes = std::fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.as_bytes().iter().map(|&b| b as char).collect(),
    };

    let mut entries = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            entries.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    Ok(entries)
}
