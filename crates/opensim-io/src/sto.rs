//! Reading and writing OpenSim storage files (.sto and .mot).
//!
//! Both formats share the same shape: a free-form header of `key=value`
//! lines closed by `endheader`, a tab-separated label row, then numeric
//! rows.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::OpenSimIoError;

/// The contents of one storage file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoData {
    /// The name on the first header line.
    pub name: String,
    /// Header entries in file order. The version and size entries are
    /// managed by the writer and never appear here.
    pub metadata: Vec<(String, String)>,
    pub labels: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl StoData {
    pub fn new(name: impl Into<String>, labels: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            metadata: Vec::new(),
            labels,
            rows,
        }
    }
}

/// Writes a storage file, creating parent directories as needed. The row
/// and column counts are written into the header.
pub fn write_sto(path: impl AsRef<Path>, data: &StoData) -> Result<(), OpenSimIoError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);

    writeln!(out, "{}", data.name)?;
    writeln!(out, "version=1")?;
    writeln!(out, "nRows={}", data.rows.len())?;
    writeln!(out, "nColumns={}", data.labels.len())?;
    for (key, value) in &data.metadata {
        writeln!(out, "{key}={value}")?;
    }
    writeln!(out, "endheader")?;
    writeln!(out, "{}", data.labels.join("\t"))?;
    for row in &data.rows {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:.8}")).collect();
        writeln!(out, "{}", cells.join("\t"))?;
    }
    out.flush()?;
    Ok(())
}

/// Reads a storage file back into memory.
///
/// The header is scanned line by line until `endheader`; anything of the
/// form `key=value` becomes metadata, the first bare line becomes the name.
pub fn read_sto(path: impl AsRef<Path>) -> Result<StoData, OpenSimIoError> {
    let path = path.as_ref();
    let malformed = |reason: &str| OpenSimIoError::MalformedSto {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let mut lines = BufReader::new(File::open(path)?).lines();
    let mut data = StoData::default();
    let mut saw_name = false;
    let mut ended = false;

    for line in lines.by_ref() {
        let line = line?;
        let line = line.trim();
        if line == "endheader" {
            ended = true;
            break;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key {
                "version" | "nRows" | "nColumns" => {}
                _ => data
                    .metadata
                    .push((key.trim().to_string(), value.trim().to_string())),
            }
        } else if !saw_name && !line.is_empty() {
            data.name = line.to_string();
            saw_name = true;
        }
    }
    if !ended {
        return Err(malformed("no endheader line"));
    }

    let label_line = lines
        .next()
        .transpose()?
        .ok_or_else(|| malformed("missing column labels"))?;
    data.labels = label_line
        .split('\t')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Result<Vec<f64>, _> = line
            .split_whitespace()
            .map(|cell| cell.parse::<f64>())
            .collect();
        let row = row.map_err(|e| malformed(&format!("bad numeric cell: {e}")))?;
        if row.len() != data.labels.len() {
            return Err(malformed(&format!(
                "row has {} cells, expected {}",
                row.len(),
                data.labels.len()
            )));
        }
        data.rows.push(row);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_storage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("walk01_id.sto");

        let mut data = StoData::new(
            "walk01_id",
            vec!["time".into(), "ankle_angle_r".into()],
            vec![vec![0.0, 1.5], vec![0.01, 1.75]],
        );
        data.metadata.push(("inDegrees".into(), "yes".into()));

        write_sto(&path, &data).unwrap();
        let back = read_sto(&path).unwrap();
        assert_eq!(back.name, "walk01_id");
        assert_eq!(back.metadata, vec![("inDegrees".to_string(), "yes".to_string())]);
        assert_eq!(back.labels, data.labels);
        assert_eq!(back.rows, data.rows);
    }

    #[test]
    fn rejects_a_file_without_endheader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.sto");
        std::fs::write(&path, "name\nversion=1\n").unwrap();
        assert!(matches!(
            read_sto(&path),
            Err(OpenSimIoError::MalformedSto { .. })
        ));
    }
}
