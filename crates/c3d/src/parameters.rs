//! Parameter section parsing.
//!
//! The parameter section holds named groups (POINT, ANALOG, EVENT, ...) each
//! containing typed, possibly multi-dimensional parameters. Records are
//! chained by signed byte offsets; a negative name length marks a locked
//! entry, a negative id introduces a group and a positive id attaches a
//! parameter to the group with that id.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use crate::error::C3dError;
use crate::{BLOCK_SIZE, C3D_ID_BYTE};

/// The processor family that wrote the file. Numbers are stored in that
/// family's native representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    Intel,
    Dec,
}

impl Processor {
    /// Decodes the processor byte stored at offset 3 of the parameter section.
    pub fn from_byte(byte: u8) -> Result<Self, C3dError> {
        match byte {
            84 => Ok(Processor::Intel),
            85 => Ok(Processor::Dec),
            other => Err(C3dError::UnsupportedProcessor(other)),
        }
    }

    /// Reads a 16-bit signed integer. Intel and DEC both store these
    /// little-endian.
    pub fn read_i16(&self, bytes: &[u8]) -> i16 {
        LittleEndian::read_i16(bytes)
    }

    pub fn read_u16(&self, bytes: &[u8]) -> u16 {
        LittleEndian::read_u16(bytes)
    }

    /// Reads a 32-bit float. DEC F-floats have their 16-bit words swapped
    /// relative to IEEE and an exponent bias two higher, hence the word swap
    /// and divide by four.
    pub fn read_f32(&self, bytes: &[u8]) -> f32 {
        match self {
            Processor::Intel => LittleEndian::read_f32(bytes),
            Processor::Dec => {
                let swapped = [bytes[2], bytes[3], bytes[0], bytes[1]];
                let value = f32::from_le_bytes(swapped);
                if value == 0.0 { 0.0 } else { value / 4.0 }
            }
        }
    }
}

/// The payload of one parameter, already decoded per its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamData {
    /// Character data, split into strings by the first dimension (width).
    Char(Vec<String>),
    Byte(Vec<i8>),
    Integer(Vec<i16>),
    Float(Vec<f32>),
}

/// One named parameter within a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    /// Dimension sizes, fastest-varying first (column-major).
    pub dimensions: Vec<usize>,
    pub data: ParamData,
}

impl Parameter {
    /// All values coerced to f64 (chars yield nothing).
    pub fn as_floats(&self) -> Vec<f64> {
        match &self.data {
            ParamData::Float(v) => v.iter().map(|&x| x as f64).collect(),
            ParamData::Integer(v) => v.iter().map(|&x| x as f64).collect(),
            ParamData::Byte(v) => v.iter().map(|&x| x as f64).collect(),
            ParamData::Char(_) => Vec::new(),
        }
    }

    /// All values coerced to i64 (chars yield nothing, floats are truncated).
    pub fn as_ints(&self) -> Vec<i64> {
        match &self.data {
            ParamData::Float(v) => v.iter().map(|&x| x as i64).collect(),
            ParamData::Integer(v) => v.iter().map(|&x| x as i64).collect(),
            ParamData::Byte(v) => v.iter().map(|&x| x as i64).collect(),
            ParamData::Char(_) => Vec::new(),
        }
    }

    pub fn as_strings(&self) -> Vec<String> {
        match &self.data {
            ParamData::Char(v) => v.clone(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: String,
    pub description: String,
    pub parameters: HashMap<String, Parameter>,
}

/// The decoded parameter section of a C3D file.
#[derive(Debug, Clone)]
pub struct ParameterSection {
    pub processor: Processor,
    groups: HashMap<String, Group>,
}

impl ParameterSection {
    /// Parses the parameter section starting at `offset` within the file.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self, C3dError> {
        if bytes.len() < offset + 4 {
            return Err(C3dError::InvalidParameterSection(
                "section header out of bounds".into(),
            ));
        }
        // Bytes 0-1 are reserved (traditionally 0x01, 0x50), byte 2 is the
        // block count, byte 3 the processor type.
        if bytes[offset + 1] != C3D_ID_BYTE {
            warn!(
                byte = bytes[offset + 1],
                "parameter section id byte is unconventional"
            );
        }
        let processor = Processor::from_byte(bytes[offset + 3])?;

        let mut builders: HashMap<u8, Group> = HashMap::new();
        let mut pending: HashMap<u8, Vec<Parameter>> = HashMap::new();

        let mut pos = offset + 4;
        loop {
            if pos + 2 > bytes.len() {
                break;
            }
            let name_len = bytes[pos] as i8;
            let group_id = bytes[pos + 1] as i8;
            if name_len == 0 || group_id == 0 {
                break;
            }
            let n = name_len.unsigned_abs() as usize;
            let name_end = pos + 2 + n;
            if name_end + 2 > bytes.len() {
                return Err(C3dError::InvalidParameterSection(
                    "record name out of bounds".into(),
                ));
            }
            let name = String::from_utf8_lossy(&bytes[pos + 2..name_end])
                .trim()
                .to_uppercase();
            // Offset to the next record, measured from the first byte of the
            // offset field itself.
            let next_offset = processor.read_i16(&bytes[name_end..name_end + 2]);
            let body = name_end + 2;

            if group_id < 0 {
                let description = read_description(bytes, body);
                let id = group_id.unsigned_abs();
                let group = builders.entry(id).or_default();
                group.name = name;
                group.description = description;
                if let Some(params) = pending.remove(&id) {
                    for param in params {
                        group.parameters.insert(param.name.clone(), param);
                    }
                }
            } else {
                match parse_parameter_body(bytes, body, name, processor) {
                    Ok(param) => {
                        let id = group_id as u8;
                        if let Some(group) = builders.get_mut(&id) {
                            group.parameters.insert(param.name.clone(), param);
                        } else {
                            pending.entry(id).or_default().push(param);
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping malformed parameter record"),
                }
            }

            if next_offset <= 0 {
                break;
            }
            pos = name_end + next_offset as usize;
        }

        for (id, params) in pending {
            warn!(
                group_id = id,
                count = params.len(),
                "parameters reference a group that was never defined"
            );
        }

        let groups = builders
            .into_values()
            .map(|g| (g.name.clone(), g))
            .collect();
        Ok(Self { processor, groups })
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn get(&self, group: &str, name: &str) -> Option<&Parameter> {
        self.groups.get(group)?.parameters.get(name)
    }

    pub fn strings(&self, group: &str, name: &str) -> Vec<String> {
        self.get(group, name).map(Parameter::as_strings).unwrap_or_default()
    }

    pub fn floats(&self, group: &str, name: &str) -> Vec<f64> {
        self.get(group, name).map(Parameter::as_floats).unwrap_or_default()
    }

    pub fn ints(&self, group: &str, name: &str) -> Vec<i64> {
        self.get(group, name).map(Parameter::as_ints).unwrap_or_default()
    }

    pub fn first_float(&self, group: &str, name: &str) -> Option<f64> {
        self.floats(group, name).first().copied()
    }

    pub fn first_int(&self, group: &str, name: &str) -> Option<i64> {
        self.ints(group, name).first().copied()
    }

    pub fn first_string(&self, group: &str, name: &str) -> Option<String> {
        self.strings(group, name).into_iter().next()
    }
}

fn read_description(bytes: &[u8], pos: usize) -> String {
    if pos >= bytes.len() {
        return String::new();
    }
    let len = bytes[pos] as usize;
    let end = (pos + 1 + len).min(bytes.len());
    String::from_utf8_lossy(&bytes[pos + 1..end]).trim().to_string()
}

fn parse_parameter_body(
    bytes: &[u8],
    body: usize,
    name: String,
    processor: Processor,
) -> Result<Parameter, C3dError> {
    let oob = || C3dError::InvalidParameterSection(format!("parameter '{name}' out of bounds"));
    if body + 2 > bytes.len() {
        return Err(oob());
    }
    let elem_size = bytes[body] as i8;
    let n_dims = bytes[body + 1] as usize;
    if n_dims > 7 {
        return Err(C3dError::InvalidParameterSection(format!(
            "parameter '{name}' has {n_dims} dimensions"
        )));
    }
    if body + 2 + n_dims > bytes.len() {
        return Err(oob());
    }
    let dimensions: Vec<usize> = bytes[body + 2..body + 2 + n_dims]
        .iter()
        .map(|&d| d as usize)
        .collect();
    // A dimensionless parameter holds a single scalar (empty product is 1).
    let count: usize = dimensions.iter().product();
    let data_start = body + 2 + n_dims;
    let byte_len = count * elem_size.unsigned_abs() as usize;
    if data_start + byte_len > bytes.len() {
        return Err(oob());
    }
    let raw = &bytes[data_start..data_start + byte_len];

    let data = match elem_size {
        -1 => ParamData::Char(split_strings(raw, &dimensions)),
        1 => ParamData::Byte(raw.iter().map(|&b| b as i8).collect()),
        2 => ParamData::Integer(
            raw.chunks_exact(2).map(|c| processor.read_i16(c)).collect(),
        ),
        4 => ParamData::Float(
            raw.chunks_exact(4).map(|c| processor.read_f32(c)).collect(),
        ),
        other => {
            return Err(C3dError::InvalidParameterSection(format!(
                "parameter '{name}' has element size {other}"
            )));
        }
    };
    let description = read_description(bytes, data_start + byte_len);

    Ok(Parameter {
        name,
        description,
        dimensions,
        data,
    })
}

/// Splits raw character data into strings. The first dimension is the string
/// width; remaining dimensions give the string count. Trailing padding is
/// trimmed.
fn split_strings(raw: &[u8], dimensions: &[usize]) -> Vec<String> {
    let width = dimensions.first().copied().unwrap_or(raw.len()).max(1);
    raw.chunks(width)
        .map(|chunk| String::from_utf8_lossy(chunk).trim_end().to_string())
        .collect()
}

/// Byte offset of the parameter section, from the pointer in header byte 0.
pub fn section_offset(parameter_block: u8) -> usize {
    (parameter_block.max(1) as usize - 1) * BLOCK_SIZE
}
