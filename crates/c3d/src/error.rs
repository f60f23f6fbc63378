use thiserror::Error;

#[derive(Error, Debug)]
pub enum C3dError {
    #[error("File too small to contain a C3D header ({0} bytes)")]
    FileTooSmall(usize),

    #[error("Not a C3D file: identification byte is 0x{0:02X}, expected 0x50")]
    InvalidIdByte(u8),

    #[error("Not a C3D file: {0}")]
    NotAC3dFile(String),

    #[error("Unsupported processor type {0} (only Intel and DEC are supported)")]
    UnsupportedProcessor(u8),

    #[error("Malformed parameter section: {0}")]
    InvalidParameterSection(String),

    #[error("Data section truncated: expected {expected} bytes, found {actual}")]
    TruncatedData { expected: usize, actual: usize },

    #[error(
        "Analog layout is inconsistent: {per_frame} samples per frame into {subframes} subframes"
    )]
    InvalidAnalogLayout { per_frame: usize, subframes: usize },

    #[error(transparent)]
    Core(#[from] core_types::CoreError),

    #[error("Failed to read C3D file: {0}")]
    Io(#[from] std::io::Error),
}
