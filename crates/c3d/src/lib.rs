//! # Stride C3D Reader
//!
//! A native reader for the C3D motion-capture file format: 512-byte block
//! layout, header, parameter section and the frame-interleaved point/analog
//! data section, including force platform extraction.
//!
//! The entry point is [`C3dLoader`], which turns a file or byte buffer into a
//! fully assembled [`core_types::Trial`]. The lower-level [`header`],
//! [`parameters`] and [`data`] modules expose the raw file structures for
//! callers that need them.

pub mod data;
pub mod error;
pub mod header;
pub mod loader;
pub mod parameters;
pub mod platforms;

// Re-export the key components to create a clean, public-facing API.
pub use data::DataSection;
pub use error::C3dError;
pub use header::C3dHeader;
pub use loader::{C3dFile, C3dLoader};
pub use parameters::{ParamData, Parameter, ParameterSection, Processor};

/// C3D files are organized in fixed-size blocks.
pub const BLOCK_SIZE: usize = 512;

/// Identification byte expected at offset 1 of every C3D file.
pub const C3D_ID_BYTE: u8 = 0x50;
