//! Header block parsing.

use crate::error::C3dError;
use crate::parameters::Processor;
use crate::{BLOCK_SIZE, C3D_ID_BYTE};

/// The fixed 512-byte header block of a C3D file.
///
/// Word layout per the C3D specification (16-bit words, 1-based):
/// word 1 holds the parameter block pointer and the 0x50 id byte, words 2-6
/// the point and frame counts, words 7-8 the point scale factor, word 9 the
/// data start block, word 10 the analog subframe count and words 11-12 the
/// point frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct C3dHeader {
    /// 1-based block number of the parameter section.
    pub parameter_block: u8,
    /// Number of 3D points (markers) per frame.
    pub point_count: u16,
    /// Total analog samples per point frame (channels x subframes).
    pub analog_per_frame: u16,
    pub first_frame: u16,
    pub last_frame: u16,
    /// Maximum interpolation gap, in frames.
    pub max_gap: u16,
    /// Point scale factor; negative means the data section stores floats.
    pub scale_factor: f32,
    /// 1-based block number of the data section.
    pub data_start_block: u16,
    /// Analog samples per point frame for each channel (subframes).
    pub analog_samples_per_frame: u16,
    /// Point frame rate in Hz.
    pub point_rate: f32,
}

impl C3dHeader {
    /// Parses the header block. `processor` must already be known from the
    /// parameter section, since the header's numbers are stored in the
    /// writing machine's native format.
    pub fn parse(bytes: &[u8], processor: Processor) -> Result<Self, C3dError> {
        if bytes.len() < BLOCK_SIZE {
            return Err(C3dError::FileTooSmall(bytes.len()));
        }
        if bytes[1] != C3D_ID_BYTE {
            return Err(C3dError::InvalidIdByte(bytes[1]));
        }
        let word = |i: usize| processor.read_u16(&bytes[2 * (i - 1)..2 * (i - 1) + 2]);
        let float = |i: usize| processor.read_f32(&bytes[2 * (i - 1)..2 * (i - 1) + 4]);

        Ok(Self {
            parameter_block: bytes[0],
            point_count: word(2),
            analog_per_frame: word(3),
            first_frame: word(4),
            last_frame: word(5),
            max_gap: word(6),
            scale_factor: float(7),
            data_start_block: word(9),
            analog_samples_per_frame: word(10),
            point_rate: float(11),
        })
    }

    /// Number of point frames in the data section.
    pub fn frame_count(&self) -> usize {
        if self.last_frame < self.first_frame {
            0
        } else {
            (self.last_frame - self.first_frame) as usize + 1
        }
    }

    /// Number of analog channels, derived from the per-frame totals.
    pub fn analog_channel_count(&self) -> Result<usize, C3dError> {
        let per_frame = self.analog_per_frame as usize;
        let subframes = self.analog_samples_per_frame as usize;
        if per_frame == 0 {
            return Ok(0);
        }
        if subframes == 0 || per_frame % subframes != 0 {
            return Err(C3dError::InvalidAnalogLayout {
                per_frame,
                subframes,
            });
        }
        Ok(per_frame / subframes)
    }

    /// Whether the data section stores floats rather than scaled integers.
    pub fn is_float_data(&self) -> bool {
        self.scale_factor < 0.0
    }
}
