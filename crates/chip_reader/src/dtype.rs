//! Pixel data types shared by raster sources and chip buffers.
//! Each variant carries a fixed word width; complex variants store two
//! components per pixel and double the width accordingly.

use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Pixel data type of a raster band or chip payload.
///
/// `C16`/`C32` are complex integers with 16/32-bit components; `CF32`/`CF64`
/// are complex floats. The widths follow the GDAL data-type table, which is
/// what every georeferenced backend ultimately reports.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    C16,
    C32,
    CF32,
    CF64,
}

impl PixelType {
    /// Width in bytes of one pixel word. Complex variants count both
    /// components.
    pub fn word_size(self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::U16 | PixelType::I16 => 2,
            PixelType::U32 | PixelType::I32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
            PixelType::C16 => 4,
            PixelType::C32 => 8,
            PixelType::CF32 => 8,
            PixelType::CF64 => 16,
        }
    }

    /// True for the complex variants.
    pub fn is_complex(self) -> bool {
        matches!(
            self,
            PixelType::C16 | PixelType::C32 | PixelType::CF32 | PixelType::CF64
        )
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PixelType::U8 => "u8",
            PixelType::U16 => "u16",
            PixelType::I16 => "i16",
            PixelType::U32 => "u32",
            PixelType::I32 => "i32",
            PixelType::F32 => "f32",
            PixelType::F64 => "f64",
            PixelType::C16 => "c16",
            PixelType::C32 => "c32",
            PixelType::CF32 => "cf32",
            PixelType::CF64 => "cf64",
        };
        write!(f, "{}", s)
    }
}

/// Writes one canonical `f64` sample as a `dtype`-typed word into `out`,
/// which must be exactly `dtype.word_size()` bytes. Real values land in the
/// real component of complex types; the imaginary component is zeroed.
///
/// Caller buffers are plain byte slices with no alignment promise, so every
/// write goes through `to_ne_bytes` copies rather than typed slice casts.
pub(crate) fn write_word(dtype: PixelType, value: f64, out: &mut [u8]) {
    debug_assert_eq!(out.len(), dtype.word_size());
    match dtype {
        PixelType::U8 => out[0] = value as u8,
        PixelType::U16 => out.copy_from_slice(&(value as u16).to_ne_bytes()),
        PixelType::I16 => out.copy_from_slice(&(value as i16).to_ne_bytes()),
        PixelType::U32 => out.copy_from_slice(&(value as u32).to_ne_bytes()),
        PixelType::I32 => out.copy_from_slice(&(value as i32).to_ne_bytes()),
        PixelType::F32 => out.copy_from_slice(&(value as f32).to_ne_bytes()),
        PixelType::F64 => out.copy_from_slice(&value.to_ne_bytes()),
        PixelType::C16 => {
            let c = Complex::new(value as i16, 0);
            out[..2].copy_from_slice(&c.re.to_ne_bytes());
            out[2..].copy_from_slice(&c.im.to_ne_bytes());
        }
        PixelType::C32 => {
            let c = Complex::new(value as i32, 0);
            out[..4].copy_from_slice(&c.re.to_ne_bytes());
            out[4..].copy_from_slice(&c.im.to_ne_bytes());
        }
        PixelType::CF32 => {
            let c = Complex::new(value as f32, 0.0);
            out[..4].copy_from_slice(&c.re.to_ne_bytes());
            out[4..].copy_from_slice(&c.im.to_ne_bytes());
        }
        PixelType::CF64 => {
            let c = Complex::new(value, 0.0);
            out[..8].copy_from_slice(&c.re.to_ne_bytes());
            out[8..].copy_from_slice(&c.im.to_ne_bytes());
        }
    }
}
