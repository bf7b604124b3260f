//! The reciprocal writer: lays out and links IFDs on disk and threads the next-IFD chain (§4.6,
//! §4.7). A value written through [`DirectoryEncoder::write_tag`] carries whatever on-disk
//! [`Type`] its Rust type maps to (`u16` writes `SHORT`, `u32` writes `LONG`, and so on); callers
//! pick the width for most scalar fields by choosing the Rust type they pass in.
//! [`DirectoryEncoder::write_narrow_uints`] instead performs real narrowest-type selection for
//! strip/tile offset and byte-count arrays (§4.6): `SHORT` if every value fits, else `LONG`, else
//! `LONG8` on BigTIFF.

mod directory_encoder;
mod tiff_value;
mod writer;

use std::{
    io::{Seek, Write},
    marker::PhantomData,
};

pub use directory_encoder::DirectoryEncoder;
pub use tiff_value::{Ifd, Ifd8, Rational, SRational, TiffValue};
pub use writer::{write_bigtiff_header, write_tiff_header, TiffWriter};

use crate::{tiff_kind::TiffKindStandard, TiffKind, TiffResult};

/// Given a floating point value meant to be written as a `RATIONAL`, picks a `(numerator,
/// denominator)` pair that preserves accuracy within the 32-bit fraction range without
/// overflowing (§4.6).
pub fn float_to_rational(v: f64) -> (u32, u32) {
    const MAX: f64 = u32::MAX as f64;
    if v >= 0.0 && v.fract() == 0.0 && v <= MAX {
        (v as u32, 1)
    } else if v < 1.0 {
        ((v * MAX).round() as u32, u32::MAX)
    } else {
        (u32::MAX, (MAX / v).round() as u32)
    }
}

/// Writes TIFF or BigTIFF files one directory at a time.
///
/// `K` selects the flavor: [`TiffKindStandard`] (the default) for classic TIFF, or
/// [`crate::tiff_kind::TiffKindBig`] for BigTIFF.
pub struct TiffEncoder<W, K = TiffKindStandard> {
    writer: TiffWriter<W>,
    _kind: PhantomData<K>,
}

impl<W: Write + Seek> TiffEncoder<W, TiffKindStandard> {
    /// Creates a new classic-TIFF encoder, writing the file header immediately.
    pub fn new(writer: W) -> TiffResult<Self> {
        Self::with_kind(writer)
    }
}

impl<W: Write + Seek, K: TiffKind> TiffEncoder<W, K> {
    /// Creates a new encoder for the given [`TiffKind`], writing the file header immediately.
    pub fn with_kind(writer: W) -> TiffResult<Self> {
        let mut writer = TiffWriter::new(writer);
        K::write_header(&mut writer)?;
        Ok(TiffEncoder {
            writer,
            _kind: PhantomData,
        })
    }

    /// Starts a new directory at the current file tail.
    ///
    /// Drop the returned [`DirectoryEncoder`] (or call
    /// [`DirectoryEncoder::finish`][directory_encoder::DirectoryEncoder::finish]) to link it into
    /// the chain: the first call patches the header's first-IFD pointer, every subsequent call
    /// patches the previous directory's next-IFD pointer (§4.7).
    pub fn new_directory(&mut self) -> TiffResult<DirectoryEncoder<'_, W, K>> {
        DirectoryEncoder::new(&mut self.writer)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::float_to_rational;

    #[test]
    fn exact_integers_use_unit_denominator() {
        assert_eq!(float_to_rational(0.0), (0, 1));
        assert_eq!(float_to_rational(72.0), (72, 1));
        assert_eq!(float_to_rational(u32::MAX as f64), (u32::MAX, 1));
    }

    #[test]
    fn fractions_below_one_scale_into_the_numerator() {
        let (n, d) = float_to_rational(0.5);
        assert_eq!(d, u32::MAX);
        assert_eq!(n, (0.5 * u32::MAX as f64).round() as u32);
    }

    #[test]
    fn values_above_one_scale_into_the_denominator() {
        let (n, d) = float_to_rational(2.5);
        assert_eq!(n, u32::MAX);
        assert_eq!(d, ((u32::MAX as f64) / 2.5).round() as u32);
    }
}
