//! The typed, in-memory model of a single Image File Directory.
//!
//! Unlike [`crate::ifd::ImageFileDirectory`], which is a thin, serialization-oriented map from a
//! tag to its raw/processed bytes, [`Directory`] is the application-facing model: a dense struct
//! of the well-known baseline fields plus an ordered list of whatever custom tags a caller also
//! wants to carry. Each well-known field remembers whether it was explicitly set or is standing in
//! on its default, and a field that has been written once can be locked against further changes.

use std::fmt;

use crate::ifd::ProcessedEntry;
use crate::tags::{
    CompressionMethod, ExtraSamples, FillOrder, PhotometricInterpretation, PlanarConfiguration,
    Predictor, ResolutionUnit, SampleFormat, Tag,
};

/// Failure modes specific to the directory model, independent of I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DirectoryError {
    /// The requested field has not been registered as a well-known field and no custom entry
    /// with that tag id exists either.
    Unknown(u16),
    /// The field has already been locked and cannot be overwritten.
    Locked(WellKnownField),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Unknown(tag) => write!(f, "tag {tag} is not present in this directory"),
            DirectoryError::Locked(field) => write!(f, "field {field:?} is locked"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Identifies one of the dense, well-known fields of [`Directory`].
///
/// Used only to name a field in [`DirectoryError::Locked`]; the typed getter/setter pairs on
/// `Directory` are the normal way to read or write a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WellKnownField {
    ImageWidth,
    ImageLength,
    BitsPerSample,
    Compression,
    PhotometricInterpretation,
    SamplesPerPixel,
    RowsPerStrip,
    StripOffsets,
    StripByteCounts,
    PlanarConfiguration,
    TileWidth,
    TileLength,
    TileOffsets,
    TileByteCounts,
    XResolution,
    YResolution,
    ResolutionUnit,
    Predictor,
    SampleFormat,
    ColorMap,
    ExtraSamples,
    FillOrder,
    SubIfd,
}

const FIELD_COUNT: usize = 22;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldSet(u32);

impl FieldSet {
    fn contains(self, field: WellKnownField) -> bool {
        self.0 & (1 << field as u32) != 0
    }

    fn insert(&mut self, field: WellKnownField) {
        self.0 |= 1 << field as u32;
    }
}

const _: () = assert!(FIELD_COUNT <= 32);

macro_rules! well_known_field {
    ($field:ident, $ty:ty, $get:ident, $set:ident, $storage:ident) => {
        pub fn $get(&self) -> Option<&$ty> {
            self.$storage.as_ref()
        }

        pub fn $set(&mut self, value: $ty) -> Result<(), DirectoryError> {
            self.ensure_unlocked(WellKnownField::$field)?;
            self.$storage = Some(value);
            self.set_fields.insert(WellKnownField::$field);
            Ok(())
        }
    };
}

/// An Image File Directory, modeled as dense well-known fields plus an ordered tail of custom
/// tags.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    image_width: Option<u32>,
    image_length: Option<u32>,
    bits_per_sample: Option<Vec<u16>>,
    compression: Option<CompressionMethod>,
    photometric_interpretation: Option<PhotometricInterpretation>,
    samples_per_pixel: Option<u16>,
    rows_per_strip: Option<u32>,
    strip_offsets: Option<Vec<u64>>,
    strip_byte_counts: Option<Vec<u64>>,
    planar_configuration: Option<PlanarConfiguration>,
    tile_width: Option<u32>,
    tile_length: Option<u32>,
    tile_offsets: Option<Vec<u64>>,
    tile_byte_counts: Option<Vec<u64>>,
    x_resolution: Option<(u32, u32)>,
    y_resolution: Option<(u32, u32)>,
    resolution_unit: Option<ResolutionUnit>,
    predictor: Option<Predictor>,
    sample_format: Option<Vec<SampleFormat>>,
    color_map: Option<Vec<u16>>,
    extra_samples: Option<Vec<ExtraSamples>>,
    fill_order: Option<FillOrder>,
    /// Offsets of child IFDs referenced from this directory's `SubIFD` array (§4.7).
    sub_ifd: Option<Vec<u64>>,

    set_fields: FieldSet,
    locked_fields: FieldSet,

    /// Tags with no dedicated well-known field, in the order they were first inserted.
    custom: Vec<(u16, ProcessedEntry)>,
}

impl Directory {
    pub fn new() -> Self {
        Directory::default()
    }

    fn ensure_unlocked(&self, field: WellKnownField) -> Result<(), DirectoryError> {
        if self.locked_fields.contains(field) {
            Err(DirectoryError::Locked(field))
        } else {
            Ok(())
        }
    }

    /// Prevents further writes to `field`. Reading remains possible.
    pub fn lock(&mut self, field: WellKnownField) {
        self.locked_fields.insert(field);
    }

    /// True if `field` was explicitly set (as opposed to never written, whose getter falls back
    /// to [`Directory::get_defaulted`] semantics at the call site).
    pub fn is_set(&self, field: WellKnownField) -> bool {
        self.set_fields.contains(field)
    }

    well_known_field!(
        ImageWidth,
        u32,
        image_width,
        set_image_width,
        image_width
    );
    well_known_field!(
        ImageLength,
        u32,
        image_length,
        set_image_length,
        image_length
    );
    well_known_field!(
        BitsPerSample,
        Vec<u16>,
        bits_per_sample,
        set_bits_per_sample,
        bits_per_sample
    );
    well_known_field!(
        Compression,
        CompressionMethod,
        compression,
        set_compression,
        compression
    );
    well_known_field!(
        PhotometricInterpretation,
        PhotometricInterpretation,
        photometric_interpretation,
        set_photometric_interpretation,
        photometric_interpretation
    );
    well_known_field!(
        SamplesPerPixel,
        u16,
        samples_per_pixel,
        set_samples_per_pixel,
        samples_per_pixel
    );
    well_known_field!(
        RowsPerStrip,
        u32,
        rows_per_strip,
        set_rows_per_strip,
        rows_per_strip
    );
    well_known_field!(
        StripOffsets,
        Vec<u64>,
        strip_offsets,
        set_strip_offsets,
        strip_offsets
    );
    well_known_field!(
        StripByteCounts,
        Vec<u64>,
        strip_byte_counts,
        set_strip_byte_counts,
        strip_byte_counts
    );
    well_known_field!(
        PlanarConfiguration,
        PlanarConfiguration,
        planar_configuration,
        set_planar_configuration,
        planar_configuration
    );
    well_known_field!(TileWidth, u32, tile_width, set_tile_width, tile_width);
    well_known_field!(TileLength, u32, tile_length, set_tile_length, tile_length);
    well_known_field!(
        TileOffsets,
        Vec<u64>,
        tile_offsets,
        set_tile_offsets,
        tile_offsets
    );
    well_known_field!(
        TileByteCounts,
        Vec<u64>,
        tile_byte_counts,
        set_tile_byte_counts,
        tile_byte_counts
    );
    well_known_field!(
        XResolution,
        (u32, u32),
        x_resolution,
        set_x_resolution,
        x_resolution
    );
    well_known_field!(
        YResolution,
        (u32, u32),
        y_resolution,
        set_y_resolution,
        y_resolution
    );
    well_known_field!(
        ResolutionUnit,
        ResolutionUnit,
        resolution_unit,
        set_resolution_unit,
        resolution_unit
    );
    well_known_field!(Predictor, Predictor, predictor, set_predictor, predictor);
    well_known_field!(
        SampleFormat,
        Vec<SampleFormat>,
        sample_format,
        set_sample_format,
        sample_format
    );
    well_known_field!(ColorMap, Vec<u16>, color_map, set_color_map, color_map);
    well_known_field!(
        ExtraSamples,
        Vec<ExtraSamples>,
        extra_samples,
        set_extra_samples,
        extra_samples
    );
    well_known_field!(FillOrder, FillOrder, fill_order, set_fill_order, fill_order);
    well_known_field!(SubIfd, Vec<u64>, sub_ifd, set_sub_ifd, sub_ifd);

    /// `fill_order`, defaulted to `MsbToLsb` per the baseline spec.
    pub fn fill_order_defaulted(&self) -> FillOrder {
        self.fill_order.unwrap_or(FillOrder::MsbToLsb)
    }

    /// `compression`, defaulted to `None` (value 1, no compression) per the baseline spec.
    pub fn compression_defaulted(&self) -> CompressionMethod {
        self.compression.unwrap_or(CompressionMethod::None)
    }

    /// `planar_configuration`, defaulted to `Chunky`.
    pub fn planar_configuration_defaulted(&self) -> PlanarConfiguration {
        self.planar_configuration
            .unwrap_or(PlanarConfiguration::Chunky)
    }

    /// `resolution_unit`, defaulted to `Inch`.
    pub fn resolution_unit_defaulted(&self) -> ResolutionUnit {
        self.resolution_unit.unwrap_or(ResolutionUnit::Inch)
    }

    /// `predictor`, defaulted to `None` (no prediction applied).
    pub fn predictor_defaulted(&self) -> Predictor {
        self.predictor.unwrap_or(Predictor::None)
    }

    /// `rows_per_strip`, defaulted to the entire image height (a single strip), the behavior
    /// mandated by the baseline spec when the tag is absent.
    pub fn rows_per_strip_defaulted(&self) -> u32 {
        self.rows_per_strip
            .or(self.image_length)
            .unwrap_or(u32::MAX)
    }

    /// Reads a custom (non-well-known) tag's processed value.
    pub fn get_custom(&self, tag: u16) -> Option<&ProcessedEntry> {
        self.custom
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v)
    }

    /// Sets a custom tag's value, appending it to the ordered tail if new, or overwriting it in
    /// place if the tag was already present.
    pub fn set_custom(&mut self, tag: u16, value: ProcessedEntry) {
        if let Some(entry) = self.custom.iter_mut().find(|(t, _)| *t == tag) {
            entry.1 = value;
        } else {
            self.custom.push((tag, value));
        }
    }

    /// Iterates custom tags in insertion order.
    pub fn custom_tags(&self) -> impl Iterator<Item = (u16, &ProcessedEntry)> {
        self.custom.iter().map(|(t, v)| (*t, v))
    }

    /// True if this directory is a palette-color image (`PhotometricInterpretation::RGBPalette`)
    /// and can be validated as such: a palette image without a `ColorMap` is malformed.
    pub fn is_palette(&self) -> bool {
        matches!(
            self.photometric_interpretation,
            Some(PhotometricInterpretation::RGBPalette)
        )
    }
}

/// Maps a well-known field to the [`Tag`] it is serialized under.
pub fn tag_for_field(field: WellKnownField) -> Tag {
    use WellKnownField::*;
    match field {
        ImageWidth => Tag::ImageWidth,
        ImageLength => Tag::ImageLength,
        BitsPerSample => Tag::BitsPerSample,
        Compression => Tag::Compression,
        PhotometricInterpretation => Tag::PhotometricInterpretation,
        SamplesPerPixel => Tag::SamplesPerPixel,
        RowsPerStrip => Tag::RowsPerStrip,
        StripOffsets => Tag::StripOffsets,
        StripByteCounts => Tag::StripByteCounts,
        PlanarConfiguration => Tag::PlanarConfiguration,
        TileWidth => Tag::TileWidth,
        TileLength => Tag::TileLength,
        TileOffsets => Tag::TileOffsets,
        TileByteCounts => Tag::TileByteCounts,
        XResolution => Tag::XResolution,
        YResolution => Tag::YResolution,
        ResolutionUnit => Tag::ResolutionUnit,
        Predictor => Tag::Predictor,
        SampleFormat => Tag::SampleFormat,
        ColorMap => Tag::ColorMap,
        ExtraSamples => Tag::ExtraSamples,
        FillOrder => Tag::FillOrder,
        SubIfd => Tag::SubIfd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_until_explicitly_set() {
        let dir = Directory::new();
        assert_eq!(dir.compression_defaulted(), CompressionMethod::None);
        assert!(!dir.is_set(WellKnownField::Compression));
    }

    #[test]
    fn set_then_lock_rejects_further_writes() {
        let mut dir = Directory::new();
        dir.set_image_width(640).unwrap();
        assert_eq!(dir.image_width(), Some(&640));

        dir.lock(WellKnownField::ImageWidth);
        let err = dir.set_image_width(800).unwrap_err();
        assert_eq!(err, DirectoryError::Locked(WellKnownField::ImageWidth));
    }

    #[test]
    fn custom_tags_preserve_insertion_order() {
        let mut dir = Directory::new();
        dir.set_custom(0x9999, ProcessedEntry::new(crate::ifd::Value::Unsigned(1)));
        dir.set_custom(0x0100, ProcessedEntry::new(crate::ifd::Value::Unsigned(2)));

        let tags: Vec<u16> = dir.custom_tags().map(|(t, _)| t).collect();
        assert_eq!(tags, vec![0x9999, 0x0100]);
    }
}
