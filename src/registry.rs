//! Per-handle registry of known and dynamically discovered tags.
//!
//! libtiff keeps one process-wide array of `TIFFFieldInfo` per tag, searched with
//! `_TIFFFindFieldInfo` (binary search by tag id) and `_TIFFFindFieldInfoByName` (linear search by
//! name), and synthesizes a `"Tag %d"` entry via `_TIFFCreateAnonFieldInfo` the first time an
//! unrecognized tag is encountered. That table is shared mutable global state, torn down through
//! a reference count on `TIFFClientOpen`/`TIFFClose`.
//!
//! Here the same lookups live on a value owned by whoever is reading or writing a directory, so
//! there is nothing process-wide to tear down and no lifetime tied to an open/close pair.
//!
//! Unlike libtiff's flat array, a tag id may resolve to more than one [`FieldDescriptor`]: the
//! baseline table (`tif_dir.h`'s `tiffFieldInfo`) lists the same tag twice whenever more than one
//! on-disk type has historically been seen for it (e.g. `ImageWidth` as `LONG`, with a `SHORT`
//! entry immediately after "for compatibility w/ old versions of the library"). `find` mirrors
//! that: the descriptor whose type exactly matches what is on disk wins; otherwise the first
//! (canonical) registration for that tag id wins.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::tags::Type;

/// How many values a field is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCount {
    /// Exactly one value.
    Scalar,
    /// A fixed number of values, independent of the image.
    Fixed(u32),
    /// One value per sample (`SamplesPerPixel`).
    PerSample,
    /// Any number of values, determined by the entry's own count field.
    Variable,
}

impl FieldCount {
    /// The fixed lower bound this count implies, if any. `Scalar` is `Fixed(1)` under another
    /// name; `PerSample` and `Variable` have no count that can be checked without more context
    /// (samples-per-pixel, or none at all), so callers check those separately.
    fn fixed_bound(self) -> Option<u32> {
        match self {
            FieldCount::Scalar => Some(1),
            FieldCount::Fixed(n) => Some(n),
            FieldCount::PerSample | FieldCount::Variable => None,
        }
    }
}

/// What a registry knows about a tag: its expected shape, independent of any particular
/// directory's contents.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub tag: u16,
    pub name: Cow<'static, str>,
    pub field_type: Type,
    pub count: FieldCount,
}

impl FieldDescriptor {
    pub const fn new(tag: u16, name: &'static str, field_type: Type, count: FieldCount) -> Self {
        FieldDescriptor {
            tag,
            name: Cow::Borrowed(name),
            field_type,
            count,
        }
    }

    fn anonymous(tag: u16) -> Self {
        FieldDescriptor {
            tag,
            name: Cow::Owned(format!("Tag {tag}")),
            field_type: Type::UNDEFINED,
            count: FieldCount::Variable,
        }
    }

    /// The declared-count check this descriptor implies for an entry that claims `actual`
    /// values: too few is a hard rejection, too many is accepted (the caller is expected to trim
    /// to `fixed_bound()`).
    pub fn count_floor(&self) -> Option<u32> {
        self.count.fixed_bound()
    }
}

/// A scoped table of tag descriptors, seeded from the built-in baseline and grown with
/// anonymous entries as unrecognized tags are encountered.
///
/// Lookup by tag id is O(log n) to find the candidate list, then linear within it (that list is
/// one or two entries long in practice, matching how few tags libtiff lists twice).
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    by_tag: BTreeMap<u16, Vec<FieldDescriptor>>,
}

impl FieldRegistry {
    /// An empty registry: every lookup falls through to `find_or_register_anon`.
    pub fn new() -> Self {
        FieldRegistry {
            by_tag: BTreeMap::new(),
        }
    }

    /// Registers a descriptor. A tag id may carry more than one descriptor (one on-disk type
    /// each); the first one registered for a given tag id is its canonical entry, consulted by
    /// [`FieldRegistry::find`] whenever the on-disk type does not exactly match any of them.
    pub fn register(&mut self, descriptor: FieldDescriptor) {
        self.by_tag.entry(descriptor.tag).or_default().push(descriptor);
    }

    /// Looks up the canonical descriptor for a tag id, ignoring any on-disk type. This is the
    /// descriptor that would be chosen by [`FieldRegistry::find`] if none of the registered types
    /// matched.
    pub fn find_by_tag(&self, tag: u16) -> Option<&FieldDescriptor> {
        self.by_tag.get(&tag)?.first()
    }

    /// Looks up the descriptor that applies given the type actually found on disk: the descriptor
    /// whose type exactly matches `on_disk_type` wins; otherwise the first (canonical) descriptor
    /// registered for this tag wins. Returns the descriptor plus whether the match was exact.
    pub fn find(&self, tag: u16, on_disk_type: Type) -> Option<(&FieldDescriptor, bool)> {
        let candidates = self.by_tag.get(&tag)?;
        if let Some(exact) = candidates.iter().find(|d| d.field_type == on_disk_type) {
            Some((exact, true))
        } else {
            candidates.first().map(|d| (d, false))
        }
    }

    /// Looks up a descriptor by name. Ties (two descriptors sharing a name, which should not
    /// normally happen) resolve to whichever tag id is numerically smallest, since the backing
    /// map iterates in tag order.
    pub fn find_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_tag
            .values()
            .flat_map(|variants| variants.iter())
            .find(|d| d.name == name)
    }

    /// Looks up a descriptor by tag id, registering a generic `"Tag <id>"` placeholder
    /// descriptor (of type `UNDEFINED`, variable count) the first time this id is seen.
    pub fn find_or_register_anon(&mut self, tag: u16) -> &FieldDescriptor {
        let variants = self.by_tag.entry(tag).or_default();
        if variants.is_empty() {
            variants.push(FieldDescriptor::anonymous(tag));
        }
        &variants[0]
    }

    /// The baseline registry of well-known tags this decoder understands, seeded the way
    /// libtiff's `tiffFieldInfo` table is: one canonical descriptor per tag, plus an extra
    /// descriptor for any alternate on-disk type old or broken writers are known to use.
    pub fn baseline() -> Self {
        use crate::tags::Tag;
        use FieldCount::*;
        use Type::*;

        let mut r = FieldRegistry::new();
        let mut reg = |tag: Tag, name, ty, count| {
            r.register(FieldDescriptor::new(tag.to_u16(), name, ty, count));
        };

        // Dimensions and sample layout: canonical LONG/SHORT first, SHORT/LONG compat second,
        // matching tif_dir.h's paired entries for writers that used the "wrong" half-word type.
        reg(Tag::ImageWidth, "ImageWidth", LONG, Scalar);
        reg(Tag::ImageWidth, "ImageWidth", SHORT, Scalar);
        reg(Tag::ImageLength, "ImageLength", LONG, Scalar);
        reg(Tag::ImageLength, "ImageLength", SHORT, Scalar);
        reg(Tag::BitsPerSample, "BitsPerSample", SHORT, PerSample);
        reg(Tag::BitsPerSample, "BitsPerSample", LONG, PerSample);
        reg(Tag::Compression, "Compression", SHORT, Scalar);
        reg(Tag::Compression, "Compression", LONG, Scalar);
        reg(
            Tag::PhotometricInterpretation,
            "PhotometricInterpretation",
            SHORT,
            Scalar,
        );
        reg(
            Tag::PhotometricInterpretation,
            "PhotometricInterpretation",
            LONG,
            Scalar,
        );
        reg(Tag::SamplesPerPixel, "SamplesPerPixel", SHORT, Scalar);
        reg(Tag::RowsPerStrip, "RowsPerStrip", LONG, Scalar);
        reg(Tag::RowsPerStrip, "RowsPerStrip", SHORT, Scalar);
        reg(Tag::FillOrder, "FillOrder", SHORT, Scalar);

        // Strip/tile geometry: offsets and byte counts are historically SHORT or LONG, and this
        // decoder additionally accepts LONG8 to support BigTIFF files using the classic tag ids.
        reg(Tag::StripOffsets, "StripOffsets", LONG, Variable);
        reg(Tag::StripOffsets, "StripOffsets", SHORT, Variable);
        reg(Tag::StripOffsets, "StripOffsets", LONG8, Variable);
        reg(Tag::StripByteCounts, "StripByteCounts", LONG, Variable);
        reg(Tag::StripByteCounts, "StripByteCounts", SHORT, Variable);
        reg(Tag::StripByteCounts, "StripByteCounts", LONG8, Variable);
        reg(Tag::PlanarConfiguration, "PlanarConfiguration", SHORT, Scalar);
        reg(Tag::TileWidth, "TileWidth", LONG, Scalar);
        reg(Tag::TileWidth, "TileWidth", SHORT, Scalar);
        reg(Tag::TileLength, "TileLength", LONG, Scalar);
        reg(Tag::TileLength, "TileLength", SHORT, Scalar);
        reg(Tag::TileOffsets, "TileOffsets", LONG, Variable);
        reg(Tag::TileOffsets, "TileOffsets", LONG8, Variable);
        reg(Tag::TileByteCounts, "TileByteCounts", LONG, Variable);
        reg(Tag::TileByteCounts, "TileByteCounts", SHORT, Variable);
        reg(Tag::TileByteCounts, "TileByteCounts", LONG8, Variable);

        // Resolution, prediction, sample format, palette, extra samples.
        reg(Tag::XResolution, "XResolution", RATIONAL, Fixed(1));
        reg(Tag::YResolution, "YResolution", RATIONAL, Fixed(1));
        reg(Tag::ResolutionUnit, "ResolutionUnit", SHORT, Scalar);
        reg(Tag::Predictor, "Predictor", SHORT, Scalar);
        reg(Tag::SampleFormat, "SampleFormat", SHORT, PerSample);
        reg(Tag::ColorMap, "ColorMap", SHORT, Variable);
        reg(Tag::ExtraSamples, "ExtraSamples", SHORT, Variable);
        reg(Tag::ExtraSamples, "ExtraSamples", BYTE, Variable);

        // SubIFD: an array of N offsets to child directories (§4.7's SubIFD mechanism), LONG for
        // classic TIFF and LONG8 for BigTIFF.
        reg(Tag::SubIfd, "SubIFD", LONG, Variable);
        reg(Tag::SubIfd, "SubIFD", LONG8, Variable);

        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_registration_is_idempotent() {
        let mut registry = FieldRegistry::new();
        assert!(registry.find_by_tag(0xBEEF).is_none());

        let first = registry.find_or_register_anon(0xBEEF).clone();
        let second = registry.find_or_register_anon(0xBEEF).clone();
        assert_eq!(first, second);
        assert_eq!(first.name, "Tag 48879");
    }

    #[test]
    fn explicit_registration_wins_over_anon() {
        let mut registry = FieldRegistry::new();
        registry.find_or_register_anon(42);
        registry.register(FieldDescriptor::new(
            42,
            "TheAnswer",
            Type::LONG,
            FieldCount::Scalar,
        ));

        // The anon placeholder is still the canonical (first) entry; the freshly registered
        // descriptor only wins when its type is an exact match.
        let (descriptor, exact) = registry.find(42, Type::LONG).unwrap();
        assert_eq!(descriptor.name, "TheAnswer");
        assert!(exact);
    }

    #[test]
    fn find_by_name_matches_registered_descriptor() {
        let mut registry = FieldRegistry::new();
        registry.register(FieldDescriptor::new(
            256,
            "ImageWidth",
            Type::LONG,
            FieldCount::Scalar,
        ));
        assert_eq!(registry.find_by_name("ImageWidth").unwrap().tag, 256);
        assert!(registry.find_by_name("NoSuchTag").is_none());
    }

    #[test]
    fn exact_type_match_wins_over_canonical() {
        let registry = FieldRegistry::baseline();

        let (short_compat, exact) = registry
            .find(crate::tags::Tag::ImageWidth.to_u16(), Type::SHORT)
            .unwrap();
        assert_eq!(short_compat.field_type, Type::SHORT);
        assert!(exact);

        let (canonical, exact) = registry
            .find(crate::tags::Tag::ImageWidth.to_u16(), Type::FLOAT)
            .unwrap();
        assert_eq!(canonical.field_type, Type::LONG);
        assert!(!exact);
    }
}
