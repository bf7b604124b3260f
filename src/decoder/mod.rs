//! Directory reader: header parsing, IFD chain traversal, two-pass entry resolution, and the
//! repair phase that reconciles quirky-but-recoverable files.

use std::io::{Read, Seek};

use log::warn;

use crate::{
    error::DecodeError,
    ifd::{ProcessedEntry, TagDirectory, Value},
    registry::FieldRegistry,
    tags::{
        CompressionMethod, ExtraSamples, FillOrder, IfdPointer, PhotometricInterpretation,
        PlanarConfiguration, Predictor, ResolutionUnit, SampleFormat, Tag, Type,
    },
    tiff_kind::{TiffKind, TiffKindBig, TiffKindStandard},
    DecodeLimits, Directory, TiffError, TiffFormatError, TiffResult,
};

mod cycles;
mod decoded_entry;
mod stream;
mod tag_reader;

use cycles::IfdCycles;
use decoded_entry::DecodedEntry;
pub use stream::ByteOrder;
use stream::EndianReader;
use tag_reader::TagReader;

/// Number of strips the strip-chop heuristic will not exceed synthesizing.
const STRIP_CHOP_MAX_STRIPS: u64 = 1 << 32;

/// A directory successfully read off disk, together with any recoverable problems that were
/// downgraded to warnings instead of aborting the read.
#[derive(Debug)]
pub struct ReadDirectory {
    pub directory: Directory,
    pub warnings: Vec<String>,
}

/// A TIFF or BigTIFF directory-chain reader.
///
/// Wraps one of two monomorphizations of the inner reader depending on whether the file's header
/// declared classic or BigTIFF framing; the split exists purely at the type level; `bigtiff`-ness
/// is otherwise a runtime fact discovered by [`Decoder::new`].
pub enum Decoder<R: Read + Seek> {
    Standard(Inner<R, TiffKindStandard>),
    Big(Inner<R, TiffKindBig>),
}

impl<R: Read + Seek> Decoder<R> {
    /// Parses the file header and positions the reader at the first IFD offset.
    ///
    /// This does not yet read any directory; call [`Decoder::read_next_directory`] to fetch the
    /// first one.
    pub fn new(mut r: R) -> TiffResult<Self> {
        let mut endianess = [0u8; 2];
        r.read_exact(&mut endianess)?;
        let byte_order = match &endianess {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => return Err(TiffError::FormatError(TiffFormatError::TiffSignatureNotFound)),
        };
        let mut reader = EndianReader::new(r, byte_order);

        let bigtiff = match reader.read_u16()? {
            42 => false,
            43 => {
                if reader.read_u16()? != 8 {
                    return Err(TiffError::FormatError(
                        TiffFormatError::BigTiffSignatureInvalid,
                    ));
                }
                if reader.read_u16()? != 0 {
                    return Err(TiffError::FormatError(
                        TiffFormatError::BigTiffSignatureInvalid,
                    ));
                }
                true
            }
            _ => return Err(TiffError::FormatError(TiffFormatError::TiffSignatureInvalid)),
        };

        let first_ifd = if bigtiff {
            reader.read_u64()?
        } else {
            u64::from(reader.read_u32()?)
        };

        if bigtiff {
            Ok(Decoder::Big(Inner::new(reader, first_ifd)))
        } else {
            Ok(Decoder::Standard(Inner::new(reader, first_ifd)))
        }
    }

    pub fn with_limits(self, limits: DecodeLimits) -> Self {
        match self {
            Decoder::Standard(inner) => Decoder::Standard(inner.with_limits(limits)),
            Decoder::Big(inner) => Decoder::Big(inner.with_limits(limits)),
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        match self {
            Decoder::Standard(inner) => inner.reader.byte_order,
            Decoder::Big(inner) => inner.reader.byte_order,
        }
    }

    pub fn is_big(&self) -> bool {
        matches!(self, Decoder::Big(_))
    }

    /// Reads the next directory in the chain, advancing the cursor. Returns `Ok(None)` once the
    /// chain is exhausted (next-IFD offset of zero).
    pub fn read_next_directory(&mut self) -> TiffResult<Option<ReadDirectory>> {
        match self {
            Decoder::Standard(inner) => inner.read_next_directory(),
            Decoder::Big(inner) => inner.read_next_directory(),
        }
    }

    /// Reads a directory at an arbitrary offset with no chain bookkeeping, e.g. an EXIF or GPS
    /// sub-directory referenced from a tag value. Does not advance the chain cursor.
    pub fn read_directory_at(&mut self, offset: u64) -> TiffResult<ReadDirectory> {
        match self {
            Decoder::Standard(inner) => inner.read_directory_at(offset),
            Decoder::Big(inner) => inner.read_directory_at(offset),
        }
    }

    pub fn into_inner(self) -> R {
        match self {
            Decoder::Standard(inner) => inner.reader.into_inner(),
            Decoder::Big(inner) => inner.reader.into_inner(),
        }
    }

    /// Reads every child directory referenced from `directory`'s `SubIFD` array (§4.7), in array
    /// order. Does not affect the chain cursor used by [`Decoder::read_next_directory`].
    pub fn read_sub_ifds(&mut self, directory: &Directory) -> TiffResult<Vec<ReadDirectory>> {
        let Some(offsets) = directory.sub_ifd().cloned() else {
            return Ok(Vec::new());
        };
        offsets.iter().map(|&offset| self.read_directory_at(offset)).collect()
    }
}

/// The generic reader state, monomorphized once per TIFF flavor.
pub struct Inner<R, K: TiffKind> {
    reader: EndianReader<R>,
    limits: DecodeLimits,
    registry: FieldRegistry,
    seen: IfdCycles,
    next_ifd: Option<u64>,
    _kind: std::marker::PhantomData<K>,
}

impl<R: Read + Seek, K: TiffKind> Inner<R, K> {
    fn new(reader: EndianReader<R>, first_ifd: u64) -> Self {
        Inner {
            reader,
            limits: DecodeLimits::default(),
            registry: FieldRegistry::baseline(),
            seen: IfdCycles::new(),
            next_ifd: Some(first_ifd).filter(|&o| o != 0),
            _kind: std::marker::PhantomData,
        }
    }

    fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    fn read_next_directory(&mut self) -> TiffResult<Option<ReadDirectory>> {
        let Some(offset) = self.next_ifd else {
            return Ok(None);
        };

        let (raw, next, mut warnings) = self.read_raw_ifd(offset)?;
        self.seen
            .insert_next(IfdPointer(offset), next.filter(|&o| o != 0).map(IfdPointer))?;
        self.next_ifd = next.filter(|&o| o != 0);

        let directory = build_directory(
            &raw,
            &mut self.reader,
            &self.limits,
            &mut self.registry,
            &mut warnings,
        )?;
        Ok(Some(ReadDirectory {
            directory,
            warnings,
        }))
    }

    fn read_directory_at(&mut self, offset: u64) -> TiffResult<ReadDirectory> {
        let (raw, _next, mut warnings) = self.read_raw_ifd(offset)?;
        let directory = build_directory(
            &raw,
            &mut self.reader,
            &self.limits,
            &mut self.registry,
            &mut warnings,
        )?;
        Ok(ReadDirectory {
            directory,
            warnings,
        })
    }

    /// Reads the raw entry table at `offset`: tag-sorted entries plus the next-IFD pointer.
    /// Performs no semantic interpretation beyond byte-order normalization.
    fn read_raw_ifd(
        &mut self,
        offset: u64,
    ) -> TiffResult<(TagDirectory<DecodedEntry<K>>, Option<u64>, Vec<String>)> {
        let mut warnings = Vec::new();
        self.reader.goto_offset(offset)?;

        let num_entries: u64 = if K::is_big() {
            self.reader.read_u64()?
        } else {
            self.reader.read_u16()?.into()
        };

        if num_entries as usize > self.limits.max_directory_entries {
            return Err(TiffError::FormatError(TiffFormatError::TooManyEntries {
                limit: self.limits.max_directory_entries,
                actual: num_entries as usize,
            }));
        }

        let mut raw = TagDirectory::new();
        let mut last_tag_id: Option<u16> = None;

        for _ in 0..num_entries {
            let tag_id = self.reader.read_u16()?;
            let type_id = self.reader.read_u16()?;

            let Some(type_) = Type::from_u16(type_id) else {
                warnings.push(format!("tag {tag_id} has unrecognized type {type_id}, skipped"));
                if K::is_big() {
                    self.reader.read_u64()?;
                    self.reader.read_u64()?;
                } else {
                    self.reader.read_u32()?;
                    self.reader.read_u32()?;
                }
                continue;
            };

            let entry = if K::is_big() {
                let count = self.reader.read_u64()?;
                let mut offset_bytes = [0u8; 8];
                self.reader.inner().read_exact(&mut offset_bytes)?;
                DecodedEntry::<K>::new(type_, K::convert_offset(count)?, &offset_bytes)
            } else {
                let count = self.reader.read_u32()?;
                let mut offset_bytes = [0u8; 4];
                self.reader.inner().read_exact(&mut offset_bytes)?;
                DecodedEntry::<K>::new(type_, K::convert_offset(count.into())?, &offset_bytes)
            };

            if let Some(last) = last_tag_id {
                if tag_id <= last {
                    warnings.push(format!(
                        "tag {tag_id} is out of ascending order (after {last}), accepted anyway"
                    ));
                }
            }
            last_tag_id = Some(tag_id);

            raw.insert(Tag::from_u16_exhaustive(tag_id), entry);
        }

        let next_ifd = if K::is_big() {
            self.reader.read_u64()?
        } else {
            u64::from(self.reader.read_u32()?)
        };

        Ok((raw, Some(next_ifd).filter(|&o| o != 0), warnings))
    }
}

/// Checks a well-known tag's on-disk shape against the registry before its value is coerced
/// (Pass 1): the on-disk type must be one of the types registered for this tag, and for
/// fixed-count descriptors the declared count must meet the minimum. Too few values is rejected
/// outright (the caller downgrades this to a warning and leaves the field unset); too many is
/// accepted, since every well-known accessor already takes however many values it needs and
/// ignores the rest.
fn check_registered_shape<K: TiffKind>(
    raw: &TagDirectory<DecodedEntry<K>>,
    registry: &FieldRegistry,
    tag: Tag,
) -> TiffResult<()> {
    let Some(entry) = raw.get(&tag) else {
        return Ok(());
    };
    let Some((descriptor, exact)) = registry.find(tag.to_u16(), entry.declared_type()) else {
        return Ok(());
    };
    if !exact {
        return Err(DecodeError::Range {
            tag: Some(tag),
            reason: "on-disk type is not one of the types permitted for this tag",
        }
        .into());
    }
    if let Some(floor) = descriptor.count_floor() {
        let actual = entry.declared_count();
        if actual < u64::from(floor) {
            return Err(DecodeError::Count {
                tag: Some(tag),
                expected: floor as usize,
                found: actual as usize,
            }
            .into());
        }
    }
    Ok(())
}

/// Applies the per-sample broadcast/trim rule (§4.6) to a tag whose value ought to carry one
/// entry per sample: a single stored value broadcasts across every sample; more values than
/// samples is accepted and trimmed down; anything else (more than one but fewer than
/// `samples`) is rejected.
fn reconcile_per_sample<T: Clone>(values: Vec<T>, samples: usize) -> Result<Vec<T>, &'static str> {
    match values.len() {
        n if n == samples => Ok(values),
        1 if samples > 1 => Ok(vec![values[0].clone(); samples]),
        n if n > samples => Ok(values.into_iter().take(samples).collect()),
        _ => Err("too few values for SamplesPerPixel"),
    }
}

/// Runs the two-pass entry resolution plus the repair phase (§4.5) over a raw directory, producing
/// the typed [`Directory`] model.
fn build_directory<R: Read + Seek, K: TiffKind>(
    raw: &TagDirectory<DecodedEntry<K>>,
    reader: &mut EndianReader<R>,
    limits: &DecodeLimits,
    registry: &mut FieldRegistry,
    warnings: &mut Vec<String>,
) -> TiffResult<Directory> {
    let mut dir = Directory::new();
    let mut tag_reader = TagReader {
        reader,
        ifd: raw,
        limits,
    };

    // A format or I/O error reading the directory is fatal; a value merely failing to coerce to
    // the shape a well-known field expects is downgraded to a warning and the field is left unset,
    // falling back to its default (if any) instead.
    macro_rules! absorb {
        ($tag:expr, $result:expr) => {
            match check_registered_shape(raw, registry, $tag).and_then(|()| $result) {
                Ok(Some(v)) => Some(v),
                Ok(None) => None,
                Err(e @ TiffError::DecodeError(_)) => {
                    let msg = format!("tag {:?}: {e}, dropped", $tag);
                    warn!("{msg}");
                    warnings.push(msg);
                    None
                }
                Err(e) => return Err(e),
            }
        };
    }

    // Pass 1: SamplesPerPixel and Compression are resolved first since later checks (per-sample
    // arrays, OJPEG defaults) depend on both being known.
    if let Some(v) = absorb!(
        Tag::SamplesPerPixel,
        tag_reader
            .find_tag(Tag::SamplesPerPixel)
            .and_then(|o| o.map(Value::into_u16).transpose())
    ) {
        if v == 0 {
            return Err(TiffError::FormatError(TiffFormatError::SamplesPerPixelIsZero));
        }
        dir.set_samples_per_pixel(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::Compression,
        tag_reader
            .find_tag(Tag::Compression)
            .and_then(|o| o.map(Value::into_u16).transpose())
    ) {
        dir.set_compression(CompressionMethod::from_u16_exhaustive(v)).ok();
    }

    // Pass 1 continued / Pass 2: every remaining well-known tag is fetched and coerced; failures
    // downgrade to a warning and the tag is simply left unset (falling back to its default, if
    // any).
    if let Some(v) = absorb!(
        Tag::ImageWidth,
        tag_reader
            .find_tag_uint_vec::<u32>(Tag::ImageWidth)
            .map(|o| o.and_then(|v| v.into_iter().next()))
    ) {
        dir.set_image_width(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::ImageLength,
        tag_reader
            .find_tag_uint_vec::<u32>(Tag::ImageLength)
            .map(|o| o.and_then(|v| v.into_iter().next()))
    ) {
        dir.set_image_length(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::BitsPerSample,
        tag_reader.find_tag_uint_vec::<u16>(Tag::BitsPerSample)
    ) {
        let samples = dir.samples_per_pixel().copied().unwrap_or(1) as usize;
        match reconcile_per_sample(v, samples) {
            Ok(v) => {
                dir.set_bits_per_sample(v).ok();
            }
            Err(reason) => warnings.push(format!("tag {:?}: {reason}, dropped", Tag::BitsPerSample)),
        }
    }
    if let Some(v) = absorb!(
        Tag::PhotometricInterpretation,
        tag_reader
            .find_tag(Tag::PhotometricInterpretation)
            .and_then(|o| o.map(Value::into_u16).transpose())
    ) {
        match PhotometricInterpretation::from_u16(v) {
            Some(p) => {
                dir.set_photometric_interpretation(p).ok();
            }
            None => warnings.push(format!("unknown photometric interpretation {v}")),
        }
    }
    if let Some(v) = absorb!(
        Tag::RowsPerStrip,
        tag_reader
            .find_tag_uint_vec::<u32>(Tag::RowsPerStrip)
            .map(|o| o.and_then(|v| v.into_iter().next()))
    ) {
        dir.set_rows_per_strip(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::StripOffsets,
        tag_reader.find_tag_uint_vec::<u64>(Tag::StripOffsets)
    ) {
        dir.set_strip_offsets(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::StripByteCounts,
        tag_reader.find_tag_uint_vec::<u64>(Tag::StripByteCounts)
    ) {
        dir.set_strip_byte_counts(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::PlanarConfiguration,
        tag_reader
            .find_tag(Tag::PlanarConfiguration)
            .and_then(|o| o.map(Value::into_u16).transpose())
    ) {
        match PlanarConfiguration::from_u16(v) {
            Some(p) => {
                dir.set_planar_configuration(p).ok();
            }
            None => warnings.push(format!("unknown planar configuration {v}")),
        }
    }
    if let Some(v) = absorb!(
        Tag::TileWidth,
        tag_reader
            .find_tag_uint_vec::<u32>(Tag::TileWidth)
            .map(|o| o.and_then(|v| v.into_iter().next()))
    ) {
        dir.set_tile_width(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::TileLength,
        tag_reader
            .find_tag_uint_vec::<u32>(Tag::TileLength)
            .map(|o| o.and_then(|v| v.into_iter().next()))
    ) {
        dir.set_tile_length(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::TileOffsets,
        tag_reader.find_tag_uint_vec::<u64>(Tag::TileOffsets)
    ) {
        dir.set_tile_offsets(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::TileByteCounts,
        tag_reader.find_tag_uint_vec::<u64>(Tag::TileByteCounts)
    ) {
        dir.set_tile_byte_counts(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::XResolution,
        tag_reader
            .find_tag(Tag::XResolution)
            .and_then(|o| o.map(Value::into_u32_vec).transpose())
    ) {
        if let [num, den] = v[..] {
            dir.set_x_resolution((num, den)).ok();
        }
    }
    if let Some(v) = absorb!(
        Tag::YResolution,
        tag_reader
            .find_tag(Tag::YResolution)
            .and_then(|o| o.map(Value::into_u32_vec).transpose())
    ) {
        if let [num, den] = v[..] {
            dir.set_y_resolution((num, den)).ok();
        }
    }
    if let Some(v) = absorb!(
        Tag::ResolutionUnit,
        tag_reader
            .find_tag(Tag::ResolutionUnit)
            .and_then(|o| o.map(Value::into_u16).transpose())
    ) {
        if let Some(u) = crate::tags::ResolutionUnit::from_u16(v) {
            dir.set_resolution_unit(u).ok();
        }
    }
    if let Some(v) = absorb!(
        Tag::Predictor,
        tag_reader
            .find_tag(Tag::Predictor)
            .and_then(|o| o.map(Value::into_u16).transpose())
    ) {
        if let Some(p) = crate::tags::Predictor::from_u16(v) {
            dir.set_predictor(p).ok();
        }
    }
    if let Some(v) = absorb!(
        Tag::SampleFormat,
        tag_reader.find_tag_uint_vec::<u16>(Tag::SampleFormat)
    ) {
        let samples = dir.samples_per_pixel().copied().unwrap_or(1) as usize;
        match reconcile_per_sample(v, samples) {
            Ok(v) => {
                let formats: Vec<_> = v
                    .into_iter()
                    .map(crate::tags::SampleFormat::from_u16_exhaustive)
                    .collect();
                dir.set_sample_format(formats).ok();
            }
            Err(reason) => warnings.push(format!("tag {:?}: {reason}, dropped", Tag::SampleFormat)),
        }
    }
    if let Some(v) = absorb!(
        Tag::ColorMap,
        tag_reader.find_tag_uint_vec::<u16>(Tag::ColorMap)
    ) {
        dir.set_color_map(v).ok();
    }
    if let Some(v) = absorb!(
        Tag::ExtraSamples,
        tag_reader.find_tag_uint_vec::<u16>(Tag::ExtraSamples)
    ) {
        let samples: Vec<_> = v
            .into_iter()
            .map(crate::tags::ExtraSamples::from_u16_exhaustive)
            .collect();
        dir.set_extra_samples(samples).ok();
    }
    if let Some(v) = absorb!(
        Tag::FillOrder,
        tag_reader
            .find_tag(Tag::FillOrder)
            .and_then(|o| o.map(Value::into_u16).transpose())
    ) {
        match FillOrder::from_u16(v) {
            Some(f) => {
                dir.set_fill_order(f).ok();
            }
            None => warnings.push(format!("unknown fill order {v}")),
        }
    }
    if let Some(v) = absorb!(Tag::SubIfd, tag_reader.find_tag_uint_vec::<u64>(Tag::SubIfd)) {
        dir.set_sub_ifd(v).ok();
    }

    // Anything left is a custom tag: register it (dynamically, if unknown) and store its
    // processed value verbatim.
    let well_known: &[Tag] = &[
        Tag::SamplesPerPixel,
        Tag::Compression,
        Tag::ImageWidth,
        Tag::ImageLength,
        Tag::BitsPerSample,
        Tag::PhotometricInterpretation,
        Tag::RowsPerStrip,
        Tag::StripOffsets,
        Tag::StripByteCounts,
        Tag::PlanarConfiguration,
        Tag::TileWidth,
        Tag::TileLength,
        Tag::TileOffsets,
        Tag::TileByteCounts,
        Tag::XResolution,
        Tag::YResolution,
        Tag::ResolutionUnit,
        Tag::Predictor,
        Tag::SampleFormat,
        Tag::ColorMap,
        Tag::ExtraSamples,
        Tag::FillOrder,
        Tag::SubIfd,
    ];
    for (tag, entry) in raw.iter() {
        if well_known.contains(tag) {
            continue;
        }
        registry.find_or_register_anon(tag.to_u16());
        match entry.val(limits, tag_reader.reader) {
            Ok(Value::List(items)) => dir.set_custom(tag.to_u16(), ProcessedEntry::new_vec(&items)),
            Ok(v) => dir.set_custom(tag.to_u16(), ProcessedEntry::new(v)),
            Err(e) => warnings.push(format!("custom tag {}: {e}, dropped", tag.to_u16())),
        }
    }

    repair(&mut dir, raw, reader, limits, warnings)?;

    Ok(dir)
}

/// One row's worth of bytes, rounded up, for the current `BitsPerSample`/`SamplesPerPixel`.
fn scanline_byte_size(dir: &Directory) -> u64 {
    let width = dir.image_width().copied().unwrap_or(0) as u64;
    let samples = dir.samples_per_pixel().copied().unwrap_or(1) as u64;
    let bits = dir.bits_per_sample().map(|v| v[0] as u64).unwrap_or(1);
    (width * bits * samples).div_ceil(8)
}

/// One tile's worth of bytes, rounded up, for the current `BitsPerSample`/`SamplesPerPixel`.
fn tile_byte_size(dir: &Directory) -> u64 {
    let tile_width = dir.tile_width().copied().unwrap_or(0) as u64;
    let tile_length = dir.tile_length().copied().unwrap_or(0) as u64;
    let samples = dir.samples_per_pixel().copied().unwrap_or(1) as u64;
    let bits = dir.bits_per_sample().map(|v| v[0] as u64).unwrap_or(1);
    (tile_width * bits * samples).div_ceil(8) * tile_length
}

/// Bytes of directory framing (header, entry count, entries, next-IFD pointer) plus whatever
/// entries store their value out of line, approximating libtiff's `space` subtraction in
/// `EstimateStripByteCounts`.
fn directory_framing_overhead<K: TiffKind>(raw: &TagDirectory<DecodedEntry<K>>) -> u64 {
    let entry_size: u64 = if K::is_big() { 20 } else { 12 };
    let fixed: u64 = if K::is_big() { 32 } else { 14 };
    let inline_limit: u64 = if K::is_big() { 8 } else { 4 };

    let out_of_line: u64 = raw
        .iter()
        .map(|(_, entry)| {
            let size = u64::from(entry.declared_type().size()) * entry.declared_count();
            if size > inline_limit {
                size
            } else {
                0
            }
        })
        .sum();

    fixed + entry_size * raw.len() as u64 + out_of_line
}

/// libtiff's `EstimateStripByteCounts`, adapted to a reader that cannot seek past an
/// already-read entry list: space remaining in the file after header and out-of-line tag data,
/// split evenly across strips/tiles (and, for separate-planar images, across samples too).
fn estimate_compressed_bytes<R: Read + Seek, K: TiffKind>(
    dir: &Directory,
    raw: &TagDirectory<DecodedEntry<K>>,
    reader: &mut EndianReader<R>,
) -> TiffResult<u64> {
    let file_size = reader.file_size()?;
    let space = file_size.saturating_sub(directory_framing_overhead(raw));
    let space = if dir.planar_configuration_defaulted() == PlanarConfiguration::Separate {
        let samples = dir.samples_per_pixel().copied().unwrap_or(1) as u64;
        space / samples.max(1)
    } else {
        space
    };
    Ok(space)
}

/// Estimates a uniform per-strip/per-tile byte count using libtiff's three formulas: file-size
/// based for any non-OJPEG compression, geometry-based (bytes per tile or bytes per row times
/// `RowsPerStrip`) for uncompressed data.
fn estimate_byte_counts<R: Read + Seek, K: TiffKind>(
    dir: &Directory,
    raw: &TagDirectory<DecodedEntry<K>>,
    reader: &mut EndianReader<R>,
    is_tiled: bool,
) -> TiffResult<u64> {
    if dir.compression_defaulted() != CompressionMethod::None {
        estimate_compressed_bytes(dir, raw, reader)
    } else if is_tiled {
        Ok(tile_byte_size(dir))
    } else {
        Ok(scanline_byte_size(dir) * dir.rows_per_strip_defaulted() as u64)
    }
}

/// Mirrors libtiff's `BYTECOUNTLOOKSBAD` check: a lone, present byte count is still re-estimated
/// when it is zero with a nonzero offset, or (for uncompressed data) overruns the file or falls
/// short of a full scanline block.
fn byte_count_looks_bogus<R: Read + Seek>(
    dir: &Directory,
    offset: u64,
    byte_count: u64,
    reader: &mut EndianReader<R>,
) -> TiffResult<bool> {
    if byte_count == 0 && offset != 0 {
        return Ok(true);
    }
    if dir.compression_defaulted() == CompressionMethod::None {
        let file_size = reader.file_size()?;
        if file_size >= offset && byte_count > file_size - offset {
            return Ok(true);
        }
        let expected = scanline_byte_size(dir) * dir.image_length().copied().unwrap_or(0) as u64;
        if byte_count < expected {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The repair phase (§4.5 step 8): reconciles missing or inconsistent required fields.
fn repair<R: Read + Seek, K: TiffKind>(
    dir: &mut Directory,
    raw: &TagDirectory<DecodedEntry<K>>,
    reader: &mut EndianReader<R>,
    limits: &DecodeLimits,
    warnings: &mut Vec<String>,
) -> TiffResult<()> {
    if dir.is_palette() && dir.color_map().is_none() {
        return Err(TiffError::FormatError(TiffFormatError::PaletteWithoutColorMap));
    }

    let is_tiled = dir.tile_width().is_some() || dir.tile_length().is_some();

    if is_tiled {
        if dir.tile_offsets().is_none() {
            return Err(TiffError::FormatError(TiffFormatError::MissingRequired(
                Tag::TileOffsets,
            )));
        }
    } else if dir.image_length().is_some() && dir.strip_offsets().is_none() {
        return Err(TiffError::FormatError(TiffFormatError::MissingRequired(
            Tag::StripOffsets,
        )));
    }

    // StripByteCounts/TileByteCounts repair: libtiff's `EstimateStripByteCounts` runs whenever
    // the tag is absent, for every compression except old-style JPEG, and is also re-run when a
    // single present value plainly doesn't fit the geometry it claims to describe.
    if dir.compression_defaulted() != CompressionMethod::JPEG {
        let offsets = if is_tiled { dir.tile_offsets() } else { dir.strip_offsets() }.cloned();
        if let Some(offsets) = offsets.filter(|o| !o.is_empty()) {
            let present = if is_tiled { dir.tile_byte_counts() } else { dir.strip_byte_counts() };
            let needs_estimate = match present {
                None => true,
                Some(counts) if offsets.len() == 1 && counts.len() == 1 => {
                    byte_count_looks_bogus(dir, offsets[0], counts[0], reader)?
                }
                Some(_) => false,
            };
            if needs_estimate {
                let per_unit = estimate_byte_counts(dir, raw, reader, is_tiled)?;
                let mut estimated = vec![per_unit; offsets.len()];
                if let (Some(&last_offset), Some(last)) = (offsets.last(), estimated.last_mut()) {
                    let file_size = reader.file_size()?;
                    if last_offset + *last > file_size {
                        *last = file_size.saturating_sub(last_offset);
                    }
                }
                warnings.push(format!(
                    "{} missing or bogus, estimated from geometry",
                    if is_tiled { "TileByteCounts" } else { "StripByteCounts" }
                ));
                if is_tiled {
                    dir.set_tile_byte_counts(estimated).ok();
                } else {
                    dir.set_strip_byte_counts(estimated).ok();
                }
            }
        }
    }

    if limits.strip_chop {
        strip_chop(dir, limits.strip_chop_target_bytes as u64, warnings);
    }

    Ok(())
}

/// The strip-chop heuristic (§4.8): splits an oversized single strip into pieces around
/// `target_bytes`. Applies only to uncompressed, non-tiled images with exactly one strip, and
/// only if doing so would strictly shrink `rows_per_strip` (only-shrink rule).
fn strip_chop(dir: &mut Directory, target_bytes: u64, warnings: &mut Vec<String>) {
    if dir.tile_width().is_some() {
        return;
    }
    if dir.compression_defaulted() != CompressionMethod::None {
        return;
    }

    let (Some(offsets), Some(byte_counts)) = (dir.strip_offsets(), dir.strip_byte_counts()) else {
        return;
    };
    if offsets.len() != 1 || byte_counts.len() != 1 {
        return;
    }

    let Some(&width) = dir.image_width() else {
        return;
    };
    let samples = dir.samples_per_pixel().copied().unwrap_or(1) as u64;
    let bits = dir.bits_per_sample().map(|v| v[0] as u64).unwrap_or(1);
    let row_bytes = (width as u64 * bits * samples).div_ceil(8);
    if row_bytes == 0 {
        return;
    }

    let new_rows_per_strip = (target_bytes / row_bytes).max(1);
    let current_rows_per_strip = dir.rows_per_strip_defaulted() as u64;

    if new_rows_per_strip >= current_rows_per_strip {
        return;
    }

    let strip_bytes = new_rows_per_strip * row_bytes;
    let total_bytes = byte_counts[0];
    let n = total_bytes.div_ceil(strip_bytes.max(1));
    if n == 0 || n > STRIP_CHOP_MAX_STRIPS {
        return;
    }

    let base = offsets[0];
    let mut new_offsets = Vec::with_capacity(n as usize);
    let mut new_byte_counts = Vec::with_capacity(n as usize);
    let mut remaining = total_bytes;
    for i in 0..n {
        new_offsets.push(base + i * strip_bytes);
        let this_strip = strip_bytes.min(remaining);
        new_byte_counts.push(this_strip);
        remaining = remaining.saturating_sub(this_strip);
    }

    warnings.push(format!(
        "strip-chopped single {total_bytes}-byte strip into {n} strips of ~{strip_bytes} bytes"
    ));
    dir.set_strip_offsets(new_offsets).ok();
    dir.set_strip_byte_counts(new_byte_counts).ok();
    dir.set_rows_per_strip(new_rows_per_strip as u32).ok();
}

/// Fix endianness. If `byte_order` matches the host, then conversion is a no-op.
pub(crate) fn fix_endianness(buf: &mut [u8], byte_order: ByteOrder, bit_depth: u8) {
    match byte_order {
        ByteOrder::LittleEndian => match bit_depth {
            0..=8 => {}
            9..=16 => buf.chunks_exact_mut(2).for_each(|v| {
                v.copy_from_slice(&u16::from_le_bytes((*v).try_into().unwrap()).to_ne_bytes())
            }),
            17..=32 => buf.chunks_exact_mut(4).for_each(|v| {
                v.copy_from_slice(&u32::from_le_bytes((*v).try_into().unwrap()).to_ne_bytes())
            }),
            _ => buf.chunks_exact_mut(8).for_each(|v| {
                v.copy_from_slice(&u64::from_le_bytes((*v).try_into().unwrap()).to_ne_bytes())
            }),
        },
        ByteOrder::BigEndian => match bit_depth {
            0..=8 => {}
            9..=16 => buf.chunks_exact_mut(2).for_each(|v| {
                v.copy_from_slice(&u16::from_be_bytes((*v).try_into().unwrap()).to_ne_bytes())
            }),
            17..=32 => buf.chunks_exact_mut(4).for_each(|v| {
                v.copy_from_slice(&u32::from_be_bytes((*v).try_into().unwrap()).to_ne_bytes())
            }),
            _ => buf.chunks_exact_mut(8).for_each(|v| {
                v.copy_from_slice(&u64::from_be_bytes((*v).try_into().unwrap()).to_ne_bytes())
            }),
        },
    };
}
