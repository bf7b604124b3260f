use std::io::Cursor;

use tiff_ifd::{
    decoder::Decoder,
    encoder::{Rational, TiffEncoder},
    tags::{CompressionMethod, PhotometricInterpretation, Tag},
};

/// S1: a single minimal classic little-endian directory with one uncompressed strip round-trips
/// through the encoder and back with every declared field intact.
#[test]
fn minimal_directory_round_trips() {
    let mut data = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut data).unwrap();
        let mut dir = encoder.new_directory().unwrap();

        let strip_offset = dir.write_data(0xFFu8).unwrap();

        dir.write_tag(Tag::ImageWidth, 1u32).unwrap();
        dir.write_tag(Tag::ImageLength, 1u32).unwrap();
        dir.write_tag(Tag::BitsPerSample, 8u16).unwrap();
        dir.write_tag(Tag::Compression, CompressionMethod::None)
            .unwrap();
        dir.write_tag(
            Tag::PhotometricInterpretation,
            PhotometricInterpretation::BlackIsZero,
        )
        .unwrap();
        dir.write_tag(Tag::SamplesPerPixel, 1u16).unwrap();
        dir.write_tag(Tag::StripOffsets, strip_offset as u32)
            .unwrap();
        dir.write_tag(Tag::RowsPerStrip, 1u32).unwrap();
        dir.write_tag(Tag::StripByteCounts, 1u32).unwrap();
        dir.write_tag(Tag::XResolution, Rational { n: 72, d: 1 })
            .unwrap();
        dir.write_tag(Tag::YResolution, Rational { n: 72, d: 1 })
            .unwrap();

        dir.finish().unwrap();
    }

    let mut bytes = data.into_inner();
    let mut cursor = Cursor::new(&mut bytes);
    cursor.set_position(0);

    let mut decoder = Decoder::new(cursor).unwrap();
    let read = decoder.read_next_directory().unwrap().unwrap().directory;

    assert_eq!(read.image_width(), Some(&1));
    assert_eq!(read.image_length(), Some(&1));
    assert_eq!(read.bits_per_sample(), Some(&vec![8]));
    assert_eq!(read.compression_defaulted(), CompressionMethod::None);
    assert_eq!(
        read.photometric_interpretation(),
        Some(&PhotometricInterpretation::BlackIsZero)
    );
    assert_eq!(read.samples_per_pixel(), Some(&1));
    assert_eq!(read.strip_byte_counts(), Some(&vec![1]));
    assert_eq!(read.rows_per_strip_defaulted(), 1);

    assert!(decoder.read_next_directory().unwrap().is_none());
}

/// S6: writing BitsPerSample as a single scalar value with SamplesPerPixel=3 reads back as a
/// three-element broadcast (§4.6): the reader, not the writer, is responsible for expanding a
/// lone per-sample value across every sample.
#[test]
fn per_sample_array_round_trips() {
    let mut data = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut data).unwrap();
        let mut dir = encoder.new_directory().unwrap();

        dir.write_tag(Tag::ImageWidth, 100u32).unwrap();
        dir.write_tag(Tag::ImageLength, 100u32).unwrap();
        dir.write_tag(Tag::BitsPerSample, 8u16).unwrap();
        dir.write_tag(Tag::SamplesPerPixel, 3u16).unwrap();
        dir.write_tag(Tag::Compression, CompressionMethod::None)
            .unwrap();

        dir.finish().unwrap();
    }

    let mut bytes = data.into_inner();
    let mut cursor = Cursor::new(&mut bytes);
    cursor.set_position(0);

    let mut decoder = Decoder::new(cursor).unwrap();
    let read = decoder.read_next_directory().unwrap().unwrap().directory;

    assert_eq!(read.bits_per_sample(), Some(&vec![8, 8, 8]));
    assert_eq!(read.samples_per_pixel(), Some(&3));
}

/// More values than samples is accepted and trimmed down to `SamplesPerPixel`, rather than
/// rejected outright.
#[test]
fn per_sample_array_longer_than_samples_is_trimmed() {
    let mut data = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut data).unwrap();
        let mut dir = encoder.new_directory().unwrap();

        dir.write_tag(Tag::ImageWidth, 100u32).unwrap();
        dir.write_tag(Tag::ImageLength, 100u32).unwrap();
        dir.write_tag(Tag::BitsPerSample, &[8u16, 8, 8, 8][..])
            .unwrap();
        dir.write_tag(Tag::SamplesPerPixel, 3u16).unwrap();
        dir.write_tag(Tag::Compression, CompressionMethod::None)
            .unwrap();

        dir.finish().unwrap();
    }

    let mut bytes = data.into_inner();
    let mut cursor = Cursor::new(&mut bytes);
    cursor.set_position(0);

    let mut decoder = Decoder::new(cursor).unwrap();
    let read = decoder.read_next_directory().unwrap().unwrap().directory;

    assert_eq!(read.bits_per_sample(), Some(&vec![8, 8, 8]));
}

/// S7: two directories written through the `SubIFD` array mechanism land as a two-element
/// `SubIfd` tag on the parent, and the decoder can traverse both via `read_sub_ifds`.
#[test]
fn sub_ifd_array_round_trips() {
    let mut data = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut data).unwrap();
        let mut dir = encoder.new_directory().unwrap();

        dir.write_tag(Tag::ImageWidth, 1u32).unwrap();

        dir.sub_ifd_array_start();
        dir.write_tag(Tag::ImageWidth, 10u32).unwrap();
        dir.sub_ifd_array_close().unwrap();

        dir.sub_ifd_array_start();
        dir.write_tag(Tag::ImageWidth, 20u32).unwrap();
        dir.sub_ifd_array_close().unwrap();

        dir.finish().unwrap();
    }

    let mut bytes = data.into_inner();
    let mut cursor = Cursor::new(&mut bytes);
    cursor.set_position(0);

    let mut decoder = Decoder::new(cursor).unwrap();
    let read = decoder.read_next_directory().unwrap().unwrap().directory;

    let children = decoder.read_sub_ifds(&read).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].directory.image_width(), Some(&10));
    assert_eq!(children[1].directory.image_width(), Some(&20));
}
