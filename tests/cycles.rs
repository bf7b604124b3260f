use std::io::Cursor;

use tiff_ifd::{decoder::Decoder, TiffError, TiffFormatError};

/// Builds a classic little-endian file with two empty IFDs that point at each other, forming a
/// 2-cycle: header -> IFD A -> IFD B -> IFD A.
fn two_cycle_file() -> Vec<u8> {
    let ifd_a_offset: u32 = 8;
    let ifd_b_offset: u32 = ifd_a_offset + 6; // 2 (count) + 4 (next) bytes per empty IFD

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"II");
    bytes.extend_from_slice(&42u16.to_le_bytes());
    bytes.extend_from_slice(&ifd_a_offset.to_le_bytes());

    // IFD A: zero entries, next points at IFD B.
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&ifd_b_offset.to_le_bytes());

    // IFD B: zero entries, next points back at IFD A.
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&ifd_a_offset.to_le_bytes());

    bytes
}

/// S2/S3 (offset acyclicity): the first directory in a 2-cycle is readable; the second
/// `read_next_directory` call surfaces `CycleInOffsets` instead of looping forever.
#[test]
fn two_ifd_cycle_is_detected_on_the_second_hop() {
    let bytes = two_cycle_file();
    let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();

    let first = decoder.read_next_directory();
    assert!(first.is_ok(), "first IFD in the cycle must be readable");

    let second = decoder.read_next_directory();
    match second {
        Err(TiffError::FormatError(TiffFormatError::CycleInOffsets)) => {}
        other => panic!("expected CycleInOffsets, got {other:?}"),
    }
}

/// A directory that points at itself is rejected the moment the self-loop is observed, without
/// ever returning the directory.
#[test]
fn self_referential_ifd_is_rejected() {
    let ifd_offset: u32 = 8;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"II");
    bytes.extend_from_slice(&42u16.to_le_bytes());
    bytes.extend_from_slice(&ifd_offset.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&ifd_offset.to_le_bytes());

    let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
    match decoder.read_next_directory() {
        Err(TiffError::FormatError(TiffFormatError::CycleInOffsets)) => {}
        other => panic!("expected CycleInOffsets, got {other:?}"),
    }
}
