use crate::error::TiffResult;
use std::io::{self, Seek, SeekFrom, Write};

pub fn write_tiff_header<W: Write>(writer: &mut TiffWriter<W>) -> TiffResult<()> {
    #[cfg(target_endian = "little")]
    let boi: u8 = 0x49;
    #[cfg(not(target_endian = "little"))]
    let boi: u8 = 0x4d;

    writer.writer.write_all(&[boi, boi])?;
    writer.writer.write_all(&42u16.to_ne_bytes())?;
    writer.offset += 4;

    Ok(())
}

/// Writes a BigTiff header, excluding the IFD offset field.
///
/// Writes the byte order, version number, offset byte size, and zero constant fields. Does
// _not_ write the offset to the first IFD, this should be done by the caller.
pub fn write_bigtiff_header<W: Write>(writer: &mut TiffWriter<W>) -> TiffResult<()> {
    #[cfg(target_endian = "little")]
    let boi: u8 = 0x49;
    #[cfg(not(target_endian = "little"))]
    let boi: u8 = 0x4d;

    // byte order indication
    writer.writer.write_all(&[boi, boi])?;
    // version number
    writer.writer.write_all(&43u16.to_ne_bytes())?;
    // bytesize of offsets (pointer size)
    writer.writer.write_all(&8u16.to_ne_bytes())?;
    // always 0
    writer.writer.write_all(&0u16.to_ne_bytes())?;

    // we wrote 8 bytes, so set the internal offset accordingly
    writer.offset += 8;

    Ok(())
}

/// Plain byte-order-native writer shared by the header, directory, and payload writers.
///
/// Values are always written in the host's native byte order; the file's declared byte-order
/// mark (written by [`write_tiff_header`]/[`write_bigtiff_header`]) is what tells a reader how
/// to interpret them, so a TIFF written on a little-endian host is a little-endian TIFF.
pub struct TiffWriter<W> {
    writer: W,
    offset: u64,
}

impl<W: Write> TiffWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, offset: 0 }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub(crate) fn previous_ifd_pointer<K: super::TiffKind>(&self) -> u64 {
        self.offset() - core::mem::size_of::<K::OffsetType>() as u64
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), io::Error> {
        self.writer.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, n: u8) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_i8(&mut self, n: i8) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_u16(&mut self, n: u16) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_i16(&mut self, n: i16) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_u32(&mut self, n: u32) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_i32(&mut self, n: i32) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_u64(&mut self, n: u64) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_i64(&mut self, n: i64) -> Result<(), io::Error> {
        self.write_bytes(&n.to_ne_bytes())
    }

    pub fn write_f32(&mut self, n: f32) -> Result<(), io::Error> {
        self.write_bytes(&u32::to_ne_bytes(n.to_bits()))
    }

    pub fn write_f64(&mut self, n: f64) -> Result<(), io::Error> {
        self.write_bytes(&u64::to_ne_bytes(n.to_bits()))
    }

    pub fn pad_word_boundary(&mut self) -> Result<(), io::Error> {
        if self.offset % 2 != 0 {
            self.write_bytes(&[0])?;
        }

        Ok(())
    }
}

impl<W: Seek> TiffWriter<W> {
    pub fn goto_offset(&mut self, offset: u64) -> Result<(), io::Error> {
        self.offset = offset;
        self.writer.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn goto_end(&mut self) -> Result<(), io::Error> {
        self.offset = self.writer.seek(SeekFrom::End(0))?;
        Ok(())
    }
}
