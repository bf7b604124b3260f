use crate::{
    encoder::{Ifd, Ifd8, TiffValue, TiffWriter},
    error::{TiffResult, UsageError},
    ifd::{BufferedEntry, TagDirectory},
    tags::Tag,
    TiffError, TiffKind,
};
use std::{
    io::{Seek, Write},
    marker::PhantomData,
};

/// Low level interface to encode one IFD's worth of tags.
///
/// You should call `finish` on this when you are done with it; encoding can silently fail while
/// this is dropping.
pub struct DirectoryEncoder<'a, W: 'a + Write + Seek, K: TiffKind> {
    pub writer: &'a mut TiffWriter<W>,
    dropped: bool,
    ifd_pointer_pos: u64,
    ifd: TagDirectory<BufferedEntry>,
    /// A single, manually-wired nested IFD (e.g. an EXIF or GPS directory): the caller writes
    /// whatever pointer tag it likes with the offset [`subdirectory_close`][Self::subdirectory_close]
    /// returns.
    sub_ifd: Option<TagDirectory<BufferedEntry>>,
    /// The `SubIFD` array slot currently being written, if any.
    sub_ifd_slot: Option<TagDirectory<BufferedEntry>>,
    /// Offsets of `SubIFD` array slots already written, in the order they were closed. Flushed
    /// into the `SubIFD` tag automatically when this directory is written, unless the caller
    /// already wrote that tag by hand.
    sub_ifd_offsets: Vec<u64>,
    _phantom: PhantomData<K>,
}

impl<'a, W: 'a + Write + Seek, K: TiffKind> DirectoryEncoder<'a, W, K> {
    pub fn new(writer: &'a mut TiffWriter<W>) -> TiffResult<Self> {
        // the previous word is the IFD offset position
        let ifd_pointer_pos = writer.previous_ifd_pointer::<K>();
        writer.pad_word_boundary()?;
        Ok(DirectoryEncoder::<W, K> {
            writer,
            dropped: false,
            ifd_pointer_pos,
            ifd: TagDirectory::new(),
            sub_ifd: None,
            sub_ifd_slot: None,
            sub_ifd_offsets: Vec::new(),
            _phantom: PhantomData,
        })
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.ifd.contains_key(&tag)
    }

    /// Start writing to a sub-IFD (e.g. an EXIF or GPS directory referenced from a tag).
    pub fn subdirectory_start(&mut self) {
        self.sub_ifd = Some(TagDirectory::new());
    }

    /// Stop writing to the sub-IFD and resume the master IFD, returning the offset the
    /// sub-IFD was written at.
    pub fn subdirectory_close(&mut self) -> TiffResult<u64> {
        let ifd = self
            .sub_ifd
            .take()
            .ok_or(TiffError::UsageError(UsageError::NoOpenSubIfd))?;

        let offset = self.write_directory(ifd)?;
        K::write_offset(self.writer, 0)?;

        Ok(offset)
    }

    /// Starts writing the next slot of this directory's `SubIFD` array.
    ///
    /// Writing `N` consecutive `sub_ifd_array_start`/[`sub_ifd_array_close`][Self::sub_ifd_array_close]
    /// pairs populates an `N`-element `SubIFD` tag automatically when this directory is
    /// written or checkpointed; unlike [`subdirectory_start`][Self::subdirectory_start], the
    /// caller does not need to write the pointer tag itself.
    pub fn sub_ifd_array_start(&mut self) {
        self.sub_ifd_slot = Some(TagDirectory::new());
    }

    /// Stops writing the current `SubIFD` array slot, writing it out and recording its offset.
    pub fn sub_ifd_array_close(&mut self) -> TiffResult<u64> {
        let ifd = self
            .sub_ifd_slot
            .take()
            .ok_or(TiffError::UsageError(UsageError::NoOpenSubIfd))?;

        let offset = self.write_directory(ifd)?;
        K::write_offset(self.writer, 0)?;
        self.sub_ifd_offsets.push(offset);

        Ok(offset)
    }

    /// Write a single IFD tag.
    pub fn write_tag<V: TiffValue>(&mut self, tag: Tag, value: V) -> TiffResult<()> {
        let mut bytes = Vec::with_capacity(value.bytes());
        {
            let mut writer = TiffWriter::new(&mut bytes);
            value.write(&mut writer)?;
        }

        let active_ifd = if let Some(v) = &mut self.sub_ifd_slot {
            v
        } else if let Some(v) = &mut self.sub_ifd {
            v
        } else {
            &mut self.ifd
        };

        active_ifd.insert(
            tag,
            BufferedEntry {
                type_: value.is_type(),
                count: value.count().try_into()?,
                data: bytes,
            },
        );

        Ok(())
    }

    /// Writes `tag` as an array of unsigned integers, choosing the narrowest on-disk type that
    /// can hold every value: `SHORT` if all fit in 16 bits, else `LONG`, else (BigTIFF only)
    /// `LONG8`. Used for strip/tile offset and byte-count arrays, whose natural in-memory
    /// representation (`u64`, to cover BigTIFF) would otherwise always force the widest type.
    pub fn write_narrow_uints(&mut self, tag: Tag, values: &[u64]) -> TiffResult<()> {
        let max = values.iter().copied().max().unwrap_or(0);
        if max <= u64::from(u16::MAX) {
            let narrowed: Vec<u16> = values.iter().map(|&v| v as u16).collect();
            self.write_tag(tag, &narrowed[..])
        } else if max <= u64::from(u32::MAX) {
            let narrowed: Vec<u32> = values.iter().map(|&v| v as u32).collect();
            self.write_tag(tag, &narrowed[..])
        } else if K::is_big() {
            self.write_tag(tag, values)
        } else {
            Err(TiffError::IntSizeError)
        }
    }

    /// Closes any still-open `SubIFD` array slot and, if any slots were written and the caller
    /// has not already written `Tag::SubIfd` itself, writes the accumulated offsets as that tag.
    fn flush_sub_ifd_array(&mut self) -> TiffResult<()> {
        if self.sub_ifd_slot.is_some() {
            self.sub_ifd_array_close()?;
        }
        if self.sub_ifd_offsets.is_empty() || self.contains(Tag::SubIfd) {
            return Ok(());
        }
        if K::is_big() {
            let ifds: Vec<Ifd8> = self.sub_ifd_offsets.iter().map(|&o| Ifd8(o)).collect();
            self.write_tag(Tag::SubIfd, &ifds[..])?;
        } else {
            let ifds: Vec<Ifd> = self
                .sub_ifd_offsets
                .iter()
                .map(|&o| u32::try_from(o).map(Ifd).map_err(|_| TiffError::IntSizeError))
                .collect::<TiffResult<_>>()?;
            self.write_tag(Tag::SubIfd, &ifds[..])?;
        }
        Ok(())
    }

    fn write_directory<T: Ord + Into<u16>>(
        &mut self,
        mut ifd: crate::ifd::ImageFileDirectory<T, BufferedEntry>,
    ) -> TiffResult<u64> {
        // Prep work: go through the entries and write the ones that do not fit in an entry.
        for &mut BufferedEntry {
            data: ref mut bytes,
            ..
        } in ifd.values_mut()
        {
            let data_bytes = K::OffsetType::BYTE_LEN as usize;

            if bytes.len() > data_bytes {
                // Every out-of-line payload starts at an even offset; pad first, then record
                // where we are, write the payload, and overwrite the in-entry slot with that
                // offset.
                self.writer.pad_word_boundary()?;
                let offset = self.writer.offset();
                self.writer.write_bytes(bytes)?;

                *bytes = vec![0; data_bytes];
                K::write_offset(&mut TiffWriter::new(bytes as &mut [u8]), offset)?;
            } else {
                while bytes.len() < data_bytes {
                    bytes.push(0);
                }
            }
        }

        // Record the offset, then write the count followed by every entry in ascending tag order
        // (guaranteed by the BTreeMap-backed ImageFileDirectory).
        let ifd_offset = self.writer.offset();

        K::write_entry_count(self.writer, ifd.len())?;
        for (
            tag,
            BufferedEntry {
                type_: field_type,
                count,
                data,
            },
        ) in ifd.into_iter()
        {
            self.writer.write_u16(tag.into())?;
            self.writer.write_u16(field_type.to_u16())?;
            K::convert_offset(count)?.write(self.writer)?;
            self.writer.write_bytes(&data)?;
        }

        Ok(ifd_offset)
    }

    /// Write some data to the tiff file, returning the offset the data was written at.
    ///
    /// Used for writing strips/tiles ahead of the directory that references them.
    pub fn write_data<T: TiffValue>(&mut self, value: T) -> TiffResult<u64> {
        let offset = self.writer.offset();
        value.write(self.writer)?;
        Ok(offset)
    }

    pub fn finish_internal(&mut self) -> TiffResult<()> {
        if self.sub_ifd.is_some() {
            self.subdirectory_close()?;
        }
        self.flush_sub_ifd_array()?;

        let ifd = std::mem::replace(&mut self.ifd, TagDirectory::new());
        let ifd_pointer = self.write_directory(ifd)?;
        let curr_pos = self.writer.offset();

        self.writer.goto_offset(self.ifd_pointer_pos)?;
        K::write_offset(self.writer, ifd_pointer)?;
        self.writer.goto_offset(curr_pos)?;
        K::write_offset(self.writer, 0)?;

        self.dropped = true;

        Ok(())
    }

    /// Write out the IFD, linking it into the chain.
    pub fn finish(mut self) -> TiffResult<()> {
        self.finish_internal()
    }

    /// Write the directory as it stands right now, without consuming this encoder.
    ///
    /// Unlike [`finish`][Self::finish], the in-memory tag set is left untouched and further
    /// [`write_tag`][Self::write_tag] calls may follow; a later `checkpoint` or `finish` call
    /// writes a fresh copy of the (possibly grown) directory and re-patches the chain pointer to
    /// point at that copy, leaving the earlier copy as unreferenced, harmless waste in the file.
    /// Useful for making a partially-written image file readable before the full directory (e.g.
    /// all of its strips) is known.
    pub fn checkpoint(&mut self) -> TiffResult<()> {
        if self.sub_ifd.is_some() {
            self.subdirectory_close()?;
        }
        self.flush_sub_ifd_array()?;

        let ifd_pointer = self.write_directory(self.ifd.clone())?;
        let curr_pos = self.writer.offset();

        self.writer.goto_offset(self.ifd_pointer_pos)?;
        K::write_offset(self.writer, ifd_pointer)?;
        self.writer.goto_offset(curr_pos)?;
        K::write_offset(self.writer, 0)?;

        Ok(())
    }
}

impl<'a, W: Write + Seek, K: TiffKind> Drop for DirectoryEncoder<'a, W, K> {
    fn drop(&mut self) {
        if !self.dropped {
            let _ = self.finish_internal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decoder::Decoder, tiff_kind::TiffKindStandard, TiffKind};
    use std::io::Cursor;

    #[test]
    fn checkpoint_leaves_a_readable_file_and_can_be_followed_by_more_tags() {
        let mut data = Cursor::new(Vec::new());
        {
            let mut writer = TiffWriter::new(&mut data);
            TiffKindStandard::write_header(&mut writer).unwrap();
            let mut dir: DirectoryEncoder<_, TiffKindStandard> =
                DirectoryEncoder::new(&mut writer).unwrap();

            dir.write_tag(Tag::ImageWidth, 10u32).unwrap();
            dir.checkpoint().unwrap();

            // The directory is still open: more tags can be added after a checkpoint.
            dir.write_tag(Tag::ImageLength, 20u32).unwrap();
            dir.finish().unwrap();
        }

        let mut bytes = data.into_inner();
        let mut cursor = Cursor::new(&mut bytes);
        cursor.set_position(0);
        let mut decoder = Decoder::new(cursor).unwrap();
        let read = decoder.read_next_directory().unwrap().unwrap().directory;

        assert_eq!(read.image_width(), Some(&10));
        assert_eq!(read.image_length(), Some(&20));
    }
}
