use crate::{
    DecodeError, DecodeLimits, TiffError, TiffFormatError, TiffKind, TiffResult,
    decoder::decoded_entry::DecodedEntry,
    ifd::{TagDirectory, Value},
    tags::Tag,
};
use std::io::{Read, Seek};

pub(crate) struct TagReader<'a, R: Read + Seek, K: TiffKind> {
    pub reader: &'a mut crate::decoder::stream::EndianReader<R>,
    pub ifd: &'a TagDirectory<DecodedEntry<K>>,
    pub limits: &'a DecodeLimits,
}

impl<'a, R: Read + Seek, K: TiffKind> TagReader<'a, R, K> {
    pub(crate) fn find_tag(&mut self, tag: Tag) -> TiffResult<Option<Value>> {
        Ok(match self.ifd.get(&tag) {
            Some(entry) => Some(entry.clone().val(self.limits, self.reader)?),
            None => None,
        })
    }

    pub(crate) fn require_tag(&mut self, tag: Tag) -> TiffResult<Value> {
        match self.find_tag(tag)? {
            Some(val) => Ok(val),
            None => Err(TiffError::FormatError(TiffFormatError::MissingRequired(
                tag,
            ))),
        }
    }

    pub fn find_tag_uint_vec<T: TryFrom<u64>>(&mut self, tag: Tag) -> TiffResult<Option<Vec<T>>> {
        self.find_tag(tag)?
            .map(|v| v.into_u64_vec())
            .transpose()?
            .map(|v| {
                v.into_iter()
                    .map(|u| {
                        T::try_from(u).map_err(|_| {
                            TiffError::DecodeError(DecodeError::Range {
                                tag: Some(tag),
                                reason: "value does not fit target integer type",
                            })
                        })
                    })
                    .collect()
            })
            .transpose()
    }
}
