use std::error::Error;
use std::fmt;
use std::io;
use std::str;
use std::string;

use crate::ifd::Value;
use crate::tags::Tag;

/// Errors that can occur while reading or writing a TIFF directory.
#[derive(Debug)]
pub enum TiffError {
    /// The file or directory is not formatted properly.
    FormatError(TiffFormatError),

    /// A tag value could not be coerced to the type the caller asked for.
    DecodeError(DecodeError),

    /// The caller used the API in a way that is not valid for this directory.
    UsageError(UsageError),

    /// An I/O error occurred while reading or writing.
    IoError(io::Error),

    /// An integer conversion to or from a platform size failed, either due to limits of the
    /// platform size or limits of the format.
    IntSizeError,
}

/// The file is not formatted properly.
///
/// This indicates that the writer producing the file might behave incorrectly or that the input
/// file has been corrupted. The list of variants may grow to incorporate errors of future
/// features. Matching against this exhaustively is not covered by interface stability guarantees.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TiffFormatError {
    /// Neither `II` nor `MM` was found at the start of the stream.
    TiffSignatureNotFound,
    /// The byte-order mark was recognized but the magic number following it was neither 42 nor 43.
    TiffSignatureInvalid,
    /// A BigTIFF header declared an offset byte size other than 8, or a non-zero reserved field.
    BigTiffSignatureInvalid,
    /// The chain did not contain any IFD at all.
    ImageFileDirectoryNotFound,
    /// A directory claims more entries than the configured entry-count limit allows.
    TooManyEntries { limit: usize, actual: usize },
    /// A tag value, directory, or chain exceeded the configured byte-size limit.
    SizeSanity { limit: usize, requested: usize },
    /// A mandatory tag for this read was absent from the directory.
    MissingRequired(Tag),
    /// A mandatory tag was present but carried zero values.
    RequiredTagEmpty(Tag),
    /// `ColorMap` is mandatory whenever `PhotometricInterpretation` selects a palette image, but
    /// was absent.
    PaletteWithoutColorMap,
    /// Both (or neither) of the strip and tile tag families were present.
    StripTileTagConflict,
    /// Following `next`-IFD pointers revisited an offset already on the chain.
    CycleInOffsets,
    /// `SamplesPerPixel` was zero, which makes every per-sample tag vacuous.
    SamplesPerPixelIsZero,
    /// A catch-all for malformed input that doesn't fit a more specific variant.
    Malformed(String),
}

impl fmt::Display for TiffFormatError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::TiffFormatError::*;
        match self {
            TiffSignatureNotFound => write!(fmt, "TIFF signature not found."),
            TiffSignatureInvalid => write!(fmt, "TIFF signature invalid."),
            BigTiffSignatureInvalid => write!(fmt, "BigTIFF header fields invalid."),
            ImageFileDirectoryNotFound => write!(fmt, "Image file directory not found."),
            TooManyEntries { limit, actual } => write!(
                fmt,
                "Directory has {actual} entries, which exceeds the limit of {limit}."
            ),
            SizeSanity { limit, requested } => write!(
                fmt,
                "Refusing to allocate {requested} bytes, which exceeds the limit of {limit}."
            ),
            MissingRequired(tag) => write!(fmt, "Required tag `{:?}` not found.", tag),
            RequiredTagEmpty(tag) => write!(fmt, "Required tag `{:?}` was empty.", tag),
            PaletteWithoutColorMap => write!(
                fmt,
                "Palette-color image is missing its ColorMap tag."
            ),
            StripTileTagConflict => write!(
                fmt,
                "File should contain either (StripByteCounts and StripOffsets) or (TileByteCounts and TileOffsets), other combination was found."
            ),
            CycleInOffsets => write!(fmt, "File contained a cycle in the list of IFDs."),
            SamplesPerPixelIsZero => write!(fmt, "Samples per pixel is zero."),
            Malformed(reason) => write!(fmt, "Malformed TIFF data: {reason}."),
        }
    }
}

/// A tag value did not have the shape the caller expected.
///
/// This is distinct from [`TiffFormatError`]: the directory itself is well-formed, but a specific
/// accessor could not produce the type it promised.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The stored value's type does not coerce to what the caller asked for.
    Type {
        tag: Option<Tag>,
        expected: &'static str,
        found: Value,
    },
    /// The stored value has the wrong number of components.
    Count {
        tag: Option<Tag>,
        expected: usize,
        found: usize,
    },
    /// The stored value is out of the range the caller can represent or accept.
    Range { tag: Option<Tag>, reason: &'static str },
    /// A per-sample tag (e.g. `BitsPerSample`) did not carry the same value for every sample,
    /// where the caller required uniformity.
    PerSampleDiffers { tag: Tag },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use self::DecodeError::*;
        match self {
            Type {
                tag,
                expected,
                found,
            } => write!(
                fmt,
                "Tag {} expected a {expected} value, found {found:?}.",
                fmt_tag(tag)
            ),
            Count {
                tag,
                expected,
                found,
            } => write!(
                fmt,
                "Tag {} expected {expected} value(s), found {found}.",
                fmt_tag(tag)
            ),
            Range { tag, reason } => {
                write!(fmt, "Tag {} out of range: {reason}.", fmt_tag(tag))
            }
            PerSampleDiffers { tag } => write!(
                fmt,
                "Tag `{:?}` must be identical across samples but was not.",
                tag
            ),
        }
    }
}

fn fmt_tag(tag: &Option<Tag>) -> String {
    match tag {
        Some(tag) => format!("`{:?}`", tag),
        None => "<unspecified>".to_string(),
    }
}

/// The caller attempted an operation the API does not allow in the directory's current state.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum UsageError {
    /// A raw tag id has not been registered with the field registry in use and no default
    /// behavior was requested.
    UnknownTag(u16),
    /// The field is locked (fixed by a prior write) and cannot be overwritten.
    Locked(Tag),
    /// An attempt to close a sub-IFD that was never opened.
    NoOpenSubIfd,
    /// An attempt to write a tag into a directory that has already been finished.
    DirectoryClosed,
}

impl fmt::Display for UsageError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::UsageError::*;
        match self {
            UnknownTag(id) => write!(fmt, "Tag id {id} is not registered."),
            Locked(tag) => write!(fmt, "Tag `{:?}` is locked and cannot be rewritten.", tag),
            NoOpenSubIfd => write!(fmt, "No sub-IFD is currently open."),
            DirectoryClosed => write!(fmt, "Directory has already been finished."),
        }
    }
}

impl fmt::Display for TiffError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TiffError::FormatError(e) => write!(fmt, "Format error: {}", e),
            TiffError::DecodeError(e) => write!(fmt, "Decode error: {}", e),
            TiffError::UsageError(e) => write!(fmt, "Usage error: {}", e),
            TiffError::IoError(e) => e.fmt(fmt),
            TiffError::IntSizeError => write!(fmt, "Platform or format size limits exceeded"),
        }
    }
}

impl Error for TiffError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TiffError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TiffError {
    fn from(err: io::Error) -> TiffError {
        TiffError::IoError(err)
    }
}

impl From<str::Utf8Error> for TiffError {
    fn from(_err: str::Utf8Error) -> TiffError {
        TiffError::FormatError(TiffFormatError::Malformed("invalid UTF-8 in ASCII tag".into()))
    }
}

impl From<string::FromUtf8Error> for TiffError {
    fn from(_err: string::FromUtf8Error) -> TiffError {
        TiffError::FormatError(TiffFormatError::Malformed("invalid UTF-8 in ASCII tag".into()))
    }
}

impl From<TiffFormatError> for TiffError {
    fn from(err: TiffFormatError) -> TiffError {
        TiffError::FormatError(err)
    }
}

impl From<DecodeError> for TiffError {
    fn from(err: DecodeError) -> TiffError {
        TiffError::DecodeError(err)
    }
}

impl From<UsageError> for TiffError {
    fn from(err: UsageError) -> TiffError {
        TiffError::UsageError(err)
    }
}

impl From<std::num::TryFromIntError> for TiffError {
    fn from(_err: std::num::TryFromIntError) -> TiffError {
        TiffError::IntSizeError
    }
}

/// Result of a directory read/write operation.
pub type TiffResult<T> = Result<T, TiffError>;
