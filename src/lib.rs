//! Reading and writing of TIFF and BigTIFF image file directories.
//!
//! This crate covers the *directory* layer of the TIFF family of formats: headers, IFD chains,
//! tags, and the typed values they carry. It does not decode pixel data, nor does it implement any
//! of the compression schemes a full image codec would need.
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> - The TIFF specification

mod bytecast;
pub mod decoder;
mod directory;
pub mod encoder;
mod error;
mod limits;
pub mod registry;
pub mod tags;
mod tiff_kind;

pub mod ifd;

pub use self::directory::{Directory, DirectoryError};
pub use self::error::{DecodeError, TiffError, TiffFormatError, TiffResult, UsageError};
pub use self::limits::{DecodeLimits, EncodeLimits};
pub use self::registry::{FieldDescriptor, FieldRegistry};
pub use self::tiff_kind::{TiffKind, TiffKindBig, TiffKindStandard};
