//! ZIP archive reading and writing.
//!
//! - [`structures`]: records of the ZIP format (EOCD, headers, entries)
//! - [`parser`]: locating and parsing the central directory
//! - [`archive`]: opened archive handle, entry decoding and extraction
//! - [`crypto`]: traditional PKWARE encryption
//! - [`writer`]: building new archives
//!
//! Reading starts from the End of Central Directory record at the tail of
//! the file, so listing never touches entry data.
//!
//! ## Supported Features
//!
//! - ZIP64 end records and extra fields when reading
//! - STORED and DEFLATE (through `flate2`)
//! - Traditional PKWARE encryption for reading and writing
//!
//! AES encryption, multi-disk archives and other compression methods are
//! reported as unsupported per entry.

mod archive;
pub mod crypto;
mod error;
mod parser;
mod structures;
mod writer;

pub use archive::{ArchiveStats, ZipArchive};
pub(crate) use archive::write_output;
pub use error::{ArchiveError, Result};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{WriteOptions, ZipWriter};
