//! # zipman
//!
//! A ZIP archive manager: list entries, extract all of them or an index
//! selection such as `"0,2,5-8"`, create archives, and verify them, with
//! optional traditional ZIP password protection.
//!
//! ## Features
//!
//! - Index-range selection parsing ([`selection`])
//! - Selective extraction with path-traversal protection, per-entry error
//!   reporting and progress callbacks ([`SelectiveExtractor`])
//! - STORED and DEFLATE entries, ZIP64 end records, ZipCrypto encryption
//! - Archive creation from files or directory trees ([`create`])
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use zipman::{LocalFileReader, SelectiveExtractor, ZipArchive, selection::parse_selection};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("archive.zip"))?);
//!     let archive = ZipArchive::open(reader).await?;
//!
//!     for entry in archive.entries() {
//!         println!("{:>4}  {}", entry.index, entry.file_name);
//!     }
//!
//!     let selection = parse_selection("0,2-3", archive.len())?;
//!     let result = SelectiveExtractor::new(&archive, "out")
//!         .run(&selection, |done, total| eprintln!("{done}/{total}"))
//!         .await;
//!     println!("extracted {} entries", result.extracted.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod create;
pub mod extract;
pub mod io;
pub mod password;
pub mod selection;
pub mod zip;

pub use cli::Cli;
pub use config::Config;
pub use extract::{ExtractionResult, SelectiveExtractor, SkipReason};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use selection::{InvalidSelection, SelectionSet};
pub use zip::{ArchiveError, ZipArchive, ZipFileEntry};
