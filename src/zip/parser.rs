//! Central directory discovery and parsing.
//!
//! An archive is read back to front: the end record at the tail points at
//! the central directory (through the ZIP64 locator when its fields are
//! saturated), and the central directory describes every entry. Entry data
//! is only touched when an entry is read.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;

use super::error::{ArchiveError, Result};
use super::structures::*;

/// Largest archive comment, which bounds the backwards search.
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// ZIP64 extended information extra field.
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Location and size of the central directory.
#[derive(Debug, Clone, Copy)]
struct DirectoryLocation {
    offset: u64,
    size: u64,
    entries: u64,
}

/// Reads archive metadata from a [`ReadAt`] source.
///
/// Usually driven through [`ZipArchive`](super::ZipArchive).
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Locate the end record and return it with its absolute offset.
    ///
    /// The tail of the archive (end record plus the longest possible
    /// comment) is read once and scanned backwards. A candidate is only
    /// accepted when its comment length reaches exactly to the end of the
    /// file, so a signature inside the comment is not mistaken for it.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::NotAZipFile`] when no end record is found.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let record = EndOfCentralDirectory::SIZE;
        if self.size < record as u64 {
            return Err(ArchiveError::NotAZipFile);
        }

        let tail_len = self.size.min((record + MAX_COMMENT_LEN) as u64);
        let tail_start = self.size - tail_len;
        let mut tail = vec![0u8; tail_len as usize];
        self.reader.read_exact_at(tail_start, &mut tail).await?;

        let found = (0..=tail.len() - record).rev().find(|&pos| {
            let candidate = &tail[pos..pos + record];
            let comment_len = u16::from_le_bytes([candidate[20], candidate[21]]) as usize;
            candidate.starts_with(EndOfCentralDirectory::SIGNATURE)
                && pos + record + comment_len == tail.len()
        });

        match found {
            Some(pos) => {
                let eocd = EndOfCentralDirectory::from_bytes(&tail[pos..pos + record])?;
                Ok((eocd, tail_start + pos as u64))
            }
            None => Err(ArchiveError::NotAZipFile),
        }
    }

    /// Read the ZIP64 end record through the locator just before `eocd_offset`.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_at = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or(ArchiveError::InvalidHeader("ZIP64 locator"))?;
        let mut raw = [0u8; Zip64EOCDLocator::SIZE];
        self.reader.read_exact_at(locator_at, &mut raw).await?;
        let locator = Zip64EOCDLocator::from_bytes(&raw)?;

        let mut record = [0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut record)
            .await?;
        Zip64EOCD::from_bytes(&record)
    }

    async fn locate_directory(&self) -> Result<DirectoryLocation> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let location = if eocd.is_zip64() {
            let zip64 = self.read_zip64_eocd(eocd_offset).await?;
            DirectoryLocation {
                offset: zip64.cd_offset,
                size: zip64.cd_size,
                entries: zip64.total_entries,
            }
        } else {
            DirectoryLocation {
                offset: eocd.cd_offset.into(),
                size: eocd.cd_size.into(),
                entries: eocd.total_entries.into(),
            }
        };

        let in_bounds = location.offset.saturating_add(location.size) <= self.size;
        let fits = location.entries.saturating_mul(CDFH_MIN_SIZE as u64) <= location.size;
        if !in_bounds || !fits {
            return Err(ArchiveError::InvalidHeader("Central Directory bounds"));
        }
        Ok(location)
    }

    /// Parse every central directory record, in directory order.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let location = self.locate_directory().await?;
        log::debug!(
            "central directory: {} entries, {} bytes at offset {}",
            location.entries,
            location.size,
            location.offset
        );

        let mut directory = vec![0u8; location.size as usize];
        self.reader
            .read_exact_at(location.offset, &mut directory)
            .await?;

        let mut cursor = Cursor::new(directory.as_slice());
        (0..location.entries as usize)
            .map(|index| parse_directory_record(&mut cursor, index))
            .collect()
    }

    /// Absolute offset of an entry's stored bytes.
    ///
    /// Name and extra lengths come from the local header, which may carry
    /// a different extra field than the central directory.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut header = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut header)
            .await?;
        if !header.starts_with(LFH_SIGNATURE) {
            return Err(ArchiveError::InvalidHeader("Local File Header"));
        }

        let name_len = u16::from_le_bytes([header[26], header[27]]) as u64;
        let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;
        Ok(entry.lfh_offset + LFH_SIZE as u64 + name_len + extra_len)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

fn parse_directory_record(cursor: &mut Cursor<&[u8]>, index: usize) -> Result<ZipFileEntry> {
    let mut signature = [0u8; 4];
    cursor.read_exact(&mut signature)?;
    if signature != CDFH_SIGNATURE {
        return Err(ArchiveError::InvalidHeader("Central Directory File Header"));
    }

    // version made by, version needed
    cursor.set_position(cursor.position() + 4);
    let flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed = cursor.read_u32::<LittleEndian>()?;
    let uncompressed = cursor.read_u32::<LittleEndian>()?;
    let name_len = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_len = cursor.read_u16::<LittleEndian>()? as u64;
    let comment_len = cursor.read_u16::<LittleEndian>()? as u64;
    // disk number start, internal and external attributes
    cursor.set_position(cursor.position() + 8);
    let lfh_offset = cursor.read_u32::<LittleEndian>()?;

    let mut name = vec![0u8; name_len];
    cursor.read_exact(&mut name)?;
    // Non-UTF-8 (CP437) names stay listable
    let file_name = String::from_utf8_lossy(&name).into_owned();

    let extra_end = cursor.position() + extra_len;
    let mut sizes = Zip64Sizes {
        uncompressed: uncompressed.into(),
        compressed: compressed.into(),
        lfh_offset: lfh_offset.into(),
    };
    while cursor.position() + 4 <= extra_end {
        let id = cursor.read_u16::<LittleEndian>()?;
        let len = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = cursor.position() + len;
        if id == ZIP64_EXTRA_ID {
            sizes.read_extra(cursor, field_end)?;
        }
        cursor.set_position(field_end);
    }
    cursor.set_position(extra_end + comment_len);

    Ok(ZipFileEntry {
        index,
        is_directory: file_name.ends_with('/') || file_name.ends_with('\\'),
        file_name,
        flags,
        compression_method: CompressionMethod::from_u16(method),
        compressed_size: sizes.compressed,
        uncompressed_size: sizes.uncompressed,
        crc32,
        lfh_offset: sizes.lfh_offset,
        last_mod_time,
        last_mod_date,
    })
}

/// Fields that the ZIP64 extra field can widen.
struct Zip64Sizes {
    uncompressed: u64,
    compressed: u64,
    lfh_offset: u64,
}

impl Zip64Sizes {
    /// Only values saturated in the fixed header appear, in this order.
    fn read_extra(&mut self, cursor: &mut Cursor<&[u8]>, field_end: u64) -> Result<()> {
        for value in [
            &mut self.uncompressed,
            &mut self.compressed,
            &mut self.lfh_offset,
        ] {
            if *value == u32::MAX as u64 && cursor.position() + 8 <= field_end {
                *value = cursor.read_u64::<LittleEndian>()?;
            }
        }
        Ok(())
    }
}
