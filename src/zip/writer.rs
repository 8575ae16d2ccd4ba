//! Sequential ZIP archive writer.
//!
//! Entries are compressed in memory so sizes and CRC are known before the
//! Local File Header is written; no data descriptors are emitted. Archives
//! larger than the classic 4 GiB / 65535-entry limits are rejected.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

use super::crypto::ZipCrypto;
use super::error::{ArchiveError, Result};
use super::structures::*;

/// Options applied to every entry written by a [`ZipWriter`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// 0 stores entries uncompressed, 1-9 selects the DEFLATE level.
    pub level: u32,
    /// Encrypt file entries with ZipCrypto when set.
    pub password: Option<Vec<u8>>,
}

struct CentralRecord {
    name: String,
    name_len: u16,
    flags: u16,
    method: CompressionMethod,
    modified: DosDateTime,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    external_attrs: u32,
    lfh_offset: u32,
}

pub struct ZipWriter<W: Write> {
    inner: W,
    offset: u64,
    options: WriteOptions,
    central: Vec<CentralRecord>,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(inner: W, options: WriteOptions) -> Self {
        Self {
            inner,
            offset: 0,
            options,
            central: Vec::new(),
        }
    }

    /// Options for entries added from now on.
    pub fn set_options(&mut self, options: WriteOptions) {
        self.options = options;
    }

    /// Add a file entry. `name` is stored verbatim, using `/` separators.
    pub fn add_file(&mut self, name: &str, data: &[u8], modified: DosDateTime) -> Result<()> {
        let mut crc = flate2::Crc::new();
        crc.update(data);
        let crc32 = crc.sum();

        let (method, mut payload) = if self.options.level == 0 {
            (CompressionMethod::Stored, data.to_vec())
        } else {
            let mut encoder =
                DeflateEncoder::new(Vec::new(), Compression::new(self.options.level.min(9)));
            encoder.write_all(data)?;
            (CompressionMethod::Deflate, encoder.finish()?)
        };

        let mut flags = name_flags(name);
        if let Some(password) = &self.options.password {
            flags |= FLAG_ENCRYPTED;
            let mut cipher = ZipCrypto::new(password);
            let header = cipher.encrypt_header((crc32 >> 24) as u8);
            cipher.encrypt_in_place(&mut payload);
            let mut encrypted = header.to_vec();
            encrypted.extend_from_slice(&payload);
            payload = encrypted;
        }

        let too_large = || ArchiveError::TooLarge {
            name: name.to_string(),
        };
        let record = CentralRecord {
            name: name.to_string(),
            name_len: name_length(name)?,
            flags,
            method,
            modified,
            crc32,
            compressed_size: u32::try_from(payload.len()).map_err(|_| too_large())?,
            uncompressed_size: u32::try_from(data.len()).map_err(|_| too_large())?,
            external_attrs: 0o100644 << 16,
            lfh_offset: 0,
        };
        self.write_entry(record, &payload)
    }

    /// Add a directory entry; a trailing `/` is appended when missing.
    pub fn add_directory(&mut self, name: &str, modified: DosDateTime) -> Result<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        let record = CentralRecord {
            flags: name_flags(&name),
            name_len: name_length(&name)?,
            name,
            method: CompressionMethod::Stored,
            modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            external_attrs: (0o040755 << 16) | 0x10,
            lfh_offset: 0,
        };
        self.write_entry(record, &[])
    }

    fn write_entry(&mut self, mut record: CentralRecord, payload: &[u8]) -> Result<()> {
        if self.central.len() >= 0xFFFF {
            return Err(ArchiveError::TooLarge { name: record.name });
        }
        record.lfh_offset = u32::try_from(self.offset).map_err(|_| ArchiveError::TooLarge {
            name: record.name.clone(),
        })?;

        let mut header = Vec::with_capacity(LFH_SIZE + record.name.len());
        header.write_all(LFH_SIGNATURE)?;
        header.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        header.write_u16::<LittleEndian>(record.flags)?;
        header.write_u16::<LittleEndian>(record.method.as_u16())?;
        header.write_u16::<LittleEndian>(record.modified.time)?;
        header.write_u16::<LittleEndian>(record.modified.date)?;
        header.write_u32::<LittleEndian>(record.crc32)?;
        header.write_u32::<LittleEndian>(record.compressed_size)?;
        header.write_u32::<LittleEndian>(record.uncompressed_size)?;
        header.write_u16::<LittleEndian>(record.name_len)?;
        header.write_u16::<LittleEndian>(0)?;
        header.write_all(record.name.as_bytes())?;

        self.inner.write_all(&header)?;
        self.inner.write_all(payload)?;
        self.offset += (header.len() + payload.len()) as u64;

        log::debug!(
            "wrote '{}' ({} -> {} bytes)",
            record.name,
            record.uncompressed_size,
            record.compressed_size
        );
        self.central.push(record);
        Ok(())
    }

    /// Write the central directory and end record, returning the sink.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.offset;
        let mut cd = Vec::new();

        for record in &self.central {
            cd.write_all(CDFH_SIGNATURE)?;
            // Made by: UNIX, format version 2.0
            cd.write_u16::<LittleEndian>((3 << 8) | VERSION_NEEDED)?;
            cd.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            cd.write_u16::<LittleEndian>(record.flags)?;
            cd.write_u16::<LittleEndian>(record.method.as_u16())?;
            cd.write_u16::<LittleEndian>(record.modified.time)?;
            cd.write_u16::<LittleEndian>(record.modified.date)?;
            cd.write_u32::<LittleEndian>(record.crc32)?;
            cd.write_u32::<LittleEndian>(record.compressed_size)?;
            cd.write_u32::<LittleEndian>(record.uncompressed_size)?;
            cd.write_u16::<LittleEndian>(record.name_len)?;
            cd.write_u16::<LittleEndian>(0)?; // extra field
            cd.write_u16::<LittleEndian>(0)?; // comment
            cd.write_u16::<LittleEndian>(0)?; // disk number start
            cd.write_u16::<LittleEndian>(0)?; // internal attributes
            cd.write_u32::<LittleEndian>(record.external_attrs)?;
            cd.write_u32::<LittleEndian>(record.lfh_offset)?;
            cd.write_all(record.name.as_bytes())?;
        }

        let too_large = || ArchiveError::TooLarge {
            name: "central directory".to_string(),
        };
        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: self.central.len() as u16,
            total_entries: self.central.len() as u16,
            cd_size: u32::try_from(cd.len()).map_err(|_| too_large())?,
            cd_offset: u32::try_from(cd_offset).map_err(|_| too_large())?,
            comment_len: 0,
        };

        self.inner.write_all(&cd)?;
        eocd.write_to(&mut self.inner)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn name_length(name: &str) -> Result<u16> {
    u16::try_from(name.len()).map_err(|_| ArchiveError::TooLarge {
        name: name.to_string(),
    })
}

fn name_flags(name: &str) -> u16 {
    if name.is_ascii() { 0 } else { FLAG_UTF8 }
}
