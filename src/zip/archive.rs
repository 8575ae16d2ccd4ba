use flate2::read::DeflateDecoder;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::io::ReadAt;

use super::crypto::{ENCRYPTION_HEADER_SIZE, ZipCrypto};
use super::error::{ArchiveError, Result};
use super::parser::ZipParser;
use super::structures::{
    CompressionMethod, FLAG_DATA_DESCRIPTOR, FLAG_STRONG_ENCRYPTION, METHOD_AES, ZipFileEntry,
    ratio,
};

/// Totals over the entries of an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: usize,
    pub directories: usize,
    pub encrypted_files: usize,
    /// Sum of uncompressed file sizes, saturating.
    pub total_size: u64,
    /// Sum of compressed file sizes, saturating.
    pub compressed_size: u64,
}

impl ArchiveStats {
    pub fn from_entries(entries: &[ZipFileEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut stats, entry| {
            if entry.is_directory {
                stats.directories += 1;
            } else {
                stats.files += 1;
                stats.encrypted_files += usize::from(entry.is_encrypted());
                stats.total_size = stats.total_size.saturating_add(entry.uncompressed_size);
                stats.compressed_size = stats.compressed_size.saturating_add(entry.compressed_size);
            }
            stats
        })
    }

    /// Space saved over all files, in percent.
    pub fn compression_ratio(&self) -> f64 {
        ratio(self.total_size, self.compressed_size)
    }
}

/// An opened ZIP archive with its central directory loaded.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
}

impl<R: ReadAt> ZipArchive<R> {
    /// Open an archive by reading its central directory.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::NotAZipFile`] when the source has no end-of-central-
    /// directory record.
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files().await?;
        Ok(Self { parser, entries })
    }

    /// All entries in central directory order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ZipFileEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> ArchiveStats {
        ArchiveStats::from_entries(&self.entries)
    }

    /// Size of the archive itself in bytes.
    pub fn archive_size(&self) -> u64 {
        self.parser.size()
    }

    /// True when any file entry is encrypted.
    pub fn requires_password(&self) -> bool {
        self.entries
            .iter()
            .any(|e| !e.is_directory && e.is_encrypted())
    }

    /// Read, decrypt, decompress and CRC-check an entry.
    pub async fn read_entry(&self, entry: &ZipFileEntry, password: Option<&[u8]>) -> Result<Vec<u8>> {
        if entry.is_directory {
            return Ok(Vec::new());
        }

        if entry.compressed_size > self.parser.size() {
            return Err(corrupt(entry, "compressed size exceeds archive size"));
        }

        let data_offset = self.parser.get_data_offset(entry).await?;
        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .await
            .map_err(|e| corrupt(entry, &e.to_string()))?;

        let encrypted = entry.is_encrypted();
        let payload = if encrypted {
            decrypt(entry, raw, password)?
        } else {
            raw
        };

        // Once the check byte passed, garbage after decryption means a wrong key.
        let data = match decompress(entry, &payload) {
            Err(ArchiveError::Corrupt { .. }) if encrypted => return Err(wrong_password(entry)),
            other => other?,
        };

        let mut crc = flate2::Crc::new();
        crc.update(&data);
        if data.len() as u64 != entry.uncompressed_size || crc.sum() != entry.crc32 {
            if encrypted {
                return Err(wrong_password(entry));
            }
            if data.len() as u64 != entry.uncompressed_size {
                return Err(corrupt(entry, "size mismatch"));
            }
            return Err(ArchiveError::CrcMismatch {
                name: entry.file_name.clone(),
                expected: entry.crc32,
                actual: crc.sum(),
            });
        }

        Ok(data)
    }

    /// Extract an entry to `output_path`, creating parent directories.
    pub async fn extract_to_file(
        &self,
        entry: &ZipFileEntry,
        output_path: &Path,
        password: Option<&[u8]>,
    ) -> Result<()> {
        let data = self.read_entry(entry, password).await?;
        write_output(entry, output_path, &data).await?;
        Ok(())
    }

    /// Check a password against the encrypted file entries.
    ///
    /// Entries are tried smallest first. The first one that decodes, or
    /// fails on the password, decides the answer. Entries that fail for
    /// other reasons (damage, unsupported method) are passed over, and
    /// when none can decide the password is accepted so those failures
    /// surface per entry later.
    pub async fn check_password(&self, password: &[u8]) -> bool {
        let mut candidates: Vec<&ZipFileEntry> = self
            .entries
            .iter()
            .filter(|e| !e.is_directory && e.is_encrypted())
            .collect();
        candidates.sort_by_key(|e| e.compressed_size);

        for entry in candidates {
            match self.read_entry(entry, Some(password)).await {
                Ok(_) => return true,
                Err(e) if e.is_password_error() => return false,
                Err(e) => log::debug!("cannot check password on '{}': {}", entry.file_name, e),
            }
        }
        true
    }
}

/// Write already-decoded entry data below `output_path`.
///
/// Directory entries create the directory itself.
pub(crate) async fn write_output(
    entry: &ZipFileEntry,
    output_path: &Path,
    data: &[u8],
) -> std::io::Result<()> {
    if entry.is_directory {
        return fs::create_dir_all(output_path).await;
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(output_path).await?;
    file.write_all(data).await?;
    file.flush().await
}

fn decrypt(entry: &ZipFileEntry, mut raw: Vec<u8>, password: Option<&[u8]>) -> Result<Vec<u8>> {
    if entry.flags & FLAG_STRONG_ENCRYPTION != 0
        || entry.compression_method.as_u16() == METHOD_AES
    {
        return Err(ArchiveError::UnsupportedEncryption {
            name: entry.file_name.clone(),
        });
    }

    let password = password.ok_or_else(|| ArchiveError::PasswordRequired {
        name: entry.file_name.clone(),
    })?;

    if raw.len() < ENCRYPTION_HEADER_SIZE {
        return Err(corrupt(entry, "truncated encryption header"));
    }

    let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
    header.copy_from_slice(&raw[..ENCRYPTION_HEADER_SIZE]);

    let check = if entry.flags & FLAG_DATA_DESCRIPTOR != 0 {
        (entry.last_mod_time >> 8) as u8
    } else {
        (entry.crc32 >> 24) as u8
    };

    let mut cipher = ZipCrypto::new(password);
    if !cipher.check_header(&header, check) {
        return Err(wrong_password(entry));
    }

    let mut body = raw.split_off(ENCRYPTION_HEADER_SIZE);
    cipher.decrypt_in_place(&mut body);
    Ok(body)
}

fn decompress(entry: &ZipFileEntry, payload: &[u8]) -> Result<Vec<u8>> {
    match entry.compression_method {
        CompressionMethod::Stored => Ok(payload.to_vec()),
        CompressionMethod::Deflate => {
            // Cap the pre-allocation, the declared size is untrusted.
            let capacity = entry.uncompressed_size.min(64 * 1024 * 1024) as usize;
            let mut out = Vec::with_capacity(capacity);
            DeflateDecoder::new(payload)
                .take(entry.uncompressed_size.saturating_add(1))
                .read_to_end(&mut out)
                .map_err(|e| corrupt(entry, &e.to_string()))?;
            Ok(out)
        }
        CompressionMethod::Unknown(method) => Err(ArchiveError::UnsupportedMethod {
            name: entry.file_name.clone(),
            method,
        }),
    }
}

fn corrupt(entry: &ZipFileEntry, reason: &str) -> ArchiveError {
    ArchiveError::Corrupt {
        name: entry.file_name.clone(),
        reason: reason.to_string(),
    }
}

fn wrong_password(entry: &ZipFileEntry) -> ArchiveError {
    ArchiveError::WrongPassword {
        name: entry.file_name.clone(),
    }
}
