use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::io::{self, Cursor, Write};

use super::error::{ArchiveError, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// General purpose flag: entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag: CRC and sizes follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: strong (non-PKWARE) encryption.
pub const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;
/// General purpose flag: file name is UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Compression method id used by WinZip AES entries.
pub const METHOD_AES: u16 = 99;

/// Version needed to extract: 2.0 (deflate, traditional encryption).
pub const VERSION_NEEDED: u16 = 20;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ArchiveError::InvalidHeader("End of Central Directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 locator, stored right before the regular end record.
pub struct Zip64EOCDLocator {
    /// Absolute offset of the ZIP64 end record.
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || !data.starts_with(Self::SIGNATURE) {
            return Err(ArchiveError::InvalidHeader("ZIP64 locator"));
        }
        // Skip the disk holding the ZIP64 end record; multi-disk sets are not read.
        let eocd64_offset = (&data[8..16]).read_u64::<LittleEndian>()?;
        Ok(Self { eocd64_offset })
    }
}

/// The central directory fields of a ZIP64 end record.
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || !data.starts_with(Self::SIGNATURE) {
            return Err(ArchiveError::InvalidHeader("ZIP64 End of Central Directory"));
        }
        // Record size, versions, disk numbers and the per-disk count come first.
        let mut fields = &data[32..56];
        Ok(Self {
            total_entries: fields.read_u64::<LittleEndian>()?,
            cd_size: fields.read_u64::<LittleEndian>()?,
            cd_offset: fields.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// MS-DOS packed modification timestamp as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// Pack a calendar timestamp. Years outside 1980..=2107 are clamped.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        let (year, month, day, hour, minute, second) = if dt.year() < 1980 {
            (1980, 1, 1, 0, 0, 0)
        } else if dt.year() > 2107 {
            (2107, 12, 31, 23, 59, 58)
        } else {
            (
                dt.year() as u16,
                dt.month() as u16,
                dt.day() as u16,
                dt.hour() as u16,
                dt.minute() as u16,
                dt.second() as u16,
            )
        };

        Self {
            time: (hour << 11) | (minute << 5) | (second / 2),
            date: ((year - 1980) << 9) | (month << 5) | day,
        }
    }

    /// Unpack into a calendar timestamp, or `None` for invalid fields.
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        let day = (self.date & 0x1F) as u32;
        let month = ((self.date >> 5) & 0x0F) as u32;
        let year = ((self.date >> 9) & 0x7F) as i32 + 1980;
        let second = ((self.time & 0x1F) * 2) as u32;
        let minute = ((self.time >> 5) & 0x3F) as u32;
        let hour = ((self.time >> 11) & 0x1F) as u32;

        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    /// Zero-based position in the central directory.
    pub index: usize,
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn modified(&self) -> DosDateTime {
        DosDateTime {
            time: self.last_mod_time,
            date: self.last_mod_date,
        }
    }

    /// Modification time as `YYYY-MM-DD HH:MM:SS`, or "Unknown".
    pub fn formatted_date(&self) -> String {
        self.modified()
            .to_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Space saved by compression, in percent.
    pub fn compression_ratio(&self) -> f64 {
        ratio(self.uncompressed_size, self.compressed_size)
    }
}

/// Percentage saved when `size` bytes are stored in `compressed` bytes.
pub fn ratio(size: u64, compressed: u64) -> f64 {
    if size == 0 {
        0.0
    } else {
        (1.0 - compressed as f64 / size as f64) * 100.0
    }
}
