#![allow(dead_code)]

use std::sync::Arc;

use zipman::zip::{DosDateTime, WriteOptions, ZipWriter};
use zipman::{MemoryReader, ZipArchive};

/// 2024-03-05 10:20:30
pub fn stamp() -> DosDateTime {
    DosDateTime {
        time: (10 << 11) | (20 << 5) | 15,
        date: ((2024 - 1980) << 9) | (3 << 5) | 5,
    }
}

pub fn options(level: u32, password: Option<&str>) -> WriteOptions {
    WriteOptions {
        level,
        password: password.map(|p| p.as_bytes().to_vec()),
    }
}

/// Build an archive in memory. Names ending in `/` become directories.
pub fn build_zip(files: &[(&str, &[u8])], options: WriteOptions) -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new(), options);
    for (name, data) in files {
        if name.ends_with('/') {
            writer.add_directory(name, stamp()).unwrap();
        } else {
            writer.add_file(name, data, stamp()).unwrap();
        }
    }
    writer.finish().unwrap()
}

pub async fn open_memory(bytes: Vec<u8>) -> ZipArchive<MemoryReader> {
    ZipArchive::open(Arc::new(MemoryReader::new(bytes)))
        .await
        .unwrap()
}
