//! Traditional PKWARE encryption ("ZipCrypto").
//!
//! Each encrypted entry starts with a 12-byte header. After decrypting it,
//! the last byte must equal the high byte of the entry's CRC-32 (or of the
//! DOS modification time when the sizes live in a data descriptor). That
//! byte is the only password check the format offers.

use rand::Rng;

/// Size of the encryption header in bytes.
pub const ENCRYPTION_HEADER_SIZE: usize = 12;

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

#[inline]
fn crc32_update(crc: u32, byte: u8) -> u32 {
    CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// ZipCrypto stream cipher state.
#[derive(Debug, Clone)]
pub struct ZipCrypto {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl ZipCrypto {
    pub fn new(password: &[u8]) -> Self {
        let mut cipher = Self {
            key0: 0x12345678,
            key1: 0x23456789,
            key2: 0x34567890,
        };
        for &byte in password {
            cipher.update_keys(byte);
        }
        cipher
    }

    #[inline]
    fn update_keys(&mut self, byte: u8) {
        self.key0 = crc32_update(self.key0, byte);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(134775813)
            .wrapping_add(1);
        self.key2 = crc32_update(self.key2, (self.key1 >> 24) as u8);
    }

    #[inline]
    fn stream_byte(&self) -> u8 {
        let temp = (self.key2 | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    pub fn decrypt_in_place(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let plain = *byte ^ self.stream_byte();
            self.update_keys(plain);
            *byte = plain;
        }
    }

    pub fn encrypt_in_place(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let plain = *byte;
            *byte = plain ^ self.stream_byte();
            self.update_keys(plain);
        }
    }

    /// Decrypt the 12-byte header and compare its check byte.
    ///
    /// Returns `false` when the password is certainly wrong.
    pub fn check_header(&mut self, header: &[u8; ENCRYPTION_HEADER_SIZE], check: u8) -> bool {
        let mut plain = *header;
        self.decrypt_in_place(&mut plain);
        plain[ENCRYPTION_HEADER_SIZE - 1] == check
    }

    /// Build an encrypted header: 11 random bytes followed by `check`.
    pub fn encrypt_header(&mut self, check: u8) -> [u8; ENCRYPTION_HEADER_SIZE] {
        let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
        rand::thread_rng().fill(&mut header[..ENCRYPTION_HEADER_SIZE - 1]);
        header[ENCRYPTION_HEADER_SIZE - 1] = check;
        self.encrypt_in_place(&mut header);
        header
    }
}
