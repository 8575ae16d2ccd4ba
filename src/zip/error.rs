use std::io;

/// Errors raised while reading or writing a ZIP archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("not a valid ZIP file")]
    NotAZipFile,

    #[error("invalid {0}")]
    InvalidHeader(&'static str),

    #[error("'{name}' is encrypted and no password was supplied")]
    PasswordRequired { name: String },

    #[error("incorrect password for '{name}'")]
    WrongPassword { name: String },

    #[error("'{name}' is corrupted: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("CRC mismatch in '{name}': expected {expected:08x}, got {actual:08x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("'{name}' uses unsupported compression method {method}")]
    UnsupportedMethod { name: String, method: u16 },

    #[error("'{name}' uses an unsupported encryption scheme")]
    UnsupportedEncryption { name: String },

    #[error("'{name}' is too large for a non-ZIP64 archive")]
    TooLarge { name: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// True for failures caused by a missing or incorrect password.
    pub fn is_password_error(&self) -> bool {
        matches!(
            self,
            ArchiveError::PasswordRequired { .. } | ArchiveError::WrongPassword { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
