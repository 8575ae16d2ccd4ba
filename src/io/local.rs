use super::ReadAt;
use async_trait::async_trait;
use std::fs::File;
use std::io;
use std::path::Path;

/// Archive file on local disk, read with positional reads.
pub struct LocalFileReader {
    file: File,
    len: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        log::debug!("opened {} ({} bytes)", path.display(), len);
        Ok(Self { file, len })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }

        #[cfg(unix)]
        {
            std::os::unix::fs::FileExt::read_at(&self.file, buf, offset)
        }

        #[cfg(windows)]
        {
            // Moves the handle's cursor, which nothing else relies on.
            std::os::windows::fs::FileExt::seek_read(&self.file, buf, offset)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        }
    }

    fn size(&self) -> u64 {
        self.len
    }
}
