use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use atomic_write_file::AtomicWriteFile;

use crate::error::{ArchiveError, Result};

/// Replaces `path` with whatever `write_fn` writes. Bytes land in a sibling temp file which is
/// synced and renamed over the target, so a crash leaves the previous file intact.
pub fn write_atomic<F>(path: &Path, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let with_path = |source: std::io::Error| ArchiveError::Io {
        source,
        path: Some(path.to_path_buf()),
    };
    let mut options = AtomicWriteFile::options();
    options.read(false);
    let mut atomic = options.open(path).map_err(with_path)?;

    let file = atomic.as_file_mut();
    file.set_len(0).map_err(with_path)?;
    file.seek(SeekFrom::Start(0)).map_err(with_path)?;
    write_fn(file)?;
    file.flush().map_err(with_path)?;
    file.sync_all().map_err(with_path)?;
    atomic.commit().map_err(with_path)?;
    Ok(())
}

/// Reads a whole file, returning `None` when it does not exist.
pub fn read_file(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs_err::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ArchiveError::Io {
            source,
            path: Some(path.to_path_buf()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replaces_existing_file() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("archive.bin");
        std::fs::write(&path, b"old contents").expect("seed");
        write_atomic(&path, |file| {
            file.write_all(b"new")?;
            Ok(())
        })
        .expect("write");
        assert_eq!(read_file(&path).expect("read"), Some(b"new".to_vec()));
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("archive.bin");
        std::fs::write(&path, b"stable").expect("seed");
        let result = write_atomic(&path, |file| {
            file.write_all(b"partial")?;
            Err(ArchiveError::Cancelled)
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).expect("read"), b"stable");
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempdir().expect("tmp");
        assert_eq!(read_file(&dir.path().join("absent")).expect("read"), None);
    }
}
