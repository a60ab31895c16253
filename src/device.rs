//! Fixed-size random-access byte store backed by a single host file
//! (spec.md §4.1). Grounded on the teacher's use of `std::fs::File` plus
//! `Seek`/`Read`/`Write` in `mkfs/src/ext2.rs` and `fdisk/src/disk.rs`.

use crate::error::{FsError, FsResult};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A disk image: a contiguous byte array of `capacity` bytes on the host
/// filesystem, accessed through an open file handle.
pub struct Device {
    path: PathBuf,
    file: Option<File>,
    capacity: u64,
}

impl Device {
    /// Creates a fresh image of `capacity` bytes at `path`, filled with
    /// zeros, then overwrites the leading header bytes with
    /// `capacity:u32` followed by `isUnformatted = -1:i8` (spec.md §4.1).
    /// Leaves the device open.
    pub fn create(path: &Path, capacity: u32) -> FsResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity as u64)?;
        file.write_all(&capacity.to_le_bytes())?;
        file.write_all(&(-1i8).to_le_bytes())?;
        file.sync_all()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            path: path.to_owned(),
            file: Some(file),
            capacity: capacity as u64,
        })
    }

    /// Opens an existing image file. Does not validate its contents; callers
    /// read the header themselves (spec.md §4.2 mount flow).
    pub fn open(path: &Path) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let capacity = file.metadata()?.len();
        Ok(Self {
            path: path.to_owned(),
            file: Some(file),
            capacity,
        })
    }

    /// Drops the underlying file handle.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// The path this device was created or opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The image's total byte capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn file_mut(&mut self) -> FsResult<&mut File> {
        self.file
            .as_mut()
            .ok_or(FsError::InvalidArgument("device not open"))
    }

    /// Moves the cursor to an absolute byte offset.
    pub fn seek_absolute(&mut self, offset: u64) -> FsResult<()> {
        if offset > self.capacity {
            return Err(FsError::InvalidArgument("capacity exceeded"));
        }
        self.file_mut()?.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes from the current cursor position.
    pub fn read(&mut self, buf: &mut [u8]) -> FsResult<()> {
        self.file_mut()?
            .read_exact(buf)
            .map_err(|_| FsError::InvalidArgument("short read"))
    }

    /// Writes `buf` at the current cursor position and flushes to the host OS.
    pub fn write(&mut self, buf: &[u8]) -> FsResult<()> {
        let file = self.file_mut()?;
        file.write_all(buf)?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn create_writes_header() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = Device::create(tmp.path(), 8192).unwrap();
        assert_eq!(dev.capacity(), 8192);

        dev.seek_absolute(0).unwrap();
        let mut cap_buf = [0u8; 4];
        dev.read(&mut cap_buf).unwrap();
        assert_eq!(u32::from_le_bytes(cap_buf), 8192);

        let mut flag_buf = [0u8; 1];
        dev.read(&mut flag_buf).unwrap();
        assert_eq!(flag_buf[0] as i8, -1);
    }

    #[test]
    fn seek_past_capacity_fails() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = Device::create(tmp.path(), 4096).unwrap();
        assert!(dev.seek_absolute(5000).is_err());
    }

    #[test]
    fn read_after_close_fails() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = Device::create(tmp.path(), 4096).unwrap();
        dev.close();
        let mut buf = [0u8; 4];
        assert!(dev.read(&mut buf).is_err());
    }
}
