// Block device port consumed by filesystem drivers
// Drivers receive the device by value or reference, never through
// process-wide globals.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::trace;

use crate::FathomError;

/// Sector-addressable storage, the capability every driver is built on.
///
/// Transfers are all-or-nothing: a short read or write surfaces as an
/// `IoError`, never as partial data.
pub trait BlockDevice {
    /// Bytes per sector for this device.
    fn block_size(&self) -> u32;

    /// Total number of sectors.
    fn block_count(&self) -> u64;

    /// Allocate a zero-initialized buffer sized for `count` sectors.
    fn new_block_buffer(&self, count: u64) -> Vec<u8> {
        vec![0u8; (count * self.block_size() as u64) as usize]
    }

    /// Read `count` sectors starting at `start` into `buf`.
    fn read_blocks(&mut self, start: u64, count: u64, buf: &mut [u8]) -> Result<(), FathomError>;

    /// Write `count` sectors from `buf` starting at `start`.
    fn write_blocks(&mut self, start: u64, count: u64, buf: &[u8]) -> Result<(), FathomError>;
}

/// A block device backed by a plain file, typically a disk image.
pub struct FileDevice {
    file: File,
    block_size: u32,
    block_count: u64,
}

impl FileDevice {
    /// Open an image read-only with the standard 512-byte sector size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FathomError> {
        let file = File::open(path)?;
        Self::from_file(file, 512)
    }

    /// Open an image for reading and writing.
    pub fn open_writable<P: AsRef<Path>>(path: P) -> Result<Self, FathomError> {
        let file = File::options().read(true).write(true).open(path)?;
        Self::from_file(file, 512)
    }

    pub fn from_file(file: File, block_size: u32) -> Result<Self, FathomError> {
        if block_size == 0 {
            return Err(FathomError::InvalidInput("block size must be nonzero".into()));
        }
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            block_size,
            block_count: len / block_size as u64,
        })
    }

    fn check_range(&self, start: u64, count: u64, buf_len: usize) -> Result<(), FathomError> {
        let bytes = count * self.block_size as u64;
        if (buf_len as u64) < bytes {
            return Err(FathomError::InvalidInput(format!(
                "buffer holds {} bytes, transfer needs {}",
                buf_len, bytes
            )));
        }
        if start + count > self.block_count {
            return Err(FathomError::InvalidInput(format!(
                "sectors {}..{} beyond device end ({})",
                start,
                start + count,
                self.block_count
            )));
        }
        Ok(())
    }
}

impl BlockDevice for FileDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_blocks(&mut self, start: u64, count: u64, buf: &mut [u8]) -> Result<(), FathomError> {
        self.check_range(start, count, buf.len())?;
        let bytes = (count * self.block_size as u64) as usize;
        trace!("reading {} sectors at sector {}", count, start);
        self.file.seek(SeekFrom::Start(start * self.block_size as u64))?;
        self.file.read_exact(&mut buf[..bytes])?;
        Ok(())
    }

    fn write_blocks(&mut self, start: u64, count: u64, buf: &[u8]) -> Result<(), FathomError> {
        self.check_range(start, count, buf.len())?;
        let bytes = (count * self.block_size as u64) as usize;
        trace!("writing {} sectors at sector {}", count, start);
        self.file.seek(SeekFrom::Start(start * self.block_size as u64))?;
        self.file.write_all(&buf[..bytes])?;
        Ok(())
    }
}
