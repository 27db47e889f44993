/// Test utilities and mock implementations for safe testing
use crate::{BlockDevice, FathomError};

/// In-memory block device - never touches real hardware.
///
/// Tracks how many write transfers it has served so tests can assert that
/// read-only operations leave the device untouched.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    block_size: u32,
    data: Vec<u8>,
    write_count: usize,
}

impl MemoryDevice {
    pub fn new(block_size: u32, block_count: u64) -> Self {
        Self {
            block_size,
            data: vec![0u8; (block_count * block_size as u64) as usize],
            write_count: 0,
        }
    }

    /// Wrap an existing image. The length is truncated to whole sectors.
    pub fn from_bytes(block_size: u32, mut data: Vec<u8>) -> Self {
        let whole = data.len() - data.len() % block_size as usize;
        data.truncate(whole);
        Self {
            block_size,
            data,
            write_count: 0,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn write_count(&self) -> usize {
        self.write_count
    }

    fn check_range(&self, start: u64, count: u64, buf_len: usize) -> Result<usize, FathomError> {
        let bytes = (count * self.block_size as u64) as usize;
        if buf_len < bytes {
            return Err(FathomError::InvalidInput(format!(
                "buffer holds {} bytes, transfer needs {}",
                buf_len, bytes
            )));
        }
        let offset = (start * self.block_size as u64) as usize;
        if offset + bytes > self.data.len() {
            return Err(FathomError::InvalidInput(format!(
                "sectors {}..{} beyond device end",
                start,
                start + count
            )));
        }
        Ok(offset)
    }
}

impl BlockDevice for MemoryDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.data.len() as u64 / self.block_size as u64
    }

    fn read_blocks(&mut self, start: u64, count: u64, buf: &mut [u8]) -> Result<(), FathomError> {
        let offset = self.check_range(start, count, buf.len())?;
        let bytes = (count * self.block_size as u64) as usize;
        buf[..bytes].copy_from_slice(&self.data[offset..offset + bytes]);
        Ok(())
    }

    fn write_blocks(&mut self, start: u64, count: u64, buf: &[u8]) -> Result<(), FathomError> {
        let offset = self.check_range(start, count, buf.len())?;
        let bytes = (count * self.block_size as u64) as usize;
        self.data[offset..offset + bytes].copy_from_slice(&buf[..bytes]);
        self.write_count += 1;
        Ok(())
    }
}
