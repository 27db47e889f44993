// Sequential and random byte access over a file's cluster chain

use std::io::{self, Read, Seek, SeekFrom};

use fathom_core::{BlockDevice, FathomError};

use crate::filesystem::FatFileSystem;

/// Byte-addressable view of one file.
///
/// The chain is resolved when the stream is opened; cluster contents are
/// re-read from the device on every call. Reads past the recorded file
/// size return zero bytes, matching end-of-file semantics.
pub struct FatStream<'a, D: BlockDevice> {
    fs: &'a mut FatFileSystem<D>,
    clusters: Vec<u32>,
    size: u64,
    position: u64,
}

impl<'a, D: BlockDevice> FatStream<'a, D> {
    pub(crate) fn new(fs: &'a mut FatFileSystem<D>, clusters: Vec<u32>, size: u64) -> Self {
        Self {
            fs,
            clusters,
            size,
            position: 0,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

fn to_io(error: FathomError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error.to_string())
}

impl<'a, D: BlockDevice> Read for FatStream<'a, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.size || buf.is_empty() {
            return Ok(0);
        }

        let cluster_bytes = self.fs.volume().bytes_per_cluster as u64;
        let cluster_index = (self.position / cluster_bytes) as usize;
        let offset = (self.position % cluster_bytes) as usize;

        let &cluster = self.clusters.get(cluster_index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "cluster chain shorter than the recorded file size",
            )
        })?;

        let mut cluster_buf = vec![0u8; cluster_bytes as usize];
        self.fs
            .read_cluster(cluster, &mut cluster_buf)
            .map_err(to_io)?;

        let available = (self.size - self.position).min(cluster_bytes - offset as u64) as usize;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&cluster_buf[offset..offset + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl<'a, D: BlockDevice> Seek for FatStream<'a, D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(offset) => {
                self.position = offset;
                Ok(offset)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the file",
            )),
        }
    }
}
