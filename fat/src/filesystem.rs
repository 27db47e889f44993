// FAT filesystem facade
// Composes the boot sector parser, FAT table, chain walker, and directory
// decoder over an injected block device.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

use fathom_core::{BlockDevice, FathomError};

use crate::boot_sector::{FatType, FatVolume, VolumeInfo};
use crate::chain::ClusterChain;
use crate::constants::{BOOT_SIGNATURE, BOOT_SIGNATURE_OFFSET};
use crate::directory::{self, DirectoryEntry, FileEntry, ListingEntry};
use crate::stream::FatStream;

/// A mounted FAT12/16/32 volume.
///
/// The volume geometry is derived once at mount time; everything else is
/// re-read from the device on every call. Callers wanting caching wrap
/// this type themselves. One instance must not be shared across threads
/// without external serialization.
pub struct FatFileSystem<D: BlockDevice> {
    device: D,
    volume: FatVolume,
}

impl<D: BlockDevice> FatFileSystem<D> {
    /// Mount: read sector 0 and derive the volume geometry.
    pub fn mount(mut device: D) -> Result<Self, FathomError> {
        let mut bpb = device.new_block_buffer(1);
        device.read_blocks(0, 1, &mut bpb)?;
        let volume = FatVolume::parse(&bpb)?;
        info!(
            "mounted {} volume: {} bytes/sector, {} sectors/cluster, {} clusters",
            volume.fat_type.name(),
            volume.bytes_per_sector,
            volume.sectors_per_cluster,
            volume.cluster_count
        );
        Ok(Self { device, volume })
    }

    /// Probe a device for the FAT boot signature.
    ///
    /// Necessary but not sufficient: plenty of non-FAT formats also carry
    /// 0xAA55 in sector 0, so a `true` here only makes `mount` worth
    /// attempting.
    pub fn is_fat_formatted(device: &mut D) -> Result<bool, FathomError> {
        let mut bpb = device.new_block_buffer(1);
        device.read_blocks(0, 1, &mut bpb)?;
        Ok(LittleEndian::read_u16(&bpb[BOOT_SIGNATURE_OFFSET..]) == BOOT_SIGNATURE)
    }

    pub fn volume(&self) -> &FatVolume {
        &self.volume
    }

    pub fn info(&self) -> VolumeInfo {
        self.volume.info()
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Walk the cluster chain starting at `start`.
    pub fn cluster_chain(&mut self, start: u32) -> Result<ClusterChain<'_, D>, FathomError> {
        ClusterChain::new(&mut self.device, &self.volume, start)
    }

    /// Read one data cluster into `buf`.
    pub fn read_cluster(&mut self, cluster: u32, buf: &mut [u8]) -> Result<(), FathomError> {
        if !self.volume.is_valid_cluster(cluster) {
            return Err(FathomError::InvalidInput(format!(
                "cluster {} is outside the data region",
                cluster
            )));
        }
        let sector = self.volume.cluster_to_sector(cluster);
        debug!("reading cluster {} at sector {}", cluster, sector);
        self.device
            .read_blocks(sector, self.volume.sectors_per_cluster as u64, buf)
    }

    /// Write one data cluster. Kept symmetric with the read path for a
    /// future write path; no listing or stream operation uses it.
    pub fn write_cluster(&mut self, cluster: u32, buf: &[u8]) -> Result<(), FathomError> {
        if !self.volume.is_valid_cluster(cluster) {
            return Err(FathomError::InvalidInput(format!(
                "cluster {} is outside the data region",
                cluster
            )));
        }
        let sector = self.volume.cluster_to_sector(cluster);
        debug!("writing cluster {} at sector {}", cluster, sector);
        self.device
            .write_blocks(sector, self.volume.sectors_per_cluster as u64, buf)
    }

    // Concatenated contents of every cluster in the chain from `start`.
    fn read_chain_data(&mut self, start: u32) -> Result<Vec<u8>, FathomError> {
        let clusters: Vec<u32> = self.cluster_chain(start)?.collect::<Result<_, _>>()?;
        let cluster_bytes = self.volume.bytes_per_cluster as usize;
        let mut data = vec![0u8; clusters.len() * cluster_bytes];
        for (cluster, chunk) in clusters.iter().zip(data.chunks_exact_mut(cluster_bytes)) {
            self.read_cluster(*cluster, chunk)?;
        }
        Ok(data)
    }

    /// List the root directory.
    pub fn list_root(&mut self) -> Result<Vec<ListingEntry>, FathomError> {
        let data = if self.volume.fat_type == FatType::Fat32 {
            self.read_chain_data(self.volume.root_cluster)?
        } else {
            // FAT12/16 keep the root in a fixed region between the FATs
            // and the data area, outside any cluster chain.
            let mut buf = self
                .device
                .new_block_buffer(self.volume.root_sector_count as u64);
            self.device.read_blocks(
                self.volume.root_sector as u64,
                self.volume.root_sector_count as u64,
                &mut buf,
            )?;
            buf
        };
        Ok(directory::decode_directory(&data, None))
    }

    /// List a subdirectory's contents, following its whole cluster chain.
    ///
    /// `None` is rejected; the root has its own entry point above.
    pub fn list_directory(
        &mut self,
        directory: Option<&DirectoryEntry>,
    ) -> Result<Vec<ListingEntry>, FathomError> {
        let directory = directory.ok_or_else(|| {
            FathomError::InvalidInput("list_directory needs a directory entry".into())
        })?;
        let path = directory.path();
        let data = self.read_chain_data(directory.first_cluster)?;
        Ok(directory::decode_directory(&data, Some(&path)))
    }

    /// Open a file as a byte stream over its cluster chain.
    pub fn open_file(&mut self, file: &FileEntry) -> Result<FatStream<'_, D>, FathomError> {
        let clusters = if file.first_cluster == 0 {
            // Zero-length files own no clusters
            Vec::new()
        } else {
            self.cluster_chain(file.first_cluster)?
                .collect::<Result<_, _>>()?
        };
        Ok(FatStream::new(self, clusters, file.size as u64))
    }

    /// Read a whole file into memory.
    pub fn read_file(&mut self, file: &FileEntry) -> Result<Vec<u8>, FathomError> {
        if file.first_cluster == 0 {
            return Ok(Vec::new());
        }
        let mut data = self.read_chain_data(file.first_cluster)?;
        data.truncate(file.size as usize);
        Ok(data)
    }

    /// Truncation and growth are not part of the read contract.
    pub fn set_file_length(&mut self, _file: &FileEntry, _new_size: u64) -> Result<(), FathomError> {
        Err(FathomError::NotSupported("set_file_length".into()))
    }
}
