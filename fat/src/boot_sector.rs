// Boot sector (BIOS Parameter Block) parsing
// Produces the immutable volume geometry every later address computation
// derives from.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use fathom_core::FathomError;

use crate::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

impl FatType {
    pub fn name(&self) -> &'static str {
        match self {
            FatType::Fat12 => "FAT12",
            FatType::Fat16 => "FAT16",
            FatType::Fat32 => "FAT32",
        }
    }
}

/// Immutable volume geometry, built once at mount time.
///
/// All region boundaries are in sectors from the start of the volume.
#[derive(Debug, Clone)]
pub struct FatVolume {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u32,

    pub reserved_sector_count: u32,
    pub number_of_fats: u32,
    pub fat_sector_count: u32,
    pub total_sector_count: u32,

    pub root_entry_count: u32,
    /// First sector of the fixed root region (FAT12/16; zero on FAT32).
    pub root_sector: u32,
    /// Sectors in the fixed root region (FAT12/16; zero on FAT32).
    pub root_sector_count: u32,
    /// First cluster of the root directory (FAT32 only; zero otherwise).
    pub root_cluster: u32,

    pub data_sector: u32,
    pub data_sector_count: u32,
    pub cluster_count: u32,

    pub fat_type: FatType,
}

/// Summary of a mounted volume for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub fat_type: FatType,
    pub bytes_per_cluster: u32,
    pub cluster_count: u32,
    pub total_bytes: u64,
}

impl FatVolume {
    /// Parse one boot sector's worth of bytes.
    pub fn parse(bpb: &[u8]) -> Result<Self, FathomError> {
        if bpb.len() < 512 {
            return Err(FathomError::InvalidFormat(format!(
                "boot sector is {} bytes, need at least 512",
                bpb.len()
            )));
        }

        let signature = LittleEndian::read_u16(&bpb[BOOT_SIGNATURE_OFFSET..]);
        if signature != BOOT_SIGNATURE {
            return Err(FathomError::InvalidFormat(format!(
                "boot signature {:#06x}, expected 0xAA55",
                signature
            )));
        }

        let bytes_per_sector = LittleEndian::read_u16(&bpb[BPB_BYTES_PER_SEC..]) as u32;
        let sectors_per_cluster = bpb[BPB_SEC_PER_CLUS] as u32;
        let reserved_sector_count = LittleEndian::read_u16(&bpb[BPB_RSVD_SEC_CNT..]) as u32;
        let number_of_fats = bpb[BPB_NUM_FATS] as u32;
        let root_entry_count = LittleEndian::read_u16(&bpb[BPB_ROOT_ENT_CNT..]) as u32;

        // The 16-bit fields win when nonzero; the 32-bit fields cover
        // volumes too large for them.
        let mut total_sector_count = LittleEndian::read_u16(&bpb[BPB_TOT_SEC16..]) as u32;
        if total_sector_count == 0 {
            total_sector_count = LittleEndian::read_u32(&bpb[BPB_TOT_SEC32..]);
        }
        let mut fat_sector_count = LittleEndian::read_u16(&bpb[BPB_FAT_SZ16..]) as u32;
        if fat_sector_count == 0 {
            fat_sector_count = LittleEndian::read_u32(&bpb[BPB_FAT_SZ32..]);
        }

        if ![512, 1024, 2048, 4096].contains(&bytes_per_sector) {
            return Err(FathomError::InvalidFormat(format!(
                "{} bytes per sector",
                bytes_per_sector
            )));
        }
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(FathomError::InvalidFormat(format!(
                "{} sectors per cluster",
                sectors_per_cluster
            )));
        }
        if number_of_fats == 0 {
            return Err(FathomError::InvalidFormat("zero FAT copies".into()));
        }
        if fat_sector_count == 0 || total_sector_count == 0 {
            return Err(FathomError::InvalidFormat(
                "zero FAT size or total sector count".into(),
            ));
        }

        // Root region size rounds up to whole sectors; zero root entries
        // (FAT32) make it empty.
        let root_sector_count =
            (root_entry_count * DIR_ENTRY_SIZE as u32 + (bytes_per_sector - 1)) / bytes_per_sector;

        let metadata_sectors =
            reserved_sector_count + number_of_fats * fat_sector_count + root_sector_count;
        if total_sector_count <= metadata_sectors {
            return Err(FathomError::InvalidFormat(format!(
                "{} total sectors cannot hold {} metadata sectors",
                total_sector_count, metadata_sectors
            )));
        }

        let data_sector = metadata_sectors;
        let data_sector_count = total_sector_count - data_sector;
        // Rounds down; partial trailing clusters are not addressable.
        let cluster_count = data_sector_count / sectors_per_cluster;

        // The official determination: strict thresholds on cluster count.
        // Volume labels and the fs-type string are not to be trusted.
        let fat_type = if cluster_count < FAT12_MAX_CLUSTERS {
            FatType::Fat12
        } else if cluster_count < FAT16_MAX_CLUSTERS {
            FatType::Fat16
        } else {
            FatType::Fat32
        };

        let (root_sector, root_sector_count, root_cluster) = if fat_type == FatType::Fat32 {
            (0, 0, LittleEndian::read_u32(&bpb[BPB_ROOT_CLUS..]))
        } else {
            (
                reserved_sector_count + number_of_fats * fat_sector_count,
                root_sector_count,
                0,
            )
        };

        Ok(FatVolume {
            bytes_per_sector,
            sectors_per_cluster,
            bytes_per_cluster: bytes_per_sector * sectors_per_cluster,
            reserved_sector_count,
            number_of_fats,
            fat_sector_count,
            total_sector_count,
            root_entry_count,
            root_sector,
            root_sector_count,
            root_cluster,
            data_sector,
            data_sector_count,
            cluster_count,
            fat_type,
        })
    }

    /// First absolute sector of a data cluster.
    pub fn cluster_to_sector(&self, cluster: u32) -> u64 {
        self.data_sector as u64
            + (cluster as u64 - FIRST_DATA_CLUSTER as u64) * self.sectors_per_cluster as u64
    }

    /// Whether `cluster` addresses a data cluster of this volume.
    pub fn is_valid_cluster(&self, cluster: u32) -> bool {
        cluster >= FIRST_DATA_CLUSTER && cluster < self.cluster_count + FIRST_DATA_CLUSTER
    }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            fat_type: self.fat_type,
            bytes_per_cluster: self.bytes_per_cluster,
            cluster_count: self.cluster_count,
            total_bytes: self.total_sector_count as u64 * self.bytes_per_sector as u64,
        }
    }
}
