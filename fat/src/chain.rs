// Cluster chain traversal
// A chain is the ordered cluster sequence of one file or directory,
// terminated in the FAT by a variant-specific end-of-chain value.

use fathom_core::{BlockDevice, FathomError};

use crate::boot_sector::FatVolume;
use crate::constants::FREE_CLUSTER;
use crate::fat_table::{self, FatTable};

/// Lazy walk of a cluster chain, yielding each cluster number in order.
///
/// The end-of-chain sentinel itself is never yielded. Free or bad entries
/// mid-chain surface as `CorruptChain`, as does a chain longer than the
/// volume's cluster count - no legitimate chain can visit more clusters
/// than the volume has.
pub struct ClusterChain<'a, D: BlockDevice> {
    table: FatTable<'a, D>,
    volume: &'a FatVolume,
    start: u32,
    last: Option<u32>,
    begun: bool,
    yielded: u64,
    failed: bool,
}

impl<'a, D: BlockDevice> ClusterChain<'a, D> {
    pub fn new(device: &'a mut D, volume: &'a FatVolume, start: u32) -> Result<Self, FathomError> {
        if !volume.is_valid_cluster(start) {
            return Err(FathomError::InvalidInput(format!(
                "cluster {} cannot start a chain",
                start
            )));
        }
        Ok(Self {
            table: FatTable::new(device, volume),
            volume,
            start,
            last: None,
            begun: false,
            yielded: 0,
            failed: false,
        })
    }

    fn fail(&mut self, error: FathomError) -> Option<Result<u32, FathomError>> {
        self.failed = true;
        Some(Err(error))
    }
}

impl<'a, D: BlockDevice> Iterator for ClusterChain<'a, D> {
    type Item = Result<u32, FathomError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let cluster = if !self.begun {
            self.begun = true;
            self.start
        } else {
            let last = self.last?;
            let entry = match self.table.entry(last) {
                Ok(entry) => entry,
                Err(error) => return self.fail(error),
            };
            if fat_table::is_end_of_chain(self.volume.fat_type, entry) {
                self.last = None;
                return None;
            }
            if entry == FREE_CLUSTER {
                return self.fail(FathomError::CorruptChain(format!(
                    "free cluster after {} in the chain from {}",
                    last, self.start
                )));
            }
            if fat_table::is_bad_cluster(self.volume.fat_type, entry) {
                return self.fail(FathomError::CorruptChain(format!(
                    "bad cluster after {} in the chain from {}",
                    last, self.start
                )));
            }
            if !self.volume.is_valid_cluster(entry) {
                return self.fail(FathomError::CorruptChain(format!(
                    "cluster {} after {} is outside the volume",
                    entry, last
                )));
            }
            entry
        };

        self.yielded += 1;
        if self.yielded > self.volume.cluster_count as u64 {
            return self.fail(FathomError::CorruptChain(format!(
                "chain from {} exceeds the volume's {} clusters",
                self.start, self.volume.cluster_count
            )));
        }

        self.last = Some(cluster);
        Some(Ok(cluster))
    }
}
