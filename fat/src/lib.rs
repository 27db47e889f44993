pub mod boot_sector;
pub mod chain;
pub mod constants;
pub mod directory;
pub mod fat_table;
pub mod filesystem;
pub mod stream;

pub use boot_sector::{FatType, FatVolume, VolumeInfo};
pub use chain::ClusterChain;
pub use directory::{DirectoryEntry, FileEntry, ListingEntry};
pub use fat_table::FatTable;
pub use filesystem::FatFileSystem;
pub use stream::FatStream;

// Re-export the device port so embedders need only this crate
pub use fathom_core::{BlockDevice, FathomError, FileDevice};
