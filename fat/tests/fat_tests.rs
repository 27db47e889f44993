// Integration tests over synthetic disk images
// Each image is built in memory with a real BPB, FAT region, and
// directory contents, then mounted through the public API.

use std::io::{Read, Seek, SeekFrom};

use fathom_core::test_utils::MemoryDevice;
use fathom_fat::constants::*;
use fathom_fat::fat_table::{encode_entry, entry_offset};
use fathom_fat::{FatFileSystem, FatType, FathomError, ListingEntry};

const SECTOR: usize = 512;

struct ImageBuilder {
    data: Vec<u8>,
    sectors_per_cluster: u32,
    reserved: u32,
    num_fats: u32,
    fat_sectors: u32,
    root_sectors: u32,
    fat_type: FatType,
}

impl ImageBuilder {
    fn new(
        fat_type: FatType,
        sectors_per_cluster: u32,
        reserved: u32,
        fat_sectors: u32,
        root_entries: u32,
        total_sectors: u32,
    ) -> Self {
        let mut data = vec![0u8; total_sectors as usize * SECTOR];

        data[BPB_BYTES_PER_SEC..BPB_BYTES_PER_SEC + 2].copy_from_slice(&512u16.to_le_bytes());
        data[BPB_SEC_PER_CLUS] = sectors_per_cluster as u8;
        data[BPB_RSVD_SEC_CNT..BPB_RSVD_SEC_CNT + 2]
            .copy_from_slice(&(reserved as u16).to_le_bytes());
        data[BPB_NUM_FATS] = 2;
        data[BPB_ROOT_ENT_CNT..BPB_ROOT_ENT_CNT + 2]
            .copy_from_slice(&(root_entries as u16).to_le_bytes());
        if total_sectors < 0x10000 {
            data[BPB_TOT_SEC16..BPB_TOT_SEC16 + 2]
                .copy_from_slice(&(total_sectors as u16).to_le_bytes());
        } else {
            data[BPB_TOT_SEC32..BPB_TOT_SEC32 + 4].copy_from_slice(&total_sectors.to_le_bytes());
        }
        if fat_type == FatType::Fat32 {
            data[BPB_FAT_SZ32..BPB_FAT_SZ32 + 4].copy_from_slice(&fat_sectors.to_le_bytes());
            data[BPB_ROOT_CLUS..BPB_ROOT_CLUS + 4].copy_from_slice(&2u32.to_le_bytes());
        } else {
            data[BPB_FAT_SZ16..BPB_FAT_SZ16 + 2]
                .copy_from_slice(&(fat_sectors as u16).to_le_bytes());
        }
        data[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + 2]
            .copy_from_slice(&BOOT_SIGNATURE.to_le_bytes());

        let root_sectors = (root_entries * 32).div_ceil(512);
        Self {
            data,
            sectors_per_cluster,
            reserved,
            num_fats: 2,
            fat_sectors,
            root_sectors,
            fat_type,
        }
    }

    fn fat_entry(&mut self, cluster: u32, value: u32) {
        let offset = entry_offset(self.fat_type, cluster) as usize;
        for copy in 0..self.num_fats {
            let start = (self.reserved + copy * self.fat_sectors) as usize * SECTOR;
            encode_entry(
                self.fat_type,
                cluster,
                &mut self.data[start..],
                offset,
                value,
            );
        }
    }

    fn chain(&mut self, clusters: &[u32], eoc: u32) {
        for pair in clusters.windows(2) {
            self.fat_entry(pair[0], pair[1]);
        }
        if let Some(&last) = clusters.last() {
            self.fat_entry(last, eoc);
        }
    }

    fn root_region_offset(&self) -> usize {
        (self.reserved + self.num_fats * self.fat_sectors) as usize * SECTOR
    }

    fn cluster_offset(&self, cluster: u32) -> usize {
        let data_start = self.reserved + self.num_fats * self.fat_sectors + self.root_sectors;
        (data_start + (cluster - 2) * self.sectors_per_cluster) as usize * SECTOR
    }

    fn write_slots(&mut self, offset: usize, slots: &[[u8; 32]]) {
        for (i, slot) in slots.iter().enumerate() {
            self.data[offset + i * 32..offset + (i + 1) * 32].copy_from_slice(slot);
        }
    }

    fn write_cluster_data(&mut self, cluster: u32, bytes: &[u8]) {
        let offset = self.cluster_offset(cluster);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn device(self) -> MemoryDevice {
        MemoryDevice::from_bytes(512, self.data)
    }
}

fn short_slot(name: &[u8; 11], attributes: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut slot = [0u8; 32];
    slot[0..11].copy_from_slice(name);
    slot[11] = attributes;
    slot[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    slot[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    slot[28..32].copy_from_slice(&size.to_le_bytes());
    slot
}

fn long_slot(order: u8, text: &str) -> [u8; 32] {
    let mut units: Vec<u16> = text.encode_utf16().collect();
    assert!(units.len() <= 13);
    if units.len() < 13 {
        units.push(0);
    }
    while units.len() < 13 {
        units.push(0xFFFF);
    }

    let mut slot = [0u8; 32];
    slot[0] = order;
    slot[11] = ATTR_LONG_NAME;
    for (i, unit) in units[0..5].iter().enumerate() {
        slot[1 + i * 2..3 + i * 2].copy_from_slice(&unit.to_le_bytes());
    }
    for (i, unit) in units[5..11].iter().enumerate() {
        slot[14 + i * 2..16 + i * 2].copy_from_slice(&unit.to_le_bytes());
    }
    for (i, unit) in units[11..13].iter().enumerate() {
        slot[28 + i * 2..30 + i * 2].copy_from_slice(&unit.to_le_bytes());
    }
    slot
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// FAT16: 5000 data clusters, a three-cluster file, a long-named file, and
// a subdirectory, all reachable from the fixed root region.
fn fat16_image() -> MemoryDevice {
    let mut image = ImageBuilder::new(FatType::Fat16, 1, 1, 32, 32, 1 + 2 * 32 + 2 + 5000);

    image.chain(&[2, 3, 4], 0xFFFF);
    image.chain(&[5], 0xFFFF);
    image.chain(&[6], 0xFFFF);
    image.chain(&[7], 0xFFFF);

    let root = image.root_region_offset();
    image.write_slots(
        root,
        &[
            short_slot(b"HELLO   TXT", ATTR_ARCHIVE, 2, 1200),
            long_slot(0x42, "e.txt"),
            long_slot(0x01, "Long File Nam"),
            short_slot(b"LONGFI~1TXT", ATTR_ARCHIVE, 5, 5),
            short_slot(b"SUB        ", ATTR_DIRECTORY, 6, 0),
            [0u8; 32],
        ],
    );

    image.write_cluster_data(2, &pattern(1536)[0..512]);
    image.write_cluster_data(3, &pattern(1536)[512..1024]);
    image.write_cluster_data(4, &pattern(1536)[1024..1536]);
    image.write_cluster_data(5, b"hello");

    let sub = image.cluster_offset(6);
    image.write_slots(
        sub,
        &[
            short_slot(b".          ", ATTR_DIRECTORY, 6, 0),
            short_slot(b"..         ", ATTR_DIRECTORY, 0, 0),
            short_slot(b"NESTED  TXT", ATTR_ARCHIVE, 7, 6),
            [0u8; 32],
        ],
    );
    image.write_cluster_data(7, b"nested");

    image.device()
}

// FAT32: just past the 65525-cluster threshold, root on a cluster chain.
fn fat32_image() -> MemoryDevice {
    let mut image = ImageBuilder::new(FatType::Fat32, 1, 32, 512, 0, 32 + 2 * 512 + 65526);

    image.chain(&[2], 0x0FFF_FFF8);
    image.chain(&[3, 4], 0x0FFF_FFF8);
    image.chain(&[5], 0x0FFF_FFF8);

    let root = image.cluster_offset(2);
    image.write_slots(
        root,
        &[
            long_slot(0x41, "readme.md"),
            short_slot(b"README  MD ", ATTR_ARCHIVE, 5, 9),
            short_slot(b"BIG     BIN", ATTR_ARCHIVE, 3, 700),
            [0u8; 32],
        ],
    );
    image.write_cluster_data(5, b"# fathom\n");
    image.write_cluster_data(3, &pattern(1024)[0..512]);
    image.write_cluster_data(4, &pattern(1024)[512..1024]);

    image.device()
}

// FAT12: 500 data clusters and a two-cluster file.
fn fat12_image() -> MemoryDevice {
    let mut image = ImageBuilder::new(FatType::Fat12, 1, 1, 2, 16, 1 + 2 * 2 + 1 + 500);

    image.chain(&[2, 3], 0xFFF);

    let root = image.root_region_offset();
    image.write_slots(
        root,
        &[
            short_slot(b"BOOT    BIN", ATTR_ARCHIVE, 2, 600),
            [0u8; 32],
        ],
    );
    image.write_cluster_data(2, &pattern(1024)[0..512]);
    image.write_cluster_data(3, &pattern(1024)[512..1024]);

    image.device()
}

fn find_file<'a>(entries: &'a [ListingEntry], name: &str) -> &'a fathom_fat::FileEntry {
    entries
        .iter()
        .find_map(|entry| match entry {
            ListingEntry::File(file) if file.name == name => Some(file),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no file named {}", name))
}

fn find_dir<'a>(entries: &'a [ListingEntry], name: &str) -> &'a fathom_fat::DirectoryEntry {
    entries
        .iter()
        .find_map(|entry| match entry {
            ListingEntry::Directory(dir) if dir.name == name => Some(dir),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no directory named {}", name))
}

#[test]
fn probe_recognises_the_signature() {
    let mut device = fat16_image();
    assert!(FatFileSystem::is_fat_formatted(&mut device).unwrap());

    let mut blank = MemoryDevice::new(512, 8);
    assert!(!FatFileSystem::is_fat_formatted(&mut blank).unwrap());
}

#[test]
fn mount_resolves_the_variant_from_cluster_count() {
    assert_eq!(
        FatFileSystem::mount(fat12_image()).unwrap().volume().fat_type,
        FatType::Fat12
    );
    assert_eq!(
        FatFileSystem::mount(fat16_image()).unwrap().volume().fat_type,
        FatType::Fat16
    );
    let fs = FatFileSystem::mount(fat32_image()).unwrap();
    assert_eq!(fs.volume().fat_type, FatType::Fat32);
    assert_eq!(fs.volume().root_cluster, 2);
    assert_eq!(fs.volume().root_sector_count, 0);
}

#[test]
fn fat16_root_lists_files_and_directories() {
    let mut fs = FatFileSystem::mount(fat16_image()).unwrap();
    let root = fs.list_root().unwrap();
    assert_eq!(root.len(), 3);

    let hello = find_file(&root, "HELLO.TXT");
    assert_eq!(hello.size, 1200);
    assert_eq!(hello.first_cluster, 2);
    assert_eq!(hello.parent, None);

    let long = find_file(&root, "Long File Name.txt");
    assert_eq!(long.first_cluster, 5);

    let sub = find_dir(&root, "SUB");
    assert_eq!(sub.first_cluster, 6);
}

#[test]
fn fat16_file_contents_follow_the_chain() {
    let mut fs = FatFileSystem::mount(fat16_image()).unwrap();
    let root = fs.list_root().unwrap();
    let hello = find_file(&root, "HELLO.TXT").clone();

    let contents = fs.read_file(&hello).unwrap();
    assert_eq!(contents, pattern(1536)[0..1200].to_vec());

    let long = find_file(&root, "Long File Name.txt").clone();
    assert_eq!(fs.read_file(&long).unwrap(), b"hello");
}

#[test]
fn fat16_streams_read_and_seek() {
    let mut fs = FatFileSystem::mount(fat16_image()).unwrap();
    let root = fs.list_root().unwrap();
    let hello = find_file(&root, "HELLO.TXT").clone();
    let expected = pattern(1536);

    let mut stream = fs.open_file(&hello).unwrap();
    assert_eq!(stream.size(), 1200);

    let mut all = Vec::new();
    stream.read_to_end(&mut all).unwrap();
    assert_eq!(all, expected[0..1200].to_vec());

    // Random access across the cluster boundary
    stream.seek(SeekFrom::Start(500)).unwrap();
    let mut window = [0u8; 100];
    stream.read_exact(&mut window).unwrap();
    assert_eq!(window[..], expected[500..600]);

    stream.seek(SeekFrom::End(-10)).unwrap();
    let mut tail = Vec::new();
    stream.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, expected[1190..1200].to_vec());
}

#[test]
fn fat16_subdirectory_listing_carries_the_path() {
    let mut fs = FatFileSystem::mount(fat16_image()).unwrap();
    let root = fs.list_root().unwrap();
    let sub = find_dir(&root, "SUB").clone();

    let listing = fs.list_directory(Some(&sub)).unwrap();
    let nested = find_file(&listing, "NESTED.TXT");
    assert_eq!(nested.parent.as_deref(), Some("SUB"));
    assert_eq!(fs.read_file(&nested.clone()).unwrap(), b"nested");
}

#[test]
fn list_directory_rejects_missing_argument() {
    let mut fs = FatFileSystem::mount(fat16_image()).unwrap();
    assert!(matches!(
        fs.list_directory(None),
        Err(FathomError::InvalidInput(_))
    ));
}

#[test]
fn set_file_length_is_unsupported_and_writes_nothing() {
    let mut fs = FatFileSystem::mount(fat16_image()).unwrap();
    let root = fs.list_root().unwrap();
    let hello = find_file(&root, "HELLO.TXT").clone();

    assert!(matches!(
        fs.set_file_length(&hello, 64),
        Err(FathomError::NotSupported(_))
    ));
    assert_eq!(fs.into_device().write_count(), 0);
}

#[test]
fn fat32_root_follows_its_cluster_chain() {
    let mut fs = FatFileSystem::mount(fat32_image()).unwrap();
    let root = fs.list_root().unwrap();
    assert_eq!(root.len(), 2);

    let readme = find_file(&root, "readme.md").clone();
    assert_eq!(fs.read_file(&readme).unwrap(), b"# fathom\n");

    let big = find_file(&root, "BIG.BIN").clone();
    assert_eq!(big.first_cluster, 3);
    let contents = fs.read_file(&big).unwrap();
    assert_eq!(contents, pattern(1024)[0..700].to_vec());
}

#[test]
fn fat12_volume_reads_through_packed_entries() {
    let mut fs = FatFileSystem::mount(fat12_image()).unwrap();
    assert_eq!(fs.volume().cluster_count, 500);

    let root = fs.list_root().unwrap();
    let boot = find_file(&root, "BOOT.BIN").clone();
    assert_eq!(boot.size, 600);

    let clusters: Vec<u32> = fs.cluster_chain(2).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(clusters, vec![2, 3]);

    assert_eq!(fs.read_file(&boot).unwrap(), pattern(1024)[0..600].to_vec());
}

#[test]
fn empty_files_read_as_empty() {
    let mut image = ImageBuilder::new(FatType::Fat16, 1, 1, 32, 32, 1 + 2 * 32 + 2 + 5000);
    let root = image.root_region_offset();
    image.write_slots(
        root,
        &[
            short_slot(b"EMPTY   TXT", ATTR_ARCHIVE, 0, 0),
            [0u8; 32],
        ],
    );
    let mut fs = FatFileSystem::mount(image.device()).unwrap();

    let root = fs.list_root().unwrap();
    let empty = find_file(&root, "EMPTY.TXT").clone();
    assert_eq!(fs.read_file(&empty).unwrap(), Vec::<u8>::new());

    let mut stream = fs.open_file(&empty).unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    assert!(buf.is_empty());
}

#[test]
fn corrupt_chain_surfaces_instead_of_partial_data() {
    let mut image = ImageBuilder::new(FatType::Fat16, 1, 1, 32, 32, 1 + 2 * 32 + 2 + 5000);
    // Chain runs into a free entry: 2 -> 3 -> (free)
    image.fat_entry(2, 3);
    let root = image.root_region_offset();
    image.write_slots(
        root,
        &[
            short_slot(b"TORN    BIN", ATTR_ARCHIVE, 2, 1000),
            [0u8; 32],
        ],
    );
    let mut fs = FatFileSystem::mount(image.device()).unwrap();

    let root = fs.list_root().unwrap();
    let torn = find_file(&root, "TORN.BIN").clone();
    assert!(matches!(
        fs.read_file(&torn),
        Err(FathomError::CorruptChain(_))
    ));
}
