// Directory region decoding: 32-byte slots, 8.3 short names, and long
// file name reconstruction
// Long name slots precede their short entry in last-to-first order, so the
// accumulator prepends each fragment.

use std::mem;

use log::trace;
use static_assertions::const_assert_eq;

use crate::constants::*;

/// Short (8.3) directory entry as laid out on disk.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct RawDirEntry {
    pub name: [u8; 11],
    pub attributes: u8,
    pub nt_reserved: u8,
    pub creation_time_tenth: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,
    pub first_cluster_hi: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster_lo: u16,
    pub file_size: u32,
}

/// Long file name entry: thirteen UTF-16 units split across three runs.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct LongNameEntry {
    pub order: u8,
    pub name1: [u16; 5],
    pub attributes: u8,
    pub entry_type: u8,
    pub checksum: u8,
    pub name2: [u16; 6],
    pub first_cluster: u16,
    pub name3: [u16; 2],
}

const_assert_eq!(mem::size_of::<RawDirEntry>(), DIR_ENTRY_SIZE);
const_assert_eq!(mem::size_of::<LongNameEntry>(), DIR_ENTRY_SIZE);

/// A file as it appears in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u32,
    pub first_cluster: u32,
    /// Path of the owning directory; `None` in the root.
    pub parent: Option<String>,
}

/// A subdirectory as it appears in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub first_cluster: u32,
    /// Path of the owning directory; `None` in the root.
    pub parent: Option<String>,
}

impl DirectoryEntry {
    /// Logical path of this directory, used as the parent of its contents.
    pub fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}/{}", parent, self.name),
            None => self.name.clone(),
        }
    }
}

/// One decoded listing element. Volume labels and bookkeeping slots are
/// consumed during decoding and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEntry {
    File(FileEntry),
    Directory(DirectoryEntry),
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        match self {
            ListingEntry::File(file) => &file.name,
            ListingEntry::Directory(dir) => &dir.name,
        }
    }

    pub fn first_cluster(&self) -> u32 {
        match self {
            ListingEntry::File(file) => file.first_cluster,
            ListingEntry::Directory(dir) => dir.first_cluster,
        }
    }
}

/// What a 32-byte slot turned out to be, decided before any extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    EndOfDirectory,
    Deleted,
    KanjiEscape,
    LongNamePart,
    VolumeLabel,
    Directory,
    File,
}

fn classify(slot: &[u8]) -> SlotKind {
    let status = slot[0];
    let attributes = slot[11];
    if attributes == ATTR_LONG_NAME {
        // A deleted long name slot keeps the long-name attribute but
        // carries the deletion marker in its order byte.
        if status == ENTRY_DELETED {
            SlotKind::Deleted
        } else {
            SlotKind::LongNamePart
        }
    } else if status == ENTRY_END {
        SlotKind::EndOfDirectory
    } else if status == ENTRY_DELETED {
        SlotKind::Deleted
    } else if status == ENTRY_KANJI_ESCAPE {
        SlotKind::KanjiEscape
    } else if attributes & ATTR_VOLUME_ID != 0 {
        SlotKind::VolumeLabel
    } else if attributes & ATTR_DIRECTORY != 0 {
        SlotKind::Directory
    } else {
        SlotKind::File
    }
}

/// Accumulator for a long name arriving across multiple slots.
///
/// Slots arrive highest-sequence first, so each fragment is placed before
/// the text gathered so far. The state is explicit: `Idle` until a slot
/// arrives, `Accumulating` until the owning short entry consumes the name.
#[derive(Debug, Default)]
enum LongNameState {
    #[default]
    Idle,
    Accumulating(String),
}

#[derive(Debug, Default)]
struct LongNameBuilder {
    state: LongNameState,
}

impl LongNameBuilder {
    fn push(&mut self, entry: &LongNameEntry) {
        // Only type-zero slots carry name fragments.
        if entry.entry_type != 0 {
            return;
        }
        if entry.order & LAST_LONG_ENTRY != 0 {
            self.state = LongNameState::Idle;
        }
        let fragment = decode_fragment(entry);
        self.state = match mem::take(&mut self.state) {
            LongNameState::Idle => LongNameState::Accumulating(fragment),
            LongNameState::Accumulating(rest) => LongNameState::Accumulating(fragment + &rest),
        };
    }

    fn reset(&mut self) {
        self.state = LongNameState::Idle;
    }

    /// Consume the accumulated name, trimmed per the FAT rules: leading
    /// and trailing whitespace first, then trailing periods.
    fn take(&mut self) -> Option<String> {
        match mem::take(&mut self.state) {
            LongNameState::Idle => None,
            LongNameState::Accumulating(name) => {
                Some(name.trim().trim_end_matches('.').to_string())
            }
        }
    }
}

// Units up to the 0x0000 terminator; the terminator itself is dropped.
fn name_units(units: &[u16]) -> Vec<u16> {
    units.iter().copied().take_while(|&unit| unit != 0).collect()
}

// A fragment ends inside the first short run. A full-length run continues
// into the next even when that run starts with 0xFFFF, because 0xFFFF is a
// valid code unit and only counts as fill after the terminator.
fn decode_fragment(entry: &LongNameEntry) -> String {
    let name1 = entry.name1;
    let name2 = entry.name2;
    let name3 = entry.name3;

    let mut units = name_units(&name1);
    if name2[0] != 0xFFFF || units.len() == 5 {
        units.extend(name_units(&name2));
        if name3[0] != 0xFFFF || units.len() == 11 {
            units.extend(name_units(&name3));
        }
    }
    String::from_utf16_lossy(&units)
}

/// Derive a display name from the fixed 11-byte 8.3 field.
fn short_name(raw: &[u8; 11]) -> String {
    let base_part = String::from_utf8_lossy(&raw[0..8]);
    let ext_part = String::from_utf8_lossy(&raw[8..11]);
    let base = base_part.trim_end_matches(' ');
    let ext = ext_part.trim_end_matches(' ');
    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, ext)
    }
}

fn read_raw_entry(slot: &[u8]) -> RawDirEntry {
    unsafe { std::ptr::read_unaligned(slot.as_ptr() as *const RawDirEntry) }
}

fn read_long_entry(slot: &[u8]) -> LongNameEntry {
    unsafe { std::ptr::read_unaligned(slot.as_ptr() as *const LongNameEntry) }
}

/// Decode the raw bytes of a directory region into listing entries.
///
/// `parent` is the owning directory's logical path, `None` for the root.
/// The scan stops at the first end-of-directory slot; deleted and
/// kanji-escape slots are skipped, volume labels are dropped.
pub fn decode_directory(data: &[u8], parent: Option<&str>) -> Vec<ListingEntry> {
    let mut entries = Vec::new();
    let mut long_name = LongNameBuilder::default();

    for slot in data.chunks_exact(DIR_ENTRY_SIZE) {
        match classify(slot) {
            SlotKind::EndOfDirectory => break,
            // Skipped slots do not interrupt a long name in progress
            SlotKind::Deleted | SlotKind::KanjiEscape => continue,
            SlotKind::LongNamePart => {
                long_name.push(&read_long_entry(slot));
            }
            SlotKind::VolumeLabel => {
                trace!("dropping volume label slot");
                long_name.reset();
            }
            SlotKind::Directory => {
                let raw = read_raw_entry(slot);
                let name = long_name
                    .take()
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| short_name(&raw.name));
                entries.push(ListingEntry::Directory(DirectoryEntry {
                    name,
                    first_cluster: first_cluster(&raw),
                    parent: parent.map(str::to_string),
                }));
            }
            SlotKind::File => {
                let raw = read_raw_entry(slot);
                let name = long_name
                    .take()
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| short_name(&raw.name));
                let size = raw.file_size;
                // An all-blank slot decodes to a nameless zero-byte file;
                // emit nothing for it.
                if size == 0 && name.is_empty() {
                    continue;
                }
                entries.push(ListingEntry::File(FileEntry {
                    name,
                    size,
                    first_cluster: first_cluster(&raw),
                    parent: parent.map(str::to_string),
                }));
            }
        }
    }

    entries
}

fn first_cluster(raw: &RawDirEntry) -> u32 {
    let hi = raw.first_cluster_hi;
    let lo = raw.first_cluster_lo;
    (hi as u32) << 16 | lo as u32
}
