// List the contents of a FAT disk image
use std::env;
use std::io::Read;

use anyhow::Context;
use fathom_core::FileDevice;
use fathom_fat::{BlockDevice, FatFileSystem, ListingEntry};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <image> [file-to-dump]", args[0]);
        std::process::exit(1);
    }

    let device = FileDevice::open(&args[1]).context("opening image")?;
    let mut fs = FatFileSystem::mount(device).context("mounting volume")?;

    let info = fs.info();
    println!(
        "{} volume: {} clusters of {} bytes, {} bytes total",
        info.fat_type.name(),
        info.cluster_count,
        info.bytes_per_cluster,
        info.total_bytes
    );
    println!();

    let root = fs.list_root()?;
    print_listing(&mut fs, &root, 0)?;

    if let Some(wanted) = args.get(2) {
        let file = root
            .iter()
            .find_map(|entry| match entry {
                ListingEntry::File(file) if file.name.eq_ignore_ascii_case(wanted) => Some(file),
                _ => None,
            })
            .with_context(|| format!("no file named '{}' in the root directory", wanted))?
            .clone();

        let mut contents = Vec::new();
        fs.open_file(&file)?.read_to_end(&mut contents)?;
        println!();
        println!("--- {} ({} bytes) ---", file.name, contents.len());
        println!("{}", String::from_utf8_lossy(&contents));
    }

    Ok(())
}

fn print_listing<D: BlockDevice>(
    fs: &mut FatFileSystem<D>,
    entries: &[ListingEntry],
    depth: usize,
) -> anyhow::Result<()> {
    for entry in entries {
        match entry {
            ListingEntry::File(file) => {
                println!("{:indent$}{:<32} {:>10}", "", file.name, file.size, indent = depth * 2);
            }
            ListingEntry::Directory(dir) => {
                // Dot entries point back into the tree
                if dir.name == "." || dir.name == ".." {
                    continue;
                }
                println!("{:indent$}{}/", "", dir.name, indent = depth * 2);
                let children = fs.list_directory(Some(dir))?;
                print_listing(fs, &children, depth + 1)?;
            }
        }
    }
    Ok(())
}
