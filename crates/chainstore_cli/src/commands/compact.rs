//! Compact command implementation.

use chainstore_core::{OpenMode, Store};
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path, OpenMode::ReadOnly)?;
    let bytes_before = store.recovery().file_size;

    println!("Compacting {} into {}", path.display(), out.display());
    if store.is_damaged() {
        println!(
            "(source is damaged; {} unreadable bytes are dropped)",
            store.recovery().discarded_bytes()
        );
    }

    let checkpoint = store.write_to(out)?;
    let bytes_after = std::fs::metadata(out)?.len();

    println!();
    println!("  Keys:         {}", store.len());
    println!("  Commits:      {} -> 1", store.recovery().commits_applied);
    println!("  Size before:  {bytes_before} bytes");
    println!("  Size after:   {bytes_after} bytes");
    println!("  Checkpoint:   {checkpoint}");
    println!();
    println!("✓ Compaction complete");
    Ok(())
}
