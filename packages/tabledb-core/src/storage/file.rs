//! On-disk image of an area store: checksummed, written temp-then-rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crc32fast::Hasher;

#[cfg(feature = "persist")]
use memmap2::Mmap;

use crate::error::DbError;

use super::area_store::AreaStore;
use super::io_utils::{classify_io_error, retry_io_operation};

/// Returns `true` if a backing store exists at `path`.
pub fn store_exists(path: &Path) -> bool {
    path.exists()
}

/// Writes the store image to `path`.
///
/// The image goes to a temporary file which is synced and then renamed
/// over the previous image, so a crash leaves either the old or the new
/// image on disk, never a mix.
pub fn write_store(path: &Path, store: &AreaStore) -> Result<(), DbError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;
    }

    let body = store.encode();
    let mut hasher = Hasher::new();
    hasher.update(&body);
    let checksum = hasher.finalize();

    let temp_path = path.with_extension("tmp");
    let mut file =
        File::create(&temp_path).map_err(|e| classify_io_error(e, "Failed to create temp file"))?;
    file.write_all(&body)
        .and_then(|_| file.write_all(&checksum.to_le_bytes()))
        .map_err(|e| classify_io_error(e, "Failed to write store image"))?;
    file.sync_all()
        .map_err(|e| classify_io_error(e, "Failed to sync store image"))?;
    drop(file);

    fs::rename(&temp_path, path)
        .map_err(|e| classify_io_error(e, "Failed to rename store image"))?;
    Ok(())
}

#[cfg(feature = "persist")]
fn read_image(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    // SAFETY: the mapping is copied out before the file handle is dropped and
    // backing files are only ever replaced by rename, never truncated in place.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap.to_vec())
}

#[cfg(not(feature = "persist"))]
fn read_image(path: &Path) -> std::io::Result<Vec<u8>> {
    fs::read(path)
}

/// Loads and verifies a store image written by [`write_store`].
pub fn load_store(
    path: &Path,
    max_retries: u32,
    retry_delay_ms: u64,
) -> Result<AreaStore, DbError> {
    let raw = retry_io_operation(
        || read_image(path),
        max_retries,
        retry_delay_ms,
        "Failed to read store image",
    )?;

    if raw.len() < 4 {
        return Err(DbError::DataCorruption(format!(
            "store image {} is truncated",
            path.display()
        )));
    }
    let (body, tail) = raw.split_at(raw.len() - 4);
    let mut expected = [0u8; 4];
    expected.copy_from_slice(tail);
    let expected = u32::from_le_bytes(expected);

    let mut hasher = Hasher::new();
    hasher.update(body);
    let actual = hasher.finalize();
    if actual != expected {
        return Err(DbError::DataCorruption(format!(
            "checksum mismatch for {}: expected {:#010x}, got {:#010x}",
            path.display(),
            expected,
            actual
        )));
    }

    AreaStore::decode(body)
}

/// Deletes a backing store image. A missing file is not an error.
pub fn delete_store(path: &Path) -> Result<(), DbError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(classify_io_error(e, "Failed to delete store image")),
    }
}
