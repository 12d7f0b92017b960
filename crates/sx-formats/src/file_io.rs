//! Whole-file loading.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::FormatError;

/// Read a whole file into memory.
///
/// A short read is not an error: the bytes that were read are returned and
/// a warning is logged.
pub fn load_file_data(path: &Path) -> Result<Vec<u8>, FormatError> {
    let mut file = File::open(path).map_err(|e| {
        log::warn!("fileio: [{}] failed to open file: {}", path.display(), e);
        e
    })?;
    let expected = file.metadata().map(|m| m.len()).unwrap_or(0);

    let mut data = Vec::with_capacity(expected as usize);
    if let Err(e) = file.read_to_end(&mut data) {
        if data.is_empty() {
            log::warn!("fileio: [{}] failed to read file: {}", path.display(), e);
            return Err(e.into());
        }
        log::warn!("fileio: [{}] read interrupted: {}", path.display(), e);
    }

    if (data.len() as u64) < expected {
        log::warn!(
            "fileio: [{}] file partially loaded ({} of {} bytes)",
            path.display(),
            data.len(),
            expected
        );
    } else {
        log::info!("fileio: [{}] file loaded successfully", path.display());
    }
    Ok(data)
}
