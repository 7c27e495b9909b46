//! File access for module images.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::Result;

/// Read a module image from disk via a memory mapping.
///
/// Used for bootstrap-time offers: modules captured to disk before the
/// registry was installed can be parsed and offered out-of-band. The mapping
/// is copied into an owned buffer so the returned bytes outlive the file
/// handle.
///
/// # Errors
/// Returns [`crate::Error::Empty`] for zero-length files and
/// [`crate::Error::FileError`] for I/O failures.
pub fn read_module_file(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(crate::Error::Empty);
    }

    // Safety: the mapping is read-only and copied out before the file handle
    // drops.
    let mapping = unsafe { Mmap::map(&file)? };
    Ok(mapping.to_vec())
}
