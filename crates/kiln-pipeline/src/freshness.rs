//! Skip-if-newer checks for expensive conversions.

use std::fs;
use std::io;
use std::path::Path;

/// Whether `output` has to be regenerated from `source`.
///
/// True when the output is missing or strictly older than the source.
pub fn needs_rebuild(source: &Path, output: &Path) -> io::Result<bool> {
    let output_meta = match fs::metadata(output) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };

    let source_time = fs::metadata(source)?.modified()?;
    let output_time = output_meta.modified()?;

    Ok(source_time > output_time)
}
