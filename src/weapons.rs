//! Weapon list file loading.

use std::path::Path;

use threatload_core::error::{IngestError, Result};
use threatload_core::weapons::WeaponList;

/// Read a newline-delimited weapon list from `path`.
///
/// Fails with `ResourceNotFound` when the file is missing and `Decoding`
/// when it is not valid UTF-8.
pub fn load_weapon_list(path: &Path) -> Result<WeaponList> {
    let bytes = std::fs::read(path).map_err(|e| IngestError::from_io(path, e))?;
    let content = String::from_utf8(bytes).map_err(|e| IngestError::Decoding {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let list = WeaponList::parse(&content);
    tracing::debug!(path = %path.display(), terms = list.len(), "loaded weapon list");
    Ok(list)
}
