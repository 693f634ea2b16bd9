use camino::Utf8PathBuf;
use directories::ProjectDirs;

use crate::StorageError;

const QUALIFIER: &str = "com";
const ORG: &str = "rounds";
const APP: &str = "client";

/// Per-user default location for the schedule cache database.
pub fn default_cache_root() -> Result<Utf8PathBuf, StorageError> {
    let proj_dirs = ProjectDirs::from(QUALIFIER, ORG, APP)
        .ok_or_else(|| StorageError::InvalidPath("cannot determine data dir".into()))?;
    let root = proj_dirs.data_dir().join("cache");
    Utf8PathBuf::from_path_buf(root)
        .map_err(|p| StorageError::InvalidPath(p.to_string_lossy().into_owned()))
}
