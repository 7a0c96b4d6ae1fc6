//! Input unit discovery.
//!
//! Units are the regular files of a folder whose extension matches the
//! configured filter, compared case-insensitively. The returned list is sorted
//! by file name so repeated runs over the same folder produce the same order.

use crate::source::types::Unit;
use std::path::{Path, PathBuf};

/// Scan `folder` for files with the given extension.
///
/// `extension` may be given with or without a leading dot.
pub fn discover_units(folder: &Path, extension: &str) -> Result<Vec<Unit>, DiscoveryError> {
    if !folder.is_dir() {
        return Err(DiscoveryError::InvalidFolder(folder.to_path_buf()));
    }

    let wanted = extension.trim_start_matches('.').to_lowercase();
    let entries = std::fs::read_dir(folder).map_err(|e| DiscoveryError::Io {
        folder: folder.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut units: Vec<Unit> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| has_extension(p, &wanted))
        .map(|p| Unit::from_path(&p))
        .collect();

    units.sort_by(|a, b| a.id.cmp(&b.id));

    tracing::debug!(
        folder = %folder.display(),
        extension = %wanted,
        count = units.len(),
        "discovered input units"
    );

    Ok(units)
}

/// Case-insensitive extension match.
fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase() == wanted)
        .unwrap_or(false)
}

/// Errors that can occur while scanning for units.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The folder does not exist or is not a directory
    InvalidFolder(PathBuf),
    /// The folder could not be listed
    Io { folder: PathBuf, message: String },
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidFolder(p) => write!(f, "Invalid folder path: {}", p.display()),
            DiscoveryError::Io { folder, message } => {
                write!(f, "Could not read folder {}: {message}", folder.display())
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pfd-discovery-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_discovery_filters_and_sorts() {
        let dir = scratch_dir();
        for name in ["c.xlsx", "A.XLSX", "b.Xlsx", "notes.txt", "d.xlsx.bak"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        std::fs::create_dir_all(dir.join("folder.xlsx")).unwrap();

        let units = discover_units(&dir, "xlsx").unwrap();
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["A.XLSX", "b.Xlsx", "c.xlsx"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_discovery_accepts_dotted_extension() {
        let dir = scratch_dir();
        std::fs::write(dir.join("shot.xlsx"), b"").unwrap();

        let units = discover_units(&dir, ".xlsx").unwrap();
        assert_eq!(units.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_discovery_empty_folder() {
        let dir = scratch_dir();
        let units = discover_units(&dir, "xlsx").unwrap();
        assert!(units.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_discovery_invalid_folder() {
        let missing = std::env::temp_dir().join(format!("pfd-missing-{}", Uuid::new_v4()));
        let err = discover_units(&missing, "xlsx").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidFolder(_)));
    }
}
