//! Tracks which config files already produced an artifact

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Set of config files emitted during one plugin run
///
/// Paths are compared in canonical form so `a/./b.json` and `a/b.json` count
/// once. Paths that cannot be canonicalized are compared as given.
#[derive(Debug, Default)]
pub struct GenerationRecord {
    emitted: HashSet<PathBuf>,
}

impl GenerationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path`, returning `false` when it was already recorded
    pub fn insert(&mut self, path: &Path) -> bool {
        self.emitted.insert(Self::key(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.emitted.contains(&Self::key(path))
    }

    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }

    fn key(path: &Path) -> PathBuf {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_once() {
        let mut record = GenerationRecord::new();
        assert!(record.is_empty());
        assert!(record.insert(Path::new("missing/a_grpc_service_config.json")));
        assert!(!record.insert(Path::new("missing/a_grpc_service_config.json")));
        assert!(record.contains(Path::new("missing/a_grpc_service_config.json")));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_equivalent_paths_are_one_entry() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("v1")).unwrap();
        let config = dir.path().join("v1").join("example_grpc_service_config.json");
        fs::write(&config, "{}").unwrap();

        let mut record = GenerationRecord::new();
        assert!(record.insert(&config));
        assert!(!record.insert(&dir.path().join("v1/./example_grpc_service_config.json")));
        assert!(!record.insert(&dir.path().join("v1/../v1/example_grpc_service_config.json")));
        assert_eq!(record.len(), 1);
    }
}
