//! Mtime-based artifact cache (spec.md §4.8 steps 2, 3, 5; SPEC_FULL.md
//! §4.8 "the on-disk artifact cache path convention... implemented as
//! `builder::cache::ArtifactCache`, one per build directory, shared
//! between the header-importer cache step and the codegen cache step").
//!
//! Layout under a build directory: `artifacts/<module>.hl` (serialized
//! `Module`, JSON per spec.md §6), `artifacts/<module>.bc` (LLVM bitcode)
//! or `artifacts/<module>.obj` (native object, Windows/debug builds).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, trace};

use crate::model::module::Module;

use super::ToolError;

pub struct ArtifactCache {
    artifacts_dir: PathBuf,
}

impl ArtifactCache {
    /// `build_dir/artifacts`, created if missing.
    pub fn new(build_dir: &Path) -> Result<Self, ToolError> {
        let artifacts_dir = build_dir.join("artifacts");
        fs::create_dir_all(&artifacts_dir).map_err(|error| ToolError::Io {
            path: artifacts_dir.clone(),
            source: error.to_string(),
        })?;
        Ok(ArtifactCache { artifacts_dir })
    }

    pub fn module_path(&self, module_name: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{module_name}.hl"))
    }

    pub fn bitcode_path(&self, module_name: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{module_name}.bc"))
    }

    pub fn object_path(&self, module_name: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{module_name}.obj"))
    }

    /// True when `cache_path` exists and its mtime is newer than
    /// `input_path`'s — the reuse rule spec.md §4.8 states for every
    /// cache step. A cache whose input is missing a readable mtime (e.g.
    /// a synthetic in-memory source with no backing file) is never
    /// considered fresh, so callers always regenerate it at least once.
    pub fn is_fresh(&self, cache_path: &Path, input_path: &Path) -> bool {
        let (Some(cache_time), Some(input_time)) = (mtime(cache_path), mtime(input_path)) else {
            return false;
        };
        cache_time > input_time
    }

    pub fn load_module(&self, module_name: &str) -> Option<Module> {
        let path = self.module_path(module_name);
        let contents = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(module) => {
                trace!("reusing cached module '{module_name}' from {}", path.display());
                Some(module)
            }
            Err(error) => {
                debug!("ignoring corrupt cache entry {}: {error}", path.display());
                None
            }
        }
    }

    pub fn store_module(&self, module: &Module) -> Result<(), ToolError> {
        let path = self.module_path(&module.name);
        let json = serde_json::to_string_pretty(module).map_err(|error| ToolError::CorruptCache {
            path: path.clone(),
            source: error.to_string(),
        })?;
        fs::write(&path, json).map_err(|error| ToolError::Io {
            path,
            source: error.to_string(),
        })
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::module::Module;

    #[test]
    fn fresh_cache_survives_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path()).unwrap();

        let module = Module::new("A");
        cache.store_module(&module).unwrap();

        let loaded = cache.load_module("A").unwrap();
        assert_eq!(loaded.name, "A");
    }

    #[test]
    fn missing_module_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path()).unwrap();
        assert!(cache.load_module("Missing").is_none());
    }

    #[test]
    fn is_fresh_false_when_input_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path()).unwrap();
        let module = Module::new("A");
        cache.store_module(&module).unwrap();

        let missing_input = dir.path().join("does-not-exist.hltxt");
        assert!(!cache.is_fresh(&cache.module_path("A"), &missing_input));
    }

    #[test]
    fn is_fresh_true_when_cache_newer_than_input() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path()).unwrap();

        let input_path = dir.path().join("a.hltxt");
        fs::write(&input_path, "source").unwrap();

        // The cache entry is written after the input, so its mtime is
        // later on any filesystem with at least coarse mtime resolution.
        std::thread::sleep(std::time::Duration::from_millis(10));
        cache.store_module(&Module::new("A")).unwrap();

        assert!(cache.is_fresh(&cache.module_path("A"), &input_path));
    }
}
