//! The `clearcache` command.
//!
//! Rendered output is never invalidated on its own; a template edited under
//! an unchanged name keeps serving its cached output until the file cache
//! directory is cleared with this command.

use sigil_core::{Settings, SigilResult};
use tracing::info;

use crate::command::ManagementCommand;

/// Removes every entry of the file render cache.
pub struct ClearCacheCommand;

/// Deletes the `.cache` entries in the configured cache directory.
///
/// Returns the number of entries removed. The memory backend has nothing to
/// clear between processes.
pub fn clear_file_cache(settings: &Settings) -> SigilResult<usize> {
    let Some(dir) = settings
        .cache
        .location
        .as_ref()
        .filter(|_| settings.cache.backend == "file")
    else {
        return Ok(0);
    };
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "cache") {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

impl ManagementCommand for ClearCacheCommand {
    fn name(&self) -> &'static str {
        "clearcache"
    }

    fn help(&self) -> &'static str {
        "Remove all cached render output"
    }

    fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> SigilResult<()> {
        let removed = clear_file_cache(settings)?;
        info!(removed, "Cleared render cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_file_cache_removes_only_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cache"), "x").unwrap();
        std::fs::write(dir.path().join("b.cache"), "y").unwrap();
        std::fs::write(dir.path().join("keep.txt"), "z").unwrap();

        let mut settings = Settings::default();
        settings.cache.backend = "file".to_string();
        settings.cache.location = Some(dir.path().to_path_buf());

        assert_eq!(clear_file_cache(&settings).unwrap(), 2);
        assert!(dir.path().join("keep.txt").exists());
        assert_eq!(clear_file_cache(&settings).unwrap(), 0);
    }

    #[test]
    fn test_clear_memory_backend_is_noop() {
        assert_eq!(clear_file_cache(&Settings::default()).unwrap(), 0);
    }
}
