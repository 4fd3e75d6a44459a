//! # Cache Commands Module / 缓存命令模块
//!
//! `show-cache` and `clear-cache`.

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use crate::core::cache::CacheStore;
use crate::core::models::ScenarioStatus;

/// Prints the cached status of every scenario. Never modifies the file.
///
/// 打印每个场景的缓存状态，不会修改缓存文件。
pub fn show_cache(root: &Path) -> Result<()> {
    let store = CacheStore::new(root);
    let doc = store.load_or_default();

    if doc.is_empty() {
        println!("Cache is empty or does not exist.");
        return Ok(());
    }

    println!("{} {}", "Cache file:".bold(), store.path().display());
    println!("  Cache Version: {}", doc.schema_version);
    println!("  Last Run: {}", doc.last_run);
    println!("  Scenarios:");
    for (id, status) in &doc.scenarios {
        let label = match status.parse::<ScenarioStatus>() {
            Ok(ScenarioStatus::Passed) => status.green(),
            Ok(ScenarioStatus::Failed) => status.red(),
            Ok(ScenarioStatus::Xfailed | ScenarioStatus::Xpassed) => status.yellow(),
            _ => status.dimmed(),
        };
        println!("    - {id}: {label}");
    }
    Ok(())
}

/// Deletes the cache file if there is one.
pub fn clear_cache(root: &Path) -> Result<()> {
    let store = CacheStore::new(root);
    let removed = store
        .clear()
        .with_context(|| format!("Failed to delete {}", store.path().display()))?;
    if removed {
        println!("{} {}", "Cache cleared:".green(), store.path().display());
    } else {
        println!("No cache file to clear.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheDocument;

    #[test]
    fn clear_reports_whether_a_file_was_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let mut doc = CacheDocument::default();
        doc.update("web:default", ScenarioStatus::Failed);
        store.save(&mut doc).unwrap();

        clear_cache(dir.path()).unwrap();
        assert!(!store.path().exists());
        clear_cache(dir.path()).unwrap();
    }

    #[test]
    fn show_does_not_create_a_cache() {
        let dir = tempfile::tempdir().unwrap();
        show_cache(dir.path()).unwrap();
        assert!(!CacheStore::new(dir.path()).path().exists());
    }
}
