//! # File System Utilities Module / 文件系统工具模块
//!
//! Helpers for writing files atomically and resolving user-supplied paths.
//!
//! 用于原子写入文件和解析用户提供路径的辅助函数。

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Writes `contents` to `target` through a temporary file in the same directory,
/// then renames it over the target.
///
/// A failed write never touches an existing `target`; the temporary file is
/// removed when the `NamedTempFile` guard is dropped on the error path.
///
/// 通过同一目录下的临时文件写入 `contents`，然后将其重命名覆盖目标文件。
/// 写入失败时不会触及已有的 `target`；临时文件会在错误路径上随 guard 一起删除。
pub fn atomic_write(target: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Expands `~` and environment variables, then makes the path absolute
/// relative to `base`.
///
/// 展开 `~` 和环境变量，然后相对于 `base` 将路径转换为绝对路径。
pub fn resolve_path(raw: &str, base: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?
        .to_string();
    let path = PathBuf::from(expanded);
    let absolute = if path.is_absolute() {
        path
    } else {
        base.join(path)
    };
    // Canonicalize when possible so the exported path has no `..` segments.
    Ok(absolute.canonicalize().unwrap_or(absolute))
}

/// Creates the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create directory '{}'", parent.display()))?;
        }
    }
    Ok(())
}
