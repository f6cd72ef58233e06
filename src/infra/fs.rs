//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides the small set of file helpers used by reporters:
//! writing rerun files and JSON reports atomically, and reading rerun files
//! back for location selection.
//!
//! 此模块提供报告器使用的文件辅助功能：
//! 原子地写入重跑文件和 JSON 报告，并读回重跑文件以进行位置选择。

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `contents` to `path`, creating parent directories as needed.
///
/// The data is written to a temporary file in the same directory first and
/// then renamed over `path`, so readers never observe a half-written report.
///
/// 将 `contents` 写入 `path`，必要时创建父目录。先写入同目录下的临时文件再重命名。
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let mut file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("Failed to move report into place: {}", path.display()))?;
    Ok(())
}

/// Reads a UTF-8 text file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Removes `path` if it exists. A missing file is not an error.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
