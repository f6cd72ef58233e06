//! # JSON Report Module / JSON 报告模块
//!
//! Serializes the full result tree with `serde_json`.
//! 使用 `serde_json` 序列化完整的结果树。

use anyhow::{Context, Result};
use std::path::Path;

use crate::core::models::RunResult;
use crate::infra::fs;

/// Pretty-printed JSON document for `result`.
pub fn to_json(result: &RunResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize run result")
}

pub fn write_json_report(path: &Path, result: &RunResult) -> Result<()> {
    let json = to_json(result)?;
    fs::write_atomic(path, &json)
        .with_context(|| format!("Failed to write JSON report: {}", path.display()))
}
