//! # Rerun File Module / 重跑文件模块
//!
//! A rerun file lists the scenarios that ended `failed` or `error`, one feature
//! file per line, in the same `path:line[:line...]` form accepted by location
//! selection. Feeding it back through [`parse`] re-selects exactly those
//! scenarios.
//!
//! 重跑文件列出以 `failed` 或 `error` 结束的场景，每行一个功能文件，
//! 格式与位置选择接受的 `path:line[:line...]` 相同。

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::core::errors::ConfigError;
use crate::core::models::RunResult;
use crate::core::planner::ScenarioLocation;
use crate::infra::fs;

/// Renders the rerun file contents. Files are listed in run order and lines
/// in scenario order. Returns an empty string when nothing failed.
pub fn render(result: &RunResult) -> String {
    if result.rerun.is_empty() {
        return String::new();
    }
    let mut files: Vec<(&str, Vec<u32>)> = Vec::new();
    for scenario in result.scenarios().filter(|scenario| result.rerun.contains(&scenario.id)) {
        match files.iter_mut().find(|(path, _)| *path == scenario.id.path) {
            Some((_, lines)) => lines.push(scenario.id.line),
            None => files.push((&scenario.id.path, vec![scenario.id.line])),
        }
    }

    let mut out = format!(
        "# -- RERUN: {} failing scenarios during last test run.\n",
        result.rerun.len()
    );
    for (path, lines) in files {
        out.push_str(path);
        for line in lines {
            out.push(':');
            out.push_str(&line.to_string());
        }
        out.push('\n');
    }
    out
}

/// Parses rerun file contents into locations. Blank lines and `#` comments
/// are ignored.
pub fn parse(text: &str) -> Result<Vec<ScenarioLocation>, ConfigError> {
    let mut locations = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        locations.extend(ScenarioLocation::parse_many(line)?);
    }
    Ok(locations)
}

/// Writes the rerun file for `result`, or removes a stale one when every
/// scenario passed.
pub fn write_rerun_file(path: &Path, result: &RunResult) -> Result<()> {
    if result.rerun.is_empty() {
        return fs::remove_if_exists(path);
    }
    fs::write_atomic(path, &render(result))?;
    info!(path = %path.display(), scenarios = result.rerun.len(), "wrote rerun file");
    Ok(())
}

/// Reads a rerun file back into locations.
pub fn read_rerun_file(path: &Path) -> Result<Vec<ScenarioLocation>> {
    let text = fs::read_text(path)?;
    Ok(parse(&text)?)
}
