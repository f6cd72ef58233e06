//! # Configuration Module / 配置模块
//!
//! This module defines the runner configuration loaded from a TOML file and
//! compiles it into [`RunOptions`]. Compilation parses every tag expression,
//! name pattern and location up front, so malformed selection input fails
//! before any hook or step runs.
//!
//! 此模块定义从 TOML 文件加载的运行器配置，并将其编译为 [`RunOptions`]。
//! 编译时预先解析所有标签表达式、名称模式和位置，因此格式错误的选择输入会在
//! 任何钩子或步骤运行之前失败。

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::errors::ConfigError;
use crate::core::planner::{ScenarioLocation, Selection};
use crate::core::tags::{TagExpression, TagFilter};
use crate::infra::fs;

/// Bounded retry of failing scenarios.
/// 失败场景的有限次重试。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per scenario, including the first run.
    /// 每个场景的总尝试次数，包括首次运行。
    pub max_attempts: u32,
    /// Tag expressions a scenario must satisfy to be retried. Empty means all.
    /// 场景必须满足才能重试的标签表达式。为空表示全部。
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Runner configuration, loaded from a TOML file. Every field is optional.
/// 运行器配置，从 TOML 文件加载。所有字段都是可选的。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Tag expressions; a scenario must satisfy all of them.
    /// 标签表达式；场景必须满足所有表达式。
    pub tags: Vec<String>,
    /// Scenario name regexes; a scenario must match at least one.
    /// 场景名称正则表达式；场景必须至少匹配一个。
    pub names: Vec<String>,
    /// `path` or `path:line[:line...]` selectors, as written in rerun files.
    /// `path` 或 `path:line[:line...]` 选择器，与重跑文件中的写法一致。
    pub include_locations: Vec<String>,
    /// Tag expression marking scenarios that keep executing after a failed step.
    /// 标记在步骤失败后继续执行的场景的标签表达式。
    pub continue_after_failed_step: Option<String>,
    /// Stop starting new scenarios after the first failure.
    /// 首次失败后停止启动新场景。
    pub stop_on_failure: bool,
    /// Match steps without executing them or any hook.
    /// 匹配步骤但不执行步骤或任何钩子。
    pub dry_run: bool,
    /// Number of features run concurrently. `1` keeps the run sequential,
    /// `0` uses one worker per CPU.
    /// 并发运行的功能数量。`1` 表示顺序运行，`0` 表示每个 CPU 一个工作线程。
    pub jobs: usize,
    pub retry: Option<RetryConfig>,
    /// Where to write the rerun file after a run.
    /// 运行后写入重跑文件的位置。
    pub rerun_file: Option<PathBuf>,
    /// Where to write the JSON report after a run.
    /// 运行后写入 JSON 报告的位置。
    pub json_report: Option<PathBuf>,
    /// The language for console output (e.g., "en", "zh-CN").
    /// 控制台输出的语言（例如 "en", "zh-CN"）。
    pub language: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            names: Vec::new(),
            include_locations: Vec::new(),
            continue_after_failed_step: None,
            stop_on_failure: false,
            dry_run: false,
            jobs: 1,
            retry: None,
            rerun_file: None,
            json_report: None,
            language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// Compiled retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub tags: TagFilter,
}

/// Execution options with every predicate already parsed.
/// 所有谓词均已解析的执行选项。
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub selection: Selection,
    pub continue_after_failed_step: Option<TagExpression>,
    pub stop_on_failure: bool,
    pub dry_run: bool,
    pub jobs: usize,
    pub retry: Option<RetryPolicy>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            selection: Selection::all(),
            continue_after_failed_step: None,
            stop_on_failure: false,
            dry_run: false,
            jobs: 1,
            retry: None,
        }
    }
}

impl RunnerConfig {
    /// Parses every predicate into [`RunOptions`].
    pub fn compile(&self) -> Result<RunOptions, ConfigError> {
        let names = self
            .names
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::NamePattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut locations = Vec::new();
        for text in &self.include_locations {
            locations.extend(ScenarioLocation::parse_many(text)?);
        }

        let retry = match &self.retry {
            Some(retry) if retry.max_attempts == 0 => return Err(ConfigError::ZeroRetryAttempts),
            Some(retry) => Some(RetryPolicy {
                max_attempts: retry.max_attempts,
                tags: TagFilter::parse_all(&retry.tags)?,
            }),
            None => None,
        };

        Ok(RunOptions {
            selection: Selection {
                tags: TagFilter::parse_all(&self.tags)?,
                names,
                locations,
            },
            continue_after_failed_step: self
                .continue_after_failed_step
                .as_deref()
                .map(TagExpression::parse)
                .transpose()?,
            stop_on_failure: self.stop_on_failure,
            dry_run: self.dry_run,
            jobs: match self.jobs {
                0 => num_cpus::get().max(1),
                jobs => jobs,
            },
            retry,
        })
    }
}

/// Loads a [`RunnerConfig`] from a TOML file.
///
/// # Arguments
/// * `path` - Path to the TOML configuration file
///
/// # Returns
/// The parsed configuration, with defaults for omitted fields.
pub fn load_runner_config(path: &Path) -> Result<RunnerConfig> {
    let content = fs::read_text(path)?;
    let config: RunnerConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse runner config: {}", path.display()))?;
    Ok(config)
}
