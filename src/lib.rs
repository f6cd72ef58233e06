//! # Gherkin Runner Library / Gherkin Runner 库
//!
//! This library provides a behaviour-driven test execution engine: it runs
//! an in-memory suite of Gherkin features against a registry of step
//! implementations, with symmetric hooks at every level, tag-expression
//! selection, and reproducible results (status rollup and rerun files).
//!
//! 此库提供行为驱动的测试执行引擎：它针对步骤实现注册表运行内存中的
//! Gherkin 功能套件，在每个层级提供对称的钩子、标签表达式选择以及可复现的结果。
//!
//! ## Modules / 模块
//!
//! - `core` - Document model, matching, hooks and the execution engine
//! - `infra` - Infrastructure services like output capture and file system operations
//! - `reporting` - Console summary, rerun files and JSON reports
//!
//! - `core` - 文档模型、匹配、钩子和执行引擎
//! - `infra` - 基础设施服务，如输出捕获和文件系统操作
//! - `reporting` - 控制台摘要、重跑文件和 JSON 报告

pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::errors::{self, StopRun};
pub use core::execution;
pub use core::models;
pub use core::{
    Context, Feature, Hooks, Rule, RunOptions, RunResult, Runner, RunnerConfig, Scenario,
    ScenarioOutline, Status, Step, StepCall, StepRegistry, Suite, TagExpression,
};

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for console output. It attempts to match the full locale
/// (e.g., "zh-CN"), then just the language code (e.g., "en"), and finally
/// falls back to the default language ("en").
pub fn init() {
    // Detect system locale and set it for i18n.
    // Fallback to "en" if detection fails.
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    init_with_locale(&locale);
}

/// Sets the console locale explicitly, e.g. from `RunnerConfig::language`.
/// Returns the locale actually selected.
pub fn init_with_locale(locale: &str) -> &'static str {
    let available_locales = rust_i18n::available_locales!();

    // Try to match the full locale first (e.g., "zh-CN")
    // Then try to match the language part only (e.g., "en" from "en-US")
    // Finally, fall back to "en"
    let lang = available_locales
        .iter()
        .copied()
        .find(|available| *available == locale)
        .or_else(|| {
            locale
                .split('-')
                .next()
                .and_then(|code| available_locales.iter().copied().find(|available| *available == code))
        })
        .unwrap_or("en");

    rust_i18n::set_locale(lang);
    lang
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
