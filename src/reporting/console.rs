//! # Console Reporting Module / 控制台报告模块
//!
//! This module handles the display of run results in the console.
//! It provides functionality for printing colorful, formatted summaries with
//! internationalization support.
//!
//! 此模块处理控制台中运行结果的显示。
//! 它提供打印彩色格式化摘要的功能，支持国际化。

use colored::*;

use crate::core::models::{RunResult, Status, StatusCounts};
use crate::infra::t;

/// Formats one summary line, e.g. `3 scenarios passed, 1 failed, 0 skipped`.
/// Counts for `error`, `undefined` and `untested` are only shown when non-zero.
///
/// 格式化一行摘要。`error`、`undefined` 和 `untested` 的计数仅在非零时显示。
///
/// # Arguments / 参数
/// * `level` - Localized, pluralized level name (e.g. "scenarios")
///             本地化的层级名称
/// * `counts` - Status counts of that level
///              该层级的状态计数
/// * `locale` - The language locale to use for messages
///              用于消息的语言区域设置
pub fn format_counts(level: &str, counts: &StatusCounts, locale: &str) -> String {
    let mut line = t!(
        "summary.counts",
        locale = locale,
        level = level,
        passed = counts.passed,
        failed = counts.failed,
        skipped = counts.skipped
    )
    .to_string();
    for status in [Status::Error, Status::Undefined, Status::Untested] {
        let count = counts.get(status);
        if count > 0 {
            line.push_str(&format!(", {} {}", count, status.label(locale)));
        }
    }
    line
}

/// Renders the per-level summary block of a run without colors.
pub fn render_summary(result: &RunResult, locale: &str) -> String {
    let summary = result.summary();
    let mut lines = vec![
        format_counts(&t!("summary.features", locale = locale), &summary.features, locale),
    ];
    if summary.rules.total() > 0 {
        lines.push(format_counts(&t!("summary.rules", locale = locale), &summary.rules, locale));
    }
    lines.push(format_counts(&t!("summary.scenarios", locale = locale), &summary.scenarios, locale));
    lines.push(format_counts(&t!("summary.steps", locale = locale), &summary.steps, locale));
    lines.push(
        t!(
            "summary.duration",
            locale = locale,
            duration = format!("{:.3?}", summary.duration)
        )
        .to_string(),
    );
    if result.cancelled {
        lines.push(t!("run_cancelled", locale = locale).to_string());
    }
    lines.join("\n")
}

/// Prints the failing scenarios and the per-level counts of a run.
///
/// 打印失败的场景以及运行的各层级计数。
///
/// # Output Format / 输出格式
/// ```text
/// --- Failing scenarios ---
///   features/login.feature:12  Wrong password
///
/// 1 feature passed, 1 failed, 0 skipped
/// 3 scenarios passed, 1 failed, 0 skipped
/// 11 steps passed, 1 failed, 2 skipped
/// Took 12.301ms
/// ```
pub fn print_summary(result: &RunResult, locale: &str) {
    let failing: Vec<_> = result
        .scenarios()
        .filter(|scenario| scenario.status.is_failure())
        .collect();
    if !failing.is_empty() {
        println!("\n{}", t!("failing_scenarios_banner", locale = locale).red().bold());
        for scenario in failing {
            println!("  {}  {}", scenario.id.to_string().cyan(), scenario.name);
        }
    }

    println!();
    for line in render_summary(result, locale).lines() {
        let styled = if result.cancelled {
            line.yellow()
        } else if result.is_success() {
            line.green()
        } else {
            line.normal()
        };
        println!("{}", styled);
    }
    if let Some(message) = &result.error_message {
        println!("{} {}", t!("suite_hook_error", locale = locale).red().bold(), message);
    }
}

/// Prints the failed step and captured output of every failing scenario.
///
/// 打印每个失败场景的失败步骤和捕获的输出。
pub fn print_failure_details(result: &RunResult, locale: &str) {
    let failing: Vec<_> = result
        .scenarios()
        .filter(|scenario| scenario.status.is_failure())
        .collect();
    if failing.is_empty() {
        return;
    }

    println!("\n{}", t!("failure_details_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));
    for (i, scenario) in failing.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            failing.len(),
            scenario.status.label(locale).red(),
            scenario.name.cyan(),
            scenario.id
        );
        if scenario.attempts > 1 {
            println!("  {}", t!("attempts", locale = locale, count = scenario.attempts).yellow());
        }
        if let Some(message) = &scenario.error_message {
            println!("  {}", message);
        }
        if let Some(step) = scenario.failed_step() {
            println!("  {} {} (line {})", step.keyword.bold(), step.text, step.line);
            if let Some(message) = &step.error_message {
                for line in message.lines() {
                    println!("    {}", line.red());
                }
            }
            print_captured(&step.captured.stdout, "stdout");
            print_captured(&step.captured.stderr, "stderr");
            print_captured(&step.captured.log, "log");
        }
        println!("{}", "-".repeat(80));
    }
}

fn print_captured(output: &str, header: &str) {
    if output.is_empty() {
        return;
    }
    println!("\n  --- {} ---", header.yellow());
    for line in output.lines() {
        println!("    {}", line);
    }
}

/// Renders registration snippets for every undefined step.
pub fn render_undefined_snippets(result: &RunResult, locale: &str) -> Option<String> {
    if result.undefined.is_empty() {
        return None;
    }
    let mut out = t!("undefined_snippets_banner", locale = locale).to_string();
    out.push_str("\n\n");
    for undefined in &result.undefined {
        out.push_str(&format!("// {}:{}\n{}\n\n", undefined.path, undefined.line, undefined.snippet));
    }
    Some(out)
}

pub fn print_undefined_snippets(result: &RunResult, locale: &str) {
    if let Some(snippets) = render_undefined_snippets(result, locale) {
        println!("\n{}", snippets.yellow());
    }
}
