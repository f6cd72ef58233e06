//! # Reporting Module / 报告模块
//!
//! This module turns a finished [`RunResult`](crate::core::models::RunResult)
//! into output: a colorful, localized console summary, a rerun file listing
//! the failing scenarios, and a JSON report.
//!
//! 此模块将完成的运行结果转换为输出：彩色的本地化控制台摘要、
//! 列出失败场景的重跑文件以及 JSON 报告。

pub mod console;
pub mod json;
pub mod rerun;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary, print_undefined_snippets};
pub use json::write_json_report;
pub use rerun::{read_rerun_file, write_rerun_file};
