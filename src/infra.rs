//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for the runner:
//! per-scope log capture, file system helpers, and i18n support.
//!
//! 此模块为运行器提供基础设施服务，
//! 包括按作用域的日志捕获、文件系统辅助功能和国际化支持。

pub mod capture;
pub mod fs;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
