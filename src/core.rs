//! # Core Module / 核心模块
//!
//! This module contains the engine itself: the document model, tag
//! expressions, step patterns and the step registry, the layered context,
//! hooks, planning and the hierarchical runner.
//!
//! 此模块包含引擎本身：文档模型、标签表达式、步骤模式与步骤注册表、
//! 分层上下文、钩子、执行计划以及分层运行器。

pub mod config;
pub mod context;
pub mod document;
pub mod errors;
pub mod execution;
pub mod hooks;
pub mod models;
pub mod patterns;
pub mod planner;
pub mod registry;
pub mod tags;

// Re-exports
pub use config::{RunOptions, RunnerConfig, load_runner_config};
pub use context::{Context, Origin, ScopeLevel};
pub use document::{Feature, Rule, Scenario, ScenarioOutline, Step, Suite};
pub use execution::Runner;
pub use hooks::{HookEvent, HookPoint, HookScope, Hooks};
pub use models::{RunResult, Status};
pub use registry::{StepCall, StepRegistry};
pub use tags::{TagExpression, TagFilter};
