//! # Output Capture Module / 输出捕获模块
//!
//! Per-scope capture of log output. While [`capture_log`] runs a closure,
//! every `tracing` event raised on the same thread is formatted into a
//! thread-local buffer by [`CaptureLayer`] and handed back to the caller, which
//! stores it in the `Captured` record of the node being executed. Parallel
//! feature workers run on separate threads, so their buffers never mix.
//!
//! 按作用域捕获日志输出。在 [`capture_log`] 运行闭包期间，同一线程上产生的每个
//! `tracing` 事件都会被 [`CaptureLayer`] 格式化到线程局部缓冲区中。

use std::cell::RefCell;
use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt as fmt_layer};

thread_local! {
    static ACTIVE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Events from this crate are runner diagnostics, not user output.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Layer that copies events into the active capture buffer of the current
/// thread. Events raised outside a capture scope are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureLayer;

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(OWN_TARGET) {
            return;
        }
        ACTIVE.with(|active| {
            let Ok(mut active) = active.try_borrow_mut() else {
                return;
            };
            let Some(buffer) = active.as_mut() else {
                return;
            };
            let mut line = format!("{:<5} {}:", metadata.level(), metadata.target());
            event.record(&mut LineVisitor { line: &mut line });
            buffer.push_str(&line);
            buffer.push('\n');
        });
    }
}

struct LineVisitor<'a> {
    line: &'a mut String,
}

impl Visit for LineVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            let _ = write!(self.line, " {value}");
        } else {
            let _ = write!(self.line, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.line, " {value:?}");
        } else {
            let _ = write!(self.line, " {}={value:?}", field.name());
        }
    }
}

/// Restores the enclosing capture buffer when a scope ends, even on unwind.
struct ScopeGuard {
    previous: Option<String>,
    finished: Option<String>,
}

impl ScopeGuard {
    fn enter() -> Self {
        let previous = ACTIVE.with(|active| active.borrow_mut().replace(String::new()));
        Self {
            previous,
            finished: None,
        }
    }

    fn finish(mut self) -> String {
        self.finished = ACTIVE.with(|active| active.borrow_mut().take());
        self.finished.take().unwrap_or_default()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|active| *active.borrow_mut() = previous);
    }
}

/// Runs `f` with a fresh log capture buffer and returns its result together
/// with every event captured while it ran. Nested scopes each get their own
/// buffer; the outer buffer resumes afterwards.
///
/// 使用新的日志捕获缓冲区运行 `f`，返回其结果以及运行期间捕获的所有事件。
pub fn capture_log<R>(f: impl FnOnce() -> R) -> (R, String) {
    let guard = ScopeGuard::enter();
    let result = f();
    (result, guard.finish())
}

/// Installs a stderr `fmt` layer at `INFO` plus [`CaptureLayer`] as the
/// global subscriber. Does nothing when a subscriber is already installed.
pub fn init_subscriber() {
    let _ = tracing_subscriber::registry()
        .with(
            fmt_layer::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::INFO),
        )
        .with(CaptureLayer)
        .try_init();
}
