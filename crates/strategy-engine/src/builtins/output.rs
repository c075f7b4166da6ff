//! Capture of `print`/`log` output produced while a script runs.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl OutputLevel {
    /// Parses a script-supplied level; unknown names read as `info`.
    pub fn parse(level: &str) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "debug" | "trace" => OutputLevel::Debug,
            "warn" | "warning" => OutputLevel::Warn,
            "error" => OutputLevel::Error,
            _ => OutputLevel::Info,
        }
    }
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputLevel::Debug => "debug",
            OutputLevel::Info => "info",
            OutputLevel::Warn => "warn",
            OutputLevel::Error => "error",
        })
    }
}

/// One line written by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub level: OutputLevel,
    pub message: String,
}

thread_local! {
    static SINK: RefCell<Option<Vec<ScriptOutput>>> = const { RefCell::new(None) };
}

/// Records a line if a capture is active on this thread; dropped otherwise.
pub fn emit(level: OutputLevel, message: impl Into<String>) {
    let message = message.into();
    SINK.with(|sink| {
        if let Some(lines) = sink.borrow_mut().as_mut() {
            lines.push(ScriptOutput { level, message });
        }
    });
}

/// Runs `f` with output capture enabled and returns its result together
/// with every line emitted meanwhile. Nested captures are flattened into
/// the outermost one.
pub fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<ScriptOutput>) {
    let outermost = SINK.with(|sink| {
        let mut sink = sink.borrow_mut();
        if sink.is_none() {
            *sink = Some(Vec::new());
            true
        } else {
            false
        }
    });
    let result = f();
    let lines = if outermost {
        SINK.with(|sink| sink.borrow_mut().take().unwrap_or_default())
    } else {
        Vec::new()
    };
    (result, lines)
}
