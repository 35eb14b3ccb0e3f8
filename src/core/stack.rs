//! Stack trace capture
//!
//! Traces are rendered as a header line followed by one function line and one
//! tab-indented location line per frame:
//!
//! ```text
//! STACKTRACE: thread 'main'
//! my_app::handlers::load
//! 	./src/handlers.rs:42:9
//! my_app::main
//! 	./src/main.rs:10:5
//! ```
//!
//! Standard library and runtime frames are dropped wherever they appear.
//! Frames of the record-building machinery are dropped from the top of the
//! trace, so the first frame left is the code that asked for the trace.

use std::backtrace::{Backtrace, BacktraceStatus};

/// Extra frames skipped by the logger emit methods, on top of the internal
/// frames that are always removed. Raise it by one for every wrapper function
/// placed between application code and a `Logger` method.
pub const STACK_SKIP_FRAMES: usize = 0;

const TRACE_HEADER: &str = "STACKTRACE:";

/// Symbol prefixes of frames that never carry application information.
const RUNTIME_SYMBOLS: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "test::",
    "__rust",
    "__libc_start",
    "rust_begin_unwind",
];

/// Bare symbols of thread and process entry points.
const ENTRY_SYMBOLS: &[&str] = &["_start", "start_thread", "clone", "clone3", "main", "<unknown>"];

/// Symbols of this crate's own capture path.
const INTERNAL_SYMBOLS: &[&str] = &[
    "rust_logging_core::core::stack::capture_stack_trace",
    "rust_logging_core::core::log_record::LogRecord::",
    "rust_logging_core::core::logger::Logger::",
    "rust_logging_core::writers::base::FeedbackSlot::",
    "rust_logging_core::session::LoggingSession::",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    function: String,
    location: Option<String>,
}

/// Capture the stack of the calling thread.
///
/// `skip` removes that many frames after the internal ones; use it when the
/// capture is requested from a helper that should not show up in the trace.
pub fn capture_stack_trace(skip: usize) -> String {
    let backtrace = Backtrace::force_capture();
    let frames = match backtrace.status() {
        BacktraceStatus::Captured => parse_frames(&backtrace.to_string()),
        _ => Vec::new(),
    };

    render(&current_thread_label(), frames.into_iter(), skip)
}

/// Function and location lines of the first frame of a rendered trace,
/// joined by a space.
pub fn first_frame(stack_trace: &str) -> Option<String> {
    let mut lines = stack_trace.lines();
    if !lines.next()?.starts_with(TRACE_HEADER) {
        return None;
    }

    let function = lines.next()?.trim();
    if function.is_empty() {
        return None;
    }

    match lines.next() {
        Some(location) if location.starts_with('\t') => {
            Some(format!("{} {}", function, location.trim()))
        }
        _ => Some(function.to_string()),
    }
}

fn current_thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => format!("thread '{}'", name),
        None => format!("thread {:?}", thread.id()),
    }
}

fn render(thread_label: &str, frames: impl Iterator<Item = Frame>, skip: usize) -> String {
    let mut trace = format!("{} {}", TRACE_HEADER, thread_label);

    frames
        .filter(|frame| !is_runtime(&frame.function))
        .skip_while(|frame| is_internal(&frame.function))
        .skip(skip)
        .for_each(|frame| {
            trace.push('\n');
            trace.push_str(&frame.function);
            if let Some(location) = frame.location {
                trace.push_str("\n\t");
                trace.push_str(&location);
            }
        });

    trace
}

fn parse_frames(raw: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in raw.lines() {
        let line = line.trim_start();

        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                frame.location.get_or_insert_with(|| location.trim().to_string());
            }
            continue;
        }

        if let Some((index, function)) = line.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                frames.push(Frame {
                    function: function.trim().to_string(),
                    location: None,
                });
            }
        }
    }

    frames
}

fn symbol_path(function: &str) -> &str {
    function.trim_start_matches('<')
}

fn is_runtime(function: &str) -> bool {
    let path = symbol_path(function);
    ENTRY_SYMBOLS.contains(&function) || RUNTIME_SYMBOLS.iter().any(|marker| path.starts_with(marker))
}

fn is_internal(function: &str) -> bool {
    let path = symbol_path(function);
    INTERNAL_SYMBOLS.iter().any(|marker| path.starts_with(marker))
}
