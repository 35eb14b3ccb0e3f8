//! Writer implementations

pub mod base;
pub mod callback;
#[cfg(feature = "console")]
pub mod console;
#[cfg(feature = "file")]
pub mod file;
#[cfg(feature = "file")]
pub mod json;
#[cfg(feature = "file")]
pub mod rotating_file;
#[cfg(all(unix, feature = "syslog"))]
pub mod syslog;
#[cfg(feature = "network")]
pub mod tcp;

pub use base::{FeedbackSlot, Lifecycle, WriterState};
pub use callback::{AsyncCallbackWriter, CallbackResult, CallbackWriter};
#[cfg(feature = "console")]
pub use console::ConsoleWriter;
#[cfg(feature = "file")]
pub use file::FileWriter;
#[cfg(feature = "file")]
pub use json::JsonWriter;
#[cfg(feature = "file")]
pub use rotating_file::{RotatingFileWriter, RotationPolicy, RotationStrategy};
#[cfg(all(unix, feature = "syslog"))]
pub use self::syslog::{Facility as SyslogFacility, SyslogTransport, SyslogWriter};
#[cfg(feature = "network")]
pub use tcp::{StateCallback, TcpStreamWriter};

pub use crate::core::Writer;
