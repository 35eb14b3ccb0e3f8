//! Mutable logging context shared by a logger and the records it creates
//!
//! A `LogContext` holds tags, payload fields and a prefix template. Handles
//! can be aliased (same underlying maps) or detached into an independent deep
//! copy. The maps sit behind their own lock so context updates never contend
//! with record delivery.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How `LogContext::assign` takes over another context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Share the same maps; mutations are visible through both handles.
    Alias,
    /// Deep-copy every map and the prefix tag list.
    Clone,
}

#[derive(Debug, Clone, Default)]
struct ContextData {
    tags: HashMap<String, String>,
    payload: HashMap<String, Value>,
    prefix_format: String,
    prefix_tags: Vec<String>,
}

/// Tags, payload and prefix template attached to a logger.
#[derive(Default)]
pub struct LogContext {
    data: Arc<RwLock<ContextData>>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Another handle on the same maps.
    #[must_use]
    pub fn alias(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }

    /// An independent deep copy.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            data: Arc::new(RwLock::new(self.data.read().clone())),
        }
    }

    /// Replace this context with `other`, aliased or cloned.
    pub fn assign(&mut self, other: &LogContext, mode: ContextMode) {
        *self = match mode {
            ContextMode::Alias => other.alias(),
            ContextMode::Clone => other.detached(),
        };
    }

    /// Whether both handles point at the same maps.
    pub fn is_alias_of(&self, other: &LogContext) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn set_tag(&self, name: impl Into<String>, value: impl Into<String>) {
        self.data.write().tags.insert(name.into(), value.into());
    }

    pub fn remove_tag(&self, name: &str) {
        self.data.write().tags.remove(name);
    }

    pub fn tag(&self, name: &str) -> Option<String> {
        self.data.read().tags.get(name).cloned()
    }

    /// Snapshot of all tags.
    pub fn tags(&self) -> HashMap<String, String> {
        self.data.read().tags.clone()
    }

    pub fn set_payload(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.write().payload.insert(key.into(), value.into());
    }

    pub fn remove_payload(&self, key: &str) {
        self.data.write().payload.remove(key);
    }

    pub fn payload_value(&self, key: &str) -> Option<Value> {
        self.data.read().payload.get(key).cloned()
    }

    /// Snapshot of all payload fields.
    pub fn payload(&self) -> HashMap<String, Value> {
        self.data.read().payload.clone()
    }

    /// Set the prefix template and the tag names used, in order, as its
    /// positional arguments.
    pub fn set_prefix<I, S>(&self, format: impl Into<String>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut data = self.data.write();
        data.prefix_format = format.into();
        data.prefix_tags = tags.into_iter().map(Into::into).collect();
    }

    /// The prefix template and its tag names.
    pub fn prefix(&self) -> (String, Vec<String>) {
        let data = self.data.read();
        (data.prefix_format.clone(), data.prefix_tags.clone())
    }

    /// Render the prefix template.
    ///
    /// Without tag names the template is returned verbatim. Otherwise each
    /// `%s`, `%v` or `{}` placeholder takes the value of the next tag name
    /// (empty when the tag is unset) and `%%` renders a literal `%`.
    pub fn render_prefix(&self) -> String {
        let data = self.data.read();
        if data.prefix_format.is_empty() || data.prefix_tags.is_empty() {
            return data.prefix_format.clone();
        }

        let args: Vec<&str> = data
            .prefix_tags
            .iter()
            .map(|name| data.tags.get(name).map(String::as_str).unwrap_or(""))
            .collect();

        render_template(&data.prefix_format, &args)
    }

    pub fn is_empty(&self) -> bool {
        let data = self.data.read();
        data.tags.is_empty() && data.payload.is_empty() && data.prefix_format.is_empty()
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("LogContext")
            .field("tags", &data.tags)
            .field("payload", &data.payload)
            .field("prefix_format", &data.prefix_format)
            .field("prefix_tags", &data.prefix_tags)
            .finish()
    }
}

fn render_template(format: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(format.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('%', Some('%')) => {
                chars.next();
                out.push('%');
            }
            ('%', Some('s' | 'v')) | ('{', Some('}')) => {
                chars.next();
                if let Some(arg) = args.next() {
                    out.push_str(arg);
                }
            }
            _ => out.push(c),
        }
    }

    out
}
