pub mod gob;
pub mod shell;

use crate::OutputFormat;

/// Per-invocation options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    /// Recorded as the uploader address of new gobs.
    pub ip: String,
    /// Whether `put`/`append` without text arguments read stdin.
    pub read_stdin: bool,
}
