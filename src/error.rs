use thiserror::Error;

/// Crate-wide error type, covering every failure kind named in the design:
/// invalid input, cooperative cancellation, the byte-cap violation, I/O,
/// settings, and pattern compilation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cooperative cancellation, triggered by a newer request or an
    /// explicit stop. Never surfaced as a `contextGenerated` event.
    #[error("cancelled")]
    Cancelled,

    /// The byte cap was exceeded. `phase` names where in the assembly
    /// pipeline the check fired; `file` names the offending file, if any.
    #[error("context is too long: limit exceeded {phase}{}", file.as_deref().map(|f| format!(" (file: {f})")).unwrap_or_default())]
    ContextTooLong { phase: String, file: Option<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("pattern compilation error: {0}")]
    PatternCompile(String),
}

pub type Result<T> = std::result::Result<T, Error>;
