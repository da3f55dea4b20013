use thiserror::Error;

/// Errors produced while parsing patterns, building trees and expanding URIs.
#[derive(Debug, Error)]
pub enum RouterError {
    /// E2001: Input that cannot be turned into a path.
    #[error("E2001: invalid path: {0}")]
    InvalidPath(String),

    /// E2002: Malformed pattern (unbalanced braces, unknown modifier).
    #[error("E2002: syntax error in pattern '{pattern}': {reason}")]
    Syntax { pattern: String, reason: String },

    /// E2003: A tree position already binds a different parameter name.
    #[error("E2003: parameter name conflict: node binds '{existing}', pattern requests '{requested}'")]
    NameConflict { existing: String, requested: String },

    /// E2004: Required template parameter without a value during expansion.
    #[error("E2004: parameter '{0}' not defined")]
    MissingParameter(String),

    /// E2005: Operation intentionally unsupported.
    #[error("E2005: not implemented: {0}")]
    NotImplemented(&'static str),

    /// E2010: Route spec document could not be read.
    #[error("E2010: spec parse error: {0}")]
    SpecParse(String),

    /// I/O error reading a spec file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    pub(crate) fn syntax(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Syntax {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
