//! Error taxonomy for the codec, reader/writer, query parser and cache backends.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EixError>;

/// The six fatal-error categories of the core: I/O failure, framing
/// corruption, an obsolete on-disk format, a malformed query expression,
/// a cache backend that could not recover, and a missing input file.
#[derive(Debug, Error)]
pub enum EixError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("obsolete format: database version {found}, current is {expected}")]
    ObsoleteFormat { found: u32, expected: u32 },

    #[error("bad expression at position {position}: {reason}")]
    BadExpression { position: usize, reason: String },

    #[error("cache backend '{backend}' failed: {message}")]
    BackendError { backend: &'static str, message: String },

    #[error("can't open '{path}' for reading: {reason}")]
    MissingFile { path: String, reason: String },
}

impl EixError {
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        EixError::CorruptIndex(msg.into())
    }

    pub fn bad_expression<S: Into<String>>(position: usize, reason: S) -> Self {
        EixError::BadExpression {
            position,
            reason: reason.into(),
        }
    }

    pub fn backend<S: Into<String>>(backend: &'static str, message: S) -> Self {
        EixError::BackendError {
            backend,
            message: message.into(),
        }
    }

    pub fn missing_file<S: Into<String>>(path: S, reason: S) -> Self {
        EixError::MissingFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The process exit code the CLI should use for this error, per the
    /// exit-code table of the external-interfaces section (always 1 for
    /// any fatal error at this layer; 0 is reserved for success).
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let e: EixError = io_err.into();
        assert!(matches!(e, EixError::Io(_)));
    }

    #[test]
    fn exit_codes_are_one() {
        assert_eq!(EixError::corrupt("x").exit_code(), 1);
        assert_eq!(
            EixError::ObsoleteFormat {
                found: 1,
                expected: 2
            }
            .exit_code(),
            1
        );
    }
}
