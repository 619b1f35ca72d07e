//! Error types for the ts-explicit crate.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type for the ts-explicit crate.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parser related errors.
    #[error("Parser error: {0}")]
    Parser(String),

    /// The checker could not produce a type for a node.
    #[error("Type error: {0}")]
    Type(String),

    /// tsconfig discovery or loading errors.
    #[error("{0}")]
    Config(String),

    /// Invalid argument errors.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Malformed glob pattern.
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),
}

impl Error {
    /// Creates a new parser error.
    pub fn parser_error(msg: impl Into<String>) -> Self {
        Self::Parser(msg.into())
    }

    /// Creates a new type error.
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Creates a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new argument error.
    pub fn argument_error(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_shown_verbatim() {
        let err = Error::config_error("Specified tsconfig file not found: /tmp/x.json");
        assert_eq!(err.to_string(), "Specified tsconfig file not found: /tmp/x.json");
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
