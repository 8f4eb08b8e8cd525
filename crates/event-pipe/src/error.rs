//! Error types for event pipes

use thiserror::Error;

/// Event pipe error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A registration named an event the pipe can never emit or accept
    #[error("event `{name}` is not declared by pipe `{pipe}`")]
    Undeclared {
        /// The offending event name or pattern
        name: String,
        /// Label of the pipe that rejected it
        pipe: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
