//! Error types for nginx configuration parsing.
//!
//! All parse failures are fatal: the parser never returns a partial tree.
//! Errors that can be tied to a location carry the source file name and the
//! 1-based line number at which the parser stopped.

use std::io;
use thiserror::Error;

/// Errors produced while parsing an nginx configuration.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A byte that is not valid at the current point of the grammar, such
    /// as `{` before any directive name or `}` in argument position.
    #[error("unexpected '{character}' in file {file} line {line}")]
    UnexpectedCharacter {
        character: char,
        file: String,
        line: usize,
    },

    /// Non-whitespace input left over after the root block closed.
    #[error("unexpected end in file {file} line {line}")]
    TrailingInput { file: String, line: usize },

    /// End of input inside a quoted string, inside an opaque lua block, or
    /// right after an escape or lookahead that still needed bytes.
    #[error("unexpected end of file in {file} line {line}")]
    UnexpectedEof { file: String, line: usize },

    /// An `include` directive used a relative pattern but no root directory
    /// was configured.
    #[error("not found `root` dir in options")]
    MissingRoot,

    /// An error reported by the reader or by the open/glob capabilities.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ParseError {
    /// Returns the source line the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedCharacter { line, .. }
            | ParseError::TrailingInput { line, .. }
            | ParseError::UnexpectedEof { line, .. } => Some(*line),
            ParseError::MissingRoot | ParseError::Io(_) => None,
        }
    }

    /// Returns the source file the error points at, when it has one.
    pub fn file(&self) -> Option<&str> {
        match self {
            ParseError::UnexpectedCharacter { file, .. }
            | ParseError::TrailingInput { file, .. }
            | ParseError::UnexpectedEof { file, .. } => Some(file),
            ParseError::MissingRoot | ParseError::Io(_) => None,
        }
    }
}
