//! Shared error type used across the assembler, VM translator and Jack compiler.
//!
//! Mirrors the `filename:line:` prefixing convention of the original
//! toolchain: syntax and semantic errors carry the file and line they
//! were raised at, range errors carry just the offending quantity.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum N2tError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Syntax {
        file: String,
        line: u32,
        message: String,
    },

    #[error("{file}:{line}: {message}")]
    Semantic {
        file: String,
        line: u32,
        message: String,
    },

    #[error("{message}")]
    Range { message: String },
}

impl N2tError {
    pub fn syntax(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        N2tError::Syntax {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn semantic(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        N2tError::Semantic {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn range(message: impl Into<String>) -> Self {
        N2tError::Range {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, N2tError>;
