//! Errors raised while reading, editing and resolving configuration.

use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// What was being done to a layer file when I/O failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "cannot read",
            Self::Write => "cannot write",
        })
    }
}

/// Why a server entry cannot be launched as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDefect {
    EmptyName,
    EmptyCommand,
    /// An `env` key that is empty or contains `=`.
    BadEnvKey(String),
    Disabled,
}

impl fmt::Display for EntryDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => f.write_str("name is empty"),
            Self::EmptyCommand => f.write_str("command is empty"),
            Self::BadEnvKey(key) => write!(f, "env key {key:?} is not a variable name"),
            Self::Disabled => f.write_str("server is disabled"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{op} {}: {source}", path.display())]
    File {
        op: FileOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or a value of the wrong shape.
    #[error("config is not valid: {0}")]
    Schema(#[from] toml::de::Error),

    #[error("config could not be encoded: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("server '{name}': {defect}")]
    BadEntry { name: String, defect: EntryDefect },

    /// Neither configured in any layer nor built in.
    #[error("server '{0}' not found")]
    UnknownServer(String),
}

impl ConfigError {
    pub(crate) fn file(op: FileOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn bad_entry(name: &str, defect: EntryDefect) -> Self {
        Self::BadEntry {
            name: name.to_string(),
            defect,
        }
    }
}
