use std::path::PathBuf;

use crate::conflict::Conflict;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("account index {index} is out of range ({len} accounts)")]
    AccountOutOfRange { index: usize, len: usize },
    #[error("character index {index} is out of range for account '{account}' ({len} characters)")]
    CharacterOutOfRange {
        account: String,
        index: usize,
        len: usize,
    },
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },
    #[error("character id must be greater than zero")]
    InvalidCharacterId,
    #[error("account '{account}' already has a character with id {id}")]
    DuplicateCharacterId { account: String, id: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a window-control backend.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("{0}")]
    Unsupported(String),
    #[error("window operation failed: {0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    Platform(String),
    #[error("could not close running instance(s) for account(s): {}", .accounts.join(", "))]
    CloseFailed {
        accounts: Vec<String>,
        still_running: Vec<String>,
    },
    #[error("nothing left to launch: every selected character was skipped")]
    NothingToLaunch { conflicts: Vec<Conflict> },
}

impl From<WindowError> for LaunchError {
    fn from(err: WindowError) -> Self {
        match err {
            WindowError::Unsupported(message) => LaunchError::Unsupported(message),
            WindowError::Failed(message) => {
                LaunchError::Platform(format!("error checking windows: {message}"))
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CopyError {
    #[error("{0}")]
    Validation(String),
    #[error("cannot copy preferences onto the source character {account}/{character_id}")]
    SelfCopy { account: String, character_id: u32 },
    #[error("unknown preference item: {0}")]
    UnknownItem(String),
    #[error("account name cannot be used as a preferences folder: {0:?}")]
    InvalidAccount(String),
    #[error("source preferences folder not found: {path}")]
    SourceMissing { path: PathBuf },
}
