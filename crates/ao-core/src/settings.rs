//! Persisted roster document: the roster plus the two launch paths and the
//! auto-cycle flag.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SettingsError;
use crate::launch::GamePaths;
use crate::roster::Roster;
use crate::types::Account;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default)]
    pub game_folder: String,
    #[serde(default)]
    pub dll_folder: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub auto_cycle: bool,
}

impl SettingsDocument {
    pub fn from_parts(roster: &Roster, paths: &GamePaths, auto_cycle: bool) -> Self {
        Self {
            game_folder: paths.game_folder.clone(),
            dll_folder: paths.dll_folder.clone(),
            accounts: roster.accounts().to_vec(),
            auto_cycle,
        }
    }

    pub fn paths(&self) -> GamePaths {
        GamePaths::new(self.game_folder.clone(), self.dll_folder.clone())
    }

    /// Roster with the deterministic sort and per-account selection rule
    /// re-applied.
    pub fn roster(&self) -> Roster {
        Roster::from_accounts(self.accounts.clone())
    }

    /// Returns the document with its roster normalized in place.
    pub fn normalized(mut self) -> Self {
        self.accounts = Roster::from_accounts(self.accounts).into_accounts();
        self
    }
}

pub fn parse_settings(contents: &str) -> Result<SettingsDocument, serde_json::Error> {
    serde_json::from_str::<SettingsDocument>(contents).map(SettingsDocument::normalized)
}

pub fn render_settings(document: &SettingsDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(document)
}

/// Loads the document; a missing file yields an empty document.
pub fn load_settings(path: impl AsRef<Path>) -> Result<SettingsDocument, SettingsError> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Ok(SettingsDocument::default());
    }
    let body = fs::read_to_string(path_ref).map_err(|source| SettingsError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_settings(&body).map_err(|source| SettingsError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}

pub fn save_settings(
    path: impl AsRef<Path>,
    document: &SettingsDocument,
) -> Result<(), SettingsError> {
    let path_ref = path.as_ref();
    if let Some(parent) = path_ref
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let body = render_settings(document).map_err(|source| SettingsError::Serialize {
        path: path_ref.to_path_buf(),
        source,
    })?;
    fs::write(path_ref, body).map_err(|source| SettingsError::Write {
        path: path_ref.to_path_buf(),
        source,
    })
}
