use ao_core::conflict::CloseAck;
use ao_core::prefs::{CopyStatus, PreferenceItem};
use ao_core::roster::RosterChange;
use ao_core::settings::SettingsDocument;
use ao_core::types::{CharacterRef, LaunchTarget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    #[serde(flatten)]
    pub document: SettingsDocument,
    pub selected_count: usize,
    /// What the edit that produced this view changed; absent on plain reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<RosterChange>,
}

impl RosterView {
    pub fn changed(document: SettingsDocument, change: RosterChange) -> Self {
        Self {
            change: Some(change),
            ..Self::from(document)
        }
    }
}

impl From<SettingsDocument> for RosterView {
    fn from(document: SettingsDocument) -> Self {
        let selected_count = document
            .accounts
            .iter()
            .flat_map(|account| account.characters.iter())
            .filter(|character| character.selected)
            .count();
        Self {
            document,
            selected_count,
            change: None,
        }
    }
}

/// Partial update of the launch paths and the auto-cycle flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub game_folder: Option<String>,
    #[serde(default)]
    pub dll_folder: Option<String>,
    #[serde(default)]
    pub auto_cycle: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccountRequest {
    pub account_name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCharacterRequest {
    pub character_id: u32,
    pub character_name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub account_name: String,
    pub character_id: u32,
    #[serde(default)]
    pub exclusive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    #[serde(default)]
    pub accounts: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResponse {
    pub status: String,
    #[serde(flatten)]
    pub ack: CloseAck,
}

/// Launch request. Omitted fields fall back to the stored paths, the
/// stored auto-cycle flag and the roster's current selection.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    #[serde(default)]
    pub game_folder: Option<String>,
    #[serde(default)]
    pub dll_folder: Option<String>,
    #[serde(default)]
    pub characters: Option<Vec<LaunchTarget>>,
    #[serde(default)]
    pub auto_cycle: Option<bool>,
}

impl std::fmt::Debug for LaunchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchRequest")
            .field("game_folder", &self.game_folder)
            .field("dll_folder", &self.dll_folder)
            .field(
                "characters",
                &self.characters.as_ref().map(|characters| characters.len()),
            )
            .field("auto_cycle", &self.auto_cycle)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusResponse {
    pub status: String,
    pub focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceItemsResponse {
    pub prefs_root: Option<PathBuf>,
    pub items: Vec<PreferenceItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyPreferencesRequest {
    /// Overrides the configured preferences root.
    #[serde(default)]
    pub prefs_root: Option<PathBuf>,
    pub source: CharacterRef,
    pub targets: Vec<CharacterRef>,
    pub items: Vec<String>,
    #[serde(default)]
    pub make_backup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterEventKind {
    RosterChanged { accounts: usize },
    SelectionChanged { selected: usize },
    SettingsChanged,
    LaunchFinished { launched: usize, failed: usize },
    PreferencesCopied { targets: usize, status: CopyStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEvent {
    pub at: DateTime<Utc>,
    pub kind: RosterEventKind,
}

pub fn roster_event_name(kind: &RosterEventKind) -> &'static str {
    match kind {
        RosterEventKind::RosterChanged { .. } => "roster_changed",
        RosterEventKind::SelectionChanged { .. } => "selection_changed",
        RosterEventKind::SettingsChanged => "settings_changed",
        RosterEventKind::LaunchFinished { .. } => "launch_finished",
        RosterEventKind::PreferencesCopied { .. } => "preferences_copied",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_core::types::{Account, Character};

    #[test]
    fn roster_view_flattens_document_and_counts_selection() {
        let mut selected = Character::new(2, "Bob");
        selected.selected = true;
        let document = SettingsDocument {
            game_folder: "C:/AO".to_string(),
            accounts: vec![Account::new("Main", "pw")
                .with_character(selected)
                .with_character(Character::new(3, "Eve"))],
            ..SettingsDocument::default()
        };

        let value = serde_json::to_value(RosterView::from(document.clone())).expect("serialize");
        assert_eq!(value["selectedCount"], 1);
        assert!(value.get("change").is_none());
        assert_eq!(value["gameFolder"], "C:/AO");
        assert_eq!(value["accounts"][0]["accountName"], "Main");

        let value = serde_json::to_value(RosterView::changed(document, RosterChange::Unchanged))
            .expect("serialize");
        assert_eq!(value["change"], "unchanged");
    }

    #[test]
    fn launch_request_accepts_partial_bodies_and_hides_passwords() {
        let request: LaunchRequest = serde_json::from_str(
            r#"{"characters": [{"accountName": "Main", "password": "hunter2", "characterId": 2}]}"#,
        )
        .expect("parse launch request");
        assert!(request.game_folder.is_none());
        assert_eq!(request.characters.as_ref().map(Vec::len), Some(1));
        assert!(!format!("{request:?}").contains("hunter2"));
    }

    #[test]
    fn event_names_match_kinds() {
        assert_eq!(
            roster_event_name(&RosterEventKind::SelectionChanged { selected: 1 }),
            "selection_changed"
        );
        assert_eq!(
            roster_event_name(&RosterEventKind::PreferencesCopied {
                targets: 2,
                status: CopyStatus::PartialSuccess
            }),
            "preferences_copied"
        );
    }
}
