use ao_core::config::AppConfig;
use ao_core::conflict::{check_running_and_conflicts, close_running_instances, CloseAck, ConflictReport};
use ao_core::launch::{GamePaths, LaunchOrchestrator, LaunchOutcome, Launcher};
use ao_core::prefs::{copy_preferences, default_catalog, CopyReport, CopyRequest, LocalFs};
use ao_core::roster::{Roster, RosterChange};
use ao_core::script::render_launch_script;
use ao_core::selection::{clear_all, toggle, ToggleMode};
use ao_core::settings::{save_settings, SettingsDocument};
use ao_core::validation::{Validate, ValidationLevel};
use ao_core::window::WindowControl;
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::error::WebError;
use crate::model::{
    CopyPreferencesRequest, LaunchRequest, NewAccountRequest, NewCharacterRequest, RosterEvent,
    RosterEventKind, SettingsUpdate, ToggleRequest,
};

/// Settings document after an edit, with what the edit changed.
pub type Edited = (SettingsDocument, RosterChange);

#[derive(Debug, Clone)]
struct AppData {
    roster: Roster,
    paths: GamePaths,
    auto_cycle: bool,
}

impl AppData {
    fn from_document(document: &SettingsDocument) -> Self {
        Self {
            roster: document.roster(),
            paths: document.paths(),
            auto_cycle: document.auto_cycle,
        }
    }

    fn document(&self) -> SettingsDocument {
        SettingsDocument::from_parts(&self.roster, &self.paths, self.auto_cycle)
    }

    fn account_index(&self, name: &str) -> Result<usize, WebError> {
        self.roster
            .accounts()
            .iter()
            .position(|account| account.name == name)
            .ok_or_else(|| WebError::NotFound(format!("account:{name}")))
    }

    fn character_index(&self, account: usize, character_id: u32) -> Result<usize, WebError> {
        let account = self.roster.account(account)?;
        account
            .characters
            .iter()
            .position(|character| character.id == character_id)
            .ok_or_else(|| {
                WebError::NotFound(format!("character:{}/{character_id}", account.name))
            })
    }
}

/// Shared application state. Every operation holds the one data lock from
/// start to finish, so requests run strictly one after another.
#[derive(Clone)]
pub struct WebState {
    data: Arc<Mutex<AppData>>,
    config: Arc<AppConfig>,
    settings_path: Option<Arc<PathBuf>>,
    windows: Arc<dyn WindowControl>,
    launcher: Arc<dyn Launcher>,
    events_tx: broadcast::Sender<RosterEvent>,
}

impl WebState {
    pub fn new(
        config: AppConfig,
        document: SettingsDocument,
        windows: Arc<dyn WindowControl>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            data: Arc::new(Mutex::new(AppData::from_document(&document))),
            config: Arc::new(config),
            settings_path: None,
            windows,
            launcher,
            events_tx,
        }
    }

    /// Persists the settings document to `path` after every mutation.
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(Arc::new(path.into()));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.events_tx.subscribe()
    }

    pub async fn document(&self) -> SettingsDocument {
        self.data.lock().await.document()
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<SettingsDocument, WebError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        if let Some(game_folder) = update.game_folder {
            next.paths.game_folder = game_folder.trim().to_string();
        }
        if let Some(dll_folder) = update.dll_folder {
            next.paths.dll_folder = dll_folder.trim().to_string();
        }
        if let Some(auto_cycle) = update.auto_cycle {
            next.auto_cycle = auto_cycle;
        }
        self.commit(&mut data, next)?;
        let document = data.document();
        drop(data);
        self.emit(RosterEventKind::SettingsChanged);
        Ok(document)
    }

    /// Replaces the whole roster, paths and flag with an imported document.
    pub async fn replace_document(
        &self,
        document: SettingsDocument,
    ) -> Result<SettingsDocument, WebError> {
        let document = document.normalized();
        let errors = document
            .validate()
            .into_iter()
            .filter(|issue| issue.level == ValidationLevel::Error)
            .map(|issue| issue.message)
            .collect::<Vec<_>>();
        if !errors.is_empty() {
            return Err(WebError::BadRequest(format!(
                "invalid settings document: {}",
                errors.join("; ")
            )));
        }

        let mut data = self.data.lock().await;
        self.commit(&mut data, AppData::from_document(&document))?;
        let accounts = data.roster.len();
        let document = data.document();
        drop(data);
        info!(accounts, "settings imported");
        self.emit(RosterEventKind::RosterChanged { accounts });
        Ok(document)
    }

    pub async fn add_account(&self, request: NewAccountRequest) -> Result<Edited, WebError> {
        let data = self.data.lock().await;
        let name = request.account_name.trim();
        if data.roster.find_account(name).is_some() {
            return Err(WebError::BadRequest(format!(
                "account '{name}' already exists"
            )));
        }
        let mut next = data.clone();
        let (_, change) = next.roster.add_account(name, &request.password)?;
        self.commit_roster(data, next, change)
    }

    pub async fn remove_account(&self, account_name: &str) -> Result<Edited, WebError> {
        let data = self.data.lock().await;
        let index = data.account_index(account_name)?;
        let mut next = data.clone();
        let (_, change) = next.roster.remove_account(index)?;
        self.commit_roster(data, next, change)
    }

    pub async fn add_character(
        &self,
        account_name: &str,
        request: NewCharacterRequest,
    ) -> Result<Edited, WebError> {
        let data = self.data.lock().await;
        let index = data.account_index(account_name)?;
        let mut next = data.clone();
        let change = next.roster.add_character(
            index,
            request.character_id,
            &request.character_name,
            request.comment.as_deref(),
        )?;
        self.commit_roster(data, next, change)
    }

    pub async fn remove_character(
        &self,
        account_name: &str,
        character_id: u32,
    ) -> Result<Edited, WebError> {
        let data = self.data.lock().await;
        let account = data.account_index(account_name)?;
        let character = data.character_index(account, character_id)?;
        let mut next = data.clone();
        let (_, change) = next.roster.remove_character(account, character)?;
        self.commit_roster(data, next, change)
    }

    pub async fn toggle_selection(&self, request: ToggleRequest) -> Result<Edited, WebError> {
        let mut data = self.data.lock().await;
        let account = data.account_index(&request.account_name)?;
        let character = data.character_index(account, request.character_id)?;
        let mut next = data.clone();
        let change = toggle(
            &mut next.roster,
            account,
            character,
            ToggleMode::from_exclusive(request.exclusive),
        )?;
        if !change.is_changed() {
            return Ok((data.document(), change));
        }
        self.commit(&mut data, next)?;
        let selected = data.roster.selected_count();
        let document = data.document();
        drop(data);
        self.emit(RosterEventKind::SelectionChanged { selected });
        Ok((document, change))
    }

    pub async fn clear_selection(&self) -> Result<Edited, WebError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let change = clear_all(&mut next.roster);
        if !change.is_changed() {
            return Ok((data.document(), change));
        }
        self.commit(&mut data, next)?;
        let document = data.document();
        drop(data);
        self.emit(RosterEventKind::SelectionChanged { selected: 0 });
        Ok((document, change))
    }

    pub async fn check_conflicts(&self) -> Result<ConflictReport, WebError> {
        let data = self.data.clone().lock_owned().await;
        let windows = self.windows.clone();
        tokio::task::spawn_blocking(move || {
            let selection = data.roster.selection();
            check_running_and_conflicts(&data.roster, &selection, windows.as_ref())
        })
        .await
        .map_err(join_error)
    }

    pub async fn close_running_instances(
        &self,
        accounts: BTreeSet<String>,
    ) -> Result<CloseAck, WebError> {
        if accounts.is_empty() {
            return Err(WebError::BadRequest("No accounts to close.".to_string()));
        }
        let data = self.data.clone().lock_owned().await;
        let windows = self.windows.clone();
        let ack = tokio::task::spawn_blocking(move || {
            close_running_instances(&accounts, &data.roster, windows.as_ref())
        })
        .await
        .map_err(join_error)??;
        Ok(ack)
    }

    pub async fn launch(&self, request: LaunchRequest) -> Result<LaunchOutcome, WebError> {
        let data = self.data.clone().lock_owned().await;
        let paths = GamePaths::new(
            request
                .game_folder
                .unwrap_or_else(|| data.paths.game_folder.clone()),
            request
                .dll_folder
                .unwrap_or_else(|| data.paths.dll_folder.clone()),
        );
        let auto_cycle = request.auto_cycle.unwrap_or(data.auto_cycle);
        let characters = request.characters;
        let windows = self.windows.clone();
        let launcher = self.launcher.clone();
        let config = self.config.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let orchestrator =
                LaunchOrchestrator::new(windows.as_ref(), launcher.as_ref(), &config.launch);
            match characters {
                Some(selection) => orchestrator.launch(&data.roster, &paths, &selection, auto_cycle),
                None => orchestrator.launch_selected(&data.roster, &paths, auto_cycle),
            }
        })
        .await
        .map_err(join_error)??;

        self.emit(RosterEventKind::LaunchFinished {
            launched: outcome.launched.len(),
            failed: outcome.errors.len(),
        });
        Ok(outcome)
    }

    pub async fn focus_launcher_window(&self) -> Result<bool, WebError> {
        let guard = self.data.clone().lock_owned().await;
        let windows = self.windows.clone();
        let launcher = self.launcher.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            LaunchOrchestrator::new(windows.as_ref(), launcher.as_ref(), &config.launch)
                .focus_launcher_window()
        })
        .await
        .map_err(join_error)
    }

    pub async fn copy_preferences(
        &self,
        request: CopyPreferencesRequest,
    ) -> Result<CopyReport, WebError> {
        let prefs_root = request
            .prefs_root
            .or_else(|| self.config.paths.prefs_root.clone())
            .ok_or_else(|| {
                WebError::BadRequest("Preferences folder is not configured.".to_string())
            })?;
        let copy = CopyRequest {
            prefs_root,
            source: request.source,
            targets: request.targets,
            items: request.items,
            make_backup: request.make_backup,
        };
        let targets = copy.targets.len();

        let guard = self.data.clone().lock_owned().await;
        let report = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            copy_preferences(&copy, &default_catalog(), &LocalFs::new())
        })
        .await
        .map_err(join_error)??;

        self.emit(RosterEventKind::PreferencesCopied {
            targets,
            status: report.status,
        });
        Ok(report)
    }

    pub async fn launch_script(&self) -> Result<String, WebError> {
        let data = self.data.lock().await;
        Ok(render_launch_script(
            &data.paths,
            &self.config.launch,
            &data.roster.selection(),
        )?)
    }

    fn commit_roster(
        &self,
        mut data: tokio::sync::MutexGuard<'_, AppData>,
        next: AppData,
        change: RosterChange,
    ) -> Result<Edited, WebError> {
        self.commit(&mut data, next)?;
        let accounts = data.roster.len();
        let document = data.document();
        drop(data);
        self.emit(RosterEventKind::RosterChanged { accounts });
        Ok((document, change))
    }

    /// Writes `next` to the settings file; it only becomes live once the
    /// write succeeded.
    fn commit(&self, data: &mut AppData, next: AppData) -> Result<(), WebError> {
        if let Some(path) = &self.settings_path {
            save_settings(path.as_path(), &next.document())?;
        }
        *data = next;
        Ok(())
    }

    fn emit(&self, kind: RosterEventKind) {
        let _ = self.events_tx.send(RosterEvent {
            at: Utc::now(),
            kind,
        });
    }
}

fn join_error(err: tokio::task::JoinError) -> WebError {
    WebError::Internal(format!("background task failed: {err}"))
}
