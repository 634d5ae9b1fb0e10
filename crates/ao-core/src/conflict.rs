//! Window-conflict resolver.
//!
//! Correlates the running game windows with the roster and the current
//! selection. A conflict only exists inside one account: the account has a
//! running character that differs from its selected character.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::error::WindowError;
use crate::roster::Roster;
use crate::types::{LaunchTarget, NameKey};
use crate::window::{RunningSet, WindowControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    NoConflicts,
    ConflictsFound,
    Error,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub account_name: String,
    pub running_character: String,
    pub selected_character: String,
    pub message: String,
}

/// A running game window attributed to a roster account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningWindow {
    pub account_name: String,
    pub character_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub status: ConflictStatus,
    pub message: String,
    pub conflicted_accounts: BTreeSet<String>,
    pub conflicts: Vec<Conflict>,
    pub running_characters: Vec<String>,
    /// Running windows owned by roster accounts, in roster order.
    #[serde(default)]
    pub tracked_windows: Vec<RunningWindow>,
    /// Selected characters whose own window is already up.
    #[serde(default)]
    pub already_running: Vec<RunningWindow>,
    /// Accounts with a running character but no selection.
    #[serde(default)]
    pub idle_running_accounts: BTreeSet<String>,
}

impl ConflictReport {
    pub fn from_window_error(err: &WindowError) -> Self {
        let (status, message) = match err {
            WindowError::Unsupported(message) => (ConflictStatus::Unsupported, message.clone()),
            WindowError::Failed(message) => (
                ConflictStatus::Error,
                format!("Error checking windows: {message}"),
            ),
        };
        Self {
            status,
            message,
            conflicted_accounts: BTreeSet::new(),
            conflicts: Vec::new(),
            running_characters: Vec::new(),
            tracked_windows: Vec::new(),
            already_running: Vec::new(),
            idle_running_accounts: BTreeSet::new(),
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.status == ConflictStatus::ConflictsFound
    }

    pub fn is_usable(&self) -> bool {
        matches!(
            self.status,
            ConflictStatus::NoConflicts | ConflictStatus::ConflictsFound
        )
    }
}

/// Selection restricted to the named accounts, as read from the roster's
/// selection flags.
pub fn selection_for_accounts(roster: &Roster, accounts: &BTreeSet<String>) -> Vec<LaunchTarget> {
    roster
        .selection()
        .into_iter()
        .filter(|target| accounts.contains(&target.account_name))
        .collect()
}

pub fn check_conflicts(
    roster: &Roster,
    selection: &[LaunchTarget],
    running: &RunningSet,
) -> ConflictReport {
    let owners = roster.owner_index();
    info!(
        characters = owners.len(),
        running = running.len(),
        "checking running windows against selection"
    );

    let mut selected: BTreeMap<&str, (NameKey, String)> = BTreeMap::new();
    for target in selection {
        if let Some(name) = selected_name(roster, target) {
            selected.insert(target.account_name.as_str(), (NameKey::new(&name), name));
        }
    }

    let mut tracked = Vec::new();
    for (key, name) in running.iter() {
        match owners.get(key) {
            Some(account) => {
                debug!(character = name, account = %account.name, "running character belongs to roster");
                tracked.push(RunningWindow {
                    account_name: account.name.clone(),
                    character_name: name.to_string(),
                });
            }
            None => {
                debug!(character = name, "running character not in roster; ignored");
            }
        }
    }
    tracked.sort_by(|a, b| {
        account_order(&a.account_name, &b.account_name)
            .then_with(|| NameKey::new(&a.character_name).cmp(&NameKey::new(&b.character_name)))
    });

    let mut conflicts = Vec::new();
    let mut conflicted_accounts = BTreeSet::new();
    let mut already_running = Vec::new();
    let mut idle_running_accounts = BTreeSet::new();

    for window in &tracked {
        match selected.get(window.account_name.as_str()) {
            Some((selected_key, selected_display)) => {
                if *selected_key == NameKey::new(&window.character_name) {
                    already_running.push(window.clone());
                    continue;
                }
                let message = format!(
                    "Character '{}' from account '{}' is already running (selected: '{}')",
                    window.character_name, window.account_name, selected_display
                );
                warn!(account = %window.account_name, "{message}");
                conflicted_accounts.insert(window.account_name.clone());
                conflicts.push(Conflict {
                    account_name: window.account_name.clone(),
                    running_character: window.character_name.clone(),
                    selected_character: selected_display.clone(),
                    message,
                });
            }
            None => {
                idle_running_accounts.insert(window.account_name.clone());
            }
        }
    }

    let (status, message) = if conflicts.is_empty() {
        (
            ConflictStatus::NoConflicts,
            "No conflicts detected - safe to launch".to_string(),
        )
    } else {
        (
            ConflictStatus::ConflictsFound,
            format!(
                "Found conflicts for {} account(s)",
                conflicted_accounts.len()
            ),
        )
    };

    ConflictReport {
        status,
        message,
        conflicted_accounts,
        conflicts,
        running_characters: running.names(),
        tracked_windows: tracked,
        already_running,
        idle_running_accounts,
    }
}

/// Queries the window backend and checks the selection against it. Backend
/// failures become `error`/`unsupported` reports.
pub fn check_running_and_conflicts(
    roster: &Roster,
    selection: &[LaunchTarget],
    windows: &dyn WindowControl,
) -> ConflictReport {
    match RunningSet::query(windows) {
        Ok(running) => check_conflicts(roster, selection, &running),
        Err(err) => {
            warn!(error = %err, "running window query failed");
            ConflictReport::from_window_error(&err)
        }
    }
}

/// Accounts and windows the auto-cycle mode closes before launching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePlan {
    pub accounts: BTreeSet<String>,
    pub windows: Vec<RunningWindow>,
}

impl ClosePlan {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Accounts running a character with no selection, plus accounts whose
/// running character differs from the selected one.
pub fn plan_auto_cycle(report: &ConflictReport) -> ClosePlan {
    let accounts = report
        .idle_running_accounts
        .union(&report.conflicted_accounts)
        .cloned()
        .collect::<BTreeSet<_>>();
    let windows = report
        .tracked_windows
        .iter()
        .filter(|window| accounts.contains(&window.account_name))
        .cloned()
        .collect();
    ClosePlan { accounts, windows }
}

/// Windows from the plan whose character is still running after closure.
pub fn stale_windows(plan: &ClosePlan, running_after: &RunningSet) -> Vec<RunningWindow> {
    plan.windows
        .iter()
        .filter(|window| running_after.contains(&NameKey::new(&window.character_name)))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseAck {
    pub closed: Vec<RunningWindow>,
    pub message: String,
}

/// Requests closure of every running window whose character belongs to one
/// of the named accounts.
pub fn close_running_instances(
    accounts: &BTreeSet<String>,
    roster: &Roster,
    windows: &dyn WindowControl,
) -> Result<CloseAck, WindowError> {
    let running = RunningSet::query(windows)?;
    let owners = roster.owner_index();
    let mut closed = Vec::new();

    for (key, name) in running.iter() {
        let Some(account) = owners.get(key) else {
            continue;
        };
        if !accounts.contains(&account.name) {
            continue;
        }
        let title = windows.character_window_title(name);
        info!(character = name, account = %account.name, "closing game window");
        if windows.close_window(&title)? {
            closed.push(RunningWindow {
                account_name: account.name.clone(),
                character_name: name.to_string(),
            });
        } else {
            warn!(%title, "window disappeared before it could be closed");
        }
    }

    Ok(CloseAck {
        message: format!("Closed {} game instances", closed.len()),
        closed,
    })
}

fn selected_name(roster: &Roster, target: &LaunchTarget) -> Option<String> {
    if !target.character_name.trim().is_empty() {
        return Some(target.character_name.clone());
    }
    roster
        .find_account(&target.account_name)?
        .characters
        .iter()
        .find(|character| character.id == target.character_id)
        .map(|character| character.name.clone())
}

fn account_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
