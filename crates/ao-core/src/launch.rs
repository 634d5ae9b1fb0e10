//! Launch orchestrator.
//!
//! Resolves window conflicts for the selection, optionally auto-cycles
//! stale windows, then submits one launcher invocation per remaining
//! character and itemizes every outcome by character name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::LaunchSettings;
use crate::conflict::{
    check_conflicts, close_running_instances, plan_auto_cycle, stale_windows, Conflict,
    ConflictReport, RunningWindow,
};
use crate::error::LaunchError;
use crate::roster::Roster;
use crate::types::LaunchTarget;
use crate::window::{RunningSet, WindowControl};

/// Argument position of the password in a launch command.
const PASSWORD_ARG: usize = 2;

/// Game install location and launcher location, as configured by the
/// operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePaths {
    pub game_folder: String,
    pub dll_folder: String,
}

impl GamePaths {
    pub fn new(game_folder: impl Into<String>, dll_folder: impl Into<String>) -> Self {
        Self {
            game_folder: game_folder.into(),
            dll_folder: dll_folder.into(),
        }
    }

    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.game_folder.trim().is_empty() {
            return Err(LaunchError::Validation(
                "Missing required data: game folder is not set.".to_string(),
            ));
        }
        if self.dll_folder.trim().is_empty() {
            return Err(LaunchError::Validation(
                "Missing required data: launcher folder is not set.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn launcher_path(&self, settings: &LaunchSettings) -> PathBuf {
        Path::new(self.dll_folder.trim()).join(&settings.launcher_dll)
    }
}

/// One fully resolved launcher invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl LaunchCommand {
    /// Command line with the password masked, safe for logs.
    pub fn redacted(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (index, arg) in self.args.iter().enumerate() {
            if index == PASSWORD_ARG {
                parts.push("***".to_string());
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

impl std::fmt::Debug for LaunchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchCommand")
            .field("command", &self.redacted())
            .field("working_dir", &self.working_dir)
            .field("env", &self.env)
            .finish()
    }
}

pub fn build_launch_command(
    paths: &GamePaths,
    settings: &LaunchSettings,
    target: &LaunchTarget,
) -> LaunchCommand {
    LaunchCommand {
        program: settings.runtime.clone(),
        args: vec![
            paths.launcher_path(settings).to_string_lossy().to_string(),
            target.account_name.clone(),
            target.password.clone(),
            target.character_id.to_string(),
        ],
        working_dir: PathBuf::from(paths.dll_folder.trim()),
        env: vec![(
            settings.game_path_env.clone(),
            paths.game_folder.trim().to_string(),
        )],
    }
}

/// Launch primitive: starts one game session per call.
pub trait Launcher: Send + Sync {
    /// Checks the configured locations before anything is started.
    fn preflight(&self, _paths: &GamePaths, _settings: &LaunchSettings) -> Result<(), String> {
        Ok(())
    }

    /// Starts the command and returns the process id on success.
    fn spawn(&self, command: &LaunchCommand) -> Result<u32, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    Success,
    PartialSuccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcomeKind {
    Success,
    Partial,
    TotalFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedCharacter {
    pub account_name: String,
    pub character_name: String,
    pub character_id: u32,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedLaunch {
    pub account_name: String,
    pub character_name: String,
    pub character_id: u32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
    pub status: LaunchStatus,
    pub message: String,
    pub launched: Vec<LaunchedCharacter>,
    pub errors: Vec<FailedLaunch>,
    /// Characters dropped because their account had a conflict.
    pub skipped: Vec<Conflict>,
    pub already_running: Vec<RunningWindow>,
    pub closed: Vec<RunningWindow>,
    pub launcher_focused: bool,
}

impl LaunchOutcome {
    pub fn kind(&self) -> LaunchOutcomeKind {
        match (self.launched.is_empty(), self.errors.is_empty()) {
            (_, true) => LaunchOutcomeKind::Success,
            (false, false) => LaunchOutcomeKind::Partial,
            (true, false) => LaunchOutcomeKind::TotalFailure,
        }
    }

    pub fn launched_names(&self) -> Vec<String> {
        self.launched
            .iter()
            .map(|entry| entry.character_name.clone())
            .collect()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|entry| entry.character_name.clone())
            .collect()
    }
}

pub struct LaunchOrchestrator<'a> {
    windows: &'a dyn WindowControl,
    launcher: &'a dyn Launcher,
    settings: &'a LaunchSettings,
}

impl<'a> LaunchOrchestrator<'a> {
    pub fn new(
        windows: &'a dyn WindowControl,
        launcher: &'a dyn Launcher,
        settings: &'a LaunchSettings,
    ) -> Self {
        Self {
            windows,
            launcher,
            settings,
        }
    }

    /// Launches the roster's current selection.
    pub fn launch_selected(
        &self,
        roster: &Roster,
        paths: &GamePaths,
        auto_cycle: bool,
    ) -> Result<LaunchOutcome, LaunchError> {
        self.launch(roster, paths, &roster.selection(), auto_cycle)
    }

    pub fn launch(
        &self,
        roster: &Roster,
        paths: &GamePaths,
        selection: &[LaunchTarget],
        auto_cycle: bool,
    ) -> Result<LaunchOutcome, LaunchError> {
        if selection.is_empty() {
            return Err(LaunchError::Validation(
                "No characters selected for launch.".to_string(),
            ));
        }
        paths.validate()?;
        self.launcher
            .preflight(paths, self.settings)
            .map_err(LaunchError::Validation)?;

        info!(
            characters = selection.len(),
            auto_cycle, "launch requested"
        );

        let running = RunningSet::query(self.windows)?;
        let mut report = check_conflicts(roster, selection, &running);
        let mut closed = Vec::new();

        if auto_cycle {
            let plan = plan_auto_cycle(&report);
            if !plan.is_empty() {
                info!(accounts = ?plan.accounts, "auto-cycle closing running instances");
                let ack = close_running_instances(&plan.accounts, roster, self.windows)?;
                closed = ack.closed;
                let delay = self.settings.settle_delay();
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }

                let running_after = RunningSet::query(self.windows)?;
                let stale = stale_windows(&plan, &running_after);
                if !stale.is_empty() {
                    let accounts = stale
                        .iter()
                        .map(|window| window.account_name.clone())
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect::<Vec<_>>();
                    warn!(?accounts, "running instances survived auto-cycle close");
                    return Err(LaunchError::CloseFailed {
                        accounts,
                        still_running: stale
                            .into_iter()
                            .map(|window| window.character_name)
                            .collect(),
                    });
                }
                report = check_conflicts(roster, selection, &running_after);
            }
        }

        let (to_launch, skipped, already_running) = partition_selection(selection, &report);
        for conflict in &skipped {
            warn!(account = %conflict.account_name, "skipping launch: {}", conflict.message);
        }
        for window in &already_running {
            let title = self.windows.character_window_title(&window.character_name);
            if let Err(err) = self.windows.focus_window(&title) {
                warn!(%title, error = %err, "could not focus running character window");
            }
        }

        if to_launch.is_empty() {
            if !skipped.is_empty() {
                return Err(LaunchError::NothingToLaunch { conflicts: skipped });
            }
            return Ok(LaunchOutcome {
                status: LaunchStatus::Success,
                message: "All selected characters are already running.".to_string(),
                launched: Vec::new(),
                errors: Vec::new(),
                skipped,
                already_running,
                closed,
                launcher_focused: false,
            });
        }

        let mut launched = Vec::new();
        let mut errors = Vec::new();
        for target in to_launch {
            match self.launch_one(paths, target) {
                Ok(pid) => {
                    info!(account = %target.account_name, character = %target.display_name(), pid, "launched character");
                    launched.push(LaunchedCharacter {
                        account_name: target.account_name.clone(),
                        character_name: target.display_name(),
                        character_id: target.character_id,
                        pid,
                    });
                }
                Err(error) => {
                    warn!(account = %target.account_name, character = %target.display_name(), %error, "launch failed");
                    errors.push(FailedLaunch {
                        account_name: target.account_name.clone(),
                        character_name: target.display_name(),
                        character_id: target.character_id,
                        error,
                    });
                }
            }
        }

        let launcher_focused = !launched.is_empty() && self.focus_launcher_window();

        let (status, message) = if errors.is_empty() {
            info!(count = launched.len(), "all characters launched");
            (
                LaunchStatus::Success,
                "All selected characters launched successfully!".to_string(),
            )
        } else if launched.is_empty() {
            (
                LaunchStatus::PartialSuccess,
                "No characters could be launched.".to_string(),
            )
        } else {
            warn!(
                launched = launched.len(),
                failed = errors.len(),
                "partial launch"
            );
            (
                LaunchStatus::PartialSuccess,
                "Some launches failed.".to_string(),
            )
        };

        Ok(LaunchOutcome {
            status,
            message,
            launched,
            errors,
            skipped,
            already_running,
            closed,
            launcher_focused,
        })
    }

    /// Best-effort focus of the launcher's own window. Failures are logged
    /// and reported as `false`, never as errors.
    pub fn focus_launcher_window(&self) -> bool {
        let title = &self.settings.launcher_window_title;
        match self.windows.focus_window(title) {
            Ok(true) => {
                info!(%title, "focused launcher window");
                true
            }
            Ok(false) => {
                info!(%title, "launcher window not found");
                false
            }
            Err(err) => {
                warn!(%title, error = %err, "could not focus launcher window");
                false
            }
        }
    }

    fn launch_one(&self, paths: &GamePaths, target: &LaunchTarget) -> Result<u32, String> {
        if target.account_name.trim().is_empty()
            || target.password.is_empty()
            || target.character_id == 0
        {
            return Err(format!(
                "Incomplete character data for launch: {}",
                target.display_name()
            ));
        }
        let command = build_launch_command(paths, self.settings, target);
        info!(command = %command.redacted(), cwd = %command.working_dir.display(), "executing launcher");
        self.launcher.spawn(&command).map_err(|error| {
            format!(
                "Failed to launch {}/{}: {error}",
                target.account_name, target.character_id
            )
        })
    }
}

fn partition_selection<'s>(
    selection: &'s [LaunchTarget],
    report: &ConflictReport,
) -> (Vec<&'s LaunchTarget>, Vec<Conflict>, Vec<RunningWindow>) {
    let mut to_launch = Vec::new();
    let mut already_running = Vec::new();

    for target in selection {
        if report.conflicted_accounts.contains(&target.account_name) {
            continue;
        }
        if let Some(window) = report
            .already_running
            .iter()
            .find(|window| window.account_name == target.account_name)
        {
            already_running.push(window.clone());
            continue;
        }
        to_launch.push(target);
    }

    (to_launch, report.conflicts.clone(), already_running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WindowError;
    use crate::types::{Account, Character};
    use crate::window::fake::FakeWindows;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        commands: Mutex<Vec<LaunchCommand>>,
        fail_accounts: Vec<String>,
        preflight_error: Option<String>,
    }

    impl RecordingLauncher {
        fn failing(accounts: &[&str]) -> Self {
            Self {
                fail_accounts: accounts.iter().map(|value| value.to_string()).collect(),
                ..Self::default()
            }
        }

        fn launched_accounts(&self) -> Vec<String> {
            self.commands
                .lock()
                .expect("commands lock")
                .iter()
                .map(|command| command.args[1].clone())
                .collect()
        }
    }

    impl Launcher for RecordingLauncher {
        fn preflight(&self, _paths: &GamePaths, _settings: &LaunchSettings) -> Result<(), String> {
            match &self.preflight_error {
                Some(message) => Err(message.clone()),
                None => Ok(()),
            }
        }

        fn spawn(&self, command: &LaunchCommand) -> Result<u32, String> {
            self.commands
                .lock()
                .expect("commands lock")
                .push(command.clone());
            if self.fail_accounts.contains(&command.args[1]) {
                Err("Process exited with code 1".to_string())
            } else {
                Ok(4242)
            }
        }
    }

    fn settings() -> LaunchSettings {
        LaunchSettings {
            settle_delay_secs: 0,
            ..LaunchSettings::default()
        }
    }

    fn paths() -> GamePaths {
        GamePaths::new("C:/AO", "C:/Launcher")
    }

    fn roster() -> Roster {
        let mut bob = Character::new(2, "Bob");
        bob.selected = true;
        let mut dora = Character::new(4, "Dora");
        dora.selected = true;
        Roster::from_accounts(vec![
            Account::new("Foo", "pw-foo")
                .with_character(Character::new(1, "Alice"))
                .with_character(bob),
            Account::new("Other", "pw-other")
                .with_character(Character::new(3, "Carl"))
                .with_character(dora),
            Account::new("Idle", "pw-idle").with_character(Character::new(5, "Eli")),
        ])
    }

    #[test]
    fn build_launch_command_matches_launcher_contract() {
        let settings = LaunchSettings::default();
        let target = LaunchTarget {
            account_name: "Foo".to_string(),
            password: "secret".to_string(),
            character_id: 12,
            character_name: "Bob".to_string(),
        };
        let command = build_launch_command(&paths(), &settings, &target);
        assert_eq!(command.program, "dotnet");
        assert_eq!(
            command.args,
            vec![
                Path::new("C:/Launcher")
                    .join("AOQuickLauncher.dll")
                    .to_string_lossy()
                    .to_string(),
                "Foo".to_string(),
                "secret".to_string(),
                "12".to_string(),
            ]
        );
        assert_eq!(command.working_dir, PathBuf::from("C:/Launcher"));
        assert_eq!(
            command.env,
            vec![("AOPath".to_string(), "C:/AO".to_string())]
        );
        assert!(!command.redacted().contains("secret"));
        assert!(!format!("{command:?}").contains("secret"));
    }

    #[test]
    fn conflicted_account_is_skipped_and_the_rest_launches() {
        let roster = roster();
        let windows = FakeWindows::running(&["Alice"]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let outcome = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect("launch");

        assert_eq!(launcher.launched_accounts(), vec!["Other".to_string()]);
        assert_eq!(outcome.status, LaunchStatus::Success);
        assert_eq!(outcome.launched_names(), vec!["Dora".to_string()]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].account_name, "Foo");
        assert!(outcome.launcher_focused);
        assert_eq!(windows.focused(), vec!["Knows Modded AO#".to_string()]);
    }

    #[test]
    fn all_conflicted_aborts_without_launching() {
        let roster = roster();
        let windows = FakeWindows::running(&["Alice", "Carl"]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let err = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect_err("nothing to launch");
        assert!(matches!(err, LaunchError::NothingToLaunch { ref conflicts } if conflicts.len() == 2));
        assert!(launcher.launched_accounts().is_empty());
    }

    #[test]
    fn validation_fails_before_any_side_effect() {
        let roster = roster();
        let windows = FakeWindows::running(&[]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let err = orchestrator
            .launch_selected(&roster, &GamePaths::new("", "C:/Launcher"), false)
            .expect_err("missing game folder");
        assert!(matches!(err, LaunchError::Validation(_)));

        let err = orchestrator
            .launch(&roster, &paths(), &[], false)
            .expect_err("empty selection");
        assert!(matches!(err, LaunchError::Validation(_)));

        let launcher = RecordingLauncher {
            preflight_error: Some("DLL not found at: C:/Launcher/AOQuickLauncher.dll".to_string()),
            ..RecordingLauncher::default()
        };
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);
        let err = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect_err("preflight");
        assert!(err.to_string().contains("DLL not found"));
        assert!(launcher.launched_accounts().is_empty());
        assert!(windows.focused().is_empty());
    }

    #[test]
    fn unsupported_window_backend_aborts_launch() {
        let roster = roster();
        let windows = FakeWindows::scripted(vec![Err(WindowError::Unsupported(
            "Window checking is only supported on Windows".to_string(),
        ))]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let err = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect_err("unsupported");
        assert!(matches!(err, LaunchError::Unsupported(_)));
        assert!(launcher.launched_accounts().is_empty());
    }

    #[test]
    fn failures_are_itemized_as_partial_success() {
        let roster = roster();
        let windows = FakeWindows::running(&[]);
        let launcher = RecordingLauncher::failing(&["Other"]);
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let outcome = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect("launch");
        assert_eq!(outcome.status, LaunchStatus::PartialSuccess);
        assert_eq!(outcome.kind(), LaunchOutcomeKind::Partial);
        assert_eq!(outcome.launched_names(), vec!["Bob".to_string()]);
        assert_eq!(outcome.failed_names(), vec!["Dora".to_string()]);
        assert!(outcome.errors[0].error.contains("Failed to launch Other/4"));
    }

    #[test]
    fn total_failure_keeps_partial_shape_with_empty_success_list() {
        let roster = roster();
        let windows = FakeWindows::running(&[]);
        let launcher = RecordingLauncher::failing(&["Foo", "Other"]);
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let outcome = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect("launch");
        assert_eq!(outcome.status, LaunchStatus::PartialSuccess);
        assert_eq!(outcome.kind(), LaunchOutcomeKind::TotalFailure);
        assert!(outcome.launched.is_empty());
        assert_eq!(outcome.errors.len(), 2);
        assert!(!outcome.launcher_focused);
    }

    #[test]
    fn focus_failure_is_swallowed() {
        let roster = roster();
        let windows = FakeWindows {
            focus_result: Some(Err(WindowError::Failed("denied".to_string()))),
            ..FakeWindows::running(&[])
        };
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let outcome = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect("launch");
        assert_eq!(outcome.kind(), LaunchOutcomeKind::Success);
        assert!(!outcome.launcher_focused);
    }

    #[test]
    fn already_running_selection_is_focused_not_relaunched() {
        let roster = roster();
        let windows = FakeWindows::running(&["bob"]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let outcome = orchestrator
            .launch_selected(&roster, &paths(), false)
            .expect("launch");
        assert_eq!(launcher.launched_accounts(), vec!["Other".to_string()]);
        assert_eq!(outcome.already_running.len(), 1);
        assert_eq!(
            windows.focused(),
            vec![
                "Anarchy Online - bob".to_string(),
                "Knows Modded AO#".to_string()
            ]
        );
    }

    #[test]
    fn auto_cycle_closes_stale_windows_then_launches_everything() {
        let roster = roster();
        let windows = FakeWindows::scripted(vec![
            Ok(vec!["Alice".to_string(), "Eli".to_string()]),
            Ok(vec!["Alice".to_string(), "Eli".to_string()]),
            Ok(Vec::new()),
        ]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let outcome = orchestrator
            .launch_selected(&roster, &paths(), true)
            .expect("launch");
        assert_eq!(
            windows.closed(),
            vec![
                "Anarchy Online - Alice".to_string(),
                "Anarchy Online - Eli".to_string()
            ]
        );
        assert_eq!(outcome.closed.len(), 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(
            launcher.launched_accounts(),
            vec!["Foo".to_string(), "Other".to_string()]
        );
    }

    #[test]
    fn auto_cycle_aborts_when_a_window_survives_the_close() {
        let roster = roster();
        let windows = FakeWindows::scripted(vec![
            Ok(vec!["Alice".to_string()]),
            Ok(vec!["Alice".to_string()]),
            Ok(vec!["alice".to_string()]),
        ]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);

        let err = orchestrator
            .launch_selected(&roster, &paths(), true)
            .expect_err("close failed");
        match err {
            LaunchError::CloseFailed {
                accounts,
                still_running,
            } => {
                assert_eq!(accounts, vec!["Foo".to_string()]);
                assert_eq!(still_running, vec!["Alice".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(launcher.launched_accounts().is_empty());
    }

    #[test]
    fn incomplete_target_is_itemized_failure() {
        let roster = roster();
        let windows = FakeWindows::running(&[]);
        let launcher = RecordingLauncher::default();
        let settings = settings();
        let orchestrator = LaunchOrchestrator::new(&windows, &launcher, &settings);
        let selection = vec![LaunchTarget {
            account_name: "Foo".to_string(),
            password: String::new(),
            character_id: 2,
            character_name: "Bob".to_string(),
        }];

        let outcome = orchestrator
            .launch(&roster, &paths(), &selection, false)
            .expect("launch");
        assert_eq!(outcome.kind(), LaunchOutcomeKind::TotalFailure);
        assert!(outcome.errors[0].error.contains("Incomplete character data"));
        assert!(launcher.launched_accounts().is_empty());
    }
}
