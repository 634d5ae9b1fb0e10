use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{ChildStderr, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use ao_core::config::LaunchSettings;
use ao_core::launch::{GamePaths, LaunchCommand, Launcher};
use tracing::{debug, info};

use crate::error::PlatformError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long an early-exited child's stderr is collected after the exit.
const STDERR_SETTLE: Duration = Duration::from_millis(250);
const STDERR_MAX_LINES: usize = 64;

#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

/// Starts the external launcher as a detached child process.
///
/// The child is watched for `early_exit_grace`; a non-zero exit inside that
/// window is reported as a failure with the child's stderr. A child still
/// running (or exiting cleanly) after the grace period counts as launched.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    early_exit_grace: Duration,
}

impl ProcessLauncher {
    pub fn new(early_exit_grace: Duration) -> Self {
        Self { early_exit_grace }
    }

    pub fn from_settings(settings: &LaunchSettings) -> Self {
        Self::new(settings.early_exit_grace())
    }

    pub fn check_paths(
        &self,
        paths: &GamePaths,
        settings: &LaunchSettings,
    ) -> Result<(), PlatformError> {
        let game = Path::new(paths.game_folder.trim());
        if !game.is_dir() {
            return Err(PlatformError::MissingPath {
                what: "game folder",
                path: game.to_path_buf(),
            });
        }
        let launcher = paths.launcher_path(settings);
        if !launcher.is_file() {
            return Err(PlatformError::MissingPath {
                what: "launcher",
                path: launcher,
            });
        }
        Ok(())
    }

    pub fn start(&self, command: &LaunchCommand) -> Result<u32, PlatformError> {
        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .current_dir(&command.working_dir)
            .envs(command.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            process.creation_flags(CREATE_NEW_CONSOLE);
        }

        let mut child = process.spawn().map_err(|source| PlatformError::Spawn {
            command: command.redacted(),
            source,
        })?;
        let pid = child.id();
        debug!(pid, "launcher process started");
        let stderr_rx = child.stderr.take().map(drain_stderr);

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => {
                    info!(pid, "launcher exited cleanly");
                    return Ok(pid);
                }
                Ok(Some(status)) => {
                    let stderr = stderr_rx.as_ref().map(collect_stderr).unwrap_or_default();
                    return Err(PlatformError::early_exit(status.to_string(), &stderr));
                }
                Ok(None) if started.elapsed() >= self.early_exit_grace => return Ok(pid),
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => return Err(PlatformError::Wait { pid, source }),
            }
        }
    }
}

/// Reads the child's stderr on a background thread until the pipe closes,
/// so a launcher that outlives the grace period can keep writing to it.
fn drain_stderr(stderr: ChildStderr) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let reader = BufReader::new(stderr);
        for line in reader.split(b'\n').map_while(Result::ok) {
            // The receiver is gone once the child counts as launched; keep
            // reading regardless.
            let _ = tx.send(String::from_utf8_lossy(&line).trim_end().to_string());
        }
    });
    rx
}

fn collect_stderr(rx: &mpsc::Receiver<String>) -> String {
    let deadline = Instant::now() + STDERR_SETTLE;
    let mut lines = Vec::new();
    while let Ok(line) = rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        if lines.len() < STDERR_MAX_LINES {
            lines.push(line);
        }
    }
    lines.join("\n")
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::from_settings(&LaunchSettings::default())
    }
}

impl Launcher for ProcessLauncher {
    fn preflight(&self, paths: &GamePaths, settings: &LaunchSettings) -> Result<(), String> {
        self.check_paths(paths, settings)
            .map_err(|err| err.to_string())
    }

    fn spawn(&self, command: &LaunchCommand) -> Result<u32, String> {
        self.start(command).map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn shell(script: &str, cwd: &Path) -> LaunchCommand {
        LaunchCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: cwd.to_path_buf(),
            env: vec![("AOPath".to_string(), "/games/ao".to_string())],
        }
    }

    #[test]
    fn preflight_reports_missing_locations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = LaunchSettings::default();
        let launcher = ProcessLauncher::default();

        let paths = GamePaths::new(
            dir.path().join("missing-game").to_string_lossy(),
            dir.path().to_string_lossy(),
        );
        let err = launcher
            .preflight(&paths, &settings)
            .expect_err("missing game folder");
        assert!(err.starts_with("game folder not found"));

        let paths = GamePaths::new(dir.path().to_string_lossy(), dir.path().to_string_lossy());
        let err = launcher
            .preflight(&paths, &settings)
            .expect_err("missing dll");
        assert!(err.starts_with("launcher not found"));

        fs::write(dir.path().join(&settings.launcher_dll), b"").expect("write dll");
        launcher.preflight(&paths, &settings).expect("paths exist");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let command = LaunchCommand {
            program: "definitely-not-a-real-runtime".to_string(),
            args: vec!["x.dll".to_string(), "acc".to_string(), "secret".to_string()],
            working_dir: PathBuf::from(dir.path()),
            env: Vec::new(),
        };
        let err = ProcessLauncher::new(Duration::from_millis(50))
            .start(&command)
            .expect_err("spawn should fail");
        assert!(matches!(err, PlatformError::Spawn { .. }));
        assert!(!err.to_string().contains("secret"));
    }

    #[cfg(unix)]
    #[test]
    fn clean_exit_and_long_running_child_both_count_as_launched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let launcher = ProcessLauncher::new(Duration::from_millis(200));

        launcher
            .start(&shell("test \"$AOPath\" = /games/ao", dir.path()))
            .expect("clean exit");
        launcher
            .start(&shell("sleep 2", dir.path()))
            .expect("still running after grace");
    }

    #[cfg(unix)]
    #[test]
    fn early_failure_reports_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ProcessLauncher::new(Duration::from_secs(5))
            .start(&shell("echo 'login rejected' >&2; exit 3", dir.path()))
            .expect_err("non-zero exit");
        let rendered = err.to_string();
        assert!(rendered.contains("login rejected"), "{rendered}");
        assert!(rendered.contains('3'), "{rendered}");
    }

    #[cfg(unix)]
    #[test]
    fn child_writing_stderr_after_grace_keeps_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        ProcessLauncher::new(Duration::from_millis(100))
            .start(&shell("sleep 0.5; echo late >&2; touch done", dir.path()))
            .expect("still running after grace");

        let marker = dir.path().join("done");
        let deadline = Instant::now() + Duration::from_secs(5);
        while !marker.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(marker.exists(), "child did not survive its late stderr write");
    }

    #[cfg(unix)]
    #[test]
    fn working_directory_is_applied() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("marker"), b"").expect("marker");
        ProcessLauncher::new(Duration::from_secs(5))
            .start(&shell("test -f marker", dir.path()))
            .expect("runs in working dir");
    }
}
