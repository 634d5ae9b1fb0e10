//! Batch-script rendering of the launch commands the orchestrator would run.

use crate::config::LaunchSettings;
use crate::error::LaunchError;
use crate::launch::{build_launch_command, GamePaths};
use crate::types::LaunchTarget;

const LAUNCH_GAP_SECS: u32 = 2;

pub fn render_launch_script(
    paths: &GamePaths,
    settings: &LaunchSettings,
    selection: &[LaunchTarget],
) -> Result<String, LaunchError> {
    if selection.is_empty() {
        return Err(LaunchError::Validation(
            "No characters selected for export.".to_string(),
        ));
    }
    paths.validate()?;

    let mut lines = vec![
        "@echo off".to_string(),
        "rem Generated by aodeck".to_string(),
        format!(
            "set {}",
            quoted(
                &format!("{}={}", settings.game_path_env, paths.game_folder.trim()),
                "game folder"
            )?
        ),
        format!("cd /d {}", quoted(paths.dll_folder.trim(), "launcher folder")?),
    ];

    for (index, target) in selection.iter().enumerate() {
        let command = build_launch_command(paths, settings, target);
        let what = format!("launch arguments for account {}", target.account_name);
        let args = command
            .args
            .iter()
            .map(|arg| quoted(arg, &what))
            .collect::<Result<Vec<_>, _>>()?
            .join(" ");
        lines.push(format!(
            "echo Launching {} ({})",
            bare(&target.display_name(), "character name")?,
            bare(&target.account_name, "account name")?
        ));
        lines.push(format!(
            "start \"\" {} {args}",
            quoted(&command.program, "runtime")?
        ));
        if index + 1 < selection.len() {
            lines.push(format!("timeout /t {LAUNCH_GAP_SECS} /nobreak >nul"));
        }
    }

    let mut script = lines.join("\r\n");
    script.push_str("\r\n");
    Ok(script)
}

/// Double-quoted argument; only `%` needs doubling inside quotes.
fn quoted(value: &str, what: &str) -> Result<String, LaunchError> {
    representable(value, what)?;
    Ok(format!("\"{}\"", value.replace('%', "%%")))
}

/// Unquoted text, with command separators and redirections escaped.
fn bare(value: &str, what: &str) -> Result<String, LaunchError> {
    representable(value, what)?;
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => out.push_str("%%"),
            '^' | '&' | '|' | '<' | '>' | '(' | ')' => {
                out.push('^');
                out.push(ch);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn representable(value: &str, what: &str) -> Result<(), LaunchError> {
    if value.contains(['"', '\r', '\n']) {
        return Err(LaunchError::Validation(format!(
            "Cannot export: {what} contains a quote or line break."
        )));
    }
    Ok(())
}
