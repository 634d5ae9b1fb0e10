//! Preference copy planner.
//!
//! Expands declarative preference items (file, directory, glob) into
//! concrete copy operations from one character's preference folder onto
//! other characters' folders. Every target path is processed on its own: a
//! failure is recorded against that target and processing moves on.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::CopyError;
use crate::types::CharacterRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "path", rename_all = "snake_case")]
pub enum PathRule {
    File(String),
    Directory(String),
    Glob(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceItem {
    pub id: String,
    pub label: String,
    pub rule: PathRule,
    pub default_selected: bool,
}

impl PreferenceItem {
    fn new(id: &str, label: &str, rule: PathRule, default_selected: bool) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            rule,
            default_selected,
        }
    }
}

pub fn default_catalog() -> Vec<PreferenceItem> {
    vec![
        PreferenceItem::new(
            "char_cfg",
            "Character settings (Char.cfg)",
            PathRule::File("Char.cfg".to_string()),
            true,
        ),
        PreferenceItem::new(
            "disabled_tips",
            "Disabled tips",
            PathRule::File("DisabledTipsMap.xml".to_string()),
            true,
        ),
        PreferenceItem::new(
            "references",
            "Shortcut bar references",
            PathRule::File("References.xml".to_string()),
            false,
        ),
        PreferenceItem::new(
            "ignore_list",
            "Ignore list",
            PathRule::File("IgnoreList.bin".to_string()),
            false,
        ),
        PreferenceItem::new(
            "containers",
            "Container layouts",
            PathRule::Directory("Containers".to_string()),
            true,
        ),
        PreferenceItem::new(
            "dock_areas",
            "Dock areas",
            PathRule::Directory("DockAreas".to_string()),
            true,
        ),
        PreferenceItem::new(
            "chat",
            "Chat windows",
            PathRule::Directory("Chat".to_string()),
            false,
        ),
        PreferenceItem::new(
            "text_macros",
            "Text macros",
            PathRule::Glob("TextMacro/*.xml".to_string()),
            false,
        ),
        PreferenceItem::new(
            "window_prefs",
            "Window preferences",
            PathRule::Glob("Prefs_*.xml".to_string()),
            false,
        ),
    ]
}

/// Preference folder of one character: `<root>/<account>/Char<id>`.
pub fn character_prefs_dir(prefs_root: &Path, character: &CharacterRef) -> PathBuf {
    prefs_root
        .join(&character.account_name)
        .join(format!("Char{}", character.character_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    pub prefs_root: PathBuf,
    pub source: CharacterRef,
    pub targets: Vec<CharacterRef>,
    pub items: Vec<String>,
    #[serde(default)]
    pub make_backup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    File,
    Directory,
    Glob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One resolved path of a copy plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOp {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Path relative to the character folder, `/`-separated.
    pub relative: String,
    pub rule: RuleKind,
    pub entry: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    pub target: CharacterRef,
    pub ops: Vec<CopyOp>,
    pub errors: Vec<String>,
}

/// Filesystem primitive the planner drives.
pub trait CopyPrimitive {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;
    /// Saves the current content of `target` before it is overwritten.
    /// Returns the backup location, or `None` when there was nothing to keep.
    fn backup(&self, target: &Path) -> io::Result<Option<PathBuf>>;
}

/// Local-disk copy primitive. Backups are sibling files named
/// `<name>.bak-<stamp>`, one stamp per instance.
#[derive(Debug, Clone)]
pub struct LocalFs {
    stamp: String,
}

impl LocalFs {
    pub fn new() -> Self {
        Self::with_stamp(Utc::now().format("%Y%m%d-%H%M%S").to_string())
    }

    pub fn with_stamp(stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
        }
    }
}

impl Default for LocalFs {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyPrimitive for LocalFs {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn backup(&self, target: &Path) -> io::Result<Option<PathBuf>> {
        if !target.is_file() {
            return Ok(None);
        }
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let backup = target.with_file_name(format!("{name}.bak-{}", self.stamp));
        fs::copy(target, &backup)?;
        Ok(Some(backup))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStatus {
    Success,
    PartialSuccess,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResult {
    pub account_name: String,
    pub character_id: u32,
    pub copied: Vec<String>,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReport {
    pub status: CopyStatus,
    pub message: String,
    pub results: Vec<TargetResult>,
}

/// Validated request with item ids resolved against the catalog.
struct ResolvedRequest<'c> {
    source_dir: PathBuf,
    targets: Vec<CharacterRef>,
    items: Vec<&'c PreferenceItem>,
}

fn resolve_request<'c>(
    request: &CopyRequest,
    catalog: &'c [PreferenceItem],
) -> Result<ResolvedRequest<'c>, CopyError> {
    if request.prefs_root.as_os_str().is_empty() {
        return Err(CopyError::Validation(
            "Preferences folder is not set.".to_string(),
        ));
    }
    if request.source.account_name.trim().is_empty() || request.source.character_id == 0 {
        return Err(CopyError::Validation(
            "Source character is incomplete.".to_string(),
        ));
    }
    if request.targets.is_empty() {
        return Err(CopyError::Validation(
            "No target characters selected.".to_string(),
        ));
    }
    if request.items.is_empty() {
        return Err(CopyError::Validation(
            "No preference items selected.".to_string(),
        ));
    }
    check_account_folder(&request.source.account_name)?;
    for target in &request.targets {
        check_account_folder(&target.account_name)?;
    }
    if request.targets.contains(&request.source) {
        return Err(self_copy(&request.source));
    }

    let mut seen = BTreeSet::new();
    let mut items = Vec::new();
    for id in &request.items {
        let item = catalog
            .iter()
            .find(|item| &item.id == id)
            .ok_or_else(|| CopyError::UnknownItem(id.clone()))?;
        if seen.insert(item.id.as_str()) {
            items.push(item);
        }
    }

    let mut seen_targets = BTreeSet::new();
    let targets: Vec<CharacterRef> = request
        .targets
        .iter()
        .filter(|target| seen_targets.insert((*target).clone()))
        .cloned()
        .collect();

    let source_dir = character_prefs_dir(&request.prefs_root, &request.source);
    if !source_dir.is_dir() {
        return Err(CopyError::SourceMissing { path: source_dir });
    }
    // Distinct refs can still land on the source folder through a
    // case-insensitive filesystem or a symlinked account folder.
    let source_real = fs::canonicalize(&source_dir).ok();
    for target in &targets {
        let target_dir = character_prefs_dir(&request.prefs_root, target);
        let same_folder = target_dir == source_dir
            || (source_real.is_some() && fs::canonicalize(&target_dir).ok() == source_real);
        if same_folder {
            return Err(self_copy(target));
        }
    }

    Ok(ResolvedRequest {
        source_dir,
        targets,
        items,
    })
}

/// Resolves the request into per-target copy plans without touching the
/// targets. Globs and directories are enumerated at call time.
pub fn plan_copy(
    request: &CopyRequest,
    catalog: &[PreferenceItem],
) -> Result<Vec<TargetPlan>, CopyError> {
    let resolved = resolve_request(request, catalog)?;
    Ok(resolved
        .targets
        .iter()
        .map(|target| {
            let target_dir = character_prefs_dir(&request.prefs_root, target);
            let (ops, errors) = plan_target(&resolved.source_dir, &target_dir, &resolved.items);
            TargetPlan {
                target: target.clone(),
                ops,
                errors,
            }
        })
        .collect())
}

pub fn copy_preferences(
    request: &CopyRequest,
    catalog: &[PreferenceItem],
    fs: &dyn CopyPrimitive,
) -> Result<CopyReport, CopyError> {
    let resolved = resolve_request(request, catalog)?;
    info!(
        source = %request.source,
        targets = resolved.targets.len(),
        items = resolved.items.len(),
        backup = request.make_backup,
        "copying preferences"
    );

    let mut results = Vec::with_capacity(resolved.targets.len());
    for target in &resolved.targets {
        let target_dir = character_prefs_dir(&request.prefs_root, target);
        // Planned per target so globs see the source as it is right now.
        let (ops, plan_errors) = plan_target(&resolved.source_dir, &target_dir, &resolved.items);
        let mut result = TargetResult {
            account_name: target.account_name.clone(),
            character_id: target.character_id,
            copied: Vec::new(),
            errors: plan_errors,
            backups: Vec::new(),
        };
        for op in &ops {
            apply_op(op, request.make_backup, fs, &mut result);
        }
        for error in &result.errors {
            warn!(target = %target, "{error}");
        }
        results.push(result);
    }

    Ok(summarize(results))
}

fn apply_op(op: &CopyOp, make_backup: bool, fs: &dyn CopyPrimitive, result: &mut TargetResult) {
    match op.entry {
        EntryKind::Dir => {
            if op.target.is_dir() {
                return;
            }
            if let Err(err) = fs.create_dir_all(&op.target) {
                result
                    .errors
                    .push(format!("Failed to create {}: {err}", op.relative));
            }
        }
        EntryKind::File => {
            if make_backup {
                match fs.backup(&op.target) {
                    Ok(Some(path)) => result.backups.push(path.to_string_lossy().to_string()),
                    Ok(None) => {}
                    Err(err) => {
                        result
                            .errors
                            .push(format!("Failed to back up {}: {err}", op.relative));
                        return;
                    }
                }
            }
            if let Some(parent) = op.target.parent() {
                if !parent.is_dir() {
                    if let Err(err) = fs.create_dir_all(parent) {
                        result
                            .errors
                            .push(format!("Failed to create folder for {}: {err}", op.relative));
                        return;
                    }
                }
            }
            match fs.copy_file(&op.source, &op.target) {
                Ok(()) => result.copied.push(op.relative.clone()),
                Err(err) => result
                    .errors
                    .push(format!("Failed to copy {}: {err}", op.relative)),
            }
        }
    }
}

fn summarize(results: Vec<TargetResult>) -> CopyReport {
    let copied = results.iter().map(|result| result.copied.len()).sum::<usize>();
    let errors = results.iter().map(|result| result.errors.len()).sum::<usize>();

    let (status, message) = if errors == 0 {
        let message = if copied == 0 {
            "Nothing to copy: none of the selected preference files exist on the source."
                .to_string()
        } else {
            format!(
                "Copied {copied} file(s) to {} character(s).",
                results.len()
            )
        };
        (CopyStatus::Success, message)
    } else if copied > 0 {
        (
            CopyStatus::PartialSuccess,
            format!("Copied {copied} file(s) with {errors} error(s)."),
        )
    } else {
        (
            CopyStatus::Error,
            format!("No files copied; {errors} error(s)."),
        )
    };

    CopyReport {
        status,
        message,
        results,
    }
}

fn plan_target(
    source_dir: &Path,
    target_dir: &Path,
    items: &[&PreferenceItem],
) -> (Vec<CopyOp>, Vec<String>) {
    let mut ops = Vec::new();
    let mut errors = Vec::new();

    for item in items {
        match &item.rule {
            PathRule::File(relative) => {
                let Some(relative) = clean_relative(relative) else {
                    errors.push(format!("Invalid path in item {}: {relative}", item.id));
                    continue;
                };
                let source = source_dir.join(&relative);
                if !source.is_file() {
                    debug!(path = %source.display(), "optional preference file absent; skipped");
                    continue;
                }
                ops.push(CopyOp {
                    target: target_dir.join(&relative),
                    source,
                    relative: to_slash(&relative),
                    rule: RuleKind::File,
                    entry: EntryKind::File,
                });
            }
            PathRule::Directory(relative) => {
                let Some(relative) = clean_relative(relative) else {
                    errors.push(format!("Invalid path in item {}: {relative}", item.id));
                    continue;
                };
                let source_root = source_dir.join(&relative);
                if !source_root.is_dir() {
                    debug!(path = %source_root.display(), "optional preference folder absent; skipped");
                    continue;
                }
                for entry in WalkDir::new(&source_root)
                    .follow_links(false)
                    .sort_by_file_name()
                {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            errors.push(format!("Failed to read {}: {err}", to_slash(&relative)));
                            continue;
                        }
                    };
                    let Ok(rel) = entry.path().strip_prefix(source_dir) else {
                        continue;
                    };
                    let kind = if entry.file_type().is_dir() {
                        EntryKind::Dir
                    } else if entry.file_type().is_file() {
                        EntryKind::File
                    } else {
                        continue;
                    };
                    ops.push(CopyOp {
                        source: entry.path().to_path_buf(),
                        target: target_dir.join(rel),
                        relative: to_slash(rel),
                        rule: RuleKind::Directory,
                        entry: kind,
                    });
                }
            }
            PathRule::Glob(pattern) => {
                let (dir, file_pattern) = match pattern.rsplit_once('/') {
                    Some((dir, file)) => (dir, file),
                    None => ("", pattern.as_str()),
                };
                let (Some(dir), Ok(matcher)) = (clean_relative(dir), glob_regex(file_pattern))
                else {
                    errors.push(format!("Invalid pattern in item {}: {pattern}", item.id));
                    continue;
                };
                let base = source_dir.join(&dir);
                if !base.is_dir() {
                    continue;
                }
                for entry in WalkDir::new(&base)
                    .min_depth(1)
                    .max_depth(1)
                    .sort_by_file_name()
                {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            errors.push(format!("Failed to list {pattern}: {err}"));
                            continue;
                        }
                    };
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy();
                    if !matcher.is_match(&name) {
                        continue;
                    }
                    let rel = dir.join(&*name);
                    ops.push(CopyOp {
                        source: entry.path().to_path_buf(),
                        target: target_dir.join(&rel),
                        relative: to_slash(&rel),
                        rule: RuleKind::Glob,
                        entry: EntryKind::File,
                    });
                }
            }
        }
    }

    (ops, errors)
}

fn self_copy(character: &CharacterRef) -> CopyError {
    CopyError::SelfCopy {
        account: character.account_name.clone(),
        character_id: character.character_id,
    }
}

/// Account names map to exactly one folder level below the preferences root.
fn check_account_folder(name: &str) -> Result<(), CopyError> {
    let single_component = !name.trim().is_empty()
        && !name.contains(['/', '\\', ':'])
        && clean_relative(name).is_some_and(|path| path.as_os_str() == name);
    if single_component {
        Ok(())
    } else {
        Err(CopyError::InvalidAccount(name.to_string()))
    }
}

/// Relative path with no root, prefix or parent components.
fn clean_relative(value: &str) -> Option<PathBuf> {
    let path = Path::new(value);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(out)
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn glob_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::from("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr)
}
