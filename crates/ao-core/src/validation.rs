//! Validation for service config and the persisted roster document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;

use crate::config::AppConfig;
use crate::settings::SettingsDocument;
use crate::types::NameKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: ValidationLevel::Error,
            code,
            message: message.into(),
        }
    }

    fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: ValidationLevel::Warning,
            code,
            message: message.into(),
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues
        .iter()
        .any(|issue| issue.level == ValidationLevel::Error)
}

impl Validate for AppConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.web.bind.trim().is_empty() {
            issues.push(ValidationIssue::error(
                "web.bind.empty",
                "web bind address is empty",
            ));
        } else if self.web.bind.parse::<SocketAddr>().is_err() {
            issues.push(ValidationIssue::error(
                "web.bind.invalid",
                format!("web bind address {:?} is not host:port", self.web.bind),
            ));
        } else if !self.web.bind.starts_with("127.") && !self.web.bind.starts_with("[::1]") {
            issues.push(ValidationIssue::warning(
                "web.bind.public",
                "web server is reachable beyond localhost and stores account passwords",
            ));
        }

        if self.paths.settings_file.as_os_str().is_empty() {
            issues.push(ValidationIssue::error(
                "paths.settings_file.empty",
                "settings file path is empty",
            ));
        }

        if self.launch.runtime.trim().is_empty() {
            issues.push(ValidationIssue::error(
                "launch.runtime.empty",
                "launcher runtime is empty",
            ));
        }
        if self.launch.launcher_dll.trim().is_empty() {
            issues.push(ValidationIssue::error(
                "launch.launcher_dll.empty",
                "launcher dll name is empty",
            ));
        }
        if self.launch.game_path_env.trim().is_empty() {
            issues.push(ValidationIssue::error(
                "launch.game_path_env.empty",
                "game path environment variable name is empty",
            ));
        }
        if self.launch.window_title_prefix.is_empty() {
            issues.push(ValidationIssue::error(
                "launch.window_title_prefix.empty",
                "window title prefix is empty; every window would match",
            ));
        }
        if self.launch.settle_delay_secs == 0 {
            issues.push(ValidationIssue::warning(
                "launch.settle_delay.zero",
                "settle delay is 0; closed windows may still be listed on recheck",
            ));
        }
        if self.launch.early_exit_grace_ms > 10_000 {
            issues.push(ValidationIssue::warning(
                "launch.early_exit_grace.high",
                format!(
                    "early exit grace of {}ms delays every launch",
                    self.launch.early_exit_grace_ms
                ),
            ));
        }

        issues
    }
}

impl Validate for SettingsDocument {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut account_names = BTreeSet::new();

        for account in &self.accounts {
            if account.name.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    "account.name.empty",
                    "an account has an empty name",
                ));
            } else if !account_names.insert(NameKey::new(&account.name)) {
                issues.push(ValidationIssue::warning(
                    "account.name.duplicate",
                    format!("account {:?} appears more than once", account.name),
                ));
            }

            let mut ids = BTreeSet::new();
            for character in &account.characters {
                if character.name.trim().is_empty() {
                    issues.push(ValidationIssue::error(
                        "character.name.empty",
                        format!("account {:?} has a character with an empty name", account.name),
                    ));
                }
                if character.id == 0 {
                    issues.push(ValidationIssue::error(
                        "character.id.zero",
                        format!(
                            "character {:?} on account {:?} has id 0",
                            character.name, account.name
                        ),
                    ));
                } else if !ids.insert(character.id) {
                    issues.push(ValidationIssue::error(
                        "character.id.duplicate",
                        format!(
                            "character id {} appears twice on account {:?}",
                            character.id, account.name
                        ),
                    ));
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, Character};

    #[test]
    fn default_config_is_valid() {
        let issues = AppConfig::default().validate();
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn config_flags_empty_launcher_fields() {
        let mut config = AppConfig::default();
        config.launch.runtime = " ".to_string();
        config.launch.settle_delay_secs = 0;
        config.web.bind = "nonsense".to_string();

        let issues = config.validate();
        assert!(has_errors(&issues));
        assert!(issues
            .iter()
            .any(|issue| issue.code == "launch.runtime.empty"));
        assert!(issues.iter().any(|issue| issue.code == "web.bind.invalid"));
        assert!(issues.iter().any(|issue| issue.code == "launch.settle_delay.zero"
            && issue.level == ValidationLevel::Warning));
    }

    #[test]
    fn public_bind_is_only_a_warning() {
        let mut config = AppConfig::default();
        config.web.bind = "0.0.0.0:5000".to_string();
        let issues = config.validate();
        assert!(!has_errors(&issues));
        assert_eq!(issues[0].code, "web.bind.public");
    }

    #[test]
    fn settings_document_flags_bad_characters() {
        let document = SettingsDocument {
            accounts: vec![
                Account::new("Main", "pw")
                    .with_character(Character::new(0, "Zero"))
                    .with_character(Character::new(7, "Bob"))
                    .with_character(Character::new(7, "Bobby")),
                Account::new("main", "pw"),
            ],
            ..SettingsDocument::default()
        };

        let codes = document
            .validate()
            .into_iter()
            .map(|issue| issue.code)
            .collect::<Vec<_>>();
        assert_eq!(
            codes,
            vec![
                "character.id.zero",
                "character.id.duplicate",
                "account.name.duplicate"
            ]
        );
    }
}
