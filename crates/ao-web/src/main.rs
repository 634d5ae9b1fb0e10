use ao_core::config::{load_app_config_or_default, ConfigError};
use ao_core::error::SettingsError;
use ao_core::settings::load_settings;
use ao_core::validation::{Validate, ValidationIssue, ValidationLevel};
use ao_platform::{default_window_control, ProcessLauncher};
use ao_web::{run_web_server, WebError, WebState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "config/aodeck.toml";

/// Local web front-end for launching game accounts.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "aodeck", version)]
struct CliArgs {
    /// Service configuration file; missing means defaults.
    #[arg(long = "config", default_value = DEFAULT_CONFIG)]
    config_path: PathBuf,
    /// Overrides `[web] bind`.
    #[arg(long = "bind")]
    bind_override: Option<String>,
    /// Overrides `[paths] settings_file`.
    #[arg(long = "settings")]
    settings_override: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error("{0}")]
    Args(String),
    #[error("failed to load config at {path}: {source}")]
    LoadConfig {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
    #[error("{0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Web(#[from] WebError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run(CliArgs::parse()).await {
        eprintln!("aodeck failed: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn run(args: CliArgs) -> Result<(), MainError> {
    let mut config =
        load_app_config_or_default(&args.config_path).map_err(|source| MainError::LoadConfig {
            path: args.config_path.clone(),
            source,
        })?;
    if let Some(settings_file) = args.settings_override {
        config.paths.settings_file = settings_file;
    }
    config.web.bind = resolve_bind(args.bind_override, &config.web.bind)?;
    check_config(&config.validate())?;

    let settings_path = config.paths.settings_file.clone();
    let document = load_settings(&settings_path)?;
    for issue in document.validate() {
        warn!(code = issue.code, "settings: {}", issue.message);
    }
    info!(
        accounts = document.accounts.len(),
        settings = %settings_path.display(),
        "roster loaded"
    );

    let windows = default_window_control(&config.launch);
    let launcher = Arc::new(ProcessLauncher::from_settings(&config.launch));
    let bind = config.web.bind.clone();
    let state = WebState::new(config, document, windows, launcher).with_settings_file(settings_path);

    run_web_server(&bind, state).await?;
    Ok(())
}

fn resolve_bind(bind_override: Option<String>, config_bind: &str) -> Result<String, MainError> {
    let candidate = bind_override.unwrap_or_else(|| config_bind.to_string());
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(MainError::Args(
            "bind address must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn check_config(issues: &[ValidationIssue]) -> Result<(), MainError> {
    for issue in issues
        .iter()
        .filter(|issue| issue.level == ValidationLevel::Warning)
    {
        warn!(code = issue.code, "config: {}", issue.message);
    }
    let errors = issues
        .iter()
        .filter(|issue| issue.level == ValidationLevel::Error)
        .map(|issue| format!("{}: {}", issue.code, issue.message))
        .collect::<Vec<_>>();
    if errors.is_empty() {
        return Ok(());
    }
    Err(MainError::InvalidConfig(format!(
        "config validation failed ({})",
        errors.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::{check_config, resolve_bind, CliArgs};
    use ao_core::config::AppConfig;
    use ao_core::validation::Validate;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn cli_defaults_to_bundled_config_path() {
        let args = CliArgs::try_parse_from(["aodeck"]).expect("parse");
        assert_eq!(
            args,
            CliArgs {
                config_path: PathBuf::from("config/aodeck.toml"),
                bind_override: None,
                settings_override: None,
            }
        );
    }

    #[test]
    fn cli_applies_overrides() {
        let args = CliArgs::try_parse_from([
            "aodeck",
            "--config",
            "/etc/aodeck.toml",
            "--bind",
            "127.0.0.1:6000",
            "--settings",
            "/tmp/roster.json",
        ])
        .expect("parse");
        assert_eq!(args.config_path, PathBuf::from("/etc/aodeck.toml"));
        assert_eq!(args.bind_override.as_deref(), Some("127.0.0.1:6000"));
        assert_eq!(args.settings_override, Some(PathBuf::from("/tmp/roster.json")));
    }

    #[test]
    fn cli_rejects_unknown_arguments() {
        assert!(CliArgs::try_parse_from(["aodeck", "--bad"]).is_err());
    }

    #[test]
    fn resolve_bind_prefers_override_and_rejects_blank_values() {
        let resolved = resolve_bind(Some("127.0.0.1:9999".to_string()), "127.0.0.1:5000")
            .expect("resolve bind");
        assert_eq!(resolved, "127.0.0.1:9999");

        let resolved = resolve_bind(None, "127.0.0.1:5000").expect("resolve fallback");
        assert_eq!(resolved, "127.0.0.1:5000");

        let err = resolve_bind(Some("   ".to_string()), "127.0.0.1:5000")
            .expect_err("blank override should fail");
        assert_eq!(err.to_string(), "bind address must not be empty");
    }

    #[test]
    fn check_config_fails_on_error_issues_only() {
        let mut config = AppConfig::default();
        config.launch.settle_delay_secs = 0;
        check_config(&config.validate()).expect("warnings only");

        config.launch.runtime.clear();
        let err = check_config(&config.validate()).expect_err("empty runtime");
        assert!(err.to_string().contains("launch.runtime.empty"));
    }
}
