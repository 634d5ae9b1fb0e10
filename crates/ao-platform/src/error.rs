use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{what} not found: {path}")]
    MissingPath { what: &'static str, path: PathBuf },
    #[error("launcher failed to start ({command}): {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting on launcher process {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("launcher exited with {status}{detail}")]
    EarlyExit { status: String, detail: String },
}

impl PlatformError {
    pub(crate) fn early_exit(status: impl Into<String>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        let detail = if stderr.is_empty() {
            String::new()
        } else {
            format!(": {stderr}")
        };
        Self::EarlyExit {
            status: status.into(),
            detail,
        }
    }
}
