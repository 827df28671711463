use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Required script '{script}' not found in {manifest}")]
    MissingScript { script: String, manifest: PathBuf },

    #[error("Required environment file not found: {0}")]
    MissingEnvFile(PathBuf),

    #[error("Required command not found on PATH: {0}")]
    MissingCommand(String),

    #[error("Rules file not found: {0}")]
    MissingRulesFile(PathBuf),

    #[error("Essential PWA file missing from build output: {file} (in {output_dir})")]
    PwaFileMissing { file: String, output_dir: PathBuf },

    #[error("Build output directory not found: {0}")]
    OutputDirMissing(PathBuf),

    #[error("Command execution failed: {0}")]
    Exec(#[from] shipflow_exec::ExecError),

    #[error("Cache busting failed: {0}")]
    Cache(#[from] shipflow_cache::CacheError),

    #[error("Hosting platform error: {0}")]
    Hosting(String),

    #[error("Deployment verification failed for {url}: {reason}")]
    VerificationFailed { url: String, reason: String },

    #[error("No URL configured for {component} in {environment}")]
    MissingUrl {
        component: String,
        environment: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] shipflow_core::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected platform output: {0}")]
    UnexpectedOutput(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
