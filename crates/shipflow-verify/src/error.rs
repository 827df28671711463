use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser automation failed: {0}")]
    Browser(String),

    #[error("Invalid verification pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
