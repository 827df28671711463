//! Build artifacts and their validation

use crate::error::{DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Entry HTML, web manifest and service worker are essential for a client
/// build; a deploy without them would serve a broken PWA
const ESSENTIAL_CLIENT_FILES: [&str; 3] = ["index.html", "manifest.webmanifest", "sw.js"];

/// Alternative filenames accepted for the essential files
const ALTERNATIVES: [(&str, &str); 2] = [
    ("manifest.webmanifest", "manifest.json"),
    ("sw.js", "service-worker.js"),
];

/// Result of a completed build step
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub output_dir: PathBuf,

    /// Unique build id stamped by the cache buster, when it ran
    pub build_id: Option<String>,

    /// Non-fatal findings (missing optional assets etc.)
    pub warnings: Vec<String>,
}

impl BuildArtifact {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            build_id: None,
            warnings: Vec::new(),
        }
    }
}

fn present(output_dir: &Path, file: &str) -> bool {
    if output_dir.join(file).exists() {
        return true;
    }
    ALTERNATIVES
        .iter()
        .any(|(canonical, alt)| *canonical == file && output_dir.join(alt).exists())
}

/// Validate a client build output
///
/// Missing essential files fail with `PwaFileMissing` naming the exact
/// file; missing optional icon assets only produce warnings.
pub fn validate_client_artifacts(
    output_dir: &Path,
    optional_icons: &[&str],
) -> Result<Vec<String>> {
    if !output_dir.is_dir() {
        return Err(DeployError::OutputDirMissing(output_dir.to_path_buf()));
    }

    for file in ESSENTIAL_CLIENT_FILES {
        if !present(output_dir, file) {
            return Err(DeployError::PwaFileMissing {
                file: file.to_string(),
                output_dir: output_dir.to_path_buf(),
            });
        }
    }

    let mut warnings = Vec::new();
    for icon in optional_icons {
        if !output_dir.join(icon).exists() {
            let warning = format!("optional asset missing: {}", icon);
            warn!("{}", warning);
            warnings.push(warning);
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "x").unwrap();
    }

    #[test]
    fn test_complete_output_passes() {
        let temp_dir = tempdir().unwrap();
        for f in ["index.html", "manifest.webmanifest", "sw.js"] {
            write(temp_dir.path(), f);
        }

        let warnings = validate_client_artifacts(temp_dir.path(), &[]).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_service_worker_names_the_file() {
        let temp_dir = tempdir().unwrap();
        write(temp_dir.path(), "index.html");
        write(temp_dir.path(), "manifest.webmanifest");

        let err = validate_client_artifacts(temp_dir.path(), &[]).unwrap_err();
        match err {
            DeployError::PwaFileMissing { file, .. } => assert_eq!(file, "sw.js"),
            other => panic!("expected PwaFileMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_alternative_filenames_accepted() {
        let temp_dir = tempdir().unwrap();
        write(temp_dir.path(), "index.html");
        write(temp_dir.path(), "manifest.json");
        write(temp_dir.path(), "service-worker.js");

        assert!(validate_client_artifacts(temp_dir.path(), &[]).is_ok());
    }

    #[test]
    fn test_missing_icons_only_warn() {
        let temp_dir = tempdir().unwrap();
        for f in ["index.html", "manifest.webmanifest", "sw.js"] {
            write(temp_dir.path(), f);
        }

        let warnings =
            validate_client_artifacts(temp_dir.path(), &["icons/icon-192.png"]).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("icon-192.png"));
    }

    #[test]
    fn test_missing_output_dir() {
        let err = validate_client_artifacts(Path::new("/nonexistent/dist-xyz"), &[]).unwrap_err();
        assert!(matches!(err, DeployError::OutputDirMissing(_)));
    }
}
