use std::path::{Path, PathBuf};
use std::process::Command;

use fnstage_core::{FunctionDescriptor, check_source_dir};

use crate::cloudbuild::BuildKind;

/// Bundle directory, relative to the project root.
pub const BUNDLE_DIR: &str = ".fnstage-bundle";

/// Directory for generated configs submitted without source.
pub const GENERATED_DIR: &str = ".fnstage/generated";

/// Paths never copied into a bundle, regardless of .gitignore content.
const BUNDLE_EXCLUDES: &[&str] = &[".fnstage-bundle", ".fnstage", ".git"];

/// Bundles project files for Cloud Build submission.
///
/// Uses `git ls-files` to respect `.gitignore`, then copies all tracked
/// and untracked-but-not-ignored files into `.fnstage-bundle/`.
/// The deploy build config is written into the bundle root, and every
/// function's source directory must be present and non-empty in the bundle.
pub fn create_bundle(
    project_dir: &Path,
    cloudbuild_yaml: &str,
    descriptors: &[FunctionDescriptor],
) -> Result<PathBuf, BundleError> {
    let bundle_dir = project_dir.join(BUNDLE_DIR);

    if bundle_dir.exists() {
        std::fs::remove_dir_all(&bundle_dir).map_err(|e| BundleError::Cleanup {
            path: bundle_dir.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&bundle_dir).map_err(|e| BundleError::Create {
        path: bundle_dir.clone(),
        source: e,
    })?;

    let files = git_ls_files(project_dir)?;
    let mut copied = 0usize;

    for relative_path in &files {
        if BUNDLE_EXCLUDES
            .iter()
            .any(|ex| relative_path.starts_with(ex))
        {
            continue;
        }

        let src = project_dir.join(relative_path);
        // Deleted-but-tracked files show up in ls-files.
        if !src.is_file() {
            continue;
        }
        let dst = bundle_dir.join(relative_path);

        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BundleError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::copy(&src, &dst).map_err(|e| BundleError::CopyFile {
            path: src,
            source: e,
        })?;
        copied += 1;
    }

    let config_path = bundle_dir.join(BuildKind::Deploy.file_name());
    std::fs::write(&config_path, cloudbuild_yaml).map_err(|e| BundleError::WriteConfig {
        path: config_path,
        source: e,
    })?;

    for d in descriptors {
        check_source_dir(&bundle_dir.join(&d.source)).map_err(|reason| {
            BundleError::MissingSource {
                function: d.local_name.clone(),
                path: d.source.clone(),
                reason,
            }
        })?;
    }

    tracing::debug!(
        bundle = %bundle_dir.display(),
        files = copied,
        "bundle created",
    );
    Ok(bundle_dir)
}

/// Write a generated build config that is submitted without source.
pub fn write_generated_config(
    project_dir: &Path,
    kind: BuildKind,
    yaml: &str,
) -> Result<PathBuf, BundleError> {
    let dir = project_dir.join(GENERATED_DIR);
    std::fs::create_dir_all(&dir).map_err(|e| BundleError::Create {
        path: dir.clone(),
        source: e,
    })?;

    let path = dir.join(kind.file_name());
    std::fs::write(&path, yaml).map_err(|e| BundleError::WriteConfig {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// Returns the list of files git considers part of the project:
/// tracked files + untracked files that are not .gitignored.
fn git_ls_files(project_dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let output = Command::new("git")
        .args(["ls-files", "--cached", "--others", "--exclude-standard"])
        .current_dir(project_dir)
        .output()
        .map_err(|e| BundleError::GitCommand {
            detail: "failed to execute git ls-files".to_owned(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BundleError::GitFailed {
            detail: format!(
                "git ls-files exited with {}: {}",
                output.status,
                stderr.trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Checks whether the git working tree has uncommitted changes.
pub fn is_dirty(project_dir: &Path) -> Result<bool, BundleError> {
    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(project_dir)
        .output()
        .map_err(|e| BundleError::GitCommand {
            detail: "failed to execute git status".to_owned(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BundleError::GitFailed {
            detail: format!(
                "git status exited with {}: {}",
                output.status,
                stderr.trim()
            ),
        });
    }

    Ok(!output.stdout.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to clean up bundle directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy file {path}")]
    CopyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write build config at {path}")]
    WriteConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("source for function '{function}' ({path}) is not in the bundle: {reason}")]
    MissingSource {
        function: String,
        path: PathBuf,
        reason: &'static str,
    },
    #[error("git command failed: {detail}")]
    GitCommand {
        detail: String,
        source: std::io::Error,
    },
    #[error("git failed: {detail}")]
    GitFailed { detail: String },
}
