use std::path::{Path, PathBuf};

use crate::cloudbuild::BuildKind;

/// Directory holding ejected build configs.
pub const EJECT_DIR: &str = ".fnstage";

/// Writes the deploy and delete build configs into `.fnstage/`.
///
/// After ejecting, `fnstage deploy --cloud-build` and
/// `fnstage delete --cloud-build` submit these files instead of generating
/// them from fnstage.toml.
pub fn eject(project_dir: &Path, deploy_yaml: &str, delete_yaml: &str) -> Result<(), EjectError> {
    let eject_dir = project_dir.join(EJECT_DIR);
    std::fs::create_dir_all(&eject_dir).map_err(|e| EjectError::CreateDir {
        path: eject_dir.clone(),
        source: e,
    })?;

    let targets = [
        (ejected_path(project_dir, BuildKind::Deploy), deploy_yaml),
        (ejected_path(project_dir, BuildKind::Delete), delete_yaml),
    ];

    if let Some((existing, _)) = targets.iter().find(|(path, _)| path.exists()) {
        return Err(EjectError::AlreadyEjected(existing.clone()));
    }

    for (path, content) in targets {
        std::fs::write(&path, content).map_err(|e| EjectError::Write { path, source: e })?;
    }

    Ok(())
}

pub fn ejected_path(project_dir: &Path, kind: BuildKind) -> PathBuf {
    project_dir.join(EJECT_DIR).join(kind.file_name())
}

/// Check if the project has an ejected config of this kind.
pub fn is_ejected(project_dir: &Path, kind: BuildKind) -> bool {
    ejected_path(project_dir, kind).exists()
}

/// Load an ejected build config.
pub fn load_ejected(project_dir: &Path, kind: BuildKind) -> Result<String, EjectError> {
    let path = ejected_path(project_dir, kind);
    std::fs::read_to_string(&path).map_err(|e| EjectError::Read { path, source: e })
}

#[derive(Debug, thiserror::Error)]
pub enum EjectError {
    #[error("failed to create .fnstage directory at {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("build config already ejected at {0} — edit directly or delete to re-eject")]
    AlreadyEjected(PathBuf),
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read ejected build config at {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
