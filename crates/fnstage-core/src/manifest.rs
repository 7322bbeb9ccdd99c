//! Per-prefix record of what this checkout has deployed.
//!
//! Each prefix is stored as `.fnstage/manifests/<prefix>.json`. Deploy upserts
//! entries; delete prunes the entries it removed and drops the file once empty.
//! The platform stays authoritative for what is live; the manifest only lets
//! delete reach functions that have since been renamed or removed from
//! fnstage.toml.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::descriptor::{Prefix, ResourceId};
use crate::{Error, Result};

/// Manifest directory, relative to the project root.
pub const MANIFEST_DIR: &str = ".fnstage/manifests";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub prefix: Prefix,
    pub gcp_project_id: Option<String>,
    pub region: String,
    #[serde(default)]
    pub resources: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub resource_id: ResourceId,
    pub local_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Unix seconds of the last successful deploy
    pub deployed_at: u64,
}

impl ManifestEntry {
    pub fn new(resource_id: ResourceId, url: Option<String>) -> Self {
        Self {
            local_name: resource_id.local_name().to_owned(),
            resource_id,
            url,
            deployed_at: unix_now(),
        }
    }
}

impl Manifest {
    pub fn new(prefix: Prefix, gcp_project_id: Option<String>, region: impl Into<String>) -> Self {
        Self {
            prefix,
            gcp_project_id,
            region: region.into(),
            resources: Vec::new(),
        }
    }

    /// Insert or replace the entry for `entry.resource_id`.
    pub fn record(&mut self, entry: ManifestEntry) {
        match self
            .resources
            .iter_mut()
            .find(|e| e.resource_id == entry.resource_id)
        {
            Some(existing) => *existing = entry,
            None => self.resources.push(entry),
        }
    }

    /// Remove the entry for `id`. Returns whether one was present.
    pub fn forget(&mut self, id: &ResourceId) -> bool {
        let before = self.resources.len();
        self.resources.retain(|e| &e.resource_id != id);
        self.resources.len() != before
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.iter().any(|e| &e.resource_id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.resources.iter().map(|e| &e.resource_id)
    }
}

/// File-backed manifest storage, one JSON file per prefix.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<project_dir>/.fnstage/manifests`.
    pub fn in_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join(MANIFEST_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, prefix: &Prefix) -> PathBuf {
        self.dir.join(format!("{prefix}.json"))
    }

    pub fn load(&self, prefix: &Prefix) -> Result<Option<Manifest>> {
        let path = self.path_for(prefix);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::ManifestRead {
            path: path.clone(),
            source: e,
        })?;
        let manifest =
            serde_json::from_str(&content).map_err(|e| Error::ManifestParse { path, source: e })?;
        Ok(Some(manifest))
    }

    /// The stored manifest for `prefix`, or a fresh empty one.
    pub fn load_or_new(
        &self,
        prefix: &Prefix,
        gcp_project_id: Option<String>,
        region: impl Into<String>,
    ) -> Result<Manifest> {
        Ok(match self.load(prefix)? {
            Some(manifest) => manifest,
            None => Manifest::new(prefix.clone(), gcp_project_id, region),
        })
    }

    /// Persist `manifest`. An empty manifest removes the file instead.
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        if manifest.is_empty() {
            self.remove(&manifest.prefix)?;
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| Error::ManifestWrite {
            path: self.dir.clone(),
            source: e,
        })?;

        let content =
            serde_json::to_string_pretty(manifest).map_err(|e| Error::ManifestSerialize {
                prefix: manifest.prefix.to_string(),
                source: e,
            })?;

        let path = self.path_for(&manifest.prefix);
        std::fs::write(&path, content).map_err(|e| Error::ManifestWrite {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(
            path = %path.display(),
            resources = manifest.resources.len(),
            "saved manifest",
        );
        Ok(())
    }

    /// Delete the manifest for `prefix`. Returns whether a file existed.
    pub fn remove(&self, prefix: &Prefix) -> Result<bool> {
        let path = self.path_for(prefix);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| Error::ManifestWrite {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "removed manifest");
        Ok(true)
    }

    /// Prefixes with a stored manifest, sorted.
    ///
    /// Files whose stem is not a valid prefix are ignored.
    pub fn list(&self) -> Result<Vec<Prefix>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|e| Error::ManifestRead {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut prefixes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::ManifestRead {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Prefix::new(stem) {
                Ok(prefix) => prefixes.push(prefix),
                // arch-lint: allow(no-error-swallowing) reason="stray files in the manifest dir are not manifests"
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping file"),
            }
        }

        prefixes.sort();
        Ok(prefixes)
    }
}

fn unix_now() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs(),
        Err(e) => {
            tracing::warn!(error = %e, "system clock is before the unix epoch");
            0
        }
    }
}
