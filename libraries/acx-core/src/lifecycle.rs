//! Temporary artifact lifecycle
//!
//! Every job gets its own directory `<temp_root>/acx-<uuid>/`, so concurrent
//! jobs never share a path even when uploads have the same name. Inside it,
//! each file is held by a [`TempArtifact`] guard that deletes the file when
//! dropped unless it was handed on. Removal failures are logged and never
//! replace the job's real outcome.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// What a temporary file is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    Input,
    Intermediate,
    Final,
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Final => write!(f, "final"),
        }
    }
}

/// Per-job directory, removed with everything in it when dropped
#[derive(Debug)]
pub struct JobWorkspace {
    id: JobId,
    dir: PathBuf,
    removed: bool,
}

impl JobWorkspace {
    /// Create a fresh, uniquely named directory under `temp_root`
    pub async fn create(temp_root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(temp_root).await?;

        let id = JobId::generate();
        let dir = temp_root.join(format!("acx-{}", id));
        // create_dir (not _all) so an existing directory is an error, never shared
        tokio::fs::create_dir(&dir).await?;

        tracing::debug!("Created workspace {}", dir.display());
        Ok(Self {
            id,
            dir,
            removed: false,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Guard for a file inside the workspace. Nothing is created on disk.
    pub fn artifact(&self, role: ArtifactRole, file_name: &str) -> TempArtifact {
        TempArtifact::new(self.dir.join(file_name), role)
    }

    /// Remove the directory now instead of on drop
    pub async fn close(mut self) {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => tracing::debug!("Removed workspace {}", self.dir.display()),
            Err(e) => log_cleanup_failure("workspace", &self.dir, &e),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            log_cleanup_failure("workspace", &self.dir, &e);
        }
    }
}

/// Guard owning one temporary file
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    role: ArtifactRole,
    armed: bool,
}

impl TempArtifact {
    pub fn new(path: PathBuf, role: ArtifactRole) -> Self {
        Self {
            path,
            role,
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> ArtifactRole {
        self.role
    }

    /// Size on disk, `None` if the file does not exist
    pub async fn size(&self) -> io::Result<Option<u64>> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete the file now
    pub async fn discard(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!("Deleted {} artifact {}", self.role, self.path.display()),
            Err(e) => log_cleanup_failure(&self.role.to_string(), &self.path, &e),
        }
    }

    /// Rename the file to `dest` and hand back a guard for it under `role`
    ///
    /// If the rename fails the original file is still deleted when `self` drops.
    pub async fn promote(mut self, dest: PathBuf, role: ArtifactRole) -> io::Result<TempArtifact> {
        tokio::fs::rename(&self.path, &dest).await?;
        self.armed = false;
        tracing::debug!("Promoted {} artifact to {}", self.role, dest.display());
        Ok(TempArtifact::new(dest, role))
    }

    /// Move the file out of temporary storage for good
    ///
    /// Falls back to copy-then-delete when `dest` is on another filesystem.
    /// An existing file at `dest` is replaced, with a warning.
    pub async fn persist(mut self, dest: &Path) -> io::Result<PathBuf> {
        if tokio::fs::metadata(dest).await.is_ok() {
            tracing::warn!("Replacing existing {}", dest.display());
        }
        if tokio::fs::rename(&self.path, dest).await.is_err() {
            tokio::fs::copy(&self.path, dest).await?;
            if let Err(e) = tokio::fs::remove_file(&self.path).await {
                log_cleanup_failure(&self.role.to_string(), &self.path, &e);
            }
        }
        self.armed = false;
        Ok(dest.to_path_buf())
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Deleted {} artifact {}", self.role, self.path.display()),
            Err(e) => log_cleanup_failure(&self.role.to_string(), &self.path, &e),
        }
    }
}

fn log_cleanup_failure(what: &str, path: &Path, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        tracing::debug!("Cleanup of {} {}: already gone", what, path.display());
    } else {
        tracing::warn!("Failed to clean up {} {}: {}", what, path.display(), err);
    }
}
