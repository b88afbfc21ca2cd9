//! Per-job scratch directories
//!
//! Every job gets a fresh directory `{base_name}_{suffix}` under the configured root, where
//! `suffix` is 6 random lowercase alphanumerics. Collisions are not retried: a directory
//! that already exists fails the allocation with [`WorkspaceError::AlreadyExists`].

use crate::error::{Error, Result, WorkspaceError};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Length of the random directory suffix
pub const SUFFIX_LEN: usize = 6;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Allocates and removes job directories under a fixed root
#[derive(Clone, Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create a manager rooted at `root` (created lazily on first allocation)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root under which job directories are created
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named directory for a job
    pub async fn allocate(&self, base_name: &str) -> Result<PathBuf> {
        let name = format!("{}_{}", sanitize_base_name(base_name), random_suffix());
        self.allocate_named(&name).await
    }

    /// Create the job directory `name` under the root
    pub(crate) async fn allocate_named(&self, name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::Workspace(WorkspaceError::CreateFailed {
                path: self.root.clone(),
                reason: e.to_string(),
            })
        })?;

        let path = self.root.join(name);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => {
                debug!(?path, "allocated workspace");
                Ok(path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::Workspace(WorkspaceError::AlreadyExists { path }))
            }
            Err(e) => Err(Error::Workspace(WorkspaceError::CreateFailed {
                path,
                reason: e.to_string(),
            })),
        }
    }

    /// Recursively remove a job directory
    ///
    /// Safe to call on a directory that is partially or entirely gone already.
    pub async fn release(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(?path, "released workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "workspace already removed");
                Ok(())
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to release workspace");
                Err(Error::Io(e))
            }
        }
    }
}

/// Generate a random directory suffix of [`SUFFIX_LEN`] lowercase alphanumerics
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

/// Make a collection or item name safe to use as a single path component
///
/// Path separators and other reserved characters become `_`; an empty or dot-only name
/// becomes `sticker`.
pub fn sanitize_base_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "sticker".to_string()
    } else {
        cleaned
    }
}
