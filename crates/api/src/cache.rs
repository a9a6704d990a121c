//! Content-addressed artifact cache.
//!
//! Maps a job payload's digest to a previously produced artifact. An
//! entry is a symbolic link named by the hex digest, pointing at the
//! artifact in its managed directory: a reference, not a copy. The
//! index is the filesystem itself: lookup is an existence check that
//! follows the link, so an artifact deleted externally reads as a miss
//! rather than a stale reference.
//!
//! Commits land at a unique temporary name and are renamed over the
//! final path, so two identical concurrent submissions converge on one
//! entry without locking (content per digest is identical by
//! definition; last writer wins).

use std::io;
use std::path::{Path, PathBuf};

/// Filesystem-backed digest → artifact index.
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory cache entries live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `digest` has the shape of a cache key (64 hex chars).
    /// Anything else can never name an entry; in
    /// particular, path metacharacters never reach the filesystem.
    pub fn is_valid_digest(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    fn entry_path(&self, digest: &str) -> PathBuf {
        self.dir.join(digest)
    }

    /// Resolve a digest to its artifact path, if the entry exists and
    /// its artifact is still present.
    pub async fn lookup(&self, digest: &str) -> Option<PathBuf> {
        if !Self::is_valid_digest(digest) {
            return None;
        }
        let path = self.entry_path(digest);
        // metadata follows symlinks: a dangling entry is a miss.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Record `artifact` as the result for `digest`.
    ///
    /// Never fails because an entry already exists: the link is created
    /// at a temporary name and atomically renamed into place, so racing
    /// commits for the same digest simply overwrite each other.
    pub async fn commit(&self, digest: &str, artifact: &Path) -> io::Result<PathBuf> {
        if !Self::is_valid_digest(digest) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a content digest: {digest}"),
            ));
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        // Link to the canonical artifact path so the entry resolves from
        // anywhere.
        let target = tokio::fs::canonicalize(artifact).await?;
        let staging = self
            .dir
            .join(format!(".{digest}.{}", uuid::Uuid::new_v4().simple()));

        link_artifact(&target, &staging).await?;

        let path = self.entry_path(digest);
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }

        tracing::debug!(digest, artifact = %target.display(), "Cache entry committed");
        Ok(path)
    }
}

#[cfg(unix)]
async fn link_artifact(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(not(unix))]
async fn link_artifact(target: &Path, link: &Path) -> io::Result<()> {
    // No symlinks without elevated rights; fall back to a hard copy.
    tokio::fs::copy(target, link).await.map(|_| ())
}
