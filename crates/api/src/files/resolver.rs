//! Managed-root path resolution.
//!
//! Every filename/subfolder pair from a request goes through
//! [`FileGateway::resolve`] before it touches the filesystem. Unsafe
//! inputs fail with [`CoreError::Security`]; paths are never silently
//! clamped. The descendant check compares canonicalized paths
//! component-wise, so a sibling directory sharing a name prefix with a
//! root does not pass.

use std::io;
use std::path::{Component, Path, PathBuf};

use weft_core::error::CoreError;

use crate::config::GatewayConfig;

/// The managed directory roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirKind {
    Input,
    Output,
    Temp,
}

impl DirKind {
    /// Parse a request-supplied kind. Unknown or absent values fall back
    /// to `default` (uploads default to input, viewing to output).
    pub fn parse(value: Option<&str>, default: DirKind) -> DirKind {
        match value {
            Some("input") => DirKind::Input,
            Some("output") => DirKind::Output,
            Some("temp") => DirKind::Temp,
            _ => default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DirKind::Input => "input",
            DirKind::Output => "output",
            DirKind::Temp => "temp",
        }
    }
}

/// Resolves request paths against the managed roots.
pub struct FileGateway {
    input: PathBuf,
    output: PathBuf,
    temp: PathBuf,
}

impl FileGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            input: config.input_dir.clone(),
            output: config.output_dir.clone(),
            temp: config.temp_dir.clone(),
        }
    }

    /// Build a gateway over explicit roots (tests).
    pub fn with_roots(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        temp: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            temp: temp.into(),
        }
    }

    /// Create all managed roots. Called once at startup.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for root in [&self.input, &self.output, &self.temp] {
            tokio::fs::create_dir_all(root).await?;
        }
        Ok(())
    }

    pub fn root(&self, kind: DirKind) -> &Path {
        match kind {
            DirKind::Input => &self.input,
            DirKind::Output => &self.output,
            DirKind::Temp => &self.temp,
        }
    }

    /// Resolve `subfolder`/`filename` under the selected root.
    ///
    /// Rejects absolute filenames, any parent-directory segment, and any
    /// subfolder whose canonical form escapes the root. The returned
    /// path may or may not exist; callers decide whether that is a 404.
    pub fn resolve(
        &self,
        kind: DirKind,
        subfolder: Option<&str>,
        filename: &str,
    ) -> Result<PathBuf, CoreError> {
        if filename.is_empty() {
            return Err(CoreError::Security("empty filename".into()));
        }

        let name = Path::new(filename);
        if name.is_absolute() || filename.starts_with('/') || filename.starts_with('\\') {
            return Err(CoreError::Security(format!(
                "absolute filename not allowed: {filename}"
            )));
        }
        if has_parent_segment(name) {
            return Err(CoreError::Security(format!(
                "parent traversal in filename: {filename}"
            )));
        }
        let base = name
            .file_name()
            .ok_or_else(|| CoreError::Security(format!("no filename in: {filename}")))?;

        let root = canonical_root(self.root(kind));
        let mut dir = root.clone();

        if let Some(sub) = subfolder.filter(|s| !s.is_empty()) {
            let sub_path = Path::new(sub);
            if sub_path.is_absolute() {
                return Err(CoreError::Security(format!(
                    "absolute subfolder not allowed: {sub}"
                )));
            }
            for component in sub_path.components() {
                match component {
                    Component::Normal(part) => dir.push(part),
                    Component::CurDir => {}
                    _ => {
                        return Err(CoreError::Security(format!(
                            "parent traversal in subfolder: {sub}"
                        )));
                    }
                }
            }

            // When the subfolder already exists, re-check its canonical
            // form: a symlink inside the root must not escape it.
            if let Ok(canonical) = dir.canonicalize() {
                if !canonical.starts_with(&root) {
                    return Err(CoreError::Security(format!(
                        "subfolder escapes the {} root: {sub}",
                        kind.as_str()
                    )));
                }
                dir = canonical;
            }
        }

        Ok(dir.join(base))
    }
}

fn has_parent_segment(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Canonicalize a root, falling back to the absolute lexical form when
/// the directory does not exist yet.
fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize()
        .unwrap_or_else(|_| std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf()))
}
