//! Maps request paths onto files inside the document root.
//!
//! Paths are normalized lexically before the filesystem is touched, so a
//! `..` that would climb above the root is rejected no matter what exists
//! on disk. After that, symlinks are resolved and the result is checked
//! against the canonical root again unless `follow_symlinks` is set.

use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use percent_encoding::percent_decode_str;

use crate::config::StaticFilesConfig;
use crate::http::mime;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("not found")]
    NotFound,
    #[error("path escapes the document root")]
    OutsideRoot,
    #[error("read failure: {0}")]
    ReadFailure(#[source] io::Error),
}

/// A file that passed every check and may be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub path: PathBuf,
    pub mime: &'static str,
    pub len: u64,
}

/// Read-only view of the document root, shared by all workers.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_file: String,
    follow_symlinks: bool,
}

impl StaticFiles {
    /// Canonicalizes and checks the root. Failing here is a startup error.
    pub fn new(cfg: &StaticFilesConfig) -> anyhow::Result<Self> {
        let root = std::fs::canonicalize(&cfg.root_directory).with_context(|| {
            format!(
                "document root {} is not accessible",
                cfg.root_directory.display()
            )
        })?;

        if !root.is_dir() {
            anyhow::bail!("document root {} is not a directory", root.display());
        }

        Ok(Self {
            root,
            index_file: cfg.index_file.clone(),
            follow_symlinks: cfg.follow_symlinks,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn resolve(&self, raw_path: &str) -> Result<ResolvedResource, ResolveError> {
        let relative = normalize(raw_path)?;

        let mut target = if relative.as_os_str().is_empty() {
            self.root.join(&self.index_file)
        } else {
            self.root.join(&relative)
        };

        let mut meta = tokio::fs::metadata(&target).await.map_err(classify)?;
        if meta.is_dir() {
            target.push(&self.index_file);
            meta = tokio::fs::metadata(&target).await.map_err(classify)?;
        }

        // Directories, sockets, fifos: nothing we can serve
        if !meta.is_file() {
            return Err(ResolveError::NotFound);
        }

        if !self.follow_symlinks {
            let canonical = tokio::fs::canonicalize(&target).await.map_err(classify)?;
            if !canonical.starts_with(&self.root) {
                return Err(ResolveError::OutsideRoot);
            }
        }

        tokio::fs::File::open(&target)
            .await
            .map_err(ResolveError::ReadFailure)?;

        let mime = mime::from_path(&target);
        Ok(ResolvedResource {
            path: target,
            mime,
            len: meta.len(),
        })
    }

    pub async fn read(&self, resource: &ResolvedResource) -> Result<Vec<u8>, ResolveError> {
        tokio::fs::read(&resource.path)
            .await
            .map_err(ResolveError::ReadFailure)
    }
}

/// Lexically normalizes a raw request target into a root-relative path.
///
/// Query and fragment are dropped, percent escapes decoded, and both `/`
/// and `\` act as separators. An empty result means "the index document".
///
/// # Example
///
/// ```
/// # use palisade::static_files::normalize;
/// # use std::path::PathBuf;
/// assert_eq!(normalize("/a/./b/../c.txt?v=1").unwrap(), PathBuf::from("a/c.txt"));
/// assert!(normalize("/../etc/passwd").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<PathBuf, ResolveError> {
    if raw.contains('\0') {
        return Err(ResolveError::OutsideRoot);
    }

    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| ResolveError::NotFound)?;

    if decoded.contains('\0') {
        return Err(ResolveError::OutsideRoot);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ResolveError::OutsideRoot);
                }
            }
            s => {
                // Drive prefixes and the like must not survive a join
                let mut components = Path::new(s).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => segments.push(s),
                    _ => return Err(ResolveError::OutsideRoot),
                }
            }
        }
    }

    Ok(segments.into_iter().collect())
}

fn classify(err: io::Error) -> ResolveError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => ResolveError::NotFound,
        _ => ResolveError::ReadFailure(err),
    }
}
