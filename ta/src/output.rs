//! Persisting execution artifacts
//!
//! Each successful execution gets its own directory under the configured
//! output directory: `<output_dir>/<item-slug>-<YYYYmmdd-HHMMSS>/`. Bundle
//! files are written relative to it, plus a `SUMMARY.md`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{ArtifactBundle, WorkItem};

/// Maximum slug length taken from an item name
const SLUG_MAX: usize = 40;

/// Errors from an output sink
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Refusing to write outside the output directory: {0}")]
    UnsafePath(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for artifact bundles
pub trait OutputSink: Send + Sync {
    /// Persist a bundle for `item` under `dir`, returning where it landed
    fn persist(&self, bundle: &ArtifactBundle, item: &WorkItem, dir: &Path) -> Result<PathBuf, OutputError>;
}

/// Writes bundles to timestamped directories on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryOutput;

impl DirectoryOutput {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for DirectoryOutput {
    fn persist(&self, bundle: &ArtifactBundle, item: &WorkItem, dir: &Path) -> Result<PathBuf, OutputError> {
        debug!(item = %item.id, dir = %dir.display(), files = bundle.files.len(), "DirectoryOutput::persist: called");

        // Validate every path before touching the disk
        let mut targets = Vec::with_capacity(bundle.files.len());
        for file in &bundle.files {
            targets.push(safe_relative(&file.path)?);
        }

        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let root = dir.join(format!("{}-{}", slugify(&item.name), stamp));
        create_dir(&root)?;

        for (file, relative) in bundle.files.iter().zip(targets) {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                create_dir(parent)?;
            }
            write_file(&path, &file.content)?;
        }

        write_file(&root.join("SUMMARY.md"), &summary_markdown(bundle, item))?;

        info!("Saved {} file(s) to {}", bundle.files.len(), root.display());
        Ok(root)
    }
}

fn create_dir(path: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), OutputError> {
    fs::write(path, content).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Accept only plain relative paths without `..`
fn safe_relative(path: &str) -> Result<PathBuf, OutputError> {
    let candidate = Path::new(path);
    let clean = !path.trim().is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if clean {
        Ok(candidate.to_path_buf())
    } else {
        debug!(%path, "safe_relative: rejected");
        Err(OutputError::UnsafePath(path.to_string()))
    }
}

/// Lowercase, hyphen separated, ASCII alphanumeric slug
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
            if slug.len() >= SLUG_MAX {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() { "task".to_string() } else { slug }
}

fn summary_markdown(bundle: &ArtifactBundle, item: &WorkItem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", item.name);
    let _ = writeln!(out, "**Task ID:** {}", item.id);
    let _ = writeln!(out, "**Output type:** {}\n", bundle.output_type);
    let _ = writeln!(out, "## Summary\n\n{}\n", bundle.summary);
    let _ = writeln!(out, "## Files\n");
    for file in &bundle.files {
        if file.description.is_empty() {
            let _ = writeln!(out, "- `{}`", file.path);
        } else {
            let _ = writeln!(out, "- `{}`: {}", file.path, file.description);
        }
    }
    if !bundle.notes.is_empty() {
        let _ = writeln!(out, "\n## Notes\n\n{}", bundle.notes);
    }
    out
}

/// Short human readable preview of a bundle
pub fn preview(bundle: &ArtifactBundle) -> String {
    let mut out = String::new();
    if !bundle.summary.is_empty() {
        let _ = writeln!(out, "📝 {}", bundle.summary);
    }
    let _ = writeln!(out, "📄 {} file(s):", bundle.files.len());
    for file in &bundle.files {
        if file.description.is_empty() {
            let _ = writeln!(out, "   • {}", file.path);
        } else {
            let _ = writeln!(out, "   • {}: {}", file.path, file.description);
        }
    }
    if !bundle.notes.is_empty() {
        let _ = writeln!(out, "💡 {}", bundle.notes);
    }
    out
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    /// Output sink that records what it was asked to persist
    #[derive(Default)]
    pub struct RecordingOutput {
        pub persisted: Mutex<Vec<(String, usize)>>,
        pub fail: bool,
    }

    impl RecordingOutput {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    impl OutputSink for RecordingOutput {
        fn persist(&self, bundle: &ArtifactBundle, item: &WorkItem, dir: &Path) -> Result<PathBuf, OutputError> {
            if self.fail {
                return Err(OutputError::Io {
                    path: dir.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            self.persisted.lock().unwrap().push((item.id.clone(), bundle.files.len()));
            Ok(dir.join(slugify(&item.name)))
        }
    }
}
