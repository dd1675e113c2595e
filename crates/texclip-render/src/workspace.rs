//! Per-render scratch directory
//!
//! Holds the document source and everything the compiler writes next to it.
//! The directory is deleted when the [`Workspace`] is dropped, on success and
//! failure alike.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{RenderError, Result};

/// Fixed job name; the compiler derives `formula.pdf`, `formula.log`, ... from it
pub const JOB_NAME: &str = "formula";

const DIR_PREFIX: &str = "texclip-";

/// Scoped temporary directory for one render
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under the system temp directory
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir()
            .map_err(|e| RenderError::Workspace(format!("failed to create temp dir: {e}")))?;
        Self::from_dir(dir)
    }

    /// Create a fresh workspace under `parent`
    pub fn create_in(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| {
                RenderError::Workspace(format!(
                    "failed to create temp dir in {}: {e}",
                    parent.display()
                ))
            })?;
        Self::from_dir(dir)
    }

    /// Validate the directory once, here, so argument vectors can use it verbatim
    fn from_dir(dir: TempDir) -> Result<Self> {
        let path = dir.path();
        if !path.is_absolute() {
            return Err(RenderError::Workspace(format!(
                "workspace path is not absolute: {}",
                path.display()
            )));
        }
        // TeX reads file names as text; reject paths it would mangle
        if path.to_str().is_none() {
            return Err(RenderError::Workspace(format!(
                "workspace path is not valid UTF-8: {}",
                path.display()
            )));
        }
        Ok(Self { dir })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the document source file
    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join(format!("{JOB_NAME}.tex"))
    }

    /// Path the compiler writes the PDF to
    pub fn pdf_path(&self) -> PathBuf {
        self.dir.path().join(format!("{JOB_NAME}.pdf"))
    }

    /// Write the document source into the workspace
    pub fn write_source(&self, source: &str) -> Result<PathBuf> {
        let path = self.source_path();
        fs::write(&path, source).map_err(|e| {
            RenderError::Workspace(format!("failed to write {}: {e}", path.display()))
        })?;
        Ok(path)
    }
}
