//! Render-and-replace orchestration
//!
//! One trigger captures the selected text, renders it, and swaps the
//! rendered image into the clipboard. Any failure puts the original text
//! back so the user's clipboard is left as it was found.
//!
//! Only one trigger runs at a time. [`BusyFlag`] is acquired for the whole
//! call and released by [`BusyGuard`] on every exit path; a trigger that
//! finds the flag held returns [`ReplaceOutcome::Busy`] without starting
//! any work. Each hotkey press is its own `texclip replace` process, so the
//! flag can also hold an exclusive lock on a shared lock file.

use std::env;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use texclip_core::FormulaRequest;
use texclip_render::{RenderError, RenderPipeline};
use thiserror::Error;
use tracing::{info, warn};

use crate::clipboard::ClipboardError;

/// Where the formula text comes from
pub trait SelectionSource: Send + Sync {
    /// Current selection; may be empty
    fn selected_text(&self) -> Result<String, ClipboardError>;
}

/// Where the rendered image (or the restored text) goes
pub trait ClipboardSink: Send + Sync {
    /// Replace the clipboard content with a PNG image
    fn write_image(&self, png: &[u8]) -> Result<(), ClipboardError>;

    /// Replace the clipboard content with text
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Paste the clipboard into the focused window
    fn paste(&self) -> Result<(), ClipboardError> {
        Ok(())
    }
}

/// Why a replacement did not happen
#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("No formula text in the selection")]
    EmptyInput,

    #[error("Failed to read the selection: {0}")]
    Capture(#[source] ClipboardError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to update the clipboard: {0}")]
    Clipboard(#[source] ClipboardError),

    #[error("Render panicked: {0}")]
    Panicked(String),
}

/// Result of one trigger
#[derive(Debug)]
pub enum ReplaceOutcome {
    /// The clipboard now holds the rendered image
    Replaced { width: u32, height: u32 },
    /// Another trigger is still running
    Busy,
    /// The selection was empty or whitespace
    Empty,
    /// The selection could not be read; nothing was changed
    Aborted { error: ReplaceError },
    /// Rendering failed and the original text was written back
    Restored { error: ReplaceError },
    /// Rendering failed and writing the original text back failed too
    RestoreFailed {
        error: ReplaceError,
        restore_error: ClipboardError,
    },
}

impl ReplaceOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Name of the lock file shared by `texclip replace` processes
pub const LOCK_FILE_NAME: &str = "texclip-replace.lock";

/// Lock file in `$XDG_RUNTIME_DIR`, or the temp dir when that is unset
pub fn default_lock_path() -> PathBuf {
    env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(env::temp_dir)
        .join(LOCK_FILE_NAME)
}

/// Single-occupancy flag for the render-and-replace operation
///
/// The in-process flag always applies. With a lock file, flags in other
/// processes using the same path are excluded too.
#[derive(Debug, Default)]
pub struct BusyFlag {
    held: AtomicBool,
    lock_file: Option<PathBuf>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also take an exclusive lock on `path` while held
    pub fn with_lock_file(path: impl Into<PathBuf>) -> Self {
        Self {
            held: AtomicBool::new(false),
            lock_file: Some(path.into()),
        }
    }

    pub fn lock_file(&self) -> Option<&Path> {
        self.lock_file.as_deref()
    }

    /// Take the flag, or `None` when it is already held here or elsewhere
    ///
    /// A lock file that cannot be opened only degrades the flag to this
    /// process; it never blocks the trigger.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;

        let lock = match &self.lock_file {
            None => None,
            Some(path) => match lock_exclusive(path) {
                Ok(Some(file)) => Some(file),
                Ok(None) => {
                    self.held.store(false, Ordering::Release);
                    return None;
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Cannot lock busy file, guarding this process only"
                    );
                    None
                }
            },
        };

        Some(BusyGuard {
            held: &self.held,
            lock,
        })
    }

    /// Whether this flag is held in this process
    pub fn is_busy(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Open `path` and lock it; `None` when another holder has it
fn lock_exclusive(path: &Path) -> io::Result<Option<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;

    match file.try_lock() {
        Ok(()) => Ok(Some(file)),
        Err(TryLockError::WouldBlock) => Ok(None),
        Err(TryLockError::Error(err)) => Err(err),
    }
}

/// Clears the [`BusyFlag`] and releases its file lock when dropped
#[derive(Debug)]
pub struct BusyGuard<'a> {
    held: &'a AtomicBool,
    lock: Option<File>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Some(file) = self.lock.take() {
            // Closing the file releases the lock as well
            let _ = file.unlock();
        }
        self.held.store(false, Ordering::Release);
    }
}

/// Runs render-and-replace against a pipeline
pub struct Replacer {
    pipeline: RenderPipeline,
    busy: BusyFlag,
    paste: bool,
}

impl Replacer {
    pub fn new(pipeline: RenderPipeline) -> Self {
        Self {
            pipeline,
            busy: BusyFlag::new(),
            paste: false,
        }
    }

    /// Also paste into the focused window after a successful swap, and
    /// paste the restored text back after a failure
    pub fn with_paste(mut self, paste: bool) -> Self {
        self.paste = paste;
        self
    }

    /// Share the busy state with other processes through `path`
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.busy = BusyFlag::with_lock_file(path);
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Capture, render and replace; never returns an error
    pub fn trigger(&self, source: &dyn SelectionSource, sink: &dyn ClipboardSink) -> ReplaceOutcome {
        let Some(_guard) = self.busy.try_acquire() else {
            info!("Render already in progress, trigger ignored (busy)");
            return ReplaceOutcome::Busy;
        };

        let text = match source.selected_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Failed to capture selection");
                return ReplaceOutcome::Aborted {
                    error: ReplaceError::Capture(err),
                };
            }
        };

        if text.trim().is_empty() {
            warn!("{}", ReplaceError::EmptyInput);
            return ReplaceOutcome::Empty;
        }

        match self.replace(&text, sink) {
            Ok((width, height)) => {
                info!(width, height, pasted = self.paste, "Clipboard replaced with rendered formula");
                ReplaceOutcome::Replaced { width, height }
            }
            Err(error) => {
                warn!(error = %error, "Render failed, restoring original text");
                match self.restore(&text, sink) {
                    Ok(()) => ReplaceOutcome::Restored { error },
                    Err(restore_error) => {
                        warn!(error = %restore_error, "Failed to restore original text");
                        ReplaceOutcome::RestoreFailed {
                            error,
                            restore_error,
                        }
                    }
                }
            }
        }
    }

    fn restore(&self, text: &str, sink: &dyn ClipboardSink) -> Result<(), ClipboardError> {
        sink.write_text(text)?;
        if self.paste {
            sink.paste()?;
        }
        Ok(())
    }

    fn replace(&self, text: &str, sink: &dyn ClipboardSink) -> Result<(u32, u32), ReplaceError> {
        let request = FormulaRequest::new(text);
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline.render_formula(&request)))
            .map_err(|payload| ReplaceError::Panicked(panic_message(payload.as_ref())))?;
        let artifact = rendered?;

        sink.write_image(&artifact.png)
            .map_err(ReplaceError::Clipboard)?;
        if self.paste {
            sink.paste().map_err(ReplaceError::Clipboard)?;
        }
        Ok((artifact.width, artifact.height))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
