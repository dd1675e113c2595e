//! Clipboard access and selection capture
//!
//! [`DesktopClipboard`] grabs the selected text of the focused window the
//! way a user would: it sends Ctrl+C, and when nothing arrives it falls back
//! to Ctrl+A then Ctrl+X. The clipboard content from before the capture is
//! put back afterwards.
//!
//! [`SystemClipboard`] is the backend for Linux desktops. Each operation
//! tries a list of helper tools in order and moves on when a tool is not
//! installed: X11 (`xclip`, `xsel`) first, then Wayland (`wl-clipboard`).
//! Keystrokes are synthesized with `xdotool`.

use std::fmt;
use std::io::{self, ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::replace::{ClipboardSink, SelectionSource};

/// Errors raised by clipboard collaborators
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// None of the candidate tools is installed
    #[error("No clipboard tool available (tried {0})")]
    Unavailable(String),

    /// A tool ran but reported failure
    #[error("Clipboard tool `{tool}` failed: {message}")]
    Tool { tool: String, message: String },

    /// The clipboard holds something that is not UTF-8 text
    #[error("Clipboard content is not valid UTF-8 text")]
    NotText,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A command line for one clipboard tool
#[derive(Debug, Clone, Copy)]
struct Tool {
    program: &'static str,
    args: &'static [&'static str],
}

const READ_TEXT: &[Tool] = &[
    Tool {
        program: "xclip",
        args: &["-selection", "clipboard", "-o"],
    },
    Tool {
        program: "xsel",
        args: &["--clipboard", "--output"],
    },
    Tool {
        program: "wl-paste",
        args: &["--no-newline"],
    },
];

const WRITE_TEXT: &[Tool] = &[
    Tool {
        program: "xclip",
        args: &["-selection", "clipboard"],
    },
    Tool {
        program: "xsel",
        args: &["--clipboard", "--input"],
    },
    Tool {
        program: "wl-copy",
        args: &[],
    },
];

const WRITE_PNG: &[Tool] = &[
    Tool {
        program: "xclip",
        args: &["-selection", "clipboard", "-t", "image/png"],
    },
    Tool {
        program: "wl-copy",
        args: &["--type", "image/png"],
    },
];

/// Keyboard shortcut sent to the focused window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Copy,
    SelectAll,
    Cut,
    Paste,
}

impl Shortcut {
    /// Key chord in `xdotool` syntax
    pub fn chord(self) -> &'static str {
        match self {
            Self::Copy => "ctrl+c",
            Self::SelectAll => "ctrl+a",
            Self::Cut => "ctrl+x",
            Self::Paste => "ctrl+v",
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.chord())
    }
}

/// Raw clipboard and keyboard operations of a desktop session
pub trait ClipboardBackend: Send + Sync {
    /// Current clipboard text
    fn read_text(&self) -> Result<String, ClipboardError>;

    /// Replace the clipboard content with text
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Replace the clipboard content with a PNG image
    fn write_png(&self, png: &[u8]) -> Result<(), ClipboardError>;

    /// Send a shortcut to the focused window
    fn press(&self, shortcut: Shortcut) -> Result<(), ClipboardError>;
}

/// Pause after a keystroke or clipboard write before reading the result
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(150);

/// Selection capture and clipboard replacement on top of a backend
#[derive(Debug)]
pub struct DesktopClipboard<B> {
    backend: B,
    settle: Duration,
}

impl<B: ClipboardBackend> DesktopClipboard<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Override the settle pause (zero in tests)
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Clear the clipboard, send `keys`, and read what they produced
    fn grab(&self, keys: &[Shortcut]) -> Result<String, ClipboardError> {
        self.backend.write_text("")?;
        self.pause();
        for &key in keys {
            self.backend.press(key)?;
            self.pause();
        }
        // An empty clipboard is reported as an error by some tools
        Ok(self.backend.read_text().unwrap_or_default())
    }

    fn restore(&self, saved: &str) {
        if let Err(err) = self.backend.write_text(saved) {
            warn!(error = %err, "Failed to restore clipboard after capture");
        }
    }

    fn pause(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}

impl<B: ClipboardBackend> SelectionSource for DesktopClipboard<B> {
    fn selected_text(&self) -> Result<String, ClipboardError> {
        let saved = self.backend.read_text().unwrap_or_default();

        let copied = match self.grab(&[Shortcut::Copy]) {
            Ok(copied) => copied,
            Err(err) => {
                self.restore(&saved);
                return Err(err);
            }
        };
        if !copied.is_empty() && copied != saved {
            self.restore(&saved);
            return Ok(copied);
        }

        info!("Copy captured no selection, falling back to select-all and cut");
        let result = self.grab(&[Shortcut::SelectAll, Shortcut::Cut]);
        self.restore(&saved);
        result
    }
}

impl<B: ClipboardBackend> ClipboardSink for DesktopClipboard<B> {
    fn write_image(&self, png: &[u8]) -> Result<(), ClipboardError> {
        self.backend.write_png(png)
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.backend.write_text(text)
    }

    fn paste(&self) -> Result<(), ClipboardError> {
        // Let the clipboard owner settle before the target asks for data
        self.pause();
        self.backend.press(Shortcut::Paste)
    }
}

/// Clipboard backed by whichever helper tools are installed
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardBackend for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let bytes = first_available(READ_TEXT, capture)?;
        String::from_utf8(bytes).map_err(|_| ClipboardError::NotText)
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        first_available(WRITE_TEXT, |tool| feed(tool, text.as_bytes()))
    }

    fn write_png(&self, png: &[u8]) -> Result<(), ClipboardError> {
        first_available(WRITE_PNG, |tool| feed(tool, png))
    }

    fn press(&self, shortcut: Shortcut) -> Result<(), ClipboardError> {
        let tool = Tool {
            program: "xdotool",
            args: &["key", "--clearmodifiers"],
        };
        debug!(keys = %shortcut, "Sending shortcut");
        first_available(&[tool], |tool| {
            capture_with(tool, &[shortcut.chord()]).map(|_| ())
        })
    }
}

/// Run `op` with each tool until one is installed
fn first_available<T>(
    tools: &[Tool],
    mut op: impl FnMut(&Tool) -> Result<T, ClipboardError>,
) -> Result<T, ClipboardError> {
    for tool in tools {
        match op(tool) {
            Err(ClipboardError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(tool = tool.program, "Clipboard tool not installed");
            }
            result => return result,
        }
    }
    let tried: Vec<&str> = tools.iter().map(|t| t.program).collect();
    Err(ClipboardError::Unavailable(tried.join(", ")))
}

/// Run a tool and return its stdout
fn capture(tool: &Tool) -> Result<Vec<u8>, ClipboardError> {
    capture_with(tool, &[])
}

fn capture_with(tool: &Tool, extra: &[&str]) -> Result<Vec<u8>, ClipboardError> {
    let output = Command::new(tool.program)
        .args(tool.args)
        .args(extra)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(ClipboardError::Tool {
            tool: tool.program.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a tool with `input` on stdin
///
/// Output streams are discarded: `xclip` keeps running in the background
/// to serve the selection and would hold a pipe open.
fn feed(tool: &Tool, input: &[u8]) -> Result<(), ClipboardError> {
    let mut child = Command::new(tool.program)
        .args(tool.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input)?;
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(ClipboardError::Tool {
            tool: tool.program.to_string(),
            message: format!("exited with {status}"),
        })
    }
}
