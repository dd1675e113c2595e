//! texclip CLI - Command-line interface library
//!
//! This library provides the CLI functionality for texclip, including:
//! - Render: formula text to a padded PNG
//! - Document / Estimate: inspect what would be compiled
//! - Replace: swap the selected formula for its rendered image
//!
//! # Library Usage
//!
//! ```ignore
//! use texclip_cli::{default_lock_path, DesktopClipboard, Replacer, SystemClipboard};
//! use texclip_render::RenderPipeline;
//!
//! let replacer = Replacer::new(RenderPipeline::new(&config)).with_lock_file(default_lock_path());
//! let clipboard = DesktopClipboard::new(SystemClipboard::new());
//! let outcome = replacer.trigger(&clipboard, &clipboard);
//! ```
//!
//! # Binary Usage
//!
//! ```bash
//! # Render a formula to a file
//! texclip render 'x^2+y^2=z^2' --output formula.png
//!
//! # Hotkey action: replace the clipboard text with its image and paste it
//! texclip replace --paste
//! ```

pub mod app;
pub mod clipboard;
pub mod replace;

// Re-export main entry point and types
pub use app::{
    config_command, document_command, estimate_command, render_command, replace_command,
};
pub use app::{init_logging, load_config, run_cli, RenderSummary};
pub use clipboard::{ClipboardBackend, ClipboardError, DesktopClipboard, Shortcut, SystemClipboard};
pub use replace::{
    default_lock_path, BusyFlag, BusyGuard, ClipboardSink, ReplaceError, ReplaceOutcome, Replacer,
    SelectionSource, LOCK_FILE_NAME,
};
