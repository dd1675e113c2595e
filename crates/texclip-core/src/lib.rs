//! texclip-core - Formula markup in, compilable document out
//!
//! Core library for texclip, covering everything that happens before the
//! external toolchain is involved:
//!
//! - [`config`]: the immutable [`RenderConfig`] snapshot loaded from `texclip.toml`
//! - [`estimator`]: glyph-count based font size heuristic
//! - [`script`]: detection of text that needs a script-aware compiler
//! - [`document`]: synthesis of a complete LaTeX document around the formula
//!
//! # Example
//!
//! ```
//! use texclip_core::{estimate_font_size, synthesize, CompilerVariant, RenderConfig};
//!
//! let config = RenderConfig::default();
//! let size = estimate_font_size("x^2+y^2=z^2", &config);
//! let doc = synthesize("x^2+y^2=z^2", size, &config);
//!
//! assert_eq!(doc.compiler, CompilerVariant::Standard);
//! assert!(doc.source.contains(r"\[ x^2+y^2=z^2 \]"));
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod estimator;
pub mod script;

pub use config::{RenderConfig, ToolchainSettings, CONFIG_FILE_NAMES};
pub use document::{synthesize, synthesize_with, CompiledDocument, CompilerVariant, FormulaRequest};
pub use error::{ConfigError, Result};
pub use estimator::{estimate_font_size, visible_glyph_count};
pub use script::{contains_cjk, CjkIdeographs, ScriptPredicate};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
