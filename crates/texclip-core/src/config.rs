//! Render configuration
//!
//! A single immutable snapshot read once at startup and passed by reference
//! into the estimator, the synthesizer and the render pipeline.
//!
//! # Configuration File
//!
//! ```toml
//! default_font_size = 12
//! min_font_size = 8
//! max_font_size = 72
//! image_resolution = 4800
//! image_padding = 20
//! use_standalone_class = true
//! enable_script_support = true
//! script_font_name = "SimSun"
//! antialiasing_level = 16
//! use_math_fonts = true
//!
//! [toolchain]
//! standard_compiler = "pdflatex"
//! script_compiler = "xelatex"
//! compiler_timeout_secs = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::CompilerVariant;
use crate::error::{ConfigError, Result};

/// File names looked up in the working directory when no `--config` is given
pub const CONFIG_FILE_NAMES: &[&str] = &["texclip.toml", ".texclip.toml"];

/// Page description reference resolution (points per inch)
const REFERENCE_DPI: f32 = 72.0;

/// Highest antialiasing level accepted
const MAX_ANTIALIASING: u8 = 16;

/// Top-level render configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Font size (pt) used for formulas of medium length
    pub default_font_size: u32,
    /// Lower clamp for the estimated font size
    pub min_font_size: u32,
    /// Upper clamp for the estimated font size
    pub max_font_size: u32,
    /// Rasterization resolution in DPI
    pub image_resolution: u32,
    /// White border added on every side of the image, in pixels
    pub image_padding: u32,
    /// Use the auto-fitting `standalone` class instead of `article`
    pub use_standalone_class: bool,
    /// Load `ctex` and the script-aware compiler for CJK formulas
    pub enable_script_support: bool,
    /// Main CJK font (must be installed on the system)
    pub script_font_name: String,
    /// Antialiasing level, 1-16
    pub antialiasing_level: u8,
    /// Load `bm` and `lmodern` for sharper math glyphs
    pub use_math_fonts: bool,
    /// External toolchain settings
    pub toolchain: ToolchainSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_font_size: 12,
            min_font_size: 8,
            max_font_size: 72,
            image_resolution: 4800,
            image_padding: 20,
            use_standalone_class: true,
            enable_script_support: true,
            script_font_name: "SimSun".to_string(),
            antialiasing_level: 16,
            use_math_fonts: true,
            toolchain: ToolchainSettings::default(),
        }
    }
}

impl RenderConfig {
    /// Parse and validate settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Render the configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        if self.min_font_size == 0 {
            return Err(ConfigError::Invalid(
                "min_font_size must be at least 1".to_string(),
            ));
        }
        if self.min_font_size > self.max_font_size {
            return Err(ConfigError::Invalid(format!(
                "min_font_size ({}) exceeds max_font_size ({})",
                self.min_font_size, self.max_font_size
            )));
        }
        if !(self.min_font_size..=self.max_font_size).contains(&self.default_font_size) {
            return Err(ConfigError::Invalid(format!(
                "default_font_size ({}) must lie within [{}, {}]",
                self.default_font_size, self.min_font_size, self.max_font_size
            )));
        }
        if self.image_resolution == 0 {
            return Err(ConfigError::Invalid(
                "image_resolution must be positive".to_string(),
            ));
        }
        if !(1..=MAX_ANTIALIASING).contains(&self.antialiasing_level) {
            return Err(ConfigError::Invalid(format!(
                "antialiasing_level ({}) must lie within [1, {}]",
                self.antialiasing_level, MAX_ANTIALIASING
            )));
        }
        if self.enable_script_support && self.script_font_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "script_font_name is required when script support is enabled".to_string(),
            ));
        }
        self.toolchain.validate()
    }

    /// Scale factor applied to the PDF page when rasterizing
    pub fn scale_factor(&self) -> f32 {
        self.image_resolution as f32 / REFERENCE_DPI
    }

    /// Executable to invoke for the given compiler variant
    pub fn compiler_for(&self, variant: CompilerVariant) -> &str {
        match variant {
            CompilerVariant::Standard => &self.toolchain.standard_compiler,
            CompilerVariant::ScriptAware => &self.toolchain.script_compiler,
        }
    }
}

/// External toolchain configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSettings {
    /// Compiler for Latin-only formulas
    pub standard_compiler: String,
    /// Compiler able to shape CJK glyphs
    pub script_compiler: String,
    /// Kill a compiler pass that runs longer than this; unset waits forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_timeout_secs: Option<u64>,
    /// Directory holding the pdfium shared library; unset searches the system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            standard_compiler: "pdflatex".to_string(),
            script_compiler: "xelatex".to_string(),
            compiler_timeout_secs: None,
            pdfium_library: None,
        }
    }
}

impl ToolchainSettings {
    fn validate(&self) -> Result<()> {
        if self.standard_compiler.trim().is_empty() || self.script_compiler.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "compiler names must not be empty".to_string(),
            ));
        }
        if self.compiler_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "compiler_timeout_secs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-pass compiler timeout, if one is configured
    pub fn compiler_timeout(&self) -> Option<Duration> {
        self.compiler_timeout_secs.map(Duration::from_secs)
    }
}
