//! LaTeX document synthesis
//!
//! Wraps a formula in a complete, compilable document and decides which
//! compiler variant has to process it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;
use crate::estimator::estimate_font_size;
use crate::script::{CjkIdeographs, ScriptPredicate};

/// Compiler family needed for a synthesized document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerVariant {
    /// pdfLaTeX-style compiler, Latin scripts only
    Standard,
    /// XeLaTeX-style compiler with system font shaping
    ScriptAware,
}

impl CompilerVariant {
    /// Flags for the first, non-output pass
    ///
    /// Both passes run in `nonstopmode` so an error never waits for terminal input.
    pub fn warmup_flags(&self) -> &'static [&'static str] {
        match self {
            Self::Standard => &["-draftmode", "-interaction=nonstopmode"],
            Self::ScriptAware => &["-no-pdf", "-interaction=nonstopmode"],
        }
    }

    /// Flags for the final pass that writes the PDF
    pub fn final_flags(&self) -> &'static [&'static str] {
        &["-interaction=nonstopmode"]
    }
}

impl fmt::Display for CompilerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::ScriptAware => write!(f, "script-aware"),
        }
    }
}

/// One formula to render, with an optional explicit font size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRequest {
    /// Formula markup as typed by the user
    pub text: String,
    /// Font size override in points; estimated from the text when unset
    pub font_size: Option<u32>,
}

impl FormulaRequest {
    /// Create a request that lets the estimator choose the font size
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: None,
        }
    }

    /// Force a specific font size
    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Font size to typeset with: the override, or the estimate
    pub fn resolve_font_size(&self, config: &RenderConfig) -> u32 {
        self.font_size
            .unwrap_or_else(|| estimate_font_size(&self.text, config))
    }

    /// Synthesize the document for this request
    pub fn synthesize(&self, config: &RenderConfig) -> CompiledDocument {
        synthesize(&self.text, self.resolve_font_size(config), config)
    }
}

/// A complete LaTeX document ready for the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledDocument {
    /// Full document source
    pub source: String,
    /// Compiler variant required by the source
    pub compiler: CompilerVariant,
    /// Font size baked into the document class options
    pub font_size: u32,
}

/// Build the document for `text` using the CJK script predicate
pub fn synthesize(text: &str, font_size: u32, config: &RenderConfig) -> CompiledDocument {
    synthesize_with(text, font_size, config, &CjkIdeographs)
}

/// Build the document for `text`, deciding script support with `predicate`
pub fn synthesize_with(
    text: &str,
    font_size: u32,
    config: &RenderConfig,
    predicate: &dyn ScriptPredicate,
) -> CompiledDocument {
    let mut source = String::new();

    if config.use_standalone_class {
        source.push_str(&format!(
            "\\documentclass[preview,varwidth,{}pt]{{standalone}}\n",
            font_size
        ));
    } else {
        source.push_str(&format!("\\documentclass[{}pt]{{article}}\n", font_size));
    }

    source.push_str("\\usepackage{amsmath}\n");
    source.push_str("\\usepackage{amssymb}\n");
    source.push_str("\\usepackage{xcolor}\n");

    if config.use_math_fonts {
        source.push_str("\\usepackage{bm}\n");
        source.push_str("\\usepackage{lmodern}\n");
    }

    let compiler = if config.enable_script_support && predicate.requires_script_support(text) {
        source.push_str("\\usepackage{ctex}\n");
        source.push_str(&format!(
            "\\setCJKmainfont{{{}}}\n",
            config.script_font_name
        ));
        tracing::debug!(predicate = predicate.name(), "Script support enabled");
        CompilerVariant::ScriptAware
    } else {
        CompilerVariant::Standard
    };

    source.push_str("\\begin{document}\n");
    source.push_str(&format!("\\[ {} \\]\n", text));
    source.push_str("\\end{document}\n");

    CompiledDocument {
        source,
        compiler,
        font_size,
    }
}
