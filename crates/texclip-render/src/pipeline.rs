//! Render pipeline
//!
//! ```text
//! CompiledDocument
//!       │  write formula.tex into a fresh Workspace
//!       ▼
//! CompilerRunner (warm-up pass, final pass)
//!       │  formula.pdf
//!       ▼
//! PageRasterizer (page 1 at resolution / 72)
//!       │  RGB buffer
//!       ▼
//! canvas::pad_and_encode (white border, PNG)
//!       │
//!       ▼
//! RenderArtifact
//! ```
//!
//! The workspace is dropped before `render` returns, whatever the outcome.

use std::path::PathBuf;
use std::time::Instant;

use texclip_core::{CompiledDocument, FormulaRequest, RenderConfig};
use tracing::info;

use crate::artifact::RenderArtifact;
use crate::canvas;
use crate::compiler::CompilerRunner;
use crate::error::{RenderError, Result};
use crate::rasterizer::PageRasterizer;
use crate::workspace::Workspace;

/// Longest formula accepted, in bytes
pub const MAX_FORMULA_BYTES: usize = 64 * 1024;

/// Renders synthesized documents into padded PNG images
pub struct RenderPipeline {
    config: RenderConfig,
    compiler: CompilerRunner,
    rasterizer: Box<dyn PageRasterizer>,
    workspace_root: Option<PathBuf>,
}

impl RenderPipeline {
    /// Create a pipeline with the pdfium rasterizer
    ///
    /// Uses `toolchain.pdfium_library` from the configuration when set.
    #[cfg(feature = "pdfium")]
    pub fn new(config: &RenderConfig) -> Self {
        let rasterizer = match &config.toolchain.pdfium_library {
            Some(dir) => crate::rasterizer::PdfiumRasterizer::with_library_dir(dir),
            None => crate::rasterizer::PdfiumRasterizer::new(),
        };
        Self::with_rasterizer(config, Box::new(rasterizer))
    }

    /// Create a pipeline with a custom rasterizer
    pub fn with_rasterizer(config: &RenderConfig, rasterizer: Box<dyn PageRasterizer>) -> Self {
        Self {
            config: config.clone(),
            compiler: CompilerRunner::new(config),
            rasterizer,
            workspace_root: None,
        }
    }

    /// Create per-render workspaces under `root` instead of the system temp dir
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Configuration snapshot this pipeline was built with
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Name of the active rasterizer
    pub fn rasterizer_name(&self) -> &'static str {
        self.rasterizer.name()
    }

    /// Estimate, synthesize and render one formula
    pub fn render_formula(&self, request: &FormulaRequest) -> Result<RenderArtifact> {
        check_formula(&request.text)?;
        let document = request.synthesize(&self.config);
        info!(
            font_size = document.font_size,
            compiler = %document.compiler,
            "Synthesized formula document"
        );
        self.render(&document)
    }

    /// Compile, rasterize and encode a synthesized document
    pub fn render(&self, document: &CompiledDocument) -> Result<RenderArtifact> {
        let started_at = Instant::now();

        let workspace = match &self.workspace_root {
            Some(root) => Workspace::create_in(root)?,
            None => Workspace::create()?,
        };
        workspace.write_source(&document.source)?;

        let pdf = self.compiler.compile(document.compiler, &workspace)?;

        let scale = self.config.scale_factor();
        let page = self.rasterizer.rasterize_first_page(&pdf, scale)?;
        if page.is_blank() {
            tracing::warn!("Rasterized page is blank");
        }

        let artifact = canvas::pad_and_encode(&page, self.config.image_padding)?;

        info!(
            target = "render::pipeline",
            rasterizer = self.rasterizer.name(),
            width = artifact.width,
            height = artifact.height,
            png_bytes = artifact.png.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Formula rendered"
        );

        Ok(artifact)
    }
}

/// Reject empty or oversized formula text before any work is done
pub fn check_formula(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RenderError::EmptySource);
    }
    if text.len() > MAX_FORMULA_BYTES {
        return Err(RenderError::SourceTooLarge {
            len: text.len(),
            max: MAX_FORMULA_BYTES,
        });
    }
    Ok(())
}
