//! # texclip-render
//!
//! Turns a synthesized LaTeX document into a padded PNG image by driving an
//! external two-pass compiler and rasterizing the resulting PDF page.
//!
//! ## Example
//!
//! ```no_run
//! use texclip_core::{FormulaRequest, RenderConfig};
//! use texclip_render::RenderPipeline;
//!
//! let config = RenderConfig::default();
//! let pipeline = RenderPipeline::new(&config);
//!
//! let artifact = pipeline.render_formula(&FormulaRequest::new("x^2+y^2=z^2"))?;
//! std::fs::write("formula.png", &artifact.png)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod artifact;
pub mod canvas;
pub mod compiler;
pub mod error;
pub mod pipeline;
pub mod rasterizer;
pub mod workspace;

pub use artifact::RenderArtifact;
pub use compiler::{CompilerRunner, Pass};
pub use error::{RenderError, Result};
pub use pipeline::{check_formula, RenderPipeline, MAX_FORMULA_BYTES};
#[cfg(feature = "pdfium")]
pub use rasterizer::PdfiumRasterizer;
pub use rasterizer::{PageRasterizer, RasterPage};
pub use workspace::Workspace;
