//! PDF page rasterization
//!
//! The compiled document always has a single page. A [`PageRasterizer`]
//! turns page 1 into an opaque RGB buffer at a given scale factor.
//!
//! # Feature Flag
//!
//! [`PdfiumRasterizer`] requires the `pdfium` feature (enabled by default)
//! and a pdfium shared library available at runtime.

use std::path::Path;

use crate::error::Result;

/// Opaque RGB pixel buffer for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major RGB triples, `width * height * 3` bytes
    pub rgb: Vec<u8>,
}

impl RasterPage {
    /// Wrap an RGB buffer, checking its length against the dimensions
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(3)?;
        (rgb.len() == expected && width > 0 && height > 0).then_some(Self { width, height, rgb })
    }

    /// Drop the alpha channel of an RGBA buffer
    ///
    /// Pixels are composited over white first, so transparent regions end up white.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Self> {
        let rgb = rgba
            .chunks_exact(4)
            .flat_map(|px| {
                let alpha = u32::from(px[3]);
                let over_white = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
                [over_white(px[0]), over_white(px[1]), over_white(px[2])]
            })
            .collect();
        Self::from_rgb(width, height, rgb)
    }

    /// Check if every pixel is pure white
    pub fn is_blank(&self) -> bool {
        self.rgb.iter().all(|&c| c == 255)
    }
}

/// Trait for page rasterizers
///
/// Implementations must be `Send + Sync` so a pipeline can be shared
/// between the hotkey thread and the orchestrator.
pub trait PageRasterizer: Send + Sync {
    /// Human-readable name of this rasterizer
    fn name(&self) -> &'static str;

    /// Rasterize the first page of `pdf` at `scale` pixels per point
    fn rasterize_first_page(&self, pdf: &Path, scale: f32) -> Result<RasterPage>;
}

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use std::path::{Path, PathBuf};

    use pdfium_render::prelude::*;

    use super::{PageRasterizer, RasterPage};
    use crate::error::{RenderError, Result};

    /// Rasterizer backed by the pdfium library
    ///
    /// The library is bound on every call, so a missing pdfium only fails
    /// the render that needs it.
    #[derive(Debug, Clone, Default)]
    pub struct PdfiumRasterizer {
        library_dir: Option<PathBuf>,
    }

    impl PdfiumRasterizer {
        /// Use the system library search path
        pub fn new() -> Self {
            Self::default()
        }

        /// Look for the pdfium library in `dir` before the system path
        pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
            Self {
                library_dir: Some(dir.into()),
            }
        }

        fn bind(&self) -> Result<Pdfium> {
            let bindings = match &self.library_dir {
                Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                    .or_else(|_| Pdfium::bind_to_system_library()),
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| RenderError::Rasterization(format!("pdfium library unavailable: {e}")))?;
            Ok(Pdfium::new(bindings))
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn name(&self) -> &'static str {
            "pdfium"
        }

        fn rasterize_first_page(&self, pdf: &Path, scale: f32) -> Result<RasterPage> {
            if !pdf.is_file() {
                return Err(RenderError::Rasterization(format!(
                    "compiler produced no PDF at {}",
                    pdf.display()
                )));
            }

            let pdfium = self.bind()?;
            let document = pdfium.load_pdf_from_file(pdf, None).map_err(|e| {
                RenderError::Rasterization(format!("cannot open {}: {e}", pdf.display()))
            })?;

            let pages = document.pages();
            if pages.len() == 0 {
                return Err(RenderError::Rasterization(
                    "document has no pages".to_string(),
                ));
            }
            let page = pages
                .get(0)
                .map_err(|e| RenderError::Rasterization(format!("cannot load page 1: {e}")))?;

            let config = PdfRenderConfig::new()
                .scale_page_by_factor(scale)
                .set_clear_color(PdfColor::WHITE);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| RenderError::Rasterization(format!("cannot render page 1: {e}")))?;

            let width = u32::try_from(bitmap.width()).unwrap_or(0);
            let height = u32::try_from(bitmap.height()).unwrap_or(0);
            RasterPage::from_rgba(width, height, &bitmap.as_rgba_bytes()).ok_or_else(|| {
                RenderError::Rasterization(format!(
                    "unexpected bitmap layout for {width}x{height} page"
                ))
            })
        }
    }

}
