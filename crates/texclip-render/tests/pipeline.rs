//! Pipeline tests against fake compilers
//!
//! The compilers are small shell scripts that record their arguments and
//! drop a placeholder PDF; a stub rasterizer stands in for pdfium. The
//! real-toolchain round trip is `#[ignore]`d and needs pdflatex + pdfium.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use texclip_core::{synthesize, CompilerVariant, FormulaRequest, RenderConfig};
use texclip_render::{PageRasterizer, RasterPage, RenderError, RenderPipeline, Result};

/// 6x4 white page with a black 2x2 block in the middle
struct StubRasterizer;

impl PageRasterizer for StubRasterizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn rasterize_first_page(&self, pdf: &Path, scale: f32) -> Result<RasterPage> {
        if !pdf.is_file() {
            return Err(RenderError::Rasterization(format!(
                "missing {}",
                pdf.display()
            )));
        }
        assert!(scale > 0.0);
        let mut rgb = vec![255u8; 6 * 4 * 3];
        for (x, y) in [(2, 1), (3, 1), (2, 2), (3, 2)] {
            let i = (y * 6 + x) * 3;
            rgb[i..i + 3].copy_from_slice(&[0, 0, 0]);
        }
        Ok(RasterPage::from_rgb(6, 4, rgb).expect("valid page"))
    }
}

struct FakeToolchain {
    dir: TempDir,
}

impl FakeToolchain {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn args_log(&self) -> PathBuf {
        self.dir.path().join("args.log")
    }

    fn dir_log(&self) -> PathBuf {
        self.dir.path().join("outdir.log")
    }

    fn work_root(&self) -> PathBuf {
        let root = self.dir.path().join("work");
        fs::create_dir_all(&root).expect("work root");
        root
    }

    /// Write a compiler script; `body` runs after argument parsing
    fn compiler(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let script = format!(
            r#"#!/bin/sh
echo "{name} $@" >> "{args_log}"
outdir=""
draft=0
while [ "$#" -gt 0 ]; do
  case "$1" in
    -output-directory)
      shift
      outdir="$1"
      ;;
    -draftmode|-no-pdf)
      draft=1
      ;;
  esac
  shift
done
echo "$outdir" > "{dir_log}"
{body}
if [ "$draft" = 0 ]; then
  printf 'fake pdf' > "$outdir/formula.pdf"
fi
exit 0
"#,
            args_log = self.args_log().display(),
            dir_log = self.dir_log().display(),
        );
        fs::write(&path, script).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.args_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn last_workspace(&self) -> PathBuf {
        PathBuf::from(fs::read_to_string(self.dir_log()).expect("dir log").trim())
    }

    fn config(&self, standard: &Path, script: &Path) -> RenderConfig {
        let mut config = RenderConfig {
            image_padding: 5,
            ..RenderConfig::default()
        };
        config.toolchain.standard_compiler = standard.display().to_string();
        config.toolchain.script_compiler = script.display().to_string();
        config
    }
}

#[test]
fn renders_padded_png_with_fake_toolchain() {
    let tools = FakeToolchain::new();
    let standard = tools.compiler("fake-pdflatex", "");
    let script = tools.compiler("fake-xelatex", "");
    let config = tools.config(&standard, &script);

    let pipeline = RenderPipeline::with_rasterizer(&config, Box::new(StubRasterizer))
        .with_workspace_root(tools.work_root());
    let artifact = pipeline
        .render_formula(&FormulaRequest::new("x^2+y^2=z^2"))
        .expect("render succeeds");

    assert!(artifact.is_valid_png());
    assert_eq!((artifact.width, artifact.height), (16, 14));

    let decoded = tiny_skia::Pixmap::decode_png(&artifact.png).expect("decodable png");
    assert_eq!((decoded.width(), decoded.height()), (16, 14));
    assert!(decoded.width() > 2 * config.image_padding);
    assert!(decoded.height() > 2 * config.image_padding);
    assert!(
        decoded.pixels().iter().any(|p| p.red() != 255),
        "image must not be entirely white"
    );

    let calls = tools.invocations();
    assert_eq!(calls.len(), 2, "two passes expected: {calls:?}");
    assert!(calls[0].starts_with("fake-pdflatex -draftmode -interaction=nonstopmode"));
    assert!(calls[1].starts_with("fake-pdflatex -interaction=nonstopmode -output-directory"));
    assert!(calls[1].ends_with("formula.tex"));

    assert!(!tools.last_workspace().exists(), "workspace must be removed");
}

#[test]
fn cjk_formula_uses_script_compiler() {
    let tools = FakeToolchain::new();
    let standard = tools.compiler("fake-pdflatex", "");
    let script = tools.compiler("fake-xelatex", "");
    let config = tools.config(&standard, &script);

    let pipeline = RenderPipeline::with_rasterizer(&config, Box::new(StubRasterizer));
    pipeline
        .render_formula(&FormulaRequest::new(r"v = \text{速度}"))
        .expect("render succeeds");

    let calls = tools.invocations();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("fake-xelatex -no-pdf -interaction=nonstopmode"));
    assert!(calls[1].starts_with("fake-xelatex -interaction=nonstopmode"));
}

#[test]
fn compilation_failure_surfaces_diagnostic_and_cleans_up() {
    let tools = FakeToolchain::new();
    let standard = tools.compiler(
        "fake-pdflatex",
        r#"echo "This is pdfTeX, Version 3.141592653"
echo "! Missing } inserted."
echo "<inserted text>"
exit 1"#,
    );
    let script = tools.compiler("fake-xelatex", "");
    let config = tools.config(&standard, &script);

    let pipeline = RenderPipeline::with_rasterizer(&config, Box::new(StubRasterizer))
        .with_workspace_root(tools.work_root());
    let document = synthesize(r"\frac{a}{b", 12, &config);
    let err = pipeline.render(&document).expect_err("must fail");

    match &err {
        RenderError::Compilation {
            diagnostic, pass, ..
        } => {
            assert!(!diagnostic.is_empty());
            assert!(diagnostic.contains("Missing } inserted"), "{diagnostic}");
            assert_eq!(*pass, texclip_render::Pass::Warmup);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert!(err.diagnostic().is_some());

    // Warm-up failure stops the render before the final pass
    assert_eq!(tools.invocations().len(), 1);
    assert!(!tools.last_workspace().exists(), "workspace must be removed");
    assert_eq!(fs::read_dir(tools.work_root()).unwrap().count(), 0);
}

#[test]
fn stderr_is_preferred_diagnostic() {
    let tools = FakeToolchain::new();
    let standard = tools.compiler(
        "fake-pdflatex",
        r#"if [ "$draft" = 0 ]; then
  echo "fatal: font not found" >&2
  exit 2
fi"#,
    );
    let script = tools.compiler("fake-xelatex", "");
    let config = tools.config(&standard, &script);

    let pipeline = RenderPipeline::with_rasterizer(&config, Box::new(StubRasterizer));
    let err = pipeline
        .render_formula(&FormulaRequest::new("a+b"))
        .expect_err("final pass fails");

    match err {
        RenderError::Compilation {
            diagnostic, pass, ..
        } => {
            assert_eq!(diagnostic, "fatal: font not found");
            assert_eq!(pass, texclip_render::Pass::Final);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert_eq!(tools.invocations().len(), 2);
}

#[test]
fn missing_pdf_is_rasterization_error() {
    let tools = FakeToolchain::new();
    // Final pass succeeds without writing a PDF
    let standard = tools.compiler("fake-pdflatex", "exit 0");
    let script = tools.compiler("fake-xelatex", "");
    let config = tools.config(&standard, &script);

    let pipeline = RenderPipeline::with_rasterizer(&config, Box::new(StubRasterizer));
    let err = pipeline
        .render_formula(&FormulaRequest::new("a+b"))
        .expect_err("no pdf");
    assert!(matches!(err, RenderError::Rasterization(_)));
    assert!(!tools.last_workspace().exists());
}

#[test]
fn slow_compiler_is_killed_on_timeout() {
    let tools = FakeToolchain::new();
    let standard = tools.compiler("fake-pdflatex", "exec sleep 5");
    let script = tools.compiler("fake-xelatex", "");
    let mut config = tools.config(&standard, &script);
    config.toolchain.compiler_timeout_secs = Some(1);

    let pipeline = RenderPipeline::with_rasterizer(&config, Box::new(StubRasterizer));
    let started = std::time::Instant::now();
    let err = pipeline
        .render_formula(&FormulaRequest::new("a+b"))
        .expect_err("timeout");

    assert!(matches!(err, RenderError::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
    assert_eq!(tools.invocations().len(), 1);
}

#[test]
fn document_variant_matches_invoked_compiler() {
    let config = RenderConfig::default();
    assert_eq!(
        synthesize("速度", 12, &config).compiler,
        CompilerVariant::ScriptAware
    );
    assert_eq!(
        synthesize("v", 12, &config).compiler,
        CompilerVariant::Standard
    );
}

/// Full round trip with a real TeX installation and pdfium
#[cfg(feature = "pdfium")]
#[test]
#[ignore = "requires pdflatex and the pdfium shared library"]
fn renders_real_formula() {
    let config = RenderConfig {
        image_resolution: 300,
        ..RenderConfig::default()
    };
    let pipeline = RenderPipeline::new(&config);

    let artifact = pipeline
        .render_formula(&FormulaRequest::new("x^2+y^2=z^2"))
        .expect("real render");

    assert!(!artifact.png.is_empty());
    let decoded = tiny_skia::Pixmap::decode_png(&artifact.png).expect("decodable png");
    assert!(decoded.width() > 2 * config.image_padding);
    assert!(decoded.height() > 2 * config.image_padding);
    assert!(decoded.pixels().iter().any(|p| p.red() < 128));
}

#[cfg(feature = "pdfium")]
#[test]
#[ignore = "requires pdflatex"]
fn malformed_formula_fails_with_real_compiler() {
    let pipeline = RenderPipeline::new(&RenderConfig::default());
    let err = pipeline
        .render_formula(&FormulaRequest::new(r"\frac{a}{b"))
        .expect_err("unterminated group");
    assert!(err.diagnostic().is_some_and(|d| !d.is_empty()));
}
