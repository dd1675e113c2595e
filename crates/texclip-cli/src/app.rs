//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use texclip_core::{
    estimate_font_size, visible_glyph_count, FormulaRequest, RenderConfig, CONFIG_FILE_NAMES,
};
use texclip_render::{check_formula, RenderPipeline};

use crate::clipboard::{DesktopClipboard, SystemClipboard};
use crate::replace::{default_lock_path, ReplaceOutcome, Replacer};

#[derive(Parser)]
#[command(name = "texclip")]
#[command(author, version, about = "Render LaTeX formulas to images", long_about = None)]
struct Cli {
    /// Configuration file (defaults to texclip.toml in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a formula to a PNG image
    Render {
        /// Formula text (reads --input or stdin when omitted)
        text: Option<String>,

        /// File containing the formula
        #[arg(short, long, conflicts_with = "text")]
        input: Option<PathBuf>,

        /// Output PNG file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Font size in points instead of the estimate
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=500))]
        font_size: Option<u32>,

        /// Print image metadata as JSON
        #[arg(long, requires = "output")]
        json: bool,
    },

    /// Print the LaTeX document that would be compiled
    Document {
        /// Formula text (reads --input or stdin when omitted)
        text: Option<String>,

        /// File containing the formula
        #[arg(short, long, conflicts_with = "text")]
        input: Option<PathBuf>,

        /// Font size in points instead of the estimate
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=500))]
        font_size: Option<u32>,
    },

    /// Show the estimated font size for a formula
    Estimate {
        /// Formula text
        text: String,
    },

    /// Replace the selected formula with its rendered image
    Replace {
        /// Paste the image (or the restored text) into the focused window
        #[arg(long)]
        paste: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Metadata printed by `render --json`
#[derive(Debug, Serialize)]
pub struct RenderSummary {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub font_size: u32,
    pub compiler: String,
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            text,
            input,
            output,
            font_size,
            json,
        } => {
            let text = read_formula(text, input.as_deref())?;
            render_command(&config, &text, output.as_deref(), font_size, json)?;
        }
        Commands::Document {
            text,
            input,
            font_size,
        } => {
            let text = read_formula(text, input.as_deref())?;
            document_command(&config, &text, font_size)?;
        }
        Commands::Estimate { text } => {
            estimate_command(&config, &text);
        }
        Commands::Replace { paste } => {
            replace_command(&config, paste)?;
        }
        Commands::Config => {
            config_command(&config)?;
        }
    }

    Ok(())
}

/// Install the stderr log subscriber
///
/// `RUST_LOG` takes precedence over `-v`.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A subscriber may already be installed when running under a test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Execute the render command
pub fn render_command(
    config: &RenderConfig,
    text: &str,
    output: Option<&Path>,
    font_size: Option<u32>,
    json: bool,
) -> Result<()> {
    check_formula(text).context("Invalid formula")?;

    let mut request = FormulaRequest::new(text);
    if let Some(size) = font_size {
        request = request.with_font_size(size);
    }
    let document = request.synthesize(config);

    let pipeline = build_pipeline(config)?;
    let artifact = pipeline
        .render(&document)
        .context("Failed to render formula")?;

    match output {
        Some(path) => {
            fs::write(path, &artifact.png)
                .with_context(|| format!("Failed to write image: {}", path.display()))?;

            if json {
                let summary = RenderSummary {
                    output: path.to_path_buf(),
                    width: artifact.width,
                    height: artifact.height,
                    bytes: artifact.png.len(),
                    font_size: document.font_size,
                    compiler: config.compiler_for(document.compiler).to_string(),
                };
                let json = serde_json::to_string_pretty(&summary)
                    .context("Failed to serialize render summary to JSON")?;
                println!("{}", json);
            } else {
                println!(
                    "✓ Wrote {}x{} image to {}",
                    artifact.width,
                    artifact.height,
                    path.display()
                );
            }
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&artifact.png)
                .and_then(|_| stdout.flush())
                .context("Failed to write image to stdout")?;
        }
    }

    Ok(())
}

/// Execute the document command
pub fn document_command(config: &RenderConfig, text: &str, font_size: Option<u32>) -> Result<()> {
    check_formula(text).context("Invalid formula")?;

    let mut request = FormulaRequest::new(text);
    if let Some(size) = font_size {
        request = request.with_font_size(size);
    }
    let document = request.synthesize(config);

    println!(
        "% compiler: {} ({}), font size {}pt",
        config.compiler_for(document.compiler),
        document.compiler,
        document.font_size
    );
    print!("{}", document.source);
    Ok(())
}

/// Execute the estimate command
pub fn estimate_command(config: &RenderConfig, text: &str) {
    let glyphs = visible_glyph_count(text);
    let size = estimate_font_size(text, config);
    println!("Visible glyphs: {}", glyphs);
    println!("Font size: {}pt", size);
}

/// Execute the replace command (hotkey action)
pub fn replace_command(config: &RenderConfig, paste: bool) -> Result<()> {
    let lock_file = default_lock_path();
    debug!(lock_file = %lock_file.display(), "Using busy lock file");
    let replacer = Replacer::new(build_pipeline(config)?)
        .with_paste(paste)
        .with_lock_file(lock_file);
    let clipboard = DesktopClipboard::new(SystemClipboard::new());

    match replacer.trigger(&clipboard, &clipboard) {
        ReplaceOutcome::Replaced { width, height } => {
            println!("✓ Clipboard now holds a {}x{} formula image", width, height);
            Ok(())
        }
        ReplaceOutcome::Busy => {
            println!("Another `texclip replace` is still rendering; trigger ignored");
            Ok(())
        }
        ReplaceOutcome::Empty => {
            println!("No text captured: put the cursor in a field holding a formula, then trigger again");
            Ok(())
        }
        ReplaceOutcome::Aborted { error } => Err(error).context("Nothing was changed"),
        ReplaceOutcome::Restored { error } => {
            Err(error).context("Render failed; the original text is back in the clipboard")
        }
        ReplaceOutcome::RestoreFailed {
            error,
            restore_error,
        } => Err(error).context(format!(
            "Render failed and the original text could not be restored: {}",
            restore_error
        )),
    }
}

/// Execute the config command
pub fn config_command(config: &RenderConfig) -> Result<()> {
    let toml = config
        .to_toml_string()
        .context("Failed to serialize configuration")?;
    print!("{}", toml);
    Ok(())
}

/// Load configuration from a file or use defaults
///
/// Without an explicit path the working directory is searched for
/// `texclip.toml` then `.texclip.toml`.
pub fn load_config(config_path: Option<&Path>) -> Result<RenderConfig> {
    let (config, source) = match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            let config = RenderConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            (config, path.display().to_string())
        }
        None => match CONFIG_FILE_NAMES.iter().map(Path::new).find(|p| p.exists()) {
            Some(path) => {
                let config = RenderConfig::load(path)
                    .with_context(|| format!("Failed to load config: {}", path.display()))?;
                (config, path.display().to_string())
            }
            None => (RenderConfig::default(), "defaults".to_string()),
        },
    };

    info!(
        source = %source,
        default_font_size = config.default_font_size,
        image_resolution = config.image_resolution,
        antialiasing_level = config.antialiasing_level,
        script_support = config.enable_script_support,
        script_font = %config.script_font_name,
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(feature = "pdfium")]
fn build_pipeline(config: &RenderConfig) -> Result<RenderPipeline> {
    let pipeline = RenderPipeline::new(config);
    debug!(rasterizer = pipeline.rasterizer_name(), "Render pipeline ready");
    Ok(pipeline)
}

#[cfg(not(feature = "pdfium"))]
fn build_pipeline(_config: &RenderConfig) -> Result<RenderPipeline> {
    debug!("No rasterizer compiled in");
    anyhow::bail!("texclip was built without the `pdfium` feature; rendering is unavailable")
}

/// Formula text from the argument, a file, or stdin
fn read_formula(text: Option<String>, input: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read formula: {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read formula from stdin")?;
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parse_render() {
        let args = vec!["texclip", "render", "x^2", "--output", "out.png", "--json"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Render {
                text,
                input,
                output,
                font_size,
                json,
            } => {
                assert_eq!(text.as_deref(), Some("x^2"));
                assert!(input.is_none());
                assert_eq!(output, Some(PathBuf::from("out.png")));
                assert!(font_size.is_none());
                assert!(json);
            }
            _ => panic!("Expected Render command"),
        }
    }

    #[test]
    fn test_cli_parse_render_from_file_with_size() {
        let args = vec!["texclip", "render", "-i", "f.tex", "-f", "24"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Render {
                text,
                input,
                font_size,
                ..
            } => {
                assert!(text.is_none());
                assert_eq!(input, Some(PathBuf::from("f.tex")));
                assert_eq!(font_size, Some(24));
            }
            _ => panic!("Expected Render command"),
        }
    }

    #[test]
    fn test_cli_render_text_conflicts_with_input() {
        let args = vec!["texclip", "render", "x", "--input", "f.tex"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_cli_render_json_requires_output() {
        let args = vec!["texclip", "render", "x", "--json"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_cli_font_size_range() {
        let args = vec!["texclip", "render", "x", "--font-size", "0"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_cli_parse_global_options() {
        let args = vec!["texclip", "replace", "--paste", "-vv", "--config", "my.toml"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        match cli.command {
            Commands::Replace { paste } => assert!(paste),
            _ => panic!("Expected Replace command"),
        }
    }

    #[test]
    fn test_cli_parse_estimate_document_config() {
        let cli = Cli::try_parse_from(vec!["texclip", "estimate", "a+b"]).unwrap();
        assert!(matches!(cli.command, Commands::Estimate { text } if text == "a+b"));

        let cli = Cli::try_parse_from(vec!["texclip", "document", "a+b", "-f", "9"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Document {
                font_size: Some(9),
                ..
            }
        ));

        let cli = Cli::try_parse_from(vec!["texclip", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_load_config_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("texclip.toml");
        fs::write(&path, "default_font_size = 14\n[toolchain]\nstandard_compiler = \"lualatex\"\n")
            .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.default_font_size, 14);
        assert_eq!(config.toolchain.standard_compiler, "lualatex");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/texclip.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_config_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("texclip.toml");
        fs::write(&path, "min_font_size = 40\nmax_font_size = 10\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load config"));
    }

    #[test]
    fn test_read_formula_sources() {
        assert_eq!(read_formula(Some("x".into()), None).unwrap(), "x");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.tex");
        fs::write(&path, "\\alpha").unwrap();
        assert_eq!(read_formula(None, Some(&path)).unwrap(), "\\alpha");
    }

    #[test]
    fn test_document_command_rejects_empty() {
        let err = document_command(&RenderConfig::default(), "   ", None).unwrap_err();
        assert!(err.to_string().contains("Invalid formula"));
    }

    #[test]
    fn test_render_summary_json() {
        let summary = RenderSummary {
            output: PathBuf::from("out.png"),
            width: 120,
            height: 48,
            bytes: 512,
            font_size: 18,
            compiler: "pdflatex".to_string(),
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["width"], 120);
        assert_eq!(value["height"], 48);
        assert_eq!(value["compiler"], "pdflatex");
        assert_eq!(value["font_size"], 18);
    }
}
