//! Two-pass LaTeX compiler invocation
//!
//! The compiler runs twice against the same source: a warm-up pass that
//! writes no PDF (`-draftmode` / `-no-pdf`) and a final pass that does.
//! Arguments are passed as a vector, never through a shell.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use texclip_core::{CompilerVariant, RenderConfig};
use tracing::{info, warn};

use crate::error::{RenderError, Result};
use crate::workspace::Workspace;

/// How often a running compiler is polled when a timeout is configured
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Maximum number of output lines kept in a diagnostic
const DIAGNOSTIC_LINES: usize = 30;

/// Compiler pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Draft / no-output pass that prepares auxiliary files
    Warmup,
    /// Full pass producing the PDF
    Final,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warmup => write!(f, "warm-up"),
            Self::Final => write!(f, "final"),
        }
    }
}

/// Captured result of one compiler pass
#[derive(Debug)]
struct PassOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Runs the external compilers named in the configuration
#[derive(Debug, Clone)]
pub struct CompilerRunner {
    standard: String,
    script_aware: String,
    timeout: Option<Duration>,
}

impl CompilerRunner {
    /// Build a runner from the toolchain section of the configuration
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            standard: config.toolchain.standard_compiler.clone(),
            script_aware: config.toolchain.script_compiler.clone(),
            timeout: config.toolchain.compiler_timeout(),
        }
    }

    /// Executable for a compiler variant
    pub fn program(&self, variant: CompilerVariant) -> &str {
        match variant {
            CompilerVariant::Standard => &self.standard,
            CompilerVariant::ScriptAware => &self.script_aware,
        }
    }

    /// Argument vector for one pass
    pub fn args(variant: CompilerVariant, pass: Pass, workspace: &Workspace) -> Vec<String> {
        let flags = match pass {
            Pass::Warmup => variant.warmup_flags(),
            Pass::Final => variant.final_flags(),
        };

        let mut args: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
        args.push("-output-directory".to_string());
        args.push(workspace.path().display().to_string());
        args.push(workspace.source_path().display().to_string());
        args
    }

    /// Run both passes and return the path of the produced PDF
    ///
    /// The source must already be written into the workspace.
    pub fn compile(&self, variant: CompilerVariant, workspace: &Workspace) -> Result<PathBuf> {
        self.run_pass(variant, Pass::Warmup, workspace)?;
        self.run_pass(variant, Pass::Final, workspace)?;
        Ok(workspace.pdf_path())
    }

    fn run_pass(&self, variant: CompilerVariant, pass: Pass, workspace: &Workspace) -> Result<()> {
        let program = self.program(variant);
        let started_at = Instant::now();

        let child = Command::new(program)
            .args(Self::args(variant, pass, workspace))
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "render::compiler",
                    compiler = program,
                    pass = %pass,
                    error = %err,
                    "Failed to spawn compiler"
                );
                RenderError::CompilerUnavailable {
                    compiler: program.to_string(),
                    source: err,
                }
            })?;

        let output = match self.wait(child)? {
            Some(output) => output,
            None => {
                let timeout = self.timeout.unwrap_or_default();
                warn!(
                    target = "render::compiler",
                    compiler = program,
                    pass = %pass,
                    timeout_secs = timeout.as_secs(),
                    "Compiler timed out and was killed"
                );
                return Err(RenderError::Timeout {
                    compiler: program.to_string(),
                    pass,
                    timeout,
                });
            }
        };

        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        if !output.status.success() {
            let diagnostic = diagnostic(program, &output);
            warn!(
                target = "render::compiler",
                compiler = program,
                pass = %pass,
                exit_code = output.status.code().unwrap_or(-1),
                elapsed_ms,
                "Compiler pass failed"
            );
            return Err(RenderError::Compilation {
                compiler: program.to_string(),
                pass,
                diagnostic,
            });
        }

        info!(
            target = "render::compiler",
            compiler = program,
            pass = %pass,
            elapsed_ms,
            "Compiler pass finished"
        );
        Ok(())
    }

    /// Wait for the child, draining both pipes; `None` means it was killed on timeout
    fn wait(&self, mut child: Child) -> Result<Option<PassOutput>> {
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            None => child.wait()?,
            Some(timeout) => match wait_with_timeout(&mut child, timeout)? {
                Some(status) => status,
                // Readers are detached: a grandchild may still hold the pipes
                None => return Ok(None),
            },
        };

        Ok(Some(PassOutput {
            status,
            stdout: join(stdout),
            stderr: join(stderr),
        }))
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let started_at = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started_at.elapsed() >= timeout {
            // The child may have exited between try_wait and kill
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Pick the most useful failure text from a pass
///
/// stderr wins when it has content. TeX itself reports errors on stdout as
/// lines starting with `!`, so the excerpt starts at the first such line;
/// otherwise the tail of stdout is used.
fn diagnostic(program: &str, output: &PassOutput) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_string();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    let excerpt = match lines.iter().position(|l| l.starts_with('!')) {
        Some(start) => &lines[start..lines.len().min(start + DIAGNOSTIC_LINES)],
        None => &lines[lines.len().saturating_sub(DIAGNOSTIC_LINES)..],
    };
    let excerpt = excerpt.join("\n");
    if !excerpt.trim().is_empty() {
        return excerpt.trim().to_string();
    }

    match output.status.code() {
        Some(code) => format!("{program} exited with status {code}"),
        None => format!("{program} was terminated by a signal"),
    }
}
