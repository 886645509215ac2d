//! Builder for Typst compiler invocations.
//!
//! The compiler is always started directly, never through a shell, with the
//! argument vector
//!
//! ```text
//! <bin> compile <input> <output> --root <root> [--font-path <dir>]...
//! ```
//!
//! and the scratch directory as its working directory.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::{Result, TypstError};

/// Builder for one run of the external compiler.
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
/// use std::time::Duration;
/// use typst_prep::compiler::TypstCommand;
///
/// # async fn example() -> typst_prep::core::Result<()> {
/// TypstCommand::compile("typst", Path::new("in.typ"), Path::new("out.pdf"))
///     .root(Path::new("/srv/app"))
///     .font_path(Path::new("/usr/share/fonts/custom"))
///     .current_dir("/srv/app/storage/typst")
///     .with_timeout(Some(Duration::from_secs(60)))
///     .execute()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TypstCommand {
    /// Binary to start
    program: String,

    /// Arguments in order
    args: Vec<OsString>,

    /// Working directory (defaults to the current directory)
    current_dir: Option<PathBuf>,

    /// Maximum duration to wait for the process (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Optional label for log messages
    context: Option<String>,
}

impl TypstCommand {
    /// A command running `program` with no arguments and no timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout_duration: None,
            context: None,
        }
    }

    /// `program compile <input> <output>`
    pub fn compile(program: impl Into<String>, input: &Path, output: &Path) -> Self {
        Self::new(program).arg("compile").arg(input).arg(output)
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Append `--root <root>`.
    pub fn root(self, root: &Path) -> Self {
        self.arg("--root").arg(root)
    }

    /// Append `--font-path <dir>`.
    pub fn font_path(self, dir: &Path) -> Self {
        self.arg("--font-path").arg(dir)
    }

    /// Append one `--font-path` pair per directory, in order.
    pub fn font_paths<'p>(self, dirs: impl IntoIterator<Item = &'p PathBuf>) -> Self {
        dirs.into_iter().fold(self, |cmd, dir| cmd.font_path(dir))
    }

    /// Run the process in `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set a timeout (None for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label included in log messages.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The binary that will be started.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector, excluding the program.
    #[must_use]
    pub fn argv(&self) -> &[OsString] {
        &self.args
    }

    /// Run the process to completion.
    ///
    /// # Errors
    ///
    /// - [`TypstError::CompilerNotFound`] if the binary cannot be found
    /// - [`TypstError::Timeout`] if the timeout elapses; the process is killed
    /// - [`TypstError::CompilationError`] on a non-zero exit, with stderr verbatim
    ///   (stdout when stderr is empty)
    /// - [`TypstError::Other`] if the process cannot be started for another reason
    pub async fn execute(self) -> Result<TypstCommandOutput> {
        let start = Instant::now();
        let label = self.context.as_deref().unwrap_or("typst");
        let rendered_args = self.args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ");

        tracing::debug!(target: "typst", "({}) Executing command: {} {}", label, self.program, rendered_args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let output_future = cmd.output();

        let result = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result
            } else {
                tracing::warn!(
                    target: "typst",
                    "({}) Command timed out after {} seconds: {} {}",
                    label,
                    duration.as_secs(),
                    self.program,
                    rendered_args
                );
                return Err(TypstError::Timeout {
                    seconds: duration.as_secs(),
                });
            }
        } else {
            output_future.await
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TypstError::CompilerNotFound {
                    bin_path: self.program,
                });
            }
            Err(e) => {
                return Err(TypstError::Other {
                    message: format!("Failed to execute {}: {}", self.program, e),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::debug!(
                target: "typst",
                "({}) Command failed with exit code: {:?}",
                label,
                output.status.code()
            );
            return Err(TypstError::CompilationError {
                exit_code: output.status.code(),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            });
        }

        if !stderr.is_empty() {
            tracing::debug!(target: "typst", "({}) {}", label, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "typst::perf", "({}) Compilation took {:.2}s", label, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "typst::perf", "({}) Compilation took {}ms", label, elapsed.as_millis());
        }

        Ok(TypstCommandOutput {
            stdout,
            stderr,
        })
    }
}

/// Output of a successful compiler run
#[derive(Debug, Clone)]
pub struct TypstCommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error (warnings)
    pub stderr: String,
}
