//! Project fixture and fake compiler.
//!
//! The fake compiler is a POSIX shell script named `compile` placed in the
//! scratch directory. With `bin_path = "sh"` the service's fixed argument
//! vector `sh compile <input> <output> --root ...` runs the script, so no
//! executable bit and no real Typst installation are needed.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::TypstConfig;

/// File the fake compiler records its arguments in, inside the scratch directory.
pub const ARGS_FILE: &str = "last_args.txt";

const ECHO_SCRIPT: &str = r#"cp "$1" "$2"
for f in "$(dirname "$1")"/imported_*; do
  [ -f "$f" ] || continue
  printf '\n=== %s\n' "$(basename "$f")" >> "$2"
  cat "$f" >> "$2" 2>/dev/null || true
done
"#;

/// Behavior of the fake compiler script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCompiler {
    /// Copy the input to the output, then append `=== <name>` and the content
    /// of every `imported_*` file next to the input.
    Echo,
    /// Sleep `seconds` when the input contains `marker`, then exit 7 with
    /// `missing <name>` if an `imported_*` file the input imports is no longer
    /// next to it. Otherwise behave like [`Echo`](Self::Echo).
    CheckImports {
        /// Text that makes this run slow
        marker: String,
        /// Sleep duration
        seconds: u32,
    },
    /// Print `stderr` to standard error and exit with `exit_code`.
    Fail {
        /// Exit status
        exit_code: i32,
        /// Text written to standard error, verbatim
        stderr: String,
    },
    /// Sleep for `seconds` without producing output.
    Hang {
        /// Sleep duration
        seconds: u32,
    },
    /// Exit successfully without writing the output file.
    NoOutput,
}

impl FakeCompiler {
    /// Shell script implementing this behavior.
    #[must_use]
    pub fn script(&self) -> String {
        let record = format!("printf '%s\\n' \"$0\" \"$@\" > {ARGS_FILE}\n");
        let body = match self {
            Self::Echo => ECHO_SCRIPT.to_string(),
            Self::CheckImports {
                marker,
                seconds,
            } => format!(
                r#"if grep -qF '{marker}' "$1"; then sleep {seconds}; fi
dir=$(dirname "$1")
for name in $(sed -n 's/^#import "\(imported_[^"]*\)".*/\1/p' "$1"); do
  if [ ! -f "$dir/$name" ]; then
    echo "missing $name" >&2
    exit 7
  fi
done
{ECHO_SCRIPT}"#
            ),
            Self::Fail {
                exit_code,
                stderr,
            } => {
                let mut text = stderr.clone();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                format!("cat >&2 <<'TYPST_PREP_EOF'\n{text}TYPST_PREP_EOF\nexit {exit_code}\n")
            }
            Self::Hang {
                seconds,
            } => format!("exec sleep {seconds}\n"),
            Self::NoOutput => "exit 0\n".to_string(),
        };
        format!("#!/bin/sh\n{record}{body}")
    }
}

/// A temporary project directory with `resources/typst/` and a scratch directory.
pub struct TestProject {
    _temp: TempDir,
    base: PathBuf,
}

impl TestProject {
    /// Create the project; all paths are canonical.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        let base = fs::canonicalize(temp.path())?;
        fs::create_dir_all(base.join("resources/typst"))?;
        Ok(Self {
            _temp: temp,
            base,
        })
    }

    /// Project base path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base
    }

    /// Write a file relative to the base path, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.base.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Configuration rooted at the project, running the fake compiler.
    #[must_use]
    pub fn config(&self) -> TypstConfig {
        let mut config = TypstConfig::with_base_path(&self.base);
        config.bin_path = "sh".to_string();
        config
    }

    /// Scratch directory used by [`config`](Self::config).
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.config().working_directory
    }

    /// Debug directory used by [`config`](Self::config).
    #[must_use]
    pub fn debug_dir(&self) -> PathBuf {
        self.config().debug_directory
    }

    /// Place the fake compiler script in the scratch directory.
    pub fn install_compiler(&self, compiler: &FakeCompiler) -> Result<()> {
        self.install_compiler_in(&self.scratch_dir(), compiler)
    }

    /// Place the fake compiler script in `scratch`.
    pub fn install_compiler_in(&self, scratch: &Path, compiler: &FakeCompiler) -> Result<()> {
        fs::create_dir_all(scratch)?;
        fs::write(scratch.join("compile"), compiler.script())?;
        Ok(())
    }

    /// Arguments of the last fake compiler run, starting with `compile`.
    pub fn last_args(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(self.scratch_dir().join(ARGS_FILE))
            .context("Fake compiler has not run")?;
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Names of the job directories (`typst_*/`), entrypoints (`typst_*.typ`)
    /// and `imported_*` files in the scratch directory. Artifacts are not listed.
    pub fn scratch_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.scratch_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_job = name.starts_with("typst_") && (entry.path().is_dir() || name.ends_with(".typ"));
            if is_job || name.starts_with("imported_") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Names of the files in the debug directory.
    pub fn debug_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.debug_dir())? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
