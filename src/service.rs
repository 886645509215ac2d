//! The compilation service.
//!
//! [`TypstService`] runs the whole pipeline for one compilation:
//!
//! 1. **Gate**: reject templates calling denied functions
//! 2. **Render**: apply the entrypoint's templating layer with the bindings
//! 3. **Inject**: expand `#!import ... with_data:` directives
//! 4. **Resolve**: discover, render and rewrite the import graph
//! 5. **Materialize**: write dependencies and the entrypoint to a private job directory
//! 6. **Invoke**: run the compiler with a timeout
//! 7. **Clean up**: remove the job directory, on every exit path
//!
//! Rendering runs before injection on purpose: `#!import ... with_data:`
//! expansions contain caller data, and that data must never be evaluated as
//! template syntax. Steps 1-4 perform no writes. The artifact is left in place for
//! [`compile_to_file`](TypstService::compile_to_file) and
//! [`compile_file_to_file`](TypstService::compile_file_to_file), and read then
//! deleted by [`compile_to_bytes`](TypstService::compile_to_bytes).
//!
//! # Examples
//!
//! ```rust,no_run
//! use serde_json::json;
//! use typst_prep::config::TypstConfig;
//! use typst_prep::service::{CompileOptions, TypstService};
//!
//! # async fn example() -> typst_prep::core::Result<()> {
//! let service = TypstService::new(TypstConfig::with_base_path("/srv/app"))?;
//! let bindings = json!({"invoice": {"number": 42}}).as_object().cloned().unwrap_or_default();
//!
//! let pdf = service
//!     .compile_to_bytes(
//!         "#!import \"Invoice.typ\" with_data: invoice\n= Invoice {{ invoice.number }}",
//!         &bindings,
//!         &CompileOptions::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use crate::compiler::TypstCommand;
use crate::config::{ConfigUpdate, TypstConfig};
use crate::core::{Result, TypstError};
use crate::markup::{Bindings, expand_data_imports};
use crate::resolver::{ImportResolver, PathResolver, ProjectPaths, Resolution};
use crate::templating::TemplateRenderer;
use crate::utils::security::is_safe_format;
use crate::workspace::ScratchWorkspace;

/// Template name used in errors raised while rendering the entrypoint.
const ENTRYPOINT_NAME: &str = "entrypoint";

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Output format; the configured format when absent or invalid.
    pub format: Option<String>,
    /// `--root` override for this call.
    pub root: Option<PathBuf>,
    /// Extra font directories, passed after the configured ones.
    pub font_paths: Vec<PathBuf>,
    /// Directory the entrypoint's imports are relative to, for string sources.
    ///
    /// When absent, imports resolve against the template resource directory.
    pub base_dir: Option<PathBuf>,
}

impl CompileOptions {
    /// Options selecting an output format.
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            ..Self::default()
        }
    }
}

/// Compiles Typst templates through the external compiler.
#[derive(Debug, Clone)]
pub struct TypstService {
    config: TypstConfig,
    renderer: TemplateRenderer,
}

impl TypstService {
    /// Create a service, creating the scratch directory if needed.
    ///
    /// # Errors
    ///
    /// [`TypstError::WorkspaceError`] if the scratch (or debug) directory cannot be created.
    pub fn new(config: TypstConfig) -> Result<Self> {
        ScratchWorkspace::from_config(&config)?;
        Ok(Self {
            config,
            renderer: TemplateRenderer,
        })
    }

    /// Create a service from defaults, an optional TOML file and the environment.
    ///
    /// # Errors
    ///
    /// [`TypstError::ConfigError`] if the file cannot be read or parsed.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let config = TypstConfig::load(config_file).map_err(|e| TypstError::ConfigError {
            message: format!("{e:#}"),
        })?;
        Self::new(config)
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &TypstConfig {
        &self.config
    }

    /// Apply a partial configuration update.
    ///
    /// Invalid values are replaced by defaults (see [`TypstConfig::apply`]).
    /// Compilations already running keep the configuration they started with.
    ///
    /// # Errors
    ///
    /// [`TypstError::WorkspaceError`] if a new scratch directory cannot be created.
    pub fn set_config(&mut self, update: ConfigUpdate) -> Result<()> {
        self.config.apply(update);
        ScratchWorkspace::from_config(&self.config)?;
        Ok(())
    }

    /// Run the gate, render, inject and resolve steps without writing anything.
    ///
    /// `base_dir` is the directory the entrypoint's imports are relative to.
    ///
    /// # Errors
    ///
    /// [`TypstError::SecurityRejection`] or [`TypstError::RenderError`].
    pub fn preprocess(&self, source: &str, bindings: &Bindings, base_dir: Option<&Path>) -> Result<Resolution> {
        Self::preprocess_with(&self.config, &self.renderer, source, bindings, base_dir)
    }

    /// Compile `source`, returning the path of the artifact in the scratch directory.
    ///
    /// The artifact is named after the allocated entrypoint and is never deleted
    /// by the service.
    ///
    /// # Errors
    ///
    /// Any [`TypstError`] except `InputNotFound`, `InputReadFailed` and `OutputReadError`.
    pub async fn compile_to_file(
        &self,
        source: &str,
        bindings: &Bindings,
        options: &CompileOptions,
    ) -> Result<PathBuf> {
        let config = self.config.clone();
        self.compile_source(&config, source, bindings, options.base_dir.as_deref(), None, options).await
    }

    /// Compile `source` and return the artifact's bytes.
    ///
    /// The artifact is deleted after reading (preserved first in debug mode).
    ///
    /// # Errors
    ///
    /// As [`compile_to_file`](Self::compile_to_file), plus
    /// [`TypstError::OutputReadError`] if the artifact cannot be read.
    pub async fn compile_to_bytes(
        &self,
        source: &str,
        bindings: &Bindings,
        options: &CompileOptions,
    ) -> Result<Vec<u8>> {
        let config = self.config.clone();
        let output = self
            .compile_source(&config, source, bindings, options.base_dir.as_deref(), None, options)
            .await?;

        let bytes = tokio::fs::read(&output).await.map_err(|e| TypstError::OutputReadError {
            path: output.clone(),
            reason: e.to_string(),
        });

        ScratchWorkspace::from_config(&config)?.cleanup_output(&output);
        bytes
    }

    /// Compile the file at `input`, writing the artifact to `output`.
    ///
    /// Imports in the file resolve relative to its directory. Without an
    /// explicit `output` the artifact goes next to the input as
    /// `<stem>.<format>` (`<stem>.out.<format>` if that would be the input itself).
    ///
    /// # Errors
    ///
    /// [`TypstError::InputNotFound`] if `input` does not exist,
    /// [`TypstError::InputReadFailed`] if it cannot be read, otherwise as
    /// [`compile_to_file`](Self::compile_to_file).
    pub async fn compile_file_to_file(
        &self,
        input: &Path,
        bindings: &Bindings,
        output: Option<&Path>,
        options: &CompileOptions,
    ) -> Result<PathBuf> {
        let config = self.config.clone();

        if !input.is_file() {
            return Err(TypstError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        let input = tokio::fs::canonicalize(input).await.map_err(|e| TypstError::InputReadFailed {
            path: input.to_path_buf(),
            reason: e.to_string(),
        })?;
        let source = tokio::fs::read_to_string(&input).await.map_err(|e| TypstError::InputReadFailed {
            path: input.clone(),
            reason: e.to_string(),
        })?;

        let format = Self::effective_format(&config, options);
        let output = match output {
            Some(path) => absolute_path(path)?,
            None => default_output_path(&input, &format),
        };

        self.compile_source(&config, &source, bindings, input.parent(), Some(output), options).await
    }

    fn preprocess_with(
        config: &TypstConfig,
        renderer: &TemplateRenderer,
        source: &str,
        bindings: &Bindings,
        base_dir: Option<&Path>,
    ) -> Result<Resolution> {
        // The renderer gates first; bound data never passes through the template engine
        let rendered = renderer.render(ENTRYPOINT_NAME, source, bindings)?;
        let expanded = expand_data_imports(&rendered, bindings);

        let paths = PathResolver::new(ProjectPaths::from_config(config));
        ImportResolver::new(&paths, renderer, bindings).resolve(&expanded, base_dir)
    }

    async fn compile_source(
        &self,
        config: &TypstConfig,
        source: &str,
        bindings: &Bindings,
        base_dir: Option<&Path>,
        output: Option<PathBuf>,
        options: &CompileOptions,
    ) -> Result<PathBuf> {
        let resolution = Self::preprocess_with(config, &self.renderer, source, bindings, base_dir)?;

        let workspace = ScratchWorkspace::from_config(config)?;
        let mut job = workspace.begin_job()?;

        for file in &resolution.files {
            job.write_dependency(&file.entry.scratch_filename, &file.content)?;
        }
        let input = job.allocate_input(&resolution.entrypoint)?;

        let format = Self::effective_format(config, options);
        let output = output.unwrap_or_else(|| workspace.output_path_for(&input, &format));
        let root = options.root.as_deref().unwrap_or_else(|| config.effective_root());

        tracing::debug!(
            target: "typst",
            "Compiling {} -> {} ({} dependency file(s))",
            input.display(),
            output.display(),
            resolution.files.len()
        );

        TypstCommand::compile(&config.bin_path, &input, &output)
            .root(root)
            .font_paths(config.font_paths.iter().chain(options.font_paths.iter()))
            .current_dir(workspace.directory())
            .with_timeout(config.timeout_duration())
            .with_context(crate::utils::fs::file_name_str(&input))
            .execute()
            .await?;

        drop(job);
        Ok(output)
    }

    fn effective_format(config: &TypstConfig, options: &CompileOptions) -> String {
        match options.format.as_deref() {
            Some(format) if is_safe_format(format) => format.to_string(),
            Some(format) => {
                tracing::warn!(
                    target: "typst",
                    "Rejected format {:?}; using '{}'",
                    format,
                    config.format
                );
                config.format.clone()
            }
            None => config.format.clone(),
        }
    }
}

/// `<dir>/<stem>.<format>`, or `<dir>/<stem>.out.<format>` when that is `input` itself.
fn default_output_path(input: &Path, format: &str) -> PathBuf {
    let candidate = input.with_extension(format);
    if candidate == input {
        input.with_extension(format!("out.{format}"))
    } else {
        candidate
    }
}

/// The compiler runs in the scratch directory, so relative outputs are anchored here.
fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir().map(|cwd| cwd.join(path)).map_err(|e| TypstError::Other {
        message: format!("Cannot resolve output path {}: {}", path.display(), e),
    })
}
