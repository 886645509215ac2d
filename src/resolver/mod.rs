//! Import graph resolution for Typst sources.
//!
//! The resolver turns an entrypoint and the files it (transitively) imports
//! into a [`Resolution`]: the entrypoint with its imports rewritten to scratch
//! file names, plus the content of every dependency, rendered where needed and
//! with its own imports rewritten the same way.
//!
//! # Algorithm
//!
//! 1. **Discovery**: a worklist starts with the entrypoint's imports. Each
//!    import is resolved with [`PathResolver`]; files not yet in the
//!    [`DependencyGraph`] are read, rendered if their name ends in `.tera.typ`,
//!    inserted, and queued so that their own imports are scanned from their
//!    directory. A file is visited at most once, so cycles terminate.
//! 2. **Rewrite**: every import in every discovered file and in the
//!    entrypoint whose target is in the graph has its path replaced by the
//!    target's scratch file name. Everything else stays byte-identical.
//!
//! Missing, absolute or malformed imports are not errors. They are left as
//! written for the compiler to report.
//!
//! Dependencies that are not valid UTF-8 are scanned through a lossy view.
//! When none of their imports need rewriting they are copied byte for byte.
//!
//! Resolution performs no writes; materializing the files is the caller's job.

pub mod dependency_graph;
pub mod path_resolver;


pub use dependency_graph::{DependencyEntry, DependencyGraph, scratch_filename};
pub use path_resolver::{PathResolver, ProjectPaths};

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::markup::{Bindings, rewrite_imports, scan_imports};
use crate::templating::{TemplateRenderer, is_render_eligible};
use crate::utils::fs::file_name_str;

/// A dependency ready to be written to the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Graph entry for the file.
    pub entry: DependencyEntry,
    /// Content after rendering and import rewriting.
    pub content: Vec<u8>,
}

impl ResolvedFile {
    /// Content as text, when it is valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// A discovered dependency before rewriting.
#[derive(Debug)]
struct Source {
    /// Rendered or lossily decoded text; imports are scanned here.
    text: String,
    /// Original bytes of a file that is not valid UTF-8.
    raw: Option<Vec<u8>>,
}

impl Source {
    fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => Self {
                text,
                raw: None,
            },
            Err(e) => {
                let raw = e.into_bytes();
                tracing::debug!(
                    target: "typst::resolver",
                    "{} is not valid UTF-8, scanning a lossy copy",
                    path.display()
                );
                Self {
                    text: String::from_utf8_lossy(&raw).into_owned(),
                    raw: Some(raw),
                }
            }
        })
    }
}

/// Output of [`ImportResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Entrypoint with its imports rewritten.
    pub entrypoint: String,
    /// Every reachable dependency.
    pub graph: DependencyGraph,
    /// One file per graph entry, in graph order.
    pub files: Vec<ResolvedFile>,
}

/// Resolves the import graph of one compilation.
pub struct ImportResolver<'a> {
    paths: &'a PathResolver,
    renderer: &'a TemplateRenderer,
    bindings: &'a Bindings,
}

impl<'a> ImportResolver<'a> {
    /// Create a resolver; `bindings` are used for `.tera.typ` dependencies.
    #[must_use]
    pub fn new(paths: &'a PathResolver, renderer: &'a TemplateRenderer, bindings: &'a Bindings) -> Self {
        Self {
            paths,
            renderer,
            bindings,
        }
    }

    /// Resolve every import reachable from `entrypoint`.
    ///
    /// `base_dir` is the directory the entrypoint's own imports are relative
    /// to; `None` resolves them against the template resource directory.
    ///
    /// # Errors
    ///
    /// Only rendering a `.tera.typ` dependency can fail, with
    /// [`TypstError::RenderError`](crate::core::TypstError::RenderError) or
    /// [`TypstError::SecurityRejection`](crate::core::TypstError::SecurityRejection).
    pub fn resolve(&self, entrypoint: &str, base_dir: Option<&Path>) -> Result<Resolution> {
        let (graph, sources) = self.discover(entrypoint, base_dir)?;

        let mut files = Vec::with_capacity(graph.len());
        for entry in graph.entries() {
            let Some(source) = sources.get(&entry.source_path) else {
                continue;
            };
            let rewritten = self.rewrite(&source.text, &graph, entry.source_path.parent());
            let content = match &source.raw {
                Some(raw) if rewritten == source.text => raw.clone(),
                Some(_) => {
                    tracing::warn!(
                        target: "typst::resolver",
                        "Rewrote imports of non-UTF-8 file {}; invalid bytes were replaced",
                        entry.source_path.display()
                    );
                    rewritten.into_bytes()
                }
                None => rewritten.into_bytes(),
            };
            files.push(ResolvedFile {
                entry: entry.clone(),
                content,
            });
        }

        let entrypoint = self.rewrite(entrypoint, &graph, base_dir);

        tracing::debug!(
            target: "typst::resolver",
            "Resolved {} dependency file(s)",
            graph.len()
        );

        Ok(Resolution {
            entrypoint,
            graph,
            files,
        })
    }

    /// Build the graph with a worklist, returning it with each file's
    /// (rendered) content.
    fn discover(
        &self,
        entrypoint: &str,
        base_dir: Option<&Path>,
    ) -> Result<(DependencyGraph, BTreeMap<PathBuf, Source>)> {
        let mut graph = DependencyGraph::new();
        let mut sources: BTreeMap<PathBuf, Source> = BTreeMap::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();

        self.enqueue_imports(entrypoint, base_dir, &mut graph, &mut sources, &mut queue)?;

        while let Some(path) = queue.pop_front() {
            let Some(text) = sources.get(&path).map(|source| source.text.clone()) else {
                continue;
            };
            self.enqueue_imports(&text, path.parent(), &mut graph, &mut sources, &mut queue)?;
        }

        Ok((graph, sources))
    }

    fn enqueue_imports(
        &self,
        text: &str,
        current_dir: Option<&Path>,
        graph: &mut DependencyGraph,
        sources: &mut BTreeMap<PathBuf, Source>,
        queue: &mut VecDeque<PathBuf>,
    ) -> Result<()> {
        for directive in scan_imports(text) {
            if directive.is_absolute() {
                tracing::debug!(
                    target: "typst::resolver",
                    "Leaving absolute import '{}' untouched",
                    directive.path
                );
                continue;
            }

            let Some(path) = self.paths.resolve(&directive.path, current_dir) else {
                tracing::debug!(
                    target: "typst::resolver",
                    "Import '{}' not found, leaving it for the compiler",
                    directive.path
                );
                continue;
            };

            if graph.contains(&path) {
                continue;
            }

            let source = match Source::read(&path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(
                        target: "typst::resolver",
                        "Skipping unreadable import {}: {}",
                        path.display(),
                        e
                    );
                    continue;
                }
            };

            let source = if is_render_eligible(&path) {
                Source {
                    text: self.renderer.render(&file_name_str(&path), &source.text, self.bindings)?,
                    raw: None,
                }
            } else {
                source
            };

            tracing::debug!(
                target: "typst::resolver",
                "Discovered '{}' -> {}",
                directive.path,
                path.display()
            );

            graph.insert(path.clone(), &directive.path);
            sources.insert(path.clone(), source);
            queue.push_back(path);
        }
        Ok(())
    }

    /// Point every import of `text` that targets a graph entry at its scratch file.
    fn rewrite(&self, text: &str, graph: &DependencyGraph, current_dir: Option<&Path>) -> String {
        rewrite_imports(text, |directive| {
            if directive.is_absolute() {
                return None;
            }
            let path = self.paths.resolve(&directive.path, current_dir)?;
            let scratch = graph.scratch_filename_for(&path)?;
            tracing::debug!(target: "typst::resolver", "Rewriting '{}' -> '{}'", directive.path, scratch);
            Some(scratch.to_string())
        })
    }
}
