//! Post-processing transforms for generated TypeScript sources.
//!
//! Each [`Transform`] maps a file's text to either `None` (no change) or
//! replacement text. [`TransformPipeline`] runs the registered transforms in
//! order, feeding each one the previous output.
//!
//! ## Default Pipeline
//!
//! 1. [`EnumCollapse`] with [`EnumSelection::Suffixed`]: every `*Enum`
//!    declaration, regardless of size
//! 2. [`EnumCollapse`] with [`EnumSelection::Large`]: any remaining enum at
//!    or above the member threshold

mod edits;
mod enum_collapse;
mod imports;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use tree_sitter::{Language, Parser, Tree};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::output::{read_source, write_atomic};

pub use edits::{EditError, TextEdit, TransformationRecord, apply_edits};
pub use enum_collapse::{BRANDED_TYPE, EnumCollapse, EnumSelection, RESERVED_SUFFIX, TargetShape};
pub use imports::{NamedImport, ensure_named_import, relative_specifier};

/// Errors raised while transforming a single file.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to load the TypeScript grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("tree-sitter returned no syntax tree")]
    ParseFailed,

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// How a collapsed enum is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollapseMode {
    /// Branded above the threshold, union otherwise.
    #[default]
    Auto,
    /// Always emit an opaque branded alias.
    Branded,
    /// Always emit a union of the literal values.
    Union,
}

impl CollapseMode {
    /// Parses a mode, substituting `Auto` for unrecognised input.
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "Unrecognised enum collapse mode, using auto");
            Self::Auto
        })
    }
}

impl fmt::Display for CollapseMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auto => "auto",
            Self::Branded => "branded",
            Self::Union => "union",
        };
        formatter.write_str(label)
    }
}

impl FromStr for CollapseMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "branded" => Ok(Self::Branded),
            "union" => Ok(Self::Union),
            other => Err(format!("unknown collapse mode '{}'", other)),
        }
    }
}

/// A text-to-text rewrite applied to each generated file.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the rewritten text, or `None` when nothing changed.
    ///
    /// `path` is the file's location relative to the output root, so
    /// relative module specifiers can be resolved from it.
    fn apply(&self, source: &str, path: &Path) -> Result<Option<String>, TransformError>;
}

/// Files changed by [`TransformPipeline::process_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub scanned: usize,
    pub changed: Vec<PathBuf>,
}

/// Ordered list of transforms.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries(self.transforms.iter().map(|t| t.name()))
            .finish()
    }
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both enum-collapse variants, suffixed first.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new()
            .with(EnumCollapse::from_config(EnumSelection::Suffixed, config))
            .with(EnumCollapse::from_config(EnumSelection::Large, config))
    }

    /// Appends a transform to the end of the pipeline.
    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// Runs every transform in order over `source`.
    ///
    /// Returns `None` when no transform changed the text.
    pub fn run(&self, source: &str, path: &Path) -> Result<Option<String>, TransformError> {
        let mut current: Option<String> = None;

        for transform in &self.transforms {
            let input = current.as_deref().unwrap_or(source);
            if let Some(output) = transform.apply(input, path)? {
                debug!(transform = transform.name(), file = %path.display(), "Transform changed file");
                current = Some(output);
            }
        }

        Ok(current.filter(|output| output != source))
    }

    /// Transforms one file under `root` in place. Returns whether it changed.
    #[instrument(skip(self, root), fields(file = %path.display()))]
    pub fn process_file(&self, root: &Path, path: &Path) -> Result<bool, PipelineError> {
        let source = read_source(path)?;
        let relative = relative_to(root, path);

        let output = self
            .run(&source, relative)
            .map_err(|source| PipelineError::Transform {
                path: path.to_path_buf(),
                source,
            })?;

        match output {
            Some(output) => {
                write_atomic(path, &output)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Transforms every `.ts` / `.tsx` file under `dir`, one at a time.
    pub fn process_dir(&self, dir: &Path) -> Result<TransformReport, PipelineError> {
        let mut report = TransformReport::default();

        let walker = WalkBuilder::new(dir)
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = entry.map_err(|source| PipelineError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;

            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) || !is_typescript(path) {
                continue;
            }

            report.scanned += 1;
            if self.process_file(dir, path)? {
                report.changed.push(path.to_path_buf());
            }
        }

        info!(
            scanned = report.scanned,
            changed = report.changed.len(),
            "Post-processing complete"
        );
        Ok(report)
    }
}

/// `path` relative to `root`; files outside `root` are treated as if they
/// sat directly inside it.
fn relative_to<'p>(root: &Path, path: &'p Path) -> &'p Path {
    match path.strip_prefix(root) {
        Ok(relative) => relative,
        Err(_) => path.file_name().map(Path::new).unwrap_or(path),
    }
}

fn is_typescript(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "ts" | "tsx" | "mts" | "cts"))
}

fn language_for(path: &Path) -> Language {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

/// Parses TypeScript (or TSX, by extension) source.
pub(crate) fn parse_typescript(source: &str, path: &Path) -> Result<Tree, TransformError> {
    let mut parser = Parser::new();
    parser.set_language(&language_for(path))?;
    parser.parse(source, None).ok_or(TransformError::ParseFailed)
}
