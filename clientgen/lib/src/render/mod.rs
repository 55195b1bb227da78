//! Template rendering for the built-in generator.
//!
//! [`TemplateEngine`] separates compiling a template from rendering it so
//! [`CachedEngine`] can compile each distinct template text exactly once.
//! Adapters only see the [`Renderer`] seam.
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//! use clientgen::render::{CachedEngine, HandlebarsEngine, Renderer, TemplateCache};
//! use serde_json::json;
//!
//! let cache = Arc::new(TemplateCache::new());
//! let renderer = CachedEngine::new(HandlebarsEngine::new(), cache, None);
//!
//! let output = renderer.render("export const title = '{{title}}';", &json!({ "title": "Pets" })).unwrap();
//! assert_eq!(output, "export const title = 'Pets';");
//! ```

mod cache;
mod perf;

use std::fmt;

use handlebars::{Context, Handlebars, RenderContext, Renderable, StringOutput, Template};
use serde_json::Value;
use thiserror::Error;

pub use cache::{CachedEngine, TemplateCache};
pub use perf::{
    Observation, PerfError, PerformanceBaseline, PerformanceMonitor, REGRESSION_FACTOR,
    RegressionNotice, RegressionReporter, performance_key,
};

/// Errors raised while compiling or rendering a template.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template failed to compile: {0}")]
    Compile(String),

    #[error("template failed to render: {0}")]
    Render(String),

    #[error("template cache lock was poisoned")]
    CacheLock,
}

/// A template engine with separate compile and render steps.
pub trait TemplateEngine: Send + Sync + fmt::Debug {
    /// Opaque compiled form of a template.
    type Compiled: Send + Sync;

    fn compile(&self, source: &str) -> Result<Self::Compiled, RenderError>;

    fn render_compiled(&self, compiled: &Self::Compiled, data: &Value) -> Result<String, RenderError>;
}

/// Renders template text against a JSON context.
pub trait Renderer: Send + Sync + fmt::Debug {
    fn render(&self, template: &str, data: &Value) -> Result<String, RenderError>;
}

/// A parsed template that renders on any [`HandlebarsEngine`].
///
/// The parsed form travels with the handle, so a cache shared between
/// engines never resolves a handle against another engine's templates.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    template: Template,
}

/// Handlebars engine with HTML escaping disabled.
///
/// The registry only supplies helpers and the escape function; compiled
/// templates are never registered in it.
#[derive(Debug)]
pub struct HandlebarsEngine {
    registry: Handlebars<'static>,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        Self { registry }
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for HandlebarsEngine {
    type Compiled = CompiledTemplate;

    fn compile(&self, source: &str) -> Result<CompiledTemplate, RenderError> {
        let template = Template::compile(source).map_err(|e| RenderError::Compile(e.to_string()))?;
        Ok(CompiledTemplate { template })
    }

    fn render_compiled(&self, compiled: &CompiledTemplate, data: &Value) -> Result<String, RenderError> {
        let context = Context::wraps(data).map_err(|e| RenderError::Render(e.to_string()))?;
        let mut render_context = RenderContext::new(None);
        let mut output = StringOutput::new();

        compiled
            .template
            .render(&self.registry, &context, &mut render_context, &mut output)
            .map_err(|e| RenderError::Render(e.to_string()))?;

        output.into_string().map_err(|e| RenderError::Render(e.to_string()))
    }
}
