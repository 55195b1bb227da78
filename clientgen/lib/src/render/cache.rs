//! Compiled-template cache and the caching renderer built on it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tracing::debug;

use super::perf::{RegressionReporter, performance_key};
use super::{RenderError, Renderer, TemplateEngine};

/// Compiled templates keyed by their exact source text.
///
/// Entries never expire; only [`TemplateCache::clear`] removes them.
pub struct TemplateCache<C> {
    entries: Mutex<HashMap<String, Arc<C>>>,
}

impl<C> TemplateCache<C> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached compilation of `source`, compiling it on a miss.
    ///
    /// The lock is held while compiling, so concurrent callers with the same
    /// text never compile it twice.
    pub fn get_or_compile<F>(&self, source: &str, compile: F) -> Result<Arc<C>, RenderError>
    where
        F: FnOnce(&str) -> Result<C, RenderError>,
    {
        let mut entries = self.entries.lock().map_err(|_| RenderError::CacheLock)?;

        if let Some(compiled) = entries.get(source) {
            return Ok(Arc::clone(compiled));
        }

        debug!(len = source.len(), "Compiling template");
        let compiled = Arc::new(compile(source)?);
        entries.insert(source.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached compilation.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl<C> Default for TemplateCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for TemplateCache<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TemplateCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Wraps an engine so every render goes through the shared cache and,
/// when a reporter is attached, is timed for regression tracking.
pub struct CachedEngine<E: TemplateEngine> {
    engine: E,
    cache: Arc<TemplateCache<E::Compiled>>,
    reporter: Option<Arc<RegressionReporter>>,
}

impl<E: TemplateEngine> CachedEngine<E> {
    /// Pass `None` as the reporter to bypass performance tracking.
    pub fn new(
        engine: E,
        cache: Arc<TemplateCache<E::Compiled>>,
        reporter: Option<Arc<RegressionReporter>>,
    ) -> Self {
        Self {
            engine,
            cache,
            reporter,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn cache(&self) -> &TemplateCache<E::Compiled> {
        &self.cache
    }
}

impl<E: TemplateEngine> fmt::Debug for CachedEngine<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CachedEngine")
            .field("engine", &self.engine)
            .field("cache", &self.cache)
            .field("tracking", &self.reporter.is_some())
            .finish()
    }
}

impl<E: TemplateEngine> Renderer for CachedEngine<E> {
    fn render(&self, template: &str, data: &Value) -> Result<String, RenderError> {
        let started = Instant::now();

        let compiled = self
            .cache
            .get_or_compile(template, |source| self.engine.compile(source))?;
        let output = self.engine.render_compiled(&compiled, data)?;

        if let Some(reporter) = &self.reporter {
            reporter.dispatch(performance_key(template), started.elapsed());
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HandlebarsEngine;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that records how often it compiles.
    #[derive(Debug, Default)]
    struct CountingEngine {
        compiles: AtomicUsize,
    }

    impl TemplateEngine for CountingEngine {
        type Compiled = String;

        fn compile(&self, source: &str) -> Result<String, RenderError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            Ok(source.to_uppercase())
        }

        fn render_compiled(&self, compiled: &String, _data: &Value) -> Result<String, RenderError> {
            Ok(compiled.clone())
        }
    }

    fn counting() -> CachedEngine<CountingEngine> {
        CachedEngine::new(CountingEngine::default(), Arc::new(TemplateCache::new()), None)
    }

    fn compiles(renderer: &CachedEngine<CountingEngine>) -> usize {
        renderer.engine().compiles.load(Ordering::SeqCst)
    }

    #[test]
    fn same_text_compiles_once() {
        let renderer = counting();
        for _ in 0..5 {
            assert_eq!(renderer.render("abc", &json!({})).unwrap(), "ABC");
        }

        assert_eq!(compiles(&renderer), 1);
        assert_eq!(renderer.cache().len(), 1);
    }

    #[test]
    fn one_character_difference_compiles_twice() {
        let renderer = counting();
        renderer.render("{{name}}", &json!({})).unwrap();
        renderer.render("{{name}} ", &json!({})).unwrap();
        renderer.render("{{name}}", &json!({})).unwrap();

        assert_eq!(compiles(&renderer), 2);
    }

    #[test]
    fn clear_forces_recompilation() {
        let renderer = counting();
        renderer.render("abc", &json!({})).unwrap();
        renderer.cache().clear();
        assert!(renderer.cache().is_empty());

        renderer.render("abc", &json!({})).unwrap();
        assert_eq!(compiles(&renderer), 2);
    }

    #[test]
    fn compile_failure_is_not_cached() {
        let cache: TemplateCache<String> = TemplateCache::new();
        let err = cache
            .get_or_compile("bad", |_| Err(RenderError::Compile("nope".to_string())))
            .unwrap_err();

        assert!(matches!(err, RenderError::Compile(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_is_shared_between_renderers() {
        let cache = Arc::new(TemplateCache::new());
        let first = CachedEngine::new(HandlebarsEngine::new(), Arc::clone(&cache), None);
        first.render("{{a}}", &json!({ "a": 1 })).unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn engines_sharing_a_cache_render_their_own_text() {
        let cache = Arc::new(TemplateCache::new());
        let first = CachedEngine::new(HandlebarsEngine::new(), Arc::clone(&cache), None);
        let second = CachedEngine::new(HandlebarsEngine::new(), Arc::clone(&cache), None);

        assert_eq!(second.render("B", &json!({})).unwrap(), "B");
        assert_eq!(first.render("A", &json!({})).unwrap(), "A");
        assert_eq!(second.render("A", &json!({})).unwrap(), "A");
        assert_eq!(first.render("B", &json!({})).unwrap(), "B");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn renders_data_through_handlebars() {
        let renderer = CachedEngine::new(HandlebarsEngine::new(), Arc::new(TemplateCache::new()), None);
        let context = json!({ "title": "Petstore", "version": "3.1" });

        let output = renderer
            .render("// {{title}} (OpenAPI {{version}})", &context)
            .unwrap();
        assert_eq!(output, "// Petstore (OpenAPI 3.1)");
    }
}
