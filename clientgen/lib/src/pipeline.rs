//! End-to-end orchestration of a generation run.
//!
//! The flow is version detection, then adapter selection, then template
//! validation, generation, post-processing transforms and optional
//! formatting. [`Pipeline`] owns the long-lived pieces: the compiled
//! template cache, the performance monitor and its reporter thread, the
//! adapter registry and the transform pipeline.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument, warn};

use crate::adapters::{AdapterRegistry, DetectionResult, FallbackMode, GenerateOptions, default_registry, detect_adapter};
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::format::Formatter;
use crate::render::{
    CachedEngine, CompiledTemplate, HandlebarsEngine, PerformanceMonitor, RegressionReporter, Renderer,
    TemplateCache,
};
use crate::transform::{TransformPipeline, TransformReport};
use crate::validation::validate_templates;

/// Inputs for a single [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub description: PathBuf,
    pub output_dir: PathBuf,
    pub template_dir: PathBuf,
    /// Overrides the configured fallback mode when set.
    pub fallback: Option<FallbackMode>,
    /// Continue even when required templates are missing.
    pub force: bool,
    pub use_options: bool,
    pub use_union_types: bool,
    pub formatter: Option<Formatter>,
}

impl RunRequest {
    /// A request with both generator options enabled and no formatter.
    pub fn new(
        description: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        template_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            description: description.into(),
            output_dir: output_dir.into(),
            template_dir: template_dir.into(),
            fallback: None,
            force: false,
            use_options: true,
            use_union_types: true,
            formatter: None,
        }
    }
}

/// Owned copy of the detection result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSummary {
    pub version: String,
    pub adapter: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub dialect: String,
    pub is_explicitly_supported: bool,
    pub applied_fallback: Option<FallbackMode>,
}

impl From<&DetectionResult<'_>> for DetectionSummary {
    fn from(result: &DetectionResult<'_>) -> Self {
        Self {
            version: result.version.clone(),
            adapter: result.adapter.name().to_string(),
            major_version: result.major_version,
            minor_version: result.minor_version,
            dialect: result.dialect.clone(),
            is_explicitly_supported: result.is_explicitly_supported,
            applied_fallback: result.applied_fallback,
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub detection: DetectionSummary,
    /// The fallback mode that was in effect.
    pub fallback_mode: FallbackMode,
    /// Templates that were missing when `force` let the run continue.
    pub missing_templates: Vec<String>,
    pub transform: TransformReport,
    /// `None` when no formatter was requested.
    pub formatted: Option<bool>,
}

/// Top-level orchestrator.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    cache: Arc<TemplateCache<CompiledTemplate>>,
    monitor: Arc<Mutex<PerformanceMonitor>>,
    reporter: Option<Arc<RegressionReporter>>,
    registry: AdapterRegistry,
    transforms: TransformPipeline,
}

impl Pipeline {
    /// Builds the default pipeline: template adapters backed by a cached
    /// Handlebars engine, and both enum-collapse transforms.
    pub fn new(config: PipelineConfig) -> Self {
        let cache = Arc::new(TemplateCache::new());
        let monitor = Arc::new(Mutex::new(PerformanceMonitor::from_config(&config)));

        let reporter = if config.skip_perf_tracking {
            debug!("Template performance tracking disabled");
            None
        } else {
            match RegressionReporter::spawn(Arc::clone(&monitor), config.ci) {
                Ok(reporter) => Some(Arc::new(reporter)),
                Err(err) => {
                    warn!(error = %err, "Could not start performance reporter, tracking disabled");
                    None
                }
            }
        };

        let renderer: Arc<dyn Renderer> = Arc::new(CachedEngine::new(
            HandlebarsEngine::new(),
            Arc::clone(&cache),
            reporter.clone(),
        ));

        Self {
            registry: default_registry(renderer),
            transforms: TransformPipeline::from_config(&config),
            config,
            cache,
            monitor,
            reporter,
        }
    }

    /// Replaces the adapter registry.
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the post-processing transforms.
    pub fn with_transforms(mut self, transforms: TransformPipeline) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn template_cache(&self) -> &TemplateCache<CompiledTemplate> {
        &self.cache
    }

    pub fn monitor(&self) -> &Mutex<PerformanceMonitor> {
        &self.monitor
    }

    pub fn is_tracking_performance(&self) -> bool {
        self.reporter.is_some()
    }

    /// The explicit mode if given, otherwise the configured one.
    pub fn resolve_fallback(&self, explicit: Option<FallbackMode>) -> FallbackMode {
        explicit.unwrap_or(self.config.fallback_mode)
    }

    /// Waits for pending render timings to be compared and persisted.
    pub fn flush_performance(&self) {
        if let Some(reporter) = &self.reporter {
            reporter.flush();
        }
    }

    /// Empties the template cache and forgets the loaded baseline.
    pub fn clear_caches(&self) {
        self.flush_performance();
        self.cache.clear();
        if let Ok(mut monitor) = self.monitor.lock() {
            monitor.clear();
        }
    }

    /// Re-reads the baseline file.
    pub fn reload_baseline(&self) {
        self.flush_performance();
        if let Ok(mut monitor) = self.monitor.lock() {
            monitor.reload();
        }
    }

    /// Runs one generation from description to formatted output.
    ///
    /// ## Errors
    ///
    /// - `PipelineError::Description` if the description cannot be loaded
    /// - `PipelineError::UnsupportedVersion` under `strict` with no match
    /// - `PipelineError::MissingTemplates` unless `request.force` is set
    /// - `PipelineError::Generator` if the adapter fails
    /// - write and transform errors from post-processing
    #[instrument(skip(self, request), fields(description = %request.description.display()))]
    pub fn run(&self, request: &RunRequest) -> Result<RunReport, PipelineError> {
        let fallback_mode = self.resolve_fallback(request.fallback);

        let detection = detect_adapter(&self.registry, &request.description, fallback_mode)?;
        info!(
            version = %detection.version,
            adapter = detection.adapter.name(),
            explicit = detection.is_explicitly_supported,
            "Selected adapter"
        );

        let validation = validate_templates(&request.template_dir);
        if !validation.valid {
            if !request.force {
                return Err(PipelineError::MissingTemplates {
                    dir: request.template_dir.clone(),
                    missing: validation.missing_templates,
                });
            }
            warn!(
                dir = %request.template_dir.display(),
                missing = %validation.missing_templates.join(", "),
                "Required templates are missing, continuing because of --force"
            );
        }

        fs::create_dir_all(&request.output_dir).map_err(|source| PipelineError::WriteError {
            path: request.output_dir.clone(),
            source,
        })?;

        let options = GenerateOptions {
            use_options: request.use_options,
            use_union_types: request.use_union_types,
            template_dir: request.template_dir.clone(),
        };
        detection
            .adapter
            .generate(&request.description, &request.output_dir, &options)?;

        let transform = self.transforms.process_dir(&request.output_dir)?;

        let formatted = request
            .formatter
            .as_ref()
            .map(|formatter| formatter.run(&request.output_dir));

        Ok(RunReport {
            detection: DetectionSummary::from(&detection),
            fallback_mode,
            missing_templates: validation.missing_templates,
            transform,
            formatted,
        })
    }
}
