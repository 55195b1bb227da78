//! Generator adapters and version-based adapter selection.
//!
//! An [`Adapter`] knows how to drive code generation for one family of
//! description versions. Adapters are registered up front through
//! [`AdapterRegistry::builder`]; the built registry is read-only.
//!
//! ## Fallback Policy
//!
//! When no adapter claims the detected version, [`FallbackMode`] decides:
//!
//! | Mode | Behaviour |
//! |---|---|
//! | `strict` | fail with [`SelectError::Unsupported`] |
//! | `warn` | use the default adapter and log a warning |
//! | `auto` | use the default adapter silently |

mod command;
mod template;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::detect::{VersionInfo, detect_file};
use crate::errors::PipelineError;
use crate::render::Renderer;

pub use command::CommandAdapter;
pub use template::TemplateAdapter;

/// Policy applied when no adapter explicitly supports a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FallbackMode {
    Strict,
    Warn,
    #[default]
    Auto,
}

impl FallbackMode {
    /// Parses a mode, substituting `Auto` for unrecognised input.
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "Unrecognised fallback mode, using auto");
            Self::Auto
        })
    }
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Strict => "strict",
            Self::Warn => "warn",
            Self::Auto => "auto",
        };
        formatter.write_str(label)
    }
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "warn" => Ok(Self::Warn),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown fallback mode '{}'", other)),
        }
    }
}

/// Options forwarded to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    /// Emit service methods that take a single options object.
    pub use_options: bool,
    /// Emit enums as unions of literal types.
    pub use_union_types: bool,
    /// Directory holding the generator templates.
    pub template_dir: PathBuf,
}

/// A pluggable driver for one or more description versions.
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Stable identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Whether this adapter explicitly handles `version`.
    fn supports(&self, version: &str) -> bool;

    /// Generates client sources for `description` into `out_dir`.
    fn generate(
        &self,
        description: &Path,
        out_dir: &Path,
        options: &GenerateOptions,
    ) -> Result<(), PipelineError>;
}

/// Returns true when `version` equals a prefix or extends it with `.`.
///
/// ```
/// use clientgen::adapters::matches_version_prefix;
///
/// let prefixes = ["3.1".to_string()];
/// assert!(matches_version_prefix(&prefixes, "3.1"));
/// assert!(matches_version_prefix(&prefixes, "3.1.0"));
/// assert!(!matches_version_prefix(&prefixes, "3.10.0"));
/// assert!(!matches_version_prefix(&prefixes, "3.0.3"));
/// ```
pub fn matches_version_prefix(prefixes: &[String], version: &str) -> bool {
    prefixes.iter().any(|prefix| {
        version == prefix
            || version
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Errors raised while choosing an adapter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no adapter supports version '{version}' (fallback mode: {mode})")]
    Unsupported { version: String, mode: FallbackMode },

    #[error("no adapter supports version '{version}' and no default adapter is registered")]
    NoDefault { version: String },
}

/// The outcome of [`AdapterRegistry::select`].
#[derive(Debug, Clone, Copy)]
pub struct Selection<'r> {
    pub adapter: &'r dyn Adapter,
    pub is_explicitly_supported: bool,
    /// Present only when the default adapter was used as a fallback.
    pub applied_fallback: Option<FallbackMode>,
}

/// Read-only set of adapters with one designated default.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
    default: Option<usize>,
}

/// Collects adapters before the registry is frozen.
#[derive(Debug, Default)]
pub struct AdapterRegistryBuilder {
    adapters: Vec<Arc<dyn Adapter>>,
    default: Option<usize>,
}

impl AdapterRegistryBuilder {
    /// Registers an adapter. Earlier registrations win ties in selection.
    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Registers an adapter and marks it as the fallback target.
    pub fn default_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.default = Some(self.adapters.len());
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            adapters: self.adapters,
            default: self.default,
        }
    }
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// Names of all registered adapters in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }

    /// The designated fallback adapter, if any.
    pub fn default_adapter(&self) -> Option<&dyn Adapter> {
        self.default
            .and_then(|index| self.adapters.get(index))
            .map(|adapter| adapter.as_ref())
    }

    /// Chooses an adapter for `version` under `mode`.
    ///
    /// ## Errors
    ///
    /// Returns [`SelectError::Unsupported`] under `Strict` when nothing
    /// matches, and [`SelectError::NoDefault`] under `Warn`/`Auto` when
    /// nothing matches and no default is registered.
    pub fn select(&self, version: &str, mode: FallbackMode) -> Result<Selection<'_>, SelectError> {
        if let Some(adapter) = self
            .adapters
            .iter()
            .find(|adapter| adapter.supports(version))
        {
            debug!(version, adapter = adapter.name(), "Adapter explicitly supports version");
            return Ok(Selection {
                adapter: adapter.as_ref(),
                is_explicitly_supported: true,
                applied_fallback: None,
            });
        }

        if mode == FallbackMode::Strict {
            return Err(SelectError::Unsupported {
                version: version.to_string(),
                mode,
            });
        }

        let adapter = self.default_adapter().ok_or_else(|| SelectError::NoDefault {
            version: version.to_string(),
        })?;

        if mode == FallbackMode::Warn {
            warn!(
                version,
                adapter = adapter.name(),
                "No adapter explicitly supports this version, falling back to the default"
            );
        }

        Ok(Selection {
            adapter,
            is_explicitly_supported: false,
            applied_fallback: Some(mode),
        })
    }
}

/// Version detection combined with adapter selection.
#[derive(Debug, Clone)]
pub struct DetectionResult<'r> {
    pub version: String,
    pub adapter: &'r dyn Adapter,
    pub major_version: u32,
    pub minor_version: u32,
    pub dialect: String,
    pub is_explicitly_supported: bool,
    pub applied_fallback: Option<FallbackMode>,
}

impl<'r> DetectionResult<'r> {
    fn from_parts(info: VersionInfo, selection: Selection<'r>) -> Self {
        Self {
            version: info.version,
            adapter: selection.adapter,
            major_version: info.major_version,
            minor_version: info.minor_version,
            dialect: info.dialect,
            is_explicitly_supported: selection.is_explicitly_supported,
            applied_fallback: selection.applied_fallback,
        }
    }
}

/// Detects the version of `description` and selects an adapter for it.
///
/// ## Errors
///
/// Read and parse failures become `PipelineError::Description`; selection
/// failures are enriched with the version, path and mode.
pub fn detect_adapter<'r>(
    registry: &'r AdapterRegistry,
    description: &Path,
    mode: FallbackMode,
) -> Result<DetectionResult<'r>, PipelineError> {
    let info = detect_file(description).map_err(|source| PipelineError::Description {
        path: description.to_path_buf(),
        source,
    })?;

    let selection = registry
        .select(&info.version, mode)
        .map_err(|err| match err {
            SelectError::Unsupported { version, mode } => PipelineError::UnsupportedVersion {
                version,
                path: description.to_path_buf(),
                mode,
            },
            SelectError::NoDefault { version } => PipelineError::NoDefaultAdapter { version },
        })?;

    Ok(DetectionResult::from_parts(info, selection))
}

/// The built-in registry: one template adapter per supported version family.
///
/// `openapi-3.1` is the default and therefore the fallback target.
pub fn default_registry(renderer: Arc<dyn Renderer>) -> AdapterRegistry {
    AdapterRegistry::builder()
        .adapter(TemplateAdapter::new("swagger-2.0", &["2.0"], Arc::clone(&renderer)))
        .adapter(TemplateAdapter::new("openapi-3.0", &["3.0"], Arc::clone(&renderer)))
        .default_adapter(TemplateAdapter::new("openapi-3.1", &["3.1"], renderer))
        .build()
}

/// A registry that sends every version family to an external generator.
pub fn command_registry(program: &str) -> AdapterRegistry {
    AdapterRegistry::builder()
        .adapter(CommandAdapter::new("swagger-2.0", &["2.0"], program))
        .adapter(CommandAdapter::new("openapi-3.0", &["3.0"], program))
        .default_adapter(CommandAdapter::new("openapi-3.1", &["3.1"], program))
        .build()
}
