//! Client generation pipeline for OpenAPI and Swagger descriptions.
//!
//! A run turns an API description into a typed TypeScript client:
//!
//! - Detect the description's version and dialect
//! - Select a generator adapter, with an explicit fallback policy for
//!   versions no adapter claims
//! - Check that the required templates exist
//! - Generate sources, rendering templates through a compile cache that
//!   also tracks render-time regressions
//! - Collapse generated `enum` declarations into union or branded type
//!   aliases
//! - Optionally run an external formatter
//!
//! ## Modules
//!
//! - [`detect`] - Description parsing and version detection
//! - [`adapters`] - Generator adapters, registry and selection
//! - [`validation`] - Required template checks
//! - [`transform`] - Post-processing rewrites of generated TypeScript
//! - [`render`] - Template engine, compile cache and performance monitor
//! - [`format`] - External formatter invocation
//! - [`pipeline`] - The orchestrator tying the stages together
//! - [`config`] - Environment-derived configuration
//! - [`errors`] - The pipeline error type
//!
//! ## Example Usage
//!
//! ```no_run
//! use clientgen::config::PipelineConfig;
//! use clientgen::pipeline::{Pipeline, RunRequest};
//!
//! let pipeline = Pipeline::new(PipelineConfig::from_env());
//! let report = pipeline
//!     .run(&RunRequest::new("openapi.yaml", "src/generated", "templates"))
//!     .unwrap();
//!
//! println!("{} via {}", report.detection.version, report.detection.adapter);
//! ```

pub mod adapters;
pub mod config;
pub mod detect;
pub mod errors;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod transform;
pub mod validation;

pub use errors::PipelineError;
pub use pipeline::{Pipeline, RunReport, RunRequest};
