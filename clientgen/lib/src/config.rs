//! Pipeline configuration resolved once at startup.
//!
//! Every recognised option is read from the environment exactly once by
//! [`PipelineConfig::from_env`] and then threaded explicitly into each
//! component. Tests build a config from a closure with
//! [`PipelineConfig::from_lookup`] so they never touch process state.
//!
//! ## Recognised Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `CLIENTGEN_ENUM_THRESHOLD` | `45` |
//! | `CLIENTGEN_ENUM_MODE` | `auto` |
//! | `CLIENTGEN_FALLBACK_MODE` | `auto` |
//! | `CLIENTGEN_SKIP_PERF` | unset |
//! | `CLIENTGEN_CACHE_DIR` | `.cache/clientgen` |
//! | `CLIENTGEN_BRANDED_IMPORT` | `./core/Branded` |
//!
//! Unrecognised values never fail: they fall back to the default and a
//! warning is logged.

use std::path::PathBuf;

use tracing::warn;

use crate::adapters::FallbackMode;
use crate::transform::CollapseMode;

pub const ENV_ENUM_THRESHOLD: &str = "CLIENTGEN_ENUM_THRESHOLD";
pub const ENV_ENUM_MODE: &str = "CLIENTGEN_ENUM_MODE";
pub const ENV_FALLBACK_MODE: &str = "CLIENTGEN_FALLBACK_MODE";
pub const ENV_SKIP_PERF: &str = "CLIENTGEN_SKIP_PERF";
pub const ENV_CACHE_DIR: &str = "CLIENTGEN_CACHE_DIR";
pub const ENV_BRANDED_IMPORT: &str = "CLIENTGEN_BRANDED_IMPORT";

/// Member count at which an enum becomes a collapse candidate.
pub const DEFAULT_ENUM_THRESHOLD: usize = 45;

/// Default directory for the persisted performance baseline.
pub const DEFAULT_CACHE_DIR: &str = ".cache/clientgen";

/// Default module that exports the `Branded` helper type.
pub const DEFAULT_BRANDED_IMPORT: &str = "./core/Branded";

/// Environment variables set by common CI providers.
const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "CIRCLECI",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Resolved configuration for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Member count threshold for the enum-collapse transforms.
    pub enum_threshold: usize,
    /// Target shape policy for collapsed enums.
    pub collapse_mode: CollapseMode,
    /// Fallback mode used when none is passed explicitly.
    pub fallback_mode: FallbackMode,
    /// Skip render-time regression tracking entirely.
    pub skip_perf_tracking: bool,
    /// Directory that holds the performance baseline file.
    pub cache_dir: PathBuf,
    /// Module specifier the branded-type import points at, relative to the
    /// output root. Nested files get a specifier climbing back to the root.
    pub branded_import: String,
    /// Whether a CI environment marker is set to an affirmative value.
    pub ci: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enum_threshold: DEFAULT_ENUM_THRESHOLD,
            collapse_mode: CollapseMode::Auto,
            fallback_mode: FallbackMode::Auto,
            skip_perf_tracking: false,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            branded_import: DEFAULT_BRANDED_IMPORT.to_string(),
            ci: false,
        }
    }
}

impl PipelineConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// ## Examples
    ///
    /// ```
    /// use clientgen::config::PipelineConfig;
    /// use clientgen::transform::CollapseMode;
    ///
    /// let config = PipelineConfig::from_lookup(|key| match key {
    ///     "CLIENTGEN_ENUM_MODE" => Some("branded".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.collapse_mode, CollapseMode::Branded);
    /// assert_eq!(config.enum_threshold, 45);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enum_threshold = match lookup(ENV_ENUM_THRESHOLD) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    warn!(
                        value = %raw,
                        default = DEFAULT_ENUM_THRESHOLD,
                        "Invalid {}, using default",
                        ENV_ENUM_THRESHOLD
                    );
                    DEFAULT_ENUM_THRESHOLD
                }
            },
            None => defaults.enum_threshold,
        };

        let collapse_mode = lookup(ENV_ENUM_MODE)
            .map(|raw| CollapseMode::parse_or_default(&raw))
            .unwrap_or(defaults.collapse_mode);

        let fallback_mode = lookup(ENV_FALLBACK_MODE)
            .map(|raw| FallbackMode::parse_or_default(&raw))
            .unwrap_or(defaults.fallback_mode);

        let skip_perf_tracking = lookup(ENV_SKIP_PERF)
            .map(|raw| is_truthy(&raw))
            .unwrap_or(false);

        let cache_dir = lookup(ENV_CACHE_DIR)
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let branded_import = lookup(ENV_BRANDED_IMPORT)
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or(defaults.branded_import);

        let ci = CI_MARKERS
            .iter()
            .any(|marker| lookup(marker).is_some_and(|raw| marks_ci(&raw)));

        Self {
            enum_threshold,
            collapse_mode,
            fallback_mode,
            skip_perf_tracking,
            cache_dir,
            branded_import,
            ci,
        }
    }

    /// Path of the persisted performance baseline.
    pub fn baseline_path(&self) -> PathBuf {
        self.cache_dir.join("template-performance.json")
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// A CI marker counts unless it is empty or explicitly disabled.
///
/// Markers such as `JENKINS_URL` carry arbitrary values, so anything other
/// than `""`, `0` or `false` is treated as set.
fn marks_ci(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "" | "0" | "false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    fn config_from(pairs: &[(&str, &str)]) -> PipelineConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(config_from(&[]), PipelineConfig::default());
    }

    #[test]
    fn reads_every_recognised_option() {
        let config = config_from(&[
            (ENV_ENUM_THRESHOLD, "20"),
            (ENV_ENUM_MODE, "union"),
            (ENV_FALLBACK_MODE, "strict"),
            (ENV_SKIP_PERF, "true"),
            (ENV_CACHE_DIR, "/tmp/perf"),
            (ENV_BRANDED_IMPORT, "@acme/brand"),
        ]);

        assert_eq!(config.enum_threshold, 20);
        assert_eq!(config.collapse_mode, CollapseMode::Union);
        assert_eq!(config.fallback_mode, FallbackMode::Strict);
        assert!(config.skip_perf_tracking);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/perf"));
        assert_eq!(config.branded_import, "@acme/brand");
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            (ENV_ENUM_THRESHOLD, "lots"),
            (ENV_ENUM_MODE, "fancy"),
            (ENV_FALLBACK_MODE, "sometimes"),
        ]);

        assert_eq!(config.enum_threshold, DEFAULT_ENUM_THRESHOLD);
        assert_eq!(config.collapse_mode, CollapseMode::Auto);
        assert_eq!(config.fallback_mode, FallbackMode::Auto);
    }

    #[test]
    #[traced_test]
    fn invalid_values_are_logged() {
        config_from(&[
            (ENV_ENUM_THRESHOLD, "lots"),
            (ENV_ENUM_MODE, "fancy"),
            (ENV_FALLBACK_MODE, "sometimes"),
        ]);

        assert!(logs_contain("Invalid CLIENTGEN_ENUM_THRESHOLD, using default"));
        assert!(logs_contain("Unrecognised enum collapse mode, using auto"));
        assert!(logs_contain("Unrecognised fallback mode, using auto"));
    }

    #[test]
    #[traced_test]
    fn valid_values_log_nothing() {
        config_from(&[(ENV_ENUM_THRESHOLD, "20"), (ENV_ENUM_MODE, "union")]);

        assert!(!logs_contain("Invalid CLIENTGEN_ENUM_THRESHOLD"));
        assert!(!logs_contain("Unrecognised enum collapse mode"));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = config_from(&[(ENV_ENUM_THRESHOLD, "0")]);
        assert_eq!(config.enum_threshold, DEFAULT_ENUM_THRESHOLD);
    }

    #[test]
    fn skip_perf_requires_truthy_value() {
        assert!(!config_from(&[(ENV_SKIP_PERF, "0")]).skip_perf_tracking);
        assert!(!config_from(&[(ENV_SKIP_PERF, "no")]).skip_perf_tracking);
        assert!(config_from(&[(ENV_SKIP_PERF, "1")]).skip_perf_tracking);
        assert!(config_from(&[(ENV_SKIP_PERF, "YES")]).skip_perf_tracking);
    }

    #[test]
    fn ci_markers_are_detected() {
        assert!(config_from(&[("GITHUB_ACTIONS", "true")]).ci);
        assert!(config_from(&[("CI", "1")]).ci);
        assert!(config_from(&[("JENKINS_URL", "https://ci.example.com/")]).ci);
        assert!(!config_from(&[]).ci);
    }

    #[test]
    fn disabled_ci_markers_are_ignored() {
        assert!(!config_from(&[("CI", "false")]).ci);
        assert!(!config_from(&[("CI", "FALSE")]).ci);
        assert!(!config_from(&[("CI", "0")]).ci);
        assert!(!config_from(&[("CI", "")]).ci);
        assert!(!config_from(&[("CI", "false"), ("GITHUB_ACTIONS", "")]).ci);
        assert!(config_from(&[("CI", "false"), ("GITLAB_CI", "true")]).ci);
    }

    #[test]
    fn baseline_path_lives_under_cache_dir() {
        let config = config_from(&[(ENV_CACHE_DIR, "build/cache")]);
        assert_eq!(
            config.baseline_path(),
            PathBuf::from("build/cache/template-performance.json")
        );
    }
}
