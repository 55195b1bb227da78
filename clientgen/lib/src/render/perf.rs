//! Render-time regression tracking against a persisted baseline.
//!
//! The first time a template key is seen, its render time becomes the
//! baseline and is written to disk. Later renders slower than
//! [`REGRESSION_FACTOR`] times the baseline produce a [`RegressionNotice`].
//! Baselines are never updated once set.
//!
//! Observations are handed to a [`RegressionReporter`], a single worker
//! thread that owns all baseline writes. Rendering never waits on it and
//! its failures are only logged.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::output::write_atomic;

/// Render time above `baseline * REGRESSION_FACTOR` counts as a regression.
pub const REGRESSION_FACTOR: f64 = 2.0;

/// Templates longer than this are truncated to form their key.
const KEY_LIMIT: usize = 50;

/// Characters kept from a truncated template.
const KEY_PREFIX: usize = 47;

/// Errors loading or persisting the baseline file.
#[derive(Debug, Error)]
pub enum PerfError {
    #[error("failed to read baseline '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("baseline '{path}' is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize baseline: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Persist(#[from] PipelineError),
}

/// Tracking key for a template.
///
/// Long templates are cut to their first 47 characters plus `...`, so
/// distinct templates sharing that prefix share one baseline.
///
/// ```
/// use clientgen::render::performance_key;
///
/// assert_eq!(performance_key("{{title}}"), "{{title}}");
/// assert_eq!(performance_key(&"x".repeat(60)), format!("{}...", "x".repeat(47)));
/// ```
pub fn performance_key(template: &str) -> String {
    if template.chars().count() <= KEY_LIMIT {
        return template.to_string();
    }

    let prefix: String = template.chars().take(KEY_PREFIX).collect();
    format!("{}...", prefix)
}

/// On-disk baseline: `{ "templates": { key: millis }, "lastUpdated": ISO8601 }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceBaseline {
    #[serde(default)]
    pub templates: BTreeMap<String, f64>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl PerformanceBaseline {
    /// Loads the baseline, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self, PerfError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(PerfError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| PerfError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), PerfError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, &json)?;
        Ok(())
    }
}

/// A render that took notably longer than its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionNotice {
    pub key: String,
    pub baseline_ms: f64,
    pub observed_ms: f64,
}

impl RegressionNotice {
    /// Formats the notice; `ci` selects a GitHub Actions annotation.
    pub fn render(&self, ci: bool) -> String {
        let ratio = if self.baseline_ms > 0.0 {
            self.observed_ms / self.baseline_ms
        } else {
            f64::INFINITY
        };

        if ci {
            format!(
                "::warning title=Template render regression::Template \"{}\" rendered in {:.2}ms, {:.1}x its {:.2}ms baseline",
                self.key, self.observed_ms, ratio, self.baseline_ms
            )
        } else {
            format!(
                "Template render regression: \"{}\" took {:.2}ms ({:.1}x the {:.2}ms baseline)",
                self.key, self.observed_ms, ratio, self.baseline_ms
            )
        }
    }

    /// Prints the annotation to stdout under CI, otherwise logs a warning.
    pub fn emit(&self, ci: bool) {
        if ci {
            println!("{}", self.render(true));
        } else {
            warn!("{}", self.render(false));
        }
    }
}

/// Result of comparing one render time against the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// First sighting of the key; the time is now its baseline.
    Recorded,
    WithinBaseline,
    Regression(RegressionNotice),
}

/// Lazily loaded baseline plus the comparison rule.
#[derive(Debug)]
pub struct PerformanceMonitor {
    path: PathBuf,
    baseline: Option<PerformanceBaseline>,
}

impl PerformanceMonitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            baseline: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.baseline_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded baseline, reading the file on first use.
    fn loaded(&mut self) -> &mut PerformanceBaseline {
        let path = &self.path;
        self.baseline.get_or_insert_with(|| {
            PerformanceBaseline::load(path).unwrap_or_else(|err| {
                warn!(error = %err, "Could not load performance baseline, starting empty");
                PerformanceBaseline::default()
            })
        })
    }

    /// Compares `millis` against the stored baseline for `key`.
    ///
    /// An unseen key records `millis` as its baseline and persists the file
    /// right away. Persist failures are logged.
    pub fn observe(&mut self, key: &str, millis: f64) -> Observation {
        let path = self.path.clone();
        let baseline = self.loaded();

        match baseline.templates.get(key).copied() {
            None => {
                baseline.templates.insert(key.to_string(), millis);
                baseline.last_updated = Some(Utc::now());
                match baseline.save(&path) {
                    Ok(()) => debug!(key, millis, "Recorded new performance baseline"),
                    Err(err) => warn!(error = %err, "Could not persist performance baseline"),
                }
                Observation::Recorded
            }
            Some(baseline_ms) if millis > baseline_ms * REGRESSION_FACTOR => {
                Observation::Regression(RegressionNotice {
                    key: key.to_string(),
                    baseline_ms,
                    observed_ms: millis,
                })
            }
            Some(_) => Observation::WithinBaseline,
        }
    }

    /// Baseline for `key`, loading the file if needed.
    pub fn baseline_for(&mut self, key: &str) -> Option<f64> {
        self.loaded().templates.get(key).copied()
    }

    /// Forgets the loaded baseline; the next observation reads the file again.
    pub fn clear(&mut self) {
        self.baseline = None;
    }

    /// Re-reads the baseline file now.
    pub fn reload(&mut self) {
        self.clear();
        let count = self.loaded().templates.len();
        info!(templates = count, path = %self.path.display(), "Reloaded performance baseline");
    }
}

enum Message {
    Observe { key: String, elapsed: Duration },
    Flush(Sender<()>),
}

/// Background worker that feeds render timings into a shared monitor.
#[derive(Debug)]
pub struct RegressionReporter {
    sender: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl RegressionReporter {
    /// Starts the worker thread.
    ///
    /// ## Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(monitor: Arc<Mutex<PerformanceMonitor>>, ci: bool) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Message>();

        let worker = thread::Builder::new()
            .name("clientgen-perf".to_string())
            .spawn(move || {
                for message in receiver {
                    match message {
                        Message::Observe { key, elapsed } => {
                            let millis = elapsed.as_nanos() as f64 / 1_000_000.0;
                            let observation = match monitor.lock() {
                                Ok(mut monitor) => monitor.observe(&key, millis),
                                Err(_) => {
                                    warn!("Performance monitor lock poisoned, dropping observation");
                                    continue;
                                }
                            };
                            if let Observation::Regression(notice) = observation {
                                notice.emit(ci);
                            }
                        }
                        Message::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queues an observation without waiting for it to be processed.
    pub fn dispatch(&self, key: String, elapsed: Duration) {
        if let Some(sender) = &self.sender
            && sender.send(Message::Observe { key, elapsed }).is_err()
        {
            debug!("Regression reporter has stopped, observation dropped");
        }
    }

    /// Blocks until every observation queued so far has been processed.
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };

        let (ack, done) = mpsc::channel();
        if sender.send(Message::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

impl Drop for RegressionReporter {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("Regression reporter thread panicked");
        }
    }
}
