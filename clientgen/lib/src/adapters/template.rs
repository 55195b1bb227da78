use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument};

use super::{Adapter, GenerateOptions, matches_version_prefix};
use crate::detect::DescriptionDocument;
use crate::errors::PipelineError;
use crate::output::{read_source, write_atomic};
use crate::render::Renderer;

/// In-process generator that renders every `*.hbs` template in the template
/// directory into a `.ts` file of the same stem.
///
/// Each template receives `{ document, title, version, options }` as its
/// context, where `document` is the full description tree.
#[derive(Debug)]
pub struct TemplateAdapter {
    name: String,
    versions: Vec<String>,
    renderer: Arc<dyn Renderer>,
}

impl TemplateAdapter {
    pub fn new(name: &str, versions: &[&str], renderer: Arc<dyn Renderer>) -> Self {
        Self {
            name: name.to_string(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
            renderer,
        }
    }

    fn generator_error(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::Generator {
            adapter: self.name.clone(),
            message: message.into(),
        }
    }
}

impl Adapter for TemplateAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, version: &str) -> bool {
        matches_version_prefix(&self.versions, version)
    }

    #[instrument(skip(self, options), fields(adapter = %self.name))]
    fn generate(
        &self,
        description: &Path,
        out_dir: &Path,
        options: &GenerateOptions,
    ) -> Result<(), PipelineError> {
        let document = DescriptionDocument::from_file(description)
            .map_err(|e| self.generator_error(format!("cannot load description: {}", e)))?;

        let templates = list_templates(&options.template_dir)
            .map_err(|e| self.generator_error(format!("cannot list templates: {}", e)))?;

        let context = json!({
            "document": document.as_value(),
            "title": document.title(),
            "version": document.version(),
            "options": options,
        });

        for template_path in &templates {
            let Some(stem) = template_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let source = read_source(template_path)?;
            let rendered = self.renderer.render(&source, &context).map_err(|e| {
                self.generator_error(format!("{}: {}", template_path.display(), e))
            })?;

            let target = out_dir.join(format!("{}.ts", stem));
            debug!(template = %template_path.display(), target = %target.display(), "Rendered template");
            write_atomic(&target, &rendered)?;
        }

        info!(count = templates.len(), "Generated sources from templates");
        Ok(())
    }
}

/// Lists `*.hbs` files directly inside `dir`, sorted by name.
fn list_templates(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut templates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "hbs"))
        .collect();
    templates.sort();
    Ok(templates)
}
