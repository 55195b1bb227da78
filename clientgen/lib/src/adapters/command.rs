use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument};

use super::{Adapter, GenerateOptions, matches_version_prefix};
use crate::errors::PipelineError;

/// Drives an external generator binary.
///
/// The binary is invoked as
/// `<program> --input <description> --output <out_dir> --templates <dir>`
/// followed by `--useOptions` and `--useUnionTypes` when enabled.
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    name: String,
    versions: Vec<String>,
    program: String,
}

impl CommandAdapter {
    pub fn new(name: &str, versions: &[&str], program: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
            program: program.to_string(),
        }
    }

    /// Builds the command without running it.
    pub fn command(&self, description: &Path, out_dir: &Path, options: &GenerateOptions) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--input")
            .arg(description)
            .arg("--output")
            .arg(out_dir)
            .arg("--templates")
            .arg(&options.template_dir);

        if options.use_options {
            command.arg("--useOptions");
        }
        if options.use_union_types {
            command.arg("--useUnionTypes");
        }

        command
    }
}

impl Adapter for CommandAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, version: &str) -> bool {
        matches_version_prefix(&self.versions, version)
    }

    #[instrument(skip(self, options), fields(adapter = %self.name, program = %self.program))]
    fn generate(
        &self,
        description: &Path,
        out_dir: &Path,
        options: &GenerateOptions,
    ) -> Result<(), PipelineError> {
        let output = self
            .command(description, out_dir, options)
            .output()
            .map_err(|e| PipelineError::Generator {
                adapter: self.name.clone(),
                message: format!("failed to run '{}': {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Generator {
                adapter: self.name.clone(),
                message: format!("'{}' exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }

        debug!("External generator finished");
        Ok(())
    }
}
