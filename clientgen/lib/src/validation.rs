//! Pre-generation validation of the template directory.
//!
//! The check is pure: it only reports which required templates are absent.
//! Policy belongs to the caller. The pipeline treats missing templates as
//! fatal unless `--force` is given, in which case it logs a warning and
//! carries on.
//!
//! ## Examples
//!
//! ```
//! use clientgen::validation::{REQUIRED_TEMPLATES, validate_templates};
//!
//! let result = validate_templates(std::path::Path::new("/nonexistent/templates"));
//! assert!(!result.valid);
//! assert_eq!(result.missing_templates.len(), REQUIRED_TEMPLATES.len());
//! ```

use std::path::Path;

/// Templates every generator run needs, in reporting order.
pub const REQUIRED_TEMPLATES: &[&str] = &[
    "index.hbs",
    "client.hbs",
    "exportModel.hbs",
    "exportSchema.hbs",
    "exportService.hbs",
];

/// Outcome of [`validate_templates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValidation {
    pub valid: bool,
    /// Missing template names in [`REQUIRED_TEMPLATES`] order.
    pub missing_templates: Vec<String>,
}

/// Checks that every required template exists as a file in `template_dir`.
///
/// Never fails. A directory that does not exist reports every template
/// as missing.
pub fn validate_templates(template_dir: &Path) -> TemplateValidation {
    let missing_templates: Vec<String> = REQUIRED_TEMPLATES
        .iter()
        .filter(|name| !template_dir.join(name).is_file())
        .map(|name| name.to_string())
        .collect();

    TemplateValidation {
        valid: missing_templates.is_empty(),
        missing_templates,
    }
}
