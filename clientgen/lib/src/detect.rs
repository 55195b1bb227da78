//! Description document parsing and version detection.
//!
//! Detection looks at three keys, in priority order:
//!
//! 1. `jsonSchemaDialect` (explicit dialect URL, OpenAPI 3.1+)
//! 2. `openapi` (OpenAPI 3.x)
//! 3. `swagger` (Swagger 2.0)
//!
//! A document with none of them is reported as `"unknown"` rather than
//! rejected, so the adapter selector can still apply its fallback policy.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Placeholder used when no version or dialect can be determined.
pub const UNKNOWN: &str = "unknown";

const DIALECT_KEY: &str = "jsonSchemaDialect";
const VERSION_KEY: &str = "openapi";
const LEGACY_VERSION_KEY: &str = "swagger";
const DIALECT_BASE_URL: &str = "https://spec.openapis.org/dialect";

static MAJOR_MINOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)").expect("Invalid regex"));

/// An unquoted numeric `openapi` / `swagger` value as written in the source.
static NUMERIC_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']?\b(openapi|swagger)["']?[ \t]*:[ \t]*(\d+(?:\.\d+)?)\b"#).expect("Invalid regex")
});

/// Errors raised while loading a description document.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("unable to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("top level must be a mapping, found {found}")]
    NotAMapping { found: &'static str },
}

/// A parsed API description.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionDocument {
    root: Value,
}

impl DescriptionDocument {
    /// Parses JSON or YAML text.
    ///
    /// Text whose first non-whitespace character is `{` is parsed as JSON,
    /// everything else as YAML.
    ///
    /// An unquoted version such as `openapi: 3.10` parses as the float
    /// `3.1`; the literal is recovered from the text so the version keeps
    /// its trailing zeros.
    ///
    /// ## Errors
    ///
    /// Returns `DetectError` if the text does not parse or is not a mapping.
    pub fn parse(contents: &str) -> Result<Self, DetectError> {
        let mut root: Value = if contents.trim_start().starts_with('{') {
            serde_json::from_str(contents)?
        } else {
            serde_yaml::from_str(contents)?
        };

        if !root.is_object() {
            return Err(DetectError::NotAMapping {
                found: value_kind(&root),
            });
        }

        restore_numeric_versions(&mut root, contents);
        Ok(Self { root })
    }

    /// Reads and parses a description file.
    pub fn from_file(path: &Path) -> Result<Self, DetectError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// The explicit dialect identifier, if declared.
    pub fn dialect(&self) -> Option<String> {
        self.root.get(DIALECT_KEY).and_then(scalar_to_string)
    }

    /// The declared version, preferring `openapi` over `swagger`.
    pub fn version(&self) -> Option<String> {
        self.root
            .get(VERSION_KEY)
            .and_then(scalar_to_string)
            .or_else(|| self.root.get(LEGACY_VERSION_KEY).and_then(scalar_to_string))
    }

    /// The API title from `info.title`.
    pub fn title(&self) -> Option<&str> {
        self.root.get("info")?.get("title")?.as_str()
    }

    /// The underlying document tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

/// Normalised version information for a description document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: String,
    pub dialect: String,
    pub major_version: u32,
    pub minor_version: u32,
}

impl VersionInfo {
    fn unknown() -> Self {
        Self {
            version: UNKNOWN.to_string(),
            dialect: UNKNOWN.to_string(),
            major_version: 0,
            minor_version: 0,
        }
    }

    /// Whether neither a dialect nor a version was found.
    pub fn is_unknown(&self) -> bool {
        self.version == UNKNOWN
    }
}

/// Extracts version information from a parsed document.
///
/// Never fails: missing or malformed fields yield `"unknown"` and zeroed
/// numeric components.
///
/// ## Examples
///
/// ```
/// use clientgen::detect::{DescriptionDocument, detect_version};
///
/// let doc = DescriptionDocument::parse(r#"{ "openapi": "3.1.0" }"#).unwrap();
/// let info = detect_version(&doc);
///
/// assert_eq!(info.version, "3.1.0");
/// assert_eq!(info.dialect, "https://spec.openapis.org/dialect/3.1.0");
/// assert_eq!((info.major_version, info.minor_version), (3, 1));
/// ```
pub fn detect_version(document: &DescriptionDocument) -> VersionInfo {
    if let Some(dialect) = document.dialect() {
        let version = MAJOR_MINOR
            .find(&dialect)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let (major_version, minor_version) = parse_major_minor(&version);

        return VersionInfo {
            version,
            dialect,
            major_version,
            minor_version,
        };
    }

    match document.version() {
        Some(version) => {
            let (major_version, minor_version) = parse_major_minor(&version);
            VersionInfo {
                dialect: format!("{}/{}", DIALECT_BASE_URL, version),
                version,
                major_version,
                minor_version,
            }
        }
        None => VersionInfo::unknown(),
    }
}

/// Reads, parses and detects the version of a description file.
///
/// ## Errors
///
/// Returns `DetectError` if the file cannot be read or parsed; callers
/// treat this as fatal since no adapter can be chosen without a version.
pub fn detect_file(path: &Path) -> Result<VersionInfo, DetectError> {
    let document = DescriptionDocument::from_file(path)?;
    Ok(detect_version(&document))
}

/// Parses the leading digits of the first two dot-separated components.
///
/// Components that do not start with a digit parse as `0`.
///
/// ```
/// use clientgen::detect::parse_major_minor;
///
/// assert_eq!(parse_major_minor("3.1.0"), (3, 1));
/// assert_eq!(parse_major_minor("2.0"), (2, 0));
/// assert_eq!(parse_major_minor("3.0.0-rc1"), (3, 0));
/// assert_eq!(parse_major_minor("unknown"), (0, 0));
/// ```
pub fn parse_major_minor(version: &str) -> (u32, u32) {
    let mut parts = version.split('.');
    let major = parts.next().map(leading_number).unwrap_or(0);
    let minor = parts.next().map(leading_number).unwrap_or(0);
    (major, minor)
}

fn leading_number(part: &str) -> u32 {
    let digits: String = part
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        // YAML `swagger: 2.0` arrives as a float
        Value::Number(n) => Some(format_number(n)),
        _ => None,
    }
}

/// Replaces numeric version values with their literal source text.
///
/// A literal is only used when it parses to the same number, so a match
/// elsewhere in the document (inside a description string, say) is ignored.
fn restore_numeric_versions(root: &mut Value, contents: &str) {
    for captures in NUMERIC_VERSION.captures_iter(contents) {
        let (Some(key), Some(literal)) = (captures.get(1), captures.get(2)) else {
            continue;
        };

        let Some(slot) = root.get_mut(key.as_str()) else {
            continue;
        };
        let Some(number) = slot.as_f64() else {
            continue;
        };

        if literal.as_str().parse::<f64>().ok() == Some(number) {
            *slot = Value::String(literal.as_str().to_string());
        }
    }
}

/// Formats a numeric version whose literal could not be recovered.
///
/// Lossy: `3.10` and `3.1` are the same float and both render as `3.1`.
/// Whole floats keep one decimal so `2.0` stays `2.0`.
fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && n.is_f64() => format!("{:.1}", f),
        _ => n.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(contents: &str) -> VersionInfo {
        let doc = DescriptionDocument::parse(contents).expect("document should parse");
        detect_version(&doc)
    }

    #[test]
    fn unquoted_yaml_version_keeps_trailing_zero() {
        let info = detect("openapi: 3.10\ninfo:\n  title: Pets\n");
        assert_eq!(info.version, "3.10");
        assert_eq!((info.major_version, info.minor_version), (3, 10));

        let quoted = detect("openapi: '3.10'\n");
        assert_eq!(quoted.version, "3.10");
    }

    #[test]
    fn unquoted_versions_match_their_source_text() {
        assert_eq!(detect("swagger: 2.0\n").version, "2.0");
        assert_eq!(detect(r#"{ "openapi": 3.10 }"#).version, "3.10");
        assert_eq!(detect("openapi: 3.0\n").version, "3.0");
    }

    #[test]
    fn unrelated_numeric_text_is_not_used_as_the_version() {
        let info = detect("info:\n  description: 'openapi: 3.20 is not real'\nopenapi: 3.1\n");
        assert_eq!(info.version, "3.1");
    }

    #[test]
    fn unrecoverable_numeric_version_formats_lossily() {
        let number = serde_json::Number::from_f64(3.10).unwrap();
        assert_eq!(format_number(&number), "3.1");
        let whole = serde_json::Number::from_f64(2.0).unwrap();
        assert_eq!(format_number(&whole), "2.0");
    }

    #[test]
    fn openapi_31_without_dialect_synthesizes_one() {
        let info = detect(r#"{ "openapi": "3.1.0" }"#);
        assert_eq!(info.version, "3.1.0");
        assert_eq!(info.dialect, "https://spec.openapis.org/dialect/3.1.0");
        assert_eq!(info.major_version, 3);
        assert_eq!(info.minor_version, 1);
    }

    #[test]
    fn explicit_dialect_wins_over_version_field() {
        let info = detect(
            r#"{
                "openapi": "3.0.3",
                "jsonSchemaDialect": "https://spec.openapis.org/oas/3.1/dialect/base"
            }"#,
        );
        assert_eq!(info.version, "3.1");
        assert_eq!(
            info.dialect,
            "https://spec.openapis.org/oas/3.1/dialect/base"
        );
        assert_eq!((info.major_version, info.minor_version), (3, 1));
    }

    #[test]
    fn dialect_without_numbers_is_unknown_version() {
        let info = detect(r#"{ "jsonSchemaDialect": "urn:custom:dialect" }"#);
        assert_eq!(info.version, UNKNOWN);
        assert_eq!(info.dialect, "urn:custom:dialect");
        assert_eq!((info.major_version, info.minor_version), (0, 0));
    }

    #[test]
    fn legacy_swagger_key_is_used_as_fallback() {
        let info = detect("swagger: \"2.0\"\ninfo:\n  title: Petstore\n");
        assert_eq!(info.version, "2.0");
        assert_eq!(info.dialect, "https://spec.openapis.org/dialect/2.0");
        assert_eq!((info.major_version, info.minor_version), (2, 0));
    }

    #[test]
    fn unquoted_yaml_float_version_is_preserved() {
        let info = detect("swagger: 2.0\n");
        assert_eq!(info.version, "2.0");
    }

    #[test]
    fn missing_fields_yield_unknown() {
        for contents in [r#"{}"#, r#"{ "info": { "title": "x" } }"#, "paths: {}\n"] {
            let info = detect(contents);
            assert_eq!(info.version, UNKNOWN);
            assert_eq!(info.dialect, UNKNOWN);
            assert_eq!((info.major_version, info.minor_version), (0, 0));
            assert!(info.is_unknown());
        }
    }

    #[test]
    fn unparsable_components_default_to_zero() {
        let info = detect(r#"{ "openapi": "three.point.one" }"#);
        assert_eq!(info.version, "three.point.one");
        assert_eq!((info.major_version, info.minor_version), (0, 0));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = DescriptionDocument::parse(r#"{ "openapi": "#);
        assert!(matches!(result, Err(DetectError::Json(_))));
    }

    #[test]
    fn scalar_document_is_rejected() {
        let result = DescriptionDocument::parse("just a string");
        assert!(matches!(
            result,
            Err(DetectError::NotAMapping { found: "string" })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = detect_file(Path::new("/definitely/not/here/openapi.json"));
        assert!(matches!(result, Err(DetectError::Io(_))));
    }

    #[test]
    fn title_is_read_from_info() {
        let doc = DescriptionDocument::parse("openapi: 3.0.0\ninfo:\n  title: Directory API\n")
            .expect("document should parse");
        assert_eq!(doc.title(), Some("Directory API"));
    }
}
