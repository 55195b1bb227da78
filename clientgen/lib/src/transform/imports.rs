//! Detection and insertion of named TypeScript imports.

use std::path::{Component, Path};

use tree_sitter::Node;

use super::edits::{TextEdit, apply_edits};
use super::{TransformError, parse_typescript};

/// A single named binding imported from a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImport {
    pub name: String,
    pub source: String,
    pub type_only: bool,
}

impl NamedImport {
    pub fn type_only(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            type_only: true,
        }
    }

    /// The import statement as it is inserted into a file.
    ///
    /// ```
    /// use clientgen::transform::NamedImport;
    ///
    /// let import = NamedImport::type_only("Branded", "./core/Branded");
    /// assert_eq!(import.statement(), "import type { Branded } from './core/Branded';");
    /// ```
    pub fn statement(&self) -> String {
        let keyword = if self.type_only { "import type" } else { "import" };
        format!("{} {{ {} }} from '{}';", keyword, self.name, self.source)
    }
}

/// Resolves a module specifier written relative to the output root for a
/// file at `file`, itself relative to that root.
///
/// Bare package specifiers are returned unchanged.
///
/// ```
/// use std::path::Path;
/// use clientgen::transform::relative_specifier;
///
/// assert_eq!(relative_specifier("./core/Branded", Path::new("index.ts")), "./core/Branded");
/// assert_eq!(relative_specifier("./core/Branded", Path::new("models/Pet.ts")), "../core/Branded");
/// assert_eq!(relative_specifier("@acme/brand", Path::new("models/Pet.ts")), "@acme/brand");
/// ```
pub fn relative_specifier(module: &str, file: &Path) -> String {
    let rest = match module.strip_prefix("./") {
        Some(rest) => rest,
        None if module.starts_with("../") => module,
        None => return module.to_string(),
    };

    let depth = file
        .parent()
        .map(|dir| {
            dir.components()
                .filter(|component| matches!(component, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);

    if depth == 0 {
        return module.to_string();
    }

    format!("{}{}", "../".repeat(depth), rest)
}

/// Ensures `import` is present in `source`.
///
/// An existing import declaration counts when its module specifier equals
/// `import.source` and it binds `import.name` locally. Otherwise the
/// statement is inserted after the last import, or at the top of the file
/// when there are none.
///
/// Returns `None` when the import already exists.
pub fn ensure_named_import(
    source: &str,
    path: &Path,
    import: &NamedImport,
) -> Result<Option<String>, TransformError> {
    let tree = parse_typescript(source, path)?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut cursor = root.walk();
    let imports: Vec<Node> = root
        .named_children(&mut cursor)
        .filter(|node| node.kind() == "import_statement")
        .collect();

    if imports
        .iter()
        .any(|node| import_binds(*node, bytes, import))
    {
        return Ok(None);
    }

    let edit = match imports.last() {
        Some(last) => TextEdit::insert(last.end_byte(), format!("\n{}", import.statement())),
        None => TextEdit::insert(0, format!("{}\n", import.statement())),
    };

    Ok(Some(apply_edits(source, vec![edit])?))
}

/// Whether `statement` imports `import.name` from `import.source`.
fn import_binds(statement: Node, bytes: &[u8], import: &NamedImport) -> bool {
    let Some(module) = statement
        .child_by_field_name("source")
        .and_then(|node| node.utf8_text(bytes).ok())
    else {
        return false;
    };

    if unquote(module) != import.source {
        return false;
    }

    let mut stack = vec![statement];
    while let Some(node) = stack.pop() {
        if node.kind() == "import_specifier" {
            let local = node
                .child_by_field_name("alias")
                .or_else(|| node.child_by_field_name("name"))
                .and_then(|name| name.utf8_text(bytes).ok());
            if local == Some(import.name.as_str()) {
                return true;
            }
            continue;
        }

        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }

    false
}

fn unquote(literal: &str) -> &str {
    literal
        .strip_prefix(['\'', '"'])
        .and_then(|rest| rest.strip_suffix(['\'', '"']))
        .unwrap_or(literal)
}
