//! Collapses TypeScript `enum` declarations into type aliases.
//!
//! A generated enum like
//!
//! ```text
//! export enum StatusEnum {
//!     ACTIVE = 'active',
//!     INACTIVE = 'inactive',
//! }
//! ```
//!
//! becomes either a union of its literal values
//!
//! ```text
//! export type Status = 'active' | 'inactive';
//! ```
//!
//! or, for very large enums, an opaque branded string
//!
//! ```text
//! export type Status = Branded<string, 'Status'>;
//! ```
//!
//! Rewrites are planned against the parsed tree, sorted by descending
//! position and applied through [`apply_edits`], so one replacement never
//! invalidates the offsets of another.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use tracing::{debug, warn};
use tree_sitter::Node;

use super::edits::{TransformationRecord, apply_edits};
use super::imports::{NamedImport, ensure_named_import, relative_specifier};
use super::{CollapseMode, Transform, TransformError, parse_typescript};
use crate::config::PipelineConfig;

/// Suffix stripped from collapsed enum names.
pub const RESERVED_SUFFIX: &str = "Enum";

/// Helper type used for branded aliases.
pub const BRANDED_TYPE: &str = "Branded";

/// Declaration kinds whose names take part in collision checks.
const DECLARATION_KINDS: &[&str] = &[
    "enum_declaration",
    "type_alias_declaration",
    "interface_declaration",
    "class_declaration",
    "function_declaration",
];

/// Which enum declarations a collapse pass considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumSelection {
    /// Names ending in [`RESERVED_SUFFIX`], at any size.
    Suffixed,
    /// Any name, at or above the member threshold.
    Large,
}

/// The alias shape chosen for a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    Union,
    Branded,
}

/// Enum-collapse transform.
#[derive(Debug, Clone)]
pub struct EnumCollapse {
    selection: EnumSelection,
    threshold: usize,
    mode: CollapseMode,
    /// Module providing [`BRANDED_TYPE`], relative to the output root.
    branded_source: String,
}

/// Declared names keyed by enclosing block id and name, mapped to the start
/// offsets of their declarations.
type DeclaredNames<'s> = HashMap<(usize, &'s str), Vec<usize>>;

/// Where an enum sits: its enclosing block and its own start offset.
#[derive(Debug, Clone, Copy)]
struct DeclarationScope {
    block: usize,
    enum_start: usize,
}

/// An enum declaration parsed out of the syntax tree.
#[derive(Debug)]
struct EnumDeclaration<'s> {
    name: &'s str,
    /// `export` / `declare` text preceding the `enum` keyword.
    modifiers: &'s str,
    /// Full statement span, including modifiers.
    statement: Range<usize>,
    /// Raw string literals, quotes included, in source order.
    literals: Vec<&'s str>,
}

impl EnumCollapse {
    pub fn new(
        selection: EnumSelection,
        threshold: usize,
        mode: CollapseMode,
        branded_source: &str,
    ) -> Self {
        Self {
            selection,
            threshold,
            mode,
            branded_source: branded_source.to_string(),
        }
    }

    pub fn from_config(selection: EnumSelection, config: &PipelineConfig) -> Self {
        Self::new(
            selection,
            config.enum_threshold,
            config.collapse_mode,
            &config.branded_import,
        )
    }

    /// Picks the alias shape for an enum with `count` string members.
    ///
    /// Under `auto`, exactly `threshold` members still yields a union; only
    /// strictly more switches to a branded alias.
    ///
    /// ```
    /// use clientgen::transform::{CollapseMode, EnumCollapse, EnumSelection, TargetShape};
    ///
    /// let collapse = EnumCollapse::new(EnumSelection::Large, 45, CollapseMode::Auto, "./core/Branded");
    /// assert_eq!(collapse.shape_for(45), TargetShape::Union);
    /// assert_eq!(collapse.shape_for(46), TargetShape::Branded);
    /// ```
    pub fn shape_for(&self, count: usize) -> TargetShape {
        match self.mode {
            CollapseMode::Branded => TargetShape::Branded,
            CollapseMode::Auto if count > self.threshold => TargetShape::Branded,
            CollapseMode::Auto | CollapseMode::Union => TargetShape::Union,
        }
    }

    fn is_eligible(&self, name: &str, count: usize) -> bool {
        match self.selection {
            EnumSelection::Suffixed => name.ends_with(RESERVED_SUFFIX),
            EnumSelection::Large => count >= self.threshold,
        }
    }

    /// Plans a rewrite for every eligible enum in `source`.
    ///
    /// Records are returned sorted by descending position.
    pub fn collect_records(
        &self,
        source: &str,
        path: &Path,
    ) -> Result<Vec<TransformationRecord>, TransformError> {
        let tree = parse_typescript(source, path)?;
        let root = tree.root_node();

        let enums = nodes_of_kind(root, &["enum_declaration"]);
        if enums.is_empty() {
            return Ok(Vec::new());
        }

        let declared = declared_names(root, source);
        let mut records = Vec::new();

        for node in enums {
            let declaration = match parse_declaration(node, source) {
                Ok(declaration) => declaration,
                Err(reason) => {
                    warn!(
                        file = %path.display(),
                        line = node.start_position().row + 1,
                        reason,
                        "Skipping malformed enum declaration"
                    );
                    continue;
                }
            };

            let scope = DeclarationScope {
                block: enclosing_block(node),
                enum_start: node.start_byte(),
            };
            if let Some(record) = self.plan(&declaration, scope, &declared, source, path) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.position.cmp(&a.position));
        Ok(records)
    }

    fn plan(
        &self,
        declaration: &EnumDeclaration<'_>,
        scope: DeclarationScope,
        declared: &DeclaredNames<'_>,
        source: &str,
        path: &Path,
    ) -> Option<TransformationRecord> {
        let name = declaration.name;
        let count = declaration.literals.len();

        if count == 0 {
            debug!(file = %path.display(), name, "Enum has no string members, leaving it untouched");
            return None;
        }

        if !self.is_eligible(name, count) {
            return None;
        }

        let base = name.strip_suffix(RESERVED_SUFFIX).unwrap_or(name);
        if base.is_empty() {
            warn!(file = %path.display(), name, "Enum name is only the reserved suffix, skipping");
            return None;
        }

        let collides = declared
            .get(&(scope.block, base))
            .is_some_and(|starts| starts.iter().any(|start| *start != scope.enum_start));
        if collides {
            warn!(
                file = %path.display(),
                name,
                alias = base,
                "Collapsed name collides with an existing declaration, skipping"
            );
            return None;
        }

        let shape = self.shape_for(count);
        let body = match shape {
            TargetShape::Branded => format!("{}<string, '{}'>", BRANDED_TYPE, base),
            TargetShape::Union => declaration.literals.join(" | "),
        };

        debug!(file = %path.display(), name, alias = base, members = count, ?shape, "Collapsing enum");

        Some(TransformationRecord {
            position: declaration.statement.start,
            replacement_text: format!("{}type {} = {};", declaration.modifiers, base, body),
            original_text: source[declaration.statement.clone()].to_string(),
            requires_auxiliary_import: shape == TargetShape::Branded,
        })
    }
}

impl Transform for EnumCollapse {
    fn name(&self) -> &str {
        match self.selection {
            EnumSelection::Suffixed => "suffixed-enum-collapse",
            EnumSelection::Large => "large-enum-collapse",
        }
    }

    fn apply(&self, source: &str, path: &Path) -> Result<Option<String>, TransformError> {
        let records = self.collect_records(source, path)?;
        if records.is_empty() {
            return Ok(None);
        }

        let needs_import = records.iter().any(|r| r.requires_auxiliary_import);
        let edits = records
            .iter()
            .map(|record| record.to_edit(source))
            .collect::<Result<Vec<_>, _>>()?;

        let rewritten = apply_edits(source, edits)?;

        if needs_import {
            let module = relative_specifier(&self.branded_source, path);
            let import = NamedImport::type_only(BRANDED_TYPE, &module);
            let with_import = ensure_named_import(&rewritten, path, &import)?;
            return Ok(Some(with_import.unwrap_or(rewritten)));
        }

        Ok(Some(rewritten))
    }
}

/// Extracts name, modifiers, span and literal members from an enum node.
fn parse_declaration<'s>(node: Node<'_>, source: &'s str) -> Result<EnumDeclaration<'s>, &'static str> {
    if node.has_error() {
        return Err("syntax error inside declaration");
    }

    let name = node
        .child_by_field_name("name")
        .map(|n| &source[n.byte_range()])
        .filter(|name| !name.is_empty())
        .ok_or("missing name")?;

    let body = node.child_by_field_name("body").ok_or("missing body")?;

    let mut literals = Vec::new();
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "enum_assignment" {
            continue;
        }
        if let Some(value) = member.child_by_field_name("value")
            && value.kind() == "string"
        {
            literals.push(&source[value.byte_range()]);
        }
    }

    let statement = statement_node(node);
    Ok(EnumDeclaration {
        name,
        modifiers: &source[statement.start_byte()..node.start_byte()],
        statement: statement.byte_range(),
        literals,
    })
}

/// Widens an enum node to its enclosing `export` / `declare` statement.
fn statement_node(node: Node<'_>) -> Node<'_> {
    let mut statement = node;
    while let Some(parent) = statement.parent() {
        if matches!(parent.kind(), "export_statement" | "ambient_declaration") {
            statement = parent;
        } else {
            break;
        }
    }
    statement
}

/// All nodes of the given kinds, in source order.
fn nodes_of_kind<'t>(root: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if kinds.contains(&node.kind()) {
            found.push(node);
        }
        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }

    found.sort_by_key(|node| node.start_byte());
    found
}

/// Id of the block a declaration lives in: the file itself, a namespace or
/// module body, or a function body.
fn enclosing_block(node: Node<'_>) -> usize {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if matches!(parent.kind(), "program" | "statement_block") {
            return parent.id();
        }
        current = parent;
    }
    current.id()
}

/// Declared type-level names, grouped by the block that declares them.
fn declared_names<'s>(root: Node<'_>, source: &'s str) -> DeclaredNames<'s> {
    let mut names: DeclaredNames<'s> = HashMap::new();
    for node in nodes_of_kind(root, DECLARATION_KINDS) {
        if let Some(name) = node.child_by_field_name("name") {
            names
                .entry((enclosing_block(node), &source[name.byte_range()]))
                .or_default()
                .push(node.start_byte());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const PATH: &str = "Status.ts";

    fn collapse(selection: EnumSelection, mode: CollapseMode) -> EnumCollapse {
        EnumCollapse::new(selection, 45, mode, "./core/Branded")
    }

    fn apply(transform: &EnumCollapse, source: &str) -> Option<String> {
        transform.apply(source, Path::new(PATH)).unwrap()
    }

    fn enum_source(name: &str, count: usize) -> String {
        let members: Vec<String> = (0..count)
            .map(|i| format!("    VALUE_{} = 'value-{}',", i, i))
            .collect();
        format!("export enum {} {{\n{}\n}}\n", name, members.join("\n"))
    }

    fn union_of(count: usize) -> String {
        (0..count)
            .map(|i| format!("'value-{}'", i))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    #[test]
    fn suffixed_enum_becomes_union() {
        let source = "export enum StatusEnum {\n    ACTIVE = 'active',\n    INACTIVE = 'inactive',\n}\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert_eq!(output, "export type Status = 'active' | 'inactive';\n");
    }

    #[test]
    fn suffixed_variant_ignores_names_without_suffix() {
        let source = "export enum Status {\n    ACTIVE = 'active',\n}\n";
        assert_eq!(apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source), None);
    }

    #[test]
    fn fifty_members_in_auto_mode_become_branded_with_import() {
        let source = format!("import {{ request }} from './core/request';\n\n{}", enum_source("StatusEnum", 50));
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), &source).unwrap();

        assert_eq!(
            output,
            "import { request } from './core/request';\nimport type { Branded } from './core/Branded';\n\nexport type Status = Branded<string, 'Status'>;\n"
        );
    }

    #[test]
    fn exactly_threshold_members_prefers_union() {
        let source = enum_source("Region", 45);
        let output = apply(&collapse(EnumSelection::Large, CollapseMode::Auto), &source).unwrap();

        assert_eq!(output, format!("export type Region = {};\n", union_of(45)));
        assert!(!output.contains("Branded"));
    }

    #[test]
    fn large_variant_skips_small_enums() {
        let source = enum_source("Region", 44);
        assert_eq!(apply(&collapse(EnumSelection::Large, CollapseMode::Auto), &source), None);
    }

    #[test]
    fn large_variant_triggers_regardless_of_suffix() {
        let source = enum_source("CountryCode", 46);
        let output = apply(&collapse(EnumSelection::Large, CollapseMode::Auto), &source).unwrap();

        assert!(output.contains("export type CountryCode = Branded<string, 'CountryCode'>;"));
        assert!(output.starts_with("import type { Branded } from './core/Branded';\n"));
    }

    #[test]
    fn nested_file_imports_branded_from_parent_directory() {
        let source = enum_source("StatusEnum", 50);
        let output = collapse(EnumSelection::Suffixed, CollapseMode::Auto)
            .apply(&source, Path::new("models/Status.ts"))
            .unwrap()
            .unwrap();

        assert!(output.starts_with("import type { Branded } from '../core/Branded';\n"));

        let again = collapse(EnumSelection::Suffixed, CollapseMode::Branded)
            .apply(&format!("{}export enum RoleEnum {{ A = 'a' }}\n", output), Path::new("models/Status.ts"))
            .unwrap()
            .unwrap();
        assert_eq!(again.matches("import type { Branded }").count(), 1);
    }

    #[test]
    fn branded_mode_always_brands() {
        let source = "export enum RoleEnum {\n    ADMIN = 'admin',\n}\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Branded), source).unwrap();

        assert!(output.contains("export type Role = Branded<string, 'Role'>;"));
    }

    #[test]
    fn union_mode_never_brands() {
        let source = enum_source("StatusEnum", 80);
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Union), &source).unwrap();

        assert_eq!(output, format!("export type Status = {};\n", union_of(80)));
    }

    #[test]
    fn union_preserves_literal_order_and_skips_non_string_members() {
        let source = "enum KindEnum {\n    B = 'b',\n    PLAIN,\n    N = 3,\n    A = \"a\",\n}\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert_eq!(output, "type Kind = 'b' | \"a\";\n");
    }

    #[test]
    fn enum_without_string_members_is_untouched() {
        let source = "export enum PriorityEnum {\n    LOW = 1,\n    HIGH = 2,\n}\n";
        assert_eq!(apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source), None);
    }

    #[test]
    fn declare_and_const_modifiers() {
        let source = "export declare enum ModeEnum { A = 'a' }\nconst enum LevelEnum { B = 'b' }\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert_eq!(
            output,
            "export declare type Mode = 'a';\ntype Level = 'b';\n"
        );
    }

    #[test]
    fn multiple_enums_are_rewritten_back_to_front() {
        let source = "export enum AEnum { X = 'x' }\n\n// keep\nexport enum BEnum { Y = 'y', Z = 'z' }\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert_eq!(
            output,
            "export type A = 'x';\n\n// keep\nexport type B = 'y' | 'z';\n"
        );
    }

    #[test]
    fn records_are_sorted_descending() {
        let source = "enum AEnum { X = 'x' }\nenum BEnum { Y = 'y' }\nenum CEnum { Z = 'z' }\n";
        let records = collapse(EnumSelection::Suffixed, CollapseMode::Auto)
            .collect_records(source, Path::new(PATH))
            .unwrap();

        let positions: Vec<usize> = records.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![46, 23, 0]);
        assert_eq!(records[2].original_text, "enum AEnum { X = 'x' }");
    }

    #[test]
    fn existing_branded_import_is_not_duplicated() {
        let source = format!(
            "import type {{ Branded }} from './core/Branded';\n{}",
            enum_source("StatusEnum", 50)
        );
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), &source).unwrap();

        assert_eq!(output.matches("import type { Branded }").count(), 1);
    }

    #[test]
    #[traced_test]
    fn name_collision_is_skipped() {
        let source = "export type Status = string;\nexport enum StatusEnum { A = 'a' }\n";
        assert_eq!(apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source), None);
        assert!(logs_contain("Collapsed name collides with an existing declaration, skipping"));
    }

    #[test]
    fn same_name_in_another_scope_does_not_collide() {
        let source = "export type Status = string;\nexport namespace Pet {\n    export enum StatusEnum { A = 'a' }\n}\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert_eq!(
            output,
            "export type Status = string;\nexport namespace Pet {\n    export type Status = 'a';\n}\n"
        );
    }

    #[test]
    fn collision_inside_the_same_namespace_is_skipped() {
        let source = "export namespace Pet {\n    export interface Status {}\n    export enum StatusEnum { A = 'a' }\n}\n";
        assert_eq!(apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source), None);
    }

    #[test]
    fn namespace_declaration_does_not_block_top_level_enum() {
        let source = "export namespace Pet {\n    export type Status = number;\n}\nexport enum StatusEnum { A = 'a' }\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert!(output.ends_with("export type Status = 'a';\n"));
    }

    #[test]
    fn bare_suffix_name_is_skipped() {
        let source = "export enum Enum { A = 'a' }\n";
        assert_eq!(apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source), None);
    }

    #[test]
    #[traced_test]
    fn malformed_declaration_does_not_block_others() {
        let source = "export enum GoodEnum { C = 'c' }\nexport enum BrokenEnum { A = 'a' B = }\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert!(output.contains("export type Good = 'c';"));
        assert!(output.contains("BrokenEnum"));
        assert!(logs_contain("Skipping malformed enum declaration"));
    }

    #[test]
    #[traced_test]
    fn well_formed_source_logs_no_skip_warnings() {
        let source = "export enum GoodEnum { C = 'c' }\n";
        apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert!(!logs_contain("Skipping malformed enum declaration"));
        assert!(!logs_contain("collides"));
    }

    #[test]
    fn collapsing_is_idempotent() {
        let source = format!(
            "{}\n{}",
            enum_source("StatusEnum", 50),
            "export enum ColorEnum { RED = 'red' }\n"
        );

        for selection in [EnumSelection::Suffixed, EnumSelection::Large] {
            let transform = collapse(selection, CollapseMode::Auto);
            let once = apply(&transform, &source).unwrap_or_else(|| source.clone());
            assert_eq!(apply(&transform, &once), None);
        }
    }

    #[test]
    fn enums_inside_namespaces_are_collapsed() {
        let source = "export namespace Pet {\n    export enum StatusEnum { A = 'a' }\n}\n";
        let output = apply(&collapse(EnumSelection::Suffixed, CollapseMode::Auto), source).unwrap();

        assert_eq!(output, "export namespace Pet {\n    export type Status = 'a';\n}\n");
    }
}
