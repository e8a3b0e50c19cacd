//! Shared AST helpers for route analysis.

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    ImportDeclarationSpecifier, ModuleExportName, Program, PropertyKey, Statement,
};
use oxc::parser::Parser;
use oxc::span::SourceType;
use rustc_hash::FxHashMap;

/// One local import binding: where it comes from and whether it was the
/// module's default export.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub source: String,
    pub is_default: bool,
}

/// Local name -> import binding, built from a file's top-level imports.
pub type ImportMap = FxHashMap<String, ImportBinding>;

/// Parse `source` as a TS/JSX module and run `f` over the program.
///
/// Returns `None` when the source does not parse; the AST never escapes the
/// closure (it borrows the arena allocator).
pub fn with_program<T>(source: &str, f: impl FnOnce(&Program) -> T) -> Option<T> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_module(true)
        .with_typescript(true)
        .with_jsx(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    Some(f(&ret.program))
}

/// Build the local import map from a program's import declarations.
pub fn collect_imports(program: &Program) -> ImportMap {
    let mut map = ImportMap::default();
    for stmt in &program.body {
        let Statement::ImportDeclaration(import) = stmt else {
            continue;
        };
        let Some(specifiers) = &import.specifiers else {
            continue;
        };
        for specifier in specifiers {
            let (local, is_default) = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => (s.local.name.to_string(), false),
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (s.local.name.to_string(), true)
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (s.local.name.to_string(), false)
                }
            };
            map.insert(
                local,
                ImportBinding {
                    source: import.source.value.to_string(),
                    is_default,
                },
            );
        }
    }
    map
}

/// Textual name of an export specifier side.
pub fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

/// Static name of an object property key, if it has one.
pub fn property_key_name(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_imports_tracks_default_and_named() {
        let source = r#"
            import Layout from '@components/layout';
            import { RouteManager } from '@services/route-manager';
            import * as pages from './pages';
        "#;
        let map = with_program(source, collect_imports).unwrap();

        let layout = &map["Layout"];
        assert_eq!(layout.source, "@components/layout");
        assert!(layout.is_default);

        let manager = &map["RouteManager"];
        assert_eq!(manager.source, "@services/route-manager");
        assert!(!manager.is_default);

        assert!(!map["pages"].is_default);
    }

    #[test]
    fn test_with_program_rejects_broken_source() {
        assert!(with_program("const = ;;;{", |_| ()).is_none());
    }
}
