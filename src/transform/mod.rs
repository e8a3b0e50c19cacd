//! Compile-time rewriting of route files.
//!
//! Two independent rewrites, both span-splices on the parsed source:
//!
//! 1. **Identity tagging** - `Component: Ident` / `element: <Ident/>` pairs
//!    gain a `pathId: '<module path>'` property resolved from the file's
//!    default imports. Skipped for production bundling, where identifiers
//!    are minified away; lazy routes carry identity through rewrite 2.
//! 2. **Lazy wrapping** - `lazy: () => import(S)` becomes
//!    `lazy: () => n(() => import(S), 'S')`, with one helper import
//!    prepended. The identity argument is only emitted when the build needs
//!    it server-side (SSR); pure client bundles omit it so build paths never
//!    leak, and [`strip_identity_args`] removes leftovers from compiled
//!    chunks after the manifest is built.
//!
//! A file that matches the route-file heuristic but fails to parse is
//! returned unchanged - the rewrite is best-effort by contract.

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Expression, ImportDeclarationSpecifier, JSXElementName, ObjectExpression, ObjectPropertyKind,
    Program, PropertyKey, Statement,
};
use oxc::parser::Parser;
use oxc::span::{GetSpan, SourceType};
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Module specifier of the runtime normalizer injected into route files.
/// The host bundler aliases it to the emitted helper (see [`crate::embed`]).
pub const HELPER_SPECIFIER: &str = "strada/normalize-route";

/// Local name the helper import binds to.
const HELPER_LOCAL: &str = "n";

/// Route-file heuristic: an object literal with a `path:` key co-located
/// with a lazy dynamic import, `Component:`, or `element:`.
static ROUTE_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\{.*path:.*(lazy:.+import|Component:|element:)|\{.*(lazy:.+import|Component:|element:).*path:",
    )
    .unwrap()
});

/// Identity arguments appended by rewrite 2, as they appear in minified
/// client chunks.
static IDENTITY_ARG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(lazy:.*?\((.*?)\)),\s?".*?"\)"#).unwrap());

#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Server-side build: identity arguments are required at runtime.
    pub is_ssr: bool,
    /// Production bundling: identifiers get minified, skip identity tagging.
    pub is_build: bool,
    /// Only transform files under this directory when set.
    pub routes_dir: Option<String>,
    /// Override the helper import specifier.
    pub helper_specifier: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            is_ssr: false,
            is_build: false,
            routes_dir: None,
            helper_specifier: HELPER_SPECIFIER.to_string(),
        }
    }
}

/// Detect route files by shape, before paying for a parse.
pub fn is_route_file(code: &str) -> bool {
    ROUTE_FILE_RE.is_match(code)
}

/// Transform a route file, returning `None` when the file is not a route
/// file (wrong extension, heuristic miss, or outside `routes_dir`).
pub fn transform_route_file(
    source: &str,
    id: &str,
    options: &TransformOptions,
) -> Option<String> {
    if !has_route_extension(id) || !is_route_file(source) {
        return None;
    }
    if let Some(dir) = &options.routes_dir
        && !id.contains(dir.as_str())
    {
        return None;
    }

    Some(rewrite(source, options))
}

fn has_route_extension(id: &str) -> bool {
    [".js", ".jsx", ".ts", ".tsx"]
        .iter()
        .any(|ext| id.ends_with(ext))
}

/// One pending splice: replace `start..end` with `text`.
struct Splice {
    start: usize,
    end: usize,
    text: String,
}

struct Rewriter<'s> {
    source: &'s str,
    /// Default-import map: local name -> module path.
    default_imports: FxHashMap<String, String>,
    splices: Vec<Splice>,
    tag_identities: bool,
    wrap_identity: bool,
    wrapped_any: bool,
}

fn rewrite(source: &str, options: &TransformOptions) -> String {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_module(true)
        .with_typescript(true)
        .with_jsx(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        // Malformed rewrite target: leave the file unmodified.
        return source.to_string();
    }

    let mut rewriter = Rewriter {
        source,
        default_imports: collect_default_imports(&ret.program),
        splices: Vec::new(),
        tag_identities: !options.is_build,
        wrap_identity: options.is_ssr,
        wrapped_any: false,
    };

    walk_statements(&ret.program.body, &mut rewriter);

    // Apply in reverse so earlier spans stay valid.
    rewriter.splices.sort_by(|a, b| b.start.cmp(&a.start));
    let mut result = source.to_string();
    for splice in &rewriter.splices {
        result.replace_range(splice.start..splice.end, &splice.text);
    }

    if rewriter.wrapped_any {
        result = format!(
            "import {HELPER_LOCAL} from '{}';{result}",
            options.helper_specifier
        );
    }

    result
}

fn collect_default_imports(program: &Program) -> FxHashMap<String, String> {
    let mut map = FxHashMap::default();
    for stmt in &program.body {
        let Statement::ImportDeclaration(import) = stmt else {
            continue;
        };
        let Some(specifiers) = &import.specifiers else {
            continue;
        };
        for specifier in specifiers {
            if let ImportDeclarationSpecifier::ImportDefaultSpecifier(s) = specifier {
                map.insert(s.local.name.to_string(), import.source.value.to_string());
            }
        }
    }
    map
}

fn walk_statements(stmts: &[Statement], rw: &mut Rewriter) {
    for stmt in stmts {
        walk_statement(stmt, rw);
    }
}

fn walk_statement(stmt: &Statement, rw: &mut Rewriter) {
    match stmt {
        Statement::ExpressionStatement(s) => walk_expression(&s.expression, rw),
        Statement::VariableDeclaration(decl) => {
            for declarator in &decl.declarations {
                if let Some(init) = &declarator.init {
                    walk_expression(init, rw);
                }
            }
        }
        Statement::ExportNamedDeclaration(export) => {
            if let Some(oxc::ast::ast::Declaration::VariableDeclaration(decl)) = &export.declaration
            {
                for declarator in &decl.declarations {
                    if let Some(init) = &declarator.init {
                        walk_expression(init, rw);
                    }
                }
            }
        }
        Statement::ExportDefaultDeclaration(export) => {
            if let Some(expr) = export.declaration.as_expression() {
                walk_expression(expr, rw);
            }
        }
        Statement::ReturnStatement(s) => {
            if let Some(argument) = &s.argument {
                walk_expression(argument, rw);
            }
        }
        Statement::BlockStatement(block) => walk_statements(&block.body, rw),
        Statement::FunctionDeclaration(func) => {
            if let Some(body) = &func.body {
                walk_statements(&body.statements, rw);
            }
        }
        _ => {}
    }
}

fn walk_expression(expr: &Expression, rw: &mut Rewriter) {
    match expr {
        Expression::ObjectExpression(object) => rewrite_route_object(object, rw),
        Expression::ArrayExpression(array) => {
            for element in &array.elements {
                if let Some(expr) = element.as_expression() {
                    walk_expression(expr, rw);
                }
            }
        }
        Expression::ArrowFunctionExpression(arrow) => walk_statements(&arrow.body.statements, rw),
        Expression::CallExpression(call) => {
            for argument in &call.arguments {
                if let Some(expr) = argument.as_expression() {
                    walk_expression(expr, rw);
                }
            }
        }
        Expression::ParenthesizedExpression(paren) => walk_expression(&paren.expression, rw),
        Expression::ConditionalExpression(cond) => {
            walk_expression(&cond.consequent, rw);
            walk_expression(&cond.alternate, rw);
        }
        _ => {}
    }
}

/// Apply both rewrites to one object literal, then recurse into its values.
fn rewrite_route_object(object: &ObjectExpression, rw: &mut Rewriter) {
    for prop in &object.properties {
        let ObjectPropertyKind::ObjectProperty(prop) = prop else {
            continue;
        };
        let Some(key) = property_name(&prop.key) else {
            continue;
        };

        match key {
            "Component" => {
                if rw.tag_identities
                    && let Expression::Identifier(ident) = &prop.value
                    && let Some(path) = rw.default_imports.get(ident.name.as_str())
                {
                    push_identity_tag(rw, prop.span.end as usize, path.clone());
                }
            }
            "element" => {
                if rw.tag_identities
                    && let Expression::JSXElement(element) = &prop.value
                    && let Some(name) = jsx_tag_name(&element.opening_element.name)
                    && let Some(path) = rw.default_imports.get(&name)
                {
                    push_identity_tag(rw, prop.span.end as usize, path.clone());
                }
            }
            "lazy" => {
                if let Some(specifier) = lazy_specifier(&prop.value) {
                    let span = prop.value.span();
                    let (start, end) = (span.start as usize, span.end as usize);
                    let original = &rw.source[start..end];
                    let text = if rw.wrap_identity {
                        format!("() => {HELPER_LOCAL}({original}, '{specifier}')")
                    } else {
                        format!("() => {HELPER_LOCAL}({original})")
                    };
                    rw.splices.push(Splice { start, end, text });
                    rw.wrapped_any = true;
                }
            }
            _ => {}
        }

        walk_expression(&prop.value, rw);
    }
}

/// Insert `pathId: '<path>'` after the property at `end`, reusing an
/// existing trailing comma when the source has one.
fn push_identity_tag(rw: &mut Rewriter, end: usize, path: String) {
    let bytes = rw.source.as_bytes();
    let mut cursor = end;
    while cursor < bytes.len() && (bytes[cursor] as char).is_whitespace() {
        cursor += 1;
    }

    let (start, text) = if cursor < bytes.len() && bytes[cursor] == b',' {
        (cursor + 1, format!("pathId: '{path}',"))
    } else {
        (end, format!(",pathId: '{path}'"))
    };
    rw.splices.push(Splice {
        start,
        end: start,
        text,
    });
}

fn property_name<'a>(key: &'a PropertyKey) -> Option<&'a str> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.as_str()),
        PropertyKey::StringLiteral(s) => Some(s.value.as_str()),
        _ => None,
    }
}

fn jsx_tag_name(name: &JSXElementName) -> Option<String> {
    match name {
        JSXElementName::Identifier(id) => Some(id.name.to_string()),
        JSXElementName::IdentifierReference(id) => Some(id.name.to_string()),
        _ => None,
    }
}

/// `() => import("...")` - extract the literal if the value is exactly that.
fn lazy_specifier(expr: &Expression) -> Option<String> {
    let Expression::ArrowFunctionExpression(arrow) = expr else {
        return None;
    };
    let Some(Statement::ExpressionStatement(stmt)) = arrow.body.statements.first() else {
        return None;
    };
    let Expression::ImportExpression(import) = &stmt.expression else {
        return None;
    };
    match &import.source {
        Expression::StringLiteral(literal) => Some(literal.value.to_string()),
        _ => None,
    }
}

/// Remove identity string arguments from a compiled client chunk.
///
/// Runs after the manifest is built so shipped client code never carries
/// source paths.
pub fn strip_identity_args(code: &str) -> String {
    IDENTITY_ARG_RE.replace_all(code, "$1)").to_string()
}
