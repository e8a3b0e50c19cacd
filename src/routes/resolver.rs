//! Route tree resolution from the client bootstrap entry.
//!
//! Resolution runs in three steps, all on the unmodified source tree:
//!
//! 1. Find the bootstrap call `entry(App, routes, options?)` in the client
//!    entry file and the import binding of its routes argument.
//! 2. Resolve that binding to a file (aliases, then suffix probing).
//! 3. Walk the exported route array, recursing into nested arrays in place
//!    and into `children: Identifier` bindings as fresh route files.
//!
//! Any missing step is fatal: dependents never see a partial tree.

use super::ast::{ImportMap, collect_imports, property_key_name, with_program};
use super::{ResolutionError, RouteKind, RouteNode};
use crate::config::AppConfig;
use crate::paths::PathResolver;
use oxc::ast::ast::{
    ArrayExpression, ArrayExpressionElement, Expression, JSXElementName, Program, Statement,
};
use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known bootstrap callee consumed by the resolver.
const BOOTSTRAP_CALLEE: &str = "entry";

/// Resolved import of the routes binding in the entry file.
struct RoutesBinding {
    specifier: String,
    /// `None` for a default import, the export name otherwise.
    export_name: Option<String>,
}

/// Static route tree resolver.
pub struct RouteResolver {
    paths: PathResolver,
    client_file: PathBuf,
}

impl RouteResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            paths: config.path_resolver(),
            client_file: config.client_file(),
        }
    }

    pub fn from_parts(paths: PathResolver, client_file: PathBuf) -> Self {
        Self { paths, client_file }
    }

    /// Resolve the full route tree, or fail without a partial result.
    pub fn resolve(&self) -> Result<Vec<RouteNode>, ResolutionError> {
        self.resolve_tracked().map(|(tree, _)| tree)
    }

    /// Resolve the tree and the set of route files it was read from (the
    /// files whose compiled chunks carry lazy wrappers).
    pub fn resolve_tracked(&self) -> Result<(Vec<RouteNode>, Vec<PathBuf>), ResolutionError> {
        let binding = self.find_routes_binding()?;
        let file = self.resolve_file(&binding.specifier, Some(&self.client_file))?;

        // Ancestor stack for cycle detection: a file may appear in several
        // sibling subtrees, but never above itself.
        let mut ancestors = FxHashSet::default();
        let mut files = Vec::new();
        let tree = self.build_tree(&file, binding.export_name.as_deref(), &mut ancestors, &mut files)?;
        Ok((tree, files))
    }

    /// Locate the bootstrap call in the entry file and the import binding of
    /// its routes argument.
    fn find_routes_binding(&self) -> Result<RoutesBinding, ResolutionError> {
        let file = &self.client_file;
        let source = read_source(file)?;

        let result = with_program(&source, |program| {
            let name = find_bootstrap_argument(program)
                .ok_or_else(|| ResolutionError::BootstrapNotFound(file.clone()))?;

            let imports = collect_imports(program);
            let binding =
                imports
                    .get(&name)
                    .ok_or_else(|| ResolutionError::ImportNotFound {
                        name: name.clone(),
                        file: file.clone(),
                    })?;

            Ok(RoutesBinding {
                specifier: binding.source.clone(),
                export_name: (!binding.is_default).then_some(name),
            })
        });

        match result {
            Some(binding) => binding,
            None => Err(ResolutionError::Parse(file.clone())),
        }
    }

    /// Parse one route file and build its subtree.
    fn build_tree(
        &self,
        file: &Path,
        export_name: Option<&str>,
        ancestors: &mut FxHashSet<PathBuf>,
        files: &mut Vec<PathBuf>,
    ) -> Result<Vec<RouteNode>, ResolutionError> {
        if !ancestors.insert(file.to_path_buf()) {
            return Err(ResolutionError::RouteCycle(file.to_path_buf()));
        }
        if !files.contains(&file.to_path_buf()) {
            files.push(file.to_path_buf());
        }

        let source = read_source(file)?;
        let result = match with_program(&source, |program| {
            let imports = collect_imports(program);
            let elements = find_routes_array(program, export_name, file)?;
            self.parse_routes_array(elements, &imports, file, ancestors, files)
        }) {
            Some(result) => result,
            None => Err(ResolutionError::Parse(file.to_path_buf())),
        };

        ancestors.remove(file);
        result
    }

    /// Walk route array elements in declaration order.
    ///
    /// `index` is the unfiltered array position; nodes without an identity
    /// and without children are dropped from the result, their siblings keep
    /// their positions.
    fn parse_routes_array(
        &self,
        elements: &[ArrayExpressionElement],
        imports: &ImportMap,
        file: &Path,
        ancestors: &mut FxHashSet<PathBuf>,
        files: &mut Vec<PathBuf>,
    ) -> Result<Vec<RouteNode>, ResolutionError> {
        let mut results = Vec::new();

        for (index, element) in elements.iter().enumerate() {
            let Some(Expression::ObjectExpression(object)) = element.as_expression().map(unparen)
            else {
                continue;
            };

            let mut kind = RouteKind::Bare;
            let mut children = Vec::new();

            for prop in &object.properties {
                let oxc::ast::ast::ObjectPropertyKind::ObjectProperty(prop) = prop else {
                    continue;
                };
                let Some(key) = property_key_name(&prop.key) else {
                    continue;
                };

                match key.as_str() {
                    "children" => match unparen(&prop.value) {
                        Expression::ArrayExpression(array) => {
                            children = self.parse_routes_array(
                                &array.elements,
                                imports,
                                file,
                                ancestors,
                                files,
                            )?;
                        }
                        Expression::Identifier(ident) => {
                            if let Some(binding) = imports.get(ident.name.as_str()) {
                                let child_file =
                                    self.resolve_file(&binding.source, Some(file))?;
                                let export =
                                    (!binding.is_default).then(|| ident.name.to_string());
                                children = self.build_tree(
                                    &child_file,
                                    export.as_deref(),
                                    ancestors,
                                    files,
                                )?;
                            }
                        }
                        _ => {}
                    },
                    "lazy" => {
                        if let Some(specifier) = lazy_import_specifier(&prop.value) {
                            kind = RouteKind::Lazy { specifier };
                        }
                    }
                    "Component" => {
                        if let Expression::Identifier(ident) = unparen(&prop.value)
                            && let Some(binding) = imports.get(ident.name.as_str())
                        {
                            kind = RouteKind::Static {
                                identity: binding.source.clone(),
                            };
                        }
                    }
                    "element" => {
                        if let Expression::JSXElement(element) = unparen(&prop.value)
                            && let Some(name) = jsx_tag_name(&element.opening_element.name)
                            && let Some(binding) = imports.get(&name)
                        {
                            kind = RouteKind::Static {
                                identity: binding.source.clone(),
                            };
                        }
                    }
                    _ => {}
                }
            }

            if !matches!(kind, RouteKind::Bare) || !children.is_empty() {
                results.push(RouteNode {
                    index,
                    kind,
                    children,
                });
            }
        }

        Ok(results)
    }

    fn resolve_file(
        &self,
        specifier: &str,
        relative_to: Option<&Path>,
    ) -> Result<PathBuf, ResolutionError> {
        self.paths
            .resolve(specifier, relative_to)
            .and_then(|base| self.paths.find_file(&base))
            .ok_or_else(|| ResolutionError::FileNotFound(specifier.to_string()))
    }
}

fn read_source(file: &Path) -> Result<String, ResolutionError> {
    fs::read_to_string(file).map_err(|e| ResolutionError::Io(file.to_path_buf(), e))
}

/// Strip parentheses wrappers.
fn unparen<'a, 'b>(expr: &'b Expression<'a>) -> &'b Expression<'a> {
    match expr {
        Expression::ParenthesizedExpression(paren) => unparen(&paren.expression),
        other => other,
    }
}

/// `lazy: () => import("...")` - extract the dynamic import literal.
fn lazy_import_specifier(expr: &Expression) -> Option<String> {
    let Expression::ArrowFunctionExpression(arrow) = unparen(expr) else {
        return None;
    };
    let Some(Statement::ExpressionStatement(stmt)) = arrow.body.statements.first() else {
        return None;
    };
    let Expression::ImportExpression(import) = unparen(&stmt.expression) else {
        return None;
    };
    match unparen(&import.source) {
        Expression::StringLiteral(literal) => Some(literal.value.to_string()),
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

/// Find `entry(App, <ident>, ...)` anywhere in the entry module and return
/// the identifier bound to the route-array argument.
fn find_bootstrap_argument(program: &Program) -> Option<String> {
    find_in_statements(&program.body)
}

fn find_in_statements(stmts: &[Statement]) -> Option<String> {
    stmts.iter().find_map(find_in_statement)
}

fn find_in_statement(stmt: &Statement) -> Option<String> {
    match stmt {
        Statement::ExpressionStatement(expr) => find_in_expression(&expr.expression),
        Statement::VariableDeclaration(decl) => decl
            .declarations
            .iter()
            .find_map(|d| d.init.as_ref().and_then(find_in_expression)),
        Statement::ExportDefaultDeclaration(export) => {
            export.declaration.as_expression().and_then(find_in_expression)
        }
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(oxc::ast::ast::Declaration::VariableDeclaration(decl)) => decl
                .declarations
                .iter()
                .find_map(|d| d.init.as_ref().and_then(find_in_expression)),
            _ => None,
        },
        Statement::BlockStatement(block) => find_in_statements(&block.body),
        Statement::IfStatement(stmt) => find_in_expression(&stmt.test)
            .or_else(|| find_in_statement(&stmt.consequent))
            .or_else(|| stmt.alternate.as_ref().and_then(find_in_statement)),
        Statement::ReturnStatement(stmt) => stmt.argument.as_ref().and_then(find_in_expression),
        _ => None,
    }
}

fn find_in_expression(expr: &Expression) -> Option<String> {
    match expr {
        Expression::CallExpression(call) => {
            if let Expression::Identifier(callee) = unparen(&call.callee)
                && callee.name == BOOTSTRAP_CALLEE
                && call.arguments.len() >= 2
                && let Some(Expression::Identifier(arg)) =
                    call.arguments[1].as_expression().map(unparen)
            {
                return Some(arg.name.to_string());
            }
            call.arguments
                .iter()
                .find_map(|arg| arg.as_expression().and_then(find_in_expression))
                .or_else(|| find_in_expression(&call.callee))
        }
        Expression::AwaitExpression(await_expr) => find_in_expression(&await_expr.argument),
        Expression::ParenthesizedExpression(paren) => find_in_expression(&paren.expression),
        Expression::SequenceExpression(seq) => seq.expressions.iter().find_map(find_in_expression),
        Expression::ArrowFunctionExpression(arrow) => find_in_statements(&arrow.body.statements),
        Expression::AssignmentExpression(assign) => find_in_expression(&assign.right),
        Expression::ConditionalExpression(cond) => find_in_expression(&cond.test)
            .or_else(|| find_in_expression(&cond.consequent))
            .or_else(|| find_in_expression(&cond.alternate)),
        Expression::LogicalExpression(logical) => find_in_expression(&logical.left)
            .or_else(|| find_in_expression(&logical.right)),
        Expression::UnaryExpression(unary) => find_in_expression(&unary.argument),
        _ => None,
    }
}

/// Locate the route array initializer honoring default/named export rules.
fn find_routes_array<'a>(
    program: &'a Program<'a>,
    export_name: Option<&str>,
    file: &Path,
) -> Result<&'a ArrayExpression<'a>, ResolutionError> {
    let mut local_name: Option<String> = export_name.map(str::to_string);

    for stmt in &program.body {
        match stmt {
            // export default [...] | export default routes
            Statement::ExportDefaultDeclaration(export) if export_name.is_none() => {
                match export.declaration.as_expression().map(unparen) {
                    Some(Expression::ArrayExpression(array)) => return Ok(array),
                    Some(Expression::Identifier(ident)) => {
                        local_name = Some(ident.name.to_string());
                    }
                    _ => {}
                }
            }
            // export { local as name } / export { local as default }
            Statement::ExportNamedDeclaration(export) => {
                for specifier in &export.specifiers {
                    let exported = super::ast::export_name(&specifier.exported);
                    let matches_request = match export_name {
                        Some(requested) => exported == requested,
                        None => exported == "default",
                    };
                    if matches_request {
                        local_name = Some(super::ast::export_name(&specifier.local));
                    }
                }
            }
            _ => {}
        }
    }

    let local_name = local_name.ok_or_else(|| ResolutionError::ExportNotFound(file.to_path_buf()))?;

    let mut declarator_init: Option<&Expression> = None;
    for stmt in &program.body {
        let declarations = match stmt {
            Statement::VariableDeclaration(decl) => &decl.declarations,
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(oxc::ast::ast::Declaration::VariableDeclaration(decl)) => &decl.declarations,
                _ => continue,
            },
            _ => continue,
        };
        for declarator in declarations {
            if let oxc::ast::ast::BindingPattern::BindingIdentifier(id) = &declarator.id
                && id.name == local_name.as_str()
            {
                declarator_init = declarator.init.as_ref();
            }
        }
    }

    match declarator_init.map(unparen) {
        Some(Expression::ArrayExpression(array)) => Ok(array),
        Some(_) => Err(ResolutionError::NotAnArray(file.to_path_buf())),
        None => Err(ResolutionError::ExportNotFound(file.to_path_buf())),
    }
}
