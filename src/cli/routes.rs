//! `strada routes` - resolve and print the route tree.

use crate::config::AppConfig;
use crate::log;
use crate::routes::{RouteKind, RouteNode, RouteResolver, route_identities};
use anyhow::Result;

/// Resolve the route tree from the client entry and print it.
pub fn print_routes(config: &AppConfig, json: bool) -> Result<()> {
    let tree = RouteResolver::new(config).resolve()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    print_nodes(&tree, None);
    log!("routes"; "{} routes carry an import identity", route_identities(&tree).len());
    Ok(())
}

fn print_nodes(nodes: &[RouteNode], prefix: Option<&str>) {
    for node in nodes {
        let id = match prefix {
            Some(prefix) => format!("{prefix}-{}", node.index),
            None => node.index.to_string(),
        };
        let label = match &node.kind {
            RouteKind::Lazy { specifier } => format!("lazy     {specifier}"),
            RouteKind::Static { identity } => format!("static   {identity}"),
            RouteKind::Bare => "children".to_string(),
        };
        let depth = id.matches('-').count();
        println!("{:indent$}{id:<8} {label}", "", indent = depth * 2);
        print_nodes(&node.children, Some(&id));
    }
}
