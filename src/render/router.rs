//! Router collaboration seam.
//!
//! Route matching and data loading belong to the host's router; the engine
//! only needs the outcome: either a full router context to render with, or a
//! response-like value (declarative redirect / status change) that ends the
//! request before the renderer is ever invoked.

use serde_json::{Map, Value};

/// Inbound request as the engine sees it.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }
}

/// Server-side response override: a status change or redirect raised by a
/// loader before rendering, or by a component mid-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOverride {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseOverride {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("location".into(), location.into())],
        }
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
            .map(|(_, value)| value.as_str())
    }
}

/// One matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Composite position id, aligned with the manifest keys (`"0-2-1"`).
    pub id: String,
    /// The route module's import identity, when the build tagged one
    /// (development asset resolution).
    pub path_id: Option<String>,
}

impl RouteMatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path_id: None,
        }
    }
}

/// A loader/action error attached to a route.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteError {
    /// Routing-layer error response (404 and friends).
    Response {
        status: u16,
        status_text: String,
        data: Value,
    },
    /// Plain thrown error. Only the message survives serialization; stack
    /// traces never leave the server.
    Error { message: String },
    /// Arbitrary thrown value.
    Value(Value),
}

/// Everything the renderer needs once matching and loading succeeded.
#[derive(Debug, Clone, Default)]
pub struct RouterContext {
    /// Status the router decided on (200, or e.g. 404 for no match).
    pub status: u16,
    pub matches: Vec<RouteMatch>,
    /// Loader results keyed by route id.
    pub loader_data: Map<String, Value>,
    /// Action results keyed by route id.
    pub action_data: Option<Map<String, Value>>,
    /// Errors keyed by route id.
    pub errors: Option<Vec<(String, RouteError)>>,
}

impl RouterContext {
    pub fn with_matches(matches: Vec<RouteMatch>) -> Self {
        Self {
            status: 200,
            matches,
            ..Self::default()
        }
    }

    pub fn route_ids(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.id.clone()).collect()
    }

    pub fn module_ids(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter_map(|m| m.path_id.clone())
            .collect()
    }
}

/// Result of matching + loading a request.
#[derive(Debug, Clone)]
pub enum RouterOutcome {
    /// Render with this context.
    Context(RouterContext),
    /// A loader produced a response-like value: apply it, skip rendering.
    Response(ResponseOverride),
}

/// The host router: matches routes and runs loaders/actions.
pub trait RouteHandler: Send + Sync {
    fn query(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = anyhow::Result<RouterOutcome>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_override() {
        let redirect = ResponseOverride::redirect(302, "/login");
        assert!(redirect.is_redirect());
        assert_eq!(redirect.location(), Some("/login"));

        let not_found = ResponseOverride::status(404);
        assert!(!not_found.is_redirect());
        assert_eq!(not_found.location(), None);
    }

    #[test]
    fn test_context_id_projections() {
        let context = RouterContext::with_matches(vec![
            RouteMatch::new("0"),
            RouteMatch {
                id: "0-1".into(),
                path_id: Some("@pages/home".into()),
            },
        ]);
        assert_eq!(context.route_ids(), vec!["0".to_string(), "0-1".to_string()]);
        assert_eq!(context.module_ids(), vec!["@pages/home".to_string()]);
    }
}
