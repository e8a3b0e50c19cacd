//! Hydration state serialization.
//!
//! The response footer carries the router state (loader/action results plus
//! serialized errors) and any caller-supplied payloads as inline script
//! tags, so a client can resume interactivity without re-fetching.

use super::router::{RouteError, RouterContext};
use serde_json::{Map, Value, json};

/// Reserved window key carrying router hydration state.
pub const ROUTER_STATE_KEY: &str = "__staticRouterHydrationData";

/// Build the router-state script tag.
pub fn build_router_state(context: &RouterContext) -> String {
    let state = json!({
        "loaderData": context.loader_data,
        "actionData": context.action_data,
        "errors": serialize_errors(context.errors.as_deref()),
    });

    format!("<script async>window.{ROUTER_STATE_KEY} = {state};</script>")
}

/// Serialize route errors for the client.
///
/// Plain errors keep only their message - stack traces never leave the
/// server. Routing error responses keep their fields and are tagged so the
/// client can rebuild the right type.
fn serialize_errors(errors: Option<&[(String, RouteError)]>) -> Value {
    let Some(errors) = errors else {
        return Value::Null;
    };

    let mut serialized = Map::new();
    for (route_id, error) in errors {
        let value = match error {
            RouteError::Response {
                status,
                status_text,
                data,
            } => json!({
                "status": status,
                "statusText": status_text,
                "data": data,
                "__type": "RouteErrorResponse",
            }),
            RouteError::Error { message } => json!({
                "message": message,
                "__type": "Error",
            }),
            RouteError::Value(value) => value.clone(),
        };
        serialized.insert(route_id.clone(), value);
    }

    Value::Object(serialized)
}

/// Build script tags for caller-supplied state payloads. Empty keys and
/// empty payloads are skipped.
pub fn build_custom_state(state: Option<&Map<String, Value>>) -> String {
    let Some(state) = state else {
        return String::new();
    };

    state
        .iter()
        .filter_map(|(key, value)| {
            if key.is_empty() || !has_content(value) {
                return None;
            }
            Some(format!("<script async>window.{key} = {value}</script>"))
        })
        .collect::<Vec<_>>()
        .join("")
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::router::RouteMatch;

    #[test]
    fn test_router_state_tag_shape() {
        let mut context = RouterContext::with_matches(vec![RouteMatch::new("0")]);
        context
            .loader_data
            .insert("0".into(), json!({ "user": "ada" }));

        let tag = build_router_state(&context);
        assert!(tag.starts_with(&format!("<script async>window.{ROUTER_STATE_KEY} = ")));
        assert!(tag.contains(r#""loaderData":{"0":{"user":"ada"}}"#));
        assert!(tag.contains(r#""errors":null"#));
        assert!(tag.ends_with(";</script>"));
    }

    #[test]
    fn test_plain_errors_lose_everything_but_message() {
        let mut context = RouterContext::default();
        context.errors = Some(vec![(
            "0-1".into(),
            RouteError::Error {
                message: "loader failed".into(),
            },
        )]);

        let tag = build_router_state(&context);
        assert!(tag.contains(r#""0-1":{"message":"loader failed","__type":"Error"}"#));
        assert!(!tag.contains("stack"));
    }

    #[test]
    fn test_route_error_responses_keep_fields() {
        let mut context = RouterContext::default();
        context.errors = Some(vec![(
            "0".into(),
            RouteError::Response {
                status: 404,
                status_text: "Not Found".into(),
                data: json!("No route matches URL \"/missing\""),
            },
        )]);

        let tag = build_router_state(&context);
        assert!(tag.contains(r#""__type":"RouteErrorResponse""#));
        assert!(tag.contains(r#""status":404"#));
    }

    #[test]
    fn test_custom_state_skips_empty_payloads() {
        let mut state = Map::new();
        state.insert("APP_STATE".into(), json!({ "theme": "dark" }));
        state.insert("EMPTY".into(), json!({}));
        state.insert("NULLED".into(), Value::Null);

        let tags = build_custom_state(Some(&state));
        assert_eq!(
            tags,
            r#"<script async>window.APP_STATE = {"theme":"dark"}</script>"#
        );
    }

    #[test]
    fn test_no_custom_state_renders_nothing() {
        assert_eq!(build_custom_state(None), "");
    }
}
