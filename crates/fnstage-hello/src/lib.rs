//! HTTP greeting function.
//!
//! Any method on `/` answers `200 text/plain` with `Hello, <name>!`, where
//! `name` comes from an optional JSON body such as `{"name": "Ada"}`.
//! Bodies that are not JSON objects, and names that are missing, empty or not
//! strings, get `Hello, World!`.
//!
//! Cloud Functions has no Rust runtime, so fnstage never deploys this crate.
//! It is a local reference for the HTTP contract the deployed functions
//! implement, while the `fnstage init` template declares a `nodejs20`
//! function. Run it with `cargo run -p fnstage-hello` (listens on `$PORT`).

use axum::Router;
use axum::body::Bytes;
use axum::routing::any;
use serde_json::Value;
use tower_http::trace::TraceLayer;

pub const DEFAULT_NAME: &str = "World";

pub fn router() -> Router {
    Router::new()
        .route("/", any(greet))
        .layer(TraceLayer::new_for_http())
}

async fn greet(body: Bytes) -> String {
    let request = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "body is not JSON");
                Value::Null
            }
        }
    };
    greeting(request.get("name").and_then(Value::as_str))
}

/// `Hello, <name>!`, falling back to [`DEFAULT_NAME`] for a missing or empty name.
pub fn greeting(name: Option<&str>) -> String {
    let name = match name {
        Some(n) if !n.is_empty() => n,
        _ => DEFAULT_NAME,
    };
    format!("Hello, {name}!")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_defaults() {
        assert_eq!(greeting(None), "Hello, World!");
        assert_eq!(greeting(Some("")), "Hello, World!");
        assert_eq!(greeting(Some("Ada")), "Hello, Ada!");
    }
}
