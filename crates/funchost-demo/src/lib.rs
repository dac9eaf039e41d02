//! Sample greeting function served the way a functions host serves it.
//!
//! Any path answers `GET` and `POST`. The caller's name comes from the
//! `name` query parameter or, failing that, a JSON body `{"name": "..."}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::debug;

/// Environment variable holding the response template.
pub const RESPONSE_MESSAGE_ENV: &str = "ResponseMessage";

/// Template used when `ResponseMessage` is not set.
pub const DEFAULT_RESPONSE_MESSAGE: &str = "Hello, {name}";

/// Body returned when no name was supplied.
pub const MISSING_NAME: &str = "Please pass a name on the query string or in the request body";

/// Name of the single function, as listed at startup.
pub const FUNCTION_NAME: &str = "SampleFunction-Get";

#[derive(Clone)]
pub struct GreetingState {
    message: Arc<str>,
}

impl GreetingState {
    pub fn new(message: impl AsRef<str>) -> Self {
        Self {
            message: Arc::from(message.as_ref()),
        }
    }

    /// Template from `ResponseMessage`, or the default.
    pub fn from_env() -> Self {
        let message = std::env::var(RESPONSE_MESSAGE_ENV)
            .unwrap_or_else(|_| DEFAULT_RESPONSE_MESSAGE.to_string());
        Self::new(message)
    }
}

#[derive(Deserialize)]
struct NameBody {
    name: Option<String>,
}

/// Router answering every path with the greeting function.
pub fn router(state: GreetingState) -> Router {
    Router::new().fallback(greet).with_state(state)
}

async fn greet(
    State(state): State<GreetingState>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if method != Method::GET && method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    // Query string wins; a body that is not JSON is ignored.
    let name = query.get("name").cloned().or_else(|| {
        serde_json::from_slice::<NameBody>(&body)
            .ok()
            .and_then(|b| b.name)
    });
    debug!(%method, name = ?name, "Processed a request");

    match name {
        Some(name) => text(StatusCode::OK, state.message.replace("{name}", &name)),
        None => text(StatusCode::BAD_REQUEST, MISSING_NAME.to_string()),
    }
}

fn text(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
