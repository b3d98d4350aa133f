//! Minimal GraphQL-over-HTTP transport.
//!
//! A request is a JSON `POST` of `{ "query", "variables" }`; the response is
//! `{ "data", "errors" }`. Errors reported by the server win over everything
//! else, including a non-2xx status, because they carry the useful message.
//!
//! 最小化的 GraphQL-over-HTTP 传输层。服务器返回的 `errors` 优先于其他一切错误。

use crate::error::{HandshakeError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Header carrying the connector token on unauthenticated calls.
pub const CONNECTOR_TOKEN_HEADER: &str = "connector-token";

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    variables: Map<String, Value>,
}

impl<'a> GraphQlRequest<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            variables: Map::new(),
        }
    }

    pub fn var(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

/// Runs `request` against `url` and decodes `data` into `T`.
///
/// `token`, when given, is sent as the [`CONNECTOR_TOKEN_HEADER`].
///
/// 在 `url` 上执行请求并将 `data` 解码为 `T`。
pub async fn execute<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    token: Option<&str>,
    request: &GraphQlRequest<'_>,
) -> Result<T> {
    debug!(url, "sending GraphQL request");

    let mut builder = client.post(url).json(request);
    if let Some(token) = token {
        builder = builder.header(CONNECTOR_TOKEN_HEADER, token);
    }
    let response = builder.send().await?;
    let status_error = response.error_for_status_ref().err();
    let body = response.text().await?;

    let parsed = serde_json::from_str::<GraphQlResponse<T>>(&body);
    match (parsed, status_error) {
        (Ok(response), _) if !response.errors.is_empty() => Err(HandshakeError::GraphQl(
            response.errors.into_iter().map(|e| e.message).collect(),
        )),
        (_, Some(status_error)) => Err(status_error.into()),
        (Ok(response), None) => response.data.ok_or_else(|| {
            HandshakeError::protocol(format!("GraphQL response from {url} carries no data"))
        }),
        (Err(e), None) => Err(HandshakeError::protocol(format!(
            "unexpected GraphQL response from {url}: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/graphql")
    }

    #[derive(Debug, Deserialize)]
    struct Echo {
        token: Option<String>,
        name: Option<String>,
    }

    #[tokio::test]
    async fn test_data_and_token_header() {
        let router = Router::new().route(
            "/graphql",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let token = headers
                    .get(CONNECTOR_TOKEN_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Json(json!({ "data": { "token": token, "name": body["variables"]["name"] } }))
            }),
        );
        let url = serve(router).await;

        let request =
            GraphQlRequest::new("query($name: String!) { echo(name: $name) }").var("name", "app");
        let echo: Echo = execute(&Client::new(), &url, Some("secret"), &request)
            .await
            .unwrap();

        assert_eq!(echo.token.as_deref(), Some("secret"));
        assert_eq!(echo.name.as_deref(), Some("app"));
    }

    #[tokio::test]
    async fn test_errors_are_surfaced_even_with_bad_status() {
        let router = Router::new().route(
            "/graphql",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "errors": [{ "message": "invalid token" }] })),
                )
            }),
        );
        let url = serve(router).await;

        let err = execute::<Value>(&Client::new(), &url, None, &GraphQlRequest::new("{ x }"))
            .await
            .unwrap_err();
        match err {
            HandshakeError::GraphQl(messages) => assert_eq!(messages, vec!["invalid token"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_data_is_protocol_error() {
        let router =
            Router::new().route("/graphql", post(|| async { Json(json!({ "data": null })) }));
        let url = serve(router).await;

        let err = execute::<Value>(&Client::new(), &url, None, &GraphQlRequest::new("{ x }"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_bad_status_without_body_is_network_error() {
        let router = Router::new().route(
            "/graphql",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = serve(router).await;

        let err = execute::<Value>(&Client::new(), &url, None, &GraphQlRequest::new("{ x }"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Network(_)));
    }
}
