use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use super::{ApiRequest, Body, Gateway, GatewayError, Method};
use crate::config::ClientConfig;
use crate::session::Session;

/// reqwest-backed gateway for the clinic REST API.
///
/// The bearer token is captured when the client is built; changing the cookie
/// afterwards has no effect on this instance.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    authenticated: bool,
}

impl HttpGateway {
    /// Build a gateway for `config`, attaching `session`'s token to every request.
    pub fn new(config: &ClientConfig, session: &Session) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = session.authorization() {
            let mut value = HeaderValue::from_str(&auth)
                .map_err(|e| GatewayError::Client(format!("Invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Client(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            authenticated: session.is_authenticated(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn builder(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let url = self.url(&request.path);
        let mut builder = self.builder(request.method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            Body::Empty => builder,
            Body::Json(body) => builder.json(&body),
            Body::Multipart(upload) => {
                let content_type = upload.content_type();
                let field = upload.kind.field_name();
                let part = reqwest::multipart::Part::bytes(upload.bytes)
                    .file_name(upload.filename)
                    .mime_str(&content_type)
                    .map_err(|e| GatewayError::Client(e.to_string()))?;
                builder.multipart(reqwest::multipart::Form::new().part(field, part))
            }
        };

        tracing::debug!(method = %request.method, path = %request.path, "API request");

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                GatewayError::Network(format!("Cannot reach {}", self.base_url))
            } else if e.is_timeout() {
                GatewayError::Network("Request timed out".into())
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "API request failed"
            );
            return Err(match status.as_u16() {
                401 | 403 => GatewayError::Unauthorized(body),
                404 => GatewayError::NotFound(request.path),
                code => GatewayError::Http { status: code, body },
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::extract::{Multipart, Path, Query};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::gateway::{Upload, UploadKind};

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn echo_patient(headers: AxumHeaders, Path(id): Path<String>) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Json(json!({ "id": id, "auth": auth }))
    }

    async fn echo_query(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!(params))
    }

    async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({ "received": body }))
    }

    async fn receive_upload(mut multipart: Multipart) -> Json<Value> {
        let mut out = json!({});
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            out = json!({
                "url": format!("https://cdn.example/{filename}"),
                "field": name,
                "filename": filename,
                "contentType": content_type,
                "size": bytes.len(),
            });
        }
        Json(out)
    }

    fn router() -> Router {
        Router::new()
            .route("/patient/:id", get(echo_patient).patch(echo_body))
            .route("/patient/search/filters", get(echo_query))
            .route("/files/:id", axum::routing::delete(|| async { StatusCode::NO_CONTENT }))
            .route("/uploads/file/", post(receive_upload))
            .route("/bad-json", get(|| async { "definitely not json" }))
            .route("/locked", get(|| async { (StatusCode::UNAUTHORIZED, "expired") }))
            .route("/boom", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
    }

    async fn gateway_for(session: Session) -> HttpGateway {
        let base = spawn_server(router()).await;
        HttpGateway::new(&ClientConfig::with_base_url(&base), &session).unwrap()
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let gateway = gateway_for(Session::with_token("abc")).await;
        assert!(gateway.is_authenticated());

        let body = gateway.send(ApiRequest::get("/patient/p1")).await.unwrap();
        assert_eq!(body["id"], "p1");
        assert_eq!(body["auth"], "Bearer abc");
    }

    #[tokio::test]
    async fn anonymous_session_sends_no_header() {
        let gateway = gateway_for(Session::anonymous()).await;
        let body = gateway.send(ApiRequest::get("/patient/p1")).await.unwrap();
        assert!(body["auth"].is_null());
    }

    #[tokio::test]
    async fn sends_json_body() {
        let gateway = gateway_for(Session::anonymous()).await;
        let body = gateway
            .send(ApiRequest::json(Method::Patch, "/patient/p1", json!({"name": "Rex"})))
            .await
            .unwrap();
        assert_eq!(body["received"]["name"], "Rex");
    }

    #[tokio::test]
    async fn encodes_query_parameters() {
        let gateway = gateway_for(Session::anonymous()).await;
        let request = ApiRequest::get("/patient/search/filters")
            .with_query(vec![("name".into(), "Rex da Silva".into())]);
        let body = gateway.send(request).await.unwrap();
        assert_eq!(body["name"], "Rex da Silva");
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let gateway = gateway_for(Session::anonymous()).await;
        let body = gateway.send(ApiRequest::delete("/files/f1")).await.unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn uploads_multipart_with_named_field() {
        let gateway = gateway_for(Session::anonymous()).await;
        let upload = Upload::new(UploadKind::File, "hemograma.pdf", vec![1, 2, 3, 4]);
        let body = gateway.send(ApiRequest::upload(upload)).await.unwrap();
        assert_eq!(body["field"], "file");
        assert_eq!(body["filename"], "hemograma.pdf");
        assert_eq!(body["contentType"], "application/pdf");
        assert_eq!(body["size"], 4);
    }

    #[tokio::test]
    async fn maps_status_codes() {
        let gateway = gateway_for(Session::anonymous()).await;

        let err = gateway.send(ApiRequest::get("/nowhere")).await.unwrap_err();
        assert_eq!(err, GatewayError::NotFound("/nowhere".into()));

        let err = gateway.send(ApiRequest::get("/locked")).await.unwrap_err();
        assert_eq!(err, GatewayError::Unauthorized("expired".into()));

        let err = gateway.send(ApiRequest::get("/boom")).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Http {
                status: 500,
                body: "boom".into()
            }
        );
    }

    #[tokio::test]
    async fn invalid_json_is_parse_error() {
        let gateway = gateway_for(Session::anonymous()).await;
        let err = gateway.send(ApiRequest::get("/bad-json")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = ClientConfig::with_base_url(&format!("http://{addr}"));
        config.request_timeout = Some(Duration::from_secs(5));
        let gateway = HttpGateway::new(&config, &Session::anonymous()).unwrap();

        let err = gateway.send(ApiRequest::get("/patient/p1")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
    }

    #[test]
    fn base_url_is_trimmed() {
        let gateway = HttpGateway::new(
            &ClientConfig::with_base_url("http://localhost:3333/"),
            &Session::anonymous(),
        )
        .unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:3333");
        assert_eq!(gateway.url("/user/me"), "http://localhost:3333/user/me");
    }
}
