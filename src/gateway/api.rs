//! Typed facade over a `Gateway`.

use std::sync::Arc;

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiRequest, Gateway, GatewayError, Method, Upload};
use crate::cache::QueryFn;

/// Response of `/uploads/image/` and `/uploads/file/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(alias = "imageUrl", alias = "fileUrl")]
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Cloneable handle issuing typed requests through a shared gateway.
#[derive(Clone)]
pub struct Api {
    gateway: Arc<dyn Gateway>,
}

impl Api {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> Arc<dyn Gateway> {
        Arc::clone(&self.gateway)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self.gateway.send(ApiRequest::get(path)).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::Post, path, body).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::Patch, path, body).await
    }

    /// DELETE a resource. Any response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.gateway.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Upload a file to the endpoint matching its kind.
    pub async fn upload(&self, upload: Upload) -> Result<UploadedFile, GatewayError> {
        let filename = upload.filename.clone();
        let size = upload.size();
        let value = self.gateway.send(ApiRequest::upload(upload)).await?;
        let mut uploaded: UploadedFile = serde_json::from_value(value)?;
        // The API does not always echo these back.
        if uploaded.filename.is_none() {
            uploaded.filename = Some(filename);
        }
        if uploaded.size.is_none() {
            uploaded.size = Some(size);
        }
        Ok(uploaded)
    }

    /// Cache fetcher issuing a GET for `path` with optional query parameters.
    pub fn query_fn(&self, path: String, query: Vec<(String, String)>) -> QueryFn {
        let gateway = self.gateway();
        Arc::new(move || {
            let gateway = Arc::clone(&gateway);
            let request = ApiRequest::get(path.clone()).with_query(query.clone());
            async move { gateway.send(request).await }.boxed()
        })
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body: Value = serde_json::to_value(body)?;
        let value = self.gateway.send(ApiRequest::json(method, path, body)).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::gateway::{Body, MockGateway, UploadKind};

    #[tokio::test]
    async fn get_deserializes_typed() {
        let mock = MockGateway::new();
        mock.respond(Method::Get, "/user/me", json!({"id": "u1", "name": "Ana"}));
        let api = Api::new(mock.clone().shared());

        let user: Value = api.get("/user/me").await.unwrap();
        assert_eq!(user["name"], "Ana");
        assert_eq!(mock.count(Method::Get, "/user/me"), 1);
    }

    #[tokio::test]
    async fn patch_serializes_body() {
        let mock = MockGateway::new();
        mock.respond(Method::Patch, "/reports/r1", json!({"ok": true}));
        let api = Api::new(mock.clone().shared());

        let _: Value = api
            .patch("/reports/r1", &json!({"title": "Retorno"}))
            .await
            .unwrap();
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, Body::Json(json!({"title": "Retorno"})));
    }

    #[tokio::test]
    async fn upload_fills_missing_metadata() {
        let mock = MockGateway::new();
        mock.respond(Method::Post, "/uploads/image/", json!({"imageUrl": "https://cdn/x.png"}));
        let api = Api::new(mock.shared());

        let uploaded = api
            .upload(Upload::new(UploadKind::Image, "x.png", vec![0; 12]))
            .await
            .unwrap();
        assert_eq!(uploaded.url, "https://cdn/x.png");
        assert_eq!(uploaded.filename.as_deref(), Some("x.png"));
        assert_eq!(uploaded.size, Some(12));
    }

    #[tokio::test]
    async fn delete_ignores_body() {
        let mock = MockGateway::new();
        mock.respond(Method::Delete, "/files/f1", Value::Null);
        let api = Api::new(mock.clone().shared());

        api.delete("/files/f1").await.unwrap();
        assert_eq!(mock.count(Method::Delete, "/files/f1"), 1);
    }

    #[tokio::test]
    async fn query_fn_issues_get_each_call() {
        let mock = MockGateway::new();
        mock.respond(Method::Get, "/exams/p1/exams", json!([]));
        let api = Api::new(mock.clone().shared());

        let fetch = api.query_fn("/exams/p1/exams".into(), vec![]);
        assert_eq!(fetch().await.unwrap(), json!([]));
        assert_eq!(fetch().await.unwrap(), json!([]));
        assert_eq!(mock.count(Method::Get, "/exams/p1/exams"), 2);
    }
}
