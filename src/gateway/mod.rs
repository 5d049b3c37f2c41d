//! Remote entity gateway: typed HTTP verbs over the clinic's REST resources.
//!
//! The gateway owns no state beyond its transport. `Gateway` is the seam
//! between the record flows and the network: `HttpGateway` talks to the real
//! API, `MockGateway` scripts responses for tests.

pub mod api;
pub mod http;
pub mod mock;
pub mod paths;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

pub use api::{Api, UploadedFile};
pub use http::HttpGateway;
pub use mock::MockGateway;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Errors surfaced by any gateway implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Response parsing error: {0}")]
    Parse(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Parse(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════

/// HTTP verbs used by the clinic API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which upload endpoint a file goes to. Each has a single named multipart field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadKind {
    /// Profile photos: `/uploads/image/`, field `image`.
    Image,
    /// Attachments: `/uploads/file/`, field `file`.
    File,
}

impl UploadKind {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::File => "file",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Image => paths::UPLOAD_IMAGE,
            Self::File => paths::UPLOAD_FILE,
        }
    }
}

/// A file picked by the user, not yet uploaded.
#[derive(Clone, PartialEq)]
pub struct Upload {
    pub kind: UploadKind,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(kind: UploadKind, filename: &str, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            filename: filename.to_string(),
            bytes,
        }
    }

    /// Size as reported to the API. Informational only.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// MIME type guessed from the filename extension.
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Multipart(Upload),
}

/// One call against the REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn json(method: Method, path: impl Into<String>, body: Value) -> Self {
        Self {
            body: Body::Json(body),
            ..Self::new(method, path)
        }
    }

    pub fn upload(upload: Upload) -> Self {
        Self {
            body: Body::Multipart(upload.clone()),
            ..Self::new(Method::Post, upload.kind.path())
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

// ═══════════════════════════════════════════════════════════
// Gateway trait
// ═══════════════════════════════════════════════════════════

/// Transport for the clinic REST API.
///
/// Returns the parsed JSON body (`Value::Null` for empty bodies). Non-2xx
/// responses are errors; there is no retry.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_is_object_safe() {
        fn _assert(_: &dyn Gateway) {}
    }

    #[test]
    fn upload_kinds_map_to_endpoints() {
        assert_eq!(UploadKind::Image.path(), "/uploads/image/");
        assert_eq!(UploadKind::Image.field_name(), "image");
        assert_eq!(UploadKind::File.path(), "/uploads/file/");
        assert_eq!(UploadKind::File.field_name(), "file");
    }

    #[test]
    fn upload_request_posts_to_kind_path() {
        let upload = Upload::new(UploadKind::File, "raio-x.pdf", vec![1, 2, 3]);
        let request = ApiRequest::upload(upload.clone());
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/uploads/file/");
        assert_eq!(request.body, Body::Multipart(upload));
    }

    #[test]
    fn upload_guesses_content_type() {
        let pdf = Upload::new(UploadKind::File, "exam.pdf", vec![]);
        assert_eq!(pdf.content_type(), "application/pdf");
        let jpg = Upload::new(UploadKind::Image, "rex.JPG", vec![0; 10]);
        assert_eq!(jpg.content_type(), "image/jpeg");
        assert_eq!(jpg.size(), 10);
        let unknown = Upload::new(UploadKind::File, "notes", vec![]);
        assert_eq!(unknown.content_type(), "application/octet-stream");
    }

    #[test]
    fn upload_debug_hides_bytes() {
        let upload = Upload::new(UploadKind::Image, "a.png", vec![7; 4]);
        let rendered = format!("{upload:?}");
        assert!(rendered.contains("size: 4"));
        assert!(!rendered.contains("[7, 7"));
    }

    #[test]
    fn method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
