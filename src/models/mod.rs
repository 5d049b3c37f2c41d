//! Clinic records as the REST API serves them (camelCase JSON), plus the
//! descriptors the modals and views need to fetch, edit and create them.

pub mod exam;
pub mod file;
pub mod hospitalization;
pub mod patient;
pub mod report;
pub mod surgery;
pub mod user;
pub mod vaccine;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::QueryKey;
use crate::form::Schema;
use crate::gateway::{UploadKind, UploadedFile};

pub use exam::Exam;
pub use file::PatientFile;
pub use hospitalization::Hospitalization;
pub use patient::Patient;
pub use report::Report;
pub use surgery::Surgery;
pub use user::User;
pub use vaccine::Vaccine;

/// Free-text diagnosis label. Label and value are the typed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisTag {
    pub label: String,
    pub value: String,
}

impl DiagnosisTag {
    pub fn new(text: &str) -> Self {
        Self {
            label: text.to_string(),
            value: text.to_string(),
        }
    }
}

/// Where an uploaded file's metadata lands in a record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentSlot {
    pub kind: UploadKind,
    pub url_field: &'static str,
    pub name_field: Option<&'static str>,
    pub size_field: Option<&'static str>,
}

impl AttachmentSlot {
    /// Profile photo stored as a bare URL.
    pub const PROFILE_IMAGE: Self = Self {
        kind: UploadKind::Image,
        url_field: "profileImg",
        name_field: None,
        size_field: None,
    };

    /// Attached document on a clinical record.
    pub const RECORD_FILE: Self = Self {
        kind: UploadKind::File,
        url_field: "fileUrl",
        name_field: Some("filename"),
        size_field: Some("fileSize"),
    };

    /// Merge an upload result into a mutation payload.
    pub fn merge(&self, payload: &mut Map<String, Value>, uploaded: &UploadedFile) {
        payload.insert(self.url_field.to_string(), Value::String(uploaded.url.clone()));
        if let (Some(field), Some(name)) = (self.name_field, &uploaded.filename) {
            payload.insert(field.to_string(), Value::String(name.clone()));
        }
        if let (Some(field), Some(size)) = (self.size_field, uploaded.size) {
            payload.insert(field.to_string(), Value::from(size));
        }
    }
}

/// A REST resource with a detail endpoint and a collection endpoint.
pub trait Resource: DeserializeOwned + Send + Sync + 'static {
    /// Used in logs.
    const NAME: &'static str;
    /// POST target for creation.
    const COLLECTION: &'static str;
    const ATTACHMENT: Option<AttachmentSlot> = None;
    /// Array field fed by the diagnosis tag input.
    const TAGS_FIELD: Option<&'static str> = None;

    fn item_path(id: &str) -> String;

    fn detail_key(id: &str) -> QueryKey;
}

/// A record the edit modal can hydrate and PATCH.
pub trait EditableRecord: Resource + Clone + std::fmt::Debug {
    fn id(&self) -> &str;

    fn schema() -> Schema;

    /// Raw form values for hydration, keyed by schema field name.
    fn form_values(&self) -> Map<String, Value>;

    /// Cached views to refresh after a successful update.
    fn dependent_keys(&self) -> Vec<QueryKey>;

    fn diagnosis_tags(&self) -> Vec<DiagnosisTag> {
        Vec::new()
    }

    fn preview_url(&self) -> Option<&str> {
        None
    }
}

/// A record the register modal can create.
pub trait Registrable: Resource {
    /// Child records carry `patientId`.
    const NEEDS_PARENT: bool = true;
    /// Creation is meaningless without a file.
    const UPLOAD_REQUIRED: bool = false;

    fn create_schema() -> Schema;

    /// Cached views to refresh after creation under `parent`.
    fn created_keys(parent: Option<&str>) -> Vec<QueryKey>;
}

// ── Form value helpers ───────────────────────────────────

pub(crate) fn text_value(value: &Option<String>) -> Value {
    Value::String(value.clone().unwrap_or_default())
}

pub(crate) fn date_value(value: Option<NaiveDate>) -> Value {
    Value::String(value.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default())
}

pub(crate) fn number_value(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| Value::String(String::new()), Value::Number)
}

pub(crate) fn tags_value(tags: &[DiagnosisTag]) -> Value {
    serde_json::to_value(tags).unwrap_or_else(|_| Value::Array(Vec::new()))
}

pub(crate) fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Cross-field check: `later` is on or after `earlier` when both are set.
pub(crate) fn not_before(values: &Map<String, Value>, earlier: &str, later: &str) -> bool {
    match (values.get(earlier), values.get(later)) {
        (Some(Value::String(a)), Some(Value::String(b))) => b >= a,
        _ => true,
    }
}
