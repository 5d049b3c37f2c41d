use serde::{Deserialize, Serialize};

use super::{AttachmentSlot, Registrable, Resource};
use crate::cache::{keys, QueryKey};
use crate::form::{FieldSpec, Schema};
use crate::gateway::{paths, UploadKind};

/// Document attached directly to a patient. Created by upload, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFile {
    pub id: String,
    pub patient_id: String,
    pub filename: String,
    pub url: String,
    /// Informational; never checked against the uploaded bytes.
    #[serde(default)]
    pub size: u64,
}

impl Resource for PatientFile {
    const NAME: &'static str = "file";
    const COLLECTION: &'static str = paths::FILES;
    const ATTACHMENT: Option<AttachmentSlot> = Some(AttachmentSlot {
        kind: UploadKind::File,
        url_field: "url",
        name_field: Some("filename"),
        size_field: Some("size"),
    });

    fn item_path(id: &str) -> String {
        paths::file(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::file(id)
    }
}

impl Registrable for PatientFile {
    const UPLOAD_REQUIRED: bool = true;

    /// Everything comes from the upload.
    fn create_schema() -> Schema {
        Schema::new().field(FieldSpec::text("filename"))
    }

    fn created_keys(parent: Option<&str>) -> Vec<QueryKey> {
        parent.map(keys::patient_files).into_iter().collect()
    }
}
