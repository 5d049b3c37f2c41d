use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{
    date_value, into_map, text_value, AttachmentSlot, EditableRecord, Registrable, Resource,
};
use crate::cache::{keys, QueryKey};
use crate::form::{FieldSpec, Schema};
use crate::gateway::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surgery {
    pub id: String,
    pub patient_id: String,
    pub username: String,
    pub name: String,
    pub surgery_date: Option<NaiveDate>,
    pub anesthesia: Option<String>,
    pub description: Option<String>,
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn surgery_schema() -> Schema {
    Schema::new()
        .field(FieldSpec::text("name").required("Nome da cirurgia é obrigatório"))
        .field(FieldSpec::date("surgeryDate").required("Data da cirurgia é obrigatória"))
        .field(FieldSpec::text("anesthesia"))
        .field(FieldSpec::text("description"))
}

impl Resource for Surgery {
    const NAME: &'static str = "surgery";
    const COLLECTION: &'static str = paths::SURGERIES;
    const ATTACHMENT: Option<AttachmentSlot> = Some(AttachmentSlot::RECORD_FILE);

    fn item_path(id: &str) -> String {
        paths::surgery(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::surgery(id)
    }
}

impl EditableRecord for Surgery {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> Schema {
        surgery_schema()
    }

    fn form_values(&self) -> Map<String, Value> {
        into_map(json!({
            "name": self.name,
            "surgeryDate": date_value(self.surgery_date),
            "anesthesia": text_value(&self.anesthesia),
            "description": text_value(&self.description),
        }))
    }

    /// Surgeries are listed inside the patient detail.
    fn dependent_keys(&self) -> Vec<QueryKey> {
        vec![keys::patient(&self.patient_id), keys::surgery(&self.id)]
    }

    fn preview_url(&self) -> Option<&str> {
        self.file_url.as_deref()
    }
}

impl Registrable for Surgery {
    fn create_schema() -> Schema {
        surgery_schema()
    }

    fn created_keys(parent: Option<&str>) -> Vec<QueryKey> {
        parent.map(keys::patient).into_iter().collect()
    }
}
