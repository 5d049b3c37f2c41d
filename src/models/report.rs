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
pub struct Report {
    pub id: String,
    pub patient_id: String,
    pub username: String,
    pub title: String,
    pub description: Option<String>,
    pub report_date: Option<NaiveDate>,
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn report_schema() -> Schema {
    Schema::new()
        .field(
            FieldSpec::text("title")
                .required("Título é obrigatório")
                .max_len(120, "Título deve ter no máximo 120 caracteres"),
        )
        .field(FieldSpec::text("description"))
        .field(FieldSpec::date("reportDate").required("Data do relatório é obrigatória"))
}

impl Resource for Report {
    const NAME: &'static str = "report";
    const COLLECTION: &'static str = paths::REPORTS;
    const ATTACHMENT: Option<AttachmentSlot> = Some(AttachmentSlot::RECORD_FILE);

    fn item_path(id: &str) -> String {
        paths::report(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::report(id)
    }
}

impl EditableRecord for Report {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> Schema {
        report_schema()
    }

    fn form_values(&self) -> Map<String, Value> {
        into_map(json!({
            "title": self.title,
            "description": text_value(&self.description),
            "reportDate": date_value(self.report_date),
        }))
    }

    fn dependent_keys(&self) -> Vec<QueryKey> {
        vec![keys::patient_reports(&self.patient_id), keys::report(&self.id)]
    }

    fn preview_url(&self) -> Option<&str> {
        self.file_url.as_deref()
    }
}

impl Registrable for Report {
    fn create_schema() -> Schema {
        report_schema()
    }

    fn created_keys(parent: Option<&str>) -> Vec<QueryKey> {
        parent.map(keys::patient_reports).into_iter().collect()
    }
}
