use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{
    date_value, into_map, not_before, text_value, AttachmentSlot, EditableRecord, Registrable,
    Resource,
};
use crate::cache::{keys, QueryKey};
use crate::form::{FieldSpec, Schema};
use crate::gateway::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospitalization {
    pub id: String,
    pub patient_id: String,
    pub username: String,
    pub reason: String,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub observations: Option<String>,
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hospitalization {
    /// Still admitted.
    pub fn is_active(&self) -> bool {
        self.discharge_date.is_none()
    }
}

fn hospitalization_schema() -> Schema {
    Schema::new()
        .field(FieldSpec::text("reason").required("Motivo da internação é obrigatório"))
        .field(FieldSpec::date("admissionDate").required("Data de entrada é obrigatória"))
        .field(FieldSpec::date("dischargeDate"))
        .field(FieldSpec::text("observations"))
        .refine(
            "dischargeDate",
            "A alta não pode ser anterior à entrada",
            |v| not_before(v, "admissionDate", "dischargeDate"),
        )
}

impl Resource for Hospitalization {
    const NAME: &'static str = "hospitalization";
    const COLLECTION: &'static str = paths::HOSPITALIZATIONS;
    const ATTACHMENT: Option<AttachmentSlot> = Some(AttachmentSlot::RECORD_FILE);

    fn item_path(id: &str) -> String {
        paths::hospitalization(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::hospitalization(id)
    }
}

impl EditableRecord for Hospitalization {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> Schema {
        hospitalization_schema()
    }

    fn form_values(&self) -> Map<String, Value> {
        into_map(json!({
            "reason": self.reason,
            "admissionDate": date_value(self.admission_date),
            "dischargeDate": date_value(self.discharge_date),
            "observations": text_value(&self.observations),
        }))
    }

    fn dependent_keys(&self) -> Vec<QueryKey> {
        vec![keys::patient(&self.patient_id), keys::hospitalization(&self.id)]
    }

    fn preview_url(&self) -> Option<&str> {
        self.file_url.as_deref()
    }
}

impl Registrable for Hospitalization {
    fn create_schema() -> Schema {
        hospitalization_schema()
    }

    fn created_keys(parent: Option<&str>) -> Vec<QueryKey> {
        parent.map(keys::patient).into_iter().collect()
    }
}
