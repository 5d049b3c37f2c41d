use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{date_value, into_map, not_before, text_value, EditableRecord, Registrable, Resource};
use crate::cache::{keys, QueryKey};
use crate::form::{FieldSpec, Schema};
use crate::gateway::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccine {
    pub id: String,
    pub patient_id: String,
    pub username: String,
    pub name: String,
    pub application_date: Option<NaiveDate>,
    pub next_dose_date: Option<NaiveDate>,
    pub batch: Option<String>,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn vaccine_schema() -> Schema {
    Schema::new()
        .field(FieldSpec::text("name").required("Nome da vacina é obrigatório"))
        .field(FieldSpec::date("applicationDate").required("Data de aplicação é obrigatória"))
        .field(FieldSpec::date("nextDoseDate"))
        .field(FieldSpec::text("batch"))
        .field(FieldSpec::text("observations"))
        .refine(
            "nextDoseDate",
            "A próxima dose deve ser posterior à aplicação",
            |v| not_before(v, "applicationDate", "nextDoseDate"),
        )
}

impl Resource for Vaccine {
    const NAME: &'static str = "vaccine";
    const COLLECTION: &'static str = paths::VACCINES;

    fn item_path(id: &str) -> String {
        paths::vaccine(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::vaccine(id)
    }
}

impl EditableRecord for Vaccine {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> Schema {
        vaccine_schema()
    }

    fn form_values(&self) -> Map<String, Value> {
        into_map(json!({
            "name": self.name,
            "applicationDate": date_value(self.application_date),
            "nextDoseDate": date_value(self.next_dose_date),
            "batch": text_value(&self.batch),
            "observations": text_value(&self.observations),
        }))
    }

    fn dependent_keys(&self) -> Vec<QueryKey> {
        vec![keys::patient(&self.patient_id), keys::vaccine(&self.id)]
    }
}

impl Registrable for Vaccine {
    fn create_schema() -> Schema {
        vaccine_schema()
    }

    fn created_keys(parent: Option<&str>) -> Vec<QueryKey> {
        parent.map(keys::patient).into_iter().collect()
    }
}
