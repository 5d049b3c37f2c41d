use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{
    date_value, into_map, tags_value, text_value, AttachmentSlot, DiagnosisTag, EditableRecord,
    Registrable, Resource,
};
use crate::cache::{keys, QueryKey};
use crate::form::{FieldSpec, Schema};
use crate::gateway::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub patient_id: String,
    pub username: String,
    pub name: String,
    pub exam_date: Option<NaiveDate>,
    pub result: Option<String>,
    #[serde(default)]
    pub diagnosis: Vec<DiagnosisTag>,
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn exam_schema() -> Schema {
    Schema::new()
        .field(FieldSpec::text("name").required("Nome do exame é obrigatório"))
        .field(FieldSpec::date("examDate").required("Data do exame é obrigatória"))
        .field(FieldSpec::text("result"))
        .field(FieldSpec::tags("diagnosis"))
}

impl Resource for Exam {
    const NAME: &'static str = "exam";
    const COLLECTION: &'static str = paths::EXAMS;
    const ATTACHMENT: Option<AttachmentSlot> = Some(AttachmentSlot::RECORD_FILE);
    const TAGS_FIELD: Option<&'static str> = Some("diagnosis");

    fn item_path(id: &str) -> String {
        paths::exam(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::exam(id)
    }
}

impl EditableRecord for Exam {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> Schema {
        exam_schema()
    }

    fn form_values(&self) -> Map<String, Value> {
        into_map(json!({
            "name": self.name,
            "examDate": date_value(self.exam_date),
            "result": text_value(&self.result),
            "diagnosis": tags_value(&self.diagnosis),
        }))
    }

    fn dependent_keys(&self) -> Vec<QueryKey> {
        vec![keys::patient_exams(&self.patient_id), keys::exam(&self.id)]
    }

    fn diagnosis_tags(&self) -> Vec<DiagnosisTag> {
        self.diagnosis.clone()
    }

    fn preview_url(&self) -> Option<&str> {
        self.file_url.as_deref()
    }
}

impl Registrable for Exam {
    fn create_schema() -> Schema {
        exam_schema()
    }

    fn created_keys(parent: Option<&str>) -> Vec<QueryKey> {
        parent.map(keys::patient_exams).into_iter().collect()
    }
}
