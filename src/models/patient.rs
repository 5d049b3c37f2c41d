use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{
    into_map, number_value, tags_value, text_value, AttachmentSlot, DiagnosisTag, EditableRecord,
    Hospitalization, Registrable, Resource, Surgery, Vaccine,
};
use crate::cache::{keys, QueryKey};
use crate::form::{FieldSpec, Schema};
use crate::gateway::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub physical_shape: Option<String>,
    pub prognosis: Option<String>,
    #[serde(default)]
    pub diagnosis: Vec<DiagnosisTag>,
    pub profile_img: Option<String>,
    pub owner_name: Option<String>,
    #[serde(default)]
    pub ownerless: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Embedded by `GET /patient/{id}` only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surgeries: Vec<Surgery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hospitalizations: Vec<Hospitalization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vaccines: Vec<Vaccine>,
}

fn patient_schema() -> Schema {
    Schema::new()
        .field(
            FieldSpec::text("name")
                .required("Nome é obrigatório")
                .capitalize_words(),
        )
        .field(FieldSpec::text("species").required("Espécie é obrigatória"))
        .field(FieldSpec::text("breed"))
        .field(FieldSpec::text("gender"))
        .field(FieldSpec::number("weight").positive("Peso deve ser maior que zero"))
        .field(FieldSpec::text("physicalShape"))
        .field(FieldSpec::text("prognosis"))
        .field(FieldSpec::tags("diagnosis"))
        .field(FieldSpec::text("ownerName").capitalize_words())
        .field(FieldSpec::boolean("ownerless"))
        .refine(
            "ownerName",
            "Informe o tutor ou marque o paciente como sem tutor",
            |v| v.get("ownerless") == Some(&Value::Bool(true)) || v.contains_key("ownerName"),
        )
}

impl Resource for Patient {
    const NAME: &'static str = "patient";
    const COLLECTION: &'static str = paths::PATIENTS;
    const ATTACHMENT: Option<AttachmentSlot> = Some(AttachmentSlot::PROFILE_IMAGE);
    const TAGS_FIELD: Option<&'static str> = Some("diagnosis");

    fn item_path(id: &str) -> String {
        paths::patient(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::patient(id)
    }
}

impl EditableRecord for Patient {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> Schema {
        patient_schema()
    }

    fn form_values(&self) -> Map<String, Value> {
        into_map(json!({
            "name": self.name,
            "species": self.species,
            "breed": text_value(&self.breed),
            "gender": text_value(&self.gender),
            "weight": number_value(self.weight),
            "physicalShape": text_value(&self.physical_shape),
            "prognosis": text_value(&self.prognosis),
            "diagnosis": tags_value(&self.diagnosis),
            "ownerName": text_value(&self.owner_name),
            "ownerless": self.ownerless,
        }))
    }

    /// Detail view and every list or search that may show this patient.
    fn dependent_keys(&self) -> Vec<QueryKey> {
        vec![keys::patient(&self.id), keys::patients()]
    }

    fn diagnosis_tags(&self) -> Vec<DiagnosisTag> {
        self.diagnosis.clone()
    }

    fn preview_url(&self) -> Option<&str> {
        self.profile_img.as_deref()
    }
}

impl Registrable for Patient {
    const NEEDS_PARENT: bool = false;

    fn create_schema() -> Schema {
        patient_schema()
    }

    fn created_keys(_parent: Option<&str>) -> Vec<QueryKey> {
        vec![keys::patients()]
    }
}
