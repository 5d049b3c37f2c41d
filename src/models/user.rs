use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{into_map, text_value, AttachmentSlot, EditableRecord, Resource};
use crate::cache::{keys, QueryKey};
use crate::form::{FieldSpec, Schema};
use crate::gateway::paths;

static USERNAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9_.]+$").unwrap());

/// Clinic staff account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_img: Option<String>,
}

impl Resource for User {
    const NAME: &'static str = "user";
    const COLLECTION: &'static str = paths::USERS;
    const ATTACHMENT: Option<AttachmentSlot> = Some(AttachmentSlot::PROFILE_IMAGE);

    fn item_path(id: &str) -> String {
        paths::user(id)
    }

    fn detail_key(id: &str) -> QueryKey {
        keys::user(id)
    }
}

impl EditableRecord for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn schema() -> Schema {
        Schema::new()
            .field(
                FieldSpec::text("name")
                    .required("Nome é obrigatório")
                    .capitalize_words(),
            )
            .field(
                FieldSpec::text("username")
                    .required("Usuário é obrigatório")
                    .min_len(3, "Usuário deve ter ao menos 3 caracteres")
                    .pattern(
                        USERNAME.clone(),
                        "Use apenas letras minúsculas, números, ponto ou sublinhado",
                    ),
            )
            .field(FieldSpec::text("email").email("E-mail inválido"))
            .field(FieldSpec::text("phone"))
    }

    fn form_values(&self) -> Map<String, Value> {
        into_map(json!({
            "name": self.name,
            "username": self.username,
            "email": text_value(&self.email),
            "phone": text_value(&self.phone),
        }))
    }

    fn dependent_keys(&self) -> Vec<QueryKey> {
        vec![keys::user(&self.id), keys::current_user()]
    }

    fn preview_url(&self) -> Option<&str> {
        self.profile_img.as_deref()
    }
}
