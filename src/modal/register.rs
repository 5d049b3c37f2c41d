//! Create flow: fill a form, optionally upload a file, POST, refresh lists.

use std::marker::PhantomData;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{cancellable, CloseSignal, ModalError, Preview};
use crate::cache::{QueryCache, QueryKey};
use crate::form::{FieldBinding, FormController, Key, TagInput};
use crate::gateway::{Api, Upload};
use crate::models::Registrable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterState {
    Closed,
    Editing,
    Submitting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterOutcome<R> {
    /// The created record, when the API echoes it back.
    pub created: Option<R>,
    pub invalidated: Vec<QueryKey>,
    pub uploaded: bool,
}

pub struct RegisterModal<R: Registrable> {
    api: Api,
    cache: QueryCache,
    state: RegisterState,
    parent: Option<String>,
    author: Option<String>,
    cancel: CancellationToken,
    form: FormController,
    tags: TagInput,
    preview: Option<Preview>,
    pending_upload: Option<Upload>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Registrable> RegisterModal<R> {
    pub fn new(api: Api, cache: QueryCache) -> Self {
        Self {
            api,
            cache,
            state: RegisterState::Closed,
            parent: None,
            author: None,
            cancel: CancellationToken::new(),
            form: FormController::new(R::create_schema()),
            tags: TagInput::new(),
            preview: None,
            pending_upload: None,
            _record: PhantomData,
        }
    }

    /// Username recorded as the author of created records.
    pub fn with_author(mut self, username: &str) -> Self {
        self.author = Some(username.to_string());
        self
    }

    pub fn state(&self) -> RegisterState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == RegisterState::Submitting
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn form(&self) -> &FormController {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormController {
        &mut self.form
    }

    pub fn field(&self, name: &str) -> FieldBinding {
        self.form.register(name)
    }

    pub fn tags(&self) -> &TagInput {
        &self.tags
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn close_signal(&self) -> CloseSignal {
        CloseSignal(self.cancel.clone())
    }

    /// Open an empty form. Child records pass their patient id.
    pub fn open(&mut self, parent: Option<&str>) {
        self.close();
        self.cancel = CancellationToken::new();
        self.parent = parent.map(String::from);
        self.state = RegisterState::Editing;
        tracing::debug!(record = R::NAME, parent = ?self.parent, "Register modal opened");
    }

    pub fn close(&mut self) {
        self.cancel.cancel();
        self.form.clear();
        self.tags.clear();
        self.preview = None;
        self.pending_upload = None;
        self.parent = None;
        self.state = RegisterState::Closed;
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) {
        self.form.set_value(name, value);
    }

    pub fn tag_key(&mut self, key: Key) -> bool {
        let changed = self.tags.on_key(key);
        if changed {
            if let Some(field) = R::TAGS_FIELD {
                self.form.set_value(field, self.tags.to_value());
            }
        }
        changed
    }

    pub fn set_tag_input(&mut self, text: &str) {
        self.tags.set_input(text);
    }

    pub fn select_upload(&mut self, filename: &str, bytes: Vec<u8>) -> Result<(), ModalError> {
        let slot = R::ATTACHMENT.ok_or(ModalError::NoAttachment)?;
        if self.state != RegisterState::Editing {
            return Err(ModalError::NotReady);
        }
        self.preview = Some(Preview::Pending(filename.to_string()));
        self.pending_upload = Some(Upload::new(slot.kind, filename, bytes));
        Ok(())
    }

    /// Validate, upload if a file is pending, then POST to the collection.
    pub async fn submit(&mut self) -> Result<RegisterOutcome<R>, ModalError> {
        if self.state != RegisterState::Editing {
            return Err(ModalError::NotReady);
        }
        if R::NEEDS_PARENT && self.parent.is_none() {
            return Err(ModalError::MissingParent);
        }
        if R::UPLOAD_REQUIRED && self.pending_upload.is_none() {
            return Err(ModalError::UploadRequired);
        }

        let api = self.api.clone();
        let cancel = self.cancel.clone();
        let upload = self.pending_upload.clone();
        let parent = self.parent.clone();
        let author = self.author.clone();

        self.state = RegisterState::Submitting;
        let submitted = self
            .form
            .handle_submit(|mut payload| async move {
                if let Some(parent) = parent {
                    payload.insert("patientId".into(), Value::String(parent));
                }
                if let Some(author) = author {
                    payload.insert("username".into(), Value::String(author));
                }

                let mut uploaded = false;
                if let Some(upload) = upload {
                    let slot = R::ATTACHMENT.ok_or(ModalError::NoAttachment)?;
                    let file = cancellable(&cancel, api.upload(upload)).await?;
                    slot.merge(&mut payload, &file);
                    uploaded = true;
                }

                let created = cancellable(&cancel, api.post::<_, Value>(R::COLLECTION, &payload)).await;
                if let Err(e) = &created {
                    if uploaded {
                        tracing::warn!(record = R::NAME, error = %e, "Creation failed after upload; uploaded file orphaned");
                    }
                }
                Ok::<_, ModalError>((created?, uploaded))
            })
            .await;

        let (created, uploaded) = match submitted {
            Ok(Ok(done)) => done,
            Ok(Err(ModalError::Cancelled)) => {
                self.close();
                return Err(ModalError::Cancelled);
            }
            Ok(Err(e)) => {
                tracing::warn!(record = R::NAME, error = %e, "Record creation failed");
                self.state = RegisterState::Editing;
                return Err(e);
            }
            Err(validation) => {
                self.state = RegisterState::Editing;
                return Err(validation.into());
            }
        };

        let invalidated = R::created_keys(self.parent.as_deref());
        for key in &invalidated {
            self.cache.invalidate(key);
        }
        tracing::info!(record = R::NAME, uploaded, "Record created");
        self.close();

        Ok(RegisterOutcome {
            created: serde_json::from_value(created).ok(),
            invalidated,
            uploaded,
        })
    }
}

impl<R: Registrable> Drop for RegisterModal<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::keys;
    use crate::gateway::{paths, Body, GatewayError, Method, MockGateway};
    use crate::models::{Exam, Patient, PatientFile, Report};

    fn setup() -> (MockGateway, Api, QueryCache) {
        let mock = MockGateway::new();
        let api = Api::new(mock.clone().shared());
        (mock, api, QueryCache::new())
    }

    fn posted_body(mock: &MockGateway, path: &str) -> Value {
        let call = mock
            .calls()
            .into_iter()
            .find(|c| c.method == Method::Post && c.path == path)
            .unwrap();
        match call.body {
            Body::Json(body) => body,
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn creates_child_record_under_parent() {
        let (mock, api, cache) = setup();
        mock.respond(
            Method::Post,
            paths::REPORTS,
            json!({
                "id": "r9", "patientId": "p1", "username": "drvet", "title": "Alta",
                "createdAt": "2024-04-02T10:00:00Z", "updatedAt": "2024-04-02T10:00:00Z"
            }),
        );
        let mut modal = RegisterModal::<Report>::new(api, cache).with_author("drvet");
        modal.open(Some("p1"));
        modal.set_value("title", "Alta");
        modal.set_value("reportDate", "2024-04-02");

        let outcome = modal.submit().await.unwrap();
        assert_eq!(outcome.created.map(|r| r.id), Some("r9".to_string()));
        assert_eq!(outcome.invalidated, vec![keys::patient_reports("p1")]);
        assert_eq!(modal.state(), RegisterState::Closed);

        let body = posted_body(&mock, paths::REPORTS);
        assert_eq!(body["patientId"], "p1");
        assert_eq!(body["username"], "drvet");
    }

    #[tokio::test]
    async fn child_without_parent_is_refused() {
        let (mock, api, cache) = setup();
        let mut modal = RegisterModal::<Exam>::new(api, cache);
        modal.open(None);
        assert!(matches!(modal.submit().await, Err(ModalError::MissingParent)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_form_sends_nothing() {
        let (mock, api, cache) = setup();
        let mut modal = RegisterModal::<Patient>::new(api, cache);
        modal.open(None);
        let err = modal.submit().await.unwrap_err();
        assert_eq!(err.validation_message(), Some("Nome é obrigatório"));
        assert_eq!(modal.state(), RegisterState::Editing);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn patient_photo_uploaded_first() {
        let (mock, api, cache) = setup();
        mock.respond(Method::Post, paths::UPLOAD_IMAGE, json!({"url": "https://cdn/mia.png"}));
        mock.respond(Method::Post, paths::PATIENTS, json!({"id": "p7"}));
        let mut modal = RegisterModal::<Patient>::new(api, cache);
        modal.open(None);
        modal.set_value("name", "mia");
        modal.set_value("species", "Felina");
        modal.set_value("ownerless", true);
        modal.set_tag_input("FIV");
        modal.tag_key(Key::Tab);
        modal.select_upload("mia.png", vec![9; 3]).unwrap();

        let outcome = modal.submit().await.unwrap();
        assert!(outcome.uploaded);
        // Partial echo does not decode as a full patient.
        assert!(outcome.created.is_none());

        let body = posted_body(&mock, paths::PATIENTS);
        assert_eq!(body["name"], "Mia");
        assert_eq!(body["profileImg"], "https://cdn/mia.png");
        assert_eq!(body["diagnosis"], json!([{"label": "FIV", "value": "FIV"}]));
        assert!(body.get("patientId").is_none());
    }

    #[tokio::test]
    async fn file_requires_upload_and_aborts_on_failure() {
        let (mock, api, cache) = setup();
        let mut modal = RegisterModal::<PatientFile>::new(api, cache);
        modal.open(Some("p1"));
        assert!(matches!(modal.submit().await, Err(ModalError::UploadRequired)));

        mock.fail(Method::Post, paths::UPLOAD_FILE, GatewayError::Network("offline".into()));
        modal.select_upload("raiox.pdf", vec![1; 10]).unwrap();
        assert!(modal.submit().await.is_err());
        assert_eq!(mock.count(Method::Post, paths::FILES), 0);
        assert_eq!(modal.state(), RegisterState::Editing);
    }

    #[tokio::test]
    async fn post_failure_after_upload_keeps_form() {
        let (mock, api, cache) = setup();
        mock.respond(Method::Post, paths::UPLOAD_FILE, json!({"fileUrl": "https://cdn/raiox.pdf"}));
        mock.fail(
            Method::Post,
            paths::FILES,
            GatewayError::Http {
                status: 500,
                body: "erro".into(),
            },
        );
        let mut modal = RegisterModal::<PatientFile>::new(api, cache.clone());
        modal.open(Some("p1"));
        modal.select_upload("raiox.pdf", vec![1; 10]).unwrap();

        let err = modal.submit().await.unwrap_err();
        assert!(matches!(err, ModalError::Gateway(_)));
        assert_eq!(mock.count(Method::Post, paths::UPLOAD_FILE), 1);
        assert_eq!(mock.count(Method::Post, paths::FILES), 1);
        assert_eq!(modal.state(), RegisterState::Editing);
        assert_eq!(modal.parent(), Some("p1"));
        assert_eq!(cache.stats(&keys::patient_files("p1")).invalidations, 0);
    }

    #[tokio::test]
    async fn file_metadata_comes_from_upload() {
        let (mock, api, cache) = setup();
        mock.respond(Method::Post, paths::UPLOAD_FILE, json!({"fileUrl": "https://cdn/raiox.pdf"}));
        mock.respond(
            Method::Post,
            paths::FILES,
            json!({"id": "f1", "patientId": "p1", "filename": "raiox.pdf", "url": "https://cdn/raiox.pdf", "size": 10}),
        );
        let mut modal = RegisterModal::<PatientFile>::new(api, cache);
        modal.open(Some("p1"));
        modal.select_upload("raiox.pdf", vec![1; 10]).unwrap();

        let outcome = modal.submit().await.unwrap();
        assert_eq!(outcome.created.map(|f| f.size), Some(10));
        assert_eq!(outcome.invalidated, vec![keys::patient_files("p1")]);

        let body = posted_body(&mock, paths::FILES);
        assert_eq!(body["url"], "https://cdn/raiox.pdf");
        assert_eq!(body["filename"], "raiox.pdf");
        assert_eq!(body["size"], 10);
    }
}
