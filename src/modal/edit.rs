//! Record edit modal: open → fetch → hydrate → validate → submit → invalidate → close.

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::{cancellable, CloseSignal, ModalError, Preview};
use crate::cache::{QueryCache, QueryKey, QueryObserver, QueryOptions, QueryStatus};
use crate::form::{FieldBinding, FormController, Key, TagInput};
use crate::gateway::{Api, Upload};
use crate::models::{DiagnosisTag, EditableRecord};

/// Lifecycle of one edit modal.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalState<R> {
    Closed,
    Fetching { id: String },
    Ready { id: String, record: R },
    Submitting { id: String },
    Success { id: String },
    /// Fetch failed; the overlay is gone and the modal can retry or close.
    Failed { id: String, message: String },
}

impl<R> ModalState<R> {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Closed => None,
            Self::Fetching { id }
            | Self::Ready { id, .. }
            | Self::Submitting { id }
            | Self::Success { id }
            | Self::Failed { id, .. } => Some(id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Fetching { .. } => "fetching",
            Self::Ready { .. } => "ready",
            Self::Submitting { .. } => "submitting",
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Result of a successful submit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub id: String,
    pub invalidated: Vec<QueryKey>,
    pub uploaded: bool,
}

pub struct EditModal<R: EditableRecord> {
    api: Api,
    cache: QueryCache,
    state: ModalState<R>,
    /// Bumped on every open; async work started under an older generation is stale.
    generation: u64,
    cancel: CancellationToken,
    /// Present exactly while the modal is open: this is the fetch gate.
    observer: Option<QueryObserver>,
    form: FormController,
    tags: TagInput,
    preview: Option<Preview>,
    pending_upload: Option<Upload>,
}

impl<R: EditableRecord> EditModal<R> {
    pub fn new(api: Api, cache: QueryCache) -> Self {
        Self {
            api,
            cache,
            state: ModalState::Closed,
            generation: 0,
            cancel: CancellationToken::new(),
            observer: None,
            form: FormController::new(R::schema()),
            tags: TagInput::new(),
            preview: None,
            pending_upload: None,
        }
    }

    // ── Accessors ────────────────────────────────────────

    pub fn state(&self) -> &ModalState<R> {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, ModalState::Closed)
    }

    /// Fetch gate. True from `open` until `close`.
    pub fn gate(&self) -> bool {
        self.observer.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Loading overlay visible.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            ModalState::Fetching { .. } | ModalState::Submitting { .. }
        )
    }

    /// Inputs disabled under the overlay.
    pub fn inputs_disabled(&self) -> bool {
        self.is_loading()
    }

    pub fn record(&self) -> Option<&R> {
        match &self.state {
            ModalState::Ready { record, .. } => Some(record),
            _ => None,
        }
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

    pub fn pending_upload(&self) -> Option<&Upload> {
        self.pending_upload.as_ref()
    }

    pub fn close_signal(&self) -> CloseSignal {
        CloseSignal(self.cancel.clone())
    }

    // ── Lifecycle ────────────────────────────────────────

    /// Open for record `id` and start fetching it. Reopening closes first.
    pub fn open(&mut self, id: &str) {
        if self.is_open() {
            self.close();
        }
        self.generation += 1;
        self.cancel = CancellationToken::new();

        let options = QueryOptions {
            enabled: true,
            refetch_on_mount: true,
        };
        let fetch = self.api.query_fn(R::item_path(id), Vec::new());
        self.observer = Some(self.cache.observe(R::detail_key(id), fetch, options));
        self.transition(ModalState::Fetching { id: id.to_string() });
    }

    /// Wait for the fetch and hydrate the form. Once `Ready`, further calls
    /// return immediately without touching the network.
    pub async fn hydrate(&mut self) -> Result<(), ModalError> {
        let id = match &self.state {
            ModalState::Ready { .. } => return Ok(()),
            ModalState::Fetching { id } => id.clone(),
            _ => return Err(ModalError::NotReady),
        };
        let generation = self.generation;
        let cancel = self.cancel.clone();
        let Some(observer) = self.observer.as_mut() else {
            return Err(ModalError::NotReady);
        };

        let settled = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            state = observer.settled() => Some(state),
        };
        let Some(settled) = settled.filter(|_| generation == self.generation) else {
            self.close();
            return Err(ModalError::Cancelled);
        };

        if settled.status == QueryStatus::Error {
            let message = settled
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".into());
            tracing::warn!(record = R::NAME, id = %id, error = %message, "Record fetch failed");
            self.transition(ModalState::Failed {
                id,
                message: message.clone(),
            });
            return Err(ModalError::Fetch(message));
        }

        let record = match settled.decode::<R>() {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.transition(ModalState::Failed {
                    id,
                    message: "empty response".into(),
                });
                return Err(ModalError::Fetch("empty response".into()));
            }
            Err(e) => {
                tracing::warn!(record = R::NAME, id = %id, error = %e, "Record decode failed");
                self.transition(ModalState::Failed {
                    id,
                    message: e.to_string(),
                });
                return Err(ModalError::Decode(e));
            }
        };

        self.form.reset(record.form_values());
        self.tags.set_tags(record.diagnosis_tags());
        self.preview = record.preview_url().map(|url| Preview::Remote(url.to_string()));
        self.pending_upload = None;
        self.transition(ModalState::Ready { id, record });
        Ok(())
    }

    /// Refetch after a failed load.
    pub fn retry(&mut self) -> Result<(), ModalError> {
        let ModalState::Failed { id, .. } = &self.state else {
            return Err(ModalError::NotReady);
        };
        let id = id.clone();
        if let Some(observer) = &self.observer {
            observer.refetch();
        }
        self.transition(ModalState::Fetching { id });
        Ok(())
    }

    /// Close from any state. Cancels in-flight work, drops the fetch gate and
    /// clears every piece of local state.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.observer = None;
        self.form.clear();
        self.tags.clear();
        self.preview = None;
        self.pending_upload = None;
        if self.is_open() {
            self.transition(ModalState::Closed);
        }
    }

    // ── Editing ──────────────────────────────────────────

    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) {
        self.form.set_value(name, value);
    }

    /// Forward a key to the diagnosis input, syncing the form field on change.
    pub fn tag_key(&mut self, key: Key) -> bool {
        let changed = self.tags.on_key(key);
        if changed {
            self.sync_tags();
        }
        changed
    }

    pub fn set_tag_input(&mut self, text: &str) {
        self.tags.set_input(text);
    }

    pub fn remove_tag(&mut self, index: usize) -> Option<DiagnosisTag> {
        let removed = self.tags.remove(index);
        if removed.is_some() {
            self.sync_tags();
        }
        removed
    }

    fn sync_tags(&mut self) {
        if let Some(field) = R::TAGS_FIELD {
            self.form.set_value(field, self.tags.to_value());
        }
    }

    /// Pick a file for the record's attachment slot. Uploaded on submit.
    pub fn select_upload(&mut self, filename: &str, bytes: Vec<u8>) -> Result<(), ModalError> {
        let slot = R::ATTACHMENT.ok_or(ModalError::NoAttachment)?;
        if !matches!(self.state, ModalState::Ready { .. }) {
            return Err(ModalError::NotReady);
        }
        self.preview = Some(Preview::Pending(filename.to_string()));
        self.pending_upload = Some(Upload::new(slot.kind, filename, bytes));
        Ok(())
    }

    // ── Submit ───────────────────────────────────────────

    /// Validate and PATCH. Invalid input keeps the modal `Ready` without any
    /// network call; a failed upload or PATCH returns it to `Ready`.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, ModalError> {
        let ModalState::Ready { id, .. } = &self.state else {
            return Err(ModalError::NotReady);
        };
        let id = id.clone();
        self.sync_tags();
        let payload = self.form.validate_changes()?;

        let ModalState::Ready { record, .. } = self.transition(ModalState::Submitting { id: id.clone() })
        else {
            return Err(ModalError::NotReady);
        };

        let generation = self.generation;
        let result = self.send_update(&id, payload).await;
        if generation != self.generation {
            return Err(ModalError::Cancelled);
        }

        let uploaded = match result {
            Ok(uploaded) => uploaded,
            Err(ModalError::Cancelled) => {
                tracing::info!(record = R::NAME, id = %id, "Submit cancelled");
                self.close();
                return Err(ModalError::Cancelled);
            }
            Err(e) => {
                tracing::warn!(record = R::NAME, id = %id, error = %e, "Record update failed");
                self.transition(ModalState::Ready { id, record });
                return Err(e);
            }
        };

        // Release the gate first so the modal's own entry is not refetched
        // on its behalf.
        self.observer = None;
        let invalidated = record.dependent_keys();
        for key in &invalidated {
            self.cache.invalidate(key);
        }
        self.transition(ModalState::Success { id: id.clone() });
        self.close();

        Ok(SubmitOutcome {
            id,
            invalidated,
            uploaded,
        })
    }

    /// Upload (if pending) then PATCH. Returns whether an upload happened.
    async fn send_update(&self, id: &str, mut payload: Map<String, Value>) -> Result<bool, ModalError> {
        let mut uploaded = false;
        if let Some(upload) = self.pending_upload.clone() {
            let slot = R::ATTACHMENT.ok_or(ModalError::NoAttachment)?;
            let file = cancellable(&self.cancel, self.api.upload(upload)).await?;
            slot.merge(&mut payload, &file);
            uploaded = true;
        }

        let path = R::item_path(id);
        let patched = cancellable(&self.cancel, self.api.patch::<_, Value>(&path, &payload)).await;
        if let Err(e) = &patched {
            if uploaded {
                tracing::warn!(record = R::NAME, id, error = %e, "Update failed after upload; uploaded file orphaned");
            }
        }
        patched.map(|_| uploaded)
    }

    /// Swap in `next`, returning the state left behind.
    fn transition(&mut self, next: ModalState<R>) -> ModalState<R> {
        tracing::debug!(
            record = R::NAME,
            id = next.id().unwrap_or_default(),
            from = self.state.name(),
            to = next.name(),
            "Modal transition"
        );
        std::mem::replace(&mut self.state, next)
    }
}

impl<R: EditableRecord> Drop for EditModal<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::cache::keys;
    use crate::gateway::{paths, Body, GatewayError, Method, MockGateway};
    use crate::models::{Exam, Patient, Report};

    fn patient_json(name: &str) -> Value {
        json!({
            "id": "p1",
            "name": name,
            "species": "Canina",
            "ownerName": "Ana Souza",
            "diagnosis": [{"label": "Otite", "value": "Otite"}],
            "profileImg": "https://cdn/rex.png"
        })
    }

    fn report_json(title: &str) -> Value {
        json!({
            "id": "r1",
            "patientId": "p1",
            "username": "drvet",
            "title": title,
            "reportDate": "2024-04-02",
            "createdAt": "2024-04-02T10:00:00Z",
            "updatedAt": "2024-04-02T10:00:00Z"
        })
    }

    fn setup() -> (MockGateway, Api, QueryCache) {
        let mock = MockGateway::new();
        let api = Api::new(mock.clone().shared());
        (mock, api, QueryCache::new())
    }

    async fn opened_patient(mock: &MockGateway, api: &Api, cache: &QueryCache) -> EditModal<Patient> {
        mock.respond(Method::Get, "/patient/p1", patient_json("Rex"));
        let mut modal = EditModal::<Patient>::new(api.clone(), cache.clone());
        modal.open("p1");
        modal.hydrate().await.unwrap();
        modal
    }

    #[tokio::test]
    async fn closed_modal_never_fetches() {
        let (mock, api, cache) = setup();
        let modal = EditModal::<Patient>::new(api, cache);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!modal.gate());
        assert!(!modal.is_loading());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn one_fetch_per_open_none_per_render() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;

        assert!(matches!(modal.state(), ModalState::Ready { .. }));
        assert_eq!(modal.field("name").value, json!("Rex"));
        assert_eq!(modal.tags().tags(), [DiagnosisTag::new("Otite")]);
        assert_eq!(modal.preview(), Some(&Preview::Remote("https://cdn/rex.png".into())));

        // Re-rendering reads state; hydrating again is a no-op.
        for _ in 0..3 {
            let _ = modal.field("name");
            let _ = modal.is_loading();
            modal.hydrate().await.unwrap();
        }
        assert_eq!(mock.count(Method::Get, "/patient/p1"), 1);

        modal.close();
        modal.open("p1");
        modal.hydrate().await.unwrap();
        assert_eq!(mock.count(Method::Get, "/patient/p1"), 2);
        assert_eq!(modal.generation(), 2);
    }

    #[tokio::test]
    async fn close_resets_gate_and_local_state() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        modal.set_value("name", "Thor");
        modal.tag_key(Key::Char('x'));
        modal.select_upload("rex.png", vec![1, 2]).unwrap();

        modal.close();
        assert_eq!(modal.state(), &ModalState::Closed);
        assert!(!modal.gate());
        assert_eq!(modal.form().text("name"), Some(""));
        assert!(modal.tags().tags().is_empty() && modal.tags().input().is_empty());
        assert_eq!(modal.preview(), None);
        assert!(modal.pending_upload().is_none());
        assert!(!cache.contains(&keys::patient("p1")));
    }

    #[tokio::test]
    async fn loading_while_fetching() {
        let (mock, api, cache) = setup();
        mock.respond(Method::Get, "/patient/p1", patient_json("Rex"));
        let latch = mock.hold(Method::Get, "/patient/p1");
        let mut modal = EditModal::<Patient>::new(api, cache);

        modal.open("p1");
        assert!(modal.is_loading() && modal.inputs_disabled());
        latch.release();
        modal.hydrate().await.unwrap();
        assert!(!modal.is_loading());
    }

    #[tokio::test]
    async fn close_mid_fetch_discards_late_result() {
        let (mock, api, cache) = setup();
        mock.respond(Method::Get, "/patient/p1", patient_json("Rex"));
        let latch = mock.hold(Method::Get, "/patient/p1");
        let mut modal = EditModal::<Patient>::new(api, cache.clone());

        modal.open("p1");
        modal.close();
        latch.release();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(modal.state(), &ModalState::Closed);
        assert_eq!(modal.form().text("name"), Some(""));
        assert!(cache.peek(&keys::patient("p1")).is_none());
        assert!(matches!(modal.hydrate().await, Err(ModalError::NotReady)));
    }

    #[tokio::test]
    async fn close_signal_cancels_hydrate() {
        let (mock, api, cache) = setup();
        mock.respond(Method::Get, "/patient/p1", patient_json("Rex"));
        let _latch = mock.hold(Method::Get, "/patient/p1");
        let mut modal = EditModal::<Patient>::new(api, cache);
        modal.open("p1");

        let signal = modal.close_signal();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signal.close();
        });
        assert!(matches!(modal.hydrate().await, Err(ModalError::Cancelled)));
        assert_eq!(modal.state(), &ModalState::Closed);
    }

    #[tokio::test]
    async fn fetch_failure_clears_overlay() {
        let (mock, api, cache) = setup();
        mock.enqueue(Method::Get, "/patient/p1", Err(GatewayError::Network("offline".into())));
        mock.respond(Method::Get, "/patient/p1", patient_json("Rex"));
        let mut modal = EditModal::<Patient>::new(api, cache);

        modal.open("p1");
        assert!(matches!(modal.hydrate().await, Err(ModalError::Fetch(_))));
        assert!(matches!(modal.state(), ModalState::Failed { .. }));
        assert!(!modal.is_loading());

        modal.retry().unwrap();
        modal.hydrate().await.unwrap();
        assert_eq!(modal.record().map(|p| p.name.as_str()), Some("Rex"));
    }

    #[tokio::test]
    async fn submit_patches_transformed_values_and_closes() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        mock.respond(Method::Patch, "/patient/p1", json!({}));

        modal.set_value("name", "joão da silva");
        let outcome = modal.submit().await.unwrap();

        assert_eq!(outcome.id, "p1");
        assert!(!outcome.uploaded);
        assert_eq!(outcome.invalidated, vec![keys::patient("p1"), keys::patients()]);
        assert_eq!(modal.state(), &ModalState::Closed);
        assert!(!modal.gate());

        let patch = mock
            .calls()
            .into_iter()
            .find(|c| c.method == Method::Patch)
            .unwrap();
        let Body::Json(body) = patch.body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["name"], "João Da Silva");
        assert_eq!(body["diagnosis"], json!([{"label": "Otite", "value": "Otite"}]));
        assert!(body.get("breed").is_none());
    }

    #[tokio::test]
    async fn cleared_fields_are_sent_empty() {
        let (mock, api, cache) = setup();
        let mut record = patient_json("Rex");
        record["breed"] = json!("Labrador");
        record["weight"] = json!(31.5);
        mock.respond(Method::Get, "/patient/p1", record);
        mock.respond(Method::Patch, "/patient/p1", json!({}));
        let mut modal = EditModal::<Patient>::new(api, cache);
        modal.open("p1");
        modal.hydrate().await.unwrap();

        assert!(modal.remove_tag(0).is_some());
        modal.set_value("breed", "");
        modal.set_value("weight", "");
        modal.submit().await.unwrap();

        let patch = mock
            .calls()
            .into_iter()
            .find(|c| c.method == Method::Patch)
            .unwrap();
        let Body::Json(body) = patch.body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["diagnosis"], json!([]));
        assert_eq!(body["breed"], "");
        assert_eq!(body["weight"], Value::Null);
        assert!(body.get("weight").is_some());
        // Fields that were empty before editing stay out.
        assert!(body.get("gender").is_none());
    }

    #[tokio::test]
    async fn required_field_blocks_network() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        let before = mock.calls().len();

        modal.set_value("name", "   ");
        let err = modal.submit().await.unwrap_err();

        assert_eq!(err.validation_message(), Some("Nome é obrigatório"));
        assert_eq!(modal.form().error("name"), Some("Nome é obrigatório"));
        assert!(matches!(modal.state(), ModalState::Ready { .. }));
        assert_eq!(mock.calls().len(), before);
        assert_eq!(mock.count_method(Method::Patch), 0);
    }

    #[tokio::test]
    async fn upload_precedes_patch_and_is_merged() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        mock.respond(Method::Post, paths::UPLOAD_IMAGE, json!({"imageUrl": "https://cdn/new.png"}));
        mock.respond(Method::Patch, "/patient/p1", json!({}));

        modal.select_upload("new.png", vec![0; 8]).unwrap();
        assert_eq!(modal.preview(), Some(&Preview::Pending("new.png".into())));
        let outcome = modal.submit().await.unwrap();
        assert!(outcome.uploaded);

        let calls = mock.calls();
        let upload_at = calls.iter().position(|c| c.path == paths::UPLOAD_IMAGE).unwrap();
        let patch_at = calls.iter().position(|c| c.method == Method::Patch).unwrap();
        assert!(upload_at < patch_at);
        let Body::Json(body) = &calls[patch_at].body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["profileImg"], "https://cdn/new.png");
    }

    #[tokio::test]
    async fn upload_failure_aborts_before_patch() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        mock.fail(
            Method::Post,
            paths::UPLOAD_IMAGE,
            GatewayError::Http {
                status: 413,
                body: "too large".into(),
            },
        );

        modal.select_upload("huge.png", vec![0; 64]).unwrap();
        let err = modal.submit().await.unwrap_err();

        assert!(matches!(err, ModalError::Gateway(GatewayError::Http { status: 413, .. })));
        assert_eq!(mock.count_method(Method::Patch), 0);
        assert!(matches!(modal.state(), ModalState::Ready { .. }));
        assert!(modal.pending_upload().is_some());
    }

    #[tokio::test]
    async fn patch_failure_returns_to_ready() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        mock.fail(Method::Patch, "/patient/p1", GatewayError::Network("reset".into()));

        assert!(modal.submit().await.is_err());
        assert!(matches!(modal.state(), ModalState::Ready { .. }));
        assert!(!modal.is_loading());
        assert!(modal.gate());
    }

    #[tokio::test]
    async fn close_signal_cancels_submit() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        mock.respond(Method::Patch, "/patient/p1", json!({}));
        let _latch = mock.hold(Method::Patch, "/patient/p1");

        let signal = modal.close_signal();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signal.close();
        });
        assert!(matches!(modal.submit().await, Err(ModalError::Cancelled)));
        assert_eq!(modal.state(), &ModalState::Closed);
    }

    #[tokio::test]
    async fn tags_sync_into_exam_payload() {
        let (mock, api, cache) = setup();
        mock.respond(
            Method::Get,
            "/exams/e1",
            json!({
                "id": "e1", "patientId": "p1", "username": "drvet",
                "name": "Hemograma", "examDate": "2024-05-01",
                "createdAt": "2024-05-01T08:00:00Z", "updatedAt": "2024-05-01T08:00:00Z"
            }),
        );
        mock.respond(Method::Patch, "/exams/e1", json!({}));
        let mut modal = EditModal::<Exam>::new(api, cache);
        modal.open("e1");
        modal.hydrate().await.unwrap();

        modal.set_tag_input("Anemia");
        assert!(modal.tag_key(Key::Enter));
        assert_eq!(modal.form().value("diagnosis"), Some(&json!([{"label": "Anemia", "value": "Anemia"}])));

        let outcome = modal.submit().await.unwrap();
        assert_eq!(outcome.invalidated[0], keys::patient_exams("p1"));
    }

    #[tokio::test]
    async fn subscribed_list_reflects_update() {
        let (mock, api, cache) = setup();
        mock.respond(Method::Get, "/reports/p1/reports", json!([report_json("Retorno")]));
        mock.respond(Method::Get, "/reports/r1", report_json("Retorno"));
        mock.respond(Method::Patch, "/reports/r1", json!({}));

        let mut list = cache.observe(
            keys::patient_reports("p1"),
            api.query_fn("/reports/p1/reports".into(), Vec::new()),
            QueryOptions::default(),
        );
        let before = list.settled().await;
        assert_eq!(before.decode::<Vec<Report>>().unwrap().unwrap()[0].title, "Retorno");

        let mut modal = EditModal::<Report>::new(api, cache.clone());
        modal.open("r1");
        modal.hydrate().await.unwrap();
        modal.set_value("title", "Retorno pós-cirúrgico");
        mock.respond(Method::Get, "/reports/p1/reports", json!([report_json("Retorno pós-cirúrgico")]));
        modal.submit().await.unwrap();

        let after = list.settled().await;
        let rows = after.decode::<Vec<Report>>().unwrap().unwrap();
        assert_eq!(rows[0].title, "Retorno pós-cirúrgico");
        assert_eq!(mock.count(Method::Get, "/reports/p1/reports"), 2);
        assert_eq!(cache.stats(&keys::patient_reports("p1")).invalidations, 1);
    }

    #[tokio::test]
    async fn submit_requires_ready() {
        let (_mock, api, cache) = setup();
        let mut modal = EditModal::<Patient>::new(api, cache);
        assert!(matches!(modal.submit().await, Err(ModalError::NotReady)));
        assert!(matches!(
            modal.select_upload("a.png", vec![]),
            Err(ModalError::NotReady)
        ));
    }

    #[tokio::test]
    async fn reopening_closes_previous_record() {
        let (mock, api, cache) = setup();
        let mut modal = opened_patient(&mock, &api, &cache).await;
        mock.respond(Method::Get, "/patient/p2", json!({
            "id": "p2", "name": "Mia", "species": "Felina", "ownerless": true
        }));

        modal.open("p2");
        assert!(!cache.contains(&keys::patient("p1")));
        modal.hydrate().await.unwrap();
        assert_eq!(modal.state().id(), Some("p2"));
        assert_eq!(modal.preview(), None);
    }
}
