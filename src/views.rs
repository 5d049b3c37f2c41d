//! List and detail views: cache subscribers that also host the edit and
//! delete triggers for their rows.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::cache::{keys, QueryCache, QueryKey, QueryObserver, QueryOptions, QueryState};
use crate::gateway::{paths, Api, GatewayError};
use crate::models::{
    EditableRecord, Exam, Hospitalization, Patient, PatientFile, Report, Resource, Surgery, User,
    Vaccine,
};
use crate::modal::{DeleteConfirmation, EditModal};

/// Subscriber of a list endpoint, rows decoded as `T`.
pub struct ListView<T> {
    api: Api,
    cache: QueryCache,
    observer: QueryObserver,
    _row: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ListView<T> {
    /// Mount on `key`, fetching `path` with `query`.
    pub fn mount(
        api: Api,
        cache: QueryCache,
        key: QueryKey,
        path: String,
        query: Vec<(String, String)>,
    ) -> Self {
        let fetch = api.query_fn(path, query);
        let observer = cache.observe(key, fetch, QueryOptions::default());
        Self {
            api,
            cache,
            observer,
            _row: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        self.observer.key()
    }

    pub fn state(&self) -> QueryState {
        self.observer.state()
    }

    /// Rows from the latest successful fetch; empty before the first one.
    pub fn rows(&self) -> Result<Vec<T>, serde_json::Error> {
        Ok(self.observer.data::<Vec<T>>()?.unwrap_or_default())
    }

    pub fn is_loading(&self) -> bool {
        self.observer.is_loading()
    }

    pub fn is_fetching(&self) -> bool {
        self.observer.state().is_fetching
    }

    pub fn error(&self) -> Option<GatewayError> {
        self.observer.state().error
    }

    /// Wait for the next change and return once any resulting fetch settles.
    pub async fn next_render(&mut self) -> QueryState {
        if !self.observer.changed().await {
            return self.observer.state();
        }
        self.observer.settled().await
    }

    /// Wait for the current fetch, if any.
    pub async fn settled(&mut self) -> QueryState {
        self.observer.settled().await
    }

    pub fn refetch(&self) {
        self.observer.refetch();
    }
}

impl<T: Resource> ListView<T> {
    /// Delete dialog for one row; a confirmed delete refreshes this list.
    pub fn remove(&self, id: &str) -> DeleteConfirmation<T> {
        let mut dialog = DeleteConfirmation::new(self.api.clone(), self.cache.clone());
        dialog.request(id, vec![self.key().clone()]);
        dialog
    }
}

impl<T: EditableRecord> ListView<T> {
    /// Edit modal opened on one row.
    pub fn edit(&self, id: &str) -> EditModal<T> {
        let mut modal = EditModal::new(self.api.clone(), self.cache.clone());
        modal.open(id);
        modal
    }
}

// ═══════════════════════════════════════════════════════════
// Patient detail
// ═══════════════════════════════════════════════════════════

/// Patient profile with its embedded surgeries, hospitalizations and vaccines.
pub struct PatientDetail {
    id: String,
    api: Api,
    cache: QueryCache,
    observer: QueryObserver,
}

impl PatientDetail {
    pub fn mount(api: Api, cache: QueryCache, id: &str) -> Self {
        let fetch = api.query_fn(paths::patient(id), Vec::new());
        let observer = cache.observe(keys::patient(id), fetch, QueryOptions::default());
        Self {
            id: id.to_string(),
            api,
            cache,
            observer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn patient(&self) -> Result<Option<Patient>, serde_json::Error> {
        self.observer.data()
    }

    pub fn surgeries(&self) -> Result<Vec<Surgery>, serde_json::Error> {
        Ok(self.patient()?.map(|p| p.surgeries).unwrap_or_default())
    }

    pub fn hospitalizations(&self) -> Result<Vec<Hospitalization>, serde_json::Error> {
        Ok(self.patient()?.map(|p| p.hospitalizations).unwrap_or_default())
    }

    pub fn vaccines(&self) -> Result<Vec<Vaccine>, serde_json::Error> {
        Ok(self.patient()?.map(|p| p.vaccines).unwrap_or_default())
    }

    pub fn is_loading(&self) -> bool {
        self.observer.is_loading()
    }

    pub fn error(&self) -> Option<GatewayError> {
        self.observer.state().error
    }

    pub async fn settled(&mut self) -> QueryState {
        self.observer.settled().await
    }

    pub async fn next_render(&mut self) -> QueryState {
        if !self.observer.changed().await {
            return self.observer.state();
        }
        self.observer.settled().await
    }

    /// Edit the patient itself or one of its embedded records.
    pub fn edit<R: EditableRecord>(&self, id: &str) -> EditModal<R> {
        let mut modal = EditModal::new(self.api.clone(), self.cache.clone());
        modal.open(id);
        modal
    }

    /// Delete one embedded record; refreshes this detail view.
    pub fn remove<R: Resource>(&self, id: &str) -> DeleteConfirmation<R> {
        let mut dialog = DeleteConfirmation::new(self.api.clone(), self.cache.clone());
        dialog.request(id, vec![keys::patient(&self.id)]);
        dialog
    }

    pub fn reports(&self) -> ListView<Report> {
        ListView::mount(
            self.api.clone(),
            self.cache.clone(),
            keys::patient_reports(&self.id),
            paths::patient_reports(&self.id),
            Vec::new(),
        )
    }

    pub fn exams(&self) -> ListView<Exam> {
        ListView::mount(
            self.api.clone(),
            self.cache.clone(),
            keys::patient_exams(&self.id),
            paths::patient_exams(&self.id),
            Vec::new(),
        )
    }

    pub fn files(&self) -> ListView<PatientFile> {
        ListView::mount(
            self.api.clone(),
            self.cache.clone(),
            keys::patient_files(&self.id),
            paths::patient_files(&self.id),
            Vec::new(),
        )
    }
}

// ═══════════════════════════════════════════════════════════
// Search
// ═══════════════════════════════════════════════════════════

/// Filters for `/patient/search/filters`. Blank filters are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub name: String,
    pub species: String,
    pub owner: String,
}

impl SearchFilters {
    pub fn query(&self) -> Vec<(String, String)> {
        [
            ("name", &self.name),
            ("species", &self.species),
            ("ownerName", &self.owner),
        ]
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.to_string(), v.trim().to_string()))
        .collect()
    }
}

pub struct PatientSearch {
    filters: SearchFilters,
    view: ListView<Patient>,
}

impl PatientSearch {
    pub fn mount(api: Api, cache: QueryCache, filters: SearchFilters) -> Self {
        let view = Self::view_for(api, cache, &filters);
        Self { filters, view }
    }

    fn view_for(api: Api, cache: QueryCache, filters: &SearchFilters) -> ListView<Patient> {
        let query = filters.query();
        ListView::mount(
            api,
            cache,
            keys::patient_search(&query),
            paths::PATIENT_SEARCH.to_string(),
            query,
        )
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    /// Switch filters. Each filter set is its own cache entry.
    pub fn set_filters(&mut self, filters: SearchFilters) {
        if filters.query() == self.filters.query() {
            return;
        }
        let view = Self::view_for(self.view.api.clone(), self.view.cache.clone(), &filters);
        self.view = view;
        self.filters = filters;
    }

    pub fn view(&self) -> &ListView<Patient> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ListView<Patient> {
        &mut self.view
    }

    pub fn results(&self) -> Result<Vec<Patient>, serde_json::Error> {
        self.view.rows()
    }
}

// ═══════════════════════════════════════════════════════════
// Current user
// ═══════════════════════════════════════════════════════════

pub struct CurrentUser {
    api: Api,
    cache: QueryCache,
    observer: QueryObserver,
}

impl CurrentUser {
    pub fn mount(api: Api, cache: QueryCache) -> Self {
        let fetch = api.query_fn(paths::USER_ME.to_string(), Vec::new());
        let observer = cache.observe(keys::current_user(), fetch, QueryOptions::default());
        Self { api, cache, observer }
    }

    pub fn user(&self) -> Result<Option<User>, serde_json::Error> {
        self.observer.data()
    }

    pub fn is_loading(&self) -> bool {
        self.observer.is_loading()
    }

    pub async fn settled(&mut self) -> QueryState {
        self.observer.settled().await
    }

    /// Profile edit modal for the signed-in user.
    pub fn edit(&self) -> Result<Option<EditModal<User>>, serde_json::Error> {
        Ok(self.user()?.map(|user| {
            let mut modal = EditModal::new(self.api.clone(), self.cache.clone());
            modal.open(&user.id);
            modal
        }))
    }
}
