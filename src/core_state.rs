//! Application context shared by every view and modal.
//!
//! `CoreState` owns the configuration, the typed API handle and the query
//! cache. It is built once at startup (or per test with a mock gateway) and
//! handed to the rendering layer; there are no process-wide singletons.

use std::sync::Arc;

use crate::cache::QueryCache;
use crate::config::{ClientConfig, ConfigError};
use crate::gateway::{Api, Gateway, GatewayError, HttpGateway};
use crate::models::{EditableRecord, Registrable, Resource};
use crate::modal::{DeleteConfirmation, EditModal, RegisterModal};
use crate::session::{Session, SessionError};
use crate::views::{CurrentUser, PatientDetail, PatientSearch, SearchFilters};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct CoreState {
    config: ClientConfig,
    api: Api,
    cache: QueryCache,
}

impl CoreState {
    /// Read the session cookie and build an HTTP-backed context.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let session = Session::from_cookie_file(&config.cookie_file, &config.token_cookie)?;
        let gateway = HttpGateway::new(&config, &session)?;
        tracing::info!(
            base_url = gateway.base_url(),
            authenticated = gateway.is_authenticated(),
            "API client ready"
        );
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    /// Configuration from `VET_RECORDS_*` environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Context over any gateway (mock gateways in tests).
    pub fn with_gateway(config: ClientConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            config,
            api: Api::new(gateway),
            cache: QueryCache::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // ── Modals ───────────────────────────────────────────

    pub fn edit_modal<R: EditableRecord>(&self) -> EditModal<R> {
        EditModal::new(self.api.clone(), self.cache.clone())
    }

    pub fn register_modal<R: Registrable>(&self) -> RegisterModal<R> {
        RegisterModal::new(self.api.clone(), self.cache.clone())
    }

    pub fn delete_confirmation<R: Resource>(&self) -> DeleteConfirmation<R> {
        DeleteConfirmation::new(self.api.clone(), self.cache.clone())
    }

    // ── Views ────────────────────────────────────────────

    pub fn patient_detail(&self, id: &str) -> PatientDetail {
        PatientDetail::mount(self.api.clone(), self.cache.clone(), id)
    }

    pub fn patient_search(&self, filters: SearchFilters) -> PatientSearch {
        PatientSearch::mount(self.api.clone(), self.cache.clone(), filters)
    }

    pub fn current_user(&self) -> CurrentUser {
        CurrentUser::mount(self.api.clone(), self.cache.clone())
    }
}
