//! Two-step delete: ask, then DELETE on "Sim".

use std::marker::PhantomData;

use crate::cache::{QueryCache, QueryKey};
use crate::gateway::Api;
use crate::models::Resource;

use super::ModalError;

/// Answer to "Deseja realmente excluir?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Yes => "Sim",
            Self::No => "Não",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteState {
    Idle,
    Confirming { id: String },
    Deleting { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted { id: String, invalidated: Vec<QueryKey> },
}

pub struct DeleteConfirmation<R: Resource> {
    api: Api,
    cache: QueryCache,
    state: DeleteState,
    invalidates: Vec<QueryKey>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Resource> DeleteConfirmation<R> {
    pub fn new(api: Api, cache: QueryCache) -> Self {
        Self {
            api,
            cache,
            state: DeleteState::Idle,
            invalidates: Vec::new(),
            _record: PhantomData,
        }
    }

    pub fn state(&self) -> &DeleteState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != DeleteState::Idle
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self.state, DeleteState::Deleting { .. })
    }

    /// Open the dialog for `id`. `invalidates` are the views that list it.
    pub fn request(&mut self, id: &str, invalidates: Vec<QueryKey>) {
        self.state = DeleteState::Confirming { id: id.to_string() };
        self.invalidates = invalidates;
    }

    pub fn cancel(&mut self) {
        self.state = DeleteState::Idle;
        self.invalidates.clear();
    }

    pub async fn answer(&mut self, answer: Answer) -> Result<DeleteOutcome, ModalError> {
        let DeleteState::Confirming { id } = &self.state else {
            return Err(ModalError::NotReady);
        };
        let id = id.clone();

        if answer == Answer::No {
            self.cancel();
            return Ok(DeleteOutcome::Declined);
        }

        self.state = DeleteState::Deleting { id: id.clone() };
        if let Err(e) = self.api.delete(&R::item_path(&id)).await {
            tracing::error!(record = R::NAME, id = %id, error = %e, "Delete failed");
            self.state = DeleteState::Confirming { id };
            return Err(e.into());
        }

        let invalidated = std::mem::take(&mut self.invalidates);
        for key in &invalidated {
            self.cache.invalidate(key);
        }
        tracing::info!(record = R::NAME, id = %id, "Record deleted");
        self.state = DeleteState::Idle;
        Ok(DeleteOutcome::Deleted { id, invalidated })
    }
}
