//! Modal flows: edit an existing record, register a new one, confirm a delete.
//!
//! Every flow is an explicit state enum. Async work inside a modal races a
//! `CancellationToken`; closing cancels it and anything that lands later is
//! dropped.

pub mod delete;
pub mod edit;
pub mod register;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::form::ValidationErrors;
use crate::gateway::GatewayError;

pub use delete::{Answer, DeleteConfirmation, DeleteOutcome, DeleteState};
pub use edit::{EditModal, ModalState, SubmitOutcome};
pub use register::{RegisterModal, RegisterOutcome, RegisterState};

#[derive(Debug, thiserror::Error)]
pub enum ModalError {
    #[error("Action not available in the current modal state")]
    NotReady,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Unexpected record shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to load record: {0}")]
    Fetch(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("This record type has no attachment")]
    NoAttachment,

    #[error("A file must be selected")]
    UploadRequired,

    #[error("A patient must be selected")]
    MissingParent,
}

impl ModalError {
    /// Message for the form's inline error slot, when this is a validation failure.
    pub fn validation_message(&self) -> Option<&str> {
        match self {
            Self::Validation(errors) => errors.first_message(),
            _ => None,
        }
    }
}

/// What the image/file preview shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Already stored on the server.
    Remote(String),
    /// Picked locally, not uploaded yet.
    Pending(String),
}

/// Lets another task cancel a modal's in-flight work.
#[derive(Debug, Clone)]
pub struct CloseSignal(CancellationToken);

impl CloseSignal {
    pub fn close(&self) {
        self.0.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Race `fut` against `token`. Cancellation wins ties.
pub(crate) async fn cancellable<T, E, F>(token: &CancellationToken, fut: F) -> Result<T, ModalError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ModalError>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ModalError::Cancelled),
        result = fut => result.map_err(Into::into),
    }
}
