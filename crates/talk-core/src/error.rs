//! Error taxonomy for the dispatch boundary
//!
//! Nothing here escapes the controller: every variant is eventually rendered
//! as a conversation message.

use thiserror::Error;

use crate::http::{describe_status_error, HttpError};

#[derive(Debug, Error)]
pub enum TalkError {
    /// Bad or missing argument. Recovered by re-prompting or a message.
    #[error("{0}")]
    Validation(String),

    /// Unknown program, agent, or conversation
    #[error("{0}")]
    NotFound(String),

    /// Non-2xx HTTP response or socket failure
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },

    /// Unexpected failure inside a program or agent step
    #[error("{0}")]
    Internal(String),
}

impl TalkError {
    pub fn is_transport(&self) -> bool {
        matches!(self, TalkError::Transport { .. })
    }
}

impl From<anyhow::Error> for TalkError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", err);
        TalkError::Internal(err.to_string())
    }
}

impl From<HttpError> for TalkError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status { status, body } => TalkError::Transport {
                status: Some(status),
                message: describe_status_error(status, &body),
            },
            other => TalkError::Transport {
                status: None,
                message: other.to_string(),
            },
        }
    }
}
