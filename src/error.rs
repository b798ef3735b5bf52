use thiserror::Error;

use crate::validate::FieldErrors;

// The request never produced a response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("could not connect: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    // A timed-out request may already have been stored by the server
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, TransportError::Timeout)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error("please correct the form: {0}")]
    Validation(FieldErrors),

    #[error("no job selected for this application")]
    MissingJobId,

    #[error("a submission is already in progress")]
    Busy,

    #[error("submission cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server returned non-JSON response (status {status})")]
    NotJson { status: u16 },

    #[error("failed to parse server response")]
    Parse,

    #[error("{0}")]
    Server(String),

    #[error("server returned invalid data")]
    InvalidData,
}

impl SubmitError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            SubmitError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("fetch cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server returned error ({status})")]
    Status { status: u16 },

    #[error("server returned non-JSON response (status {status})")]
    NotJson { status: u16 },

    #[error("failed to parse server response: {0}")]
    Parse(String),
}

pub type SubmitResult<T> = Result<T, SubmitError>;
pub type FetchResult<T> = Result<T, FetchError>;
