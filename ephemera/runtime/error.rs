use alloc::string::String;

use thiserror::Error;

use super::gc::AllocError;

/// Errors returned by weak handle and finalization registry operations.
///
/// The payload of the argument errors is the type name of the rejected value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WeakRefError {
    #[error("invalid target: expected a heap object but got {0}")]
    InvalidTarget(&'static str),
    #[error("invalid unregister token: expected a heap object but got {0}")]
    InvalidToken(&'static str),
    #[error("cleanup callback is not callable: got {0}")]
    InvalidCallback(&'static str),
    #[error("held value must not be the registration target")]
    HeldValueIsTarget,
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

/// A value thrown by a callback, reported as an uncaught error once it escapes a job.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Uncaught {message}")]
pub struct Exception {
    pub message: String,
}

impl Exception {
    pub fn new(message: impl Into<String>) -> Exception {
        Exception { message: message.into() }
    }
}
