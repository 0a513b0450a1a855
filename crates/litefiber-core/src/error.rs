use std::any::Any;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("host rejected `{kind}`: {reason}")]
pub struct HostError {
    pub kind: String,
    pub reason: String,
}

impl HostError {
    pub fn new(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FiberError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("component `{component}` panicked while rendering: {message}")]
    ComponentPanicked { component: String, message: String },

    #[error("engine is already running a slice")]
    Reentrant,
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
