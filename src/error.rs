//! Error conditions raised at the collaborator boundaries.
//!
//! Only a lost display or decoration channel (or a broken keybind table at
//! startup) is fatal; everything else is logged by the event loop and the
//! offending event is dropped.

use thiserror::Error;
use x11rb::errors::ConnectionError;

use crate::types::WindowId;

#[derive(Debug, Error)]
pub enum WmError {
    /// The target window vanished between decision and action
    #[error("window 0x{0:x} no longer exists")]
    StaleReference(WindowId),

    /// The decoration service answered with an error reply
    #[error("decoration service rejected request: {0}")]
    ServiceRejected(String),

    /// A reply did not have the expected shape
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// The decoration service cannot be reached
    #[error("decoration service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The display server connection is gone
    #[error("display connection lost: {0}")]
    ConnectionLost(String),

    /// A keybinding in the configuration cannot be parsed
    #[error("invalid keybinding '{0}'")]
    InvalidKeybind(String),
}

impl WmError {
    /// Whether the manager must shut down
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WmError::ServiceUnavailable(_) | WmError::ConnectionLost(_) | WmError::InvalidKeybind(_)
        )
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, WmError::StaleReference(_))
    }
}

impl From<ConnectionError> for WmError {
    fn from(e: ConnectionError) -> Self {
        WmError::ConnectionLost(e.to_string())
    }
}

/// Turn a stale-reference failure into a skipped action
pub trait SkipStale<T> {
    fn skip_stale(self) -> Result<Option<T>, WmError>;
}

impl<T> SkipStale<T> for Result<T, WmError> {
    fn skip_stale(self) -> Result<Option<T>, WmError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(WmError::StaleReference(window)) => {
                log::debug!("Skipping action on vanished window 0x{:x}", window);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
