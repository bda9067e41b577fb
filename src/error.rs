use std::fmt::Display;

/// Failure of a single platform call below the controller.
///
/// These never cross the controller boundary; the controller logs them and
/// degrades to its documented default result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("no default audio output device")]
    NoDevice,
    #[error("audio subsystem unavailable: {0}")]
    Unavailable(String),
    #[error("session slot {0} is out of range")]
    SlotOutOfRange(usize),
    #[error("session is no longer tracked by the mixer")]
    SessionGone,
    #[error("process {0} could not be opened")]
    ProcessInaccessible(u32),
    #[error("{call} failed: {message}")]
    Call { call: &'static str, message: String },
}

impl BackendError {
    pub fn call(call: &'static str, err: impl Display) -> Self {
        BackendError::Call {
            call,
            message: err.to_string(),
        }
    }
}

/// Rejection at the untyped call surface. This is the only failure a host
/// ever sees; everything else degrades to a default result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}
