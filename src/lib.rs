//! Per-application volume control for the default audio output.
//!
//! [`AudioController`] discovers the applications currently rendering audio,
//! resolves each one to its executable name, and reads or changes volume and
//! mute by (partial, case-insensitive) name. The system-wide output volume is
//! available alongside.

pub mod accessor;
pub mod backend;
pub mod config;
pub mod constants;
pub mod controller;
pub mod enumerator;
pub mod error;
pub mod host;
pub mod identity;
pub mod logging;
pub mod matcher;
pub mod projection;
pub mod session_container;
pub mod tracker;

pub use backend::memory::MemoryMixer;
#[cfg(windows)]
pub use backend::wasapi::WasapiBackend;
pub use config::{BackendKind, Settings};
pub use controller::{AudioController, ControllerStatus, MutationReport};
pub use error::{BackendError, HostError};
pub use identity::ProcessName;
pub use projection::SessionRecord;
pub use session_container::{FadeOutcome, SessionContainer};
pub use tracker::{SessionEvent, SessionTracker};
