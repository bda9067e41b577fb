//! The audio controller.
//!
//! Holds the default output endpoint for its whole lifetime and runs a fresh
//! enumeration pass for every operation. Nothing about sessions is cached
//! between calls: results describe the mixer at call time only.
//!
//! Platform failures never escape. An operation that cannot complete
//! degrades to an empty list, `None`, or `false`.

use std::ops::ControlFlow;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::accessor::{read_mute, read_volume, write_mute, write_volume};
use crate::backend::{AudioBackend, AudioSession, SessionOf};
use crate::enumerator::for_each_active;
use crate::identity::resolve_process_name;
use crate::matcher::{for_each_match, SessionQuery};
use crate::projection::{SessionRecord, SessionSnapshot};

/// Outcome of applying a mutation to every session matching a query.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MutationReport {
    pub matched: usize,
    pub succeeded: usize,
}

impl MutationReport {
    /// The policy behind the boolean setters: one successful match is enough.
    pub fn any_succeeded(&self) -> bool {
        self.succeeded > 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.matched > 0 && self.succeeded == self.matched
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub live: bool,
    pub backend: String,
    pub session_count: usize,
}

pub struct AudioController<B: AudioBackend> {
    // Dropped before the backend.
    endpoint: Option<B::Endpoint>,
    backend: B,
}

impl<B: AudioBackend> AudioController<B> {
    /// Resolves the default output endpoint. A failure is recorded, not
    /// returned: the controller stays usable and every operation degrades.
    pub fn open(backend: B) -> Self {
        let endpoint = match backend.open_default_endpoint() {
            Ok(endpoint) => {
                info!(backend = backend.name(), "default output endpoint opened");
                Some(endpoint)
            }
            Err(e) => {
                warn!(backend = backend.name(), error = %e, "default output endpoint unavailable");
                None
            }
        };
        Self { endpoint, backend }
    }

    /// Releases the endpoint. Further operations behave as if it had never
    /// been resolved.
    pub fn close(&mut self) {
        if self.endpoint.take().is_some() {
            debug!(backend = self.backend.name(), "default output endpoint released");
        }
    }

    pub fn is_live(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn status(&self) -> ControllerStatus {
        let session_count = match &self.endpoint {
            Some(endpoint) => for_each_active(endpoint, |_| ControlFlow::Continue(())).visited,
            None => 0,
        };
        ControllerStatus {
            live: self.is_live(),
            backend: self.backend.name().to_string(),
            session_count,
        }
    }

    /// Active sessions in mixer order.
    pub fn list_sessions(&self) -> Vec<SessionRecord> {
        let mut records = Vec::new();
        let Some(endpoint) = &self.endpoint else {
            return records;
        };

        let summary = for_each_active(endpoint, |active| {
            let name = resolve_process_name(&self.backend, active.process_id);
            let display_name = active.session.display_name().unwrap_or_else(|e| {
                debug!(pid = active.process_id, error = %e, "display name unavailable");
                String::new()
            });
            let snapshot = SessionSnapshot {
                process_id: active.process_id,
                display_name,
                volume: read_volume(&active.session).unwrap_or(0),
                muted: read_mute(&active.session).unwrap_or(false),
            };
            records.push(SessionRecord::project(&snapshot, &name));
            ControlFlow::Continue(())
        });

        debug!(?summary, listed = records.len(), "session pass complete");
        records
    }

    /// Sets the volume of every session whose executable name contains
    /// `name`. True when at least one session accepted the change.
    pub fn set_application_volume(&self, name: &str, percent: u8) -> bool {
        let report = self.set_application_volume_report(name, percent);
        debug!(query = name, percent, ?report, "application volume set");
        report.any_succeeded()
    }

    pub fn set_application_volume_report(&self, name: &str, percent: u8) -> MutationReport {
        self.apply_to_matches(name, |session| write_volume(session, percent))
    }

    /// Volume of the first matching session, `None` when nothing matches.
    pub fn get_application_volume(&self, name: &str) -> Option<u8> {
        self.read_first_match(name, |session| read_volume(session))
    }

    pub fn mute_application(&self, name: &str, mute: bool) -> bool {
        let report = self.mute_application_report(name, mute);
        debug!(query = name, mute, ?report, "application mute set");
        report.any_succeeded()
    }

    pub fn mute_application_report(&self, name: &str, mute: bool) -> MutationReport {
        self.apply_to_matches(name, |session| write_mute(session, mute))
    }

    pub fn get_application_mute(&self, name: &str) -> Option<bool> {
        self.read_first_match(name, |session| read_mute(session))
    }

    /// Flips the mute flag of every matching session to the opposite of the
    /// first readable match. Returns the new flag.
    pub fn toggle_application_mute(&self, name: &str) -> Option<bool> {
        let mut target = None;
        let report = self.apply_to_matches(name, |session| {
            let mute = match target {
                Some(mute) => mute,
                None => match read_mute(session) {
                    Some(current) => *target.insert(!current),
                    None => return false,
                },
            };
            write_mute(session, mute)
        });
        debug!(query = name, ?target, ?report, "application mute toggled");
        target.filter(|_| report.any_succeeded())
    }

    /// System volume, `None` when the endpoint is not live or the read failed.
    pub fn get_system_volume(&self) -> Option<u8> {
        self.endpoint.as_ref().and_then(|endpoint| read_volume(endpoint))
    }

    pub fn set_system_volume(&self, percent: u8) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|endpoint| write_volume(endpoint, percent))
    }

    pub fn get_system_mute(&self) -> Option<bool> {
        self.endpoint.as_ref().and_then(|endpoint| read_mute(endpoint))
    }

    pub fn set_system_mute(&self, mute: bool) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|endpoint| write_mute(endpoint, mute))
    }

    fn apply_to_matches<F>(&self, name: &str, mut apply: F) -> MutationReport
    where
        F: FnMut(&SessionOf<B::Endpoint>) -> bool,
    {
        let mut report = MutationReport::default();
        let Some(endpoint) = &self.endpoint else {
            return report;
        };

        let query = SessionQuery::new(name);
        for_each_match(&self.backend, endpoint, &query, |matched| {
            report.matched += 1;
            if apply(&matched.active.session) {
                report.succeeded += 1;
            } else {
                debug!(
                    slot = matched.active.index,
                    name = %matched.name,
                    "write rejected by matched session"
                );
            }
            ControlFlow::Continue(())
        });
        report
    }

    fn read_first_match<T, F>(&self, name: &str, mut read: F) -> Option<T>
    where
        F: FnMut(&SessionOf<B::Endpoint>) -> Option<T>,
    {
        let endpoint = self.endpoint.as_ref()?;
        let query = SessionQuery::new(name);
        let mut value = None;
        for_each_match(&self.backend, endpoint, &query, |matched| {
            value = read(&matched.active.session);
            debug!(slot = matched.active.index, name = %matched.name, "first match read");
            ControlFlow::Break(())
        });
        value
    }
}
