//! Session enumeration.
//!
//! A pass walks the mixer's session list one slot at a time. Each slot's
//! handle is dropped before the next slot is fetched, so a pass never holds
//! more than one session regardless of how many the mixer tracks.

use std::ops::ControlFlow;

use tracing::{debug, trace};

use crate::backend::{AudioSession, RenderEndpoint, SessionList, SessionOf, SessionState};
use crate::constants::SYSTEM_SOUNDS_PID;

/// An Active, user-attributable session handed to a visitor.
pub struct ActiveSession<S> {
    pub index: usize,
    pub process_id: u32,
    pub session: S,
}

/// What a single pass saw, for diagnostics and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub slots: usize,
    pub failed: usize,
    pub system: usize,
    pub inactive: usize,
    pub visited: usize,
    /// True when the session list itself could not be obtained.
    pub unavailable: bool,
}

/// Calls `visit` for every Active session with a non-zero process id, in
/// mixer order. A slot that cannot be queried is skipped; the pass carries on.
/// The visitor can stop the pass early with `ControlFlow::Break`.
pub fn for_each_active<E, F>(endpoint: &E, mut visit: F) -> PassSummary
where
    E: RenderEndpoint,
    F: FnMut(ActiveSession<SessionOf<E>>) -> ControlFlow<()>,
{
    let mut summary = PassSummary::default();

    let list = match endpoint.sessions() {
        Ok(list) => list,
        Err(e) => {
            debug!(error = %e, "session list unavailable");
            summary.unavailable = true;
            return summary;
        }
    };
    let count = match list.count() {
        Ok(count) => count,
        Err(e) => {
            debug!(error = %e, "session count unavailable");
            summary.unavailable = true;
            return summary;
        }
    };
    summary.slots = count;

    for index in 0..count {
        let session = match list.session(index) {
            Ok(session) => session,
            Err(e) => {
                debug!(index, error = %e, "skipping session slot");
                summary.failed += 1;
                continue;
            }
        };

        let process_id = match session.process_id() {
            Ok(pid) => pid,
            Err(e) => {
                debug!(index, error = %e, "skipping session without process id");
                summary.failed += 1;
                continue;
            }
        };
        if process_id == SYSTEM_SOUNDS_PID {
            summary.system += 1;
            continue;
        }

        match session.state() {
            Ok(SessionState::Active) => {}
            Ok(state) => {
                trace!(index, pid = process_id, ?state, "session not active");
                summary.inactive += 1;
                continue;
            }
            Err(e) => {
                debug!(index, pid = process_id, error = %e, "skipping session without state");
                summary.failed += 1;
                continue;
            }
        }

        summary.visited += 1;
        let flow = visit(ActiveSession {
            index,
            process_id,
            session,
        });
        if flow.is_break() {
            break;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryMixer, MemorySession};
    use crate::backend::AudioBackend;

    #[test]
    fn skips_system_inactive_and_unreadable_slots() {
        let mixer = MemoryMixer::new();
        mixer.add_session(MemorySession::active(0, "system sounds"));
        mixer.add_session(MemorySession::active(10, "a"));
        mixer.add_session(MemorySession::active(11, "b").with_state(SessionState::Inactive));
        mixer.add_session(MemorySession::active(12, "c").unreadable());
        mixer.add_session(MemorySession::active(13, "d").with_state(SessionState::Expired));
        mixer.add_session(MemorySession::active(14, "e"));
        let endpoint = mixer.open_default_endpoint().unwrap();

        let mut seen = Vec::new();
        let summary = for_each_active(&endpoint, |active| {
            seen.push(active.process_id);
            ControlFlow::Continue(())
        });

        assert_eq!(seen, vec![10, 14]);
        assert_eq!(
            summary,
            PassSummary {
                slots: 6,
                failed: 1,
                system: 1,
                inactive: 2,
                visited: 2,
                unavailable: false,
            }
        );
        assert_eq!(mixer.live_handles(), 1);
    }

    #[test]
    fn break_stops_the_pass() {
        let mixer = MemoryMixer::new();
        mixer.add_session(MemorySession::active(10, "a"));
        mixer.add_session(MemorySession::active(11, "b"));
        let endpoint = mixer.open_default_endpoint().unwrap();

        let summary = for_each_active(&endpoint, |_| ControlFlow::Break(()));
        assert_eq!(summary.visited, 1);
    }

    #[test]
    fn refused_list_yields_empty_pass() {
        let mixer = MemoryMixer::new();
        mixer.add_session(MemorySession::active(10, "a"));
        mixer.refuse_sessions(true);
        let endpoint = mixer.open_default_endpoint().unwrap();

        let summary = for_each_active(&endpoint, |_| ControlFlow::Continue(()));
        assert!(summary.unavailable);
        assert_eq!(summary.visited, 0);
    }
}
