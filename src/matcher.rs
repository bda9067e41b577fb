//! Name queries over the active session set.
//!
//! A query matches when the lower-cased executable name contains the
//! lower-cased query, so `"note"` addresses `Notepad.exe` and `"chrome"`
//! addresses every Chrome stream at once.

use std::ops::ControlFlow;

use crate::backend::{AudioBackend, SessionOf};
use crate::enumerator::{for_each_active, ActiveSession, PassSummary};
use crate::identity::{resolve_process_name, ProcessName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    needle: String,
}

impl SessionQuery {
    pub fn new(query: &str) -> Self {
        Self {
            needle: query.to_lowercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.needle
    }

    /// Matches against the name as listed, so an empty query matches every
    /// session and an unresolved process answers to `"Unknown"`.
    pub fn matches(&self, name: &ProcessName) -> bool {
        name.as_str().to_lowercase().contains(&self.needle)
    }
}

/// A matched session together with the identity it was matched on.
pub struct MatchedSession<S> {
    pub active: ActiveSession<S>,
    pub name: ProcessName,
}

/// Runs one enumeration pass and calls `visit` for each session matching
/// `query`. Non-matching sessions are released without being touched.
pub fn for_each_match<B, F>(
    backend: &B,
    endpoint: &B::Endpoint,
    query: &SessionQuery,
    mut visit: F,
) -> PassSummary
where
    B: AudioBackend,
    F: FnMut(MatchedSession<SessionOf<B::Endpoint>>) -> ControlFlow<()>,
{
    for_each_active(endpoint, |active| {
        let name = resolve_process_name(backend, active.process_id);
        if query.matches(&name) {
            visit(MatchedSession { active, name })
        } else {
            ControlFlow::Continue(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(name: &str) -> ProcessName {
        ProcessName::Resolved(name.to_string())
    }

    #[test]
    fn substring_match_ignores_case() {
        let query = SessionQuery::new("note");
        assert!(query.matches(&resolved("Notepad.exe")));
        assert!(SessionQuery::new("NOTEPAD").matches(&resolved("notepad.exe")));
        assert!(SessionQuery::new(".EXE").matches(&resolved("vlc.exe")));
        assert!(!query.matches(&resolved("chrome.exe")));
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(SessionQuery::new("").matches(&resolved("chrome.exe")));
        assert!(SessionQuery::new("").matches(&ProcessName::Unknown));
    }

    #[test]
    fn unknown_identity_matches_its_listed_name() {
        assert!(SessionQuery::new("Unknown").matches(&ProcessName::Unknown));
        assert!(SessionQuery::new("unk").matches(&ProcessName::Unknown));
        assert!(!SessionQuery::new("spotify").matches(&ProcessName::Unknown));
    }
}
