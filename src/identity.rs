//! Process identity resolution.
//!
//! Names are resolved on every call and never cached: process ids are
//! recycled by the OS, so yesterday's name for a pid can be wrong today.

use std::fmt;

use tracing::debug;

use crate::backend::AudioBackend;
use crate::constants::UNKNOWN_PROCESS;

/// Executable base name of a session's owning process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessName {
    Resolved(String),
    /// The process could not be opened or its image name could not be read.
    Unknown,
}

impl ProcessName {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessName::Resolved(name) => name,
            ProcessName::Unknown => UNKNOWN_PROCESS,
        }
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final component of an image path. Both separators are accepted since
/// paths may come from either the native or the DOS namespace.
pub fn base_name(image_path: &str) -> Option<&str> {
    image_path
        .rsplit(['\\', '/'])
        .next()
        .filter(|name| !name.is_empty())
}

pub fn resolve_process_name<B: AudioBackend>(backend: &B, pid: u32) -> ProcessName {
    match backend.process_image_path(pid) {
        Ok(path) => match base_name(&path) {
            Some(name) => ProcessName::Resolved(name.to_string()),
            None => {
                debug!(pid, path = %path, "empty image path");
                ProcessName::Unknown
            }
        },
        Err(e) => {
            debug!(pid, error = %e, "process identity unavailable");
            ProcessName::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryMixer;

    #[test]
    fn base_name_takes_last_component() {
        assert_eq!(base_name(r"C:\Windows\System32\notepad.exe"), Some("notepad.exe"));
        assert_eq!(base_name("/usr/bin/mpv"), Some("mpv"));
        assert_eq!(base_name("Spotify.exe"), Some("Spotify.exe"));
        assert_eq!(base_name(r"C:\Program Files\"), None);
        assert_eq!(base_name(""), None);
    }

    #[test]
    fn resolves_case_preserved_name() {
        let mixer = MemoryMixer::new();
        mixer.add_process(42, r"C:\Windows\Notepad.exe");
        assert_eq!(
            resolve_process_name(&mixer, 42),
            ProcessName::Resolved("Notepad.exe".to_string())
        );
    }

    #[test]
    fn exited_process_is_unknown() {
        let mixer = MemoryMixer::new();
        let name = resolve_process_name(&mixer, 4242);
        assert_eq!(name, ProcessName::Unknown);
        assert_eq!(name.as_str(), "Unknown");
    }
}
