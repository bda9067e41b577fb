use serde::Serialize;

use crate::identity::ProcessName;

/// Raw values read from one session during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub process_id: u32,
    pub display_name: String,
    pub volume: u8,
    pub muted: bool,
}

/// Caller-facing view of an active session. Field names are part of the
/// external interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    pub volume: u8,
    pub muted: bool,
}

impl SessionRecord {
    /// Sessions that never registered a display name are labelled with their
    /// executable name.
    pub fn project(snapshot: &SessionSnapshot, name: &ProcessName) -> Self {
        let name = name.as_str().to_string();
        let display_name = if snapshot.display_name.is_empty() {
            name.clone()
        } else {
            snapshot.display_name.clone()
        };

        Self {
            id: snapshot.process_id,
            name,
            display_name,
            volume: snapshot.volume,
            muted: snapshot.muted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(display_name: &str) -> SessionSnapshot {
        SessionSnapshot {
            process_id: 4120,
            display_name: display_name.to_string(),
            volume: 76,
            muted: true,
        }
    }

    #[test]
    fn keeps_system_display_name() {
        let record = SessionRecord::project(
            &snapshot("Spotify"),
            &ProcessName::Resolved("Spotify.exe".to_string()),
        );
        assert_eq!(
            record,
            SessionRecord {
                id: 4120,
                name: "Spotify.exe".to_string(),
                display_name: "Spotify".to_string(),
                volume: 76,
                muted: true,
            }
        );
    }

    #[test]
    fn empty_display_name_falls_back_to_executable() {
        let record =
            SessionRecord::project(&snapshot(""), &ProcessName::Resolved("chrome.exe".to_string()));
        assert_eq!(record.display_name, "chrome.exe");

        let record = SessionRecord::project(&snapshot(""), &ProcessName::Unknown);
        assert_eq!(record.name, "Unknown");
        assert_eq!(record.display_name, "Unknown");
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let record = SessionRecord::project(
            &snapshot("Spotify"),
            &ProcessName::Resolved("Spotify.exe".to_string()),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 4120,
                "name": "Spotify.exe",
                "displayName": "Spotify",
                "volume": 76,
                "muted": true
            })
        );
    }
}
