use std::path::Path;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_FADE_STEPS, DEFAULT_FADE_STEP_MS, DEFAULT_LOG_FILTER, DEFAULT_POLL_INTERVAL_MS,
    ENV_PREFIX,
};
use crate::error::SettingsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Native backend where one exists, otherwise the in-memory demo mixer.
    Auto,
    Native,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendKind,
    pub log: String,
    pub poll_interval_ms: u64,
    pub fade_steps: u32,
    pub fade_step_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            log: DEFAULT_LOG_FILTER.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fade_steps: DEFAULT_FADE_STEPS,
            fade_step_ms: DEFAULT_FADE_STEP_MS,
        }
    }
}

impl Settings {
    /// Layers `APPVOL_*` environment variables over an optional settings
    /// file. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, PoisonError};

    // Serializes tests that read or write APPVOL_* variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_file_gives_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(settings.fade_steps, DEFAULT_FADE_STEPS);
    }

    #[test]
    fn file_values_override_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "backend = \"memory\"").unwrap();
        writeln!(file, "fade_steps = 4").unwrap();
        writeln!(file, "log = \"appvol=debug\"").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.backend, BackendKind::Memory);
        assert_eq!(settings.fade_steps, 4);
        assert_eq!(settings.log, "appvol=debug");
        assert_eq!(settings.fade_step_ms, DEFAULT_FADE_STEP_MS);
    }

    #[test]
    fn environment_overrides_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "fade_steps = 4").unwrap();

        std::env::set_var("APPVOL_FADE_STEPS", "7");
        let loaded = Settings::load(file.path());
        std::env::remove_var("APPVOL_FADE_STEPS");

        let settings = loaded.unwrap();
        assert_eq!(settings.fade_steps, 7);
        assert_eq!(settings.fade_step_ms, DEFAULT_FADE_STEP_MS);
    }
}
