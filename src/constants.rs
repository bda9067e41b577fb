pub const MIN_PERCENT: u8 = 0;
pub const MAX_PERCENT: u8 = 100;

/// Returned at the call surface when the system volume cannot be read.
pub const SYSTEM_VOLUME_UNAVAILABLE: i64 = -1;

/// Name reported for sessions whose owning process could not be opened or named.
pub const UNKNOWN_PROCESS: &str = "Unknown";

/// Process id the mixer uses for the system sounds session.
pub const SYSTEM_SOUNDS_PID: u32 = 0;

pub const DEFAULT_CONFIG_FILE: &str = "appvol.toml";
pub const ENV_PREFIX: &str = "APPVOL";
pub const LOG_ENV: &str = "APPVOL_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// Same shape as a manual fade: ten steps of 100ms.
pub const DEFAULT_FADE_STEPS: u32 = 10;
pub const DEFAULT_FADE_STEP_MS: u64 = 100;
