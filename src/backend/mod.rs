//! Platform seam for the audio mixer.
//!
//! Implementations:
//! - Windows: Core Audio session API (`wasapi` module)
//! - Memory: in-process mixer for tests and demo mode (`memory` module)
//!
//! Every handle returned here owns its native resource and releases it on
//! drop, so callers get scoped acquisition by simply letting values fall out
//! of scope.

pub mod memory;
#[cfg(windows)]
pub mod wasapi;

use crate::error::BackendError;

pub type BackendResult<T> = Result<T, BackendError>;

/// Lifecycle state the mixer reports for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Active,
    Inactive,
    Expired,
}

/// Scalar volume and mute flag, shared by sessions and the endpoint.
pub trait VolumeControl {
    /// Volume scalar in [0.0, 1.0].
    fn volume(&self) -> BackendResult<f32>;
    fn set_volume(&self, level: f32) -> BackendResult<()>;
    fn is_muted(&self) -> BackendResult<bool>;
    fn set_muted(&self, muted: bool) -> BackendResult<()>;
}

/// One session slot, held only for the duration of a single visit.
pub trait AudioSession: VolumeControl {
    fn process_id(&self) -> BackendResult<u32>;
    fn state(&self) -> BackendResult<SessionState>;
    /// Display name the application registered, empty when none.
    fn display_name(&self) -> BackendResult<String>;
}

/// Point-in-time view of the mixer's session slots.
pub trait SessionList {
    type Session: AudioSession;

    fn count(&self) -> BackendResult<usize>;
    fn session(&self, index: usize) -> BackendResult<Self::Session>;
}

/// The default render endpoint. Its volume control is the system volume.
pub trait RenderEndpoint: VolumeControl {
    type Sessions: SessionList;

    fn sessions(&self) -> BackendResult<Self::Sessions>;
}

pub trait AudioBackend {
    type Endpoint: RenderEndpoint;

    /// Acquire the default output endpoint. Called once per controller.
    fn open_default_endpoint(&self) -> BackendResult<Self::Endpoint>;

    /// Full image path of the executable running as `pid`.
    fn process_image_path(&self, pid: u32) -> BackendResult<String>;

    /// Backend name for logging and status output.
    fn name(&self) -> &str;
}

pub type SessionOf<E> = <<E as RenderEndpoint>::Sessions as SessionList>::Session;

/// Outcome of one attempt to fill a caller-sized UTF-16 buffer.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) enum Fill {
    /// The call wrote this many code units.
    Written(usize),
    /// The buffer was too small for the result.
    TooSmall,
}

/// Runs `fill` against a buffer of `initial` code units, doubling it on
/// [`Fill::TooSmall`] until `max` is reached.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn read_wide_growing<F>(
    call: &'static str,
    initial: usize,
    max: usize,
    mut fill: F,
) -> BackendResult<String>
where
    F: FnMut(&mut [u16]) -> BackendResult<Fill>,
{
    let mut len = initial.clamp(1, max.max(1));
    loop {
        let mut buffer = vec![0u16; len];
        match fill(&mut buffer)? {
            Fill::Written(written) => {
                return Ok(String::from_utf16_lossy(&buffer[..written.min(len)]));
            }
            Fill::TooSmall if len < max => len = len.saturating_mul(2).min(max),
            Fill::TooSmall => {
                return Err(BackendError::call(
                    call,
                    format!("result longer than {max} code units"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_with(text: &str) -> impl FnMut(&mut [u16]) -> BackendResult<Fill> + '_ {
        move |buffer| {
            let wide: Vec<u16> = text.encode_utf16().collect();
            if wide.len() >= buffer.len() {
                return Ok(Fill::TooSmall);
            }
            buffer[..wide.len()].copy_from_slice(&wide);
            Ok(Fill::Written(wide.len()))
        }
    }

    #[test]
    fn short_result_fits_first_buffer() {
        let mut attempts = Vec::new();
        let mut fill = fill_with(r"C:\Windows\notepad.exe");
        let path = read_wide_growing("Query", 260, 32_768, |buffer| {
            attempts.push(buffer.len());
            fill(buffer)
        })
        .unwrap();
        assert_eq!(path, r"C:\Windows\notepad.exe");
        assert_eq!(attempts, vec![260]);
    }

    #[test]
    fn long_result_grows_the_buffer() {
        let long = format!(r"\\?\C:\{}\app.exe", "deep\\".repeat(200));
        let mut attempts = Vec::new();
        let mut fill = fill_with(&long);
        let path = read_wide_growing("Query", 260, 32_768, |buffer| {
            attempts.push(buffer.len());
            fill(buffer)
        })
        .unwrap();
        assert_eq!(path, long);
        assert_eq!(attempts, vec![260, 520, 1040]);
    }

    #[test]
    fn growth_stops_at_the_limit() {
        let long = "x".repeat(100);
        let err = read_wide_growing("Query", 16, 64, fill_with(&long)).unwrap_err();
        assert!(matches!(err, BackendError::Call { call: "Query", .. }));
    }

    #[test]
    fn call_failure_is_returned_unchanged() {
        let err = read_wide_growing("Query", 16, 64, |_| Err(BackendError::SessionGone))
            .unwrap_err();
        assert_eq!(err, BackendError::SessionGone);
    }
}
