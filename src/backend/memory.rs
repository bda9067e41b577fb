//! In-process mixer.
//!
//! Behaves like the platform mixer closely enough to drive the controller in
//! tests: session lists are snapshots taken when requested, sessions can
//! vanish while a pass is running, and every handle handed out is counted so
//! leaks show up as a non-zero `live_handles()` after an operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    AudioBackend, AudioSession, BackendResult, RenderEndpoint, SessionList, SessionState,
    VolumeControl,
};
use crate::error::BackendError;

/// Stable identity of a seeded session inside a [`MemoryMixer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct MemorySession {
    pub process_id: u32,
    pub state: SessionState,
    pub display_name: String,
    pub volume: f32,
    pub muted: bool,
    /// Fetching this slot from a session list fails.
    pub unreadable: bool,
    /// Volume and mute writes on this session fail.
    pub rejects_writes: bool,
    /// Display name, volume and mute reads fail; id and state still answer.
    pub unreadable_fields: bool,
}

impl MemorySession {
    pub fn active(process_id: u32, display_name: &str) -> Self {
        Self {
            process_id,
            state: SessionState::Active,
            display_name: display_name.to_string(),
            volume: 1.0,
            muted: false,
            unreadable: false,
            rejects_writes: false,
            unreadable_fields: false,
        }
    }

    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }

    pub fn rejecting_writes(mut self) -> Self {
        self.rejects_writes = true;
        self
    }

    pub fn with_unreadable_fields(mut self) -> Self {
        self.unreadable_fields = true;
        self
    }
}

#[derive(Debug)]
struct Slot {
    key: SessionKey,
    session: MemorySession,
}

#[derive(Debug)]
struct MixerState {
    device_present: bool,
    sessions_refused: bool,
    system_volume: f32,
    system_muted: bool,
    system_rejects_writes: bool,
    slots: Vec<Slot>,
    next_key: u64,
    processes: HashMap<u32, String>,
    live_handles: usize,
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            device_present: true,
            sessions_refused: false,
            system_volume: 0.5,
            system_muted: false,
            system_rejects_writes: false,
            slots: Vec::new(),
            next_key: 1,
            processes: HashMap::new(),
            live_handles: 0,
        }
    }
}

/// Shared mixer state. Clones observe and mutate the same mixer, so a test can
/// keep one clone while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryMixer {
    state: Arc<Mutex<MixerState>>,
}

impl MemoryMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mixer with no default output device.
    pub fn without_device() -> Self {
        let mixer = Self::new();
        mixer.lock().device_present = false;
        mixer
    }

    /// A mixer populated with a typical desktop session set.
    pub fn demo() -> Self {
        let mixer = Self::new();
        mixer.set_system_volume(0.75);

        let apps = [
            (
                r"C:\Users\Public\AppData\Roaming\Spotify\Spotify.exe",
                MemorySession::active(4120, "Spotify").with_volume(0.75),
            ),
            (
                r"C:\Users\Public\AppData\Local\Discord\app-1.0.9\Discord.exe",
                MemorySession::active(7312, "").with_volume(0.6),
            ),
            (
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                MemorySession::active(9876, "").with_volume(0.8),
            ),
            (
                r"C:\Program Files\VideoLAN\VLC\vlc.exe",
                MemorySession::active(3010, "VLC media player")
                    .with_volume(0.85)
                    .muted(),
            ),
            (
                r"C:\Program Files\Mozilla Firefox\firefox.exe",
                MemorySession::active(5544, "")
                    .with_volume(0.7)
                    .with_state(SessionState::Inactive),
            ),
        ];
        for (path, session) in apps {
            mixer.add_process(session.process_id, path);
            mixer.add_session(session);
        }

        // A second browser stream and the system sounds slot.
        mixer.add_session(MemorySession::active(9876, "").with_volume(0.8));
        mixer.add_session(
            MemorySession::active(0, r"@%SystemRoot%\System32\AudioSrv.Dll,-202").with_volume(1.0),
        );
        mixer
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_process(&self, pid: u32, image_path: &str) {
        self.lock().processes.insert(pid, image_path.to_string());
    }

    pub fn remove_process(&self, pid: u32) {
        self.lock().processes.remove(&pid);
    }

    pub fn add_session(&self, session: MemorySession) -> SessionKey {
        let mut state = self.lock();
        let key = SessionKey(state.next_key);
        state.next_key += 1;
        state.slots.push(Slot { key, session });
        key
    }

    pub fn remove_session(&self, key: SessionKey) {
        self.lock().slots.retain(|slot| slot.key != key);
    }

    pub fn set_session_state(&self, key: SessionKey, new_state: SessionState) {
        if let Some(slot) = self.lock().slots.iter_mut().find(|slot| slot.key == key) {
            slot.session.state = new_state;
        }
    }

    pub fn session(&self, key: SessionKey) -> Option<MemorySession> {
        self.lock()
            .slots
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| slot.session.clone())
    }

    /// Every slot, in mixer order.
    pub fn sessions(&self) -> Vec<MemorySession> {
        self.lock().slots.iter().map(|slot| slot.session.clone()).collect()
    }

    /// Makes the endpoint refuse to hand out a session list.
    pub fn refuse_sessions(&self, refused: bool) {
        self.lock().sessions_refused = refused;
    }

    pub fn set_system_volume(&self, volume: f32) {
        self.lock().system_volume = volume;
    }

    pub fn system_volume(&self) -> f32 {
        self.lock().system_volume
    }

    pub fn system_muted(&self) -> bool {
        self.lock().system_muted
    }

    pub fn reject_system_writes(&self, rejects: bool) {
        self.lock().system_rejects_writes = rejects;
    }

    /// Handles currently held by callers (endpoint, lists and sessions).
    pub fn live_handles(&self) -> usize {
        self.lock().live_handles
    }
}

fn check_level(level: f32) -> BackendResult<()> {
    if (0.0..=1.0).contains(&level) {
        Ok(())
    } else {
        Err(BackendError::call("SetVolume", format!("level {level} out of range")))
    }
}

/// Counts one outstanding handle for as long as it lives.
#[derive(Debug)]
struct HandleToken {
    mixer: MemoryMixer,
}

impl HandleToken {
    fn acquire(mixer: &MemoryMixer) -> Self {
        mixer.lock().live_handles += 1;
        Self {
            mixer: mixer.clone(),
        }
    }
}

impl Drop for HandleToken {
    fn drop(&mut self) {
        let mut state = self.mixer.lock();
        state.live_handles = state.live_handles.saturating_sub(1);
    }
}

impl AudioBackend for MemoryMixer {
    type Endpoint = MemoryEndpoint;

    fn open_default_endpoint(&self) -> BackendResult<MemoryEndpoint> {
        if !self.lock().device_present {
            return Err(BackendError::NoDevice);
        }
        Ok(MemoryEndpoint {
            token: HandleToken::acquire(self),
        })
    }

    fn process_image_path(&self, pid: u32) -> BackendResult<String> {
        self.lock()
            .processes
            .get(&pid)
            .cloned()
            .ok_or(BackendError::ProcessInaccessible(pid))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug)]
pub struct MemoryEndpoint {
    token: HandleToken,
}

impl MemoryEndpoint {
    fn mixer(&self) -> &MemoryMixer {
        &self.token.mixer
    }
}

impl VolumeControl for MemoryEndpoint {
    fn volume(&self) -> BackendResult<f32> {
        Ok(self.mixer().lock().system_volume)
    }

    fn set_volume(&self, level: f32) -> BackendResult<()> {
        check_level(level)?;
        let mut state = self.mixer().lock();
        if state.system_rejects_writes {
            return Err(BackendError::call("SetMasterVolumeLevelScalar", "rejected"));
        }
        state.system_volume = level;
        Ok(())
    }

    fn is_muted(&self) -> BackendResult<bool> {
        Ok(self.mixer().lock().system_muted)
    }

    fn set_muted(&self, muted: bool) -> BackendResult<()> {
        let mut state = self.mixer().lock();
        if state.system_rejects_writes {
            return Err(BackendError::call("SetMute", "rejected"));
        }
        state.system_muted = muted;
        Ok(())
    }
}

impl RenderEndpoint for MemoryEndpoint {
    type Sessions = MemorySessionList;

    fn sessions(&self) -> BackendResult<MemorySessionList> {
        let keys = {
            let state = self.mixer().lock();
            if state.sessions_refused {
                return Err(BackendError::call("GetSessionEnumerator", "refused"));
            }
            state.slots.iter().map(|slot| slot.key).collect()
        };
        Ok(MemorySessionList {
            keys,
            token: HandleToken::acquire(self.mixer()),
        })
    }
}

#[derive(Debug)]
pub struct MemorySessionList {
    keys: Vec<SessionKey>,
    token: HandleToken,
}

impl SessionList for MemorySessionList {
    type Session = MemorySessionHandle;

    fn count(&self) -> BackendResult<usize> {
        Ok(self.keys.len())
    }

    fn session(&self, index: usize) -> BackendResult<MemorySessionHandle> {
        let key = *self
            .keys
            .get(index)
            .ok_or(BackendError::SlotOutOfRange(index))?;
        let handle = MemorySessionHandle {
            key,
            token: HandleToken::acquire(&self.token.mixer),
        };
        if handle.read(|session| session.unreadable)? {
            return Err(BackendError::call("GetSession", format!("slot {index} unreadable")));
        }
        Ok(handle)
    }
}

#[derive(Debug)]
pub struct MemorySessionHandle {
    key: SessionKey,
    token: HandleToken,
}

impl MemorySessionHandle {
    fn read<T>(&self, f: impl FnOnce(&MemorySession) -> T) -> BackendResult<T> {
        let state = self.token.mixer.lock();
        state
            .slots
            .iter()
            .find(|slot| slot.key == self.key)
            .map(|slot| f(&slot.session))
            .ok_or(BackendError::SessionGone)
    }

    /// Reads a field guarded by `unreadable_fields`.
    fn read_field<T>(
        &self,
        call: &'static str,
        f: impl FnOnce(&MemorySession) -> T,
    ) -> BackendResult<T> {
        self.read(|session| (!session.unreadable_fields).then(|| f(session)))?
            .ok_or_else(|| BackendError::call(call, "field unreadable"))
    }

    fn write(&self, f: impl FnOnce(&mut MemorySession)) -> BackendResult<()> {
        let mut state = self.token.mixer.lock();
        let slot = state
            .slots
            .iter_mut()
            .find(|slot| slot.key == self.key)
            .ok_or(BackendError::SessionGone)?;
        if slot.session.rejects_writes {
            return Err(BackendError::call("ISimpleAudioVolume", "write rejected"));
        }
        f(&mut slot.session);
        Ok(())
    }
}

impl VolumeControl for MemorySessionHandle {
    fn volume(&self) -> BackendResult<f32> {
        self.read_field("GetMasterVolume", |session| session.volume)
    }

    fn set_volume(&self, level: f32) -> BackendResult<()> {
        check_level(level)?;
        self.write(|session| session.volume = level)
    }

    fn is_muted(&self) -> BackendResult<bool> {
        self.read_field("GetMute", |session| session.muted)
    }

    fn set_muted(&self, muted: bool) -> BackendResult<()> {
        self.write(|session| session.muted = muted)
    }
}

impl AudioSession for MemorySessionHandle {
    fn process_id(&self) -> BackendResult<u32> {
        self.read(|session| session.process_id)
    }

    fn state(&self) -> BackendResult<SessionState> {
        self.read(|session| session.state)
    }

    fn display_name(&self) -> BackendResult<String> {
        self.read_field("GetDisplayName", |session| session.display_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_counted_until_dropped() {
        let mixer = MemoryMixer::new();
        mixer.add_session(MemorySession::active(10, "a"));

        let endpoint = mixer.open_default_endpoint().unwrap();
        assert_eq!(mixer.live_handles(), 1);
        {
            let list = endpoint.sessions().unwrap();
            let _session = list.session(0).unwrap();
            assert_eq!(mixer.live_handles(), 3);
        }
        assert_eq!(mixer.live_handles(), 1);
        drop(endpoint);
        assert_eq!(mixer.live_handles(), 0);
    }

    #[test]
    fn list_is_a_snapshot_and_removed_sessions_go_stale() {
        let mixer = MemoryMixer::new();
        let key = mixer.add_session(MemorySession::active(10, "a"));
        let endpoint = mixer.open_default_endpoint().unwrap();
        let list = endpoint.sessions().unwrap();

        mixer.add_session(MemorySession::active(11, "b"));
        assert_eq!(list.count().unwrap(), 1);

        let session = list.session(0).unwrap();
        mixer.remove_session(key);
        assert_eq!(session.volume(), Err(BackendError::SessionGone));
    }

    #[test]
    fn unreadable_slot_fails_without_leaking() {
        let mixer = MemoryMixer::new();
        mixer.add_session(MemorySession::active(10, "a").unreadable());
        let endpoint = mixer.open_default_endpoint().unwrap();
        let list = endpoint.sessions().unwrap();

        assert!(list.session(0).is_err());
        assert!(list.session(5).is_err());
        assert_eq!(mixer.live_handles(), 2);
    }

    #[test]
    fn missing_device_refuses_endpoint() {
        let mixer = MemoryMixer::without_device();
        assert_eq!(
            mixer.open_default_endpoint().unwrap_err(),
            BackendError::NoDevice
        );
    }
}
