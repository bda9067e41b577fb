//! Core Audio backend (WASAPI session API).
//!
//! COM lifetime is tied to the endpoint: the endpoint owns the apartment
//! guard, so the endpoint (and with it the controller) must stay on the
//! thread that opened it.

use std::ffi::c_void;

use tracing::debug;
use windows::core::{Interface, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, BOOL, ERROR_INSUFFICIENT_BUFFER, HANDLE, MAX_PATH,
};
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{
    eConsole, eRender, AudioSessionStateActive, AudioSessionStateExpired,
    AudioSessionStateInactive, IAudioSessionControl, IAudioSessionControl2,
    IAudioSessionEnumerator, IAudioSessionManager2, IMMDevice, IMMDeviceEnumerator,
    ISimpleAudioVolume, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL,
    COINIT_MULTITHREADED,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};

use super::{
    read_wide_growing, AudioBackend, AudioSession, BackendResult, Fill, RenderEndpoint,
    SessionList, SessionState, VolumeControl,
};
use crate::error::BackendError;

/// Longest extended-length path the shell can hand out, in UTF-16 units.
const MAX_IMAGE_PATH: usize = 32_768;

/// Balances a successful `CoInitializeEx` with `CoUninitialize` on drop.
struct ComGuard;

impl ComGuard {
    fn init() -> BackendResult<Self> {
        // S_FALSE (already initialized on this thread) still needs balancing.
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
            .ok()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(ComGuard)
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

/// Closes a process handle on drop.
struct ProcessHandle(HANDLE);

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// A string the callee allocated with the COM task allocator.
struct CoTaskString(PWSTR);

impl CoTaskString {
    fn to_string_lossy(&self) -> String {
        if self.0.is_null() {
            return String::new();
        }
        unsafe { String::from_utf16_lossy(self.0.as_wide()) }
    }
}

impl Drop for CoTaskString {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { CoTaskMemFree(Some(self.0 .0 as *const c_void)) };
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        WasapiBackend
    }
}

impl AudioBackend for WasapiBackend {
    type Endpoint = WasapiEndpoint;

    fn open_default_endpoint(&self) -> BackendResult<WasapiEndpoint> {
        let com = ComGuard::init()?;
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| BackendError::Unavailable(e.to_string()))?;
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|e| {
                    debug!(error = %e, "GetDefaultAudioEndpoint failed");
                    BackendError::NoDevice
                })?;

            Ok(WasapiEndpoint {
                device,
                _enumerator: enumerator,
                _com: com,
            })
        }
    }

    fn process_image_path(&self, pid: u32) -> BackendResult<String> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), pid)
                .map_err(|_| BackendError::ProcessInaccessible(pid))?;
            let handle = ProcessHandle(handle);

            read_wide_growing(
                "QueryFullProcessImageNameW",
                MAX_PATH as usize,
                MAX_IMAGE_PATH,
                |buffer| {
                    let mut size = buffer.len() as u32;
                    match QueryFullProcessImageNameW(
                        handle.0,
                        PROCESS_NAME_WIN32,
                        PWSTR(buffer.as_mut_ptr()),
                        &mut size,
                    ) {
                        Ok(()) => Ok(Fill::Written(size as usize)),
                        Err(e) if e.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => {
                            Ok(Fill::TooSmall)
                        }
                        Err(e) => Err(BackendError::call("QueryFullProcessImageNameW", e)),
                    }
                },
            )
        }
    }

    fn name(&self) -> &str {
        "wasapi"
    }
}

/// Default render endpoint. Fields drop in declaration order, which releases
/// the device, then the enumerator, then the COM apartment.
pub struct WasapiEndpoint {
    device: IMMDevice,
    _enumerator: IMMDeviceEnumerator,
    _com: ComGuard,
}

impl WasapiEndpoint {
    fn endpoint_volume(&self) -> BackendResult<IAudioEndpointVolume> {
        unsafe { self.device.Activate(CLSCTX_ALL, None) }
            .map_err(|e| BackendError::call("Activate(IAudioEndpointVolume)", e))
    }
}

impl VolumeControl for WasapiEndpoint {
    fn volume(&self) -> BackendResult<f32> {
        let control = self.endpoint_volume()?;
        unsafe { control.GetMasterVolumeLevelScalar() }
            .map_err(|e| BackendError::call("GetMasterVolumeLevelScalar", e))
    }

    fn set_volume(&self, level: f32) -> BackendResult<()> {
        let control = self.endpoint_volume()?;
        unsafe { control.SetMasterVolumeLevelScalar(level, std::ptr::null()) }
            .map_err(|e| BackendError::call("SetMasterVolumeLevelScalar", e))
    }

    fn is_muted(&self) -> BackendResult<bool> {
        let control = self.endpoint_volume()?;
        unsafe { control.GetMute() }
            .map(|muted| muted.as_bool())
            .map_err(|e| BackendError::call("IAudioEndpointVolume::GetMute", e))
    }

    fn set_muted(&self, muted: bool) -> BackendResult<()> {
        let control = self.endpoint_volume()?;
        unsafe { control.SetMute(BOOL::from(muted), std::ptr::null()) }
            .map_err(|e| BackendError::call("IAudioEndpointVolume::SetMute", e))
    }
}

impl RenderEndpoint for WasapiEndpoint {
    type Sessions = WasapiSessionList;

    fn sessions(&self) -> BackendResult<WasapiSessionList> {
        unsafe {
            let manager: IAudioSessionManager2 = self
                .device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| BackendError::call("Activate(IAudioSessionManager2)", e))?;
            let sessions = manager
                .GetSessionEnumerator()
                .map_err(|e| BackendError::call("GetSessionEnumerator", e))?;

            Ok(WasapiSessionList {
                sessions,
                _manager: manager,
            })
        }
    }
}

pub struct WasapiSessionList {
    sessions: IAudioSessionEnumerator,
    _manager: IAudioSessionManager2,
}

impl SessionList for WasapiSessionList {
    type Session = WasapiSession;

    fn count(&self) -> BackendResult<usize> {
        let count = unsafe { self.sessions.GetCount() }
            .map_err(|e| BackendError::call("IAudioSessionEnumerator::GetCount", e))?;
        Ok(count.max(0) as usize)
    }

    fn session(&self, index: usize) -> BackendResult<WasapiSession> {
        let slot = i32::try_from(index).map_err(|_| BackendError::SlotOutOfRange(index))?;
        let control = unsafe { self.sessions.GetSession(slot) }
            .map_err(|e| BackendError::call("IAudioSessionEnumerator::GetSession", e))?;
        Ok(WasapiSession { control })
    }
}

pub struct WasapiSession {
    control: IAudioSessionControl,
}

impl WasapiSession {
    fn simple_volume(&self) -> BackendResult<ISimpleAudioVolume> {
        self.control
            .cast()
            .map_err(|e| BackendError::call("QueryInterface(ISimpleAudioVolume)", e))
    }
}

impl VolumeControl for WasapiSession {
    fn volume(&self) -> BackendResult<f32> {
        let control = self.simple_volume()?;
        unsafe { control.GetMasterVolume() }
            .map_err(|e| BackendError::call("ISimpleAudioVolume::GetMasterVolume", e))
    }

    fn set_volume(&self, level: f32) -> BackendResult<()> {
        let control = self.simple_volume()?;
        unsafe { control.SetMasterVolume(level, std::ptr::null()) }
            .map_err(|e| BackendError::call("ISimpleAudioVolume::SetMasterVolume", e))
    }

    fn is_muted(&self) -> BackendResult<bool> {
        let control = self.simple_volume()?;
        unsafe { control.GetMute() }
            .map(|muted| muted.as_bool())
            .map_err(|e| BackendError::call("ISimpleAudioVolume::GetMute", e))
    }

    fn set_muted(&self, muted: bool) -> BackendResult<()> {
        let control = self.simple_volume()?;
        unsafe { control.SetMute(BOOL::from(muted), std::ptr::null()) }
            .map_err(|e| BackendError::call("ISimpleAudioVolume::SetMute", e))
    }
}

impl AudioSession for WasapiSession {
    fn process_id(&self) -> BackendResult<u32> {
        let control: IAudioSessionControl2 = self
            .control
            .cast()
            .map_err(|e| BackendError::call("QueryInterface(IAudioSessionControl2)", e))?;
        unsafe { control.GetProcessId() }.map_err(|e| BackendError::call("GetProcessId", e))
    }

    fn state(&self) -> BackendResult<SessionState> {
        let state = unsafe { self.control.GetState() }
            .map_err(|e| BackendError::call("IAudioSessionControl::GetState", e))?;
        match state {
            s if s == AudioSessionStateActive => Ok(SessionState::Active),
            s if s == AudioSessionStateInactive => Ok(SessionState::Inactive),
            s if s == AudioSessionStateExpired => Ok(SessionState::Expired),
            other => Err(BackendError::call(
                "IAudioSessionControl::GetState",
                format!("unexpected state {}", other.0),
            )),
        }
    }

    fn display_name(&self) -> BackendResult<String> {
        let name = unsafe { self.control.GetDisplayName() }
            .map_err(|e| BackendError::call("IAudioSessionControl::GetDisplayName", e))?;
        Ok(CoTaskString(name).to_string_lossy())
    }
}
