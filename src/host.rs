//! Untyped call surface for a host runtime.
//!
//! Arguments arrive as JSON values. They are validated before the controller
//! is touched, and a wrong shape is the one failure a caller ever sees; every
//! platform problem has already been turned into a plain result by then.

use std::io::{BufRead, Write};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::AudioBackend;
use crate::constants::{MAX_PERCENT, MIN_PERCENT, SYSTEM_VOLUME_UNAVAILABLE};
use crate::controller::AudioController;
use crate::error::HostError;

const NAME_AND_VOLUME: &str = "Expected (processName: string, volume: number)";
const NAME_AND_MUTE: &str = "Expected (processName: string, mute: boolean)";
const NAME_ONLY: &str = "Expected (processName: string)";
const VOLUME_ONLY: &str = "Expected (volume: number)";
const MUTE_ONLY: &str = "Expected (mute: boolean)";

fn string_arg<'a>(args: &'a [Value], index: usize, expected: &str) -> Result<&'a str, HostError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| HostError::InvalidArgument(expected.to_string()))
}

fn bool_arg(args: &[Value], index: usize, expected: &str) -> Result<bool, HostError> {
    args.get(index)
        .and_then(Value::as_bool)
        .ok_or_else(|| HostError::InvalidArgument(expected.to_string()))
}

/// Any JSON number, rounded and clamped into a percentage.
fn percent_arg(args: &[Value], index: usize, expected: &str) -> Result<u8, HostError> {
    let number = args
        .get(index)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .ok_or_else(|| HostError::InvalidArgument(expected.to_string()))?;
    Ok(number
        .round()
        .clamp(f64::from(MIN_PERCENT), f64::from(MAX_PERCENT)) as u8)
}

/// Dispatches one call by method name.
pub fn invoke<B: AudioBackend>(
    controller: &AudioController<B>,
    method: &str,
    args: &[Value],
) -> Result<Value, HostError> {
    debug!(method, args = args.len(), "host call");
    let result = match method {
        "getAudioSessions" | "listSessions" => json!(controller.list_sessions()),
        "setApplicationVolume" => {
            let name = string_arg(args, 0, NAME_AND_VOLUME)?;
            let percent = percent_arg(args, 1, NAME_AND_VOLUME)?;
            json!(controller.set_application_volume(name, percent))
        }
        "getApplicationVolume" => {
            let name = string_arg(args, 0, NAME_ONLY)?;
            json!(controller.get_application_volume(name))
        }
        "muteApplication" => {
            let name = string_arg(args, 0, NAME_AND_MUTE)?;
            let mute = bool_arg(args, 1, NAME_AND_MUTE)?;
            json!(controller.mute_application(name, mute))
        }
        "getApplicationMute" => {
            let name = string_arg(args, 0, NAME_ONLY)?;
            json!(controller.get_application_mute(name))
        }
        "toggleApplicationMute" => {
            let name = string_arg(args, 0, NAME_ONLY)?;
            json!(controller.toggle_application_mute(name))
        }
        "getSystemVolume" => match controller.get_system_volume() {
            Some(percent) => json!(percent),
            None => json!(SYSTEM_VOLUME_UNAVAILABLE),
        },
        "setSystemVolume" => {
            let percent = percent_arg(args, 0, VOLUME_ONLY)?;
            json!(controller.set_system_volume(percent))
        }
        "getSystemMute" => json!(controller.get_system_mute()),
        "setSystemMute" => {
            let mute = bool_arg(args, 0, MUTE_ONLY)?;
            json!(controller.set_system_mute(mute))
        }
        "getStatus" => json!(controller.status()),
        other => return Err(HostError::UnknownMethod(other.to_string())),
    };
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    args: Vec<Value>,
}

/// Serves JSON-line requests from `input` until it is exhausted, one at a
/// time. Each request gets exactly one response line on `output`.
pub fn serve<B, R, W>(controller: &AudioController<B>, input: R, mut output: W) -> std::io::Result<usize>
where
    B: AudioBackend,
    R: BufRead,
    W: Write,
{
    let mut served = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match invoke(controller, &request.method, &request.args) {
                Ok(result) => json!({ "id": request.id, "result": result }),
                Err(e) => json!({ "id": request.id, "error": e.to_string() }),
            },
            Err(e) => {
                warn!(error = %e, "malformed request");
                json!({ "id": Value::Null, "error": format!("malformed request: {e}") })
            }
        };

        writeln!(output, "{response}")?;
        output.flush()?;
        served += 1;
    }
    Ok(served)
}
