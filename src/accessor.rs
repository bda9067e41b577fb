//! Volume and mute access for sessions and the endpoint.
//!
//! Percentages are the external unit, scalars in [0.0, 1.0] the internal
//! one. Writes are fire-and-confirm: a write succeeds when the platform call
//! does, and nothing is read back.

use tracing::debug;

use crate::backend::VolumeControl;
use crate::constants::MAX_PERCENT;

pub fn percent_to_scalar(percent: u8) -> f32 {
    f32::from(percent.min(MAX_PERCENT)) / 100.0
}

pub fn scalar_to_percent(level: f32) -> u8 {
    if level.is_nan() {
        return 0;
    }
    (level.clamp(0.0, 1.0) * 100.0).round() as u8
}

pub fn read_volume<C: VolumeControl + ?Sized>(control: &C) -> Option<u8> {
    match control.volume() {
        Ok(level) => Some(scalar_to_percent(level)),
        Err(e) => {
            debug!(error = %e, "volume read failed");
            None
        }
    }
}

pub fn write_volume<C: VolumeControl + ?Sized>(control: &C, percent: u8) -> bool {
    match control.set_volume(percent_to_scalar(percent)) {
        Ok(()) => true,
        Err(e) => {
            debug!(percent, error = %e, "volume write failed");
            false
        }
    }
}

pub fn read_mute<C: VolumeControl + ?Sized>(control: &C) -> Option<bool> {
    match control.is_muted() {
        Ok(muted) => Some(muted),
        Err(e) => {
            debug!(error = %e, "mute read failed");
            None
        }
    }
}

pub fn write_mute<C: VolumeControl + ?Sized>(control: &C, muted: bool) -> bool {
    match control.set_muted(muted) {
        Ok(()) => true,
        Err(e) => {
            debug!(muted, error = %e, "mute write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_rounds_to_nearest_percent() {
        assert_eq!(scalar_to_percent(0.0), 0);
        assert_eq!(scalar_to_percent(0.494), 49);
        assert_eq!(scalar_to_percent(0.496), 50);
        assert_eq!(scalar_to_percent(1.0), 100);
        assert_eq!(scalar_to_percent(1.7), 100);
        assert_eq!(scalar_to_percent(-0.2), 0);
        assert_eq!(scalar_to_percent(f32::NAN), 0);
    }

    #[test]
    fn every_percent_survives_the_scalar_trip() {
        for percent in 0..=100u8 {
            assert_eq!(scalar_to_percent(percent_to_scalar(percent)), percent);
        }
    }

    #[test]
    fn percent_above_range_is_capped() {
        assert_eq!(percent_to_scalar(250), 1.0);
    }
}
