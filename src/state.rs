//! Volatile per-device state kept next to the register shadow.

use crate::{
    config::{Config, DELAY_MAX_MS, clamp_delay},
    zone::{Thresholds, Zone},
};

/// Polarity assumed until a calibration pass says otherwise
pub const DEFAULT_POLARITY: i32 = -1;

/// Host-side state of one attached sensor
///
/// The register shadows live in the transport; everything else the engine
/// needs between samples is here. Reset by [`Mxm1120::init`](crate::Mxm1120::init).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorState {
    pub enabled: bool,
    /// Polling interval (ms), within [`DELAY_MIN_MS`](crate::DELAY_MIN_MS)..=[`DELAY_MAX_MS`]
    pub delay_ms: u32,
    pub debug: bool,
    pub last_zone: Zone,
    pub thresholds: Thresholds,
    /// Mean of the last calibration run, 0 before the first one
    pub calibrated_reference: i16,
    pub polarity: i32,
    /// The 180° pass completed
    pub calibration_high_done: bool,
    /// The 0° pass completed
    pub calibration_low_done: bool,
    pub irq_attached: bool,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: DELAY_MAX_MS,
            debug: false,
            last_zone: Zone::B,
            thresholds: Thresholds::default(),
            calibrated_reference: 0,
            polarity: DEFAULT_POLARITY,
            calibration_high_done: false,
            calibration_low_done: false,
            irq_attached: false,
        }
    }
}

impl SensorState {
    /// Defaults with the configured band and interval
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            delay_ms: clamp_delay(config.delay_ms),
            thresholds: config.thresholds,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn calibration_complete(&self) -> bool {
        self.calibration_high_done && self.calibration_low_done
    }
}
