//! Static configuration applied when the device is initialized.

use crate::{
    codec::Resolution,
    zone::{DEFAULT_THRESHOLD_HIGH, DEFAULT_THRESHOLD_LOW, DetectionMode, InterruptType, Thresholds},
};

/// Default 7-bit bus address (CAD0 = CAD1 = 0)
pub const DEFAULT_ADDRESS: u8 = 0x0C;

/// Shortest sampling interval accepted by the polling worker (ms)
pub const DELAY_MIN_MS: u32 = 20;

/// Longest sampling interval, also the interval after reset (ms)
pub const DELAY_MAX_MS: u32 = 200;

/// Settle time between entering measurement and the first interrupt-mode read (ms)
pub const READY_DELAY_MS: u32 = 10;

/// Measurement frequency (OPF bits 6..4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Frequency {
    Hz20 = 0,
    #[default]
    Hz10 = 1,
    Hz6_7 = 2,
    Hz5 = 3,
    Hz80 = 4,
    Hz40 = 5,
    Hz26_7 = 6,
}

impl Frequency {
    /// Field value for OPF
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Conversion period rounded up to whole milliseconds
    #[must_use]
    pub const fn period_ms(self) -> u32 {
        match self {
            Frequency::Hz20 => 50,
            Frequency::Hz10 => 100,
            Frequency::Hz6_7 => 150,
            Frequency::Hz5 => 200,
            Frequency::Hz80 => 13,
            Frequency::Hz40 => 25,
            Frequency::Hz26_7 => 38,
        }
    }
}

/// Field strength of one sample unit (INTSRS bits 2..0)
///
/// Names give the 10-bit step; 8-bit samples are four times coarser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Sensitivity {
    Mt0_068 = 0,
    Mt0_034 = 1,
    #[default]
    Mt0_017 = 2,
    Mt0_009 = 3,
    Mt0_004 = 4,
}

impl Sensitivity {
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Device configuration
///
/// ```
/// use mxm1120::{Config, DetectionMode};
///
/// let config = Config::new()
///     .with_detection(DetectionMode::Polling)
///     .with_delay_ms(50);
/// assert_eq!(config.delay_ms, 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// 7-bit bus address
    pub address: u8,
    pub detection: DetectionMode,
    /// Comparator type programmed at reset
    pub interrupt_type: InterruptType,
    pub sensitivity: Sensitivity,
    /// Consecutive out-of-band samples before the comparator fires (0..=15)
    pub persistence: u8,
    pub frequency: Frequency,
    pub resolution: Resolution,
    /// Band loaded on every reset
    pub thresholds: Thresholds,
    /// Polling interval after reset (ms)
    pub delay_ms: u32,
    /// Publish raw samples instead of zones
    pub raw_passthrough: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            detection: DetectionMode::Interrupt,
            interrupt_type: InterruptType::Beside,
            sensitivity: Sensitivity::Mt0_017,
            persistence: 4,
            frequency: Frequency::Hz10,
            resolution: Resolution::Bits10,
            thresholds: Thresholds::new(DEFAULT_THRESHOLD_HIGH, DEFAULT_THRESHOLD_LOW),
            delay_ms: DELAY_MAX_MS,
            raw_passthrough: false,
        }
    }

    #[must_use]
    pub const fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    #[must_use]
    pub const fn with_detection(mut self, detection: DetectionMode) -> Self {
        self.detection = detection;
        self
    }

    #[must_use]
    pub const fn with_interrupt_type(mut self, interrupt_type: InterruptType) -> Self {
        self.interrupt_type = interrupt_type;
        self
    }

    #[must_use]
    pub const fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    #[must_use]
    pub const fn with_persistence(mut self, persistence: u8) -> Self {
        self.persistence = persistence & 0x0F;
        self
    }

    #[must_use]
    pub const fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub const fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    #[must_use]
    pub const fn with_thresholds(mut self, high: i16, low: i16) -> Self {
        self.thresholds = Thresholds::new(high, low);
        self
    }

    #[must_use]
    pub const fn with_delay_ms(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub const fn with_raw_passthrough(mut self, raw: bool) -> Self {
        self.raw_passthrough = raw;
        self
    }
}

/// Clamp a requested polling interval to `DELAY_MIN_MS..=DELAY_MAX_MS`
#[must_use]
pub const fn clamp_delay(ms: u32) -> u32 {
    if ms < DELAY_MIN_MS {
        DELAY_MIN_MS
    } else if ms > DELAY_MAX_MS {
        DELAY_MAX_MS
    } else {
        ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_supported_range() {
        assert_eq!(clamp_delay(0), DELAY_MIN_MS);
        assert_eq!(clamp_delay(DELAY_MIN_MS - 1), DELAY_MIN_MS);
        assert_eq!(clamp_delay(75), 75);
        assert_eq!(clamp_delay(DELAY_MAX_MS), DELAY_MAX_MS);
        assert_eq!(clamp_delay(DELAY_MAX_MS + 1), DELAY_MAX_MS);
        assert_eq!(clamp_delay(u32::MAX), DELAY_MAX_MS);
    }

    #[test]
    fn defaults_match_reset_configuration() {
        let config = Config::default();
        assert_eq!(config.address, 0x0C);
        assert_eq!(config.detection, DetectionMode::Interrupt);
        assert_eq!(config.thresholds, Thresholds::new(150, -180));
        assert_eq!(config.delay_ms, DELAY_MAX_MS);
        assert!(!config.raw_passthrough);
    }

    #[test]
    fn persistence_is_four_bits() {
        assert_eq!(Config::new().with_persistence(0x1F).persistence, 0x0F);
    }
}
