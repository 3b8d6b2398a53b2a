//! Three-zone position classification and comparator hysteresis.

/// Margin applied to the thresholds when programming the device comparator
pub const HYSTERESIS_MARGIN: i16 = 15;

/// Default upper bound of the transition band
pub const DEFAULT_THRESHOLD_HIGH: i16 = 150;

/// Default lower bound of the transition band
pub const DEFAULT_THRESHOLD_LOW: i16 = -180;

/// Discrete position reported to the event sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Zone {
    /// Near 0°
    A = 0x01,
    /// Between the mechanical limits
    B = 0x02,
    /// Near 180°
    C = 0x03,
}

impl From<Zone> for u8 {
    fn from(zone: Zone) -> u8 {
        zone as u8
    }
}

/// Which way the raw value moves as the magnet approaches zone C
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Raw value grows towards C (positive polarity)
    Rising,
    /// Raw value shrinks towards C (zero or negative polarity)
    Falling,
}

impl Direction {
    #[must_use]
    pub const fn from_polarity(polarity: i32) -> Self {
        if polarity > 0 {
            Direction::Rising
        } else {
            Direction::Falling
        }
    }
}

/// Bounds of the "beside" transition band, in sample units
///
/// `low <= high` is expected but not enforced. Inverted bounds never
/// classify as [`Zone::B`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Thresholds {
    pub high: i16,
    pub low: i16,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_THRESHOLD_HIGH,
            low: DEFAULT_THRESHOLD_LOW,
        }
    }
}

impl Thresholds {
    #[must_use]
    pub const fn new(high: i16, low: i16) -> Self {
        Self { high, low }
    }

    /// Classify a raw sample
    #[must_use]
    pub fn classify(&self, raw: i16, direction: Direction) -> Zone {
        let (towards_c, towards_a) = match direction {
            Direction::Rising => (raw >= self.high, raw <= self.low),
            Direction::Falling => (raw <= self.low, raw >= self.high),
        };

        if towards_c {
            Zone::C
        } else if towards_a {
            Zone::A
        } else {
            Zone::B
        }
    }

    /// Comparator bounds `(high, low)` for the given interrupt type
    ///
    /// "Within" tightens the band by [`HYSTERESIS_MARGIN`], "beside" widens
    /// it, so the sample has to travel past the boundary before the next
    /// interrupt fires
    #[must_use]
    pub fn comparator_bounds(&self, kind: InterruptType) -> (i16, i16) {
        match kind {
            InterruptType::Within => (
                self.high.saturating_sub(HYSTERESIS_MARGIN),
                self.low.saturating_add(HYSTERESIS_MARGIN),
            ),
            InterruptType::Beside => (
                self.high.saturating_add(HYSTERESIS_MARGIN),
                self.low.saturating_sub(HYSTERESIS_MARGIN),
            ),
        }
    }
}

/// Classify `raw` against `thresholds` with the given polarity
#[must_use]
pub fn classify(raw: i16, thresholds: Thresholds, polarity: i32) -> Zone {
    thresholds.classify(raw, Direction::from_polarity(polarity))
}

/// Detection mode of the device comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectionMode {
    /// Host reads samples on a timer
    Polling,
    /// Device pulls INTB low when the comparator trips
    #[default]
    Interrupt,
}

impl DetectionMode {
    #[must_use]
    pub const fn is_interrupt(self) -> bool {
        matches!(self, DetectionMode::Interrupt)
    }
}

/// Condition under which the device comparator fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptType {
    /// Fire when the sample leaves the band
    #[default]
    Beside,
    /// Fire when the sample re-enters the band
    Within,
}

impl InterruptType {
    /// Comparator type that detects the next transition out of `zone`
    #[must_use]
    pub const fn after(zone: Zone) -> Self {
        match zone {
            Zone::B => InterruptType::Beside,
            Zone::A | Zone::C => InterruptType::Within,
        }
    }
}
