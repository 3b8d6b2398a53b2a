//! Driver and control engine for the MagnaChip MXM1120 hall-effect switch.
//!
//! [`Mxm1120`] is the blocking register-level driver. [`Engine`] wraps it
//! behind an async lock, adds the sampling worker and turns samples into
//! [`Zone`] events for an [`EventSink`].

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

mod calibration;
mod codec;
mod config;
mod driver;
mod engine;
mod error;
mod platform;
mod register;
mod state;
mod transport;
mod zone;

pub use calibration::{
    CALIBRATION_SAMPLES, CALIBRATION_TOLERANCE, CalibrationPass, POWER_DOWN_SETTLE_MS,
    RESTORE_SETTLE_MS, SAMPLE_INTERVAL_MS, average,
};
pub use codec::{Resolution, decode, encode};
pub use config::{
    Config, DEFAULT_ADDRESS, DELAY_MAX_MS, DELAY_MIN_MS, Frequency, READY_DELAY_MS, Sensitivity,
    clamp_delay,
};
pub use driver::{Mxm1120, OperatingMode, RegisterAccess};
pub use engine::Engine;
pub use error::Error;
pub use platform::{AlwaysOn, Event, EventSink, InterruptLine, NoInterrupt, PowerControl};
pub use register::{
    DEVICE_ID, InterruptSourceRegister, OperationRegister, PersistenceRegister, Register,
    RegisterMap, SOFT_RESET, Status1Register,
};
pub use state::{DEFAULT_POLARITY, SensorState};
pub use transport::{BUFFER_SIZE, RESET_SETTLE_MS};
pub use zone::{
    DEFAULT_THRESHOLD_HIGH, DEFAULT_THRESHOLD_LOW, DetectionMode, Direction, HYSTERESIS_MARGIN,
    InterruptType, Thresholds, Zone, classify,
};
