//! Field calibration: learn a reference sample at a known magnet position.

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::{
    config::Frequency,
    driver::{Mxm1120, OperatingMode},
    error::Error,
    platform::InterruptLine,
    register::{OperationRegister, Register},
    zone::Direction,
};

/// Samples averaged per run
pub const CALIBRATION_SAMPLES: usize = 10;

/// Spacing between samples: one 40 Hz conversion plus margin (ms)
pub const SAMPLE_INTERVAL_MS: u32 = Frequency::Hz40.period_ms() + 5;

/// Pause after powering down before switching to the calibration rate (ms)
pub const POWER_DOWN_SETTLE_MS: u32 = 10;

/// Pause after powering down before restoring the previous rate (ms)
pub const RESTORE_SETTLE_MS: u32 = 1;

/// Distance between the learned reference and the derived threshold
pub const CALIBRATION_TOLERANCE: i16 = 12;

/// Physical position the magnet is held at for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CalibrationPass {
    /// 180° (zone C), run first
    Far = 1,
    /// 0° (zone A), run second
    Near = 2,
}

impl TryFrom<u8> for CalibrationPass {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, u8> {
        match id {
            1 => Ok(CalibrationPass::Far),
            2 => Ok(CalibrationPass::Near),
            other => Err(other),
        }
    }
}

/// Truncating mean of `samples`, 0 for an empty slice
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn average(samples: &[i16]) -> i16 {
    if samples.is_empty() {
        return 0;
    }
    let sum: i32 = samples.iter().copied().map(i32::from).sum();
    (sum / samples.len() as i32) as i16
}

impl<I2C, D, IRQ, E> Mxm1120<I2C, D, IRQ>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
    IRQ: InterruptLine,
{
    /// Average [`CALIBRATION_SAMPLES`] readings taken at 40 Hz
    ///
    /// The interrupt line is released and detection forced to polling for
    /// the duration. The previous INTSRS value, interrupt line and OPF
    /// frequency/resolution are restored afterwards even when sampling
    /// fails, and the sensor returns to power-down unless it is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Calibration`] if any sample could not be read, or the
    /// first error hit while reconfiguring or restoring
    pub fn calibrate(&mut self) -> Result<i16, Error<E>> {
        let was_attached = self.state.irq_attached;
        self.detach_irq();

        let saved_intsrs = self.registers().intsrs;
        let saved_opf = self.registers().operation();

        let sampled = self
            .enter_calibration()
            .and_then(|()| self.collect_samples());

        let restored = self.leave_calibration(saved_intsrs, saved_opf, was_attached);

        let reference = sampled?;
        restored?;

        self.state.calibrated_reference = reference;

        #[cfg(feature = "defmt")]
        defmt::info!("calibrated reference {}", reference);

        Ok(reference)
    }

    fn enter_calibration(&mut self) -> Result<(), Error<E>> {
        let mut intsrs = self.registers().interrupt_source();
        intsrs.set_int_on(false);
        intsrs.set_srs(self.config.sensitivity.bits());
        self.transport.write_register(Register::IntSrs, intsrs.0)?;

        let mut opf = self.registers().operation();
        opf.set_hsson(false);
        self.transport.write_register(Register::Opf, opf.0)?;
        self.transport.delay_ms(POWER_DOWN_SETTLE_MS);

        opf.set_efrd(false);
        opf.set_hsson(true);
        opf.set_freq(Frequency::Hz40.bits());
        self.transport.write_register(Register::Opf, opf.0)?;
        self.transport.delay_ms(SAMPLE_INTERVAL_MS);

        Ok(())
    }

    fn collect_samples(&mut self) -> Result<i16, Error<E>> {
        let mut samples = [0i16; CALIBRATION_SAMPLES];

        for (_index, slot) in samples.iter_mut().enumerate() {
            self.transport.delay_ms(SAMPLE_INTERVAL_MS);
            *slot = self.measure().map_err(|_e| {
                #[cfg(feature = "defmt")]
                defmt::warn!("calibration sample {} failed", _index);
                Error::Calibration
            })?;

            #[cfg(feature = "defmt")]
            defmt::debug!("calibration sample {} = {}", _index, *slot);
        }

        Ok(average(&samples))
    }

    fn leave_calibration(
        &mut self,
        intsrs: u8,
        previous: OperationRegister,
        reattach: bool,
    ) -> Result<(), Error<E>> {
        let mut first_error = self.transport.write_register(Register::IntSrs, intsrs).err();

        if reattach {
            if let Err(e) = self.attach_irq() {
                first_error.get_or_insert(e);
            }
        }

        let mut opf = self.registers().operation();
        opf.set_hsson(false);
        if let Err(e) = self.transport.write_register(Register::Opf, opf.0) {
            first_error.get_or_insert(e);
        }
        self.transport.delay_ms(RESTORE_SETTLE_MS);

        opf.set_efrd(false);
        opf.set_hsson(true);
        opf.set_freq(previous.freq());
        opf.set_bit8(previous.bit8());
        if let Err(e) = self.transport.write_register(Register::Opf, opf.0) {
            first_error.get_or_insert(e);
        }

        if !self.state.enabled {
            if let Err(e) = self.set_mode(OperatingMode::PowerDown) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Run one calibration pass and derive the matching threshold
    ///
    /// The far pass forces negative polarity when the reference is negative.
    /// With rising direction the far pass sets `high = reference - 12` and
    /// the near pass `low = reference + 12`; falling direction swaps which
    /// bound each pass moves.
    ///
    /// # Errors
    ///
    /// See [`Self::calibrate`]; thresholds and flags are untouched on error
    pub fn run_calibration_pass(&mut self, pass: CalibrationPass) -> Result<i16, Error<E>> {
        let reference = self.calibrate()?;

        if pass == CalibrationPass::Far && reference < 0 {
            self.state.polarity = -1;
        }

        let direction = Direction::from_polarity(self.state.polarity);
        let thresholds = &mut self.state.thresholds;
        match (pass, direction) {
            (CalibrationPass::Far, Direction::Rising) | (CalibrationPass::Near, Direction::Falling) => {
                thresholds.high = reference.saturating_sub(CALIBRATION_TOLERANCE);
            }
            (CalibrationPass::Far, Direction::Falling) | (CalibrationPass::Near, Direction::Rising) => {
                thresholds.low = reference.saturating_add(CALIBRATION_TOLERANCE);
            }
        }

        match pass {
            CalibrationPass::Far => self.state.calibration_high_done = true,
            CalibrationPass::Near => self.state.calibration_low_done = true,
        }

        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_with_truncation() {
        assert_eq!(average(&[10, 12, 11, 9, 13, 10, 11, 12, 10, 12]), 11);
        assert_eq!(average(&[1, 2]), 1);
        assert_eq!(average(&[-1, -2]), -1);
    }

    #[test]
    fn averages_without_overflow() {
        assert_eq!(average(&[511; CALIBRATION_SAMPLES]), 511);
        assert_eq!(average(&[-512; CALIBRATION_SAMPLES]), -512);
    }

    #[test]
    fn samples_are_spaced_past_one_conversion() {
        assert_eq!(SAMPLE_INTERVAL_MS, 30);
        assert!(SAMPLE_INTERVAL_MS > Frequency::Hz40.period_ms());
    }

    #[test]
    fn empty_average_is_zero() {
        assert_eq!(average(&[]), 0);
    }

    #[test]
    fn pass_ids_map_to_positions() {
        assert_eq!(CalibrationPass::try_from(1), Ok(CalibrationPass::Far));
        assert_eq!(CalibrationPass::try_from(2), Ok(CalibrationPass::Near));
        assert_eq!(CalibrationPass::try_from(3), Err(3));
    }
}
