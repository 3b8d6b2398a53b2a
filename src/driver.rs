//! Blocking driver for the MXM1120 hall-effect switch

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::{
    codec::{self, Resolution},
    config::{Config, clamp_delay},
    error::Error,
    platform::InterruptLine,
    register::{
        DEVICE_ID, InterruptSourceRegister, OperationRegister, PersistenceRegister, Register,
        RegisterMap, SOFT_RESET, Status1Register,
    },
    state::SensorState,
    transport::Transport,
    zone::{DetectionMode, InterruptType, Thresholds, Zone},
};

/// Operating mode encoded in OPF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    PowerDown,
    Measurement,
    FuseRomAccess,
}

/// Outcome of a diagnostic register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterAccess {
    pub address: u8,
    pub value: u8,
    pub ok: bool,
}

impl RegisterAccess {
    /// `0x00vv` on success, `0xFF00` (value bits kept) on failure
    #[must_use]
    pub fn packed(&self) -> u16 {
        let status = if self.ok { 0x0000 } else { 0xFF00 };
        status | u16::from(self.value)
    }
}

/// MXM1120 driver instance
#[derive(Debug)]
pub struct Mxm1120<I2C, D, IRQ> {
    pub(crate) transport: Transport<I2C, D>,
    pub(crate) irq: IRQ,
    pub(crate) config: Config,
    pub(crate) state: SensorState,
}

impl<I2C, D, IRQ, E> Mxm1120<I2C, D, IRQ>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
    IRQ: InterruptLine,
{
    /// Create a new driver instance; the bus is not touched until [`Self::init`]
    pub fn new(i2c: I2C, delay: D, irq: IRQ, config: Config) -> Self {
        Self {
            transport: Transport::new(i2c, delay, config.address),
            irq,
            state: SensorState::from_config(&config),
            config,
        }
    }

    /// Release the bus, delay and interrupt line, consuming the driver
    pub fn release(self) -> (I2C, D, IRQ) {
        let (i2c, delay) = self.transport.release();
        (i2c, delay, self.irq)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &SensorState {
        &self.state
    }

    /// Shadow copy of the writable registers
    pub fn registers(&self) -> &RegisterMap {
        self.transport.map()
    }

    /// Reset volatile state and bring the device into a known configuration
    ///
    /// Leaves the sensor in [`OperatingMode::PowerDown`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityMismatch`] if the part does not answer with
    /// the MXM1120 id, or any bus error on the way
    pub fn init(&mut self) -> Result<(), Error<E>> {
        if self.state.irq_attached {
            self.irq.release();
        }
        self.state = SensorState::from_config(&self.config);

        self.reset_device()?;

        #[cfg(feature = "defmt")]
        defmt::info!("MXM1120 initialized");

        Ok(())
    }

    fn reset_device(&mut self) -> Result<(), Error<E>> {
        self.transport.write_register(Register::Srst, SOFT_RESET)?;

        let id = self.transport.read_register(Register::Did)?;
        if id != DEVICE_ID {
            #[cfg(feature = "defmt")]
            defmt::error!("device id 0x{:02X} is not 0x{:02X}", id, DEVICE_ID);
            return Err(Error::IdentityMismatch(id));
        }

        let mut persint = PersistenceRegister(0);
        persint.set_count(self.config.persistence);
        self.transport.write_register(Register::PersInt, persint.0)?;

        let interrupt = self.config.detection.is_interrupt();
        let mut intsrs = InterruptSourceRegister(0);
        intsrs.set_int_on(interrupt);
        intsrs.set_srs(self.config.sensitivity.bits());
        if interrupt {
            intsrs.set_within(self.config.interrupt_type == InterruptType::Within);
        }
        self.transport.write_register(Register::IntSrs, intsrs.0)?;

        let mut opf = OperationRegister(0);
        opf.set_freq(self.config.frequency.bits());
        opf.set_bit8(self.config.resolution == Resolution::Bits8);
        self.transport.write_register(Register::Opf, opf.0)?;

        self.set_detection_mode(self.config.detection)?;
        self.set_mode(OperatingMode::PowerDown)
    }

    /// Read the id register and compare it with the expected MXM1120 id
    ///
    /// # Errors
    ///
    /// Returns an error if I2C communication fails
    pub fn identify(&mut self) -> Result<bool, Error<E>> {
        let id = self.transport.read_register(Register::Did)?;
        Ok(id == DEVICE_ID)
    }

    /// Operating mode currently programmed
    pub fn mode(&self) -> OperatingMode {
        let opf = self.registers().operation();
        match (opf.hsson(), opf.efrd()) {
            (false, _) => OperatingMode::PowerDown,
            (true, true) => OperatingMode::FuseRomAccess,
            (true, false) => OperatingMode::Measurement,
        }
    }

    pub fn detection_mode(&self) -> DetectionMode {
        if self.registers().interrupt_source().int_on() {
            DetectionMode::Interrupt
        } else {
            DetectionMode::Polling
        }
    }

    pub fn interrupt_type(&self) -> InterruptType {
        if self.registers().interrupt_source().within() {
            InterruptType::Within
        } else {
            InterruptType::Beside
        }
    }

    /// Resolution currently programmed in OPF
    pub fn resolution(&self) -> Resolution {
        Resolution::from_operation(self.registers().operation())
    }

    /// Switch the operating mode
    ///
    /// Entering measurement with interrupt detection requests the interrupt
    /// line first; power-down releases it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterruptAttach`] if the line is refused, in which
    /// case the device is left in its previous mode
    pub fn set_mode(&mut self, mode: OperatingMode) -> Result<(), Error<E>> {
        let mut opf = self.registers().operation();

        match mode {
            OperatingMode::PowerDown => {
                self.detach_irq();
                opf.set_hsson(false);
                self.transport.write_register(Register::Opf, opf.0)?;
            }
            OperatingMode::Measurement => {
                opf.set_efrd(false);
                opf.set_hsson(true);

                let attached = if self.detection_mode().is_interrupt() && !self.state.irq_attached {
                    self.attach_irq()?;
                    true
                } else {
                    false
                };

                if let Err(e) = self.transport.write_register(Register::Opf, opf.0) {
                    if attached {
                        self.detach_irq();
                    }
                    return Err(e);
                }
            }
            OperatingMode::FuseRomAccess => {
                opf.set_efrd(true);
                opf.set_hsson(true);
                self.transport.write_register(Register::Opf, opf.0)?;
            }
        }

        #[cfg(feature = "defmt")]
        defmt::info!("operation mode changed to {}", mode);

        Ok(())
    }

    pub(crate) fn attach_irq(&mut self) -> Result<(), Error<E>> {
        self.irq.request().map_err(|_| {
            #[cfg(feature = "defmt")]
            defmt::error!("interrupt line request failed");
            Error::InterruptAttach
        })?;
        self.state.irq_attached = true;
        Ok(())
    }

    pub(crate) fn detach_irq(&mut self) {
        if self.state.irq_attached {
            self.irq.release();
            self.state.irq_attached = false;
        }
    }

    /// Select polling or interrupt delivery
    ///
    /// Before interrupt detection is switched on, the comparator is armed
    /// around `last_zone` so the first interrupt fires at the next boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if I2C communication fails
    pub fn set_detection_mode(&mut self, mode: DetectionMode) -> Result<(), Error<E>> {
        let mut intsrs = self.registers().interrupt_source();

        match mode {
            DetectionMode::Interrupt => {
                let kind = InterruptType::after(self.state.last_zone);
                self.program_thresholds(kind)?;
                intsrs.set_int_on(true);
                intsrs.set_within(kind == InterruptType::Within);
            }
            DetectionMode::Polling => intsrs.set_int_on(false),
        }

        self.transport.write_register(Register::IntSrs, intsrs.0)
    }

    /// Write the comparator type bit
    ///
    /// # Errors
    ///
    /// Returns an error if I2C communication fails
    pub fn set_interrupt_type(&mut self, kind: InterruptType) -> Result<(), Error<E>> {
        let mut intsrs = self.registers().interrupt_source();
        intsrs.set_within(kind == InterruptType::Within);
        self.transport.write_register(Register::IntSrs, intsrs.0)
    }

    /// Reprogram the comparator around the current band
    ///
    /// Does nothing unless interrupt detection is active.
    ///
    /// # Errors
    ///
    /// Returns an error if I2C communication fails
    pub fn update_interrupt_thresholds(&mut self) -> Result<(), Error<E>> {
        if !self.detection_mode().is_interrupt() {
            return Ok(());
        }
        self.program_thresholds(self.interrupt_type())
    }

    fn program_thresholds(&mut self, kind: InterruptType) -> Result<(), Error<E>> {
        let resolution = self.resolution();
        let (high, low) = self.state.thresholds.comparator_bounds(kind);
        let (hthh, hthl) = codec::encode(resolution, high);
        let (lthh, lthl) = codec::encode(resolution, low);

        self.transport.write_register(Register::HthH, hthh)?;
        self.transport.write_register(Register::HthL, hthl)?;
        self.transport.write_register(Register::LthH, lthh)?;
        self.transport.write_register(Register::LthL, lthl)?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "comparator {} high={} low={}",
            kind,
            high,
            low
        );

        self.clear_interrupt()
    }

    /// Release the pending interrupt latch
    ///
    /// # Errors
    ///
    /// Returns an error if I2C communication fails
    pub fn clear_interrupt(&mut self) -> Result<(), Error<E>> {
        let mut persint = self.registers().persistence();
        persint.set_intclr(true);
        self.transport.write_register(Register::PersInt, persint.0)
    }

    /// Re-arm the comparator for the transition out of `last_zone`
    pub(crate) fn rearm(&mut self) -> Result<(), Error<E>> {
        self.set_interrupt_type(InterruptType::after(self.state.last_zone))?;
        self.update_interrupt_thresholds()
    }

    /// Read one sample
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if the status byte does not announce a
    /// fresh sample for the current detection mode
    pub fn measure(&mut self) -> Result<i16, Error<E>> {
        let interrupt = self.detection_mode().is_interrupt();
        self.read_sample(interrupt)
    }

    /// Read one sample, gated on the data-ready flag regardless of detection
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if DRDY is clear
    pub fn measure_ready(&mut self) -> Result<i16, Error<E>> {
        self.read_sample(false)
    }

    fn read_sample(&mut self, interrupt: bool) -> Result<i16, Error<E>> {
        let mut buf = [0u8; 3];
        self.transport.read(Register::St1.into(), &mut buf)?;

        if !Status1Register(buf[0]).is_ready(interrupt) {
            #[cfg(feature = "defmt")]
            defmt::warn!("st1 0x{:02X} is not ready", buf[0]);
            return Err(Error::NotReady(buf[0]));
        }

        let raw = codec::decode(self.resolution(), buf[2], buf[1]);

        if self.state.debug {
            #[cfg(feature = "defmt")]
            defmt::info!("raw data {}", raw);
        }

        Ok(raw)
    }

    /// Classify `raw` with the current band and polarity
    pub fn classify(&self, raw: i16) -> Zone {
        let zone = crate::zone::classify(raw, self.state.thresholds, self.state.polarity);

        #[cfg(feature = "defmt")]
        defmt::debug!("raw {} classified as {}", raw, zone);

        zone
    }

    pub fn thresholds(&self) -> Thresholds {
        self.state.thresholds
    }

    /// Replace the band; inverted bounds are accepted as is
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.state.thresholds = thresholds;
    }

    pub fn set_threshold_high(&mut self, high: i16) {
        self.state.thresholds.high = high;
    }

    pub fn set_threshold_low(&mut self, low: i16) {
        self.state.thresholds.low = low;
    }

    pub fn polarity(&self) -> i32 {
        self.state.polarity
    }

    pub fn set_polarity(&mut self, polarity: i32) {
        self.state.polarity = polarity;
    }

    pub fn calibrated_reference(&self) -> i16 {
        self.state.calibrated_reference
    }

    pub fn debug(&self) -> bool {
        self.state.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.state.debug = debug;
    }

    pub fn delay_ms(&self) -> u32 {
        self.state.delay_ms
    }

    /// Store a polling interval clamped to the supported range
    pub fn set_delay_ms(&mut self, ms: u32) -> u32 {
        self.state.delay_ms = clamp_delay(ms);
        self.state.delay_ms
    }

    /// Diagnostic register read
    pub fn get_register(&mut self, address: u8) -> RegisterAccess {
        let mut value = [0u8];
        let ok = self.transport.read(address, &mut value).is_ok();
        RegisterAccess {
            address,
            value: value[0],
            ok,
        }
    }

    /// Diagnostic register write; mirrored registers update their shadow
    pub fn set_register(&mut self, address: u8, value: u8) -> RegisterAccess {
        let ok = self.transport.write(address, &[value]).is_ok();
        RegisterAccess { address, value, ok }
    }
}
