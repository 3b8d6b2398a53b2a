//! Async control engine
//!
//! Serializes lifecycle operations behind one device lock and runs the
//! deferred sampling worker.
//!
//! ```text
//!  INTB ──▶ on_interrupt() ──┐
//!                            ▼
//!  enable/disable ──▶ Signal<Work> ──▶ run(timer) ──▶ measure ─▶ classify ─▶ EventSink
//!  set_delay                 ▲                │
//!                            └── reschedule ──┘ (polling only)
//! ```
//!
//! Every control call and every worker sample holds the same
//! [`Mutex`]; cancellation bumps an epoch under that lock, so once
//! [`Engine::disable`] returns no stale sample can be published.

use embassy_futures::select::{Either, select};
use embassy_sync::{blocking_mutex::raw::RawMutex, mutex::Mutex, signal::Signal};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use embedded_hal_async::delay::DelayNs as Timer;

use crate::{
    calibration::CalibrationPass,
    config::READY_DELAY_MS,
    driver::{Mxm1120, OperatingMode, RegisterAccess},
    error::Error,
    platform::{Event, EventSink, InterruptLine, PowerControl},
    register::Register,
    zone::{DetectionMode, Zone},
};

/// Next job for the worker; a newer request replaces a pending one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Work {
    Idle,
    Poll { epoch: u32, after_ms: u32 },
    Interrupt,
}

struct Inner<I2C, D, IRQ, P, S> {
    sensor: Mxm1120<I2C, D, IRQ>,
    power: P,
    sink: S,
    /// Bumped whenever pending polling work must be discarded
    epoch: u32,
}

impl<I2C, D, IRQ, P, S, E> Inner<I2C, D, IRQ, P, S>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
    IRQ: InterruptLine,
    S: EventSink,
{
    fn cancel(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn poll_after(&self) -> Work {
        Work::Poll {
            epoch: self.epoch,
            after_ms: self.sensor.state.delay_ms,
        }
    }

    fn report(&mut self, raw: i16) -> Zone {
        let zone = self.sensor.classify(raw);
        self.sensor.state.last_zone = zone;

        let event = if self.sensor.config.raw_passthrough {
            Event::Raw(raw)
        } else {
            Event::Zone(zone)
        };
        self.sink.publish(event);

        zone
    }

    fn seed(&mut self) {
        match self.sensor.measure_ready() {
            Ok(raw) => {
                let _zone = self.report(raw);
                #[cfg(feature = "defmt")]
                defmt::debug!("initial zone {}", _zone);
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("initial sample failed: {=str}", _e.label());
            }
        }
    }

    fn sample(&mut self) -> Work {
        let detection = self.sensor.detection_mode();

        match self.sensor.measure() {
            Ok(raw) => {
                self.report(raw);
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("sample skipped: {=str}", _e.label());
            }
        }

        match detection {
            DetectionMode::Interrupt => {
                if let Err(_e) = self.sensor.rearm() {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("comparator re-arm failed: {=str}", _e.label());
                }
                Work::Idle
            }
            DetectionMode::Polling => self.poll_after(),
        }
    }
}

/// Control engine for one MXM1120
///
/// `M` selects the raw mutex guarding the device; use a critical-section
/// mutex when [`Engine::on_interrupt`] is called from an interrupt handler.
pub struct Engine<M: RawMutex, I2C, D, IRQ, P, S> {
    inner: Mutex<M, Inner<I2C, D, IRQ, P, S>>,
    work: Signal<M, Work>,
}

impl<M, I2C, D, IRQ, P, S, E> Engine<M, I2C, D, IRQ, P, S>
where
    M: RawMutex,
    I2C: I2c<Error = E>,
    D: DelayNs,
    IRQ: InterruptLine,
    P: PowerControl,
    S: EventSink,
{
    /// Wrap an already initialized driver
    pub fn new(sensor: Mxm1120<I2C, D, IRQ>, power: P, sink: S) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sensor,
                power,
                sink,
                epoch: 0,
            }),
            work: Signal::new(),
        }
    }

    /// Power the sensor up, reset it and verify its identity
    ///
    /// # Errors
    ///
    /// Returns [`Error::Power`] if the supply cannot be enabled,
    /// [`Error::IdentityMismatch`] if another part answers, or any bus error
    /// hit during the reset sequence (the supply is switched off again)
    pub fn attach(mut sensor: Mxm1120<I2C, D, IRQ>, mut power: P, sink: S) -> Result<Self, Error<E>> {
        power.power_on().map_err(|_| Error::Power)?;

        if let Err(e) = sensor.init() {
            if power.power_off().is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("power off after failed init was refused");
            }
            return Err(e);
        }

        Ok(Self::new(sensor, power, sink))
    }

    /// Disable sampling and switch the supply off
    ///
    /// # Errors
    ///
    /// Returns the error of the power-down transition or [`Error::Power`]
    pub async fn shutdown(&self) -> Result<(), Error<E>> {
        self.disable().await?;
        let mut inner = self.inner.lock().await;
        inner.power.power_off().map_err(|_| Error::Power)
    }

    /// Take the parts back; the worker future must already be dropped
    pub fn release(self) -> (Mxm1120<I2C, D, IRQ>, P, S) {
        let inner = self.inner.into_inner();
        (inner.sensor, inner.power, inner.sink)
    }

    /// Interrupt handler hook: wake the worker without touching the bus
    pub fn on_interrupt(&self) {
        self.work.signal(Work::Interrupt);
    }

    /// Deferred worker; never returns
    ///
    /// Spawn exactly one per engine. `timer` paces polling; it is raced
    /// against new work so cancellation and rescheduling take effect at once.
    pub async fn run<T: Timer>(&self, mut timer: T) {
        let mut next = Work::Idle;
        loop {
            next = match next {
                Work::Idle => self.work.wait().await,
                Work::Poll { epoch, after_ms } => {
                    match select(timer.delay_ms(after_ms), self.work.wait()).await {
                        Either::First(()) => self.service(Some(epoch)).await,
                        Either::Second(work) => work,
                    }
                }
                Work::Interrupt => self.service(None).await,
            };
        }
    }

    async fn service(&self, epoch: Option<u32>) -> Work {
        let mut inner = self.inner.lock().await;

        if !inner.sensor.state.enabled {
            return Work::Idle;
        }
        if epoch.is_some_and(|epoch| epoch != inner.epoch) {
            #[cfg(feature = "defmt")]
            defmt::trace!("dropping stale sample");
            return Work::Idle;
        }

        inner.sample()
    }

    pub async fn enabled(&self) -> bool {
        self.inner.lock().await.sensor.state.enabled
    }

    /// Start sampling
    ///
    /// Polling schedules the first sample after the current delay; interrupt
    /// detection waits for the sensor to settle and publishes one zone.
    /// Does nothing when already enabled.
    ///
    /// The settle wait uses the driver's blocking delay while the device lock
    /// is held, so in interrupt mode the executor stalls for
    /// [`READY_DELAY_MS`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterruptAttach`] if the interrupt line is refused,
    /// or any bus error; the engine stays disabled
    pub async fn enable(&self) -> Result<(), Error<E>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.sensor.state.enabled {
            return Ok(());
        }

        let detection = inner.sensor.detection_mode();
        inner.sensor.set_detection_mode(detection)?;
        inner.sensor.set_mode(OperatingMode::Measurement)?;
        inner.sensor.state.enabled = true;
        inner.cancel();

        match detection {
            DetectionMode::Polling => self.work.signal(inner.poll_after()),
            DetectionMode::Interrupt => {
                inner.sensor.transport.delay_ms(READY_DELAY_MS);
                inner.seed();
            }
        }

        #[cfg(feature = "defmt")]
        defmt::info!("enabled ({})", detection);

        Ok(())
    }

    /// Stop sampling and power the sensor down
    ///
    /// Pending work is cancelled before the power-down write; once this
    /// returns no further event is published. Does nothing when already
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the power-down write fails; sampling is stopped
    /// regardless
    pub async fn disable(&self) -> Result<(), Error<E>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if !inner.sensor.state.enabled {
            return Ok(());
        }

        inner.sensor.state.enabled = false;
        inner.cancel();
        self.work.signal(Work::Idle);

        #[cfg(feature = "defmt")]
        defmt::info!("disabled");

        inner.sensor.set_mode(OperatingMode::PowerDown)
    }

    /// # Errors
    ///
    /// See [`Self::enable`] and [`Self::disable`]
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), Error<E>> {
        if enabled {
            self.enable().await
        } else {
            self.disable().await
        }
    }

    pub async fn delay_ms(&self) -> u32 {
        self.inner.lock().await.sensor.delay_ms()
    }

    /// Change the polling interval, returning the value actually applied
    ///
    /// While polling, the pending sample is cancelled and rescheduled with
    /// the new interval.
    pub async fn set_delay_ms(&self, ms: u32) -> u32 {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let applied = inner.sensor.set_delay_ms(ms);
        if inner.sensor.state.enabled && !inner.sensor.detection_mode().is_interrupt() {
            inner.cancel();
            self.work.signal(inner.poll_after());
        }

        applied
    }

    pub async fn debug(&self) -> bool {
        self.inner.lock().await.sensor.debug()
    }

    pub async fn set_debug(&self, debug: bool) {
        self.inner.lock().await.sensor.set_debug(debug);
    }

    pub async fn detection_mode(&self) -> DetectionMode {
        self.inner.lock().await.sensor.detection_mode()
    }

    /// Switch between polling and interrupt delivery
    ///
    /// While enabled, pending polling work is cancelled; polling is then
    /// rescheduled, or the interrupt line requested.
    ///
    /// # Errors
    ///
    /// Returns an error if I2C communication fails or the interrupt line is
    /// refused. A refused line while enabled falls back to polling so
    /// sampling continues.
    pub async fn set_detection_mode(&self, mode: DetectionMode) -> Result<(), Error<E>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        inner.sensor.set_detection_mode(mode)?;
        if !inner.sensor.state.enabled {
            return Ok(());
        }

        inner.cancel();
        match mode {
            DetectionMode::Polling => {
                inner.sensor.detach_irq();
                self.work.signal(inner.poll_after());
                Ok(())
            }
            DetectionMode::Interrupt => {
                if let Err(e) = inner.sensor.set_mode(OperatingMode::Measurement) {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("interrupt detection refused, staying on polling");

                    if let Err(_e) = inner.sensor.set_detection_mode(DetectionMode::Polling) {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("polling restore failed: {=str}", _e.label());
                    }
                    self.work.signal(inner.poll_after());
                    return Err(e);
                }
                self.work.signal(Work::Idle);
                Ok(())
            }
        }
    }

    /// Most recently classified zone
    pub async fn last_zone(&self) -> Zone {
        self.inner.lock().await.sensor.state.last_zone
    }

    pub async fn threshold_high(&self) -> i16 {
        self.inner.lock().await.sensor.thresholds().high
    }

    pub async fn set_threshold_high(&self, high: i16) {
        self.inner.lock().await.sensor.set_threshold_high(high);
    }

    pub async fn threshold_low(&self) -> i16 {
        self.inner.lock().await.sensor.thresholds().low
    }

    pub async fn set_threshold_low(&self, low: i16) {
        self.inner.lock().await.sensor.set_threshold_low(low);
    }

    pub async fn polarity(&self) -> i32 {
        self.inner.lock().await.sensor.polarity()
    }

    pub async fn set_polarity(&self, polarity: i32) {
        self.inner.lock().await.sensor.set_polarity(polarity);
    }

    /// Run one calibration pass while holding the device lock
    ///
    /// Sampling is blocked for the whole pass. The pass sleeps through the
    /// driver's blocking delay (about 340 ms in total), which stalls the
    /// executor running this future; call it from a task that may block.
    ///
    /// # Errors
    ///
    /// See [`Mxm1120::calibrate`]
    pub async fn run_calibration(&self, pass: CalibrationPass) -> Result<i16, Error<E>> {
        self.inner.lock().await.sensor.run_calibration_pass(pass)
    }

    pub async fn calibrated_reference(&self) -> i16 {
        self.inner.lock().await.sensor.calibrated_reference()
    }

    /// Both calibration passes have completed
    pub async fn calibration_complete(&self) -> bool {
        self.inner.lock().await.sensor.state.calibration_complete()
    }

    /// # Errors
    ///
    /// Returns an error if I2C communication fails
    pub async fn identify(&self) -> Result<bool, Error<E>> {
        self.inner.lock().await.sensor.identify()
    }

    pub async fn get_register(&self, address: u8) -> RegisterAccess {
        self.inner.lock().await.sensor.get_register(address)
    }

    /// Diagnostic register write
    ///
    /// Rewriting OPF while polling restarts the pending sample so it is taken
    /// with the new frequency and resolution.
    pub async fn set_register(&self, address: u8, value: u8) -> RegisterAccess {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let access = inner.sensor.set_register(address, value);
        if access.ok
            && address == u8::from(Register::Opf)
            && inner.sensor.state.enabled
            && !inner.sensor.detection_mode().is_interrupt()
        {
            inner.cancel();
            self.work.signal(inner.poll_after());
        }

        access
    }
}
