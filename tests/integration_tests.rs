//! Integration tests for the MXM1120 driver using a mocked I2C bus.

use std::{cell::Cell, rc::Rc};

use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::{
    delay::NoopDelay,
    i2c::{Mock as I2cMock, Transaction as I2cTransaction},
};
use mxm1120::{
    CalibrationPass, Config, DetectionMode, Error, InterruptLine, InterruptType, Mxm1120,
    NoInterrupt, OperatingMode, Resolution, Zone, encode,
};

const ADDR: u8 = 0x0C;

/// Interrupt line that counts how often it was requested
#[derive(Clone, Default)]
struct CountingLine {
    requests: Rc<Cell<u32>>,
    armed: Rc<Cell<bool>>,
}

impl InterruptLine for CountingLine {
    type Error = ();

    fn request(&mut self) -> Result<(), ()> {
        self.requests.set(self.requests.get() + 1);
        self.armed.set(true);
        Ok(())
    }

    fn release(&mut self) {
        self.armed.set(false);
    }
}

fn write(register: u8, value: u8) -> I2cTransaction {
    I2cTransaction::write(ADDR, vec![register, value])
}

fn read(register: u8, value: u8) -> I2cTransaction {
    I2cTransaction::write_read(ADDR, vec![register], vec![value])
}

fn sample(st1: u8, value: i16) -> I2cTransaction {
    let (high, low) = encode(Resolution::Bits10, value);
    I2cTransaction::write_read(ADDR, vec![0x10], vec![st1, low, high])
}

fn polling() -> Config {
    Config::new().with_detection(DetectionMode::Polling)
}

#[test]
fn init_programs_interrupt_detection() {
    let expectations = [
        write(0x07, 0x01),
        read(0x09, 0x9C),
        write(0x00, 0x40),
        write(0x01, 0x82),
        write(0x08, 0x10),
        // comparator armed "beside" the default band
        write(0x05, 0x00),
        write(0x04, 0xA5),
        write(0x03, 0xC0),
        write(0x02, 0x3D),
        write(0x00, 0x41),
        write(0x01, 0x82),
        write(0x08, 0x10),
    ];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, Config::new());

    sensor.init().unwrap();

    assert_eq!(sensor.mode(), OperatingMode::PowerDown);
    assert_eq!(sensor.detection_mode(), DetectionMode::Interrupt);
    assert_eq!(sensor.interrupt_type(), InterruptType::Beside);
    assert!(!sensor.state().enabled);
    assert_eq!(sensor.state().last_zone, Zone::B);
    assert_eq!(sensor.delay_ms(), 200);

    sensor.release().0.done();
}

#[test]
fn init_programs_polling_detection() {
    let expectations = [
        write(0x07, 0x01),
        read(0x09, 0x9C),
        write(0x00, 0x40),
        write(0x01, 0x02),
        write(0x08, 0x10),
        write(0x01, 0x02),
        write(0x08, 0x10),
    ];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    sensor.init().unwrap();
    assert_eq!(sensor.detection_mode(), DetectionMode::Polling);

    sensor.release().0.done();
}

#[test]
fn init_rejects_foreign_device() {
    let expectations = [write(0x07, 0x01), read(0x09, 0x33)];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, Config::new());

    assert_eq!(sensor.init(), Err(Error::IdentityMismatch(0x33)));

    sensor.release().0.done();
}

#[test]
fn init_propagates_bus_errors() {
    let expectations = [write(0x07, 0x01).with_error(ErrorKind::Other)];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, Config::new());

    let result = sensor.init();
    assert_eq!(result, Err(Error::Communication(ErrorKind::Other)));
    assert!(result.unwrap_err().is_transport());

    sensor.release().0.done();
}

#[test]
fn identify_compares_device_id() {
    let expectations = [read(0x09, 0x9C), read(0x09, 0x00)];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    assert!(sensor.identify().unwrap());
    assert!(!sensor.identify().unwrap());

    sensor.release().0.done();
}

#[test]
fn switches_operating_modes() {
    let expectations = [write(0x08, 0x01), write(0x08, 0x09), write(0x08, 0x08)];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    sensor.set_mode(OperatingMode::Measurement).unwrap();
    assert_eq!(sensor.mode(), OperatingMode::Measurement);

    sensor.set_mode(OperatingMode::FuseRomAccess).unwrap();
    assert_eq!(sensor.mode(), OperatingMode::FuseRomAccess);

    sensor.set_mode(OperatingMode::PowerDown).unwrap();
    assert_eq!(sensor.mode(), OperatingMode::PowerDown);

    sensor.release().0.done();
}

#[test]
fn measurement_requests_interrupt_line_once() {
    let line = CountingLine::default();
    let expectations = [
        write(0x01, 0x80),
        write(0x08, 0x01),
        write(0x08, 0x01),
        write(0x08, 0x00),
    ];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, line.clone(), Config::new());

    assert!(sensor.set_register(0x01, 0x80).ok);
    sensor.set_mode(OperatingMode::Measurement).unwrap();
    sensor.set_mode(OperatingMode::Measurement).unwrap();
    assert_eq!(line.requests.get(), 1);
    assert!(line.armed.get());

    sensor.set_mode(OperatingMode::PowerDown).unwrap();
    assert!(!line.armed.get());
    assert!(!sensor.state().irq_attached);

    sensor.release().0.done();
}

#[test]
fn refused_interrupt_line_leaves_mode_unchanged() {
    let expectations = [write(0x01, 0x80)];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, Config::new());

    assert!(sensor.set_register(0x01, 0x80).ok);
    assert_eq!(
        sensor.set_mode(OperatingMode::Measurement),
        Err(Error::InterruptAttach)
    );
    assert_eq!(sensor.mode(), OperatingMode::PowerDown);

    sensor.release().0.done();
}

#[test]
fn within_comparator_thresholds() {
    let expectations = [
        write(0x01, 0x80),
        write(0x01, 0x90),
        write(0x05, 0x00),
        write(0x04, 0x87),
        write(0x03, 0xC0),
        write(0x02, 0x5B),
        write(0x00, 0x01),
    ];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, Config::new());

    assert!(sensor.set_register(0x01, 0x80).ok);
    sensor.set_interrupt_type(InterruptType::Within).unwrap();
    sensor.update_interrupt_thresholds().unwrap();
    assert_eq!(sensor.interrupt_type(), InterruptType::Within);

    sensor.release().0.done();
}

#[test]
fn threshold_update_is_skipped_while_polling() {
    let i2c = I2cMock::new(&[]);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    sensor.update_interrupt_thresholds().unwrap();

    sensor.release().0.done();
}

#[test]
fn switching_to_polling_disables_comparator() {
    let expectations = [write(0x01, 0x92), write(0x01, 0x12)];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, Config::new());

    assert!(sensor.set_register(0x01, 0x92).ok);
    sensor.set_detection_mode(DetectionMode::Polling).unwrap();
    assert_eq!(sensor.detection_mode(), DetectionMode::Polling);

    sensor.release().0.done();
}

#[test]
fn measure_gates_on_data_ready_while_polling() {
    let expectations = [sample(0x01, -165), sample(0x00, 12)];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    assert_eq!(sensor.measure(), Ok(-165));
    assert_eq!(sensor.measure(), Err(Error::NotReady(0x00)));

    sensor.release().0.done();
}

#[test]
fn measure_gates_on_interrupt_flag_in_interrupt_mode() {
    let expectations = [
        write(0x01, 0x80),
        sample(0x00, 300),
        sample(0x10, 300),
        sample(0x11, 300),
    ];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, Config::new());

    assert!(sensor.set_register(0x01, 0x80).ok);
    assert_eq!(sensor.measure(), Ok(300));
    assert_eq!(sensor.measure(), Err(Error::NotReady(0x10)));
    assert_eq!(sensor.measure_ready(), Ok(300));

    sensor.release().0.done();
}

#[test]
fn measure_decodes_eight_bit_samples() {
    let expectations = [
        write(0x08, 0x02),
        I2cTransaction::write_read(ADDR, vec![0x10], vec![0x01, 0xD6, 0x00]),
    ];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    assert!(sensor.set_register(0x08, 0x02).ok);
    assert_eq!(sensor.resolution(), Resolution::Bits8);
    assert_eq!(sensor.measure(), Ok(-42));

    sensor.release().0.done();
}

#[test]
fn classifies_with_polarity() {
    let i2c = I2cMock::new(&[]);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    assert_eq!(sensor.classify(300), Zone::A);
    assert_eq!(sensor.classify(-300), Zone::C);
    assert_eq!(sensor.classify(0), Zone::B);

    sensor.set_polarity(1);
    assert_eq!(sensor.classify(300), Zone::C);
    assert_eq!(sensor.classify(-300), Zone::A);

    sensor.release().0.done();
}

fn calibration_entry() -> Vec<I2cTransaction> {
    vec![write(0x01, 0x02), write(0x08, 0x00), write(0x08, 0x51)]
}

fn calibration_exit() -> Vec<I2cTransaction> {
    vec![
        write(0x01, 0x00),
        write(0x08, 0x50),
        write(0x08, 0x01),
        write(0x08, 0x00),
    ]
}

#[test]
fn far_pass_moves_low_threshold_with_negative_polarity() {
    let mut expectations = calibration_entry();
    expectations.extend(
        [10, 12, 11, 9, 13, 10, 11, 12, 10, 12]
            .into_iter()
            .map(|v| sample(0x01, v)),
    );
    expectations.extend(calibration_exit());

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    assert_eq!(sensor.run_calibration_pass(CalibrationPass::Far), Ok(11));

    assert_eq!(sensor.calibrated_reference(), 11);
    assert_eq!(sensor.thresholds().low, 23);
    assert_eq!(sensor.thresholds().high, 150);
    assert!(sensor.state().calibration_high_done);
    assert!(!sensor.state().calibration_complete());
    assert_eq!(sensor.mode(), OperatingMode::PowerDown);
    assert_eq!(sensor.detection_mode(), DetectionMode::Polling);

    sensor.release().0.done();
}

#[test]
fn far_pass_with_negative_reference_forces_negative_polarity() {
    let mut expectations = calibration_entry();
    expectations.extend((0..10).map(|_| sample(0x01, -100)));
    expectations.extend(calibration_exit());

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());
    sensor.set_polarity(1);

    assert_eq!(sensor.run_calibration_pass(CalibrationPass::Far), Ok(-100));

    assert_eq!(sensor.polarity(), -1);
    assert_eq!(sensor.thresholds().low, -88);

    sensor.release().0.done();
}

#[test]
fn both_passes_complete_calibration_with_rising_polarity() {
    let mut expectations = calibration_entry();
    expectations.extend((0..10).map(|_| sample(0x01, 200)));
    expectations.extend(calibration_exit());
    expectations.extend(calibration_entry());
    expectations.extend((0..10).map(|_| sample(0x01, -200)));
    expectations.extend(calibration_exit());

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());
    sensor.set_polarity(1);

    assert_eq!(sensor.run_calibration_pass(CalibrationPass::Far), Ok(200));
    assert_eq!(sensor.thresholds().high, 188);

    assert_eq!(sensor.run_calibration_pass(CalibrationPass::Near), Ok(-200));
    assert_eq!(sensor.thresholds().low, -188);

    assert_eq!(sensor.polarity(), 1);
    assert!(sensor.state().calibration_complete());

    sensor.release().0.done();
}

#[test]
fn failed_sample_aborts_calibration_but_restores_device() {
    let mut expectations = calibration_entry();
    expectations.push(sample(0x01, 10));
    expectations.push(sample(0x01, 10).with_error(ErrorKind::Other));
    expectations.extend(calibration_exit());

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    assert_eq!(
        sensor.run_calibration_pass(CalibrationPass::Far),
        Err(Error::Calibration)
    );

    assert_eq!(sensor.calibrated_reference(), 0);
    assert_eq!(sensor.thresholds().low, -180);
    assert!(!sensor.state().calibration_high_done);
    assert_eq!(sensor.registers().intsrs, 0x00);
    assert_eq!(sensor.mode(), OperatingMode::PowerDown);

    sensor.release().0.done();
}

#[test]
fn calibration_restores_interrupt_line() {
    let line = CountingLine::default();
    let mut expectations = vec![write(0x01, 0x80), write(0x08, 0x01)];
    // entry keeps the previous INTSRS bits apart from INT_ON
    expectations.extend([write(0x01, 0x02), write(0x08, 0x00), write(0x08, 0x51)]);
    expectations.extend((0..10).map(|_| sample(0x01, 40)));
    expectations.extend([
        write(0x01, 0x80),
        write(0x08, 0x50),
        write(0x08, 0x01),
        write(0x08, 0x00),
    ]);

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, line.clone(), Config::new());

    assert!(sensor.set_register(0x01, 0x80).ok);
    sensor.set_mode(OperatingMode::Measurement).unwrap();
    assert_eq!(line.requests.get(), 1);

    assert_eq!(sensor.calibrate(), Ok(40));

    // reattached, then released again by the power-down of a disabled sensor
    assert_eq!(line.requests.get(), 2);
    assert!(!line.armed.get());
    assert_eq!(sensor.detection_mode(), DetectionMode::Interrupt);

    sensor.release().0.done();
}

#[test]
fn register_passthrough() {
    let expectations = [
        read(0x09, 0x9C),
        I2cTransaction::write_read(ADDR, vec![0x0A], vec![0x00]).with_error(ErrorKind::Other),
        write(0x06, 0x01),
        write(0x05, 0x7F).with_error(ErrorKind::Other),
    ];

    let i2c = I2cMock::new(&expectations);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    let id = sensor.get_register(0x09);
    assert!(id.ok);
    assert_eq!(id.packed(), 0x009C);

    let info = sensor.get_register(0x0A);
    assert!(!info.ok);
    assert_eq!(info.packed(), 0xFF00);

    assert!(sensor.set_register(0x06, 0x01).ok);
    assert_eq!(sensor.registers().i2cdis, 0x01);

    let failed = sensor.set_register(0x05, 0x7F);
    assert!(!failed.ok);
    assert_eq!(failed.packed(), 0xFF7F);
    assert_eq!(sensor.registers().hthh, 0x00);

    sensor.release().0.done();
}

#[test]
fn delay_is_clamped_to_supported_range() {
    let i2c = I2cMock::new(&[]);
    let mut sensor = Mxm1120::new(i2c, NoopDelay, NoInterrupt, polling());

    assert_eq!(sensor.set_delay_ms(0), 20);
    assert_eq!(sensor.set_delay_ms(150), 150);
    assert_eq!(sensor.set_delay_ms(500), 200);
    assert_eq!(sensor.delay_ms(), 200);

    sensor.release().0.done();
}
