//! Register access over I2C with a host-side shadow of writable registers.

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::{
    error::Error,
    register::{Register, RegisterMap},
};

/// Largest transfer, register address included
pub const BUFFER_SIZE: usize = 17;

/// Time the device stays unresponsive after a soft reset (ms)
pub const RESET_SETTLE_MS: u32 = 20;

#[derive(Debug)]
pub struct Transport<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    map: RegisterMap,
}

impl<I2C, D, E> Transport<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            map: RegisterMap::default(),
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Shadow copy of the writable registers
    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Read `buffer.len()` consecutive registers starting at `address`
    ///
    /// Writes the register address, then reads the payload in a repeated
    /// start transaction
    pub fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Error<E>> {
        if buffer.len() > BUFFER_SIZE {
            return Err(Error::BufferOverflow);
        }

        self.i2c
            .write_read(self.address, &[address], buffer)
            .map_err(Error::Communication)?;

        #[cfg(feature = "defmt")]
        defmt::trace!("read 0x{:02X}: {:02X}", address, buffer);

        Ok(())
    }

    /// Write `data` to consecutive registers starting at `address`
    ///
    /// A single-byte write to a mirrored register updates the shadow once the
    /// device acknowledged it. A soft reset additionally blocks for
    /// [`RESET_SETTLE_MS`].
    pub fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Error<E>> {
        if data.len() + 1 > BUFFER_SIZE {
            return Err(Error::BufferOverflow);
        }

        let mut frame = [0u8; BUFFER_SIZE];
        frame[0] = address;
        frame[1..=data.len()].copy_from_slice(data);

        self.i2c
            .write(self.address, &frame[..=data.len()])
            .map_err(Error::Communication)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("write 0x{:02X}: {:02X}", address, data);

        if let [value] = data {
            if let Some(slot) = self.map.slot(address) {
                *slot = *value;
            }
            if address == u8::from(Register::Srst) {
                self.delay.delay_ms(RESET_SETTLE_MS);
            }
        }

        Ok(())
    }

    pub fn read_register(&mut self, register: Register) -> Result<u8, Error<E>> {
        let mut value = [0u8];
        self.read(register.into(), &mut value)?;
        Ok(value[0])
    }

    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<E>> {
        self.write(register.into(), &[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };

    const ADDR: u8 = 0x0C;

    #[test]
    fn write_updates_shadow_after_ack() {
        let expectations = [I2cTransaction::write(ADDR, vec![0x08, 0x11])];
        let mut transport = Transport::new(I2cMock::new(&expectations), NoopDelay, ADDR);

        transport.write_register(Register::Opf, 0x11).unwrap();
        assert_eq!(transport.map().opf, 0x11);

        transport.release().0.done();
    }

    #[test]
    fn failed_write_leaves_shadow_untouched() {
        let expectations =
            [I2cTransaction::write(ADDR, vec![0x01, 0x80]).with_error(ErrorKind::Other)];
        let mut transport = Transport::new(I2cMock::new(&expectations), NoopDelay, ADDR);

        let result = transport.write_register(Register::IntSrs, 0x80);
        assert_eq!(result, Err(Error::Communication(ErrorKind::Other)));
        assert_eq!(transport.map().intsrs, 0x00);

        transport.release().0.done();
    }

    #[test]
    fn multi_byte_write_does_not_touch_shadow() {
        let expectations = [I2cTransaction::write(ADDR, vec![0x02, 0x5B, 0xC0])];
        let mut transport = Transport::new(I2cMock::new(&expectations), NoopDelay, ADDR);

        transport.write(0x02, &[0x5B, 0xC0]).unwrap();
        assert_eq!(transport.map().lthl, 0x00);
        assert_eq!(transport.map().lthh, 0x00);

        transport.release().0.done();
    }

    #[test]
    fn rejects_oversized_transfers() {
        let mut transport = Transport::new(I2cMock::new(&[]), NoopDelay, ADDR);

        let mut big = [0u8; BUFFER_SIZE + 1];
        assert_eq!(transport.read(0x10, &mut big), Err(Error::BufferOverflow));
        assert_eq!(
            transport.write(0x00, &[0u8; BUFFER_SIZE]),
            Err(Error::BufferOverflow)
        );

        transport.release().0.done();
    }

    #[test]
    fn reads_consecutive_registers() {
        let expectations = [I2cTransaction::write_read(
            ADDR,
            vec![0x10],
            vec![0x01, 0x2C, 0x40],
        )];
        let mut transport = Transport::new(I2cMock::new(&expectations), NoopDelay, ADDR);

        let mut buffer = [0u8; 3];
        transport.read(0x10, &mut buffer).unwrap();
        assert_eq!(buffer, [0x01, 0x2C, 0x40]);

        transport.release().0.done();
    }
}
