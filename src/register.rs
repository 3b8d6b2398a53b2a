//! Register addresses and bit layouts for the MXM1120 sensor.

/// Register addresses for MXM1120
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
#[repr(u8)]
pub enum Register {
    /// Interrupt persistence and latch clear
    PersInt = 0x00,
    /// Interrupt mode, interrupt type and sensitivity
    IntSrs = 0x01,
    /// Low threshold, low byte
    LthL = 0x02,
    /// Low threshold, high byte
    LthH = 0x03,
    /// High threshold, low byte
    HthL = 0x04,
    /// High threshold, high byte
    HthH = 0x05,
    /// I2C interface disable
    I2cDis = 0x06,
    /// Soft reset
    Srst = 0x07,
    /// Operation frequency, resolution and power mode
    Opf = 0x08,

    /// Device id
    Did = 0x09,
    /// Device information
    Info = 0x0A,
    /// Sensitivity adjustment
    Asa = 0x0B,

    /// Status 1 (data ready / interrupt)
    St1 = 0x10,
    /// Hall sample, low byte
    HsL = 0x11,
    /// Hall sample, high byte
    HsH = 0x12,
    /// Status 2
    St2 = 0x13,
}

impl From<Register> for u8 {
    fn from(reg: Register) -> u8 {
        reg as u8
    }
}

impl TryFrom<u8> for Register {
    type Error = u8;

    fn try_from(address: u8) -> Result<Self, u8> {
        Ok(match address {
            0x00 => Register::PersInt,
            0x01 => Register::IntSrs,
            0x02 => Register::LthL,
            0x03 => Register::LthH,
            0x04 => Register::HthL,
            0x05 => Register::HthH,
            0x06 => Register::I2cDis,
            0x07 => Register::Srst,
            0x08 => Register::Opf,
            0x09 => Register::Did,
            0x0A => Register::Info,
            0x0B => Register::Asa,
            0x10 => Register::St1,
            0x11 => Register::HsL,
            0x12 => Register::HsH,
            0x13 => Register::St2,
            other => return Err(other),
        })
    }
}

/// Expected content of the DID register
pub const DEVICE_ID: u8 = 0x9C;

/// Value written to SRST to trigger a soft reset
pub const SOFT_RESET: u8 = 0x01;

bitfield::bitfield! {
    /// PERSINT
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PersistenceRegister(u8);
    impl Debug;
    u8;
    /// Number of consecutive out-of-band samples before the interrupt fires
    pub count, set_count: 7, 4;
    /// Writing 1 clears the pending interrupt latch
    pub intclr, set_intclr: 0;
}

bitfield::bitfield! {
    /// INTSRS
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct InterruptSourceRegister(u8);
    impl Debug;
    u8;
    /// Interrupt detection
    ///
    /// - `0` = host polling
    /// - `1` = device drives INTB
    pub int_on, set_int_on: 7;
    /// Comparator type
    ///
    /// - `0` = beside: fire when the sample leaves the threshold band
    /// - `1` = within: fire when the sample enters the threshold band
    pub within, set_within: 4;
    /// Sensitivity (resolution of one sample unit)
    pub srs, set_srs: 2, 0;
}

bitfield::bitfield! {
    /// OPF
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct OperationRegister(u8);
    impl Debug;
    u8;
    /// Measurement frequency
    pub freq, set_freq: 6, 4;
    /// Fuse ROM read access
    pub efrd, set_efrd: 3;
    /// Sample resolution
    ///
    /// - `0` = 10 bit
    /// - `1` = 8 bit
    pub bit8, set_bit8: 1;
    /// Hall sensor on (measurement running)
    pub hsson, set_hsson: 0;
}

bitfield::bitfield! {
    /// ST1
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Status1Register(u8);
    impl Debug;
    u8;
    /// Interrupt pending; cleared once the latch is released
    pub intm, _: 4;
    /// Data ready
    pub drdy, _: 0;
}

impl Status1Register {
    /// Check if the status byte announces a fresh sample
    ///
    /// In interrupt detection the interrupt flag must be clear, in polling
    /// the data-ready flag must be set
    #[must_use]
    #[inline(always)]
    pub fn is_ready(&self, interrupt: bool) -> bool {
        if interrupt { !self.intm() } else { self.drdy() }
    }
}

/// Host-side copy of every writable register.
///
/// Updated only after a single-byte write to the register has been
/// acknowledged by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterMap {
    pub persint: u8,
    pub intsrs: u8,
    pub lthl: u8,
    pub lthh: u8,
    pub hthl: u8,
    pub hthh: u8,
    pub i2cdis: u8,
    pub srst: u8,
    pub opf: u8,
}

impl RegisterMap {
    /// Shadow slot backing `address`, if the register is mirrored
    pub fn slot(&mut self, address: u8) -> Option<&mut u8> {
        match Register::try_from(address).ok()? {
            Register::PersInt => Some(&mut self.persint),
            Register::IntSrs => Some(&mut self.intsrs),
            Register::LthL => Some(&mut self.lthl),
            Register::LthH => Some(&mut self.lthh),
            Register::HthL => Some(&mut self.hthl),
            Register::HthH => Some(&mut self.hthh),
            Register::I2cDis => Some(&mut self.i2cdis),
            Register::Srst => Some(&mut self.srst),
            Register::Opf => Some(&mut self.opf),
            _ => None,
        }
    }

    #[must_use]
    pub fn interrupt_source(&self) -> InterruptSourceRegister {
        InterruptSourceRegister(self.intsrs)
    }

    #[must_use]
    pub fn operation(&self) -> OperationRegister {
        OperationRegister(self.opf)
    }

    #[must_use]
    pub fn persistence(&self) -> PersistenceRegister {
        PersistenceRegister(self.persint)
    }
}
