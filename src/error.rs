/// Error type for MXM1120 operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error with the sensor
    Communication(E),
    /// Transfer longer than the transport buffer
    BufferOverflow,
    /// Device id register did not hold the expected value
    IdentityMismatch(u8),
    /// The platform refused to grant the interrupt line
    InterruptAttach,
    /// Status register reports no fresh sample (raw ST1 value)
    NotReady(u8),
    /// A calibration sample could not be taken
    Calibration,
    /// The supply sequencing collaborator failed
    Power,
}

impl<E> Error<E> {
    /// Whether the error came from the bus transaction itself
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Communication(_) | Error::BufferOverflow)
    }

    /// Short label for logging without the bus error payload
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Error::Communication(_) => "communication",
            Error::BufferOverflow => "buffer overflow",
            Error::IdentityMismatch(_) => "identity mismatch",
            Error::InterruptAttach => "interrupt attach",
            Error::NotReady(_) => "not ready",
            Error::Calibration => "calibration",
            Error::Power => "power",
        }
    }
}
