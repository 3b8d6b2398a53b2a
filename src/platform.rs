//! Collaborators the engine drives but does not own the implementation of.

use crate::zone::Zone;

/// Interrupt line wired to the sensor's INTB pin
///
/// `request` must arm the line for falling edges in oneshot, exclusive mode
/// and route it to [`Engine::on_interrupt`](crate::Engine::on_interrupt).
/// `release` disarms it; it is only called on a line that was granted.
pub trait InterruptLine {
    type Error;

    fn request(&mut self) -> Result<(), Self::Error>;

    fn release(&mut self);
}

/// Placeholder for boards that do not route INTB
///
/// Every request is refused, so interrupt detection cannot be entered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupt;

impl InterruptLine for NoInterrupt {
    type Error = ();

    fn request(&mut self) -> Result<(), ()> {
        Err(())
    }

    fn release(&mut self) {}
}

/// Supply sequencing (VDD before VIO on power up, reverse on power down)
///
/// Both calls may be repeated; implementations are expected to be idempotent.
pub trait PowerControl {
    type Error;

    fn power_on(&mut self) -> Result<(), Self::Error>;

    fn power_off(&mut self) -> Result<(), Self::Error>;
}

/// Supply that is permanently on
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOn;

impl PowerControl for AlwaysOn {
    type Error = ();

    fn power_on(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

/// Value delivered once per completed sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Zone(Zone),
    Raw(i16),
}

/// Receiver for classified samples
pub trait EventSink {
    fn publish(&mut self, event: Event);
}

impl<F> EventSink for F
where
    F: FnMut(Event),
{
    fn publish(&mut self, event: Event) {
        self(event);
    }
}
