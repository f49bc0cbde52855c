//! Hardware abstraction traits.
//!
//! The core engine never touches a concrete MCU peripheral. Every piece of
//! hardware it needs, digital pins, a serial byte stream, a watchdog reset,
//! is expressed as a trait built on top of `embedded-hal`'s own pin and
//! serial traits. A board-support crate implements these for its real
//! peripherals; tests and `demos/sim.rs` implement them with plain memory.

use embedded_hal::digital::v2::{InputPin, OutputPin};

/// A single digital output driving a relay, indicator LED, or similar load.
pub trait DigitalOut {
    /// Drive the pin to `level` (`true` = asserted/on).
    fn write(&mut self, level: bool);
}

/// A single digital input reporting a push-button's instantaneous level.
pub trait DigitalIn {
    /// Read the pin's instantaneous level (`true` = pressed).
    fn read(&self) -> bool;
}

/// Blanket impl so any `embedded-hal` `OutputPin` works as a [`DigitalOut`].
///
/// `embedded-hal` 0.2's pin traits are fallible (`Result<(), E>`); on real
/// GPIO peripherals a write essentially never fails; a best-effort write
/// that drops the error keeps the core engine's `set_state` infallible,
/// matching spec.md's `set_state(target) -> changed: bool` signature.
impl<P: OutputPin> DigitalOut for P {
    fn write(&mut self, level: bool) {
        let _ = if level { self.set_high() } else { self.set_low() };
    }
}

impl<P: InputPin> DigitalIn for P {
    fn read(&self) -> bool {
        self.is_high().unwrap_or(false)
    }
}

/// A point-to-point, non-blocking byte stream to the network bridge.
///
/// Modeled directly on `embedded_hal::serial::{Read, Write}`: `read_byte`
/// returns `Err(nb::Error::WouldBlock)` when nothing is buffered yet, and
/// `write_byte` is expected to complete quickly for the short frames this
/// protocol uses.
pub trait SerialBus {
    /// Non-blocking attempt to read one byte.
    fn read_byte(&mut self) -> nb::Result<u8, ()>;
    /// Non-blocking attempt to write one byte.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), ()>;
}

/// The platform reset primitive invoked on a configuration-fatal error.
///
/// spec.md §7: "Device ... triggers an unconditional hardware reset via
/// watchdog after a grace delay; no continuation." The concrete grace delay
/// and watchdog peripheral are board-specific; this trait only models the
/// "ask the platform to reset" action so the fatal path stays testable on
/// `std` with a mock that records the call instead of rebooting the test
/// process.
pub trait ResetSink {
    /// Request an unconditional device reset.
    fn trigger(&mut self);
}
