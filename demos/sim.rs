//! Host-side simulation binary: wires `Device` to in-memory pins and an
//! in-memory serial loopback so the whole engine can be exercised without
//! real hardware, the same role the teacher's `state-slurp` plays as a
//! host-side companion tool for a bluepill board.
//!
//! Run with `RUST_LOG=debug` to see the dispatcher/scheduler/link's debug
//! trace alongside the simulated button presses and state broadcasts.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use lsh_core::config::{ActuatorBuilder, ClickableBuilder, IndicatorBuilder};
use lsh_core::hal::{DigitalIn, DigitalOut, ResetSink, SerialBus};
use lsh_core::indicator::IndicatorMode;
use lsh_core::scheduler::Device;
use lsh_core::serial_link::FramingMode;
use lsh_core::time::MillisClock;

/// A relay pin backed by a `Cell` so the simulation can both own it (via
/// `Device`) and print its transitions from the outside.
#[derive(Clone)]
struct SimOut {
    name: &'static str,
    level: Rc<Cell<bool>>,
}

impl SimOut {
    fn new(name: &'static str) -> Self {
        Self { name, level: Rc::new(Cell::new(false)) }
    }
}

impl DigitalOut for SimOut {
    fn write(&mut self, level: bool) {
        if self.level.get() != level {
            println!("[pin] {} -> {}", self.name, if level { "ON" } else { "OFF" });
        }
        self.level.set(level);
    }
}

/// A push-button pin the simulation script can press/release from the
/// outside via its shared handle.
#[derive(Clone)]
struct SimIn {
    pressed: Rc<Cell<bool>>,
}

impl SimIn {
    fn new() -> Self {
        Self { pressed: Rc::new(Cell::new(false)) }
    }
}

impl DigitalIn for SimIn {
    fn read(&self) -> bool {
        self.pressed.get()
    }
}

/// An in-memory byte pipe standing in for the network bridge's serial link.
/// `inbound` is fed by the simulation script to mimic bytes arriving from
/// the bridge; `outbound` accumulates everything the device sends so it can
/// be printed.
struct LoopbackBus {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

impl LoopbackBus {
    fn new() -> Self {
        Self { inbound: VecDeque::new(), outbound: Vec::new() }
    }

    fn feed_text(&mut self, line: &str) {
        self.inbound.extend(line.as_bytes());
        self.inbound.push_back(b'\n');
    }

    fn drain_outbound_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        for byte in self.outbound.drain(..) {
            if byte == b'\n' {
                lines.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
            } else {
                current.push(byte);
            }
        }
        if !current.is_empty() {
            lines.push(String::from_utf8_lossy(&current).into_owned());
        }
        lines
    }
}

impl SerialBus for LoopbackBus {
    fn read_byte(&mut self) -> nb::Result<u8, ()> {
        self.inbound.pop_front().ok_or(nb::Error::WouldBlock)
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), ()> {
        self.outbound.push(byte);
        Ok(())
    }
}

/// Wall-clock millisecond source, relative to simulation start.
struct WallClock(Instant);

impl MillisClock for WallClock {
    fn millis(&self) -> u32 {
        self.0.elapsed().as_millis() as u32
    }
}

/// A reset that, on the host, just reports the fatal error and exits rather
/// than actually rebooting anything.
struct PrintAndExit;

impl ResetSink for PrintAndExit {
    fn trigger(&mut self) {
        eprintln!("[reset] fatal configuration error, device would reset here");
        std::process::exit(1);
    }
}

fn main() {
    env_logger::init();

    let lamp = SimOut::new("lamp");
    let fan = SimOut::new("fan");
    let led = SimOut::new("status-led");
    let button = SimIn::new();

    let mut device: Device<SimOut, SimIn, SimOut, WallClock, LoopbackBus, PrintAndExit, 128> = Device::setup(
        "sim-node",
        WallClock(Instant::now()),
        LoopbackBus::new(),
        PrintAndExit,
        FramingMode::Text,
        |registry| {
            ActuatorBuilder::new(1, lamp.clone())
                .default_state(false)
                .register(registry)
                .expect("register lamp");
            ActuatorBuilder::new(2, fan.clone())
                .default_state(false)
                .auto_off_ms(5_000)
                .register(registry)
                .expect("register fan");
            ClickableBuilder::new(1, button.clone())
                .short(&[0])
                .long(&[1], lsh_core::clickable::LongClickKind::Normal)
                .register(registry)
                .expect("register button");
            IndicatorBuilder::new(led.clone(), IndicatorMode::Any)
                .controlling(&[0, 1])
                .register(registry)
                .expect("register status led");
        },
    );

    println!("-- boot --");
    for line in device_outbound(&mut device) {
        println!("[link] {line}");
    }

    println!("-- short press of the button toggles the lamp --");
    button.pressed.set(true);
    for _ in 0..5 {
        device.tick();
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    button.pressed.set(false);
    for _ in 0..5 {
        device.tick();
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    for line in device_outbound(&mut device) {
        println!("[link] {line}");
    }

    println!("-- bridge asks for current state over the wire --");
    feed_request_state(&mut device);
    device.tick();
    for line in device_outbound(&mut device) {
        println!("[link] {line}");
    }
}

/// Pull whatever bytes the device has written to the wire since the last
/// drain, the same thing an external bridge process reads off the physical
/// link.
fn device_outbound<PA, PI, PN, C, R, const CAP: usize>(
    device: &mut Device<PA, PI, PN, C, LoopbackBus, R, CAP>,
) -> Vec<String>
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    C: MillisClock,
    R: ResetSink,
{
    device.bus_mut().drain_outbound_lines()
}

/// Mimic the bridge sending a `REQUEST_STATE` command down the wire.
fn feed_request_state<PA, PI, PN, C, R, const CAP: usize>(
    device: &mut Device<PA, PI, PN, C, LoopbackBus, R, CAP>,
) where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    C: MillisClock,
    R: ResetSink,
{
    device.bus_mut().feed_text(r#"{"p":11}"#);
}
