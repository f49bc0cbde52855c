//! The cooperative super-loop that orchestrates every tick (spec.md §4.9).

use log::{debug, error};

use crate::clickable::{ClickEvent, SuperLongClickKind};
use crate::dispatcher::{self, DispatchResult};
use crate::hal::{DigitalIn, DigitalOut, ResetSink, SerialBus};
use crate::network_clicks::{should_fall_back_locally, NetworkClicks, PendingKind};
use crate::protocol::{Record, WireClickKind, MAX_NAME};
use crate::registry::Registry;
use crate::serial_link::SerialLink;
use crate::time::{elapsed_at_least, MillisClock, TimeKeeper};

/// How often the network-click pending timers are re-checked (spec.md §6).
pub const NETWORK_CLICK_CHECK_INTERVAL_MS: u32 = 50;
/// How often the auto-off sweep runs (spec.md §6).
pub const ACTUATORS_AUTO_OFF_CHECK_INTERVAL_MS: u32 = 1000;
/// Outbound state broadcasts are withheld for this long after the last
/// valid inbound frame, to avoid an ACK storm mid-burst (spec.md §6).
pub const DELAY_AFTER_RECEIVE_MS: u32 = 50;

/// Maximum number of actuators/clickables/indicators a `Device` can host.
/// Compile-time capacities, per spec.md §4.5.
pub type DeviceRegistry<PA, PI, PN> = Registry<PA, PI, PN, 64, 64, 16>;

/// The root aggregate owning every subsystem (spec.md §9: "a single owned
/// root state object threaded through the core functions" rather than ad
/// hoc globals).
pub struct Device<PA, PI, PN, C, B, R, const LINK_CAP: usize>
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    C: MillisClock,
    B: SerialBus,
    R: ResetSink,
{
    name: heapless::String<MAX_NAME>,
    registry: DeviceRegistry<PA, PI, PN>,
    net: NetworkClicks<64>,
    link: SerialLink<B, LINK_CAP>,
    time: TimeKeeper<C>,
    reset: R,
    must_send_state: bool,
    must_check_net: bool,
    last_net_check_time: u32,
    last_auto_off_check_time: u32,
}

impl<PA, PI, PN, C, B, R, const LINK_CAP: usize> Device<PA, PI, PN, C, B, R, LINK_CAP>
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    C: MillisClock,
    B: SerialBus,
    R: ResetSink,
{
    /// Construct the device. `configure` is the user's one-shot boot-time
    /// topology callback (spec.md §9 "Builder-style configuration");
    /// `finalize()` and the BOOT emission run automatically afterward
    /// (spec.md §4.9 `setup`).
    pub fn setup(
        name: &str,
        clock: C,
        bus: B,
        reset: R,
        link_mode: crate::serial_link::FramingMode,
        configure: impl FnOnce(&mut DeviceRegistry<PA, PI, PN>),
    ) -> Self {
        let mut device_name: heapless::String<MAX_NAME> = heapless::String::new();
        let _ = device_name.push_str(name);

        let mut time = TimeKeeper::new(clock);
        time.update();
        let link = SerialLink::new(bus, link_mode);
        let mut registry = DeviceRegistry::new();
        configure(&mut registry);

        let now = time.now();
        let mut device = Self {
            name: device_name,
            registry,
            net: NetworkClicks::new(),
            link,
            time,
            reset,
            must_send_state: false,
            must_check_net: false,
            last_net_check_time: now,
            last_auto_off_check_time: now,
        };
        if let Err(e) = device.registry.finalize() {
            device.fatal(e);
        }
        device.link.emit_boot(now);
        device
    }

    fn fatal(&mut self, err: crate::error::FatalError) {
        error!("{}", err.debug_message());
        // spec.md §7: unconditional reset, no continuation.
        self.reset.trigger();
    }

    pub fn registry(&self) -> &DeviceRegistry<PA, PI, PN> {
        &self.registry
    }

    /// Direct access to the link's bus, for host-side simulation and
    /// testing that needs to feed/drain the wire from outside.
    pub fn bus_mut(&mut self) -> &mut B {
        self.link.bus_mut()
    }

    /// Run exactly one super-loop iteration (spec.md §4.9).
    pub fn tick(&mut self) {
        self.time.update();
        let now = self.time.now();

        self.poll_inputs(now);
        self.drain_inbound(now);
        self.check_network_click_timers(now);
        self.sweep_auto_off(now);
        self.gated_broadcast(now);
    }

    /// Step 2: high-frequency poll, ping keepalive and every clickable's
    /// FSM.
    fn poll_inputs(&mut self, now: u32) {
        if self.link.can_ping(now) {
            self.link.emit_ping(now);
        }
        let connected = self.link.is_connected(now);
        for index in 0..self.registry.clickables().len() {
            let event = match self.registry.clickables_mut().get_mut(index) {
                Some(c) => c.click_detection(now),
                None => continue,
            };
            self.handle_click_event(index, event, now, connected);
        }
    }

    fn handle_click_event(&mut self, index: usize, event: ClickEvent, now: u32, connected: bool) {
        match event {
            ClickEvent::ShortClick | ClickEvent::ShortClickQuick => {
                let (clickables, actuators) = self.registry.clickables_and_actuators_mut();
                if let Some(c) = clickables.get(index) {
                    let changed = c.short_click(now, actuators);
                    self.must_send_state |= changed;
                }
            }
            ClickEvent::LongClick => {
                self.handle_thresholded_click(index, PendingKind::Long, now, connected);
            }
            ClickEvent::SuperLongClick => {
                self.handle_thresholded_click(index, PendingKind::SuperLong, now, connected);
            }
            ClickEvent::None
            | ClickEvent::NoClick
            | ClickEvent::NoClickKeepingClicked
            | ClickEvent::NoClickNotShortClickable => {}
        }
    }

    /// LONG_CLICK / SUPER_LONG_CLICK routing (spec.md §4.9 step 2).
    fn handle_thresholded_click(&mut self, index: usize, kind: PendingKind, now: u32, connected: bool) {
        let (net_ok, clickable_id) = match self.registry.clickables().get(index) {
            Some(c) => (
                match kind {
                    PendingKind::Long => c.net_long_ok(),
                    PendingKind::SuperLong => c.net_super_long_ok(),
                },
                c.id(),
            ),
            None => return,
        };
        if net_ok && connected {
            self.net.request(index, kind, now);
            // spec.md §4.6 `request()`: emit the NETWORK_CLICK record with
            // `c=0` alongside recording the pending entry.
            let wire_kind = match kind {
                PendingKind::Long => WireClickKind::Long,
                PendingKind::SuperLong => WireClickKind::SuperLong,
            };
            self.link.send(&Record::network_click(wire_kind, clickable_id, false), now);
            self.must_check_net = true;
            return;
        }
        let fallback = match self.registry.clickables().get(index) {
            Some(c) => match kind {
                PendingKind::Long => c.long_fallback(),
                PendingKind::SuperLong => c.super_long_fallback(),
            },
            None => return,
        };
        if net_ok && !connected && !should_fall_back_locally(fallback) {
            // network-enabled, disconnected, and configured to do nothing
            // locally: drop the event.
            return;
        }
        self.run_local_thresholded_click(index, kind, now);
    }

    fn run_local_thresholded_click(&mut self, index: usize, kind: PendingKind, now: u32) {
        let (clickable, actuators) = self.registry.clickable_and_actuators_mut(index);
        let changed = match (clickable, kind) {
            (Some(c), PendingKind::Long) => c.long_click(now, actuators),
            (Some(c), PendingKind::SuperLong) => match c.super_long_kind() {
                SuperLongClickKind::Selective => c.super_long_click_selective(now, actuators),
                SuperLongClickKind::Normal => {
                    let mut changed = false;
                    for act in actuators.iter_mut() {
                        if !act.protected() {
                            changed |= act.set_state(now, false);
                        }
                    }
                    changed
                }
            },
            (None, _) => false,
        };
        self.must_send_state |= changed;
    }

    /// Step 3: drain every assembled inbound record this tick.
    fn drain_inbound(&mut self, now: u32) {
        while let Some(record) = self.link.poll_frame(now) {
            let DispatchResult { state_changed, net_handled } = dispatcher::dispatch(
                record,
                &mut self.registry,
                &mut self.net,
                &mut self.link,
                &self.name,
                now,
            );
            self.must_send_state |= state_changed;
            self.must_check_net |= net_handled;
        }
    }

    /// Step 4: periodic network-click timeout sweep.
    fn check_network_click_timers(&mut self, now: u32) {
        if !self.must_check_net {
            return;
        }
        if !elapsed_at_least(now, self.last_net_check_time, NETWORK_CLICK_CHECK_INTERVAL_MS) {
            return;
        }
        self.last_net_check_time = now;
        let changed = dispatcher::apply_network_click_sweep(&mut self.registry, &mut self.net, now, false);
        self.must_send_state |= changed;
        self.must_check_net = self.any_pending();
    }

    fn any_pending(&self) -> bool {
        (0..self.registry.clickables().len()).any(|idx| {
            self.net.is_pending(idx, PendingKind::Long) || self.net.is_pending(idx, PendingKind::SuperLong)
        })
    }

    /// Step 5: periodic auto-off sweep.
    fn sweep_auto_off(&mut self, now: u32) {
        if !elapsed_at_least(now, self.last_auto_off_check_time, ACTUATORS_AUTO_OFF_CHECK_INTERVAL_MS) {
            return;
        }
        self.last_auto_off_check_time = now;
        let changed = self.registry.sweep_auto_off(now);
        self.must_send_state |= changed;
    }

    /// Step 6: gated broadcast, withheld until `DELAY_AFTER_RECEIVE_MS`
    /// have elapsed since the last valid inbound frame, to avoid an ACK
    /// storm mid-burst of SET commands.
    fn gated_broadcast(&mut self, now: u32) {
        if !self.must_send_state {
            return;
        }
        if !elapsed_at_least(now, self.link.last_received_valid_time(), DELAY_AFTER_RECEIVE_MS) {
            return;
        }
        dispatcher::emit_actuators_state(&self.registry, &mut self.link, now);
        self.registry.refresh_indicators();
        self.must_send_state = false;
        debug!("state broadcast emitted");
    }
}
