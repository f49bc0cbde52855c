//! Decodes inbound command records and mutates Actuators / NetworkClicks /
//! the outbound emitter (spec.md §4.8).

use heapless::Vec;
use log::debug;

use crate::actuator::Actuator;
use crate::clickable::{Clickable, SuperLongClickKind};
use crate::error::DecodeReject;
use crate::hal::{DigitalIn, DigitalOut};
use crate::network_clicks::{should_fall_back_locally, NetworkClicks, PendingKind};
use crate::protocol::{Command, Record, StateField, WireClickKind, MAX_IDS, MAX_NAME};
use crate::registry::Registry;
use crate::serial_link::SerialLink;

/// Side effects a single dispatched record may require of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchResult {
    /// An actuator changed state (or the device otherwise wants the next
    /// gated broadcast to go out).
    pub state_changed: bool,
    /// A network-click request was just confirmed or forced, i.e. the
    /// scheduler's `must_check_net` flag should be (re)examined.
    pub net_handled: bool,
}

/// Log why an inbound record was dropped and produce the no-op result
/// (spec.md §7 "Inbound-malformed": logged, never escalated).
fn reject(reason: DecodeReject) -> DispatchResult {
    debug!("dropping inbound record: {reason}");
    DispatchResult::default()
}

fn pending_kind_from_wire(kind: WireClickKind) -> PendingKind {
    match kind {
        WireClickKind::Long => PendingKind::Long,
        WireClickKind::SuperLong => PendingKind::SuperLong,
    }
}

/// Apply the local click action for `kind` on `clickable`, honoring
/// `long_kind`/`super_long_kind` the same way a local (non-network) click
/// would (spec.md §4.6 `check_one` / §4.3 local-action handlers).
fn run_local_click_action<PA, PI>(
    clickable: &Clickable<PI>,
    actuators: &mut [Actuator<PA>],
    kind: PendingKind,
    now: u32,
) -> bool
where
    PA: DigitalOut,
    PI: DigitalIn,
{
    match kind {
        PendingKind::Long => clickable.long_click(now, actuators),
        PendingKind::SuperLong => match clickable.super_long_kind() {
            SuperLongClickKind::Selective => clickable.super_long_click_selective(now, actuators),
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
    }
}

/// Decode one inbound `Record` and apply its effect to the registry /
/// network-click tracker / outbound link. `device_name` and the capacity
/// constants back `DEVICE_DETAILS`/`ACTUATORS_STATE` replies.
pub fn dispatch<PA, PI, PN, B, const LINK_CAP: usize>(
    record: Record,
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    net: &mut NetworkClicks<64>,
    link: &mut SerialLink<B, LINK_CAP>,
    device_name: &str,
    now: u32,
) -> DispatchResult
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    B: crate::hal::SerialBus,
{
    let command = match Command::from_u8(record.p) {
        Some(c) => c,
        None => return reject(DecodeReject::UnknownCommand(record.p)),
    };

    match command {
        Command::RequestDetails => {
            emit_device_details(registry, link, device_name, now);
            DispatchResult::default()
        }
        Command::RequestState => {
            emit_actuators_state(registry, link, now);
            DispatchResult::default()
        }
        Command::Boot => {
            emit_device_details(registry, link, device_name, now);
            emit_actuators_state(registry, link, now);
            DispatchResult::default()
        }
        Command::Ping => DispatchResult::default(),
        Command::SetState => apply_set_state(record, registry, now),
        Command::SetSingleActuator => apply_set_single_actuator(record, registry, now),
        Command::NetworkClickAck => apply_network_click_ack(record, registry, net, link, now),
        Command::Failover => {
            let changed = apply_network_click_sweep(registry, net, now, true);
            DispatchResult { state_changed: changed, net_handled: true }
        }
        Command::FailoverClick => apply_failover_click(record, registry, net, now),
        // DEVICE_DETAILS / ACTUATORS_STATE / NETWORK_CLICK are outbound-only
        // commands; receiving one inbound is unexpected and ignored.
        Command::DeviceDetails | Command::ActuatorsState | Command::NetworkClick => {
            DispatchResult::default()
        }
    }
}

fn apply_set_state<PA, PI, PN>(
    record: Record,
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    now: u32,
) -> DispatchResult
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    let vector = match record.s {
        Some(StateField::Vector(v)) => v,
        _ => return reject(DecodeReject::Malformed),
    };
    if vector.len() != registry.actuators().len() {
        // Wrong-length vector: silently rejected (spec.md §9 Open
        // Question (a)).
        return reject(DecodeReject::WrongLength);
    }
    let mut changed = false;
    for (idx, &raw) in vector.iter().enumerate() {
        let target = raw != 0;
        if let Some(act) = registry.actuators_mut().get_mut(idx) {
            changed |= act.set_state(now, target);
        }
    }
    DispatchResult { state_changed: changed, net_handled: false }
}

fn apply_set_single_actuator<PA, PI, PN>(
    record: Record,
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    now: u32,
) -> DispatchResult
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    let id = match record.i {
        Some(id) if id != 0 => id,
        _ => return reject(DecodeReject::InvalidEnumValue),
    };
    let raw_state = match record.s {
        Some(StateField::Scalar(s)) if s == 0 || s == 1 => s,
        _ => return reject(DecodeReject::InvalidEnumValue),
    };
    let index = match registry.actuator_index(id) {
        Some(i) => i,
        None => return reject(DecodeReject::Malformed),
    };
    let target = raw_state != 0;
    let changed = registry
        .actuators_mut()
        .get_mut(index)
        .map(|a| a.set_state(now, target))
        .unwrap_or(false);
    DispatchResult { state_changed: changed, net_handled: false }
}

fn apply_network_click_ack<PA, PI, PN, B, const LINK_CAP: usize>(
    record: Record,
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    net: &mut NetworkClicks<64>,
    link: &mut SerialLink<B, LINK_CAP>,
    now: u32,
) -> DispatchResult
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    B: crate::hal::SerialBus,
{
    let id = match record.i {
        Some(id) if id != 0 => id,
        _ => return reject(DecodeReject::InvalidEnumValue),
    };
    let wire_kind = match record.t.and_then(WireClickKind::from_u8) {
        Some(k) => k,
        None => return reject(DecodeReject::InvalidEnumValue),
    };
    let kind = pending_kind_from_wire(wire_kind);
    let index = match registry.clickable_index(id) {
        Some(i) => i,
        None => return reject(DecodeReject::Malformed),
    };
    // "if not expired" (spec.md §4.8): `check_one` with force=false only
    // removes the entry when it has already timed out, so an ACK that is
    // still pending when this runs is handled by `confirm`, which is a
    // no-op once the entry is already gone from an earlier timeout.
    if net.check_one(index, kind, now, false) {
        // Already expired by the time the ACK arrived: the entry is gone,
        // ACKs after expiry are ignored (spec.md §5 "Cancellation").
        return DispatchResult { state_changed: false, net_handled: true };
    }
    let confirmed = net.confirm(index, kind);
    if confirmed {
        // spec.md §4.6 `confirm()`: emit the NETWORK_CLICK record with `c=1`.
        link.send(&Record::network_click(wire_kind, id, true), now);
    }
    DispatchResult { state_changed: false, net_handled: confirmed }
}

fn apply_failover_click<PA, PI, PN>(
    record: Record,
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    net: &mut NetworkClicks<64>,
    now: u32,
) -> DispatchResult
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    let id = match record.i {
        Some(id) if id != 0 => id,
        _ => return reject(DecodeReject::InvalidEnumValue),
    };
    let kind = match record.t.and_then(WireClickKind::from_u8) {
        Some(k) => pending_kind_from_wire(k),
        None => return reject(DecodeReject::InvalidEnumValue),
    };
    let index = match registry.clickable_index(id) {
        Some(i) => i,
        None => return reject(DecodeReject::Malformed),
    };
    let changed = resolve_one_pending(registry, net, index, kind, now, true);
    DispatchResult { state_changed: changed, net_handled: true }
}

/// `NetworkClicks.check_all(force)` lifted to dispatcher level, since
/// executing the fallback action needs the registry and the per-clickable
/// fallback configuration that `NetworkClicks` itself doesn't hold. Also
/// called directly by the scheduler's periodic network-click timer check
/// (spec.md §4.9 step 4).
pub fn apply_network_click_sweep<PA, PI, PN>(
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    net: &mut NetworkClicks<64>,
    now: u32,
    force: bool,
) -> bool
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    let expired: Vec<(usize, PendingKind), 64> = net.sweep_expired(now, force);
    let mut changed = false;
    for (idx, kind) in expired {
        changed |= execute_fallback(registry, idx, kind, now);
    }
    changed
}

fn resolve_one_pending<PA, PI, PN>(
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    net: &mut NetworkClicks<64>,
    idx: usize,
    kind: PendingKind,
    now: u32,
    force: bool,
) -> bool
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    if net.check_one(idx, kind, now, force) {
        execute_fallback(registry, idx, kind, now)
    } else {
        false
    }
}

fn execute_fallback<PA, PI, PN>(
    registry: &mut Registry<PA, PI, PN, 64, 64, 16>,
    idx: usize,
    kind: PendingKind,
    now: u32,
) -> bool
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    let should_run = match registry.clickables().get(idx) {
        Some(c) => {
            let fallback = match kind {
                PendingKind::Long => c.long_fallback(),
                PendingKind::SuperLong => c.super_long_fallback(),
            };
            should_fall_back_locally(fallback)
        }
        None => return false,
    };
    if !should_run {
        return false;
    }
    let (clickable, actuators) = registry.clickable_and_actuators_mut(idx);
    match clickable {
        Some(c) => run_local_click_action(c, actuators, kind, now),
        None => false,
    }
}

fn emit_device_details<PA, PI, PN, B, const LINK_CAP: usize>(
    registry: &Registry<PA, PI, PN, 64, 64, 16>,
    link: &mut SerialLink<B, LINK_CAP>,
    device_name: &str,
    now: u32,
) where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    B: crate::hal::SerialBus,
{
    let mut name: heapless::String<MAX_NAME> = heapless::String::new();
    let _ = name.push_str(device_name);
    let mut actuator_ids: Vec<u8, MAX_IDS> = Vec::new();
    for act in registry.actuators() {
        let _ = actuator_ids.push(act.id());
    }
    let mut clickable_ids: Vec<u8, MAX_IDS> = Vec::new();
    for click in registry.clickables() {
        let _ = clickable_ids.push(click.id());
    }
    let record = Record::device_details(name, actuator_ids, clickable_ids);
    link.send(&record, now);
}

/// Emit an `ACTUATORS_STATE` record. Public so the scheduler can invoke it
/// directly for the gated broadcast (spec.md §4.9 step 6).
pub fn emit_actuators_state<PA, PI, PN, B, const LINK_CAP: usize>(
    registry: &Registry<PA, PI, PN, 64, 64, 16>,
    link: &mut SerialLink<B, LINK_CAP>,
    now: u32,
) where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
    B: crate::hal::SerialBus,
{
    let mut vector: Vec<u8, MAX_IDS> = Vec::new();
    for act in registry.actuators() {
        let _ = vector.push(act.state() as u8);
    }
    let record = Record::actuators_state(vector);
    link.send(&record, now);
}
