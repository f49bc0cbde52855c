//! The per-input click-classification FSM (spec.md §3/§4.3).

use bitflags::bitflags;
use heapless::Vec;

use crate::actuator::Actuator;
use crate::hal::{DigitalIn, DigitalOut};
use crate::time::elapsed_at_least;

bitflags! {
    /// Capability bitset (spec.md §3). `QUICK_OK`/`VALID`/`CHECKED` are
    /// derived by [`Clickable::check`], never set directly by
    /// configuration.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Capabilities: u8 {
        const SHORT_OK          = 0b0000_0001;
        const LONG_OK           = 0b0000_0010;
        const SUPER_LONG_OK     = 0b0000_0100;
        const NET_LONG_OK       = 0b0000_1000;
        const NET_SUPER_LONG_OK = 0b0001_0000;
        const QUICK_OK          = 0b0010_0000;
        const VALID             = 0b0100_0000;
        const CHECKED           = 0b1000_0000;
    }
}

/// `long_kind` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongClickKind {
    Normal,
    OnOnly,
    OffOnly,
}

/// `super_long_kind` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperLongClickKind {
    Normal,
    Selective,
}

/// `long_fallback`/`super_long_fallback` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    LocalFallback,
    DoNothing,
}

/// FSM state (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FsmState {
    Idle,
    Debouncing,
    Pressed,
    Released,
}

/// `last_action_fired` (spec.md §3). Ordered `None < Long < SuperLong` so
/// the transition table's `last_action < SUPER_LONG` / `last_action <
/// LONG` guards are plain comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LastAction {
    None,
    Long,
    SuperLong,
}

/// The event a single [`Clickable::click_detection`] call may emit
/// (spec.md §4.3's transition table, right-hand "emit" column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickEvent {
    /// Nothing of interest happened this poll.
    None,
    /// The debounced press transition, for a short-only clickable.
    ShortClickQuick,
    /// A full press-then-release under `long_ms`.
    ShortClick,
    /// A press held at least `long_ms` but less than `super_long_ms`.
    LongClick,
    /// A press held at least `super_long_ms`.
    SuperLongClick,
    /// Release of a quick-click clickable, or of any clickable after an
    /// action already fired during this press.
    NoClick,
    /// Still pressed, no new threshold crossed this poll.
    NoClickKeepingClicked,
    /// Released before `long_ms` but `short_ok` is false.
    NoClickNotShortClickable,
}

/// One digital input interpreted as a push-button.
pub struct Clickable<I: DigitalIn> {
    id: u8,
    pin: I,
    index: usize,
    actuators_short: Vec<usize, 8>,
    actuators_long: Vec<usize, 8>,
    actuators_super_long: Vec<usize, 8>,
    caps: Capabilities,
    long_kind: LongClickKind,
    super_long_kind: SuperLongClickKind,
    long_fallback: FallbackKind,
    super_long_fallback: FallbackKind,
    debounce_ms: u32,
    long_ms: u32,
    super_long_ms: u32,
    state: FsmState,
    state_change_time: u32,
    last_action_fired: LastAction,
}

/// Configuration for a single clickable, consumed once by
/// [`crate::registry::Registry::add_clickable`] (spec.md §9 "Builder-style
/// configuration").
pub struct ClickableSpec<I: DigitalIn> {
    pub id: u8,
    pub pin: I,
    pub actuators_short: Vec<usize, 8>,
    pub actuators_long: Vec<usize, 8>,
    pub actuators_super_long: Vec<usize, 8>,
    pub short_ok: bool,
    pub long_ok: bool,
    pub super_long_ok: bool,
    pub net_long_ok: bool,
    pub net_super_long_ok: bool,
    pub long_kind: LongClickKind,
    pub super_long_kind: SuperLongClickKind,
    pub long_fallback: FallbackKind,
    pub super_long_fallback: FallbackKind,
    pub debounce_ms: u32,
    pub long_ms: u32,
    pub super_long_ms: u32,
}

impl<I: DigitalIn> Clickable<I> {
    pub(crate) fn from_spec(spec: ClickableSpec<I>, index: usize) -> Self {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::SHORT_OK, spec.short_ok);
        caps.set(Capabilities::LONG_OK, spec.long_ok);
        caps.set(Capabilities::SUPER_LONG_OK, spec.super_long_ok);
        caps.set(Capabilities::NET_LONG_OK, spec.net_long_ok);
        caps.set(Capabilities::NET_SUPER_LONG_OK, spec.net_super_long_ok);
        Self {
            id: spec.id,
            pin: spec.pin,
            index,
            actuators_short: spec.actuators_short,
            actuators_long: spec.actuators_long,
            actuators_super_long: spec.actuators_super_long,
            caps,
            long_kind: spec.long_kind,
            super_long_kind: spec.super_long_kind,
            long_fallback: spec.long_fallback,
            super_long_fallback: spec.super_long_fallback,
            debounce_ms: spec.debounce_ms,
            long_ms: spec.long_ms,
            super_long_ms: spec.super_long_ms,
            state: FsmState::Idle,
            state_change_time: 0,
            last_action_fired: LastAction::None,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Recompute `quick_ok`/`valid` and mark `checked` (spec.md §4.5
    /// `Registry::finalize` -> `Clickable.check()`).
    pub(crate) fn check(&mut self) {
        let quick_ok = self.caps.contains(Capabilities::SHORT_OK)
            && !self.caps.contains(Capabilities::LONG_OK)
            && !self.caps.contains(Capabilities::SUPER_LONG_OK);
        self.caps.set(Capabilities::QUICK_OK, quick_ok);

        let any_kind = self.caps.intersects(
            Capabilities::SHORT_OK | Capabilities::LONG_OK | Capabilities::SUPER_LONG_OK,
        );
        let any_actuators = !self.actuators_short.is_empty()
            || !self.actuators_long.is_empty()
            || !self.actuators_super_long.is_empty();
        self.caps.set(Capabilities::VALID, any_kind && any_actuators);
        self.caps.insert(Capabilities::CHECKED);
    }

    pub fn valid(&self) -> bool {
        self.caps.contains(Capabilities::VALID)
    }

    pub fn checked(&self) -> bool {
        self.caps.contains(Capabilities::CHECKED)
    }

    pub fn quick_ok(&self) -> bool {
        self.caps.contains(Capabilities::QUICK_OK)
    }

    pub fn short_ok(&self) -> bool {
        self.caps.contains(Capabilities::SHORT_OK)
    }

    pub fn long_ok(&self) -> bool {
        self.caps.contains(Capabilities::LONG_OK)
    }

    pub fn super_long_ok(&self) -> bool {
        self.caps.contains(Capabilities::SUPER_LONG_OK)
    }

    pub fn net_long_ok(&self) -> bool {
        self.caps.contains(Capabilities::NET_LONG_OK)
    }

    pub fn net_super_long_ok(&self) -> bool {
        self.caps.contains(Capabilities::NET_SUPER_LONG_OK)
    }

    pub fn long_kind(&self) -> LongClickKind {
        self.long_kind
    }

    pub fn super_long_kind(&self) -> SuperLongClickKind {
        self.super_long_kind
    }

    pub fn long_fallback(&self) -> FallbackKind {
        self.long_fallback
    }

    pub fn super_long_fallback(&self) -> FallbackKind {
        self.super_long_fallback
    }

    pub fn actuators_short(&self) -> &[usize] {
        &self.actuators_short
    }

    pub fn actuators_long(&self) -> &[usize] {
        &self.actuators_long
    }

    pub fn actuators_super_long(&self) -> &[usize] {
        &self.actuators_super_long
    }

    /// Read the pin and advance the FSM one step (spec.md §4.3's table).
    pub fn click_detection(&mut self, now: u32) -> ClickEvent {
        let level = self.pin.read();
        match self.state {
            FsmState::Idle => {
                if level {
                    self.state = FsmState::Debouncing;
                    self.state_change_time = now;
                }
                ClickEvent::None
            }
            FsmState::Debouncing => {
                if !elapsed_at_least(now, self.state_change_time, self.debounce_ms) {
                    ClickEvent::None
                } else if level {
                    self.state = FsmState::Pressed;
                    self.state_change_time = now;
                    self.last_action_fired = LastAction::None;
                    if self.quick_ok() {
                        ClickEvent::ShortClickQuick
                    } else {
                        ClickEvent::None
                    }
                } else {
                    // Bounce/noise: never actually pressed.
                    self.state = FsmState::Idle;
                    ClickEvent::None
                }
            }
            FsmState::Pressed => {
                if level {
                    if self.super_long_ok()
                        && self.last_action_fired < LastAction::SuperLong
                        && elapsed_at_least(now, self.state_change_time, self.super_long_ms)
                    {
                        self.last_action_fired = LastAction::SuperLong;
                        ClickEvent::SuperLongClick
                    } else if self.long_ok()
                        && self.last_action_fired < LastAction::Long
                        && elapsed_at_least(now, self.state_change_time, self.long_ms)
                    {
                        self.last_action_fired = LastAction::Long;
                        ClickEvent::LongClick
                    } else {
                        ClickEvent::NoClickKeepingClicked
                    }
                } else {
                    self.state = FsmState::Released;
                    // "falls through same tick" (spec.md §4.3).
                    self.resolve_release()
                }
            }
            FsmState::Released => self.resolve_release(),
        }
    }

    fn resolve_release(&mut self) -> ClickEvent {
        self.state = FsmState::Idle;
        if self.quick_ok() {
            ClickEvent::NoClick
        } else if self.last_action_fired == LastAction::None {
            if self.short_ok() {
                ClickEvent::ShortClick
            } else {
                ClickEvent::NoClickNotShortClickable
            }
        } else {
            ClickEvent::NoClick
        }
    }

    /// `short_click()`: toggle every short-linked actuator; OR of changes.
    pub fn short_click<P: DigitalOut>(&self, now: u32, actuators: &mut [Actuator<P>]) -> bool {
        let mut changed = false;
        for &idx in &self.actuators_short {
            if let Some(act) = actuators.get_mut(idx) {
                changed |= act.toggle_state(now);
            }
        }
        changed
    }

    /// `long_click()`: apply `long_kind`'s target to every long-linked
    /// actuator; OR of changes.
    pub fn long_click<P: DigitalOut>(&self, now: u32, actuators: &mut [Actuator<P>]) -> bool {
        let target = match self.long_kind {
            LongClickKind::OnOnly => true,
            LongClickKind::OffOnly => false,
            LongClickKind::Normal => {
                let total = self.actuators_long.len();
                if total == 0 {
                    return false;
                }
                let on_count = self
                    .actuators_long
                    .iter()
                    .filter_map(|&idx| actuators.get(idx))
                    .filter(|a| a.state())
                    .count();
                // Strict: exactly half stays off (spec.md §9 Open Question (c)).
                (on_count * 2) < total
            }
        };
        let mut changed = false;
        for &idx in &self.actuators_long {
            if let Some(act) = actuators.get_mut(idx) {
                changed |= act.set_state(now, target);
            }
        }
        changed
    }

    /// `super_long_click_selective()`: turn off every super-long-linked
    /// actuator that is not protected; OR of changes. The NORMAL variant is
    /// handled at the registry level via
    /// [`crate::registry::Registry::turn_off_unprotected_actuators`].
    pub fn super_long_click_selective<P: DigitalOut>(
        &self,
        now: u32,
        actuators: &mut [Actuator<P>],
    ) -> bool {
        let mut changed = false;
        for &idx in &self.actuators_super_long {
            if let Some(act) = actuators.get_mut(idx) {
                if !act.protected() {
                    changed |= act.set_state(now, false);
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct MockIn(Cell<bool>);
    impl DigitalIn for MockIn {
        fn read(&self) -> bool {
            self.0.get()
        }
    }

    struct MockOut(bool);
    impl DigitalOut for MockOut {
        fn write(&mut self, level: bool) {
            self.0 = level;
        }
    }

    fn actuator(state: bool) -> Actuator<MockOut> {
        Actuator::new(1, MockOut(state), state, 0, false)
    }

    fn make(short: bool, long: bool, super_long: bool) -> Clickable<MockIn> {
        let spec = ClickableSpec {
            id: 1,
            pin: MockIn(Cell::new(false)),
            actuators_short: Vec::new(),
            actuators_long: Vec::new(),
            actuators_super_long: Vec::new(),
            short_ok: short,
            long_ok: long,
            super_long_ok: super_long,
            net_long_ok: false,
            net_super_long_ok: false,
            long_kind: LongClickKind::Normal,
            super_long_kind: SuperLongClickKind::Normal,
            long_fallback: FallbackKind::LocalFallback,
            super_long_fallback: FallbackKind::LocalFallback,
            debounce_ms: 20,
            long_ms: 400,
            super_long_ms: 1000,
        };
        let mut c = Clickable::from_spec(spec, 0);
        c.check();
        c
    }

    fn press(c: &mut Clickable<MockIn>, level: bool) {
        c.pin.0.set(level);
    }

    #[test]
    fn short_click_sequence() {
        let mut c = make(true, true, true);
        assert_eq!(c.click_detection(0), ClickEvent::None); // idle, low
        press(&mut c, true);
        assert_eq!(c.click_detection(0), ClickEvent::None); // idle -> debouncing
        assert_eq!(c.click_detection(10), ClickEvent::None); // still debouncing
        assert_eq!(c.click_detection(20), ClickEvent::None); // confirm -> pressed (not quick)
        press(&mut c, false);
        assert_eq!(c.click_detection(30), ClickEvent::ShortClick);
    }

    #[test]
    fn no_spurious_short_after_long_hold() {
        let mut c = make(true, true, true);
        press(&mut c, true);
        c.click_detection(0);
        c.click_detection(20); // -> pressed
        assert_eq!(c.click_detection(420), ClickEvent::LongClick);
        press(&mut c, false);
        assert_eq!(c.click_detection(430), ClickEvent::NoClick);
    }

    #[test]
    fn super_long_preempts_long_in_same_press() {
        let mut c = make(true, true, true);
        press(&mut c, true);
        c.click_detection(0);
        c.click_detection(20); // -> pressed
        assert_eq!(c.click_detection(1020), ClickEvent::SuperLongClick);
        // long threshold already long past; must not also fire LONG afterwards
        assert_eq!(c.click_detection(1030), ClickEvent::NoClickKeepingClicked);
        press(&mut c, false);
        assert_eq!(c.click_detection(1040), ClickEvent::NoClick);
    }

    #[test]
    fn quick_click_fires_on_press_never_on_release() {
        let mut c = make(true, false, false);
        assert!(c.quick_ok());
        press(&mut c, true);
        c.click_detection(0);
        assert_eq!(c.click_detection(20), ClickEvent::ShortClickQuick);
        press(&mut c, false);
        assert_eq!(c.click_detection(30), ClickEvent::NoClick);
    }

    #[test]
    fn short_release_without_short_ok_is_not_short_clickable() {
        let mut c = make(false, true, false);
        press(&mut c, true);
        c.click_detection(0);
        c.click_detection(20); // -> pressed (not quick: long_ok true)
        press(&mut c, false);
        assert_eq!(c.click_detection(30), ClickEvent::NoClickNotShortClickable);
    }

    #[test]
    fn bounce_during_debounce_returns_to_idle() {
        let mut c = make(true, false, false);
        press(&mut c, true);
        c.click_detection(0);
        press(&mut c, false);
        assert_eq!(c.click_detection(20), ClickEvent::None);
        // back in idle; a fresh press starts debouncing again
        press(&mut c, true);
        assert_eq!(c.click_detection(25), ClickEvent::None);
    }

    #[test]
    fn valid_requires_capability_and_nonempty_actuators() {
        let mut spec = ClickableSpec {
            id: 2,
            pin: MockIn(Cell::new(false)),
            actuators_short: Vec::new(),
            actuators_long: Vec::new(),
            actuators_super_long: Vec::new(),
            short_ok: true,
            long_ok: false,
            super_long_ok: false,
            net_long_ok: false,
            net_super_long_ok: false,
            long_kind: LongClickKind::Normal,
            super_long_kind: SuperLongClickKind::Normal,
            long_fallback: FallbackKind::LocalFallback,
            super_long_fallback: FallbackKind::LocalFallback,
            debounce_ms: 20,
            long_ms: 400,
            super_long_ms: 1000,
        };
        let mut c = Clickable::from_spec(spec, 0);
        c.check();
        assert!(!c.valid(), "no actuators attached means invalid");
        spec = ClickableSpec {
            id: 2,
            pin: MockIn(Cell::new(false)),
            actuators_short: {
                let mut v = Vec::new();
                v.push(0).unwrap();
                v
            },
            actuators_long: Vec::new(),
            actuators_super_long: Vec::new(),
            short_ok: true,
            long_ok: false,
            super_long_ok: false,
            net_long_ok: false,
            net_super_long_ok: false,
            long_kind: LongClickKind::Normal,
            super_long_kind: SuperLongClickKind::Normal,
            long_fallback: FallbackKind::LocalFallback,
            super_long_fallback: FallbackKind::LocalFallback,
            debounce_ms: 20,
            long_ms: 400,
            super_long_ms: 1000,
        };
        let mut c2 = Clickable::from_spec(spec, 0);
        c2.check();
        assert!(c2.valid());
    }

    #[test]
    fn long_click_normal_sets_on_when_strictly_less_than_half_on() {
        let c = make(false, true, false);
        let mut acts = [actuator(false), actuator(false)];
        // neither configured via spec short/long lists (test helper leaves them empty);
        // exercise the kind logic directly through a clickable with explicit lists.
        let mut spec_acts = Vec::<usize, 8>::new();
        spec_acts.push(0).unwrap();
        spec_acts.push(1).unwrap();
        let spec = ClickableSpec {
            id: 3,
            pin: MockIn(Cell::new(false)),
            actuators_short: Vec::new(),
            actuators_long: spec_acts,
            actuators_super_long: Vec::new(),
            short_ok: false,
            long_ok: true,
            super_long_ok: false,
            net_long_ok: false,
            net_super_long_ok: false,
            long_kind: LongClickKind::Normal,
            super_long_kind: SuperLongClickKind::Normal,
            long_fallback: FallbackKind::LocalFallback,
            super_long_fallback: FallbackKind::LocalFallback,
            debounce_ms: 20,
            long_ms: 400,
            super_long_ms: 1000,
        };
        let mut cc = Clickable::from_spec(spec, 0);
        cc.check();
        let _ = c; // unused placeholder clickable from `make`
        assert!(cc.long_click(0, &mut acts));
        assert!(acts[0].state() && acts[1].state());
    }

    #[test]
    fn long_click_normal_exact_half_turns_off() {
        let spec_acts = {
            let mut v = Vec::<usize, 8>::new();
            v.push(0).unwrap();
            v.push(1).unwrap();
            v
        };
        let spec = ClickableSpec {
            id: 3,
            pin: MockIn(Cell::new(false)),
            actuators_short: Vec::new(),
            actuators_long: spec_acts,
            actuators_super_long: Vec::new(),
            short_ok: false,
            long_ok: true,
            super_long_ok: false,
            net_long_ok: false,
            net_super_long_ok: false,
            long_kind: LongClickKind::Normal,
            super_long_kind: SuperLongClickKind::Normal,
            long_fallback: FallbackKind::LocalFallback,
            super_long_fallback: FallbackKind::LocalFallback,
            debounce_ms: 20,
            long_ms: 400,
            super_long_ms: 1000,
        };
        let mut cc = Clickable::from_spec(spec, 0);
        cc.check();
        let mut acts = [actuator(true), actuator(false)]; // 1 of 2 on == exact half
        assert!(cc.long_click(1000, &mut acts));
        assert!(!acts[0].state() && !acts[1].state());
    }

    #[test]
    fn super_long_selective_skips_protected() {
        let spec_acts = {
            let mut v = Vec::<usize, 8>::new();
            v.push(0).unwrap();
            v.push(1).unwrap();
            v
        };
        let spec = ClickableSpec {
            id: 4,
            pin: MockIn(Cell::new(false)),
            actuators_short: Vec::new(),
            actuators_long: Vec::new(),
            actuators_super_long: spec_acts,
            short_ok: false,
            long_ok: false,
            super_long_ok: true,
            net_long_ok: false,
            net_super_long_ok: false,
            long_kind: LongClickKind::Normal,
            super_long_kind: SuperLongClickKind::Selective,
            long_fallback: FallbackKind::LocalFallback,
            super_long_fallback: FallbackKind::LocalFallback,
            debounce_ms: 20,
            long_ms: 400,
            super_long_ms: 1000,
        };
        let mut cc = Clickable::from_spec(spec, 0);
        cc.check();
        let mut acts = [actuator(true), Actuator::new(2, MockOut(true), true, 0, true)];
        assert!(cc.super_long_click_selective(0, &mut acts));
        assert!(!acts[0].state());
        assert!(acts[1].state(), "protected actuator must stay on");
    }
}
