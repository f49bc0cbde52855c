//! A single relay-style digital output (spec.md §3/§4.2).

use crate::hal::DigitalOut;
use crate::time::elapsed_at_least;

/// Process-wide switch debounce, shared by every actuator (spec.md §6
/// tunables: "Actuator switch debounce 100 ms").
pub const SWITCH_DEBOUNCE_MS: u32 = 100;

/// A controllable digital output with optional auto-off and protection.
pub struct Actuator<P: DigitalOut> {
    id: u8,
    pin: P,
    state: bool,
    default_state: bool,
    last_switch_time: u32,
    /// `0` means auto-off is disabled, per spec.md §3.
    auto_off_ms: u32,
    protected: bool,
}

impl<P: DigitalOut> Actuator<P> {
    /// Construct an actuator and immediately apply `default_state` to the
    /// hardware, per spec.md §3's boot lifecycle.
    pub fn new(id: u8, mut pin: P, default_state: bool, auto_off_ms: u32, protected: bool) -> Self {
        pin.write(default_state);
        Self {
            id,
            pin,
            state: default_state,
            default_state,
            last_switch_time: 0,
            auto_off_ms,
            protected,
        }
    }

    /// Stable small integer id, unique within the device.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Last level successfully applied to the hardware output.
    pub fn state(&self) -> bool {
        self.state
    }

    /// The state applied at construction time.
    pub fn default_state(&self) -> bool {
        self.default_state
    }

    /// Whether this actuator is exempt from "turn off all unprotected".
    pub fn protected(&self) -> bool {
        self.protected
    }

    /// Whether this actuator carries a nonzero auto-off timer.
    pub fn has_auto_off(&self) -> bool {
        self.auto_off_ms > 0
    }

    /// Attempt to drive the output to `target`.
    ///
    /// Returns `false` (no hardware write performed) when `target` already
    /// equals the cached `state`, or when less than
    /// [`SWITCH_DEBOUNCE_MS`] has elapsed since the last accepted switch.
    /// Both are normal outcomes per spec.md §7, never errors.
    pub fn set_state(&mut self, now: u32, target: bool) -> bool {
        if target == self.state {
            return false;
        }
        if !elapsed_at_least(now, self.last_switch_time, SWITCH_DEBOUNCE_MS) {
            return false;
        }
        self.pin.write(target);
        self.state = target;
        self.last_switch_time = now;
        true
    }

    /// `set_state(now, !state)`.
    pub fn toggle_state(&mut self, now: u32) -> bool {
        let target = !self.state;
        self.set_state(now, target)
    }

    /// Sweep the auto-off timer. If the actuator is on, has a nonzero
    /// auto-off timer, and at least `auto_off_ms` has elapsed since the
    /// last switch, turns it off.
    pub fn check_auto_off(&mut self, now: u32) -> bool {
        if self.state && self.auto_off_ms > 0 && elapsed_at_least(now, self.last_switch_time, self.auto_off_ms) {
            self.set_state(now, false)
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct MockPin {
        level: Cell<bool>,
        write_count: Cell<u32>,
    }
    impl MockPin {
        fn new() -> Self {
            Self { level: Cell::new(false), write_count: Cell::new(0) }
        }
    }
    impl DigitalOut for MockPin {
        fn write(&mut self, level: bool) {
            self.level.set(level);
            self.write_count.set(self.write_count.get() + 1);
        }
    }

    #[test]
    fn boot_applies_default_state() {
        let act = Actuator::new(1, MockPin::new(), true, 0, false);
        assert!(act.state());
        assert_eq!(act.pin.write_count.get(), 1);
    }

    #[test]
    fn set_state_noop_when_unchanged() {
        let mut act = Actuator::new(1, MockPin::new(), false, 0, false);
        assert!(!act.set_state(1000, false));
        assert_eq!(act.pin.write_count.get(), 1); // boot write only
    }

    #[test]
    fn set_state_debounced_second_call_returns_false_and_leaves_hw_unchanged() {
        let mut act = Actuator::new(1, MockPin::new(), false, 0, false);
        assert!(act.set_state(0, true));
        assert_eq!(act.pin.write_count.get(), 2);
        // within debounce window: second call is rejected
        assert!(!act.set_state(50, false));
        assert!(act.state());
        assert_eq!(act.pin.write_count.get(), 2);
        // after debounce window: accepted
        assert!(act.set_state(100, false));
        assert!(!act.state());
        assert_eq!(act.pin.write_count.get(), 3);
    }

    #[test]
    fn toggle_state_flips_and_respects_debounce() {
        let mut act = Actuator::new(1, MockPin::new(), false, 0, false);
        assert!(act.toggle_state(0));
        assert!(act.state());
        assert!(!act.toggle_state(10));
        assert!(act.state());
    }

    #[test]
    fn auto_off_fires_after_deadline_and_not_before() {
        let mut act = Actuator::new(1, MockPin::new(), false, 600_000, false);
        assert!(act.set_state(0, true));
        assert!(!act.check_auto_off(599_999));
        assert!(act.state());
        assert!(act.check_auto_off(600_000));
        assert!(!act.state());
    }

    #[test]
    fn auto_off_disabled_when_zero() {
        let mut act = Actuator::new(1, MockPin::new(), false, 0, false);
        assert!(act.set_state(0, true));
        assert!(!act.check_auto_off(10_000_000));
        assert!(act.state());
    }

    #[test]
    fn auto_off_does_nothing_when_already_off() {
        let mut act = Actuator::new(1, MockPin::new(), false, 500, false);
        assert!(!act.check_auto_off(10_000));
    }
}
