//! Aggregates a set of actuator states into a single output (spec.md
//! §3/§4.4).

use heapless::Vec;

use crate::actuator::Actuator;
use crate::hal::DigitalOut;

/// Aggregation mode (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMode {
    /// True when at least one controlled actuator is on.
    Any,
    /// True only when every controlled actuator is on.
    All,
    /// True when strictly more than half of the controlled actuators are
    /// on; ties resolve to off.
    Majority,
}

/// A digital output whose value is a function of a set of actuator states.
pub struct Indicator<P: DigitalOut> {
    pin: P,
    controlled: Vec<usize, 16>,
    mode: IndicatorMode,
    state: bool,
}

impl<P: DigitalOut> Indicator<P> {
    pub(crate) fn new(pin: P, controlled: Vec<usize, 16>, mode: IndicatorMode) -> Self {
        Self {
            pin,
            controlled,
            mode,
            state: false,
        }
    }

    pub fn state(&self) -> bool {
        self.state
    }

    /// Recompute the aggregate and write the output pin only when the
    /// computed value differs from the cached one.
    pub fn refresh<A>(&mut self, actuators: &[Actuator<A>])
    where
        A: DigitalOut,
    {
        let total = self.controlled.len();
        let computed = match self.mode {
            IndicatorMode::Any => self
                .controlled
                .iter()
                .filter_map(|&idx| actuators.get(idx))
                .any(|a| a.state()),
            IndicatorMode::All => {
                total > 0
                    && self
                        .controlled
                        .iter()
                        .filter_map(|&idx| actuators.get(idx))
                        .all(|a| a.state())
            }
            IndicatorMode::Majority => {
                let on_count = self
                    .controlled
                    .iter()
                    .filter_map(|&idx| actuators.get(idx))
                    .filter(|a| a.state())
                    .count();
                on_count * 2 > total
            }
        };
        if computed != self.state {
            self.pin.write(computed);
            self.state = computed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockOut(bool, u32);
    impl DigitalOut for MockOut {
        fn write(&mut self, level: bool) {
            self.0 = level;
            self.1 += 1;
        }
    }

    fn actuator(state: bool) -> Actuator<MockOut> {
        Actuator::new(1, MockOut(state, 0), state, 0, false)
    }

    fn idxs(xs: &[usize]) -> Vec<usize, 16> {
        let mut v = Vec::new();
        for &x in xs {
            v.push(x).unwrap();
        }
        v
    }

    #[test]
    fn any_mode() {
        let mut ind = Indicator::new(MockOut(false, 0), idxs(&[0, 1]), IndicatorMode::Any);
        let acts = [actuator(false), actuator(true)];
        ind.refresh(&acts);
        assert!(ind.state());
    }

    #[test]
    fn all_mode_requires_every_one_on() {
        let mut ind = Indicator::new(MockOut(false, 0), idxs(&[0, 1]), IndicatorMode::All);
        let acts = [actuator(true), actuator(false)];
        ind.refresh(&acts);
        assert!(!ind.state());
        let acts2 = [actuator(true), actuator(true)];
        ind.refresh(&acts2);
        assert!(ind.state());
    }

    #[test]
    fn all_mode_empty_set_is_false() {
        let mut ind: Indicator<MockOut> = Indicator::new(MockOut(false, 0), idxs(&[]), IndicatorMode::All);
        let acts: [Actuator<MockOut>; 0] = [];
        ind.refresh(&acts);
        assert!(!ind.state());
    }

    #[test]
    fn majority_mode_tie_resolves_off() {
        let mut ind = Indicator::new(MockOut(false, 0), idxs(&[0, 1]), IndicatorMode::Majority);
        let acts = [actuator(true), actuator(false)];
        ind.refresh(&acts);
        assert!(!ind.state(), "1-of-2 is a tie, must resolve off");
    }

    #[test]
    fn majority_mode_strict_majority() {
        let mut ind = Indicator::new(MockOut(false, 0), idxs(&[0, 1, 2]), IndicatorMode::Majority);
        let acts = [actuator(true), actuator(true), actuator(false)];
        ind.refresh(&acts);
        assert!(ind.state());
    }

    #[test]
    fn writes_pin_only_on_change() {
        let mut ind = Indicator::new(MockOut(false, 0), idxs(&[0]), IndicatorMode::Any);
        let off = [actuator(false)];
        ind.refresh(&off);
        assert_eq!(ind.pin.1, 0, "no change from initial cached false, no write");
        let on = [actuator(true)];
        ind.refresh(&on);
        assert_eq!(ind.pin.1, 1);
        ind.refresh(&on);
        assert_eq!(ind.pin.1, 1, "unchanged value must not rewrite the pin");
    }
}
