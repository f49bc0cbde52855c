//! Fixed-capacity stores of actuators, clickables, and indicators
//! (spec.md §3/§4.5).

use heapless::Vec;

use crate::actuator::Actuator;
use crate::clickable::{Clickable, ClickableSpec};
use crate::error::FatalError;
use crate::hal::{DigitalIn, DigitalOut};
use crate::indicator::{Indicator, IndicatorMode};

/// A small linear id→index map. Real devices in this domain carry a
/// handful of buttons/relays, so a linear scan over a fixed-size array is
/// both simpler and cheaper than a hash map at this scale, and, unlike
/// `heapless::FnvIndexMap`, imposes no power-of-two capacity constraint.
struct IdIndexMap<const N: usize> {
    entries: Vec<(u8, usize), N>,
}

impl<const N: usize> IdIndexMap<N> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn get(&self, id: u8) -> Option<usize> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
    }

    fn contains(&self, id: u8) -> bool {
        self.get(id).is_some()
    }

    /// Returns `Err(())` if the map is already at capacity. The caller is
    /// responsible for duplicate-id rejection before calling this.
    fn insert(&mut self, id: u8, index: usize) -> Result<(), ()> {
        self.entries.push((id, index)).map_err(|_| ())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Registry of every actuator, clickable, and indicator on the device.
///
/// `N_ACT`/`N_CLICK`/`N_IND` are compile-time capacities (spec.md §4.5:
/// "capacities are compile-time upper bounds"). `PA` is the pin type shared
/// by every actuator, `PI` by every clickable's input pin, `PN` by every
/// indicator's output pin, homogeneous by design so the registry needs no
/// heap-allocated trait objects (spec.md's "no dynamic allocation"
/// non-goal); a board-support layer that has heterogeneous concrete pin
/// types is expected to type-erase them into one type before configuring
/// this registry (spec.md §1: hardware access is an assumed primitive).
pub struct Registry<PA, PI, PN, const N_ACT: usize, const N_CLICK: usize, const N_IND: usize>
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    actuators: Vec<Actuator<PA>, N_ACT>,
    clickables: Vec<Clickable<PI>, N_CLICK>,
    indicators: Vec<Indicator<PN>, N_IND>,
    actuator_ids: IdIndexMap<N_ACT>,
    clickable_ids: IdIndexMap<N_CLICK>,
    /// Precomputed indices of actuators carrying a nonzero auto-off timer,
    /// built by `finalize()` to accelerate the per-tick sweep (spec.md
    /// §4.5).
    auto_off_indices: Vec<usize, N_ACT>,
    finalized: bool,
}

impl<PA, PI, PN, const N_ACT: usize, const N_CLICK: usize, const N_IND: usize>
    Registry<PA, PI, PN, N_ACT, N_CLICK, N_IND>
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    pub fn new() -> Self {
        Self {
            actuators: Vec::new(),
            clickables: Vec::new(),
            indicators: Vec::new(),
            actuator_ids: IdIndexMap::new(),
            clickable_ids: IdIndexMap::new(),
            auto_off_indices: Vec::new(),
            finalized: false,
        }
    }

    pub fn actuators(&self) -> &[Actuator<PA>] {
        &self.actuators
    }

    pub fn actuators_mut(&mut self) -> &mut [Actuator<PA>] {
        &mut self.actuators
    }

    pub fn clickables(&self) -> &[Clickable<PI>] {
        &self.clickables
    }

    /// Split borrow of clickables (read-only) and actuators (mutable) so
    /// callers can look up a clickable and mutate actuators in the same
    /// scope without the compiler treating `self.registry` as a single
    /// borrowed unit.
    pub fn clickables_and_actuators_mut(&mut self) -> (&[Clickable<PI>], &mut [Actuator<PA>]) {
        (&self.clickables, &mut self.actuators)
    }

    pub fn clickables_mut(&mut self) -> &mut [Clickable<PI>] {
        &mut self.clickables
    }

    pub fn indicators(&self) -> &[Indicator<PN>] {
        &self.indicators
    }

    pub fn indicators_mut(&mut self) -> &mut [Indicator<PN>] {
        &mut self.indicators
    }

    pub fn actuator_index(&self, id: u8) -> Option<usize> {
        self.actuator_ids.get(id)
    }

    pub fn clickable_index(&self, id: u8) -> Option<usize> {
        self.clickable_ids.get(id)
    }

    /// Add an actuator. `id` must be nonzero and unique; overflow/duplicate
    /// is configuration-fatal (spec.md §7).
    pub fn add_actuator(
        &mut self,
        id: u8,
        pin: PA,
        default_state: bool,
        auto_off_ms: u32,
        protected: bool,
    ) -> Result<usize, FatalError> {
        if id == 0 {
            return Err(FatalError::ReservedZeroId { kind: "actuator" });
        }
        if self.actuator_ids.contains(id) {
            return Err(FatalError::DuplicateId { kind: "actuator", id });
        }
        let index = self.actuators.len();
        self.actuators
            .push(Actuator::new(id, pin, default_state, auto_off_ms, protected))
            .map_err(|_| FatalError::CapacityExceeded { kind: "actuator", capacity: N_ACT })?;
        self.actuator_ids
            .insert(id, index)
            .map_err(|_| FatalError::CapacityExceeded { kind: "actuator", capacity: N_ACT })?;
        Ok(index)
    }

    /// Add a clickable from its configuration spec. Actuator indices
    /// embedded in the spec must already refer to actuators added earlier.
    pub fn add_clickable(&mut self, spec: ClickableSpec<PI>) -> Result<usize, FatalError> {
        if spec.id == 0 {
            return Err(FatalError::ReservedZeroId { kind: "clickable" });
        }
        if self.clickable_ids.contains(spec.id) {
            return Err(FatalError::DuplicateId { kind: "clickable", id: spec.id });
        }
        for &idx in spec
            .actuators_short
            .iter()
            .chain(spec.actuators_long.iter())
            .chain(spec.actuators_super_long.iter())
        {
            if idx >= self.actuators.len() {
                return Err(FatalError::DanglingActuatorRef { clickable_id: spec.id });
            }
        }
        let id = spec.id;
        let index = self.clickables.len();
        self.clickables
            .push(Clickable::from_spec(spec, index))
            .map_err(|_| FatalError::CapacityExceeded { kind: "clickable", capacity: N_CLICK })?;
        self.clickable_ids
            .insert(id, index)
            .map_err(|_| FatalError::CapacityExceeded { kind: "clickable", capacity: N_CLICK })?;
        Ok(index)
    }

    /// Add an indicator aggregating the given actuator indices.
    pub fn add_indicator(
        &mut self,
        pin: PN,
        controlled: Vec<usize, 16>,
        mode: IndicatorMode,
    ) -> Result<usize, FatalError> {
        for &idx in &controlled {
            if idx >= self.actuators.len() {
                return Err(FatalError::DanglingActuatorRef { clickable_id: 0 });
            }
        }
        let index = self.indicators.len();
        self.indicators
            .push(Indicator::new(pin, controlled, mode))
            .map_err(|_| FatalError::CapacityExceeded { kind: "indicator", capacity: N_IND })?;
        Ok(index)
    }

    /// Run post-configuration validation and precomputation (spec.md
    /// §4.5): validity-check every clickable, precompute the auto-off
    /// subset, and detect duplicate ids (map size diverging from array
    /// size). `add_actuator`/`add_clickable` already reject duplicates
    /// eagerly, so the size check here is a defense-in-depth invariant,
    /// not the primary detection path.
    pub fn finalize(&mut self) -> Result<(), FatalError> {
        if self.actuator_ids.len() != self.actuators.len() {
            return Err(FatalError::DuplicateId { kind: "actuator", id: 0 });
        }
        if self.clickable_ids.len() != self.clickables.len() {
            return Err(FatalError::DuplicateId { kind: "clickable", id: 0 });
        }
        for clickable in &mut self.clickables {
            clickable.check();
        }
        self.auto_off_indices.clear();
        for (idx, act) in self.actuators.iter().enumerate() {
            if act.has_auto_off() {
                // Capacity is N_ACT, same as `actuators`, so this cannot
                // overflow.
                let _ = self.auto_off_indices.push(idx);
            }
        }
        self.finalized = true;
        Ok(())
    }

    pub fn finalized(&self) -> bool {
        self.finalized
    }

    /// Borrow a single clickable immutably alongside the full actuator
    /// slice mutably. `clickables` and `actuators` are disjoint fields, so
    /// this split is sound without any unsafe code; only a single `&mut
    /// self` method body can see both fields at once.
    pub fn clickable_and_actuators_mut(
        &mut self,
        idx: usize,
    ) -> (Option<&Clickable<PI>>, &mut [Actuator<PA>]) {
        (self.clickables.get(idx), &mut self.actuators)
    }

    /// Sweep every actuator that carries an auto-off timer; OR of changes.
    pub fn sweep_auto_off(&mut self, now: u32) -> bool {
        let mut changed = false;
        for &idx in &self.auto_off_indices {
            if let Some(act) = self.actuators.get_mut(idx) {
                changed |= act.check_auto_off(now);
            }
        }
        changed
    }

    /// `turn_off_unprotected_actuators()`: the NORMAL super-long-click
    /// action, device-wide (spec.md §4.3).
    pub fn turn_off_unprotected_actuators(&mut self, now: u32) -> bool {
        let mut changed = false;
        for act in &mut self.actuators {
            if !act.protected() {
                changed |= act.set_state(now, false);
            }
        }
        changed
    }

    /// Recompute every indicator from current actuator state.
    pub fn refresh_indicators(&mut self) {
        for ind in &mut self.indicators {
            ind.refresh(&self.actuators);
        }
    }
}

impl<PA, PI, PN, const N_ACT: usize, const N_CLICK: usize, const N_IND: usize> Default
    for Registry<PA, PI, PN, N_ACT, N_CLICK, N_IND>
where
    PA: DigitalOut,
    PI: DigitalIn,
    PN: DigitalOut,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clickable::{FallbackKind, LongClickKind, SuperLongClickKind};
    use core::cell::Cell;

    struct MockOut(bool);
    impl DigitalOut for MockOut {
        fn write(&mut self, level: bool) {
            self.0 = level;
        }
    }
    struct MockIn(Cell<bool>);
    impl DigitalIn for MockIn {
        fn read(&self) -> bool {
            self.0.get()
        }
    }

    type TestRegistry = Registry<MockOut, MockIn, MockOut, 4, 4, 4>;

    #[test]
    fn rejects_zero_id() {
        let mut reg = TestRegistry::new();
        let err = reg.add_actuator(0, MockOut(false), false, 0, false).unwrap_err();
        assert!(matches!(err, FatalError::ReservedZeroId { .. }));
    }

    #[test]
    fn rejects_duplicate_id() {
        let mut reg = TestRegistry::new();
        reg.add_actuator(1, MockOut(false), false, 0, false).unwrap();
        let err = reg.add_actuator(1, MockOut(false), false, 0, false).unwrap_err();
        assert!(matches!(err, FatalError::DuplicateId { .. }));
    }

    #[test]
    fn rejects_capacity_overflow() {
        let mut reg = TestRegistry::new();
        for id in 1..=4u8 {
            reg.add_actuator(id, MockOut(false), false, 0, false).unwrap();
        }
        let err = reg.add_actuator(5, MockOut(false), false, 0, false).unwrap_err();
        assert!(matches!(err, FatalError::CapacityExceeded { .. }));
    }

    #[test]
    fn finalize_precomputes_auto_off_and_checks_clickables() {
        let mut reg = TestRegistry::new();
        reg.add_actuator(1, MockOut(false), false, 500, false).unwrap();
        reg.add_actuator(2, MockOut(false), false, 0, false).unwrap();
        let mut shorts = Vec::new();
        shorts.push(0usize).unwrap();
        reg.add_clickable(ClickableSpec {
            id: 1,
            pin: MockIn(Cell::new(false)),
            actuators_short: shorts,
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
        })
        .unwrap();
        reg.finalize().unwrap();
        assert!(reg.clickables()[0].checked());
        assert!(reg.clickables()[0].valid());
        assert_eq!(reg.auto_off_indices.len(), 1);
        assert_eq!(reg.auto_off_indices[0], 0);
    }

    #[test]
    fn dangling_actuator_ref_is_fatal() {
        let mut reg = TestRegistry::new();
        let mut bogus = Vec::new();
        bogus.push(9usize).unwrap();
        let err = reg
            .add_clickable(ClickableSpec {
                id: 1,
                pin: MockIn(Cell::new(false)),
                actuators_short: bogus,
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
            })
            .unwrap_err();
        assert!(matches!(err, FatalError::DanglingActuatorRef { .. }));
    }

    #[test]
    fn turn_off_unprotected_leaves_protected_alone() {
        let mut reg = TestRegistry::new();
        reg.add_actuator(1, MockOut(true), true, 0, false).unwrap();
        reg.add_actuator(2, MockOut(true), true, 0, true).unwrap();
        reg.turn_off_unprotected_actuators(1_000_000);
        assert!(!reg.actuators()[0].state());
        assert!(reg.actuators()[1].state());
    }

    #[test]
    fn sweep_auto_off_only_touches_precomputed_subset() {
        let mut reg = TestRegistry::new();
        reg.add_actuator(1, MockOut(false), false, 1_000, false).unwrap();
        reg.add_actuator(2, MockOut(false), false, 0, false).unwrap();
        reg.finalize().unwrap();
        reg.actuators_mut()[0].set_state(0, true);
        assert!(!reg.sweep_auto_off(999));
        assert!(reg.sweep_auto_off(1_000));
        assert!(!reg.actuators()[0].state());
    }
}
