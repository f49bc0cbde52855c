//! Chained-setter configuration builders (spec.md §6 "Configuration
//! surface", §9 "Builder-style configuration").
//!
//! The user's one-shot boot-time `configure()` call wires buttons to
//! actuators, sets auto-off timers, and groups indicators using these
//! builders. Each `register()` call ingests the finished record into a
//! [`Registry`] exactly once; there is no mutation path back out.

use heapless::Vec;

use crate::clickable::{ClickableSpec, FallbackKind, LongClickKind, SuperLongClickKind};
use crate::error::FatalError;
use crate::hal::{DigitalIn, DigitalOut};
use crate::indicator::IndicatorMode;
use crate::registry::Registry;

/// Clickable debounce default (spec.md §6 tunables).
pub const DEFAULT_DEBOUNCE_MS: u32 = 20;
/// Long-click threshold default.
pub const DEFAULT_LONG_MS: u32 = 400;
/// Super-long-click threshold default.
pub const DEFAULT_SUPER_LONG_MS: u32 = 1000;

/// Chained-setter builder for one [`crate::actuator::Actuator`].
pub struct ActuatorBuilder<P: DigitalOut> {
    id: u8,
    pin: P,
    default_state: bool,
    auto_off_ms: u32,
    protected: bool,
}

impl<P: DigitalOut> ActuatorBuilder<P> {
    pub fn new(id: u8, pin: P) -> Self {
        Self {
            id,
            pin,
            default_state: false,
            auto_off_ms: 0,
            protected: false,
        }
    }

    pub fn default_state(mut self, default_state: bool) -> Self {
        self.default_state = default_state;
        self
    }

    /// `0` disables auto-off.
    pub fn auto_off_ms(mut self, auto_off_ms: u32) -> Self {
        self.auto_off_ms = auto_off_ms;
        self
    }

    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Ingest this actuator into `registry`, assigning it the next
    /// sequential index.
    pub fn register<PI, PN, const NA: usize, const NC: usize, const NI: usize>(
        self,
        registry: &mut Registry<P, PI, PN, NA, NC, NI>,
    ) -> Result<usize, FatalError>
    where
        PI: DigitalIn,
        PN: DigitalOut,
    {
        registry.add_actuator(self.id, self.pin, self.default_state, self.auto_off_ms, self.protected)
    }
}

/// Chained-setter builder for one [`crate::clickable::Clickable`].
pub struct ClickableBuilder<I: DigitalIn> {
    id: u8,
    pin: I,
    actuators_short: Vec<usize, 8>,
    actuators_long: Vec<usize, 8>,
    actuators_super_long: Vec<usize, 8>,
    short_ok: bool,
    long_ok: bool,
    super_long_ok: bool,
    net_long_ok: bool,
    net_super_long_ok: bool,
    long_kind: LongClickKind,
    super_long_kind: SuperLongClickKind,
    long_fallback: FallbackKind,
    super_long_fallback: FallbackKind,
    debounce_ms: u32,
    long_ms: u32,
    super_long_ms: u32,
}

impl<I: DigitalIn> ClickableBuilder<I> {
    pub fn new(id: u8, pin: I) -> Self {
        Self {
            id,
            pin,
            actuators_short: Vec::new(),
            actuators_long: Vec::new(),
            actuators_super_long: Vec::new(),
            short_ok: false,
            long_ok: false,
            super_long_ok: false,
            net_long_ok: false,
            net_super_long_ok: false,
            long_kind: LongClickKind::Normal,
            super_long_kind: SuperLongClickKind::Normal,
            long_fallback: FallbackKind::LocalFallback,
            super_long_fallback: FallbackKind::LocalFallback,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            long_ms: DEFAULT_LONG_MS,
            super_long_ms: DEFAULT_SUPER_LONG_MS,
        }
    }

    pub fn short(mut self, actuator_indices: &[usize]) -> Self {
        self.short_ok = true;
        self.actuators_short = copy_indices(actuator_indices);
        self
    }

    pub fn long(mut self, actuator_indices: &[usize], kind: LongClickKind) -> Self {
        self.long_ok = true;
        self.long_kind = kind;
        self.actuators_long = copy_indices(actuator_indices);
        self
    }

    pub fn super_long(mut self, actuator_indices: &[usize], kind: SuperLongClickKind) -> Self {
        self.super_long_ok = true;
        self.super_long_kind = kind;
        self.actuators_super_long = copy_indices(actuator_indices);
        self
    }

    /// Enable network-click coordination for LONG clicks, with the given
    /// fallback when the remote never acknowledges.
    pub fn network_long(mut self, fallback: FallbackKind) -> Self {
        self.net_long_ok = true;
        self.long_fallback = fallback;
        self
    }

    /// Enable network-click coordination for SUPER_LONG clicks.
    pub fn network_super_long(mut self, fallback: FallbackKind) -> Self {
        self.net_super_long_ok = true;
        self.super_long_fallback = fallback;
        self
    }

    pub fn debounce_ms(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn long_ms(mut self, ms: u32) -> Self {
        self.long_ms = ms;
        self
    }

    pub fn super_long_ms(mut self, ms: u32) -> Self {
        self.super_long_ms = ms;
        self
    }

    pub fn register<PA, PN, const NA: usize, const NC: usize, const NI: usize>(
        self,
        registry: &mut Registry<PA, I, PN, NA, NC, NI>,
    ) -> Result<usize, FatalError>
    where
        PA: DigitalOut,
        PN: DigitalOut,
    {
        registry.add_clickable(ClickableSpec {
            id: self.id,
            pin: self.pin,
            actuators_short: self.actuators_short,
            actuators_long: self.actuators_long,
            actuators_super_long: self.actuators_super_long,
            short_ok: self.short_ok,
            long_ok: self.long_ok,
            super_long_ok: self.super_long_ok,
            net_long_ok: self.net_long_ok,
            net_super_long_ok: self.net_super_long_ok,
            long_kind: self.long_kind,
            super_long_kind: self.super_long_kind,
            long_fallback: self.long_fallback,
            super_long_fallback: self.super_long_fallback,
            debounce_ms: self.debounce_ms,
            long_ms: self.long_ms,
            super_long_ms: self.super_long_ms,
        })
    }
}

/// Chained-setter builder for one [`crate::indicator::Indicator`].
pub struct IndicatorBuilder<P: DigitalOut> {
    pin: P,
    controlled: Vec<usize, 16>,
    mode: IndicatorMode,
}

impl<P: DigitalOut> IndicatorBuilder<P> {
    pub fn new(pin: P, mode: IndicatorMode) -> Self {
        Self { pin, controlled: Vec::new(), mode }
    }

    pub fn controlling(mut self, actuator_indices: &[usize]) -> Self {
        let mut v = Vec::new();
        for &idx in actuator_indices {
            let _ = v.push(idx);
        }
        self.controlled = v;
        self
    }

    pub fn register<PA, PI, const NA: usize, const NC: usize, const NI: usize>(
        self,
        registry: &mut Registry<PA, PI, P, NA, NC, NI>,
    ) -> Result<usize, FatalError>
    where
        PA: DigitalOut,
        PI: DigitalIn,
    {
        registry.add_indicator(self.pin, self.controlled, self.mode)
    }
}

fn copy_indices(src: &[usize]) -> Vec<usize, 8> {
    let mut v = Vec::new();
    for &idx in src {
        let _ = v.push(idx);
    }
    v
}
