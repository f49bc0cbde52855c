//! Error taxonomy (spec.md §7).
//!
//! Two severities only: configuration-fatal errors, which the scheduler
//! turns into an unconditional reset, and inbound-malformed records, which
//! are dropped silently and never escalate. Network-click timeout and
//! switch-debounce "no change" are *not* errors; they are normal
//! cancellation/no-op outcomes represented as plain `bool`s at their call
//! sites, per spec.md §7.

use heapless::String;

/// Maximum length of a human-readable fatal-error message kept for the
/// debug channel. Bounded so the error type stays `Copy`-free but
/// allocation-free.
pub const FATAL_MESSAGE_CAP: usize = 64;

/// Configuration-fatal errors raised while building up a [`crate::registry::Registry`].
///
/// Every variant here is unrecoverable: the caller must route it to
/// [`crate::hal::ResetSink::trigger`] after logging, never attempt to
/// continue operating with a partially valid registry.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// A registry's fixed-capacity array is full.
    #[error("registry capacity exceeded for {kind} (capacity {capacity})")]
    CapacityExceeded {
        /// Which registry overflowed ("actuator", "clickable", "indicator").
        kind: &'static str,
        /// The compile-time capacity that was exceeded.
        capacity: usize,
    },
    /// Two entries of the same kind were configured with the same id.
    #[error("duplicate id {id} among {kind}")]
    DuplicateId {
        /// Which registry contains the clash.
        kind: &'static str,
        /// The id that was used more than once.
        id: u8,
    },
    /// An id of zero was supplied; zero is the reserved "no id" sentinel.
    #[error("id 0 is reserved and cannot be used for {kind}")]
    ReservedZeroId {
        /// Which registry rejected the id.
        kind: &'static str,
    },
    /// A `Clickable` references an actuator index that does not exist.
    #[error("clickable {clickable_id} references an out-of-range actuator index")]
    DanglingActuatorRef {
        /// The offending clickable's id.
        clickable_id: u8,
    },
}

impl FatalError {
    /// Render a bounded-length message suitable for a fixed-size debug
    /// channel buffer.
    pub fn debug_message(&self) -> String<FATAL_MESSAGE_CAP> {
        let mut s: String<FATAL_MESSAGE_CAP> = String::new();
        // `write!` on a `heapless::String` truncates silently on overflow,
        // which is exactly the bounded behavior we want here.
        use core::fmt::Write;
        let _ = write!(s, "{}", self);
        s
    }
}

/// Why an inbound record was silently dropped (spec.md §7
/// "Inbound-malformed"). Never surfaced to the link layer as a connection
/// problem; purely informational for the debug log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeReject {
    /// The bytes did not parse as a valid record in the active framing.
    Malformed,
    /// A `SET_STATE` vector's length did not equal the actuator count.
    WrongLength,
    /// The `p` command byte did not match any known command.
    UnknownCommand(u8),
    /// A reserved-zero id/command/kind value appeared where a nonzero
    /// value was required.
    InvalidEnumValue,
}

impl core::fmt::Display for DecodeReject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeReject::Malformed => write!(f, "malformed record"),
            DecodeReject::WrongLength => write!(f, "state vector length mismatch"),
            DecodeReject::UnknownCommand(p) => write!(f, "unknown command {p}"),
            DecodeReject::InvalidEnumValue => write!(f, "reserved zero value used as an id/enum"),
        }
    }
}
