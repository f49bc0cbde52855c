//! `lsh-core`: the physical-layer firmware engine for one distributed
//! home-automation node (spec.md §1).
//!
//! The crate owns everything between a pin-level [`hal`] abstraction and a
//! framed [`serial_link`] to the network bridge: actuator and click-input
//! state ([`actuator`], [`clickable`], [`indicator`]), their fixed-capacity
//! bookkeeping ([`registry`]), the wire [`protocol`], request/ACK tracking
//! for network-coordinated clicks ([`network_clicks`]), inbound command
//! handling ([`dispatcher`]), boot-time wiring ([`config`]), and the
//! cooperative super-loop that ties it all together ([`scheduler`]).
//!
//! Everything here is `no_std`-compatible in spirit, fixed-capacity
//! `heapless` collections throughout, no heap allocation, but the crate
//! itself links against `std` so the same source builds for host-side
//! simulation and testing without a second copy of the logic (spec.md §1
//! treats the concrete MCU peripherals, not `std` itself, as the assumed
//! boundary).

pub mod actuator;
pub mod clickable;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hal;
pub mod indicator;
pub mod network_clicks;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod serial_link;
pub mod time;

pub use actuator::Actuator;
pub use clickable::{Clickable, ClickableSpec, FallbackKind, LongClickKind, SuperLongClickKind};
pub use config::{ActuatorBuilder, ClickableBuilder, IndicatorBuilder};
pub use error::FatalError;
pub use indicator::{Indicator, IndicatorMode};
pub use network_clicks::NetworkClicks;
pub use protocol::Record;
pub use registry::Registry;
pub use scheduler::{Device, DeviceRegistry};
pub use serial_link::{FramingMode, SerialLink};
