//! Wire protocol record types (spec.md §6).
//!
//! Both framings carry the same logical record, encoded with short,
//! single-letter keys. `serde` derives the field mapping once; `serde_json`
//! and `rmp_serde::to_vec_named` each encode it byte-exactly to the
//! corresponding on-the-wire representation spec.md §6 specifies.

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Command byte `p` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    DeviceDetails = 1,
    ActuatorsState = 2,
    NetworkClick = 3,
    Boot = 4,
    Ping = 5,
    RequestDetails = 10,
    RequestState = 11,
    SetState = 12,
    SetSingleActuator = 13,
    NetworkClickAck = 14,
    Failover = 15,
    FailoverClick = 16,
}

impl Command {
    /// Decode a raw command byte. `0` is the reserved invalid sentinel
    /// (spec.md §4.8 "Validation-by-convention"); any other unrecognized
    /// byte is also rejected, per the Dispatcher's "other -> log unknown"
    /// row.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Command::DeviceDetails),
            2 => Some(Command::ActuatorsState),
            3 => Some(Command::NetworkClick),
            4 => Some(Command::Boot),
            5 => Some(Command::Ping),
            10 => Some(Command::RequestDetails),
            11 => Some(Command::RequestState),
            12 => Some(Command::SetState),
            13 => Some(Command::SetSingleActuator),
            14 => Some(Command::NetworkClickAck),
            15 => Some(Command::Failover),
            16 => Some(Command::FailoverClick),
            _ => None,
        }
    }
}

/// Click kind `t` on the wire (spec.md §6). `0` is reserved/invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireClickKind {
    Long = 1,
    SuperLong = 2,
}

impl WireClickKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(WireClickKind::Long),
            2 => Some(WireClickKind::SuperLong),
            _ => None,
        }
    }
}

/// A state scalar or vector: `s` is either a single `0`/`1` byte or an
/// array of them (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StateField {
    Scalar(u8),
    Vector(Vec<u8, 32>),
}

/// The maximum number of actuator/clickable ids a `DEVICE_DETAILS` record
/// can carry, and the maximum length of a device name string.
pub const MAX_IDS: usize = 32;
pub const MAX_NAME: usize = 32;

/// One wire record. Every field is optional except `p`: a record only
/// populates the fields its command needs, and a missing field decodes as
/// `None`, which the Dispatcher treats as the reserved invalid value
/// (spec.md §4.8 "Validation-by-convention").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub p: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub n: Option<heapless::String<MAX_NAME>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub a: Option<Vec<u8, MAX_IDS>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub b: Option<Vec<u8, MAX_IDS>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub s: Option<StateField>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub i: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub c: Option<u8>,
}

impl Record {
    /// A record carrying only `p`, with every other field absent.
    pub fn bare(command: Command) -> Self {
        Self {
            p: command as u8,
            n: None,
            a: None,
            b: None,
            s: None,
            i: None,
            t: None,
            c: None,
        }
    }

    pub fn network_click(kind: WireClickKind, id: u8, confirm: bool) -> Self {
        Self {
            p: Command::NetworkClick as u8,
            n: None,
            a: None,
            b: None,
            s: None,
            i: Some(id),
            t: Some(kind as u8),
            c: Some(confirm as u8),
        }
    }

    pub fn actuators_state(vector: Vec<u8, MAX_IDS>) -> Self {
        Self {
            p: Command::ActuatorsState as u8,
            n: None,
            a: None,
            b: None,
            s: Some(StateField::Vector(vector)),
            i: None,
            t: None,
            c: None,
        }
    }

    pub fn device_details(
        name: heapless::String<MAX_NAME>,
        actuator_ids: Vec<u8, MAX_IDS>,
        clickable_ids: Vec<u8, MAX_IDS>,
    ) -> Self {
        Self {
            p: Command::DeviceDetails as u8,
            n: Some(name),
            a: Some(actuator_ids),
            b: Some(clickable_ids),
            s: None,
            i: None,
            t: None,
            c: None,
        }
    }
}

/// Byte-exact BOOT/PING constants (spec.md §6), pre-encoded so they bypass
/// the general encoder entirely, as spec.md §4.7 requires ("emitted via a
/// raw byte write that bypasses the encoder").
pub mod constants {
    /// Text-framed BOOT: `{"p":4}\n`.
    pub const BOOT_TEXT: &[u8] = b"{\"p\":4}\n";
    /// Text-framed PING: `{"p":5}\n`.
    pub const PING_TEXT: &[u8] = b"{\"p\":5}\n";
    /// Binary-framed BOOT: fixmap{len1} "p" -> 4.
    pub const BOOT_BINARY: &[u8] = &[0x81, 0xA1, 0x70, 0x04];
    /// Binary-framed PING: fixmap{len1} "p" -> 5.
    pub const PING_BINARY: &[u8] = &[0x81, 0xA1, 0x70, 0x05];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_zero_and_unknown_are_rejected() {
        assert!(Command::from_u8(0).is_none());
        assert!(Command::from_u8(99).is_none());
        assert_eq!(Command::from_u8(12), Some(Command::SetState));
    }

    #[test]
    fn click_kind_zero_is_reserved() {
        assert!(WireClickKind::from_u8(0).is_none());
        assert_eq!(WireClickKind::from_u8(1), Some(WireClickKind::Long));
    }

    #[test]
    fn json_text_boot_is_byte_exact() {
        let rec = Record::bare(Command::Boot);
        let encoded = serde_json::to_vec(&rec).unwrap();
        let mut framed = encoded;
        framed.push(b'\n');
        assert_eq!(framed, constants::BOOT_TEXT);
    }

    #[test]
    fn json_text_ping_is_byte_exact() {
        let rec = Record::bare(Command::Ping);
        let encoded = serde_json::to_vec(&rec).unwrap();
        let mut framed = encoded;
        framed.push(b'\n');
        assert_eq!(framed, constants::PING_TEXT);
    }

    #[test]
    fn binary_boot_is_byte_exact() {
        let rec = Record::bare(Command::Boot);
        let encoded = rmp_serde::to_vec_named(&rec).unwrap();
        assert_eq!(encoded, constants::BOOT_BINARY);
    }

    #[test]
    fn binary_ping_is_byte_exact() {
        let rec = Record::bare(Command::Ping);
        let encoded = rmp_serde::to_vec_named(&rec).unwrap();
        assert_eq!(encoded, constants::PING_BINARY);
    }

    #[test]
    fn network_click_roundtrips_through_json() {
        let rec = Record::network_click(WireClickKind::Long, 7, false);
        let encoded = serde_json::to_string(&rec).unwrap();
        let decoded: Record = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.p, Command::NetworkClick as u8);
        assert_eq!(decoded.i, Some(7));
        assert_eq!(decoded.t, Some(1));
        assert_eq!(decoded.c, Some(0));
    }

    #[test]
    fn network_click_roundtrips_through_binary() {
        let rec = Record::network_click(WireClickKind::SuperLong, 3, true);
        let encoded = rmp_serde::to_vec_named(&rec).unwrap();
        let decoded: Record = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(decoded.i, Some(3));
        assert_eq!(decoded.t, Some(2));
        assert_eq!(decoded.c, Some(1));
    }
}
