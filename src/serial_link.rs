//! Framed byte stream to/from the network bridge (spec.md §4.7).
//!
//! `SerialLink` owns the byte-level framing only: assembling inbound bytes
//! into [`Record`]s and serializing outbound `Record`s to bytes. Deciding
//! what an inbound record *means* is [`crate::dispatcher`]'s job.

use heapless::Vec;
use log::warn;
use nb::block;

use crate::hal::SerialBus;
use crate::protocol::{constants, Record};
use crate::time::elapsed_at_least;

/// Device sends a PING whenever no outbound traffic has occurred for this
/// long (spec.md §6 tunables).
pub const PING_INTERVAL_MS: u32 = 10_000;
/// The link is considered connected while a valid frame arrived within
/// this long (`PING_INTERVAL_MS + 200`, spec.md §6).
pub const CONNECTION_TIMEOUT_MS: u32 = PING_INTERVAL_MS + 200;

/// Framing mode, fixed for the lifetime of a `SerialLink` (spec.md §4.7:
/// "selected at build time").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// LF-terminated single-line JSON objects.
    Text,
    /// MessagePack objects written directly to the byte stream.
    Binary,
}

/// A framed, non-blocking byte link carrying [`Record`]s.
///
/// `CAP` bounds both the text-mode line buffer and the binary-mode receive
/// accumulator; a frame that would exceed it is treated as malformed and
/// the buffer is reset (spec.md §4.7, §5 "Resources").
pub struct SerialLink<B: SerialBus, const CAP: usize> {
    bus: B,
    mode: FramingMode,
    inbound: Vec<u8, CAP>,
    last_sent_time: u32,
    last_received_valid_time: u32,
    first_valid_received: bool,
}

impl<B: SerialBus, const CAP: usize> SerialLink<B, CAP> {
    pub fn new(bus: B, mode: FramingMode) -> Self {
        Self {
            bus,
            mode,
            inbound: Vec::new(),
            last_sent_time: 0,
            last_received_valid_time: 0,
            first_valid_received: false,
        }
    }

    pub fn is_connected(&self, now: u32) -> bool {
        self.first_valid_received
            && !elapsed_at_least(now, self.last_received_valid_time, CONNECTION_TIMEOUT_MS)
    }

    pub fn can_ping(&self, now: u32) -> bool {
        now.wrapping_sub(self.last_sent_time) > PING_INTERVAL_MS
    }

    /// Timestamp of the last byte stream that decoded into a valid record.
    pub fn last_received_valid_time(&self) -> u32 {
        self.last_received_valid_time
    }

    /// Direct access to the underlying bus. Intended for host-side
    /// simulation and testing, where the bus is an in-memory pipe the
    /// caller also needs to feed/drain directly; production board-support
    /// code has no reason to reach past the framing layer.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn write_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            // Writes are short and effectively synchronous at this
            // protocol's frame sizes (spec.md §5).
            let _ = block!(self.bus.write_byte(b));
        }
    }

    /// Encode and send a record, updating `last_sent_time`.
    pub fn send(&mut self, record: &Record, now: u32) {
        match self.mode {
            FramingMode::Text => {
                if let Ok(mut bytes) = serde_json::to_vec(record) {
                    bytes.push(b'\n');
                    self.write_all(&bytes);
                }
            }
            FramingMode::Binary => {
                if let Ok(bytes) = rmp_serde::to_vec_named(record) {
                    self.write_all(&bytes);
                }
            }
        }
        self.last_sent_time = now;
    }

    /// Emit the pre-encoded BOOT payload via a raw write that bypasses the
    /// record encoder entirely (spec.md §4.7).
    pub fn emit_boot(&mut self, now: u32) {
        let bytes = match self.mode {
            FramingMode::Text => constants::BOOT_TEXT,
            FramingMode::Binary => constants::BOOT_BINARY,
        };
        self.write_all(bytes);
        self.last_sent_time = now;
    }

    /// Emit the pre-encoded PING payload via a raw write.
    pub fn emit_ping(&mut self, now: u32) {
        let bytes = match self.mode {
            FramingMode::Text => constants::PING_TEXT,
            FramingMode::Binary => constants::PING_BINARY,
        };
        self.write_all(bytes);
        self.last_sent_time = now;
    }

    /// Pull whatever bytes are currently buffered on the wire and attempt
    /// to assemble one frame. Returns as soon as a record decodes, or once
    /// the bus runs dry (`WouldBlock`), whichever comes first; callers
    /// drain a tick's backlog with `while let Some(record) = link.poll_frame(now)`.
    pub fn poll_frame(&mut self, now: u32) -> Option<Record> {
        loop {
            match self.bus.read_byte() {
                Ok(byte) => {
                    if let Some(record) = self.feed_byte(byte, now) {
                        return Some(record);
                    }
                }
                Err(_) => return None,
            }
        }
    }

    fn feed_byte(&mut self, byte: u8, now: u32) -> Option<Record> {
        match self.mode {
            FramingMode::Text => self.feed_byte_text(byte, now),
            FramingMode::Binary => self.feed_byte_binary(byte, now),
        }
    }

    fn feed_byte_text(&mut self, byte: u8, now: u32) -> Option<Record> {
        if byte == b'\n' {
            let result = serde_json::from_slice::<Record>(&self.inbound);
            self.inbound.clear();
            return match result {
                Ok(record) => {
                    self.mark_valid(now);
                    Some(record)
                }
                Err(e) => {
                    warn!("dropping malformed text frame: {e}");
                    None
                }
            };
        }
        if self.inbound.push(byte).is_err() {
            // Overflow: reset and drop whatever was accumulating.
            warn!("inbound line buffer overflowed, resetting");
            self.inbound.clear();
        }
        None
    }

    fn feed_byte_binary(&mut self, byte: u8, now: u32) -> Option<Record> {
        if self.inbound.push(byte).is_err() {
            warn!("inbound binary buffer overflowed, resetting");
            self.inbound.clear();
            return None;
        }
        match rmp_serde::from_slice::<Record>(&self.inbound) {
            Ok(record) => {
                self.inbound.clear();
                self.mark_valid(now);
                Some(record)
            }
            Err(ref e) if is_incomplete(e) => {
                // Wait for more bytes; not an error (spec.md §4.7).
                None
            }
            Err(e) => {
                warn!("dropping malformed binary frame: {e}");
                self.inbound.clear();
                None
            }
        }
    }

    fn mark_valid(&mut self, now: u32) {
        self.first_valid_received = true;
        self.last_received_valid_time = now;
    }
}

/// Whether a MessagePack decode error means "not enough bytes yet" rather
/// than "this will never parse".
fn is_incomplete(err: &rmp_serde::decode::Error) -> bool {
    use std::io::ErrorKind;
    match err {
        rmp_serde::decode::Error::InvalidMarkerRead(io_err)
        | rmp_serde::decode::Error::InvalidDataRead(io_err) => {
            io_err.kind() == ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}
