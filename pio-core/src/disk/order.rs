//! Channel program orders.
//!
//! An order is two or three words. The first word always carries the order
//! code in bits 15..12 and the execute-if flag in bit 11:
//!
//! ```text
//! word 0   | code:4 | if:1 | ...:7 | low:4 |
//! ```
//!
//! `low` is the record size for Format/Read/Write and the channel count
//! minus one for SelectDMA. The remaining layouts are:
//!
//! | order                    | word 1                                  | word 2                      |
//! |--------------------------|-----------------------------------------|-----------------------------|
//! | Format, Read, Write      | bits 9..0 track                         | bits 15..8 record, 5..0 head |
//! | Seek                     | bit 15 restore, bit 14 clear, 9..0 track |                             |
//! | SelectUnit               | bits 3..0 one-hot unit                  |                             |
//! | StoreStatus, StoreOAR    | memory address                          |                             |
//! | SelectDMA                | DMA channel number                      |                             |
//! | Interrupt                | vector address                          |                             |
//! | Jump                     | target address                          |                             |
//!
//! For Format the record field is the number of records to format.

use std::fmt;

/// Execute-if flag in the first word.
pub const EXECUTE_IF: u16 = 0o4000;

/// Order codes.
pub mod code {
    pub const HALT: u8 = 0;
    pub const FORMAT: u8 = 2;
    pub const SEEK: u8 = 3;
    pub const SELECT_UNIT: u8 = 4;
    pub const READ: u8 = 5;
    pub const WRITE: u8 = 6;
    pub const STALL: u8 = 7;
    pub const STORE_STATUS: u8 = 9;
    pub const STORE_OAR: u8 = 11;
    pub const SELECT_DMA: u8 = 13;
    pub const INTERRUPT: u8 = 14;
    pub const JUMP: u8 = 15;
}

const TRACK_MASK: u16 = 0o1777;
const HEAD_MASK: u16 = 0o77;
const LOW_MASK: u16 = 0o17;
const SEEK_RESTORE: u16 = 0o100000;
const SEEK_CLEAR: u16 = 0o40000;

/// Order code, bits 15..12 of the first word.
pub fn order_code(word0: u16) -> u8 {
    (word0 >> 12) as u8
}

/// Execute-if flag, bit 11 of the first word.
pub fn is_conditional(word0: u16) -> bool {
    word0 & EXECUTE_IF != 0
}

/// Number of words an order with this code occupies.
pub fn order_len(code: u8) -> u16 {
    match code {
        code::FORMAT | code::READ | code::WRITE => 3,
        _ => 2,
    }
}

/// Record size (Format/Read/Write) or channel count (SelectDMA), bits 3..0
/// of the first word.
pub fn low_field(word0: u16) -> u8 {
    (word0 & LOW_MASK) as u8
}

/// Track, bits 9..0 of the second word.
pub fn track(word1: u16) -> u16 {
    word1 & TRACK_MASK
}

/// Record number (or record count for Format), bits 15..8 of the third word.
pub fn record(word2: u16) -> u8 {
    (word2 >> 8) as u8
}

/// Head, bits 5..0 of the third word.
pub fn head(word2: u16) -> u8 {
    (word2 & HEAD_MASK) as u8
}

/// Seek restore flag, bit 15 of the second word.
pub fn seek_restore(word1: u16) -> bool {
    word1 & SEEK_RESTORE != 0
}

/// Seek clear flag, bit 14 of the second word.
pub fn seek_clear(word1: u16) -> bool {
    word1 & SEEK_CLEAR != 0
}

/// One-hot unit field, bits 3..0 of the second word.
pub fn unit_field(word1: u16) -> u8 {
    (word1 & LOW_MASK) as u8
}

/// Operands shared by Format, Read and Write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transfer {
    pub recsize: u8,
    pub track: u16,
    pub head: u8,
    pub record: u8,
}

impl Transfer {
    fn decode(words: [u16; 3]) -> Self {
        Self {
            recsize: low_field(words[0]),
            track: track(words[1]),
            head: head(words[2]),
            record: record(words[2]),
        }
    }

    fn encode(&self, code: u8) -> [u16; 3] {
        [
            ((code as u16) << 12) | (self.recsize as u16 & LOW_MASK),
            self.track & TRACK_MASK,
            ((self.record as u16) << 8) | (self.head as u16 & HEAD_MASK),
        ]
    }
}

/// A decoded channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Halt,
    /// `record` holds the number of records to format.
    Format(Transfer),
    Read(Transfer),
    Write(Transfer),
    Seek { track: u16, restore: bool, clear: bool },
    SelectUnit { unit_field: u8 },
    Stall,
    StoreStatus { addr: u16 },
    StoreOar { addr: u16 },
    SelectDma { channel_count: u8, channel: u16 },
    Interrupt { vector: u16 },
    Jump { target: u16 },
}

impl Order {
    /// Decode the order starting at `words[0]`. Unrecognized codes are
    /// returned as the error.
    pub fn decode(words: [u16; 3]) -> Result<Self, u8> {
        let w0 = words[0];
        let w1 = words[1];
        let order = match order_code(w0) {
            code::HALT => Order::Halt,
            code::FORMAT => Order::Format(Transfer::decode(words)),
            code::READ => Order::Read(Transfer::decode(words)),
            code::WRITE => Order::Write(Transfer::decode(words)),
            code::SEEK => Order::Seek {
                track: track(w1),
                restore: seek_restore(w1),
                clear: seek_clear(w1),
            },
            code::SELECT_UNIT => Order::SelectUnit {
                unit_field: unit_field(w1),
            },
            code::STALL => Order::Stall,
            code::STORE_STATUS => Order::StoreStatus { addr: w1 },
            code::STORE_OAR => Order::StoreOar { addr: w1 },
            code::SELECT_DMA => Order::SelectDma {
                channel_count: low_field(w0),
                channel: w1,
            },
            code::INTERRUPT => Order::Interrupt { vector: w1 },
            code::JUMP => Order::Jump { target: w1 },
            other => return Err(other),
        };
        Ok(order)
    }

    pub fn code(&self) -> u8 {
        match self {
            Order::Halt => code::HALT,
            Order::Format(_) => code::FORMAT,
            Order::Read(_) => code::READ,
            Order::Write(_) => code::WRITE,
            Order::Seek { .. } => code::SEEK,
            Order::SelectUnit { .. } => code::SELECT_UNIT,
            Order::Stall => code::STALL,
            Order::StoreStatus { .. } => code::STORE_STATUS,
            Order::StoreOar { .. } => code::STORE_OAR,
            Order::SelectDma { .. } => code::SELECT_DMA,
            Order::Interrupt { .. } => code::INTERRUPT,
            Order::Jump { .. } => code::JUMP,
        }
    }

    /// Words this order occupies.
    pub fn size(&self) -> u16 {
        order_len(self.code())
    }

    /// Encode as an unconditional order.
    pub fn encode(&self) -> Vec<u16> {
        self.encode_with(false)
    }

    /// Encode, optionally setting the execute-if flag.
    pub fn encode_with(&self, execute_if: bool) -> Vec<u16> {
        let op = (self.code() as u16) << 12;
        let mut words = match *self {
            Order::Format(t) | Order::Read(t) | Order::Write(t) => t.encode(self.code()).to_vec(),
            Order::Halt | Order::Stall => vec![op, 0],
            Order::Seek {
                track,
                restore,
                clear,
            } => {
                let mut w1 = track & TRACK_MASK;
                if restore {
                    w1 |= SEEK_RESTORE;
                }
                if clear {
                    w1 |= SEEK_CLEAR;
                }
                vec![op, w1]
            }
            Order::SelectUnit { unit_field } => vec![op, unit_field as u16 & LOW_MASK],
            Order::StoreStatus { addr } | Order::StoreOar { addr } => vec![op, addr],
            Order::SelectDma {
                channel_count,
                channel,
            } => vec![op | (channel_count as u16 & LOW_MASK), channel],
            Order::Interrupt { vector } => vec![op, vector],
            Order::Jump { target } => vec![op, target],
        };
        if execute_if {
            words[0] |= EXECUTE_IF;
        }
        words
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Halt => write!(f, "halt"),
            Order::Format(t) => write!(
                f,
                "format, head={}, track={}, records={}, recsize={}",
                t.head, t.track, t.record, t.recsize
            ),
            Order::Read(t) | Order::Write(t) => write!(
                f,
                "{}, head={}, track={}, rec={}, recsize={}",
                if matches!(self, Order::Read(_)) { "read" } else { "write" },
                t.head,
                t.track,
                t.record,
                t.recsize
            ),
            Order::Seek {
                track,
                restore,
                clear,
            } => write!(f, "seek track {track}, restore={restore}, clear={clear}"),
            Order::SelectUnit { unit_field } => write!(f, "select unit field {unit_field:04b}"),
            Order::Stall => write!(f, "stall"),
            Order::StoreStatus { addr } => write!(f, "store status to '{addr:o}"),
            Order::StoreOar { addr } => write!(f, "store OAR to '{addr:o}"),
            Order::SelectDma {
                channel_count,
                channel,
            } => write!(f, "set DMA channels, nch-1={channel_count}, channel='{channel:o}"),
            Order::Interrupt { vector } => write!(f, "interrupt through '{vector:o}"),
            Order::Jump { target } => write!(f, "jump to '{target:o}"),
        }
    }
}
