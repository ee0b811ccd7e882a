//! Disk addressing and DMA register conventions.

use serde::{Deserialize, Serialize};

use crate::error::{PioError, PioResult};

const MAX_TRACK: u16 = 0o1777;
const MAX_HEAD: u8 = 0o77;
const MAX_RECORD: u8 = 0o377;

/// Drive geometry used to turn track/head/record into a file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskGeometry {
    pub heads: u32,
    pub sectors_per_track: u32,
    pub sector_bytes: u32,
}

impl Default for DiskGeometry {
    fn default() -> Self {
        Self {
            heads: 40,
            sectors_per_track: 9,
            sector_bytes: 2080,
        }
    }
}

impl DiskGeometry {
    /// Linear record number of a track/head/record triple. None if it
    /// doesn't fit in 64 bits.
    pub fn record_number(&self, track: u16, head: u8, record: u8) -> Option<u64> {
        let spt = self.sectors_per_track as u64;
        (track as u64)
            .checked_mul(self.heads as u64)?
            .checked_mul(spt)?
            .checked_add((head as u64).checked_mul(spt)?)?
            .checked_add(record as u64)
    }

    /// Byte offset of a record in the unit image. None on overflow.
    pub fn byte_offset(&self, track: u16, head: u8, record: u8) -> Option<u64> {
        self.record_number(track, head, record)?
            .checked_mul(self.sector_bytes as u64)
    }

    /// Check that every field is non-zero and the last addressable record
    /// (track 1023, head 63, record 255) ends inside a 64-bit offset.
    pub fn validate(&self) -> PioResult<()> {
        if self.heads == 0 || self.sectors_per_track == 0 || self.sector_bytes == 0 {
            return Err(PioError::Config(format!(
                "disk geometry fields must be non-zero: {self:?}"
            )));
        }
        self.byte_offset(MAX_TRACK, MAX_HEAD, MAX_RECORD)
            .and_then(|offset| offset.checked_add(self.sector_bytes as u64))
            .map(|_| ())
            .ok_or_else(|| PioError::Config(format!("disk geometry too large: {self:?}")))
    }
}

/// Index of the word-count register for a DMA channel. The address register
/// follows it. Bit 0 of the channel picks the odd half of a register pair
/// bank, so channel 2 lands at 4, not 2.
pub fn dma_register_index(channel: u16) -> usize {
    (((channel & 0o36) << 1) | (channel & 1)) as usize
}

/// Words left to transfer according to a DMA count register.
///
/// The register holds the negated count shifted left four bits; the low four
/// bits are ignored.
pub fn dma_word_count(register: u16) -> i16 {
    ((register as i16) >> 4).wrapping_neg()
}

/// Count register value for a transfer of `words` words (at most 2047).
pub fn dma_count_register(words: u16) -> u16 {
    ((words as i16).wrapping_neg() << 4) as u16
}

/// Unit index for the one-hot unit field of a select order.
///
/// `0001`, `0010`, `0100`, `1000` select units 0 through 3. The field is
/// shifted right once, so `1000` would come out as 4 and is folded back to 3.
pub fn unit_index(unit_field: u8) -> u8 {
    match (unit_field & 0o17) >> 1 {
        4 => 3,
        unit => unit,
    }
}
