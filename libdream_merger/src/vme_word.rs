//! Word-level decoding of the DreamDaq VME raw format.
//!
//! An event block is a 14-word preamble, a payload of module banks (each a
//! data-header word, one data word per converted channel, and a data-trailer
//! word), and a single event-trailer word. All layouts are LSB-first bit
//! ranges of a 32-bit word.

use serde::Serialize;

use super::constants::*;
use super::findings::{DataFault, Finding, ModuleKind};

/// Extract `width` bits of `word` starting at bit `offset` (0 = LSB).
#[inline]
pub fn bit_range(word: u32, offset: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && offset + width <= 32);
    (word >> offset) & (u32::MAX >> (32 - width))
}

/// Decoded fields of the 14-word event preamble.
///
/// Word layout: marker, event number, spill number, header size, trailer
/// size, payload size, event size, time (s), time (counts of 1e6 us), trigger
/// mask, three reserved words, end marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventHeader {
    pub event_number: u32,
    pub spill_number: u32,
    pub payload_size: u32,
    pub event_time_us: u64,
    pub trigger_mask: u32,
}

/// Validate and decode the event preamble as a unit.
///
/// Both magic words must match, the fixed header/trailer sizes must carry
/// their expected values and the size-consistency equation
/// `eventSize == headerSize + trailerSize + dataSize` must hold. Any
/// violation condemns the whole block.
pub fn parse_event_header(words: &[u32]) -> Result<EventHeader, Finding> {
    if words.len() != EVENT_HEADER_WORDS {
        return Err(Finding::HeaderSanityFailed);
    }
    if words[0] != EVENT_HEADER_MARKER
        || words[13] != HEADER_END_MARKER
        || words[3] != EXPECTED_HEADER_SIZE
        || words[4] != EXPECTED_TRAILER_SIZE
        || words[6] as u64 != words[3] as u64 + words[4] as u64 + words[5] as u64
    {
        return Err(Finding::HeaderSanityFailed);
    }
    Ok(EventHeader {
        event_number: words[1],
        spill_number: words[2],
        payload_size: words[5],
        event_time_us: words[7] as u64 + 1_000_000 * words[8] as u64,
        trigger_mask: words[9],
    })
}

/// Decoded fields of a module data-header word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataHeader {
    /// Number of data words following in this bank.
    pub channel_count: u32,
    pub crate_id: u32,
    /// Raw 4-bit module type code; see [`ModuleKind::from_type_code`].
    pub type_code: u32,
    pub geo: u32,
}

/// A word in bank-header position is either a real bank header or a 0xFE..
/// filler word. Whether the filler is tolerable depends on the read position,
/// which only the block decoder knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankHeaderWord {
    Bank(DataHeader),
    Padding,
}

pub fn parse_bank_header(word: u32) -> Result<BankHeaderWord, Finding> {
    match bit_range(word, 24, 3) {
        DATA_HEADER_MARKER => Ok(BankHeaderWord::Bank(DataHeader {
            channel_count: bit_range(word, 8, 6),
            crate_id: bit_range(word, 16, 4),
            type_code: bit_range(word, 20, 4),
            geo: bit_range(word, 27, 5),
        })),
        PADDING_MARKER => Ok(BankHeaderWord::Padding),
        _ => Err(Finding::InvalidDataHeader),
    }
}

/// Decoded fields of a single module data word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataWord {
    /// Converted value, 12 bits.
    pub value: u16,
    /// Overflow/underflow flag bits.
    pub flags: u8,
    /// Module channel, already corrected for the 16-channel variants.
    pub channel: u16,
    pub geo: u32,
}

/// Decode a data word according to the owning bank's module kind.
///
/// Flag conditions are advisory: the fields are returned alongside the
/// finding and the caller records the value either way.
pub fn parse_data_word(word: u32, module: ModuleKind) -> (DataWord, Option<Finding>) {
    let marker = bit_range(word, 24, 3);
    let flag_field = bit_range(word, 12, 3) as u8;
    let flags = flag_field & 0b11;
    let data = DataWord {
        value: bit_range(word, 0, 12) as u16,
        flags,
        channel: module.channel(bit_range(word, 16, 8)),
        geo: bit_range(word, 27, 5),
    };
    let valid_bit_ok = !module.has_valid_bit() || (flag_field >> 2) & 0b1 == 1;
    let finding = if marker == DATA_WORD_MARKER && valid_bit_ok && flags == 0 {
        None
    } else {
        Some(Finding::DataFault {
            module,
            fault: DataFault::from_flags(flags),
        })
    };
    (data, finding)
}

/// Decoded fields of a module data-trailer word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTrailer {
    pub event_counter: u32,
    pub geo: u32,
}

pub fn parse_bank_trailer(word: u32) -> Result<DataTrailer, Finding> {
    if bit_range(word, 24, 3) != DATA_TRAILER_MARKER {
        return Err(Finding::InvalidDataTrailer);
    }
    Ok(DataTrailer {
        event_counter: bit_range(word, 0, 24),
        geo: bit_range(word, 27, 5),
    })
}

pub fn parse_event_trailer(word: u32) -> Result<(), Finding> {
    if word != EVENT_TRAILER_MARKER {
        return Err(Finding::InvalidEventTrailer);
    }
    Ok(())
}
