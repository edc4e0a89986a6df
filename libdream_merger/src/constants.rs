//! Fixed constants of the two raw data formats handled by the merger.

/// First word of every DreamDaq event block.
pub const EVENT_HEADER_MARKER: u32 = 0xccaa_ffee;
/// Fourteenth (final) word of the event preamble.
pub const HEADER_END_MARKER: u32 = 0xacca_dead;
/// Terminal word of every DreamDaq event block.
pub const EVENT_TRAILER_MARKER: u32 = 0xbbee_ddaa;

/// Number of 32-bit words in the event preamble.
pub const EVENT_HEADER_WORDS: usize = 14;
/// Value the headerSize preamble word must carry.
pub const EXPECTED_HEADER_SIZE: u32 = 0xe;
/// Value the trailerSize preamble word must carry.
pub const EXPECTED_TRAILER_SIZE: u32 = 0x1;

/// Three-bit marker of a module data-header word.
pub const DATA_HEADER_MARKER: u32 = 0b010;
/// Three-bit marker of a module data-trailer word.
pub const DATA_TRAILER_MARKER: u32 = 0b100;
/// Three-bit marker of a 0xFE.. filler word, tolerated only at the exact end
/// of the declared payload.
pub const PADDING_MARKER: u32 = 0b110;
/// Three-bit marker of a module data word.
pub const DATA_WORD_MARKER: u32 = 0b000;

/// Channels spanned by one QDC crate in the flat ADC numbering.
pub const QDC_CRATE_STRIDE: u16 = 32;

/// Trigger-mask value of a physics trigger.
pub const PHYSICS_TRIGGER_MASK: u32 = 5;
/// Trigger-mask value of a pedestal (calibration) trigger, the reference
/// marker used for stream alignment.
pub const PEDESTAL_TRIGGER_MASK: u32 = 2;

/// FERS boards read out at the test beam. A trigger group with more boards
/// than this is malformed.
pub const MAX_BOARDS: u8 = 5;
/// Channels read out by each FERS 5202 board.
pub const NCHANNELS: usize = 64;
/// Byte size of the Janus file-level header.
pub const FILE_HEADER_SIZE: usize = 25;
/// Byte size of the fixed per-fragment preamble: event size (2), board id (1),
/// timestamp (8), trigger id (8), channel mask (8).
pub const FRAGMENT_PREAMBLE_SIZE: usize = 27;

// Channel-type flag bits in a FERS fragment payload.
pub const CHTYPE_HAS_HG: u8 = 0x01;
pub const CHTYPE_HAS_LG: u8 = 0x02;
pub const CHTYPE_HAS_TOA: u8 = 0x10;
pub const CHTYPE_HAS_TOT: u8 = 0x20;

/// Default half-width of the alignment offset scan.
pub const DEFAULT_SCAN_WINDOW: i64 = 4;

/// Two board timestamps closer than this (microseconds) are considered equal
/// when deriving the event-level timestamp.
pub const TIMESTAMP_EPSILON_US: f64 = 1e-3;
