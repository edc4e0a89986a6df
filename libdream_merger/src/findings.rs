//! The closed taxonomy of structural findings a block decode can produce.
//!
//! Each finding keeps the numeric diagnostic code of the original DAQ
//! decoder so that log output stays comparable across toolchains. The
//! fatal/advisory split is an exhaustive match: adding a variant (or a new
//! module family) forces a decision here rather than in an ad hoc set.

use serde::Serialize;

/// The four VME module flavors the payload banks can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleKind {
    /// QDC V792, 32 channels.
    QdcV792,
    /// QDC V792N, 16 channels, channel field shifted one bit.
    QdcV792N,
    /// TDC V775, 32 channels, data valid bit.
    TdcV775,
    /// TDC V775N, 16 channels, shifted channel field, data valid bit.
    TdcV775N,
}

impl ModuleKind {
    /// Map the 4-bit type code of a bank header to a module kind.
    pub fn from_type_code(code: u32) -> Option<Self> {
        match code {
            0b1010 => Some(Self::QdcV792),
            0b1001 => Some(Self::QdcV792N),
            0b0110 => Some(Self::TdcV775),
            0b0101 => Some(Self::TdcV775N),
            _ => None,
        }
    }

    /// QDC banks fill the ADC map, TDC banks the TDC map.
    pub fn is_qdc(self) -> bool {
        matches!(self, Self::QdcV792 | Self::QdcV792N)
    }

    /// Module channel number from the raw 8-bit channel field. The 16-channel
    /// ("N") variants carry the channel one bit higher.
    pub fn channel(self, field: u32) -> u16 {
        match self {
            Self::QdcV792 | Self::TdcV775 => (field & 0b11111) as u16,
            Self::QdcV792N | Self::TdcV775N => ((field >> 1) & 0b1111) as u16,
        }
    }

    /// TDCs carry a data-valid bit that must be set on a good word.
    pub fn has_valid_bit(self) -> bool {
        matches!(self, Self::TdcV775 | Self::TdcV775N)
    }

    fn fault_base(self) -> u16 {
        match self {
            Self::QdcV792 => 20,
            Self::QdcV792N => 30,
            Self::TdcV775 => 40,
            Self::TdcV775N => 50,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::QdcV792 => "V792",
            Self::QdcV792N => "V792N",
            Self::TdcV775 => "V775",
            Self::TdcV775N => "V775N",
        }
    }
}

/// Per-word condition of a module data word, taken from its two flag bits
/// (bit 0 overflow, bit 1 underflow). A word with clean flags but a wrong
/// marker or a cleared valid bit is `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataFault {
    Invalid,
    Overflow,
    Underflow,
    OverflowUnderflow,
}

impl DataFault {
    pub fn from_flags(flags: u8) -> Self {
        match flags & 0b11 {
            0b01 => Self::Overflow,
            0b10 => Self::Underflow,
            0b11 => Self::OverflowUnderflow,
            _ => Self::Invalid,
        }
    }

    fn code_offset(self) -> u16 {
        match self {
            Self::Invalid => 0,
            Self::Overflow => 1,
            Self::Underflow => 2,
            Self::OverflowUnderflow => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Overflow => "OV",
            Self::Underflow => "UN",
            Self::OverflowUnderflow => "UN OV",
        }
    }
}

/// One structural finding recorded while decoding an event block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Finding {
    /// A bank header word with an unrecognized marker.
    InvalidDataHeader,
    /// A bank trailer word with the wrong marker.
    InvalidDataTrailer,
    /// Per-word overflow/underflow/invalid condition; the value is still
    /// recorded and decoding continues.
    DataFault { module: ModuleKind, fault: DataFault },
    /// A bank header carrying a type code outside the four known families.
    InvalidTypeFlag,
    /// The same ADC channel appeared twice in one event; last write wins.
    AdcChannelSeen,
    /// The same TDC channel appeared twice in one event; last write wins.
    TdcChannelSeen,
    /// The block ended before the declared structure was complete.
    UnexpectedEndOfData,
    /// Words remained after the event trailer, or the declared sizes do not
    /// add up to the block length.
    EventSizeCheckFailed,
    /// A 0xFE.. filler word somewhere other than the end of the payload.
    UnexpectedPadding,
    /// The 14-word preamble failed its magic/size consistency checks.
    HeaderSanityFailed,
    /// The terminal word was not the event-trailer magic.
    InvalidEventTrailer,
}

impl Finding {
    /// Diagnostic code, matching the historical DAQ decoder tables.
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidDataHeader => 1,
            Self::InvalidDataTrailer => 2,
            Self::DataFault { module, fault } => module.fault_base() + fault.code_offset(),
            Self::InvalidTypeFlag => 99,
            Self::AdcChannelSeen => 111,
            Self::TdcChannelSeen => 112,
            Self::UnexpectedEndOfData => 74,
            Self::EventSizeCheckFailed => 75,
            Self::UnexpectedPadding => 254,
            Self::HeaderSanityFailed => 999,
            Self::InvalidEventTrailer => 810,
        }
    }

    /// Whether an event carrying this finding must be discarded by consumers.
    ///
    /// Everything except the per-word data faults is fatal. Note that this is
    /// a property of the event, not of decode control flow: duplicate
    /// channels and a bad event trailer do not stop decoding, but they do
    /// condemn the event.
    pub fn is_fatal(self) -> bool {
        match self {
            Self::DataFault { .. } => false,
            Self::InvalidDataHeader => true,
            Self::InvalidDataTrailer => true,
            Self::InvalidTypeFlag => true,
            Self::AdcChannelSeen => true,
            Self::TdcChannelSeen => true,
            Self::UnexpectedEndOfData => true,
            Self::EventSizeCheckFailed => true,
            Self::UnexpectedPadding => true,
            Self::HeaderSanityFailed => true,
            Self::InvalidEventTrailer => true,
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDataHeader => write!(f, "Invalid data header"),
            Self::InvalidDataTrailer => write!(f, "Invalid data trailer"),
            Self::DataFault { module, fault } => {
                write!(f, "{} data for {}", fault.label(), module.label())
            }
            Self::InvalidTypeFlag => write!(f, "Invalid data type flag"),
            Self::AdcChannelSeen => write!(f, "QDC channel already seen"),
            Self::TdcChannelSeen => write!(f, "TDC channel already seen"),
            Self::UnexpectedEndOfData => write!(f, "Expected more data but block ended"),
            Self::EventSizeCheckFailed => write!(f, "Failed checksum of event size"),
            Self::UnexpectedPadding => write!(f, "Unexpected 0xFE data word"),
            Self::HeaderSanityFailed => write!(f, "Failed header sanity check"),
            Self::InvalidEventTrailer => write!(f, "Invalid event trailer"),
        }
    }
}
