//! Block-level decoding: one raw VME event block into a [`DecodedEvent`].
//!
//! The decode walks the declared structure front to back. Structural errors
//! abort the block and leave whatever was decoded so far, flagged; per-word
//! flag conditions are recorded and decoding continues.

use bit_set::BitSet;
use fxhash::FxHashMap;
use serde::Serialize;

use super::constants::*;
use super::findings::{Finding, ModuleKind};
use super::vme_word::{
    parse_bank_header, parse_bank_trailer, parse_data_word, parse_event_header,
    parse_event_trailer, BankHeaderWord, EventHeader,
};

/// The parse result for one raw event block.
///
/// `adc` maps the flat QDC channel (`crate * 32 + module channel`) to its
/// converted value; `tdc` maps the module channel of the single TDC to
/// `(value, flags)`. `findings` holds every structural or per-word condition
/// observed, in decode order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecodedEvent {
    pub header: Option<EventHeader>,
    pub adc: FxHashMap<u16, u16>,
    pub tdc: FxHashMap<u16, (u16, u8)>,
    pub findings: Vec<Finding>,
}

impl DecodedEvent {
    /// Whether any recorded finding condemns the event (see
    /// [`Finding::is_fatal`]). Advisory overflow/underflow conditions leave
    /// the event usable; the consumer decides its own policy for those.
    pub fn should_discard(&self) -> bool {
        self.findings.iter().any(|f| f.is_fatal())
    }

    pub fn trigger_mask(&self) -> Option<u32> {
        self.header.as_ref().map(|h| h.trigger_mask)
    }

    fn aborted(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }
}

/// Decode one whole event block.
///
/// Total and deterministic: any input terminates, and the same words always
/// produce the same event. The bank loop is bounded by the declared payload
/// size and every read is bounds-checked against the block length.
pub fn decode_block(block: &[u32]) -> DecodedEvent {
    let mut event = DecodedEvent::default();

    if block.len() < EVENT_HEADER_WORDS {
        return event.aborted(Finding::HeaderSanityFailed);
    }
    let header = match parse_event_header(&block[..EVENT_HEADER_WORDS]) {
        Ok(header) => header,
        Err(finding) => return event.aborted(finding),
    };
    let payload_end = EVENT_HEADER_WORDS + header.payload_size as usize;
    event.header = Some(header);
    let mut adc_seen: BitSet<u32> = BitSet::default();
    let mut tdc_seen: BitSet<u32> = BitSet::default();
    let mut index = EVENT_HEADER_WORDS;

    while index < payload_end {
        if index >= block.len() {
            return event.aborted(Finding::UnexpectedEndOfData);
        }
        let head = match parse_bank_header(block[index]) {
            Ok(BankHeaderWord::Bank(head)) => head,
            Ok(BankHeaderWord::Padding) => {
                index += 1;
                if index == payload_end {
                    // Filler at the exact end of the payload closes the bank
                    // loop; the event trailer is still checked below.
                    break;
                }
                return event.aborted(Finding::UnexpectedPadding);
            }
            Err(finding) => return event.aborted(finding),
        };
        index += 1;

        let module = match ModuleKind::from_type_code(head.type_code) {
            Some(module) => module,
            None => return event.aborted(Finding::InvalidTypeFlag),
        };

        for _ in 0..head.channel_count {
            if index >= block.len() {
                return event.aborted(Finding::UnexpectedEndOfData);
            }
            let (word, fault) = parse_data_word(block[index], module);
            index += 1;
            if let Some(finding) = fault {
                event.findings.push(finding);
            }
            if module.is_qdc() {
                let channel = head.crate_id as u16 * QDC_CRATE_STRIDE + word.channel;
                if !adc_seen.insert(channel as usize) {
                    event.findings.push(Finding::AdcChannelSeen);
                }
                event.adc.insert(channel, word.value);
            } else {
                // A single TDC module is assumed, so the module channel is
                // already the global one.
                if !tdc_seen.insert(word.channel as usize) {
                    event.findings.push(Finding::TdcChannelSeen);
                }
                event.tdc.insert(word.channel, (word.value, word.flags));
            }
        }

        if index >= block.len() {
            return event.aborted(Finding::UnexpectedEndOfData);
        }
        if let Err(finding) = parse_bank_trailer(block[index]) {
            return event.aborted(finding);
        }
        index += 1;
    }

    if index >= block.len() {
        return event.aborted(Finding::UnexpectedEndOfData);
    }
    let trailer = parse_event_trailer(block[index]);
    index += 1;
    if index != block.len() {
        return event.aborted(Finding::EventSizeCheckFailed);
    }
    if let Err(finding) = trailer {
        // The maps are complete at this point, so the event is returned,
        // flagged rather than truncated.
        event.findings.push(finding);
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_words(payload_size: u32, trigger_mask: u32) -> Vec<u32> {
        vec![
            EVENT_HEADER_MARKER,
            7,
            1,
            0xe,
            0x1,
            payload_size,
            0xe + 0x1 + payload_size,
            500,
            0,
            trigger_mask,
            0,
            0,
            0,
            HEADER_END_MARKER,
        ]
    }

    fn qdc_bank_header(n: u32, crate_id: u32) -> u32 {
        n << 8 | crate_id << 16 | 0b1010 << 20 | DATA_HEADER_MARKER << 24
    }

    fn qdc_data_word(value: u32, channel: u32) -> u32 {
        value | channel << 16
    }

    fn bank_trailer(counter: u32) -> u32 {
        counter | DATA_TRAILER_MARKER << 24
    }

    /// Header + one QDC-32 bank with the given channel values + trailers.
    fn well_formed_block(crate_id: u32, values: &[u16]) -> Vec<u32> {
        let payload = values.len() as u32 + 2;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(qdc_bank_header(values.len() as u32, crate_id));
        for (channel, &value) in values.iter().enumerate() {
            block.push(qdc_data_word(value as u32, channel as u32));
        }
        block.push(bank_trailer(7));
        block.push(EVENT_TRAILER_MARKER);
        block
    }

    #[test]
    fn test_round_trip_qdc_bank() {
        let values = [100u16, 250, 3000, 4095];
        let event = decode_block(&well_formed_block(2, &values));
        assert!(event.findings.is_empty());
        assert_eq!(event.adc.len(), values.len());
        for (channel, &value) in values.iter().enumerate() {
            assert_eq!(event.adc[&(2 * 32 + channel as u16)], value);
        }
        assert!(event.tdc.is_empty());
        assert!(!event.should_discard());
    }

    #[test]
    fn test_idempotent_decode() {
        let block = well_formed_block(1, &[7, 8, 9]);
        let first = decode_block(&block);
        let second = decode_block(&block);
        assert_eq!(first.adc, second.adc);
        assert_eq!(first.findings, second.findings);
        assert_eq!(first.header, second.header);
    }

    #[test]
    fn test_header_sanity_aborts_block() {
        let mut block = well_formed_block(0, &[1, 2]);
        block[0] = 0;
        let event = decode_block(&block);
        assert_eq!(event.findings, vec![Finding::HeaderSanityFailed]);
        assert!(event.header.is_none());
        assert!(event.adc.is_empty());
        assert!(event.should_discard());
    }

    #[test]
    fn test_tdc_bank_fills_tdc_map() {
        // One V775 bank with two channels; valid bit set on both.
        let payload = 4;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(2 << 8 | 0b0110 << 20 | DATA_HEADER_MARKER << 24);
        block.push(800 | 0b100 << 12 | 3 << 16);
        block.push(900 | 0b100 << 12 | 4 << 16);
        block.push(bank_trailer(1));
        block.push(EVENT_TRAILER_MARKER);
        let event = decode_block(&block);
        assert!(event.findings.is_empty());
        assert_eq!(event.tdc[&3], (800, 0));
        assert_eq!(event.tdc[&4], (900, 0));
        assert!(event.adc.is_empty());
    }

    #[test]
    fn test_duplicate_channel_last_write_wins() {
        let payload = 4;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(qdc_bank_header(2, 0));
        block.push(qdc_data_word(111, 5));
        block.push(qdc_data_word(222, 5));
        block.push(bank_trailer(1));
        block.push(EVENT_TRAILER_MARKER);
        let event = decode_block(&block);
        assert_eq!(event.findings, vec![Finding::AdcChannelSeen]);
        assert_eq!(event.adc[&5], 222);
        // Duplicate channels condemn the event even though decode continued.
        assert!(event.should_discard());
    }

    #[test]
    fn test_padding_word_at_end_of_payload() {
        // Bank of one channel plus a trailing filler word; payload accounts
        // for both, and the block stays clean.
        let payload = 4;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(qdc_bank_header(1, 0));
        block.push(qdc_data_word(50, 0));
        block.push(bank_trailer(1));
        block.push(0xfe00_0000);
        block.push(EVENT_TRAILER_MARKER);
        let event = decode_block(&block);
        assert!(event.findings.is_empty());
        assert_eq!(event.adc[&0], 50);
    }

    #[test]
    fn test_padding_word_mid_payload_is_fatal() {
        let payload = 5;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(0xfe00_0000);
        block.push(qdc_bank_header(1, 0));
        block.push(qdc_data_word(50, 0));
        block.push(bank_trailer(1));
        block.push(0);
        block.push(EVENT_TRAILER_MARKER);
        let event = decode_block(&block);
        assert_eq!(event.findings, vec![Finding::UnexpectedPadding]);
    }

    #[test]
    fn test_truncated_payload() {
        let mut block = header_words(4, PHYSICS_TRIGGER_MASK);
        block.push(qdc_bank_header(2, 0));
        block.push(qdc_data_word(9, 0));
        // Block ends inside the bank.
        let event = decode_block(&block);
        assert_eq!(event.findings, vec![Finding::UnexpectedEndOfData]);
        assert_eq!(event.adc[&0], 9);
    }

    #[test]
    fn test_bad_bank_trailer_aborts() {
        let payload = 3;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(qdc_bank_header(1, 0));
        block.push(qdc_data_word(9, 0));
        block.push(7); // marker 0, not a trailer
        block.push(EVENT_TRAILER_MARKER);
        let event = decode_block(&block);
        assert_eq!(event.findings, vec![Finding::InvalidDataTrailer]);
    }

    #[test]
    fn test_unknown_type_code_aborts() {
        let payload = 3;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(1 << 8 | 0b1111 << 20 | DATA_HEADER_MARKER << 24);
        block.push(qdc_data_word(9, 0));
        block.push(bank_trailer(1));
        block.push(EVENT_TRAILER_MARKER);
        let event = decode_block(&block);
        assert_eq!(event.findings, vec![Finding::InvalidTypeFlag]);
    }

    #[test]
    fn test_event_trailer_mismatch_keeps_event() {
        let mut block = well_formed_block(0, &[42]);
        let last = block.len() - 1;
        block[last] = 0x1111_1111;
        let event = decode_block(&block);
        // The maps survive; the event is flagged, not truncated.
        assert_eq!(event.findings, vec![Finding::InvalidEventTrailer]);
        assert_eq!(event.adc[&0], 42);
        assert!(event.should_discard());
    }

    #[test]
    fn test_trailing_garbage_fails_size_check() {
        let mut block = well_formed_block(0, &[42]);
        block.push(0xdead_dead);
        let event = decode_block(&block);
        assert_eq!(event.findings, vec![Finding::EventSizeCheckFailed]);
    }

    #[test]
    fn test_advisory_faults_do_not_discard() {
        let payload = 3;
        let mut block = header_words(payload, PHYSICS_TRIGGER_MASK);
        block.push(qdc_bank_header(1, 0));
        block.push(qdc_data_word(4095, 0) | 0b001 << 12); // overflow bit
        block.push(bank_trailer(1));
        block.push(EVENT_TRAILER_MARKER);
        let event = decode_block(&block);
        assert_eq!(event.findings.len(), 1);
        assert_eq!(event.findings[0].code(), 21);
        assert!(!event.should_discard());
        // The flagged value is still recorded.
        assert_eq!(event.adc[&0], 4095);
    }
}
