//! Groups per-board FERS records sharing a trigger identifier into combined
//! events.
//!
//! In the Janus jargon an "event" is the reading of one board; here an event
//! is a trigger, to which up to the configured number of boards contribute
//! one record each.

use fxhash::FxHashMap;
use serde::Serialize;

use super::constants::{NCHANNELS, TIMESTAMP_EPSILON_US};
use super::sipm_record::BoardRecord;

/// All board records observed for one trigger identifier, in arrival order.
#[derive(Debug, Clone)]
pub struct CombinedEvent {
    pub trigger_id: u64,
    pub records: Vec<BoardRecord>,
}

impl CombinedEvent {
    pub fn board_count(&self) -> usize {
        self.records.len()
    }

    /// The common board timestamp, when every contributing board agrees
    /// within [`TIMESTAMP_EPSILON_US`]. Disagreement leaves it unset.
    pub fn event_timestamp_us(&self) -> Option<f64> {
        let mut stamp: Option<f64> = None;
        for record in &self.records {
            match stamp {
                None => stamp = Some(record.timestamp_us),
                Some(current) => {
                    if (current - record.timestamp_us).abs() > TIMESTAMP_EPSILON_US {
                        return None;
                    }
                }
            }
        }
        stamp
    }

    /// Summed low-gain pulse height across all boards and channels. Purely a
    /// diagnostic for range discovery; never persisted.
    pub fn low_gain_sum(&self) -> u64 {
        self.records
            .iter()
            .flat_map(|r| r.low_gain.iter())
            .map(|&v| v as u64)
            .sum()
    }

    /// Summed high-gain pulse height across all boards and channels.
    pub fn high_gain_sum(&self) -> u64 {
        self.records
            .iter()
            .flat_map(|r| r.high_gain.iter())
            .map(|&v| v as u64)
            .sum()
    }

    /// Lay the per-board arrays out as one fixed-shape (board x channel)
    /// table sized to the board cap. Boards absent from this trigger leave
    /// zeroed channels and a -1 timestamp.
    pub fn flatten(&self, board_cap: u8) -> FlatSipmEvent {
        let slots = board_cap as usize * NCHANNELS;
        let mut flat = FlatSipmEvent {
            trigger_id: self.trigger_id,
            event_timestamp_us: self.event_timestamp_us().unwrap_or(-1.0),
            board_timestamps_us: vec![-1.0; board_cap as usize],
            high_gain: vec![0; slots],
            low_gain: vec![0; slots],
            toa_ns: vec![0.0; slots],
            tot_ns: vec![0.0; slots],
        };
        for record in &self.records {
            let board = record.board_id as usize;
            if board >= board_cap as usize {
                log::warn!(
                    "Board id {} of trigger {} is outside the configured cap; skipping its channels",
                    record.board_id,
                    self.trigger_id
                );
                continue;
            }
            flat.board_timestamps_us[board] = record.timestamp_us;
            let base = board * NCHANNELS;
            flat.high_gain[base..base + NCHANNELS].copy_from_slice(&record.high_gain);
            flat.low_gain[base..base + NCHANNELS].copy_from_slice(&record.low_gain);
            flat.toa_ns[base..base + NCHANNELS].copy_from_slice(&record.toa_ns);
            flat.tot_ns[base..base + NCHANNELS].copy_from_slice(&record.tot_ns);
        }
        flat
    }
}

/// A combined event flattened into fixed-shape per-(board, channel) arrays,
/// indexed as `board * NCHANNELS + channel`.
#[derive(Debug, Clone, Serialize)]
pub struct FlatSipmEvent {
    pub trigger_id: u64,
    pub event_timestamp_us: f64,
    pub board_timestamps_us: Vec<f64>,
    pub high_gain: Vec<u16>,
    pub low_gain: Vec<u16>,
    pub toa_ns: Vec<f32>,
    pub tot_ns: Vec<f32>,
}

/// Buckets board records by trigger identifier until drained.
///
/// A bucket with more records than the board cap, or naming a board id at or
/// above the cap, is malformed: it is dropped whole and counted, never
/// returned.
#[derive(Debug)]
pub struct EventAssembler {
    buckets: FxHashMap<u64, Vec<BoardRecord>>,
    board_cap: u8,
    dropped_groups: u64,
}

impl EventAssembler {
    pub fn new(board_cap: u8) -> Self {
        Self {
            buckets: FxHashMap::default(),
            board_cap,
            dropped_groups: 0,
        }
    }

    /// File the record under its trigger identifier. Arrival order within a
    /// bucket is preserved.
    pub fn ingest(&mut self, record: BoardRecord) {
        self.buckets
            .entry(record.trigger_id)
            .or_default()
            .push(record);
    }

    /// Remove and return all finalized combined events, sorted by trigger
    /// identifier. Malformed buckets are dropped and counted here.
    pub fn drain(&mut self) -> Vec<CombinedEvent> {
        let cap = self.board_cap;
        let mut events = Vec::with_capacity(self.buckets.len());
        for (trigger_id, records) in self.buckets.drain() {
            if records.len() > cap as usize || records.iter().any(|r| r.board_id >= cap) {
                self.dropped_groups += 1;
                log::debug!(
                    "Dropping trigger group {} with {} records",
                    trigger_id,
                    records.len()
                );
                continue;
            }
            events.push(CombinedEvent {
                trigger_id,
                records,
            });
        }
        events.sort_by_key(|e| e.trigger_id);
        events
    }

    /// Trigger groups dropped as malformed since construction.
    pub fn dropped_groups(&self) -> u64 {
        self.dropped_groups
    }

    /// Buckets currently held, for memory monitoring.
    pub fn pending(&self) -> usize {
        self.buckets.len()
    }
}
