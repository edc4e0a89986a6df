//! Per-run bookkeeping. Every counter the merge accumulates lives here and
//! is threaded explicitly through the components that update it.

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Event blocks read from the DAQ dump.
    pub vme_events_read: u64,
    /// Blocks discarded because of a fatal finding.
    pub vme_events_discarded: u64,
    pub physics_events: u64,
    pub pedestal_events: u64,
    /// Board fragments read from the FERS file.
    pub sipm_records_read: u64,
    /// Fragments skipped because of an implausible declared size.
    pub resynced_fragments: u64,
    /// Trigger groups dropped for exceeding the board cap.
    pub dropped_trigger_groups: u64,
    /// The offset the aligner settled on.
    pub alignment_offset: i64,
    pub merged_events: u64,
    /// Merged events that found a SiPM counterpart.
    pub sipm_matched: u64,
}

impl RunStats {
    pub fn log_summary(&self, run_number: i32) {
        log::info!(
            "Run {}: {} DAQ events ({} physics, {} pedestal, {} discarded)",
            run_number,
            self.vme_events_read,
            self.physics_events,
            self.pedestal_events,
            self.vme_events_discarded,
        );
        log::info!(
            "Run {}: {} FERS fragments, {} resynced, {} trigger groups dropped",
            run_number,
            self.sipm_records_read,
            self.resynced_fragments,
            self.dropped_trigger_groups,
        );
        log::info!(
            "Run {}: offset {}, wrote {} merged events ({} with SiPM data)",
            run_number,
            self.alignment_offset,
            self.merged_events,
            self.sipm_matched,
        );
    }
}
