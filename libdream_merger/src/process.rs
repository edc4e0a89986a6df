use std::sync::mpsc::Sender;

use fxhash::{FxHashMap, FxHashSet};

use super::aligner::{missing_identifiers, pedestal_indices, scan_offsets};
use super::config::Config;
use super::error::ProcessorError;
use super::event_builder::{EventAssembler, FlatSipmEvent};
use super::run_stats::RunStats;
use super::sipm_file::SipmFile;
use super::sipm_record::FersFileHeader;
use super::vme_block::DecodedEvent;
use super::vme_file::VmeFile;
use super::worker_status::{MergePhase, WorkerStatus};
use super::writer::{EventWriter, JsonlWriter, MergedEvent};

/// Progress updates are sent whenever the consumed fraction grew by this
/// much, to keep the channel quiet.
const FLUSH_FRAC: f32 = 0.01;

/// Decode the FERS file and assemble its fragments into combined events,
/// keyed by trigger identifier.
fn read_sipm_stream(
    config: &Config,
    run_number: i32,
    stats: &mut RunStats,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(FxHashMap<u64, FlatSipmEvent>, FersFileHeader), ProcessorError> {
    let path = config.get_sipm_file_name(run_number)?;
    let mut file = SipmFile::new(&path)?;
    let mut assembler = EventAssembler::new(config.board_cap);

    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, MergePhase::Sipm))?;
    let mut reported: f32 = 0.0;
    while let Some(record) = file.get_next_record()? {
        stats.sipm_records_read += 1;
        assembler.ingest(record);
        if file.progress() - reported > FLUSH_FRAC {
            reported = file.progress();
            tx.send(WorkerStatus::new(
                reported,
                run_number,
                *worker_id,
                MergePhase::Sipm,
            ))?;
        }
    }
    stats.resynced_fragments = file.resynced_fragments();

    let combined = assembler.drain();
    stats.dropped_trigger_groups = assembler.dropped_groups();
    log::info!(
        "Run {}: assembled {} SiPM events, dropped {} malformed trigger groups",
        run_number,
        combined.len(),
        stats.dropped_trigger_groups
    );

    let flattened = combined
        .iter()
        .map(|event| (event.trigger_id, event.flatten(config.board_cap)))
        .collect();
    Ok((flattened, file.header().clone()))
}

/// Decode the DAQ dump, dropping condemned blocks and counting trigger
/// types. Indices in the returned vector are the event indices every later
/// step (alignment, merge) works with.
fn read_vme_stream(
    config: &Config,
    run_number: i32,
    stats: &mut RunStats,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<Vec<DecodedEvent>, ProcessorError> {
    let path = config.get_vme_file_name(run_number)?;
    let mut file = VmeFile::new(&path)?;
    let mut events = Vec::new();

    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, MergePhase::Vme))?;
    let mut reported: f32 = 0.0;
    while let Some(event) = file.get_next_event()? {
        stats.vme_events_read += 1;
        if event.should_discard() {
            stats.vme_events_discarded += 1;
            for finding in &event.findings {
                log::debug!(
                    "Run {} block {}: decoding error code {}: {}",
                    run_number,
                    stats.vme_events_read,
                    finding.code(),
                    finding
                );
            }
            continue;
        }
        match event.trigger_mask() {
            Some(mask) if mask == config.physics_mask => stats.physics_events += 1,
            Some(mask) if mask == config.pedestal_mask => stats.pedestal_events += 1,
            _ => (),
        }
        events.push(event);
        if file.progress() - reported > FLUSH_FRAC {
            reported = file.progress();
            tx.send(WorkerStatus::new(
                reported,
                run_number,
                *worker_id,
                MergePhase::Vme,
            ))?;
        }
    }
    Ok(events)
}

/// The main loop of dream_merger: decode both streams of one run, discover
/// their index offset, and write the joined timeline.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let mut stats = RunStats::default();

    let (sipm_events, fers_header) =
        read_sipm_stream(config, run_number, &mut stats, tx, worker_id)?;
    let vme_events = read_vme_stream(config, run_number, &mut stats, tx, worker_id)?;

    // Pedestal triggers appear in the PMT stream and are absent from the
    // SiPM stream; the offset scan lines the two signatures up.
    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, MergePhase::Align))?;
    let markers = pedestal_indices(&vme_events, config.pedestal_mask);
    let present: FxHashSet<i64> = sipm_events.keys().map(|&t| t as i64).collect();
    let missing = missing_identifiers(&present, vme_events.len());
    log::info!(
        "Run {}: {} events with {} pedestals in the PMT stream; {} triggers missing from the SiPM stream",
        run_number,
        vme_events.len(),
        markers.len(),
        missing.len()
    );

    let scan = scan_offsets(&markers, &missing, config.scan_window);
    for (offset, unmatched) in &scan.counts {
        log::info!(
            "Run {}: offset {}: {} pedestal triggers where the SiPM stream fired",
            run_number,
            offset,
            unmatched
        );
    }
    log::info!(
        "Run {}: best offset {} with {} unmatched pedestals",
        run_number,
        scan.offset,
        scan.unmatched
    );
    if !scan.is_confident() {
        log::warn!(
            "Run {}: offset scan did not improve on the unshifted baseline ({} vs {}); the streams may be uncorrelated and the merge should be reviewed",
            run_number,
            scan.unmatched,
            scan.baseline
        );
    }
    stats.alignment_offset = scan.offset;

    // Shift the PMT stream by the offset, then join records by identifier.
    // Triggers with no SiPM counterpart keep an empty SiPM side.
    let mut writer = JsonlWriter::new(&config.get_output_file_name(run_number)?)?;
    writer.write_run_info(run_number, &fers_header)?;
    tx.send(WorkerStatus::new(0.0, run_number, *worker_id, MergePhase::Merge))?;
    let count = vme_events.len() as i64;
    for index in 0..vme_events.len() {
        let shifted = index as i64 + scan.offset;
        if shifted < 0 || shifted >= count {
            continue;
        }
        let vme = &vme_events[shifted as usize];
        let key = vme
            .header
            .as_ref()
            .map(|h| h.event_number as u64)
            .unwrap_or(index as u64);
        let sipm = sipm_events.get(&key);
        if sipm.is_some() {
            stats.sipm_matched += 1;
        }
        writer.write_event(&MergedEvent {
            event_index: index,
            vme,
            sipm,
        })?;
        stats.merged_events += 1;
    }
    writer.write_run_stats(&stats)?;
    stats.log_summary(run_number);

    tx.send(WorkerStatus::new(1.0, run_number, *worker_id, MergePhase::Merge))?;
    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
/// Allows multiple runs to be processed.
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<(), ProcessorError> {
    for run in config.first_run_number..(config.last_run_number + 1) {
        if config.does_run_exist(run) {
            log::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            log::info!("Finished processing run {}.", run);
        } else {
            log::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    for run in subset {
        if config.does_run_exist(run) {
            log::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            log::info!("Finished processing run {}.", run);
        } else {
            log::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_subsets_round_robin() {
        let config = Config {
            first_run_number: 1,
            last_run_number: 5,
            n_threads: 2,
            ..Config::default()
        };
        let subsets = create_subsets(&config);
        assert_eq!(subsets, vec![vec![1, 3, 5], vec![2, 4]]);
    }
}
