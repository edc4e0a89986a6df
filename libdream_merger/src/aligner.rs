//! Offset discovery between the two independently counted event streams.
//!
//! The PMT stream tags pedestal triggers in its trigger mask; the SiPM
//! stream simply has no record for them. When the streams drift by a few
//! events, the pedestal indices of one and the missing identifiers of the
//! other are reflections of each other, displaced by the drift. Scanning a
//! small window of integer offsets for the best overlap recovers it.

use fxhash::FxHashSet;

use super::vme_block::DecodedEvent;

/// Result of one offset scan.
#[derive(Debug, Clone)]
pub struct OffsetScan {
    /// The winning offset.
    pub offset: i64,
    /// Markers left unmatched at the winning offset.
    pub unmatched: usize,
    /// Markers left unmatched with no shift applied.
    pub baseline: usize,
    /// Every (offset, unmatched) pair probed, in ascending offset order.
    pub counts: Vec<(i64, usize)>,
}

impl OffsetScan {
    /// Whether the scan actually found an alignment. A best count that does
    /// not improve on the unshifted baseline (and is not already a perfect
    /// match) means the two streams show no usable correlation, and the
    /// caller should escalate rather than merge.
    pub fn is_confident(&self) -> bool {
        self.unmatched == 0 || self.unmatched < self.baseline
    }
}

/// Scan offsets in `[-window, +window]` counting, for each, the reference
/// markers of stream A whose shifted position finds no missing identifier in
/// stream B. Smallest count wins; ties prefer the smallest absolute offset,
/// then the smaller signed one.
///
/// Pure set arithmetic: deterministic, stateless and re-runnable with any
/// window.
pub fn scan_offsets(
    markers: &FxHashSet<i64>,
    missing: &FxHashSet<i64>,
    window: i64,
) -> OffsetScan {
    let mut counts = Vec::with_capacity((2 * window + 1).max(1) as usize);
    let mut best: Option<(i64, usize)> = None;
    for offset in -window..=window {
        let unmatched = markers
            .iter()
            .filter(|&&m| !missing.contains(&(m + offset)))
            .count();
        counts.push((offset, unmatched));
        best = match best {
            None => Some((offset, unmatched)),
            Some((k, c)) if unmatched < c || (unmatched == c && offset.abs() < k.abs()) => {
                Some((offset, unmatched))
            }
            keep => keep,
        };
    }
    let (offset, unmatched) = best.unwrap_or((0, markers.len()));
    let baseline = counts
        .iter()
        .find(|(k, _)| *k == 0)
        .map(|&(_, c)| c)
        .unwrap_or_else(|| markers.len());
    OffsetScan {
        offset,
        unmatched,
        baseline,
        counts,
    }
}

/// The winning offset alone; see [`scan_offsets`].
pub fn compute_offset(markers: &FxHashSet<i64>, missing: &FxHashSet<i64>, window: i64) -> i64 {
    scan_offsets(markers, missing, window).offset
}

/// Indices of the events carrying the pedestal reference marker in their
/// trigger mask.
pub fn pedestal_indices(events: &[DecodedEvent], pedestal_mask: u32) -> FxHashSet<i64> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.trigger_mask() == Some(pedestal_mask))
        .map(|(i, _)| i as i64)
        .collect()
}

/// The identifiers absent from a stream: the full expected index range minus
/// the identifiers actually present.
pub fn missing_identifiers(present: &FxHashSet<i64>, expected: usize) -> FxHashSet<i64> {
    (0..expected as i64)
        .filter(|i| !present.contains(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[i64]) -> FxHashSet<i64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_perfect_match_at_plus_one() {
        let markers = set(&[10, 20, 30]);
        let missing = set(&[11, 21, 31]);
        assert_eq!(compute_offset(&markers, &missing, 4), 1);
        let scan = scan_offsets(&markers, &missing, 4);
        assert_eq!(scan.unmatched, 0);
        assert_eq!(scan.baseline, 3);
        assert!(scan.is_confident());
    }

    #[test]
    fn test_zero_offset_when_already_aligned() {
        let markers = set(&[5, 15, 25]);
        let missing = set(&[5, 15, 25]);
        let scan = scan_offsets(&markers, &missing, 4);
        assert_eq!(scan.offset, 0);
        assert_eq!(scan.unmatched, 0);
        assert!(scan.is_confident());
    }

    #[test]
    fn test_tie_prefers_smallest_absolute_offset() {
        // No offset matches anything, so every count ties at 2; the winner
        // must be 0, not the first probed (-3).
        let markers = set(&[100, 200]);
        let missing = set(&[5]);
        let scan = scan_offsets(&markers, &missing, 3);
        assert_eq!(scan.offset, 0);
        assert_eq!(scan.unmatched, 2);
        assert!(!scan.is_confident());
    }

    #[test]
    fn test_negative_tie_beats_positive() {
        // Offsets -2 and +2 both match one of two markers; the ascending
        // scan keeps -2.
        let markers = set(&[10, 50]);
        let missing = set(&[8, 52]);
        let scan = scan_offsets(&markers, &missing, 4);
        assert_eq!(scan.unmatched, 1);
        assert_eq!(scan.offset, -2);
    }

    #[test]
    fn test_rerun_with_other_window_is_independent() {
        let markers = set(&[10, 20, 30]);
        let missing = set(&[14, 24, 34]);
        assert_eq!(compute_offset(&markers, &missing, 2), 0);
        assert_eq!(compute_offset(&markers, &missing, 4), 4);
        // And again with the original window: no state carried over.
        assert_eq!(compute_offset(&markers, &missing, 2), 0);
    }

    #[test]
    fn test_missing_identifiers_complement() {
        let present = set(&[0, 1, 3, 4]);
        let missing = missing_identifiers(&present, 6);
        assert_eq!(missing, set(&[2, 5]));
    }
}
