//! # dream_merger
//!
//! dream_merger is the event builder for the dual-readout calorimeter test
//! beams, written in Rust. It takes data produced by the two independent
//! data acquisitions — ASCII dumps of the VME PMT/QDC/TDC chain written by
//! DreamDaq, and binary list files of the FERS SiPM chain written by Janus —
//! decodes both into structured per-event records, discovers the integer
//! event offset between the two independently counted streams, and writes a
//! single merged event timeline.
//!
//! ## Building & Install
//!
//! To build and install the CLI merger use `cargo install --path
//! ./dream_merger_cli` from the top level dream_merger repository. The
//! binary will be installed to your cargo install location (typically
//! something like `~/.cargo/bin/`) and can be uninstalled by running
//! `cargo uninstall dream_merger_cli`.
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration file:
//!
//! ```yml
//! vme_path: None
//! sipm_path: None
//! output_path: None
//! first_run_number: 0
//! last_run_number: 0
//! n_threads: 1
//! board_cap: 5
//! scan_window: 4
//! pedestal_mask: 2
//! physics_mask: 5
//! ```
//!
//! - `vme_path`: directory containing the DreamDaq dumps (`sps_run#.txt`,
//!   one event block per line as whitespace-separated hex words)
//! - `sipm_path`: directory containing the Janus list files
//!   (`Run#.0_list.dat`)
//! - `output_path`: directory merged JSON-lines files are written to
//! - `first_run_number`/`last_run_number`: the run range (inclusive)
//! - `n_threads`: number of parallel workers the runs are divided amongst.
//!   Decoding within a run is sequential; runs are independent.
//! - `board_cap`: FERS boards expected per trigger. A trigger group with
//!   more contributing boards is malformed and dropped (counted, never
//!   silently merged).
//! - `scan_window`: half-width of the alignment offset scan
//! - `pedestal_mask`/`physics_mask`: trigger-mask values tagging pedestal
//!   and physics triggers. Pedestal triggers are the reference markers the
//!   offset scan aligns against the SiPM stream's missing trigger
//!   identifiers.
//!
//! ## Decode policy
//!
//! Structural damage (bad magics, size mismatches, unknown module types,
//! duplicate channels, truncation) condemns the affected event block; it is
//! counted and skipped, never retried. Per-channel overflow/underflow
//! conditions are advisory: they are recorded on the event and left to the
//! consumer. See [`findings::Finding`] for the full taxonomy.
//!
//! ## Output
//!
//! One JSON object per line: a `run_info` record, one `event` record per
//! merged event (PMT header, ADC/TDC maps, findings, and the flattened SiPM
//! arrays when the trigger matched), and a closing `run_stats` record. Log
//! files contain the per-run offset scan and the counters needed to judge
//! data quality; it is not advised to delete them.
pub mod aligner;
pub mod config;
pub mod constants;
pub mod error;
pub mod event_builder;
pub mod findings;
pub mod process;
pub mod run_stats;
pub mod sipm_file;
pub mod sipm_record;
pub mod vme_block;
pub mod vme_file;
pub mod vme_word;
pub mod worker_status;
pub mod writer;
