//! Reader for FERS (Janus) list files: the file-level header followed by a
//! stream of per-board event fragments.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;

use super::constants::{FILE_HEADER_SIZE, FRAGMENT_PREAMBLE_SIZE};
use super::error::SipmFileError;
use super::sipm_record::{AcquisitionMode, BoardRecord, FersFileHeader};

#[derive(Debug)]
pub struct SipmFile {
    reader: BufReader<File>,
    header: FersFileHeader,
    path: PathBuf,
    size_bytes: u64,
    bytes_read: u64,
    resynced_fragments: u64,
}

impl SipmFile {
    /// Open a list file and consume its header.
    ///
    /// Timing-only and counting acquisitions carry no pulse-height payload
    /// and are rejected here rather than half-decoded.
    pub fn new(path: &Path) -> Result<Self, SipmFileError> {
        if !path.exists() {
            return Err(SipmFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut buf = [0u8; FILE_HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        let header = FersFileHeader::read(&buf)?;
        match header.acq_mode {
            AcquisitionMode::Spectroscopy | AcquisitionMode::SpectroscopyTiming => (),
            mode => return Err(SipmFileError::UnsupportedAcqMode(mode)),
        }

        log::info!(
            "Opened FERS file {} ({}), run {}, format {}, software {}",
            path.to_string_lossy(),
            human_bytes::human_bytes(size_bytes as f64),
            header.run_number,
            header.data_format,
            header.software,
        );
        if let Some(start) = header.start_time() {
            if let Ok(stamp) = start.format(&Rfc3339) {
                log::info!("Run start time: {}", stamp);
            }
        }

        Ok(Self {
            reader,
            header,
            path: path.to_path_buf(),
            size_bytes,
            bytes_read: FILE_HEADER_SIZE as u64,
            resynced_fragments: 0,
        })
    }

    /// Read the next board fragment.
    ///
    /// Returns `Ok(None)` at end of file. A fragment whose declared size is
    /// too small to hold even the fixed preamble is skipped by honoring the
    /// declared size, and counted, so one bad record does not desynchronize
    /// the rest of the file.
    pub fn get_next_record(&mut self) -> Result<Option<BoardRecord>, SipmFileError> {
        loop {
            let mut size_buf = [0u8; 2];
            match self.reader.read_exact(&mut size_buf) {
                Ok(()) => (),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e.into()),
            }
            let event_size = u16::from_le_bytes(size_buf) as usize;

            if event_size < FRAGMENT_PREAMBLE_SIZE {
                self.resynced_fragments += 1;
                log::warn!(
                    "Fragment with declared size {} in {}; skipping",
                    event_size,
                    self.path.to_string_lossy()
                );
                let skip = event_size.saturating_sub(2) as i64;
                self.reader.seek(SeekFrom::Current(skip))?;
                self.bytes_read += 2 + skip as u64;
                continue;
            }

            let mut buf = vec![0u8; event_size];
            buf[0..2].copy_from_slice(&size_buf);
            self.reader.read_exact(&mut buf[2..])?;
            self.bytes_read += event_size as u64;
            return Ok(Some(BoardRecord::read(&buf, &self.header)?));
        }
    }

    pub fn header(&self) -> &FersFileHeader {
        &self.header
    }

    /// Fragments skipped because of an implausible declared size.
    pub fn resynced_fragments(&self) -> u64 {
        self.resynced_fragments
    }

    /// Fraction of the file consumed so far, for progress reporting.
    pub fn progress(&self) -> f32 {
        if self.size_bytes == 0 {
            return 1.0;
        }
        self.bytes_read as f32 / self.size_bytes as f32
    }
}
