//! Decoding of the FERS (Janus) binary format: the 25-byte file header and
//! the fixed-layout per-board event fragments.

use std::io::Cursor;

use bitvec::prelude::*;
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use time::OffsetDateTime;

use super::constants::*;
use super::error::SipmFileError;

/// Acquisition modes of the Janus software. Only the spectroscopy flavors
/// carry pulse-height data and are supported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcquisitionMode {
    Spectroscopy,
    Timing,
    SpectroscopyTiming,
    Counting,
}

impl TryFrom<u8> for AcquisitionMode {
    type Error = SipmFileError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Spectroscopy),
            2 => Ok(Self::Timing),
            3 => Ok(Self::SpectroscopyTiming),
            4 => Ok(Self::Counting),
            _ => Err(SipmFileError::BadAcqMode(value)),
        }
    }
}

/// Unit in which the board reports ToA/ToT: raw LSB counts needing the
/// conversion factor, or nanoseconds directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeUnit {
    Lsb,
    Nanoseconds,
}

impl TryFrom<u8> for TimeUnit {
    type Error = SipmFileError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Lsb),
            1 => Ok(Self::Nanoseconds),
            _ => Err(SipmFileError::BadTimeUnit(value)),
        }
    }
}

/// The file-level header of a Janus list file (data format 3.3,
/// software 4.2.0).
#[derive(Debug, Clone, Serialize)]
pub struct FersFileHeader {
    pub data_format: String,
    pub software: String,
    pub board_type: u16,
    pub run_number: u32,
    pub acq_mode: AcquisitionMode,
    pub en_histo_bins: u16,
    pub time_unit: TimeUnit,
    /// ToA/ToT conversion factor in ns per LSB.
    pub toa_tot_conv: f32,
    /// Acquisition start, unix milliseconds.
    pub acq_time_ms: u64,
}

impl FersFileHeader {
    pub fn read(buf: &[u8; FILE_HEADER_SIZE]) -> Result<Self, SipmFileError> {
        let mut cursor = Cursor::new(&buf[..]);
        let data_format = format!("{}.{}", cursor.read_u8()?, cursor.read_u8()?);
        let software = format!(
            "{}.{}.{}",
            cursor.read_u8()?,
            cursor.read_u8()?,
            cursor.read_u8()?
        );
        let board_type = cursor.read_u16::<LittleEndian>()?;
        let run_number = cursor.read_u16::<LittleEndian>()? as u32;
        let acq_mode = AcquisitionMode::try_from(cursor.read_u8()?)?;
        let en_histo_bins = cursor.read_u16::<LittleEndian>()?;
        let time_unit = TimeUnit::try_from(cursor.read_u8()?)?;
        let toa_tot_conv = cursor.read_f32::<LittleEndian>()?;
        let acq_time_ms = cursor.read_u64::<LittleEndian>()?;
        Ok(Self {
            data_format,
            software,
            board_type,
            run_number,
            acq_mode,
            en_histo_bins,
            time_unit,
            toa_tot_conv,
            acq_time_ms,
        })
    }

    /// Acquisition start as a wall-clock time, when representable.
    pub fn start_time(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp((self.acq_time_ms / 1000) as i64).ok()
    }
}

/// One fixed-layout record: the readout of a single FERS board for a single
/// trigger. Channels absent from the payload keep zeroed values.
#[derive(Debug, Clone)]
pub struct BoardRecord {
    pub event_size: u16,
    pub board_id: u8,
    /// Board trigger timestamp, microseconds.
    pub timestamp_us: f64,
    pub trigger_id: u64,
    pub channel_mask: u64,
    pub high_gain: [u16; NCHANNELS],
    pub low_gain: [u16; NCHANNELS],
    pub toa_ns: [f32; NCHANNELS],
    pub tot_ns: [f32; NCHANNELS],
}

impl BoardRecord {
    /// Decode one fragment from its full byte image (including the leading
    /// event-size field).
    ///
    /// The channel mask advertises which channels follow; each entry names
    /// its channel id and the value kinds it carries. ToA/ToT arrive either
    /// as raw LSB counts (converted here) or as ns floats, depending on the
    /// file header.
    pub fn read(buf: &[u8], header: &FersFileHeader) -> Result<Self, SipmFileError> {
        let mut cursor = Cursor::new(buf);
        let event_size = cursor.read_u16::<LittleEndian>()?;
        let board_id = cursor.read_u8()?;
        let timestamp_us = cursor.read_f64::<LittleEndian>()?;
        let trigger_id = cursor.read_u64::<LittleEndian>()?;
        let channel_mask = cursor.read_u64::<LittleEndian>()?;

        let mask_bits = channel_mask.view_bits::<Lsb0>();
        let active = mask_bits.count_ones();
        if active != NCHANNELS {
            log::warn!(
                "Board {} trigger {} advertises {} active channels, expected {}",
                board_id,
                trigger_id,
                active,
                NCHANNELS
            );
        }

        let mut record = Self {
            event_size,
            board_id,
            timestamp_us,
            trigger_id,
            channel_mask,
            high_gain: [0; NCHANNELS],
            low_gain: [0; NCHANNELS],
            toa_ns: [0.0; NCHANNELS],
            tot_ns: [0.0; NCHANNELS],
        };

        for _ in 0..active {
            let ch = cursor.read_u8()?;
            let chtype = cursor.read_u8()?;
            if ch as usize >= NCHANNELS {
                return Err(SipmFileError::BadChannelId(ch));
            }
            if !mask_bits[ch as usize] {
                log::warn!(
                    "Board {} trigger {} lists channel {} outside its channel mask",
                    board_id,
                    trigger_id,
                    ch
                );
            }
            let ch = ch as usize;
            if chtype & CHTYPE_HAS_HG != 0 {
                record.high_gain[ch] = cursor.read_u16::<LittleEndian>()?;
            }
            if chtype & CHTYPE_HAS_LG != 0 {
                record.low_gain[ch] = cursor.read_u16::<LittleEndian>()?;
            }
            if chtype & CHTYPE_HAS_TOA != 0 {
                record.toa_ns[ch] = match header.time_unit {
                    TimeUnit::Lsb => {
                        header.toa_tot_conv * cursor.read_u32::<LittleEndian>()? as f32
                    }
                    TimeUnit::Nanoseconds => cursor.read_f32::<LittleEndian>()?,
                };
            }
            if chtype & CHTYPE_HAS_TOT != 0 {
                record.tot_ns[ch] = match header.time_unit {
                    TimeUnit::Lsb => {
                        header.toa_tot_conv * cursor.read_u16::<LittleEndian>()? as f32
                    }
                    TimeUnit::Nanoseconds => cursor.read_f32::<LittleEndian>()?,
                };
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    pub(crate) fn test_header(acq_mode: u8, time_unit: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(3u8); // data format 3.3
        buf.push(3u8);
        buf.push(4u8); // software 4.2.0
        buf.push(2u8);
        buf.push(0u8);
        buf.write_u16::<LittleEndian>(5202).unwrap(); // board type
        buf.write_u16::<LittleEndian>(750).unwrap(); // run number
        buf.push(acq_mode);
        buf.write_u16::<LittleEndian>(4096).unwrap(); // energy histogram bins
        buf.push(time_unit);
        buf.write_f32::<LittleEndian>(0.5).unwrap(); // ns per LSB
        buf.write_u64::<LittleEndian>(1_755_000_000_123).unwrap();
        buf
    }

    /// A fragment for one board with every channel carrying HG and LG only.
    pub(crate) fn spectroscopy_fragment(
        board_id: u8,
        trigger_id: u64,
        timestamp_us: f64,
        hg_base: u16,
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(0).unwrap(); // patched below
        buf.push(board_id);
        buf.write_f64::<LittleEndian>(timestamp_us).unwrap();
        buf.write_u64::<LittleEndian>(trigger_id).unwrap();
        buf.write_u64::<LittleEndian>(u64::MAX).unwrap(); // all 64 channels
        for ch in 0..NCHANNELS as u8 {
            buf.push(ch);
            buf.push(CHTYPE_HAS_HG | CHTYPE_HAS_LG);
            buf.write_u16::<LittleEndian>(hg_base + ch as u16).unwrap();
            buf.write_u16::<LittleEndian>(100 + ch as u16).unwrap();
        }
        let size = buf.len() as u16;
        buf[0..2].copy_from_slice(&size.to_le_bytes());
        buf
    }

    #[test]
    fn test_file_header_fields() {
        let buf: [u8; FILE_HEADER_SIZE] = test_header(3, 0).try_into().unwrap();
        let header = FersFileHeader::read(&buf).unwrap();
        assert_eq!(header.data_format, "3.3");
        assert_eq!(header.software, "4.2.0");
        assert_eq!(header.board_type, 5202);
        assert_eq!(header.run_number, 750);
        assert_eq!(header.acq_mode, AcquisitionMode::SpectroscopyTiming);
        assert_eq!(header.time_unit, TimeUnit::Lsb);
        assert_eq!(header.toa_tot_conv, 0.5);
        assert!(header.start_time().is_some());
    }

    #[test]
    fn test_file_header_bad_mode() {
        let buf: [u8; FILE_HEADER_SIZE] = test_header(9, 0).try_into().unwrap();
        match FersFileHeader::read(&buf) {
            Err(SipmFileError::BadAcqMode(9)) => (),
            other => panic!("expected BadAcqMode, got {other:?}"),
        }
    }

    #[test]
    fn test_fragment_round_trip() {
        let hbuf: [u8; FILE_HEADER_SIZE] = test_header(1, 0).try_into().unwrap();
        let header = FersFileHeader::read(&hbuf).unwrap();
        let buf = spectroscopy_fragment(2, 1234, 5.0e6, 400);
        let record = BoardRecord::read(&buf, &header).unwrap();
        assert_eq!(record.board_id, 2);
        assert_eq!(record.trigger_id, 1234);
        assert_eq!(record.timestamp_us, 5.0e6);
        assert_eq!(record.event_size as usize, buf.len());
        assert_eq!(record.high_gain[0], 400);
        assert_eq!(record.high_gain[63], 463);
        assert_eq!(record.low_gain[10], 110);
        assert_eq!(record.toa_ns[0], 0.0);
    }

    #[test]
    fn test_fragment_toa_conversion() {
        let hbuf: [u8; FILE_HEADER_SIZE] = test_header(3, 0).try_into().unwrap();
        let header = FersFileHeader::read(&hbuf).unwrap();
        // One-channel fragment with ToA in LSB counts.
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(0).unwrap();
        buf.push(0u8);
        buf.write_f64::<LittleEndian>(1.0).unwrap();
        buf.write_u64::<LittleEndian>(9).unwrap();
        buf.write_u64::<LittleEndian>(1).unwrap(); // only channel 0
        buf.push(0u8);
        buf.push(CHTYPE_HAS_TOA | CHTYPE_HAS_TOT);
        buf.write_u32::<LittleEndian>(200).unwrap();
        buf.write_u16::<LittleEndian>(30).unwrap();
        let size = buf.len() as u16;
        buf[0..2].copy_from_slice(&size.to_le_bytes());

        let record = BoardRecord::read(&buf, &header).unwrap();
        // 0.5 ns per LSB from the test header.
        assert_eq!(record.toa_ns[0], 100.0);
        assert_eq!(record.tot_ns[0], 15.0);
        assert_eq!(record.high_gain[0], 0);
    }

    #[test]
    fn test_fragment_bad_channel_id() {
        let hbuf: [u8; FILE_HEADER_SIZE] = test_header(1, 0).try_into().unwrap();
        let header = FersFileHeader::read(&hbuf).unwrap();
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(0).unwrap();
        buf.push(0u8);
        buf.write_f64::<LittleEndian>(1.0).unwrap();
        buf.write_u64::<LittleEndian>(9).unwrap();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.push(64u8); // out of range
        buf.push(CHTYPE_HAS_HG);
        buf.write_u16::<LittleEndian>(1).unwrap();
        let size = buf.len() as u16;
        buf[0..2].copy_from_slice(&size.to_le_bytes());

        match BoardRecord::read(&buf, &header) {
            Err(SipmFileError::BadChannelId(64)) => (),
            other => panic!("expected BadChannelId, got {other:?}"),
        }
    }
}
