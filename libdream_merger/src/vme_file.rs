//! Reader for the DreamDaq ASCII dumps: one event block per line, written as
//! whitespace-separated hexadecimal 32-bit words.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::error::VmeFileError;
use super::vme_block::{decode_block, DecodedEvent};

pub struct VmeFile {
    reader: BufReader<File>,
    path: PathBuf,
    size_bytes: u64,
    bytes_read: u64,
    line_number: usize,
    line: String,
}

impl VmeFile {
    pub fn new(path: &Path) -> Result<Self, VmeFileError> {
        if !path.exists() {
            return Err(VmeFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        log::info!(
            "Opened DAQ dump {} ({})",
            path.to_string_lossy(),
            human_bytes::human_bytes(size_bytes as f64)
        );
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            size_bytes,
            bytes_read: 0,
            line_number: 0,
            line: String::new(),
        })
    }

    /// Decode the next event block.
    ///
    /// Returns `Ok(None)` at end of file. Empty lines are skipped; a line
    /// with a malformed hex token is an error (the dump itself is corrupt,
    /// as opposed to a block with bad structure, which decodes into a
    /// flagged [`DecodedEvent`]).
    pub fn get_next_event(&mut self) -> Result<Option<DecodedEvent>, VmeFileError> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            self.bytes_read += n as u64;
            self.line_number += 1;
            if self.line.trim().is_empty() {
                continue;
            }
            let block = parse_hex_line(&self.line, self.line_number)?;
            return Ok(Some(decode_block(&block)));
        }
    }

    /// Fraction of the file consumed so far, for progress reporting.
    pub fn progress(&self) -> f32 {
        if self.size_bytes == 0 {
            return 1.0;
        }
        self.bytes_read as f32 / self.size_bytes as f32
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Split one dump line into its raw 32-bit words.
pub fn parse_hex_line(line: &str, line_number: usize) -> Result<Vec<u32>, VmeFileError> {
    line.split_whitespace()
        .map(|token| {
            u32::from_str_radix(token, 16)
                .map_err(|_| VmeFileError::BadHexWord(token.to_string(), line_number))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_line() {
        let words = parse_hex_line("ccaaffee 2a 0 e", 1).unwrap();
        assert_eq!(words, vec![0xccaaffee, 0x2a, 0, 0xe]);
    }

    #[test]
    fn test_parse_hex_line_bad_token() {
        match parse_hex_line("ccaaffee zz", 3) {
            Err(VmeFileError::BadHexWord(token, line)) => {
                assert_eq!(token, "zz");
                assert_eq!(line, 3);
            }
            other => panic!("expected BadHexWord, got {other:?}"),
        }
    }
}
