use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum VmeFileError {
    #[error("Could not open DAQ dump because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("DAQ dump failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not parse hex word {0:?} on line {1} of the DAQ dump")]
    BadHexWord(String, usize),
}

#[derive(Debug, Error)]
pub enum SipmFileError {
    #[error("Could not open FERS file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("FERS file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid acquisition mode {0} in FERS file header; expected 1-4")]
    BadAcqMode(u8),
    #[error("Invalid time unit {0} in FERS file header; expected 0 or 1")]
    BadTimeUnit(u8),
    #[error("Acquisition mode {0:?} is not supported by this decoder")]
    UnsupportedAcqMode(super::sipm_record::AcquisitionMode),
    #[error("FERS fragment lists channel id {0}, which exceeds the board channel count")]
    BadChannelId(u8),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Writer failed to serialize a record: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to DAQ dump error: {0}")]
    VmeError(#[from] VmeFileError),
    #[error("Processor failed due to FERS file error: {0}")]
    SipmError(#[from] SipmFileError),
    #[error("Processor failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to writer error: {0}")]
    WriterError(#[from] WriterError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
