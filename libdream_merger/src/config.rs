use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{
    DEFAULT_SCAN_WINDOW, MAX_BOARDS, PEDESTAL_TRIGGER_MASK, PHYSICS_TRIGGER_MASK,
};
use super::error::ConfigError;

/// Structure representing the application configuration. Contains pathing and
/// run information. Configs are serializable and deserializable to YAML using
/// serde and serde_yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the DreamDaq ASCII dumps.
    pub vme_path: PathBuf,
    /// Directory holding the Janus list files.
    pub sipm_path: PathBuf,
    /// Directory merged output is written to.
    pub output_path: PathBuf,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
    /// FERS boards expected per trigger; larger groups are malformed.
    pub board_cap: u8,
    /// Half-width of the alignment offset scan.
    pub scan_window: i64,
    pub pedestal_mask: u32,
    pub physics_mask: u32,
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        Self {
            vme_path: PathBuf::from("None"),
            sipm_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
            board_cap: MAX_BOARDS,
            scan_window: DEFAULT_SCAN_WINDOW,
            pedestal_mask: PEDESTAL_TRIGGER_MASK,
            physics_mask: PHYSICS_TRIGGER_MASK,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check if a specific run exists by evaluating the existence of both
    /// input files.
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.get_vme_file_name(run_number).is_ok() && self.get_sipm_file_name(run_number).is_ok()
    }

    /// Path to the DreamDaq dump of a run, using the test-beam naming scheme.
    pub fn get_vme_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let path = self.vme_path.join(format!("sps_run{run_number}.txt"));
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::BadFilePath(path))
        }
    }

    /// Path to the Janus list file of a run.
    pub fn get_sipm_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let path = self.sipm_path.join(format!("Run{run_number}.0_list.dat"));
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::BadFilePath(path))
        }
    }

    /// Path to the merged output file of a run.
    pub fn get_output_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self
                .output_path
                .join(format!("merged_run{run_number:0>4}.jsonl")))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}
