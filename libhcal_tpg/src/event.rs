use serde::{Deserialize, Serialize};
use std::path::Path;

use super::digi::TrigPrimDigiCollection;
use super::error::EventFileError;
use super::frame::Frame;
use super::raw_data::RawDataCollection;

/// The digitized readout of one event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub number: u64,
    #[serde(default)]
    pub frames: Vec<Frame>,
    /// Raw FED payloads, used to find front-end format errors
    #[serde(default)]
    pub raw: RawDataCollection,
}

/// EventFile is the YAML input of the emulator: a list of events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFile {
    pub events: Vec<EventRecord>,
}

impl EventFile {
    pub fn read(path: &Path) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// The trigger primitives produced for one event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventResult {
    pub number: u64,
    pub digis: TrigPrimDigiCollection,
    /// Problems reported while analysing the towers of the event
    pub diagnostics: usize,
    pub vetoed_slices: usize,
    pub fe_error_digis: usize,
}

/// The YAML output of the emulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub events: Vec<EventResult>,
}
