use std::path::PathBuf;
use thiserror::Error;

use super::constants::{MAX_SCALE_SHIFT, MIN_FED_SIZE};
use super::detid::{ChannelId, TowerId};
use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error)]
pub enum DetIdError {
    #[error("Found invalid subdetector keyword: {0}")]
    InvalidSubdetector(String),
}

/// Problems found while analysing a single tower. These never abort an event;
/// they are collected as diagnostics and the tower is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TpgError {
    #[error("Tower has undefined format version {0}; no analysis is defined for it")]
    UnknownVersion(u8),
    #[error("Tower has no accumulated samples")]
    EmptySamples,
    #[error("Forward tower has no fiber detail recorded")]
    MissingDetail,
    #[error("Output window (presamples {tp_presamples}, size {tp_samples}) does not fit the {dg_samples} samples with {dg_presamples} presamples")]
    WindowOutOfRange {
        tp_presamples: usize,
        tp_samples: usize,
        dg_presamples: usize,
        dg_samples: usize,
    },
    #[error("QIE10 frame from channel {0} maps to a version 0 tower")]
    Qie10OnLegacyTower(ChannelId),
}

/// A per-tower problem found during one run, reported instead of a digit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub tower: TowerId,
    pub error: TpgError,
}

impl Diagnostic {
    pub fn new(tower: TowerId, error: TpgError) -> Self {
        Self { tower, error }
    }
}

#[derive(Debug, Error)]
pub enum RawDataError {
    #[error("Failed to parse FED block: {0}")]
    IOError(#[from] std::io::Error),
    #[error("FED {0} has {1} bytes; at least {min} are needed for a DCC header", min=MIN_FED_SIZE)]
    TooSmall(u16, usize),
    #[error("FED {0} spigot {1} record lies outside the block")]
    TruncatedSpigot(u16, usize),
}

#[derive(Debug, Error)]
pub enum ElectronicsMapError {
    #[error("ElectronicsMap failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("ElectronicsMap failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("ElectronicsMap failed to parse a subdetector keyword: {0}")]
    BadSubdetector(#[from] DetIdError),
    #[error("ElectronicsMap was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Peak finder algorithm {0} is not defined; use 1 or 2")]
    InvalidPeakFinder(u8),
    #[error("Config requires at least one weight for the sliding sum")]
    EmptyWeights,
    #[error("Config has an empty output window for {0}")]
    EmptyWindow(&'static str),
    #[error("Forward upgrade needs an NCT scale shift of at least 2, found {0}")]
    InvalidScaleShift(u32),
    #[error("Config has {0} = {1}; a linear sum can be shifted by at most {max}", max=MAX_SCALE_SHIFT)]
    ScaleShiftTooLarge(&'static str, u32),
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Event file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to EventFile error: {0}")]
    EventFileError(#[from] EventFileError),
    #[error("Processor failed due to ElectronicsMap error: {0}")]
    MapError(#[from] ElectronicsMapError),
    #[error("Processor failed to write output YAML: {0}")]
    WriteError(#[from] serde_yaml::Error),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Processor failed because worker {0} panicked")]
    WorkerPanic(usize),
}
