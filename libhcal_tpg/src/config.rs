use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::coder::{LinearCoder, LinearCompressor};
use super::constants::MAX_SCALE_SHIFT;
use super::error::ConfigError;
use super::finegrain::EmFeatureBit;
use super::geometry::SimpleTowerGeometry;
use super::peak::PeakFinderAlgorithm;

/// Which subdetectors are read out with the upgraded front ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeFlags {
    pub hb: bool,
    pub he: bool,
    pub hf: bool,
}

/// Forward-region parameters that can change with running conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TpParameters {
    pub hf_tdc_mask: u64,
    pub hf_adc_threshold: u32,
    pub hf_fg_threshold: u32,
}

impl Default for TpParameters {
    fn default() -> Self {
        Self {
            hf_tdc_mask: u64::MAX,
            hf_adc_threshold: 255,
            hf_fg_threshold: 17,
        }
    }
}

/// A partial replacement for [`TpParameters`]. Fields left as `None` keep the
/// base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TpParametersOverride {
    pub hf_tdc_mask: Option<u64>,
    pub hf_adc_threshold: Option<u32>,
    pub hf_fg_threshold: Option<u32>,
}

impl TpParameters {
    /// The effective parameters for one event. The base is never modified.
    pub fn overlay(&self, patch: Option<&TpParametersOverride>) -> Self {
        match patch {
            None => *self,
            Some(p) => Self {
                hf_tdc_mask: p.hf_tdc_mask.unwrap_or(self.hf_tdc_mask),
                hf_adc_threshold: p.hf_adc_threshold.unwrap_or(self.hf_adc_threshold),
                hf_fg_threshold: p.hf_fg_threshold.unwrap_or(self.hf_fg_threshold),
            },
        }
    }
}

/// Structure representing the trigger-primitive algorithm configuration.
///
/// Thresholds are in linearized ET counts unless stated otherwise; the sample
/// windows are in time slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpgConfig {
    pub peak_finding: bool,
    pub weights: Vec<f64>,
    pub fg_threshold: u32,
    pub fg_hf_threshold: u32,
    pub zs_threshold: f64,
    pub number_of_samples: usize,
    pub number_of_presamples: usize,
    pub number_of_samples_hf: usize,
    pub number_of_presamples_hf: usize,
    pub min_signal_threshold: u32,
    pub pmt_noise_threshold: u32,
    pub peak_finder_algorithm: u8,
    pub nct_scale_shift: u32,
    pub rct_scale_shift: u32,
    pub upgrade: UpgradeFlags,
    /// Weight applied to each contribution of a channel shared by two towers
    pub tower_split_weight: f64,
    pub hf_parameters: TpParameters,
    pub override_parameters: Option<TpParametersOverride>,
}

impl Default for TpgConfig {
    fn default() -> Self {
        Self {
            peak_finding: true,
            weights: vec![1.0, 1.0],
            fg_threshold: 12,
            fg_hf_threshold: 17,
            zs_threshold: 1.0,
            number_of_samples: 4,
            number_of_presamples: 2,
            number_of_samples_hf: 4,
            number_of_presamples_hf: 2,
            min_signal_threshold: 0,
            pmt_noise_threshold: 0,
            peak_finder_algorithm: 2,
            nct_scale_shift: 2,
            rct_scale_shift: 3,
            upgrade: UpgradeFlags::default(),
            tower_split_weight: 0.5,
            hf_parameters: TpParameters::default(),
            override_parameters: None,
        }
    }
}

impl TpgConfig {
    /// Check the values the algorithm relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        PeakFinderAlgorithm::try_from(self.peak_finder_algorithm)?;
        if self.weights.is_empty() {
            return Err(ConfigError::EmptyWeights);
        }
        if self.number_of_samples == 0 {
            return Err(ConfigError::EmptyWindow("number_of_samples"));
        }
        if self.number_of_samples_hf == 0 {
            return Err(ConfigError::EmptyWindow("number_of_samples_hf"));
        }
        check_scale_shift("nct_scale_shift", self.nct_scale_shift)?;
        check_scale_shift("rct_scale_shift", self.rct_scale_shift)?;
        if self.upgrade.hf && self.nct_scale_shift < 2 {
            return Err(ConfigError::InvalidScaleShift(self.nct_scale_shift));
        }
        Ok(())
    }
}

/// A linear sum cannot be shifted by its full width or more
pub fn check_scale_shift(name: &'static str, shift: u32) -> Result<(), ConfigError> {
    if shift > MAX_SCALE_SHIFT {
        Err(ConfigError::ScaleShiftTooLarge(name, shift))
    } else {
        Ok(())
    }
}

/// Structure representing the application configuration. Contains pathing and
/// the parameters of every collaborator the emulator is run with.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub emap_path: Option<PathBuf>,
    pub run_zs: bool,
    pub run_fe_format_error: bool,
    pub geometry: SimpleTowerGeometry,
    pub coder: LinearCoder,
    pub compressor: LinearCompressor,
    pub feature_bit: Option<EmFeatureBit>,
    pub n_threads: usize,
    pub tpg: TpgConfig,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            emap_path: None,
            run_zs: true,
            run_fe_format_error: true,
            geometry: SimpleTowerGeometry::default(),
            coder: LinearCoder::default(),
            compressor: LinearCompressor::default(),
            feature_bit: None,
            n_threads: 1,
            tpg: TpgConfig::default(),
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

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.tpg.validate()?;
        Ok(config)
    }

    /// Get the path to the event file, checking that it exists
    pub fn get_input_file(&self) -> Result<&Path, ConfigError> {
        if self.input_path.exists() {
            Ok(&self.input_path)
        } else {
            Err(ConfigError::BadFilePath(self.input_path.clone()))
        }
    }

    /// Get the path to the output file, checking that its directory exists
    pub fn get_output_file(&self) -> Result<&Path, ConfigError> {
        match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                Err(ConfigError::BadFilePath(parent.to_path_buf()))
            }
            _ => Ok(&self.output_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_keeps_base() {
        let base = TpParameters::default();
        let patch = TpParametersOverride {
            hf_adc_threshold: Some(10),
            ..Default::default()
        };
        let effective = base.overlay(Some(&patch));
        assert_eq!(effective.hf_adc_threshold, 10);
        assert_eq!(effective.hf_tdc_mask, base.hf_tdc_mask);
        assert_eq!(effective.hf_fg_threshold, base.hf_fg_threshold);
        assert_eq!(base, TpParameters::default());
        assert_eq!(base.overlay(None), base);
    }

    #[test]
    fn test_validate() {
        let mut config = TpgConfig::default();
        assert!(config.validate().is_ok());

        config.peak_finder_algorithm = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPeakFinder(3))
        ));

        config.peak_finder_algorithm = 1;
        config.rct_scale_shift = 40;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ScaleShiftTooLarge("rct_scale_shift", 40))
        ));
        config.rct_scale_shift = MAX_SCALE_SHIFT;
        assert!(config.validate().is_ok());

        config.upgrade.hf = true;
        config.nct_scale_shift = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidScaleShift(1))
        ));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: TpgConfig =
            serde_yaml::from_str("peak_finder_algorithm: 1\nupgrade: {hb: true, he: false, hf: false}\n")
                .unwrap();
        assert_eq!(config.peak_finder_algorithm, 1);
        assert!(config.upgrade.hb);
        assert_eq!(config.weights, vec![1.0, 1.0]);
        assert_eq!(config.override_parameters, None);
    }

    #[test]
    fn test_template_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.tpg, config.tpg);
    }
}
