use serde::{Deserialize, Serialize};

use super::constants::COMPRESSED_ET_MAX;
use super::detid::{ChannelId, TowerId};
use super::digi::TpSample;
use super::frame::ChipKind;

/// Conversion of raw ADC counts to linear transverse energy.
pub trait LinearizationCoder {
    /// Linearize one frame's ADC counts. Values must not exceed
    /// [`LinearizationCoder::lut_bitmask`] for the chip.
    fn adc_to_linear(&self, id: &ChannelId, chip: ChipKind, adc: &[u8]) -> Vec<u32>;

    /// Legacy fine-grain MSB per slice: set when the linearized value reaches
    /// the fine-grain threshold
    fn lookup_msb(&self, id: &ChannelId, adc: &[u8], threshold: u32) -> Vec<bool>;

    /// Upgrade fine-grain status per slice (2 bits) for one depth
    fn lookup_upgrade_msb(&self, id: &ChannelId, adc: &[u8]) -> Vec<u8>;

    fn lut_bitmask(&self, chip: ChipKind) -> u32 {
        chip.lut_bitmask()
    }
}

/// Conversion of linear energy to the hardware output encoding.
pub trait Compressor {
    fn compress(&self, id: &TowerId, linear: &[u32], fine_grain: &[u8]) -> Vec<TpSample>;
}

/// A pedestal-subtracted, constant-gain lookup coder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearCoder {
    pub gain: f64,
    pub pedestal: u8,
    /// Thresholds for the two upgrade fine-grain bits
    pub upgrade_fg_thresholds: [u32; 2],
}

impl Default for LinearCoder {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pedestal: 0,
            upgrade_fg_thresholds: [12, 48],
        }
    }
}

impl LinearCoder {
    fn linearize(&self, chip: ChipKind, adc: u8) -> u32 {
        let value = (adc.saturating_sub(self.pedestal) as f64 * self.gain) as u32;
        value.min(chip.lut_bitmask())
    }
}

impl LinearizationCoder for LinearCoder {
    fn adc_to_linear(&self, _id: &ChannelId, chip: ChipKind, adc: &[u8]) -> Vec<u32> {
        adc.iter().map(|a| self.linearize(chip, *a)).collect()
    }

    fn lookup_msb(&self, _id: &ChannelId, adc: &[u8], threshold: u32) -> Vec<bool> {
        adc.iter()
            .map(|a| self.linearize(ChipKind::Qie8, *a) >= threshold)
            .collect()
    }

    fn lookup_upgrade_msb(&self, _id: &ChannelId, adc: &[u8]) -> Vec<u8> {
        adc.iter()
            .map(|a| {
                let value = self.linearize(ChipKind::Qie11, *a);
                let mut bits = 0;
                if value >= self.upgrade_fg_thresholds[0] {
                    bits |= 0b01;
                }
                if value >= self.upgrade_fg_thresholds[1] {
                    bits |= 0b10;
                }
                bits
            })
            .collect()
    }
}

/// Output encoding by right shift, saturating at the 8-bit compressed range.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinearCompressor {
    pub shift: u32,
}

impl Compressor for LinearCompressor {
    fn compress(&self, _id: &TowerId, linear: &[u32], fine_grain: &[u8]) -> Vec<TpSample> {
        linear
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let et = (value >> self.shift).min(COMPRESSED_ET_MAX as u32) as u16;
                TpSample::new(et, fine_grain.get(i).copied().unwrap_or(0))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detid::Subdetector;

    #[test]
    fn test_linear_coder_saturates_per_chip() {
        let coder = LinearCoder {
            gain: 10.0,
            ..Default::default()
        };
        let id = ChannelId::new(Subdetector::Forward, 30, 1, 1);
        assert_eq!(
            coder.adc_to_linear(&id, ChipKind::Qie8, &[0, 10, 200]),
            vec![0, 100, 0x3FF]
        );
        assert_eq!(
            coder.adc_to_linear(&id, ChipKind::Qie10, &[200]),
            vec![0x7FF]
        );
    }

    #[test]
    fn test_pedestal_and_msb() {
        let coder = LinearCoder {
            pedestal: 3,
            ..Default::default()
        };
        let id = ChannelId::new(Subdetector::Barrel, 1, 1, 1);
        assert_eq!(coder.adc_to_linear(&id, ChipKind::Qie8, &[2, 5]), vec![0, 2]);
        assert_eq!(coder.lookup_msb(&id, &[10, 20], 12), vec![false, true]);
        assert_eq!(coder.lookup_upgrade_msb(&id, &[5, 20, 60]), vec![0, 1, 3]);
    }

    #[test]
    fn test_compressor() {
        let compressor = LinearCompressor { shift: 1 };
        let id = TowerId::new(Subdetector::Barrel, 1, 1, 0);
        let out = compressor.compress(&id, &[4, 1000], &[1]);
        assert_eq!(out[0], TpSample::new(2, 1));
        assert_eq!(out[1], TpSample::new(255, 0));
    }
}
