use serde::{Deserialize, Serialize};

use super::constants::{
    QIE10_LUT_BITMASK, QIE10_MAX_LINEARIZATION_ET, QIE11_LUT_BITMASK, QIE11_MAX_LINEARIZATION_ET,
    QIE8_LUT_BITMASK,
};
use super::detid::{ChannelId, TowerId};

/// The front-end charge integrator generation a frame was digitized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipKind {
    Qie8,
    Qie10,
    Qie11,
}

impl ChipKind {
    pub fn lut_bitmask(&self) -> u32 {
        match self {
            Self::Qie8 => QIE8_LUT_BITMASK,
            Self::Qie10 => QIE10_LUT_BITMASK,
            Self::Qie11 => QIE11_LUT_BITMASK,
        }
    }

    pub fn max_linearization_et(&self) -> u32 {
        match self {
            Self::Qie8 => QIE8_LUT_BITMASK,
            Self::Qie10 => QIE10_MAX_LINEARIZATION_ET,
            Self::Qie11 => QIE11_MAX_LINEARIZATION_ET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QieSample {
    pub adc: u8,
    #[serde(default)]
    pub capid: u8,
}

fn default_ok() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qie10Sample {
    pub adc: u8,
    #[serde(default)]
    pub le_tdc: u8,
    #[serde(default = "default_ok")]
    pub ok: bool,
}

impl Default for Qie10Sample {
    fn default() -> Self {
        Self {
            adc: 0,
            le_tdc: 0,
            ok: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Qie11Sample {
    pub adc: u8,
    #[serde(default)]
    pub tdc: u8,
}

/// Legacy (QIE8) barrel/endcap frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HbheFrame {
    pub id: ChannelId,
    pub presamples: usize,
    pub samples: Vec<QieSample>,
}

/// Legacy (QIE8) forward frame. Depth 1 is the long fiber, depth 2 the short fiber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HfFrame {
    pub id: ChannelId,
    pub presamples: usize,
    pub samples: Vec<QieSample>,
}

/// Dual-anode forward frame. Depths 1 to 4 are the anodes; odd depths (1, 3)
/// read the long fiber, even depths (2, 4) the short fiber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qie10Frame {
    pub id: ChannelId,
    pub presamples: usize,
    pub samples: Vec<Qie10Sample>,
}

/// Upgrade barrel/endcap frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qie11Frame {
    pub id: ChannelId,
    pub presamples: usize,
    pub samples: Vec<Qie11Sample>,
}

impl HbheFrame {
    pub fn adcs(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.adc).collect()
    }
}

impl HfFrame {
    pub fn adcs(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.adc).collect()
    }

    pub fn adc(&self, ts: usize) -> Option<u8> {
        self.samples.get(ts).map(|s| s.adc)
    }
}

impl Qie10Frame {
    pub fn adcs(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.adc).collect()
    }

    pub fn adc(&self, ts: usize) -> Option<u8> {
        self.samples.get(ts).map(|s| s.adc)
    }
}

impl Qie11Frame {
    pub fn adcs(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.adc).collect()
    }
}

/// Linear energy samples for one trigger tower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerCaloSamples {
    pub id: TowerId,
    pub presamples: usize,
    pub samples: Vec<u32>,
}

impl IntegerCaloSamples {
    /// All-zero samples of the given size
    pub fn new(id: TowerId, presamples: usize, size: usize) -> Self {
        Self {
            id,
            presamples,
            samples: vec![0; size],
        }
    }

    pub fn from_values(id: TowerId, presamples: usize, samples: Vec<u32>) -> Self {
        Self {
            id,
            presamples,
            samples,
        }
    }

    pub fn size(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Add another sequence slice by slice. The shorter sequence is treated
    /// as zero-extended, so the sum does not depend on call order.
    pub fn accumulate(&mut self, other: &[u32]) {
        if other.len() > self.samples.len() {
            self.samples.resize(other.len(), 0);
        }
        for (sum, value) in self.samples.iter_mut().zip(other) {
            *sum = sum.saturating_add(*value);
        }
    }
}

/// Any digitized frame the emulator accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Hbhe(HbheFrame),
    Hf(HfFrame),
    Qie10(Qie10Frame),
    Qie11(Qie11Frame),
    Integer(IntegerCaloSamples),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detid::Subdetector;

    #[test]
    fn test_accumulate_zero_extends() {
        let id = TowerId::new(Subdetector::Barrel, 1, 1, 0);
        let mut a = IntegerCaloSamples::from_values(id, 2, vec![1, 2]);
        a.accumulate(&[10, 20, 30]);
        assert_eq!(a.samples, vec![11, 22, 30]);

        let mut b = IntegerCaloSamples::from_values(id, 2, vec![10, 20, 30]);
        b.accumulate(&[1, 2]);
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn test_chip_constants() {
        assert_eq!(ChipKind::Qie8.lut_bitmask(), 0x3FF);
        assert_eq!(ChipKind::Qie10.lut_bitmask(), 0x7FF);
        assert_eq!(ChipKind::Qie11.max_linearization_et(), 0x7FF);
    }

    #[test]
    fn test_frame_yaml_tagging() {
        let yaml = "kind: qie10\nid: {subdet: Forward, ieta: 33, iphi: 5, depth: 3}\npresamples: 1\nsamples:\n  - {adc: 12, le_tdc: 4}\n  - {adc: 3}\n";
        let frame: Frame = serde_yaml::from_str(yaml).unwrap();
        match frame {
            Frame::Qie10(f) => {
                assert_eq!(f.id.depth, 3);
                assert_eq!(f.samples[0].le_tdc, 4);
                assert!(f.samples[1].ok);
            }
            _ => panic!(),
        }
    }
}
