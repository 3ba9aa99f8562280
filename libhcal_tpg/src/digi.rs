use serde::{Deserialize, Serialize};

use super::detid::TowerId;

/// One output time slice of a trigger primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TpSample {
    pub compressed_et: u16,
    /// Fine-grain bits; bit 0 and bit 1 are used
    pub fine_grain: u8,
    /// Set when the front end reported a format error for this tower
    #[serde(default)]
    pub fe_error: bool,
}

impl TpSample {
    pub fn new(compressed_et: u16, fine_grain: u8) -> Self {
        Self {
            compressed_et,
            fine_grain,
            fe_error: false,
        }
    }

    pub fn fine_grain_bit(&self, bit: u8) -> bool {
        (self.fine_grain >> bit) & 1 == 1
    }
}

/// The trigger primitive of one tower for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPrimitiveDigi {
    pub id: TowerId,
    pub presamples: usize,
    pub samples: Vec<TpSample>,
    /// Marked by the zero-suppression pass when every sample is zero
    #[serde(default)]
    pub zero_suppressed: bool,
}

impl TriggerPrimitiveDigi {
    pub fn new(id: TowerId, presamples: usize, samples: Vec<TpSample>) -> Self {
        Self {
            id,
            presamples,
            samples,
            zero_suppressed: false,
        }
    }

    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// The sample in the nominal bunch crossing, if the window has one
    pub fn soi(&self) -> Option<&TpSample> {
        self.samples.get(self.presamples)
    }

    pub fn has_fe_error(&self) -> bool {
        self.samples.iter().any(|s| s.fe_error)
    }
}

pub type TrigPrimDigiCollection = Vec<TriggerPrimitiveDigi>;
