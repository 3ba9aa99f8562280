use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use super::error::DetIdError;

/// The HCAL partitions a channel (or a trigger tower) can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subdetector {
    Barrel,
    Endcap,
    Outer,
    Forward,
}

impl Subdetector {
    fn code(&self) -> u32 {
        match self {
            Self::Barrel => 1,
            Self::Endcap => 2,
            Self::Outer => 3,
            Self::Forward => 4,
        }
    }

    pub fn is_central(&self) -> bool {
        matches!(self, Self::Barrel | Self::Endcap)
    }
}

impl FromStr for Subdetector {
    type Err = DetIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "HB" || s == "hb" {
            Ok(Self::Barrel)
        } else if s == "HE" || s == "he" {
            Ok(Self::Endcap)
        } else if s == "HO" || s == "ho" {
            Ok(Self::Outer)
        } else if s == "HF" || s == "hf" {
            Ok(Self::Forward)
        } else {
            Err(DetIdError::InvalidSubdetector(s.to_string()))
        }
    }
}

impl fmt::Display for Subdetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Barrel => "HB",
            Self::Endcap => "HE",
            Self::Outer => "HO",
            Self::Forward => "HF",
        };
        write!(f, "{name}")
    }
}

/// A physical readout channel: one (eta, phi, depth) cell of one subdetector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    pub subdet: Subdetector,
    pub ieta: i32,
    pub iphi: u32,
    pub depth: u32,
}

impl ChannelId {
    pub fn new(subdet: Subdetector, ieta: i32, iphi: u32, depth: u32) -> Self {
        Self {
            subdet,
            ieta,
            iphi,
            depth,
        }
    }

    pub fn ieta_abs(&self) -> u32 {
        self.ieta.unsigned_abs()
    }

    pub fn zside(&self) -> i32 {
        if self.ieta < 0 {
            -1
        } else {
            1
        }
    }

    /// Packed 32-bit identifier: subdetector, depth, side, |ieta| and iphi.
    pub fn raw_id(&self) -> u32 {
        let side = u32::from(self.ieta > 0);
        (4 << 28)
            | (self.subdet.code() << 25)
            | ((self.depth & 0x1F) << 20)
            | (side << 19)
            | ((self.ieta_abs() & 0x1FF) << 10)
            | (self.iphi & 0x3FF)
    }

    /// The raw id with the depth cleared. Long and short fibers of the same
    /// forward cell share this id, so it is used as the fiber-pair key.
    pub fn mask_depth(&self) -> u32 {
        self.raw_id() & !(0x1F << 20)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} ieta {} iphi {} depth {})",
            self.subdet, self.ieta, self.iphi, self.depth
        )
    }
}

/// A trigger tower: the unit at which trigger primitives are produced.
///
/// The version selects the readout era the tower belongs to (0 for the legacy
/// RCT towers, 1 for the 1x1 forward towers and the upgrade). It is stored as
/// given; versions other than 0 and 1 are carried through so the analysis can
/// report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId {
    pub ieta: i32,
    pub iphi: u32,
    pub depth: u32,
    pub version: u8,
    pub subdet: Subdetector,
}

impl TowerId {
    pub fn new(subdet: Subdetector, ieta: i32, iphi: u32, version: u8) -> Self {
        Self {
            ieta,
            iphi,
            depth: 0,
            version,
            subdet,
        }
    }

    pub fn ieta_abs(&self) -> u32 {
        self.ieta.unsigned_abs()
    }
}

impl fmt::Display for TowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(tower ieta {} iphi {} depth {} version {})",
            self.ieta, self.iphi, self.depth, self.version
        )
    }
}

/// ElectronicsId is the full readout address of a channel: DCC (FED offset),
/// spigot, VME crate, HTR slot, top/bottom half, fiber and fiber channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElectronicsId {
    pub dcc: u8,
    pub spigot: u8,
    pub crate_id: u8,
    pub slot: u8,
    pub top_bottom: u8,
    pub fiber: u8,
    pub fiber_channel: u8,
}

impl ElectronicsId {
    /// Address of a fiber channel on a spigot; the HTR location is set with
    /// [`ElectronicsId::set_htr`].
    pub fn new(fiber_channel: u8, fiber: u8, spigot: u8, dcc: u8) -> Self {
        Self {
            dcc,
            spigot,
            crate_id: 0,
            slot: 0,
            top_bottom: 0,
            fiber,
            fiber_channel,
        }
    }

    pub fn set_htr(&mut self, crate_id: u8, slot: u8, top_bottom: u8) {
        self.crate_id = crate_id;
        self.slot = slot;
        self.top_bottom = top_bottom;
    }

    pub fn uuid(&self) -> u64 {
        generate_uuid(
            &self.crate_id,
            &self.slot,
            &self.top_bottom,
            &self.fiber,
            &self.fiber_channel,
        )
    }
}

/// Generate a unique id number for a given HTR fiber channel
pub fn generate_uuid(crate_id: &u8, slot: &u8, top_bottom: &u8, fiber: &u8, fiber_channel: &u8) -> u64 {
    (*fiber_channel as u64)
        + (*fiber as u64) * 100
        + (*top_bottom as u64) * 10_000
        + (*slot as u64) * 100_000
        + (*crate_id as u64) * 10_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_depth_pairs_fibers() {
        let long = ChannelId::new(Subdetector::Forward, 33, 5, 1);
        let short = ChannelId::new(Subdetector::Forward, 33, 5, 2);
        assert_ne!(long.raw_id(), short.raw_id());
        assert_eq!(long.mask_depth(), short.mask_depth());

        let other_side = ChannelId::new(Subdetector::Forward, -33, 5, 1);
        assert_ne!(long.mask_depth(), other_side.mask_depth());
    }

    #[test]
    fn test_subdetector_from_str() {
        assert_eq!(Subdetector::from_str("HB").unwrap(), Subdetector::Barrel);
        assert_eq!(Subdetector::from_str("hf").unwrap(), Subdetector::Forward);
        assert!(Subdetector::from_str("ecal").is_err());
    }

    #[test]
    fn test_uuid_distinct() {
        let mut a = ElectronicsId::new(0, 1, 2, 3);
        a.set_htr(4, 5, 1);
        let mut b = ElectronicsId::new(1, 1, 2, 3);
        b.set_htr(4, 5, 1);
        assert_ne!(a.uuid(), b.uuid());
        assert_eq!(a.uuid(), generate_uuid(&4, &5, &1, &1, &0));
    }
}
