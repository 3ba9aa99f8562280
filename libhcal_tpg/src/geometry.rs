use serde::{Deserialize, Serialize};

use super::constants::{
    FIRST_10_DEGREE_TOWER, HBHE_OVERLAP_TOWER, HF_FIRST_TOWER_1X1, HF_FIRST_TOWER_RCT,
    HF_LAST_TOWER, LAST_HBHE_TOWER, NUMBER_OF_IPHI,
};
use super::detid::{ChannelId, Subdetector, TowerId};

/// Mapping of readout channels onto trigger towers.
pub trait TowerGeometry {
    /// Every trigger tower the channel contributes to. Central channels map to
    /// one or two towers; forward channels map to one tower per active
    /// format version.
    fn tower_ids(&self, id: &ChannelId) -> Vec<TowerId>;

    /// The first |ieta| that belongs to the forward calorimeter for a tower
    /// format version
    fn first_hf_tower(&self, version: u8) -> u32;
}

/// Trigger-tower geometry with 5 degree towers in the barrel/endcap and
/// either or both of the forward tower formats (RCT 4x4 groups as version 0,
/// 1x1 towers as version 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTowerGeometry {
    pub rct: bool,
    pub one_by_one: bool,
}

impl Default for SimpleTowerGeometry {
    fn default() -> Self {
        Self {
            rct: true,
            one_by_one: true,
        }
    }
}

fn central_subdet(ieta_abs: u32) -> Subdetector {
    if ieta_abs <= HBHE_OVERLAP_TOWER {
        Subdetector::Barrel
    } else {
        Subdetector::Endcap
    }
}

fn rct_ieta(ieta_abs: u32) -> u32 {
    // 29-31, 32-34, 35-37, 38-41
    match ieta_abs {
        29..=31 => 29,
        32..=34 => 30,
        35..=37 => 31,
        _ => 32,
    }
}

fn rct_iphi(iphi: u32) -> u32 {
    (iphi.saturating_sub(1) / 4) * 4 + 1
}

impl SimpleTowerGeometry {
    fn central_towers(&self, id: &ChannelId) -> Vec<TowerId> {
        // The last endcap ring is read out together with its neighbour
        let ieta_abs = id.ieta_abs().min(LAST_HBHE_TOWER);
        let ieta = ieta_abs as i32 * id.zside();
        let subdet = central_subdet(ieta_abs);
        if ieta_abs >= FIRST_10_DEGREE_TOWER {
            // 10 degree cells feed two 5 degree towers
            let next_iphi = id.iphi % NUMBER_OF_IPHI + 1;
            vec![
                TowerId::new(subdet, ieta, id.iphi, 0),
                TowerId::new(subdet, ieta, next_iphi, 0),
            ]
        } else {
            vec![TowerId::new(subdet, ieta, id.iphi, 0)]
        }
    }

    fn forward_towers(&self, id: &ChannelId) -> Vec<TowerId> {
        let ieta_abs = id.ieta_abs();
        if !(HF_FIRST_TOWER_RCT..=HF_LAST_TOWER).contains(&ieta_abs) {
            return Vec::new();
        }
        let mut towers = Vec::with_capacity(2);
        if self.rct {
            let ieta = rct_ieta(ieta_abs) as i32 * id.zside();
            towers.push(TowerId::new(
                Subdetector::Forward,
                ieta,
                rct_iphi(id.iphi),
                0,
            ));
        }
        if self.one_by_one {
            let ieta = ieta_abs.max(HF_FIRST_TOWER_1X1) as i32 * id.zside();
            towers.push(TowerId::new(Subdetector::Forward, ieta, id.iphi, 1));
        }
        towers
    }
}

impl TowerGeometry for SimpleTowerGeometry {
    fn tower_ids(&self, id: &ChannelId) -> Vec<TowerId> {
        match id.subdet {
            Subdetector::Barrel | Subdetector::Endcap => self.central_towers(id),
            Subdetector::Forward => self.forward_towers(id),
            Subdetector::Outer => Vec::new(),
        }
    }

    fn first_hf_tower(&self, version: u8) -> u32 {
        if version == 0 {
            HF_FIRST_TOWER_RCT
        } else {
            HF_FIRST_TOWER_1X1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrel_single_tower() {
        let geo = SimpleTowerGeometry::default();
        let towers = geo.tower_ids(&ChannelId::new(Subdetector::Barrel, -5, 10, 1));
        assert_eq!(towers, vec![TowerId::new(Subdetector::Barrel, -5, 10, 0)]);
    }

    #[test]
    fn test_ten_degree_split() {
        let geo = SimpleTowerGeometry::default();
        let towers = geo.tower_ids(&ChannelId::new(Subdetector::Endcap, 22, 71, 2));
        assert_eq!(towers.len(), 2);
        assert_eq!(towers[0].iphi, 71);
        assert_eq!(towers[1].iphi, 72);

        let wrap = geo.tower_ids(&ChannelId::new(Subdetector::Endcap, 22, 72, 2));
        assert_eq!(wrap[1].iphi, 1);

        let last = geo.tower_ids(&ChannelId::new(Subdetector::Endcap, -29, 3, 1));
        assert_eq!(last[0].ieta, -28);
    }

    #[test]
    fn test_forward_versions() {
        let geo = SimpleTowerGeometry::default();
        let towers = geo.tower_ids(&ChannelId::new(Subdetector::Forward, 29, 7, 1));
        assert_eq!(towers.len(), 2);
        assert_eq!(towers[0], TowerId::new(Subdetector::Forward, 29, 5, 0));
        assert_eq!(towers[1], TowerId::new(Subdetector::Forward, 30, 7, 1));

        let rct_only = SimpleTowerGeometry {
            rct: true,
            one_by_one: false,
        };
        let towers = rct_only.tower_ids(&ChannelId::new(Subdetector::Forward, -40, 3, 2));
        assert_eq!(towers, vec![TowerId::new(Subdetector::Forward, -32, 1, 0)]);
        assert_eq!(geo.first_hf_tower(0), 29);
        assert_eq!(geo.first_hf_tower(1), 30);
    }
}
