//! Fine-grain bits: per-slice flags travelling with the trigger primitive that
//! let the trigger distinguish broad showers from narrow or noise-like
//! deposits.
//!
//! The legacy central evaluation counts, per slice, how many depths of a
//! tower had their MSB set. The upgrade evaluation keeps the 2-bit status of
//! each depth and hands the whole tower to a [`FinegrainBit`] algorithm. The
//! forward feature bit compares long- and short-fiber energies through a
//! [`FeatureBit`] algorithm.
use bitvec::prelude::*;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::constants::{HBHE_OVERLAP_TOWER, LAST_FINEGRAIN_DEPTH, LAST_FINEGRAIN_TOWER};
use super::detid::TowerId;
use super::frame::{HfFrame, Qie10Frame};

/// One bit per depth (depths 1 to 6 at index 0 to 5)
pub type DepthMask = BitArray<[u8; 1], Lsb0>;

/// The per-depth upgrade fine-grain status of a tower in one time slice.
/// `bits[k]` holds status bit `k` of every depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinegrainTower {
    pub bits: [DepthMask; 2],
}

impl Default for FinegrainTower {
    fn default() -> Self {
        Self {
            bits: [DepthMask::ZERO, DepthMask::ZERO],
        }
    }
}

impl FinegrainTower {
    /// Store the 2-bit status code of a depth (1-based)
    pub fn set_depth(&mut self, depth: u32, code: u8) {
        let index = depth as usize - 1;
        self.bits[0].set(index, code & 0b01 != 0);
        self.bits[1].set(index, code & 0b10 != 0);
    }

    pub fn depth_code(&self, depth: u32) -> u8 {
        let index = depth as usize - 1;
        u8::from(self.bits[0][index]) | (u8::from(self.bits[1][index]) << 1)
    }
}

/// The algorithm turning per-depth status into the tower's fine-grain bits.
pub trait FinegrainBit {
    fn compute(&self, tower: &FinegrainTower) -> u8;
}

/// Version 0 fine-grain algorithm: each output bit is set when any depth has
/// the corresponding status bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthFinegrainBit;

impl FinegrainBit for DepthFinegrainBit {
    fn compute(&self, tower: &FinegrainTower) -> u8 {
        u8::from(tower.bits[0].any()) | (u8::from(tower.bits[1].any()) << 1)
    }
}

/// Long versus short fiber discrimination for the forward calorimeter.
pub trait FeatureBit {
    /// Single readout per fiber
    fn fine_grain_bit(&self, short: &HfFrame, long: &HfFrame, ts: usize) -> bool;

    /// Dual-anode readout. Each anode is given with its validity in this slice.
    fn fine_grain_bit_dual(
        &self,
        shorts: [Option<(&Qie10Frame, bool)>; 2],
        longs: [Option<(&Qie10Frame, bool)>; 2],
        ts: usize,
    ) -> bool;
}

/// Electromagnetic-shower feature bit: both fibers above a minimum energy and
/// the short-fiber energy small compared to the long fiber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmFeatureBit {
    pub short_min_e: f64,
    pub long_min_e: f64,
    pub long_short_slope: f64,
    pub long_short_offset: f64,
    pub adc_to_energy: f64,
}

impl Default for EmFeatureBit {
    fn default() -> Self {
        Self {
            short_min_e: 10.0,
            long_min_e: 10.0,
            long_short_slope: 0.3,
            long_short_offset: 10.1,
            adc_to_energy: 1.0,
        }
    }
}

impl EmFeatureBit {
    fn decide(&self, short_e: f64, long_e: f64) -> bool {
        if short_e < self.short_min_e || long_e < self.long_min_e {
            return false;
        }
        short_e < self.long_short_slope * long_e + self.long_short_offset
    }

    fn anode_energy(&self, anodes: &[Option<(&Qie10Frame, bool)>; 2], ts: usize) -> f64 {
        anodes
            .iter()
            .flatten()
            .filter(|(_, valid)| *valid)
            .filter_map(|(frame, _)| frame.adc(ts))
            .map(|adc| adc as f64 * self.adc_to_energy)
            .sum()
    }
}

impl FeatureBit for EmFeatureBit {
    fn fine_grain_bit(&self, short: &HfFrame, long: &HfFrame, ts: usize) -> bool {
        let short_e = short.adc(ts).unwrap_or(0) as f64 * self.adc_to_energy;
        let long_e = long.adc(ts).unwrap_or(0) as f64 * self.adc_to_energy;
        self.decide(short_e, long_e)
    }

    fn fine_grain_bit_dual(
        &self,
        shorts: [Option<(&Qie10Frame, bool)>; 2],
        longs: [Option<(&Qie10Frame, bool)>; 2],
        ts: usize,
    ) -> bool {
        self.decide(
            self.anode_energy(&shorts, ts),
            self.anode_energy(&longs, ts),
        )
    }
}

/// Whether a depth of a tower takes part in the upgrade fine-grain decision
pub fn valid_upgrade_fg(id: &TowerId, depth: u32, upgrade_hb: bool) -> bool {
    if depth == 0 || depth > LAST_FINEGRAIN_DEPTH {
        return false;
    }
    if id.ieta_abs() > LAST_FINEGRAIN_TOWER {
        return false;
    }
    if id.ieta_abs() == HBHE_OVERLAP_TOWER && !upgrade_hb {
        return false;
    }
    true
}

/// Event-scoped fine-grain inputs of the central towers
#[derive(Debug, Clone, Default)]
pub struct FinegrainMap {
    legacy: FxHashMap<TowerId, Vec<u32>>,
    upgrade: FxHashMap<TowerId, Vec<FinegrainTower>>,
}

impl FinegrainMap {
    /// Add one depth's legacy MSB flags to a tower's per-slice MSB sum
    pub fn add_legacy(&mut self, id: &TowerId, msb: &[bool]) {
        let counts = self.legacy.entry(*id).or_default();
        if counts.len() < msb.len() {
            counts.resize(msb.len(), 0);
        }
        for (count, bit) in counts.iter_mut().zip(msb) {
            *count += u32::from(*bit);
        }
    }

    /// Record one depth's 2-bit status codes. Depths that fail
    /// [`valid_upgrade_fg`] are dropped.
    pub fn add_upgrade(&mut self, id: &TowerId, depth: u32, codes: &[u8], upgrade_hb: bool) {
        if !valid_upgrade_fg(id, depth, upgrade_hb) {
            return;
        }
        let towers = self.upgrade.entry(*id).or_default();
        if towers.len() < codes.len() {
            towers.resize(codes.len(), FinegrainTower::default());
        }
        for (tower, code) in towers.iter_mut().zip(codes) {
            tower.set_depth(depth, *code);
        }
    }

    /// Legacy flags of a tower, one per slice: set when at least one depth had
    /// its MSB set. Towers without MSB information give an all-false vector.
    pub fn legacy_flags(&self, id: &TowerId, size: usize) -> Vec<bool> {
        let mut flags = vec![false; size];
        if let Some(counts) = self.legacy.get(id) {
            for (flag, count) in flags.iter_mut().zip(counts) {
                *flag = *count >= 1;
            }
        }
        flags
    }

    /// The aggregated upgrade status of a tower in one slice
    pub fn upgrade_tower(&self, id: &TowerId, slice: usize) -> FinegrainTower {
        self.upgrade
            .get(id)
            .and_then(|towers| towers.get(slice))
            .copied()
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.legacy.clear();
        self.upgrade.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.legacy.is_empty() && self.upgrade.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detid::{ChannelId, Subdetector};
    use crate::frame::{Qie10Sample, QieSample};

    fn tower(ieta: i32) -> TowerId {
        TowerId::new(Subdetector::Barrel, ieta, 1, 0)
    }

    #[test]
    fn test_depth_codes() {
        let mut t = FinegrainTower::default();
        t.set_depth(1, 0b01);
        t.set_depth(6, 0b11);
        assert_eq!(t.depth_code(1), 0b01);
        assert_eq!(t.depth_code(6), 0b11);
        assert_eq!(t.depth_code(3), 0);
        assert_eq!(DepthFinegrainBit.compute(&t), 0b11);
        assert_eq!(DepthFinegrainBit.compute(&FinegrainTower::default()), 0);
    }

    #[test]
    fn test_valid_upgrade_fg() {
        assert!(valid_upgrade_fg(&tower(5), 6, false));
        assert!(!valid_upgrade_fg(&tower(5), 7, false));
        assert!(!valid_upgrade_fg(&tower(5), 0, true));
        assert!(!valid_upgrade_fg(&tower(29), 1, true));
        assert!(!valid_upgrade_fg(&tower(-16), 1, false));
        assert!(valid_upgrade_fg(&tower(-16), 1, true));
    }

    #[test]
    fn test_invalid_depths_are_ignored() {
        let mut map = FinegrainMap::default();
        map.add_upgrade(&tower(3), 7, &[0b11, 0b11], false);
        assert!(map.is_empty());
        map.add_upgrade(&tower(3), 2, &[0b10, 0b00], false);
        assert_eq!(map.upgrade_tower(&tower(3), 0).depth_code(2), 0b10);
        assert_eq!(map.upgrade_tower(&tower(3), 1).depth_code(2), 0);
    }

    #[test]
    fn test_legacy_flags_are_pure() {
        let mut map = FinegrainMap::default();
        map.add_legacy(&tower(2), &[false, true, false]);
        map.add_legacy(&tower(2), &[false, true, true]);
        let first = map.legacy_flags(&tower(2), 3);
        let second = map.legacy_flags(&tower(2), 3);
        assert_eq!(first, vec![false, true, true]);
        assert_eq!(first, second);
        assert_eq!(map.legacy_flags(&tower(9), 2), vec![false, false]);
    }

    #[test]
    fn test_em_feature_bit() {
        let bit = EmFeatureBit::default();
        let id = ChannelId::new(Subdetector::Forward, 33, 1, 1);
        let frame = |adc: u8| HfFrame {
            id,
            presamples: 0,
            samples: vec![QieSample { adc, capid: 0 }],
        };
        // electromagnetic: long large, short small
        assert!(bit.fine_grain_bit(&frame(12), &frame(100), 0));
        // hadronic: short comparable to long
        assert!(!bit.fine_grain_bit(&frame(90), &frame(100), 0));
        // below minimum
        assert!(!bit.fine_grain_bit(&frame(2), &frame(100), 0));

        let anode = |adc: u8| Qie10Frame {
            id,
            presamples: 0,
            samples: vec![Qie10Sample {
                adc,
                le_tdc: 0,
                ok: true,
            }],
        };
        let (s1, s2, l1, l2) = (anode(6), anode(6), anode(50), anode(50));
        assert!(bit.fine_grain_bit_dual(
            [Some((&s1, true)), Some((&s2, true))],
            [Some((&l1, true)), Some((&l2, true))],
            0
        ));
        // invalid short anode drops the short energy below minimum
        assert!(!bit.fine_grain_bit_dual(
            [Some((&s1, true)), Some((&s2, false))],
            [Some((&l1, true)), None],
            0
        ));
    }
}
