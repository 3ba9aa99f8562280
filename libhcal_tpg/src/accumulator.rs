use fxhash::FxHashMap;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::coder::LinearizationCoder;
use super::constants::HF_ANODES_PER_PAIR;
use super::detid::{Subdetector, TowerId};
use super::error::{Diagnostic, TpgError};
use super::finegrain::FinegrainMap;
use super::frame::{ChipKind, Frame, HbheFrame, HfFrame, IntegerCaloSamples, Qie10Frame, Qie11Frame};
use super::geometry::TowerGeometry;
use super::veto::VetoMap;

/// One fiber of a legacy forward cell: linearized samples and the raw frame
#[derive(Debug, Clone, PartialEq)]
pub struct FiberDetail {
    pub samples: Vec<u32>,
    pub frame: HfFrame,
}

/// The long and short fibers of one forward fiber pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HfDetails {
    pub long: Option<FiberDetail>,
    pub short: Option<FiberDetail>,
}

/// One anode of a dual-anode forward cell
#[derive(Debug, Clone, PartialEq)]
pub struct AnodeDetail {
    pub samples: Vec<u32>,
    pub frame: Qie10Frame,
}

/// The four anodes of a dual-anode fiber pair, indexed by depth - 1
pub type AnodeDetails = [Option<AnodeDetail>; HF_ANODES_PER_PAIR];

/// The values the accumulator needs from the algorithm configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulatorSettings {
    pub fg_threshold: u32,
    pub tower_split_weight: f64,
    pub upgrade_hb: bool,
}

/// Per-event working state of the trigger primitive generator.
///
/// One scratch context is owned by each worker and reused across events. It
/// is empty between events.
#[derive(Debug, Clone, Default)]
pub struct EventScratch {
    pub(crate) sums: BTreeMap<TowerId, IntegerCaloSamples>,
    pub(crate) hf_details: FxHashMap<TowerId, FxHashMap<u32, HfDetails>>,
    pub(crate) hf_upgrade_details: FxHashMap<TowerId, FxHashMap<u32, AnodeDetails>>,
    pub(crate) finegrain: FinegrainMap,
    pub(crate) veto: VetoMap,
}

fn scale(values: &[u32], weight: f64) -> Vec<u32> {
    values.iter().map(|v| (*v as f64 * weight) as u32).collect()
}

impl EventScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.sums.clear();
        self.hf_details.clear();
        self.hf_upgrade_details.clear();
        self.finegrain.clear();
        self.veto.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
            && self.hf_details.is_empty()
            && self.hf_upgrade_details.is_empty()
            && self.finegrain.is_empty()
            && self.veto.is_empty()
    }

    /// The accumulated towers of the current event, in tower order
    pub fn sums(&self) -> &BTreeMap<TowerId, IntegerCaloSamples> {
        &self.sums
    }

    pub fn veto_map(&self) -> &VetoMap {
        &self.veto
    }

    pub fn hf_details(&self, id: &TowerId) -> Option<&FxHashMap<u32, HfDetails>> {
        self.hf_details.get(id)
    }

    pub fn hf_upgrade_details(&self, id: &TowerId) -> Option<&FxHashMap<u32, AnodeDetails>> {
        self.hf_upgrade_details.get(id)
    }

    /// Linearize a frame and add it to the towers it belongs to
    pub fn add_frame(
        &mut self,
        frame: &Frame,
        coder: &dyn LinearizationCoder,
        geometry: &dyn TowerGeometry,
        settings: &AccumulatorSettings,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match frame {
            Frame::Hbhe(f) => self.add_hbhe(f, coder, geometry, settings),
            Frame::Hf(f) => self.add_hf(f, coder, geometry),
            Frame::Qie10(f) => self.add_qie10(f, coder, geometry, diagnostics),
            Frame::Qie11(f) => self.add_qie11(f, coder, geometry, settings),
            Frame::Integer(s) => self.add_samples(s.id, s.presamples, &s.samples),
        }
    }

    /// Sum a sequence into the tower entry, creating it when absent
    fn add_samples(&mut self, id: TowerId, presamples: usize, values: &[u32]) {
        match self.sums.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(IntegerCaloSamples::from_values(id, presamples, values.to_vec()));
            }
            Entry::Occupied(mut entry) => entry.get_mut().accumulate(values),
        }
    }

    fn add_hbhe(
        &mut self,
        frame: &HbheFrame,
        coder: &dyn LinearizationCoder,
        geometry: &dyn TowerGeometry,
        settings: &AccumulatorSettings,
    ) {
        let ids = geometry.tower_ids(&frame.id);
        if ids.is_empty() {
            return;
        }
        let adcs = frame.adcs();
        let mut linear = coder.adc_to_linear(&frame.id, ChipKind::Qie8, &adcs);
        let msb = coder.lookup_msb(&frame.id, &adcs, settings.fg_threshold);
        if ids.len() > 1 {
            linear = scale(&linear, settings.tower_split_weight);
        }
        for id in ids {
            self.add_samples(id, frame.presamples, &linear);
            self.finegrain.add_legacy(&id, &msb);
        }
    }

    fn add_hf(&mut self, frame: &HfFrame, coder: &dyn LinearizationCoder, geometry: &dyn TowerGeometry) {
        let depth = frame.id.depth;
        if depth != 1 && depth != 2 {
            return;
        }
        let linear = coder.adc_to_linear(&frame.id, ChipKind::Qie8, &frame.adcs());
        let zeros = vec![0; frame.samples.len()];
        for id in geometry.tower_ids(&frame.id) {
            // Energy enters the tower at analysis time, after the veto
            self.add_samples(id, frame.presamples, &zeros);
            let details = self
                .hf_details
                .entry(id)
                .or_default()
                .entry(frame.id.mask_depth())
                .or_default();
            let detail = Some(FiberDetail {
                samples: linear.clone(),
                frame: frame.clone(),
            });
            if depth == 1 {
                details.long = detail;
            } else {
                details.short = detail;
            }
        }
    }

    fn add_qie10(
        &mut self,
        frame: &Qie10Frame,
        coder: &dyn LinearizationCoder,
        geometry: &dyn TowerGeometry,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        // Calibration channels also read out through QIE10
        if frame.id.subdet != Subdetector::Forward {
            return;
        }
        let depth = frame.id.depth as usize;
        if depth == 0 || depth > HF_ANODES_PER_PAIR {
            return;
        }
        let linear = coder.adc_to_linear(&frame.id, ChipKind::Qie10, &frame.adcs());
        let zeros = vec![0; frame.samples.len()];
        for id in geometry.tower_ids(&frame.id) {
            if id.version == 0 {
                log::warn!("QIE10 frame {} maps to version 0 tower {}", frame.id, id);
                diagnostics.push(Diagnostic::new(id, TpgError::Qie10OnLegacyTower(frame.id)));
                continue;
            }
            self.add_samples(id, frame.presamples, &zeros);
            let anodes = self
                .hf_upgrade_details
                .entry(id)
                .or_default()
                .entry(frame.id.mask_depth())
                .or_default();
            anodes[depth - 1] = Some(AnodeDetail {
                samples: linear.clone(),
                frame: frame.clone(),
            });
        }
    }

    fn add_qie11(
        &mut self,
        frame: &Qie11Frame,
        coder: &dyn LinearizationCoder,
        geometry: &dyn TowerGeometry,
        settings: &AccumulatorSettings,
    ) {
        if !frame.id.subdet.is_central() {
            return;
        }
        let ids = geometry.tower_ids(&frame.id);
        if ids.is_empty() {
            return;
        }
        let adcs = frame.adcs();
        let mut linear = coder.adc_to_linear(&frame.id, ChipKind::Qie11, &adcs);
        let codes = coder.lookup_upgrade_msb(&frame.id, &adcs);
        if ids.len() > 1 {
            linear = scale(&linear, settings.tower_split_weight);
        }
        for id in ids {
            self.add_samples(id, frame.presamples, &linear);
            self.finegrain
                .add_upgrade(&id, frame.id.depth, &codes, settings.upgrade_hb);
        }
    }
}
