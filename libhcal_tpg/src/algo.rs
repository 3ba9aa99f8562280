//! The trigger primitive generator.
//!
//! One call to [`TriggerPrimitiveAlgo::run`] turns the digitized frames of one
//! event into one trigger primitive per touched tower:
//!
//! 1. every frame is linearized and summed into its towers ([`EventScratch`])
//! 2. each tower picks exactly one [`Analysis`] from its region, format version
//!    and the upgrade flags
//! 3. the analysis aligns the output window, finds peaks or sums the forward
//!    fibers, evaluates the fine-grain bits and hands the result to the
//!    [`Compressor`]
//!
//! Zero suppression ([`TriggerPrimitiveAlgo::run_zs`]) and front-end error
//! flagging ([`TriggerPrimitiveAlgo::run_fe_format_error`]) are separate passes
//! over the produced collection.
use fxhash::{FxHashMap, FxHashSet};

use super::accumulator::{AccumulatorSettings, AnodeDetails, EventScratch, HfDetails};
use super::coder::{Compressor, LinearizationCoder};
use super::config::{check_scale_shift, TpParameters, TpParametersOverride, TpgConfig, UpgradeFlags};
use super::constants::{
    CHANNELS_PER_FIBER, FIBERS_PER_SPIGOT, HBHE_OVERLAP_TOWER, HF_2017_AVERAGING_SHIFT,
    HF_CHANNEL_EXCLUDED_FROM_FG, HF_LONG_ANODES, HF_SHORT_ANODES, MIN_FED_SIZE, MIN_HCAL_FED_ID,
    QIE10_MAX_LINEARIZATION_ET, QIE11_MAX_LINEARIZATION_ET, QIE8_LUT_BITMASK,
};
use super::detid::{ElectronicsId, Subdetector, TowerId};
use super::digi::{TrigPrimDigiCollection, TriggerPrimitiveDigi};
use super::electronics_map::ElectronicsMap;
use super::error::{ConfigError, Diagnostic, TpgError};
use super::finegrain::{FeatureBit, FinegrainBit, FinegrainMap};
use super::frame::{ChipKind, Frame, IntegerCaloSamples, Qie10Sample};
use super::geometry::TowerGeometry;
use super::peak::{weighted_sums, PeakFinderAlgorithm};
use super::raw_data::{is_hcal_fed, FedBlock};
use super::veto::{NoiseVeto, VetoMap};

/// The collaborators a run is made with. They are only read.
#[derive(Clone, Copy)]
pub struct Conditions<'a> {
    pub coder: &'a dyn LinearizationCoder,
    pub compressor: &'a dyn Compressor,
    pub geometry: &'a dyn TowerGeometry,
    pub finegrain: &'a dyn FinegrainBit,
    pub feature_bit: Option<&'a dyn FeatureBit>,
}

/// What happened during one run besides the produced digis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub towers: usize,
    pub digis: usize,
    pub vetoed_slices: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// The analysis a tower is given. Chosen once per tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    /// Version 0 forward (RCT towers)
    LegacyForward,
    /// Version 1 forward, single readout per fiber
    Forward2016,
    /// Version 1 forward, dual-anode readout
    Forward2017,
    LegacyCentral,
    Central2017,
}

impl Analysis {
    pub fn select(
        id: &TowerId,
        geometry: &dyn TowerGeometry,
        upgrade: &UpgradeFlags,
    ) -> Result<Self, TpgError> {
        if id.version > 1 {
            return Err(TpgError::UnknownVersion(id.version));
        }
        let forward = id.ieta_abs() >= geometry.first_hf_tower(id.version);
        let ieta_abs = id.ieta_abs();
        let analysis = if forward {
            match (id.version, upgrade.hf) {
                (0, _) => Self::LegacyForward,
                (_, true) => Self::Forward2017,
                (_, false) => Self::Forward2016,
            }
        } else if upgrade.he && ieta_abs > HBHE_OVERLAP_TOWER {
            Self::Central2017
        } else if upgrade.hb && ieta_abs <= HBHE_OVERLAP_TOWER {
            Self::Central2017
        } else {
            Self::LegacyCentral
        };
        Ok(analysis)
    }
}

/// Placement of the output window inside the accumulated samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    shift: usize,
    presamples: usize,
    size: usize,
}

/// Linear output of one analysed tower, before compression
#[derive(Debug, Clone, PartialEq, Eq)]
struct TowerOutput {
    presamples: usize,
    linear: Vec<u32>,
    fine_grain: Vec<u8>,
}

/// The configured window, if it lies inside the samples
fn configured_window(
    dg_presamples: usize,
    dg_samples: usize,
    tp_presamples: usize,
    tp_samples: usize,
) -> Option<Window> {
    let shift = dg_presamples.checked_sub(tp_presamples)?;
    if shift + tp_samples > dg_samples {
        return None;
    }
    Some(Window {
        shift,
        presamples: tp_presamples,
        size: tp_samples,
    })
}

fn fiber_value(samples: Option<&Vec<u32>>, idx: usize) -> u32 {
    samples.and_then(|s| s.get(idx)).copied().unwrap_or(0)
}

/// An anode sample takes part in the energy sum when its ADC is small or its
/// leading-edge TDC falls in an accepted bin
fn pass_tdc(sample: &Qie10Sample, params: &TpParameters) -> bool {
    (sample.adc as u32) < params.hf_adc_threshold
        || 1u64
            .checked_shl(sample.le_tdc as u32)
            .is_some_and(|bit| bit & params.hf_tdc_mask != 0)
}

/// The HCAL trigger primitive generator.
///
/// The algorithm holds only configuration; all per-event state lives in the
/// [`EventScratch`] given to [`TriggerPrimitiveAlgo::run`].
#[derive(Debug, Clone)]
pub struct TriggerPrimitiveAlgo {
    config: TpgConfig,
    peak_finder: PeakFinderAlgorithm,
    zs_threshold: i32,
}

impl TriggerPrimitiveAlgo {
    pub fn new(config: TpgConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let peak_finder = PeakFinderAlgorithm::try_from(config.peak_finder_algorithm)?;
        let zs_threshold = config.zs_threshold as i32;
        Ok(Self {
            config,
            peak_finder,
            zs_threshold,
        })
    }

    pub fn config(&self) -> &TpgConfig {
        &self.config
    }

    pub fn peak_finder(&self) -> PeakFinderAlgorithm {
        self.peak_finder
    }

    pub fn set_peak_finder_algorithm(&mut self, algorithm: u8) -> Result<(), ConfigError> {
        self.peak_finder = PeakFinderAlgorithm::try_from(algorithm)?;
        self.config.peak_finder_algorithm = algorithm;
        Ok(())
    }

    pub fn set_nct_scale_shift(&mut self, shift: u32) -> Result<(), ConfigError> {
        check_scale_shift("nct_scale_shift", shift)?;
        self.config.nct_scale_shift = shift;
        Ok(())
    }

    pub fn set_rct_scale_shift(&mut self, shift: u32) -> Result<(), ConfigError> {
        check_scale_shift("rct_scale_shift", shift)?;
        self.config.rct_scale_shift = shift;
        Ok(())
    }

    pub fn set_upgrade_flags(&mut self, hb: bool, he: bool, hf: bool) {
        self.config.upgrade = UpgradeFlags { hb, he, hf };
    }

    /// Replace forward parameters for the following runs. The configured base
    /// values are kept and can be restored with [`TriggerPrimitiveAlgo::clear_override`].
    pub fn override_parameters(&mut self, patch: TpParametersOverride) {
        self.config.override_parameters = Some(patch);
    }

    pub fn clear_override(&mut self) {
        self.config.override_parameters = None;
    }

    /// The forward parameters a run uses
    pub fn effective_parameters(&self) -> TpParameters {
        self.config
            .hf_parameters
            .overlay(self.config.override_parameters.as_ref())
    }

    fn noise_veto(&self) -> NoiseVeto {
        NoiseVeto::new(
            self.config.min_signal_threshold,
            self.config.pmt_noise_threshold,
        )
    }

    /// Produce the trigger primitives of one event and append them to `result`.
    ///
    /// Towers that cannot be analysed give no digi; the reason is recorded in
    /// the returned report. The scratch context is empty when this returns.
    pub fn run(
        &self,
        scratch: &mut EventScratch,
        conditions: &Conditions,
        frames: &[Frame],
        result: &mut TrigPrimDigiCollection,
    ) -> RunReport {
        scratch.clear();
        let mut report = RunReport::default();
        let params = self.effective_parameters();
        let settings = AccumulatorSettings {
            fg_threshold: self.config.fg_threshold,
            tower_split_weight: self.config.tower_split_weight,
            upgrade_hb: self.config.upgrade.hb,
        };

        for frame in frames {
            scratch.add_frame(
                frame,
                conditions.coder,
                conditions.geometry,
                &settings,
                &mut report.diagnostics,
            );
        }

        let EventScratch {
            sums,
            hf_details,
            hf_upgrade_details,
            finegrain,
            veto,
        } = &mut *scratch;

        report.towers = sums.len();
        for (id, samples) in sums.iter() {
            let analysed = if samples.is_empty() {
                Err(TpgError::EmptySamples)
            } else {
                Analysis::select(id, conditions.geometry, &self.config.upgrade).and_then(
                    |analysis| match analysis {
                        Analysis::LegacyForward => {
                            self.analyze_legacy_forward(id, samples, hf_details.get(id), veto)
                        }
                        Analysis::Forward2016 => {
                            self.analyze_forward_2016(samples, hf_details.get(id), conditions)
                        }
                        Analysis::Forward2017 => self.analyze_forward_2017(
                            samples,
                            hf_upgrade_details.get(id),
                            veto,
                            conditions,
                            &params,
                        ),
                        Analysis::LegacyCentral => {
                            self.analyze_legacy_central(id, samples, finegrain)
                        }
                        Analysis::Central2017 => {
                            self.analyze_central_2017(id, samples, finegrain, conditions)
                        }
                    },
                )
            };

            match analysed {
                Ok(output) => {
                    let compressed =
                        conditions
                            .compressor
                            .compress(id, &output.linear, &output.fine_grain);
                    result.push(TriggerPrimitiveDigi::new(*id, output.presamples, compressed));
                    report.digis += 1;
                }
                Err(error) => {
                    log::warn!("Skipping tower {}: {}", id, error);
                    report.diagnostics.push(Diagnostic::new(*id, error));
                }
            }
        }

        report.vetoed_slices = veto.vetoed_count();
        scratch.clear();
        report
    }

    /// Output window of the central analyses. A window that does not fit is
    /// replaced by the widest window the samples allow.
    fn central_window(&self, id: &TowerId, samples: &IntegerCaloSamples) -> Result<Window, TpgError> {
        let shrink = self.config.weights.len().saturating_sub(1) as i64;
        let peak_finding = self.config.peak_finding;
        // slices needed after the window by the peak comparison
        let tail = if peak_finding {
            self.peak_finder.number() as i64 - 1
        } else {
            0
        };
        let dg_presamples = samples.presamples as i64;
        let dg_samples = samples.size() as i64;
        let mut presamples = self.config.number_of_presamples as i64;
        let mut size = self.config.number_of_samples as i64;
        let mut shift = dg_presamples - presamples;

        if shift < shrink || shift + size + shrink > dg_samples - tail {
            log::info!(
                "Output window of tower {} (presamples {}, size {}) is outside the {} accumulated samples; using the sample window instead",
                id,
                presamples,
                size,
                dg_samples
            );
            shift = if peak_finding { shrink.max(1) } else { shrink };
            presamples = dg_presamples - shift;
            size = dg_samples - tail - shrink - shift;
        }

        if shift < 0 || presamples < 0 || size <= 0 || shift + size + shrink > dg_samples - tail {
            return Err(TpgError::WindowOutOfRange {
                tp_presamples: self.config.number_of_presamples,
                tp_samples: self.config.number_of_samples,
                dg_presamples: samples.presamples,
                dg_samples: samples.size(),
            });
        }
        Ok(Window {
            shift: shift as usize,
            presamples: presamples as usize,
            size: size as usize,
        })
    }

    /// Output window of the 1x1 forward analyses; these have no fallback
    fn forward_window(&self, samples: &IntegerCaloSamples) -> Result<Window, TpgError> {
        configured_window(
            samples.presamples,
            samples.size(),
            self.config.number_of_presamples_hf,
            self.config.number_of_samples_hf,
        )
        .ok_or(TpgError::WindowOutOfRange {
            tp_presamples: self.config.number_of_presamples_hf,
            tp_samples: self.config.number_of_samples_hf,
            dg_presamples: samples.presamples,
            dg_samples: samples.size(),
        })
    }

    fn analyze_legacy_central(
        &self,
        id: &TowerId,
        samples: &IntegerCaloSamples,
        finegrain: &FinegrainMap,
    ) -> Result<TowerOutput, TpgError> {
        let sums = weighted_sums(&samples.samples, &self.config.weights, None);
        let window = self.central_window(id, samples)?;
        let msb = finegrain.legacy_flags(id, samples.size());

        let mut linear = vec![0; window.size];
        let mut fine_grain = vec![0; window.size];
        for ibin in 0..window.size {
            let idx = ibin + window.shift;
            let candidate = !self.config.peak_finding
                || self.peak_finder.is_peak(&samples.samples, &sums, idx, 0);
            if candidate {
                linear[ibin] = sums[idx].min(QIE8_LUT_BITMASK);
                fine_grain[ibin] = u8::from(msb[idx]);
            }
            // a saturated single slice pegs the output
            if self.peak_finder == PeakFinderAlgorithm::SingleSample
                && samples.samples[idx] >= QIE8_LUT_BITMASK
            {
                linear[ibin] = QIE8_LUT_BITMASK;
            }
        }

        Ok(TowerOutput {
            presamples: window.presamples,
            linear,
            fine_grain,
        })
    }

    fn analyze_central_2017(
        &self,
        id: &TowerId,
        samples: &IntegerCaloSamples,
        finegrain: &FinegrainMap,
        conditions: &Conditions,
    ) -> Result<TowerOutput, TpgError> {
        let sums = weighted_sums(
            &samples.samples,
            &self.config.weights,
            Some(QIE11_MAX_LINEARIZATION_ET),
        );
        let window = self.central_window(id, samples)?;

        let mut linear = vec![0; window.size];
        let mut fine_grain = vec![0; window.size];
        for ibin in 0..window.size {
            let idx = ibin + window.shift;
            let candidate = !self.config.peak_finding
                || self.peak_finder.is_peak(&samples.samples, &sums, idx, 0);
            if candidate {
                linear[ibin] = sums[idx].min(QIE11_MAX_LINEARIZATION_ET);
            }
            // not peak gated
            fine_grain[ibin] = conditions
                .finegrain
                .compute(&finegrain.upgrade_tower(id, idx));
        }

        Ok(TowerOutput {
            presamples: window.presamples,
            linear,
            fine_grain,
        })
    }

    fn analyze_legacy_forward(
        &self,
        id: &TowerId,
        samples: &IntegerCaloSamples,
        details: Option<&FxHashMap<u32, HfDetails>>,
        veto_map: &mut VetoMap,
    ) -> Result<TowerOutput, TpgError> {
        let details = details.ok_or(TpgError::MissingDetail)?;
        let window = configured_window(
            samples.presamples,
            samples.size(),
            self.config.number_of_presamples_hf,
            self.config.number_of_samples_hf,
        )
        .unwrap_or_else(|| {
            log::info!(
                "Output window of forward tower {} is outside the {} accumulated samples; using the full sample window",
                id,
                samples.size()
            );
            Window {
                shift: 0,
                presamples: samples.presamples,
                size: samples.size(),
            }
        });

        let veto = self.noise_veto();
        let mut total = samples.samples.clone();
        let mut fine_grain = vec![0; window.size];
        for (fiber_pair, pair) in details {
            let long = pair.long.as_ref().map(|d| &d.samples);
            let short = pair.short.as_ref().map(|d| &d.samples);
            for ibin in 0..window.size {
                let idx = ibin + window.shift;
                let vetoed = veto.apply(fiber_value(long, idx), fiber_value(short, idx));
                veto_map.record(*fiber_pair, idx, samples.size(), vetoed.vetoed);
                if !vetoed.vetoed {
                    total[idx] = total[idx].saturating_add(vetoed.sum);
                    if vetoed.sum >= self.config.fg_hf_threshold {
                        fine_grain[ibin] = 1;
                    }
                }
            }
        }

        let linear = (0..window.size)
            .map(|ibin| (total[ibin + window.shift] >> self.config.rct_scale_shift).min(QIE8_LUT_BITMASK))
            .collect();
        Ok(TowerOutput {
            presamples: window.presamples,
            linear,
            fine_grain,
        })
    }

    fn analyze_forward_2016(
        &self,
        samples: &IntegerCaloSamples,
        details: Option<&FxHashMap<u32, HfDetails>>,
        conditions: &Conditions,
    ) -> Result<TowerOutput, TpgError> {
        let details = details.ok_or(TpgError::MissingDetail)?;
        let window = self.forward_window(samples)?;

        let mut linear = vec![0u32; window.size];
        let mut fine_grain = vec![0u8; window.size];
        for pair in details.values() {
            let long = pair.long.as_ref();
            let short = pair.short.as_ref();
            let channel = long.or(short).map(|d| d.frame.id);
            let fg_channel =
                channel.is_some_and(|c| c.ieta_abs() != HF_CHANNEL_EXCLUDED_FROM_FG);
            for ibin in 0..window.size {
                let idx = ibin + window.shift;
                let energy = fiber_value(long.map(|d| &d.samples), idx)
                    + fiber_value(short.map(|d| &d.samples), idx);
                linear[ibin] = linear[ibin].saturating_add(energy);

                let adc_long = long.and_then(|d| d.frame.adc(idx)).unwrap_or(0) as u32;
                let adc_short = short.and_then(|d| d.frame.adc(idx)).unwrap_or(0) as u32;
                if fg_channel
                    && (adc_long > self.config.fg_hf_threshold
                        || adc_short > self.config.fg_hf_threshold)
                {
                    fine_grain[ibin] |= 0b10;
                }
                if let (Some(bit), Some(l), Some(s)) = (conditions.feature_bit, long, short) {
                    if bit.fine_grain_bit(&s.frame, &l.frame, idx) {
                        fine_grain[ibin] |= 0b01;
                    }
                }
            }
        }

        for value in linear.iter_mut() {
            *value = (*value >> self.config.nct_scale_shift).min(QIE8_LUT_BITMASK);
        }
        Ok(TowerOutput {
            presamples: window.presamples,
            linear,
            fine_grain,
        })
    }

    fn analyze_forward_2017(
        &self,
        samples: &IntegerCaloSamples,
        details: Option<&FxHashMap<u32, AnodeDetails>>,
        veto_map: &mut VetoMap,
        conditions: &Conditions,
        params: &TpParameters,
    ) -> Result<TowerOutput, TpgError> {
        let details = details.ok_or(TpgError::MissingDetail)?;
        let window = self.forward_window(samples)?;
        let veto = self.noise_veto();
        let saturation = conditions.coder.lut_bitmask(ChipKind::Qie10);

        let mut linear = vec![0u32; window.size];
        let mut fine_grain = vec![0u8; window.size];
        for (fiber_pair, anodes) in details {
            for ibin in 0..window.size {
                let idx = ibin + window.shift;
                let (mut long, mut long_count) = (0u32, 0);
                let (mut short, mut short_count) = (0u32, 0);
                let mut saturated = false;
                for (i, anode) in anodes.iter().enumerate() {
                    let Some(anode) = anode else {
                        continue;
                    };
                    let (Some(sample), Some(&value)) =
                        (anode.frame.samples.get(idx), anode.samples.get(idx))
                    else {
                        continue;
                    };
                    if !(sample.ok && pass_tdc(sample, params)) {
                        continue;
                    }
                    saturated |= value == saturation;
                    if HF_LONG_ANODES.contains(&i) {
                        long += value;
                        long_count += 1;
                    } else {
                        short += value;
                        short_count += 1;
                    }
                }

                if saturated {
                    linear[ibin] = QIE10_MAX_LINEARIZATION_ET;
                } else {
                    // both anodes of a fiber: average
                    if long_count == 2 {
                        long >>= 1;
                    }
                    if short_count == 2 {
                        short >>= 1;
                    }
                    let vetoed = veto.apply(long, short);
                    veto_map.record(*fiber_pair, idx, samples.size(), vetoed.vetoed);
                    let mut sum = vetoed.sum;
                    // both fibers: average
                    if long_count > 0 && short_count > 0 {
                        sum >>= 1;
                    }
                    linear[ibin] = linear[ibin].saturating_add(sum);
                }

                let above_fg = anodes.iter().flatten().any(|anode| {
                    anode.frame.id.ieta_abs() != HF_CHANNEL_EXCLUDED_FROM_FG
                        && anode
                            .frame
                            .samples
                            .get(idx)
                            .is_some_and(|s| s.ok && s.adc as u32 > params.hf_fg_threshold)
                });
                if above_fg {
                    fine_grain[ibin] |= 0b10;
                }

                if let Some(bit) = conditions.feature_bit {
                    let anode = |i: usize| {
                        anodes[i].as_ref().map(|a| {
                            let ok = a.frame.samples.get(idx).is_some_and(|s| s.ok);
                            (&a.frame, ok)
                        })
                    };
                    let shorts = HF_SHORT_ANODES.map(&anode);
                    let longs = HF_LONG_ANODES.map(&anode);
                    if bit.fine_grain_bit_dual(shorts, longs, idx) {
                        fine_grain[ibin] |= 0b01;
                    }
                }
            }
        }

        // the two halvings above are compensated here
        let shift = self
            .config
            .nct_scale_shift
            .saturating_sub(HF_2017_AVERAGING_SHIFT);
        for value in linear.iter_mut() {
            *value = (*value >> shift).min(QIE10_MAX_LINEARIZATION_ET);
        }
        Ok(TowerOutput {
            presamples: window.presamples,
            linear,
            fine_grain,
        })
    }

    /// Zero every sample at or below the zero-suppression threshold and mark
    /// digis left with nothing but zeros. Running it twice changes nothing.
    pub fn run_zs(&self, collection: &mut TrigPrimDigiCollection) {
        for digi in collection.iter_mut() {
            for sample in digi.samples.iter_mut() {
                if (sample.compressed_et as i32) <= self.zs_threshold {
                    sample.compressed_et = 0;
                }
            }
            digi.zero_suppressed = digi.samples.iter().all(|s| s.compressed_et == 0);
        }
    }

    /// Flag the digis of every tower read out by an HTR that reported a
    /// front-end format error. Values are left untouched.
    ///
    /// Returns the number of flagged digis.
    pub fn run_fe_format_error(
        &self,
        raw: &[FedBlock],
        emap: &dyn ElectronicsMap,
        geometry: &dyn TowerGeometry,
        collection: &mut TrigPrimDigiCollection,
    ) -> usize {
        let mut bad_towers: FxHashSet<TowerId> = FxHashSet::default();
        for block in raw.iter().filter(|b| is_hcal_fed(b.fed_id)) {
            if block.data.len() < MIN_FED_SIZE {
                continue;
            }
            let decoded = match block.decode() {
                Ok(d) => d,
                Err(e) => {
                    log::warn!("Could not decode FED {}: {}", block.fed_id, e);
                    continue;
                }
            };
            let dcc = decoded
                .header
                .source_id
                .checked_sub(MIN_HCAL_FED_ID)
                .unwrap_or(block.fed_id - MIN_HCAL_FED_ID) as u8;

            for (spigot, htr) in decoded.spigots.iter() {
                if !htr.has_format_error() {
                    continue;
                }
                for fiber_channel in 0..CHANNELS_PER_FIBER {
                    for fiber in 0..FIBERS_PER_SPIGOT {
                        let mut eid = ElectronicsId::new(fiber_channel, fiber, *spigot as u8, dcc);
                        eid.set_htr(htr.crate_id, htr.slot, htr.top_bottom);
                        let Some(channel) = emap.lookup(&eid) else {
                            continue;
                        };
                        if channel.subdet == Subdetector::Outer {
                            continue;
                        }
                        bad_towers.extend(geometry.tower_ids(&channel));
                    }
                }
            }
        }

        let mut flagged = 0;
        for digi in collection.iter_mut() {
            if bad_towers.contains(&digi.id) {
                digi.samples.iter_mut().for_each(|s| s.fe_error = true);
                flagged += 1;
            }
        }
        if flagged > 0 {
            log::info!("Flagged {} trigger primitives with front-end format errors", flagged);
        }
        flagged
    }
}
