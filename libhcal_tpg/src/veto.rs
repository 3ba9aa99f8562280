use fxhash::FxHashMap;

/// Long/short fiber coincidence veto for the forward calorimeter.
///
/// A particle shower lights both fibers of a cell. A large combined signal
/// with one fiber below the minimum signal is a single-PMT hit and is zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoiseVeto {
    pub min_signal_threshold: u32,
    pub pmt_noise_threshold: u32,
}

/// The result of the veto for one time slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VetoedSum {
    pub sum: u32,
    pub vetoed: bool,
}

impl NoiseVeto {
    pub fn new(min_signal_threshold: u32, pmt_noise_threshold: u32) -> Self {
        Self {
            min_signal_threshold,
            pmt_noise_threshold,
        }
    }

    pub fn apply(&self, long: u32, short: u32) -> VetoedSum {
        let sum = long.saturating_add(short);
        let single_fiber =
            short < self.min_signal_threshold || long < self.min_signal_threshold;
        if single_fiber && sum > self.pmt_noise_threshold {
            VetoedSum { sum: 0, vetoed: true }
        } else {
            VetoedSum { sum, vetoed: false }
        }
    }
}

/// Per fiber-pair record of which slices were vetoed in the current event
#[derive(Debug, Clone, Default)]
pub struct VetoMap {
    map: FxHashMap<u32, Vec<bool>>,
}

impl VetoMap {
    pub fn record(&mut self, fiber_pair: u32, slice: usize, size: usize, vetoed: bool) {
        let bits = self
            .map
            .entry(fiber_pair)
            .or_insert_with(|| vec![false; size]);
        if slice >= bits.len() {
            bits.resize(slice + 1, false);
        }
        bits[slice] = bits[slice] || vetoed;
    }

    pub fn get(&self, fiber_pair: u32) -> Option<&[bool]> {
        self.map.get(&fiber_pair).map(|v| v.as_slice())
    }

    /// Number of vetoed slices over all fiber pairs
    pub fn vetoed_count(&self) -> usize {
        self.map.values().flatten().filter(|v| **v).count()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_fiber_spike_is_vetoed() {
        let veto = NoiseVeto::new(10, 5);
        assert_eq!(veto.apply(100, 0), VetoedSum { sum: 0, vetoed: true });
    }

    #[test]
    fn test_both_fibers_pass() {
        let veto = NoiseVeto::new(10, 5);
        assert_eq!(
            veto.apply(60, 50),
            VetoedSum {
                sum: 110,
                vetoed: false
            }
        );
    }

    #[test]
    fn test_small_sum_not_vetoed() {
        let veto = NoiseVeto::new(10, 5);
        assert_eq!(veto.apply(4, 0).sum, 4);
        assert_eq!(veto.apply(5, 0).sum, 5);
        assert_eq!(veto.apply(6, 0).sum, 0);
    }

    #[test]
    fn test_zero_thresholds_never_veto() {
        let veto = NoiseVeto::default();
        assert_eq!(veto.apply(1000, 0).sum, 1000);
    }

    #[test]
    fn test_veto_map() {
        let mut map = VetoMap::default();
        map.record(7, 1, 4, true);
        map.record(7, 2, 4, false);
        assert_eq!(map.get(7).unwrap(), &[false, true, false, false]);
        assert!(map.get(8).is_none());
        assert_eq!(map.vetoed_count(), 1);
        map.clear();
        assert!(map.is_empty());
    }
}
