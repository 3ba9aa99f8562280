use super::error::ConfigError;

/// Peak-finding policies of the trigger primitive generator.
///
/// - `SingleSample`: slice `i` is a peak if `s[i-1] < s[i] >= s[i+1]`
/// - `PairSum`: the same rule on the sliding weighted sum, which with the
///   standard weights `[1, 1]` is `s[i] + s[i+1]`
///
/// The strict/non-strict asymmetry breaks a tie between two equal slices in
/// favour of the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakFinderAlgorithm {
    SingleSample,
    #[default]
    PairSum,
}

impl TryFrom<u8> for PeakFinderAlgorithm {
    type Error = ConfigError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::SingleSample),
            2 => Ok(Self::PairSum),
            _ => Err(ConfigError::InvalidPeakFinder(value)),
        }
    }
}

impl PeakFinderAlgorithm {
    /// The configuration number of the algorithm (1 or 2)
    pub fn number(&self) -> usize {
        match self {
            Self::SingleSample => 1,
            Self::PairSum => 2,
        }
    }

    /// Decide whether slice `idx` is a peak. `samples` are the linear samples,
    /// `sums` the weighted sliding sums of the same tower.
    pub fn is_peak(&self, samples: &[u32], sums: &[u32], idx: usize, threshold: u32) -> bool {
        match self {
            Self::SingleSample => is_peak(samples, idx, threshold),
            Self::PairSum => is_peak(sums, idx, threshold),
        }
    }

    /// All peak positions of a sequence, using pair sums for `PairSum`
    pub fn find_peaks(&self, samples: &[u32]) -> Vec<usize> {
        let sums = weighted_sums(samples, &[1.0, 1.0], None);
        (0..samples.len())
            .filter(|idx| self.is_peak(samples, &sums, *idx, 0))
            .collect()
    }
}

/// `values[idx-1] < values[idx] >= values[idx+1]` with `values[idx]` above
/// threshold. Slices without both neighbours are never peaks.
pub fn is_peak(values: &[u32], idx: usize, threshold: u32) -> bool {
    if idx == 0 || idx + 1 >= values.len() {
        return false;
    }
    let value = values[idx];
    values[idx - 1] < value && value >= values[idx + 1] && value > threshold
}

/// Sliding weighted sum `sum[i] = Σ_k trunc(s[i+k] * w[k])`, negative sums
/// clipped to zero. The result has the length of the input; the last
/// `weights.len() - 1` slices have no complete window and stay zero. With
/// `clamp`, each sample is limited before weighting.
pub fn weighted_sums(samples: &[u32], weights: &[f64], clamp: Option<u32>) -> Vec<u32> {
    let mut sums = vec![0; samples.len()];
    if weights.is_empty() || samples.len() < weights.len() {
        return sums;
    }
    let shrink = weights.len() - 1;
    for (ibin, sum) in sums.iter_mut().enumerate().take(samples.len() - shrink) {
        let mut value: i64 = 0;
        for (i, weight) in weights.iter().enumerate() {
            let mut sample = samples[ibin + i];
            if let Some(max) = clamp {
                sample = sample.min(max);
            }
            value += (sample as f64 * weight) as i64;
        }
        *sum = value.clamp(0, u32::MAX as i64) as u32;
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from() {
        assert_eq!(
            PeakFinderAlgorithm::try_from(1).unwrap(),
            PeakFinderAlgorithm::SingleSample
        );
        assert_eq!(
            PeakFinderAlgorithm::try_from(2).unwrap(),
            PeakFinderAlgorithm::PairSum
        );
        assert!(PeakFinderAlgorithm::try_from(0).is_err());
        assert!(PeakFinderAlgorithm::try_from(3).is_err());
    }

    #[test]
    fn test_tie_goes_to_earlier_slice() {
        let samples = [0, 5, 5, 0];
        assert!(is_peak(&samples, 1, 0));
        assert!(!is_peak(&samples, 2, 0));
    }

    #[test]
    fn test_edges_and_threshold() {
        let samples = [9, 1, 9];
        assert!(!is_peak(&samples, 0, 0));
        assert!(!is_peak(&samples, 2, 0));
        assert!(!is_peak(&[0, 3, 0], 1, 3));
    }

    #[test]
    fn test_pair_sums() {
        assert_eq!(
            weighted_sums(&[1, 2, 3, 4], &[1.0, 1.0], None),
            vec![3, 5, 7, 0]
        );
        assert_eq!(weighted_sums(&[10, 10], &[0.5, -1.0], None), vec![0, 0]);
        assert_eq!(
            weighted_sums(&[5000, 1], &[1.0, 1.0], Some(0x7FF)),
            vec![0x800, 0]
        );
    }

    #[test]
    fn test_algorithms_agree_on_unimodal() {
        let shapes: [&[u32]; 4] = [
            &[0, 2, 10, 4, 1],
            &[1, 3, 5, 20, 7, 3, 0],
            &[0, 0, 4, 12, 30, 9, 2],
            &[2, 40, 12, 6, 3, 1, 0],
        ];
        for samples in shapes {
            let single = PeakFinderAlgorithm::SingleSample.find_peaks(samples);
            let pair = PeakFinderAlgorithm::PairSum.find_peaks(samples);
            assert_eq!(single.len(), 1, "{samples:?}");
            assert_eq!(pair.len(), 1, "{samples:?}");
            assert!(
                pair[0] == single[0] || pair[0] + 1 == single[0],
                "{samples:?}: {single:?} vs {pair:?}"
            );
        }
    }
}
