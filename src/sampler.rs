use crate::alphabet::CodePoint;
use crate::partition::{Interval, Partition};
use rand::Rng;

/// Errors that can occur while drawing from a distribution
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SampleError {
    #[error("Cannot sample from a distribution with zero total mass")]
    EmptySupport,
}

/// Inverse-CDF index over the positive-weight intervals of a partition.
///
/// Let `I_1, ..., I_n` be the intervals with positive weight `w_i`, and
/// `cum_i = cum_{i-1} + w_i * |I_i|`. A draw picks `u` uniformly in
/// `[0, cum_n)`, finds the first `i` with `cum_i > u`, and then picks a code
/// point uniformly inside `I_i`.
#[derive(Clone, Debug)]
pub struct Sampler {
    intervals: Vec<Interval>,
    cumulative: Vec<f64>,
}

impl Sampler {
    pub fn new(partition: &Partition) -> Self {
        let intervals: Vec<Interval> = partition.support().copied().collect();
        let cumulative = intervals
            .iter()
            .scan(0.0, |sum, interval| {
                *sum += interval.mass();
                Some(*sum)
            })
            .collect();
        log::trace!("Built sampler over {} intervals", intervals.len());

        Self {
            intervals,
            cumulative,
        }
    }

    /// The mass covered by the table; 0 when there is nothing to draw from.
    pub fn total_mass(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Draws one code point using randomness from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CodePoint, SampleError> {
        let total = self.total_mass();
        if self.intervals.is_empty() || total <= 0.0 {
            return Err(SampleError::EmptySupport);
        }

        let u = rng.random::<f64>() * total;
        // Rounding can leave `u` at or past the last entry; the last interval
        // absorbs it.
        let index = self
            .cumulative
            .partition_point(|&cumulative| cumulative <= u)
            .min(self.intervals.len() - 1);
        let interval = &self.intervals[index];

        Ok(rng.random_range(interval.start..interval.end))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SIZE: CodePoint = 64;

    #[test]
    fn test_cumulative_table() {
        let partition = Partition::from_ranges([(2, 3), (10, 19)], SIZE)
            .unwrap()
            .normalized();
        let sampler = Sampler::new(&partition);
        assert_eq!(sampler.intervals.len(), 2);
        assert!((sampler.cumulative[0] - 2.0 / 12.0).abs() < 1e-12);
        assert!((sampler.total_mass() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_samples_stay_in_support() {
        let partition = Partition::from_ranges([(2, 3), (10, 19), (40, 40)], SIZE).unwrap();
        let sampler = Sampler::new(&partition);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let code_point = sampler.sample(&mut rng).unwrap();
            assert!(partition.lookup(code_point) > 0.0, "Drew {code_point}");
        }
    }

    #[test]
    fn test_point_mass_always_returns_point() {
        let sampler = Sampler::new(&Partition::point_mass(33, SIZE));
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(sampler.sample(&mut rng), Ok(33));
        }
    }

    #[test]
    fn test_empty_support() {
        let sampler = Sampler::new(&Partition::constant(SIZE, 0.0));
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sampler.total_mass(), 0.0);
        assert_eq!(sampler.sample(&mut rng), Err(SampleError::EmptySupport));
    }

    #[test]
    fn test_sample_through_trait_object() {
        let sampler = Sampler::new(&Partition::from_ranges([(5, 9)], SIZE).unwrap());
        let rng: &mut dyn rand::RngCore = &mut StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let code_point = sampler.sample(rng).unwrap();
            assert!((5..=9).contains(&code_point));
        }
    }

    #[test]
    fn test_heavier_interval_drawn_more_often() {
        // [0, 1) carries weight 3, [1, 2) weight 1.
        let heavy = Partition::point_mass(0, SIZE).scale(3.0);
        let partition = Partition::combine(&heavy, &Partition::point_mass(1, SIZE), |a, b| a + b);
        let sampler = Sampler::new(&partition);
        let mut rng = StdRng::seed_from_u64(42);
        let zeros = (0..4_000)
            .filter(|_| sampler.sample(&mut rng) == Ok(0))
            .count();
        assert!((2_700..3_300).contains(&zeros), "Drew 0 {zeros} times");
    }
}
