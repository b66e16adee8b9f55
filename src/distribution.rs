use crate::alphabet::{Alphabet, CodePoint, Unicode};
use crate::partition::{self, Interval, MalformedRangeSet, Partition};
use crate::sampler::{SampleError, Sampler};
use rand::Rng;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Mul;
use std::sync::OnceLock;

/// A probability distribution over the code points of alphabet `A`.
///
/// The distribution is stored as a canonical [`Partition`] that is always
/// normalized: its weights are the per-code-point probabilities and sum to 1,
/// unless every weight is zero. The all-zero distribution is improper; it
/// arises from products of distributions with disjoint support and means
/// "impossible" to the caller.
///
/// Mutating methods take `&mut self` and their operands by shared reference,
/// so a distribution can never be combined into itself without first being
/// cloned. Named classes ([`CharDistribution::digit`] and friends) are handed
/// out as `&'static` references and must be cloned before they are mutated.
pub struct CharDistribution<A: Alphabet = Unicode> {
    partition: Partition,
    sampler: OnceLock<Sampler>,
    alphabet: PhantomData<A>,
}

impl<A: Alphabet> CharDistribution<A> {
    pub(crate) fn from_partition(partition: Partition) -> Self {
        Self {
            partition: partition.normalized(),
            sampler: OnceLock::new(),
            alphabet: PhantomData,
        }
    }

    fn replace_partition(&mut self, partition: Partition) {
        self.partition = partition.normalized();
        self.sampler = OnceLock::new();
    }

    /// The improper distribution assigning zero mass to every code point.
    pub fn zero() -> Self {
        Self::from_partition(Partition::constant(A::SIZE, 0.0))
    }

    /// Every code point of the alphabet equally likely.
    pub fn uniform() -> Self {
        Self::from_partition(Partition::uniform(A::SIZE))
    }

    /// All mass on a single code point.
    ///
    /// # Panics
    ///
    /// If the code point is outside the alphabet, e.g. a supplementary-plane
    /// `char` with the [`Utf16`](crate::Utf16) alphabet.
    pub fn point_mass(code_point: impl Into<CodePoint>) -> Self {
        Self::from_partition(Partition::point_mass(code_point.into(), A::SIZE))
    }

    /// Uniform over the inclusive range `start..=end`.
    pub fn uniform_in_range(
        start: impl Into<CodePoint>,
        end: impl Into<CodePoint>,
    ) -> Result<Self, MalformedRangeSet> {
        let range: (CodePoint, CodePoint) = (start.into(), end.into());
        Self::uniform_in_range_pairs([range])
    }

    /// Uniform over the ranges described by consecutive pairs of characters
    /// in `bounds`: `"azAZ"` is the union of `a..=z` and `A..=Z`.
    ///
    /// The ranges must be sorted and disjoint, in the order given.
    pub fn uniform_in_ranges(bounds: &str) -> Result<Self, MalformedRangeSet> {
        let bounds: Vec<char> = bounds.chars().collect();
        if bounds.len() % 2 != 0 {
            return Err(MalformedRangeSet::UnpairedBound(bounds.len()));
        }
        Self::uniform_in_range_pairs(bounds.chunks_exact(2).map(|pair| (pair[0], pair[1])))
    }

    /// Uniform over a sorted, disjoint sequence of inclusive
    /// `(start, end)` ranges.
    pub fn uniform_in_range_pairs<I, C>(ranges: I) -> Result<Self, MalformedRangeSet>
    where
        I: IntoIterator<Item = (C, C)>,
        C: Into<CodePoint>,
    {
        let ranges = ranges
            .into_iter()
            .map(|(start, end)| (start.into(), end.into()));
        Partition::from_ranges(ranges, A::SIZE).map(Self::from_partition)
    }

    /// Uniform over a set of individual code points, given in any order and
    /// possibly with repeats.
    pub fn uniform_over<I, C>(symbols: I) -> Result<Self, MalformedRangeSet>
    where
        I: IntoIterator<Item = C>,
        C: Into<CodePoint>,
    {
        let mut symbols: Vec<CodePoint> = symbols.into_iter().map(Into::into).collect();
        symbols.sort_unstable();
        symbols.dedup();
        Self::uniform_in_range_pairs(symbols.into_iter().map(|symbol| (symbol, symbol)))
    }

    /// A mixture `w1 * d1 + w2 * d2`, see [`CharDistribution::set_to_sum`].
    pub fn mixture(w1: f64, d1: &Self, w2: f64, d2: &Self) -> Self {
        let mut result = Self::zero();
        result.set_to_sum(w1, d1, w2, d2);
        result
    }

    /// The normalized pointwise product of two distributions.
    pub fn product(d1: &Self, d2: &Self) -> Self {
        let mut result = Self::zero();
        result.set_to_product(d1, d2);
        result
    }

    /// Replaces this distribution by the mixture `w1 * d1 + w2 * d2`.
    ///
    /// Both operands are normalized already, and the weights are rescaled to
    /// sum to 1, so the result is a proper distribution whenever either
    /// operand with a positive weight has mass. A zero operand contributes
    /// nothing.
    ///
    /// # Panics
    ///
    /// If either weight is negative or not finite.
    pub fn set_to_sum(&mut self, w1: f64, d1: &Self, w2: f64, d2: &Self) {
        assert!(
            w1.is_finite() && w1 >= 0.0 && w2.is_finite() && w2 >= 0.0,
            "Mixture weights must be finite and non-negative, got {w1} and {w2}"
        );
        let scale = w1.max(w2);
        if scale == 0.0 {
            self.replace_partition(Partition::constant(A::SIZE, 0.0));
            return;
        }
        let (w1, w2) = (w1 / scale, w2 / scale);

        let mixed = Partition::combine(&d1.partition, &d2.partition, |left, right| {
            w1 * left + w2 * right
        });
        self.replace_partition(mixed);
    }

    /// Replaces this distribution by the normalized pointwise product of `d1`
    /// and `d2`.
    ///
    /// Products of distributions without common support, or whose mass
    /// underflows, give the zero distribution.
    pub fn set_to_product(&mut self, d1: &Self, d2: &Self) {
        let product = Partition::combine(&d1.partition, &d2.partition, |left, right| left * right);
        if product.total_mass() == 0.0 {
            log::debug!("Product of {} distributions has zero mass", A::NAME);
        }
        self.replace_partition(product);
    }

    /// Replaces this distribution by the uniform distribution over its own
    /// support.
    pub fn set_to_partial_uniform(&mut self) {
        let flattened = self.partition.map_weights(indicator);
        self.replace_partition(flattened);
    }

    /// The uniform distribution over this distribution's support.
    pub fn to_partial_uniform(&self) -> Self {
        Self::from_partition(self.partition.map_weights(indicator))
    }

    /// The uniform distribution over the code points this distribution
    /// excludes.
    pub fn complement(&self) -> Self {
        Self::from_partition(self.partition.map_weights(|weight| 1.0 - indicator(weight)))
    }

    /// Probability of a code point. Code points outside the alphabet have
    /// probability 0.
    pub fn prob(&self, code_point: impl Into<CodePoint>) -> f64 {
        self.partition.lookup(code_point.into())
    }

    /// Natural logarithm of the probability of a code point, exactly
    /// `f64::NEG_INFINITY` for code points outside the support.
    pub fn log_prob(&self, code_point: impl Into<CodePoint>) -> f64 {
        let prob = self.prob(code_point);
        if prob > 0.0 {
            prob.ln()
        } else {
            f64::NEG_INFINITY
        }
    }

    /// `ln Σ_c p(c) q(c)`: the log of the probability that independent draws
    /// from both distributions agree.
    pub fn log_average_of(&self, other: &Self) -> f64 {
        let agreement: f64 = partition::merge(&self.partition, &other.partition)
            .map(|segment| segment.left * segment.right * f64::from(segment.len()))
            .sum();
        if agreement > 0.0 {
            agreement.ln()
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Largest absolute difference between the two distributions'
    /// probabilities for any single code point.
    pub fn max_diff(&self, other: &Self) -> f64 {
        partition::merge(&self.partition, &other.partition)
            .map(|segment| (segment.left - segment.right).abs())
            .fold(0.0, f64::max)
    }

    /// Whether no code point's probability differs by more than `tolerance`.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.max_diff(other) <= tolerance
    }

    /// Draws a code point using randomness from `rng`.
    ///
    /// The cumulative table is built on the first draw and reused until the
    /// distribution is mutated.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CodePoint, SampleError> {
        self.sampler
            .get_or_init(|| Sampler::new(&self.partition))
            .sample(rng)
    }

    /// Draws a code point using the thread-local generator.
    pub fn sample_default(&self) -> Result<CodePoint, SampleError> {
        self.sample(&mut rand::rng())
    }

    /// The sum of all probabilities: 1, up to rounding, or 0 for the zero
    /// distribution.
    pub fn total_mass(&self) -> f64 {
        self.partition.total_mass()
    }

    pub fn is_zero(&self) -> bool {
        self.partition.is_zero()
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self.partition.intervals(), [only] if only.weight > 0.0)
    }

    pub fn is_point_mass(&self) -> bool {
        self.point().is_some()
    }

    /// The code point holding all the mass, if there is one.
    pub fn point(&self) -> Option<CodePoint> {
        let mut support = self.partition.support();
        match (support.next(), support.next()) {
            (Some(interval), None) if interval.len() == 1 => Some(interval.start),
            _ => None,
        }
    }

    /// Number of code points with positive probability.
    pub fn support_size(&self) -> CodePoint {
        self.partition.support_size()
    }

    /// The lowest code point among the most probable ones.
    pub fn mode(&self) -> Option<CodePoint> {
        self.partition
            .support()
            .fold(None::<&Interval>, |best, interval| match best {
                Some(best) if best.weight >= interval.weight => Some(best),
                _ => Some(interval),
            })
            .map(|interval| interval.start)
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }
}

fn indicator(weight: f64) -> f64 {
    if weight > 0.0 { 1.0 } else { 0.0 }
}

impl<A: Alphabet> Default for CharDistribution<A> {
    fn default() -> Self {
        Self::uniform()
    }
}

impl<A: Alphabet> Clone for CharDistribution<A> {
    fn clone(&self) -> Self {
        Self {
            partition: self.partition.clone(),
            sampler: self.sampler.clone(),
            alphabet: PhantomData,
        }
    }
}

/// Exact equality compares the normalized weights bit for bit, so two
/// distributions reached through different mixtures can differ in the last
/// bit. Use [`CharDistribution::approx_eq`] to test convergence.
impl<A: Alphabet> PartialEq for CharDistribution<A> {
    fn eq(&self, other: &Self) -> bool {
        self.partition == other.partition
    }
}

impl<A: Alphabet> Eq for CharDistribution<A> {}

/// Hashes the same bits [`PartialEq`] compares.
impl<A: Alphabet> Hash for CharDistribution<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.partition.hash(state);
    }
}

impl<A: Alphabet> Mul for &CharDistribution<A> {
    type Output = CharDistribution<A>;

    fn mul(self, rhs: Self) -> Self::Output {
        CharDistribution::product(self, rhs)
    }
}

impl<A: Alphabet> fmt::Debug for CharDistribution<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharDistribution")
            .field("alphabet", &A::NAME)
            .field("partition", &self.partition)
            .finish()
    }
}

fn write_code_point(f: &mut fmt::Formatter<'_>, code_point: CodePoint) -> fmt::Result {
    match char::from_u32(code_point) {
        Some(c) if !c.is_control() && !c.is_whitespace() => write!(f, "{c}"),
        _ => write!(f, "U+{code_point:04X}"),
    }
}

impl<A: Alphabet> fmt::Display for CharDistribution<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "Zero");
        }
        if self.is_uniform() {
            return write!(f, "Uniform");
        }
        if let Some(point) = self.point() {
            write!(f, "PointMass(")?;
            write_code_point(f, point)?;
            return write!(f, ")");
        }

        for (i, interval) in self.partition.support().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "[")?;
            write_code_point(f, interval.start)?;
            if interval.len() > 1 {
                write!(f, "-")?;
                write_code_point(f, interval.end - 1)?;
            }
            write!(f, "]:{:.4}", interval.weight)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alphabet::Utf16;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    type Dist = CharDistribution<Unicode>;

    #[test]
    fn test_point_mass_is_exact() {
        let dist = Dist::point_mass('b');
        assert_eq!(dist.log_prob('b'), 0.0);
        assert_eq!(dist.log_prob('a'), f64::NEG_INFINITY);
        assert_eq!(dist.log_prob('c'), f64::NEG_INFINITY);
        assert_eq!(dist.log_prob(Unicode::SIZE), f64::NEG_INFINITY);
        assert_eq!(dist.point(), Some('b' as CodePoint));
        assert!(dist.is_point_mass());
    }

    #[test]
    fn test_uniform() {
        let dist = Dist::uniform();
        let expected = -f64::from(Unicode::SIZE).ln();
        assert!((dist.log_prob('x') - expected).abs() < 1e-12);
        assert!((dist.log_prob(0x10_FFFF_u32) - expected).abs() < 1e-12);
        assert!(dist.is_uniform());
        assert!(!dist.is_point_mass());
        assert_eq!(dist.support_size(), Unicode::SIZE);
        assert_eq!(Dist::default(), dist);
    }

    #[test]
    fn test_uniform_in_ranges() {
        let dist = Dist::uniform_in_ranges("bdgi").unwrap();
        for c in "bcdghi".chars() {
            assert!((dist.prob(c) - 1.0 / 6.0).abs() < 1e-12);
        }
        for c in "aefjz".chars() {
            assert_eq!(dist.log_prob(c), f64::NEG_INFINITY);
        }
        assert_eq!(dist.support_size(), 6);
    }

    #[test]
    fn test_uniform_in_range() {
        let dist = Dist::uniform_in_range('0', '9').unwrap();
        assert_eq!(dist.support_size(), 10);
        assert_eq!(dist, Dist::uniform_in_ranges("09").unwrap());
        assert!(matches!(
            Dist::uniform_in_range('9', '0'),
            Err(MalformedRangeSet::Inverted { index: 0, .. })
        ));
    }

    #[test]
    fn test_uniform_in_ranges_rejects_bad_input() {
        assert_eq!(
            Dist::uniform_in_ranges("abc"),
            Err(MalformedRangeSet::UnpairedBound(3))
        );
        assert!(matches!(
            Dist::uniform_in_ranges("aавz"),
            Err(MalformedRangeSet::Inverted { index: 1, .. })
        ));
        assert!(matches!(
            Dist::uniform_in_ranges("afcz"),
            Err(MalformedRangeSet::Unordered { index: 1, .. })
        ));
        assert!(matches!(
            CharDistribution::<Utf16>::uniform_in_ranges("a😀"),
            Err(MalformedRangeSet::OutOfDomain { index: 0, .. })
        ));
    }

    #[test]
    fn test_uniform_over() {
        let dist = Dist::uniform_over("cabbac".chars()).unwrap();
        assert_eq!(dist, Dist::uniform_in_ranges("ac").unwrap());
        assert!(Dist::uniform_over(Vec::<char>::new()).unwrap().is_zero());
    }

    #[test]
    fn test_mixture_with_point_mass() {
        let point = Dist::point_mass('b');
        let uniform = Dist::uniform();
        let mix = Dist::mixture(0.8, &point, 0.2, &uniform);
        let uniform_weight = 1.0 / f64::from(Unicode::SIZE);
        assert!((mix.prob('b') - (0.8 + 0.2 * uniform_weight)).abs() < 1e-12);
        assert!((mix.prob('a') - 0.2 * uniform_weight).abs() < 1e-12);
        assert!((mix.total_mass() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mixture_favours_range() {
        let range = Dist::uniform_in_ranges("bdgi").unwrap();
        let uniform = Dist::uniform();
        let mut mix = Dist::zero();
        mix.set_to_sum(0.8, &range, 0.2, &uniform);
        let outside = mix.prob('a');
        assert!(outside > 0.0);
        for c in "bcdghi".chars() {
            assert!(mix.prob(c) > outside);
        }
    }

    #[test]
    fn test_mixture_rescales_weights() {
        let a = Dist::point_mass('a');
        let b = Dist::point_mass('b');
        let mix = Dist::mixture(3.0, &a, 1.0, &b);
        assert!((mix.prob('a') - 0.75).abs() < 1e-12);
        assert!((mix.prob('b') - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_mixture_ignores_zero_operand() {
        let range = Dist::uniform_in_ranges("az").unwrap();
        let mix = Dist::mixture(0.5, &Dist::zero(), 0.5, &range);
        assert!(mix.approx_eq(&range, 1e-12));
        assert!(Dist::mixture(0.0, &range, 0.0, &range).is_zero());
    }

    #[test]
    #[should_panic]
    fn test_mixture_rejects_negative_weight() {
        let uniform = Dist::uniform();
        Dist::mixture(-0.5, &uniform, 1.5, &uniform);
    }

    #[test]
    fn test_self_mixture_is_idempotent() {
        let range = Dist::uniform_in_ranges("bdgi").unwrap();
        let mix = Dist::mixture(0.3, &range, 0.7, &range);
        assert!(mix.approx_eq(&range, 1e-12));

        let mut dist = range.clone();
        let snapshot = dist.clone();
        dist.set_to_sum(0.5, &snapshot, 0.5, &snapshot);
        assert!(dist.approx_eq(&range, 1e-12));
    }

    #[test]
    fn test_product() {
        let left = Dist::uniform_in_ranges("ak").unwrap();
        let right = Dist::uniform_in_ranges("fz").unwrap();
        let product = &left * &right;
        assert!(product.approx_eq(&Dist::uniform_in_ranges("fk").unwrap(), 1e-12));
        assert_eq!(product.support_size(), 6);
        assert!(Dist::product(&Dist::uniform(), &left).approx_eq(&left, 1e-12));
    }

    #[test_log::test]
    fn test_product_of_disjoint_supports_is_zero() {
        let mut product = Dist::uniform();
        product.set_to_product(&Dist::point_mass('a'), &Dist::point_mass('b'));
        assert!(product.is_zero());
        assert_eq!(product.total_mass(), 0.0);
        assert_eq!(product.log_prob('a'), f64::NEG_INFINITY);
        assert!(!product.prob('a').is_nan());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(product.sample(&mut rng), Err(SampleError::EmptySupport));
    }

    #[test_log::test]
    fn test_product_underflow_is_zero() {
        let a = Dist::mixture(1.0, &Dist::point_mass('a'), 1e-300, &Dist::point_mass('b'));
        let c = Dist::mixture(1.0, &Dist::point_mass('c'), 1e-300, &Dist::point_mass('b'));
        assert!(a.log_prob('b').is_finite());

        let product = Dist::product(&a, &c);
        assert!(product.is_zero());
        assert_eq!(product.log_prob('b'), f64::NEG_INFINITY);
        assert!(!product.prob('b').is_nan());
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(product.sample(&mut rng), Err(SampleError::EmptySupport));
    }

    #[test]
    fn test_sample_through_trait_object() {
        let dist = Dist::uniform_in_ranges("ac").unwrap();
        let rng: &mut dyn rand::RngCore = &mut StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let code_point = dist.sample(rng).unwrap();
            assert!(('a' as CodePoint..='c' as CodePoint).contains(&code_point));
        }
    }

    #[test]
    fn test_product_resets_sampler() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut dist = Dist::point_mass('a');
        assert_eq!(dist.sample(&mut rng), Ok('a' as CodePoint));
        dist.set_to_product(&Dist::point_mass('q'), &Dist::uniform());
        assert_eq!(dist.sample(&mut rng), Ok('q' as CodePoint));
    }

    #[test]
    fn test_partial_uniform_and_complement() {
        let mix = Dist::mixture(
            0.9,
            &Dist::point_mass('a'),
            0.1,
            &Dist::uniform_in_ranges("az").unwrap(),
        );
        let flat = mix.to_partial_uniform();
        assert_eq!(flat, Dist::uniform_in_ranges("az").unwrap());

        let mut in_place = mix.clone();
        in_place.set_to_partial_uniform();
        assert_eq!(in_place, flat);

        let complement = flat.complement();
        assert_eq!(complement.log_prob('m'), f64::NEG_INFINITY);
        assert!(complement.log_prob('A').is_finite());
        assert_eq!(complement.support_size(), Unicode::SIZE - 26);
        assert!(Dist::uniform().complement().is_zero());
    }

    #[test]
    fn test_log_average_of() {
        let range = Dist::uniform_in_ranges("aj").unwrap();
        let point = Dist::point_mass('c');
        assert!((range.log_average_of(&point) - 0.1_f64.ln()).abs() < 1e-12);
        assert!((range.log_average_of(&range) - 0.1_f64.ln()).abs() < 1e-12);
        assert_eq!(
            point.log_average_of(&Dist::point_mass('z')),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_max_diff() {
        let a = Dist::point_mass('a');
        let b = Dist::point_mass('b');
        assert_eq!(a.max_diff(&a), 0.0);
        assert_eq!(a.max_diff(&b), 1.0);
        assert!(!a.approx_eq(&b, 0.5));
        assert!(a.approx_eq(&a.clone(), 0.0));
    }

    #[test]
    fn test_mode() {
        let mix = Dist::mixture(
            0.5,
            &Dist::point_mass('q'),
            0.5,
            &Dist::uniform_in_ranges("az").unwrap(),
        );
        assert_eq!(mix.mode(), Some('q' as CodePoint));
        assert_eq!(Dist::uniform().mode(), Some(0));
        assert_eq!(Dist::zero().mode(), None);
    }

    #[test]
    fn test_equal_distributions_hash_equally() {
        let built_in_one_go = Dist::uniform_in_ranges("af").unwrap();
        let built_in_pieces = Dist::uniform_in_ranges("acdf").unwrap();
        let mut set = HashSet::new();
        set.insert(built_in_one_go);
        assert!(set.contains(&built_in_pieces));
        assert!(!set.contains(&Dist::uniform_in_ranges("ag").unwrap()));
    }

    #[test]
    fn test_utf16_alphabet() {
        let dist = CharDistribution::<Utf16>::uniform();
        let expected = -f64::from(Utf16::SIZE).ln();
        assert!((dist.log_prob('a') - expected).abs() < 1e-12);
        assert_eq!(dist.log_prob('😀'), f64::NEG_INFINITY);
    }

    #[test]
    fn test_display() {
        assert_eq!(Dist::zero().to_string(), "Zero");
        assert_eq!(Dist::uniform().to_string(), "Uniform");
        assert_eq!(Dist::point_mass('x').to_string(), "PointMass(x)");
        assert_eq!(
            Dist::uniform_in_ranges("aj").unwrap().to_string(),
            "[a-j]:0.1000"
        );
        assert_eq!(
            Dist::uniform_over([' ', '!']).unwrap().to_string(),
            "[U+0020-!]:0.5000"
        );
    }
}
