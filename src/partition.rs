use crate::alphabet::CodePoint;
use std::hash::{Hash, Hasher};

/// Errors that can occur while building a partition from caller-supplied
/// ranges. Ranges are never sorted or merged on the caller's behalf.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MalformedRangeSet {
    #[error("Range bounds must come in pairs, got {0} bounds")]
    UnpairedBound(usize),
    #[error("Range {index} is inverted: U+{start:04X} comes after U+{end:04X}")]
    Inverted {
        index: usize,
        start: CodePoint,
        end: CodePoint,
    },
    #[error(
        "Range {index} starts at U+{start:04X}, which does not follow the previous range end U+{previous_end:04X}"
    )]
    Unordered {
        index: usize,
        start: CodePoint,
        previous_end: CodePoint,
    },
    #[error("Range {index} ends at U+{end:04X}, outside an alphabet of {size} code points")]
    OutOfDomain {
        index: usize,
        end: CodePoint,
        size: CodePoint,
    },
}

/// A half-open run of code points `[start, end)` sharing one weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub start: CodePoint,
    pub end: CodePoint,
    pub weight: f64,
}

impl Interval {
    /// Number of code points in the interval.
    pub fn len(&self) -> CodePoint {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, code_point: CodePoint) -> bool {
        self.start <= code_point && code_point < self.end
    }

    /// Total weight carried by the interval, `weight * len`.
    pub fn mass(&self) -> f64 {
        self.weight * f64::from(self.len())
    }
}

/// A sorted, gap-free decomposition of the domain `0..size` into weighted
/// intervals.
///
/// Gaps are materialized as zero-weight intervals, so every in-domain code
/// point falls into exactly one interval. Adjacent intervals never carry the
/// same weight, which keeps the representation canonical: two partitions
/// describing the same weights are structurally equal.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    intervals: Vec<Interval>,
}

// Weights are always finite and never negative zero.
impl Eq for Partition {}

impl Hash for Partition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.intervals.len().hash(state);
        for interval in &self.intervals {
            interval.start.hash(state);
            interval.end.hash(state);
            interval.weight.to_bits().hash(state);
        }
    }
}

/// Accumulates intervals in order, coalescing neighbours of equal weight.
struct PartitionBuilder {
    intervals: Vec<Interval>,
}

impl PartitionBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            intervals: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, start: CodePoint, end: CodePoint, weight: f64) {
        debug_assert!(
            weight.is_finite() && weight >= 0.0,
            "Interval weights must be finite and non-negative, got {weight}"
        );
        if start == end {
            return;
        }
        // Collapses -0.0 into 0.0 so that hashing agrees with equality.
        let weight = if weight == 0.0 { 0.0 } else { weight };

        match self.intervals.last_mut() {
            Some(last) if last.weight == weight => {
                debug_assert_eq!(last.end, start);
                last.end = end;
            }
            _ => self.intervals.push(Interval { start, end, weight }),
        }
    }

    fn finish(self) -> Partition {
        Partition {
            intervals: self.intervals,
        }
    }
}

impl Partition {
    /// A single interval of the given weight covering `0..size`.
    pub fn constant(size: CodePoint, weight: f64) -> Self {
        assert!(size > 0, "A partition needs a non-empty domain");
        let mut builder = PartitionBuilder::with_capacity(1);
        builder.push(0, size, weight);
        builder.finish()
    }

    /// Weight 1 across the whole domain.
    pub fn uniform(size: CodePoint) -> Self {
        Self::constant(size, 1.0)
    }

    /// Weight 1 on `code_point`, 0 everywhere else.
    ///
    /// # Panics
    ///
    /// If `code_point` is not inside `0..size`.
    pub fn point_mass(code_point: CodePoint, size: CodePoint) -> Self {
        assert!(
            code_point < size,
            "Code point U+{code_point:04X} outside an alphabet of {size} code points"
        );
        let mut builder = PartitionBuilder::with_capacity(3);
        builder.push(0, code_point, 0.0);
        builder.push(code_point, code_point + 1, 1.0);
        builder.push(code_point + 1, size, 0.0);
        builder.finish()
    }

    /// Weight 1 inside each of the inclusive `(start, end)` ranges and 0
    /// outside them.
    ///
    /// The ranges must already be sorted and disjoint: every range must start
    /// after the end of the one before it. Ranges that merely touch (`a-c`
    /// followed by `d-f`) are accepted.
    pub fn from_ranges<I>(ranges: I, size: CodePoint) -> Result<Self, MalformedRangeSet>
    where
        I: IntoIterator<Item = (CodePoint, CodePoint)>,
    {
        let ranges = ranges.into_iter();
        let mut builder = PartitionBuilder::with_capacity(2 * ranges.size_hint().0 + 1);
        let mut previous_end: Option<CodePoint> = None;
        let mut cursor = 0;

        for (index, (start, end)) in ranges.enumerate() {
            if start > end {
                return Err(MalformedRangeSet::Inverted { index, start, end });
            }
            if let Some(previous_end) = previous_end {
                if start <= previous_end {
                    return Err(MalformedRangeSet::Unordered {
                        index,
                        start,
                        previous_end,
                    });
                }
            }
            if end >= size {
                return Err(MalformedRangeSet::OutOfDomain { index, end, size });
            }

            builder.push(cursor, start, 0.0);
            builder.push(start, end + 1, 1.0);
            cursor = end + 1;
            previous_end = Some(end);
        }

        builder.push(cursor, size, 0.0);
        Ok(builder.finish())
    }

    /// Builds the common refinement of `left` and `right` and gives every
    /// segment the weight `op(left_weight, right_weight)`.
    pub fn combine<F>(left: &Partition, right: &Partition, mut op: F) -> Self
    where
        F: FnMut(f64, f64) -> f64,
    {
        let segments = merge(left, right);
        let mut builder = PartitionBuilder::with_capacity(segments.size_hint().1.unwrap_or(0));
        for segment in segments {
            builder.push(segment.start, segment.end, op(segment.left, segment.right));
        }
        log::trace!(
            "Combined partitions of {} and {} intervals into {}",
            left.intervals.len(),
            right.intervals.len(),
            builder.intervals.len()
        );
        builder.finish()
    }

    /// Replaces every weight `w` by `op(w)`.
    pub fn map_weights<F>(&self, mut op: F) -> Self
    where
        F: FnMut(f64) -> f64,
    {
        let mut builder = PartitionBuilder::with_capacity(self.intervals.len());
        for interval in &self.intervals {
            builder.push(interval.start, interval.end, op(interval.weight));
        }
        builder.finish()
    }

    /// Multiplies every weight by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        self.map_weights(|weight| weight * factor)
    }

    /// Rescales the weights to a total mass of 1. A partition without mass
    /// becomes the all-zero partition.
    pub fn normalized(&self) -> Self {
        let total = self.total_mass();
        if total > 0.0 && total.is_finite() {
            // Each weight is at most `total`, so the quotient cannot overflow.
            self.map_weights(|weight| weight / total)
        } else {
            Self::constant(self.size(), 0.0)
        }
    }

    /// The weight of the interval containing `code_point`, or 0 if the code
    /// point is outside the domain.
    pub fn lookup(&self, code_point: CodePoint) -> f64 {
        let index = self
            .intervals
            .partition_point(|interval| interval.end <= code_point);
        self.intervals
            .get(index)
            .map_or(0.0, |interval| interval.weight)
    }

    /// `Σ weight * len` over all intervals.
    pub fn total_mass(&self) -> f64 {
        self.intervals.iter().map(Interval::mass).sum()
    }

    /// Number of code points carrying a positive weight.
    pub fn support_size(&self) -> CodePoint {
        self.support().map(|interval| interval.len()).sum()
    }

    /// The intervals carrying a positive weight, in order.
    pub fn support(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter().filter(|interval| interval.weight > 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.intervals.iter().all(|interval| interval.weight == 0.0)
    }

    /// Number of code points in the domain.
    pub fn size(&self) -> CodePoint {
        self.intervals.last().map_or(0, |interval| interval.end)
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }
}

/// One piece of the common refinement of two partitions, carrying the weight
/// each input assigns to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: CodePoint,
    pub end: CodePoint,
    pub left: f64,
    pub right: f64,
}

impl Segment {
    pub fn len(&self) -> CodePoint {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Iterator over the common refinement of two partitions, produced by
/// [`merge`].
pub struct Refinement<'p> {
    left: &'p [Interval],
    right: &'p [Interval],
    position: CodePoint,
}

/// Sweeps both partitions' sorted interval lists in one pass, yielding a
/// segment for every stretch between consecutive boundaries of either input.
///
/// Both partitions must cover the same domain.
pub fn merge<'p>(left: &'p Partition, right: &'p Partition) -> Refinement<'p> {
    debug_assert_eq!(
        left.size(),
        right.size(),
        "Cannot merge partitions over different domains"
    );
    Refinement {
        left: &left.intervals,
        right: &right.intervals,
        position: 0,
    }
}

impl Iterator for Refinement<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        let (left, right) = (self.left.first()?, self.right.first()?);
        let end = left.end.min(right.end);
        let segment = Segment {
            start: self.position,
            end,
            left: left.weight,
            right: right.weight,
        };

        if left.end == end {
            self.left = &self.left[1..];
        }
        if right.end == end {
            self.right = &self.right[1..];
        }
        self.position = end;

        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (left, right) = (self.left.len(), self.right.len());
        if left == 0 || right == 0 {
            (0, Some(0))
        } else {
            (left.max(right), Some(left + right - 1))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SIZE: CodePoint = 100;

    fn interval(start: CodePoint, end: CodePoint, weight: f64) -> Interval {
        Interval { start, end, weight }
    }

    #[test]
    fn test_point_mass() {
        let partition = Partition::point_mass(10, SIZE);
        assert_eq!(
            partition.intervals(),
            &[
                interval(0, 10, 0.0),
                interval(10, 11, 1.0),
                interval(11, SIZE, 0.0)
            ]
        );
        assert_eq!(partition.lookup(10), 1.0);
        assert_eq!(partition.lookup(9), 0.0);
        assert_eq!(partition.lookup(11), 0.0);
        assert_eq!(partition.total_mass(), 1.0);
    }

    #[test]
    fn test_point_mass_at_domain_edges() {
        assert_eq!(
            Partition::point_mass(0, SIZE).intervals(),
            &[interval(0, 1, 1.0), interval(1, SIZE, 0.0)]
        );
        assert_eq!(
            Partition::point_mass(SIZE - 1, SIZE).intervals(),
            &[interval(0, SIZE - 1, 0.0), interval(SIZE - 1, SIZE, 1.0)]
        );
    }

    #[test]
    #[should_panic]
    fn test_point_mass_outside_domain() {
        Partition::point_mass(SIZE, SIZE);
    }

    #[test]
    fn test_uniform() {
        let partition = Partition::uniform(SIZE);
        assert_eq!(partition.intervals(), &[interval(0, SIZE, 1.0)]);
        assert_eq!(partition.support_size(), SIZE);
        assert_eq!(partition.lookup(SIZE), 0.0);
    }

    #[test]
    fn test_from_ranges() {
        let partition = Partition::from_ranges([(5, 9), (20, 20)], SIZE).unwrap();
        assert_eq!(
            partition.intervals(),
            &[
                interval(0, 5, 0.0),
                interval(5, 10, 1.0),
                interval(10, 20, 0.0),
                interval(20, 21, 1.0),
                interval(21, SIZE, 0.0),
            ]
        );
        assert_eq!(partition.support_size(), 6);
    }

    #[test]
    fn test_from_touching_ranges_coalesces() {
        let touching = Partition::from_ranges([(0, 4), (5, 9)], SIZE).unwrap();
        let single = Partition::from_ranges([(0, 9)], SIZE).unwrap();
        assert_eq!(touching, single);
    }

    #[test]
    fn test_from_no_ranges_is_zero() {
        let partition = Partition::from_ranges(Vec::new(), SIZE).unwrap();
        assert!(partition.is_zero());
        assert_eq!(partition, Partition::constant(SIZE, 0.0));
    }

    #[test]
    fn test_from_inverted_range() {
        assert_eq!(
            Partition::from_ranges([(9, 5)], SIZE),
            Err(MalformedRangeSet::Inverted {
                index: 0,
                start: 9,
                end: 5
            })
        );
    }

    #[test]
    fn test_from_overlapping_ranges() {
        assert_eq!(
            Partition::from_ranges([(5, 9), (9, 12)], SIZE),
            Err(MalformedRangeSet::Unordered {
                index: 1,
                start: 9,
                previous_end: 9
            })
        );
    }

    #[test]
    fn test_from_unsorted_ranges() {
        assert_eq!(
            Partition::from_ranges([(20, 30), (5, 9)], SIZE),
            Err(MalformedRangeSet::Unordered {
                index: 1,
                start: 5,
                previous_end: 30
            })
        );
    }

    #[test]
    fn test_from_range_outside_domain() {
        assert_eq!(
            Partition::from_ranges([(90, SIZE)], SIZE),
            Err(MalformedRangeSet::OutOfDomain {
                index: 0,
                end: SIZE,
                size: SIZE
            })
        );
    }

    #[test]
    fn test_merge_refines_boundaries() {
        let left = Partition::from_ranges([(10, 19)], SIZE).unwrap();
        let right = Partition::from_ranges([(15, 29)], SIZE).unwrap();
        let segments: Vec<_> = merge(&left, &right).collect();
        let boundaries: Vec<_> = segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(
            boundaries,
            vec![(0, 10), (10, 15), (15, 20), (20, 30), (30, SIZE)]
        );
        let weights: Vec<_> = segments.iter().map(|s| (s.left, s.right)).collect();
        assert_eq!(
            weights,
            vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn test_merge_with_self() {
        let partition = Partition::from_ranges([(3, 7), (50, 60)], SIZE).unwrap();
        let segments: Vec<_> = merge(&partition, &partition).collect();
        assert_eq!(segments.len(), partition.intervals().len());
        assert!(segments.iter().all(|s| s.left == s.right));
    }

    #[test]
    fn test_combine_coalesces() {
        let left = Partition::from_ranges([(10, 19)], SIZE).unwrap();
        let right = Partition::from_ranges([(15, 29)], SIZE).unwrap();
        let union = Partition::combine(&left, &right, f64::max);
        assert_eq!(union, Partition::from_ranges([(10, 29)], SIZE).unwrap());
        let intersection = Partition::combine(&left, &right, |a, b| a * b);
        assert_eq!(
            intersection,
            Partition::from_ranges([(15, 19)], SIZE).unwrap()
        );
    }

    #[test]
    fn test_normalized() {
        let partition = Partition::from_ranges([(0, 3)], SIZE).unwrap().normalized();
        assert_eq!(partition.lookup(2), 0.25);
        assert_eq!(partition.total_mass(), 1.0);
        assert!(Partition::constant(SIZE, 0.0).normalized().is_zero());
    }

    #[test]
    fn test_negative_zero_is_canonical() {
        let negative = Partition::constant(SIZE, 1.0).map_weights(|w| -0.0 * w);
        assert_eq!(negative.intervals(), &[interval(0, SIZE, 0.0)]);
        assert!(negative.intervals()[0].weight.is_sign_positive());
    }
}
