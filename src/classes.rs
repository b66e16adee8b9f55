//! Distributions for common classes of symbols, built once per alphabet.
//!
//! Every class starts from a static range table of Unicode general
//! categories, clipped to the alphabet's domain. Letter-or-digit, word
//! characters and the complements are derived from those.

use crate::alphabet::{Alphabet, CodePoint};
use crate::distribution::CharDistribution;
use crate::partition::Partition;
use crate::tables::{
    CONNECTOR_RANGES, DIGIT_RANGES, LETTER_RANGES, LOWER_RANGES, UPPER_RANGES, WHITESPACE_RANGES,
};

/// The named classes of one alphabet. Obtained through
/// [`Alphabet::classes`] or the accessors on [`CharDistribution`].
#[derive(Debug)]
pub struct NamedClasses<A: Alphabet> {
    pub digit: CharDistribution<A>,
    pub letter: CharDistribution<A>,
    pub upper: CharDistribution<A>,
    pub lower: CharDistribution<A>,
    pub letter_or_digit: CharDistribution<A>,
    pub word_char: CharDistribution<A>,
    pub non_word_char: CharDistribution<A>,
    pub whitespace: CharDistribution<A>,
    pub non_whitespace: CharDistribution<A>,
}

impl<A: Alphabet> NamedClasses<A> {
    pub(crate) fn build() -> Self {
        let digit = from_ranges::<A>("digit", clipped::<A>(DIGIT_RANGES));
        let letter = from_ranges::<A>("letter", clipped::<A>(LETTER_RANGES));
        let upper = from_ranges::<A>("upper", clipped::<A>(UPPER_RANGES));
        let lower = from_ranges::<A>("lower", clipped::<A>(LOWER_RANGES));
        let whitespace = from_ranges::<A>("whitespace", clipped::<A>(WHITESPACE_RANGES));
        let connector = from_ranges::<A>("connector", clipped::<A>(CONNECTOR_RANGES));

        let letter_or_digit = support_union(&letter, &digit);
        let word_char = support_union(&letter_or_digit, &connector);
        let non_word_char = word_char.complement();
        let non_whitespace = whitespace.complement();

        log::debug!(
            "Built {} classes: {} letters, {} digits, {} word characters",
            A::NAME,
            letter.support_size(),
            digit.support_size(),
            word_char.support_size()
        );

        Self {
            digit,
            letter,
            upper,
            lower,
            letter_or_digit,
            word_char,
            non_word_char,
            whitespace,
            non_whitespace,
        }
    }
}

fn from_ranges<A: Alphabet>(
    name: &str,
    ranges: Vec<(CodePoint, CodePoint)>,
) -> CharDistribution<A> {
    log::trace!("Building {} {name} class from {} ranges", A::NAME, ranges.len());
    match CharDistribution::uniform_in_range_pairs(ranges) {
        Ok(distribution) => distribution,
        Err(err) => unreachable!("The {name} ranges are sorted and disjoint: {err}"),
    }
}

/// The ranges of a static table that fall inside the alphabet, with the last
/// one cut short if it crosses the end of the domain.
fn clipped<A: Alphabet>(table: &[(CodePoint, CodePoint)]) -> Vec<(CodePoint, CodePoint)> {
    table
        .iter()
        .filter(|&&(start, _)| A::contains(start))
        .map(|&(start, end)| (start, end.min(A::SIZE - 1)))
        .collect()
}

/// Uniform over every code point in the support of `a` or of `b`.
fn support_union<A: Alphabet>(
    a: &CharDistribution<A>,
    b: &CharDistribution<A>,
) -> CharDistribution<A> {
    let union = Partition::combine(a.partition(), b.partition(), |left, right| {
        if left > 0.0 || right > 0.0 { 1.0 } else { 0.0 }
    });
    CharDistribution::from_partition(union)
}

impl<A: Alphabet> CharDistribution<A> {
    /// Decimal digits, `0-9` and their counterparts in other scripts.
    pub fn digit() -> &'static Self {
        &A::classes().digit
    }

    /// Letters of any case or script. Letter-like numbers such as `Ⅰ`,
    /// combining marks and circled letters are excluded.
    pub fn letter() -> &'static Self {
        &A::classes().letter
    }

    pub fn upper() -> &'static Self {
        &A::classes().upper
    }

    pub fn lower() -> &'static Self {
        &A::classes().lower
    }

    pub fn letter_or_digit() -> &'static Self {
        &A::classes().letter_or_digit
    }

    /// Letters, digits and connector punctuation such as `_`.
    pub fn word_char() -> &'static Self {
        &A::classes().word_char
    }

    /// Everything [`CharDistribution::word_char`] excludes.
    pub fn non_word_char() -> &'static Self {
        &A::classes().non_word_char
    }

    pub fn whitespace() -> &'static Self {
        &A::classes().whitespace
    }

    pub fn non_whitespace() -> &'static Self {
        &A::classes().non_whitespace
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alphabet::{Unicode, Utf16};

    type Dist = CharDistribution<Unicode>;

    /// Maximal runs of code points in the alphabet whose `char` satisfies
    /// `predicate`. Code points that are not `char`s (surrogates) never match.
    fn property_ranges<A: Alphabet>(
        predicate: fn(char) -> bool,
    ) -> Vec<(CodePoint, CodePoint)> {
        let mut ranges = Vec::new();
        let mut run_start: Option<CodePoint> = None;

        for code_point in 0..A::SIZE {
            let member = char::from_u32(code_point).is_some_and(predicate);
            match (member, run_start) {
                (true, None) => run_start = Some(code_point),
                (false, Some(start)) => {
                    ranges.push((start, code_point - 1));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            ranges.push((start, A::SIZE - 1));
        }

        ranges
    }

    /// Asserts that every code point of `table` satisfies `predicate`.
    fn assert_table_within(
        name: &str,
        table: &[(CodePoint, CodePoint)],
        predicate: fn(char) -> bool,
    ) {
        for &(start, end) in table {
            for code_point in start..=end {
                let c = char::from_u32(code_point).unwrap();
                assert!(predicate(c), "{name} table contains {c:?}");
            }
        }
    }

    fn assert_support<A: Alphabet>(
        name: &str,
        distribution: &CharDistribution<A>,
        included: &str,
        excluded: &str,
    ) {
        for c in included.chars() {
            assert!(
                distribution.log_prob(c).is_finite(),
                "{name} {distribution} should contain {c:?}"
            );
        }
        for c in excluded.chars() {
            assert_eq!(
                distribution.log_prob(c),
                f64::NEG_INFINITY,
                "{name} {distribution} should not contain {c:?}"
            );
        }
    }

    #[test_log::test]
    fn test_common_classes() {
        assert_support("digit", Dist::digit(), "0123456789٣", "Ab !£Ј");
        assert_support("lower", Dist::lower(), "abcdefghixyzß", "ABC0123, ");
        assert_support("upper", Dist::upper(), "ABCDEFGHUXYZЈ", "abc0123, ǅ\u{2160}\u{24B6}");
        assert_support("letter", Dist::letter(), "aBcDeFgGhxyzXYZЈжǅ", "0123! ,");
        assert_support(
            "letter_or_digit",
            Dist::letter_or_digit(),
            "abcABC0123xyzXYZ789",
            " !£$,",
        );
        assert_support("word_char", Dist::word_char(), "abc_ABC_0123s", " !:.,");
        assert_support(
            "letter",
            Dist::letter(),
            "",
            "\u{2160}\u{0345}\u{093E}\u{24B6}",
        );
        assert_support(
            "word_char",
            Dist::word_char(),
            "",
            "\u{2160}\u{0345}\u{093E}\u{24B6}",
        );
        assert_support("non_word_char", Dist::non_word_char(), " !:.,", "abc_ABC_0123s");
        assert_support("whitespace", Dist::whitespace(), " \t\n\u{3000}", "abcABC0123,:!");
        assert_support("non_whitespace", Dist::non_whitespace(), "abcABC0123,:!", " \t");
    }

    #[test]
    fn test_utf16_classes() {
        let digit = CharDistribution::<Utf16>::digit();
        assert_support("utf-16 digit", digit, "0123456789", "a ");
        assert_eq!(digit.log_prob(0x1D7CE_u32), f64::NEG_INFINITY);
        assert!(Dist::digit().log_prob(0x1D7CE_u32).is_finite());
        assert_eq!(
            CharDistribution::<Utf16>::letter().log_prob('𝐀'),
            f64::NEG_INFINITY
        );
        assert!(Dist::letter().log_prob('𝐀').is_finite());
    }

    #[test]
    fn test_classes_are_uniform_over_support() {
        let digit = Dist::digit();
        let expected = 1.0 / f64::from(digit.support_size());
        assert!((digit.prob('7') - expected).abs() < 1e-15);
        assert!((digit.total_mass() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_classes_are_consistent() {
        assert_eq!(
            Dist::letter_or_digit().support_size(),
            Dist::letter().support_size() + Dist::digit().support_size()
        );
        assert_eq!(
            Dist::word_char().support_size() + Dist::non_word_char().support_size(),
            Unicode::SIZE
        );
        assert!(Dist::lower().support_size() < Dist::letter().support_size());
    }

    #[test]
    fn test_whitespace_table_matches_property() {
        assert_eq!(
            clipped::<Unicode>(WHITESPACE_RANGES),
            property_ranges::<Unicode>(char::is_whitespace)
        );
    }

    #[test]
    fn test_letter_tables_are_within_properties() {
        assert_table_within("letter", LETTER_RANGES, char::is_alphabetic);
        assert_table_within("upper", UPPER_RANGES, char::is_uppercase);
        assert_table_within("lower", LOWER_RANGES, char::is_lowercase);
    }

    #[test]
    fn test_letter_tables_are_narrower_than_properties() {
        let alphabetic = property_ranges::<Unicode>(char::is_alphabetic);
        let uppercase = property_ranges::<Unicode>(char::is_uppercase);
        let alphabetic = Dist::uniform_in_range_pairs(alphabetic).unwrap();
        let uppercase = Dist::uniform_in_range_pairs(uppercase).unwrap();
        assert!(Dist::letter().support_size() < alphabetic.support_size());
        assert!(Dist::upper().support_size() < uppercase.support_size());
        assert!(alphabetic.log_prob('\u{2160}').is_finite());
        assert!(uppercase.log_prob('\u{24B6}').is_finite());
    }

    #[test]
    fn test_tables_are_sorted_and_disjoint() {
        for table in [
            DIGIT_RANGES,
            WHITESPACE_RANGES,
            CONNECTOR_RANGES,
            LETTER_RANGES,
            UPPER_RANGES,
            LOWER_RANGES,
        ] {
            assert!(Partition::from_ranges(table.iter().copied(), Unicode::SIZE).is_ok());
        }
    }

    #[test]
    fn test_digit_table_is_numeric() {
        for &(start, end) in DIGIT_RANGES {
            assert_eq!((end - start + 1) % 10, 0, "U+{start:04X} is not a block of ten");
            for code_point in start..=end {
                let c = char::from_u32(code_point).unwrap();
                assert!(c.is_numeric() && !c.is_alphabetic(), "{c:?} is not a digit");
            }
        }
    }

    #[test]
    fn test_clipped() {
        assert_eq!(
            clipped::<Utf16>(&[(0x41, 0x5A), (0xFFF0, 0x1_0010), (0x2_0000, 0x2_0001)]),
            vec![(0x41, 0x5A), (0xFFF0, 0xFFFF)]
        );
    }

    #[test]
    fn test_property_ranges_runs() {
        let ranges = property_ranges::<Utf16>(|c| c.is_ascii_digit() || c == '\u{FFFF}');
        assert_eq!(ranges, vec![(0x30, 0x39), (0xFFFF, 0xFFFF)]);
    }

    #[test]
    fn test_mixing_a_class_leaves_it_untouched() {
        let before = Dist::letter().clone();
        let mix = Dist::mixture(0.5, Dist::letter(), 0.5, Dist::digit());
        assert!(mix.log_prob('7').is_finite());
        assert_eq!(Dist::letter(), &before);
        assert_eq!(Dist::letter().log_prob('7'), f64::NEG_INFINITY);
    }
}
