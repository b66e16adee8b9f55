use crate::classes::NamedClasses;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::LazyLock;

/// A symbol of an alphabet, identified by its integer code point.
///
/// Every `char` converts into a code point, so most methods accept
/// `impl Into<CodePoint>` and can be called with character literals.
pub type CodePoint = u32;

pub trait Alphabet: Copy + Debug + Default + PartialEq + Eq + Hash + Send + Sync + 'static {
    /// Number of code points in the alphabet. The domain is `0..SIZE`.
    const SIZE: CodePoint;

    /// Short human readable name, used in log messages.
    const NAME: &'static str;

    /// The named symbol classes over this alphabet, built on first use and
    /// shared for the rest of the process.
    fn classes() -> &'static NamedClasses<Self>;

    /// Whether the code point belongs to the alphabet's domain.
    fn contains(code_point: CodePoint) -> bool {
        code_point < Self::SIZE
    }
}

/// 16-bit code units, as used by UTF-16 strings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Utf16;

/// The full 21-bit code point range, `U+0000..=U+10FFFF`.
///
/// Surrogate code points are part of the domain; they are never members of
/// the named classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Unicode;

static UTF16_CLASSES: LazyLock<NamedClasses<Utf16>> = LazyLock::new(NamedClasses::build);
static UNICODE_CLASSES: LazyLock<NamedClasses<Unicode>> = LazyLock::new(NamedClasses::build);

impl Alphabet for Utf16 {
    const SIZE: CodePoint = 0x1_0000;
    const NAME: &'static str = "utf-16";

    fn classes() -> &'static NamedClasses<Self> {
        &UTF16_CLASSES
    }
}

impl Alphabet for Unicode {
    const SIZE: CodePoint = 0x11_0000;
    const NAME: &'static str = "unicode";

    fn classes() -> &'static NamedClasses<Self> {
        &UNICODE_CLASSES
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_domain_bounds() {
        assert!(Utf16::contains(0xFFFF));
        assert!(!Utf16::contains(0x1_0000));
        assert!(Unicode::contains(0x1_0000));
        assert!(Unicode::contains(char::MAX as CodePoint));
        assert!(!Unicode::contains(char::MAX as CodePoint + 1));
    }

    #[test]
    fn test_classes_are_shared() {
        assert!(std::ptr::eq(Utf16::classes(), Utf16::classes()));
        assert!(std::ptr::eq(Unicode::classes(), Unicode::classes()));
    }
}
