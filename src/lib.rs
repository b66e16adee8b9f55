//! Probability distributions over the code points of a character alphabet.
//!
//! A [`CharDistribution`] stores its probabilities as a sorted list of
//! weighted code point intervals, so distributions over tens of thousands of
//! symbols stay small. Distributions can be mixed and multiplied, queried for
//! exact log-probabilities and sampled with a caller-supplied [`rand::Rng`].
//!
//! ```
//! use discrete_char::{CharDistribution, Unicode};
//!
//! let range = CharDistribution::<Unicode>::uniform_in_ranges("aj").unwrap();
//! let mix = CharDistribution::mixture(0.8, &range, 0.2, CharDistribution::digit());
//! assert!(mix.log_prob('b') > mix.log_prob('7'));
//! assert_eq!(mix.log_prob('z'), f64::NEG_INFINITY);
//! ```

pub mod alphabet;
pub mod classes;
pub mod distribution;
pub mod partition;
pub mod sampler;
mod tables;

pub use alphabet::{Alphabet, CodePoint, Unicode, Utf16};
pub use classes::NamedClasses;
pub use distribution::CharDistribution;
pub use partition::{MalformedRangeSet, Partition};
pub use sampler::SampleError;

/// A reasonable tolerance for [`CharDistribution::approx_eq`] when comparing
/// distributions that went through a handful of mixtures and products.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;
