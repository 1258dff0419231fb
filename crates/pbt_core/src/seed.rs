//! Seed resolution.
//!
//! Every run is keyed by exactly one [`Seed`]. The [`SeedSource`] picks it
//! from, in order of precedence:
//!
//! 1. a seed pinned on the test itself ([`crate::settings::Settings::seed`]),
//! 2. the derandomized default (a stable hash of the test name),
//! 3. the seed forced for the whole process (`--hypothesis-seed`),
//! 4. a fresh random seed, which is recorded so it can be reported.
//!
//! String seeds are normalised with `xxh3_64` over their UTF-8 bytes. The
//! hash is part of the reproducibility contract and must never change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

/// Domain tag mixed into derandomized seeds so they never collide with a
/// user-supplied string seed equal to the test name.
const TAG_DERANDOMIZE: &[u8] = b"derandomize:";

/// A seed as supplied by a user, before normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedArg {
    /// Integer seed, used as-is.
    Int(u64),
    /// Arbitrary text, hashed to an integer.
    Text(String),
}

impl FromStr for SeedArg {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for SeedArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<u64> for SeedArg {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

/// Anything that parses as a `u64` is an integer seed; everything else,
/// including negative numbers, is hashed as text.
impl From<&str> for SeedArg {
    fn from(s: &str) -> Self {
        s.parse::<u64>()
            .map_or_else(|_| Self::Text(s.to_string()), Self::Int)
    }
}

/// The effective seed of a run. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Seed {
    /// Integer seed supplied by the caller.
    Explicit(u64),
    /// String seed supplied by the caller.
    ExplicitHashed(String),
    /// Derandomized default derived from the test name.
    Derived(u64),
    /// Freshly chosen seed; the only kind that gets reported.
    Random(u64),
}

impl Seed {
    /// Normalise to the integer that keys the generator.
    #[must_use]
    pub fn canonical(&self) -> u64 {
        match self {
            Self::Explicit(n) | Self::Derived(n) | Self::Random(n) => *n,
            Self::ExplicitHashed(text) => hash_text_seed(text),
        }
    }

    /// Whether the caller (or configuration) chose this seed, meaning there
    /// is nothing to tell them about reproducing the run.
    #[must_use]
    pub const fn is_explicit(&self) -> bool {
        !matches!(self, Self::Random(_))
    }

    /// Build a seed from a user-supplied argument.
    #[must_use]
    pub fn from_arg(arg: &SeedArg) -> Self {
        match arg {
            SeedArg::Int(n) => Self::Explicit(*n),
            SeedArg::Text(s) => Self::ExplicitHashed(s.clone()),
        }
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(n) => write!(f, "{n} (explicit)"),
            Self::ExplicitHashed(s) => write!(f, "{s:?} -> {} (explicit)", self.canonical()),
            Self::Derived(n) => write!(f, "{n} (derandomized)"),
            Self::Random(n) => write!(f, "{n} (random)"),
        }
    }
}

/// Hash a string seed to its canonical integer.
#[must_use]
pub fn hash_text_seed(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

/// Seed derived from a test name when derandomizing.
#[must_use]
pub fn derived_seed(test_name: &str) -> u64 {
    let mut buf = Vec::with_capacity(TAG_DERANDOMIZE.len() + test_name.len());
    buf.extend_from_slice(TAG_DERANDOMIZE);
    buf.extend_from_slice(test_name.as_bytes());
    xxh3_64(&buf)
}

/// Resolves the seed for one test run.
#[derive(Debug, Clone, Default)]
pub struct SeedSource {
    test_name: String,
    derandomize: bool,
    forced: Option<SeedArg>,
}

impl SeedSource {
    /// Create a source for the named test.
    #[must_use]
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            ..Default::default()
        }
    }

    /// Derive the seed from the test name instead of choosing one.
    #[must_use]
    pub fn with_derandomize(mut self, derandomize: bool) -> Self {
        self.derandomize = derandomize;
        self
    }

    /// Seed forced for every test in the process.
    #[must_use]
    pub fn with_forced_seed(mut self, forced: Option<SeedArg>) -> Self {
        self.forced = forced;
        self
    }

    /// Resolve the effective seed, drawing fresh entropy only when nothing
    /// else applies.
    pub fn resolve(&self, explicit: Option<&SeedArg>) -> Seed {
        self.resolve_with(explicit, rand::random::<u64>)
    }

    /// Like [`Self::resolve`] with a caller-provided entropy source.
    pub fn resolve_with<E>(&self, explicit: Option<&SeedArg>, entropy: E) -> Seed
    where
        E: FnOnce() -> u64,
    {
        let seed = if let Some(arg) = explicit {
            Seed::from_arg(arg)
        } else if self.derandomize {
            Seed::Derived(derived_seed(&self.test_name))
        } else if let Some(arg) = &self.forced {
            Seed::from_arg(arg)
        } else {
            Seed::Random(entropy())
        };
        debug!(test = %self.test_name, seed = %seed, "seed resolved");
        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seed_arg_parses_integers_and_text() {
        assert_eq!("0".parse::<SeedArg>().unwrap(), SeedArg::Int(0));
        assert_eq!("42".parse::<SeedArg>().unwrap(), SeedArg::Int(42));
        assert_eq!(
            "foo".parse::<SeedArg>().unwrap(),
            SeedArg::Text("foo".to_string())
        );
        assert_eq!(
            "-5".parse::<SeedArg>().unwrap(),
            SeedArg::Text("-5".to_string())
        );
    }

    #[test]
    fn test_text_seed_is_stable() {
        let a = Seed::ExplicitHashed("foo".to_string());
        let b = Seed::ExplicitHashed("foo".to_string());
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical(), xxh3_64(b"foo"));
        assert_ne!(a.canonical(), Seed::ExplicitHashed("bar".to_string()).canonical());
    }

    #[test]
    fn test_explicit_seed_wins() {
        let source = SeedSource::new("t")
            .with_derandomize(true)
            .with_forced_seed(Some(SeedArg::Int(7)));
        let seed = source.resolve_with(Some(&SeedArg::Int(3)), || unreachable!());
        assert_eq!(seed, Seed::Explicit(3));
    }

    #[test]
    fn test_derandomize_beats_forced_seed() {
        let source = SeedSource::new("test_fails_once")
            .with_derandomize(true)
            .with_forced_seed(Some(SeedArg::Int(7)));
        let seed = source.resolve_with(None, || unreachable!());
        assert_eq!(seed, Seed::Derived(derived_seed("test_fails_once")));
        assert!(seed.is_explicit());
    }

    #[test]
    fn test_forced_text_seed_is_hashed() {
        let source = SeedSource::new("t").with_forced_seed(Some("foo".into()));
        let seed = source.resolve_with(None, || unreachable!());
        assert_eq!(seed, Seed::ExplicitHashed("foo".to_string()));
        assert_eq!(seed.canonical(), hash_text_seed("foo"));
    }

    #[test]
    fn test_random_seed_is_reported() {
        let source = SeedSource::new("t");
        let seed = source.resolve_with(None, || 987_654);
        assert_eq!(seed, Seed::Random(987_654));
        assert!(!seed.is_explicit());
        assert_eq!(seed.canonical(), 987_654);
    }

    #[test]
    fn test_from_str_ref_matches_parse() {
        assert_eq!(SeedArg::from("42"), SeedArg::Int(42));
        assert_eq!(
            SeedArg::from("3176308182700119826"),
            SeedArg::Int(3_176_308_182_700_119_826)
        );
        assert_eq!(SeedArg::from("foo"), SeedArg::Text("foo".to_string()));
        for text in ["0", "18446744073709551615", "-1", "nightly"] {
            assert_eq!(SeedArg::from(text), text.parse::<SeedArg>().unwrap());
        }
    }

    #[test]
    fn test_derived_seed_differs_from_text_seed_of_same_name() {
        assert_ne!(derived_seed("foo"), hash_text_seed("foo"));
    }

    #[test]
    fn test_seed_round_trips_through_json() {
        let seed = Seed::ExplicitHashed("foo".to_string());
        let json = serde_json::to_string(&seed).unwrap();
        let back: Seed = serde_json::from_str(&json).unwrap();
        assert_eq!(seed, back);
    }

    proptest! {
        #[test]
        fn prop_integer_args_resolve_to_themselves(n in any::<u64>()) {
            let arg: SeedArg = n.to_string().parse().unwrap();
            prop_assert_eq!(Seed::from_arg(&arg).canonical(), n);
        }

        #[test]
        fn prop_resolution_is_repeatable(text in "[a-z]{1,12}") {
            let arg = SeedArg::Text(text);
            let a = SeedSource::new("t").resolve_with(Some(&arg), || 1);
            let b = SeedSource::new("t").resolve_with(Some(&arg), || 2);
            prop_assert_eq!(a.canonical(), b.canonical());
        }
    }
}
