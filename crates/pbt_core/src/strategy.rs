//! Value generation strategies.
//!
//! A strategy turns raw choices from a [`TestCase`] into typed values. Each
//! strategy consumes choices in a fixed pattern, so a value is a pure
//! function of the choices it read.

use std::fmt;

use crate::data::{StopTest, TestCase};
use crate::error::{EngineError, Result};

/// Bit widths for unbounded integers and their relative weights. Small
/// widths dominate so that boundary-ish values show up often.
const INT_WIDTHS: [(u32, u64); 4] = [(8, 4), (16, 8), (32, 1), (64, 1)];

/// Attempts a [`Filter`] makes before rejecting the whole example.
const FILTER_ATTEMPTS: usize = 3;

/// Produces values of one type from a test case.
pub trait Strategy {
    /// Type of value produced.
    type Value: fmt::Debug;

    /// Draw one value.
    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<Self::Value, StopTest>;

    /// Transform produced values.
    fn map<F, T>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Value) -> T,
        T: fmt::Debug,
    {
        Map { inner: self, f }
    }

    /// Keep only values satisfying `predicate`.
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        Self: Sized,
        F: Fn(&Self::Value) -> bool,
    {
        Filter {
            inner: self,
            predicate,
        }
    }

    /// Erase the concrete strategy type.
    fn boxed(self) -> BoxedStrategy<Self::Value>
    where
        Self: Sized + 'static,
    {
        BoxedStrategy(Box::new(self))
    }
}

impl<S: Strategy + ?Sized> Strategy for &S {
    type Value = S::Value;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<Self::Value, StopTest> {
        (**self).draw_value(tc)
    }
}

/// Type-erased strategy.
pub struct BoxedStrategy<T>(Box<dyn Strategy<Value = T>>);

impl<T> fmt::Debug for BoxedStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedStrategy")
    }
}

impl<T: fmt::Debug> Strategy for BoxedStrategy<T> {
    type Value = T;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<T, StopTest> {
        self.0.draw_value(tc)
    }
}

/// Unbounded `i64` values, biased toward small magnitudes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integers;

/// Any `i64`.
#[must_use]
pub const fn integers() -> Integers {
    Integers
}

impl Strategy for Integers {
    type Value = i64;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<i64, StopTest> {
        let total: u64 = INT_WIDTHS.iter().map(|(_, weight)| weight).sum();
        let mut pick = tc.draw_bits(64)? % total;
        let mut width = 64;
        for (bits, weight) in INT_WIDTHS {
            if pick < weight {
                width = bits;
                break;
            }
            pick -= weight;
        }
        let raw = tc.draw_bits(width)?;
        let shift = 64 - width;
        Ok(((raw << shift) as i64) >> shift)
    }
}

/// `i64` values in an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerRange {
    min: i64,
    max: i64,
}

/// Integers in `min..=max`.
pub fn integers_in(min: i64, max: i64) -> Result<IntegerRange> {
    if min > max {
        return Err(EngineError::InvalidArgument(format!(
            "integers_in: min ({min}) must not exceed max ({max})"
        )));
    }
    Ok(IntegerRange { min, max })
}

impl Strategy for IntegerRange {
    type Value = i64;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<i64, StopTest> {
        let raw = tc.draw_bits(64)?;
        let span = (i128::from(self.max) - i128::from(self.min) + 1) as u128;
        if span > u128::from(u64::MAX) {
            return Ok(raw as i64);
        }
        let offset = u128::from(raw) % span;
        Ok((i128::from(self.min) + offset as i128) as i64)
    }
}

/// Fair booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Booleans;

/// `true` or `false`.
#[must_use]
pub const fn booleans() -> Booleans {
    Booleans
}

impl Strategy for Booleans {
    type Value = bool;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<bool, StopTest> {
        Ok(tc.draw_bits(1)? == 1)
    }
}

/// Always the same value. Consumes no choices.
#[derive(Debug, Clone)]
pub struct Just<T>(pub T);

/// Always `value`.
pub fn just<T: Clone + fmt::Debug>(value: T) -> Just<T> {
    Just(value)
}

impl<T: Clone + fmt::Debug> Strategy for Just<T> {
    type Value = T;

    fn draw_value(&self, _tc: &mut TestCase<'_>) -> std::result::Result<T, StopTest> {
        Ok(self.0.clone())
    }
}

/// One element of a fixed list.
#[derive(Debug, Clone)]
pub struct SampledFrom<T> {
    elements: Vec<T>,
}

/// Uniform choice from `elements`, which must be non-empty.
pub fn sampled_from<T: Clone + fmt::Debug>(elements: Vec<T>) -> Result<SampledFrom<T>> {
    if elements.is_empty() {
        return Err(EngineError::InvalidArgument(
            "sampled_from: cannot sample from an empty list".to_string(),
        ));
    }
    Ok(SampledFrom { elements })
}

impl<T: Clone + fmt::Debug> Strategy for SampledFrom<T> {
    type Value = T;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<T, StopTest> {
        let index = (tc.draw_bits(64)? % self.elements.len() as u64) as usize;
        Ok(self.elements[index].clone())
    }
}

/// Vectors with a length in an inclusive range.
#[derive(Debug, Clone)]
pub struct VecOf<S> {
    element: S,
    min_len: usize,
    max_len: usize,
}

/// Vectors of `element` values with `min_len..=max_len` items.
pub fn vecs<S: Strategy>(element: S, min_len: usize, max_len: usize) -> Result<VecOf<S>> {
    if min_len > max_len {
        return Err(EngineError::InvalidArgument(format!(
            "vecs: min_len ({min_len}) must not exceed max_len ({max_len})"
        )));
    }
    Ok(VecOf {
        element,
        min_len,
        max_len,
    })
}

impl<S: Strategy> Strategy for VecOf<S> {
    type Value = Vec<S::Value>;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<Self::Value, StopTest> {
        // u128: the span of 0..=usize::MAX does not fit in u64.
        let spread = (self.max_len - self.min_len) as u128 + 1;
        let len = self.min_len + (u128::from(tc.draw_bits(64)?) % spread) as usize;
        let mut out = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            out.push(self.element.draw_value(tc)?);
        }
        Ok(out)
    }
}

/// See [`Strategy::map`].
#[derive(Debug, Clone)]
pub struct Map<S, F> {
    inner: S,
    f: F,
}

impl<S, F, T> Strategy for Map<S, F>
where
    S: Strategy,
    F: Fn(S::Value) -> T,
    T: fmt::Debug,
{
    type Value = T;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<T, StopTest> {
        self.inner.draw_value(tc).map(&self.f)
    }
}

/// See [`Strategy::filter`]. Rejects the example after a few misses.
#[derive(Debug, Clone)]
pub struct Filter<S, F> {
    inner: S,
    predicate: F,
}

impl<S, F> Strategy for Filter<S, F>
where
    S: Strategy,
    F: Fn(&S::Value) -> bool,
{
    type Value = S::Value;

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<S::Value, StopTest> {
        for _ in 0..FILTER_ATTEMPTS {
            let value = self.inner.draw_value(tc)?;
            if (self.predicate)(&value) {
                return Ok(value);
            }
        }
        tc.reject()
    }
}

impl<A: Strategy, B: Strategy> Strategy for (A, B) {
    type Value = (A::Value, B::Value);

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<Self::Value, StopTest> {
        Ok((self.0.draw_value(tc)?, self.1.draw_value(tc)?))
    }
}

impl<A: Strategy, B: Strategy, C: Strategy> Strategy for (A, B, C) {
    type Value = (A::Value, B::Value, C::Value);

    fn draw_value(&self, tc: &mut TestCase<'_>) -> std::result::Result<Self::Value, StopTest> {
        Ok((
            self.0.draw_value(tc)?,
            self.1.draw_value(tc)?,
            self.2.draw_value(tc)?,
        ))
    }
}
