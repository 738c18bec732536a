//! Paired float / register representation of tuning parameters
//!
//! Hardware blocks take their tuning parameters as integer register codes,
//! while algorithms reason about them as floats. [`Quantized`] stores both,
//! keeping `value == T::to_float(quantized)` after every mutation.

use std::fmt;
use std::marker::PhantomData;

/// Conversion policy between a float domain value and its register code.
pub trait QuantizerTraits {
    /// Register storage. Always unsigned so a widening cast never sign
    /// extends a negative code.
    type QuantizedType: Copy + PartialEq + fmt::Debug + fmt::LowerHex;

    fn from_float(value: f32) -> Self::QuantizedType;
    fn to_float(quantized: Self::QuantizedType) -> f32;
}

/// A scalar held as both a register code and the float it decodes to.
///
/// Only `f32` and the exact `QuantizedType` are accepted, so an untyped
/// integer of the wrong width cannot slip in through an implicit conversion.
///
/// ```compile_fail
/// use ipa_core::ipa::fixed_point::Q;
///
/// // Q1.7 is stored in a u8, a u32 code is rejected.
/// let _ = Q::<1, 7>::from_quantized(0x80u32);
/// ```
///
/// ```compile_fail
/// use ipa_core::ipa::fixed_point::Q;
///
/// let _ = Q::<1, 7>::from_float(0.5f64);
/// ```
pub struct Quantized<T: QuantizerTraits> {
    quantized: T::QuantizedType,
    value: f32,
    _traits: PhantomData<fn() -> T>,
}

impl<T: QuantizerTraits> Quantized<T> {
    /// Quantizes `value` through the policy, which clamps it to the
    /// representable range.
    pub fn from_float(value: f32) -> Self {
        let quantized = T::from_float(value);
        Self {
            quantized,
            value: T::to_float(quantized),
            _traits: PhantomData,
        }
    }

    /// Takes a register code as-is.
    pub fn from_quantized(quantized: T::QuantizedType) -> Self {
        Self {
            quantized,
            value: T::to_float(quantized),
            _traits: PhantomData,
        }
    }

    pub fn set_float(&mut self, value: f32) {
        *self = Self::from_float(value);
    }

    pub fn set_quantized(&mut self, quantized: T::QuantizedType) {
        *self = Self::from_quantized(quantized);
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn quantized(&self) -> T::QuantizedType {
        self.quantized
    }
}

impl<T: QuantizerTraits> Default for Quantized<T> {
    fn default() -> Self {
        Self::from_float(0.0)
    }
}

impl<T: QuantizerTraits> From<f32> for Quantized<T> {
    fn from(value: f32) -> Self {
        Self::from_float(value)
    }
}

impl<T: QuantizerTraits> Clone for Quantized<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: QuantizerTraits> Copy for Quantized<T> {}

/// Equality is on the register code. Two floats that quantize to the same
/// code are the same parameter.
impl<T: QuantizerTraits> PartialEq for Quantized<T> {
    fn eq(&self, other: &Self) -> bool {
        self.quantized == other.quantized
    }
}

impl<T: QuantizerTraits> Eq for Quantized<T> {}

impl<T: QuantizerTraits> fmt::Debug for Quantized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<T: QuantizerTraits> fmt::Display for Quantized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}:{}]", self.quantized, self.value)
    }
}
