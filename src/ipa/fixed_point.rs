//! Fixed-point register formats
//!
//! Hardware accelerators take most tuning parameters as fixed-point numbers
//! with `I` integer bits and `F` fractional bits, stored either as two's
//! complement or as plain unsigned codes. [`FixedPoint`] is the
//! [`QuantizerTraits`] policy for such a format, and [`Q`] / [`UQ`] are the
//! [`Quantized`] values that use it with the narrowest suitable storage.
//!
//! ```
//! use ipa_core::ipa::fixed_point::{Q, UQ};
//!
//! assert_eq!(Q::<1, 7>::from_float(-1.0).quantized(), 0x80u8);
//! assert_eq!(UQ::<1, 7>::from_float(2.0).quantized(), 0xffu8);
//! assert_eq!(UQ::<4, 12>::from_float(1.0).quantized(), 0x1000u16);
//! ```
//!
//! Formats wider than 24 bits exceed what an `f32` mantissa can round-trip
//! and are rejected at compile time:
//!
//! ```compile_fail
//! use ipa_core::ipa::fixed_point::Q;
//!
//! let _ = Q::<20, 8>::from_float(1.0);
//! ```
//!
//! ```compile_fail
//! use ipa_core::ipa::fixed_point::FixedPoint;
//!
//! let _ = FixedPoint::<20, 8, i32>::MAX;
//! ```
//!
//! ```compile_fail
//! use ipa_core::ipa::fixed_point::FixedPoint;
//!
//! // 12 bits do not fit an i8.
//! let _ = FixedPoint::<8, 4, i8>::MIN;
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::ipa::quantized::{Quantized, QuantizerTraits};

mod private {
    pub trait Sealed {}
}

/// Integer type a fixed-point format is declared against.
///
/// The declared type carries the signedness; codes are always stored in its
/// unsigned counterpart.
pub trait FixedPointStorage: private::Sealed {
    type Unsigned: Copy + PartialEq + fmt::Debug + fmt::LowerHex + Into<u32>;

    const SIGNED: bool;
    const BITS: u32;

    /// Truncating conversion of an already masked code.
    fn narrow(code: u32) -> Self::Unsigned;
}

macro_rules! impl_storage {
    ($($ty:ty => $unsigned:ty, $signed:expr;)*) => {
        $(
            impl private::Sealed for $ty {}

            impl FixedPointStorage for $ty {
                type Unsigned = $unsigned;

                const SIGNED: bool = $signed;
                const BITS: u32 = <$unsigned>::BITS;

                fn narrow(code: u32) -> $unsigned {
                    code as $unsigned
                }
            }
        )*
    };
}

impl_storage! {
    i8 => u8, true;
    i16 => u16, true;
    i32 => u32, true;
    u8 => u8, false;
    u16 => u16, false;
    u32 => u32, false;
}

/// Conversion policy for an `I.F` fixed-point format declared against `S`.
///
/// `FixedPoint` is never instantiated, it only carries the format in its
/// type.
pub struct FixedPoint<const I: u32, const F: u32, S>(PhantomData<S>);

impl<const I: u32, const F: u32, S: FixedPointStorage> FixedPoint<I, F, S> {
    /// Logical width of the format.
    pub const BITS: u32 = {
        assert!(I + F > 0, "fixed-point format needs at least one bit");
        assert!(
            I + F <= S::BITS,
            "fixed-point format does not fit its storage type"
        );
        assert!(
            I + F <= 24,
            "f32 precision is insufficient for more than 24 bits"
        );
        I + F
    };

    const MASK: u32 = (1 << Self::BITS) - 1;
    const SCALE: f32 = (1u32 << F) as f32;

    /// Smallest code, as the masked bit pattern (`0x80` for Q1.7).
    pub const Q_MIN: u32 = if S::SIGNED {
        1 << (Self::BITS - 1)
    } else {
        0
    };

    /// Largest code.
    pub const Q_MAX: u32 = if S::SIGNED {
        (1 << (Self::BITS - 1)) - 1
    } else {
        Self::MASK
    };

    pub const MIN: f32 = Self::decode(Self::Q_MIN);
    pub const MAX: f32 = Self::decode(Self::Q_MAX);

    pub const fn is_signed() -> bool {
        S::SIGNED
    }

    /// Decodes `code`. Bits above the format width are ignored, and signed
    /// codes are sign extended from bit `I + F - 1`.
    pub const fn decode(code: u32) -> f32 {
        let code = code & Self::MASK;
        if S::SIGNED {
            let shift = 32 - Self::BITS;
            (((code << shift) as i32) >> shift) as f32 / Self::SCALE
        } else {
            code as f32 / Self::SCALE
        }
    }

    /// Clamps `value` to `[MIN, MAX]` and rounds it half away from zero to
    /// the nearest code.
    pub fn encode(value: f32) -> u32 {
        let clamped = value.clamp(Self::MIN, Self::MAX);
        ((clamped * Self::SCALE).round() as i32 as u32) & Self::MASK
    }

    pub fn q_min() -> S::Unsigned {
        S::narrow(Self::Q_MIN)
    }

    pub fn q_max() -> S::Unsigned {
        S::narrow(Self::Q_MAX)
    }
}

impl<const I: u32, const F: u32, S: FixedPointStorage> QuantizerTraits for FixedPoint<I, F, S> {
    type QuantizedType = S::Unsigned;

    fn from_float(value: f32) -> S::Unsigned {
        S::narrow(Self::encode(value))
    }

    fn to_float(quantized: S::Unsigned) -> f32 {
        Self::decode(quantized.into())
    }
}

/// Marker used to pick the storage of an `I.F` format.
pub struct Format<const I: u32, const F: u32>;

/// Narrowest signed and unsigned storage able to hold a format.
///
/// Implemented for every format with `1 <= I + F <= 24`.
pub trait SelectStorage {
    type Signed: FixedPointStorage;
    type Unsigned: FixedPointStorage;
}

macro_rules! select_storage {
    ($signed:ty, $unsigned:ty => $(($i:literal, $f:literal))*) => {
        $(
            impl SelectStorage for Format<$i, $f> {
                type Signed = $signed;
                type Unsigned = $unsigned;
            }
        )*
    };
}

select_storage! { i8, u8 =>
        (0, 1) (1, 0) (0, 2) (1, 1) (2, 0) (0, 3) (1, 2) (2, 1) (3, 0) (0, 4)
        (1, 3) (2, 2) (3, 1) (4, 0) (0, 5) (1, 4) (2, 3) (3, 2) (4, 1) (5, 0)
        (0, 6) (1, 5) (2, 4) (3, 3) (4, 2) (5, 1) (6, 0) (0, 7) (1, 6) (2, 5)
        (3, 4) (4, 3) (5, 2) (6, 1) (7, 0) (0, 8) (1, 7) (2, 6) (3, 5) (4, 4)
        (5, 3) (6, 2) (7, 1) (8, 0)
}

select_storage! { i16, u16 =>
        (0, 9) (1, 8) (2, 7) (3, 6) (4, 5) (5, 4) (6, 3) (7, 2) (8, 1) (9, 0)
        (0, 10) (1, 9) (2, 8) (3, 7) (4, 6) (5, 5) (6, 4) (7, 3) (8, 2) (9, 1)
        (10, 0) (0, 11) (1, 10) (2, 9) (3, 8) (4, 7) (5, 6) (6, 5) (7, 4) (8, 3)
        (9, 2) (10, 1) (11, 0) (0, 12) (1, 11) (2, 10) (3, 9) (4, 8) (5, 7) (6, 6)
        (7, 5) (8, 4) (9, 3) (10, 2) (11, 1) (12, 0) (0, 13) (1, 12) (2, 11) (3, 10)
        (4, 9) (5, 8) (6, 7) (7, 6) (8, 5) (9, 4) (10, 3) (11, 2) (12, 1) (13, 0)
        (0, 14) (1, 13) (2, 12) (3, 11) (4, 10) (5, 9) (6, 8) (7, 7) (8, 6) (9, 5)
        (10, 4) (11, 3) (12, 2) (13, 1) (14, 0) (0, 15) (1, 14) (2, 13) (3, 12) (4, 11)
        (5, 10) (6, 9) (7, 8) (8, 7) (9, 6) (10, 5) (11, 4) (12, 3) (13, 2) (14, 1)
        (15, 0) (0, 16) (1, 15) (2, 14) (3, 13) (4, 12) (5, 11) (6, 10) (7, 9) (8, 8)
        (9, 7) (10, 6) (11, 5) (12, 4) (13, 3) (14, 2) (15, 1) (16, 0)
}

select_storage! { i32, u32 =>
        (0, 17) (1, 16) (2, 15) (3, 14) (4, 13) (5, 12) (6, 11) (7, 10) (8, 9) (9, 8)
        (10, 7) (11, 6) (12, 5) (13, 4) (14, 3) (15, 2) (16, 1) (17, 0) (0, 18) (1, 17)
        (2, 16) (3, 15) (4, 14) (5, 13) (6, 12) (7, 11) (8, 10) (9, 9) (10, 8) (11, 7)
        (12, 6) (13, 5) (14, 4) (15, 3) (16, 2) (17, 1) (18, 0) (0, 19) (1, 18) (2, 17)
        (3, 16) (4, 15) (5, 14) (6, 13) (7, 12) (8, 11) (9, 10) (10, 9) (11, 8) (12, 7)
        (13, 6) (14, 5) (15, 4) (16, 3) (17, 2) (18, 1) (19, 0) (0, 20) (1, 19) (2, 18)
        (3, 17) (4, 16) (5, 15) (6, 14) (7, 13) (8, 12) (9, 11) (10, 10) (11, 9) (12, 8)
        (13, 7) (14, 6) (15, 5) (16, 4) (17, 3) (18, 2) (19, 1) (20, 0) (0, 21) (1, 20)
        (2, 19) (3, 18) (4, 17) (5, 16) (6, 15) (7, 14) (8, 13) (9, 12) (10, 11) (11, 10)
        (12, 9) (13, 8) (14, 7) (15, 6) (16, 5) (17, 4) (18, 3) (19, 2) (20, 1) (21, 0)
        (0, 22) (1, 21) (2, 20) (3, 19) (4, 18) (5, 17) (6, 16) (7, 15) (8, 14) (9, 13)
        (10, 12) (11, 11) (12, 10) (13, 9) (14, 8) (15, 7) (16, 6) (17, 5) (18, 4) (19, 3)
        (20, 2) (21, 1) (22, 0) (0, 23) (1, 22) (2, 21) (3, 20) (4, 19) (5, 18) (6, 17)
        (7, 16) (8, 15) (9, 14) (10, 13) (11, 12) (12, 11) (13, 10) (14, 9) (15, 8) (16, 7)
        (17, 6) (18, 5) (19, 4) (20, 3) (21, 2) (22, 1) (23, 0) (0, 24) (1, 23) (2, 22)
        (3, 21) (4, 20) (5, 19) (6, 18) (7, 17) (8, 16) (9, 15) (10, 14) (11, 13) (12, 12)
        (13, 11) (14, 10) (15, 9) (16, 8) (17, 7) (18, 6) (19, 5) (20, 4) (21, 3) (22, 2)
        (23, 1) (24, 0)
}

/// Policy of the signed `I.F` format.
pub type QTraits<const I: u32, const F: u32> =
    FixedPoint<I, F, <Format<I, F> as SelectStorage>::Signed>;

/// Policy of the unsigned `I.F` format.
pub type UQTraits<const I: u32, const F: u32> =
    FixedPoint<I, F, <Format<I, F> as SelectStorage>::Unsigned>;

/// Signed two's complement `I.F` value.
pub type Q<const I: u32, const F: u32> = Quantized<QTraits<I, F>>;

/// Unsigned `I.F` value.
pub type UQ<const I: u32, const F: u32> = Quantized<UQTraits<I, F>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    fn check<T: QuantizerTraits>(input: f32, expected: T::QuantizedType, value: f32) {
        let q = Quantized::<T>::from_float(input);
        assert_eq!(
            q.quantized(),
            expected,
            "{} quantized to {:?}, expected {:#x}",
            input,
            q,
            expected
        );
        assert!(
            (q.value() - value).abs() <= 0.0001,
            "{} quantized to {:?}, expected value {}",
            input,
            q,
            value
        );
    }

    fn storage_of<T: QuantizerTraits>() -> TypeId
    where
        T::QuantizedType: 'static,
    {
        TypeId::of::<T::QuantizedType>()
    }

    fn assert_round_trip_stable<T: QuantizerTraits>(min: f32, max: f32) {
        let span = max - min;
        let steps = 4096;
        for i in 0..=steps {
            let v = (min - 1.0) + (span + 2.0) * i as f32 / steps as f32;
            let first = T::from_float(v);
            let second = T::from_float(T::to_float(first));
            assert_eq!(first, second, "unstable round trip for {}", v);
        }
    }

    #[test]
    fn test_q1_7() {
        type T = QTraits<1, 7>;
        assert_eq!(T::MIN, -1.0);
        assert!((T::MAX - 0.992188).abs() < 0.0001);

        check::<T>(-2.000, 0b1000_0000, -1.0);
        check::<T>(-1.000, 0b1000_0000, -1.0);
        check::<T>(-0.992, 0b1000_0001, -0.992188);
        check::<T>(-0.006, 0b1111_1111, -0.0078125);
        check::<T>(0.000, 0b0000_0000, 0.0);
        check::<T>(0.008, 0b0000_0001, 0.0078125);
        check::<T>(0.992, 0b0111_1111, 0.992188);
        check::<T>(2.000, 0b0111_1111, 0.992188);

        assert_eq!(T::to_float(0x80), -1.0);
    }

    #[test]
    fn test_uq1_7() {
        type T = UQTraits<1, 7>;
        check::<T>(-1.0, 0b0000_0000, 0.0);
        check::<T>(0.0, 0b0000_0000, 0.0);
        check::<T>(1.0, 0b1000_0000, 1.0);
        check::<T>(1.992, 0b1111_1111, 1.99219);
        check::<T>(2.0, 0b1111_1111, 1.99219);
    }

    #[test]
    fn test_masked_and_sign_extended_formats() {
        check::<UQTraits<4, 8>>(0.0, 0x000, 0.0);
        check::<UQTraits<4, 8>>(16.0, 0xfff, 15.9961);

        check::<QTraits<5, 4>>(-16.0, 0x100, -16.0);
        check::<QTraits<5, 4>>(15.94, 0x0ff, 15.9375);

        check::<UQTraits<5, 8>>(0.0, 0x0000, 0.0);
        check::<UQTraits<5, 8>>(32.0, 0x1fff, 31.9961);

        check::<QTraits<12, 4>>(0.0, 0x0000, 0.0);
        check::<QTraits<12, 4>>(7.5, 0x0078, 7.5);
        check::<UQTraits<12, 4>>(7.5, 0x0078, 7.5);

        check::<QTraits<4, 20>>(-9.0, 0x80_0000, -8.0);
        check::<QTraits<4, 20>>(-8.0, 0x80_0000, -8.0);
        check::<QTraits<4, 20>>(8.0, 0x7f_ffff, 8.0);
        check::<QTraits<4, 20>>(9.0, 0x7f_ffff, 8.0);

        check::<UQTraits<4, 20>>(-1.0, 0x00_0000, 0.0);
        check::<UQTraits<4, 20>>(16.0, 0xff_ffff, 16.0);
        check::<UQTraits<4, 20>>(20.0, 0xff_ffff, 16.0);
    }

    #[test]
    fn test_q4_7_register_codes() {
        type T = FixedPoint<4, 7, i16>;
        for (input, expected) in [
            (7.992, 0x3ff),
            (0.2, 0x01a),
            (-0.2, 0x7e6),
            (-0.8, 0x79a),
            (-0.4, 0x7cd),
            (-1.4, 0x74d),
            (-8.0, 0x400),
            (0.0, 0x000),
        ] {
            let code = T::encode(input);
            assert_eq!(code, expected, "{} encoded to {:#x}", input, code);
            assert!((T::decode(code) - input).abs() <= 0.005);
        }

        // Bits above the format width do not leak into the value.
        assert!((T::decode(0xbff) - 7.992).abs() <= 1.0 / 128.0);
    }

    #[test]
    fn test_out_of_range_clamps_to_limits() {
        type S = QTraits<4, 4>;
        type U = UQTraits<4, 4>;
        assert_eq!(S::from_float(-1000.0), S::q_min());
        assert_eq!(S::from_float(1000.0), S::q_max());
        assert_eq!(U::from_float(-1000.0), U::q_min());
        assert_eq!(U::from_float(1000.0), U::q_max());
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        check::<UQTraits<8, 0>>(2.5, 3, 3.0);
        check::<QTraits<8, 0>>(-2.5, 0xfd, -3.0);
        check::<QTraits<8, 0>>(2.4999, 2, 2.0);
        check::<QTraits<1, 7>>(1.5 / 128.0, 2, 2.0 / 128.0);
        check::<QTraits<1, 7>>(-1.5 / 128.0, 0xfe, -2.0 / 128.0);
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        assert_round_trip_stable::<QTraits<1, 7>>(QTraits::<1, 7>::MIN, QTraits::<1, 7>::MAX);
        assert_round_trip_stable::<UQTraits<1, 7>>(UQTraits::<1, 7>::MIN, UQTraits::<1, 7>::MAX);
        assert_round_trip_stable::<QTraits<4, 7>>(QTraits::<4, 7>::MIN, QTraits::<4, 7>::MAX);
        assert_round_trip_stable::<UQTraits<4, 12>>(UQTraits::<4, 12>::MIN, UQTraits::<4, 12>::MAX);
        assert_round_trip_stable::<QTraits<12, 4>>(QTraits::<12, 4>::MIN, QTraits::<12, 4>::MAX);
        assert_round_trip_stable::<UQTraits<0, 13>>(UQTraits::<0, 13>::MIN, UQTraits::<0, 13>::MAX);
        assert_round_trip_stable::<QTraits<4, 20>>(QTraits::<4, 20>::MIN, QTraits::<4, 20>::MAX);
        assert_round_trip_stable::<UQTraits<4, 20>>(UQTraits::<4, 20>::MIN, UQTraits::<4, 20>::MAX);
    }

    #[test]
    fn test_storage_selection() {
        assert_eq!(storage_of::<QTraits<4, 4>>(), TypeId::of::<u8>());
        assert_eq!(storage_of::<UQTraits<4, 4>>(), TypeId::of::<u8>());
        assert_eq!(storage_of::<QTraits<8, 8>>(), TypeId::of::<u16>());
        assert_eq!(storage_of::<UQTraits<8, 8>>(), TypeId::of::<u16>());
        assert_eq!(storage_of::<QTraits<4, 5>>(), TypeId::of::<u16>());
        assert_eq!(storage_of::<QTraits<20, 4>>(), TypeId::of::<u32>());
        assert_eq!(storage_of::<UQTraits<20, 4>>(), TypeId::of::<u32>());
        assert!(QTraits::<20, 4>::is_signed());
        assert!(!UQTraits::<20, 4>::is_signed());
    }

    #[test]
    fn test_min_code_survives_widening() {
        fn widen_and_back<const I: u32, const F: u32>()
        where
            Format<I, F>: SelectStorage,
        {
            let min = Q::<I, F>::from_float(QTraits::<I, F>::MIN);
            let reg: u32 = min.quantized().into();
            assert_eq!(reg, QTraits::<I, F>::Q_MIN, "sign extended on widening");
            assert_eq!(Q::<I, F>::from_quantized(min.quantized()), min);
        }

        widen_and_back::<2, 4>();
        widen_and_back::<4, 4>();
        widen_and_back::<8, 8>();
        widen_and_back::<4, 20>();

        let min = Q::<4, 4>::from_float(-8.0);
        assert_eq!(min.quantized() as u16, 0x0080);
    }
}
