//! Sample types and generic floats
//!
//! Streams store one of a fixed set of numeric kinds (see [`NumericKind`]).
//! The [`Sample`] trait is implemented by the corresponding Rust types and
//! is used as bound on [`SampleBuffer`] and the pipeline components.
//!
//! This module also provides a [`Float`] trait, which is implemented by
//! [`f32`] and [`f64`], for math that works at either precision.
//!
//! [`SampleBuffer`]: crate::buffer::SampleBuffer

use rustfft::FftNum;
use serde::{Deserialize, Serialize};

use std::fmt::Debug;
use std::marker::{Send, Sync};

pub use num::Complex;

/// Storage kind of the values in a sample stream
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum NumericKind {
    /// 8-bit signed integer
    Byte,
    /// 16-bit signed integer (e.g. PCM audio)
    Short,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit float (e.g. normalized audio, sensor readings)
    Float,
    /// 64-bit float
    Double,
}

impl NumericKind {
    /// Storage width of one value in bytes
    pub fn width(self) -> usize {
        match self {
            NumericKind::Byte => 1,
            NumericKind::Short => 2,
            NumericKind::Int | NumericKind::Float => 4,
            NumericKind::Long | NumericKind::Double => 8,
        }
    }
    /// True for integer kinds
    pub fn is_integer(self) -> bool {
        !matches!(self, NumericKind::Float | NumericKind::Double)
    }
    /// Largest magnitude representable by an integer kind (`1.0` for floats)
    ///
    /// Used to map integer PCM values into the range `-1.0..=1.0`.
    pub fn full_scale(self) -> f64 {
        match self {
            NumericKind::Byte => -(i8::MIN as f64),
            NumericKind::Short => -(i16::MIN as f64),
            NumericKind::Int => -(i32::MIN as f64),
            NumericKind::Long => -(i64::MIN as f64),
            NumericKind::Float | NumericKind::Double => 1.0,
        }
    }
}

/// Value type that can be stored in a sample stream
pub trait Sample: Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    /// Numeric kind of this type
    const KIND: NumericKind;
    /// Convert to `f64`
    fn to_f64(self) -> f64;
    /// Convert from `f64`, rounding and saturating for integer kinds
    fn from_f64(value: f64) -> Self;
    /// Convert to `f32`
    fn to_f32(self) -> f32 {
        self.to_f64() as f32
    }
}

macro_rules! impl_int_sample {
    ($t:ty, $kind:ident) => {
        impl Sample for $t {
            const KIND: NumericKind = NumericKind::$kind;
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(value: f64) -> Self {
                // `as` saturates and maps NaN to zero
                value.round() as $t
            }
        }
    };
}

impl_int_sample!(i8, Byte);
impl_int_sample!(i16, Short);
impl_int_sample!(i32, Int);
impl_int_sample!(i64, Long);

impl Sample for f32 {
    const KIND: NumericKind = NumericKind::Float;
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value as f32
    }
    fn to_f32(self) -> f32 {
        self
    }
}

impl Sample for f64 {
    const KIND: NumericKind = NumericKind::Double;
    fn to_f64(self) -> f64 {
        self
    }
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Trait implemented for [`f32`] and [`f64`]
///
/// This trait is used as bound on functions which support single and double
/// precision calculations.
///
/// See [`flt!`] for an example on how to write functions working with generic
/// floats (i.e. `f32` or `f64`, depending on the caller's choice).
///
/// [`flt!`]: crate::flt
pub trait Float
where
    Self: 'static + Send + Sync,
    Self: num::traits::Float,
    Self: num::traits::FloatConst,
    Self: num::traits::NumAssignOps,
    Self: FftNum,
{
}
impl<T> Float for T
where
    T: 'static + Send + Sync,
    T: num::traits::Float,
    T: num::traits::FloatConst,
    T: num::traits::NumAssignOps,
    T: FftNum,
{
}

/// Macro to convert number into a generic [`Float`] type, which must be in
/// scope as "`Flt`"
///
/// # Example
///
/// ```
/// use ssj_core::{flt, numbers::Float};
///
/// fn generic_double<Flt: Float>(arg: Flt) -> Flt {
///     arg * flt!(2)
/// }
/// ```
#[macro_export]
macro_rules! flt {
    ($x:expr) => {
        Flt::from($x).expect("could not convert number into float")
    };
}
