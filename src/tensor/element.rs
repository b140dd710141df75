use std::ops::AddAssign;

use half::{bf16, f16};
use num_traits::{NumCast, One, ToPrimitive, Zero};

use crate::types::DataType;

/// A Rust scalar that can be stored in a `DenseTensor`.
pub trait Element: bytemuck::Pod + std::fmt::Debug + PartialEq + Send + Sync + 'static {
    const DTYPE: DataType;
}

/// Elements that kernels can do arithmetic on.
pub trait Numeric: Element + NumCast + ToPrimitive + Zero + One + AddAssign {}

macro_rules! element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dtype;
            }
            impl Numeric for $ty {}
        )*
    };
}

element!(
    u8 => UInt8,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f16 => Float16,
    bf16 => BFloat16,
    f32 => Float32,
    f64 => Float64,
);

/// Runs `$body` with `$T` bound to the Rust type of a numeric `$dtype`.
/// `bool` has no arithmetic and yields `Error::UnsupportedDtype`.
macro_rules! dispatch_numeric {
    ($dtype:expr, $op:expr, |$T:ident| $body:expr) => {{
        use $crate::types::DataType;
        match $dtype {
            DataType::UInt8 => {
                type $T = u8;
                $body
            }
            DataType::Int8 => {
                type $T = i8;
                $body
            }
            DataType::Int16 => {
                type $T = i16;
                $body
            }
            DataType::Int32 => {
                type $T = i32;
                $body
            }
            DataType::Int64 => {
                type $T = i64;
                $body
            }
            DataType::Float16 => {
                type $T = half::f16;
                $body
            }
            DataType::BFloat16 => {
                type $T = half::bf16;
                $body
            }
            DataType::Float32 => {
                type $T = f32;
                $body
            }
            DataType::Float64 => {
                type $T = f64;
                $body
            }
            DataType::Bool => Err($crate::Error::UnsupportedDtype {
                op: $op,
                dtype: DataType::Bool,
            }),
        }
    }};
}

pub(crate) use dispatch_numeric;
