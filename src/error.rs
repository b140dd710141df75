use thiserror::Error;

use crate::{identity::Id, types::DataType};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("value {0:?} is not defined in this graph")]
    InvalidValue(Id),

    #[error("{op}: expected {expected}, got {actual}")]
    TypeMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{op}: axis {axis} is out of range for rank {rank}")]
    InvalidAxis {
        op: &'static str,
        axis: i64,
        rank: usize,
    },

    #[error("{op}: shape mismatch: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<i64>,
        rhs: Vec<i64>,
    },

    #[error("{op}: dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch {
        op: &'static str,
        expected: DataType,
        actual: DataType,
    },

    #[error("{op}: dtype {dtype} is not supported")]
    UnsupportedDtype { op: &'static str, dtype: DataType },

    #[error("tensor can not be viewed: {0}")]
    NotViewable(String),

    #[error("{op}: index {index} is out of range for length {len}")]
    IndexOutOfRange {
        op: &'static str,
        index: i64,
        len: usize,
    },

    #[error("{op}: array slot {index} is not initialized")]
    UninitializedSlot { op: &'static str, index: usize },

    #[error("no kernel `{name}` registered for {key}")]
    KernelNotFound { name: String, key: String },

    #[error("kernel `{name}`: {reason}")]
    KernelArgs { name: &'static str, reason: String },

    #[error("parameter `{0}` is not declared")]
    UnknownParameter(String),

    #[error("value {0:?} has not been computed")]
    MissingValue(Id),

    #[error("program expects {expected} feeds, got {actual}")]
    FeedCount { expected: usize, actual: usize },

    #[error("value {id:?} does not match its type: expected {expected}, got {actual}")]
    RuntimeType {
        id: Id,
        expected: String,
        actual: String,
    },

    #[error("{0}")]
    Invalid(String),
}
