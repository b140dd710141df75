use std::fmt::Debug;

use crate::types::{Backend, Place};

/// The device a kernel runs against. Kernels are generic over it so one
/// algorithm serves every backend it is registered for.
pub trait DeviceContext: Debug {
    fn place(&self) -> Place;

    fn backend(&self) -> Backend {
        self.place().backend()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CpuContext;

impl CpuContext {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceContext for CpuContext {
    fn place(&self) -> Place {
        Place::Cpu
    }
}

/// A plug-in device. Its memory is host memory here; only dispatch differs.
#[derive(Debug, Clone)]
pub struct CustomContext {
    device_type: String,
    id: usize,
}

impl CustomContext {
    pub fn new(device_type: impl Into<String>, id: usize) -> Self {
        Self {
            device_type: device_type.into(),
            id,
        }
    }
}

impl DeviceContext for CustomContext {
    fn place(&self) -> Place {
        Place::Custom {
            device_type: self.device_type.clone(),
            id: self.id,
        }
    }
}
