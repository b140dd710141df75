use std::collections::HashMap;

use crate::{
    config::ExecutorConfig,
    error::{Error, Result},
    identity::Id,
    kernels::{CpuContext, DeviceContext},
    tensor::{DenseTensor, RuntimeValue, TensorArray},
};

/// Run-time state: computed values, the parameter scope and the device the
/// kernels dispatch on.
#[derive(Debug)]
pub struct Context {
    pub values: HashMap<Id, RuntimeValue>,
    parameters: HashMap<String, DenseTensor>,
    device: Box<dyn DeviceContext>,
    config: ExecutorConfig,
}

impl Context {
    pub fn new() -> Self {
        Self::with_device(CpuContext::new(), ExecutorConfig::default())
    }

    pub fn with_device(device: impl DeviceContext + 'static, config: ExecutorConfig) -> Self {
        Self {
            values: HashMap::new(),
            parameters: HashMap::new(),
            device: Box::new(device),
            config,
        }
    }

    pub fn device(&self) -> &dyn DeviceContext {
        self.device.as_ref()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn insert(&mut self, id: Id, value: impl Into<RuntimeValue>) {
        self.values.insert(id, value.into());
    }

    pub fn checked_get(&self, id: &Id) -> Result<&RuntimeValue> {
        self.values.get(id).ok_or(Error::MissingValue(*id))
    }

    pub fn tensor(&self, id: &Id, op: &'static str) -> Result<&DenseTensor> {
        self.checked_get(id)?.as_tensor(op)
    }

    pub fn array(&self, id: &Id, op: &'static str) -> Result<&TensorArray> {
        self.checked_get(id)?.as_array(op)
    }

    pub fn parameter(&self, name: &str) -> Result<&DenseTensor> {
        self.parameters
            .get(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: DenseTensor) {
        self.parameters.insert(name.into(), value);
    }

    /// Drops computed values; parameters survive across runs.
    pub fn clear_values(&mut self) {
        self.values.clear();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
