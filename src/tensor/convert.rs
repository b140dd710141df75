use ndarray::{ArrayD, IxDyn};

use crate::{
    error::{Error, Result},
    tensor::{DenseTensor, Element},
};

pub type TensorData<T = f32> = ArrayD<T>;

impl DenseTensor {
    pub fn from_ndarray<T: Element>(data: &TensorData<T>) -> Result<Self> {
        let flat: Vec<T> = data.iter().copied().collect();
        Self::from_vec(flat, data.shape())
    }

    pub fn to_ndarray<T: Element>(&self) -> Result<TensorData<T>> {
        let flat = self.to_vec::<T>()?;
        ArrayD::from_shape_vec(IxDyn(self.dims()), flat).map_err(|e| Error::Invalid(e.to_string()))
    }
}
