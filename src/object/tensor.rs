use std::fmt;
use std::sync::Arc;

use crate::ir::{DType, TensorType, Type};

#[derive(Debug)]
struct TensorData {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Shared handle to dense tensor storage.
///
/// Clones share storage; use [`Tensor::ptr_eq`] to test identity.
#[derive(Clone)]
pub struct Tensor(Arc<TensorData>);

impl Tensor {
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(
            numel,
            data.len(),
            "tensor of shape {:?} needs {} elements",
            shape,
            numel
        );
        Self(Arc::new(TensorData {
            dtype: DType::Float32,
            shape,
            data,
        }))
    }

    pub fn full(shape: Vec<usize>, value: f32) -> Self {
        let numel = shape.iter().product();
        Self::from_vec(shape, vec![value; numel])
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn dtype(&self) -> DType {
        self.0.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.0.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.0.data
    }

    pub fn numel(&self) -> usize {
        self.0.data.len()
    }

    /// Fully refined type of this tensor.
    pub fn ty(&self) -> Type {
        Type::Tensor(TensorType::new(self.0.dtype, self.0.shape.clone()))
    }

    pub fn ptr_eq(a: &Tensor, b: &Tensor) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({})", self.ty())
    }
}
