//! thin façade over `candle_core`: the device/dtype choices shared by every
//! module that builds a differentiable tensor, so they don't each pick their
//! own.

use candle_core::{DType, Device, Result, Tensor};

/// every tensor in this crate is built on the CPU in `f64` — branch-length
/// and rate gradients need the precision, and nothing here is large enough
/// to want a GPU.
pub fn device() -> Device {
    Device::Cpu
}

pub const DTYPE: DType = DType::F64;

pub fn scalar(value: f64) -> Result<Tensor> {
    Tensor::new(value, &device())
}

pub fn zeros(shape: &[usize]) -> Result<Tensor> {
    Tensor::zeros(shape, DTYPE, &device())
}

pub fn eye(n: usize) -> Result<Tensor> {
    Tensor::eye(n, DTYPE, &device())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_has_expected_dtype() {
        let t = scalar(1.5).unwrap();
        assert_eq!(t.dtype(), DTYPE);
    }
}
