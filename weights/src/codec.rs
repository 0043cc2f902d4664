use bytemuck::Pod;
use half::{bf16, f16};
use safetensors::Dtype;

use crate::{Result, WeightsErr};

/// Decodes a little-endian tensor buffer into `f32` values.
///
/// # Arguments
/// * `name` - The tensor's name, for error reporting.
/// * `dtype` - The stored element type.
/// * `data` - The raw bytes.
///
/// # Returns
/// The widened values or an error if the dtype isn't a float or the buffer is truncated.
pub fn decode_f32(name: &str, dtype: Dtype, data: &[u8]) -> Result<Vec<f32>> {
    match dtype {
        Dtype::F32 => decode_le::<f32, 4>(name, data, f32::from_le_bytes, |v| v),
        Dtype::F16 => decode_le::<f16, 2>(name, data, f16::from_le_bytes, f16::to_f32),
        Dtype::BF16 => decode_le::<bf16, 2>(name, data, bf16::from_le_bytes, bf16::to_f32),
        Dtype::F64 => decode_le::<f64, 8>(name, data, f64::from_le_bytes, |v| v as f32),
        other => Err(WeightsErr::UnsupportedDtype(format!("{other:?}"))),
    }
}

/// Encodes `f32` values as a little-endian buffer.
pub fn encode_f32(values: &[f32]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        return bytemuck::cast_slice(values).to_vec();
    }

    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_le<T: Pod, const N: usize>(
    name: &str,
    data: &[u8],
    from_le: fn([u8; N]) -> T,
    widen: fn(T) -> f32,
) -> Result<Vec<f32>> {
    if data.len() % N != 0 {
        return Err(WeightsErr::CorruptTensor {
            name: name.to_string(),
            len: data.len(),
            width: N,
        });
    }

    // Zero-copy when the buffer happens to be aligned for `T`.
    if cfg!(target_endian = "little") {
        if let Ok(values) = bytemuck::try_cast_slice::<u8, T>(data) {
            return Ok(values.iter().map(|&v| widen(v)).collect());
        }
    }

    Ok(data
        .chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0; N];
            bytes.copy_from_slice(chunk);
            widen(from_le(bytes))
        })
        .collect())
}
