use std::path::Path;

use image::{
    GrayImage,
    imageops::{self, FilterType},
};
use machine_learning::{MlErr, registry::IMAGE_SIDE};
use ndarray::{Array, ArrayD, IxDyn};

use crate::{PipelineError, Result};

/// Turns a digit picture into a model input.
///
/// The picture is converted to grayscale and inverted, so a dark digit on a light background
/// becomes the light-on-dark digits the classifiers were trained on, then resized to the model
/// side with a Lanczos filter and scaled into `[0, 1]`.
///
/// # Arguments
/// * `path` - The picture.
/// * `shape` - The shape of the batch to produce, holding exactly one image worth of pixels.
pub fn load_digit(path: &Path, shape: &[usize]) -> Result<ArrayD<f32>> {
    let gray = image::open(path)?.to_luma8();
    digit_from_gray(gray, shape)
}

pub(crate) fn digit_from_gray(mut gray: GrayImage, shape: &[usize]) -> Result<ArrayD<f32>> {
    imageops::invert(&mut gray);
    let side = IMAGE_SIDE as u32;
    let resized = imageops::resize(&gray, side, side, FilterType::Lanczos3);

    let pixels: Vec<f32> = resized.into_raw().into_iter().map(|p| p as f32 / 255.).collect();
    let expected: usize = shape.iter().product();

    if pixels.len() != expected {
        return Err(PipelineError::InvalidConfig(format!(
            "an image has {} pixels, the model takes {expected} values per batch {shape:?}",
            pixels.len()
        )));
    }

    Ok(Array::from_shape_vec(IxDyn(shape), pixels).map_err(MlErr::from)?)
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    #[test]
    fn inverts_and_scales() {
        let white = GrayImage::from_pixel(56, 56, Luma([255]));
        let x = digit_from_gray(white, &[1, 28, 28]).unwrap();

        assert_eq!(x.shape(), &[1, 28, 28]);
        assert!(x.iter().all(|&p| p.abs() < 1e-6));

        let black = GrayImage::from_pixel(14, 14, Luma([0]));
        let x = digit_from_gray(black, &[1, 28, 28, 1]).unwrap();
        assert!(x.iter().all(|&p| (p - 1.).abs() < 1e-6));
    }

    #[test]
    fn rejects_shapes_of_another_size() {
        let img = GrayImage::new(28, 28);
        assert!(digit_from_gray(img, &[1, 32, 32]).is_err());
    }

    #[test]
    fn reads_pictures_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digit.png");
        GrayImage::from_pixel(28, 28, Luma([0])).save(&path).unwrap();

        let x = load_digit(&path, &[1, 28, 28]).unwrap();
        assert!(x.iter().all(|&p| (p - 1.).abs() < 1e-6));

        assert!(load_digit(&dir.path().join("none.png"), &[1, 28, 28]).is_err());
    }
}
