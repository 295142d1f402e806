//! Image preprocessing ahead of OCR.
//!
//! Classical operations that help text recognition on photographed cards:
//! - Upscaling of small images
//! - Grayscale conversion
//! - Gaussian adaptive thresholding
//! - Morphological opening

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology;

/// Images with either side below this are upscaled 2x.
pub const MIN_DIMENSION: u32 = 600;
/// Neighbourhood size for adaptive thresholding (odd).
pub const THRESHOLD_BLOCK_SIZE: u32 = 31;
/// Constant subtracted from the weighted neighbourhood mean.
pub const THRESHOLD_OFFSET: f32 = 10.0;

/// Preprocess a decoded card image into a binarized image for OCR.
pub fn preprocess_image(input: &RgbImage) -> GrayImage {
    let upscaled = upscale_small(input);
    let gray = DynamicImage::ImageRgb8(upscaled).to_luma8();
    let binary = adaptive_threshold_gaussian(&gray, THRESHOLD_BLOCK_SIZE, THRESHOLD_OFFSET);
    // 1x1 structuring element: leaves the image unchanged
    morphology::open(&binary, Norm::LInf, 0)
}

/// Double both dimensions (cubic) when either side is below [`MIN_DIMENSION`].
pub fn upscale_small(input: &RgbImage) -> RgbImage {
    let (w, h) = input.dimensions();
    if w < MIN_DIMENSION || h < MIN_DIMENSION {
        imageops::resize(input, w * 2, h * 2, FilterType::CatmullRom)
    } else {
        input.clone()
    }
}

/// Binarize with a Gaussian-weighted local mean.
///
/// A pixel becomes white when it is brighter than the weighted mean of its
/// `block_size` neighbourhood minus `offset`, black otherwise. Sigma is
/// derived from the block size the way OpenCV does for its Gaussian kernel.
pub fn adaptive_threshold_gaussian(gray: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let sigma = gaussian_sigma(block_size);
    let local_mean = gaussian_blur_f32(gray, sigma);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let src = gray.get_pixel(x, y)[0] as f32;
        let threshold = local_mean.get_pixel(x, y)[0] as f32 - offset;
        if src > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

fn gaussian_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}
