//! Image preprocessing: letterbox resize onto a square canvas and conversion
//! to the NCHW tensor layout the image model expects.
//!
//! Images are never stretched. The longer side is scaled to the target size,
//! the shorter side keeps its aspect ratio, and the result is pasted centred
//! onto a black canvas. Pixel values stay in the raw 0-255 range; the
//! exported model graph was trained on unnormalized inputs.

use image::{imageops, DynamicImage, RgbImage};
use ndarray::Array4;

/// Letterbox an image onto a black square canvas of the given size.
///
/// Alpha, palette, and grayscale inputs are normalized to 3-channel RGB
/// before resizing.
pub fn letterbox(img: &DynamicImage, size: u32) -> RgbImage {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    // Guard degenerate inputs; a decoded image is never 0x0 but the scale
    // must not divide by zero.
    let longest = width.max(height).max(1);
    let scale = size as f32 / longest as f32;

    let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(&rgb, new_width, new_height, imageops::FilterType::Triangle);

    let mut canvas = RgbImage::new(size, size);
    let x_offset = (size - new_width) / 2;
    let y_offset = (size - new_height) / 2;
    imageops::replace(&mut canvas, &resized, x_offset as i64, y_offset as i64);

    canvas
}

/// Convert an RGB canvas to a `(1, 3, H, W)` f32 tensor, channel-first.
pub fn to_tensor(canvas: &RgbImage) -> Array4<f32> {
    let (width, height) = canvas.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = pixel[0] as f32;
        tensor[[0, 1, y, x]] = pixel[1] as f32;
        tensor[[0, 2, y, x]] = pixel[2] as f32;
    }

    tensor
}

/// Full preprocessing step: letterbox to `size` and convert to a tensor of
/// shape `(1, 3, size, size)`.
pub fn process_image(img: &DynamicImage, size: u32) -> Array4<f32> {
    to_tensor(&letterbox(img, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        let img = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_tensor_shape_is_canvas_shape() {
        for (w, h) in [(50, 100), (100, 50), (224, 224), (1000, 10), (3, 7)] {
            let tensor = process_image(&solid(w, h, 128), 224);
            assert_eq!(tensor.dim(), (1, 3, 224, 224), "input {}x{}", w, h);
        }
    }

    #[test]
    fn test_degenerate_one_pixel_image() {
        let tensor = process_image(&solid(1, 1, 255), 224);
        assert_eq!(tensor.dim(), (1, 3, 224, 224));
    }

    #[test]
    fn test_portrait_image_is_centred_with_black_padding() {
        // 50x100 scales to 112x224: columns [56, 168) carry the image,
        // everything else is padding.
        let canvas = letterbox(&solid(50, 100, 200), 224);
        assert_eq!(canvas.dimensions(), (224, 224));

        assert_eq!(canvas.get_pixel(0, 112), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(223, 112), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(112, 0), &Rgb([200, 200, 200]));
        assert_eq!(canvas.get_pixel(112, 223), &Rgb([200, 200, 200]));
        assert_eq!(canvas.get_pixel(112, 112), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_all_black_image_yields_black_canvas() {
        let tensor = process_image(&solid(50, 100, 0), 224);
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_tensor_values_are_raw_pixels() {
        // A square image fills the whole canvas, so every value is the
        // raw pixel intensity.
        let tensor = process_image(&solid(64, 64, 37), 224);
        assert!(tensor.iter().all(|&v| v == 37.0));
    }

    #[test]
    fn test_rgba_input_is_normalized_to_rgb() {
        let rgba = image::RgbaImage::from_pixel(10, 10, image::Rgba([5, 6, 7, 128]));
        let tensor = process_image(&DynamicImage::ImageRgba8(rgba), 224);
        assert_eq!(tensor.dim(), (1, 3, 224, 224));
    }
}
