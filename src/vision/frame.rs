use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::Result;

/// Decodes a base64 payload, tolerating a `data:*;base64,` prefix.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let raw = match payload.split_once(";base64,") {
        Some((_, data)) => data,
        None => payload,
    };
    Ok(STANDARD.decode(raw.trim())?)
}

/// Decodes an encoded image (PNG, JPEG, ...) into RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Resizes to the model input shape exactly. Aspect ratio is not preserved.
pub fn to_model_input(image: &RgbImage, (width, height): (u32, u32)) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}
