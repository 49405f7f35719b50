//! Participant picture compression

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use tokio::task;

use crate::domains::registration::types::ImageBytes;
use crate::errors::{DomainError, DomainResult};

/// Downscales the picture so its longest side fits `max_dimension` and re-encodes it as JPEG.
pub async fn compress_raw_image(image: ImageBytes, max_dimension: u32, quality: u8) -> DomainResult<ImageBytes> {
    let quality = quality.clamp(1, 100);
    let original_size = image.len();

    // Run image operations in a blocking task to avoid blocking the runtime
    let compressed = task::spawn_blocking(move || -> DomainResult<Vec<u8>> {
        let img = image::load_from_memory(image.as_slice())
            .map_err(|e| DomainError::Compression(format!("Failed to load image: {}", e)))?;
        encode_jpeg(fit_within(img, max_dimension), quality)
    })
    .await
    .map_err(|e| DomainError::Internal(format!("Task join error: {}", e)))??;

    log::debug!("Compressed participant picture {} -> {} bytes", original_size, compressed.len());
    Ok(ImageBytes(compressed))
}

fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Triangle)
}

fn encode_jpeg(img: DynamicImage, quality: u8) -> DomainResult<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| DomainError::Compression(format!("JPEG encoding error: {}", e)))?;
    Ok(output)
}
