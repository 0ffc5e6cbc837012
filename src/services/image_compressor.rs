use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::config::MediaSettings;
use crate::schema::CompressionResult;

pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";

const QUALITY_STEP: u8 = 10;
const QUALITY_FLOOR: u8 = 20;
const SHRINK_BELOW_QUALITY: u8 = 50;
const MIN_SHRINK_WIDTH: u32 = 400;
const SHRINK_FACTOR: f32 = 0.75;

#[derive(Debug, Clone, Copy)]
pub struct ImageCompressor {
    pub max_width: u32,
    pub quality: u8,
    pub max_size_kb: usize,
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self::from(MediaSettings::default())
    }
}

impl From<MediaSettings> for ImageCompressor {
    fn from(settings: MediaSettings) -> Self {
        Self {
            max_width: settings.max_width,
            quality: settings.quality,
            max_size_kb: settings.max_size_kb,
        }
    }
}

impl ImageCompressor {
    /// Re-encodes to JPEG under the size budget. Any decoder or encoder failure
    /// returns the original bytes untouched.
    pub fn compress(&self, original: &[u8]) -> CompressionResult {
        match self.try_compress(original) {
            Ok(result) => {
                tracing::info!(
                    original = result.original_size,
                    compressed = result.final_size,
                    passes = result.passes,
                    "image compressed"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = original.len(), "compression failed, sending original");
                CompressionResult::uncompressed(original, &sniff_content_type(original), e.to_string())
            }
        }
    }

    fn try_compress(&self, original: &[u8]) -> Result<CompressionResult, image::ImageError> {
        let source = image::load_from_memory(original)?;
        let budget = self.max_size_kb.saturating_mul(1024);

        let mut quality = self.quality.clamp(1, 100);
        let mut width = source.width().min(self.max_width.max(1));
        let mut encoded = encode_jpeg(&source, width, quality)?;
        let mut passes = 1;

        while encoded.len() > budget {
            let Some(next_quality) = quality
                .checked_sub(QUALITY_STEP)
                .filter(|q| *q >= QUALITY_FLOOR)
            else {
                break;
            };
            quality = next_quality;
            if quality < SHRINK_BELOW_QUALITY && width > MIN_SHRINK_WIDTH {
                width = ((width as f32) * SHRINK_FACTOR) as u32;
            }
            encoded = encode_jpeg(&source, width, quality)?;
            passes += 1;
            tracing::debug!(quality, width, bytes = encoded.len(), "compression step");
        }

        if encoded.len() > budget {
            tracing::warn!(
                bytes = encoded.len(),
                budget,
                "image still over budget at quality floor"
            );
        }

        Ok(CompressionResult {
            original_size: original.len(),
            final_size: encoded.len(),
            bytes: encoded,
            content_type: OUTPUT_CONTENT_TYPE.to_string(),
            compressed: true,
            passes,
            fallback_reason: None,
        })
    }
}

fn encode_jpeg(source: &DynamicImage, width: u32, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let resized = if width < source.width() {
        let height = ((source.height() as u64 * width as u64) / source.width() as u64).max(1) as u32;
        source.resize_exact(width, height, FilterType::Triangle)
    } else {
        source.clone()
    };

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

fn sniff_content_type(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::testing::{flat_png, noisy_png};
    use super::*;

    fn decoded_width(bytes: &[u8]) -> u32 {
        image::load_from_memory(bytes).unwrap().width()
    }

    #[test]
    fn small_image_passes_in_one_encode() {
        let input = flat_png(300, 200);
        let result = ImageCompressor::default().compress(&input);
        assert!(result.compressed);
        assert_eq!(result.passes, 1);
        assert_eq!(result.content_type, OUTPUT_CONTENT_TYPE);
        assert_eq!(result.final_size, result.bytes.len());
        assert_eq!(result.original_size, input.len());
        assert_eq!(decoded_width(&result.bytes), 300, "never upscales");
    }

    #[test]
    fn huge_budget_does_not_overflow() {
        let compressor = ImageCompressor {
            max_size_kb: usize::MAX,
            ..ImageCompressor::default()
        };
        let result = compressor.compress(&flat_png(50, 50));
        assert!(result.compressed);
        assert_eq!(result.passes, 1);
    }

    #[test]
    fn wide_image_is_resized_to_max_width() {
        let input = flat_png(1600, 400);
        let result = ImageCompressor::default().compress(&input);
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(decoded.width(), 800);
        assert_eq!(decoded.height(), 200);
    }

    #[test]
    fn noisy_image_steps_down_and_terminates() {
        let input = noisy_png(1200, 900);
        let compressor = ImageCompressor {
            max_width: 800,
            quality: 70,
            max_size_kb: 1,
        };
        let result = compressor.compress(&input);
        assert!(result.compressed);
        // 70 -> 60 -> 50 -> 40 -> 30 -> 20, then the floor stops the loop
        assert_eq!(result.passes, 6);
        // width shrinks on the passes at quality 40, 30 and 20: 800 -> 600 -> 450 -> 337
        assert_eq!(decoded_width(&result.bytes), 337);
        assert!(result.final_size < input.len());
    }

    #[test]
    fn stops_as_soon_as_budget_is_met() {
        let input = noisy_png(800, 600);
        let generous = ImageCompressor {
            max_width: 800,
            quality: 70,
            max_size_kb: 10_000,
        };
        assert_eq!(generous.compress(&input).passes, 1);
    }

    #[test]
    fn invalid_bytes_fall_back_to_original() {
        let input = b"definitely not an image".to_vec();
        let result = ImageCompressor::default().compress(&input);
        assert!(!result.compressed);
        assert_eq!(result.bytes, input);
        assert_eq!(result.content_type, "application/octet-stream");
        assert!(result.fallback_reason.is_some());
        assert_eq!(result.original_size, result.final_size);
    }

    #[test]
    fn truncated_png_falls_back_with_sniffed_type() {
        let mut input = flat_png(64, 64);
        input.truncate(40);
        let result = ImageCompressor::default().compress(&input);
        assert!(!result.compressed);
        assert_eq!(result.bytes, input);
        assert_eq!(result.content_type, "image/png");
    }
}
