//! JPEG encoding of raw camera frames
//!
//! Cameras usually publish uncompressed pixels (`mono8`, `rgb8`, `bgr8`).
//! [`JpegFrameEncoder`] compresses those at the requested quality, after
//! resizing to the requested `width`x`height` (when both are set) and
//! rotating 180 degrees for `invert`. Frames that already arrive as JPEG are
//! forwarded untouched.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};

use super::encoder::{EncodeOptions, EncoderFactory, FrameEncoder};
use crate::bus::ImageFrame;
use crate::error::{Error, Result};

/// Encodings accepted by [`JpegFrameEncoder`]
pub const SUPPORTED_ENCODINGS: &str = "jpeg, mono8, rgb8 or bgr8";

/// Raw-pixel to JPEG encoder for one session
#[derive(Debug, Clone)]
pub struct JpegFrameEncoder {
    options: EncodeOptions,
}

impl JpegFrameEncoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Factory building one encoder per session from its request options
    pub fn factory() -> EncoderFactory {
        std::sync::Arc::new(|options: &EncodeOptions| {
            Box::new(JpegFrameEncoder::new(options.clone())) as Box<dyn FrameEncoder>
        })
    }

    fn to_image(frame: &ImageFrame) -> Result<DynamicImage> {
        let (width, height) = (frame.width, frame.height);

        match frame.encoding.as_str() {
            "mono8" => {
                let pixels = raw_pixels(frame, 1)?;
                GrayImage::from_raw(width, height, pixels)
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| Error::Encode("mono8 buffer does not match dimensions".into()))
            }
            "rgb8" => {
                let pixels = raw_pixels(frame, 3)?;
                RgbImage::from_raw(width, height, pixels)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| Error::Encode("rgb8 buffer does not match dimensions".into()))
            }
            "bgr8" => {
                let mut pixels = raw_pixels(frame, 3)?;
                for pixel in pixels.chunks_exact_mut(3) {
                    pixel.swap(0, 2);
                }
                RgbImage::from_raw(width, height, pixels)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| Error::Encode("bgr8 buffer does not match dimensions".into()))
            }
            other => Err(Error::UnsupportedEncoding {
                expected: SUPPORTED_ENCODINGS,
                actual: other.to_string(),
            }),
        }
    }

    fn transform(&self, mut image: DynamicImage) -> DynamicImage {
        let EncodeOptions { width, height, .. } = self.options;
        if width > 0 && height > 0 && (width, height) != (image.width(), image.height()) {
            image = image.resize_exact(width, height, FilterType::Triangle);
        }
        if self.options.invert {
            image = image.rotate180();
        }
        image
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&mut self, frame: &ImageFrame) -> Result<Bytes> {
        if frame.encoding.eq_ignore_ascii_case("jpeg") {
            return Ok(frame.data.clone());
        }

        let image = self.transform(Self::to_image(frame)?);

        let mut out = Vec::with_capacity(frame.data.len() / 4);
        image.write_with_encoder(JpegEncoder::new_with_quality(&mut out, self.options.quality))?;
        Ok(Bytes::from(out))
    }
}

/// Copy exactly `width * height * channels` bytes out of `frame`
fn raw_pixels(frame: &ImageFrame, channels: usize) -> Result<Vec<u8>> {
    let expected = frame.width as usize * frame.height as usize * channels;
    if expected == 0 || frame.data.len() < expected {
        return Err(Error::Encode(format!(
            "{} frame of {}x{} needs {} bytes, got {}",
            frame.encoding,
            frame.width,
            frame.height,
            expected,
            frame.data.len()
        )));
    }
    Ok(frame.data[..expected].to_vec())
}
