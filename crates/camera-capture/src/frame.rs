//! Still frame types and encoding

use crate::CameraError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed RGB, 3 bytes per pixel
    Rgb24,
    /// Already JPEG-compressed
    Mjpeg,
}

/// One still frame from a camera
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel data, layout depends on `format`
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Data layout
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds since epoch)
    pub timestamp_ns: u64,
    /// Per-camera sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a frame from raw RGB data
    pub fn rgb(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "RGB buffer has {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            format: PixelFormat::Rgb24,
            timestamp_ns: now_ns(),
            sequence,
        })
    }

    /// Wrap an already-compressed JPEG. Dimensions come from its header.
    pub fn jpeg(data: Vec<u8>, sequence: u32) -> Result<Self, CameraError> {
        let (width, height) = ImageReader::with_format(Cursor::new(&data), ImageFormat::Jpeg)
            .into_dimensions()
            .map_err(|e| CameraError::Format(e.to_string()))?;

        Ok(Self {
            data,
            width,
            height,
            format: PixelFormat::Mjpeg,
            timestamp_ns: now_ns(),
            sequence,
        })
    }

    /// Downscale frames wider than `max_width`, keeping the aspect ratio.
    /// JPEG frames are only decoded when they need shrinking.
    pub fn fit_within(self, max_width: u32) -> Result<Self, CameraError> {
        if self.width <= max_width || max_width == 0 {
            return Ok(self);
        }

        let img = match self.format {
            PixelFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, self.data)
                .ok_or_else(|| CameraError::Format("RGB buffer does not match dimensions".into()))?,
            PixelFormat::Mjpeg => image::load_from_memory_with_format(&self.data, ImageFormat::Jpeg)
                .map_err(|e| CameraError::Format(e.to_string()))?
                .to_rgb8(),
        };
        let (width, height) = img.dimensions();
        let new_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        let resized = image::imageops::resize(&img, max_width, new_height, FilterType::Triangle);

        Ok(Self {
            data: resized.into_raw(),
            width: max_width,
            height: new_height,
            format: PixelFormat::Rgb24,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// Encode to JPEG. MJPEG frames pass through untouched.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        match self.format {
            PixelFormat::Mjpeg => {
                if self.data.is_empty() {
                    return Err(CameraError::Encode("empty JPEG payload".into()));
                }
                Ok(self.data.clone())
            }
            PixelFormat::Rgb24 => {
                let img = RgbImage::from_raw(self.width, self.height, self.data.clone())
                    .ok_or_else(|| CameraError::Format("RGB buffer does not match dimensions".into()))?;
                let mut out = Vec::with_capacity(self.data.len() / 8);
                JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
                    .encode_image(&img)
                    .map_err(|e| CameraError::Encode(e.to_string()))?;
                Ok(out)
            }
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
