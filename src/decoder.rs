//! Upload validation and image preprocessing.
//!
//! Turns raw uploaded bytes into the `[1, H, W, 3]` float tensor the
//! classifier expects: RGB channel order, fixed square resolution, pixel
//! intensities scaled into `[0, 1]`.

use image::imageops::FilterType;

use crate::error::ImageError;

/// Square input resolution of the deployed classifier.
pub const INPUT_SIZE: u32 = 224;

/// Default upload cap (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Dense NHWC float tensor with a leading batch dimension of 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn new(height: usize, width: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), height * width * 3);
        Self {
            shape: [1, height, width, 3],
            data,
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

#[derive(Debug, Clone)]
pub struct ImageDecoder {
    input_size: u32,
    max_upload_bytes: usize,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(INPUT_SIZE, DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl ImageDecoder {
    pub fn new(input_size: u32, max_upload_bytes: usize) -> Self {
        Self {
            input_size,
            max_upload_bytes,
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Checks the declared upload metadata. Runs before any bytes are decoded.
    pub fn check_upload(&self, content_type: Option<&str>, size: usize) -> Result<(), ImageError> {
        match content_type {
            Some(ct) if ct.starts_with("image/") => {}
            other => return Err(ImageError::InvalidContentType(other.map(str::to_string))),
        }

        if size > self.max_upload_bytes {
            return Err(ImageError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        Ok(())
    }

    /// Decodes an image into a normalized `[1, size, size, 3]` tensor.
    pub fn decode(&self, bytes: &[u8]) -> Result<ImageTensor, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let img = image::load_from_memory(bytes)
            .map_err(|e| ImageError::InvalidFormat(e.to_string()))?;

        let resized = img.resize_exact(self.input_size, self.input_size, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        let data: Vec<f32> = rgb
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect();

        let side = self.input_size as usize;
        Ok(ImageTensor::new(side, side, data))
    }
}
