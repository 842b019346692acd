//! PNG / base64 / data-URL conversions for image payloads

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::{ImageFormat, ImageReader, RgbaImage};

use crate::error::EditorError;

/// An encoded PNG together with its pixel dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl EncodedImage {
    pub fn from_rgba(img: &RgbaImage) -> Result<Self, EditorError> {
        Ok(Self {
            width: img.width(),
            height: img.height(),
            png: encode_png(img)?,
        })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.png)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }

    pub fn decode(&self) -> Result<RgbaImage, EditorError> {
        decode_image_bytes(&self.png)
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, EditorError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| EditorError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Decode raw file bytes. Input whose format cannot be recognised is
/// reported as [`EditorError::NotAnImage`].
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbaImage, EditorError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EditorError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(EditorError::NotAnImage(
            "unrecognised image format".to_string(),
        ));
    }
    let img = reader
        .decode()
        .map_err(|e| EditorError::Decode(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Decode a base64 payload, with or without a `data:image/...;base64,` prefix
pub fn decode_image_data(data: &str) -> Result<RgbaImage, EditorError> {
    let payload = strip_data_url(data.trim())?;
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| EditorError::Decode(format!("invalid base64: {}", e)))?;
    decode_image_bytes(&bytes)
}

fn strip_data_url(data: &str) -> Result<&str, EditorError> {
    let Some(rest) = data.strip_prefix("data:") else {
        return Ok(data);
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| EditorError::Decode("data URL without payload".to_string()))?;
    if !header.starts_with("image/") {
        return Err(EditorError::NotAnImage(format!("data URL of type {}", header)));
    }
    if !header.ends_with(";base64") {
        return Err(EditorError::Decode("data URL is not base64".to_string()));
    }
    Ok(payload)
}
