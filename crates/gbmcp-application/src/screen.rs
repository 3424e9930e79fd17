//! PNG encoding of cached frames.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use gbmcp_core::session::Frame;
use gbmcp_core::{GbError, Result};
use serde::Serialize;

/// A frame encoded for a tool response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenImage {
    pub image_format: &'static str,
    pub width: u32,
    pub height: u32,
    pub frame_counter: u64,
    pub image_base64: String,
}

impl ScreenImage {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let png = encode_png(frame)?;
        Ok(Self {
            image_format: "PNG",
            width: frame.width,
            height: frame.height,
            frame_counter: frame.frame_counter,
            image_base64: BASE64.encode(png),
        })
    }
}

/// Encodes the frame as an 8-bit RGB PNG. The alpha channel is dropped; the
/// Game Boy screen is always opaque.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let rgb: Vec<u8> = frame
        .pixels
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    if rgb.len() != (frame.width as usize) * (frame.height as usize) * 3 {
        return Err(GbError::internal(format!(
            "frame {} has {} pixel bytes for {}x{}",
            frame.frame_counter,
            frame.pixels.len(),
            frame.width,
            frame.height
        )));
    }

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(png_error)?;
    writer.write_image_data(&rgb).map_err(png_error)?;
    writer.finish().map_err(png_error)?;
    Ok(out)
}

fn png_error(err: png::EncodingError) -> GbError {
    GbError::Serialization {
        format: "png".to_string(),
        message: err.to_string(),
    }
}
