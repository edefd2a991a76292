use zune_jpeg::JpegDecoder;

use super::frame::PixelFormat;
use crate::ConversionError;

/// Long-lived RGB888 buffer at the classifier's input geometry.
///
/// Allocated once by the inference worker and overwritten in place on
/// every conversion; its size never changes.
pub struct ScratchBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl ScratchBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 3],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The most recent conversion result.
    pub fn pixels(&self) -> RawPixels<'_> {
        RawPixels {
            data: &self.data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Converted pixels, borrowed from the scratch buffer they were written to.
#[derive(Debug, Clone, Copy)]
pub struct RawPixels<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Decode a frame to packed RGB888, returning the pixels and their size.
pub fn decode_frame(data: &[u8], format: PixelFormat) -> Result<(Vec<u8>, u32, u32), ConversionError> {
    match format {
        PixelFormat::Jpeg => {
            let mut decoder = JpegDecoder::new(data);
            let pixels = decoder
                .decode()
                .map_err(|e| ConversionError::DecodeFailed(format!("{:?}", e)))?;
            let (width, height) = decoder
                .dimensions()
                .ok_or_else(|| ConversionError::DecodeFailed("missing frame header".into()))?;
            // Grayscale streams decode to one byte per pixel
            if pixels.len() != width * height * 3 {
                return Err(ConversionError::Geometry(format!(
                    "decoded {} bytes for {}x{}, expected RGB",
                    pixels.len(),
                    width,
                    height
                )));
            }
            Ok((pixels, width as u32, height as u32))
        }
        PixelFormat::Rgb888 => Err(ConversionError::UnsupportedFormat(format)),
    }
}

/// Write `src` into `scratch`, center-cropping to the scratch aspect ratio
/// and resampling bilinearly when the sizes differ.
pub fn crop_and_resample<'s>(
    src: &[u8],
    src_width: u32,
    src_height: u32,
    scratch: &'s mut ScratchBuffer,
) -> Result<RawPixels<'s>, ConversionError> {
    let (dst_width, dst_height) = (scratch.width, scratch.height);
    if dst_width == 0 || dst_height == 0 {
        return Err(ConversionError::Geometry("empty target geometry".into()));
    }
    if src_width == 0 || src_height == 0 {
        return Err(ConversionError::Geometry("empty source frame".into()));
    }
    let expected = src_width as usize * src_height as usize * 3;
    if src.len() < expected {
        return Err(ConversionError::Geometry(format!(
            "{}x{} frame needs {} bytes, got {}",
            src_width,
            src_height,
            expected,
            src.len()
        )));
    }

    let (crop_w, crop_h) = crop_extent(src_width, src_height, dst_width, dst_height);
    let x0 = (src_width - crop_w) / 2;
    let y0 = (src_height - crop_h) / 2;
    let src_stride = src_width as usize * 3;
    let dst_stride = dst_width as usize * 3;

    if crop_w == dst_width && crop_h == dst_height {
        for (row, out) in scratch.data.chunks_exact_mut(dst_stride).enumerate() {
            let start = (y0 as usize + row) * src_stride + x0 as usize * 3;
            out.copy_from_slice(&src[start..start + dst_stride]);
        }
    } else {
        let scale_x = crop_w as f32 / dst_width as f32;
        let scale_y = crop_h as f32 / dst_height as f32;
        let max_x = (crop_w - 1) as f32;
        let max_y = (crop_h - 1) as f32;

        for dy in 0..dst_height as usize {
            let fy = ((dy as f32 + 0.5) * scale_y - 0.5).clamp(0.0, max_y);
            let y_lo = fy.floor() as usize;
            let y_hi = (y_lo + 1).min(crop_h as usize - 1);
            let wy = fy - y_lo as f32;

            for dx in 0..dst_width as usize {
                let fx = ((dx as f32 + 0.5) * scale_x - 0.5).clamp(0.0, max_x);
                let x_lo = fx.floor() as usize;
                let x_hi = (x_lo + 1).min(crop_w as usize - 1);
                let wx = fx - x_lo as f32;

                let at = |x: usize, y: usize, c: usize| -> f32 {
                    let sx = x0 as usize + x;
                    let sy = y0 as usize + y;
                    src[sy * src_stride + sx * 3 + c] as f32
                };

                let out = dy * dst_stride + dx * 3;
                for c in 0..3 {
                    let top = at(x_lo, y_lo, c) * (1.0 - wx) + at(x_hi, y_lo, c) * wx;
                    let bottom = at(x_lo, y_hi, c) * (1.0 - wx) + at(x_hi, y_hi, c) * wx;
                    let value = top * (1.0 - wy) + bottom * wy;
                    scratch.data[out + c] = value.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    Ok(RawPixels {
        data: &scratch.data,
        width: dst_width,
        height: dst_height,
    })
}

/// Largest centered region of the source with the target's aspect ratio.
fn crop_extent(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32) {
    let (sw, sh, dw, dh) = (src_w as u64, src_h as u64, dst_w as u64, dst_h as u64);
    if sw * dh > sh * dw {
        (((sh * dw) / dh).max(1) as u32, src_h)
    } else {
        (src_w, ((sw * dh) / dw).max(1) as u32)
    }
}
