use crate::capture::RawPixels;
use crate::ClassifierError;

/// Pull-based view of the scratch buffer handed to the classifier.
///
/// Nothing is copied up front. Each `get_data` call packs the requested
/// pixel range on demand as `(r << 16) | (g << 8) | b`, row-major, one value
/// per pixel.
#[derive(Debug, Clone, Copy)]
pub struct Signal<'a> {
    pixels: RawPixels<'a>,
}

impl<'a> Signal<'a> {
    pub fn new(pixels: RawPixels<'a>) -> Self {
        Self { pixels }
    }

    /// Number of values (pixels) in the signal.
    pub fn total_length(&self) -> usize {
        self.pixels.data.len() / 3
    }

    pub fn width(&self) -> u32 {
        self.pixels.width
    }

    pub fn height(&self) -> u32 {
        self.pixels.height
    }

    /// Fill `out` with the pixels starting at `offset`.
    pub fn get_data(&self, offset: usize, out: &mut [f32]) -> Result<(), ClassifierError> {
        let total = self.total_length();
        if offset.checked_add(out.len()).map_or(true, |end| end > total) {
            return Err(ClassifierError::SignalOutOfRange {
                offset,
                len: out.len(),
                total,
            });
        }

        let bytes = &self.pixels.data[offset * 3..(offset + out.len()) * 3];
        for (value, px) in out.iter_mut().zip(bytes.chunks_exact(3)) {
            let packed = (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32;
            *value = packed as f32;
        }
        Ok(())
    }
}

/// Split a packed pixel back into its channels.
pub fn unpack_rgb(value: f32) -> [u8; 3] {
    let packed = value as u32;
    [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
}
